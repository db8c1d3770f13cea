//! Typed, write-through accessors over the stored configuration row.

use crate::{LoggerError, LoggerResult};
use logger_database::{Database, StoredConfig};
use remote_endpoint::ConnectionSettings;
use serde_json::Value;
use std::time::Duration;

/// Default endpoint URL (can be overridden at compile time via STREAM_LOGGER_ENDPOINT_URL env var).
pub const DEFAULT_ENDPOINT_URL: &str = match option_env!("STREAM_LOGGER_ENDPOINT_URL") {
    Some(url) => url,
    None => "https://connectordb.com",
};

/// Default time between background sync attempts.
pub const DEFAULT_SYNC_PERIOD: Duration = Duration::from_secs(600);

/// In-memory mirror of the configuration row.
///
/// Every setter writes the row first and only then updates the cache, so
/// the cache never holds a value that is not on disk.
#[derive(Debug, Clone)]
pub(crate) struct ConfigFacet {
    cached: StoredConfig,
}

impl ConfigFacet {
    pub(crate) fn load(db: &Database) -> LoggerResult<Self> {
        Ok(Self {
            cached: db.get_config()?,
        })
    }

    pub(crate) fn credential(&self) -> &str {
        &self.cached.credential
    }

    pub(crate) fn set_credential(&mut self, db: &Database, credential: &str) -> LoggerResult<()> {
        db.set_credential(credential)?;
        self.cached.credential = credential.to_string();
        Ok(())
    }

    pub(crate) fn endpoint_url(&self) -> &str {
        &self.cached.endpoint_url
    }

    pub(crate) fn set_endpoint_url(&mut self, db: &Database, url: &str) -> LoggerResult<()> {
        if url.trim().is_empty() {
            return Err(LoggerError::InvalidConfig("endpoint URL must not be empty".to_string()));
        }
        db.set_endpoint_url(url)?;
        self.cached.endpoint_url = url.to_string();
        Ok(())
    }

    pub(crate) fn last_sync_time(&self) -> f64 {
        self.cached.last_sync_time
    }

    pub(crate) fn set_last_sync_time(&mut self, db: &Database, timestamp: f64) -> LoggerResult<()> {
        db.set_last_sync_time(timestamp)?;
        self.cached.last_sync_time = timestamp;
        Ok(())
    }

    pub(crate) fn sync_period(&self) -> LoggerResult<Duration> {
        period_from_secs(self.cached.sync_period)
    }

    pub(crate) fn set_sync_period(&mut self, db: &Database, period: Duration) -> LoggerResult<()> {
        if period.is_zero() {
            return Err(LoggerError::InvalidConfig("sync period must be positive".to_string()));
        }
        let seconds = period.as_secs_f64();
        db.set_sync_period(seconds)?;
        self.cached.sync_period = seconds;
        Ok(())
    }

    pub(crate) fn user_data(&self) -> &Value {
        &self.cached.user_data
    }

    pub(crate) fn set_user_data(&mut self, db: &Database, data: Value) -> LoggerResult<()> {
        db.set_user_data(&data)?;
        self.cached.user_data = data;
        Ok(())
    }

    pub(crate) fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            credential: self.cached.credential.clone(),
            endpoint_url: self.cached.endpoint_url.clone(),
        }
    }
}

fn period_from_secs(seconds: f64) -> LoggerResult<Duration> {
    match Duration::try_from_secs_f64(seconds) {
        Ok(period) if !period.is_zero() => Ok(period),
        _ => Err(LoggerError::InvalidConfig(format!(
            "stored sync period {seconds} is not a positive number of seconds"
        ))),
    }
}
