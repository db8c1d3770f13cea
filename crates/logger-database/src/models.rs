//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A buffered data point that has not been uploaded yet.
///
/// `payload` is the JSON text of the recorded value. It was validated
/// against the stream's schema when it was recorded and is never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPoint {
    pub stream: String,
    /// Seconds since the Unix epoch, assigned at insertion time.
    pub timestamp: f64,
    pub payload: String,
}

/// A stream the logger is responsible for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredStream {
    pub name: String,
    /// JSON schema of accepted values; `None` disables validation.
    pub schema: Option<Value>,
    pub registered_at: DateTime<Utc>,
}

impl RegisteredStream {
    pub fn new(name: impl Into<String>, schema: Option<Value>) -> Self {
        Self {
            name: name.into(),
            schema,
            registered_at: Utc::now(),
        }
    }
}

/// The singleton `logger_config` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredConfig {
    /// Access token used for the remote endpoint. Empty until set.
    pub credential: String,
    pub endpoint_url: String,
    /// Seconds since the Unix epoch of the last successful sync, 0 if never.
    pub last_sync_time: f64,
    /// Seconds between background sync attempts.
    pub sync_period: f64,
    /// Free-form JSON owned by the application.
    pub user_data: Value,
}

impl StoredConfig {
    /// Default row for a freshly created store.
    pub fn with_endpoint_url(endpoint_url: impl Into<String>) -> Self {
        Self {
            credential: String::new(),
            endpoint_url: endpoint_url.into(),
            last_sync_time: 0.0,
            sync_period: 600.0,
            user_data: Value::Object(Default::default()),
        }
    }
}
