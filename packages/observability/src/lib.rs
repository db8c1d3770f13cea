//! # Observability
//!
//! Logging setup for the stream logger binaries.
//!
//! Libraries only use `tracing` macros. A binary calls [`init`] or
//! [`init_with_config`] once at startup to decide where the events go:
//! compact lines on stderr, JSON lines in an append-only file, or both.
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "stream-logger".into(),
//!         default_level: "debug".into(),
//!         also_stderr: true,
//!         ..Default::default()
//!     })
//!     .ok();
//!
//!     tracing::info!("ready");
//! }
//! ```
//!
//! `RUST_LOG` overrides `default_level` when set.

mod file;

pub use file::{default_log_path, LogFileWriter};

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the binary, logged once at startup.
    pub service_name: String,

    /// Default filter (e.g. "info", "stream_logger=debug").
    pub default_level: String,

    /// JSONL file path. Defaults to [`default_log_path`].
    pub log_path: Option<PathBuf>,

    /// Write JSON lines to the log file.
    pub file: bool,

    /// Write compact lines to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            file: false,
            also_stderr: true,
        }
    }
}

impl LogConfig {
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_level))
    }

    fn resolved_log_path(&self) -> Option<PathBuf> {
        if !self.file {
            return None;
        }
        self.log_path.clone().or_else(default_log_path)
    }
}

/// Initialize logging to stderr at `info`.
pub fn init(service_name: &str) -> io::Result<()> {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    })
}

/// Install the global subscriber described by `config`.
///
/// Fails if the log file cannot be opened or a subscriber is already set.
pub fn init_with_config(config: LogConfig) -> io::Result<()> {
    let log_path = config.resolved_log_path();

    let file_layer = match &log_path {
        Some(path) => {
            let writer = LogFileWriter::open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(writer)
                    .with_filter(config.filter()),
            )
        }
        None => None,
    };

    let stderr_layer = config.also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .compact()
            .with_writer(io::stderr)
            .with_filter(config.filter())
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(io::Error::other)?;

    tracing::debug!(
        service = %config.service_name,
        log_path = ?log_path,
        "observability initialized"
    );
    Ok(())
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, trace, warn, Level};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LogConfig::default();
        assert_eq!(config.service_name, "unknown");
        assert_eq!(config.default_level, "info");
        assert!(config.log_path.is_none());
        assert!(!config.file);
        assert!(config.also_stderr);
    }

    #[test]
    fn log_path_only_when_file_enabled() {
        let config = LogConfig {
            log_path: Some(PathBuf::from("/tmp/x.jsonl")),
            ..Default::default()
        };
        assert_eq!(config.resolved_log_path(), None);

        let config = LogConfig {
            file: true,
            ..config
        };
        assert_eq!(config.resolved_log_path(), Some(PathBuf::from("/tmp/x.jsonl")));
    }
}
