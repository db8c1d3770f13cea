//! Logger error types.

use logger_database::DatabaseError;
use remote_endpoint::RemoteError;
use thiserror::Error;

/// Error type for every logger operation.
#[derive(Debug, Error)]
pub enum LoggerError {
    /// A recorded value does not match the stream's schema. Nothing was buffered.
    #[error("Value for stream '{stream}' does not match its schema: {message}")]
    Validation { stream: String, message: String },

    /// The stream is not registered with this logger.
    #[error("Stream '{0}' is not registered with the logger")]
    NotRegistered(String),

    /// Verified registration found no remote stream and no schema to create it with.
    #[error("The stream '{0}' was not found")]
    NotFound(String),

    /// A schema handed to registration is not a valid JSON schema.
    #[error("Invalid schema for stream '{stream}': {message}")]
    InvalidSchema { stream: String, message: String },

    /// The endpoint could not be reached. Retried on the next period.
    #[error("Remote endpoint unreachable: {0}")]
    RemoteUnreachable(#[source] RemoteError),

    /// A registered stream no longer exists remotely. Does not heal on its own.
    #[error("Stream '{0}' does not exist on the remote endpoint")]
    StreamMissingRemotely(String),

    /// The credential was rejected.
    #[error("Authentication failed: {0}")]
    Authentication(#[source] RemoteError),

    /// Any other endpoint failure.
    #[error("Remote error: {0}")]
    Remote(#[source] RemoteError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The background runtime could not be built.
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    /// The logger was closed.
    #[error("Logger is closed")]
    Closed,
}

impl LoggerError {
    /// Classify a failure to reach or ping the endpoint.
    pub(crate) fn unreachable(err: RemoteError) -> Self {
        match err {
            RemoteError::Auth(_) => Self::Authentication(err),
            other => Self::RemoteUnreachable(other),
        }
    }

    /// Whether a later sync cycle may succeed without operator action.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RemoteUnreachable(_) => true,
            Self::Remote(err) => err.is_transient(),
            _ => false,
        }
    }
}

impl From<RemoteError> for LoggerError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Auth(_) => Self::Authentication(err),
            RemoteError::Unreachable(_) => Self::RemoteUnreachable(err),
            other => Self::Remote(other),
        }
    }
}

/// Result type alias using LoggerError.
pub type LoggerResult<T> = Result<T, LoggerError>;
