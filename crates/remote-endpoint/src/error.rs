//! Error types for remote endpoint operations.

use thiserror::Error;

/// Error returned by a [`RemoteEndpoint`](crate::RemoteEndpoint).
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The endpoint could not be reached (connection refused, DNS, timeout).
    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),

    /// The credential was rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The endpoint refused a stream schema.
    #[error("Invalid schema: {0}")]
    Schema(String),

    /// The endpoint returned a non-success HTTP status.
    #[error("Remote error: {status} - {message}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body, typically containing error details.
        message: String,
    },

    /// Transport-level HTTP error that is not a connectivity failure.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The endpoint URL or client settings are unusable.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RemoteError {
    /// Whether retrying later without operator action may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Http(_))
            || matches!(self, Self::Status { status, .. } if *status >= 500)
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Unreachable(err.to_string())
        } else {
            Self::Http(err)
        }
    }
}

impl From<url::ParseError> for RemoteError {
    fn from(err: url::ParseError) -> Self {
        Self::Config(format!("invalid endpoint URL: {err}"))
    }
}

/// Convenience Result type alias for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;
