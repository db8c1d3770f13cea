//! Endpoint and connector traits plus the uploaded data point shape.

use crate::RemoteResult;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use std::sync::Arc;

/// One uploaded data point: timestamp `t` and the recorded JSON value `d`.
///
/// The value is kept as raw JSON so buffered payloads are forwarded
/// byte-for-byte without being re-parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPoint {
    pub t: f64,
    pub d: Box<RawValue>,
}

impl DataPoint {
    /// Build a data point from already-serialized JSON text.
    pub fn from_json(t: f64, json: impl Into<String>) -> serde_json::Result<Self> {
        Ok(Self {
            t,
            d: RawValue::from_string(json.into())?,
        })
    }

    /// Parse the payload into a JSON value.
    pub fn value(&self) -> serde_json::Result<Value> {
        serde_json::from_str(self.d.get())
    }
}

/// Operations the logger needs from the remote time-series service.
///
/// All calls block the calling thread; timeouts are the implementation's
/// responsibility.
pub trait RemoteEndpoint: Send + Sync {
    /// Check connectivity and credentials. Returns the identity the
    /// credential belongs to (for the HTTP service, the device path).
    fn ping(&self) -> RemoteResult<String>;

    /// Whether the named stream exists remotely.
    fn stream_exists(&self, name: &str) -> RemoteResult<bool>;

    /// Create the named stream with the given JSON schema.
    fn create_stream(&self, name: &str, schema: &Value) -> RemoteResult<()>;

    /// The schema of an existing remote stream, `None` if it declares none.
    fn fetch_schema(&self, name: &str) -> RemoteResult<Option<Value>>;

    /// Append points, already ordered by ascending timestamp, to a stream.
    fn append_data_points(&self, name: &str, points: &[DataPoint]) -> RemoteResult<()>;
}

/// Values an endpoint is built from.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub credential: String,
    pub endpoint_url: String,
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("credential", &"<redacted>")
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

/// Builds endpoints on demand.
pub trait RemoteConnector: Send + Sync {
    /// Establish an endpoint. Implementations should surface bad credentials
    /// and unreachable hosts here rather than on first use.
    fn connect(&self, settings: &ConnectionSettings) -> RemoteResult<Arc<dyn RemoteEndpoint>>;
}
