//! In-memory remote endpoint that records what it receives.

use crate::{ConnectionSettings, DataPoint, RemoteConnector, RemoteEndpoint, RemoteError, RemoteResult};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A failure the recording endpoint can be told to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectedFailure {
    Unreachable,
    Auth,
    Status(u16),
}

impl InjectedFailure {
    fn to_error(&self, context: &str) -> RemoteError {
        match self {
            Self::Unreachable => RemoteError::Unreachable(format!("injected failure during {context}")),
            Self::Auth => RemoteError::Auth(format!("injected failure during {context}")),
            Self::Status(status) => RemoteError::Status {
                status: *status,
                message: format!("injected failure during {context}"),
            },
        }
    }
}

type AppendHook = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct RemoteStream {
    schema: Option<Value>,
    points: Vec<DataPoint>,
}

struct RecordingState {
    device: String,
    required_credential: Option<String>,
    streams: HashMap<String, RemoteStream>,
    connect_failure: Option<InjectedFailure>,
    ping_failure: Option<InjectedFailure>,
    append_failures: HashMap<String, InjectedFailure>,
    append_hook: Option<AppendHook>,
    connections: Vec<ConnectionSettings>,
    pings: usize,
    append_calls: Vec<(String, usize)>,
}

impl Default for RecordingState {
    fn default() -> Self {
        Self {
            device: "test/device".to_string(),
            required_credential: None,
            streams: HashMap::new(),
            connect_failure: None,
            ping_failure: None,
            append_failures: HashMap::new(),
            append_hook: None,
            connections: Vec::new(),
            pings: 0,
            append_calls: Vec::new(),
        }
    }
}

/// In-memory endpoint and connector.
///
/// Clones share state, so a test can keep one handle for assertions while
/// the logger owns another. Appends enforce the service's rule that a
/// stream's timestamps never go backwards.
#[derive(Clone, Default)]
pub struct RecordingRemote {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingRemote {
    /// Creates an empty recording endpoint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject connections whose credential differs from `credential`.
    pub fn require_credential(&self, credential: impl Into<String>) {
        self.state.lock().required_credential = Some(credential.into());
    }

    /// Create (or replace) a remote stream.
    pub fn add_stream(&self, name: &str, schema: Option<Value>) {
        self.state.lock().streams.insert(
            name.to_string(),
            RemoteStream {
                schema,
                points: Vec::new(),
            },
        );
    }

    /// Delete a remote stream and its data.
    pub fn remove_stream(&self, name: &str) {
        self.state.lock().streams.remove(name);
    }

    pub fn has_stream(&self, name: &str) -> bool {
        self.state.lock().streams.contains_key(name)
    }

    pub fn fail_connect(&self, failure: Option<InjectedFailure>) {
        self.state.lock().connect_failure = failure;
    }

    pub fn fail_ping(&self, failure: Option<InjectedFailure>) {
        self.state.lock().ping_failure = failure;
    }

    /// Make appends to `stream` fail until cleared with `None`.
    pub fn fail_appends_to(&self, stream: &str, failure: Option<InjectedFailure>) {
        let mut state = self.state.lock();
        match failure {
            Some(failure) => {
                state.append_failures.insert(stream.to_string(), failure);
            }
            None => {
                state.append_failures.remove(stream);
            }
        }
    }

    /// Run `hook` with the stream name at the start of every append, outside
    /// the endpoint's internal lock.
    pub fn on_append(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        self.state.lock().append_hook = Some(Arc::new(hook));
    }

    /// Points accepted for a stream, in arrival order.
    pub fn received(&self, stream: &str) -> Vec<DataPoint> {
        self.state
            .lock()
            .streams
            .get(stream)
            .map(|s| s.points.clone())
            .unwrap_or_default()
    }

    /// Every append call as `(stream, batch length)`, including failed ones.
    pub fn append_calls(&self) -> Vec<(String, usize)> {
        self.state.lock().append_calls.clone()
    }

    pub fn ping_count(&self) -> usize {
        self.state.lock().pings
    }

    /// Settings of every successful connect.
    pub fn connections(&self) -> Vec<ConnectionSettings> {
        self.state.lock().connections.clone()
    }
}

impl RemoteEndpoint for RecordingRemote {
    fn ping(&self) -> RemoteResult<String> {
        let mut state = self.state.lock();
        state.pings += 1;
        if let Some(failure) = &state.ping_failure {
            return Err(failure.to_error("ping"));
        }
        Ok(state.device.clone())
    }

    fn stream_exists(&self, name: &str) -> RemoteResult<bool> {
        Ok(self.state.lock().streams.contains_key(name))
    }

    fn create_stream(&self, name: &str, schema: &Value) -> RemoteResult<()> {
        if !schema.is_object() {
            return Err(RemoteError::Schema(format!("schema for '{name}' must be an object")));
        }
        let mut state = self.state.lock();
        if state.streams.contains_key(name) {
            return Err(RemoteError::Status {
                status: 409,
                message: format!("stream '{name}' already exists"),
            });
        }
        state.streams.insert(
            name.to_string(),
            RemoteStream {
                schema: Some(schema.clone()),
                points: Vec::new(),
            },
        );
        Ok(())
    }

    fn fetch_schema(&self, name: &str) -> RemoteResult<Option<Value>> {
        match self.state.lock().streams.get(name) {
            Some(stream) => Ok(stream.schema.clone()),
            None => Err(RemoteError::Status {
                status: 404,
                message: format!("stream '{name}' not found"),
            }),
        }
    }

    fn append_data_points(&self, name: &str, points: &[DataPoint]) -> RemoteResult<()> {
        let hook = self.state.lock().append_hook.clone();
        if let Some(hook) = hook {
            hook(name);
        }

        let mut state = self.state.lock();
        state.append_calls.push((name.to_string(), points.len()));
        if let Some(failure) = state.append_failures.get(name) {
            return Err(failure.to_error("append"));
        }

        let stream = state.streams.get_mut(name).ok_or_else(|| RemoteError::Status {
            status: 404,
            message: format!("stream '{name}' not found"),
        })?;

        let mut last = stream.points.last().map(|p| p.t);
        for point in points {
            if last.is_some_and(|t| point.t < t) {
                return Err(RemoteError::Status {
                    status: 400,
                    message: format!("timestamp {} is older than the stream's newest point", point.t),
                });
            }
            last = Some(point.t);
        }
        stream.points.extend_from_slice(points);
        Ok(())
    }
}

impl RemoteConnector for RecordingRemote {
    fn connect(&self, settings: &ConnectionSettings) -> RemoteResult<Arc<dyn RemoteEndpoint>> {
        {
            let state = self.state.lock();
            if let Some(failure) = &state.connect_failure {
                return Err(failure.to_error("connect"));
            }
            if let Some(required) = &state.required_credential {
                if required != &settings.credential {
                    return Err(RemoteError::Auth("credential rejected".to_string()));
                }
            }
        }

        self.ping()?;
        self.state.lock().connections.push(settings.clone());
        Ok(Arc::new(self.clone()))
    }
}
