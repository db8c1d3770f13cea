//! Remote endpoint capability for the stream logger.
//!
//! The logger only needs a handful of operations from the remote
//! time-series service, captured by [`RemoteEndpoint`]. Endpoints are built
//! lazily through a [`RemoteConnector`] from the credential and URL stored in
//! the logger's configuration.
//!
//! Two implementations ship with the crate:
//!
//! - [`HttpEndpoint`] / [`HttpConnector`]: blocking REST client
//! - [`RecordingRemote`]: in-memory endpoint that records uploads and can
//!   inject failures, for tests and offline demos

mod endpoint;
mod error;
mod http;
mod recording;

pub use endpoint::{ConnectionSettings, DataPoint, RemoteConnector, RemoteEndpoint};
pub use error::{RemoteError, RemoteResult};
pub use http::{HttpConnector, HttpEndpoint, HttpEndpointConfig};
pub use recording::{InjectedFailure, RecordingRemote};
