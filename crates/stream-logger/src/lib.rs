//! # Stream Logger
//!
//! An offline-first logger for a remote time-series service. Values are
//! validated and buffered in SQLite, then uploaded in timestamp order by a
//! sync cycle that only deletes what the endpoint acknowledged.
//!
//! ## Principles
//!
//! - **Recording never touches the network** - it succeeds or fails on local validation alone
//! - **SQLite first, cache second** - configuration and registry writes hit disk before memory
//! - **Delete only what was acknowledged** - points recorded during a cycle survive it
//! - **Failures are typed** - a failed cycle goes to the failure handler or back to the caller
//!
//! ## Architecture
//!
//! ```text
//! RECORD:
//!   registry schema → validate → pending_points
//!
//! SYNC:
//!   connect/reuse → ping → per stream: exists → read → append → delete ≤ last
//!
//! SCHEDULE:
//!   stopped ⇄ running (sleep period → sync → sleep period ...)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use remote_endpoint::RecordingRemote;
//! use serde_json::json;
//! use stream_logger::{Logger, SyncOutcome};
//!
//! let remote = RecordingRemote::new();
//! remote.add_stream("temperature", Some(json!({"type": "number"})));
//!
//! let logger = Logger::in_memory()
//!     .credential("api-key")
//!     .connector(remote.clone())
//!     .open()
//!     .unwrap();
//!
//! logger.register("temperature", None).unwrap();
//! logger.record("temperature", &json!(21.5)).unwrap();
//! assert_eq!(logger.pending_count().unwrap(), 1);
//!
//! let outcome = logger.sync().unwrap();
//! assert!(matches!(outcome, SyncOutcome::Completed(report) if report.points_uploaded == 1));
//! assert_eq!(logger.pending_count().unwrap(), 0);
//! assert_eq!(remote.received("temperature").len(), 1);
//! ```
//!
//! ## Crate Structure
//!
//! - [`Logger`] - the handle: recording, registration, sync, lifecycle, configuration
//! - [`clock`] - time sources for timestamps
//! - [`validation`] - schema checks for recorded values

mod config;
mod error;
mod ingest;
mod logger;
mod registry;
mod scheduler;
mod store;
mod sync_engine;

pub mod clock;
pub mod validation;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DEFAULT_ENDPOINT_URL, DEFAULT_SYNC_PERIOD};
pub use error::{LoggerError, LoggerResult};
pub use logger::{CreateCallback, Logger, LoggerBuilder};
pub use logger_database::RegisteredStream;
pub use remote_endpoint::{
    ConnectionSettings, HttpConnector, HttpEndpointConfig, RecordingRemote, RemoteConnector, RemoteEndpoint,
    RemoteError,
};
pub use sync_engine::{SyncFailureHandler, SyncOutcome, SyncReport};
pub use validation::{JsonSchemaValidator, SchemaValidator};
