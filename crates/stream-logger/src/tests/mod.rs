//! Scenario tests for the logger facade.
//!
//! - `ingestion.rs`  - recording, validation, pending counts
//! - `sync.rs`       - upload order, acknowledged deletion, idempotence
//! - `failures.rs`   - unreachable endpoint, missing streams, failure handler
//! - `scheduler.rs`  - start/stop lifecycle, rescheduling, close
//! - `durability.rs` - on-disk stores across reopen, first-creation callback

mod ingestion;

use crate::{Logger, ManualClock};
use remote_endpoint::RecordingRemote;
use serde_json::{json, Value};
use std::sync::Arc;

pub(crate) const CREDENTIAL: &str = "test-key";

/// A logger wired to `remote` with a manual clock at t = 1000.
pub(crate) fn logger_with(remote: &RecordingRemote) -> (Logger, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1000.0));
    let logger = Logger::in_memory()
        .credential(CREDENTIAL)
        .connector(remote.clone())
        .clock(clock.clone())
        .open()
        .unwrap();
    (logger, clock)
}

pub(crate) fn number_schema() -> Value {
    json!({"type": "number"})
}

/// Remote with a numeric "temp" stream and a logger tracking it.
pub(crate) fn temp_setup() -> (Logger, RecordingRemote, Arc<ManualClock>) {
    let remote = RecordingRemote::new();
    remote.add_stream("temp", Some(number_schema()));
    let (logger, clock) = logger_with(&remote);
    logger.register("temp", None).unwrap();
    (logger, remote, clock)
}

#[test]
fn basic_workflow() {
    let (logger, remote, clock) = temp_setup();

    logger.record("temp", &json!(20.5)).unwrap();
    clock.advance(1.0);
    logger.record("temp", &json!(21.0)).unwrap();
    assert_eq!(logger.pending_count().unwrap(), 2);

    logger.sync().unwrap();

    assert_eq!(logger.pending_count().unwrap(), 0);
    let values: Vec<Value> = remote
        .received("temp")
        .iter()
        .map(|p| p.value().unwrap())
        .collect();
    assert_eq!(values, vec![json!(20.5), json!(21.0)]);
    assert_eq!(logger.last_sync_time().unwrap(), 1001.0);
}
