//! Recording values into the buffer.

use super::{logger_with, number_schema, temp_setup};
use crate::{JsonSchemaValidator, Logger, LoggerError, SchemaValidator};
use remote_endpoint::{InjectedFailure, RecordingRemote};
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn rejected_value_leaves_buffer_unchanged() {
    let (logger, _remote, _clock) = temp_setup();

    logger.record("temp", &json!(5)).unwrap();
    let err = logger.record("temp", &json!("bad")).unwrap_err();

    assert!(matches!(err, LoggerError::Validation { ref stream, .. } if stream == "temp"));
    assert_eq!(logger.pending_count().unwrap(), 1);
}

#[test]
fn pending_count_tracks_accepted_minus_synced() {
    let (logger, _remote, clock) = temp_setup();

    let mut accepted = 0;
    for i in 0..10 {
        clock.advance(1.0);
        let value = if i % 3 == 0 { json!("nope") } else { json!(i) };
        if logger.record("temp", &value).is_ok() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 6);
    assert_eq!(logger.pending_count().unwrap(), 6);

    logger.sync().unwrap();
    assert_eq!(logger.pending_count().unwrap(), 0);

    logger.record("temp", &json!(1)).unwrap();
    assert_eq!(logger.pending_count().unwrap(), 1);
}

#[test]
fn recording_works_while_endpoint_is_down() {
    let remote = RecordingRemote::new();
    remote.fail_connect(Some(InjectedFailure::Unreachable));
    remote.fail_ping(Some(InjectedFailure::Unreachable));
    let (logger, _clock) = logger_with(&remote);
    logger
        .register_without_verification("temp", Some(number_schema()))
        .unwrap();

    for i in 0..5 {
        logger.record("temp", &json!(i)).unwrap();
    }

    assert_eq!(logger.pending_count().unwrap(), 5);
    assert_eq!(remote.ping_count(), 0);
    assert!(remote.connections().is_empty());
}

#[test]
fn per_stream_counts() {
    let (logger, _remote, _clock) = temp_setup();
    logger.register_without_verification("notes", None).unwrap();

    logger.record("temp", &json!(1)).unwrap();
    logger.record("notes", &json!("a")).unwrap();
    logger.record("notes", &json!("b")).unwrap();

    assert_eq!(logger.pending_count_for("temp").unwrap(), 1);
    assert_eq!(logger.pending_count_for("notes").unwrap(), 2);
    assert_eq!(logger.pending_count_for("ghost").unwrap(), 0);
    assert_eq!(logger.pending_count().unwrap(), 3);
}

#[test]
fn reregistering_changes_validation() {
    let (logger, _remote, _clock) = temp_setup();

    logger
        .register_without_verification("temp", Some(json!({"type": "string"})))
        .unwrap();

    assert!(logger.record("temp", &json!("now text")).is_ok());
    assert!(matches!(
        logger.record("temp", &json!(3)),
        Err(LoggerError::Validation { .. })
    ));
}

#[test]
fn malformed_schema_is_rejected_at_registration() {
    let (logger, _remote, _clock) = temp_setup();

    let err = logger
        .register_without_verification("weird", Some(json!({"type": 5})))
        .unwrap_err();
    assert!(matches!(err, LoggerError::InvalidSchema { .. }));
    assert!(!logger.contains("weird").unwrap());
}

#[test]
fn streams_are_listed_in_registration_order() {
    let (logger, _remote, _clock) = temp_setup();
    logger.register_without_verification("b", None).unwrap();
    logger.register_without_verification("a", None).unwrap();
    logger
        .register_without_verification("temp", Some(json!({"type": "integer"})))
        .unwrap();

    let streams = logger.streams().unwrap();
    let names: Vec<&str> = streams.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["temp", "b", "a"]);
    assert_eq!(streams[0].schema, Some(json!({"type": "integer"})));
    assert!(logger.contains("a").unwrap());
    assert!(!logger.contains("c").unwrap());
}

#[test]
fn external_schema_reference_never_reaches_the_network() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let port = listener.local_addr().unwrap().port();
    let schema = json!({"$ref": format!("http://127.0.0.1:{port}/schema.json")});

    let remote = RecordingRemote::new();
    remote.add_stream("mirrored", Some(schema.clone()));
    let (logger, _clock) = logger_with(&remote);

    let err = logger
        .register_without_verification("temp", Some(schema.clone()))
        .unwrap_err();
    assert!(matches!(err, LoggerError::InvalidSchema { ref stream, .. } if stream == "temp"));
    assert!(!logger.contains("temp").unwrap());

    let err = logger.register("created", Some(schema)).unwrap_err();
    assert!(matches!(err, LoggerError::InvalidSchema { .. }));
    assert!(!remote.has_stream("created"));

    // A remote stream is mirrored as-is; its unresolvable reference fails locally.
    logger.register("mirrored", None).unwrap();
    let err = logger.record("mirrored", &json!(5)).unwrap_err();
    assert!(matches!(err, LoggerError::Validation { .. }));
    assert_eq!(logger.pending_count().unwrap(), 0);

    match listener.accept() {
        Err(e) if e.kind() == ErrorKind::WouldBlock => {}
        other => panic!("schema reference opened a connection: {other:?}"),
    }
}

#[test]
fn remote_schema_is_mirrored_without_local_checks() {
    let remote = RecordingRemote::new();
    remote.add_stream("flag", Some(json!(true)));
    let (logger, _clock) = logger_with(&remote);

    logger.register("flag", None).unwrap();

    let streams = logger.streams().unwrap();
    assert_eq!(streams[0].name, "flag");
    assert_eq!(streams[0].schema, Some(json!(true)));
}

/// Parks the first validation it sees until the test releases it.
struct GatedValidator {
    inner: JsonSchemaValidator,
    armed: Arc<AtomicBool>,
    gate: Arc<Barrier>,
}

impl SchemaValidator for GatedValidator {
    fn check_schema(&self, schema: &Value) -> Result<(), String> {
        self.inner.check_schema(schema)
    }

    fn validate(&self, value: &Value, schema: &Value) -> Result<(), String> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.gate.wait();
            self.gate.wait();
        }
        self.inner.validate(value, schema)
    }
}

#[test]
fn reregistration_waits_for_in_flight_record() {
    let armed = Arc::new(AtomicBool::new(false));
    let gate = Arc::new(Barrier::new(2));
    let logger = Logger::in_memory()
        .validator(GatedValidator {
            inner: JsonSchemaValidator::new(),
            armed: armed.clone(),
            gate: gate.clone(),
        })
        .open()
        .unwrap();
    logger
        .register_without_verification("temp", Some(number_schema()))
        .unwrap();

    armed.store(true, Ordering::SeqCst);
    let recorder = {
        let logger = logger.clone();
        thread::spawn(move || logger.record("temp", &json!(5)))
    };
    gate.wait();

    let registered = Arc::new(AtomicBool::new(false));
    let registrar = {
        let logger = logger.clone();
        let registered = registered.clone();
        thread::spawn(move || {
            logger
                .register_without_verification("temp", Some(json!({"type": "string"})))
                .unwrap();
            registered.store(true, Ordering::SeqCst);
        })
    };
    thread::sleep(Duration::from_millis(100));
    assert!(!registered.load(Ordering::SeqCst));

    gate.wait();
    recorder.join().unwrap().unwrap();
    registrar.join().unwrap();

    assert_eq!(logger.pending_count().unwrap(), 1);
    assert!(matches!(
        logger.record("temp", &json!(6)),
        Err(LoggerError::Validation { .. })
    ));
}
