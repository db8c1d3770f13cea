//! Recording values into the pending buffer. Never touches the network.

use crate::store::{stamp_after, LocalStore};
use crate::{Logger, LoggerError, LoggerResult};
use logger_database::PendingPoint;
use serde_json::Value;
use tracing::debug;

impl Logger {
    /// Validate `value` against the stream's schema and buffer it.
    ///
    /// Returns the timestamp the point was stored under. Timestamps handed
    /// out by one logger are strictly increasing. The schema lookup,
    /// validation and insert happen under one store lock, so a concurrent
    /// re-registration cannot slip a new schema in between.
    pub fn record(&self, stream: &str, value: &Value) -> LoggerResult<f64> {
        let timestamp = self.with_store(|store| {
            let payload = self.validated_payload(store, stream, value)?;
            let timestamp = store.next_timestamp(self.shared.clock.now());
            store.db.insert_pending_point(&PendingPoint {
                stream: stream.to_string(),
                timestamp,
                payload,
            })?;
            store.last_timestamp = timestamp;
            Ok(timestamp)
        })?;

        debug!(stream = %stream, timestamp, "Recorded data point");
        Ok(timestamp)
    }

    /// Buffer several values for one stream in a single transaction.
    ///
    /// Every value is validated first; if any is rejected nothing is buffered.
    pub fn record_many(&self, stream: &str, values: &[Value]) -> LoggerResult<usize> {
        let count = self.with_store(|store| {
            let locked: &LocalStore = store;
            let payloads = values
                .iter()
                .map(|value| self.validated_payload(locked, stream, value))
                .collect::<LoggerResult<Vec<_>>>()?;
            if payloads.is_empty() {
                return Ok(0);
            }

            let now = self.shared.clock.now();
            let mut last = store.last_timestamp;
            let points: Vec<PendingPoint> = payloads
                .into_iter()
                .map(|payload| {
                    last = stamp_after(last, now);
                    PendingPoint {
                        stream: stream.to_string(),
                        timestamp: last,
                        payload,
                    }
                })
                .collect();
            let count = store.db.insert_pending_points(&points)?;
            store.last_timestamp = last;
            Ok(count)
        })?;

        debug!(stream = %stream, count, "Recorded data points");
        Ok(count)
    }

    fn validated_payload(&self, store: &LocalStore, stream: &str, value: &Value) -> LoggerResult<String> {
        let schema = store
            .registry
            .schema_of(stream)
            .ok_or_else(|| LoggerError::NotRegistered(stream.to_string()))?;

        if let Some(schema) = schema {
            self.shared
                .validator
                .validate(value, schema)
                .map_err(|message| LoggerError::Validation {
                    stream: stream.to_string(),
                    message,
                })?;
        }

        Ok(serde_json::to_string(value)?)
    }
}
