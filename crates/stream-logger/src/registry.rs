//! Streams the logger is responsible for.

use crate::{LoggerError, LoggerResult, SchemaValidator};
use logger_database::{Database, RegisteredStream};
use remote_endpoint::RemoteEndpoint;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// In-memory mirror of the `streams` table, in registration order.
#[derive(Debug, Default)]
pub(crate) struct StreamRegistry {
    streams: Vec<RegisteredStream>,
    index: HashMap<String, usize>,
}

impl StreamRegistry {
    pub(crate) fn load(db: &Database) -> LoggerResult<Self> {
        let mut registry = Self::default();
        for stream in db.list_streams()? {
            registry.mirror(stream);
        }
        Ok(registry)
    }

    /// Persist `stream`, then mirror it. Re-registering replaces the schema
    /// and keeps the stream's position.
    pub(crate) fn register(&mut self, db: &Database, stream: RegisteredStream) -> LoggerResult<()> {
        db.upsert_stream(&stream)?;
        self.mirror(stream);
        Ok(())
    }

    fn mirror(&mut self, stream: RegisteredStream) {
        match self.index.get(&stream.name) {
            Some(&position) => self.streams[position].schema = stream.schema,
            None => {
                self.index.insert(stream.name.clone(), self.streams.len());
                self.streams.push(stream);
            }
        }
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// `None` if the stream is unknown; `Some(None)` if it has no schema.
    pub(crate) fn schema_of(&self, name: &str) -> Option<Option<&Value>> {
        self.index
            .get(name)
            .map(|&position| self.streams[position].schema.as_ref())
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.streams.iter().map(|s| s.name.clone()).collect()
    }

    pub(crate) fn streams(&self) -> &[RegisteredStream] {
        &self.streams
    }
}

/// Decide which schema to mirror locally for a verified registration.
///
/// A stream that already exists remotely keeps its remote schema and the
/// caller's schema is ignored. A missing stream is created from the caller's
/// schema; with no schema there is nothing to create.
pub(crate) fn resolve_remote_schema(
    endpoint: &dyn RemoteEndpoint,
    validator: &dyn SchemaValidator,
    name: &str,
    schema: Option<Value>,
) -> LoggerResult<Option<Value>> {
    if endpoint.stream_exists(name)? {
        if schema.is_some() {
            debug!(stream = %name, "Stream exists remotely, using its schema");
        }
        return Ok(endpoint.fetch_schema(name)?);
    }

    let Some(schema) = schema else {
        return Err(LoggerError::NotFound(name.to_string()));
    };

    validator
        .check_schema(&schema)
        .map_err(|message| LoggerError::InvalidSchema {
            stream: name.to_string(),
            message,
        })?;
    endpoint.create_stream(name, &schema)?;
    debug!(stream = %name, "Created stream remotely");
    Ok(Some(schema))
}
