//! JSON schema validation for recorded values.
//!
//! Validation is purely local: schemas may only reference their own
//! definitions (`#/...`), and the `jsonschema` resolvers that fetch over
//! HTTP or read files are compiled out.

use jsonschema::{Draft, JSONSchema};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Compiled schemas kept before the cache is flushed.
const MAX_CACHED_SCHEMAS: usize = 64;

/// Checks values against stream schemas.
pub trait SchemaValidator: Send + Sync {
    /// Whether `schema` is itself a well-formed schema.
    fn check_schema(&self, schema: &Value) -> Result<(), String>;

    /// Whether `value` is accepted by `schema`.
    fn validate(&self, value: &Value, schema: &Value) -> Result<(), String>;
}

/// JSON Schema draft 4 validator, the dialect the remote service speaks.
///
/// Compiled schemas are cached by their serialized form, so recording into
/// a stream compiles its schema once.
#[derive(Default)]
pub struct JsonSchemaValidator {
    compiled: Mutex<HashMap<String, Arc<JSONSchema>>>,
}

impl fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchemaValidator")
            .field("cached", &self.compiled.lock().len())
            .finish()
    }
}

impl JsonSchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn compile(&self, schema: &Value) -> Result<Arc<JSONSchema>, String> {
        let key = serde_json::to_string(schema).map_err(|e| e.to_string())?;
        if let Some(compiled) = self.compiled.lock().get(&key) {
            return Ok(Arc::clone(compiled));
        }

        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft4)
            .compile(schema)
            .map(Arc::new)
            .map_err(|e| e.to_string())?;

        let mut cache = self.compiled.lock();
        if cache.len() >= MAX_CACHED_SCHEMAS {
            cache.clear();
        }
        cache.insert(key, Arc::clone(&compiled));
        Ok(compiled)
    }
}

/// First `$ref` in `schema` that points outside the document itself.
fn external_reference(schema: &Value) -> Option<&str> {
    match schema {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                if !reference.starts_with('#') {
                    return Some(reference);
                }
            }
            map.values().find_map(external_reference)
        }
        Value::Array(items) => items.iter().find_map(external_reference),
        _ => None,
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn check_schema(&self, schema: &Value) -> Result<(), String> {
        if !schema.is_object() {
            return Err("schema must be a JSON object".to_string());
        }
        if let Some(reference) = external_reference(schema) {
            return Err(format!("schema reference `{reference}` cannot be resolved locally"));
        }
        self.compile(schema).map(|_| ())
    }

    fn validate(&self, value: &Value, schema: &Value) -> Result<(), String> {
        let compiled = self.compile(schema)?;
        let result = compiled.validate(value);
        result.map_err(|errors| {
            errors
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        })
    }
}
