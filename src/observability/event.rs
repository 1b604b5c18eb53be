//! Structured event model shared by the file and telemetry sinks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::Level;

/// Field names carrying an error/exception rather than a plain property.
pub const EXCEPTION_FIELDS: [&str; 2] = ["exception", "error"];

/// A log event as handed to a telemetry backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(serialize_with = "serialize_level")]
    pub level: Level,
    /// Constant message; the data it describes lives in `properties`.
    pub message_template: String,
    /// Module path of the call site.
    pub source_context: String,
    /// Enrichment, ambient span fields and call-site fields, merged.
    pub properties: Map<String, Value>,
    pub exception: Option<String>,
}

fn serialize_level<S: serde::Serializer>(level: &Level, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(level.as_str())
}

/// Collects the fields of an event or span into JSON values.
#[derive(Debug, Default)]
pub struct FieldCollector {
    pub message: Option<String>,
    pub fields: Map<String, Value>,
}

impl FieldCollector {
    fn put(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }

    /// Remove and return the first exception-like field.
    pub fn take_exception(&mut self) -> Option<String> {
        EXCEPTION_FIELDS
            .iter()
            .find_map(|name| self.fields.remove(*name))
            .map(|v| value_to_string(&v))
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::Bool(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }
}

/// Plain-text form of a property value (strings unquoted).
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
