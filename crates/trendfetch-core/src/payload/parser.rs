//! Classification of raw upstream payloads.

use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::validate_payload_schema;
use crate::types::DataPoint;

/// Errors that make a payload unusable.
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("Payload is not an array (found {found})")]
    NotAnArray { found: &'static str },

    #[error("Payload failed schema validation: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("Payload element could not be decoded: {0}")]
    Malformed(String),

    #[error("Failed to read payload file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// What a raw payload turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadShape {
    /// Upstream had nothing (`null` or `[]`)
    Empty,

    /// Non-empty, schema-valid data points in upstream order
    Points(Vec<DataPoint>),
}

impl PayloadShape {
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadShape::Empty)
    }
}

/// Classify a raw payload as empty or a validated series.
///
/// Anything that is neither empty nor a schema-valid array of
/// `{date: string, value: integer >= 0}` objects is an error. An empty
/// object is not an empty payload.
pub fn classify_payload(raw: &Value) -> Result<PayloadShape, PayloadError> {
    let items = match raw {
        Value::Null => return Ok(PayloadShape::Empty),
        Value::Array(items) => items,
        other => {
            return Err(PayloadError::NotAnArray {
                found: json_type_name(other),
            })
        }
    };

    if items.is_empty() {
        return Ok(PayloadShape::Empty);
    }

    validate_payload_schema(raw).map_err(PayloadError::SchemaViolation)?;

    // The schema admits 10.0 as an integer; u64 decoding does not.
    let points = Vec::<DataPoint>::deserialize(raw)
        .map_err(|e| PayloadError::Malformed(e.to_string()))?;

    Ok(PayloadShape::Points(points))
}

/// Parse and classify a payload from a JSON string.
pub fn classify_payload_str(json: &str) -> Result<PayloadShape, PayloadError> {
    let raw: Value = serde_json::from_str(json)?;
    classify_payload(&raw)
}

/// Parse and classify a payload from a JSON file.
pub fn classify_payload_file(path: impl AsRef<Path>) -> Result<PayloadShape, PayloadError> {
    let contents = fs::read_to_string(path)?;
    classify_payload_str(&contents)
}

/// JSON type name used in error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
