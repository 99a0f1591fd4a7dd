//! JSON Schema validation for upstream payloads.
//!
//! Payloads are validated against `schema/trend_payload.schema.json`,
//! embedded at compile time.

use std::sync::OnceLock;
use thiserror::Error;

/// Embedded payload schema.
pub const PAYLOAD_SCHEMA_JSON: &str = include_str!("../../schema/trend_payload.schema.json");

static VALIDATOR: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

fn validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    VALIDATOR
        .get_or_init(|| {
            let schema = serde_json::from_str::<serde_json::Value>(PAYLOAD_SCHEMA_JSON)
                .map_err(|e| format!("invalid schema JSON: {}", e))?;
            jsonschema::options()
                .build(&schema)
                .map_err(|e| format!("schema does not compile: {}", e))
        })
        .as_ref()
        .map_err(|e| SchemaError::LoadError(e.clone()))
}

/// Validate a payload JSON value against the schema.
///
/// Returns every violation, each suffixed with the offending instance path.
pub fn validate_payload_schema(payload: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(payload)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// The schema as a JSON value, for display.
pub fn payload_schema() -> Result<serde_json::Value, SchemaError> {
    serde_json::from_str(PAYLOAD_SCHEMA_JSON).map_err(|e| SchemaError::LoadError(e.to_string()))
}
