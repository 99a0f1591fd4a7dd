//! Upstream payload validation.
//!
//! Payloads are untrusted JSON. This module decides whether a payload is
//! empty, a valid series of data points, or malformed. It never retries
//! and never performs network I/O.

mod parser;
mod schema;

pub use parser::{
    classify_payload, classify_payload_file, classify_payload_str, json_type_name, PayloadError,
    PayloadShape,
};
pub use schema::{payload_schema, validate_payload_schema, SchemaError, PAYLOAD_SCHEMA_JSON};
