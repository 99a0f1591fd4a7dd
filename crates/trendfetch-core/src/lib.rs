//! # trendfetch-core
//!
//! Deterministic data model for trendfetch.
//!
//! This crate answers, without touching the network or the disk:
//! - Is this upstream payload empty, valid, or malformed?
//! - What does the persisted record of a fetch look like?
//! - Where does a key's record live?
//! - Did a run of many fetches succeed?
//!
//! ## Key Guarantees
//!
//! 1. **Typed payloads**: a `Success` only ever carries schema-valid `DataPoint`s
//! 2. **Empty is not invalid**: empty payloads and malformed payloads classify differently
//! 3. **No I/O in the hot path**: classification is pure; file helpers are opt-in
//!
//! ## Example
//!
//! ```rust
//! use trendfetch_core::{classify_payload, PayloadShape};
//!
//! let raw = serde_json::json!([{"date": "2024-01-01", "value": 10}]);
//! match classify_payload(&raw).unwrap() {
//!     PayloadShape::Points(points) => assert_eq!(points[0].value, 10),
//!     PayloadShape::Empty => unreachable!(),
//! }
//! ```

pub mod payload;
pub mod record;
pub mod report;
pub mod sanitize;
pub mod types;

// Re-export main types at crate root
pub use payload::{
    classify_payload, classify_payload_file, classify_payload_str, payload_schema,
    validate_payload_schema, PayloadError, PayloadShape,
};
pub use record::{RecordError, RecordStatus, TrendRecord};
pub use report::{KeyReport, KeyStatus, RunCounts, RunReport, RunStatus};
pub use sanitize::{record_file_name, sanitize_key, RECORD_FILE_SUFFIX};
pub use types::{DataPoint, FailureKind, FetchOutcome};

/// Turn a raw payload into the outcome a single successful transport call
/// would produce.
///
/// This is the post-transport half of a fetch: empty payloads become
/// `EmptyResult`, valid ones `Success`, and malformed ones
/// `Failure { kind: ValidationFailed }`.
pub fn outcome_from_payload(raw: &serde_json::Value, attempts_used: u32) -> FetchOutcome {
    match classify_payload(raw) {
        Ok(PayloadShape::Empty) => FetchOutcome::EmptyResult { attempts_used },
        Ok(PayloadShape::Points(payload)) => FetchOutcome::Success {
            payload,
            attempts_used,
        },
        Err(e) => {
            tracing::debug!(error = %e, "Payload rejected");
            FetchOutcome::failure(FailureKind::ValidationFailed, attempts_used, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_from_valid_payload() {
        let outcome = outcome_from_payload(&json!([{"date": "2024-01-01", "value": 10}]), 3);
        assert_eq!(
            outcome,
            FetchOutcome::Success {
                payload: vec![DataPoint::new("2024-01-01", 10)],
                attempts_used: 3,
            }
        );
    }

    #[test]
    fn test_outcome_from_empty_payload() {
        let outcome = outcome_from_payload(&json!([]), 2);
        assert_eq!(outcome, FetchOutcome::EmptyResult { attempts_used: 2 });
    }

    #[test]
    fn test_outcome_from_invalid_payload() {
        let outcome = outcome_from_payload(&json!([{"date": 1, "value": "x"}]), 1);
        assert_eq!(outcome.failure_kind(), Some(FailureKind::ValidationFailed));
        assert_eq!(outcome.attempts_used(), 1);
    }
}
