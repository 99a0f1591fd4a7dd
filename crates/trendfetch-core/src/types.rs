//! Core types shared by every trendfetch crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single validated observation from the upstream.
///
/// `date` is an opaque label; it is never parsed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(deny_unknown_fields)]
pub struct DataPoint {
    /// Label of the observation (e.g., "2024-01-01")
    pub date: String,

    /// Observed value
    pub value: u64,
}

impl DataPoint {
    /// Create a data point.
    pub fn new(date: impl Into<String>, value: u64) -> Self {
        Self {
            date: date.into(),
            value,
        }
    }
}

/// Why a fetch ended without a usable result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Every attempt failed transiently and the budget ran out
    TransientExhausted,

    /// The transport reported a failure that will recur on retry
    TransportFatal,

    /// The upstream answered with a payload of the wrong shape
    ValidationFailed,

    /// The result could not be durably recorded
    PersistenceFailed,
}

impl FailureKind {
    /// Stable snake_case label, used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::TransientExhausted => "transient_exhausted",
            FailureKind::TransportFatal => "transport_fatal",
            FailureKind::ValidationFailed => "validation_failed",
            FailureKind::PersistenceFailed => "persistence_failed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single terminal result of one fetch call.
///
/// Carries no wall-clock data, so two outcomes produced from the same
/// deterministic upstream compare equal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// Upstream returned a non-empty, schema-valid payload
    Success {
        payload: Vec<DataPoint>,
        attempts_used: u32,
    },

    /// Upstream answered but had nothing for the key
    EmptyResult { attempts_used: u32 },

    /// Terminal failure
    Failure {
        kind: FailureKind,
        attempts_used: u32,
        last_error: String,
    },
}

impl FetchOutcome {
    /// Build a failure outcome.
    pub fn failure(kind: FailureKind, attempts_used: u32, last_error: impl Into<String>) -> Self {
        FetchOutcome::Failure {
            kind,
            attempts_used,
            last_error: last_error.into(),
        }
    }

    /// Number of transport attempts that produced this outcome.
    pub fn attempts_used(&self) -> u32 {
        match self {
            FetchOutcome::Success { attempts_used, .. }
            | FetchOutcome::EmptyResult { attempts_used }
            | FetchOutcome::Failure { attempts_used, .. } => *attempts_used,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, FetchOutcome::Failure { .. })
    }

    /// Whether this outcome may be handed to a persister.
    pub fn is_persistable(&self) -> bool {
        !self.is_failure()
    }

    /// Failure kind, if this is a failure.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            FetchOutcome::Failure { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Data points carried by the outcome (empty for non-success).
    pub fn payload(&self) -> &[DataPoint] {
        match self {
            FetchOutcome::Success { payload, .. } => payload,
            _ => &[],
        }
    }

    /// Short label for reports.
    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::Success { .. } => "success",
            FetchOutcome::EmptyResult { .. } => "empty",
            FetchOutcome::Failure { kind, .. } => kind.as_str(),
        }
    }
}
