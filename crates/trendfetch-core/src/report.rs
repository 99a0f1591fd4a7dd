//! Run report: aggregates per-key results into a final run state.
//!
//! The policy is fixed:
//! 1. If ANY key failed, was rejected, or was cancelled → the run FAILED
//! 2. Otherwise → the run is COMPLETE (empty results count as complete)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::FetchOutcome;

/// How one key ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum KeyStatus {
    /// The fetch ran to a terminal outcome
    Completed { outcome: FetchOutcome },

    /// The request was refused before any attempt (caller misuse)
    Rejected { reason: String },

    /// The fetch was cancelled or exceeded its deadline
    Cancelled { reason: String },
}

/// Result for one key of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyReport {
    pub key: String,

    #[serde(flatten)]
    pub status: KeyStatus,

    /// Where the record was written, if it was
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl KeyReport {
    pub fn completed(key: impl Into<String>, outcome: FetchOutcome, location: Option<String>) -> Self {
        Self {
            key: key.into(),
            status: KeyStatus::Completed { outcome },
            location,
        }
    }

    pub fn rejected(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: KeyStatus::Rejected {
                reason: reason.into(),
            },
            location: None,
        }
    }

    pub fn cancelled(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: KeyStatus::Cancelled {
                reason: reason.into(),
            },
            location: None,
        }
    }

    /// Whether this key makes the run fail.
    pub fn is_failure(&self) -> bool {
        match &self.status {
            KeyStatus::Completed { outcome } => outcome.is_failure(),
            KeyStatus::Rejected { .. } | KeyStatus::Cancelled { .. } => true,
        }
    }

    /// The outcome, if the fetch completed.
    pub fn outcome(&self) -> Option<&FetchOutcome> {
        match &self.status {
            KeyStatus::Completed { outcome } => Some(outcome),
            _ => None,
        }
    }

    /// One-line human-readable description.
    pub fn describe(&self) -> String {
        match &self.status {
            KeyStatus::Completed { outcome } => match outcome {
                FetchOutcome::Success {
                    payload,
                    attempts_used,
                } => format!(
                    "{}: {} data points after {} attempt(s)",
                    self.key,
                    payload.len(),
                    attempts_used
                ),
                FetchOutcome::EmptyResult { attempts_used } => format!(
                    "{}: no data after {} attempt(s)",
                    self.key, attempts_used
                ),
                FetchOutcome::Failure {
                    kind,
                    attempts_used,
                    last_error,
                } => format!(
                    "{}: {} after {} attempt(s): {}",
                    self.key, kind, attempts_used, last_error
                ),
            },
            KeyStatus::Rejected { reason } => format!("{}: rejected: {}", self.key, reason),
            KeyStatus::Cancelled { reason } => format!("{}: cancelled: {}", self.key, reason),
        }
    }
}

/// Final state of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Complete,
    Failed,
}

/// Counters over a run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunCounts {
    pub success: usize,
    pub empty: usize,
    pub failed: usize,
    pub rejected: usize,
    pub cancelled: usize,
}

/// Aggregated result of fetching many keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Per-key results in input order
    pub keys: Vec<KeyReport>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Build a report from per-key results.
    pub fn new(keys: Vec<KeyReport>, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        Self {
            keys,
            started_at,
            finished_at,
        }
    }

    /// Final run state under the fixed policy.
    pub fn status(&self) -> RunStatus {
        if self.keys.iter().any(KeyReport::is_failure) {
            RunStatus::Failed
        } else {
            RunStatus::Complete
        }
    }

    pub fn counts(&self) -> RunCounts {
        let mut counts = RunCounts::default();
        for key in &self.keys {
            match &key.status {
                KeyStatus::Completed { outcome } => match outcome {
                    FetchOutcome::Success { .. } => counts.success += 1,
                    FetchOutcome::EmptyResult { .. } => counts.empty += 1,
                    FetchOutcome::Failure { .. } => counts.failed += 1,
                },
                KeyStatus::Rejected { .. } => counts.rejected += 1,
                KeyStatus::Cancelled { .. } => counts.cancelled += 1,
            }
        }
        counts
    }

    /// Process exit code: 0 when complete, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self.status() {
            RunStatus::Complete => 0,
            RunStatus::Failed => 1,
        }
    }

    /// Keys that made the run fail.
    pub fn failures(&self) -> impl Iterator<Item = &KeyReport> {
        self.keys.iter().filter(|k| k.is_failure())
    }

    /// One-line summary of the run.
    pub fn summary(&self) -> String {
        let counts = self.counts();
        format!(
            "{} keys: {} success, {} empty, {} failed, {} rejected, {} cancelled",
            self.keys.len(),
            counts.success,
            counts.empty,
            counts.failed,
            counts.rejected,
            counts.cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataPoint, FailureKind};

    fn report(keys: Vec<KeyReport>) -> RunReport {
        let now = Utc::now();
        RunReport::new(keys, now, now)
    }

    fn success(key: &str) -> KeyReport {
        KeyReport::completed(
            key,
            FetchOutcome::Success {
                payload: vec![DataPoint::new("2024-01-01", 1)],
                attempts_used: 1,
            },
            Some(format!("{}_trends.json", key)),
        )
    }

    #[test]
    fn test_all_success_is_complete() {
        let report = report(vec![success("a"), success("b")]);
        assert_eq!(report.status(), RunStatus::Complete);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_empty_result_is_complete() {
        let report = report(vec![
            success("a"),
            KeyReport::completed("b", FetchOutcome::EmptyResult { attempts_used: 1 }, None),
        ]);
        assert_eq!(report.status(), RunStatus::Complete);
        assert_eq!(report.counts().empty, 1);
    }

    #[test]
    fn test_any_failure_fails_run() {
        let report = report(vec![
            success("a"),
            KeyReport::completed(
                "b",
                FetchOutcome::failure(FailureKind::TransientExhausted, 3, "timeout"),
                None,
            ),
        ]);
        assert_eq!(report.status(), RunStatus::Failed);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn test_cancelled_and_rejected_fail_run() {
        let cancelled = report(vec![success("a"), KeyReport::cancelled("b", "deadline")]);
        assert_eq!(cancelled.status(), RunStatus::Failed);

        let rejected = report(vec![KeyReport::rejected("", "empty key")]);
        assert_eq!(rejected.status(), RunStatus::Failed);
    }

    #[test]
    fn test_summary_counts() {
        let report = report(vec![
            success("a"),
            KeyReport::completed(
                "b",
                FetchOutcome::failure(FailureKind::ValidationFailed, 1, "shape"),
                None,
            ),
            KeyReport::cancelled("c", "deadline"),
        ]);
        assert_eq!(
            report.summary(),
            "3 keys: 1 success, 0 empty, 1 failed, 0 rejected, 1 cancelled"
        );
    }

    #[test]
    fn test_describe_failure() {
        let key = KeyReport::completed(
            "AI",
            FetchOutcome::failure(FailureKind::TransportFatal, 1, "bad auth"),
            None,
        );
        assert_eq!(key.describe(), "AI: transport_fatal after 1 attempt(s): bad auth");
    }

    #[test]
    fn test_key_report_serializes_flat() {
        let json = serde_json::to_value(success("a")).unwrap();
        assert_eq!(json["key"], "a");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["outcome"]["outcome"], "success");
    }
}
