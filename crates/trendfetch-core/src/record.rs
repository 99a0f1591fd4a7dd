//! The persisted form of a fetch result.
//!
//! One JSON file per key:
//!
//! ```json
//! {
//!   "topic": "Machine Learning",
//!   "trends": [{"date": "2024-01-01", "value": 10}],
//!   "status": "success",
//!   "attempts_used": 1,
//!   "fetched_at": "2024-01-01T00:00:00Z"
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::types::{DataPoint, FetchOutcome};

/// Errors when building or reading records.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Outcome is not persistable: {0}")]
    NotPersistable(String),

    #[error("Failed to read record file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Whether the upstream had data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Success,
    Empty,
}

/// A durable record of one successful or empty fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendRecord {
    /// The key exactly as supplied by the caller
    pub topic: String,

    /// Validated data points, empty for an empty result
    pub trends: Vec<DataPoint>,

    pub status: RecordStatus,

    /// Transport attempts the fetch took
    pub attempts_used: u32,

    /// When the record was produced
    pub fetched_at: DateTime<Utc>,
}

impl TrendRecord {
    /// Build a record from an outcome, stamped with the current time.
    pub fn from_outcome(topic: impl Into<String>, outcome: &FetchOutcome) -> Result<Self, RecordError> {
        Self::from_outcome_at(topic, outcome, Utc::now())
    }

    /// Build a record from an outcome with an explicit timestamp.
    pub fn from_outcome_at(
        topic: impl Into<String>,
        outcome: &FetchOutcome,
        fetched_at: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        let (trends, status, attempts_used) = match outcome {
            FetchOutcome::Success {
                payload,
                attempts_used,
            } => (payload.clone(), RecordStatus::Success, *attempts_used),
            FetchOutcome::EmptyResult { attempts_used } => {
                (Vec::new(), RecordStatus::Empty, *attempts_used)
            }
            FetchOutcome::Failure { kind, .. } => {
                return Err(RecordError::NotPersistable(kind.to_string()));
            }
        };

        Ok(Self {
            topic: topic.into(),
            trends,
            status,
            attempts_used,
            fetched_at,
        })
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a record from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a record from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Recover the outcome this record was built from.
    pub fn to_outcome(&self) -> FetchOutcome {
        match self.status {
            RecordStatus::Success => FetchOutcome::Success {
                payload: self.trends.clone(),
                attempts_used: self.attempts_used,
            },
            RecordStatus::Empty => FetchOutcome::EmptyResult {
                attempts_used: self.attempts_used,
            },
        }
    }
}
