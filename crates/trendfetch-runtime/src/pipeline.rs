//! Runs a batch of keys through the fetcher and persister.
//!
//! ## Execution Flow
//!
//! ```text
//! keys ─► [fetch, at most `concurrency` in flight] ─► persist ─► RunReport
//! ```
//!
//! Each key is independent: a failure, rejection or timeout for one key is
//! recorded in its own [`KeyReport`] and never cancels its siblings.
//! Reports come back in input order regardless of completion order.
//!
//! Keys are fetched only once per record file: a key whose file name is
//! already taken by an earlier key in the batch (`"AI"` and `"AI!"`) is
//! rejected before any fetch starts.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use trendfetch_core::{record_file_name, FailureKind, FetchOutcome, KeyReport, RunReport};

use crate::fetcher::{FetchError, FetchRequest, ResilientFetcher, DEFAULT_ATTEMPT_BUDGET};
use crate::persist::ResultPersister;
use crate::resilience::BackoffPolicy;

/// Concurrent fetches unless configured otherwise.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Per-run settings applied to every key.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub attempt_budget: u32,
    pub backoff: BackoffPolicy,

    /// Maximum fetches in flight
    pub concurrency: usize,

    /// Per-key deadline; `None` waits as long as retries take
    pub deadline: Option<Duration>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            attempt_budget: DEFAULT_ATTEMPT_BUDGET,
            backoff: BackoffPolicy::default(),
            concurrency: DEFAULT_CONCURRENCY,
            deadline: None,
        }
    }
}

/// Fetches and persists a batch of keys.
pub struct FetchPipeline {
    fetcher: Arc<ResilientFetcher>,
    persister: Arc<dyn ResultPersister>,
    settings: PipelineSettings,
}

impl FetchPipeline {
    pub fn new(
        fetcher: Arc<ResilientFetcher>,
        persister: Arc<dyn ResultPersister>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            fetcher,
            persister,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run every key to completion and report per key, in input order.
    pub async fn run(&self, keys: &[String]) -> RunReport {
        let started_at = Utc::now();
        let concurrency = self.settings.concurrency.max(1);

        tracing::info!(
            keys = keys.len(),
            concurrency,
            transport = self.fetcher.transport_name(),
            persister = self.persister.name(),
            "Starting run"
        );

        let (work, mut indexed) = claim_file_names(keys);

        // Unordered so a key sleeping in backoff holds only its own slot.
        let finished: Vec<(usize, KeyReport)> = stream::iter(work)
            .map(|(index, key)| async move { (index, self.run_key(key).await) })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        indexed.extend(finished);
        indexed.sort_by_key(|(index, _)| *index);
        let reports: Vec<KeyReport> = indexed.into_iter().map(|(_, report)| report).collect();

        let report = RunReport::new(reports, started_at, Utc::now());
        tracing::info!(status = ?report.status(), summary = %report.summary(), "Run finished");
        report
    }

    /// Fetch one key and persist what is persistable.
    async fn run_key(&self, key: String) -> KeyReport {
        let request = FetchRequest::new(key.clone())
            .with_attempt_budget(self.settings.attempt_budget)
            .with_backoff(self.settings.backoff.clone());

        let result = match self.settings.deadline {
            Some(deadline) => self.fetcher.fetch_within(&request, deadline).await,
            None => self.fetcher.fetch(&request).await,
        };

        match result {
            Ok(outcome) if outcome.is_persistable() => {
                match self.persister.persist(&key, &outcome).await {
                    Ok(ack) => KeyReport::completed(key, outcome, Some(ack.location)),
                    Err(err) => {
                        tracing::error!(key = %key, error = %err, "Failed to persist result");
                        let failure = FetchOutcome::failure(
                            FailureKind::PersistenceFailed,
                            outcome.attempts_used(),
                            err.to_string(),
                        );
                        KeyReport::completed(key, failure, None)
                    }
                }
            }
            Ok(outcome) => KeyReport::completed(key, outcome, None),
            Err(err @ FetchError::DeadlineExceeded(_)) => KeyReport::cancelled(key, err.to_string()),
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "Rejected fetch request");
                KeyReport::rejected(key, err.to_string())
            }
        }
    }
}

/// Split keys into those to fetch and those rejected up front because their
/// record file name is already claimed by an earlier key.
fn claim_file_names(keys: &[String]) -> (Vec<(usize, String)>, Vec<(usize, KeyReport)>) {
    let mut claimed: HashMap<String, &str> = HashMap::new();
    let mut work = Vec::with_capacity(keys.len());
    let mut rejected = Vec::new();

    for (index, key) in keys.iter().enumerate() {
        let Some(file_name) = record_file_name(key) else {
            work.push((index, key.clone()));
            continue;
        };

        match claimed.get(&file_name) {
            Some(first) => {
                tracing::warn!(key = %key, first = %first, file = %file_name, "Duplicate record file name");
                rejected.push((
                    index,
                    KeyReport::rejected(
                        key.clone(),
                        format!("record file '{}' is already written by key '{}'", file_name, first),
                    ),
                ));
            }
            None => {
                claimed.insert(file_name, key);
                work.push((index, key.clone()));
            }
        }
    }

    (work, rejected)
}

impl std::fmt::Debug for FetchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchPipeline")
            .field("fetcher", &self.fetcher)
            .field("persister", &self.persister.name())
            .field("settings", &self.settings)
            .finish()
    }
}
