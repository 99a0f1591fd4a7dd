//! Observation hooks for fetches.
//!
//! The fetcher reports what it does through a [`FetchObserver`] handed to
//! it at construction. It never installs or touches a global subscriber.

use std::time::Duration;

use trendfetch_core::FetchOutcome;

use crate::transport::TransportError;

/// Receives events from a [`ResilientFetcher`](crate::ResilientFetcher).
///
/// All methods default to doing nothing. Implementations are shared by
/// concurrent fetches and must not assume calls for one key arrive
/// contiguously.
pub trait FetchObserver: Send + Sync {
    /// An attempt (0-based) is about to call the transport.
    fn on_attempt(&self, _key: &str, _attempt: u32) {}

    /// An attempt failed transiently; `delay` will be slept before retrying.
    fn on_transient(&self, _key: &str, _attempt: u32, _error: &TransportError, _delay: Duration) {}

    /// The fetch reached its terminal outcome.
    fn on_outcome(&self, _key: &str, _outcome: &FetchOutcome) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl FetchObserver for NoopObserver {}

/// Emits `tracing` events as children of a caller-supplied span.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    span: tracing::Span,
}

impl TracingObserver {
    /// Parent all events under `span`.
    pub fn new(span: tracing::Span) -> Self {
        Self { span }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new(tracing::info_span!("trendfetch"))
    }
}

impl FetchObserver for TracingObserver {
    fn on_attempt(&self, key: &str, attempt: u32) {
        tracing::debug!(parent: &self.span, key, attempt = attempt + 1, "Fetching");
    }

    fn on_transient(&self, key: &str, attempt: u32, error: &TransportError, delay: Duration) {
        tracing::warn!(
            parent: &self.span,
            key,
            attempt = attempt + 1,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "Transient failure, backing off"
        );
    }

    fn on_outcome(&self, key: &str, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Success {
                payload,
                attempts_used,
            } => tracing::info!(
                parent: &self.span,
                key,
                points = payload.len(),
                attempts = attempts_used,
                "Fetched"
            ),
            FetchOutcome::EmptyResult { attempts_used } => tracing::warn!(
                parent: &self.span,
                key,
                attempts = attempts_used,
                "No data retrieved"
            ),
            FetchOutcome::Failure {
                kind,
                attempts_used,
                last_error,
            } => tracing::error!(
                parent: &self.span,
                key,
                kind = %kind,
                attempts = attempts_used,
                error = %last_error,
                "Fetch failed"
            ),
        }
    }
}
