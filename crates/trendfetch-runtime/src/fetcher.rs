//! The resilient fetcher: bounded retry with backoff over one transport.
//!
//! Per call:
//! - Transient transport errors are retried until the attempt budget runs out
//! - Fatal transport errors end the call on the attempt that produced them
//! - Empty payloads end the call as `EmptyResult`, never retried
//! - Malformed payloads end the call as `ValidationFailed`, never retried
//!
//! The backoff sleep is the only suspension point besides the transport
//! call itself. Dropping the returned future cancels the fetch there.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use trendfetch_core::{outcome_from_payload, FailureKind, FetchOutcome};

use crate::observer::{FetchObserver, TracingObserver};
use crate::resilience::BackoffPolicy;
use crate::transport::Transport;

/// Attempts per fetch unless the caller says otherwise.
pub const DEFAULT_ATTEMPT_BUDGET: u32 = 3;

/// Errors that prevent a fetch from producing an outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("Fetcher not configured: {0}")]
    NotConfigured(String),
}

/// One fetch to perform. Built per call and discarded afterwards.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// What to fetch (e.g., a topic); must not be blank
    pub key: String,

    /// Maximum transport calls; must be at least 1
    pub attempt_budget: u32,

    /// Delay schedule between attempts
    pub backoff: BackoffPolicy,
}

impl FetchRequest {
    /// Request with the default budget and exponential backoff.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            attempt_budget: DEFAULT_ATTEMPT_BUDGET,
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn with_attempt_budget(mut self, attempt_budget: u32) -> Self {
        self.attempt_budget = attempt_budget;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Reject caller misuse before any attempt is made.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.key.trim().is_empty() {
            return Err(FetchError::InvalidArgument("key must not be empty".to_string()));
        }
        if self.attempt_budget == 0 {
            return Err(FetchError::InvalidArgument(
                "attempt budget must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fetches keys from a transport with bounded retry and backoff.
///
/// Holds no per-fetch state: one fetcher may serve any number of
/// concurrent fetches for independent keys.
pub struct ResilientFetcher {
    transport: Arc<dyn Transport>,
    observer: Arc<dyn FetchObserver>,
}

impl ResilientFetcher {
    /// Create a fetcher that reports through a default [`TracingObserver`].
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_observer(transport, Arc::new(TracingObserver::default()))
    }

    pub fn with_observer(transport: Arc<dyn Transport>, observer: Arc<dyn FetchObserver>) -> Self {
        Self {
            transport,
            observer,
        }
    }

    pub fn builder() -> ResilientFetcherBuilder {
        ResilientFetcherBuilder::new()
    }

    /// Name of the underlying transport.
    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    /// Fetch one key, producing exactly one outcome.
    ///
    /// # Execution Flow
    /// 1. Validate the request (`InvalidArgument` on misuse)
    /// 2. Call the transport
    /// 3. On a transient error: give up if the budget is spent, else sleep and retry
    /// 4. On a fatal error: `Failure { TransportFatal }`
    /// 5. On a payload: classify as `EmptyResult`, `Success` or `Failure { ValidationFailed }`
    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError> {
        request.validate()?;

        let key = request.key.as_str();
        let mut attempt: u32 = 0;

        let outcome = loop {
            self.observer.on_attempt(key, attempt);

            match self.transport.fetch(key).await {
                Ok(raw) => break outcome_from_payload(&raw, attempt + 1),
                Err(err) if err.is_retryable() => {
                    if attempt + 1 >= request.attempt_budget {
                        break FetchOutcome::failure(
                            FailureKind::TransientExhausted,
                            request.attempt_budget,
                            err.message(),
                        );
                    }

                    let delay = request.backoff.delay(attempt);
                    self.observer.on_transient(key, attempt, &err, delay);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(err) => {
                    break FetchOutcome::failure(
                        FailureKind::TransportFatal,
                        attempt + 1,
                        err.message(),
                    )
                }
            }
        };

        self.observer.on_outcome(key, &outcome);
        Ok(outcome)
    }

    /// Fetch one key under a deadline.
    ///
    /// Exceeding the deadline cancels the fetch wherever it is suspended and
    /// yields `DeadlineExceeded`, never an outcome.
    pub async fn fetch_within(
        &self,
        request: &FetchRequest,
        deadline: Duration,
    ) -> Result<FetchOutcome, FetchError> {
        match tokio::time::timeout(deadline, self.fetch(request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(key = %request.key, deadline = ?deadline, "Fetch exceeded deadline");
                Err(FetchError::DeadlineExceeded(deadline))
            }
        }
    }
}

impl std::fmt::Debug for ResilientFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientFetcher")
            .field("transport", &self.transport.name())
            .finish()
    }
}

/// Builder for ResilientFetcher.
pub struct ResilientFetcherBuilder {
    transport: Option<Arc<dyn Transport>>,
    observer: Option<Arc<dyn FetchObserver>>,
}

impl ResilientFetcherBuilder {
    pub fn new() -> Self {
        Self {
            transport: None,
            observer: None,
        }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn FetchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> Result<ResilientFetcher, FetchError> {
        let transport = self
            .transport
            .ok_or_else(|| FetchError::NotConfigured("No transport set".to_string()))?;

        let observer = self
            .observer
            .unwrap_or_else(|| Arc::new(TracingObserver::default()));

        Ok(ResilientFetcher::with_observer(transport, observer))
    }
}

impl Default for ResilientFetcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Value as JsonValue;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::transport::{Transport, TransportError};

    /// Plays back a fixed script of responses, then repeats the last one.
    pub struct ScriptedTransport {
        script: Mutex<VecDeque<Result<JsonValue, TransportError>>>,
        last: Mutex<Option<Result<JsonValue, TransportError>>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        pub fn new(script: Vec<Result<JsonValue, TransportError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                calls: AtomicU32::new(0),
            }
        }

        pub fn always(response: Result<JsonValue, TransportError>) -> Self {
            Self::new(vec![response])
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn fetch(&self, _key: &str) -> Result<JsonValue, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().pop_front();
            match next {
                Some(response) => {
                    *self.last.lock() = Some(response.clone());
                    response
                }
                None => self
                    .last
                    .lock()
                    .clone()
                    .unwrap_or_else(|| Ok(JsonValue::Array(Vec::new()))),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedTransport;
    use super::*;
    use crate::observer::testing::RecordingObserver;
    use crate::transport::TransportError;
    use proptest::prelude::*;
    use serde_json::json;
    use trendfetch_core::DataPoint;

    fn transient(msg: &str) -> Result<serde_json::Value, TransportError> {
        Err(TransportError::Transient(msg.to_string()))
    }

    fn fetcher(transport: Arc<ScriptedTransport>) -> ResilientFetcher {
        ResilientFetcher::with_observer(transport, Arc::new(crate::observer::NoopObserver))
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_two_transient_failures() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            transient("timeout"),
            transient("rate limited"),
            Ok(json!([{"date": "2024-01-01", "value": 10}])),
        ]));
        let fetcher = fetcher(transport.clone());
        let request = FetchRequest::new("Machine Learning").with_attempt_budget(3);

        let start = tokio::time::Instant::now();
        let outcome = fetcher.fetch(&request).await.unwrap();

        assert_eq!(
            outcome,
            FetchOutcome::Success {
                payload: vec![DataPoint::new("2024-01-01", 10)],
                attempts_used: 3,
            }
        );
        assert_eq!(transport.calls(), 3);

        // Slept 1s then 2s under the default policy.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::always(Err(TransportError::Fatal(
            "bad auth".to_string(),
        ))));
        let fetcher = fetcher(transport.clone());
        let request = FetchRequest::new("AI").with_attempt_budget(3);

        let outcome = fetcher.fetch(&request).await.unwrap();

        assert_eq!(
            outcome,
            FetchOutcome::failure(FailureKind::TransportFatal, 1, "bad auth")
        );
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_budget_exhausts_immediately() {
        let transport = Arc::new(ScriptedTransport::always(transient("timeout")));
        let fetcher = fetcher(transport.clone());
        let request = FetchRequest::new("AI").with_attempt_budget(1);

        let start = tokio::time::Instant::now();
        let outcome = fetcher.fetch(&request).await.unwrap();

        assert_eq!(
            outcome,
            FetchOutcome::failure(FailureKind::TransientExhausted, 1, "timeout")
        );
        assert_eq!(transport.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_transient_exhausts_budget() {
        let transport = Arc::new(ScriptedTransport::always(transient("503")));
        let fetcher = fetcher(transport.clone());
        let request = FetchRequest::new("AI").with_attempt_budget(4);

        let outcome = fetcher.fetch(&request).await.unwrap();

        assert_eq!(outcome.failure_kind(), Some(FailureKind::TransientExhausted));
        assert_eq!(outcome.attempts_used(), 4);
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_payload_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::always(Ok(json!([]))));
        let fetcher = fetcher(transport.clone());
        let request = FetchRequest::new("Obscure Topic").with_attempt_budget(5);

        let outcome = fetcher.fetch(&request).await.unwrap();

        assert_eq!(outcome, FetchOutcome::EmptyResult { attempts_used: 1 });
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_payload_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            transient("timeout"),
            Ok(json!([{"date": "2024-01-01", "Machine Learning": 10, "isPartial": false}])),
            Ok(json!([{"date": "2024-01-01", "value": 10}])),
        ]));
        let fetcher = fetcher(transport.clone());
        let request = FetchRequest::new("Machine Learning").with_attempt_budget(3);

        let outcome = fetcher.fetch(&request).await.unwrap();

        assert_eq!(outcome.failure_kind(), Some(FailureKind::ValidationFailed));
        assert_eq!(outcome.attempts_used(), 2);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_zero_budget_is_invalid_argument() {
        let transport = Arc::new(ScriptedTransport::always(Ok(json!([]))));
        let fetcher = fetcher(transport.clone());
        let request = FetchRequest::new("AI").with_attempt_budget(0);

        let result = fetcher.fetch(&request).await;

        assert!(matches!(result, Err(FetchError::InvalidArgument(_))));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_blank_key_is_invalid_argument() {
        let transport = Arc::new(ScriptedTransport::always(Ok(json!([]))));
        let fetcher = fetcher(transport.clone());

        let result = fetcher.fetch(&FetchRequest::new("   ")).await;

        assert!(matches!(result, Err(FetchError::InvalidArgument(_))));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_is_idempotent_for_deterministic_transport() {
        let transport = Arc::new(ScriptedTransport::always(Ok(json!([
            {"date": "2024-01-01", "value": 10},
            {"date": "2024-01-02", "value": 12}
        ]))));
        let fetcher = fetcher(transport);
        let request = FetchRequest::new("AI");

        let first = fetcher.fetch(&request).await.unwrap();
        let second = fetcher.fetch(&request).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_during_backoff() {
        let transport = Arc::new(ScriptedTransport::always(transient("timeout")));
        let fetcher = fetcher(transport.clone());
        let request = FetchRequest::new("AI")
            .with_attempt_budget(3)
            .with_backoff(BackoffPolicy::Constant(Duration::from_secs(10)));

        let result = fetcher
            .fetch_within(&request, Duration::from_secs(5))
            .await;

        assert_eq!(
            result,
            Err(FetchError::DeadlineExceeded(Duration::from_secs(5)))
        );
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_does_not_block_other_keys() {
        let slow = Arc::new(ScriptedTransport::always(transient("timeout")));
        let fast = Arc::new(ScriptedTransport::always(Ok(json!([{"date": "d", "value": 1}]))));
        let slow_fetcher = fetcher(slow);
        let fast_fetcher = fetcher(fast);

        let slow_request = FetchRequest::new("slow")
            .with_backoff(BackoffPolicy::Constant(Duration::from_secs(30)));
        let fast_request = FetchRequest::new("fast");

        let start = tokio::time::Instant::now();
        let (slow_outcome, (fast_outcome, fast_elapsed)) = tokio::join!(
            slow_fetcher.fetch(&slow_request),
            async {
                let outcome = fast_fetcher.fetch(&fast_request).await;
                (outcome, start.elapsed())
            }
        );

        assert!(fast_elapsed < Duration::from_secs(1));
        assert!(matches!(fast_outcome, Ok(FetchOutcome::Success { .. })));
        assert_eq!(
            slow_outcome.unwrap().failure_kind(),
            Some(FailureKind::TransientExhausted)
        );
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_attempts_and_outcome() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            transient("timeout"),
            Ok(json!([])),
        ]));
        let observer = Arc::new(RecordingObserver::default());
        let fetcher = ResilientFetcher::builder()
            .transport(transport)
            .observer(observer.clone())
            .build()
            .unwrap();

        fetcher.fetch(&FetchRequest::new("AI")).await.unwrap();

        assert_eq!(
            *observer.events.lock(),
            vec![
                "attempt AI 0".to_string(),
                "transient AI 0 1000ms".to_string(),
                "attempt AI 1".to_string(),
                "outcome AI empty".to_string(),
            ]
        );
    }

    #[test]
    fn test_builder_requires_transport() {
        let result = ResilientFetcher::builder().build();
        assert!(matches!(result, Err(FetchError::NotConfigured(_))));
    }

    proptest! {
        #[test]
        fn prop_transport_called_at_most_budget_times(budget in 1u32..8, failures in 0u32..12) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            let mut script: Vec<_> = (0..failures).map(|_| transient("flaky")).collect();
            script.push(Ok(json!([{"date": "2024-01-01", "value": 1}])));
            let transport = Arc::new(ScriptedTransport::new(script));
            let fetcher = fetcher(transport.clone());
            let request = FetchRequest::new("AI")
                .with_attempt_budget(budget)
                .with_backoff(BackoffPolicy::Immediate);

            let outcome = runtime.block_on(fetcher.fetch(&request)).unwrap();

            prop_assert!(transport.calls() <= budget);
            if failures < budget {
                prop_assert_eq!(outcome.attempts_used(), failures + 1);
                prop_assert!(matches!(outcome, FetchOutcome::Success { .. }), "expected success");
            } else {
                prop_assert_eq!(outcome.failure_kind(), Some(FailureKind::TransientExhausted));
                prop_assert_eq!(outcome.attempts_used(), budget);
            }
        }
    }
}
