//! Transport abstractions for trendfetch-runtime.
//!
//! A transport performs exactly one upstream call per `fetch` and reports
//! raw JSON or a classified error. Transports never retry: retry and
//! backoff belong to [`ResilientFetcher`](crate::ResilientFetcher).
//!
//! Credentials for authenticated upstreams live in [`secrets`].

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

mod factory;
mod fixture;
pub mod secrets;

#[cfg(feature = "http")]
mod http;

pub use factory::{TransportFactory, TransportRegistry};
pub use fixture::{FixtureFailure, FixtureFailureKind, FixtureSpec, FixtureTransport, FixtureTransportFactory};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "http")]
pub use http::{HttpTransport, HttpTransportFactory, HTTP_API_KEY_ENV};

/// Errors from a single transport call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Network error, timeout or rate limit; worth retrying
    #[error("Transient transport failure: {0}")]
    Transient(String),

    /// Malformed request, auth failure; will recur on retry
    #[error("Fatal transport failure: {0}")]
    Fatal(String),

    #[error("Transport not configured: {0}")]
    NotConfigured(String),
}

impl TransportError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Transient(_))
    }

    /// The message without the classification prefix.
    pub fn message(&self) -> &str {
        match self {
            TransportError::Transient(m)
            | TransportError::Fatal(m)
            | TransportError::NotConfigured(m) => m,
        }
    }
}

/// Transport abstraction allows swapping upstream backends.
///
/// Implementations must be safe to call concurrently from many fetches;
/// any pooling or rate limiting is theirs to synchronize.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the raw payload for `key`.
    async fn fetch(&self, key: &str) -> Result<JsonValue, TransportError>;

    /// Transport name for logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(TransportError::Transient("timeout".into()).is_retryable());
        assert!(!TransportError::Fatal("bad auth".into()).is_retryable());
        assert!(!TransportError::NotConfigured("no url".into()).is_retryable());
    }

    #[test]
    fn test_message_strips_prefix() {
        let err = TransportError::Fatal("bad auth".into());
        assert_eq!(err.message(), "bad auth");
        assert_eq!(err.to_string(), "Fatal transport failure: bad auth");
    }
}
