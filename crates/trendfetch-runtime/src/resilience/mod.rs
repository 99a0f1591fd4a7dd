//! Resilience patterns for trendfetch-runtime.
//!
//! Retry itself lives in [`ResilientFetcher`](crate::ResilientFetcher);
//! this module only provides the delay schedule between attempts.

mod backoff;

pub use backoff::{BackoffPolicy, DEFAULT_FACTOR, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_DELAY};
