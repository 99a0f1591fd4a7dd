//! Backoff policies: how long to wait before the next attempt.
//!
//! A policy maps a 0-based attempt index to a non-negative delay. The delay
//! for index `n` is slept after attempt `n` fails transiently and before
//! attempt `n + 1` starts.

use backon::{BackoffBuilder, ExponentialBuilder};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default first delay of the exponential policy.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Default growth factor of the exponential policy.
pub const DEFAULT_FACTOR: f32 = 2.0;

/// Default cap on a single exponential delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Delay schedule between retry attempts.
#[derive(Clone)]
pub enum BackoffPolicy {
    /// `initial * factor^attempt`, capped at `max_delay`, no jitter
    Exponential {
        initial: Duration,
        factor: f32,
        max_delay: Duration,
    },

    /// Same delay before every retry
    Constant(Duration),

    /// Retry without waiting
    Immediate,

    /// Caller-supplied schedule
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl BackoffPolicy {
    /// Exponential base-2 backoff in seconds: 1s, 2s, 4s, ... capped at 60s.
    pub fn exponential() -> Self {
        Self::Exponential {
            initial: DEFAULT_INITIAL_DELAY,
            factor: DEFAULT_FACTOR,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// Wrap an arbitrary schedule.
    pub fn custom(f: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    /// Delay to sleep after the failed attempt with index `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            BackoffPolicy::Exponential {
                initial,
                factor,
                max_delay,
            } => exponential_delay(*initial, *factor, *max_delay, attempt),
            BackoffPolicy::Constant(delay) => *delay,
            BackoffPolicy::Immediate => Duration::ZERO,
            BackoffPolicy::Custom(f) => f(attempt),
        }
    }

    /// Delays slept by a fetch that exhausts `attempt_budget` attempts.
    ///
    /// There is one delay fewer than attempts: nothing is slept after the last one.
    pub fn schedule(&self, attempt_budget: u32) -> Vec<Duration> {
        (0..attempt_budget.saturating_sub(1))
            .map(|attempt| self.delay(attempt))
            .collect()
    }

    /// Upper bound on time spent sleeping by one fetch.
    pub fn total_delay(&self, attempt_budget: u32) -> Duration {
        self.schedule(attempt_budget)
            .into_iter()
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}

impl fmt::Debug for BackoffPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffPolicy::Exponential {
                initial,
                factor,
                max_delay,
            } => f
                .debug_struct("Exponential")
                .field("initial", initial)
                .field("factor", factor)
                .field("max_delay", max_delay)
                .finish(),
            BackoffPolicy::Constant(delay) => f.debug_tuple("Constant").field(delay).finish(),
            BackoffPolicy::Immediate => f.write_str("Immediate"),
            BackoffPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn exponential_delay(initial: Duration, factor: f32, max_delay: Duration, attempt: u32) -> Duration {
    // A factor below 1 or a non-finite one would shrink or overflow the schedule.
    let factor = if factor.is_finite() && factor >= 1.0 {
        factor
    } else {
        1.0
    };
    let initial = initial.min(max_delay);

    let mut backoff = ExponentialBuilder::default()
        .with_min_delay(initial)
        .with_factor(factor)
        .with_max_delay(max_delay)
        .with_max_times(attempt as usize + 1)
        .build();

    backoff.nth(attempt as usize).unwrap_or(max_delay)
}
