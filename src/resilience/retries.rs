//! Retry policy for the serve loop.
//!
//! # Responsibilities
//! - Count consecutive serve failures
//! - Forget earlier failures once a run stayed up long enough
//! - Decide between another attempt and giving up
//!
//! # Design Decisions
//! - At most `max_retries` retries inside one burst of failures
//! - A run lasting at least `reset_threshold` starts a fresh budget
//! - The decision is a pure function of the counter and the uptime

use std::time::Duration;

use crate::resilience::backoff::Backoff;

/// Bounded retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub reset_threshold: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            reset_threshold: Duration::from_secs(5),
            backoff: Backoff::default(),
        }
    }
}

/// Consecutive failure counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    pub retry_count: u32,
}

/// What to do after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for `delay`, then start attempt number `attempt`.
    Retry { attempt: u32, delay: Duration },
    GiveUp,
}

impl RetryPolicy {
    /// Record a failure of a run that lasted `uptime`.
    pub fn on_failure(&self, state: &mut RetryState, uptime: Duration) -> RetryDecision {
        if uptime >= self.reset_threshold {
            state.retry_count = 0;
        }

        if state.retry_count < self.max_retries {
            state.retry_count += 1;
            RetryDecision::Retry {
                attempt: state.retry_count,
                delay: self.backoff.delay(state.retry_count),
            }
        } else {
            RetryDecision::GiveUp
        }
    }
}
