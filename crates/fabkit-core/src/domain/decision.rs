//! Decision model: whether a failed attempt is resubmitted.
//!
//! `RetryPolicy::decide` is a pure function over `(attempt, error)`. The delay
//! is constant for a run (no backoff): deployments size it to span a block
//! cut, and growing delays would leave workers idle under load.

use std::time::Duration;

use super::errors::InvocationError;
use super::spec::RetryBudget;

/// The next action to take after a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Resubmit after `delay`.
    Retry { delay: Duration, reason: String },

    /// Give up; the error is final.
    GiveUp { reason: String },
}

impl Decision {
    pub fn is_retry(&self) -> bool {
        matches!(self, Decision::Retry { .. })
    }
}

/// Retry policy for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts including the first one.
    pub max_attempts: u32,

    /// Delay before each resubmission.
    pub resubmit_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, resubmit_delay: Duration) -> Self {
        Self {
            max_attempts,
            resubmit_delay,
        }
    }

    /// Decide what to do after `attempt` (1-based) failed with `error`.
    pub fn decide(&self, attempt: u32, error: &InvocationError) -> Decision {
        if !error.is_retryable() {
            return Decision::GiveUp {
                reason: format!("{:?} errors are not retried", error.kind()),
            };
        }
        if attempt >= self.max_attempts {
            return Decision::GiveUp {
                reason: format!(
                    "Max attempts reached: {}/{}",
                    attempt, self.max_attempts
                ),
            };
        }
        Decision::Retry {
            delay: self.resubmit_delay,
            reason: format!(
                "Retry attempt {}/{} after {:?}",
                attempt + 1,
                self.max_attempts,
                self.resubmit_delay
            ),
        }
    }
}

impl From<RetryBudget> for RetryPolicy {
    fn from(budget: RetryBudget) -> Self {
        Self::new(budget.max_attempts, budget.resubmit_delay)
    }
}
