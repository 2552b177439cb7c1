//! Fixed-delay retry policy for task-level failures.
//!
//! Every task-level failure (resolution, incomplete segment pool, assembly)
//! consumes one attempt from the same budget. Between attempts the task waits
//! a fixed delay; there is no exponential growth and no jitter.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use vodgrab_core::tasks::{RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! assert_eq!(
//!     policy.after_failure(1),
//!     RetryDecision::Retry { delay: Duration::from_secs(10), attempt: 2 }
//! );
//! assert!(matches!(policy.after_failure(3), RetryDecision::GiveUp { .. }));
//! ```

use std::time::Duration;

use tracing::{debug, instrument};

use super::item::TaskStatus;

/// Default maximum attempts per task (including the first).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Decision taken after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Start attempt `attempt` after `delay`.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// The budget is spent; the task becomes `failed`.
    GiveUp {
        /// Attempts made in total.
        attempts: u32,
    },
}

/// Attempt budget and fixed inter-attempt delay.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `delay`: 10 seconds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` is raised to at least one.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delay between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Decides what follows the failure of attempt `failed_attempt` (1-indexed).
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn after_failure(&self, failed_attempt: u32) -> RetryDecision {
        if failed_attempt >= self.max_attempts {
            debug!(failed_attempt, "max attempts reached");
            return RetryDecision::GiveUp {
                attempts: failed_attempt,
            };
        }

        debug!(
            failed_attempt,
            next_attempt = failed_attempt + 1,
            delay_ms = self.delay.as_millis(),
            "will retry"
        );
        RetryDecision::Retry {
            delay: self.delay,
            attempt: failed_attempt + 1,
        }
    }

    /// Status shown while waiting after `failed` failed attempts.
    #[must_use]
    pub fn waiting_status(&self, failed: u32) -> TaskStatus {
        TaskStatus::WaitingRetry {
            failed,
            max: self.max_attempts,
        }
    }
}
