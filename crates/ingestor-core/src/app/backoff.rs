//! Backoff policy: decides delays after consecutive receive failures.

use std::time::Duration;

/// Default ceiling on consecutive receive failures.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Linear backoff policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay added per consecutive failure.
    pub unit: Duration,

    /// Consecutive failures tolerated before the worker gives up.
    pub max_retries: u32,
}

impl BackoffPolicy {
    pub fn new(unit: Duration, max_retries: u32) -> Self {
        Self { unit, max_retries }
    }

    /// Delay for the `failures`-th consecutive failure.
    ///
    /// delay = unit * failures (unit=2s: 2s, 4s, 6s, ...)
    pub fn delay_for(&self, failures: u32) -> Duration {
        self.unit.saturating_mul(failures)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            unit: Duration::from_secs(2),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Tracks consecutive receive failures for one worker.
#[derive(Debug, Clone)]
pub struct BackoffController {
    policy: BackoffPolicy,
    consecutive_failures: u32,
}

impl BackoffController {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            consecutive_failures: 0,
        }
    }

    /// Record a failure and return how long to sleep before the next attempt.
    pub fn on_failure(&mut self) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.policy.delay_for(self.consecutive_failures)
    }

    /// Any successful receive (even an empty one) clears the streak.
    pub fn on_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn exceeded(&self, max_retries: u32) -> bool {
        self.consecutive_failures > max_retries
    }

    /// `exceeded` against the policy's own ceiling.
    pub fn retries_exhausted(&self) -> bool {
        self.exceeded(self.policy.max_retries)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }
}
