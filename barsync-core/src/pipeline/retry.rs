//! Whole-run retry policy.
//!
//! The pipeline retries at run granularity only: a failed attempt tears
//! the session down, waits a fixed backoff, and starts over from login.
//! The policy is injected so tests swap in a zero-backoff variant.

use std::time::Duration;

/// Fixed-backoff retry budget for whole-run attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// At least one attempt is always allowed; zero is clamped to one.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Zero-backoff policy for deterministic tests.
    pub fn no_delay(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Block for the configured backoff. No-op when zero.
    pub fn wait(&self) {
        if !self.backoff.is_zero() {
            std::thread::sleep(self.backoff);
        }
    }
}

impl Default for RetryPolicy {
    /// Production policy: 3 attempts, 5 seconds apart.
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_three_attempts_five_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.backoff(), Duration::from_secs(5));
    }

    #[test]
    fn zero_attempts_clamps_to_one() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn no_delay_has_zero_backoff() {
        let policy = RetryPolicy::no_delay(5);
        assert_eq!(policy.max_attempts(), 5);
        assert!(policy.backoff().is_zero());
        policy.wait(); // must return immediately
    }
}
