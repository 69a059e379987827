//! Backoff schedule for retrying transient write conflicts.
//!
//! Pure arithmetic only; the async loop that sleeps lives with the backend
//! that needs it.

use std::time::Duration;

/// Retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Delay before the first retry. Each further retry doubles it.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based), or `None` once exhausted.
    pub fn delay_for(&self, retry: u32) -> Option<Duration> {
        if retry == 0 || retry > self.max_retries {
            return None;
        }
        let shift = (retry - 1).min(16);
        Some(self.base_delay.saturating_mul(1 << shift))
    }

    /// Upper bound on the time spent sleeping across all retries.
    pub fn max_total_delay(&self) -> Duration {
        (1..=self.max_retries)
            .filter_map(|r| self.delay_for(r))
            .fold(Duration::ZERO, |acc, d| acc.saturating_add(d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_doubles_from_10ms() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(10)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(20)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(40)));
        assert_eq!(policy.delay_for(4), None);
    }

    #[test]
    fn test_total_delay_is_bounded_to_70ms() {
        assert_eq!(
            RetryPolicy::default().max_total_delay(),
            Duration::from_millis(70)
        );
    }

    #[test]
    fn test_none_policy_never_retries() {
        let policy = RetryPolicy::none();
        assert_eq!(policy.delay_for(1), None);
        assert_eq!(policy.max_total_delay(), Duration::ZERO);
    }
}
