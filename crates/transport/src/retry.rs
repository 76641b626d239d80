//! Retry policy for transient HTTP failures
//!
//! Delay before retry n (1-based) is `backoff_base * 2^(n-1)`, capped at
//! `backoff_max`. A `Retry-After` hint from the server raises the delay to at
//! least the hinted value, still subject to the cap.

use std::time::Duration;

/// Statuses retried by default: rate limiting and gateway/server failures.
pub const DEFAULT_RETRY_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = max_retries + 1)
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(120),
            retry_statuses: DEFAULT_RETRY_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn retries_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    /// Delay to wait before the given retry (1-based).
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let backoff = self.backoff_base.saturating_mul(1u32 << exponent);
        let delay = match retry_after {
            Some(hint) => backoff.max(hint),
            None => backoff,
        };
        delay.min(self.backoff_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.backoff_base, Duration::from_millis(500));
        assert_eq!(policy.retry_statuses, vec![429, 500, 502, 503, 504]);
    }

    #[test]
    fn backoff_doubles_from_base() {
        let policy = RetryPolicy::default();
        let delays: Vec<u128> = (1..=5)
            .map(|n| policy.delay_for(n, None).as_millis())
            .collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000, 8000]);
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy {
            backoff_max: Duration::from_secs(3),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(4, None), Duration::from_secs(3));
        assert_eq!(policy.delay_for(40, None), Duration::from_secs(3));
    }

    #[test]
    fn retry_after_raises_delay_but_respects_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(7))),
            Duration::from_secs(7)
        );
        // A shorter hint never shortens the backoff
        assert_eq!(
            policy.delay_for(3, Some(Duration::from_millis(10))),
            Duration::from_secs(2)
        );
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(3600))),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn retryable_statuses() {
        let policy = RetryPolicy::default();
        assert!(policy.retries_status(429));
        assert!(policy.retries_status(503));
        assert!(!policy.retries_status(401));
        assert!(!policy.retries_status(404));
        assert!(!policy.retries_status(200));
    }

    #[test]
    fn none_policy_has_no_retries() {
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }
}
