//! Retry policy for queued changes.

use chrono::{DateTime, Duration, Utc};

use super::change::PendingChange;

/// Default number of failed attempts a change may accumulate before it is
/// dead-lettered on the next failure.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Exponential backoff between attempts of the same change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay after the first failure
    pub base: Duration,
    /// Upper bound on the delay
    pub max: Duration,
}

impl Backoff {
    /// Delay before retrying a change that has failed `retry_count` times.
    #[must_use]
    pub fn delay(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return Duration::zero();
        }
        let exponent = (retry_count - 1).min(20);
        let factor = 1_i32 << exponent;
        self.base
            .checked_mul(factor)
            .map_or(self.max, |d| d.min(self.max))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::seconds(5),
            max: Duration::seconds(300),
        }
    }
}

/// How failed changes are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failures tolerated before a change is dead-lettered
    pub max_retries: u32,
    /// Optional per-change backoff; `None` retries on every pass
    pub backoff: Option<Backoff>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: None,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given cap and no backoff.
    #[must_use]
    pub const fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: None,
        }
    }

    /// Whether a change with this many failures must be dead-lettered.
    #[must_use]
    pub const fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count > self.max_retries
    }

    /// Earliest time the change may be attempted again.
    #[must_use]
    pub fn next_attempt_at(&self, change: &PendingChange) -> Option<DateTime<Utc>> {
        let backoff = self.backoff?;
        let last = change.last_attempt_at?;
        Some(last + backoff.delay(change.retry_count))
    }

    /// Whether the change may be attempted at `now`.
    #[must_use]
    pub fn is_ready(&self, change: &PendingChange, now: DateTime<Utc>) -> bool {
        self.next_attempt_at(change).map_or(true, |at| at <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::ChangeType;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert!(policy.backoff.is_none());
    }

    #[test]
    fn test_exhaustion_is_strictly_greater() {
        let policy = RetryPolicy::with_max_retries(5);
        assert!(!policy.is_exhausted(0));
        assert!(!policy.is_exhausted(5));
        assert!(policy.is_exhausted(6));
    }

    #[test]
    fn test_backoff_delay() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(0), Duration::zero());
        assert_eq!(backoff.delay(1), Duration::seconds(5));
        assert_eq!(backoff.delay(2), Duration::seconds(10));
        assert_eq!(backoff.delay(5), Duration::seconds(80));
        assert_eq!(backoff.delay(7), Duration::seconds(300));
        assert_eq!(backoff.delay(u32::MAX), Duration::seconds(300));
    }

    #[test]
    fn test_ready_without_backoff() {
        let policy = RetryPolicy::default();
        let mut change = PendingChange::with_id("a", ChangeType::BabyUpdate, Vec::new());
        let now = Utc::now();
        change.record_failure("boom", now);
        assert!(policy.is_ready(&change, now));
    }

    #[test]
    fn test_ready_with_backoff() {
        let policy = RetryPolicy {
            max_retries: 5,
            backoff: Some(Backoff::default()),
        };
        let mut change = PendingChange::with_id("a", ChangeType::BabyUpdate, Vec::new());
        let now = Utc::now();

        // Never attempted
        assert!(policy.is_ready(&change, now));

        change.record_failure("boom", now);
        assert!(!policy.is_ready(&change, now + Duration::seconds(4)));
        assert!(policy.is_ready(&change, now + Duration::seconds(5)));
    }
}
