//! Requeue backoff for the delivery layer.
//!
//! The reconciler never retries; whoever redelivers failed notifications
//! asks this tracker how long to wait. Delays grow exponentially per pod
//! and reset once the pod reconciles cleanly.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use autopool_id::PodKey;

/// Default delay after the first failure.
pub const DEFAULT_REQUEUE_BASE: Duration = Duration::from_secs(5);

/// Default cap on the delay.
pub const DEFAULT_REQUEUE_MAX: Duration = Duration::from_secs(5 * 60); // 5 minutes

/// Per-pod exponential backoff tracker.
#[derive(Debug)]
pub struct RequeueBackoff {
    base: Duration,
    max: Duration,

    /// Consecutive failures per pod.
    failures: Mutex<HashMap<PodKey, u32>>,
}

impl Default for RequeueBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEUE_BASE, DEFAULT_REQUEUE_MAX)
    }
}

impl RequeueBackoff {
    /// Create a tracker. `max` is raised to `base` if smaller.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure and return how long to wait before redelivering.
    pub fn record_failure(&self, key: &PodKey) -> Duration {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let count = failures.entry(key.clone()).or_insert(0);
        *count = count.saturating_add(1);
        self.delay_for(*count)
    }

    /// Consecutive failures recorded for a pod.
    pub fn failures(&self, key: &PodKey) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Clear failure tracking for a pod (on success).
    pub fn reset(&self, key: &PodKey) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Number of pods currently backing off.
    pub fn tracked(&self) -> usize {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.max, |d| d.min(self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> PodKey {
        PodKey::new("ml", name).unwrap()
    }

    #[test]
    fn test_delays_double_until_capped() {
        let backoff = RequeueBackoff::new(Duration::from_secs(5), Duration::from_secs(60));
        let pod = key("trainer-0");

        let delays: Vec<_> = (0..6).map(|_| backoff.record_failure(&pod)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(5),
                Duration::from_secs(10),
                Duration::from_secs(20),
                Duration::from_secs(40),
                Duration::from_secs(60),
                Duration::from_secs(60),
            ]
        );
        assert_eq!(backoff.failures(&pod), 6);
    }

    #[test]
    fn test_keys_are_independent() {
        let backoff = RequeueBackoff::default();
        backoff.record_failure(&key("a"));
        backoff.record_failure(&key("a"));

        assert_eq!(backoff.record_failure(&key("b")), DEFAULT_REQUEUE_BASE);
        assert_eq!(backoff.tracked(), 2);
    }

    #[test]
    fn test_reset() {
        let backoff = RequeueBackoff::default();
        let pod = key("trainer-0");
        backoff.record_failure(&pod);
        backoff.record_failure(&pod);

        backoff.reset(&pod);
        assert_eq!(backoff.failures(&pod), 0);
        assert_eq!(backoff.record_failure(&pod), DEFAULT_REQUEUE_BASE);
    }

    #[test]
    fn test_many_failures_do_not_overflow() {
        let backoff = RequeueBackoff::default();
        let pod = key("trainer-0");
        for _ in 0..100 {
            assert!(backoff.record_failure(&pod) <= DEFAULT_REQUEUE_MAX);
        }
    }
}
