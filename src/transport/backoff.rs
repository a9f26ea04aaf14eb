//! Reconnect backoff: exponential growth, capped, with random jitter.

use rand::Rng;
use std::time::Duration;

/// Backoff schedule parameters.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Base delay for attempt 0.
    pub base: Duration,
    /// Cap applied after growth and jitter.
    pub max: Duration,
    /// Growth factor per attempt; >= 1.0.
    pub multiplier: f64,
    /// Upper bound of the uniformly random jitter added per delay.
    pub jitter: Duration,
}

impl BackoffPolicy {
    /// Computes `min(base * multiplier^attempt + jitter, max)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let grown = self.base.as_millis() as f64 * self.multiplier.powi(attempt.min(1_000) as i32);
        // Saturate before converting: multiplier^attempt overflows fast
        let grown_ms = if grown.is_finite() && grown < self.max.as_millis() as f64 {
            grown as u64
        } else {
            self.max.as_millis() as u64
        };

        let jitter_ms = if self.jitter.is_zero() {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64)
        };

        Duration::from_millis((grown_ms + jitter_ms).min(self.max.as_millis() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base_ms: u64, max_ms: u64, multiplier: f64, jitter_ms: u64) -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_millis(base_ms),
            max: Duration::from_millis(max_ms),
            multiplier,
            jitter: Duration::from_millis(jitter_ms),
        }
    }

    #[test]
    fn test_exponential_growth_without_jitter() {
        let policy = policy(100, 60_000, 2.0, 0);

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn test_delays_monotone_nondecreasing_and_capped() {
        let policy = policy(250, 5_000, 2.0, 0);

        let mut previous = Duration::ZERO;
        for attempt in 0..40 {
            let delay = policy.delay_for_attempt(attempt);
            assert!(delay >= previous, "delay shrank at attempt {}", attempt);
            assert!(delay <= Duration::from_millis(5_000));
            previous = delay;
        }
        assert_eq!(policy.delay_for_attempt(39), Duration::from_millis(5_000));
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let policy = policy(1_000, 30_000, 10.0, 0);
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn test_jitter_bounded_and_capped() {
        let policy = policy(100, 150, 1.0, 500);

        for _ in 0..100 {
            let delay = policy.delay_for_attempt(0);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150), "cap applies after jitter");
        }
    }

    #[test]
    fn test_multiplier_one_is_constant() {
        let policy = policy(300, 10_000, 1.0, 0);
        for attempt in 0..10 {
            assert_eq!(policy.delay_for_attempt(attempt), Duration::from_millis(300));
        }
    }
}
