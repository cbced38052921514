//! Jittered exponential backoff, shared by the dispatcher's retry loop and
//! the streaming sender's reconnect loop.
//!
//! Ported from the teacher's `retry::RetryConfig`/`apply_jitter`, narrowed
//! to the single jitter mode the spec requires (uniform `[0.5, 1.5)`)
//! instead of carrying the teacher's full `JitterMode` palette, since only
//! one mode is ever observed.

use rand::Rng;
use std::time::Duration;

/// `delay(attempt) = min(base * 2^attempt, max) * jitter`, jitter uniform
/// in `[0.5, 1.5)`. `base` and `max` are both strictly positive; `base`
/// must be `<= max`.
#[derive(Clone, Debug)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    /// # Panics
    ///
    /// Panics if `base` or `max` is zero, or `base > max`.
    pub fn new(base: Duration, max: Duration) -> Self {
        assert!(base > Duration::ZERO, "backoff base must be positive");
        assert!(max > Duration::ZERO, "backoff max must be positive");
        assert!(base <= max, "backoff base must not exceed max");
        Self { base, max }
    }

    /// Compute the delay for a given attempt number (0-indexed). The
    /// shift `base * 2^attempt` is clamped at `max` rather than allowed to
    /// overflow.
    pub fn delay(&self, attempt: u32) -> Duration {
        let capped = 2u32
            .checked_pow(attempt)
            .and_then(|mult| self.base.checked_mul(mult))
            .unwrap_or(self.max)
            .min(self.max);

        let jitter = 0.5 + rand::thread_rng().gen::<f64>();
        capped.mul_f64(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_stays_within_jitter_bounds() {
        let b = Backoff::new(Duration::from_millis(100), Duration::from_secs(5));
        for attempt in 0..10 {
            let expected_base = (Duration::from_millis(100) * 2u32.pow(attempt)).min(Duration::from_secs(5));
            let d = b.delay(attempt);
            assert!(d.as_secs_f64() >= expected_base.as_secs_f64() * 0.5);
            assert!(d.as_secs_f64() < expected_base.as_secs_f64() * 1.5);
        }
    }

    #[test]
    fn delay_clamps_at_max_on_overflow() {
        let b = Backoff::new(Duration::from_millis(1), Duration::from_secs(1));
        let d = b.delay(63);
        assert!(d.as_secs_f64() < 1.5);
    }

    #[test]
    #[should_panic]
    fn rejects_base_greater_than_max() {
        Backoff::new(Duration::from_secs(2), Duration::from_secs(1));
    }
}
