//! Capped exponential retry delay for store faults.
//!
//! The poller never stops retrying; this only spaces the attempts out so
//! a degraded store is not hammered.

use std::time::Duration;

use rand::Rng;

/// Retry delay generator: `base * 2^attempt`, capped at `max`, minus up
/// to 10% random jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    /// Create a backoff starting at `base` and never exceeding `max`.
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempt: 0,
        }
    }

    /// Number of consecutive failures recorded since the last reset.
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Forget previous failures.
    pub const fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Delay before the next retry, recording one more failure.
    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.attempt);
        let delay = self.base.saturating_mul(factor).min(self.max);
        self.attempt = self.attempt.saturating_add(1);

        let spread = delay.checked_div(10).unwrap_or_default();
        let spread_ms = u64::try_from(spread.as_millis()).unwrap_or(u64::MAX);
        if spread_ms == 0 {
            return delay;
        }
        let jitter = rand::rng().random_range(0..=spread_ms);
        delay.saturating_sub(Duration::from_millis(jitter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn within(delay: Duration, nominal_ms: u64) -> bool {
        let nominal = Duration::from_millis(nominal_ms);
        let floor = nominal.saturating_sub(nominal.checked_div(10).unwrap_or_default());
        delay <= nominal && delay >= floor
    }

    #[test]
    fn delays_double_until_capped() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(1000));
        for nominal in [100, 200, 400, 800, 1000, 1000, 1000] {
            let delay = backoff.next_delay();
            assert!(within(delay, nominal), "{delay:?} not near {nominal}ms");
        }
        assert_eq!(backoff.attempt(), 7);
    }

    #[test]
    fn reset_returns_to_base() {
        let mut backoff = Backoff::new(Duration::from_millis(50), Duration::from_secs(5));
        for _ in 0..5 {
            let _ = backoff.next_delay();
        }
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert!(within(backoff.next_delay(), 50));
    }

    #[test]
    fn many_failures_never_overflow() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(10));
        for _ in 0..200 {
            assert!(backoff.next_delay() <= Duration::from_secs(10));
        }
    }
}
