//! Reconnect backoff policy

use rand::Rng;
use std::time::Duration;

/// Exponential backoff with additive jitter
///
/// The delay for attempt `n` (0-indexed) is `min(base * 2^n, cap) + jitter`,
/// where jitter is drawn uniformly from `[0, base)`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    cap: Duration,
    max_attempts: Option<u32>,
}

impl ExponentialBackoff {
    /// `max_attempts` of `None` retries forever
    #[must_use]
    pub fn new(base: Duration, cap: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            base,
            cap: cap.max(base),
            max_attempts,
        }
    }

    #[must_use]
    pub fn base(&self) -> Duration {
        self.base
    }

    #[must_use]
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt < max)
    }

    /// Capped exponential delay before jitter
    #[must_use]
    pub fn delay_without_jitter(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Delay before reconnect attempt `attempt`, or `None` once the budget is spent
    #[must_use]
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_retry(attempt) {
            return None;
        }
        Some(self.delay_without_jitter(attempt) + self.jitter())
    }

    fn jitter(&self) -> Duration {
        let base_ms = u64::try_from(self.base.as_millis()).unwrap_or(u64::MAX);
        if base_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..base_ms))
    }
}
