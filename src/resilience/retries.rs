//! Setup retry policy.
//!
//! # Responsibilities
//! - Decide whether a failed acquisition gets another attempt
//! - Space attempts with exponential backoff + jitter
//!
//! # Design Decisions
//! - Only provider rejections during setup are retried
//! - Readiness timeouts, cancellation and release failures are final
//! - `max_attempts = 1` keeps the fail-fast behaviour

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// How many acquisition attempts a lifecycle makes and how far apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// A single attempt; failures are final.
    pub fn fail_fast() -> Self {
        Self::new(1, 0, 0)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether attempt number `attempt` (1-based) may be followed by another.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the attempt following `attempt`.
    ///
    /// Doubles from `base_delay_ms` per failed attempt up to `max_delay_ms`,
    /// then adds up to a tenth of that as jitter. Attempt 0 never waits.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.base_delay_ms == 0 {
            return Duration::ZERO;
        }
        let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
        let step_ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        let jitter_ms = match step_ms / 10 {
            0 => 0,
            spread => rand::thread_rng().gen_range(0..spread),
        };
        Duration::from_millis(step_ms + jitter_ms)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        if config.enabled {
            Self::new(config.max_attempts, config.base_delay_ms, config.max_delay_ms)
        } else {
            Self::fail_fast()
        }
    }
}
