//! Backoff schedules.

use rand::Rng;
use std::time::Duration;

use crate::config::{BackoffKind, RetryConfig};

/// Delay imposed before a given attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffSchedule {
    /// Attempt `n` waits `n` units: 0, 1, 2, ...
    Linear { unit: Duration },
    /// Exponential with 0-10% jitter, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl BackoffSchedule {
    pub fn from_config(config: &RetryConfig) -> Self {
        let base = Duration::from_millis(config.base_delay_ms);
        match config.backoff {
            BackoffKind::Linear => BackoffSchedule::Linear { unit: base },
            BackoffKind::Exponential => BackoffSchedule::Exponential {
                base,
                max: Duration::from_millis(config.max_delay_ms),
            },
        }
    }

    /// Wait before attempt `attempt` (0-based). The first attempt is immediate.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            BackoffSchedule::Linear { unit } => unit.saturating_mul(attempt),
            BackoffSchedule::Exponential { base, max } => calculate_backoff(
                attempt,
                base.as_millis() as u64,
                max.as_millis() as u64,
            ),
        }
    }
}

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}
