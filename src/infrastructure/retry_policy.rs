//! Retry policy for remote fetches
//!
//! The catalog historically made exactly one attempt per category and sync.
//! That remains the default (`max_attempts = 1`); anything more is opt-in
//! through configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::infrastructure::catalog_error::CatalogError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `1` disables retrying.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// e.g. 2.0 doubles the delay on every attempt
    pub backoff_multiplier: f64,
    /// Uniform random jitter added on top of the computed delay.
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_ms: 250,
        }
    }
}

impl RetryPolicy {
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            jitter_ms: 0,
        }
    }

    pub fn exponential(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            ..Self::default()
        }
    }

    /// `attempt` is the 1-based number of the attempt that just failed.
    pub fn should_retry(&self, error: &CatalogError, attempt: u32) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let exponential = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = if exponential.is_finite() {
            (exponential as u64).min(self.max_delay_ms)
        } else {
            self.max_delay_ms
        };

        let jitter = if self.jitter_ms > 0 {
            fastrand::u64(0..=self.jitter_ms)
        } else {
            0
        };

        Duration::from_millis(capped + jitter)
    }
}
