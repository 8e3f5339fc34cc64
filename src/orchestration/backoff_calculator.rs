//! # Backoff Calculator
//!
//! Exponential backoff for retryable step failures.
//!
//! ## Overview
//!
//! The delay before retry `n` (1-based) is `base * multiplier^(n-1)`, capped at
//! `max`. No jitter is applied: identical failure histories always produce
//! identical `next_attempt_at` values, which keeps scheduling decisions
//! reproducible.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Configuration for backoff calculation behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffCalculatorConfig {
    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,
    /// Maximum delay cap, in milliseconds
    pub max_delay_ms: u64,
    /// Exponential multiplier (default: 2.0)
    pub multiplier: f64,
}

impl Default for BackoffCalculatorConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            multiplier: 2.0,
        }
    }
}

/// Outcome of a backoff calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffResult {
    pub delay: Duration,
    pub next_attempt_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackoffCalculator {
    config: BackoffCalculatorConfig,
}

impl BackoffCalculator {
    pub fn new(config: BackoffCalculatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BackoffCalculatorConfig {
        &self.config
    }

    /// Delay before retry number `retry` (1-based; 0 is treated as 1)
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw = self.config.base_delay_ms as f64 * self.config.multiplier.powi(exponent);
        let capped = if raw.is_finite() {
            raw.min(self.config.max_delay_ms as f64)
        } else {
            self.config.max_delay_ms as f64
        };
        Duration::milliseconds(capped.max(0.0) as i64)
    }

    /// Compute when retry number `retry` may be dispatched, relative to `now`
    pub fn calculate(&self, retry: u32, now: DateTime<Utc>) -> BackoffResult {
        let delay = self.delay_for_retry(retry);
        BackoffResult {
            delay,
            next_attempt_at: now + delay,
        }
    }
}
