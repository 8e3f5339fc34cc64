//! # Workcell Configuration System
//!
//! Typed configuration for the workcell engine. Every field carries a default,
//! so a partial file (or none at all) yields a complete, validated
//! [`WorkcellConfig`].
//!
//! ## Sources (lowest to highest precedence)
//!
//! 1. Built-in defaults
//! 2. An optional TOML/YAML/JSON file
//! 3. Environment variables prefixed `WORKCELL_`, with `__` separating
//!    nested keys (e.g. `WORKCELL_ENGINE__TICK_INTERVAL_MS=50`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use workcell_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let tick = manager.config().engine.tick_interval();
//! let retries = manager.config().retry.default_max_retries;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::orchestration::backoff_calculator::BackoffCalculatorConfig;
use crate::scheduler::SchedulerKind;
use crate::transfer::TransferPlannerConfig;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkcellConfig {
    /// Control loop settings
    pub engine: EngineConfig,

    /// Admission scheduler selection
    pub scheduler: SchedulerConfig,

    /// Step retry budget and backoff
    pub retry: RetryConfig,

    /// Transfer planning behaviour
    pub transfer: TransferConfig,

    /// Event broadcast settings
    pub events: EventsConfig,

    /// Console logging settings
    pub logging: LoggingConfig,
}

/// Engine control loop configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Delay between scheduling ticks when running the loop
    pub tick_interval_ms: u64,
    /// Timeout applied to actions whose step does not specify one
    pub default_action_timeout_seconds: u64,
    /// Capacity of the channel carrying action completions back to the loop
    pub completion_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            default_action_timeout_seconds: 3600,
            completion_channel_capacity: 1024,
        }
    }
}

impl EngineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn default_action_timeout(&self) -> Duration {
        Duration::from_secs(self.default_action_timeout_seconds)
    }
}

/// Scheduler selection
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub kind: SchedulerKind,
}

/// Retry policy applied to retryable step failures
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries allowed per step when the step does not set `max_retries`
    pub default_max_retries: u32,
    /// Delay before the first retry
    pub backoff_base_ms: u64,
    /// Growth factor between consecutive retries
    pub backoff_multiplier: f64,
    /// Upper bound on any single retry delay
    pub backoff_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            default_max_retries: 2,
            backoff_base_ms: 1000,
            backoff_multiplier: 2.0,
            backoff_max_ms: 60_000,
        }
    }
}

impl RetryConfig {
    pub fn backoff(&self) -> BackoffCalculatorConfig {
        BackoffCalculatorConfig {
            base_delay_ms: self.backoff_base_ms,
            max_delay_ms: self.backoff_max_ms,
            multiplier: self.backoff_multiplier,
        }
    }
}

/// Transfer planner configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Scale edge weights by destination utilization
    pub capacity_aware: bool,
    /// Weight multiplier added per unit of destination utilization
    pub utilization_penalty: f64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            capacity_aware: true,
            utilization_penalty: 1.0,
        }
    }
}

impl TransferConfig {
    pub fn planner(&self) -> TransferPlannerConfig {
        TransferPlannerConfig {
            capacity_aware: self.capacity_aware,
            utilization_penalty: self.utilization_penalty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: crate::constants::system::DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Explicit filter directive; falls back to LOG_LEVEL / RUST_LOG / environment default
    pub level: Option<String>,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl WorkcellConfig {
    /// Validate cross-field constraints that serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.engine.tick_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "engine.tick_interval_ms",
                "0",
                "tick interval must be positive",
            ));
        }
        if self.engine.default_action_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "engine.default_action_timeout_seconds",
                "0",
                "action timeout must be positive",
            ));
        }
        if self.engine.completion_channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "engine.completion_channel_capacity",
                "0",
                "channel capacity must be positive",
            ));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "retry.backoff_multiplier",
                self.retry.backoff_multiplier.to_string(),
                "multiplier must be a finite number >= 1.0",
            ));
        }
        if self.retry.backoff_max_ms < self.retry.backoff_base_ms {
            return Err(ConfigurationError::invalid_value(
                "retry.backoff_max_ms",
                self.retry.backoff_max_ms.to_string(),
                "maximum delay must not be below the base delay",
            ));
        }
        if !self.transfer.utilization_penalty.is_finite() || self.transfer.utilization_penalty < 0.0
        {
            return Err(ConfigurationError::invalid_value(
                "transfer.utilization_penalty",
                self.transfer.utilization_penalty.to_string(),
                "penalty must be a finite, non-negative number",
            ));
        }
        if self.events.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                "0",
                "channel capacity must be positive",
            ));
        }
        Ok(())
    }
}
