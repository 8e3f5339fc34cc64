//! # Step Model
//!
//! One action invocation on one node, gated by zero or more [`Condition`]s.
//!
//! A step with a [`TransferSpec`] is a *transfer step*: it names no node of its
//! own. When it reaches the head of its workflow the engine plans a route and
//! splices the resulting hop steps into the workflow in its place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::condition::Condition;
use crate::state_machine::states::StepStatus;

/// What to do once a step has exhausted its recovery options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the workflow
    #[default]
    Fail,
    /// Mark the step Skipped and continue with the next one
    Skip,
}

/// Source and target of a location transfer, by location id or name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSpec {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityChange {
    Increase(f64),
    Decrease(f64),
}

/// A quantity mutation requested from the resource service once the step succeeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityUpdate {
    pub resource_id: String,
    pub change: QuantityChange,
}

impl QuantityUpdate {
    pub fn increase(resource_id: impl Into<String>, amount: f64) -> Self {
        Self {
            resource_id: resource_id.into(),
            change: QuantityChange::Increase(amount),
        }
    }

    pub fn decrease(resource_id: impl Into<String>, amount: f64) -> Self {
        Self {
            resource_id: resource_id.into(),
            change: QuantityChange::Decrease(amount),
        }
    }
}

/// Result reported by the node for a succeeded step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// `None` for steps completed without a node action
    #[serde(default)]
    pub action_id: Option<Uuid>,
    pub payload: Value,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub action: String,
    /// Target node; `None` only for transfer steps
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub args: BTreeMap<String, Value>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub transfer: Option<TransferSpec>,
    #[serde(default)]
    pub status: StepStatus,
    /// Number of times the step has been dispatched
    #[serde(default)]
    pub attempts: u32,
    /// Retries allowed after the first attempt; engine default when unset
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Action timeout; engine default when unset
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub on_failure: FailurePolicy,
    /// Earliest time a retried step may be dispatched again
    #[serde(default)]
    pub next_attempt_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub action_id: Option<Uuid>,
    #[serde(default)]
    pub result: Option<StepResult>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub resource_updates: Vec<QuantityUpdate>,
    /// Name of the transfer step this hop was expanded from
    #[serde(default)]
    pub spliced_from: Option<String>,
}

impl Step {
    pub fn new(name: impl Into<String>, action: impl Into<String>, node: impl Into<String>) -> Self {
        Self::blank(name.into(), action.into(), Some(node.into()), None)
    }

    /// A transfer step, expanded into hops by the transfer planner at dispatch time
    pub fn transfer(
        name: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        let spec = TransferSpec {
            source: source.into(),
            target: target.into(),
        };
        Self::blank(name.into(), "transfer".to_string(), None, Some(spec))
    }

    fn blank(
        name: String,
        action: String,
        node: Option<String>,
        transfer: Option<TransferSpec>,
    ) -> Self {
        Self {
            name,
            action,
            node,
            args: BTreeMap::new(),
            conditions: Vec::new(),
            transfer,
            status: StepStatus::Pending,
            attempts: 0,
            max_retries: None,
            timeout_seconds: None,
            on_failure: FailurePolicy::Fail,
            next_attempt_at: None,
            started_at: None,
            ended_at: None,
            action_id: None,
            result: None,
            error: None,
            resource_updates: Vec::new(),
            spliced_from: None,
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.args.insert(key.into(), value);
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    pub fn with_on_failure(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    pub fn with_resource_update(mut self, update: QuantityUpdate) -> Self {
        self.resource_updates.push(update);
        self
    }

    pub fn is_transfer(&self) -> bool {
        self.transfer.is_some()
    }

    /// Clear all execution state, keeping the definition
    pub fn reset(&mut self) {
        self.status = StepStatus::Pending;
        self.attempts = 0;
        self.next_attempt_at = None;
        self.started_at = None;
        self.ended_at = None;
        self.action_id = None;
        self.result = None;
        self.error = None;
    }
}
