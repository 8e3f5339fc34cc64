//! # Orchestration Types
//!
//! Messages passed between the engine loop and its action watchers, and the
//! per-tick report returned to callers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::models::WorkflowId;
use crate::scheduler::{ScheduledStep, SchedulerMetadata};
use crate::state_machine::FailureKind;

/// How an in-flight action ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded { payload: Value },
    Failed { kind: FailureKind, reason: String },
}

/// Sent by a watcher once its action reaches a terminal state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepCompletion {
    pub workflow_id: WorkflowId,
    pub step_index: usize,
    pub action_id: Uuid,
    pub node: String,
    pub outcome: StepOutcome,
}

/// Live node reservation held while an action runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAssignment {
    pub workflow_id: WorkflowId,
    pub step_index: usize,
    pub action_id: Uuid,
}

/// What one engine tick did
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// Watcher completions applied at the start of the tick
    pub completions_applied: usize,
    pub dispatched: Option<ScheduledStep>,
    /// Transfer steps expanded into hops this tick
    pub transfers_planned: usize,
    /// Steps failed because a precondition or transfer could not be resolved
    pub steps_failed: Vec<ScheduledStep>,
    /// Scheduler metadata for every workflow considered
    pub scheduling: BTreeMap<WorkflowId, SchedulerMetadata>,
}

impl TickReport {
    /// True when the tick changed nothing
    pub fn is_idle(&self) -> bool {
        self.completions_applied == 0
            && self.dispatched.is_none()
            && self.transfers_planned == 0
            && self.steps_failed.is_empty()
    }
}
