use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::models::WorkflowId;
use crate::state_machine::WorkflowStatus;

/// Why a workflow's current step was not selected this tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BlockReason {
    /// A precondition evaluated to false; re-checked on a later tick
    ConditionNotMet { index: usize, condition: String },
    /// A precondition references something that does not exist
    ConditionUnresolvable { index: usize, error: String },
    /// A collaborator could not be reached while evaluating conditions
    ServiceUnavailable { error: String },
    NodeBusy { node: String },
    AwaitingRetry { not_before: DateTime<Utc> },
    StepInFlight { index: usize },
    NotRunnable { status: WorkflowStatus },
    /// Cancel requested; waiting for the in-flight step to settle
    CancelPending,
}

impl BlockReason {
    /// True when waiting cannot help and the step should be failed
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConditionUnresolvable { .. })
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConditionNotMet { index, condition } => {
                write!(f, "condition {index} not met: {condition}")
            }
            Self::ConditionUnresolvable { index, error } => {
                write!(f, "condition {index} unresolvable: {error}")
            }
            Self::ServiceUnavailable { error } => write!(f, "service unavailable: {error}"),
            Self::NodeBusy { node } => write!(f, "node {node} is busy"),
            Self::AwaitingRetry { not_before } => {
                write!(f, "awaiting retry backoff until {}", not_before.to_rfc3339())
            }
            Self::StepInFlight { index } => write!(f, "step {index} is in flight"),
            Self::NotRunnable { status } => write!(f, "workflow is {status}"),
            Self::CancelPending => write!(f, "cancel pending"),
        }
    }
}

/// Per-workflow outcome of one scheduling pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerMetadata {
    pub ready: bool,
    /// Preconditions evaluated before a decision was reached
    pub conditions_evaluated: usize,
    pub blocked: Option<BlockReason>,
}

impl SchedulerMetadata {
    pub fn ready(conditions_evaluated: usize) -> Self {
        Self {
            ready: true,
            conditions_evaluated,
            blocked: None,
        }
    }

    pub fn blocked(reason: BlockReason, conditions_evaluated: usize) -> Self {
        Self {
            ready: false,
            conditions_evaluated,
            blocked: Some(reason),
        }
    }

    /// Human-readable blocking reason
    pub fn reason(&self) -> Option<String> {
        self.blocked.as_ref().map(ToString::to_string)
    }
}

/// A (workflow, step) pair picked for dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledStep {
    pub workflow_id: WorkflowId,
    pub step_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulingDecision {
    pub selected: Option<ScheduledStep>,
    pub metadata: BTreeMap<WorkflowId, SchedulerMetadata>,
}

impl SchedulingDecision {
    /// Workflows whose current step can never run as defined
    pub fn unresolvable(&self) -> Vec<(WorkflowId, &BlockReason)> {
        self.metadata
            .iter()
            .filter_map(|(workflow_id, metadata)| {
                metadata
                    .blocked
                    .as_ref()
                    .filter(|reason| reason.is_fatal())
                    .map(|reason| (*workflow_id, reason))
            })
            .collect()
    }
}
