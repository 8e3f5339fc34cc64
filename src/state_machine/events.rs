use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Why a step failed. Decides whether the retry budget applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The node ran the action and reported failure
    NodeReportedFailure,
    /// The action did not finish within its timeout
    NodeTimeout,
    /// The action could not be handed to the node
    DispatchError,
    /// A precondition references something that does not exist or has the wrong shape
    ConditionResolution,
    /// The transfer planner found no route
    NoTransferPath,
}

impl FailureKind {
    /// Node-side failures consume the retry budget; definition errors never retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NodeReportedFailure | Self::NodeTimeout | Self::DispatchError
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeReportedFailure => write!(f, "node_reported_failure"),
            Self::NodeTimeout => write!(f, "node_timeout"),
            Self::DispatchError => write!(f, "dispatch_error"),
            Self::ConditionResolution => write!(f, "condition_resolution"),
            Self::NoTransferPath => write!(f, "no_transfer_path"),
        }
    }
}

/// Events that can trigger workflow state transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// The step at `index` was handed to its node
    StepStarted { index: usize, action_id: Uuid },
    /// The step at `index` finished successfully
    StepSucceeded { index: usize, payload: Value },
    /// The step at `index` failed
    StepFailed {
        index: usize,
        kind: FailureKind,
        reason: String,
    },
    /// Stop dispatching new steps
    Pause,
    /// Continue a paused workflow
    Resume,
    /// Cancel at the next step boundary
    Cancel,
    /// Reset steps from `index` onward and run again
    Retry { index: usize },
}

impl WorkflowEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StepStarted { .. } => "step_started",
            Self::StepSucceeded { .. } => "step_succeeded",
            Self::StepFailed { .. } => "step_failed",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Cancel => "cancel",
            Self::Retry { .. } => "retry",
        }
    }

    /// Step index the event refers to, for step-level events
    pub fn step_index(&self) -> Option<usize> {
        match self {
            Self::StepStarted { index, .. }
            | Self::StepSucceeded { index, .. }
            | Self::StepFailed { index, .. }
            | Self::Retry { index } => Some(*index),
            Self::Pause | Self::Resume | Self::Cancel => None,
        }
    }

    /// Check if this event was posted by an operator rather than by execution
    pub fn is_administrative(&self) -> bool {
        matches!(
            self,
            Self::Pause | Self::Resume | Self::Cancel | Self::Retry { .. }
        )
    }
}
