use thiserror::Error;

use super::states::{StepStatus, WorkflowStatus};
use crate::models::WorkflowId;

/// Errors raised while applying an event to a workflow
#[derive(Error, Debug)]
pub enum StateMachineError {
    #[error("Invalid state transition: {event} is not allowed from {from}")]
    InvalidTransition {
        from: WorkflowStatus,
        event: &'static str,
    },

    #[error("Guard condition failed: {reason}")]
    GuardFailed { reason: String },

    #[error("Invalid step state: step {index} is {status}, expected {expected}")]
    InvalidStepState {
        index: usize,
        status: StepStatus,
        expected: &'static str,
    },
}

/// Specific error type for guard condition failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("Step index {index} out of range for workflow with {len} steps")]
    StepIndexOutOfRange { index: usize, len: usize },

    #[error("Step {index} is still running on a node")]
    StepInFlight { index: usize },

    #[error("Event targets step {index} but the workflow pointer is at {pointer}")]
    NotCurrentStep { index: usize, pointer: usize },
}

/// Errors from the workflow state store
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Concurrent modification detected for workflow {workflow_id}: expected version {expected}, found {actual}")]
    ConcurrentModification {
        workflow_id: WorkflowId,
        expected: u64,
        actual: u64,
    },

    #[error("Workflow {workflow_id} not found in state store")]
    NotFound { workflow_id: WorkflowId },

    #[error("Workflow {workflow_id} already exists in state store")]
    AlreadyExists { workflow_id: WorkflowId },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<GuardError> for StateMachineError {
    fn from(err: GuardError) -> Self {
        Self::GuardFailed {
            reason: err.to_string(),
        }
    }
}

/// Result type for state machine operations
pub type StateMachineResult<T> = Result<T, StateMachineError>;

/// Result type for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;
