//! Error types for the workcell execution core.
//!
//! Each subsystem owns a focused error enum; [`WorkcellError`] is the
//! crate-wide error the engine surfaces to its callers.

use thiserror::Error;

use crate::client::{ClientError, NodeError};
use crate::conditions::ConditionError;
use crate::config::ConfigurationError;
use crate::state_machine::errors::{GuardError, PersistenceError, StateMachineError};
use crate::transfer::TransferError;

#[derive(Debug, Error)]
pub enum WorkcellError {
    #[error(transparent)]
    StateMachine(#[from] StateMachineError),
    #[error(transparent)]
    Condition(#[from] ConditionError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Node(#[from] NodeError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<GuardError> for WorkcellError {
    fn from(err: GuardError) -> Self {
        WorkcellError::StateMachine(err.into())
    }
}

impl From<serde_json::Error> for WorkcellError {
    fn from(error: serde_json::Error) -> Self {
        WorkcellError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl WorkcellError {
    /// True when the error is the state machine rejecting an event
    pub fn is_invalid_transition(&self) -> bool {
        matches!(
            self,
            WorkcellError::StateMachine(StateMachineError::InvalidTransition { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, WorkcellError>;
