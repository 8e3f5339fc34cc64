use thiserror::Error;

use crate::client::ClientError;

/// Errors raised while evaluating a step precondition.
///
/// A condition that evaluates to `false` is not an error. These variants mean
/// the condition could not be evaluated at all.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    /// The referenced location, resource, child or field does not exist or has
    /// the wrong shape. Indicates a malformed workflow.
    #[error("Condition '{condition}' cannot be resolved: {reason}")]
    ResolutionFailed { condition: String, reason: String },

    /// A collaborator service could not be reached; re-check on a later tick
    #[error("Condition '{condition}' could not be evaluated: {reason}")]
    ServiceUnavailable { condition: String, reason: String },
}

impl ConditionError {
    pub fn resolution(condition: impl ToString, reason: impl Into<String>) -> Self {
        Self::ResolutionFailed {
            condition: condition.to_string(),
            reason: reason.into(),
        }
    }

    /// Map a client failure onto the evaluator taxonomy
    pub fn from_client(condition: impl ToString, err: ClientError) -> Self {
        if err.is_transient() {
            Self::ServiceUnavailable {
                condition: condition.to_string(),
                reason: err.to_string(),
            }
        } else {
            Self::ResolutionFailed {
                condition: condition.to_string(),
                reason: err.to_string(),
            }
        }
    }

    pub fn is_resolution_failure(&self) -> bool {
        matches!(self, Self::ResolutionFailed { .. })
    }
}

pub type ConditionResult<T> = Result<T, ConditionError>;
