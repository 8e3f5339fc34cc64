//! # Step Failure Classification
//!
//! Maps every way a step can fail onto a [`FailureKind`], which decides
//! whether the retry budget applies, plus a stable error code and a message
//! stored on the step.
//!
//! | Source                              | Kind                    | Retried |
//! |-------------------------------------|-------------------------|---------|
//! | node reported failure               | `NodeReportedFailure`   | yes     |
//! | action exceeded its timeout         | `NodeTimeout`           | yes     |
//! | action could not be handed over     | `DispatchError`         | yes     |
//! | precondition cannot be resolved     | `ConditionResolution`   | no      |
//! | no route between transfer endpoints | `NoTransferPath`        | no      |

use serde::{Deserialize, Serialize};

use crate::client::NodeError;
use crate::models::ActionResult;
use crate::state_machine::FailureKind;
use crate::transfer::TransferError;

/// Result of classifying a step failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub kind: FailureKind,
    /// Stable code for log searches
    pub error_code: String,
    pub error_message: String,
    pub remediation_suggestions: Vec<String>,
}

impl ErrorClassification {
    fn new(kind: FailureKind, error_code: &str, error_message: String, remediation: &[&str]) -> Self {
        Self {
            kind,
            error_code: error_code.to_string(),
            error_message,
            remediation_suggestions: remediation.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Classifier used by the engine for every step failure path
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardErrorClassifier;

impl StandardErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// A node answered with a terminal `Failed` result
    pub fn classify_action_failure(&self, result: &ActionResult) -> ErrorClassification {
        ErrorClassification::new(
            FailureKind::NodeReportedFailure,
            "NODE_REPORTED_FAILURE",
            result.error_summary(),
            &["Inspect the node's own logs for the failed action"],
        )
    }

    /// Communication with the node failed, or the wait for a result expired
    pub fn classify_node_error(&self, error: &NodeError) -> ErrorClassification {
        match error {
            NodeError::Timeout { .. } => ErrorClassification::new(
                FailureKind::NodeTimeout,
                "NODE_TIMEOUT",
                error.to_string(),
                &[
                    "Increase the step's timeout_seconds if the action is legitimately slow",
                    "Check whether the instrument is stalled",
                ],
            ),
            NodeError::UnknownNode { .. } | NodeError::DispatchFailed { .. } => {
                ErrorClassification::new(
                    FailureKind::DispatchError,
                    "DISPATCH_FAILED",
                    error.to_string(),
                    &["Verify the node is registered and reachable"],
                )
            }
            NodeError::UnknownAction { .. } | NodeError::Unavailable { .. } => {
                ErrorClassification::new(
                    FailureKind::NodeReportedFailure,
                    "NODE_LOST_ACTION",
                    error.to_string(),
                    &["The node may have restarted while the action was running"],
                )
            }
        }
    }

    /// A precondition of the step cannot be evaluated as written
    pub fn classify_condition_error(&self, description: &str) -> ErrorClassification {
        ErrorClassification::new(
            FailureKind::ConditionResolution,
            "CONDITION_UNRESOLVABLE",
            description.to_string(),
            &["Fix the workflow definition: a referenced resource, location or field does not exist"],
        )
    }

    pub fn classify_transfer_error(&self, error: &TransferError) -> ErrorClassification {
        let error_code = match error {
            TransferError::NoTransferPathFound { .. } => "NO_TRANSFER_PATH",
            TransferError::InvalidWeight { .. } => "INVALID_TRANSFER_TEMPLATE",
            TransferError::Client(_) => "TRANSFER_DEFINITION_UNAVAILABLE",
        };
        ErrorClassification::new(
            FailureKind::NoTransferPath,
            error_code,
            error.to_string(),
            &["Check transfer templates and location representations, then retry the workflow"],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_timeouts_are_distinct_from_node_failures() {
        let classifier = StandardErrorClassifier::new();
        let timeout = classifier.classify_node_error(&NodeError::Timeout {
            node: "reader".into(),
            action_id: Uuid::new_v4(),
            timeout_ms: 10,
        });
        assert_eq!(timeout.kind, FailureKind::NodeTimeout);
        assert!(timeout.is_retryable());

        let failure = classifier.classify_action_failure(&ActionResult::failed(Uuid::new_v4(), "jam"));
        assert_eq!(failure.kind, FailureKind::NodeReportedFailure);
        assert_eq!(failure.error_message, "jam");
    }

    #[test]
    fn test_definition_errors_are_not_retryable() {
        let classifier = StandardErrorClassifier::new();
        assert!(!classifier.classify_condition_error("missing field").is_retryable());

        let no_path = classifier.classify_transfer_error(&TransferError::no_path("a", "c", "disconnected"));
        assert_eq!(no_path.kind, FailureKind::NoTransferPath);
        assert_eq!(no_path.error_code, "NO_TRANSFER_PATH");
        assert!(!no_path.is_retryable());
    }

    #[test]
    fn test_every_classification_suggests_a_remedy() {
        let classifier = StandardErrorClassifier::new();
        let classifications = [
            classifier.classify_action_failure(&ActionResult::failed(Uuid::new_v4(), "jam")),
            classifier.classify_node_error(&NodeError::DispatchFailed {
                node: "sealer".into(),
                reason: "connection refused".into(),
            }),
            classifier.classify_condition_error("missing field"),
            classifier.classify_transfer_error(&TransferError::no_path("a", "c", "disconnected")),
        ];
        assert!(classifications
            .iter()
            .all(|classification| !classification.remediation_suggestions.is_empty()));
    }
}
