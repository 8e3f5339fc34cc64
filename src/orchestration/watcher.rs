//! # Action Watchers
//!
//! One spawned task per in-flight action. The watcher hands the action to
//! its node, waits for a terminal result (or the timeout) and reports a
//! [`StepCompletion`] on the engine's completion channel. The engine loop
//! never waits on a node.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};

use super::error_classifier::{ErrorClassification, StandardErrorClassifier};
use super::types::{StepCompletion, StepOutcome};
use crate::client::{NodeClient, NodeError};
use crate::models::{ActionRequest, ActionResult, ActionStatus};

/// Everything a watcher needs to follow one action
#[derive(Debug, Clone)]
pub struct WatchedAction {
    pub node: String,
    pub request: ActionRequest,
    pub timeout: Duration,
}

pub fn spawn_action_watcher(
    nodes: Arc<dyn NodeClient>,
    action: WatchedAction,
    classifier: StandardErrorClassifier,
    completions: mpsc::Sender<StepCompletion>,
    wakeup: Arc<Notify>,
) -> JoinHandle<()> {
    let span = tracing::info_span!(
        "action_watcher",
        node = %action.node,
        action_id = %action.request.action_id,
        workflow_id = %action.request.workflow_id,
        step_index = action.request.step_index
    );

    tokio::spawn(
        async move {
            let outcome = watch_action(nodes.as_ref(), &action, &classifier).await;
            let completion = StepCompletion {
                workflow_id: action.request.workflow_id,
                step_index: action.request.step_index,
                action_id: action.request.action_id,
                node: action.node,
                outcome,
            };
            if completions.send(completion).await.is_err() {
                warn!("Engine stopped before the action completion could be recorded");
                return;
            }
            wakeup.notify_one();
        }
        .instrument(span),
    )
}

/// Dispatch and follow one action to a terminal outcome.
///
/// The action timeout bounds the whole exchange, including the hand-over
/// itself: a node that never answers `send_action` still yields a
/// `NodeTimeout` failure.
pub async fn watch_action(
    nodes: &dyn NodeClient,
    action: &WatchedAction,
    classifier: &StandardErrorClassifier,
) -> StepOutcome {
    let action_id = action.request.action_id;
    let follow = async {
        let sent: ActionResult = match nodes.send_action(&action.node, &action.request).await {
            Ok(sent) => sent,
            Err(err) => return Err(err),
        };
        if sent.status.is_terminal() {
            return Ok(sent);
        }
        debug!(timeout_ms = timeout_ms(action.timeout), "Awaiting action result");
        nodes
            .await_action_result(&action.node, action_id, action.timeout)
            .await
    };

    match tokio::time::timeout(action.timeout, follow).await {
        Ok(Ok(result)) => outcome_of(result, classifier),
        Ok(Err(err)) => failure(classifier.classify_node_error(&err)),
        Err(_) => {
            let err = NodeError::Timeout {
                node: action.node.clone(),
                action_id,
                timeout_ms: timeout_ms(action.timeout),
            };
            warn!(error = %err, "Action did not finish within its timeout");
            failure(classifier.classify_node_error(&err))
        }
    }
}

fn timeout_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

fn outcome_of(result: ActionResult, classifier: &StandardErrorClassifier) -> StepOutcome {
    match result.status {
        ActionStatus::Succeeded => StepOutcome::Succeeded {
            payload: result.payload,
        },
        _ => failure(classifier.classify_action_failure(&result)),
    }
}

fn failure(classification: ErrorClassification) -> StepOutcome {
    warn!(
        error_code = %classification.error_code,
        error = %classification.error_message,
        remediation = ?classification.remediation_suggestions,
        "Action failed"
    );
    StepOutcome::Failed {
        kind: classification.kind,
        reason: classification.error_message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{SimulatedNodeClient, SimulatedOutcome};
    use crate::models::WorkflowId;
    use crate::state_machine::FailureKind;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn action(timeout: Duration) -> WatchedAction {
        WatchedAction {
            node: "reader".into(),
            request: ActionRequest::new("read", BTreeMap::new(), WorkflowId::new(), 0),
            timeout,
        }
    }

    #[tokio::test]
    async fn test_immediate_success() {
        let nodes = SimulatedNodeClient::new();
        nodes.script("reader", "read", SimulatedOutcome::Succeed(json!({"od": 0.4})));
        let outcome = watch_action(&nodes, &action(Duration::from_secs(1)), &StandardErrorClassifier).await;
        assert_eq!(outcome, StepOutcome::Succeeded { payload: json!({"od": 0.4}) });
    }

    #[tokio::test]
    async fn test_hang_becomes_timeout() {
        let nodes = SimulatedNodeClient::new();
        nodes.script("reader", "read", SimulatedOutcome::Hang);
        let outcome =
            watch_action(&nodes, &action(Duration::from_millis(30)), &StandardErrorClassifier).await;
        assert!(matches!(
            outcome,
            StepOutcome::Failed {
                kind: FailureKind::NodeTimeout,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unanswered_dispatch_becomes_timeout() {
        let nodes = SimulatedNodeClient::new();
        nodes.script("reader", "read", SimulatedOutcome::Unresponsive);
        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            watch_action(&nodes, &action(Duration::from_millis(50)), &StandardErrorClassifier),
        )
        .await
        .expect("watcher must give up once the action timeout expires");

        assert!(matches!(
            outcome,
            StepOutcome::Failed {
                kind: FailureKind::NodeTimeout,
                ..
            }
        ));
        assert_eq!(nodes.dispatch_count("reader"), 1);
    }

    #[tokio::test]
    async fn test_spawned_watcher_reports_completion() {
        let nodes = Arc::new(SimulatedNodeClient::new());
        nodes.set_unreachable("reader", true);
        let (sender, mut receiver) = mpsc::channel(4);
        let handle = spawn_action_watcher(
            nodes,
            action(Duration::from_secs(1)),
            StandardErrorClassifier,
            sender,
            Arc::new(Notify::new()),
        );
        handle.await.unwrap();

        let completion = receiver.recv().await.unwrap();
        assert!(matches!(
            completion.outcome,
            StepOutcome::Failed {
                kind: FailureKind::DispatchError,
                ..
            }
        ));
    }
}
