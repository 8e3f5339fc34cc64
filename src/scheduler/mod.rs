//! # Workflow Scheduling
//!
//! Once per engine tick the installed [`WorkflowScheduler`] picks at most one
//! (workflow, step) pair to dispatch. Schedulers differ only in the order in
//! which they consider workflows; the readiness checks are shared:
//!
//! 1. workflow status is Queued or Running
//! 2. no cancel is pending
//! 3. no step of the workflow is in flight
//! 4. the current step is not waiting out a retry backoff
//! 5. every precondition holds (see [`crate::conditions`])
//! 6. the target node is not busy
//!
//! A blocked workflow never stalls the others: the scan moves on to the next
//! workflow and records why the blocked one was skipped.

pub mod fifo;
pub mod metadata;
pub mod priority;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::client::{LocationClient, ResourceClient};
use crate::conditions::evaluate_all;
use crate::models::Workflow;

pub use fifo::FifoScheduler;
pub use metadata::{BlockReason, ScheduledStep, SchedulerMetadata, SchedulingDecision};
pub use priority::PriorityScheduler;

/// Snapshot handed to the scheduler for one tick
#[derive(Clone)]
pub struct SchedulerContext {
    pub resources: Arc<dyn ResourceClient>,
    pub locations: Arc<dyn LocationClient>,
    /// Nodes currently running an action
    pub busy_nodes: BTreeSet<String>,
    pub now: DateTime<Utc>,
}

impl fmt::Debug for SchedulerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerContext")
            .field("busy_nodes", &self.busy_nodes)
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

impl SchedulerContext {
    pub fn new(resources: Arc<dyn ResourceClient>, locations: Arc<dyn LocationClient>) -> Self {
        Self {
            resources,
            locations,
            busy_nodes: BTreeSet::new(),
            now: Utc::now(),
        }
    }

    pub fn with_busy_nodes<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.busy_nodes = nodes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn is_node_busy(&self, node: &str) -> bool {
        self.busy_nodes.contains(node)
    }
}

/// The supported scheduling policies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    /// Queue insertion order
    #[default]
    Fifo,
    /// Higher workflow priority first, then queue insertion order
    Priority,
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fifo => write!(f, "fifo"),
            Self::Priority => write!(f, "priority"),
        }
    }
}

/// Policy selecting the next runnable step
#[async_trait]
pub trait WorkflowScheduler: Send + Sync {
    fn kind(&self) -> SchedulerKind;

    /// Indices into `queue` in the order workflows should be considered.
    /// Must depend only on the queue contents.
    fn order(&self, queue: &[Workflow]) -> Vec<usize>;

    /// Scan the queue in [`WorkflowScheduler::order`] and select the first
    /// workflow whose current step is ready. Deterministic for identical
    /// queue contents and context.
    async fn next_runnable(
        &self,
        queue: &[Workflow],
        context: &SchedulerContext,
    ) -> SchedulingDecision {
        let mut decision = SchedulingDecision::default();
        for position in self.order(queue) {
            let Some(workflow) = queue.get(position) else {
                continue;
            };
            let metadata = assess(workflow, context).await;
            let ready = metadata.ready;
            decision.metadata.insert(workflow.workflow_id, metadata);
            if ready {
                decision.selected = Some(ScheduledStep {
                    workflow_id: workflow.workflow_id,
                    step_index: workflow.step_index,
                });
                break;
            }
        }
        decision
    }
}

/// Readiness of a workflow's current step
#[instrument(skip(workflow, context), fields(workflow_id = %workflow.workflow_id, step_index = workflow.step_index))]
pub async fn assess(workflow: &Workflow, context: &SchedulerContext) -> SchedulerMetadata {
    if !workflow.status.is_schedulable() {
        return SchedulerMetadata::blocked(
            BlockReason::NotRunnable {
                status: workflow.status,
            },
            0,
        );
    }
    if workflow.cancel_requested {
        return SchedulerMetadata::blocked(BlockReason::CancelPending, 0);
    }
    if let Some(index) = workflow.in_flight_step() {
        return SchedulerMetadata::blocked(BlockReason::StepInFlight { index }, 0);
    }
    let Some(step) = workflow.current_step() else {
        return SchedulerMetadata::blocked(
            BlockReason::NotRunnable {
                status: workflow.status,
            },
            0,
        );
    };
    if let Some(not_before) = step.next_attempt_at {
        if not_before > context.now {
            return SchedulerMetadata::blocked(BlockReason::AwaitingRetry { not_before }, 0);
        }
    }

    let metadata = evaluate_all(step, context).await;
    if !metadata.ready {
        return metadata;
    }

    // Transfer steps are checked against their hop nodes after planning
    if let Some(node) = step.node.as_deref() {
        if context.is_node_busy(node) {
            debug!(node, "Target node busy, deferring");
            return SchedulerMetadata::blocked(
                BlockReason::NodeBusy {
                    node: node.to_string(),
                },
                metadata.conditions_evaluated,
            );
        }
    }
    metadata
}

/// Instantiate the configured policy
pub fn build_scheduler(kind: SchedulerKind) -> Arc<dyn WorkflowScheduler> {
    match kind {
        SchedulerKind::Fifo => Arc::new(FifoScheduler),
        SchedulerKind::Priority => Arc::new(PriorityScheduler),
    }
}
