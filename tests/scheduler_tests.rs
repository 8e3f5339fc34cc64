//! Scheduling policy behavior over hand-built queues

mod common;

use chrono::{Duration, Utc};
use common::*;
use serde_json::json;
use workcell_core::models::{ComparisonOperator, Condition, Resource, ResourceType, Step, Workflow};
use workcell_core::scheduler::{
    build_scheduler, BlockReason, FifoScheduler, PriorityScheduler, SchedulerKind, WorkflowScheduler,
};
use workcell_core::{StepStatus, WorkflowStatus};

fn queued(name: &str, node: &str, offset_ms: i64) -> Workflow {
    Workflow::new(name, vec![Step::new(name, "run", node)])
        .with_queued_at(Utc::now() - Duration::seconds(60) + Duration::milliseconds(offset_ms))
}

fn gated(name: &str, node: &str, offset_ms: i64) -> Workflow {
    let mut workflow = queued(name, node, offset_ms);
    workflow.steps[0] = workflow.steps[0].clone().with_condition(Condition::field_check(
        "reservoir",
        "quantity",
        ComparisonOperator::GreaterThanOrEqual,
        json!(10),
    ));
    workflow
}

#[tokio::test]
async fn test_fifo_selects_oldest_ready_workflow() {
    let workcell = TestWorkcell::new();
    let queue = vec![queued("late", "a", 20), queued("early", "b", 0), queued("middle", "c", 10)];

    let decision = FifoScheduler
        .next_runnable(&queue, &workcell.scheduler_context())
        .await;
    assert_eq!(decision.selected.map(|s| s.workflow_id), Some(queue[1].workflow_id));
    assert_eq!(decision.metadata.len(), 1);
}

#[tokio::test]
async fn test_blocked_head_does_not_block_queue() {
    let workcell = TestWorkcell::new();
    workcell
        .resources
        .insert(Resource::new("reservoir", "reservoir", ResourceType::Consumable).with_quantity(5.0, None));
    let queue = vec![gated("blocked", "liquid_handler", 0), queued("ready", "reader", 10)];

    let decision = FifoScheduler
        .next_runnable(&queue, &workcell.scheduler_context())
        .await;
    assert_eq!(decision.selected.map(|s| s.workflow_id), Some(queue[1].workflow_id));
    let head = &decision.metadata[&queue[0].workflow_id];
    assert!(!head.ready);
    assert_eq!(head.conditions_evaluated, 1);
    assert!(matches!(head.blocked, Some(BlockReason::ConditionNotMet { index: 0, .. })));
    assert!(decision.unresolvable().is_empty());
}

#[tokio::test]
async fn test_busy_node_is_skipped() {
    let workcell = TestWorkcell::new();
    let queue = vec![queued("first", "reader", 0), queued("second", "arm", 10)];
    let context = workcell.scheduler_context().with_busy_nodes(["reader"]);

    let decision = FifoScheduler.next_runnable(&queue, &context).await;
    assert_eq!(decision.selected.map(|s| s.workflow_id), Some(queue[1].workflow_id));
    assert_eq!(
        decision.metadata[&queue[0].workflow_id].blocked,
        Some(BlockReason::NodeBusy {
            node: "reader".into()
        })
    );

    let all_busy = workcell.scheduler_context().with_busy_nodes(["reader", "arm"]);
    let decision = FifoScheduler.next_runnable(&queue, &all_busy).await;
    assert!(decision.selected.is_none());
    assert_eq!(decision.metadata.len(), 2);
}

#[tokio::test]
async fn test_priority_scheduler_prefers_higher_priority() {
    let workcell = TestWorkcell::new();
    let queue = vec![
        queued("old low", "a", 0),
        queued("new high", "b", 20).with_priority(5),
        queued("old high", "c", 10).with_priority(5),
    ];

    let priority = PriorityScheduler
        .next_runnable(&queue, &workcell.scheduler_context())
        .await;
    assert_eq!(priority.selected.map(|s| s.workflow_id), Some(queue[2].workflow_id));

    let fifo = FifoScheduler
        .next_runnable(&queue, &workcell.scheduler_context())
        .await;
    assert_eq!(fifo.selected.map(|s| s.workflow_id), Some(queue[0].workflow_id));
}

#[tokio::test]
async fn test_non_runnable_workflows_are_reported() {
    let workcell = TestWorkcell::new();
    let mut paused = queued("paused", "a", 0);
    paused.status = WorkflowStatus::Paused;

    let mut in_flight = queued("in flight", "b", 10);
    in_flight.status = WorkflowStatus::Running;
    in_flight.steps[0].status = StepStatus::Running;

    let mut backing_off = queued("backing off", "c", 20);
    let not_before = Utc::now() + Duration::seconds(30);
    backing_off.steps[0].next_attempt_at = Some(not_before);

    let mut cancelling = queued("cancelling", "d", 30);
    cancelling.cancel_requested = true;

    let queue = vec![paused, in_flight, backing_off, cancelling];
    let decision = FifoScheduler
        .next_runnable(&queue, &workcell.scheduler_context())
        .await;

    assert!(decision.selected.is_none());
    let reasons: Vec<_> = queue
        .iter()
        .map(|w| decision.metadata[&w.workflow_id].blocked.clone())
        .collect();
    assert_eq!(
        reasons,
        vec![
            Some(BlockReason::NotRunnable {
                status: WorkflowStatus::Paused
            }),
            Some(BlockReason::StepInFlight { index: 0 }),
            Some(BlockReason::AwaitingRetry { not_before }),
            Some(BlockReason::CancelPending),
        ]
    );
}

#[tokio::test]
async fn test_unresolvable_conditions_are_surfaced() {
    let workcell = TestWorkcell::new();
    let queue = vec![gated("ghost", "liquid_handler", 0)];

    let decision = FifoScheduler
        .next_runnable(&queue, &workcell.scheduler_context())
        .await;
    assert!(decision.selected.is_none());
    let unresolvable = decision.unresolvable();
    assert_eq!(unresolvable.len(), 1);
    assert_eq!(unresolvable[0].0, queue[0].workflow_id);
    assert!(unresolvable[0].1.is_fatal());
}

#[tokio::test]
async fn test_selection_is_deterministic() {
    let workcell = TestWorkcell::new();
    let queue = vec![queued("a", "n1", 0), queued("b", "n2", 0), queued("c", "n3", 0)];
    let context = workcell.scheduler_context();

    for kind in [SchedulerKind::Fifo, SchedulerKind::Priority] {
        let scheduler = build_scheduler(kind);
        assert_eq!(scheduler.kind(), kind);
        let first = scheduler.next_runnable(&queue, &context).await;
        let second = scheduler.next_runnable(&queue, &context).await;
        assert_eq!(first, second);
    }
}
