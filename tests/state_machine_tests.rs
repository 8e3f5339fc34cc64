//! Workflow lifecycle through the pure state machine and the in-memory state store

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use workcell_core::models::{Step, Workflow};
use workcell_core::state_machine::{
    FailureKind, InMemoryStateStore, PersistenceError, RetryPolicy, StateMachineError, StateStore,
    TransitionEffect, WorkflowEvent, WorkflowStateMachine,
};
use workcell_core::system_events as events;
use workcell_core::{StepStatus, WorkflowStatus};

fn machine() -> WorkflowStateMachine {
    WorkflowStateMachine::new(RetryPolicy::default())
}

fn two_steps() -> Workflow {
    Workflow::new(
        "prep",
        vec![
            Step::new("pick", "pick", "arm").with_max_retries(1),
            Step::new("read", "read_od", "reader"),
        ],
    )
}

/// Start and succeed the current step, returning the new workflow value
fn complete_current(machine: &WorkflowStateMachine, workflow: &Workflow) -> Workflow {
    let index = workflow.step_index;
    let started = machine
        .advance(
            workflow,
            WorkflowEvent::StepStarted {
                index,
                action_id: Uuid::new_v4(),
            },
            Utc::now(),
        )
        .unwrap();
    machine
        .advance(
            &started.workflow,
            WorkflowEvent::StepSucceeded {
                index,
                payload: json!({}),
            },
            Utc::now(),
        )
        .unwrap()
        .workflow
}

#[test]
fn test_full_lifecycle_to_completion() {
    let machine = machine();
    let workflow = two_steps();

    let started = machine
        .advance(
            &workflow,
            WorkflowEvent::StepStarted {
                index: 0,
                action_id: Uuid::new_v4(),
            },
            Utc::now(),
        )
        .unwrap();
    assert_eq!(started.from, WorkflowStatus::Queued);
    assert_eq!(started.to, WorkflowStatus::Running);
    assert_eq!(
        started.event_names(),
        vec![events::WORKFLOW_STARTED, events::STEP_DISPATCHED]
    );
    assert!(matches!(
        started.effects.as_slice(),
        [TransitionEffect::DispatchStep { index: 0, .. }]
    ));

    let after_first = machine
        .advance(
            &started.workflow,
            WorkflowEvent::StepSucceeded {
                index: 0,
                payload: json!({"picked": true}),
            },
            Utc::now(),
        )
        .unwrap();
    assert_eq!(after_first.workflow.step_index, 1);
    assert!(!after_first.is_terminal());

    let done = complete_current(&machine, &after_first.workflow);
    assert_eq!(done.status, WorkflowStatus::Completed);
    assert!(done.ended_at.is_some());
    assert_eq!(
        done.step_statuses(),
        vec![StepStatus::Succeeded, StepStatus::Succeeded]
    );
}

#[test]
fn test_input_workflow_is_never_mutated() {
    let machine = machine();
    let workflow = two_steps();
    let snapshot = workflow.clone();
    machine
        .advance(
            &workflow,
            WorkflowEvent::StepStarted {
                index: 0,
                action_id: Uuid::new_v4(),
            },
            Utc::now(),
        )
        .unwrap();
    assert_eq!(workflow, snapshot);
}

#[test]
fn test_retry_budget_then_failure() {
    let machine = machine();
    let mut workflow = two_steps();

    for attempt in 1..=2 {
        let started = machine
            .advance(
                &workflow,
                WorkflowEvent::StepStarted {
                    index: 0,
                    action_id: Uuid::new_v4(),
                },
                Utc::now(),
            )
            .unwrap();
        let failed = machine
            .advance(
                &started.workflow,
                WorkflowEvent::StepFailed {
                    index: 0,
                    kind: FailureKind::NodeReportedFailure,
                    reason: "gripper fault".into(),
                },
                Utc::now(),
            )
            .unwrap();
        workflow = failed.workflow.clone();
        workflow.steps[0].next_attempt_at = None;
        if attempt == 1 {
            assert_eq!(workflow.status, WorkflowStatus::Running);
            assert_eq!(workflow.steps[0].status, StepStatus::Pending);
            assert!(failed.event_names().contains(&events::STEP_RETRY_SCHEDULED));
        } else {
            assert_eq!(workflow.status, WorkflowStatus::Failed);
            assert_eq!(workflow.steps[0].status, StepStatus::Failed);
            assert!(failed.event_names().contains(&events::WORKFLOW_FAILED));
        }
    }
}

#[test]
fn test_pause_resume_round_trip() {
    let machine = machine();
    let running = machine
        .advance(
            &two_steps(),
            WorkflowEvent::StepStarted {
                index: 0,
                action_id: Uuid::new_v4(),
            },
            Utc::now(),
        )
        .unwrap()
        .workflow;

    let paused = machine.advance(&running, WorkflowEvent::Pause, Utc::now()).unwrap();
    assert_eq!(paused.to, WorkflowStatus::Paused);
    assert!(paused
        .effects
        .iter()
        .any(|effect| matches!(effect, TransitionEffect::PropagateAdminCommand { node, .. } if node == "arm")));

    // A completion that arrives while paused is still recorded
    let settled = machine
        .advance(
            &paused.workflow,
            WorkflowEvent::StepSucceeded {
                index: 0,
                payload: json!({}),
            },
            Utc::now(),
        )
        .unwrap();
    assert_eq!(settled.to, WorkflowStatus::Paused);

    let resumed = machine
        .advance(&settled.workflow, WorkflowEvent::Resume, Utc::now())
        .unwrap();
    assert_eq!(resumed.to, WorkflowStatus::Running);
    assert_eq!(resumed.workflow.step_index, 1);
}

#[test]
fn test_terminal_workflows_reject_operator_events() {
    let machine = machine();
    let cancelled = machine
        .advance(&two_steps(), WorkflowEvent::Cancel, Utc::now())
        .unwrap()
        .workflow;
    assert_eq!(cancelled.status, WorkflowStatus::Cancelled);

    for event in [WorkflowEvent::Pause, WorkflowEvent::Resume, WorkflowEvent::Cancel] {
        assert!(matches!(
            machine.advance(&cancelled, event, Utc::now()),
            Err(StateMachineError::InvalidTransition { .. })
        ));
    }

}

#[test]
fn test_cancelled_workflow_cannot_be_retried() {
    let machine = machine();
    let cancelled = machine
        .advance(&two_steps(), WorkflowEvent::Cancel, Utc::now())
        .unwrap()
        .workflow;

    assert!(matches!(
        machine.advance(&cancelled, WorkflowEvent::Retry { index: 0 }, Utc::now()),
        Err(StateMachineError::InvalidTransition { .. })
    ));
}

#[test]
fn test_transfer_step_cannot_start_unplanned() {
    let machine = machine();
    let workflow = Workflow::new("move", vec![Step::transfer("move", "deck_a", "deck_b")]);
    assert!(matches!(
        machine.advance(
            &workflow,
            WorkflowEvent::StepStarted {
                index: 0,
                action_id: Uuid::new_v4()
            },
            Utc::now()
        ),
        Err(StateMachineError::GuardFailed { .. })
    ));
}

#[tokio::test]
async fn test_store_enforces_versions() {
    let store = InMemoryStateStore::new();
    let workflow = two_steps();
    store.insert(&workflow).await.unwrap();
    assert!(matches!(
        store.insert(&workflow).await,
        Err(PersistenceError::AlreadyExists { .. })
    ));

    let next = complete_current(&machine(), &workflow);
    let stored = store.compare_and_set(&next, 0).await.unwrap();
    assert_eq!(stored.version, 1);

    // A writer holding the old version loses
    assert!(matches!(
        store.compare_and_set(&next, 0).await,
        Err(PersistenceError::ConcurrentModification {
            expected: 0,
            actual: 1,
            ..
        })
    ));
}

#[tokio::test]
async fn test_archive_and_restore() {
    let store = InMemoryStateStore::new();
    let machine = machine();
    let workflow = two_steps();
    store.insert(&workflow).await.unwrap();

    let cancelled = machine
        .advance(&workflow, WorkflowEvent::Cancel, Utc::now())
        .unwrap()
        .workflow;
    store.compare_and_set(&cancelled, 0).await.unwrap();
    store.archive(workflow.workflow_id).await.unwrap();

    assert!(store.list_active().await.unwrap().is_empty());
    assert_eq!(store.list_archived().await.unwrap().len(), 1);
    assert_eq!(
        store.get(workflow.workflow_id).await.unwrap().map(|w| w.status),
        Some(WorkflowStatus::Cancelled)
    );

    let restored = store.restore(workflow.workflow_id).await.unwrap();
    assert_eq!(restored.version, 1);
    assert_eq!(store.list_active().await.unwrap().len(), 1);
    assert!(store.list_archived().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_active_workflows_are_listed_in_queue_order() {
    let store = InMemoryStateStore::new();
    let now = Utc::now();
    let late = two_steps().with_queued_at(now);
    let early = two_steps().with_queued_at(now - chrono::Duration::seconds(5));
    store.insert(&late).await.unwrap();
    store.insert(&early).await.unwrap();

    let ids: Vec<_> = store
        .list_active()
        .await
        .unwrap()
        .into_iter()
        .map(|w| w.workflow_id)
        .collect();
    assert_eq!(ids, vec![early.workflow_id, late.workflow_id]);
}
