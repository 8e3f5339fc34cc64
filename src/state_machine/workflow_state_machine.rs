//! # Workflow State Machine
//!
//! Pure transition function over [`Workflow`] values.
//!
//! ```text
//! Queued ──▶ Running ──▶ Completed | Failed | Cancelled
//!              ▲  │
//!     Resume   │  ▼  Pause
//!            Paused
//!
//! Failed | Running | Paused ──Retry(index)──▶ Running (Paused stays Paused)
//! ```
//!
//! [`WorkflowStateMachine::advance`] never mutates its input and never performs
//! I/O. It returns the next workflow value together with the
//! [`TransitionEffect`]s the engine must execute. Events that are not legal in
//! the current state are rejected with [`StateMachineError::InvalidTransition`].

use chrono::{DateTime, Utc};
use tracing::debug;

use super::actions::{determine_event_names, TransitionEffect};
use super::errors::{StateMachineError, StateMachineResult};
use super::events::{FailureKind, WorkflowEvent};
use super::guards::{CurrentStepGuard, NoStepInFlightGuard, StateGuard, StepIndexInRangeGuard};
use super::states::{StepStatus, WorkflowStatus};
use crate::config::RetryConfig;
use crate::constants::status_groups::RETRYABLE_WORKFLOW_STATUSES;
use crate::models::{AdminCommand, FailurePolicy, StepResult, Workflow};
use crate::orchestration::backoff_calculator::BackoffCalculator;
use serde_json::Value;
use uuid::Uuid;

/// Retry budget and backoff applied to retryable step failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub default_max_retries: u32,
    pub backoff: BackoffCalculator,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            default_max_retries: config.default_max_retries,
            backoff: BackoffCalculator::new(config.backoff()),
        }
    }
}

/// Result of applying one event
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub workflow: Workflow,
    pub from: WorkflowStatus,
    pub to: WorkflowStatus,
    pub event: WorkflowEvent,
    pub effects: Vec<TransitionEffect>,
}

impl Transition {
    /// Lifecycle event names this transition makes observable
    pub fn event_names(&self) -> Vec<&'static str> {
        determine_event_names(self)
    }

    pub fn is_terminal(&self) -> bool {
        self.to.is_terminal()
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowStateMachine {
    retry_policy: RetryPolicy,
}

impl WorkflowStateMachine {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Apply `event` to `workflow` as of `now`
    pub fn advance(
        &self,
        workflow: &Workflow,
        event: WorkflowEvent,
        now: DateTime<Utc>,
    ) -> StateMachineResult<Transition> {
        let from = workflow.status;
        let mut next = workflow.clone();
        let mut effects = Vec::new();

        match &event {
            WorkflowEvent::StepStarted { index, action_id } => {
                self.start_step(&mut next, &event, *index, *action_id, now, &mut effects)?
            }
            WorkflowEvent::StepSucceeded { index, payload } => {
                self.succeed_step(&mut next, &event, *index, payload, now, &mut effects)?
            }
            WorkflowEvent::StepFailed {
                index,
                kind,
                reason,
            } => self.fail_step(&mut next, &event, *index, *kind, reason, now, &mut effects)?,
            WorkflowEvent::Pause => {
                require_status(from, &event, &[WorkflowStatus::Queued, WorkflowStatus::Running])?;
                next.status = WorkflowStatus::Paused;
                propagate_admin_command(&next, AdminCommand::Pause, &mut effects);
            }
            WorkflowEvent::Resume => {
                require_status(from, &event, &[WorkflowStatus::Paused])?;
                next.status = if next.started_at.is_some() {
                    WorkflowStatus::Running
                } else {
                    WorkflowStatus::Queued
                };
                propagate_admin_command(&next, AdminCommand::Resume, &mut effects);
            }
            WorkflowEvent::Cancel => {
                require_status(
                    from,
                    &event,
                    &[
                        WorkflowStatus::Queued,
                        WorkflowStatus::Running,
                        WorkflowStatus::Paused,
                    ],
                )?;
                if next.in_flight_step().is_some() {
                    next.cancel_requested = true;
                    propagate_admin_command(&next, AdminCommand::Cancel, &mut effects);
                } else {
                    finalize(&mut next, WorkflowStatus::Cancelled, now, &mut effects);
                }
            }
            WorkflowEvent::Retry { index } => {
                require_status(from, &event, RETRYABLE_WORKFLOW_STATUSES)?;
                StepIndexInRangeGuard { index: *index }.check(&next)?;
                NoStepInFlightGuard.check(&next)?;
                if *index > next.step_index {
                    return Err(StateMachineError::GuardFailed {
                        reason: format!(
                            "Cannot retry from step {index}: step {} has not completed",
                            next.step_index
                        ),
                    });
                }

                for step in next.steps.iter_mut().skip(*index) {
                    step.reset();
                }
                next.step_index = *index;
                next.retry_count += 1;
                next.cancel_requested = false;
                next.ended_at = None;
                next.started_at.get_or_insert(now);
                next.status = if from == WorkflowStatus::Paused {
                    WorkflowStatus::Paused
                } else {
                    WorkflowStatus::Running
                };
            }
        }

        let to = next.status;
        debug!(
            workflow_id = %next.workflow_id,
            event = event.event_type(),
            from = %from,
            to = %to,
            effects = effects.len(),
            "STATE_MACHINE: Applied workflow event"
        );

        Ok(Transition {
            workflow: next,
            from,
            to,
            event,
            effects,
        })
    }

    fn start_step(
        &self,
        next: &mut Workflow,
        event: &WorkflowEvent,
        index: usize,
        action_id: Uuid,
        now: DateTime<Utc>,
        effects: &mut Vec<TransitionEffect>,
    ) -> StateMachineResult<()> {
        require_status(
            next.status,
            event,
            &[WorkflowStatus::Queued, WorkflowStatus::Running],
        )?;
        if next.cancel_requested {
            return Err(StateMachineError::InvalidTransition {
                from: next.status,
                event: event.event_type(),
            });
        }
        CurrentStepGuard { index }.check(next)?;
        NoStepInFlightGuard.check(next)?;

        let step = &mut next.steps[index];
        require_step_status(index, step.status, &[StepStatus::Pending], "pending")?;
        let node = step.node.clone().ok_or_else(|| StateMachineError::GuardFailed {
            reason: format!("Step {index} has no target node; transfer steps must be planned first"),
        })?;

        step.status = StepStatus::Running;
        step.attempts += 1;
        step.started_at = Some(now);
        step.ended_at = None;
        step.next_attempt_at = None;
        step.action_id = Some(action_id);
        step.error = None;
        effects.push(TransitionEffect::DispatchStep {
            index,
            node,
            action: step.action.clone(),
            action_id,
        });

        mark_started(next, now);
        Ok(())
    }

    fn succeed_step(
        &self,
        next: &mut Workflow,
        event: &WorkflowEvent,
        index: usize,
        payload: &Value,
        now: DateTime<Utc>,
        effects: &mut Vec<TransitionEffect>,
    ) -> StateMachineResult<()> {
        require_status(
            next.status,
            event,
            &[
                WorkflowStatus::Queued,
                WorkflowStatus::Running,
                WorkflowStatus::Paused,
            ],
        )?;
        CurrentStepGuard { index }.check(next)?;

        let step = &mut next.steps[index];
        require_step_status(
            index,
            step.status,
            &[StepStatus::Running, StepStatus::Pending],
            "running or pending",
        )?;
        step.status = StepStatus::Succeeded;
        step.ended_at = Some(now);
        step.error = None;
        step.result = Some(StepResult {
            action_id: step.action_id,
            payload: payload.clone(),
            completed_at: now,
        });
        if !step.resource_updates.is_empty() {
            effects.push(TransitionEffect::IssueResourceUpdates {
                index,
                updates: step.resource_updates.clone(),
            });
        }

        next.step_index += 1;
        if next.status == WorkflowStatus::Queued {
            mark_started(next, now);
        }
        settle_step_boundary(next, now, effects);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn fail_step(
        &self,
        next: &mut Workflow,
        event: &WorkflowEvent,
        index: usize,
        kind: FailureKind,
        reason: &str,
        now: DateTime<Utc>,
        effects: &mut Vec<TransitionEffect>,
    ) -> StateMachineResult<()> {
        require_status(
            next.status,
            event,
            &[
                WorkflowStatus::Queued,
                WorkflowStatus::Running,
                WorkflowStatus::Paused,
            ],
        )?;
        CurrentStepGuard { index }.check(next)?;

        let max_retries = next.steps[index]
            .max_retries
            .unwrap_or(self.retry_policy.default_max_retries);
        let step = &mut next.steps[index];
        require_step_status(
            index,
            step.status,
            &[StepStatus::Running, StepStatus::Pending],
            "running or pending",
        )?;
        step.error = Some(reason.to_string());
        step.ended_at = Some(now);

        if next.cancel_requested {
            step.status = StepStatus::Failed;
            finalize(next, WorkflowStatus::Cancelled, now, effects);
            return Ok(());
        }

        // attempts counts dispatches, so attempts - 1 retries have been used
        if kind.is_retryable() && step.attempts <= max_retries {
            let attempt = step.attempts;
            let backoff = self.retry_policy.backoff.calculate(attempt.max(1), now);
            step.status = StepStatus::Pending;
            step.next_attempt_at = Some(backoff.next_attempt_at);
            effects.push(TransitionEffect::ScheduleRetry {
                index,
                attempt,
                not_before: backoff.next_attempt_at,
            });
            return Ok(());
        }

        if step.on_failure == FailurePolicy::Skip {
            step.status = StepStatus::Skipped;
            next.step_index += 1;
            if next.status == WorkflowStatus::Queued {
                mark_started(next, now);
            }
            settle_step_boundary(next, now, effects);
            return Ok(());
        }

        step.status = StepStatus::Failed;
        finalize(next, WorkflowStatus::Failed, now, effects);
        Ok(())
    }
}

fn require_status(
    from: WorkflowStatus,
    event: &WorkflowEvent,
    allowed: &[WorkflowStatus],
) -> StateMachineResult<()> {
    if allowed.contains(&from) {
        Ok(())
    } else {
        Err(StateMachineError::InvalidTransition {
            from,
            event: event.event_type(),
        })
    }
}

fn require_step_status(
    index: usize,
    status: StepStatus,
    allowed: &[StepStatus],
    expected: &'static str,
) -> StateMachineResult<()> {
    if allowed.contains(&status) {
        Ok(())
    } else {
        Err(StateMachineError::InvalidStepState {
            index,
            status,
            expected,
        })
    }
}

fn mark_started(workflow: &mut Workflow, now: DateTime<Utc>) {
    workflow.started_at.get_or_insert(now);
    if workflow.status == WorkflowStatus::Queued {
        workflow.status = WorkflowStatus::Running;
    }
}

/// Called once the pointer moved past a step: apply a pending cancel or complete
fn settle_step_boundary(
    workflow: &mut Workflow,
    now: DateTime<Utc>,
    effects: &mut Vec<TransitionEffect>,
) {
    if workflow.cancel_requested {
        finalize(workflow, WorkflowStatus::Cancelled, now, effects);
    } else if workflow.all_steps_satisfied() {
        finalize(workflow, WorkflowStatus::Completed, now, effects);
    }
}

fn finalize(
    workflow: &mut Workflow,
    status: WorkflowStatus,
    now: DateTime<Utc>,
    effects: &mut Vec<TransitionEffect>,
) {
    workflow.status = status;
    workflow.cancel_requested = false;
    workflow.ended_at = Some(now);
    effects.push(TransitionEffect::Finalize { status });
}

fn propagate_admin_command(
    workflow: &Workflow,
    command: AdminCommand,
    effects: &mut Vec<TransitionEffect>,
) {
    let node = workflow
        .in_flight_step()
        .and_then(|index| workflow.steps[index].node.clone());
    if let Some(node) = node {
        effects.push(TransitionEffect::PropagateAdminCommand { node, command });
    }
}
