use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::WorkflowEvent;
use super::states::{StepStatus, WorkflowStatus};
use super::workflow_state_machine::Transition;
use crate::constants::events;
use crate::models::{AdminCommand, QuantityUpdate};

/// Side effects a transition asks the engine to carry out.
///
/// The state machine never performs I/O itself; it only describes what must
/// happen for the new state to be reflected in the outside world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum TransitionEffect {
    /// Hand the step to its node
    DispatchStep {
        index: usize,
        node: String,
        action: String,
        action_id: Uuid,
    },
    /// The step returned to Pending and may be dispatched again at `not_before`
    ScheduleRetry {
        index: usize,
        attempt: u32,
        not_before: DateTime<Utc>,
    },
    /// Forward an operator command to the node running the in-flight step
    PropagateAdminCommand { node: String, command: AdminCommand },
    /// Ask the resource service to apply quantity changes
    IssueResourceUpdates {
        index: usize,
        updates: Vec<QuantityUpdate>,
    },
    /// The workflow reached a terminal status and can be archived
    Finalize { status: WorkflowStatus },
}

impl TransitionEffect {
    pub fn effect_type(&self) -> &'static str {
        match self {
            Self::DispatchStep { .. } => "dispatch_step",
            Self::ScheduleRetry { .. } => "schedule_retry",
            Self::PropagateAdminCommand { .. } => "propagate_admin_command",
            Self::IssueResourceUpdates { .. } => "issue_resource_updates",
            Self::Finalize { .. } => "finalize",
        }
    }
}

/// Lifecycle event names observable for a transition, in emission order
pub fn determine_event_names(transition: &Transition) -> Vec<&'static str> {
    let mut names = Vec::new();
    let started = transition.from == WorkflowStatus::Queued
        && transition.workflow.started_at.is_some()
        && matches!(
            transition.event,
            WorkflowEvent::StepStarted { .. }
                | WorkflowEvent::StepSucceeded { .. }
                | WorkflowEvent::StepFailed { .. }
        );
    if started {
        names.push(events::WORKFLOW_STARTED);
    }

    match &transition.event {
        WorkflowEvent::StepStarted { .. } => names.push(events::STEP_DISPATCHED),
        WorkflowEvent::StepSucceeded { .. } => names.push(events::STEP_SUCCEEDED),
        WorkflowEvent::StepFailed { index, .. } => {
            names.push(events::STEP_FAILED);
            let retried = transition
                .effects
                .iter()
                .any(|effect| matches!(effect, TransitionEffect::ScheduleRetry { .. }));
            let skipped = transition
                .workflow
                .steps
                .get(*index)
                .is_some_and(|step| step.status == StepStatus::Skipped);
            if retried {
                names.push(events::STEP_RETRY_SCHEDULED);
            } else if skipped {
                names.push(events::STEP_SKIPPED);
            }
        }
        WorkflowEvent::Pause => names.push(events::WORKFLOW_PAUSED),
        WorkflowEvent::Resume => names.push(events::WORKFLOW_RESUMED),
        WorkflowEvent::Cancel => {
            if transition.to != WorkflowStatus::Cancelled {
                names.push(events::WORKFLOW_CANCEL_REQUESTED);
            }
        }
        WorkflowEvent::Retry { .. } => names.push(events::WORKFLOW_RETRIED),
    }

    if transition.from != transition.to {
        match transition.to {
            WorkflowStatus::Completed => names.push(events::WORKFLOW_COMPLETED),
            WorkflowStatus::Failed => names.push(events::WORKFLOW_FAILED),
            WorkflowStatus::Cancelled => names.push(events::WORKFLOW_CANCELLED),
            _ => {}
        }
    }

    names
}
