//! # System Constants
//!
//! Core constants that define the operational boundaries of the workcell
//! execution engine: lifecycle event names, system defaults and status groups.

// Re-export state types for convenience
pub use crate::state_machine::{StepStatus, WorkflowStatus};

/// Lifecycle events published for every applied state transition
pub mod events {
    // Workflow lifecycle events
    pub const WORKFLOW_QUEUED: &str = "workflow.queued";
    pub const WORKFLOW_STARTED: &str = "workflow.started";
    pub const WORKFLOW_PAUSED: &str = "workflow.paused";
    pub const WORKFLOW_RESUMED: &str = "workflow.resumed";
    pub const WORKFLOW_CANCEL_REQUESTED: &str = "workflow.cancel_requested";
    pub const WORKFLOW_CANCELLED: &str = "workflow.cancelled";
    pub const WORKFLOW_COMPLETED: &str = "workflow.completed";
    pub const WORKFLOW_FAILED: &str = "workflow.failed";
    pub const WORKFLOW_RETRIED: &str = "workflow.retried";

    // Step lifecycle events
    pub const STEP_DISPATCHED: &str = "step.dispatched";
    pub const STEP_SUCCEEDED: &str = "step.succeeded";
    pub const STEP_FAILED: &str = "step.failed";
    pub const STEP_RETRY_SCHEDULED: &str = "step.retry_scheduled";
    pub const STEP_SKIPPED: &str = "step.skipped";

    // Transfer planning events
    pub const TRANSFER_PLANNED: &str = "transfer.planned";
}

pub mod system {
    /// Version compatibility marker
    pub const WORKCELL_CORE_VERSION: &str = "0.1.0";

    /// Default argument name carrying the source location of a transfer hop
    pub const DEFAULT_SOURCE_ARGUMENT: &str = "source";

    /// Default argument name carrying the target location of a transfer hop
    pub const DEFAULT_TARGET_ARGUMENT: &str = "target";

    /// Interval between status polls while awaiting an in-flight action
    pub const DEFAULT_ACTION_POLL_INTERVAL_MS: u64 = 500;

    /// Maximum number of steps in a single workflow, after transfer expansion
    pub const MAX_WORKFLOW_STEPS: usize = 1000;

    /// Lifecycle events buffered per subscriber before the oldest are dropped
    pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1000;

    /// Environment variable prefix for configuration overrides
    pub const CONFIG_ENV_PREFIX: &str = "WORKCELL";
}

/// Status groupings for validation and logic
pub mod status_groups {
    use super::{StepStatus, WorkflowStatus};

    /// Workflow statuses the scheduler may pick work from
    pub const SCHEDULABLE_WORKFLOW_STATUSES: &[WorkflowStatus] =
        &[WorkflowStatus::Queued, WorkflowStatus::Running];

    /// Workflow statuses that end the workflow's life in the active queue
    pub const WORKFLOW_FINAL_STATES: &[WorkflowStatus] = &[
        WorkflowStatus::Completed,
        WorkflowStatus::Failed,
        WorkflowStatus::Cancelled,
    ];

    /// Workflow statuses from which `Retry(index)` is accepted
    pub const RETRYABLE_WORKFLOW_STATUSES: &[WorkflowStatus] = &[
        WorkflowStatus::Failed,
        WorkflowStatus::Running,
        WorkflowStatus::Paused,
    ];

    /// Step statuses that let the step pointer move past a step
    pub const STEP_SEQUENCE_SATISFIED_STATES: &[StepStatus] =
        &[StepStatus::Succeeded, StepStatus::Skipped];
}
