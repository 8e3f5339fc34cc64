//! # Workflow Model
//!
//! A workflow is an ordered sequence of [`Step`]s executed strictly in order
//! against the nodes of a workcell.
//!
//! ## Step pointer
//!
//! `step_index` names the next step that has not yet reached a sequence-satisfying
//! state (Succeeded or Skipped). It only moves forward, except through an
//! explicit retry-from-index, and never exceeds `steps.len()`. A pointer equal
//! to `steps.len()` means every step has been satisfied.
//!
//! ## Concurrency
//!
//! `version` is bumped by the state store on every successful compare-and-set;
//! callers hand back the version they read so concurrent writers are detected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::step::Step;
use crate::state_machine::states::{StepStatus, WorkflowStatus};

/// Time-sortable workflow identity (UUID v7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(Uuid);

impl WorkflowId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for WorkflowId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for WorkflowId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Who a workflow runs on behalf of
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ownership {
    pub user: Option<String>,
    pub experiment_id: Option<String>,
    pub campaign_id: Option<String>,
}

/// A submitted workflow and its live execution state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub workflow_id: WorkflowId,
    pub name: String,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub status: WorkflowStatus,
    #[serde(default)]
    pub step_index: usize,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ownership: Ownership,
    /// Higher runs first under the priority scheduler
    #[serde(default)]
    pub priority: i32,
    /// Number of accepted retry-from-index operations
    #[serde(default)]
    pub retry_count: u32,
    /// Cancel posted while a step was in flight; applied at the next step boundary
    #[serde(default)]
    pub cancel_requested: bool,
    #[serde(default)]
    pub version: u64,
}

impl Workflow {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            workflow_id: WorkflowId::new(),
            name: name.into(),
            steps,
            status: WorkflowStatus::Queued,
            step_index: 0,
            queued_at: Utc::now(),
            started_at: None,
            ended_at: None,
            ownership: Ownership::default(),
            priority: 0,
            retry_count: 0,
            cancel_requested: false,
            version: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    pub fn with_queued_at(mut self, queued_at: DateTime<Utc>) -> Self {
        self.queued_at = queued_at;
        self
    }

    /// Step at the pointer, `None` once every step is satisfied
    pub fn current_step(&self) -> Option<&Step> {
        self.steps.get(self.step_index)
    }

    pub fn all_steps_satisfied(&self) -> bool {
        self.step_index >= self.steps.len()
    }

    /// Index of the step currently running on a node, if any
    pub fn in_flight_step(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| step.status == StepStatus::Running)
    }

    pub fn step_statuses(&self) -> Vec<StepStatus> {
        self.steps.iter().map(|step| step.status).collect()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// FIFO ordering key: queue insertion time, then the sortable id
    pub fn queue_key(&self) -> (DateTime<Utc>, WorkflowId) {
        (self.queued_at, self.workflow_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_ids_sort_by_creation() {
        let first = WorkflowId::new();
        let second = WorkflowId::new();
        assert!(first < second);
        assert_eq!(first.to_string().parse::<WorkflowId>().unwrap(), first);
    }

    #[test]
    fn test_pointer_helpers() {
        let mut workflow = Workflow::new(
            "prep",
            vec![Step::new("s0", "noop", "node_a"), Step::new("s1", "noop", "node_a")],
        );
        assert_eq!(workflow.current_step().map(|s| s.name.as_str()), Some("s0"));
        assert_eq!(workflow.in_flight_step(), None);

        workflow.steps[0].status = StepStatus::Running;
        assert_eq!(workflow.in_flight_step(), Some(0));

        workflow.step_index = 2;
        assert!(workflow.all_steps_satisfied());
        assert!(workflow.current_step().is_none());
    }

    #[test]
    fn test_deserialize_minimal_definition() {
        let workflow: Workflow = serde_json::from_value(serde_json::json!({
            "workflow_id": WorkflowId::new(),
            "name": "minimal",
            "queued_at": Utc::now(),
            "steps": [{"name": "s0", "action": "run", "node": "node_a"}]
        }))
        .unwrap();
        assert_eq!(workflow.status, WorkflowStatus::Queued);
        assert_eq!(workflow.steps[0].status, StepStatus::Pending);
        assert_eq!(workflow.priority, 0);
    }
}
