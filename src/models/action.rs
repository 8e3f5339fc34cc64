use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::workflow::WorkflowId;

/// A single action dispatched to a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action_id: Uuid,
    pub action_name: String,
    #[serde(default)]
    pub args: BTreeMap<String, Value>,
    pub workflow_id: WorkflowId,
    pub step_index: usize,
}

impl ActionRequest {
    pub fn new(
        action_name: impl Into<String>,
        args: BTreeMap<String, Value>,
        workflow_id: WorkflowId,
        step_index: usize,
    ) -> Self {
        Self {
            action_id: Uuid::new_v4(),
            action_name: action_name.into(),
            args,
            workflow_id,
            step_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Running,
    Succeeded,
    Failed,
}

impl ActionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_id: Uuid,
    pub status: ActionStatus,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ActionResult {
    pub fn running(action_id: Uuid) -> Self {
        Self {
            action_id,
            status: ActionStatus::Running,
            payload: Value::Null,
            errors: Vec::new(),
        }
    }

    pub fn succeeded(action_id: Uuid, payload: Value) -> Self {
        Self {
            action_id,
            status: ActionStatus::Succeeded,
            payload,
            errors: Vec::new(),
        }
    }

    pub fn failed(action_id: Uuid, error: impl Into<String>) -> Self {
        Self {
            action_id,
            status: ActionStatus::Failed,
            payload: Value::Null,
            errors: vec![error.into()],
        }
    }

    /// All node-reported errors joined for storage on the step
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            "node reported failure without details".to_string()
        } else {
            self.errors.join("; ")
        }
    }
}

/// Administrative commands propagated to the hardware behind a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminCommand {
    Pause,
    Resume,
    Cancel,
}

impl fmt::Display for AdminCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pause => write!(f, "pause"),
            Self::Resume => write!(f, "resume"),
            Self::Cancel => write!(f, "cancel"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCommandResponse {
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl AdminCommandResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }
}
