use super::errors::{PersistenceError, PersistenceResult};
use crate::models::{Workflow, WorkflowId};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

/// Key-value store holding the authoritative workflow state.
///
/// Writes go through [`StateStore::compare_and_set`], which rejects a write
/// whose `expected_version` does not match the stored version. Together with
/// the engine's per-workflow lock this makes every read-modify-write of one
/// workflow a critical section without serializing unrelated workflows.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Store a newly submitted workflow
    async fn insert(&self, workflow: &Workflow) -> PersistenceResult<()>;

    /// Fetch an active or archived workflow
    async fn get(&self, workflow_id: WorkflowId) -> PersistenceResult<Option<Workflow>>;

    /// Replace the stored workflow if its version still equals `expected_version`.
    /// Returns the stored value with its bumped version.
    async fn compare_and_set(
        &self,
        workflow: &Workflow,
        expected_version: u64,
    ) -> PersistenceResult<Workflow>;

    /// Active workflows in FIFO queue order
    async fn list_active(&self) -> PersistenceResult<Vec<Workflow>>;

    /// Move a terminal workflow out of the active set
    async fn archive(&self, workflow_id: WorkflowId) -> PersistenceResult<()>;

    async fn list_archived(&self) -> PersistenceResult<Vec<Workflow>>;

    /// Move an archived workflow back into the active set (retry of a terminal workflow).
    /// Active workflows are returned unchanged.
    async fn restore(&self, workflow_id: WorkflowId) -> PersistenceResult<Workflow>;
}

/// In-process state store keeping serialized workflow documents
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    active: DashMap<WorkflowId, Value>,
    archived: DashMap<WorkflowId, Value>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode(document: &Value) -> PersistenceResult<Workflow> {
        Ok(serde_json::from_value(document.clone())?)
    }

    fn sorted(mut workflows: Vec<Workflow>) -> Vec<Workflow> {
        workflows.sort_by_key(Workflow::queue_key);
        workflows
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn insert(&self, workflow: &Workflow) -> PersistenceResult<()> {
        let workflow_id = workflow.workflow_id;
        if self.active.contains_key(&workflow_id) || self.archived.contains_key(&workflow_id) {
            return Err(PersistenceError::AlreadyExists { workflow_id });
        }
        self.active.insert(workflow_id, serde_json::to_value(workflow)?);
        Ok(())
    }

    async fn get(&self, workflow_id: WorkflowId) -> PersistenceResult<Option<Workflow>> {
        if let Some(document) = self.active.get(&workflow_id) {
            return Self::decode(document.value()).map(Some);
        }
        match self.archived.get(&workflow_id) {
            Some(document) => Self::decode(document.value()).map(Some),
            None => Ok(None),
        }
    }

    async fn compare_and_set(
        &self,
        workflow: &Workflow,
        expected_version: u64,
    ) -> PersistenceResult<Workflow> {
        let workflow_id = workflow.workflow_id;
        let mut entry = self
            .active
            .get_mut(&workflow_id)
            .ok_or(PersistenceError::NotFound { workflow_id })?;

        let actual = entry
            .value()
            .get("version")
            .and_then(Value::as_u64)
            .unwrap_or_default();
        if actual != expected_version {
            return Err(PersistenceError::ConcurrentModification {
                workflow_id,
                expected: expected_version,
                actual,
            });
        }

        let mut stored = workflow.clone();
        stored.version = expected_version + 1;
        *entry.value_mut() = serde_json::to_value(&stored)?;
        Ok(stored)
    }

    async fn list_active(&self) -> PersistenceResult<Vec<Workflow>> {
        let workflows = self
            .active
            .iter()
            .map(|entry| Self::decode(entry.value()))
            .collect::<PersistenceResult<Vec<_>>>()?;
        Ok(Self::sorted(workflows))
    }

    async fn archive(&self, workflow_id: WorkflowId) -> PersistenceResult<()> {
        let (_, document) = self
            .active
            .remove(&workflow_id)
            .ok_or(PersistenceError::NotFound { workflow_id })?;
        self.archived.insert(workflow_id, document);
        Ok(())
    }

    async fn list_archived(&self) -> PersistenceResult<Vec<Workflow>> {
        let workflows = self
            .archived
            .iter()
            .map(|entry| Self::decode(entry.value()))
            .collect::<PersistenceResult<Vec<_>>>()?;
        Ok(Self::sorted(workflows))
    }

    async fn restore(&self, workflow_id: WorkflowId) -> PersistenceResult<Workflow> {
        if let Some(document) = self.active.get(&workflow_id) {
            return Self::decode(document.value());
        }
        let (_, document) = self
            .archived
            .remove(&workflow_id)
            .ok_or(PersistenceError::NotFound { workflow_id })?;
        let workflow = Self::decode(&document)?;
        self.active.insert(workflow_id, document);
        Ok(workflow)
    }
}
