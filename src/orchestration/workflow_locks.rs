use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::WorkflowId;

/// Per-workflow async mutexes.
///
/// Every read-modify-write of a workflow's stored state happens under its
/// lock. Unrelated workflows never contend. Entries are created on demand and
/// dropped by [`WorkflowLocks::prune_idle`] once nobody holds or awaits them.
#[derive(Debug, Default)]
pub struct WorkflowLocks {
    locks: DashMap<WorkflowId, Arc<Mutex<()>>>,
}

impl WorkflowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `workflow_id`
    pub async fn lock(&self, workflow_id: WorkflowId) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the map shard is not held across the await
        let lock = Arc::clone(self.locks.entry(workflow_id).or_default().value());
        lock.lock_owned().await
    }

    /// Drop every lock nobody holds or waits on; returns how many were dropped.
    ///
    /// A holder or waiter owns a clone of the `Arc`, so a strong count of one
    /// means the map's entry is the only reference. `lock` clones under the
    /// shard lock, so it never races with the removal.
    pub fn prune_idle(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before.saturating_sub(self.locks.len())
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_workflow_is_serialized() {
        let locks = Arc::new(WorkflowLocks::new());
        let workflow_id = WorkflowId::new();
        let guard = locks.lock(workflow_id).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock(workflow_id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_idle_locks_are_pruned() {
        let locks = WorkflowLocks::new();
        let held_id = WorkflowId::new();
        let held = locks.lock(held_id).await;
        drop(locks.lock(WorkflowId::new()).await);

        assert_eq!(locks.prune_idle(), 1);
        assert_eq!(locks.len(), 1);

        drop(held);
        assert_eq!(locks.prune_idle(), 1);
        assert!(locks.is_empty());

        // A pruned workflow gets a fresh lock on demand
        let _again = locks.lock(held_id).await;
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_different_workflows_do_not_contend() {
        let locks = WorkflowLocks::new();
        let _first = locks.lock(WorkflowId::new()).await;
        let _second = locks.lock(WorkflowId::new()).await;
        assert_eq!(locks.len(), 2);
    }
}
