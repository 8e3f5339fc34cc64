use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeSet;
use uuid::Uuid;

use super::types::NodeAssignment;

/// Live node-busy state.
///
/// A node is busy from the moment the engine reserves it for a dispatch until
/// the action's completion has been recorded. Reservation is a single atomic
/// map operation, so two dispatches can never hold the same node.
#[derive(Debug, Default)]
pub struct NodeTracker {
    busy: DashMap<String, NodeAssignment>,
}

impl NodeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `node`; false when it is already busy
    pub fn try_reserve(&self, node: &str, assignment: NodeAssignment) -> bool {
        match self.busy.entry(node.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(assignment);
                true
            }
        }
    }

    /// Release `node` if it is held by `action_id`
    pub fn release(&self, node: &str, action_id: Uuid) -> bool {
        self.busy
            .remove_if(node, |_, assignment| assignment.action_id == action_id)
            .is_some()
    }

    pub fn is_busy(&self, node: &str) -> bool {
        self.busy.contains_key(node)
    }

    pub fn assignment(&self, node: &str) -> Option<NodeAssignment> {
        self.busy.get(node).map(|entry| *entry.value())
    }

    pub fn busy_nodes(&self) -> BTreeSet<String> {
        self.busy.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn busy_count(&self) -> usize {
        self.busy.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkflowId;

    fn assignment() -> NodeAssignment {
        NodeAssignment {
            workflow_id: WorkflowId::new(),
            step_index: 0,
            action_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_reservation_is_exclusive() {
        let tracker = NodeTracker::new();
        let first = assignment();
        assert!(tracker.try_reserve("reader", first));
        assert!(!tracker.try_reserve("reader", assignment()));
        assert!(tracker.try_reserve("arm", assignment()));
        assert_eq!(tracker.busy_count(), 2);
        assert_eq!(tracker.assignment("reader"), Some(first));
    }

    #[test]
    fn test_release_requires_matching_action() {
        let tracker = NodeTracker::new();
        let held = assignment();
        tracker.try_reserve("reader", held);

        assert!(!tracker.release("reader", Uuid::new_v4()));
        assert!(tracker.is_busy("reader"));
        assert!(tracker.release("reader", held.action_id));
        assert!(tracker.busy_nodes().is_empty());
    }
}
