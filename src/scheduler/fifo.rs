use super::{SchedulerKind, WorkflowScheduler};
use crate::models::Workflow;

/// Considers workflows in queue insertion order
#[derive(Debug, Clone, Copy, Default)]
pub struct FifoScheduler;

impl WorkflowScheduler for FifoScheduler {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Fifo
    }

    fn order(&self, queue: &[Workflow]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..queue.len()).collect();
        order.sort_by_key(|&position| queue[position].queue_key());
        order
    }
}
