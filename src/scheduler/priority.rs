use std::cmp::Reverse;

use super::{SchedulerKind, WorkflowScheduler};
use crate::models::Workflow;

/// Considers higher-priority workflows first; equal priorities run FIFO
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityScheduler;

impl WorkflowScheduler for PriorityScheduler {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Priority
    }

    fn order(&self, queue: &[Workflow]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..queue.len()).collect();
        order.sort_by_key(|&position| {
            let workflow = &queue[position];
            (Reverse(workflow.priority), workflow.queue_key())
        });
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Step;
    use chrono::{Duration, Utc};

    #[test]
    fn test_priority_then_fifo() {
        let now = Utc::now();
        let step = || vec![Step::new("s0", "noop", "n")];
        let queue = vec![
            Workflow::new("normal_early", step()).with_queued_at(now - Duration::seconds(10)),
            Workflow::new("urgent", step()).with_priority(5).with_queued_at(now),
            Workflow::new("normal_late", step()).with_queued_at(now - Duration::seconds(1)),
        ];
        assert_eq!(PriorityScheduler.order(&queue), vec![1, 0, 2]);
    }
}
