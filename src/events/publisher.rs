//! # Lifecycle Event Publisher
//!
//! Broadcasts workflow, step and transfer events to any number of
//! subscribers. Lagging subscribers lose the oldest events; the engine is
//! never slowed down by a slow observer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::constants::events;
use crate::models::{Workflow, WorkflowId};
use crate::state_machine::Transition;
use crate::transfer::TransferPlan;

#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// One observable lifecycle event
#[derive(Debug, Clone, Serialize)]
pub struct PublishedEvent {
    pub name: String,
    pub workflow_id: Option<WorkflowId>,
    pub context: Value,
    pub published_at: DateTime<Utc>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Broadcast one event. Returns how many subscribers received it;
    /// zero subscribers is not an error.
    pub fn publish(
        &self,
        name: impl Into<String>,
        workflow_id: Option<WorkflowId>,
        context: Value,
    ) -> usize {
        let event = PublishedEvent {
            name: name.into(),
            workflow_id,
            context,
            published_at: Utc::now(),
        };
        self.sender.send(event).unwrap_or(0)
    }

    pub fn publish_queued(&self, workflow: &Workflow) -> usize {
        let context = json!({
            "workflow_name": workflow.name,
            "step_count": workflow.steps.len(),
            "priority": workflow.priority,
            "ownership": workflow.ownership,
        });
        self.publish(events::WORKFLOW_QUEUED, Some(workflow.workflow_id), context)
    }

    /// Publish every lifecycle event a transition makes observable, in order
    pub fn publish_transition(&self, transition: &Transition) -> usize {
        let context = transition_context(transition);
        transition
            .event_names()
            .into_iter()
            .map(|name| self.publish(name, Some(transition.workflow.workflow_id), context.clone()))
            .sum()
    }

    pub fn publish_plan(
        &self,
        workflow_id: WorkflowId,
        step_index: usize,
        step_name: &str,
        plan: &TransferPlan,
    ) -> Result<usize, PublishError> {
        let context = json!({
            "step_index": step_index,
            "step_name": step_name,
            "source": plan.source,
            "target": plan.target,
            "hops": plan.len(),
            "total_cost": plan.total_cost,
            "plan": serde_json::to_value(plan)?,
        });
        Ok(self.publish(events::TRANSFER_PLANNED, Some(workflow_id), context))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

fn transition_context(transition: &Transition) -> Value {
    let workflow = &transition.workflow;
    let step_index = transition.event.step_index();
    let step = step_index.and_then(|index| workflow.steps.get(index));
    json!({
        "workflow_name": workflow.name,
        "event": transition.event.event_type(),
        "from": transition.from,
        "to": transition.to,
        "step_index": step_index,
        "step_name": step.map(|step| step.name.as_str()),
        "step_status": step.map(|step| step.status),
        "node": step.and_then(|step| step.node.as_deref()),
        "attempts": step.map(|step| step.attempts),
        "error": step.and_then(|step| step.error.as_deref()),
        "retry_count": workflow.retry_count,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Event payload could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(crate::constants::system::DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Step;
    use crate::state_machine::{WorkflowEvent, WorkflowStateMachine};

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let publisher = EventPublisher::new(8);
        assert_eq!(publisher.subscriber_count(), 0);
        assert_eq!(publisher.publish("noop", None, json!({})), 0);
    }

    #[tokio::test]
    async fn test_publish_transition_emits_all_names() {
        let publisher = EventPublisher::new(8);
        let mut receiver = publisher.subscribe();

        let workflow = Workflow::new("cancel_me", vec![Step::new("s0", "noop", "n1")]);
        let transition = WorkflowStateMachine::default()
            .advance(&workflow, WorkflowEvent::Cancel, Utc::now())
            .unwrap();
        assert_eq!(publisher.publish_transition(&transition), 1);

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.name, events::WORKFLOW_CANCELLED);
        assert_eq!(event.workflow_id, Some(workflow.workflow_id));
        assert_eq!(event.context["from"], json!("queued"));
        assert_eq!(event.context["to"], json!("cancelled"));
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_queued_event_carries_workflow_shape() {
        let publisher = EventPublisher::default();
        let mut receiver = publisher.subscribe();
        let workflow = Workflow::new("two", vec![Step::new("a", "noop", "n1"), Step::new("b", "noop", "n2")]);

        publisher.publish_queued(&workflow);
        let event = receiver.recv().await.unwrap();
        assert_eq!(event.name, events::WORKFLOW_QUEUED);
        assert_eq!(event.context["step_count"], json!(2));
        assert!(serde_json::to_value(&event).is_ok());
    }
}
