//! # Workcell Engine
//!
//! The single scheduling coordinator of a workcell. Each [`WorkcellEngine::tick`]:
//!
//! 1. applies the completions reported by action watchers since the last tick
//! 2. asks the installed scheduler for the next runnable (workflow, step)
//! 3. fails steps whose preconditions can never be resolved
//! 4. expands a selected transfer step into hops through the transfer planner
//! 5. reserves the target node, records the step as Running and spawns a
//!    watcher that follows the action to completion
//!
//! Dispatch never blocks the loop: long-running actions are followed by their
//! watcher and reported back on the completion channel.
//!
//! ## Consistency
//!
//! Every read-modify-write of a workflow happens under its per-workflow lock
//! and is written back through the state store's compare-and-set. A node is
//! reserved in the [`NodeTracker`] before its dispatch transition is
//! committed and released once the completion is recorded.

use chrono::Utc;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use super::error_classifier::{ErrorClassification, StandardErrorClassifier};
use super::node_tracker::NodeTracker;
use super::types::{NodeAssignment, StepCompletion, StepOutcome, TickReport};
use super::watcher::{spawn_action_watcher, WatchedAction};
use super::workflow_locks::WorkflowLocks;
use crate::client::{LocationClient, NodeClient, ResourceClient};
use crate::config::WorkcellConfig;
use crate::constants::system::MAX_WORKFLOW_STEPS;
use crate::error::{Result, WorkcellError};
use crate::events::{EventPublisher, PublishedEvent};
use crate::models::{ActionRequest, QuantityChange, Workflow, WorkflowId};
use crate::scheduler::{build_scheduler, ScheduledStep, SchedulerContext, WorkflowScheduler};
use crate::state_machine::{
    InMemoryStateStore, RetryPolicy, StateStore, StepStatus, Transition, TransitionEffect,
    WorkflowEvent, WorkflowStateMachine, WorkflowStatus,
};
use crate::transfer::{TransferError, TransferPlan, TransferPlanner};

/// External collaborators the engine talks to
#[derive(Clone)]
pub struct EngineClients {
    pub nodes: Arc<dyn NodeClient>,
    pub resources: Arc<dyn ResourceClient>,
    pub locations: Arc<dyn LocationClient>,
}

/// What happened to a step selected for dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DispatchResult {
    dispatched: bool,
    transfer_planned: bool,
    failed: bool,
}

enum TransferExpansion {
    /// Hops were spliced in; dispatch the first one
    Spliced,
    /// Nothing to move; the step already succeeded
    Completed,
    /// Planning failed and the step was failed
    Failed,
    /// The location service is unreachable; try again next tick
    Deferred,
}

pub struct WorkcellEngine {
    config: WorkcellConfig,
    state_machine: WorkflowStateMachine,
    store: Arc<dyn StateStore>,
    scheduler: Arc<dyn WorkflowScheduler>,
    nodes: Arc<dyn NodeClient>,
    resources: Arc<dyn ResourceClient>,
    locations: Arc<dyn LocationClient>,
    planner: TransferPlanner,
    publisher: EventPublisher,
    node_tracker: NodeTracker,
    locks: WorkflowLocks,
    classifier: StandardErrorClassifier,
    completion_tx: mpsc::Sender<StepCompletion>,
    completion_rx: Mutex<mpsc::Receiver<StepCompletion>>,
    watchers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    wakeup: Arc<Notify>,
    shutdown: AtomicBool,
}

impl std::fmt::Debug for WorkcellEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkcellEngine")
            .field("scheduler", &self.scheduler.kind())
            .field("busy_nodes", &self.node_tracker.busy_nodes())
            .field("shutdown", &self.shutdown.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl WorkcellEngine {
    /// Build an engine with an in-memory state store and the configured scheduler
    pub fn new(config: WorkcellConfig, clients: EngineClients) -> Result<Self> {
        config.validate()?;

        let (completion_tx, completion_rx) =
            mpsc::channel(config.engine.completion_channel_capacity);
        let planner = TransferPlanner::new(
            Arc::clone(&clients.locations),
            Arc::clone(&clients.resources),
            config.transfer.planner(),
        );

        Ok(Self {
            state_machine: WorkflowStateMachine::new(RetryPolicy::from(&config.retry)),
            store: Arc::new(InMemoryStateStore::new()),
            scheduler: build_scheduler(config.scheduler.kind),
            nodes: clients.nodes,
            resources: clients.resources,
            locations: clients.locations,
            planner,
            publisher: EventPublisher::new(config.events.channel_capacity),
            node_tracker: NodeTracker::new(),
            locks: WorkflowLocks::new(),
            classifier: StandardErrorClassifier::new(),
            completion_tx,
            completion_rx: Mutex::new(completion_rx),
            watchers: parking_lot::Mutex::new(Vec::new()),
            wakeup: Arc::new(Notify::new()),
            shutdown: AtomicBool::new(false),
            config,
        })
    }

    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn WorkflowScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn config(&self) -> &WorkcellConfig {
        &self.config
    }

    pub fn planner(&self) -> &TransferPlanner {
        &self.planner
    }

    pub fn node_tracker(&self) -> &NodeTracker {
        &self.node_tracker
    }

    pub fn workflow_locks(&self) -> &WorkflowLocks {
        &self.locks
    }

    /// Receive every lifecycle event the engine publishes from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.publisher.subscribe()
    }

    /// Locations, representations or transfer templates changed
    pub fn notify_locations_changed(&self) {
        self.planner.invalidate();
        self.wakeup.notify_one();
    }

    /// Queue a workflow. Execution state on the submitted value is reset.
    #[instrument(skip(self, workflow), fields(workflow_id = %workflow.workflow_id, name = %workflow.name))]
    pub async fn submit(&self, mut workflow: Workflow) -> Result<WorkflowId> {
        validate_submission(&workflow)?;

        workflow.status = WorkflowStatus::Queued;
        workflow.step_index = 0;
        workflow.started_at = None;
        workflow.ended_at = None;
        workflow.retry_count = 0;
        workflow.cancel_requested = false;
        workflow.version = 0;
        workflow.steps.iter_mut().for_each(|step| step.reset());

        self.store.insert(&workflow).await?;

        self.publisher.publish_queued(&workflow);
        crate::log_workflow!(
            info,
            "WORKFLOW_QUEUED",
            workflow_id: workflow.workflow_id,
            name: workflow.name,
            steps: workflow.steps.len(),
        );

        self.wakeup.notify_one();
        Ok(workflow.workflow_id)
    }

    pub async fn pause(&self, workflow_id: WorkflowId) -> Result<Workflow> {
        self.apply_operator_event(workflow_id, WorkflowEvent::Pause).await
    }

    pub async fn resume(&self, workflow_id: WorkflowId) -> Result<Workflow> {
        self.apply_operator_event(workflow_id, WorkflowEvent::Resume).await
    }

    /// Cancel now, or at the next step boundary when a step is in flight
    pub async fn cancel(&self, workflow_id: WorkflowId) -> Result<Workflow> {
        self.apply_operator_event(workflow_id, WorkflowEvent::Cancel).await
    }

    /// Reset steps from `index` onward to Pending and run them again
    pub async fn retry(&self, workflow_id: WorkflowId, index: usize) -> Result<Workflow> {
        self.apply_operator_event(workflow_id, WorkflowEvent::Retry { index })
            .await
    }

    /// Active or archived workflow by id
    pub async fn get_workflow(&self, workflow_id: WorkflowId) -> Result<Workflow> {
        self.store
            .get(workflow_id)
            .await?
            .ok_or_else(|| WorkcellError::NotFound(format!("workflow {workflow_id}")))
    }

    pub async fn active_workflows(&self) -> Result<Vec<Workflow>> {
        Ok(self.store.list_active().await?)
    }

    pub async fn archived_workflows(&self) -> Result<Vec<Workflow>> {
        Ok(self.store.list_archived().await?)
    }

    /// Run one scheduling pass
    #[instrument(skip(self))]
    pub async fn tick(&self) -> Result<TickReport> {
        let mut report = TickReport {
            completions_applied: self.drain_completions().await,
            ..TickReport::default()
        };
        self.watchers.lock().retain(|handle| !handle.is_finished());
        self.locks.prune_idle();

        let queue = self.store.list_active().await?;
        let context = SchedulerContext {
            resources: Arc::clone(&self.resources),
            locations: Arc::clone(&self.locations),
            busy_nodes: self.node_tracker.busy_nodes(),
            now: Utc::now(),
        };
        let decision = self.scheduler.next_runnable(&queue, &context).await;

        let unresolvable: Vec<(WorkflowId, String)> = decision
            .unresolvable()
            .into_iter()
            .map(|(workflow_id, reason)| (workflow_id, reason.to_string()))
            .collect();
        for (workflow_id, reason) in unresolvable {
            let Some(snapshot) = queue.iter().find(|w| w.workflow_id == workflow_id) else {
                continue;
            };
            let index = snapshot.step_index;
            match self.fail_unresolvable(workflow_id, index, &reason).await {
                Ok(true) => report.steps_failed.push(ScheduledStep {
                    workflow_id,
                    step_index: index,
                }),
                Ok(false) => {}
                Err(err) => warn!(%workflow_id, error = %err, "Failed to fail unresolvable step"),
            }
        }

        if let Some(selected) = decision.selected {
            if let Some(snapshot) = queue.iter().find(|w| w.workflow_id == selected.workflow_id) {
                match self.dispatch(selected, snapshot).await {
                    Ok(result) => {
                        if result.dispatched {
                            report.dispatched = Some(selected);
                        }
                        if result.transfer_planned {
                            report.transfers_planned += 1;
                        }
                        if result.failed {
                            report.steps_failed.push(selected);
                        }
                    }
                    Err(err) => warn!(
                        workflow_id = %selected.workflow_id,
                        step_index = selected.step_index,
                        error = %err,
                        "Dispatch failed"
                    ),
                }
            }
        }

        report.scheduling = decision.metadata;
        Ok(report)
    }

    /// Tick until [`WorkcellEngine::shutdown`], waking early when a watcher
    /// reports or an operator acts
    pub async fn run(&self) -> Result<()> {
        crate::log_workflow!(
            info,
            "ENGINE_STARTED",
            scheduler: self.scheduler.kind(),
            tick_interval_ms: self.config.engine.tick_interval_ms,
        );
        while !self.shutdown.load(Ordering::SeqCst) {
            if let Err(err) = self.tick().await {
                error!(error = %err, "Engine tick failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.engine.tick_interval()) => {}
                _ = self.wakeup.notified() => {}
            }
        }
        crate::log_workflow!(info, "ENGINE_STOPPED");
        Ok(())
    }

    /// Stop [`WorkcellEngine::run`] and abort outstanding watchers. Steps in
    /// flight stay Running in the store.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wakeup.notify_one();
        for handle in self.watchers.lock().drain(..) {
            handle.abort();
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Actions currently running on nodes
    pub fn in_flight_count(&self) -> usize {
        self.node_tracker.busy_count()
    }

    async fn load(&self, workflow_id: WorkflowId) -> Result<Workflow> {
        self.get_workflow(workflow_id).await
    }

    async fn apply_operator_event(
        &self,
        workflow_id: WorkflowId,
        event: WorkflowEvent,
    ) -> Result<Workflow> {
        let _guard = self.locks.lock(workflow_id).await;
        let workflow = self.load(workflow_id).await?;
        let transition = self.state_machine.advance(&workflow, event, Utc::now())?;

        // Terminal workflows live in the archive; a retry brings them back
        let expected_version = if workflow.is_terminal() {
            self.store.restore(workflow_id).await?.version
        } else {
            workflow.version
        };
        let stored = self.commit(transition, expected_version).await?;
        self.wakeup.notify_one();
        Ok(stored)
    }

    /// Persist a transition, publish it and carry out its effects
    async fn commit(&self, transition: Transition, expected_version: u64) -> Result<Workflow> {
        let stored = self
            .store
            .compare_and_set(&transition.workflow, expected_version)
            .await?;
        let transition = Transition {
            workflow: stored.clone(),
            ..transition
        };

        self.publisher.publish_transition(&transition);
        crate::log_workflow!(
            debug,
            "TRANSITION_APPLIED",
            workflow_id: stored.workflow_id,
            event: transition.event.event_type(),
            from: transition.from,
            to: transition.to,
        );

        self.execute_effects(&stored, &transition.effects).await;
        Ok(stored)
    }

    async fn execute_effects(&self, workflow: &Workflow, effects: &[TransitionEffect]) {
        for effect in effects {
            match effect {
                TransitionEffect::DispatchStep {
                    index,
                    node,
                    action,
                    action_id,
                } => self.spawn_watcher(workflow, *index, node, action, *action_id),
                TransitionEffect::ScheduleRetry {
                    index,
                    attempt,
                    not_before,
                } => {
                    crate::log_step!(
                        info,
                        "STEP_RETRY_SCHEDULED",
                        workflow_id: workflow.workflow_id,
                        step_index: *index,
                        attempt: attempt,
                        not_before: not_before.to_rfc3339(),
                    );
                }
                TransitionEffect::PropagateAdminCommand { node, command } => {
                    match self.nodes.send_admin_command(node, *command).await {
                        Ok(response) if response.success => {
                            debug!(node = %node, command = %command, "Admin command propagated");
                        }
                        Ok(response) => warn!(
                            node = %node,
                            command = %command,
                            errors = ?response.errors,
                            "Node refused admin command"
                        ),
                        Err(err) => warn!(
                            node = %node,
                            command = %command,
                            error = %err,
                            "Failed to propagate admin command"
                        ),
                    }
                }
                TransitionEffect::IssueResourceUpdates { index, updates } => {
                    for update in updates {
                        let applied = match update.change {
                            QuantityChange::Increase(amount) => {
                                self.resources
                                    .increase_quantity(&update.resource_id, amount)
                                    .await
                            }
                            QuantityChange::Decrease(amount) => {
                                self.resources
                                    .decrease_quantity(&update.resource_id, amount)
                                    .await
                            }
                        };
                        if let Err(err) = applied {
                            warn!(
                                workflow_id = %workflow.workflow_id,
                                step_index = *index,
                                resource_id = %update.resource_id,
                                error = %err,
                                "Resource update rejected"
                            );
                        }
                    }
                }
                TransitionEffect::Finalize { status } => {
                    if let Err(err) = self.store.archive(workflow.workflow_id).await {
                        warn!(workflow_id = %workflow.workflow_id, error = %err, "Failed to archive workflow");
                    }
                    crate::log_workflow!(
                        info,
                        "WORKFLOW_FINALIZED",
                        workflow_id: workflow.workflow_id,
                        status: status,
                        retry_count: workflow.retry_count,
                    );
                }
            }
        }
    }

    fn spawn_watcher(
        &self,
        workflow: &Workflow,
        index: usize,
        node: &str,
        action: &str,
        action_id: Uuid,
    ) {
        let Some(step) = workflow.steps.get(index) else {
            error!(workflow_id = %workflow.workflow_id, step_index = index, "Dispatched step does not exist");
            return;
        };
        let timeout = step
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.config.engine.default_action_timeout());
        let request = ActionRequest {
            action_id,
            action_name: action.to_string(),
            args: step.args.clone(),
            workflow_id: workflow.workflow_id,
            step_index: index,
        };

        crate::log_step!(
            info,
            "STEP_DISPATCHED",
            workflow_id: workflow.workflow_id,
            step_index: index,
            node: node,
            action: action,
            attempt: step.attempts,
        );

        let handle = spawn_action_watcher(
            Arc::clone(&self.nodes),
            WatchedAction {
                node: node.to_string(),
                request,
                timeout,
            },
            self.classifier,
            self.completion_tx.clone(),
            Arc::clone(&self.wakeup),
        );
        self.watchers.lock().push(handle);
    }

    async fn drain_completions(&self) -> usize {
        let mut completions = Vec::new();
        {
            let mut receiver = self.completion_rx.lock().await;
            while let Ok(completion) = receiver.try_recv() {
                completions.push(completion);
            }
        }

        let applied = completions.len();
        for completion in completions {
            let workflow_id = completion.workflow_id;
            if let Err(err) = self.apply_completion(completion).await {
                warn!(%workflow_id, error = %err, "Failed to record step completion");
            }
        }
        applied
    }

    async fn apply_completion(&self, completion: StepCompletion) -> Result<()> {
        let _guard = self.locks.lock(completion.workflow_id).await;
        let recorded = self.record_completion(&completion).await;
        self.node_tracker
            .release(&completion.node, completion.action_id);
        recorded
    }

    async fn record_completion(&self, completion: &StepCompletion) -> Result<()> {
        let Some(workflow) = self.store.get(completion.workflow_id).await? else {
            warn!(workflow_id = %completion.workflow_id, "Completion for unknown workflow");
            return Ok(());
        };
        let current = workflow.steps.get(completion.step_index).is_some_and(|step| {
            step.status == StepStatus::Running && step.action_id == Some(completion.action_id)
        });
        if !current {
            debug!(
                workflow_id = %completion.workflow_id,
                step_index = completion.step_index,
                "Ignoring completion for an action that is no longer current"
            );
            return Ok(());
        }

        let event = match &completion.outcome {
            StepOutcome::Succeeded { payload } => WorkflowEvent::StepSucceeded {
                index: completion.step_index,
                payload: payload.clone(),
            },
            StepOutcome::Failed { kind, reason } => {
                crate::log_step!(
                    warn,
                    "STEP_FAILED",
                    workflow_id: completion.workflow_id,
                    step_index: completion.step_index,
                    kind: kind,
                    error: reason,
                );
                WorkflowEvent::StepFailed {
                    index: completion.step_index,
                    kind: *kind,
                    reason: reason.clone(),
                }
            }
        };

        let transition = self.state_machine.advance(&workflow, event, Utc::now())?;
        self.commit(transition, workflow.version).await?;
        Ok(())
    }

    async fn dispatch(&self, selected: ScheduledStep, snapshot: &Workflow) -> Result<DispatchResult> {
        let mut result = DispatchResult::default();
        let workflow_id = selected.workflow_id;
        let index = selected.step_index;

        let _guard = self.locks.lock(workflow_id).await;
        let Some(mut workflow) = self.store.get(workflow_id).await? else {
            return Ok(result);
        };
        if workflow.version != snapshot.version || workflow.step_index != index {
            debug!(%workflow_id, "Workflow changed since scheduling, deferring");
            return Ok(result);
        }

        let is_transfer = workflow.steps.get(index).is_some_and(|step| step.is_transfer());
        if is_transfer {
            result.transfer_planned = true;
            match self.expand_transfer(&mut workflow, index).await? {
                TransferExpansion::Spliced => {}
                TransferExpansion::Completed => return Ok(result),
                TransferExpansion::Deferred => {
                    result.transfer_planned = false;
                    return Ok(result);
                }
                TransferExpansion::Failed => {
                    result.failed = true;
                    return Ok(result);
                }
            }
        }

        let Some(node) = workflow.steps.get(index).and_then(|step| step.node.clone()) else {
            return Err(WorkcellError::InvalidState(format!(
                "step {index} of workflow {workflow_id} has no target node"
            )));
        };

        let action_id = Uuid::new_v4();
        let assignment = NodeAssignment {
            workflow_id,
            step_index: index,
            action_id,
        };
        if !self.node_tracker.try_reserve(&node, assignment) {
            debug!(%workflow_id, node = %node, "Node became busy, deferring");
            return Ok(result);
        }

        let started = self
            .state_machine
            .advance(
                &workflow,
                WorkflowEvent::StepStarted { index, action_id },
                Utc::now(),
            )
            .map_err(WorkcellError::from);
        let committed = match started {
            Ok(transition) => self.commit(transition, workflow.version).await,
            Err(err) => Err(err),
        };
        if let Err(err) = committed {
            self.node_tracker.release(&node, action_id);
            return Err(err);
        }

        result.dispatched = true;
        Ok(result)
    }

    /// Plan a transfer step and splice its hops into the workflow in place
    async fn expand_transfer(
        &self,
        workflow: &mut Workflow,
        index: usize,
    ) -> Result<TransferExpansion> {
        let Some(step) = workflow.steps.get(index).cloned() else {
            return Ok(TransferExpansion::Deferred);
        };
        let Some(spec) = step.transfer.clone() else {
            return Ok(TransferExpansion::Spliced);
        };

        let plan = match self.planner.plan(&spec.source, &spec.target).await {
            Ok(plan) => plan,
            Err(TransferError::Client(err)) if err.is_transient() => {
                warn!(error = %err, "Location service unavailable, deferring transfer");
                return Ok(TransferExpansion::Deferred);
            }
            Err(err) => {
                let classification = self.classifier.classify_transfer_error(&err);
                self.fail_locked(workflow, index, classification).await?;
                return Ok(TransferExpansion::Failed);
            }
        };
        self.publish_plan(workflow, index, &step.name, &plan);

        if plan.is_empty() {
            let transition = self.state_machine.advance(
                workflow,
                WorkflowEvent::StepSucceeded {
                    index,
                    payload: json!({
                        "source": plan.source,
                        "target": plan.target,
                        "hops": 0,
                    }),
                },
                Utc::now(),
            )?;
            self.commit(transition, workflow.version).await?;
            return Ok(TransferExpansion::Completed);
        }

        let hops = plan.into_steps(&step);
        if workflow.steps.len() - 1 + hops.len() > MAX_WORKFLOW_STEPS {
            let classification = self.classifier.classify_transfer_error(&TransferError::no_path(
                &plan.source,
                &plan.target,
                format!("expansion would exceed {MAX_WORKFLOW_STEPS} steps"),
            ));
            self.fail_locked(workflow, index, classification).await?;
            return Ok(TransferExpansion::Failed);
        }

        let expected_version = workflow.version;
        workflow.steps.splice(index..=index, hops);
        *workflow = self
            .store
            .compare_and_set(workflow, expected_version)
            .await?;
        Ok(TransferExpansion::Spliced)
    }

    fn publish_plan(&self, workflow: &Workflow, index: usize, step_name: &str, plan: &TransferPlan) {
        if let Err(err) = self
            .publisher
            .publish_plan(workflow.workflow_id, index, step_name, plan)
        {
            warn!(error = %err, "Failed to publish transfer plan");
        }
    }

    async fn fail_unresolvable(
        &self,
        workflow_id: WorkflowId,
        index: usize,
        reason: &str,
    ) -> Result<bool> {
        let _guard = self.locks.lock(workflow_id).await;
        let Some(workflow) = self.store.get(workflow_id).await? else {
            return Ok(false);
        };
        let still_blocked = workflow.status.is_schedulable()
            && workflow.step_index == index
            && workflow.in_flight_step().is_none();
        if !still_blocked {
            return Ok(false);
        }

        let classification = self.classifier.classify_condition_error(reason);
        self.fail_locked(&workflow, index, classification).await?;
        Ok(true)
    }

    /// Fail a step; the caller holds the workflow lock
    async fn fail_locked(
        &self,
        workflow: &Workflow,
        index: usize,
        classification: ErrorClassification,
    ) -> Result<Workflow> {
        crate::log_step!(
            warn,
            "STEP_FAILED",
            workflow_id: workflow.workflow_id,
            step_index: index,
            error_code: classification.error_code,
            error: classification.error_message,
            remediation: classification.remediation_suggestions,
        );
        let transition = self.state_machine.advance(
            workflow,
            WorkflowEvent::StepFailed {
                index,
                kind: classification.kind,
                reason: classification.error_message,
            },
            Utc::now(),
        )?;
        self.commit(transition, workflow.version).await
    }
}

fn validate_submission(workflow: &Workflow) -> Result<()> {
    if workflow.steps.is_empty() {
        return Err(WorkcellError::ValidationError(
            "workflow must have at least one step".to_string(),
        ));
    }
    if workflow.steps.len() > MAX_WORKFLOW_STEPS {
        return Err(WorkcellError::ValidationError(format!(
            "workflow has {} steps, the maximum is {MAX_WORKFLOW_STEPS}",
            workflow.steps.len()
        )));
    }
    for (index, step) in workflow.steps.iter().enumerate() {
        match (&step.node, &step.transfer) {
            (None, None) => {
                return Err(WorkcellError::ValidationError(format!(
                    "step {index} ('{}') has neither a target node nor a transfer",
                    step.name
                )))
            }
            (Some(_), Some(_)) => {
                return Err(WorkcellError::ValidationError(format!(
                    "step {index} ('{}') names a node; transfer steps are routed by the planner",
                    step.name
                )))
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{InMemoryLocationStore, InMemoryResourceStore, SimulatedNodeClient};
    use crate::constants::events;
    use crate::models::Step;

    fn engine() -> WorkcellEngine {
        WorkcellEngine::new(
            WorkcellConfig::default(),
            EngineClients {
                nodes: Arc::new(SimulatedNodeClient::new()),
                resources: Arc::new(InMemoryResourceStore::new()),
                locations: Arc::new(InMemoryLocationStore::new()),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_submission_validation() {
        assert!(validate_submission(&Workflow::new("empty", vec![])).is_err());

        let mut nodeless = Step::new("s0", "noop", "n1");
        nodeless.node = None;
        assert!(validate_submission(&Workflow::new("bad", vec![nodeless])).is_err());

        let mut routed = Step::transfer("move", "a", "b");
        routed.node = Some("arm".into());
        assert!(validate_submission(&Workflow::new("bad", vec![routed])).is_err());

        assert!(validate_submission(&Workflow::new(
            "ok",
            vec![Step::new("s0", "noop", "n1"), Step::transfer("move", "a", "b")]
        ))
        .is_ok());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = WorkcellConfig::default();
        config.engine.tick_interval_ms = 0;
        let clients = EngineClients {
            nodes: Arc::new(SimulatedNodeClient::new()),
            resources: Arc::new(InMemoryResourceStore::new()),
            locations: Arc::new(InMemoryLocationStore::new()),
        };
        assert!(matches!(
            WorkcellEngine::new(config, clients),
            Err(WorkcellError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_publishes_queued_event() {
        let engine = engine();
        let mut receiver = engine.subscribe();
        let workflow_id = engine
            .submit(Workflow::new("one", vec![Step::new("s0", "noop", "n1")]))
            .await
            .unwrap();

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.name, events::WORKFLOW_QUEUED);
        assert_eq!(
            engine.get_workflow(workflow_id).await.unwrap().status,
            WorkflowStatus::Queued
        );
    }

    #[tokio::test]
    async fn test_unknown_workflow_is_not_found() {
        let engine = engine();
        assert!(matches!(
            engine.pause(WorkflowId::new()).await,
            Err(WorkcellError::NotFound(_))
        ));
    }
}
