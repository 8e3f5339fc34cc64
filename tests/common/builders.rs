//! Workcell fixtures: simulated services, an engine wired to them and helpers
//! that drive the engine loop from tests.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use workcell_core::client::{
    InMemoryLocationStore, InMemoryResourceStore, LocationClient, NodeClient, ResourceClient,
    SimulatedNodeClient,
};
use workcell_core::config::WorkcellConfig;
use workcell_core::models::{Location, TransferCapabilities, TransferTemplate, Workflow};
use workcell_core::orchestration::{EngineClients, WorkcellEngine};
use workcell_core::scheduler::SchedulerContext;
use workcell_core::WorkflowId;

/// Config tuned for tests: fast ticks and millisecond retry backoff
pub fn fast_config() -> WorkcellConfig {
    let mut config = WorkcellConfig::default();
    config.engine.tick_interval_ms = 5;
    config.engine.default_action_timeout_seconds = 5;
    config.retry.backoff_base_ms = 1;
    config.retry.backoff_max_ms = 5;
    config
}

/// Simulated node, resource and location services sharing one workcell
pub struct TestWorkcell {
    pub nodes: Arc<SimulatedNodeClient>,
    pub resources: Arc<InMemoryResourceStore>,
    pub locations: Arc<InMemoryLocationStore>,
}

impl TestWorkcell {
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(SimulatedNodeClient::new().with_poll_interval(Duration::from_millis(2))),
            resources: Arc::new(InMemoryResourceStore::new()),
            locations: Arc::new(InMemoryLocationStore::new()),
        }
    }

    pub fn clients(&self) -> EngineClients {
        let nodes: Arc<dyn NodeClient> = self.nodes.clone();
        let resources: Arc<dyn ResourceClient> = self.resources.clone();
        let locations: Arc<dyn LocationClient> = self.locations.clone();
        EngineClients {
            nodes,
            resources,
            locations,
        }
    }

    pub fn engine(&self) -> WorkcellEngine {
        self.engine_with(fast_config())
    }

    pub fn engine_with(&self, config: WorkcellConfig) -> WorkcellEngine {
        WorkcellEngine::new(config, self.clients()).expect("test config is valid")
    }

    pub fn scheduler_context(&self) -> SchedulerContext {
        let clients = self.clients();
        SchedulerContext::new(clients.resources, clients.locations)
    }

    /// Three transfer locations wired by pair overrides: a -> b (arm, 2), b -> c (gantry, 1)
    pub fn with_linear_deck(self) -> Self {
        for id in ["deck_a", "deck_b", "deck_c"] {
            self.locations
                .upsert(Location::new(id, id.replace('_', " ")).with_representation("arm", json!({"teach_point": id})));
        }
        self.locations.set_capabilities(
            TransferCapabilities::default()
                .with_pair_override("deck_a", "deck_b", TransferTemplate::new("arm", "transfer", 2.0))
                .with_pair_override("deck_b", "deck_c", TransferTemplate::new("gantry", "move", 1.0)),
        );
        self
    }
}

impl Default for TestWorkcell {
    fn default() -> Self {
        Self::new()
    }
}

/// Tick until `predicate` holds for the workflow, panicking after `max_ticks`
pub async fn tick_until<F>(
    engine: &WorkcellEngine,
    workflow_id: WorkflowId,
    max_ticks: usize,
    predicate: F,
) -> Workflow
where
    F: Fn(&Workflow) -> bool,
{
    for _ in 0..max_ticks {
        engine.tick().await.expect("tick succeeds");
        let workflow = engine.get_workflow(workflow_id).await.expect("workflow exists");
        if predicate(&workflow) {
            return workflow;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("workflow {workflow_id} did not reach the expected state within {max_ticks} ticks");
}

/// Tick until the workflow is Completed, Failed or Cancelled
pub async fn run_to_terminal(engine: &WorkcellEngine, workflow_id: WorkflowId) -> Workflow {
    tick_until(engine, workflow_id, 600, Workflow::is_terminal).await
}

/// Wait up to two seconds for a condition set by a spawned watcher
pub async fn wait_for<F>(predicate: F)
where
    F: Fn() -> bool,
{
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        while !predicate() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not reached within two seconds");
}
