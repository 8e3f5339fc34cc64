//! # In-Memory Collaborators
//!
//! Process-local implementations of the node, resource and location
//! contracts. They back the integration tests and make it possible to run
//! the engine against a simulated workcell.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use uuid::Uuid;

use super::errors::{ClientError, ClientResult, NodeError, NodeResult};
use super::traits::{LocationClient, NodeClient, ResourceClient, ResourceQuery};
use crate::models::{
    ActionRequest, ActionResult, ActionStatus, AdjacencyList, AdminCommand, AdminCommandResponse,
    Location, Resource, ResourceChildren, TransferCapabilities,
};
use crate::transfer::TransferGraph;

/// Scripted result for the next action a simulated node receives
#[derive(Debug, Clone, PartialEq)]
pub enum SimulatedOutcome {
    /// Finish immediately with this payload
    Succeed(Value),
    /// Finish immediately with this node-reported error
    Fail(String),
    /// Stay Running until [`SimulatedNodeClient::complete_action`] is called
    Hang,
    /// Accept the request but never answer `send_action`
    Unresponsive,
}

#[derive(Debug, Clone)]
struct SimulatedAction {
    node: String,
    result: ActionResult,
}

/// Node client that answers from per-(node, action) scripts.
///
/// Actions without a script succeed immediately with `{"action": <name>}`.
#[derive(Debug)]
pub struct SimulatedNodeClient {
    scripts: Mutex<HashMap<(String, String), VecDeque<SimulatedOutcome>>>,
    actions: DashMap<Uuid, SimulatedAction>,
    dispatched: Mutex<Vec<(String, ActionRequest)>>,
    admin_commands: Mutex<Vec<(String, AdminCommand)>>,
    unreachable: RwLock<BTreeSet<String>>,
    poll_interval: Duration,
}

impl Default for SimulatedNodeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedNodeClient {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            actions: DashMap::new(),
            dispatched: Mutex::new(Vec::new()),
            admin_commands: Mutex::new(Vec::new()),
            unreachable: RwLock::new(BTreeSet::new()),
            poll_interval: Duration::from_millis(10),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Queue an outcome for the next dispatch of `action` on `node`
    pub fn script(&self, node: &str, action: &str, outcome: SimulatedOutcome) {
        self.scripts
            .lock()
            .entry((node.to_string(), action.to_string()))
            .or_default()
            .push_back(outcome);
    }

    /// Make `send_action` to `node` fail at dispatch
    pub fn set_unreachable(&self, node: &str, unreachable: bool) {
        let mut nodes = self.unreachable.write();
        if unreachable {
            nodes.insert(node.to_string());
        } else {
            nodes.remove(node);
        }
    }

    /// Finish a hanging action. Returns false for unknown or already finished actions.
    pub fn complete_action(&self, action_id: Uuid, outcome: SimulatedOutcome) -> bool {
        let Some(mut action) = self.actions.get_mut(&action_id) else {
            return false;
        };
        if action.result.status.is_terminal() {
            return false;
        }
        action.result = match outcome {
            SimulatedOutcome::Succeed(payload) => ActionResult::succeeded(action_id, payload),
            SimulatedOutcome::Fail(error) => ActionResult::failed(action_id, error),
            SimulatedOutcome::Hang | SimulatedOutcome::Unresponsive => return false,
        };
        true
    }

    /// Every request handed to a node, in dispatch order
    pub fn dispatched(&self) -> Vec<(String, ActionRequest)> {
        self.dispatched.lock().clone()
    }

    pub fn dispatch_count(&self, node: &str) -> usize {
        self.dispatched
            .lock()
            .iter()
            .filter(|(dispatched_to, _)| dispatched_to == node)
            .count()
    }

    /// Ids of actions still running, in dispatch order
    pub fn running_actions(&self) -> Vec<Uuid> {
        self.dispatched
            .lock()
            .iter()
            .map(|(_, request)| request.action_id)
            .filter(|action_id| {
                self.actions
                    .get(action_id)
                    .is_some_and(|action| action.result.status == ActionStatus::Running)
            })
            .collect()
    }

    pub fn admin_commands(&self) -> Vec<(String, AdminCommand)> {
        self.admin_commands.lock().clone()
    }

    fn action(&self, node: &str, action_id: Uuid) -> NodeResult<SimulatedAction> {
        match self.actions.get(&action_id) {
            Some(action) if action.node == node => Ok(action.clone()),
            _ => Err(NodeError::UnknownAction {
                node: node.to_string(),
                action_id,
            }),
        }
    }
}

#[async_trait]
impl NodeClient for SimulatedNodeClient {
    async fn send_action(&self, node: &str, request: &ActionRequest) -> NodeResult<ActionResult> {
        if self.unreachable.read().contains(node) {
            return Err(NodeError::DispatchFailed {
                node: node.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let outcome = self
            .scripts
            .lock()
            .get_mut(&(node.to_string(), request.action_name.clone()))
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| SimulatedOutcome::Succeed(json!({ "action": request.action_name })));

        self.dispatched
            .lock()
            .push((node.to_string(), request.clone()));

        let result = match outcome {
            SimulatedOutcome::Succeed(payload) => ActionResult::succeeded(request.action_id, payload),
            SimulatedOutcome::Fail(error) => ActionResult::failed(request.action_id, error),
            SimulatedOutcome::Hang => ActionResult::running(request.action_id),
            SimulatedOutcome::Unresponsive => return std::future::pending().await,
        };

        self.actions.insert(
            request.action_id,
            SimulatedAction {
                node: node.to_string(),
                result: result.clone(),
            },
        );
        Ok(result)
    }

    async fn get_action_status(&self, node: &str, action_id: Uuid) -> NodeResult<ActionStatus> {
        Ok(self.action(node, action_id)?.result.status)
    }

    async fn get_action_result(&self, node: &str, action_id: Uuid) -> NodeResult<ActionResult> {
        Ok(self.action(node, action_id)?.result)
    }

    async fn send_admin_command(
        &self,
        node: &str,
        command: AdminCommand,
    ) -> NodeResult<AdminCommandResponse> {
        if self.unreachable.read().contains(node) {
            return Err(NodeError::Unavailable {
                node: node.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        self.admin_commands.lock().push((node.to_string(), command));
        Ok(AdminCommandResponse::ok())
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// Resource service backed by a map of top-level resources
#[derive(Debug, Default)]
pub struct InMemoryResourceStore {
    resources: RwLock<BTreeMap<String, Resource>>,
    unavailable: AtomicBool,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(self, resource: Resource) -> Self {
        self.insert(resource);
        self
    }

    pub fn insert(&self, resource: Resource) {
        self.resources
            .write()
            .insert(resource.resource_id.clone(), resource);
    }

    /// Apply an external change to a resource, wherever it sits in the hierarchy
    pub fn update<F>(&self, resource_id: &str, update: F) -> ClientResult<Resource>
    where
        F: FnOnce(&mut Resource),
    {
        let mut resources = self.resources.write();
        let resource = resources
            .values_mut()
            .find_map(|root| find_mut(root, resource_id))
            .ok_or_else(|| ClientError::resource_not_found(resource_id))?;
        update(resource);
        Ok(resource.clone())
    }

    pub fn set_quantity(&self, resource_id: &str, quantity: f64) -> ClientResult<Resource> {
        self.update(resource_id, |resource| resource.quantity = Some(quantity))
    }

    /// Simulate an outage: every call fails with `ClientError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> ClientResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::Unavailable {
                service: "resource",
                reason: "simulated outage".to_string(),
            });
        }
        Ok(())
    }

    fn change_quantity(&self, resource_id: &str, delta: f64) -> ClientResult<Resource> {
        self.ensure_available()?;
        if !delta.is_finite() {
            return Err(ClientError::rejected(format!(
                "quantity change for {resource_id} must be finite"
            )));
        }

        let mut resources = self.resources.write();
        let resource = resources
            .values_mut()
            .find_map(|root| find_mut(root, resource_id))
            .ok_or_else(|| ClientError::resource_not_found(resource_id))?;

        let current = resource.quantity.ok_or_else(|| {
            ClientError::rejected(format!("resource {resource_id} does not track quantity"))
        })?;
        let updated = current + delta;
        if updated < 0.0 {
            return Err(ClientError::rejected(format!(
                "underflow: {resource_id} has {current}, cannot remove {}",
                -delta
            )));
        }
        if let Some(capacity) = resource.capacity {
            if updated > capacity {
                return Err(ClientError::rejected(format!(
                    "overflow: {resource_id} holds at most {capacity}, requested {updated}"
                )));
            }
        }
        resource.quantity = Some(updated);
        Ok(resource.clone())
    }
}

fn find<'a>(resource: &'a Resource, resource_id: &str) -> Option<&'a Resource> {
    if resource.resource_id == resource_id {
        return Some(resource);
    }
    resource
        .children()
        .into_iter()
        .find_map(|child| find(child, resource_id))
}

fn find_mut<'a>(resource: &'a mut Resource, resource_id: &str) -> Option<&'a mut Resource> {
    if resource.resource_id == resource_id {
        return Some(resource);
    }
    match resource.children.as_mut()? {
        ResourceChildren::Ordered(children) => children
            .iter_mut()
            .find_map(|child| find_mut(child, resource_id)),
        ResourceChildren::Keyed(children) => children
            .values_mut()
            .find_map(|child| find_mut(child, resource_id)),
    }
}

#[async_trait]
impl ResourceClient for InMemoryResourceStore {
    async fn get_resource(&self, resource_id: &str) -> ClientResult<Resource> {
        self.ensure_available()?;
        self.resources
            .read()
            .values()
            .find_map(|root| find(root, resource_id))
            .cloned()
            .ok_or_else(|| ClientError::resource_not_found(resource_id))
    }

    async fn query_resource(&self, query: &ResourceQuery) -> ClientResult<Vec<Resource>> {
        self.ensure_available()?;
        Ok(self
            .resources
            .read()
            .values()
            .filter(|resource| query.matches(resource))
            .cloned()
            .collect())
    }

    async fn increase_quantity(&self, resource_id: &str, amount: f64) -> ClientResult<Resource> {
        if amount < 0.0 {
            return Err(ClientError::rejected("increase amount must be non-negative"));
        }
        self.change_quantity(resource_id, amount)
    }

    async fn decrease_quantity(&self, resource_id: &str, amount: f64) -> ClientResult<Resource> {
        if amount < 0.0 {
            return Err(ClientError::rejected("decrease amount must be non-negative"));
        }
        self.change_quantity(resource_id, -amount)
    }
}

/// Location service keeping locations in insertion order
#[derive(Debug, Default)]
pub struct InMemoryLocationStore {
    locations: RwLock<Vec<Location>>,
    capabilities: RwLock<TransferCapabilities>,
    unavailable: AtomicBool,
}

impl InMemoryLocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_location(self, location: Location) -> Self {
        self.upsert(location);
        self
    }

    pub fn with_capabilities(self, capabilities: TransferCapabilities) -> Self {
        self.set_capabilities(capabilities);
        self
    }

    /// Insert a location, or replace the one with the same id in place
    pub fn upsert(&self, location: Location) {
        let mut locations = self.locations.write();
        match locations
            .iter_mut()
            .find(|existing| existing.location_id == location.location_id)
        {
            Some(existing) => *existing = location,
            None => locations.push(location),
        }
    }

    pub fn set_capabilities(&self, capabilities: TransferCapabilities) {
        *self.capabilities.write() = capabilities;
    }

    /// Attach (or with `None`, detach) the resource sitting at a location
    pub fn attach_resource(&self, location_id: &str, resource_id: Option<&str>) -> ClientResult<()> {
        let mut locations = self.locations.write();
        let location = locations
            .iter_mut()
            .find(|location| location.location_id == location_id)
            .ok_or_else(|| ClientError::location_not_found(location_id))?;
        location.resource_id = resource_id.map(str::to_string);
        Ok(())
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> ClientResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::Unavailable {
                service: "location",
                reason: "simulated outage".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl LocationClient for InMemoryLocationStore {
    async fn get_location(&self, location_id: &str) -> ClientResult<Location> {
        self.ensure_available()?;
        self.locations
            .read()
            .iter()
            .find(|location| location.location_id == location_id)
            .cloned()
            .ok_or_else(|| ClientError::location_not_found(location_id))
    }

    async fn list_locations(&self) -> ClientResult<Vec<Location>> {
        self.ensure_available()?;
        Ok(self.locations.read().clone())
    }

    async fn get_transfer_capabilities(&self) -> ClientResult<TransferCapabilities> {
        self.ensure_available()?;
        Ok(self.capabilities.read().clone())
    }

    async fn get_transfer_graph(&self) -> ClientResult<AdjacencyList> {
        self.ensure_available()?;
        let locations = self.locations.read().clone();
        let capabilities = self.capabilities.read().clone();
        let graph = TransferGraph::build(&locations, &capabilities)
            .map_err(|err| ClientError::InvalidResponse(err.to_string()))?;
        Ok(graph.adjacency_list())
    }
}
