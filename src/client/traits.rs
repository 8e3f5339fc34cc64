//! # Collaborator Client Traits
//!
//! The narrow contracts the engine uses to reach the world outside the core:
//! instrument nodes, the resource service and the location service. The core
//! never assumes a transport; implementations may speak HTTP, a message bus,
//! or (as in [`crate::client::memory`]) nothing at all.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::errors::{ClientResult, NodeError, NodeResult};
use crate::constants::system::DEFAULT_ACTION_POLL_INTERVAL_MS;
use crate::models::{
    ActionRequest, ActionResult, ActionStatus, AdjacencyList, AdminCommand, AdminCommandResponse,
    Location, Resource, ResourceType, TransferCapabilities,
};

/// Contract for dispatching actions to instrument nodes
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Hand an action to a node. Long-running actions come back `Running`.
    async fn send_action(&self, node: &str, request: &ActionRequest) -> NodeResult<ActionResult>;

    async fn get_action_status(&self, node: &str, action_id: Uuid) -> NodeResult<ActionStatus>;

    async fn get_action_result(&self, node: &str, action_id: Uuid) -> NodeResult<ActionResult>;

    /// Poll until the action reaches a terminal status or `timeout` expires.
    ///
    /// Expiry is reported as [`NodeError::Timeout`], never as a node failure.
    async fn await_action_result(
        &self,
        node: &str,
        action_id: Uuid,
        timeout: Duration,
    ) -> NodeResult<ActionResult> {
        let poll_interval = self.poll_interval();
        let wait = async {
            loop {
                match self.get_action_status(node, action_id).await {
                    Ok(status) if status.is_terminal() => {
                        break self.get_action_result(node, action_id).await;
                    }
                    Ok(_) => tokio::time::sleep(poll_interval).await,
                    Err(err) => break Err(err),
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(NodeError::Timeout {
                node: node.to_string(),
                action_id,
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Propagate pause/resume/cancel to the hardware behind a node
    async fn send_admin_command(
        &self,
        node: &str,
        command: AdminCommand,
    ) -> NodeResult<AdminCommandResponse>;

    /// Interval between status polls in [`NodeClient::await_action_result`]
    fn poll_interval(&self) -> Duration {
        Duration::from_millis(DEFAULT_ACTION_POLL_INTERVAL_MS)
    }
}

/// Filter for [`ResourceClient::query_resource`]; unset fields match anything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceQuery {
    pub resource_name: Option<String>,
    pub resource_class: Option<String>,
    pub base_type: Option<ResourceType>,
}

impl ResourceQuery {
    pub fn by_class(resource_class: impl Into<String>) -> Self {
        Self {
            resource_class: Some(resource_class.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, resource: &Resource) -> bool {
        self.resource_name
            .as_ref()
            .map_or(true, |name| &resource.resource_name == name)
            && self
                .resource_class
                .as_ref()
                .map_or(true, |class| resource.resource_class.as_ref() == Some(class))
            && self
                .base_type
                .map_or(true, |base_type| resource.base_type == base_type)
    }
}

/// Contract for reading resources and requesting quantity changes
#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn get_resource(&self, resource_id: &str) -> ClientResult<Resource>;

    async fn query_resource(&self, query: &ResourceQuery) -> ClientResult<Vec<Resource>>;

    /// Rejected by the service when the result would exceed capacity
    async fn increase_quantity(&self, resource_id: &str, amount: f64) -> ClientResult<Resource>;

    /// Rejected by the service when the result would drop below zero
    async fn decrease_quantity(&self, resource_id: &str, amount: f64) -> ClientResult<Resource>;
}

/// Contract for reading locations and transfer capabilities
#[async_trait]
pub trait LocationClient: Send + Sync {
    async fn get_location(&self, location_id: &str) -> ClientResult<Location>;

    async fn list_locations(&self) -> ClientResult<Vec<Location>>;

    async fn get_transfer_capabilities(&self) -> ClientResult<TransferCapabilities>;

    /// Materialized transfer graph, for external inspection and debugging
    async fn get_transfer_graph(&self) -> ClientResult<AdjacencyList>;
}
