//! # Transfer Planner
//!
//! Turns a (source, target) request into a concrete sequence of node actions.
//!
//! The planner caches the transfer graph and only rebuilds it after
//! [`TransferPlanner::invalidate`]. Capacity-aware weights are not cached:
//! every plan re-reads the utilization of the resources attached to each
//! location.

use futures::future::join_all;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::errors::{TransferError, TransferResult};
use super::graph::{TransferEdge, TransferGraph};
use crate::client::{LocationClient, ResourceClient};
use crate::models::{AdjacencyList, Location, Step};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferPlannerConfig {
    /// Scale edge weights by the utilization of the target location
    pub capacity_aware: bool,
    pub utilization_penalty: f64,
}

impl Default for TransferPlannerConfig {
    fn default() -> Self {
        Self {
            capacity_aware: true,
            utilization_penalty: 1.0,
        }
    }
}

/// Effective weight of an edge into a location at `utilization`.
///
/// Monotonically non-decreasing in `utilization` for a non-negative penalty,
/// and finite for every finite input.
pub fn capacity_adjusted_weight(base_weight: f64, utilization: f64, penalty: f64) -> f64 {
    base_weight * (1.0 + penalty * utilization.max(0.0))
}

/// One concrete action moving a resource between adjacent locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferHop {
    pub source: String,
    pub target: String,
    pub node: String,
    pub action: String,
    pub args: BTreeMap<String, Value>,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferPlan {
    pub source: String,
    pub target: String,
    pub hops: Vec<TransferHop>,
    pub total_cost: f64,
}

impl TransferPlan {
    /// Source and target are the same location; nothing to move
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    /// Expand a transfer step into one step per hop.
    ///
    /// The first hop inherits the step's preconditions and the last hop its
    /// resource updates; every hop inherits the retry, timeout and failure
    /// policy.
    pub fn into_steps(&self, transfer_step: &Step) -> Vec<Step> {
        let count = self.hops.len();
        self.hops
            .iter()
            .enumerate()
            .map(|(position, hop)| {
                let name = if count == 1 {
                    transfer_step.name.clone()
                } else {
                    format!("{} [{}/{}]", transfer_step.name, position + 1, count)
                };
                let mut step = Step::new(name, hop.action.clone(), hop.node.clone());
                step.args = hop.args.clone();
                step.max_retries = transfer_step.max_retries;
                step.timeout_seconds = transfer_step.timeout_seconds;
                step.on_failure = transfer_step.on_failure;
                step.spliced_from = Some(transfer_step.name.clone());
                if position == 0 {
                    step.conditions = transfer_step.conditions.clone();
                }
                if position + 1 == count {
                    step.resource_updates = transfer_step.resource_updates.clone();
                }
                step
            })
            .collect()
    }
}

/// Plan over an already built graph with known utilizations.
///
/// `utilization` maps vertex index to fill ratio; missing vertices count as
/// empty. Never mutates the graph.
pub fn plan_on_graph(
    graph: &TransferGraph,
    source: &str,
    target: &str,
    utilization: &HashMap<usize, f64>,
    config: &TransferPlannerConfig,
) -> TransferResult<TransferPlan> {
    let from = graph.vertex(source).ok_or_else(|| {
        TransferError::no_path(source, target, "source is unknown or excluded from transfers")
    })?;
    let to = graph.vertex(target).ok_or_else(|| {
        TransferError::no_path(source, target, "target is unknown or excluded from transfers")
    })?;

    let weight = |edge: &TransferEdge| {
        if config.capacity_aware {
            let fill = utilization.get(&edge.to).copied().unwrap_or(0.0);
            capacity_adjusted_weight(edge.base_weight(), fill, config.utilization_penalty)
        } else {
            edge.base_weight()
        }
    };

    let (path, total_cost) = graph
        .shortest_path(from, to, weight)
        .ok_or_else(|| TransferError::no_path(source, target, "locations are not connected"))?;

    let hops = path
        .into_iter()
        .filter_map(|edge| {
            let hop_source = graph.location(edge.from)?;
            let hop_target = graph.location(edge.to)?;
            Some(TransferHop {
                source: hop_source.location_id.clone(),
                target: hop_target.location_id.clone(),
                node: edge.template.node.clone(),
                action: edge.template.action.clone(),
                args: hop_arguments(edge, hop_source, hop_target),
                weight: weight(edge),
            })
        })
        .collect();

    Ok(TransferPlan {
        source: graph
            .location(from)
            .map_or_else(|| source.to_string(), |location| location.location_id.clone()),
        target: graph
            .location(to)
            .map_or_else(|| target.to_string(), |location| location.location_id.clone()),
        hops,
        total_cost,
    })
}

/// Template defaults, then the node's representation of each endpoint
/// (the location id when the node has none)
fn hop_arguments(edge: &TransferEdge, source: &Location, target: &Location) -> BTreeMap<String, Value> {
    let node = &edge.template.node;
    let endpoint = |location: &Location| {
        location
            .representations
            .get(node)
            .cloned()
            .unwrap_or_else(|| Value::String(location.location_id.clone()))
    };

    let mut args = edge.template.default_args.clone();
    args.insert(edge.template.source_argument.clone(), endpoint(source));
    args.insert(edge.template.target_argument.clone(), endpoint(target));
    args
}

/// Caching planner backed by the location and resource services
pub struct TransferPlanner {
    locations: Arc<dyn LocationClient>,
    resources: Arc<dyn ResourceClient>,
    config: TransferPlannerConfig,
    cache: RwLock<Option<Arc<TransferGraph>>>,
    generation: AtomicU64,
    rebuilds: AtomicU64,
}

impl std::fmt::Debug for TransferPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferPlanner")
            .field("config", &self.config)
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .field("rebuilds", &self.rebuilds.load(Ordering::SeqCst))
            .finish()
    }
}

impl TransferPlanner {
    pub fn new(
        locations: Arc<dyn LocationClient>,
        resources: Arc<dyn ResourceClient>,
        config: TransferPlannerConfig,
    ) -> Self {
        Self {
            locations,
            resources,
            config,
            cache: RwLock::new(None),
            generation: AtomicU64::new(0),
            rebuilds: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &TransferPlannerConfig {
        &self.config
    }

    /// Drop the cached graph; the next plan rebuilds it.
    ///
    /// Call whenever locations, representations or templates change.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.cache.write() = None;
        debug!("Transfer graph invalidated");
    }

    /// Number of graph builds so far
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.load(Ordering::SeqCst)
    }

    /// The cached graph, building it first if needed
    pub async fn graph(&self) -> TransferResult<Arc<TransferGraph>> {
        let cached = self.cache.read().clone();
        if let Some(graph) = cached {
            return Ok(graph);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let locations = self.locations.list_locations().await?;
        let capabilities = self.locations.get_transfer_capabilities().await?;
        let graph = Arc::new(TransferGraph::build(&locations, &capabilities)?);
        self.rebuilds.fetch_add(1, Ordering::SeqCst);

        crate::log_transfer!(
            debug,
            "GRAPH_BUILT",
            vertices: graph.vertex_count(),
            edges: graph.edge_count()
        );

        // Skip caching when an invalidation raced with the build
        if self.generation.load(Ordering::SeqCst) == generation {
            *self.cache.write() = Some(Arc::clone(&graph));
        }
        Ok(graph)
    }

    /// Cached graph as an adjacency list, for inspection
    pub async fn adjacency(&self) -> TransferResult<AdjacencyList> {
        Ok(self.graph().await?.adjacency_list())
    }

    /// Cheapest route from `source` to `target` (location ids or names)
    #[instrument(skip(self), fields(capacity_aware = self.config.capacity_aware))]
    pub async fn plan(&self, source: &str, target: &str) -> TransferResult<TransferPlan> {
        let graph = self.graph().await?;
        let utilization = if self.config.capacity_aware {
            self.utilization(&graph).await
        } else {
            HashMap::new()
        };

        match plan_on_graph(&graph, source, target, &utilization, &self.config) {
            Ok(plan) => {
                crate::log_transfer!(
                    info,
                    "PLANNED",
                    source: source,
                    target: target,
                    hops: plan.len(),
                    total_cost: plan.total_cost
                );
                Ok(plan)
            }
            Err(err) => {
                crate::log_transfer!(warn, "NO_PATH", source: source, target: target, error: err.to_string());
                Err(err)
            }
        }
    }

    /// Current fill ratio of each location's attached resource; unknown counts as empty
    async fn utilization(&self, graph: &TransferGraph) -> HashMap<usize, f64> {
        let reads = graph
            .locations()
            .iter()
            .enumerate()
            .filter_map(|(vertex, location)| {
                let resource_id = location.resource_id.as_deref()?;
                Some(async move {
                    match self.resources.get_resource(resource_id).await {
                        Ok(resource) => resource.utilization().map(|fill| (vertex, fill)),
                        Err(err) => {
                            warn!(
                                location = %location.location_id,
                                resource = %resource_id,
                                error = %err,
                                "Utilization unavailable, treating location as empty"
                            );
                            None
                        }
                    }
                })
            });

        join_all(reads).await.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComparisonOperator, Condition, QuantityUpdate, TransferCapabilities, TransferTemplate};
    use serde_json::json;

    #[test]
    fn test_capacity_weight_is_monotonic() {
        let mut previous = capacity_adjusted_weight(2.0, 0.0, 1.0);
        assert_eq!(previous, 2.0);
        for step in 1..=20 {
            let weight = capacity_adjusted_weight(2.0, f64::from(step) * 0.1, 1.0);
            assert!(weight >= previous);
            assert!(weight.is_finite());
            previous = weight;
        }
        assert_eq!(capacity_adjusted_weight(2.0, 1.0, 1.0), 4.0);
    }

    #[test]
    fn test_hop_arguments_use_representations() {
        let locations = vec![
            Location::new("a", "A").with_representation("arm", json!({"x": 1})),
            Location::new("b", "B"),
        ];
        let capabilities = TransferCapabilities::default().with_pair_override(
            "a",
            "b",
            TransferTemplate::new("arm", "transfer", 1.0)
                .with_arguments("from", "to")
                .with_default_arg("speed", json!("slow")),
        );
        let graph = TransferGraph::build(&locations, &capabilities).unwrap();
        let plan = plan_on_graph(&graph, "a", "b", &HashMap::new(), &TransferPlannerConfig::default())
            .unwrap();

        assert_eq!(plan.len(), 1);
        let args = &plan.hops[0].args;
        assert_eq!(args["from"], json!({"x": 1}));
        assert_eq!(args["to"], json!("b"));
        assert_eq!(args["speed"], json!("slow"));
    }

    #[test]
    fn test_same_location_yields_empty_plan() {
        let graph = TransferGraph::build(&[Location::new("a", "A")], &TransferCapabilities::default())
            .unwrap();
        let plan =
            plan_on_graph(&graph, "a", "A", &HashMap::new(), &TransferPlannerConfig::default()).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.total_cost, 0.0);
    }

    #[test]
    fn test_into_steps_splices_hops() {
        let plan = TransferPlan {
            source: "a".into(),
            target: "c".into(),
            hops: vec![
                TransferHop {
                    source: "a".into(),
                    target: "b".into(),
                    node: "arm".into(),
                    action: "transfer".into(),
                    args: BTreeMap::new(),
                    weight: 2.0,
                },
                TransferHop {
                    source: "b".into(),
                    target: "c".into(),
                    node: "gantry".into(),
                    action: "move".into(),
                    args: BTreeMap::new(),
                    weight: 1.0,
                },
            ],
            total_cost: 3.0,
        };
        let transfer = Step::transfer("to_reader", "a", "c")
            .with_max_retries(1)
            .with_condition(Condition::field_check(
                "tips",
                "quantity",
                ComparisonOperator::GreaterThan,
                json!(0),
            ))
            .with_resource_update(QuantityUpdate::decrease("tips", 1.0));

        let steps = plan.into_steps(&transfer);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].name, "to_reader [1/2]");
        assert_eq!(steps[0].node.as_deref(), Some("arm"));
        assert_eq!(steps[0].conditions.len(), 1);
        assert!(steps[0].resource_updates.is_empty());
        assert!(steps[1].conditions.is_empty());
        assert_eq!(steps[1].resource_updates.len(), 1);
        assert!(steps
            .iter()
            .all(|step| step.spliced_from.as_deref() == Some("to_reader") && step.max_retries == Some(1)));
    }
}
