//! # Transfer Planning
//!
//! Multi-hop movement of resources between locations. The [`TransferGraph`]
//! is derived from the location service's transfer capabilities; the
//! [`TransferPlanner`] caches it, applies capacity-aware weights and runs a
//! deterministic Dijkstra search to produce a [`TransferPlan`].

pub mod errors;
pub mod graph;
pub mod planner;

pub use errors::{TransferError, TransferResult};
pub use graph::{EdgeOrigin, TransferEdge, TransferGraph};
pub use planner::{
    capacity_adjusted_weight, plan_on_graph, TransferHop, TransferPlan, TransferPlanner,
    TransferPlannerConfig,
};
