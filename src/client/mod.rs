//! # Collaborator Clients
//!
//! Contracts for everything the engine talks to but does not own:
//!
//! - **NodeClient**: dispatches actions to instrument nodes, polls their
//!   status and propagates administrative commands
//! - **ResourceClient**: reads resource snapshots and requests quantity changes
//! - **LocationClient**: reads locations and transfer capabilities
//!
//! The [`memory`] module provides process-local implementations used by the
//! test suite and for simulated runs.

pub mod errors;
pub mod memory;
pub mod traits;

pub use errors::{ClientError, ClientResult, NodeError, NodeResult};
pub use memory::{
    InMemoryLocationStore, InMemoryResourceStore, SimulatedNodeClient, SimulatedOutcome,
};
pub use traits::{LocationClient, NodeClient, ResourceClient, ResourceQuery};
