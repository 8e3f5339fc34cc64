//! # Workcell Data Models
//!
//! Plain serde data types shared by every subsystem: workflows and their
//! steps, step preconditions, snapshots of externally owned resources and
//! locations, transfer capability definitions and node action messages.
//!
//! None of these types perform I/O. State changes to workflows go through
//! the state machine; resources and locations are only ever read.

pub mod action;
pub mod condition;
pub mod location;
pub mod resource;
pub mod step;
pub mod transfer;
pub mod workflow;

pub use action::{
    ActionRequest, ActionResult, ActionStatus, AdminCommand, AdminCommandResponse,
};
pub use condition::{ComparisonOperator, Condition, LocationRef, ResourcePresence, ResourceRef};
pub use location::Location;
pub use resource::{ChildKey, Resource, ResourceChildren, ResourceType};
pub use step::{FailurePolicy, QuantityChange, QuantityUpdate, Step, StepResult, TransferSpec};
pub use transfer::{AdjacencyEdge, AdjacencyList, TransferCapabilities, TransferTemplate};
pub use workflow::{Ownership, Workflow, WorkflowId};
