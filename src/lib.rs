#![allow(clippy::doc_markdown)] // Allow technical terms like WorkflowId, OD in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Workcell Core
//!
//! Execution engine for laboratory workcells: queued workflows of steps run on
//! instrument and robot nodes, gated by preconditions on resources and
//! locations, with material transfers routed through a capacity-aware planner.
//!
//! ## Module Organization
//!
//! - [`models`] - Workflows, steps, conditions, resources, locations and node messages
//! - [`state_machine`] - Pure workflow transition function and the state store
//! - [`conditions`] - Step precondition evaluation
//! - [`scheduler`] - FIFO and priority selection of the next runnable step
//! - [`transfer`] - Transfer graph construction and shortest-path planning
//! - [`orchestration`] - The engine loop, node tracking and action watchers
//! - [`client`] - Node, resource and location service traits plus in-memory implementations
//! - [`events`] - Lifecycle event broadcasting
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use workcell_core::client::{InMemoryLocationStore, InMemoryResourceStore, SimulatedNodeClient};
//! use workcell_core::config::WorkcellConfig;
//! use workcell_core::models::{Step, Workflow};
//! use workcell_core::orchestration::{EngineClients, WorkcellEngine};
//!
//! # async fn example() -> workcell_core::Result<()> {
//! let engine = Arc::new(WorkcellEngine::new(
//!     WorkcellConfig::default(),
//!     EngineClients {
//!         nodes: Arc::new(SimulatedNodeClient::new()),
//!         resources: Arc::new(InMemoryResourceStore::new()),
//!         locations: Arc::new(InMemoryLocationStore::new()),
//!     },
//! )?);
//!
//! engine
//!     .submit(Workflow::new("read plate", vec![Step::new("read", "read_od", "plate_reader")]))
//!     .await?;
//!
//! let runner = Arc::clone(&engine);
//! tokio::spawn(async move { runner.run().await });
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod conditions;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod scheduler;
pub mod state_machine;
pub mod transfer;

pub use config::{ConfigManager, WorkcellConfig};
pub use constants::{status_groups, system};
// Re-export constants events with different name to avoid conflict
pub use constants::events as system_events;
pub use error::{Result, WorkcellError};
pub use models::{Step, Workflow, WorkflowId};
pub use orchestration::{EngineClients, TickReport, WorkcellEngine};
pub use scheduler::{SchedulerKind, WorkflowScheduler};
pub use state_machine::{StepStatus, WorkflowStatus};
pub use transfer::{TransferPlan, TransferPlanner};
