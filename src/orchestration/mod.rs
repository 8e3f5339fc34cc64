//! # Orchestration Engine
//!
//! The engine loop that drives queued workflows to completion on workcell nodes.
//!
//! ## Core Components
//!
//! - **WorkcellEngine**: tick loop combining scheduling, transfer expansion, dispatch and
//!   completion handling
//! - **NodeTracker**: live node-busy reservations
//! - **WorkflowLocks**: per-workflow async mutexes serializing read-modify-write
//! - **Action watchers**: one task per in-flight action reporting on the completion channel
//! - **StandardErrorClassifier**: maps node, condition and planner errors to failure kinds
//! - **BackoffCalculator**: retry delays for failed steps

pub mod backoff_calculator;
pub mod engine;
pub mod error_classifier;
pub mod node_tracker;
pub mod types;
pub mod watcher;
pub mod workflow_locks;

pub use backoff_calculator::{BackoffCalculator, BackoffCalculatorConfig, BackoffResult};
pub use engine::{EngineClients, WorkcellEngine};
pub use error_classifier::{ErrorClassification, StandardErrorClassifier};
pub use node_tracker::NodeTracker;
pub use types::{NodeAssignment, StepCompletion, StepOutcome, TickReport};
pub use watcher::{spawn_action_watcher, watch_action, WatchedAction};
pub use workflow_locks::WorkflowLocks;
