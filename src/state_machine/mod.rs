// State machine module for workflow execution
//
// A pure transition function over workflow values plus the state store the
// engine persists its results to. Transitions describe their side effects
// instead of performing them, so the engine owns every piece of I/O.

pub mod actions;
pub mod errors;
pub mod events;
pub mod guards;
pub mod persistence;
pub mod states;
pub mod workflow_state_machine;

// Re-export main types for convenient access
pub use actions::TransitionEffect;
pub use errors::{GuardError, PersistenceError, StateMachineError};
pub use events::{FailureKind, WorkflowEvent};
pub use states::{StepStatus, WorkflowStatus};
pub use workflow_state_machine::{RetryPolicy, Transition, WorkflowStateMachine};

// Common traits and utilities
pub use guards::StateGuard;
pub use persistence::{InMemoryStateStore, StateStore};
