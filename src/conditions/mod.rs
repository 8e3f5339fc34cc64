//! # Condition Evaluation
//!
//! Step preconditions gate dispatch on live workcell state. Evaluation
//! separates three outcomes the scheduler treats differently:
//!
//! - `Ok(true)`: satisfied
//! - `Ok(false)`: not yet satisfied, keep waiting
//! - `Err(ConditionError::ResolutionFailed)`: the condition references
//!   something that does not exist, so the step fails
//!
//! A collaborator outage (`ConditionError::ServiceUnavailable`) blocks the
//! step for the current tick without failing it.

pub mod errors;
pub mod evaluator;

pub use errors::{ConditionError, ConditionResult};
pub use evaluator::{evaluate, evaluate_all};
