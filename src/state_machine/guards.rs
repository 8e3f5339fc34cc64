use super::errors::{GuardError, GuardResult};
use crate::models::Workflow;

/// Trait for implementing state transition guards
pub trait StateGuard<T> {
    /// Check if a transition is allowed
    fn check(&self, entity: &T) -> GuardResult<()>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// Guard to check that a step index names an existing step
pub struct StepIndexInRangeGuard {
    pub index: usize,
}

impl StateGuard<Workflow> for StepIndexInRangeGuard {
    fn check(&self, workflow: &Workflow) -> GuardResult<()> {
        if self.index >= workflow.steps.len() {
            return Err(GuardError::StepIndexOutOfRange {
                index: self.index,
                len: workflow.steps.len(),
            });
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Step index must name an existing step"
    }
}

/// Guard to check that no step of the workflow is running on a node
pub struct NoStepInFlightGuard;

impl StateGuard<Workflow> for NoStepInFlightGuard {
    fn check(&self, workflow: &Workflow) -> GuardResult<()> {
        match workflow.in_flight_step() {
            Some(index) => Err(GuardError::StepInFlight { index }),
            None => Ok(()),
        }
    }

    fn description(&self) -> &'static str {
        "No step may be running on a node"
    }
}

/// Guard to check that a step event targets the step at the workflow pointer
pub struct CurrentStepGuard {
    pub index: usize,
}

impl StateGuard<Workflow> for CurrentStepGuard {
    fn check(&self, workflow: &Workflow) -> GuardResult<()> {
        if self.index != workflow.step_index {
            return Err(GuardError::NotCurrentStep {
                index: self.index,
                pointer: workflow.step_index,
            });
        }
        StepIndexInRangeGuard { index: self.index }.check(workflow)
    }

    fn description(&self) -> &'static str {
        "Step events must target the step at the workflow pointer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Step;
    use crate::state_machine::states::StepStatus;

    fn workflow() -> Workflow {
        Workflow::new(
            "guards",
            vec![Step::new("a", "noop", "n1"), Step::new("b", "noop", "n1")],
        )
    }

    #[test]
    fn test_index_in_range() {
        let workflow = workflow();
        assert!(StepIndexInRangeGuard { index: 1 }.check(&workflow).is_ok());
        assert_eq!(
            StepIndexInRangeGuard { index: 2 }.check(&workflow),
            Err(GuardError::StepIndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_no_step_in_flight() {
        let mut workflow = workflow();
        assert!(NoStepInFlightGuard.check(&workflow).is_ok());
        workflow.steps[0].status = StepStatus::Running;
        assert_eq!(
            NoStepInFlightGuard.check(&workflow),
            Err(GuardError::StepInFlight { index: 0 })
        );
    }

    #[test]
    fn test_current_step() {
        let workflow = workflow();
        assert!(CurrentStepGuard { index: 0 }.check(&workflow).is_ok());
        assert!(CurrentStepGuard { index: 1 }.check(&workflow).is_err());
    }
}
