//! Driver phases and per-run execution state.

use crate::core::RunStatus;
use crate::pipeline::ExecutionPlan;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the driver is in its lifecycle.
///
/// `Idle → VariablesResolved → PlanBuilt → Executing → Succeeded | Failed`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverPhase {
    /// Nothing has happened yet.
    #[default]
    Idle,
    /// The variable environment reached its fixed point.
    VariablesResolved,
    /// The merged execution plan is known.
    PlanBuilt,
    /// Stages are running.
    Executing,
    /// Every stage completed.
    Succeeded,
    /// A stage failed, or validation failed.
    Failed,
}

impl DriverPhase {
    /// Returns true for `Succeeded` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for DriverPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::VariablesResolved => "variables_resolved",
            Self::PlanBuilt => "plan_built",
            Self::Executing => "executing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Mutable state of one run, owned by the driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionState {
    /// Stages still to be run after `clean` was pulled out.
    pub plan: ExecutionPlan,
    /// Stages that completed, in order (including `clean`).
    pub completed: Vec<String>,
    /// Overall status.
    pub status: RunStatus,
}

impl ExecutionState {
    /// Creates a running state for `plan`.
    #[must_use]
    pub fn new(plan: ExecutionPlan) -> Self {
        Self {
            plan,
            completed: Vec::new(),
            status: RunStatus::Running,
        }
    }

    /// Records a completed stage.
    pub fn mark_completed(&mut self, stage: impl Into<String>) {
        self.completed.push(stage.into());
    }

    /// Marks the run failed at `stage`.
    pub fn fail(&mut self, stage: impl Into<String>, exit_code: Option<i32>) {
        self.status = RunStatus::Failed {
            stage: stage.into(),
            exit_code,
        };
    }

    /// Marks the run successful.
    pub fn succeed(&mut self) {
        self.status = RunStatus::Success;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_terminal() {
        assert!(DriverPhase::Succeeded.is_terminal());
        assert!(DriverPhase::Failed.is_terminal());
        assert!(!DriverPhase::Executing.is_terminal());
        assert_eq!(DriverPhase::PlanBuilt.to_string(), "plan_built");
    }

    #[test]
    fn test_execution_state_transitions() {
        let plan: ExecutionPlan = ["a", "b", "c"].into_iter().collect();
        let mut state = ExecutionState::new(plan);
        assert_eq!(state.status, RunStatus::Running);

        state.mark_completed("a");
        assert_eq!(state.completed, vec!["a"]);

        state.fail("b", Some(1));
        assert_eq!(
            state.status,
            RunStatus::Failed {
                stage: "b".to_string(),
                exit_code: Some(1)
            }
        );
    }
}
