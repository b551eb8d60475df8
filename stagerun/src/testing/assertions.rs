//! Test assertions for plans and errors.

use crate::errors::StagerunError;
use crate::pipeline::{ExecutionPlan, StageGraph};

/// Asserts that every stage in `plan` comes after all of its transitive
/// dependencies, and that no stage appears twice.
///
/// # Panics
///
/// Panics if the plan is not dependency-correct.
pub fn assert_dependencies_precede(graph: &StageGraph, plan: &ExecutionPlan) {
    for (idx, stage) in plan.iter().enumerate() {
        assert_eq!(
            plan.position(stage),
            Some(idx),
            "stage '{stage}' appears more than once in {plan}"
        );
        let chain = graph
            .dependency_order(stage)
            .unwrap_or_else(|err| panic!("cannot resolve '{stage}': {err}"));
        for dep in chain {
            let dep_idx = plan
                .position(&dep)
                .unwrap_or_else(|| panic!("dependency '{dep}' of '{stage}' missing from {plan}"));
            assert!(dep_idx <= idx, "'{dep}' must precede '{stage}' in {plan}");
        }
    }
}

/// Asserts that `result` failed with a cycle through exactly `expected`.
///
/// # Panics
///
/// Panics if the result is not a cycle error with that path.
pub fn assert_cycle<T: std::fmt::Debug>(result: Result<T, StagerunError>, expected: &[&str]) {
    match result {
        Err(StagerunError::CircularDependency(cycle)) => {
            assert_eq!(cycle.cycle_path, expected, "unexpected cycle path");
        }
        other => panic!("expected a cycle through {expected:?}, got {other:?}"),
    }
}

/// Asserts that `result` failed with the given error code.
///
/// # Panics
///
/// Panics if the result succeeded or failed with another code.
pub fn assert_error_code<T: std::fmt::Debug>(result: Result<T, StagerunError>, code: &str) {
    match result {
        Err(err) => assert_eq!(err.code(), code, "unexpected error: {err}"),
        Ok(value) => panic!("expected error {code}, got Ok({value:?})"),
    }
}
