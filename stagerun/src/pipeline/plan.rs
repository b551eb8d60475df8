//! Execution plans.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered, deduplicated list of stages to run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionPlan {
    stages: Vec<String>,
}

impl ExecutionPlan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `stage` unless it is already planned. Returns true if added.
    pub fn push_unique(&mut self, stage: impl Into<String>) -> bool {
        let stage = stage.into();
        if self.contains(&stage) {
            return false;
        }
        self.stages.push(stage);
        true
    }

    /// Appends a partial order, skipping stages already planned.
    pub fn merge(&mut self, partial: impl IntoIterator<Item = impl Into<String>>) {
        for stage in partial {
            self.push_unique(stage);
        }
    }

    /// Removes `stage` from the plan. Returns true if it was present.
    pub fn extract(&mut self, stage: &str) -> bool {
        match self.position(stage) {
            Some(idx) => {
                self.stages.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Returns true if `stage` is planned.
    #[must_use]
    pub fn contains(&self, stage: &str) -> bool {
        self.stages.iter().any(|s| s == stage)
    }

    /// Returns the index of `stage` in the plan.
    #[must_use]
    pub fn position(&self, stage: &str) -> Option<usize> {
        self.stages.iter().position(|s| s == stage)
    }

    /// Returns the number of planned stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if nothing is planned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Iterates over stage names in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(String::as_str)
    }

    /// Returns the stage names as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.stages
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stages.join(" -> "))
    }
}

impl<S: Into<String>> FromIterator<S> for ExecutionPlan {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut plan = Self::new();
        plan.merge(iter);
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_preserves_first_seen_order() {
        let mut plan = ExecutionPlan::new();
        plan.merge(["a", "b", "c"]);
        plan.merge(["a", "d", "c", "e"]);
        assert_eq!(plan.as_slice(), &["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_extract() {
        let mut plan: ExecutionPlan = ["clean", "configure", "build"].into_iter().collect();
        assert!(plan.extract("clean"));
        assert!(!plan.extract("clean"));
        assert_eq!(plan.to_string(), "configure -> build");
    }

    #[test]
    fn test_serializes_as_list() {
        let plan: ExecutionPlan = ["a", "b"].into_iter().collect();
        assert_eq!(serde_json::to_string(&plan).unwrap(), r#"["a","b"]"#);
    }
}
