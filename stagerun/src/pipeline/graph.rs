//! The stage graph and dependency resolution.
//!
//! Resolution is a depth-first walk per requested stage. Each walk keeps the
//! chain of ancestors currently being expanded (for cycle reporting) and a
//! visited set shared across the walks of one plan, so a stage reachable
//! from several requested stages is emitted once, where the first walk
//! places it.

use super::{ExecutionPlan, StageDef};
use crate::errors::{CycleDetectedError, StagerunError, UnknownStageError};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

/// Mapping from stage name to definition, remembering declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageGraph {
    /// Stage definitions.
    stages: HashMap<String, StageDef>,
    /// Declaration order of stage names.
    stage_order: Vec<String>,
}

impl StageGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a stage, returning the previous definition.
    ///
    /// A replaced stage keeps its original declaration position.
    pub fn insert(&mut self, name: impl Into<String>, def: StageDef) -> Option<StageDef> {
        let name = name.into();
        let previous = self.stages.insert(name.clone(), def);
        if previous.is_none() {
            self.stage_order.push(name);
        }
        previous
    }

    /// Returns the definition of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StageDef> {
        self.stages.get(name)
    }

    /// Returns true if `name` is defined.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the graph has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stage_order.iter().map(String::as_str)
    }

    /// `(name, definition)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StageDef)> {
        self.stage_order
            .iter()
            .filter_map(|name| self.stages.get(name).map(|def| (name.as_str(), def)))
    }

    /// Stages that may be requested directly, in declaration order.
    pub fn requestable(&self) -> impl Iterator<Item = (&str, &StageDef)> {
        self.iter().filter(|(_, def)| !def.hidden)
    }

    /// Collects the requested stages from a name → enabled mapping.
    ///
    /// Only non-hidden stages are considered; the result follows declaration
    /// order, not the order of `flags`.
    #[must_use]
    pub fn select(&self, flags: &HashMap<String, bool>) -> Vec<String> {
        self.requestable()
            .filter(|(name, _)| flags.get(*name).copied().unwrap_or(false))
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Returns `stage` preceded by all of its transitive dependencies.
    ///
    /// # Errors
    ///
    /// Returns [`StagerunError::CircularDependency`] if the walk re-enters a
    /// stage on the current ancestor chain, or [`StagerunError::UnknownStage`]
    /// if a name is not in the graph.
    pub fn dependency_order(&self, stage: &str) -> Result<Vec<String>, StagerunError> {
        let mut visited = HashSet::new();
        let mut ordered = Vec::new();
        self.visit(stage, None, &mut Vec::new(), &mut visited, &mut ordered)?;
        Ok(ordered)
    }

    /// Builds the merged execution plan for `requested`.
    ///
    /// # Errors
    ///
    /// Fails as [`StageGraph::dependency_order`] does; no partial plan is
    /// returned.
    pub fn plan<S: AsRef<str>>(&self, requested: &[S]) -> Result<ExecutionPlan, StagerunError> {
        let mut visited = HashSet::new();
        let mut plan = ExecutionPlan::new();

        for stage in requested {
            let mut partial = Vec::new();
            self.visit(stage.as_ref(), None, &mut Vec::new(), &mut visited, &mut partial)?;
            debug!(stage = stage.as_ref(), order = ?partial, "resolved dependency chain");
            plan.merge(partial);
        }

        Ok(plan)
    }

    fn visit(
        &self,
        name: &str,
        parent: Option<&str>,
        path: &mut Vec<String>,
        visited: &mut HashSet<String>,
        ordered: &mut Vec<String>,
    ) -> Result<(), StagerunError> {
        if path.iter().any(|ancestor| ancestor == name) {
            let mut cycle = path.clone();
            cycle.push(name.to_string());
            return Err(CycleDetectedError::new(cycle).into());
        }

        let Some(def) = self.stages.get(name) else {
            let err = UnknownStageError::new(name);
            return Err(match parent {
                Some(parent) => err.referenced_by(parent),
                None => err,
            }
            .into());
        };

        path.push(name.to_string());
        for dep in &def.dependencies {
            if !visited.contains(dep) {
                self.visit(dep, Some(name), path, visited, ordered)?;
            }
        }
        path.pop();

        if visited.insert(name.to_string()) {
            ordered.push(name.to_string());
        }
        Ok(())
    }
}

impl Serialize for StageGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, def) in self.iter() {
            map.serialize_entry(name, def)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for StageGraph {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GraphVisitor;

        impl<'de> Visitor<'de> for GraphVisitor {
            type Value = StageGraph;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of stage names to stage definitions")
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(StageGraph::new())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut graph = StageGraph::new();
                while let Some((name, def)) = access.next_entry::<String, Option<StageDef>>()? {
                    if graph.contains(&name) {
                        return Err(serde::de::Error::custom(format!("duplicate stage '{name}'")));
                    }
                    graph.insert(name, def.unwrap_or_default());
                }
                Ok(graph)
            }
        }

        deserializer.deserialize_any(GraphVisitor)
    }
}

/// Builder for stage graphs assembled in code.
#[derive(Debug, Clone, Default)]
pub struct StageGraphBuilder {
    graph: StageGraph,
}

impl StageGraphBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stage with the given dependencies and commands.
    #[must_use]
    pub fn stage(self, name: &str, dependencies: &[&str], commands: &[&str]) -> Self {
        self.stage_def(
            name,
            StageDef::new()
                .with_dependencies(dependencies.iter().copied())
                .with_commands(commands.iter().copied()),
        )
    }

    /// Adds a fully specified stage, replacing any earlier one of that name.
    #[must_use]
    pub fn stage_def(mut self, name: &str, def: StageDef) -> Self {
        self.graph.insert(name, def);
        self
    }

    /// Builds the graph. Dependencies are checked when a plan is resolved.
    #[must_use]
    pub fn build(self) -> StageGraph {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assert_cycle, assert_dependencies_precede, graph_from_edges};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_linear_chain() {
        let g = graph_from_edges(&[("a", &[]), ("b", &["a"]), ("c", &["b"])]);
        let plan = g.plan(&["c"]).unwrap();
        assert_eq!(plan.as_slice(), &["a", "b", "c"]);
    }

    #[test]
    fn test_two_node_cycle() {
        let g = graph_from_edges(&[("a", &["b"]), ("b", &["a"])]);
        assert_cycle(g.plan(&["a"]), &["a", "b", "a"]);
        assert_eq!(
            g.plan(&["a"]).unwrap_err().to_string(),
            "Circular dependency: a -> b -> a"
        );
    }

    #[test]
    fn test_cycle_path_excludes_popped_siblings() {
        // d is fully expanded and popped before the cycle through b is found.
        let g = graph_from_edges(&[
            ("top", &["d", "b"]),
            ("d", &[]),
            ("b", &["c"]),
            ("c", &["b"]),
        ]);
        assert_cycle(g.plan(&["top"]), &["top", "b", "c", "b"]);
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let g = graph_from_edges(&[("a", &["a"])]);
        assert_cycle(g.dependency_order("a"), &["a", "a"]);
    }

    #[test]
    fn test_unknown_requested_stage() {
        let g = graph_from_edges(&[("a", &[])]);
        let err = g.plan(&["missing"]).unwrap_err();
        let StagerunError::UnknownStage(unknown) = err else {
            panic!("expected unknown stage");
        };
        assert_eq!(unknown, UnknownStageError::new("missing"));
    }

    #[test]
    fn test_unknown_dependency_names_parent() {
        let g = graph_from_edges(&[("build", &["configure"])]);
        let StagerunError::UnknownStage(unknown) = g.plan(&["build"]).unwrap_err() else {
            panic!("expected unknown stage");
        };
        assert_eq!(unknown.stage, "configure");
        assert_eq!(unknown.referenced_by.as_deref(), Some("build"));
    }

    #[test]
    fn test_shared_dependency_emitted_once() {
        let g = graph_from_edges(&[
            ("setup", &[]),
            ("build", &["setup"]),
            ("test", &["setup", "build"]),
            ("docs", &["setup"]),
        ]);
        let plan = g.plan(&["test", "docs"]).unwrap();
        assert_eq!(plan.as_slice(), &["setup", "build", "test", "docs"]);
        assert_dependencies_precede(&g, &plan);
    }

    #[test]
    fn test_diamond_order_follows_declared_dependencies() {
        let g = graph_from_edges(&[
            ("base", &[]),
            ("left", &["base"]),
            ("right", &["base"]),
            ("top", &["right", "left"]),
        ]);
        let plan = g.plan(&["top"]).unwrap();
        assert_eq!(plan.as_slice(), &["base", "right", "left", "top"]);
    }

    #[test]
    fn test_request_order_drives_merge() {
        let g = graph_from_edges(&[("a", &[]), ("b", &[]), ("c", &["a"])]);
        assert_eq!(g.plan(&["b", "c"]).unwrap().as_slice(), &["b", "a", "c"]);
        assert_eq!(g.plan(&["c", "b"]).unwrap().as_slice(), &["a", "c", "b"]);
    }

    #[test]
    fn test_cycle_yields_no_partial_plan() {
        let g = graph_from_edges(&[("ok", &[]), ("x", &["y"]), ("y", &["x"])]);
        assert!(g.plan(&["ok", "x"]).is_err());
    }

    #[test]
    fn test_hidden_stage_participates_as_dependency() {
        let g = StageGraphBuilder::new()
            .stage_def("toolchain", StageDef::new().hidden())
            .stage_def("setup", StageDef::new().hidden().with_dependency("toolchain"))
            .stage("build", &["setup"], &["make"])
            .build();

        assert_eq!(
            g.requestable().map(|(n, _)| n).collect::<Vec<_>>(),
            vec!["build"]
        );
        assert_eq!(
            g.plan(&["build"]).unwrap().as_slice(),
            &["toolchain", "setup", "build"]
        );
    }

    #[test]
    fn test_select_uses_declaration_order_and_skips_hidden() {
        let g = StageGraphBuilder::new()
            .stage("clean", &[], &[])
            .stage_def("internal", StageDef::new().hidden())
            .stage("build", &[], &[])
            .build();
        let flags: HashMap<String, bool> = [
            ("build".to_string(), true),
            ("clean".to_string(), true),
            ("internal".to_string(), true),
        ]
        .into_iter()
        .collect();

        assert_eq!(g.select(&flags), vec!["clean", "build"]);
    }

    #[test]
    fn test_deserialize_preserves_declaration_order() {
        let yaml = "
zeta:
  commands: [\"echo z\"]
alpha:
  dependencies: [zeta]
mid:
";
        let g: StageGraph = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(g.names().collect::<Vec<_>>(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(g.get("mid"), Some(&StageDef::default()));

        let round: StageGraph = serde_yaml::from_str(&serde_yaml::to_string(&g).unwrap()).unwrap();
        assert_eq!(round, g);
    }

    #[test]
    fn test_larger_graph_respects_dependencies() {
        let g = graph_from_edges(&[
            ("fetch", &[]),
            ("patch", &["fetch"]),
            ("configure", &["patch", "fetch"]),
            ("compile", &["configure"]),
            ("package", &["compile", "patch"]),
            ("lint", &["fetch"]),
            ("test", &["compile", "lint"]),
        ]);
        let plan = g.plan(&["package", "test", "lint"]).unwrap();
        assert_eq!(plan.len(), 7);
        assert_dependencies_precede(&g, &plan);
    }
}
