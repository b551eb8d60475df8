//! Stage definitions.

use serde::{Deserialize, Serialize};

/// Name of the stage that is pulled out of the plan and run before logging starts.
pub const CLEAN_STAGE: &str = "clean";

/// Definition of a single stage in a workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageDef {
    /// Names of stages that must run before this one, in declared order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Command templates, run in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
    /// Hidden stages get no CLI flag but may still be dependencies.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    /// Help text for the stage's CLI flag.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Template of a log path printed after the stage succeeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
}

impl StageDef {
    /// Creates an empty stage definition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a dependency.
    #[must_use]
    pub fn with_dependency(mut self, dep: impl Into<String>) -> Self {
        self.dependencies.push(dep.into());
        self
    }

    /// Sets the commands.
    #[must_use]
    pub fn with_commands(mut self, commands: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.commands = commands.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a command.
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    /// Marks the stage as hidden.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the log file template.
    #[must_use]
    pub fn with_log_file(mut self, template: impl Into<String>) -> Self {
        self.log_file = Some(template.into());
        self
    }

    /// Returns the description, or a default one naming the stage.
    #[must_use]
    pub fn help_text(&self, name: &str) -> String {
        if self.description.trim().is_empty() {
            format!("Run {name}")
        } else {
            self.description.clone()
        }
    }
}
