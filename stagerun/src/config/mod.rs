//! Workflow configuration.
//!
//! A workflow document declares a base variable map, the stage graph and,
//! optionally, the shell used to run commands:
//!
//! ```yaml
//! shell: /bin/bash
//! variables:
//!   build_dir: "{cwd}/target/{dut}"
//!   logs_dir: "{build_dir}/logs"
//! stages:
//!   clean:
//!     commands: ["rm -rf {build_dir}"]
//!   build:
//!     dependencies: [configure]
//!     commands: ["make -C {build_dir}"]
//! ```

mod loader;

pub use loader::{ConfigLoader, DEFAULT_CONFIG_FILE};

use crate::pipeline::StageGraph;
use crate::template::VariableEnv;

/// Shell used when the workflow does not name one.
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// A loaded workflow document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Declared variables, before runtime values are overlaid.
    pub variables: VariableEnv,
    /// The stage graph.
    pub stages: StageGraph,
    /// Shell override.
    pub shell: Option<String>,
}

impl WorkflowConfig {
    /// Creates a configuration from its parts.
    #[must_use]
    pub fn new(variables: VariableEnv, stages: StageGraph) -> Self {
        Self {
            variables,
            stages,
            shell: None,
        }
    }

    /// The shell used to run commands.
    #[must_use]
    pub fn shell(&self) -> &str {
        self.shell.as_deref().unwrap_or(DEFAULT_SHELL)
    }
}
