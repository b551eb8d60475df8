//! # Stagerun
//!
//! A configuration-driven stage orchestrator.
//!
//! A YAML workflow declares named stages (ordered shell-command templates
//! plus dependency names) and a base variable map. Stagerun provides:
//!
//! - **Dependency resolution**: requested stages are expanded into one
//!   deterministic, deduplicated plan, with cycle detection
//! - **Variable templating**: `{name}` templates resolved to a fixed point,
//!   then strictly materialized into commands
//! - **Sequential execution**: one shell command at a time, stopping at the
//!   first failure
//! - **Build logs**: per-run logs with a `build_latest` link
//! - **CI steps**: discovery and execution of workflow steps that invoke
//!   the orchestrator
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stagerun::prelude::*;
//!
//! let config = ConfigLoader::load_from_file("workflow.yaml")?;
//! let runner = ShellRunner::new(config.shell());
//! let mut console = Console::stdout();
//!
//! let request = RunRequest::new(["clean", "build"], "rpi4");
//! let summary = Driver::new(&config, &runner).run(&request, &mut console).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod ci;
pub mod config;
pub mod core;
pub mod driver;
pub mod errors;
pub mod executor;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod template;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ci::{CiRunner, CiStep, CiSummary};
    pub use crate::config::{ConfigLoader, WorkflowConfig};
    pub use crate::core::{RunStatus, StepStatus};
    pub use crate::driver::{
        Driver, DriverPhase, ExecutionState, PlanPreview, RunRequest, RunSummary,
    };
    pub use crate::errors::{
        CommandFailedError, ConfigLoadError, CycleDetectedError, MalformedTemplateError,
        MissingVariableError, StagerunError, UnknownStageError,
    };
    pub use crate::executor::{StageExecutor, StageReport};
    pub use crate::pipeline::{ExecutionPlan, StageDef, StageGraph, StageGraphBuilder};
    pub use crate::report::{BuildLog, Console, Tone};
    pub use crate::runner::{CommandOutput, CommandRunner, ShellRunner};
    pub use crate::template::{resolve_variables, VariableEnv};
    pub use crate::utils::{generate_run_id, run_timestamp};
}
