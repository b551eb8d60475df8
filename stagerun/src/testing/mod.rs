//! Testing utilities for stagerun workflows.
//!
//! This module provides:
//! - Scripted command runners
//! - Workflow and graph fixtures
//! - Plan and error assertions

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_cycle, assert_dependencies_precede, assert_error_code};
pub use fixtures::{
    env_from_pairs, graph_from_edges, sample_config, SharedBuffer, SAMPLE_WORKFLOW,
};
pub use mocks::{ScriptedRunner, UnspawnableRunner};
