//! Stage graphs and execution planning.
//!
//! This module provides:
//! - Stage definitions
//! - The stage graph with dependency resolution
//! - Execution plans

mod graph;
mod plan;
mod spec;

pub use graph::{StageGraph, StageGraphBuilder};
pub use plan::ExecutionPlan;
pub use spec::{StageDef, CLEAN_STAGE};
