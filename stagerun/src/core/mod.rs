//! Core domain model types for stagerun.
//!
//! This module contains the status types shared by the driver and the CI
//! status board.

mod status;

pub use status::{RunStatus, StepStatus};
