//! Command-line front ends for stagerun.
//!
//! - `stagerun`: runs workflow stages, one `--<stage>` switch per stage
//! - `stagerun-ci`: runs the CI steps that invoke `stagerun` behind a
//!   live status board

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, missing_docs, rust_2018_idioms)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod app;
pub mod args;
pub mod dashboard;
pub mod logging;
