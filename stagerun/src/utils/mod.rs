//! Utility functions for run identifiers and timestamp handling.

pub mod timestamps;

pub use timestamps::{human_timestamp, run_timestamp, HUMAN_TIMESTAMP_FORMAT, RUN_TIMESTAMP_FORMAT};

use uuid::Uuid;

/// Generates a new run identifier (UUID v4).
#[must_use]
pub fn generate_run_id() -> Uuid {
    Uuid::new_v4()
}
