//! Timestamp formatting for run identifiers and log lines.
//!
//! All timestamps use local time.

use chrono::{DateTime, Local, TimeZone};

/// Format of the `{timestamp}` variable and of build log directory suffixes.
pub const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Format used in build log header and footer lines.
pub const HUMAN_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Returns the current time formatted as a run timestamp (`YYYYMMDD_HHMMSS`).
///
/// # Examples
///
/// ```
/// use stagerun::utils::run_timestamp;
///
/// let ts = run_timestamp();
/// assert_eq!(ts.len(), 15);
/// assert_eq!(&ts[8..9], "_");
/// ```
#[must_use]
pub fn run_timestamp() -> String {
    format_run_timestamp(&Local::now())
}

/// Returns the current time formatted for humans (`YYYY-MM-DD HH:MM:SS`).
#[must_use]
pub fn human_timestamp() -> String {
    Local::now().format(HUMAN_TIMESTAMP_FORMAT).to_string()
}

fn format_run_timestamp<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    dt.format(RUN_TIMESTAMP_FORMAT).to_string()
}
