//! Diagnostic logging setup.
//!
//! User-facing progress goes through the console reporter on stdout; this
//! only configures `tracing` diagnostics, which always go to stderr.

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable selecting the diagnostic output format.
pub const LOG_FORMAT_ENV: &str = "STAGERUN_LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset or blank.
pub const DEFAULT_FILTER: &str = "warn";

/// Output format of diagnostic logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses the value of [`LOG_FORMAT_ENV`]; anything but `json` is text.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns a message if the filter is invalid or a subscriber is already set.
pub fn init_tracing() -> Result<(), String> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(DEFAULT_FILTER).map_err(|e| e.to_string())?,
    };

    let format = LogFormat::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref());

    let text_layer = (format == LogFormat::Text).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
    });
    let json_layer = (format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .try_init()
        .map_err(|e| e.to_string())
}
