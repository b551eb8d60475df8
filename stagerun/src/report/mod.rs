//! Console output and build log mirroring.

mod build_log;
mod console;

pub use build_log::{BuildLog, BUILD_LOG_FILE, LATEST_LINK};
pub use console::{Console, Tone};

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

static ANSI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("ANSI pattern is valid"));

/// Removes SGR escape sequences (colors, bold, dim) from `text`.
#[must_use]
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    ANSI_PATTERN.replace_all(text, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1m\x1b[96m▸ build\x1b[0m"), "▸ build");
        assert_eq!(strip_ansi("\x1b[38;5;14mx\x1b[39m"), "x");
        assert!(matches!(strip_ansi("plain"), Cow::Borrowed("plain")));
    }
}
