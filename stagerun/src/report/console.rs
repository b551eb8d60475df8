//! Colored console output mirrored into the build log.

use super::BuildLog;
use crossterm::style::{Attribute, Color, ContentStyle};
use std::fmt;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use tracing::warn;

/// Color of a console message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Default terminal color.
    Plain,
    /// Stage headings.
    Info,
    /// Completed work.
    Success,
    /// Recoverable problems.
    Warning,
    /// Failures.
    Error,
    /// Secondary detail (rules, paths, command output).
    Dim,
}

impl Tone {
    /// Terminal style for this tone, optionally bold.
    #[must_use]
    pub fn style(self, bold: bool) -> ContentStyle {
        let mut style = ContentStyle::new();
        style.foreground_color = match self {
            Self::Info => Some(Color::Cyan),
            Self::Success => Some(Color::Green),
            Self::Warning => Some(Color::Yellow),
            Self::Error => Some(Color::Red),
            Self::Plain | Self::Dim => None,
        };
        if self == Self::Dim {
            style.attributes.set(Attribute::Dim);
        }
        if bold {
            style.attributes.set(Attribute::Bold);
        }
        style
    }
}

/// Console reporter for one invocation.
///
/// Messages go to the writer (styled when color is enabled) and, once a
/// build log is attached, to the log without styling.
pub struct Console {
    writer: Box<dyn Write + Send>,
    verbose: bool,
    color: bool,
    build_log: Option<BuildLog>,
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console")
            .field("verbose", &self.verbose)
            .field("color", &self.color)
            .field("build_log", &self.build_log)
            .finish_non_exhaustive()
    }
}

impl Console {
    /// Creates an uncolored console writing to `writer`.
    #[must_use]
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Box::new(writer),
            verbose: false,
            color: false,
            build_log: None,
        }
    }

    /// Creates a console on stdout, colored when stdout is a terminal.
    #[must_use]
    pub fn stdout() -> Self {
        let color = io::stdout().is_terminal();
        Self::new(io::stdout()).with_color(color)
    }

    /// Enables command echo and output on the console.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Enables ANSI styling.
    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Returns true in verbose mode.
    #[must_use]
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Prints a message and mirrors it to the build log.
    pub fn log(&mut self, message: &str, tone: Tone) {
        self.emit(message, tone, false);
        self.write_log(&format!("{message}\n"));
    }

    /// Prints a bold message and mirrors it to the build log.
    pub fn log_bold(&mut self, message: &str, tone: Tone) {
        self.emit(message, tone, true);
        self.write_log(&format!("{message}\n"));
    }

    /// Detail line: console only in verbose mode, always logged.
    pub fn log_verbose(&mut self, message: &str) {
        let line = format!("  {message}");
        if self.verbose {
            self.emit(&line, Tone::Dim, false);
        }
        self.write_log(&format!("{line}\n"));
    }

    /// Command output line, indented 4: console only in verbose mode, always logged.
    pub fn log_output(&mut self, line: &str) {
        let line = format!("    {line}");
        if self.verbose {
            self.emit(&line, Tone::Dim, false);
        }
        self.write_log(&format!("{line}\n"));
    }

    /// Prints a dim `→ <path>` pointer. Never logged.
    pub fn print_path(&mut self, path: impl fmt::Display) {
        self.emit(&format!("    → {path}"), Tone::Dim, false);
    }

    /// Attaches a build log; later messages are mirrored into it.
    pub fn attach_log(&mut self, log: BuildLog) {
        self.build_log = Some(log);
    }

    /// The attached build log, if any.
    #[must_use]
    pub fn build_log(&self) -> Option<&BuildLog> {
        self.build_log.as_ref()
    }

    /// Writes raw text to the build log only.
    pub fn write_log(&mut self, text: &str) {
        if let Some(log) = self.build_log.as_mut() {
            if let Err(err) = log.write(text) {
                warn!(path = %log.path().display(), error = %err, "build log write failed");
            }
        }
    }

    /// Detaches and finishes the build log, returning its path.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the log could not be finalized.
    pub fn finish_log(&mut self, success: bool) -> io::Result<Option<PathBuf>> {
        match self.build_log.take() {
            Some(mut log) => log.finish(success).map(Some),
            None => Ok(None),
        }
    }

    fn emit(&mut self, message: &str, tone: Tone, bold: bool) {
        let result = if self.color && (bold || tone != Tone::Plain) {
            writeln!(self.writer, "{}", tone.style(bold).apply(message))
        } else {
            writeln!(self.writer, "{message}")
        };
        // A closed stdout must not abort the run.
        let _ = result.and_then(|()| self.writer.flush());
    }
}
