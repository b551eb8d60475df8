//! Command execution.
//!
//! The executor and the CI board reach the operating system only through
//! [`CommandRunner`], so tests can substitute scripted runners.

mod shell;

pub use shell::ShellRunner;

use crate::errors::StagerunError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Captured result of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Exit status; `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Creates a successful output with the given stdout.
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    /// Creates a failed output with the given exit code and stderr.
    #[must_use]
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(exit_code),
        }
    }

    /// Returns true if the command exited with status 0.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Non-empty output lines, stdout first, then stderr.
    ///
    /// Each stream is trimmed before splitting, so leading and trailing
    /// blank lines are dropped as well as blank lines in between.
    pub fn output_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout
            .trim()
            .lines()
            .chain(self.stderr.trim().lines())
            .filter(|line| !line.trim().is_empty())
    }

    /// Stdout and stderr joined, for scraping.
    #[must_use]
    pub fn combined(&self) -> String {
        let mut combined = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        combined.push_str(&self.stdout);
        if !self.stdout.is_empty() && !self.stdout.ends_with('\n') && !self.stderr.is_empty() {
            combined.push('\n');
        }
        combined.push_str(&self.stderr);
        combined
    }
}

/// Runs a materialized command line to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `command` and captures its output.
    ///
    /// A non-zero exit is reported through [`CommandOutput::exit_code`],
    /// not as an error.
    ///
    /// # Errors
    ///
    /// Returns [`StagerunError::Spawn`] if the process could not be started.
    async fn run(&self, command: &str) -> Result<CommandOutput, StagerunError>;
}
