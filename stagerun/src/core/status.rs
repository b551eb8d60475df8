//! Step and run status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The status of a single unit of work (a stage or a CI step).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not started yet.
    #[default]
    Pending,
    /// Currently running.
    Running,
    /// Completed with exit code 0.
    Pass,
    /// Completed unsuccessfully.
    Fail,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Pass => write!(f, "pass"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

impl StepStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Pass | Self::Fail)
    }

    /// Glyph and label shown on the status board.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "○ PENDING",
            Self::Running => "● RUNNING",
            Self::Pass => "✓ PASS",
            Self::Fail => "✗ FAIL",
        }
    }
}

/// The overall status of one orchestrator run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunStatus {
    /// Stages are still being executed.
    #[default]
    Running,
    /// Every planned stage completed.
    Success,
    /// A stage failed; nothing after it ran.
    Failed {
        /// The failing stage.
        stage: String,
        /// The failing command's exit code, if a command failed.
        exit_code: Option<i32>,
    },
}

impl RunStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Failed { stage, exit_code: Some(code) } => {
                write!(f, "failed at '{stage}' (exit code {code})")
            }
            Self::Failed { stage, exit_code: None } => write!(f, "failed at '{stage}'"),
        }
    }
}
