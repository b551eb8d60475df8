//! Error types for stagerun.
//!
//! Every error in this taxonomy is fatal for the run that produced it: the
//! driver stops at the first one and the CLI maps it to a process exit code
//! via [`StagerunError::exit_code`].

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for stagerun operations.
#[derive(Debug, Error)]
pub enum StagerunError {
    /// A requested or depended-upon stage does not exist.
    #[error("{0}")]
    UnknownStage(#[from] UnknownStageError),

    /// A stage transitively depends on itself.
    #[error("{0}")]
    CircularDependency(#[from] CycleDetectedError),

    /// A template string could not be parsed.
    #[error("{0}")]
    MalformedTemplate(#[from] MalformedTemplateError),

    /// A command template references a variable that is not defined.
    #[error("{0}")]
    MissingVariable(#[from] MissingVariableError),

    /// A command exited with a non-zero status.
    #[error("{0}")]
    CommandFailure(#[from] CommandFailedError),

    /// The invocation itself is invalid (no stages requested, no DUT, ...).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The workflow document could not be loaded.
    #[error("{0}")]
    ConfigLoad(#[from] ConfigLoadError),

    /// The shell process could not be started.
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        /// The command that was being launched.
        command: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// IO error (build log, working directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StagerunError {
    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns a stable error code for diagnostics.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownStage(_) => "STAGE-UNKNOWN",
            Self::CircularDependency(_) => "STAGE-CYCLE",
            Self::MalformedTemplate(_) => "TEMPLATE-MALFORMED",
            Self::MissingVariable(_) => "TEMPLATE-MISSING-VAR",
            Self::CommandFailure(_) => "COMMAND-FAILED",
            Self::Configuration(_) => "CONFIG-INVALID",
            Self::ConfigLoad(_) => "CONFIG-LOAD",
            Self::Spawn { .. } => "COMMAND-SPAWN",
            Self::Io(_) => "IO",
        }
    }

    /// Returns a hint for fixing the error, if one is known.
    #[must_use]
    pub fn fix_hint(&self) -> Option<&'static str> {
        ErrorSuggestions::get(self.code())
    }

    /// Process exit status for this error.
    ///
    /// A failed command propagates its own exit code (clamped to `1..=255`);
    /// everything else, including a command killed by a signal, maps to 1.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::CommandFailure(err) => match err.exit_code {
                Some(code) if code != 0 => u8::try_from(code.clamp(1, 255)).unwrap_or(1),
                _ => 1,
            },
            _ => 1,
        }
    }
}

/// Error raised when a stage name is not present in the stage graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Stage '{stage}' not found{}", required_by(.referenced_by))]
pub struct UnknownStageError {
    /// The missing stage.
    pub stage: String,
    /// The stage whose dependency list named it, if any.
    pub referenced_by: Option<String>,
}

fn required_by(referenced_by: &Option<String>) -> String {
    referenced_by
        .as_ref()
        .map(|parent| format!(" (required by '{parent}')"))
        .unwrap_or_default()
}

impl UnknownStageError {
    /// Creates an unknown stage error for a directly requested stage.
    #[must_use]
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            referenced_by: None,
        }
    }

    /// Records which stage declared the dependency.
    #[must_use]
    pub fn referenced_by(mut self, parent: impl Into<String>) -> Self {
        self.referenced_by = Some(parent.into());
        self
    }
}

/// Error raised when a cycle is detected in the stage graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Circular dependency: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The ancestor chain that closes the cycle, ending with the repeated stage.
    pub cycle_path: Vec<String>,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        Self { cycle_path }
    }
}

/// Syntax problems found while parsing a `{name}` template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TemplateSyntaxError {
    /// A `{` that is never closed.
    #[error("unmatched '{{' at offset {0}")]
    UnclosedBrace(usize),
    /// A lone `}` outside a placeholder.
    #[error("single '}}' encountered at offset {0}")]
    StrayClosingBrace(usize),
    /// A `{}` with no name.
    #[error("empty placeholder at offset {0}")]
    EmptyPlaceholder(usize),
    /// A `{` inside a placeholder name.
    #[error("unexpected '{{' inside placeholder at offset {0}")]
    NestedBrace(usize),
}

/// Error raised when a variable or command template is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed template for '{key}': {source} in \"{template}\"")]
pub struct MalformedTemplateError {
    /// The variable name (or `<stage>.commands[<n>]`) holding the template.
    pub key: String,
    /// The offending template text.
    pub template: String,
    /// What was wrong with it.
    pub source: TemplateSyntaxError,
}

impl MalformedTemplateError {
    /// Creates a new malformed template error.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        template: impl Into<String>,
        source: TemplateSyntaxError,
    ) -> Self {
        Self {
            key: key.into(),
            template: template.into(),
            source,
        }
    }
}

/// Error raised when a command references an undefined variable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Missing variable '{variable}' in stage '{stage}'")]
pub struct MissingVariableError {
    /// The stage whose command failed to materialize.
    pub stage: String,
    /// The undefined variable name.
    pub variable: String,
}

impl MissingVariableError {
    /// Creates a new missing variable error.
    #[must_use]
    pub fn new(stage: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            variable: variable.into(),
        }
    }
}

/// Error raised when a command exits unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Command failed in stage '{stage}' (exit code: {})", exit_label(.exit_code))]
pub struct CommandFailedError {
    /// The stage being executed.
    pub stage: String,
    /// The materialized command.
    pub command: String,
    /// The exit code, or `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

impl CommandFailedError {
    /// Creates a new command failure error.
    #[must_use]
    pub fn new(stage: impl Into<String>, command: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            stage: stage.into(),
            command: command.into(),
            exit_code,
        }
    }
}

/// Errors raised while loading a workflow document.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// The file does not exist.
    #[error("Config not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The file is not valid YAML or does not match the schema.
    #[error("Invalid YAML in {}: {source}", path.display())]
    Yaml {
        /// The file being parsed.
        path: PathBuf,
        /// The parse error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A variable value is not a scalar.
    #[error("Variable '{name}' must be a scalar value, found {found}")]
    InvalidVariable {
        /// The variable name.
        name: String,
        /// Description of the value that was found.
        found: &'static str,
    },

    /// The file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// The file being read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Provides default suggestions for error codes.
pub struct ErrorSuggestions;

impl ErrorSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            "STAGE-CYCLE" => Some(
                "Remove one of the dependencies in the cycle. \
                 Use a linear chain or fan-out pattern instead.",
            ),
            "STAGE-UNKNOWN" => Some(
                "Ensure every dependency names a stage defined under `stages:`. \
                 Check for typos in stage names.",
            ),
            "TEMPLATE-MALFORMED" => Some(
                "Placeholders are written `{name}`; write `{{` or `}}` for a literal brace.",
            ),
            "TEMPLATE-MISSING-VAR" => Some(
                "Declare the variable under `variables:` or use one of the built-ins: \
                 cwd, timestamp, dut.",
            ),
            "CONFIG-INVALID" => Some(
                "Pass --dut <NAME> and at least one stage flag; run with --help to list stages.",
            ),
            _ => None,
        }
    }
}
