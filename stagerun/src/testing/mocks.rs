//! Mock command runners for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::io;

use crate::errors::StagerunError;
use crate::runner::{CommandOutput, CommandRunner};

/// A runner that records commands and answers from a script.
///
/// Each rule matches commands containing a substring; the first matching
/// rule wins. Unmatched commands succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<(String, CommandOutput)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    /// Creates a runner where every command succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers commands containing `pattern` with `output`.
    #[must_use]
    pub fn respond(self, pattern: impl Into<String>, output: CommandOutput) -> Self {
        self.rules.lock().push((pattern.into(), output));
        self
    }

    /// Fails commands containing `pattern` with `exit_code`.
    #[must_use]
    pub fn fail_on(self, pattern: impl Into<String>, exit_code: i32) -> Self {
        self.respond(pattern, CommandOutput::failure(exit_code, "scripted failure"))
    }

    /// Returns every command run so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Returns the number of commands run.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput, StagerunError> {
        self.calls.lock().push(command.to_string());
        let output = self
            .rules
            .lock()
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::success(""));
        Ok(output)
    }
}

/// A runner whose shell can never be started.
#[derive(Debug, Default)]
pub struct UnspawnableRunner;

#[async_trait]
impl CommandRunner for UnspawnableRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput, StagerunError> {
        Err(StagerunError::Spawn {
            command: command.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "shell not found"),
        })
    }
}
