//! Single-stage execution.

use crate::errors::{CommandFailedError, MalformedTemplateError, MissingVariableError, StagerunError};
use crate::pipeline::StageDef;
use crate::report::{Console, Tone};
use crate::runner::CommandRunner;
use crate::template::{render_lenient, render_strict, RenderError, VariableEnv};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A command that ran to a zero exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRecord {
    /// The materialized command line.
    pub command: String,
    /// Number of non-empty output lines it produced.
    pub output_lines: usize,
}

/// Outcome of a stage that completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// The stage name.
    pub stage: String,
    /// Commands in the order they ran.
    pub commands: Vec<CommandRecord>,
    /// The rendered `log_file`, when declared and renderable.
    pub log_file: Option<String>,
    /// Wall time spent in the stage.
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(d.as_millis())
    }
}

/// Materializes command `index` of `stage`, requiring every variable.
///
/// # Errors
///
/// Returns [`StagerunError::MissingVariable`] for the first undefined name,
/// or [`StagerunError::MalformedTemplate`] keyed `<stage>.commands[<index>]`.
pub fn materialize_command(
    stage: &str,
    index: usize,
    template: &str,
    env: &VariableEnv,
) -> Result<String, StagerunError> {
    render_strict(template, env).map_err(|err| match err {
        RenderError::MissingVariable(variable) => MissingVariableError::new(stage, variable).into(),
        RenderError::Syntax(source) => {
            MalformedTemplateError::new(format!("{stage}.commands[{index}]"), template, source)
                .into()
        }
    })
}

/// Materializes every command of `def` without running anything.
///
/// # Errors
///
/// Fails as [`materialize_command`] does, on the first bad command.
pub fn materialize(
    stage: &str,
    def: &StageDef,
    env: &VariableEnv,
) -> Result<Vec<String>, StagerunError> {
    def.commands
        .iter()
        .enumerate()
        .map(|(index, template)| materialize_command(stage, index, template, env))
        .collect()
}

/// Runs stages one command at a time against a resolved environment.
pub struct StageExecutor<'a> {
    runner: &'a dyn CommandRunner,
    env: &'a VariableEnv,
}

impl<'a> StageExecutor<'a> {
    /// Creates an executor.
    #[must_use]
    pub fn new(runner: &'a dyn CommandRunner, env: &'a VariableEnv) -> Self {
        Self { runner, env }
    }

    /// Runs every command of `def` in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns a materialization error before the offending command is
    /// spawned, [`StagerunError::Spawn`] if the shell cannot start, or
    /// [`StagerunError::CommandFailure`] on a non-zero exit.
    pub async fn execute(
        &self,
        name: &str,
        def: &StageDef,
        console: &mut Console,
    ) -> Result<StageReport, StagerunError> {
        let started = Instant::now();
        console.log_bold(&format!("▸ {name}"), Tone::Info);
        debug!(stage = name, commands = def.commands.len(), "stage started");

        let mut records = Vec::with_capacity(def.commands.len());
        for (index, template) in def.commands.iter().enumerate() {
            let command = match materialize_command(name, index, template, self.env) {
                Ok(command) => command,
                Err(err) => {
                    if let StagerunError::MissingVariable(missing) = &err {
                        console.log(
                            &format!("  ✗ Missing variable '{}'", missing.variable),
                            Tone::Error,
                        );
                    }
                    return Err(err);
                }
            };

            console.log_verbose(&format!("$ {command}"));
            let output = match self.runner.run(&command).await {
                Ok(output) => output,
                Err(err) => {
                    console.log(&format!("  ✗ {err}"), Tone::Error);
                    return Err(err);
                }
            };

            let mut line_count = 0;
            for line in output.output_lines() {
                console.log_output(line);
                line_count += 1;
            }

            if !output.succeeded() {
                let failure = CommandFailedError::new(name, command, output.exit_code);
                let code = output
                    .exit_code
                    .map_or_else(|| "signal".to_string(), |c| c.to_string());
                console.log(&format!("  ✗ Command failed (exit code: {code})"), Tone::Error);
                return Err(failure.into());
            }

            records.push(CommandRecord {
                command,
                output_lines: line_count,
            });
        }

        console.log("  ✓ done", Tone::Success);

        let log_file = def
            .log_file
            .as_deref()
            .and_then(|template| render_lenient(template, self.env).ok().flatten());
        if let Some(path) = &log_file {
            console.print_path(path);
        }

        let duration = started.elapsed();
        info!(
            stage = name,
            commands = records.len(),
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            "stage completed"
        );

        Ok(StageReport {
            stage: name.to_string(),
            commands: records,
            log_file,
            duration,
        })
    }
}
