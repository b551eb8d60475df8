//! The orchestration driver.
//!
//! One [`Driver`] handles one invocation: it validates the request, resolves
//! the variable environment, merges the requested stages' dependency chains
//! into a single plan, runs `clean` ahead of everything else, opens the build
//! log and executes the remaining stages in order, stopping at the first
//! failure.

mod state;


pub use state::{DriverPhase, ExecutionState};

use crate::config::WorkflowConfig;
use crate::errors::{StagerunError, UnknownStageError};
use crate::executor::{materialize, StageExecutor, StageReport};
use crate::pipeline::{ExecutionPlan, CLEAN_STAGE};
use crate::report::{BuildLog, Console, Tone};
use crate::runner::CommandRunner;
use crate::template::{resolve_variables, BuiltinVars, RuntimeVars, VariableEnv};
use crate::utils::{generate_run_id, run_timestamp};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

const HEADER_RULE_WIDTH: usize = 40;

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Requested stage names, in request order.
    pub requested: Vec<String>,
    /// Device under test.
    pub dut: String,
    /// Invocation timestamp (`%Y%m%d_%H%M%S`).
    pub timestamp: String,
    /// Working directory exposed as `{cwd}`; the process directory when unset.
    pub cwd: Option<PathBuf>,
}

impl RunRequest {
    /// Creates a request stamped with the current time.
    #[must_use]
    pub fn new(requested: impl IntoIterator<Item = impl Into<String>>, dut: impl Into<String>) -> Self {
        Self {
            requested: requested.into_iter().map(Into::into).collect(),
            dut: dut.into(),
            timestamp: run_timestamp(),
            cwd: None,
        }
    }

    /// Overrides the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Overrides the working directory.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// The requested stages as CLI flags, e.g. `--build --docs`.
    #[must_use]
    pub fn flags(&self) -> String {
        self.requested
            .iter()
            .map(|stage| format!("--{stage}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn runtime_vars(&self) -> Result<RuntimeVars, StagerunError> {
        let cwd = match &self.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir()?,
        };
        Ok(RuntimeVars {
            cwd: cwd.display().to_string(),
            timestamp: self.timestamp.clone(),
            dut: self.dut.clone(),
        })
    }
}

/// A validated request with its resolved environment and merged plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRun {
    /// The fully resolved variable environment.
    pub env: VariableEnv,
    /// The merged plan, `clean` included.
    pub plan: ExecutionPlan,
}

/// One planned stage with its materialized commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStage {
    /// The stage name.
    pub stage: String,
    /// Commands exactly as they would be run.
    pub commands: Vec<String>,
}

/// What a run would do, without doing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanPreview {
    /// Device under test.
    pub dut: String,
    /// The merged plan in execution order (`clean` first when present).
    pub plan: ExecutionPlan,
    /// Each planned stage with its commands.
    pub stages: Vec<PlannedStage>,
    /// The resolved variables.
    pub variables: VariableEnv,
}

impl PlanPreview {
    /// Renders the preview as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns the serializer error.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Identifier of this run.
    pub run_id: Uuid,
    /// Final execution state.
    pub state: ExecutionState,
    /// The finished `build.log`, if one was written.
    pub log_path: Option<PathBuf>,
    /// Reports of every completed stage, in order.
    pub stages: Vec<StageReport>,
}

/// Drives one invocation of a workflow.
pub struct Driver<'a> {
    config: &'a WorkflowConfig,
    runner: &'a dyn CommandRunner,
    run_id: Uuid,
    phase: DriverPhase,
    state: Option<ExecutionState>,
}

impl<'a> Driver<'a> {
    /// Creates a driver for `config` running commands through `runner`.
    #[must_use]
    pub fn new(config: &'a WorkflowConfig, runner: &'a dyn CommandRunner) -> Self {
        Self {
            config,
            runner,
            run_id: generate_run_id(),
            phase: DriverPhase::Idle,
            state: None,
        }
    }

    /// The identifier of this run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The current phase.
    #[must_use]
    pub fn phase(&self) -> DriverPhase {
        self.phase
    }

    /// The execution state, once execution has started.
    #[must_use]
    pub fn state(&self) -> Option<&ExecutionState> {
        self.state.as_ref()
    }

    /// Checks the request before anything is resolved.
    ///
    /// # Errors
    ///
    /// Returns [`StagerunError::Configuration`] when no stage is requested,
    /// the device identifier is empty, or a hidden stage is requested, and
    /// [`StagerunError::UnknownStage`] for a name that is not in the graph.
    pub fn validate(&self, request: &RunRequest) -> Result<(), StagerunError> {
        if request.requested.is_empty() {
            return Err(StagerunError::configuration("No action specified."));
        }
        if request.dut.trim().is_empty() {
            return Err(StagerunError::configuration("--dut is required"));
        }
        for stage in &request.requested {
            match self.config.stages.get(stage) {
                None => return Err(UnknownStageError::new(stage.as_str()).into()),
                Some(def) if def.hidden => {
                    return Err(StagerunError::configuration(format!(
                        "Stage '{stage}' is hidden and cannot be requested directly"
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Validates, resolves variables and builds the merged plan.
    ///
    /// # Errors
    ///
    /// Returns validation, template or graph errors; the phase becomes
    /// [`DriverPhase::Failed`].
    pub fn prepare(&mut self, request: &RunRequest) -> Result<PreparedRun, StagerunError> {
        let result = self.prepare_inner(request);
        if result.is_err() {
            self.phase = DriverPhase::Failed;
        }
        result
    }

    fn prepare_inner(&mut self, request: &RunRequest) -> Result<PreparedRun, StagerunError> {
        self.validate(request)?;

        let base = self
            .config
            .variables
            .clone()
            .with_runtime(&request.runtime_vars()?);
        let env = resolve_variables(&base)?;
        self.phase = DriverPhase::VariablesResolved;
        debug!(variables = env.len(), "variables resolved");

        let plan = self.config.stages.plan(&request.requested)?;
        self.phase = DriverPhase::PlanBuilt;
        info!(plan = %plan, "execution plan built");

        Ok(PreparedRun { env, plan })
    }

    /// Builds the plan and materializes every command without running any.
    ///
    /// # Errors
    ///
    /// Fails as [`Driver::prepare`] does, or on the first command that
    /// cannot be materialized.
    pub fn preview(&mut self, request: &RunRequest) -> Result<PlanPreview, StagerunError> {
        let PreparedRun { env, plan } = self.prepare(request)?;
        let config = self.config;

        let mut stages = Vec::with_capacity(plan.len());
        for stage in plan.iter() {
            let Some(def) = config.stages.get(stage) else {
                continue;
            };
            let commands = match materialize(stage, def, &env) {
                Ok(commands) => commands,
                Err(err) => {
                    self.phase = DriverPhase::Failed;
                    return Err(err);
                }
            };
            stages.push(PlannedStage {
                stage: stage.to_string(),
                commands,
            });
        }

        Ok(PlanPreview {
            dut: request.dut.clone(),
            plan,
            stages,
            variables: env,
        })
    }

    /// Runs the request to completion.
    ///
    /// # Errors
    ///
    /// Returns the first error; later stages are not run. The execution
    /// state remains available through [`Driver::state`].
    pub async fn run(
        &mut self,
        request: &RunRequest,
        console: &mut Console,
    ) -> Result<RunSummary, StagerunError> {
        let span = info_span!("run", run_id = %self.run_id, dut = %request.dut);
        self.run_inner(request, console).instrument(span).await
    }

    async fn run_inner(
        &mut self,
        request: &RunRequest,
        console: &mut Console,
    ) -> Result<RunSummary, StagerunError> {
        let PreparedRun { env, mut plan } = self.prepare(request)?;
        let flags = request.flags();

        let rule = "─".repeat(HEADER_RULE_WIDTH);
        console.log(&rule, Tone::Dim);
        console.log_bold(&format!("  {}  {flags}", request.dut.to_uppercase()), Tone::Plain);
        console.log(&rule, Tone::Dim);

        let run_clean = plan.extract(CLEAN_STAGE);
        self.state = Some(ExecutionState::new(plan.clone()));
        self.phase = DriverPhase::Executing;

        let executor = StageExecutor::new(self.runner, &env);
        let mut reports = Vec::with_capacity(plan.len() + usize::from(run_clean));

        // clean may delete logs_dir, so it runs before the build log exists.
        if run_clean {
            reports.push(self.run_stage(&executor, CLEAN_STAGE, console).await?);
        }

        match env.get(BuiltinVars::LOGS_DIR).filter(|dir| !dir.is_empty()) {
            Some(logs_dir) => {
                let log = match BuildLog::start(logs_dir, &request.timestamp) {
                    Ok(log) => log,
                    Err(err) => {
                        self.fail(None, None);
                        return Err(err.into());
                    }
                };
                console.attach_log(log);
                console.write_log(&format!("DUT: {}\n", request.dut));
                console.write_log(&format!("Flags: {flags}\n"));
                console.write_log(&format!("Verbose: {}\n", console.is_verbose()));
                console.write_log(&format!("Run: {}\n\n", self.run_id));
                console.write_log(&format!("Stages to execute: {plan}\n\n"));
            }
            None => warn!("no `logs_dir` variable declared; build log disabled"),
        }

        for stage in plan.iter() {
            match self.run_stage(&executor, stage, console).await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    if let Err(log_err) = console.finish_log(false) {
                        warn!(error = %log_err, "failed to finish build log");
                    }
                    return Err(err);
                }
            }
        }

        console.log_bold("\n✓ Build successful", Tone::Success);
        let log_path = match console.finish_log(true) {
            Ok(path) => path,
            Err(err) => {
                self.fail(None, None);
                return Err(err.into());
            }
        };
        if let Some(path) = &log_path {
            console.print_path(path.display());
        }

        self.phase = DriverPhase::Succeeded;
        let mut state = self.state.take().unwrap_or_default();
        state.succeed();
        self.state = Some(state.clone());
        info!(stages = reports.len(), "run succeeded");

        Ok(RunSummary {
            run_id: self.run_id,
            state,
            log_path,
            stages: reports,
        })
    }

    async fn run_stage(
        &mut self,
        executor: &StageExecutor<'_>,
        stage: &str,
        console: &mut Console,
    ) -> Result<StageReport, StagerunError> {
        let config = self.config;
        let Some(def) = config.stages.get(stage) else {
            let err = StagerunError::from(UnknownStageError::new(stage));
            self.fail(Some(stage), None);
            return Err(err);
        };

        match executor.execute(stage, def, console).await {
            Ok(report) => {
                if let Some(state) = self.state.as_mut() {
                    state.mark_completed(stage);
                }
                Ok(report)
            }
            Err(err) => {
                let exit_code = match &err {
                    StagerunError::CommandFailure(failure) => failure.exit_code,
                    _ => None,
                };
                warn!(stage, code = err.code(), "stage failed");
                self.fail(Some(stage), exit_code);
                Err(err)
            }
        }
    }

    fn fail(&mut self, stage: Option<&str>, exit_code: Option<i32>) {
        self.phase = DriverPhase::Failed;
        if let (Some(state), Some(stage)) = (self.state.as_mut(), stage) {
            state.fail(stage, exit_code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RunStatus;
    use crate::testing::{assert_error_code, sample_config, ScriptedRunner, SharedBuffer};
    use pretty_assertions::assert_eq;

    fn request(stages: &[&str]) -> RunRequest {
        RunRequest::new(stages.iter().copied(), "rpi4")
            .with_timestamp("20240101_120000")
            .with_cwd("/work")
    }

    #[test]
    fn test_flags() {
        assert_eq!(request(&["clean", "build"]).flags(), "--clean --build");
    }

    #[test]
    fn test_validation_errors() {
        let config = sample_config();
        let runner = ScriptedRunner::new();
        let driver = Driver::new(&config, &runner);

        assert_error_code(driver.validate(&request(&[])), "CONFIG-INVALID");
        assert_error_code(
            driver.validate(&RunRequest::new(["build"], " ")),
            "CONFIG-INVALID",
        );
        assert_error_code(driver.validate(&request(&["setup"])), "CONFIG-INVALID");
        assert_error_code(driver.validate(&request(&["deploy"])), "STAGE-UNKNOWN");
        assert!(driver.validate(&request(&["build"])).is_ok());
    }

    #[test]
    fn test_prepare_resolves_and_plans() {
        let config = sample_config();
        let runner = ScriptedRunner::new();
        let mut driver = Driver::new(&config, &runner);

        let prepared = driver.prepare(&request(&["build", "clean"])).unwrap();
        assert_eq!(driver.phase(), DriverPhase::PlanBuilt);
        assert_eq!(prepared.env.get("logs_dir"), Some("/work/target/rpi4/logs"));
        assert_eq!(
            prepared.plan.as_slice(),
            &["setup", "configure", "build", "clean"]
        );
    }

    #[test]
    fn test_prepare_failure_sets_failed_phase() {
        let config = sample_config();
        let runner = ScriptedRunner::new();
        let mut driver = Driver::new(&config, &runner);

        assert!(driver.prepare(&request(&[])).is_err());
        assert_eq!(driver.phase(), DriverPhase::Failed);
        assert!(driver.state().is_none());
    }

    #[test]
    fn test_preview_materializes_commands() {
        let config = sample_config();
        let runner = ScriptedRunner::new();
        let mut driver = Driver::new(&config, &runner);

        let preview = driver.preview(&request(&["clean", "build"])).unwrap();
        assert_eq!(
            preview.plan.as_slice(),
            &["clean", "setup", "configure", "build"]
        );
        assert_eq!(preview.stages[0].commands, vec!["rm -rf /work/target/rpi4"]);
        assert_eq!(
            preview.stages[3].commands,
            vec!["echo building /work/target/rpi4/image.bin"]
        );
        assert_eq!(runner.call_count(), 0);

        let json: serde_json::Value =
            serde_json::from_str(&preview.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["plan"][0], "clean");
        assert_eq!(json["dut"], "rpi4");
        assert_eq!(json["variables"]["cwd"], "/work");
    }

    #[tokio::test]
    async fn test_run_without_logs_dir() {
        let mut config = sample_config();
        config.variables = crate::testing::env_from_pairs(&[("build_dir", "/tmp/x")]);
        let runner = ScriptedRunner::new();
        let buffer = SharedBuffer::new();
        let mut console = Console::new(buffer.clone());
        let mut driver = Driver::new(&config, &runner);

        let summary = driver.run(&request(&["docs"]), &mut console).await.unwrap();

        assert_eq!(summary.log_path, None);
        assert_eq!(summary.state.status, RunStatus::Success);
        assert_eq!(summary.state.completed, vec!["setup", "docs"]);
        assert_eq!(driver.phase(), DriverPhase::Succeeded);

        let lines = buffer.lines();
        assert_eq!(lines[0], "─".repeat(40));
        assert_eq!(lines[1], "  RPI4  --docs");
        assert!(buffer.contents().contains("\n✓ Build successful\n"));
    }

    #[tokio::test]
    async fn test_failure_records_state() {
        let mut config = sample_config();
        config.variables = crate::testing::env_from_pairs(&[("build_dir", "/tmp/x")]);
        let runner = ScriptedRunner::new().fail_on("configuring", 7);
        let mut console = Console::new(SharedBuffer::new());
        let mut driver = Driver::new(&config, &runner);

        let err = driver
            .run(&request(&["build", "docs"]), &mut console)
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), 7);
        assert_eq!(driver.phase(), DriverPhase::Failed);
        let state = driver.state().unwrap();
        assert_eq!(state.completed, vec!["setup"]);
        assert_eq!(
            state.status,
            RunStatus::Failed {
                stage: "configure".to_string(),
                exit_code: Some(7)
            }
        );
        assert_eq!(
            runner.calls(),
            vec!["mkdir -p /tmp/x", "echo configuring rpi4"]
        );
    }
}
