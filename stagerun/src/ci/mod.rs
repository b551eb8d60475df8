//! CI workflow steps that invoke the orchestrator.
//!
//! A GitHub-Actions style workflow is scanned for `run:` steps that call the
//! orchestrator binary. Those steps are run one after another, and the
//! build log each one reports is scraped from its output.

use crate::core::StepStatus;
use crate::errors::ConfigLoadError;
use crate::runner::CommandRunner;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Workflow file looked up relative to the project root.
pub const DEFAULT_WORKFLOW_PATH: &str = ".github/workflows/ci.yaml";

/// Binary name that marks a step as an orchestrator invocation.
pub const DEFAULT_MARKER: &str = "stagerun";

/// Device name used when a step does not pass one.
pub const UNKNOWN_DUT: &str = "unknown";

/// One CI step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CiStep {
    /// Display name (`Unknown` when the step has none).
    pub name: String,
    /// The shell script of the step.
    pub command: String,
    /// Device under test passed on the command line.
    pub dut: String,
    /// Current status.
    pub status: StepStatus,
    /// Build log reported by the step, once it ran.
    pub log_path: Option<String>,
}

impl CiStep {
    /// Creates a pending step, scraping the DUT from `command`.
    #[must_use]
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        let command = command.into();
        Self {
            name: name.into(),
            dut: extract_dut(&command),
            command,
            status: StepStatus::Pending,
            log_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WorkflowDoc {
    jobs: Option<Mapping>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JobDoc {
    steps: Option<Vec<StepDoc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StepDoc {
    name: Option<String>,
    run: Option<String>,
}

/// Extracts orchestrator steps from workflow YAML, jobs in document order.
///
/// # Errors
///
/// Returns the YAML error if the document or a job is malformed.
pub fn parse_workflow(content: &str, marker: &str) -> Result<Vec<CiStep>, serde_yaml::Error> {
    let doc: WorkflowDoc = serde_yaml::from_str(content)?;
    let mut steps = Vec::new();

    for (job_name, job) in doc.jobs.unwrap_or_default() {
        let job: JobDoc = serde_yaml::from_value(job)?;
        for step in job.steps.unwrap_or_default() {
            let Some(run) = step.run else { continue };
            if !invokes(&run, marker) {
                continue;
            }
            debug!(job = ?job_name.as_str(), step = ?step.name, "found orchestrator step");
            steps.push(CiStep::new(
                step.name.unwrap_or_else(|| "Unknown".to_string()),
                run,
            ));
        }
    }
    Ok(steps)
}

/// Loads and parses a workflow file.
///
/// # Errors
///
/// Returns [`ConfigLoadError`] if the file is missing, unreadable or not
/// valid YAML.
pub fn load_workflow(path: &Path, marker: &str) -> Result<Vec<CiStep>, ConfigLoadError> {
    if !path.exists() {
        return Err(ConfigLoadError::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_workflow(&content, marker).map_err(|source| ConfigLoadError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

/// Returns true if any word of `script` is the `marker` binary, by path or name.
#[must_use]
pub fn invokes(script: &str, marker: &str) -> bool {
    script
        .split_whitespace()
        .any(|word| word.rsplit('/').next() == Some(marker))
}

static DUT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)--?dut(?:=|\s+)(\S+)").expect("DUT pattern is valid")
});

static LOG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"→\s*(\S+/build\.log)").expect("log pattern is valid"));

/// Scrapes the `--dut` value from a command line.
#[must_use]
pub fn extract_dut(command: &str) -> String {
    DUT_PATTERN
        .captures(command)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| UNKNOWN_DUT.to_string(), |m| m.as_str().to_string())
}

/// Finds the build log a step reported.
///
/// The last `→ <path>/build.log` line in `output` wins. Without one, the
/// `build_latest` log under `root` is used if it exists.
#[must_use]
pub fn extract_log_path(output: &str, dut: &str, root: &Path) -> Option<String> {
    let reported = output
        .lines()
        .filter(|line| line.contains('→') && line.contains("build.log"))
        .filter_map(|line| LOG_PATTERN.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .last();
    if reported.is_some() {
        return reported;
    }

    let latest = format!("target/{dut}/logs/build_latest/build.log");
    root.join(&latest).exists().then_some(latest)
}

/// The directory containing `.github`, if `workflow` lives under one.
///
/// A relative `.github/...` path yields `.`.
#[must_use]
pub fn project_root(workflow: &Path) -> Option<PathBuf> {
    workflow
        .ancestors()
        .find(|dir| dir.file_name().is_some_and(|name| name == ".github"))
        .and_then(Path::parent)
        .map(|root| {
            if root.as_os_str().is_empty() {
                PathBuf::from(".")
            } else {
                root.to_path_buf()
            }
        })
}

/// Pass/fail counts of a CI run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CiSummary {
    /// Steps that exited 0.
    pub passed: usize,
    /// Steps that failed or could not start.
    pub failed: usize,
}

impl CiSummary {
    /// Total number of steps run.
    #[must_use]
    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    /// Returns true if no step failed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// The closing summary line.
    #[must_use]
    pub fn message(&self) -> String {
        if self.all_passed() {
            format!("All {} tests passed!", self.total())
        } else {
            format!("{}/{} tests failed", self.failed, self.total())
        }
    }
}

/// Runs CI steps sequentially.
pub struct CiRunner<'a> {
    runner: &'a dyn CommandRunner,
    root: PathBuf,
}

impl<'a> CiRunner<'a> {
    /// Creates a CI runner; `root` is where `build_latest` logs are looked up.
    #[must_use]
    pub fn new(runner: &'a dyn CommandRunner, root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            root: root.into(),
        }
    }

    /// Runs every step, calling `on_update` after each status change.
    pub async fn run_steps<F>(&self, steps: &mut [CiStep], mut on_update: F) -> CiSummary
    where
        F: FnMut(&[CiStep]),
    {
        let mut summary = CiSummary::default();

        for idx in 0..steps.len() {
            steps[idx].status = StepStatus::Running;
            on_update(steps);

            let step = &mut steps[idx];
            match self.runner.run(&step.command).await {
                Ok(output) => {
                    step.log_path = extract_log_path(&output.combined(), &step.dut, &self.root);
                    step.status = if output.succeeded() {
                        StepStatus::Pass
                    } else {
                        StepStatus::Fail
                    };
                }
                Err(err) => {
                    warn!(step = %step.name, error = %err, "CI step could not start");
                    step.status = StepStatus::Fail;
                }
            }

            if step.status == StepStatus::Pass {
                summary.passed += 1;
            } else {
                summary.failed += 1;
            }
            debug!(step = %step.name, status = %step.status, "CI step finished");
            on_update(steps);
        }

        summary
    }
}
