//! Command-line arguments.
//!
//! The fixed options are declared with clap's derive API; one `--<stage>`
//! switch per requestable stage is added to the derived command at run time,
//! once the workflow is loaded.

use clap::{Arg, ArgAction, ArgMatches, Command, CommandFactory, FromArgMatches, Parser};
use stagerun::ci::{DEFAULT_MARKER, DEFAULT_WORKFLOW_PATH};
use stagerun::config::DEFAULT_CONFIG_FILE;
use stagerun::errors::StagerunError;
use stagerun::pipeline::StageGraph;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable overriding the workflow path.
pub const CONFIG_ENV: &str = "STAGERUN_CONFIG";

/// Flags clap adds while building the command, absent from the derived arguments.
pub const RESERVED_FLAGS: &[&str] = &["help", "version"];

/// Fixed options of the `stagerun` binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stagerun",
    version,
    about = "Run workflow stages with their dependencies",
    after_help = "Each non-hidden stage of the workflow adds a --<stage> switch."
)]
pub struct Cli {
    /// Workflow file.
    #[arg(long, value_name = "PATH", env = CONFIG_ENV, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Device under test.
    #[arg(long, value_name = "NAME")]
    pub dut: Option<String>,

    /// Echo commands and their output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the plan and materialized commands as JSON instead of running.
    #[arg(long)]
    pub print_plan: bool,
}

/// Parsed arguments with the requested stages collected.
#[derive(Debug, Clone)]
pub struct ParsedArgs {
    /// The fixed options.
    pub cli: Cli,
    /// Requested stages, in declaration order.
    pub requested: Vec<String>,
}

/// Finds the workflow path before the full command can be built.
///
/// Looks for `--config <PATH>` or `--config=<PATH>` in `argv`, then the
/// environment, then falls back to `workflow.yaml`.
#[must_use]
pub fn config_path(argv: &[OsString]) -> PathBuf {
    let mut args = argv.iter().skip(1);
    while let Some(arg) = args.next() {
        let Some(arg) = arg.to_str() else { continue };
        if arg == "--" {
            break;
        }
        if arg == "--config" {
            if let Some(value) = args.next() {
                return PathBuf::from(value);
            }
        } else if let Some(value) = arg.strip_prefix("--config=") {
            return PathBuf::from(value);
        }
    }

    std::env::var_os(CONFIG_ENV)
        .filter(|value| !value.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
}

fn valid_flag_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Builds the full command: the derived options plus one switch per stage.
///
/// # Errors
///
/// Returns [`StagerunError::Configuration`] if a stage name collides with the
/// id or long flag of a built-in argument, or cannot be used as a flag.
pub fn build_command(stages: &StageGraph) -> Result<Command, StagerunError> {
    let mut cmd = Cli::command().next_help_heading("Stages");

    for (name, def) in stages.requestable() {
        let taken = RESERVED_FLAGS.contains(&name)
            || cmd
                .get_arguments()
                .any(|arg| arg.get_id() == name || arg.get_long() == Some(name));
        if taken {
            return Err(StagerunError::configuration(format!(
                "Stage '{name}' collides with the built-in --{name} flag"
            )));
        }
        if !valid_flag_name(name) {
            return Err(StagerunError::configuration(format!(
                "Stage '{name}' cannot be used as a command-line flag"
            )));
        }
        cmd = cmd.arg(
            Arg::new(name.to_string())
                .long(name.to_string())
                .action(ArgAction::SetTrue)
                .help(def.help_text(name)),
        );
    }

    Ok(cmd)
}

/// Extracts the fixed options and the requested stages from `matches`.
///
/// # Errors
///
/// Returns the clap error if the derived options cannot be extracted.
pub fn from_matches(matches: &ArgMatches, stages: &StageGraph) -> Result<ParsedArgs, clap::Error> {
    let cli = Cli::from_arg_matches(matches)?;
    let flags: HashMap<String, bool> = stages
        .requestable()
        .map(|(name, _)| (name.to_string(), matches.get_flag(name)))
        .collect();

    Ok(ParsedArgs {
        cli,
        requested: stages.select(&flags),
    })
}

/// Options of the `stagerun-ci` binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stagerun-ci",
    version,
    about = "Run every CI step that invokes stagerun, with a live status board"
)]
pub struct CiCli {
    /// CI workflow file.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_WORKFLOW_PATH)]
    pub workflow: PathBuf,

    /// Binary name that marks a step as a stagerun invocation.
    #[arg(long, value_name = "NAME", default_value = DEFAULT_MARKER)]
    pub marker: String,

    /// Shell used to run each step.
    #[arg(long, value_name = "PATH", default_value = "/bin/sh")]
    pub shell: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stagerun::pipeline::{StageDef, StageGraphBuilder};

    fn graph() -> StageGraph {
        StageGraphBuilder::new()
            .stage("clean", &[], &["rm -rf out"])
            .stage_def("setup", StageDef::new().hidden())
            .stage_def(
                "build",
                StageDef::new()
                    .with_dependency("setup")
                    .with_description("Build the image"),
            )
            .stage("docs", &[], &[])
            .build()
    }

    fn argv(args: &[&str]) -> Vec<OsString> {
        std::iter::once("stagerun")
            .chain(args.iter().copied())
            .map(OsString::from)
            .collect()
    }

    fn parse(args: &[&str]) -> Result<ParsedArgs, clap::Error> {
        let stages = graph();
        let matches = build_command(&stages)
            .unwrap()
            .try_get_matches_from(argv(args))?;
        from_matches(&matches, &stages)
    }

    #[test]
    fn test_stage_flags_in_declaration_order() {
        let parsed = parse(&["--docs", "--build", "--clean", "--dut", "rpi4", "-v"]).unwrap();
        assert_eq!(parsed.requested, vec!["clean", "build", "docs"]);
        assert_eq!(parsed.cli.dut.as_deref(), Some("rpi4"));
        assert!(parsed.cli.verbose);
        assert!(!parsed.cli.print_plan);
    }

    #[test]
    fn test_hidden_stage_has_no_flag() {
        let err = parse(&["--setup"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_no_stage_requested() {
        let parsed = parse(&["--dut", "x", "--print-plan"]).unwrap();
        assert!(parsed.requested.is_empty());
        assert!(parsed.cli.print_plan);
    }

    #[test]
    fn test_help_text() {
        let help = build_command(&graph()).unwrap().render_help().to_string();
        assert!(help.contains("--build"));
        assert!(help.contains("Build the image"));
        assert!(help.contains("Run docs"));
        assert!(!help.contains("--setup"));
    }

    #[test]
    fn test_reserved_stage_name_rejected() {
        let stages = StageGraphBuilder::new().stage("verbose", &[], &[]).build();
        let err = build_command(&stages).unwrap_err();
        assert_eq!(err.code(), "CONFIG-INVALID");
    }

    #[test]
    fn test_stage_named_like_argument_id_rejected() {
        for name in ["print_plan", "print-plan", "config", "dut", "help"] {
            let stages = StageGraphBuilder::new().stage(name, &[], &[]).build();
            let err = build_command(&stages).unwrap_err();
            assert_eq!(err.code(), "CONFIG-INVALID", "stage {name}");
        }
    }

    #[test]
    fn test_print_plan_stays_off_for_unrelated_stage() {
        let stages = StageGraphBuilder::new().stage("print_docs", &[], &[]).build();
        let matches = build_command(&stages)
            .unwrap()
            .try_get_matches_from(argv(&["--print_docs", "--dut", "x"]))
            .unwrap();
        let parsed = from_matches(&matches, &stages).unwrap();
        assert_eq!(parsed.requested, vec!["print_docs"]);
        assert!(!parsed.cli.print_plan);
    }

    #[test]
    fn test_hidden_stage_may_use_reserved_name() {
        let stages = StageGraphBuilder::new()
            .stage_def("help", StageDef::new().hidden())
            .build();
        assert!(build_command(&stages).is_ok());
    }

    #[test]
    fn test_invalid_flag_name_rejected() {
        let stages = StageGraphBuilder::new().stage("two words", &[], &[]).build();
        assert!(build_command(&stages).is_err());
    }

    #[test]
    fn test_config_path_from_args() {
        assert_eq!(
            config_path(&argv(&["--build", "--config", "ci/flow.yaml"])),
            PathBuf::from("ci/flow.yaml")
        );
        assert_eq!(
            config_path(&argv(&["--config=other.yaml"])),
            PathBuf::from("other.yaml")
        );
    }

    #[test]
    fn test_ci_cli_defaults() {
        let cli = CiCli::try_parse_from(["stagerun-ci"]).unwrap();
        assert_eq!(cli.workflow, PathBuf::from(".github/workflows/ci.yaml"));
        assert_eq!(cli.marker, "stagerun");
        assert_eq!(cli.shell, "/bin/sh");
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
        CiCli::command().debug_assert();
    }
}
