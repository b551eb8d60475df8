//! Top-level flows of the two binaries.

use crate::args::{self, CiCli};
use crate::dashboard::Dashboard;
use anyhow::Context;
use crossterm::style::{StyledContent, Stylize};
use stagerun::ci::{self, CiRunner};
use stagerun::config::ConfigLoader;
use stagerun::driver::{Driver, RunRequest};
use stagerun::errors::StagerunError;
use stagerun::report::Console;
use stagerun::runner::ShellRunner;
use std::ffi::OsString;
use std::io::{self, IsTerminal, Write};
use tracing::debug;

/// Runs `stagerun` with `argv`, returning the process exit status.
///
/// # Errors
///
/// Returns loader, planning, and execution errors. Invalid arguments, `--help`
/// and `--version` exit the process through clap.
pub async fn run_stagerun(argv: Vec<OsString>) -> anyhow::Result<u8> {
    let config_path = args::config_path(&argv);
    let config = ConfigLoader::load_from_file(&config_path).map_err(StagerunError::from)?;

    let mut cmd = args::build_command(&config.stages)?;
    let matches = match cmd.try_get_matches_from_mut(&argv) {
        Ok(matches) => matches,
        Err(e) => e.exit(),
    };
    let parsed = match args::from_matches(&matches, &config.stages) {
        Ok(parsed) => parsed,
        Err(e) => e.exit(),
    };
    debug!(config = %config_path.display(), requested = ?parsed.requested, "parsed arguments");

    if parsed.requested.is_empty() {
        let message = paint(
            "Error: No action specified.",
            io::stdout().is_terminal(),
            |s| s.yellow(),
        );
        println!("{message}\n");
        println!("{}", cmd.render_help());
        return Ok(1);
    }

    let request = RunRequest::new(parsed.requested, parsed.cli.dut.unwrap_or_default());
    let runner = ShellRunner::new(config.shell());
    let mut driver = Driver::new(&config, &runner);

    if parsed.cli.print_plan {
        let preview = driver.preview(&request)?;
        println!("{}", preview.to_json_pretty()?);
        return Ok(0);
    }

    let mut console = Console::stdout().with_verbose(parsed.cli.verbose);
    driver.run(&request, &mut console).await?;
    Ok(0)
}

/// Runs `stagerun-ci`, returning the process exit status.
///
/// # Errors
///
/// Returns an error if the workflow cannot be loaded or holds no steps.
pub async fn run_ci(cli: CiCli) -> anyhow::Result<u8> {
    let mut steps = ci::load_workflow(&cli.workflow, &cli.marker).map_err(StagerunError::from)?;
    if steps.is_empty() {
        return Err(StagerunError::configuration(format!(
            "No {} steps found in {}",
            cli.marker,
            cli.workflow.display()
        ))
        .into());
    }

    let root = match ci::project_root(&cli.workflow) {
        Some(root) => root,
        None => std::env::current_dir().context("cannot determine the working directory")?,
    };
    debug!(root = %root.display(), steps = steps.len(), "running CI steps");

    let runner = ShellRunner::new(cli.shell).with_working_dir(root.clone());
    let interactive = io::stdout().is_terminal();
    let mut board = Dashboard::new(io::stdout(), interactive);

    board.header()?;
    board.draw(&steps)?;
    let summary = CiRunner::new(&runner, root)
        .run_steps(&mut steps, |steps| {
            // Redraw failures only affect the display.
            let _ = board.draw(steps);
        })
        .await;
    board.summary(&summary)?;

    Ok(u8::from(!summary.all_passed()))
}

/// Prints `err` to stderr with its hint and returns its exit status.
pub fn report_error(err: &anyhow::Error) -> u8 {
    let stagerun_err = err.downcast_ref::<StagerunError>();
    let color = io::stderr().is_terminal();
    let mut stderr = io::stderr().lock();

    let _ = writeln!(stderr, "{}", paint(&format!("Error: {err}"), color, |s| s.red()));
    if let Some(hint) = stagerun_err.and_then(StagerunError::fix_hint) {
        let _ = writeln!(stderr, "{}", paint(&format!("  hint: {hint}"), color, |s| s.dim()));
    }

    stagerun_err.map_or(1, StagerunError::exit_code)
}

fn paint(text: &str, color: bool, style: fn(&str) -> StyledContent<&str>) -> String {
    if color {
        style(text).to_string()
    } else {
        text.to_string()
    }
}
