use clap::Parser;
use stagerun_cli::args::CiCli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = stagerun_cli::logging::init_tracing() {
        eprintln!("warning: logging disabled: {err}");
    }

    let cli = CiCli::parse();
    let code = match stagerun_cli::app::run_ci(cli).await {
        Ok(code) => code,
        Err(err) => stagerun_cli::app::report_error(&err),
    };
    ExitCode::from(code)
}
