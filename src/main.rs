//! Binary entry point for the `rtox` CLI.

use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tokio::task;

use rtox::run::EXIT_CONFIG;
use rtox::{
    InterruptFlag, RunError, RunOrchestrator, RunRequest, StreamingCommandRunner, SyncConfig,
    Syncer, config, logging,
};

mod cli;

use cli::Cli;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Run(#[from] RunError),
    #[error("rtox worker failed: {0}")]
    Worker(String),
}

impl CliError {
    const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => EXIT_CONFIG,
            Self::Run(err) => err.exit_code(),
            Self::Worker(_) => 1,
        }
    }
}

#[tokio::main]
async fn main() {
    logging::init();
    let cli = Cli::parse();
    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            err.exit_code()
        }
    };

    process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<i32, CliError> {
    let sync_config =
        SyncConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    let interrupt = InterruptFlag::new();
    let syncer = Syncer::new(
        sync_config,
        StreamingCommandRunner::with_interrupt(interrupt.clone()),
    )
    .map_err(RunError::Settings)?;

    let cwd = std::env::current_dir().map_err(|err| CliError::Config(err.to_string()))?;
    let local_root = Utf8PathBuf::from_path_buf(cwd).map_err(|path| {
        CliError::Config(format!(
            "working directory is not valid UTF-8: {}",
            path.display()
        ))
    })?;

    let request = RunRequest {
        local_root,
        home_dir: config::home_dir(),
        tox_args: cli.tox_args,
        untox: cli.untox,
    };
    let orchestrator = RunOrchestrator::new(syncer);

    let listener = tokio::spawn(raise_on_ctrl_c(interrupt));
    let outcome = task::spawn_blocking(move || orchestrator.execute(&request)).await;
    listener.abort();

    let result = outcome.map_err(|err| CliError::Worker(err.to_string()))?;
    Ok(result?)
}

async fn raise_on_ctrl_c(interrupt: InterruptFlag) {
    if tokio::signal::ctrl_c().await.is_ok() {
        interrupt.raise();
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "rtox: {err}").ok();
}
