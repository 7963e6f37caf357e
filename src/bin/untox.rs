//! Strips package installation from a tox project.
//!
//! This binary rewrites `tox.ini` in place so tox reuses the packages already
//! installed on the host, and empties the project's requirements files.

use std::io::Write as _;
use std::process::ExitCode;

use clap::Parser;
use rtox::{RewriteReport, RewriteRules, UntoxConfig, UntoxError, Untoxer, logging};

#[path = "../cli/untox.rs"]
mod cli;

use cli::UntoxCli;

fn main() -> ExitCode {
    logging::init();
    let cli = UntoxCli::parse();
    match run(&cli) {
        Ok(report) => {
            writeln!(std::io::stdout(), "{}", summary(&report)).ok();
            ExitCode::SUCCESS
        }
        Err(err) => {
            writeln!(std::io::stderr(), "untox: {err}").ok();
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &UntoxCli) -> Result<RewriteReport, UntoxError> {
    let config = UntoxConfig::load_without_cli_args()?;
    let untoxer = Untoxer::new(RewriteRules::from_config(&config)?);
    untoxer.rewrite(&cli.directory)
}

fn summary(report: &RewriteReport) -> String {
    if !report.document_changed {
        return format!(
            "{}: already untoxed, emptied {} requirements file(s)",
            report.document,
            report.truncated.len()
        );
    }
    format!(
        "{}: removed deps from {} section(s), dropped {} install line(s), emptied {} requirements file(s)",
        report.document,
        report.changes.removed_deps.len(),
        report.changes.removed_install_lines,
        report.truncated.len()
    )
}
