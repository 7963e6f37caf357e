//! Build script rendering the `rtox.1` and `untox.1` man pages into
//! `OUT_DIR` with clap-mangen.

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

#[path = "src/cli/untox.rs"]
mod untox_cli;

fn render_page(out_dir: &Path, page: &str, command: clap::Command) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    Man::new(command).render(&mut buffer)?;
    fs::write(out_dir.join(page), buffer)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    for source in ["build.rs", "src/cli/mod.rs", "src/cli/untox.rs"] {
        writeln!(stdout, "cargo:rerun-if-changed={source}")?;
    }

    let out_dir =
        PathBuf::from(env::var_os("OUT_DIR").ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
        })?);

    render_page(&out_dir, "rtox.1", cli::Cli::command())?;
    render_page(&out_dir, "untox.1", untox_cli::UntoxCli::command())?;
    Ok(())
}
