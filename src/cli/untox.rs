//! Command-line interface for the `untox` binary.
//!
//! Included by path from `src/bin/untox.rs` and the build script, which
//! renders `untox.1` from it.

use camino::Utf8PathBuf;
use clap::Parser;

/// Top-level CLI for the `untox` binary.
#[derive(Debug, Parser)]
#[command(
    name = "untox",
    version,
    about = "Rewrite tox.ini and requirements files to use installed packages",
    long_about = "Rewrite tox.ini and requirements files to use installed packages.\n\n\
        Every deps option is removed, pip install and easy_install commands are \
        stripped from the remaining options, and sitepackages = True is set in \
        every section. requirements.txt, test-requirements.txt and any file a \
        removed deps option referenced with -r are emptied but kept.\n\n\
        WARNING: files are rewritten in place and no backup is kept. Run this \
        only on a disposable copy of the project."
)]
pub(crate) struct UntoxCli {
    /// Project directory containing tox.ini.
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub(crate) directory: Utf8PathBuf,
}
