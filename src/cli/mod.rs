//! Command-line interface definitions for the `rtox` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `rtox` binary.
#[derive(Debug, Parser)]
#[command(
    name = "rtox",
    version,
    about = "Run tox on a remote host over SSH",
    long_about = "Run tox on a remote host over SSH.\n\n\
        The remote host is read from the [ssh] section of the nearest .rtox.cfg \
        in the current directory or its parents, falling back to ~/.rtox.cfg. \
        The project is mirrored with rsync (honouring .gitignore) and tox runs \
        in the mirrored copy; its exit status becomes rtox's exit status.\n\n\
        Every argument from the first one rtox does not recognise onwards is \
        passed to tox unchanged, so `rtox -e py3 -- -k slow` works as it \
        would with tox."
)]
pub(crate) struct Cli {
    /// Strip package installation from the remote copy's tox.ini and
    /// requirements files, install the project without dependencies, and
    /// test against the packages already on the host.
    #[arg(long)]
    pub(crate) untox: bool,
    /// Arguments passed verbatim to tox on the remote host.
    #[arg(
        value_name = "TOX_ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub(crate) tox_args: Vec<String>,
}
