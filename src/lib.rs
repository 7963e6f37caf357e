//! Core library for rtox, which runs tox on a remote host over SSH.
//!
//! The crate resolves the remote host from `.rtox.cfg`, mirrors the project
//! with rsync, and runs tox remotely through the system `ssh` client. The
//! [`untox`] module rewrites `tox.ini` and requirements files so tox uses the
//! packages already installed on the host.

pub mod config;
pub mod logging;
pub mod run;
pub mod sync;
pub mod test_support;
pub mod untox;

pub use config::{ConfigError, ResolvedConfig};
pub use run::{RunError, RunOrchestrator, RunRequest};
pub use sync::{
    CommandOutput, CommandRunner, InterruptFlag, ProcessCommandRunner, RemoteCommandOutput,
    StreamingCommandRunner, SyncConfig, SyncConfigLoadError, SyncDestination, SyncError, Syncer,
};
pub use untox::{RewriteReport, RewriteRules, UntoxConfig, UntoxError, Untoxer};
