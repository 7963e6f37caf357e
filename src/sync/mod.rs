//! Git-aware rsync synchronisation and remote command execution applying
//! `.gitignore` filters and wrapping SSH commands while preserving remote
//! exit codes.

use std::ffi::OsString;

use camino::Utf8Path;
use tracing::debug;

use crate::config::ResolvedConfig;

mod config;
mod identity;
mod remote_command;
mod types;
mod util;

pub use camino::Utf8PathBuf;
pub use config::{
    DEFAULT_PREFLIGHT, DEFAULT_REMOTE_BASE, DEFAULT_REMOTE_PYTHON, DEFAULT_REMOTE_UNTOX,
    DEFAULT_SSH_BATCH_MODE, DEFAULT_SSH_FORWARD_AGENT, SyncConfig, SyncConfigLoadError, SyncError,
};
pub use identity::{first_fetch_url, remote_path_for};
pub use remote_command::{build_remote_command, mkdir_command, render_words};
pub use types::{
    CommandOutput, CommandRunner, InterruptFlag, ProcessCommandRunner, RemoteCommandOutput,
    StreamingCommandRunner, SyncDestination,
};
pub use util::expand_tilde;

/// Orchestrates rsync plus remote execution.
#[derive(Clone, Debug)]
pub struct Syncer<R: CommandRunner> {
    config: SyncConfig,
    runner: R,
}

impl Syncer<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] when validation fails.
    pub fn with_process_runner(config: SyncConfig) -> Result<Self, SyncError> {
        Self::new(config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> Syncer<R> {
    /// Creates a new syncer using the provided runner and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] when configuration validation
    /// fails.
    pub fn new(config: SyncConfig, runner: R) -> Result<Self, SyncError> {
        config.validate()?;
        Ok(Self { config, runner })
    }

    /// Returns a reference to the underlying configuration.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Runs git-aware rsync from `source` to the chosen destination.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MissingSource`] when the source directory is
    /// absent, or [`SyncError::CommandFailure`] if `rsync` returns a non-zero
    /// exit code.
    pub fn sync(&self, source: &Utf8Path, destination: &SyncDestination) -> Result<(), SyncError> {
        let args = self.build_rsync_args(source, destination)?;
        debug!(program = %self.config.rsync_bin, ?args, "running rsync");
        let output = self.runner.run(&self.config.rsync_bin, &args)?;
        if output.is_success() {
            return Ok(());
        }

        let status_text = output
            .code
            .map_or_else(|| String::from("unknown"), |code| code.to_string());
        Err(SyncError::CommandFailure {
            program: self.config.rsync_bin.clone(),
            status: output.code,
            status_text,
            stderr: output.stderr,
        })
    }

    /// Builds a sync destination for `remote_path` on the configured host.
    #[must_use]
    pub fn destination_for(&self, remote: &ResolvedConfig, remote_path: &Utf8Path) -> SyncDestination {
        SyncDestination::Remote {
            login: remote.destination(),
            port: remote.port,
            options: remote.options.clone(),
            path: remote_path.to_path_buf(),
        }
    }

    /// Identifies the project rooted at `source`: the first git fetch URL,
    /// or the path itself when git is unavailable or has no remote.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Interrupted`] if the run is cancelled while git
    /// is running.
    pub fn project_identity(&self, source: &Utf8Path) -> Result<String, SyncError> {
        let args = [
            OsString::from("-C"),
            OsString::from(source.as_str()),
            OsString::from("remote"),
            OsString::from("--verbose"),
        ];
        match self.runner.run_quiet(&self.config.git_bin, &args) {
            Ok(output) if output.is_success() => {
                if let Some(url) = first_fetch_url(&output.stdout) {
                    return Ok(url.to_owned());
                }
            }
            Err(err @ SyncError::Interrupted { .. }) => return Err(err),
            Ok(_) | Err(_) => {}
        }
        debug!(path = %source, "no git remote; identifying project by path");
        Ok(source.to_string())
    }

    /// Executes `remote_command` over SSH inside `remote_path`, streaming
    /// its output, and returns the remote exit code.
    ///
    /// # Errors
    ///
    /// Propagates any failure to spawn or execute the SSH command from the
    /// configured [`CommandRunner`].
    ///
    /// # Security
    ///
    /// `remote_command` is not escaped; only the working directory component is
    /// shell-escaped. Ensure any caller-provided arguments are quoted upstream,
    /// for example with [`render_words`].
    pub fn run_remote(
        &self,
        remote: &ResolvedConfig,
        remote_path: &Utf8Path,
        remote_command: &str,
    ) -> Result<RemoteCommandOutput, SyncError> {
        let wrapped = build_remote_command(remote_path, remote_command);
        self.execute_ssh(remote, &wrapped, false)
    }

    /// Executes `remote_command` over SSH in the login directory, capturing
    /// output without echoing it.
    ///
    /// # Errors
    ///
    /// Propagates any failure to spawn or execute the SSH command from the
    /// configured [`CommandRunner`].
    ///
    /// # Security
    ///
    /// `remote_command` is passed verbatim to the SSH client.
    pub fn run_remote_quiet(
        &self,
        remote: &ResolvedConfig,
        remote_command: &str,
    ) -> Result<RemoteCommandOutput, SyncError> {
        self.execute_ssh(remote, remote_command, true)
    }

    fn execute_ssh(
        &self,
        remote: &ResolvedConfig,
        command: &str,
        quiet: bool,
    ) -> Result<RemoteCommandOutput, SyncError> {
        let args = self.build_ssh_args(remote, command);
        debug!(program = %self.config.ssh_bin, command, "running remote command");
        let output = if quiet {
            self.runner.run_quiet(&self.config.ssh_bin, &args)?
        } else {
            self.runner.run(&self.config.ssh_bin, &args)?
        };

        Ok(RemoteCommandOutput {
            exit_code: output.code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn build_rsync_args(
        &self,
        source: &Utf8Path,
        destination: &SyncDestination,
    ) -> Result<Vec<OsString>, SyncError> {
        if !source.is_dir() {
            return Err(SyncError::MissingSource {
                path: source.to_path_buf(),
            });
        }

        let mut args = vec![
            OsString::from("-az"),
            OsString::from("--delete"),
            OsString::from("--filter=:- .gitignore"),
            OsString::from("--exclude"),
            OsString::from(".tox/"),
        ];

        match destination {
            SyncDestination::Remote {
                login,
                port,
                options,
                path,
            } => {
                let remote_shell = self.build_remote_shell(*port, options);
                args.push(OsString::from("--rsh"));
                args.push(OsString::from(remote_shell));
                args.push(OsString::from(format!("{source}/")));
                args.push(OsString::from(format!("{login}:{path}")));
            }
            SyncDestination::Local { path } => {
                args.push(OsString::from(format!("{source}/")));
                args.push(OsString::from(path));
            }
        }

        Ok(args)
    }

    fn build_ssh_args(&self, remote: &ResolvedConfig, remote_command: &str) -> Vec<OsString> {
        let mut args = self
            .common_ssh_options(remote.port, &remote.options)
            .into_iter()
            .map(OsString::from)
            .collect::<Vec<_>>();
        args.push(OsString::from(remote.destination()));
        args.push(OsString::from(remote_command));
        args
    }

    fn common_ssh_options(&self, port: u16, extra: &[(String, String)]) -> Vec<String> {
        let mut args = vec![String::from("-p"), port.to_string()];

        if self.config.ssh_forward_agent() {
            args.push(String::from("-A"));
        }

        if let Some(ref identity_file) = self.config.ssh_identity_file {
            args.push(String::from("-i"));
            args.push(expand_tilde(identity_file));
        }

        if self.config.ssh_batch_mode() {
            args.push(String::from("-o"));
            args.push(String::from("BatchMode=yes"));
        }

        for (key, value) in extra {
            args.push(String::from("-o"));
            args.push(format!("{key}={value}"));
        }

        args
    }

    fn build_remote_shell(&self, port: u16, extra: &[(String, String)]) -> String {
        let mut words = vec![self.config.ssh_bin.clone()];
        words.extend(self.common_ssh_options(port, extra));
        render_words(&words)
    }
}

#[cfg(test)]
mod tests;
