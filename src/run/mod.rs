//! Orchestrates a remote tox run over SSH.
//!
//! The run workflow resolves `.rtox.cfg`, checks the remote host has tox,
//! mirrors the local project with rsync, optionally strips package
//! installation from the mirrored copy, and runs tox remotely. The remote
//! tox exit code is returned so callers observe the same status locally.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{self, ConfigError, ResolvedConfig};
use crate::sync::{
    CommandRunner, RemoteCommandOutput, SyncError, Syncer, mkdir_command, remote_path_for,
    render_words,
};

/// Exit code for configuration problems (`EX_CONFIG` from `sysexits.h`).
pub const EXIT_CONFIG: i32 = 78;

/// Exit code used when a failing step reported no status of its own.
pub const EXIT_NO_STATUS: i32 = 255;

/// Exit code after the user interrupts the run.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Local file that triggers `bindep test` on the remote host.
pub const BINDEP_FILE: &str = "bindep.txt";

/// Errors surfaced while performing a remote run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Raised when `.rtox.cfg` is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Raised when the tool settings fail validation.
    #[error("invalid rtox settings: {0}")]
    Settings(#[source] SyncError),
    /// Raised when the remote host lacks `virtualenv` or `tox`.
    #[error("remote command `{command}` exited with status {status_text}: {stderr}")]
    Preflight {
        /// Remote command that failed.
        command: String,
        /// Exit status, if any.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the remote command.
        stderr: String,
    },
    /// Raised when ssh or rsync fails to run or move the workspace.
    #[error("{message}: {source}")]
    Transport {
        /// Human-readable description of the failing stage.
        message: String,
        /// Underlying synchronisation error.
        #[source]
        source: SyncError,
    },
    /// Raised when a remote step other than preflight exits unsuccessfully.
    #[error("remote step `{step}` exited with status {status_text}{}", stderr_suffix(stderr))]
    RemoteCommand {
        /// Short name of the step.
        step: String,
        /// Exit status, if any.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the remote command.
        stderr: String,
    },
    /// Raised when the user interrupts the run.
    #[error("interrupted")]
    Interrupted,
}

impl RunError {
    /// Maps the error to the process exit code reported by `rtox`.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Settings(_) => EXIT_CONFIG,
            Self::Preflight { status, .. } | Self::RemoteCommand { status, .. } => {
                failing_status(*status)
            }
            Self::Transport {
                source: SyncError::CommandFailure { status, .. },
                ..
            } => failing_status(*status),
            Self::Transport { .. } => EXIT_NO_STATUS,
            Self::Interrupted => EXIT_INTERRUPTED,
        }
    }

    fn transport(message: &str, source: SyncError) -> Self {
        match source {
            SyncError::Interrupted { .. } => Self::Interrupted,
            other => Self::Transport {
                message: message.to_owned(),
                source: other,
            },
        }
    }

    fn remote_step(step: &str, output: RemoteCommandOutput) -> Self {
        Self::RemoteCommand {
            step: step.to_owned(),
            status: output.exit_code,
            status_text: status_text(output.exit_code),
            stderr: output.stderr,
        }
    }
}

/// Inputs for one run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunRequest {
    /// Local project root; the config search starts here.
    pub local_root: Utf8PathBuf,
    /// Home directory searched last for `.rtox.cfg`.
    pub home_dir: Option<Utf8PathBuf>,
    /// Arguments forwarded verbatim to tox.
    pub tox_args: Vec<String>,
    /// Whether to run `untox` on the mirrored copy before tox.
    pub untox: bool,
}

/// Executes the remote run flow using the provided syncer.
#[derive(Debug)]
pub struct RunOrchestrator<R: CommandRunner> {
    syncer: Syncer<R>,
}

impl<R: CommandRunner> RunOrchestrator<R> {
    /// Creates a new orchestrator.
    #[must_use]
    pub const fn new(syncer: Syncer<R>) -> Self {
        Self { syncer }
    }

    /// Runs the end-to-end workflow and returns the remote tox exit code.
    ///
    /// A non-zero tox status is returned as `Ok`; only failures of rtox's own
    /// steps are errors.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] when configuration resolution, preflight checks,
    /// synchronisation, the remote untox step, or starting tox fails.
    pub fn execute(&self, request: &RunRequest) -> Result<i32, RunError> {
        let remote = config::resolve(&request.local_root, request.home_dir.as_deref())?;
        info!(host = %remote.destination(), port = remote.port, "using remote host");

        let identity = self
            .syncer
            .project_identity(&request.local_root)
            .map_err(|err| RunError::transport("failed to identify project", err))?;
        let remote_path = remote_path_for(&self.syncer.config().remote_base, &identity);

        if self.syncer.config().preflight() {
            self.preflight(&remote)?;
        }
        self.prepare_remote_dir(&remote, &remote_path)?;

        let destination = self.syncer.destination_for(&remote, &remote_path);
        info!(remote_path = %remote_path, "syncing workspace");
        self.syncer
            .sync(&request.local_root, &destination)
            .map_err(|err| RunError::transport("workspace sync failed", err))?;

        if request.local_root.join(BINDEP_FILE).is_file() {
            self.run_bindep(&remote, &remote_path)?;
        }

        if request.untox {
            self.untox_remote(&remote, &remote_path)?;
        }

        let command = self.tox_command(&request.tox_args);
        info!(command = %command, "running tox");
        let output = self
            .syncer
            .run_remote(&remote, &remote_path, &command)
            .map_err(|err| RunError::transport("failed to run tox", err))?;
        match output.exit_code {
            Some(code) => Ok(code),
            None => Err(RunError::remote_step("tox", output)),
        }
    }

    fn preflight(&self, remote: &ResolvedConfig) -> Result<(), RunError> {
        let python = &self.syncer.config().remote_python;
        for module in ["virtualenv", "tox"] {
            let command = format!("{python} -m {module} --version");
            let output = self
                .syncer
                .run_remote_quiet(remote, &command)
                .map_err(|err| RunError::transport("preflight check failed", err))?;
            if !output.is_success() {
                return Err(RunError::Preflight {
                    command,
                    status: output.exit_code,
                    status_text: status_text(output.exit_code),
                    stderr: output.stderr,
                });
            }
        }
        Ok(())
    }

    fn prepare_remote_dir(
        &self,
        remote: &ResolvedConfig,
        remote_path: &Utf8Path,
    ) -> Result<(), RunError> {
        let output = self
            .syncer
            .run_remote_quiet(remote, &mkdir_command(remote_path))
            .map_err(|err| RunError::transport("failed to create remote directory", err))?;
        if output.is_success() {
            Ok(())
        } else {
            Err(RunError::remote_step("mkdir", output))
        }
    }

    fn run_bindep(&self, remote: &ResolvedConfig, remote_path: &Utf8Path) -> Result<(), RunError> {
        let lookup = match self.syncer.run_remote_quiet(remote, "command -v bindep") {
            Ok(output) => output,
            Err(SyncError::Interrupted { .. }) => return Err(RunError::Interrupted),
            Err(err) => {
                warn!(error = %err, "could not look up bindep");
                return Ok(());
            }
        };
        if !lookup.is_success() {
            info!("bindep not installed remotely; skipping {BINDEP_FILE}");
            return Ok(());
        }

        match self.syncer.run_remote(remote, remote_path, "bindep test") {
            Ok(output) if output.is_success() => {}
            Ok(output) => warn!(status = %status_text(output.exit_code), "bindep test failed"),
            Err(SyncError::Interrupted { .. }) => return Err(RunError::Interrupted),
            Err(err) => warn!(error = %err, "failed to run bindep"),
        }
        Ok(())
    }

    fn untox_remote(&self, remote: &ResolvedConfig, remote_path: &Utf8Path) -> Result<(), RunError> {
        let settings = self.syncer.config();
        let steps = [
            ("untox", settings.remote_untox_bin.clone()),
            (
                "pip install",
                format!("{} -m pip install --no-deps -e .", settings.remote_python),
            ),
        ];
        for (step, command) in steps {
            info!(command = %command, "preparing remote copy");
            let output = self
                .syncer
                .run_remote(remote, remote_path, &command)
                .map_err(|err| RunError::transport("failed to run remote step", err))?;
            if !output.is_success() {
                return Err(RunError::remote_step(step, output));
            }
        }
        Ok(())
    }

    fn tox_command(&self, tox_args: &[String]) -> String {
        let mut command = format!("PY_COLORS=1 {} -m tox", self.syncer.config().remote_python);
        if !tox_args.is_empty() {
            command.push(' ');
            command.push_str(&render_words(tox_args));
        }
        command
    }
}

const fn failing_status(status: Option<i32>) -> i32 {
    match status {
        Some(code) if code != 0 => code,
        _ => EXIT_NO_STATUS,
    }
}

fn status_text(status: Option<i32>) -> String {
    status.map_or_else(|| String::from("unknown"), |code| code.to_string())
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}
