//! Synchronisation configuration structures and validation.
//!
//! This module defines [`SyncConfig`] for the local tools and remote layout
//! used by a run, along with associated error types. Connection details live
//! in `.rtox.cfg` (see [`crate::config`]); everything else is loaded via
//! `ortho-config`, which merges defaults, configuration files, and
//! environment variables.

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default directory, relative to the remote login directory, holding one
/// mirrored tree per project.
pub const DEFAULT_REMOTE_BASE: &str = ".rtox";

/// Default interpreter used to run tox and pip on the remote host.
pub const DEFAULT_REMOTE_PYTHON: &str = "python";

/// Default name of the `untox` executable on the remote host.
pub const DEFAULT_REMOTE_UNTOX: &str = "untox";

/// Preflight checks run unless disabled.
pub const DEFAULT_PREFLIGHT: bool = true;

/// The local SSH agent is forwarded unless disabled.
pub const DEFAULT_SSH_FORWARD_AGENT: bool = true;

/// SSH may prompt for passwords unless batch mode is enabled.
pub const DEFAULT_SSH_BATCH_MODE: bool = false;

/// Tool and remote layout settings loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "RTOX",
    discovery(
        app_name = "rtox",
        env_var = "RTOX_CONFIG_PATH",
        config_file_name = "rtox.toml",
        dotfile_name = ".rtox.toml",
        project_file_name = "rtox.toml"
    )
)]
pub struct SyncConfig {
    /// Path to the `rsync` executable.
    #[ortho_config(default = "rsync".to_owned())]
    pub rsync_bin: String,
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Path to the `git` executable used to identify the project.
    #[ortho_config(default = "git".to_owned())]
    pub git_bin: String,
    /// Remote directory holding mirrored projects, relative to the login
    /// directory unless absolute.
    #[ortho_config(default = DEFAULT_REMOTE_BASE.to_owned())]
    pub remote_base: String,
    /// Remote interpreter, inserted into remote commands as a shell fragment
    /// (for example `python3.12` or `~/venv/bin/python`).
    #[ortho_config(default = DEFAULT_REMOTE_PYTHON.to_owned())]
    pub remote_python: String,
    /// Remote `untox` command run before tox when `--untox` is given, inserted
    /// as a shell fragment.
    #[ortho_config(default = DEFAULT_REMOTE_UNTOX.to_owned())]
    pub remote_untox_bin: String,
    /// Whether to check for `virtualenv` and `tox` on the remote host before
    /// syncing. Unset means [`DEFAULT_PREFLIGHT`]; read through
    /// [`SyncConfig::preflight`].
    pub preflight: Option<bool>,
    /// Whether to forward the local SSH agent (`ssh -A`). Unset means
    /// [`DEFAULT_SSH_FORWARD_AGENT`].
    pub ssh_forward_agent: Option<bool>,
    /// Whether to force batch mode for SSH to avoid password prompts. Unset
    /// means [`DEFAULT_SSH_BATCH_MODE`].
    pub ssh_batch_mode: Option<bool>,
    /// Path to the SSH private key file for remote authentication. Supports
    /// tilde expansion (`~/.ssh/id_ed25519`). Optional; when not provided,
    /// SSH falls back to its default key locations. Validation rejects empty
    /// or whitespace-only values.
    pub ssh_identity_file: Option<String>,
}

/// Errors raised when loading the sync configuration from layered sources.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SyncConfigLoadError {
    /// Indicates that parsing or merging configuration layers failed.
    #[error("rtox configuration parsing failed: {0}")]
    Parse(String),
}

impl SyncConfig {
    /// Ensures configuration values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] when any required field is empty
    /// and [`SyncError::TildeRemoteBase`] when `remote_base` starts with `~`.
    pub fn validate(&self) -> Result<(), SyncError> {
        Self::require_value(&self.rsync_bin, "rsync_bin")?;
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_value(&self.git_bin, "git_bin")?;
        Self::require_value(&self.remote_base, "remote_base")?;
        // Escaped into the remote shell, so `~` would reach it literally.
        if self.remote_base.trim_start().starts_with('~') {
            return Err(SyncError::TildeRemoteBase {
                value: self.remote_base.clone(),
            });
        }
        Self::require_value(&self.remote_python, "remote_python")?;
        Self::require_value(&self.remote_untox_bin, "remote_untox_bin")?;
        Self::require_optional_value(self.ssh_identity_file.as_deref(), "ssh_identity_file")?;
        Ok(())
    }

    /// Whether preflight checks run.
    #[must_use]
    pub fn preflight(&self) -> bool {
        self.preflight.unwrap_or(DEFAULT_PREFLIGHT)
    }

    /// Whether `ssh -A` is passed.
    #[must_use]
    pub fn ssh_forward_agent(&self) -> bool {
        self.ssh_forward_agent.unwrap_or(DEFAULT_SSH_FORWARD_AGENT)
    }

    /// Whether `-o BatchMode=yes` is passed.
    #[must_use]
    pub fn ssh_batch_mode(&self) -> bool {
        self.ssh_batch_mode.unwrap_or(DEFAULT_SSH_BATCH_MODE)
    }

    fn require_optional_value(value: Option<&str>, field: &str) -> Result<(), SyncError> {
        match value {
            None => Ok(()), // Not configured; SSH uses defaults
            Some(v) if !v.trim().is_empty() => Ok(()),
            Some(_) => Err(SyncError::InvalidConfig {
                field: field.to_owned(),
            }),
        }
    }

    fn require_value(value: &str, field: &str) -> Result<(), SyncError> {
        Self::require_optional_value(Some(value), field)
    }

    /// Loads configuration from defaults, configuration files, and
    /// environment variables, ignoring the process arguments (those belong
    /// to tox).
    ///
    /// # Errors
    ///
    /// Returns [`SyncConfigLoadError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, SyncConfigLoadError> {
        Self::load_from_iter([std::ffi::OsString::from("rtox")])
            .map_err(|err| SyncConfigLoadError::Parse(err.to_string()))
    }
}

/// Errors surfaced while performing synchronisation or remote execution.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SyncError {
    /// Raised when configuration is missing required values. The error message
    /// includes guidance on how to provide the value via environment variable
    /// or configuration file.
    #[error("missing {field}: set RTOX_{env_suffix} or add {field} to rtox.toml", env_suffix = field.to_uppercase())]
    InvalidConfig {
        /// Configuration field that failed validation.
        field: String,
    },
    /// Raised when `remote_base` starts with `~`. The value is already
    /// relative to the remote login directory.
    #[error(
        "remote_base must not start with '~' (got {value}): use a path relative to the remote home, such as .rtox"
    )]
    TildeRemoteBase {
        /// Rejected value.
        value: String,
    },
    /// Raised when the source directory does not exist.
    #[error("sync source directory missing: {path}")]
    MissingSource {
        /// Path that was expected to be synchronised.
        path: Utf8PathBuf,
    },
    /// Raised when a command cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when `rsync` completes with a non-zero exit code.
    #[error("{program} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Command name used for the attempted operation.
        program: String,
        /// Exit status as reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the process.
        stderr: String,
    },
    /// Raised when the user interrupts a running command.
    #[error("{program} was interrupted")]
    Interrupted {
        /// Command that was killed.
        program: String,
    },
}
