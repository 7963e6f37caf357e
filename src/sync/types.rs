//! Core sync types and command runner abstraction.

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use camino::Utf8PathBuf;

use crate::sync::SyncError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Output of a command executed on the remote host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteCommandOutput {
    /// Exit code reported by `ssh`; `None` when it was killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl RemoteCommandOutput {
    /// Returns `true` when the remote command exited with status zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// Where rsync should copy the project tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SyncDestination {
    /// Copy over SSH to `login:path`.
    Remote {
        /// `user@host` or bare `host`.
        login: String,
        /// SSH port.
        port: u16,
        /// Extra `ssh -o` options as `(key, value)` pairs.
        options: Vec<(String, String)>,
        /// Target directory on the remote host.
        path: Utf8PathBuf,
    },
    /// Copy to a local directory.
    Local {
        /// Target directory.
        path: Utf8PathBuf,
    },
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `program` with the given arguments, capturing stdout and stderr.
    /// Implementations may also forward output to the terminal as it arrives.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Spawn`] if the command cannot be started, or
    /// [`SyncError::Interrupted`] if the run was cancelled.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SyncError>;

    /// Runs `program` capturing output without echoing it to the terminal.
    ///
    /// # Errors
    ///
    /// Same as [`CommandRunner::run`].
    fn run_quiet(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SyncError> {
        self.run(program, args)
    }
}

/// Real command runner that shells out to the host operating system.
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SyncError> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| spawn_error(program, &err))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Shared cancellation flag raised from a signal handler.
#[derive(Clone, Debug, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    /// Creates a lowered flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of the running command.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`InterruptFlag::raise`] has been called.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Command runner that forwards stdout and stderr to the local terminal while
/// capturing both, and kills the child when its [`InterruptFlag`] is raised.
#[derive(Clone, Debug, Default)]
pub struct StreamingCommandRunner {
    interrupt: InterruptFlag,
}

impl StreamingCommandRunner {
    /// Creates a runner that is cancelled through `interrupt`.
    #[must_use]
    pub const fn with_interrupt(interrupt: InterruptFlag) -> Self {
        Self { interrupt }
    }

    fn wait(&self, child: &mut Child, program: &str) -> Result<ExitStatus, SyncError> {
        loop {
            if self.interrupt.is_raised() {
                child.kill().ok();
                child.wait().ok();
                return Err(SyncError::Interrupted {
                    program: program.to_owned(),
                });
            }
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(err) => return Err(spawn_error(program, &err)),
            }
        }
    }

    fn run_captured(
        &self,
        program: &str,
        args: &[OsString],
        echo: bool,
    ) -> Result<CommandOutput, SyncError> {
        if self.interrupt.is_raised() {
            return Err(SyncError::Interrupted {
                program: program.to_owned(),
            });
        }
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| spawn_error(program, &err))?;

        let stdout = child.stdout.take().map(|pipe| {
            thread::spawn(move || {
                if echo {
                    tee(pipe, io::stdout())
                } else {
                    tee(pipe, io::sink())
                }
            })
        });
        let stderr = child.stderr.take().map(|pipe| {
            thread::spawn(move || {
                if echo {
                    tee(pipe, io::stderr())
                } else {
                    tee(pipe, io::sink())
                }
            })
        });

        // Reader threads are detached on interrupt; the killed child closes
        // the pipes they are blocked on.
        let status = self.wait(&mut child, program)?;
        // A child that dies from the same Ctrl-C can exit before the poll
        // sees the flag.
        if self.interrupt.is_raised() {
            return Err(SyncError::Interrupted {
                program: program.to_owned(),
            });
        }

        Ok(CommandOutput {
            code: status.code(),
            stdout: collect(stdout),
            stderr: collect(stderr),
        })
    }
}

impl CommandRunner for StreamingCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SyncError> {
        self.run_captured(program, args, true)
    }

    fn run_quiet(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SyncError> {
        self.run_captured(program, args, false)
    }
}

fn tee<R: Read, W: Write>(mut source: R, mut sink: W) -> Vec<u8> {
    let mut captured = Vec::new();
    let mut buffer = [0_u8; 8192];
    loop {
        match source.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => {
                let Some(chunk) = buffer.get(..read) else {
                    break;
                };
                sink.write_all(chunk).ok();
                sink.flush().ok();
                captured.extend_from_slice(chunk);
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(_) => break,
        }
    }
    captured
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let bytes = handle
        .map(|reader| reader.join().unwrap_or_default())
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn spawn_error(program: &str, err: &io::Error) -> SyncError {
    SyncError::Spawn {
        program: program.to_owned(),
        message: err.to_string(),
    }
}
