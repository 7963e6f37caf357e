//! Test doubles shared by the unit tests.

use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::rc::Rc;

use tokio::sync::{Mutex, MutexGuard};

use crate::sync::{CommandOutput, CommandRunner, SyncError};

/// Command runner that answers with queued outputs in FIFO order and
/// records every call. An empty queue answers with [`SyncError::Spawn`], as
/// if the program were not installed.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

/// One call made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
    /// Whether the caller used [`CommandRunner::run_quiet`].
    pub quiet: bool,
}

impl CommandInvocation {
    /// Program and arguments joined with spaces, for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().map(|arg| arg.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a runner with an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls recorded so far, oldest first.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Queues an explicit output.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }

    /// Queues a silent exit with status zero.
    pub fn push_success(&self) {
        self.push_exit_code(0);
    }

    /// Queues a silent exit with `code`.
    pub fn push_exit_code(&self, code: i32) {
        self.push_output(Some(code), "", "");
    }

    /// Queues an exit with `code` and `simulated failure` on stderr.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Queues an exit without a status, as after a signal.
    pub fn push_missing_exit_code(&self) {
        self.push_output(None, "", "");
    }

    fn respond(
        &self,
        program: &str,
        args: &[OsString],
        quiet: bool,
    ) -> Result<CommandOutput, SyncError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
            quiet,
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| SyncError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SyncError> {
        self.respond(program, args, false)
    }

    fn run_quiet(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SyncError> {
        self.respond(program, args, true)
    }
}

/// Serialises environment mutation across tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Holds [`ENV_LOCK`] and restores the previous values on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets every `(key, value)` pair while holding the lock.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let previous = pairs
            .iter()
            .map(|(key, value)| {
                let old = env::var_os(key);
                // SAFETY: environment mutation is serialised by `ENV_LOCK`.
                unsafe { env::set_var(key, value) };
                ((*key).to_owned(), old)
            })
            .collect();

        Self {
            previous,
            _guard: guard,
        }
    }

    /// Removes every key while holding the lock.
    pub async fn remove_vars(keys: &[&str]) -> Self {
        let guard = ENV_LOCK.lock().await;
        let previous = keys
            .iter()
            .map(|key| {
                let old = env::var_os(key);
                // SAFETY: environment mutation is serialised by `ENV_LOCK`.
                unsafe { env::remove_var(key) };
                ((*key).to_owned(), old)
            })
            .collect();

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: the lock is held until `_guard` drops after this loop.
            unsafe {
                match old {
                    Some(value) => env::set_var(key, value),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
