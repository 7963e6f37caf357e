//! Remote command string assembly.
//!
//! Commands run through `ssh` are a single shell string on the remote side.
//! Every user-supplied word is escaped individually so tox arguments and
//! paths reach the remote shell unchanged.

use camino::Utf8Path;
use shell_escape::unix::escape;

/// Wraps `remote_command` so it runs inside `remote_path`.
#[must_use]
pub fn build_remote_command(remote_path: &Utf8Path, remote_command: &str) -> String {
    let escaped_path = escape(remote_path.as_str().into());
    format!("cd {escaped_path} && {remote_command}")
}

/// Shell-escapes each word and joins them with spaces.
#[must_use]
pub fn render_words<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(|word| escape(word.as_ref().into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds `mkdir -p <path>`.
#[must_use]
pub fn mkdir_command(remote_path: &Utf8Path) -> String {
    format!("mkdir -p {}", escape(remote_path.as_str().into()))
}
