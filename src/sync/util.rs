//! Local path helpers for ssh arguments.

/// Expands a leading `~/` in a local path such as `ssh_identity_file`.
///
/// The path is returned unchanged when it has no `~/` prefix or no home
/// directory is known. `~user/` forms are left to the shell.
///
/// ```
/// # use rtox::sync::expand_tilde;
/// assert_eq!(expand_tilde("/etc/ssh/key"), "/etc/ssh/key");
/// ```
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    let Some(rest) = path.strip_prefix("~/") else {
        return path.to_owned();
    };
    dirs::home_dir().map_or_else(
        || path.to_owned(),
        |home| home.join(rest).to_string_lossy().into_owned(),
    )
}
