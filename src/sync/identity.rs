//! Project identity and the remote directory derived from it.
//!
//! Clones of the same repository share one remote tree regardless of where
//! they live locally, so the identity prefers the git remote URL over the
//! local path.

use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};

/// Returns the URL of the first fetch remote in `git remote --verbose`
/// output.
#[must_use]
pub fn first_fetch_url(remotes: &str) -> Option<&str> {
    remotes.lines().find_map(|line| {
        let mut words = line.split_whitespace();
        let _name = words.next()?;
        let url = words.next()?;
        match words.next() {
            Some("(fetch)") | None => Some(url),
            Some(_) => None,
        }
    })
}

/// Returns `<base>/<sha256-hex(identity)>`.
#[must_use]
pub fn remote_path_for(base: &str, identity: &str) -> Utf8PathBuf {
    let digest = Sha256::digest(identity.as_bytes());
    Utf8Path::new(base).join(format!("{digest:x}"))
}
