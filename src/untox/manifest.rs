//! Truncation of dependency manifests.

use std::io;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8::Dir;
use tracing::debug;

use super::UntoxError;

/// Empties every existing regular file among `names`, resolved inside `dir`.
///
/// Names that are absolute, climb out of the directory, or do not exist are
/// skipped; nothing is created. Returns the truncated paths joined onto
/// `root` in the order first seen.
pub(super) fn truncate_manifests<'a, I>(
    dir: &Dir,
    root: &Utf8Path,
    names: I,
) -> Result<Vec<Utf8PathBuf>, UntoxError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut truncated = Vec::new();
    let mut seen: Vec<&Utf8Path> = Vec::new();
    for name in names {
        let relative = Utf8Path::new(name);
        if !is_contained(relative) || seen.contains(&relative) {
            continue;
        }
        seen.push(relative);

        let path = root.join(relative);
        match dir.metadata(relative) {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => continue,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path, "manifest absent; not creating it");
                continue;
            }
            Err(err) => return Err(io_error(&path, &err)),
        }
        dir.write(relative, b"").map_err(|err| io_error(&path, &err))?;
        truncated.push(path);
    }
    Ok(truncated)
}

fn is_contained(path: &Utf8Path) -> bool {
    !path.as_str().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Utf8Component::Normal(_) | Utf8Component::CurDir))
}

pub(super) fn io_error(path: &Utf8Path, err: &io::Error) -> UntoxError {
    UntoxError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
