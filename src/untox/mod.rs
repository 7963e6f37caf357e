//! In-place rewriting of `tox.ini` and requirements files so tox runs
//! against packages already installed on the host.
//!
//! Every `deps` option is dropped, install commands are stripped from the
//! remaining options, and `sitepackages = True` is set in every section.
//! Requirements files are emptied but left in place. The rewrite is
//! destructive and keeps no backup.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;
use tracing::{info, warn};

mod document;
mod manifest;
mod rules;

pub use document::{DocumentError, Entry, Section, ToxDocument};
pub use rules::{
    DEFAULT_INSTALL_PATTERN, DEFAULT_MANIFESTS, RewriteRules, UntoxConfig, requirement_reference,
};

/// Name of the document rewritten inside the project directory.
pub const TOX_INI: &str = "tox.ini";

/// Section every `testenv:*` section inherits from.
pub const TESTENV_SECTION: &str = "testenv";

const DEPS_KEY: &str = "deps";
const SITEPACKAGES_KEY: &str = "sitepackages";
const SITEPACKAGES_VALUE: &str = "True";

/// Errors raised while rewriting a project.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum UntoxError {
    /// Raised when the project has no `tox.ini`.
    #[error("no {TOX_INI} found at {path}")]
    MissingDocument {
        /// Path that was expected to exist.
        path: Utf8PathBuf,
    },
    /// Raised when `tox.ini` is not a sectioned `key = value` document.
    #[error("{path}:{line}: {message}")]
    Parse {
        /// Document that failed to parse.
        path: Utf8PathBuf,
        /// One-based line number.
        line: usize,
        /// Parser message.
        message: String,
    },
    /// Raised when reading or writing a file fails.
    #[error("failed to access {path}: {message}")]
    Io {
        /// File or directory involved.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when an install pattern is not a valid regular expression.
    #[error("invalid install pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// Offending pattern.
        pattern: String,
        /// Regex compiler message.
        message: String,
    },
    /// Raised when the `UNTOX_*` settings cannot be loaded.
    #[error("untox configuration parsing failed: {0}")]
    Settings(String),
}

/// Changes applied to a parsed document.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DocumentChanges {
    /// Sections whose `deps` option was removed.
    pub removed_deps: Vec<String>,
    /// Number of install command lines removed from other options.
    pub removed_install_lines: usize,
    /// Sections where `sitepackages = True` was added or corrected.
    pub sitepackages_set: Vec<String>,
    /// Whether an empty `[testenv]` section had to be appended.
    pub added_testenv: bool,
    /// Requirements files referenced from the removed `deps` values.
    pub requirement_files: Vec<String>,
}

/// Summary of one [`Untoxer::rewrite`] call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RewriteReport {
    /// The rewritten `tox.ini`.
    pub document: Utf8PathBuf,
    /// Whether `tox.ini` was written back.
    pub document_changed: bool,
    /// What changed inside the document.
    pub changes: DocumentChanges,
    /// Manifests emptied, in processing order.
    pub truncated: Vec<Utf8PathBuf>,
}

/// Applies [`RewriteRules`] to a project directory.
#[derive(Clone, Debug)]
pub struct Untoxer {
    rules: RewriteRules,
}

impl Untoxer {
    /// Creates a rewriter using `rules`.
    #[must_use]
    pub const fn new(rules: RewriteRules) -> Self {
        Self { rules }
    }

    /// Returns the rules in use.
    #[must_use]
    pub const fn rules(&self) -> &RewriteRules {
        &self.rules
    }

    /// Rewrites `<directory>/tox.ini` in place and empties its manifests.
    ///
    /// # Errors
    ///
    /// Returns [`UntoxError::MissingDocument`] when `tox.ini` is absent,
    /// [`UntoxError::Parse`] when it cannot be parsed, and
    /// [`UntoxError::Io`] when a file cannot be read or written. Nothing is
    /// written when parsing fails.
    pub fn rewrite(&self, directory: &Utf8Path) -> Result<RewriteReport, UntoxError> {
        let document_path = directory.join(TOX_INI);
        let missing = || UntoxError::MissingDocument {
            path: document_path.clone(),
        };
        let dir = Dir::open_ambient_dir(directory, ambient_authority()).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                missing()
            } else {
                manifest::io_error(directory, &err)
            }
        })?;
        let original = dir.read_to_string(TOX_INI).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                missing()
            } else {
                manifest::io_error(&document_path, &err)
            }
        })?;

        let mut document = ToxDocument::parse(&original).map_err(|err| UntoxError::Parse {
            path: document_path.clone(),
            line: err.line,
            message: err.message,
        })?;

        warn!(path = %document_path, "rewriting in place; no backup is kept");
        let changes = self.rewrite_document(&mut document);
        let rendered = document.render();
        let document_changed = rendered != original;
        if document_changed {
            dir.write(TOX_INI, rendered)
                .map_err(|err| manifest::io_error(&document_path, &err))?;
        }

        let names = self
            .rules
            .manifests()
            .iter()
            .chain(&changes.requirement_files)
            .map(String::as_str);
        let truncated = manifest::truncate_manifests(&dir, directory, names)?;

        info!(
            path = %document_path,
            changed = document_changed,
            removed_deps = changes.removed_deps.len(),
            removed_install_lines = changes.removed_install_lines,
            truncated = truncated.len(),
            "untox finished"
        );
        Ok(RewriteReport {
            document: document_path,
            document_changed,
            changes,
            truncated,
        })
    }

    /// Applies the rewrite to an already parsed document.
    pub fn rewrite_document(&self, document: &mut ToxDocument) -> DocumentChanges {
        let mut changes = DocumentChanges::default();

        for section in document.sections_mut() {
            let removed = section.remove(DEPS_KEY);
            if !removed.is_empty() {
                changes.removed_deps.push(section.name().to_owned());
            }
            for reference in removed
                .iter()
                .flat_map(Entry::value_lines)
                .filter_map(requirement_reference)
            {
                if !changes.requirement_files.iter().any(|known| known == reference) {
                    changes.requirement_files.push(reference.to_owned());
                }
            }

            changes.removed_install_lines +=
                section.remove_value_lines(|line| self.rules.is_install_line(line));
        }

        changes.added_testenv = document.ensure_section(TESTENV_SECTION);

        for section in document.sections_mut() {
            if section.set(SITEPACKAGES_KEY, SITEPACKAGES_VALUE) {
                changes.sitepackages_set.push(section.name().to_owned());
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests;
