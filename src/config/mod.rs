//! Connection settings discovery for `.rtox.cfg`.
//!
//! The search order is computed up front as an explicit list of candidates:
//! the start directory and every ancestor up to the filesystem root, followed
//! by the user's home directory. The first candidate that exists wins, even
//! when it turns out to be malformed.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use ini::Ini;
use thiserror::Error;
use tracing::{debug, info};

/// File name looked up in each candidate directory.
pub const CONFIG_FILE_NAME: &str = ".rtox.cfg";

/// Section holding the connection settings.
pub const SSH_SECTION: &str = "ssh";

/// Port used when `.rtox.cfg` does not specify one.
pub const DEFAULT_SSH_PORT: u16 = 22;

const USER_KEY: &str = "user";
const HOSTNAME_KEY: &str = "hostname";
const PORT_KEY: &str = "port";

/// Connection settings parsed from exactly one `.rtox.cfg`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedConfig {
    /// Remote login. `None` lets `ssh` pick its default.
    pub user: Option<String>,
    /// Remote host name or address.
    pub hostname: String,
    /// Remote SSH port.
    pub port: u16,
    /// Remaining `[ssh]` keys, in file order, forwarded as `ssh -o`.
    pub options: Vec<(String, String)>,
    /// File the settings were read from.
    pub source: Utf8PathBuf,
}

impl ResolvedConfig {
    /// Returns `user@hostname`, or just the hostname without a user.
    #[must_use]
    pub fn destination(&self) -> String {
        self.user.as_ref().map_or_else(
            || self.hostname.clone(),
            |user| format!("{user}@{}", self.hostname),
        )
    }
}

/// Errors raised while locating or parsing `.rtox.cfg`.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// No candidate file exists anywhere on the search path.
    #[error("no {CONFIG_FILE_NAME} found; searched: {}", format_searched(.searched))]
    NotFound {
        /// Every location that was checked, in order.
        searched: Vec<Utf8PathBuf>,
    },
    /// A candidate exists but cannot be used.
    #[error("invalid configuration in {path}: {message}")]
    Invalid {
        /// File that failed to load.
        path: Utf8PathBuf,
        /// Human-readable reason.
        message: String,
    },
}

fn format_searched(searched: &[Utf8PathBuf]) -> String {
    searched
        .iter()
        .map(|path| path.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builds the ordered list of locations checked for `.rtox.cfg`.
///
/// `start_dir` and each of its ancestors come first, nearest first, and the
/// home directory fallback comes last when one is known.
#[must_use]
pub fn candidate_paths(start_dir: &Utf8Path, home_dir: Option<&Utf8Path>) -> Vec<Utf8PathBuf> {
    let mut candidates: Vec<Utf8PathBuf> = start_dir
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .collect();
    if let Some(home) = home_dir {
        candidates.push(home.join(CONFIG_FILE_NAME));
    }
    candidates
}

/// Returns the first candidate accepted by `exists`.
pub fn select_candidate<F>(candidates: &[Utf8PathBuf], mut exists: F) -> Option<&Utf8PathBuf>
where
    F: FnMut(&Utf8Path) -> bool,
{
    candidates.iter().find(|candidate| exists(candidate))
}

/// Locates and parses the nearest `.rtox.cfg`.
///
/// # Errors
///
/// Returns [`ConfigError::NotFound`] when no candidate exists and
/// [`ConfigError::Invalid`] when the chosen file cannot be read or lacks
/// required settings.
pub fn resolve(
    start_dir: &Utf8Path,
    home_dir: Option<&Utf8Path>,
) -> Result<ResolvedConfig, ConfigError> {
    let candidates = candidate_paths(start_dir, home_dir);
    let Some(path) = select_candidate(&candidates, is_file).cloned() else {
        return Err(ConfigError::NotFound {
            searched: candidates,
        });
    };

    info!(path = %path, "loading config");
    let contents = read_file(&path)?;
    parse_config(&path, &contents)
}

/// Parses `.rtox.cfg` contents read from `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the text is not sectioned
/// `key = value` data, when `[ssh]` or its `hostname` is missing, or when
/// `port` is not a valid TCP port.
pub fn parse_config(path: &Utf8Path, contents: &str) -> Result<ResolvedConfig, ConfigError> {
    let invalid = |message: String| ConfigError::Invalid {
        path: path.to_path_buf(),
        message,
    };

    let document = Ini::load_from_str(contents).map_err(|err| invalid(err.to_string()))?;
    let section = document
        .section(Some(SSH_SECTION))
        .ok_or_else(|| invalid(format!("missing [{SSH_SECTION}] section")))?;

    let hostname = section
        .get(HOSTNAME_KEY)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| invalid(format!("missing {HOSTNAME_KEY} in [{SSH_SECTION}]")))?
        .to_owned();

    let user = section
        .get(USER_KEY)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned);

    let port = match section.get(PORT_KEY).map(str::trim) {
        None | Some("") => DEFAULT_SSH_PORT,
        Some(raw) => raw
            .parse::<u16>()
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(|| invalid(format!("{PORT_KEY} must be a TCP port, got {raw:?}")))?,
    };

    let options = section
        .iter()
        .filter(|(key, _)| ![USER_KEY, HOSTNAME_KEY, PORT_KEY].contains(key))
        .map(|(key, value)| (key.to_owned(), value.trim().to_owned()))
        .collect::<Vec<_>>();

    debug!(hostname = %hostname, port, extra_options = options.len(), "parsed ssh settings");
    Ok(ResolvedConfig {
        user,
        hostname,
        port,
        options,
        source: path.to_path_buf(),
    })
}

/// Returns the current user's home directory as a UTF-8 path.
#[must_use]
pub fn home_dir() -> Option<Utf8PathBuf> {
    dirs::home_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

fn split_path(path: &Utf8Path) -> Result<(&Utf8Path, &str), ConfigError> {
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().ok_or_else(|| ConfigError::Invalid {
        path: path.to_path_buf(),
        message: String::from("configuration path is missing a filename"),
    })?;
    Ok((parent, file_name))
}

fn is_file(path: &Utf8Path) -> bool {
    let Ok((parent, file_name)) = split_path(path) else {
        return false;
    };
    Dir::open_ambient_dir(parent, ambient_authority())
        .and_then(|dir| dir.metadata(file_name))
        .is_ok_and(|metadata| metadata.is_file())
}

fn read_file(path: &Utf8Path) -> Result<String, ConfigError> {
    let (parent, file_name) = split_path(path)?;
    let io_error = |err: io::Error| ConfigError::Invalid {
        path: path.to_path_buf(),
        message: err.to_string(),
    };
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(io_error)?;
    dir.read_to_string(file_name).map_err(io_error)
}
