//! What `untox` removes: install command patterns and manifest names.

use ortho_config::OrthoConfig;
use regex::Regex;
use serde::Deserialize;

use super::UntoxError;

/// Default install command pattern.
///
/// Matches `pip install`, `pip3 install`, `python -m pip install`,
/// `{envpython} -m pip install`, `{envbindir}/pip install`,
/// `uv pip install`, and `easy_install`, optionally behind tox's `-`
/// ignore-errors marker.
pub const DEFAULT_INSTALL_PATTERN: &str = r"^-?\s*(?:\S*python\S*\s+-m\s+)?(?:uv\s+)?(?:\S*/)?(?:pip[0-9.]*\s+install|easy_install)\b";

/// Manifests truncated whether or not `tox.ini` references them.
pub const DEFAULT_MANIFESTS: &str = "requirements.txt,test-requirements.txt";

/// Rewrite rules loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "UNTOX")]
pub struct UntoxConfig {
    /// Comma-separated regular expressions matched against each trimmed
    /// value line.
    #[ortho_config(default = DEFAULT_INSTALL_PATTERN.to_owned())]
    pub install_patterns: String,
    /// Comma-separated manifest file names, relative to the project root.
    #[ortho_config(default = DEFAULT_MANIFESTS.to_owned())]
    pub manifests: String,
}

impl UntoxConfig {
    /// Loads rules from defaults and `UNTOX_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`UntoxError::Settings`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, UntoxError> {
        Self::load_from_iter([std::ffi::OsString::from("untox")])
            .map_err(|err| UntoxError::Settings(err.to_string()))
    }
}

/// Compiled rewrite rules.
#[derive(Clone, Debug)]
pub struct RewriteRules {
    install_patterns: Vec<Regex>,
    manifests: Vec<String>,
}

impl RewriteRules {
    /// Compiles `patterns` and keeps `manifests` as given.
    ///
    /// # Errors
    ///
    /// Returns [`UntoxError::InvalidPattern`] for the first pattern that is
    /// not a valid regular expression.
    pub fn new<P, M>(patterns: &[P], manifests: &[M]) -> Result<Self, UntoxError>
    where
        P: AsRef<str>,
        M: AsRef<str>,
    {
        let install_patterns = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern.as_ref()).map_err(|err| UntoxError::InvalidPattern {
                    pattern: pattern.as_ref().to_owned(),
                    message: err.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            install_patterns,
            manifests: manifests
                .iter()
                .map(|name| name.as_ref().to_owned())
                .collect(),
        })
    }

    /// Builds rules from the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`UntoxError::InvalidPattern`] if the default pattern fails to
    /// compile.
    pub fn defaults() -> Result<Self, UntoxError> {
        Self::new(&[DEFAULT_INSTALL_PATTERN], split_list(DEFAULT_MANIFESTS).as_slice())
    }

    /// Builds rules from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`UntoxError::InvalidPattern`] for an invalid pattern.
    pub fn from_config(config: &UntoxConfig) -> Result<Self, UntoxError> {
        Self::new(
            split_list(&config.install_patterns).as_slice(),
            split_list(&config.manifests).as_slice(),
        )
    }

    /// Returns `true` when `line` is an install command.
    #[must_use]
    pub fn is_install_line(&self, line: &str) -> bool {
        let trimmed = line.trim();
        self.install_patterns
            .iter()
            .any(|pattern| pattern.is_match(trimmed))
    }

    /// Conventional manifest names.
    #[must_use]
    pub fn manifests(&self) -> &[String] {
        &self.manifests
    }
}

/// Extracts the requirements file from a `deps` line such as `-r file`,
/// `-rfile`, `--requirement file`, or `--requirement=file`. A leading
/// `{toxinidir}/` is dropped; other substitutions are not resolved.
#[must_use]
pub fn requirement_reference(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let tail = trimmed
        .strip_prefix("--requirement")
        .map(|long| long.strip_prefix('=').unwrap_or(long))
        .or_else(|| trimmed.strip_prefix("-r"))?
        .trim();
    let path = tail.strip_prefix("{toxinidir}/").unwrap_or(tail);
    if path.is_empty() || path.contains('{') || path.starts_with('#') {
        return None;
    }
    Some(path)
}

fn split_list(list: &str) -> Vec<&str> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn rules() -> RewriteRules {
        RewriteRules::defaults().expect("default rules compile")
    }

    #[rstest]
    #[case("pip install -r requirements.txt")]
    #[case("pip3 install foo")]
    #[case("pip3.11 install foo")]
    #[case("python -m pip install -U pip")]
    #[case("python3.12 -m pip install .")]
    #[case("{envpython} -m pip install -e .")]
    #[case("{envbindir}/pip install x")]
    #[case("/usr/bin/pip install x")]
    #[case("uv pip install x")]
    #[case("- pip install x")]
    #[case("-pip install x")]
    #[case("easy_install foo")]
    #[case("   pip install --no-deps .")]
    fn default_rules_match_install_commands(rules: RewriteRules, #[case] line: &str) {
        assert!(rules.is_install_line(line), "{line:?} should match");
    }

    #[rstest]
    #[case("pytest {posargs}")]
    #[case("python -m pytest")]
    #[case("pip list")]
    #[case("pip installer")]
    #[case("flake8 pip install")]
    #[case("# pip install foo")]
    #[case("")]
    fn default_rules_leave_other_lines(rules: RewriteRules, #[case] line: &str) {
        assert!(!rules.is_install_line(line), "{line:?} should not match");
    }

    #[rstest]
    #[case("-r requirements.txt", Some("requirements.txt"))]
    #[case("-rtest-requirements.txt", Some("test-requirements.txt"))]
    #[case("--requirement docs/reqs.txt", Some("docs/reqs.txt"))]
    #[case("--requirement=reqs.txt", Some("reqs.txt"))]
    #[case("-r{toxinidir}/requirements.txt", Some("requirements.txt"))]
    #[case("-r{env:REQS}", None)]
    #[case("pytest", None)]
    #[case("-c constraints.txt", None)]
    #[case("-r", None)]
    fn requirement_reference_extracts_paths(#[case] line: &str, #[case] expected: Option<&str>) {
        assert_eq!(requirement_reference(line), expected);
    }

    #[test]
    fn new_rejects_invalid_pattern() {
        let err = RewriteRules::new(&["pip install", "("], &["requirements.txt"])
            .expect_err("pattern should be rejected");
        let UntoxError::InvalidPattern { pattern, .. } = err else {
            panic!("expected InvalidPattern, got {err:?}");
        };
        assert_eq!(pattern, "(");
    }

    #[test]
    fn from_config_splits_lists() {
        let config = UntoxConfig {
            install_patterns: String::from(r"^conda\s+install, ^pip\s+install"),
            manifests: String::from(" requirements.txt , ,dev.txt"),
        };
        let rules = RewriteRules::from_config(&config).expect("rules compile");

        assert!(rules.is_install_line("conda install numpy"));
        assert!(!rules.is_install_line("easy_install foo"));
        assert_eq!(rules.manifests(), ["requirements.txt", "dev.txt"]);
    }
}
