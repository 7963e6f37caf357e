//! Ordered, lossless model of a `tox.ini` file.
//!
//! Sections keep their options, comments, and blank lines in file order so
//! that parsing followed by rendering reproduces the input byte for byte.
//! Mutations only touch the options they target.

use thiserror::Error;

/// Raised when text is not a sectioned `key = value` document.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("line {line}: {message}")]
pub struct DocumentError {
    /// One-based line number of the offending line.
    pub line: usize,
    /// Human-readable reason.
    pub message: String,
}

/// A parsed `tox.ini`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ToxDocument {
    preamble: Vec<String>,
    sections: Vec<Section>,
    trailing_newline: bool,
    crlf: bool,
}

/// A `[name]` block and everything up to the next header.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Section {
    name: String,
    header: String,
    items: Vec<Item>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Item {
    Entry(Entry),
    Trivia(String),
}

/// One option with its raw first line split at the value, plus any
/// continuation lines.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entry {
    key: String,
    head: String,
    value: String,
    continuation: Vec<String>,
}

impl Entry {
    fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_owned(),
            head: format!("{key} = "),
            value: value.to_owned(),
            continuation: Vec::new(),
        }
    }

    /// Option name as written, without surrounding whitespace.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `true` when the option name matches `key`, ignoring ASCII case.
    #[must_use]
    pub fn is(&self, key: &str) -> bool {
        self.key.eq_ignore_ascii_case(key)
    }

    /// Iterates over the trimmed, non-empty value lines.
    pub fn value_lines(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.value.as_str())
            .chain(self.continuation.iter().map(String::as_str))
            .map(str::trim)
            .filter(|line| !line.is_empty())
    }

    /// Drops every value line for which `matches` returns `true` and returns
    /// how many were dropped.
    fn remove_lines<F>(&mut self, mut matches: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let mut removed = 0;
        if !self.value.trim().is_empty() && matches(self.value.trim()) {
            let line_end = if self.value.ends_with('\r') { "\r" } else { "" };
            self.value = line_end.to_owned();
            self.head = self.head.trim_end().to_owned();
            removed += 1;
        }
        let before = self.continuation.len();
        self.continuation.retain(|line| {
            let trimmed = line.trim();
            trimmed.is_empty() || !matches(trimmed)
        });
        removed + (before - self.continuation.len())
    }

    fn has_content(&self) -> bool {
        self.value_lines().any(|line| !is_comment(line))
    }

    fn render_into(&self, lines: &mut Vec<String>) {
        lines.push(format!("{}{}", self.head, self.value));
        lines.extend(self.continuation.iter().cloned());
    }
}

impl Section {
    fn new(name: &str, line_end: &str) -> Self {
        Self {
            name: name.to_owned(),
            header: format!("[{name}]{line_end}"),
            items: Vec::new(),
        }
    }

    /// `"\r"` when the header was read from a CRLF line, so inserted lines
    /// match it.
    fn line_end(&self) -> &'static str {
        if self.header.ends_with('\r') { "\r" } else { "" }
    }

    /// Section name without brackets.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Iterates over the options of this section in file order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.items.iter().filter_map(|item| match item {
            Item::Entry(entry) => Some(entry),
            Item::Trivia(_) => None,
        })
    }

    /// Returns the first option named `key`, ignoring ASCII case.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries().find(|entry| entry.is(key))
    }

    /// Removes every option named `key` and returns the removed entries.
    pub fn remove(&mut self, key: &str) -> Vec<Entry> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.items.len());
        for item in self.items.drain(..) {
            match item {
                Item::Entry(entry) if entry.is(key) => removed.push(entry),
                other => kept.push(other),
            }
        }
        self.items = kept;
        removed
    }

    /// Removes matching value lines from every option. Options that lose
    /// all of their content this way are dropped. Returns the number of
    /// lines removed.
    pub fn remove_value_lines<F>(&mut self, mut matches: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let mut removed = 0;
        self.items.retain_mut(|item| {
            let Item::Entry(entry) = item else {
                return true;
            };
            let dropped = entry.remove_lines(&mut matches);
            removed += dropped;
            dropped == 0 || entry.has_content()
        });
        removed
    }

    /// Sets `key = value`, replacing every existing occurrence in place or
    /// appending after the last option. Returns `true` when the section
    /// changed.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let wanted = Entry::new(key, &format!("{value}{}", self.line_end()));
        let mut found = false;
        let mut changed = false;
        for item in &mut self.items {
            if let Item::Entry(entry) = item
                && entry.is(key)
            {
                found = true;
                if entry.value.trim() != value || !entry.continuation.is_empty() {
                    *entry = wanted.clone();
                    changed = true;
                }
            }
        }
        if found {
            return changed;
        }

        let position = self
            .items
            .iter()
            .rposition(|item| matches!(item, Item::Entry(_)))
            .map_or(0, |index| index + 1);
        self.items.insert(position, Item::Entry(wanted));
        true
    }

    fn render_into(&self, lines: &mut Vec<String>) {
        lines.push(self.header.clone());
        for item in &self.items {
            match item {
                Item::Entry(entry) => entry.render_into(lines),
                Item::Trivia(line) => lines.push(line.clone()),
            }
        }
    }
}

impl ToxDocument {
    /// Parses `text` into an ordered document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] for options outside a section, duplicate
    /// section names, stray continuation lines, and lines that are neither
    /// headers, options, comments, nor blank.
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        let mut parser = Parser::default();
        for (index, raw) in split_lines(text).into_iter().enumerate() {
            parser.feed(index + 1, raw)?;
        }
        Ok(parser.finish(
            text.is_empty() || text.ends_with('\n'),
            text.contains("\r\n"),
        ))
    }

    /// Renders the document back to text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut lines = self.preamble.clone();
        for section in &self.sections {
            section.render_into(&mut lines);
        }
        let mut text = lines.join("\n");
        if self.trailing_newline && !lines.is_empty() {
            text.push('\n');
        }
        text
    }

    /// Iterates over the sections in file order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    /// Iterates mutably over the sections in file order.
    pub fn sections_mut(&mut self) -> impl Iterator<Item = &mut Section> {
        self.sections.iter_mut()
    }

    /// Returns the section called `name`.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.name == name)
    }

    /// Appends an empty `[name]` section unless one exists. Returns `true`
    /// when a section was added.
    pub fn ensure_section(&mut self, name: &str) -> bool {
        if self.section(name).is_some() {
            return false;
        }
        let line_end = if self.crlf { "\r" } else { "" };
        self.sections.push(Section::new(name, line_end));
        true
    }
}

#[derive(Default)]
struct Parser {
    preamble: Vec<String>,
    sections: Vec<Section>,
    pending: Vec<String>,
}

impl Parser {
    fn feed(&mut self, line: usize, raw: &str) -> Result<(), DocumentError> {
        let trimmed = raw.trim();
        let indented = raw.starts_with([' ', '\t']);

        if trimmed.is_empty() || (!indented && is_comment(trimmed)) {
            self.pending.push(raw.to_owned());
            return Ok(());
        }

        if indented {
            return self.continue_entry(line, raw, trimmed);
        }

        self.flush_pending();
        if let Some(name) = section_name(trimmed) {
            return self.open_section(line, raw, name);
        }
        self.push_entry(line, raw)
    }

    fn continue_entry(&mut self, line: usize, raw: &str, trimmed: &str) -> Result<(), DocumentError> {
        let open_entry = self
            .sections
            .last_mut()
            .and_then(|section| section.items.last_mut())
            .and_then(|item| match item {
                Item::Entry(entry) => Some(entry),
                Item::Trivia(_) => None,
            });

        if let Some(entry) = open_entry {
            entry.continuation.append(&mut self.pending);
            entry.continuation.push(raw.to_owned());
            return Ok(());
        }
        if is_comment(trimmed) {
            self.pending.push(raw.to_owned());
            return Ok(());
        }
        Err(DocumentError {
            line,
            message: String::from("continuation line without an option to continue"),
        })
    }

    fn open_section(&mut self, line: usize, raw: &str, name: &str) -> Result<(), DocumentError> {
        if name.is_empty() {
            return Err(DocumentError {
                line,
                message: String::from("empty section name"),
            });
        }
        if self.sections.iter().any(|section| section.name == name) {
            return Err(DocumentError {
                line,
                message: format!("duplicate section [{name}]"),
            });
        }
        self.sections.push(Section {
            name: name.to_owned(),
            header: raw.to_owned(),
            items: Vec::new(),
        });
        Ok(())
    }

    fn push_entry(&mut self, line: usize, raw: &str) -> Result<(), DocumentError> {
        let Some(separator) = raw.find(['=', ':']) else {
            return Err(DocumentError {
                line,
                message: String::from("expected a [section] header or a key = value option"),
            });
        };
        let (key_part, rest) = raw.split_at(separator);
        let key = key_part.trim();
        if key.is_empty() {
            return Err(DocumentError {
                line,
                message: String::from("option has an empty name"),
            });
        }
        let Some(section) = self.sections.last_mut() else {
            return Err(DocumentError {
                line,
                message: format!("option {key:?} appears before any [section] header"),
            });
        };

        let (separator_text, after) = rest.split_at(1);
        let value = after.trim_start();
        let (spacing, _) = after.split_at(after.len() - value.len());
        section.items.push(Item::Entry(Entry {
            key: key.to_owned(),
            head: format!("{key_part}{separator_text}{spacing}"),
            value: value.to_owned(),
            continuation: Vec::new(),
        }));
        Ok(())
    }

    fn flush_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        match self.sections.last_mut() {
            Some(section) => section
                .items
                .extend(pending.into_iter().map(Item::Trivia)),
            None => self.preamble.extend(pending),
        }
    }

    fn finish(mut self, trailing_newline: bool, crlf: bool) -> ToxDocument {
        self.flush_pending();
        ToxDocument {
            preamble: self.preamble,
            sections: self.sections,
            trailing_newline,
            crlf,
        }
    }
}

fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut lines: Vec<&str> = text.split('\n').collect();
    if text.ends_with('\n') {
        lines.pop();
    }
    lines
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with(['#', ';'])
}

/// Name inside a `[name]` header, which may be followed by a comment.
fn section_name(trimmed: &str) -> Option<&str> {
    let (name, rest) = trimmed.strip_prefix('[')?.split_once(']')?;
    let tail = rest.trim_start();
    (tail.is_empty() || is_comment(tail)).then_some(name.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SAMPLE: &str = "\
# project settings
[tox]
envlist = py3, pep8
skipsdist = True

[testenv]
usedevelop = True
deps =
    -r{toxinidir}/requirements.txt

    pytest>=7  # inline
commands =
    pip install -e .
    ; indented comment
    pytest {posargs:tests}
setenv: PYTHONHASHSEED=0

[testenv:pep8]
commands = flake8
";

    #[rstest]
    #[case(SAMPLE)]
    #[case("")]
    #[case("\n\n")]
    #[case("[a]\nkey=value")]
    #[case("; leading comment only\n")]
    #[case("[a]\r\nkey = value\r\n  more\r\n")]
    #[case("[a]\nx = 1\n\ty = 2\n")]
    #[case("[testenv]  # shared settings\nx = 1\n[b] ;note\n")]
    fn render_reproduces_input(#[case] text: &str) {
        let document = ToxDocument::parse(text).unwrap_or_else(|err| panic!("parse: {err}"));
        assert_eq!(document.render(), text);
    }

    #[test]
    fn parse_keeps_sections_and_options_in_order() {
        let document = ToxDocument::parse(SAMPLE).unwrap_or_else(|err| panic!("parse: {err}"));

        let names: Vec<&str> = document.sections().map(Section::name).collect();
        assert_eq!(names, ["tox", "testenv", "testenv:pep8"]);

        let testenv = document.section("testenv").expect("testenv section");
        let keys: Vec<&str> = testenv.entries().map(Entry::key).collect();
        assert_eq!(keys, ["usedevelop", "deps", "commands", "setenv"]);

        let deps: Vec<&str> = testenv.get("DEPS").expect("deps").value_lines().collect();
        assert_eq!(deps, ["-r{toxinidir}/requirements.txt", "pytest>=7  # inline"]);
    }

    #[rstest]
    #[case("key = value\n", 1, "before any [section]")]
    #[case("[a]\n[a]\n", 2, "duplicate section")]
    #[case("[a]\n  orphan\n", 2, "continuation line")]
    #[case("[a]\njust words\n", 2, "expected a [section] header")]
    #[case("[]\n", 1, "empty section name")]
    #[case("[a]\n= value\n", 2, "empty name")]
    #[case("[a] trailing\n", 1, "expected a [section] header")]
    fn parse_rejects_malformed_documents(
        #[case] text: &str,
        #[case] line: usize,
        #[case] fragment: &str,
    ) {
        let err = ToxDocument::parse(text).expect_err("document should be rejected");
        assert_eq!(err.line, line);
        assert!(err.message.contains(fragment), "message: {}", err.message);
    }

    #[test]
    fn set_replaces_existing_value_in_place() {
        let mut document = ToxDocument::parse("[a]\nsitepackages = false\nx = 1\n")
            .unwrap_or_else(|err| panic!("parse: {err}"));
        let section = document.sections_mut().next().expect("section");

        assert!(section.set("sitepackages", "True"));
        assert!(!section.set("sitepackages", "True"));
        assert_eq!(document.render(), "[a]\nsitepackages = True\nx = 1\n");
    }

    #[test]
    fn set_appends_before_trailing_trivia() {
        let mut document = ToxDocument::parse("[a]\nx = 1\n\n# next\n[b]\n")
            .unwrap_or_else(|err| panic!("parse: {err}"));
        for section in document.sections_mut() {
            section.set("sitepackages", "True");
        }
        assert_eq!(
            document.render(),
            "[a]\nx = 1\nsitepackages = True\n\n# next\n[b]\nsitepackages = True\n"
        );
    }

    #[test]
    fn remove_value_lines_drops_options_left_empty() {
        let mut document = ToxDocument::parse(
            "[a]\ninstall_command = pip install {opts}\nempty =\ncommands =\n    pip install .\n    pytest\n",
        )
        .unwrap_or_else(|err| panic!("parse: {err}"));
        let section = document.sections_mut().next().expect("section");

        let removed = section.remove_value_lines(|line| line.starts_with("pip install"));

        assert_eq!(removed, 2);
        assert_eq!(document.render(), "[a]\nempty =\ncommands =\n    pytest\n");
    }

    #[rstest]
    #[case("[testenv]  # shared settings\n", "testenv")]
    #[case("[testenv:pep8]\t; lint\n", "testenv:pep8")]
    #[case("[ tox ]#c\n", "tox")]
    fn parse_accepts_headers_with_trailing_comments(#[case] text: &str, #[case] name: &str) {
        let document = ToxDocument::parse(text).unwrap_or_else(|err| panic!("parse: {err}"));
        let names: Vec<&str> = document.sections().map(Section::name).collect();
        assert_eq!(names, [name]);
    }

    #[test]
    fn set_keeps_crlf_line_endings() {
        let mut document = ToxDocument::parse("[a]\r\nsitepackages = false\r\nx = 1\r\n[b]\r\ny = 2\r\n")
            .unwrap_or_else(|err| panic!("parse: {err}"));
        for section in document.sections_mut() {
            section.set("sitepackages", "True");
        }
        assert_eq!(
            document.render(),
            "[a]\r\nsitepackages = True\r\nx = 1\r\n[b]\r\ny = 2\r\nsitepackages = True\r\n"
        );
    }

    #[test]
    fn ensure_section_keeps_crlf_line_endings() {
        let mut document =
            ToxDocument::parse("[tox]\r\n").unwrap_or_else(|err| panic!("parse: {err}"));
        assert!(document.ensure_section("testenv"));
        for section in document.sections_mut() {
            section.set("sitepackages", "True");
        }
        assert_eq!(
            document.render(),
            "[tox]\r\nsitepackages = True\r\n[testenv]\r\nsitepackages = True\r\n"
        );
    }

    #[test]
    fn remove_value_lines_keeps_crlf_on_emptied_first_line() {
        let mut document = ToxDocument::parse("[a]\r\ndeps = foo\r\n    bar\r\n")
            .unwrap_or_else(|err| panic!("parse: {err}"));
        let section = document.sections_mut().next().expect("section");

        assert_eq!(section.remove_value_lines(|line| line == "foo"), 1);
        assert_eq!(document.render(), "[a]\r\ndeps =\r\n    bar\r\n");
    }

    #[test]
    fn ensure_section_appends_once() {
        let mut document =
            ToxDocument::parse("[tox]\n").unwrap_or_else(|err| panic!("parse: {err}"));
        assert!(document.ensure_section("testenv"));
        assert!(!document.ensure_section("testenv"));
        assert_eq!(document.render(), "[tox]\n[testenv]\n");
    }
}
