//! Tests for rewriting projects in place.

use super::*;
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct Project {
    _tmp: TempDir,
    root: Utf8PathBuf,
}

impl Project {
    fn write(&self, name: &str, contents: &str) {
        let path = self.root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(path, contents).expect("write file");
    }

    fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.root.join(name)).expect("read file")
    }

    fn exists(&self, name: &str) -> bool {
        self.root.join(name).exists()
    }
}

#[fixture]
fn project() -> Project {
    let tmp = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf8 temp path");
    Project { _tmp: tmp, root }
}

#[fixture]
fn untoxer() -> Untoxer {
    Untoxer::new(RewriteRules::defaults().expect("default rules"))
}

fn rewrite_text(untoxer: &Untoxer, text: &str) -> (String, DocumentChanges) {
    let mut document = ToxDocument::parse(text).expect("parse");
    let changes = untoxer.rewrite_document(&mut document);
    (document.render(), changes)
}

#[rstest]
fn deps_only_testenv_becomes_sitepackages(untoxer: Untoxer) {
    let (text, changes) = rewrite_text(&untoxer, "[testenv]\ndeps = foo\n");

    assert_eq!(text, "[testenv]\nsitepackages = True\n");
    assert_eq!(changes.removed_deps, ["testenv"]);
    assert_eq!(changes.sitepackages_set, ["testenv"]);
    assert!(!changes.added_testenv);
}

#[rstest]
fn commented_testenv_header_is_not_duplicated(untoxer: Untoxer) {
    let (text, changes) = rewrite_text(&untoxer, "[testenv]  # shared\ndeps = foo\n");

    assert_eq!(text, "[testenv]  # shared\nsitepackages = True\n");
    assert!(!changes.added_testenv);
    assert!(ToxDocument::parse(&text).is_ok(), "output should parse again");
}

#[rstest]
fn crlf_document_stays_crlf(untoxer: Untoxer) {
    let (text, changes) = rewrite_text(&untoxer, "[tox]\r\nenvlist = py3\r\n");

    assert_eq!(
        text,
        "[tox]\r\nenvlist = py3\r\nsitepackages = True\r\n[testenv]\r\nsitepackages = True\r\n"
    );
    assert!(changes.added_testenv);
}

#[rstest]
fn rewrite_preserves_unrelated_content(untoxer: Untoxer) {
    let input = "\
# keep me
[tox]
envlist = py3,pep8
minversion = 3.18

[testenv]
usedevelop = True
install_command = pip install {opts} {packages}
setenv =
    VIRTUAL_ENV={envdir}
deps = -r{toxinidir}/requirements.txt
       -r{toxinidir}/test-requirements.txt
commands =
    - pip install -U pip
    stestr run {posargs}

[testenv:pep8]
sitepackages = False
commands = flake8
";
    let expected = "\
# keep me
[tox]
envlist = py3,pep8
minversion = 3.18
sitepackages = True

[testenv]
usedevelop = True
setenv =
    VIRTUAL_ENV={envdir}
commands =
    stestr run {posargs}
sitepackages = True

[testenv:pep8]
sitepackages = True
commands = flake8
";

    let (text, changes) = rewrite_text(&untoxer, input);

    assert_eq!(text, expected);
    assert_eq!(changes.removed_install_lines, 2);
    assert_eq!(
        changes.requirement_files,
        ["requirements.txt", "test-requirements.txt"]
    );
    assert_eq!(changes.sitepackages_set, ["tox", "testenv", "testenv:pep8"]);
}

#[rstest]
fn rewrite_appends_missing_testenv(untoxer: Untoxer) {
    let (text, changes) = rewrite_text(&untoxer, "[tox]\nenvlist = py3\n\n[testenv:lint]\nDeps = flake8\n");

    assert_eq!(
        text,
        "[tox]\nenvlist = py3\nsitepackages = True\n\n[testenv:lint]\nsitepackages = True\n[testenv]\nsitepackages = True\n"
    );
    assert!(changes.added_testenv);
    assert_eq!(changes.removed_deps, ["testenv:lint"]);
}

#[rstest]
#[case("[testenv]\ndeps = foo\n")]
#[case("[tox]\nenvlist = py3")]
#[case("")]
#[case("[testenv]\ncommands =\n    pip install .\n\n    pytest\n# tail\n")]
fn rewriting_twice_is_byte_identical(untoxer: Untoxer, #[case] input: &str) {
    let (once, _) = rewrite_text(&untoxer, input);
    let (twice, changes) = rewrite_text(&untoxer, &once);

    assert_eq!(once, twice);
    assert_eq!(changes, DocumentChanges::default());
}

#[rstest]
fn rewrite_updates_files_and_truncates_manifests(project: Project, untoxer: Untoxer) {
    project.write(
        TOX_INI,
        "[testenv]\ndeps =\n    -rdev-requirements.txt\n    --requirement=../outside.txt\ncommands = pytest\n",
    );
    project.write("requirements.txt", "foo==1.0\nbar\n");
    project.write("dev-requirements.txt", "pytest\n");
    project.write("docs/requirements.txt", "sphinx\n");

    let report = untoxer.rewrite(&project.root).expect("rewrite succeeds");

    assert!(report.document_changed);
    assert_eq!(
        project.read(TOX_INI),
        "[testenv]\ncommands = pytest\nsitepackages = True\n"
    );
    assert!(project.exists("requirements.txt"));
    assert_eq!(project.read("requirements.txt"), "");
    assert_eq!(project.read("dev-requirements.txt"), "");
    assert_eq!(project.read("docs/requirements.txt"), "sphinx\n");
    assert!(
        !project.exists("test-requirements.txt"),
        "missing manifests must not be created"
    );
    assert_eq!(
        report.truncated,
        [
            project.root.join("requirements.txt"),
            project.root.join("dev-requirements.txt"),
        ]
    );
}

#[rstest]
fn second_rewrite_leaves_document_untouched(project: Project, untoxer: Untoxer) {
    project.write(TOX_INI, "[tox]\nenvlist = py3\n\n[testenv]\ndeps = six\n");
    project.write("test-requirements.txt", "mock\n");

    untoxer.rewrite(&project.root).expect("first rewrite");
    let first = project.read(TOX_INI);
    let report = untoxer.rewrite(&project.root).expect("second rewrite");

    assert!(!report.document_changed);
    assert_eq!(project.read(TOX_INI), first);
    assert_eq!(project.read("test-requirements.txt"), "");
}

#[rstest]
fn rewrite_requires_tox_ini(project: Project, untoxer: Untoxer) {
    project.write("requirements.txt", "foo\n");

    let err = untoxer
        .rewrite(&project.root)
        .expect_err("missing tox.ini should fail");

    assert_eq!(
        err,
        UntoxError::MissingDocument {
            path: project.root.join(TOX_INI)
        }
    );
    assert_eq!(project.read("requirements.txt"), "foo\n", "nothing is touched");
}

#[rstest]
fn rewrite_reports_parse_errors_without_writing(project: Project, untoxer: Untoxer) {
    let broken = "[testenv]\ndeps = foo\nnot an option\n";
    project.write(TOX_INI, broken);
    project.write("requirements.txt", "foo\n");

    let err = untoxer
        .rewrite(&project.root)
        .expect_err("malformed tox.ini should fail");

    let UntoxError::Parse { path, line, .. } = err else {
        panic!("expected Parse, got {err:?}");
    };
    assert_eq!(path, project.root.join(TOX_INI));
    assert_eq!(line, 3);
    assert_eq!(project.read(TOX_INI), broken);
    assert_eq!(project.read("requirements.txt"), "foo\n");
}
