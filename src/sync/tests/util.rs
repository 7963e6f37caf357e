//! Tests for `~/` expansion of local key paths.

use super::super::*;
use rstest::rstest;

#[test]
fn expand_tilde_joins_home_directory() {
    let home = dirs::home_dir().expect("home directory should be known");
    assert_eq!(
        expand_tilde("~/.ssh/id_ed25519"),
        home.join(".ssh/id_ed25519").to_string_lossy()
    );
}

#[rstest]
#[case("/absolute/path/to/key")]
#[case("relative/path/to/key")]
#[case("~")]
#[case("~other/.ssh/key")]
fn expand_tilde_leaves_other_paths_unchanged(#[case] path: &str) {
    assert_eq!(expand_tilde(path), path);
}
