//! Shared fixtures for sync module tests.

use super::super::*;
use crate::config::ResolvedConfig;
use rstest::fixture;

#[fixture]
pub fn base_config() -> SyncConfig {
    SyncConfig {
        rsync_bin: String::from("rsync"),
        ssh_bin: String::from("ssh"),
        git_bin: String::from("git"),
        remote_base: String::from(DEFAULT_REMOTE_BASE),
        remote_python: String::from("python"),
        remote_untox_bin: String::from("untox"),
        preflight: None,
        ssh_forward_agent: None,
        ssh_batch_mode: None,
        ssh_identity_file: None,
    }
}

#[fixture]
pub fn remote() -> ResolvedConfig {
    ResolvedConfig {
        user: Some(String::from("tester")),
        hostname: String::from("build.example"),
        port: 2222,
        options: vec![(String::from("ServerAliveInterval"), String::from("30"))],
        source: Utf8PathBuf::from("/home/tester/.rtox.cfg"),
    }
}

pub fn args_as_strings(args: &[std::ffi::OsString]) -> Vec<String> {
    args.iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}
