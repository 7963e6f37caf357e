//! Tests for SSH option construction.

use super::super::*;
use crate::config::ResolvedConfig;
use crate::test_support::ScriptedRunner;
use rstest::rstest;

use super::fixtures::{args_as_strings, base_config, remote};

fn ssh_args(cfg: SyncConfig, remote: &ResolvedConfig) -> Vec<String> {
    let syncer = Syncer::new(cfg, ScriptedRunner::new()).expect("config should validate");
    args_as_strings(&syncer.build_ssh_args(remote, "echo ok"))
}

#[rstest]
fn build_ssh_args_orders_options_before_destination(
    base_config: SyncConfig,
    remote: ResolvedConfig,
) {
    let args = ssh_args(base_config, &remote);
    assert_eq!(
        args,
        [
            "-p",
            "2222",
            "-A",
            "-o",
            "ServerAliveInterval=30",
            "tester@build.example",
            "echo ok",
        ]
    );
}

#[rstest]
fn build_ssh_args_omits_user_when_not_configured(
    base_config: SyncConfig,
    remote: ResolvedConfig,
) {
    let anonymous = ResolvedConfig {
        user: None,
        ..remote
    };
    let args = ssh_args(base_config, &anonymous);
    assert!(args.contains(&String::from("build.example")));
}

#[rstest]
fn build_ssh_args_applies_tool_settings(base_config: SyncConfig, remote: ResolvedConfig) {
    let cfg = SyncConfig {
        ssh_forward_agent: Some(false),
        ssh_batch_mode: Some(true),
        ssh_identity_file: Some(String::from("/path/to/key")),
        ..base_config
    };
    let args = ssh_args(cfg, &remote);

    assert!(!args.contains(&String::from("-A")), "agent forwarding off: {args:?}");
    assert!(args.contains(&String::from("BatchMode=yes")));
    let identity = args
        .iter()
        .position(|arg| arg == "-i")
        .and_then(|index| args.get(index + 1));
    assert_eq!(identity.map(String::as_str), Some("/path/to/key"));
}

#[rstest]
fn rsync_remote_shell_quotes_option_values(base_config: SyncConfig, remote: ResolvedConfig) {
    let with_spaces = ResolvedConfig {
        options: vec![(String::from("ProxyCommand"), String::from("ssh -W %h:%p jump"))],
        ..remote
    };
    let syncer = Syncer::new(base_config, ScriptedRunner::new()).expect("config should validate");
    let shell = syncer.build_remote_shell(with_spaces.port, &with_spaces.options);
    assert_eq!(shell, "ssh -p 2222 -A -o 'ProxyCommand=ssh -W %h:%p jump'");
}
