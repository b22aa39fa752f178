//! Tests for SSH argument construction and command execution.

use super::super::*;
use crate::test_support::{CommandInvocation, ScriptedRunner};
use rstest::rstest;

use super::fixtures::{base_config, connection};

fn shell(config: RemoteConfig, runner: &ScriptedRunner) -> RemoteShell<ScriptedRunner> {
    RemoteShell::new(config, runner.clone()).expect("config should validate")
}

#[rstest]
#[case::ssh_bin("ssh_bin")]
#[case::ssh_user("ssh_user")]
#[case::pip_bin("pip_bin")]
#[case::jupyter_bin("jupyter_bin")]
#[case::notebook_package("notebook_package")]
fn new_rejects_blank_fields(base_config: RemoteConfig, #[case] field: &str) {
    let mut cfg = base_config;
    let blank = String::from("   ");
    match field {
        "ssh_bin" => cfg.ssh_bin = blank,
        "ssh_user" => cfg.ssh_user = blank,
        "pip_bin" => cfg.pip_bin = blank,
        "jupyter_bin" => cfg.jupyter_bin = blank,
        _ => cfg.notebook_package = blank,
    }

    let err = RemoteShell::new(cfg, ScriptedRunner::new()).expect_err("blank field should fail");
    assert_eq!(
        err,
        RemoteExecError::InvalidConfig {
            field: field.to_owned()
        }
    );
}

#[rstest]
fn new_rejects_zero_local_port(base_config: RemoteConfig) {
    let cfg = RemoteConfig {
        shell_local_port: 0,
        ..base_config
    };

    let err = RemoteShell::new(cfg, ScriptedRunner::new()).expect_err("zero port should fail");
    assert!(
        err.to_string().contains("VASTBOOK_REMOTE_SHELL_LOCAL_PORT"),
        "error should name the env var: {err}"
    );
}

#[rstest]
fn execute_targets_endpoint_with_default_options(
    base_config: RemoteConfig,
    connection: ConnectionDetails,
) {
    let runner = ScriptedRunner::new();
    runner.push_stdout("ok\n");

    let output = shell(base_config, &runner)
        .execute(&connection, &RemoteCommand::new("nvidia-smi").arg("-L"))
        .expect("command should succeed");

    assert_eq!(output.stdout, "ok\n");
    let call = runner.invocations().first().cloned().expect("one invocation");
    assert_eq!(call.program, "ssh");
    assert!(!call.detached);
    assert_eq!(
        call.arg_strings(),
        vec![
            String::from("-p"),
            String::from("30522"),
            String::from("-o"),
            String::from("BatchMode=yes"),
            String::from("-o"),
            String::from("StrictHostKeyChecking=no"),
            String::from("-o"),
            String::from("UserKnownHostsFile=/dev/null"),
            String::from("root@ssh4.vast.ai"),
            String::from("nvidia-smi -L"),
        ]
    );
}

#[rstest]
fn execute_includes_identity_flag(base_config: RemoteConfig, connection: ConnectionDetails) {
    let cfg = RemoteConfig {
        ssh_identity_file: Some(String::from("/path/to/key")),
        ..base_config
    };
    let runner = ScriptedRunner::new();
    runner.push_success();

    shell(cfg, &runner)
        .execute(&connection, &RemoteCommand::new("true"))
        .expect("command should succeed");

    let args = runner
        .invocations()
        .first()
        .map(CommandInvocation::arg_strings)
        .unwrap_or_default();
    let position = args
        .iter()
        .position(|arg| arg == "-i")
        .expect("should include -i flag");
    assert_eq!(args.get(position + 1).map(String::as_str), Some("/path/to/key"));
}

#[rstest]
fn strict_host_checking_and_interactive_mode_drop_overrides(
    base_config: RemoteConfig,
    connection: ConnectionDetails,
) {
    let cfg = RemoteConfig {
        ssh_batch_mode: Some(false),
        ssh_strict_host_key_checking: Some(true),
        ssh_known_hosts_file: String::new(),
        ..base_config
    };
    let runner = ScriptedRunner::new();
    runner.push_success();

    shell(cfg, &runner)
        .execute(&connection, &RemoteCommand::new("true"))
        .expect("command should succeed");

    let call = runner.invocations().first().cloned().expect("one invocation");
    assert_eq!(call.command_string(), "ssh -p 30522 root@ssh4.vast.ai true");
}

#[rstest]
fn execute_reports_remote_failure(base_config: RemoteConfig, connection: ConnectionDetails) {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(127), "", "bash: pip: command not found");

    let err = shell(base_config, &runner)
        .execute(&connection, &RemoteCommand::new("pip").arg("install"))
        .expect_err("non-zero exit should fail");

    assert_eq!(
        err,
        RemoteExecError::CommandFailure {
            program: String::from("pip"),
            destination: String::from("ssh4.vast.ai:30522"),
            status: Some(127),
            status_text: String::from("127"),
            stderr: String::from("bash: pip: command not found"),
        }
    );
}

#[rstest]
fn execute_reports_missing_ssh_client(base_config: RemoteConfig, connection: ConnectionDetails) {
    let runner = ScriptedRunner::new();

    let err = shell(base_config, &runner)
        .execute(&connection, &RemoteCommand::new("true"))
        .expect_err("spawn should fail");

    assert!(matches!(err, RemoteExecError::Spawn(_)), "unexpected: {err}");
}

#[rstest]
fn spawn_detached_wraps_command_in_nohup(
    base_config: RemoteConfig,
    connection: ConnectionDetails,
) {
    let runner = ScriptedRunner::new();
    runner.push_success();

    shell(base_config, &runner)
        .spawn_detached(&connection, &RemoteCommand::new("sleep").arg("60"))
        .expect("launch should succeed");

    let args = runner
        .invocations()
        .first()
        .map(CommandInvocation::arg_strings)
        .unwrap_or_default();
    assert_eq!(args.first().map(String::as_str), Some("-n"));
    assert_eq!(
        args.last().map(String::as_str),
        Some("nohup sleep 60 > /dev/null 2>&1 < /dev/null &")
    );
}

#[rstest]
fn forward_runs_backgrounded_ssh_with_detached_streams(
    base_config: RemoteConfig,
    connection: ConnectionDetails,
) {
    let runner = ScriptedRunner::new();
    runner.push_success();

    shell(base_config, &runner)
        .forward(&connection, 8080, 8888)
        .expect("forward should succeed");

    let call = runner.invocations().first().cloned().expect("one invocation");
    assert!(call.detached, "forward must not capture output");
    let args = call.arg_strings();
    assert_eq!(
        args.get(..6),
        Some(
            &[
                String::from("-f"),
                String::from("-N"),
                String::from("-o"),
                String::from("ExitOnForwardFailure=yes"),
                String::from("-L"),
                String::from("8080:localhost:8888"),
            ][..]
        )
    );
    assert_eq!(args.last().map(String::as_str), Some("root@ssh4.vast.ai"));
}

#[rstest]
#[case::plain(RemoteCommand::new("echo").arg("hello"), "echo hello")]
#[case::spaces(RemoteCommand::new("echo").arg("hello world"), "echo 'hello world'")]
#[case::quote(RemoteCommand::new("echo").arg("it's"), r"echo 'it'\''s'")]
#[case::metachar(RemoteCommand::new("echo").arg("a;rm"), "echo 'a;rm'")]
fn render_escapes_each_argument(#[case] command: RemoteCommand, #[case] expected: &str) {
    assert_eq!(command.render(), expected);
}
