//! Tests for tunnel creation and reporting.

use super::super::*;
use crate::test_support::ScriptedRunner;
use rstest::rstest;

use super::fixtures::{base_config, connection};

fn forwarded_ports(runner: &ScriptedRunner) -> Vec<String> {
    runner
        .invocations()
        .iter()
        .filter_map(|call| {
            let args = call.arg_strings();
            let position = args.iter().position(|arg| arg == "-L")?;
            args.get(position + 1).cloned()
        })
        .collect()
}

#[rstest]
fn open_tunnels_forwards_notebook_and_shell(
    base_config: RemoteConfig,
    connection: ConnectionDetails,
) {
    let runner = ScriptedRunner::new();
    runner.push_success();
    runner.push_success();
    let shell = RemoteShell::new(base_config, runner.clone()).expect("config should validate");

    let report = shell.open_tunnels(&connection);

    assert!(report.all_open());
    assert_eq!(
        report.opened().map(|spec| spec.kind).collect::<Vec<_>>(),
        vec![TunnelKind::Notebook, TunnelKind::Shell]
    );
    assert_eq!(
        forwarded_ports(&runner),
        vec![
            String::from("8080:localhost:8888"),
            String::from("8022:localhost:22"),
        ]
    );
    assert!(runner.invocations().iter().all(|call| call.detached));
}

#[rstest]
fn failed_notebook_tunnel_still_attempts_shell(
    base_config: RemoteConfig,
    connection: ConnectionDetails,
) {
    let runner = ScriptedRunner::new();
    runner.push_output(
        Some(255),
        "",
        "bind [127.0.0.1]:8080: Address already in use",
    );
    runner.push_success();
    let shell = RemoteShell::new(base_config, runner.clone()).expect("config should validate");

    let report = shell.open_tunnels(&connection);

    assert!(!report.all_open());
    assert_eq!(runner.invocations().len(), 2);
    let failures: Vec<&TunnelError> = report.failures().collect();
    let [failure] = failures.as_slice() else {
        panic!("expected exactly one failure, got {failures:?}");
    };
    assert_eq!(failure.kind, TunnelKind::Notebook);
    assert_eq!(failure.local_port, 8080);
    assert!(
        failure.to_string().contains("notebook tunnel on local port 8080"),
        "{failure}"
    );
    assert_eq!(
        report.opened().map(|spec| spec.local_port).collect::<Vec<_>>(),
        vec![8022]
    );
}

#[rstest]
fn custom_local_ports_are_honoured(base_config: RemoteConfig, connection: ConnectionDetails) {
    let cfg = RemoteConfig {
        notebook_local_port: 9000,
        shell_local_port: 9022,
        ..base_config
    };
    let runner = ScriptedRunner::new();
    runner.push_success();
    runner.push_success();
    let shell = RemoteShell::new(cfg, runner.clone()).expect("config should validate");

    let report = shell.open_tunnels(&connection);

    assert!(report.all_open());
    assert_eq!(
        forwarded_ports(&runner),
        vec![
            String::from("9000:localhost:8888"),
            String::from("9022:localhost:22"),
        ]
    );
}

#[rstest]
fn tunnel_spec_constructors_pick_remote_ports(connection: ConnectionDetails) {
    assert_eq!(
        TunnelSpec::notebook(connection.clone(), 1).remote_port,
        NOTEBOOK_REMOTE_PORT
    );
    assert_eq!(TunnelSpec::shell(connection, 1).remote_port, SHELL_REMOTE_PORT);
}
