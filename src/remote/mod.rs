//! Remote command execution and port forwarding over the system `ssh` client.
//!
//! Commands are passed around as structured argument lists
//! ([`RemoteCommand`]) and shell-escaped in exactly one place before they are
//! handed to `ssh`, which runs them through the remote login shell.

use std::ffi::OsString;

use shell_escape::unix::escape;

use crate::backend::ConnectionDetails;
use crate::command::{CommandOutput, CommandRunner, ProcessCommandRunner};

mod bootstrap;
mod config;
mod tunnel;
mod util;

pub use bootstrap::NOTEBOOK_REMOTE_PORT;
pub use config::{
    DEFAULT_NOTEBOOK_LOCAL_PORT, DEFAULT_SHELL_LOCAL_PORT, DEFAULT_SSH_USER, RemoteConfig,
    RemoteConfigLoadError, RemoteExecError,
};
pub use tunnel::{
    SHELL_REMOTE_PORT, TunnelError, TunnelKind, TunnelOutcome, TunnelReport, TunnelSpec,
};
pub use util::expand_tilde;

/// A program and its arguments to run on the remote host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteCommand {
    program: String,
    args: Vec<String>,
}

impl RemoteCommand {
    /// Starts a command for `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    /// Returns the program name.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Renders the command as a shell-escaped string.
    #[must_use]
    pub fn render(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| escape(part.as_str().into()).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Renders the command so it keeps running after the SSH session that
    /// started it closes: standard streams are detached from the session and
    /// the process is ignored by the hangup signal.
    #[must_use]
    pub fn render_detached(&self) -> String {
        format!("nohup {} > /dev/null 2>&1 < /dev/null &", self.render())
    }
}

/// Runs commands and opens forwards on a remote host over SSH.
#[derive(Clone, Debug)]
pub struct RemoteShell<R: CommandRunner> {
    config: RemoteConfig,
    runner: R,
}

impl RemoteShell<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteExecError::InvalidConfig`] when validation fails.
    pub fn with_process_runner(config: RemoteConfig) -> Result<Self, RemoteExecError> {
        Self::new(config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> RemoteShell<R> {
    /// Creates a new shell using the provided runner and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteExecError::InvalidConfig`] when configuration
    /// validation fails.
    pub fn new(config: RemoteConfig, runner: R) -> Result<Self, RemoteExecError> {
        config.validate()?;
        Ok(Self { config, runner })
    }

    /// Runs `command` on the remote host and waits for it to finish.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteExecError::Spawn`] when `ssh` cannot be started and
    /// [`RemoteExecError::CommandFailure`] when the connection or the remote
    /// command exits non-zero.
    pub fn execute(
        &self,
        connection: &ConnectionDetails,
        command: &RemoteCommand,
    ) -> Result<CommandOutput, RemoteExecError> {
        let args = self.build_ssh_args(connection, &[], command.render());
        let output = self.runner.run(&self.config.ssh_bin, &args)?;
        Self::check(output, command.program(), connection)
    }

    /// Launches `command` on the remote host so that it outlives the SSH
    /// session, returning once the launch has been dispatched.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteExecError`] when the launch itself fails; whether the
    /// launched process keeps running is not checked.
    pub fn spawn_detached(
        &self,
        connection: &ConnectionDetails,
        command: &RemoteCommand,
    ) -> Result<(), RemoteExecError> {
        let args = self.build_ssh_args(connection, &["-n"], command.render_detached());
        let output = self.runner.run(&self.config.ssh_bin, &args)?;
        Self::check(output, command.program(), connection).map(|_| ())
    }

    /// Forwards `local_port` on this machine to `remote_port` on the remote
    /// host through a backgrounded `ssh` process that is left running.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteExecError`] when `ssh` cannot start or exits non-zero
    /// before backgrounding, for example because the local port is taken.
    pub fn forward(
        &self,
        connection: &ConnectionDetails,
        local_port: u16,
        remote_port: u16,
    ) -> Result<(), RemoteExecError> {
        let args = self.build_forward_args(connection, local_port, remote_port);
        let output = self.runner.run_detached(&self.config.ssh_bin, &args)?;
        Self::check(output, &self.config.ssh_bin, connection).map(|_| ())
    }

    fn check(
        output: CommandOutput,
        program: &str,
        connection: &ConnectionDetails,
    ) -> Result<CommandOutput, RemoteExecError> {
        if output.is_success() {
            return Ok(output);
        }

        Err(RemoteExecError::CommandFailure {
            program: program.to_owned(),
            destination: format!("{}:{}", connection.ssh_host, connection.ssh_port),
            status: output.code,
            status_text: output.status_text(),
            stderr: output.stderr,
        })
    }

    fn destination(&self, connection: &ConnectionDetails) -> OsString {
        OsString::from(format!("{}@{}", self.config.ssh_user, connection.ssh_host))
    }

    fn build_ssh_args(
        &self,
        connection: &ConnectionDetails,
        extra_flags: &[&str],
        remote_command: String,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = extra_flags.iter().map(OsString::from).collect();
        args.extend(self.common_ssh_options(connection.ssh_port));
        args.push(self.destination(connection));
        args.push(OsString::from(remote_command));
        args
    }

    fn build_forward_args(
        &self,
        connection: &ConnectionDetails,
        local_port: u16,
        remote_port: u16,
    ) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-f"),
            OsString::from("-N"),
            OsString::from("-o"),
            OsString::from("ExitOnForwardFailure=yes"),
            OsString::from("-L"),
            OsString::from(format!("{local_port}:localhost:{remote_port}")),
        ];
        args.extend(self.common_ssh_options(connection.ssh_port));
        args.push(self.destination(connection));
        args
    }

    fn common_ssh_options(&self, port: u16) -> Vec<OsString> {
        let mut args = vec![OsString::from("-p"), OsString::from(port.to_string())];

        if let Some(ref identity_file) = self.config.ssh_identity_file {
            let expanded = expand_tilde(identity_file);
            args.push(OsString::from("-i"));
            args.push(OsString::from(expanded));
        }

        if self.config.batch_mode() {
            args.push(OsString::from("-o"));
            args.push(OsString::from("BatchMode=yes"));
        }

        if !self.config.strict_host_key_checking() {
            args.push(OsString::from("-o"));
            args.push(OsString::from("StrictHostKeyChecking=no"));
        }

        if !self.config.ssh_known_hosts_file.trim().is_empty() {
            args.push(OsString::from("-o"));
            args.push(OsString::from(format!(
                "UserKnownHostsFile={}",
                self.config.ssh_known_hosts_file
            )));
        }

        args
    }
}

#[cfg(test)]
mod tests;
