//! Installs and launches the notebook server on a freshly rented instance.

use crate::backend::ConnectionDetails;
use crate::command::CommandRunner;

use super::{RemoteCommand, RemoteExecError, RemoteShell};

/// Port the notebook server listens on inside the instance.
pub const NOTEBOOK_REMOTE_PORT: u16 = 8888;

impl<R: CommandRunner> RemoteShell<R> {
    /// Command that installs the notebook package with the image's `pip`.
    #[must_use]
    pub fn install_notebook_command(&self) -> RemoteCommand {
        RemoteCommand::new(self.config.pip_bin.as_str())
            .arg("install")
            .arg(self.config.notebook_package.as_str())
    }

    /// Command that serves notebooks on the loopback interface only; the
    /// server is reached through the forwarded port.
    #[must_use]
    pub fn start_notebook_command(&self) -> RemoteCommand {
        RemoteCommand::new(self.config.jupyter_bin.as_str()).args([
            String::from("notebook"),
            String::from("--ip=127.0.0.1"),
            format!("--port={NOTEBOOK_REMOTE_PORT}"),
            String::from("--allow-root"),
            String::from("--no-browser"),
        ])
    }

    /// Installs the notebook package and waits for the installer to finish.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteExecError`] when SSH fails or the installer exits
    /// non-zero.
    pub fn install_notebook_service(
        &self,
        connection: &ConnectionDetails,
    ) -> Result<(), RemoteExecError> {
        let command = self.install_notebook_command();
        tracing::info!(
            host = %connection.ssh_host,
            port = connection.ssh_port,
            package = %self.config.notebook_package,
            "installing notebook server"
        );
        self.execute(connection, &command).map(|_| ())
    }

    /// Starts the notebook server detached from the SSH session and returns
    /// as soon as it has been launched.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteExecError`] when the launch cannot be dispatched.
    pub fn start_notebook_service(
        &self,
        connection: &ConnectionDetails,
    ) -> Result<(), RemoteExecError> {
        let command = self.start_notebook_command();
        tracing::info!(
            host = %connection.ssh_host,
            port = NOTEBOOK_REMOTE_PORT,
            "starting notebook server"
        );
        self.spawn_detached(connection, &command)
    }
}
