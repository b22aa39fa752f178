//! Local port forwards to the notebook server and the instance's SSH daemon.

use std::fmt;

use thiserror::Error;

use crate::backend::ConnectionDetails;
use crate::command::CommandRunner;

use super::{NOTEBOOK_REMOTE_PORT, RemoteExecError, RemoteShell};

/// Port the instance's SSH daemon listens on.
pub const SHELL_REMOTE_PORT: u16 = 22;

/// Which service a tunnel exposes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TunnelKind {
    /// The notebook web server.
    Notebook,
    /// The instance's own SSH daemon.
    Shell,
}

impl fmt::Display for TunnelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notebook => f.write_str("notebook"),
            Self::Shell => f.write_str("shell"),
        }
    }
}

/// A single local-to-remote forward through an SSH endpoint.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TunnelSpec {
    /// Service exposed by the tunnel.
    pub kind: TunnelKind,
    /// Port bound on this machine.
    pub local_port: u16,
    /// Port on the instance the traffic is delivered to.
    pub remote_port: u16,
    /// SSH endpoint carrying the forward.
    pub connection: ConnectionDetails,
}

impl TunnelSpec {
    /// Forward from `local_port` to the notebook server.
    #[must_use]
    pub const fn notebook(connection: ConnectionDetails, local_port: u16) -> Self {
        Self {
            kind: TunnelKind::Notebook,
            local_port,
            remote_port: NOTEBOOK_REMOTE_PORT,
            connection,
        }
    }

    /// Forward from `local_port` to the instance's SSH daemon.
    #[must_use]
    pub const fn shell(connection: ConnectionDetails, local_port: u16) -> Self {
        Self {
            kind: TunnelKind::Shell,
            local_port,
            remote_port: SHELL_REMOTE_PORT,
            connection,
        }
    }
}

/// A tunnel that could not be opened.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("failed to open {kind} tunnel on local port {local_port}: {source}")]
pub struct TunnelError {
    /// Service the tunnel would have exposed.
    pub kind: TunnelKind,
    /// Local port that was requested.
    pub local_port: u16,
    /// Underlying SSH failure.
    #[source]
    pub source: RemoteExecError,
}

/// Result of attempting one tunnel.
pub type TunnelOutcome = Result<TunnelSpec, TunnelError>;

/// Outcomes of every tunnel attempted for an instance, in request order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TunnelReport {
    /// One entry per requested tunnel.
    pub outcomes: Vec<TunnelOutcome>,
}

impl TunnelReport {
    /// Returns `true` when every tunnel opened.
    #[must_use]
    pub fn all_open(&self) -> bool {
        self.outcomes.iter().all(Result::is_ok)
    }

    /// Iterates over the tunnels that failed.
    pub fn failures(&self) -> impl Iterator<Item = &TunnelError> {
        self.outcomes.iter().filter_map(|outcome| outcome.as_ref().err())
    }

    /// Iterates over the tunnels that opened.
    pub fn opened(&self) -> impl Iterator<Item = &TunnelSpec> {
        self.outcomes.iter().filter_map(|outcome| outcome.as_ref().ok())
    }
}

impl<R: CommandRunner> RemoteShell<R> {
    /// Opens one forward and leaves it running in the background.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError`] when the forwarding `ssh` process fails to
    /// start or exits before backgrounding.
    pub fn open_tunnel(&self, spec: TunnelSpec) -> TunnelOutcome {
        match self.forward(&spec.connection, spec.local_port, spec.remote_port) {
            Ok(()) => {
                tracing::info!(
                    kind = %spec.kind,
                    local_port = spec.local_port,
                    remote_port = spec.remote_port,
                    "tunnel open"
                );
                Ok(spec)
            }
            Err(source) => {
                tracing::warn!(
                    kind = %spec.kind,
                    local_port = spec.local_port,
                    error = %source,
                    "tunnel failed"
                );
                Err(TunnelError {
                    kind: spec.kind,
                    local_port: spec.local_port,
                    source,
                })
            }
        }
    }

    /// Opens the notebook and shell forwards for `connection` using the
    /// configured local ports. A failure of one does not prevent the other
    /// from being attempted.
    #[must_use]
    pub fn open_tunnels(&self, connection: &ConnectionDetails) -> TunnelReport {
        let specs = [
            TunnelSpec::notebook(connection.clone(), self.config.notebook_local_port),
            TunnelSpec::shell(connection.clone(), self.config.shell_local_port),
        ];
        TunnelReport {
            outcomes: specs.into_iter().map(|spec| self.open_tunnel(spec)).collect(),
        }
    }
}
