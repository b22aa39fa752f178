//! SSH, bootstrap, and tunnel settings.
//!
//! [`RemoteConfig`] is loaded via `ortho-config`, which merges defaults,
//! configuration files, and environment variables.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::command::SpawnError;

/// Remote user the marketplace images accept SSH logins for.
pub const DEFAULT_SSH_USER: &str = "root";

/// Local port forwarded to the notebook server.
pub const DEFAULT_NOTEBOOK_LOCAL_PORT: u16 = 8080;

/// Local port forwarded to the instance's SSH daemon.
pub const DEFAULT_SHELL_LOCAL_PORT: u16 = 8022;

/// Remote access settings loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "VASTBOOK_REMOTE",
    discovery(
        app_name = "vastbook",
        env_var = "VASTBOOK_CONFIG_PATH",
        config_file_name = "vastbook.toml",
        dotfile_name = ".vastbook.toml",
        project_file_name = "vastbook.toml"
    )
)]
pub struct RemoteConfig {
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Remote user to connect as.
    #[ortho_config(default = DEFAULT_SSH_USER.to_owned())]
    pub ssh_user: String,
    /// Whether to force batch mode for SSH to avoid password prompts.
    /// Unset means on; see [`RemoteConfig::batch_mode`].
    pub ssh_batch_mode: Option<bool>,
    /// Whether to enforce host key checking. Unset means off, since rented
    /// hosts are ephemeral; see [`RemoteConfig::strict_host_key_checking`].
    pub ssh_strict_host_key_checking: Option<bool>,
    /// Known hosts file override; defaults to `/dev/null`.
    #[ortho_config(default = "/dev/null".to_owned())]
    pub ssh_known_hosts_file: String,
    /// Private key used for authentication. Supports `~/` expansion. When
    /// absent SSH uses its default key locations.
    pub ssh_identity_file: Option<String>,
    /// `pip` executable inside the remote image.
    #[ortho_config(default = "/opt/conda/bin/pip".to_owned())]
    pub pip_bin: String,
    /// `jupyter` executable inside the remote image.
    #[ortho_config(default = "/opt/conda/bin/jupyter".to_owned())]
    pub jupyter_bin: String,
    /// Package installed to provide the notebook server.
    #[ortho_config(default = "jupyter".to_owned())]
    pub notebook_package: String,
    /// Local port forwarded to the remote notebook server.
    #[ortho_config(default = DEFAULT_NOTEBOOK_LOCAL_PORT)]
    pub notebook_local_port: u16,
    /// Local port forwarded to the remote SSH daemon.
    #[ortho_config(default = DEFAULT_SHELL_LOCAL_PORT)]
    pub shell_local_port: u16,
}

/// Errors raised when loading the remote configuration from layered sources.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum RemoteConfigLoadError {
    /// Indicates that parsing or merging configuration layers failed.
    #[error("remote configuration parsing failed: {0}")]
    Parse(String),
}

impl RemoteConfig {
    /// Resolved batch mode setting; on unless explicitly disabled.
    #[must_use]
    pub const fn batch_mode(&self) -> bool {
        matches!(self.ssh_batch_mode, None | Some(true))
    }

    /// Resolved host key checking setting; off unless explicitly enabled.
    #[must_use]
    pub const fn strict_host_key_checking(&self) -> bool {
        matches!(self.ssh_strict_host_key_checking, Some(true))
    }

    /// Ensures configuration values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteExecError::InvalidConfig`] when any required field is
    /// empty or a port is zero.
    pub fn validate(&self) -> Result<(), RemoteExecError> {
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_value(&self.ssh_user, "ssh_user")?;
        Self::require_optional_value(self.ssh_identity_file.as_deref(), "ssh_identity_file")?;
        Self::require_value(&self.pip_bin, "pip_bin")?;
        Self::require_value(&self.jupyter_bin, "jupyter_bin")?;
        Self::require_value(&self.notebook_package, "notebook_package")?;
        Self::require_port(self.notebook_local_port, "notebook_local_port")?;
        Self::require_port(self.shell_local_port, "shell_local_port")?;
        Ok(())
    }

    /// Loads configuration using defaults, configuration files, and
    /// environment variables without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteConfigLoadError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, RemoteConfigLoadError> {
        Self::load_from_iter([std::ffi::OsString::from("vastbook")])
            .map_err(|err| RemoteConfigLoadError::Parse(err.to_string()))
    }

    fn require_optional_value(value: Option<&str>, field: &str) -> Result<(), RemoteExecError> {
        match value {
            None => Ok(()),
            Some(v) if !v.trim().is_empty() => Ok(()),
            Some(_) => Err(RemoteExecError::InvalidConfig {
                field: field.to_owned(),
            }),
        }
    }

    fn require_value(value: &str, field: &str) -> Result<(), RemoteExecError> {
        Self::require_optional_value(Some(value), field)
    }

    fn require_port(value: u16, field: &str) -> Result<(), RemoteExecError> {
        if value == 0 {
            return Err(RemoteExecError::InvalidConfig {
                field: field.to_owned(),
            });
        }
        Ok(())
    }
}

/// Errors surfaced while running commands on the remote host.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RemoteExecError {
    /// Raised when configuration is missing required values.
    #[error("missing {field}: set VASTBOOK_REMOTE_{env_suffix} or add {field} to vastbook.toml", env_suffix = field.to_uppercase())]
    InvalidConfig {
        /// Configuration field that failed validation.
        field: String,
    },
    /// Raised when the local `ssh` client cannot be started.
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    /// Raised when `ssh` or the remote command exits non-zero.
    #[error("{program} on {destination} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Program that was run remotely (or `ssh` for tunnels).
        program: String,
        /// `host:port` of the SSH endpoint.
        destination: String,
        /// Exit status as reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the process.
        stderr: String,
    },
}
