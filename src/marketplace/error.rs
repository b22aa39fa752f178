//! Error types for the marketplace client.

use thiserror::Error;

use crate::command::SpawnError;

/// Errors raised while talking to the marketplace control plane.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum MarketplaceError {
    /// Raised when the client configuration is missing required values.
    #[error("missing {field}: set VASTBOOK_{env_suffix} or add {field} to vastbook.toml", env_suffix = field.to_uppercase())]
    InvalidConfig {
        /// Name of the missing or invalid field.
        field: String,
    },
    /// Raised when the marketplace CLI returns a non-zero exit status.
    #[error("{program} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Program that failed (typically `vastai`).
        program: String,
        /// Exit status reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the command.
        stderr: String,
    },
    /// Raised when structured output cannot be parsed.
    #[error("failed to parse {resource} output: {message}")]
    Parse {
        /// Resource being parsed (for example `offers`).
        resource: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when the marketplace refuses to create the instance.
    #[error("marketplace rejected rental of offer {offer_id}: {payload}")]
    Rejected {
        /// Offer whose rental was refused.
        offer_id: u64,
        /// Raw response returned by the marketplace.
        payload: String,
    },
    /// Raised when a successful creation response omits the contract id.
    #[error("creation of offer {offer_id} reported success without a contract id: {payload}")]
    MissingContract {
        /// Offer that was rented.
        offer_id: u64,
        /// Raw response returned by the marketplace.
        payload: String,
    },
    /// Raised when the marketplace CLI cannot be started.
    #[error(transparent)]
    Runner(#[from] SpawnError),
}
