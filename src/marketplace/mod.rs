//! Marketplace client that shells out to the `vastai` command-line tool.
//!
//! Every request runs `vastai` with `--raw` so the response is JSON. Offer
//! search and instance listing return arrays of records; instance creation
//! returns an object carrying a `success` flag and, on success, the new
//! contract identifier.

mod error;
mod query;
mod types;

use std::ffi::OsString;

use serde::de::DeserializeOwned;

use crate::backend::{ControlPlane, InstanceHandle, InstanceStatus, ProvisionRequest};
use crate::command::{CommandOutput, CommandRunner, ProcessCommandRunner};
use crate::offer::{Offer, SearchCriteria};

pub use error::MarketplaceError;
use query::render_query;
use types::{RawCreateResponse, RawInstance, RawOffer};

/// Default marketplace CLI binary name.
pub const DEFAULT_VAST_BIN: &str = "vastai";

/// Settings for invoking the marketplace CLI.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VastCliConfig {
    /// Path to the `vastai` binary.
    pub vast_bin: String,
    /// API key forwarded with `--api-key`; when absent the CLI falls back to
    /// its own stored key.
    pub api_key: Option<String>,
}

impl VastCliConfig {
    /// Constructs a config, trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceError::InvalidConfig`] when the binary is blank or
    /// an API key is supplied but blank.
    pub fn new(
        vast_bin: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, MarketplaceError> {
        let trimmed_bin = vast_bin.into().trim().to_owned();
        if trimmed_bin.is_empty() {
            return Err(MarketplaceError::InvalidConfig {
                field: String::from("vast_bin"),
            });
        }
        let trimmed_key = match api_key {
            None => None,
            Some(key) if key.trim().is_empty() => {
                return Err(MarketplaceError::InvalidConfig {
                    field: String::from("api_key"),
                });
            }
            Some(key) => Some(key.trim().to_owned()),
        };
        Ok(Self {
            vast_bin: trimmed_bin,
            api_key: trimmed_key,
        })
    }
}

/// [`ControlPlane`] implementation backed by the `vastai` CLI.
#[derive(Clone, Debug)]
pub struct VastCli<R: CommandRunner> {
    config: VastCliConfig,
    runner: R,
}

impl VastCli<ProcessCommandRunner> {
    /// Creates a client wired to the real process runner.
    #[must_use]
    pub const fn with_process_runner(config: VastCliConfig) -> Self {
        Self::new(config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> VastCli<R> {
    /// Creates a new client using the provided configuration and runner.
    #[must_use]
    pub const fn new(config: VastCliConfig, runner: R) -> Self {
        Self { config, runner }
    }

    fn build_args(&self, parts: &[&str]) -> Vec<OsString> {
        let mut args: Vec<OsString> = parts.iter().map(OsString::from).collect();
        args.push(OsString::from("--raw"));
        if let Some(key) = &self.config.api_key {
            args.push(OsString::from("--api-key"));
            args.push(OsString::from(key));
        }
        args
    }

    /// Checks command output and converts failure to `MarketplaceError`.
    fn check_output(
        &self,
        output: CommandOutput,
        resource: &str,
    ) -> Result<String, MarketplaceError> {
        if output.is_success() {
            return Ok(output.stdout);
        }

        Err(MarketplaceError::CommandFailure {
            program: self.config.vast_bin.clone(),
            status: output.code,
            status_text: output.status_text(),
            stderr: format!("{resource}: {}", output.stderr.trim()),
        })
    }

    fn run_json(&self, parts: &[&str], resource: &str) -> Result<String, MarketplaceError> {
        let args = self.build_args(parts);
        tracing::debug!(program = %self.config.vast_bin, ?parts, "invoking marketplace CLI");
        let output = self.runner.run(&self.config.vast_bin, &args)?;
        self.check_output(output, resource)
    }

    fn parse<T: DeserializeOwned>(stdout: &str, resource: &str) -> Result<T, MarketplaceError> {
        serde_json::from_str::<T>(stdout).map_err(|err| MarketplaceError::Parse {
            resource: resource.to_owned(),
            message: err.to_string(),
        })
    }
}

/// Interprets the JSON printed by `vastai create instance --raw`.
///
/// # Errors
///
/// Returns [`MarketplaceError::Rejected`] when `success` is false,
/// [`MarketplaceError::MissingContract`] when success carries no contract id,
/// and [`MarketplaceError::Parse`] when the payload is not a creation record.
pub fn interpret_create_response(
    offer_id: u64,
    payload: &str,
) -> Result<InstanceHandle, MarketplaceError> {
    let trimmed = payload.trim();
    let response: RawCreateResponse =
        serde_json::from_str(trimmed).map_err(|err| MarketplaceError::Parse {
            resource: String::from("create instance"),
            message: format!("{err}: {trimmed}"),
        })?;

    if !response.success {
        return Err(MarketplaceError::Rejected {
            offer_id,
            payload: trimmed.to_owned(),
        });
    }

    response
        .new_contract
        .map(|instance_id| InstanceHandle { instance_id })
        .ok_or_else(|| MarketplaceError::MissingContract {
            offer_id,
            payload: trimmed.to_owned(),
        })
}

impl<R: CommandRunner> ControlPlane for VastCli<R> {
    type Error = MarketplaceError;

    fn search_offers(&self, criteria: &SearchCriteria) -> Result<Vec<Offer>, Self::Error> {
        let query = render_query(criteria);
        let stdout = self.run_json(&["search", "offers", query.as_str()], "offers")?;
        let offers = Self::parse::<Vec<RawOffer>>(&stdout, "offers")?;
        Ok(offers.into_iter().map(Offer::from).collect())
    }

    fn create_instance(&self, request: &ProvisionRequest) -> Result<InstanceHandle, Self::Error> {
        let offer_id = request.offer_id.to_string();
        let disk = request.disk_space_gb.to_string();
        let stdout = self.run_json(
            &[
                "create",
                "instance",
                offer_id.as_str(),
                "--image",
                request.docker_image.as_str(),
                "--disk",
                disk.as_str(),
            ],
            "create instance",
        )?;
        interpret_create_response(request.offer_id, &stdout)
    }

    fn list_instances(&self) -> Result<Vec<InstanceStatus>, Self::Error> {
        let stdout = self.run_json(&["show", "instances"], "instances")?;
        let instances = Self::parse::<Vec<RawInstance>>(&stdout, "instances")?;
        Ok(instances.into_iter().map(InstanceStatus::from).collect())
    }
}
