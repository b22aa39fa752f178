//! Configuration loading via `ortho-config`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::marketplace::{DEFAULT_VAST_BIN, MarketplaceError, VastCliConfig};
use crate::offer::{DEFAULT_MIN_HOURLY_PRICE, SearchCriteria};
use crate::readiness::ReadinessPoller;
use crate::workflow::RentalPlan;

/// Marketplace search and rental settings derived from environment
/// variables, configuration files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq)]
#[ortho_config(
    prefix = "VASTBOOK",
    discovery(
        app_name = "vastbook",
        env_var = "VASTBOOK_CONFIG_PATH",
        config_file_name = "vastbook.toml",
        dotfile_name = ".vastbook.toml",
        project_file_name = "vastbook.toml"
    )
)]
pub struct MarketConfig {
    /// Path to the `vastai` command-line client.
    #[ortho_config(default = DEFAULT_VAST_BIN.to_owned())]
    pub vast_bin: String,
    /// API key passed to every `vastai` call. When absent the client uses
    /// the key it stored at login.
    pub api_key: Option<String>,
    /// Minimum number of effective CPU cores.
    #[ortho_config(default = 1)]
    pub cpu_cores: u32,
    /// Minimum RAM in gigabytes.
    #[ortho_config(default = 1.0)]
    pub memory_gb: f64,
    /// Minimum download bandwidth in Mb/s. Zero disables the filter.
    #[ortho_config(default = 50)]
    pub download_mbps: u32,
    /// Disk to allocate for the instance, in gigabytes.
    #[ortho_config(default = 5)]
    pub disk_space_gb: u32,
    /// Docker image to deploy.
    #[ortho_config(default = "vastai/pytorch".to_owned())]
    pub image: String,
    /// CUDA version the host must support exactly.
    pub cuda_version: Option<f64>,
    /// Lowest hourly price considered; filters out free placeholder offers.
    #[ortho_config(default = DEFAULT_MIN_HOURLY_PRICE)]
    pub min_price: f64,
    /// Highest hourly price considered.
    pub max_price: Option<f64>,
    /// Seconds between instance status checks.
    #[ortho_config(default = 3)]
    pub poll_interval_secs: u64,
    /// Seconds to wait after the instance reports `running`.
    #[ortho_config(default = 15)]
    pub settle_delay_secs: u64,
    /// Give up waiting for `running` after this many seconds. Unset waits
    /// indefinitely.
    pub wait_timeout_secs: Option<u64>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn hint(&self) -> String {
        format!(
            "{}: set {} or add {} to vastbook.toml",
            self.description, self.env_var, self.toml_key
        )
    }
}

const VAST_BIN: FieldMetadata =
    FieldMetadata::new("vastai binary", "VASTBOOK_VAST_BIN", "vast_bin");
const API_KEY: FieldMetadata = FieldMetadata::new("API key", "VASTBOOK_API_KEY", "api_key");
const IMAGE: FieldMetadata = FieldMetadata::new("docker image", "VASTBOOK_IMAGE", "image");
const CPU_CORES: FieldMetadata =
    FieldMetadata::new("CPU core count", "VASTBOOK_CPU_CORES", "cpu_cores");
const MEMORY: FieldMetadata = FieldMetadata::new("RAM", "VASTBOOK_MEMORY_GB", "memory_gb");
const DISK: FieldMetadata =
    FieldMetadata::new("disk space", "VASTBOOK_DISK_SPACE_GB", "disk_space_gb");
const MIN_PRICE: FieldMetadata =
    FieldMetadata::new("minimum price", "VASTBOOK_MIN_PRICE", "min_price");
const MAX_PRICE: FieldMetadata =
    FieldMetadata::new("maximum price", "VASTBOOK_MAX_PRICE", "max_price");
const CUDA: FieldMetadata =
    FieldMetadata::new("CUDA version", "VASTBOOK_CUDA_VERSION", "cuda_version");
const POLL_INTERVAL: FieldMetadata = FieldMetadata::new(
    "poll interval",
    "VASTBOOK_POLL_INTERVAL_SECS",
    "poll_interval_secs",
);

impl MarketConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(metadata.hint()));
        }
        Ok(())
    }

    fn require_range(in_range: bool, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if in_range {
            return Ok(());
        }
        Err(ConfigError::OutOfRange(metadata.hint()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("vastbook")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and TOML key that fix the problem.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required string is blank
    /// and [`ConfigError::OutOfRange`] when a number is unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(&self.vast_bin, &VAST_BIN)?;
        if let Some(key) = self.api_key.as_deref() {
            Self::require_field(key, &API_KEY)?;
        }
        Self::require_field(&self.image, &IMAGE)?;
        Self::require_range(self.cpu_cores > 0, &CPU_CORES)?;
        Self::require_range(self.memory_gb.is_finite() && self.memory_gb > 0.0, &MEMORY)?;
        Self::require_range(self.disk_space_gb > 0, &DISK)?;
        Self::require_range(
            self.min_price.is_finite() && self.min_price >= 0.0,
            &MIN_PRICE,
        )?;
        if let Some(max) = self.max_price {
            Self::require_range(max.is_finite() && max >= self.min_price, &MAX_PRICE)?;
        }
        if let Some(cuda) = self.cuda_version {
            Self::require_range(cuda.is_finite() && cuda > 0.0, &CUDA)?;
        }
        Self::require_range(self.poll_interval_secs > 0, &POLL_INTERVAL)?;
        Ok(())
    }

    /// Builds the search bounds from the configured filters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn as_criteria(&self) -> Result<SearchCriteria, ConfigError> {
        self.validate()?;
        SearchCriteria::builder()
            .min_cpu_cores(self.cpu_cores)
            .min_ram_gb(self.memory_gb)
            .min_download_mbps((self.download_mbps > 0).then_some(self.download_mbps))
            .min_hourly_price(self.min_price)
            .max_hourly_price(self.max_price)
            .required_cuda_version(self.cuda_version)
            .build()
            .map_err(|err| ConfigError::OutOfRange(err.to_string()))
    }

    /// Builds the full rental plan: search bounds, image, and disk size.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn as_plan(&self) -> Result<RentalPlan, ConfigError> {
        Ok(RentalPlan {
            criteria: self.as_criteria()?,
            docker_image: self.image.trim().to_owned(),
            disk_space_gb: self.disk_space_gb,
        })
    }

    /// Builds the settings for the `vastai` client.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the binary or API key is blank.
    pub fn cli_config(&self) -> Result<VastCliConfig, ConfigError> {
        VastCliConfig::new(self.vast_bin.as_str(), self.api_key.clone()).map_err(|err| match err {
            MarketplaceError::InvalidConfig { field } if field == API_KEY.toml_key => {
                ConfigError::MissingField(API_KEY.hint())
            }
            MarketplaceError::InvalidConfig { field } if field == VAST_BIN.toml_key => {
                ConfigError::MissingField(VAST_BIN.hint())
            }
            other => ConfigError::Parse(other.to_string()),
        })
    }

    /// Builds the readiness poller from the configured timings.
    #[must_use]
    pub fn poller(&self) -> ReadinessPoller {
        ReadinessPoller::new(
            Duration::from_secs(self.poll_interval_secs),
            Duration::from_secs(self.settle_delay_secs),
        )
        .with_wait_timeout(self.wait_timeout_secs.map(Duration::from_secs))
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a numeric field is outside its usable range.
    #[error("invalid configuration value: {0}")]
    OutOfRange(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    fn base_config() -> MarketConfig {
        MarketConfig {
            vast_bin: String::from("vastai"),
            api_key: None,
            cpu_cores: 6,
            memory_gb: 16.0,
            download_mbps: 50,
            disk_space_gb: 5,
            image: String::from("vastai/pytorch"),
            cuda_version: None,
            min_price: 0.1,
            max_price: Some(0.3),
            poll_interval_secs: 3,
            settle_delay_secs: 15,
            wait_timeout_secs: None,
        }
    }

    #[fixture]
    fn config() -> MarketConfig {
        base_config()
    }

    #[rstest]
    fn as_plan_carries_filters_and_container_settings(config: MarketConfig) {
        let plan = config.as_plan().expect("plan should build");

        assert_eq!(plan.criteria.min_cpu_cores, 6);
        assert_eq!(plan.criteria.min_download_mbps, Some(50));
        assert_eq!(plan.criteria.max_hourly_price, Some(0.3));
        assert_eq!(plan.docker_image, "vastai/pytorch");
        assert_eq!(plan.disk_space_gb, 5);
    }

    #[rstest]
    fn zero_download_disables_bandwidth_filter(config: MarketConfig) {
        let cfg = MarketConfig {
            download_mbps: 0,
            ..config
        };
        let criteria = cfg.as_criteria().expect("criteria should build");
        assert_eq!(criteria.min_download_mbps, None);
    }

    #[rstest]
    #[case::blank_image(MarketConfig { image: String::from(" "), ..base_config() }, "VASTBOOK_IMAGE")]
    #[case::blank_key(MarketConfig { api_key: Some(String::new()), ..base_config() }, "VASTBOOK_API_KEY")]
    #[case::zero_cores(MarketConfig { cpu_cores: 0, ..base_config() }, "VASTBOOK_CPU_CORES")]
    #[case::no_memory(MarketConfig { memory_gb: 0.0, ..base_config() }, "VASTBOOK_MEMORY_GB")]
    #[case::zero_disk(MarketConfig { disk_space_gb: 0, ..base_config() }, "VASTBOOK_DISK_SPACE_GB")]
    #[case::inverted_prices(MarketConfig { max_price: Some(0.05), ..base_config() }, "VASTBOOK_MAX_PRICE")]
    #[case::zero_interval(MarketConfig { poll_interval_secs: 0, ..base_config() }, "VASTBOOK_POLL_INTERVAL_SECS")]
    fn validate_names_the_setting_to_fix(#[case] cfg: MarketConfig, #[case] env_var: &str) {
        let err = cfg.validate().expect_err("config should be rejected");
        assert!(
            err.to_string().contains(env_var),
            "expected '{env_var}' in: {err}"
        );
    }

    #[rstest]
    fn poller_uses_configured_timings(config: MarketConfig) {
        let cfg = MarketConfig {
            poll_interval_secs: 1,
            settle_delay_secs: 2,
            wait_timeout_secs: Some(60),
            ..config
        };

        let poller = cfg.poller();

        assert_eq!(poller.poll_interval(), Duration::from_secs(1));
        assert_eq!(poller.settle_delay(), Duration::from_secs(2));
        assert_eq!(
            poller,
            ReadinessPoller::new(Duration::from_secs(1), Duration::from_secs(2))
                .with_wait_timeout(Some(Duration::from_secs(60)))
        );
    }

    #[rstest]
    fn cli_config_forwards_trimmed_key(config: MarketConfig) {
        let cfg = MarketConfig {
            api_key: Some(String::from(" abc123 ")),
            ..config
        };
        let cli = cfg.cli_config().expect("cli config should build");
        assert_eq!(cli.api_key.as_deref(), Some("abc123"));
    }

    #[rstest]
    #[case::blank_binary(" ", None, "VASTBOOK_VAST_BIN")]
    #[case::blank_key("vastai", Some(" "), "VASTBOOK_API_KEY")]
    fn cli_config_hint_names_the_rejected_field(
        config: MarketConfig,
        #[case] vast_bin: &str,
        #[case] api_key: Option<&str>,
        #[case] env_var: &str,
    ) {
        let cfg = MarketConfig {
            vast_bin: vast_bin.to_owned(),
            api_key: api_key.map(str::to_owned),
            ..config
        };

        let err = cfg.cli_config().expect_err("blank field should be rejected");

        match err {
            ConfigError::MissingField(hint) => assert!(hint.contains(env_var), "{hint}"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
