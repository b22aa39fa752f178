//! Layered configuration loading for the marketplace and remote settings.

use std::fs;
use std::time::Duration;

use tempfile::TempDir;
use vastbook::test_support::EnvGuard;
use vastbook::{
    DEFAULT_MIN_HOURLY_PRICE, DEFAULT_POLL_INTERVAL, DEFAULT_SETTLE_DELAY, MarketConfig,
    RemoteConfig,
};

#[tokio::test]
async fn market_config_defaults_match_marketplace_conventions() {
    let _guard = EnvGuard::set_vars(&[]).await;

    let cfg = MarketConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("defaults should load: {err}"));

    assert_eq!(cfg.vast_bin, "vastai");
    assert_eq!(cfg.api_key, None);
    assert_eq!(cfg.cpu_cores, 1);
    assert_eq!(cfg.download_mbps, 50);
    assert_eq!(cfg.disk_space_gb, 5);
    assert_eq!(cfg.image, "vastai/pytorch");
    assert_eq!(cfg.cuda_version, None);
    assert_eq!(cfg.min_price, DEFAULT_MIN_HOURLY_PRICE);
    assert_eq!(cfg.max_price, None);
    assert_eq!(cfg.wait_timeout_secs, None);
    let poller = cfg.poller();
    assert_eq!(poller.poll_interval(), DEFAULT_POLL_INTERVAL);
    assert_eq!(poller.settle_delay(), DEFAULT_SETTLE_DELAY);
    assert!(cfg.validate().is_ok());
}

#[tokio::test]
async fn environment_overrides_market_defaults() {
    let _guard = EnvGuard::set_vars(&[
        ("VASTBOOK_CPU_CORES", "6"),
        ("VASTBOOK_IMAGE", "pytorch/pytorch:latest"),
        ("VASTBOOK_API_KEY", "abc123"),
        ("VASTBOOK_WAIT_TIMEOUT_SECS", "900"),
    ])
    .await;

    let cfg = MarketConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("env overrides should load: {err}"));

    assert_eq!(cfg.cpu_cores, 6);
    assert_eq!(cfg.image, "pytorch/pytorch:latest");
    assert_eq!(cfg.api_key.as_deref(), Some("abc123"));
    assert_eq!(cfg.wait_timeout_secs, Some(900));
    assert_eq!(
        cfg.poller(),
        vastbook::ReadinessPoller::new(DEFAULT_POLL_INTERVAL, DEFAULT_SETTLE_DELAY)
            .with_wait_timeout(Some(Duration::from_secs(900)))
    );
}

#[tokio::test]
async fn config_file_is_read_and_environment_wins() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let path = tmp.path().join("vastbook.toml");
    fs::write(
        &path,
        "cpu_cores = 4\ndisk_space_gb = 40\nimage = \"from/file\"\nnotebook_local_port = 9100\n",
    )
    .unwrap_or_else(|err| panic!("write config file: {err}"));
    let path_str = path.to_string_lossy().into_owned();
    let _guard = EnvGuard::set_vars(&[
        ("VASTBOOK_CONFIG_PATH", path_str.as_str()),
        ("VASTBOOK_IMAGE", "from/env"),
    ])
    .await;

    let market = MarketConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("file config should load: {err}"));
    let remote = RemoteConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("file config should load: {err}"));

    assert_eq!(market.cpu_cores, 4);
    assert_eq!(market.disk_space_gb, 40);
    assert_eq!(market.image, "from/env");
    assert_eq!(remote.notebook_local_port, 9100);
    assert_eq!(remote.shell_local_port, 8022);
}

#[tokio::test]
async fn remote_config_defaults_target_conda_images() {
    let _guard = EnvGuard::set_vars(&[("VASTBOOK_REMOTE_SSH_IDENTITY_FILE", "~/.ssh/vast")]).await;

    let cfg = RemoteConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("defaults should load: {err}"));

    assert_eq!(cfg.ssh_bin, "ssh");
    assert_eq!(cfg.ssh_user, "root");
    assert_eq!(cfg.ssh_batch_mode, None);
    assert!(cfg.batch_mode());
    assert!(!cfg.strict_host_key_checking());
    assert_eq!(cfg.ssh_known_hosts_file, "/dev/null");
    assert_eq!(cfg.ssh_identity_file.as_deref(), Some("~/.ssh/vast"));
    assert_eq!(cfg.pip_bin, "/opt/conda/bin/pip");
    assert_eq!(cfg.jupyter_bin, "/opt/conda/bin/jupyter");
    assert_eq!(cfg.notebook_package, "jupyter");
    assert_eq!(cfg.notebook_local_port, 8080);
    assert_eq!(cfg.shell_local_port, 8022);
    assert!(cfg.validate().is_ok());
}

#[tokio::test]
async fn environment_can_disable_batch_mode_and_enable_host_checks() {
    let _guard = EnvGuard::set_vars(&[
        ("VASTBOOK_REMOTE_SSH_BATCH_MODE", "false"),
        ("VASTBOOK_REMOTE_SSH_STRICT_HOST_KEY_CHECKING", "true"),
    ])
    .await;

    let cfg = RemoteConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("env overrides should load: {err}"));

    assert!(!cfg.batch_mode());
    assert!(cfg.strict_host_key_checking());
}

#[test]
fn blank_api_key_is_rejected_with_guidance() {
    let cfg = MarketConfig {
        vast_bin: String::from("vastai"),
        api_key: Some(String::from("  ")),
        cpu_cores: 1,
        memory_gb: 1.0,
        download_mbps: 50,
        disk_space_gb: 5,
        image: String::from("vastai/pytorch"),
        cuda_version: None,
        min_price: 0.1,
        max_price: None,
        poll_interval_secs: 3,
        settle_delay_secs: 15,
        wait_timeout_secs: None,
    };

    let message = cfg
        .validate()
        .expect_err("blank key should fail")
        .to_string();
    assert!(message.contains("VASTBOOK_API_KEY"), "{message}");
    assert!(message.contains("vastbook.toml"), "{message}");
    assert!(message.contains("api_key"), "{message}");
}
