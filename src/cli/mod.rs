//! Command-line interface definitions for the `vastbook` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `vastbook` binary.
#[derive(Debug, Parser)]
#[command(
    name = "vastbook",
    about = "Rent the cheapest matching Vast.ai machine and tunnel a Jupyter notebook to it",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Rent an instance, start Jupyter, and open the local tunnels.
    #[command(
        name = "up",
        about = "Rent an instance, start Jupyter, and open the local tunnels"
    )]
    Up(UpCommand),
}

/// Arguments for the `vastbook up` subcommand.
///
/// Every flag overrides the matching configuration value for this run only.
#[derive(Debug, Parser)]
pub(crate) struct UpCommand {
    /// Minimum number of effective CPU cores.
    #[arg(long, value_name = "CORES")]
    pub(crate) cpu_cores: Option<u32>,
    /// Minimum RAM in gigabytes.
    #[arg(long, value_name = "GB")]
    pub(crate) memory: Option<f64>,
    /// Minimum download bandwidth in Mb/s.
    #[arg(long, value_name = "MBPS")]
    pub(crate) download_speed: Option<u32>,
    /// Disk to allocate, in gigabytes.
    #[arg(long, value_name = "GB")]
    pub(crate) disk_space: Option<u32>,
    /// Docker image to deploy.
    #[arg(long, value_name = "IMAGE")]
    pub(crate) image: Option<String>,
    /// CUDA version the host must support.
    #[arg(long, value_name = "VERSION")]
    pub(crate) cuda: Option<f64>,
    /// Highest acceptable hourly price in dollars.
    #[arg(long, value_name = "DOLLARS")]
    pub(crate) max_price: Option<f64>,
    /// Local port forwarded to the notebook server.
    #[arg(long, value_name = "PORT")]
    pub(crate) jupyter_port: Option<u16>,
    /// Local port forwarded to the instance's SSH daemon.
    #[arg(long, value_name = "PORT")]
    pub(crate) ssh_port: Option<u16>,
    /// Search and select an offer, print it, and stop without renting.
    #[arg(long)]
    pub(crate) dry_run: bool,
}
