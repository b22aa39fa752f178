//! Binary entry point for the vastbook CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use vastbook::{
    ConfigError, MarketConfig, MarketplaceError, Offer, RemoteConfig, RemoteShell, TunnelKind,
    VastCli, WorkflowError, WorkflowOrchestrator, WorkflowOutcome,
};

mod cli;

use cli::{Cli, UpCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("remote configuration error: {0}")]
    Remote(String),
    #[error(transparent)]
    Workflow(#[from] WorkflowError<MarketplaceError>),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .ok();
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    match cli {
        Cli::Up(command) => run_up(&command).await,
    }
}

async fn run_up(args: &UpCommand) -> Result<i32, CliError> {
    let market = apply_market_overrides(args, MarketConfig::load_without_cli_args()?);
    let remote = apply_remote_overrides(
        args,
        RemoteConfig::load_without_cli_args().map_err(|err| CliError::Remote(err.to_string()))?,
    );

    let plan = market.as_plan()?;
    let control_plane = VastCli::with_process_runner(market.cli_config()?);
    let ssh_user = remote.ssh_user.clone();
    let shell = RemoteShell::with_process_runner(remote)
        .map_err(|err| CliError::Remote(err.to_string()))?;
    let orchestrator =
        WorkflowOrchestrator::new(control_plane, shell, plan).with_poller(market.poller());

    if args.dry_run {
        let offer = orchestrator.select_offer()?;
        write_offer(io::stdout(), &offer);
        return Ok(0);
    }

    let outcome = orchestrator.execute().await?;
    write_outcome(io::stdout(), &outcome, &ssh_user);
    write_tunnel_failures(io::stderr(), &outcome);
    Ok(exit_code(&outcome))
}

fn apply_market_overrides(args: &UpCommand, config: MarketConfig) -> MarketConfig {
    MarketConfig {
        cpu_cores: args.cpu_cores.unwrap_or(config.cpu_cores),
        memory_gb: args.memory.unwrap_or(config.memory_gb),
        download_mbps: args.download_speed.unwrap_or(config.download_mbps),
        disk_space_gb: args.disk_space.unwrap_or(config.disk_space_gb),
        image: args.image.clone().unwrap_or(config.image),
        cuda_version: args.cuda.or(config.cuda_version),
        max_price: args.max_price.or(config.max_price),
        ..config
    }
}

fn apply_remote_overrides(args: &UpCommand, config: RemoteConfig) -> RemoteConfig {
    RemoteConfig {
        notebook_local_port: args.jupyter_port.unwrap_or(config.notebook_local_port),
        shell_local_port: args.ssh_port.unwrap_or(config.shell_local_port),
        ..config
    }
}

fn exit_code(outcome: &WorkflowOutcome) -> i32 {
    i32::from(!outcome.tunnels.all_open())
}

fn write_offer(mut target: impl Write, offer: &Offer) {
    writeln!(
        target,
        "offer {}: {} ({} of {} cores, {:.0} MB RAM, {:.0} Mb/s down, CUDA {}) at ${:.4}/h",
        offer.id,
        offer.cpu_name,
        offer.cpu_cores_effective,
        offer.cpu_cores_total,
        offer.ram_mb,
        offer.download_mbps,
        offer.max_cuda_version,
        offer.hourly_price_total
    )
    .ok();
}

fn write_outcome(mut target: impl Write, outcome: &WorkflowOutcome, ssh_user: &str) {
    writeln!(
        target,
        "instance {} running on {}:{}",
        outcome.instance.instance_id, outcome.connection.ssh_host, outcome.connection.ssh_port
    )
    .ok();
    for spec in outcome.tunnels.opened() {
        match spec.kind {
            TunnelKind::Notebook => {
                writeln!(target, "notebook: http://localhost:{}", spec.local_port).ok();
            }
            TunnelKind::Shell => {
                writeln!(target, "ssh: ssh -p {} {ssh_user}@localhost", spec.local_port).ok();
            }
        }
    }
}

fn write_tunnel_failures(mut target: impl Write, outcome: &WorkflowOutcome) {
    for failure in outcome.tunnels.failures() {
        writeln!(target, "{failure}").ok();
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
