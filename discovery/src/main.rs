//! flink-sd entry point

use anyhow::Context;
use clap::Parser;
use flink_sd::cli::Cli;
use flink_sd::config::DiscoveryConfig;
use flink_sd::shutdown::{spawn_signal_listener, ShutdownController};
use flink_sd::{logging, service};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init() {
        eprintln!("Error: failed to initialize logging: {e}");
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = DiscoveryConfig::from_cli(cli).context("invalid configuration")?;

    let shutdown = ShutdownController::default();
    spawn_signal_listener(shutdown.clone());

    service::run(config, shutdown)
        .await
        .context("service discovery failed")
}
