/*!
 * btbar
 * Bluetooth status marker for polybar-style status bars
 */

use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::stream;
use std::io;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod bluez;
mod config;
mod error;
mod status;
mod watcher;

use bluez::{BluezBus, ObjectEvent};
use config::DaemonConfig;
use error::WatchError;
use watcher::Watcher;

#[derive(Parser)]
#[command(name = "btbar")]
#[command(about = "Print a status bar marker for the Bluetooth state")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, default_value = "/etc/btbar/btbar.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the status on every change (default)
    Run,
    /// Print the current status once and exit
    Status,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Stdout carries the status lines, so logs go to stderr
    let log_level = if cli.debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("btbar={}", log_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = DaemonConfig::load(&cli.config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_watcher(config).await,
        Commands::Status => print_status(config).await,
    }
}

async fn run_watcher(config: DaemonConfig) -> Result<()> {
    let (mut bus, closed) = BluezBus::connect(&config).await?;

    // Subscribe before the first fetch so no change slips in between
    let added = bus.subscribe(ObjectEvent::InterfacesAdded).await?;
    let removed = bus.subscribe(ObjectEvent::InterfacesRemoved).await?;

    let mut watcher = Watcher::new(bus, io::stdout(), config.palette.clone());
    watcher.refresh().await?;
    info!("Watching {} at {}", config.service, config.path);

    tokio::select! {
        result = watcher.run(stream::select(added, removed)) => {
            result?;
            return Err(WatchError::ConnectionLost("signal stream ended".to_string()).into());
        }
        err = closed.wait() => return Err(err.into()),
        result = shutdown_signal() => result?,
    }

    info!("Shutting down, last status {}", watcher.status());
    watcher.into_source().close().await;
    Ok(())
}

async fn print_status(config: DaemonConfig) -> Result<()> {
    let (bus, _closed) = BluezBus::connect(&config).await?;

    let mut watcher = Watcher::new(bus, io::stdout(), config.palette);
    watcher.refresh().await?;

    watcher.into_source().close().await;
    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}
