//! Vitals Relay Daemon
//!
//! Accepts binary telemetry frames from bedside devices over TCP, keeps the
//! latest decoded reading, and pushes it to WebSocket display clients on a
//! fixed cadence.
//! Device → TCP 12-byte frames → latest reading → tick → every subscriber

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vitals_relay::{Relay, RelayConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (default: <config dir>/vitals-relay/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Producer (device) endpoint, overrides the config file
    #[arg(long)]
    producer_addr: Option<SocketAddr>,

    /// Subscriber (WebSocket) endpoint, overrides the config file
    #[arg(long)]
    subscriber_addr: Option<SocketAddr>,

    /// Patient label attached to broadcasts, overrides the config file
    #[arg(long)]
    patient: Option<String>,

    /// Log filter when RUST_LOG is unset (e.g. "debug", "vitals_core=trace")
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("Invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();

    info!("Starting vitals-relay {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &args.config {
        Some(path) => RelayConfig::load_from(path),
        None => RelayConfig::load(),
    }
    .context("Failed to load configuration")?;

    info!("Configuration loaded from {}", config.config_path.display());

    if let Some(addr) = args.producer_addr {
        config.producer_addr = addr;
    }
    if let Some(addr) = args.subscriber_addr {
        config.subscriber_addr = addr;
    }
    if let Some(patient) = args.patient {
        config.patient_label = patient;
    }

    let relay = Relay::start(config)
        .await
        .context("Failed to start relay")?;

    info!("Relay ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Received shutdown signal");

    relay.shutdown().await?;
    info!("Vitals relay stopped");

    Ok(())
}
