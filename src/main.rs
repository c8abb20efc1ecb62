//! # Telemetry Node
//!
//! Balloon payload flight computer: binds the node's UARTs to their roles,
//! logs every line received, and publishes GPS fixes and sensor samples.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use telemetry_node::command::DisplayExecutor;
use telemetry_node::config::Config;
use telemetry_node::dispatch::node::{channel_summary, Node};
use telemetry_node::serial::binder::ChannelBinder;
use telemetry_node::serial::probe::ProbeSettings;
use telemetry_node::serial::SerialTransport;
use telemetry_node::telemetry::TelemetryLog;

/// Configuration file read when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main entry point for the telemetry node
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up console logging with tracing subscriber
///    - Load configuration (first argument, else `config/default.toml`, else defaults)
///    - Open the telemetry log and write the `INIT` line
///
/// 2. **Channel binding**
///    - Probe ports 3 and 1 for NMEA traffic
///    - Assign GPS 1 / Radio and GPS 2 / MicroController 2 accordingly
///    - Open all four channels
///
/// 3. **Run**
///    - One read loop per channel until every port closes or Ctrl+C
///    - A downlink record logged every `downlink_interval_ms`
///
/// # Errors
///
/// Returns error if:
/// - The configuration file exists but is invalid
/// - Any bound channel cannot be opened
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
///
/// Expected output:
/// ```text
/// INFO telemetry_node: Telemetry node v0.1.0 starting...
/// INFO telemetry_node::serial::binder: Channel binding: GPS1-3, Radio-2 (probe of port 3: GpsLike)
/// INFO telemetry_node::serial::binder: Channel binding: GPS2-1, Proc2-0 (probe of port 1: GpsLike)
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Telemetry node v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    let log = TelemetryLog::initialize(&config.telemetry.log_file);
    let transport = SerialTransport::new(&config.serial);
    let probe_settings = ProbeSettings::from_config(&config);
    let binder = ChannelBinder::new(probe_settings);

    info!("Probing ports (up to {:?} per pair)", probe_settings.budget());
    let channels = binder.bind(&transport, &log).await;
    info!("Bound channels: {}", channel_summary(&channels));

    let open = binder
        .open_all(&transport, &channels)
        .await
        .context("Failed to open bound channels")?;

    let node = Arc::new(Node::new(log, Arc::new(DisplayExecutor::new())));
    let handles = node.spawn_channels(open, config.gps.speed_unit);
    let downlink = tokio::spawn(Arc::clone(&node).run_downlink(config.telemetry.downlink_interval()));

    info!("Press Ctrl+C to exit");

    tokio::select! {
        _ = wait_for_channels(handles) => {
            warn!("All channels closed, shutting down");
        }

        // Handle Ctrl+C for graceful shutdown
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    downlink.abort();
    Ok(())
}

/// Load configuration from the first argument, the default path, or built-in defaults
fn load_config() -> Result<Config> {
    match std::env::args().nth(1) {
        Some(path) => {
            Config::load(&path).with_context(|| format!("Failed to load configuration from {}", path))
        }
        None if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("Failed to load configuration from {}", DEFAULT_CONFIG_PATH)),
        None => {
            info!("No configuration file, using defaults");
            Ok(Config::default())
        }
    }
}

/// Wait for every channel task to finish
async fn wait_for_channels(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            warn!("Channel task failed: {}", e);
        }
    }
}
