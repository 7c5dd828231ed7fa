//! # Track Relay
//!
//! Relays GPS positions from a serial NMEA receiver to an OsmAnd-protocol
//! HTTP collector, buffering them on disk while the collector is unreachable.
//!
//! Usage: `track-relay [CONFIG_PATH]` (defaults to `config/default.toml`).

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use track_relay::config::Config;
use track_relay::controller::{TrackingController, TrackingSettings};
use track_relay::gps::SerialGpsProvider;
use track_relay::logging::{init_logging, log_dir_from_config};
use track_relay::network::{spawn_probe, NetworkMonitor, TcpProbe};
use track_relay::queue::FileQueue;
use track_relay::status::StatusLog;
use track_relay::transport::{BlockingAdapter, HttpTransport};

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main entry point for Track Relay
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration and set up logging
///    - Open the position queue and build the HTTP transport
///    - Start the connectivity probe for the collector
///
/// 2. **Run**
///    - Start the tracking controller (GPS updates, drain, heartbeat)
///    - Wait for Ctrl+C
///
/// 3. **Graceful Shutdown**
///    - Stop the controller, which stops GPS updates and network monitoring
///    - Queued positions stay on disk for the next run
///
/// # Errors
///
/// Returns error if:
/// - Configuration cannot be loaded or is invalid
/// - The queue file cannot be opened
/// - The HTTP client cannot be built
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(log_dir_from_config(&config.logging.log_dir))?;

    info!("Track Relay v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config_path);

    let queue = FileQueue::open(&config.queue.path, config.queue.compact_threshold)
        .await
        .with_context(|| format!("Failed to open position queue at {}", config.queue.path))?;
    info!("Position queue at {} ({} pending)", config.queue.path, queue.len().await);

    // The blocking client owns its own runtime and must be built off the async workers
    let http = tokio::task::spawn_blocking(HttpTransport::new).await??;
    let transport = BlockingAdapter::new(http);

    let probe_period = Duration::from_millis(config.network.probe_interval_ms);
    let probe_timeout = Duration::from_millis(config.network.probe_timeout_ms);
    let (feed, probe_task) = match TcpProbe::for_url(&config.server.url, probe_timeout) {
        Some(probe) => {
            info!("Probing collector at {} every {:?}", probe.address(), probe_period);
            let (feed, task) = spawn_probe(probe, probe_period).await;
            (feed, Some(task))
        }
        None => {
            warn!("Cannot derive a probe address from {}, assuming online", config.server.url);
            let (_tx, feed) = watch::channel(true);
            (feed, None)
        }
    };

    let settings = TrackingSettings::from(&config);
    let provider = SerialGpsProvider::new(
        config.gps.port.clone(),
        config.gps.baud_rate,
        settings.device_id.clone(),
        settings.interval,
    );

    let status = StatusLog::new();
    let controller = TrackingController::new(
        settings,
        std::sync::Arc::new(queue),
        std::sync::Arc::new(transport),
        Box::new(provider),
        NetworkMonitor::new(feed),
        status,
    );
    let handle = controller.start();

    info!("Press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");

    handle.stop().await;
    if let Some(task) = probe_task {
        task.abort();
    }

    info!("Track Relay stopped");
    Ok(())
}
