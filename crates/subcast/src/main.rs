//! # subcast
//!
//! Relay binary: accepts messages over HTTP, publishes them to a NATS
//! subject, and fans bus deliveries out to connected WebSocket clients.

#![deny(unsafe_code)]

mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use subcast_bus::BusClient;
use subcast_server::ingress::SubjectPublisher;
use subcast_server::server::SubcastServer;
use subcast_server::shutdown::wait_for_signal;
use subcast_server::websocket::bridge::BusBridge;

/// Subcast relay server.
#[derive(Parser, Debug)]
#[command(name = "subcast", about = "HTTP to WebSocket relay over NATS")]
struct Cli {
    /// Host to bind (overrides settings if specified).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings if specified, 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the settings file (default `~/.subcast/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Broker URL (overrides settings if specified).
    #[arg(long)]
    bus_url: Option<String>,

    /// Subject to publish and subscribe on.
    #[arg(long)]
    subject: Option<String>,

    /// Log level when SUBCAST_LOG is not set.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Settings: defaults < settings file < SUBCAST_* env < CLI flags
    let settings_path = args
        .settings
        .unwrap_or_else(subcast_settings::settings_path);
    let mut settings = subcast_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(url) = args.bus_url {
        settings.bus.url = url;
    }
    if let Some(subject) = args.subject {
        settings.bus.subject = subject;
    }
    if let Some(level) = args.log_level {
        settings.logging.level = level;
    }

    logging::init(&settings.logging.level);

    // Broker connection is required: without it the relay can neither
    // publish nor deliver.
    let bus = BusClient::connect(&settings.bus.url)
        .await
        .with_context(|| format!("Failed to connect to broker at {}", settings.bus.url))?;
    tracing::info!(url = %settings.bus.url, "connected to broker");

    let publisher = Arc::new(SubjectPublisher::new(
        bus.clone(),
        settings.bus.subject.clone(),
    ));
    let server = SubcastServer::new(settings.server.clone(), publisher);

    // One shared subscription drains the subject for all clients.
    let subscription = bus
        .subscribe(&settings.bus.subject)
        .await
        .with_context(|| format!("Failed to subscribe to {}", settings.bus.subject))?;
    let bridge = BusBridge::new(
        subscription,
        server.broadcast().clone(),
        server.shutdown().token(),
    );
    let bridge_handle = tokio::spawn(bridge.run());

    let (addr, serve_handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(
        subject = %settings.bus.subject,
        "subcast listening on http://{addr}"
    );

    wait_for_signal().await;
    tracing::info!("shutting down");

    server
        .shutdown()
        .graceful(vec![serve_handle, bridge_handle], None)
        .await;

    // Push anything still buffered to the broker before exiting
    if let Err(e) = bus.flush().await {
        tracing::warn!(error = %e, "bus flush failed during shutdown");
    }

    tracing::info!("shutdown complete");
    Ok(())
}
