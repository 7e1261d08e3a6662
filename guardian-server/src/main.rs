//! Guardian telemetry ingest server.
//!
//! Accepts device telemetry over WebSocket (direct and auth-handshake
//! paths) and over the synchronous HTTP fallback. This binary wires the
//! in-memory reference store; a production deployment substitutes its
//! own resolver and storage gateway through `AppState`.
//!
//! Usage:
//!   guardian-server --port 8000 --device <credential> [--device ...]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use guardian_ingest::MemoryStore;
use guardian_server::{build_router, AppState};
use guardian_types::DeviceIdentity;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "guardian-server")]
#[command(about = "Guardian telemetry ingest server")]
struct Args {
    /// Port to listen on (TCP/HTTP)
    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Seconds the handshake path waits for the auth frame
    #[arg(long, default_value = "30")]
    auth_timeout_secs: u64,

    /// Days of telemetry retained by the in-memory store
    #[arg(long, default_value = "365")]
    retention_days: i64,

    /// Device credential accepted by this instance (repeatable)
    #[arg(long = "device")]
    devices: Vec<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("Guardian ingest server starting...");
    let store = Arc::new(MemoryStore::with_retention_days(args.retention_days));
    for credential in &args.devices {
        store.register_device(DeviceIdentity::new(credential));
        info!("Registered device credential: {credential}");
    }

    let state = AppState::new(store.clone(), store)
        .with_auth_timeout(Duration::from_secs(args.auth_timeout_secs));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .context("Failed to bind HTTP listener")?;
    info!("Listening on 0.0.0.0:{}", args.port);
    axum::serve(listener, app)
        .await
        .context("HTTP server failed")?;
    Ok(())
}
