// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WebSocket to MQTT bridge server.
//!
//! # Usage
//!
//! ```bash
//! # Start the bridge on default port 3000
//! mqtt-ws-bridge
//!
//! # Custom port and bind address
//! mqtt-ws-bridge --port 8080 --bind 127.0.0.1
//! ```
//!
//! # Endpoints
//!
//! - `GET /` - Demo page
//! - `GET /ws?connid=<id>` - WebSocket transport
//! - `POST /api/mqtt/connect` - Attach an MQTT client to a session
//! - `GET /health` - Health check

use clap::Parser;
use mqtt_ws_bridge::{routes, AppState};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// WebSocket to MQTT bridge
#[derive(Parser, Debug)]
#[command(name = "mqtt-ws-bridge")]
#[command(about = "WebSocket to MQTT bridge - Connect browsers to MQTT brokers")]
#[command(version)]
struct Args {
    /// HTTP server port
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Setup logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("mqtt-ws-bridge v{}", env!("CARGO_PKG_VERSION"));

    let state = Arc::new(AppState::new());
    let app = routes::app(state.clone());

    let addr = format!("{}:{}", args.bind, args.port);
    info!("HTTP server: http://{}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    // A failed bind is the only fatal startup error.
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C, then close every session's broker client and transport
/// before the listener shuts down.
async fn shutdown_signal(state: Arc<AppState>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to install shutdown handler: {}", err);
        return;
    }

    info!("Shutting down...");
    state.registry.for_each(|session| {
        info!("[{}] closing session", session.id());
        session.shutdown();
    });
}
