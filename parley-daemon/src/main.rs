//! Parley Daemon - multi-party text and voice chat server
//!
//! Serves one shared room over WebSocket. Clients join with a username,
//! receive recent history and the roster, and exchange text and voice clips.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use parley_broadcaster::ChatServer;
use parley_daemon::ServerConfig;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "parley-daemon", version, about = "Parley chat server")]
struct Args {
    /// Configuration file (default: <config dir>/parley/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides `bind_addr`
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Events kept for late joiners, overrides `room.history_capacity`
    #[arg(long)]
    history_capacity: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let args = Args::parse();

    info!("💬 Starting Parley Daemon v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => ServerConfig::load_from(path),
        None => ServerConfig::load(),
    }
    .context("Failed to load configuration")?;

    info!("📋 Configuration loaded from {}", config.config_path.display());

    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(capacity) = args.history_capacity {
        config.room.history_capacity = capacity;
    }
    config.validate()?;

    info!("  - History: last {} events", config.room.history_capacity);
    info!(
        "  - Echo: text {}, voice {}",
        on_off(config.room.echo_text),
        on_off(config.room.echo_voice)
    );
    info!(
        "  - Per-client queue: {} frames (kick after {} drops)",
        config.room.outbound_queue, config.room.max_send_drops
    );

    let server = ChatServer::new(config.bind_addr, config.room.clone())
        .context("Failed to create chat server")?;
    let addr = server.start().await.context("Failed to start chat server")?;

    info!("🚀 Parley daemon ready on ws://{}", addr);

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    } else {
        info!("🛑 Received shutdown signal");
    }

    info!("🧹 Shutting down...");
    let room = server.room();
    info!(
        "   {} connected, {} events in history",
        room.member_count(),
        room.history_len()
    );
    server.stop().await.context("Failed to stop chat server")?;
    info!("👋 Parley daemon stopped");

    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
