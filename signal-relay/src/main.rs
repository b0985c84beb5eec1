//! signal-relay binary entry point.
//!
//! Usage:
//! ```bash
//! signal-relay --config relay.toml
//! SIGNAL_RELAY_API_KEY=secret signal-relay --bind 127.0.0.1:8787
//! signal-relay --help
//! ```

use anyhow::Context;
use clap::Parser;
use rendezvous_signal_relay::cleanup::spawn_cleanup_task;
use rendezvous_signal_relay::config::{Config, API_KEY_ENV};
use rendezvous_signal_relay::error::Result;
use rendezvous_signal_relay::http;
use rendezvous_signal_relay::server::SignalRelay;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Rendezvous and signaling relay for WebRTC peers.
#[derive(Parser, Debug)]
#[command(name = "signal-relay", version, about)]
struct Cli {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `server.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config = load_config(&cli).context("invalid configuration")?;
    if config.auth.api_key.is_none() {
        tracing::warn!(
            "No shared secret configured (auth.api_key / {}); authenticated routes will fail",
            API_KEY_ENV
        );
    }

    let bind_address = config.server.bind_address.clone();
    let cleanup = config.cleanup.clone();
    let relay = Arc::new(SignalRelay::in_memory(config));
    let cleanup_task = spawn_cleanup_task(relay.clone(), cleanup);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    tracing::info!(
        "signal-relay v{} listening on {}",
        env!("CARGO_PKG_VERSION"),
        bind_address
    );

    http::serve(relay, listener, shutdown_signal())
        .await
        .context("server error")?;

    cleanup_task.abort();
    tracing::info!("signal-relay stopped");
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    }
    .with_env_overrides();
    if let Some(bind) = &cli.bind {
        config.server.bind_address = bind.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
