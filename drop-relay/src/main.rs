//! drop-relay binary entry point.
//!
//! Usage:
//! ```bash
//! drop-relay --config relay.toml
//! ```

use anyhow::Context;
use drop_relay::cleanup::spawn_sweep_task;
use drop_relay::config::Config;
use drop_relay::http;
use drop_relay::server::DropRelay;
use drop_relay::telemetry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load_or_default(&get_config_path())?;
    let sink = telemetry::open(&config.telemetry).await?;

    let bind_address = config.server.bind_address.clone();
    let sweep = config.sweep.clone();
    let relay = Arc::new(DropRelay::new(config, sink));
    let sweeper = spawn_sweep_task(relay.clone(), sweep);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("binding {bind_address}"))?;
    tracing::info!(
        "drop-relay v{} listening on {}",
        env!("CARGO_PKG_VERSION"),
        listener.local_addr()?
    );

    http::serve(relay, listener, shutdown_signal()).await?;

    sweeper.abort();
    tracing::info!("drop-relay stopped");
    Ok(())
}

fn get_config_path() -> PathBuf {
    std::env::args()
        .skip_while(|arg| arg != "--config")
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("relay.toml"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
