use anyhow::{Context, Result};
use multiplexer::TmuxMultiplexer;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use mothership::AppState;
use mothership::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env()?;

    // Setup logging
    let default_directive = if config.debug {
        "mothership=debug,multiplexer=debug,tower_http=debug,info"
    } else {
        "mothership=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    info!("Starting Mothership");

    let addr = config.bind_addr()?;
    let state = AppState::new(config, Arc::new(TmuxMultiplexer::new()));
    let cancel = CancellationToken::new();

    let _watcher = mothership::start_services(&state, &cancel).await;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;
    info!("Mothership listening on ws://{}", actual_addr);
    info!("  GET /health  - liveness probe");
    info!("  GET /*       - WebSocket upgrade (banner otherwise)");

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Received shutdown signal, cleaning up...");
        shutdown.cancel();
    });

    let metrics = state.metrics.clone();
    let result = mothership::serve(listener, state, cancel.clone()).await;
    cancel.cancel();

    match serde_json::to_string(&metrics.snapshot()) {
        Ok(snapshot) => info!("Final metrics: {}", snapshot),
        Err(e) => error!("Failed to serialize metrics: {}", e),
    }
    // Sprite windows stay up in tmux; a restarted server starts with an empty list.
    info!("Shutdown complete");
    result
}
