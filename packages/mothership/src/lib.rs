//! Mothership
//!
//! Shared tmux-backed agent sessions ("sprites") driven and watched by any
//! number of WebSocket clients.

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod skills;
pub mod sprite_manager;
pub mod ws;

#[cfg(test)]
mod test_helpers;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use multiplexer::Multiplexer;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::info;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::metrics::ServerMetrics;
use crate::skills::{SkillRegistry, SkillWatcher};
use crate::sprite_manager::SpriteManager;
use crate::ws::ConnectionHub;

#[derive(Clone)]
pub struct AppState {
    pub sprites: Arc<SpriteManager>,
    pub skills: Arc<SkillRegistry>,
    pub hub: Arc<ConnectionHub>,
    pub metrics: Arc<ServerMetrics>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig, multiplexer: Arc<dyn Multiplexer>) -> Self {
        let metrics = Arc::new(ServerMetrics::new());
        let sprites = Arc::new(SpriteManager::new(
            multiplexer,
            &config.session_name,
            &config.default_agent,
            config.scrollback_lines,
            metrics.clone(),
        ));
        Self {
            sprites,
            skills: Arc::new(SkillRegistry::new()),
            hub: Arc::new(ConnectionHub::new(metrics.clone())),
            metrics,
            config: Arc::new(config),
        }
    }
}

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

/// `/health` plus a catch-all that upgrades WebSockets or shows the banner.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .fallback(handlers::client_handler)
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .with_state(state)
}

/// Bring up everything that runs beside the HTTP server: the tmux session,
/// the initial skill load, the skill watcher and the output streamer.
///
/// The returned watcher must be kept alive for hot reload to keep working.
pub async fn start_services(state: &AppState, cancel: &CancellationToken) -> Option<SkillWatcher> {
    state.sprites.ensure_session().await;

    let loaded = state.skills.load_dir(&state.config.skills_dir).await;
    state.metrics.record_skills_loaded(loaded as u64);
    info!("[skill] {} skills loaded from {}", loaded, state.config.skills_dir.display());

    let watcher = SkillWatcher::start(
        &state.config.skills_dir,
        state.skills.clone(),
        state.hub.clone(),
        state.metrics.clone(),
        cancel.clone(),
    );

    tokio::spawn(ws::run_output_streamer(
        state.sprites.clone(),
        state.hub.clone(),
        state.config.stream_interval(),
        cancel.clone(),
    ));

    watcher
}

/// Serve HTTP and WebSocket clients on `listener` until `cancel` fires.
pub async fn serve(listener: TcpListener, state: AppState, cancel: CancellationToken) -> Result<()> {
    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("Server error")
}
