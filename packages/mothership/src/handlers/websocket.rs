use axum::{
    extract::{State, WebSocketUpgrade, ws::rejection::WebSocketUpgradeRejection},
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::ws;

/// Shown to plain HTTP requests that hit the WebSocket endpoint.
pub const BANNER: &str = "Mothership Engine v1.0";

/// Every path other than `/health`: upgrade WebSocket requests, answer
/// anything else with the banner.
pub async fn client_handler(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match upgrade {
        Ok(ws) => ws,
        Err(_) => return BANNER.into_response(),
    };

    let sprites = state.sprites.clone();
    let hub = state.hub.clone();
    let metrics = state.metrics.clone();
    ws.on_upgrade(move |socket| ws::handle_client_ws(socket, sprites, hub, metrics))
}
