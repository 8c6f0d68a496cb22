//! Output streaming
//!
//! A single loop captures the focused sprite's pane on a fixed cadence and
//! broadcasts it as `OUTPUT`. Each capture finishes before the next sleep
//! starts, so ticks never overlap.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::sprite_manager::SpriteManager;

use super::hub::ConnectionHub;
use super::protocol::ServerMessage;

/// Run one capture-and-broadcast step. Returns whether a frame went out.
///
/// Nothing is captured when nobody is listening or no sprite has focus, and
/// an empty capture is not sent.
pub async fn stream_tick(sprites: &SpriteManager, hub: &ConnectionHub) -> bool {
    if hub.is_empty().await || sprites.active_id().await.is_none() {
        return false;
    }
    let text = sprites.capture_active().await;
    if text.is_empty() {
        return false;
    }
    hub.broadcast(ServerMessage::Output(text)).await;
    true
}

pub async fn run_output_streamer(
    sprites: Arc<SpriteManager>,
    hub: Arc<ConnectionHub>,
    interval: Duration,
    cancel: CancellationToken,
) {
    info!("[stream] Output streamer running every {:?}", interval);
    loop {
        stream_tick(&sprites, &hub).await;
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    debug!("[stream] Output streamer stopped");
}
