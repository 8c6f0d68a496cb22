//! WebSocket Handler
//!
//! Per-connection loop: one task drains the outbound queue into the socket,
//! another reads frames and hands them to the dispatcher in arrival order.

use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::metrics::ServerMetrics;
use crate::sprite_manager::SpriteManager;

use super::dispatch::{ConnectionContext, handle_binary_frame, handle_text_frame};
use super::hub::ConnectionHub;
use super::protocol::ServerMessage;

/// Outbound queue depth per connection. Broadcasts beyond it are dropped.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 100;

/// Serve one upgraded WebSocket until either side hangs up.
pub async fn handle_client_ws(
    socket: WebSocket,
    sprites: Arc<SpriteManager>,
    hub: Arc<ConnectionHub>,
    metrics: Arc<ServerMetrics>,
) {
    let connection_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %connection_id, "[ws] Client connected");
    metrics.connection_opened();

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(OUTBOUND_QUEUE_CAPACITY);

    // Queued before registering, so late joiners see the current sprites
    // ahead of any broadcast.
    let snapshot = sprites.list().await;
    if tx.send(ServerMessage::SpriteList(snapshot)).await.is_ok() {
        metrics.frame_sent();
    }
    hub.register(connection_id.clone(), tx).await;

    let sender_task = async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    };

    let ctx = ConnectionContext {
        connection_id: connection_id.clone(),
        sprites,
        hub: hub.clone(),
        metrics: metrics.clone(),
    };
    // Frames are handled one at a time so keystrokes reach tmux in the order
    // they were typed; a slow tmux call holds up only this connection.
    let input_task = async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => handle_text_frame(&ctx, text.as_str()).await,
                Ok(Message::Binary(bytes)) => handle_binary_frame(&ctx, &bytes).await,
                Ok(Message::Close(_)) => break,
                // Ping/pong are answered by axum
                Ok(_) => {}
                Err(e) => {
                    debug!(conn_id = %ctx.connection_id, "WebSocket read error: {}", e);
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = sender_task => {}
        _ = input_task => {}
    }

    metrics.connection_closed();
    hub.unregister(&connection_id).await;
    info!(conn_id = %connection_id, "[ws] Client disconnected");
}
