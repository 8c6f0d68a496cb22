//! Inbound message routing.
//!
//! Decodes one frame at a time and applies it to the sprite registry. Replies
//! and errors go back to the originating connection only; lifecycle events go
//! to everyone through the hub.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::metrics::ServerMetrics;
use crate::sprite_manager::SpriteManager;

use super::hub::ConnectionHub;
use super::protocol::{
    ClientMessage, ProtocolError, ServerMessage, SpawnRequest, decode_binary_frame, decode_frame,
};

/// Per-connection context handed to the dispatcher.
#[derive(Clone)]
pub struct ConnectionContext {
    pub connection_id: String,
    pub sprites: Arc<SpriteManager>,
    pub hub: Arc<ConnectionHub>,
    pub metrics: Arc<ServerMetrics>,
}

impl ConnectionContext {
    async fn reply(&self, msg: ServerMessage) {
        if !self.hub.unicast(&self.connection_id, msg).await {
            debug!(conn_id = %self.connection_id, "Reply dropped, connection gone");
        }
    }

    async fn report(&self, err: ProtocolError) {
        self.metrics.protocol_error();
        warn!(conn_id = %self.connection_id, "Rejected frame: {}", err);
        self.reply(ServerMessage::Error(err.to_string())).await;
    }
}

pub async fn handle_text_frame(ctx: &ConnectionContext, text: &str) {
    ctx.metrics.frame_received();
    match decode_frame(text) {
        Ok(msg) => dispatch_client_message(ctx, msg).await,
        Err(e) => ctx.report(e).await,
    }
}

pub async fn handle_binary_frame(ctx: &ConnectionContext, bytes: &[u8]) {
    ctx.metrics.frame_received();
    match decode_binary_frame(bytes) {
        Ok(msg) => dispatch_client_message(ctx, msg).await,
        Err(e) => ctx.report(e).await,
    }
}

pub async fn dispatch_client_message(ctx: &ConnectionContext, msg: ClientMessage) {
    match msg {
        ClientMessage::Input(text) => {
            ctx.sprites.send_input(&text).await;
        }
        ClientMessage::SpawnSprite(SpawnRequest {
            name,
            workdir,
            agent,
        }) => match ctx.sprites.spawn(&name, &workdir, agent.as_deref()).await {
            Ok(sprite) => {
                ctx.hub.broadcast(ServerMessage::SpriteCreated(sprite)).await;
            }
            Err(e) => {
                warn!(conn_id = %ctx.connection_id, "Spawn refused: {}", e);
                ctx.reply(ServerMessage::Error(e.to_string())).await;
            }
        },
        ClientMessage::SwitchSprite(id) => {
            ctx.sprites.switch_active(&id).await;
        }
        ClientMessage::KillSprite(id) => {
            ctx.sprites.kill(&id).await;
            let sprites = ctx.sprites.list().await;
            ctx.reply(ServerMessage::SpriteList(sprites)).await;
        }
        ClientMessage::Resize(_) => {
            debug!(conn_id = %ctx.connection_id, "Ignoring RESIZE");
        }
    }
}
