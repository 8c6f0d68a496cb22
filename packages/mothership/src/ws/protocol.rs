//! WebSocket Protocol Types
//!
//! Every frame is a JSON envelope `{"type": "...", "payload": ...}` with
//! SCREAMING_SNAKE_CASE type names.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::skills::Skill;
use crate::sprite_manager::Sprite;

/// Payload of `SPAWN_SPRITE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub name: String,
    pub workdir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

/// File content pushed to clients for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: String,
    pub content: String,
}

/// Messages from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Keystrokes for the active sprite
    Input(String),
    SpawnSprite(SpawnRequest),
    /// Sprite id to focus
    SwitchSprite(String),
    /// Sprite id to terminate
    KillSprite(String),
    /// Accepted and ignored
    Resize(Option<serde_json::Value>),
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// Full replacement of the visible buffer, never a delta
    Output(String),
    SpriteCreated(Sprite),
    SpriteList(Vec<Sprite>),
    ArtifactUpdate(Artifact),
    SkillLoaded(Skill),
    Error(String),
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid message: frame is not valid UTF-8")]
    Encoding,
}

/// Decode one inbound text frame.
pub fn decode_frame(text: &str) -> Result<ClientMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

/// Decode one inbound binary frame, which must hold UTF-8 JSON.
pub fn decode_binary_frame(bytes: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ProtocolError::Encoding)?;
    decode_frame(text)
}
