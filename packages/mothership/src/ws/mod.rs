//! Client WebSocket protocol
//!
//! Every client shares one view: the same sprite list, the same focused
//! sprite and the same output stream.

mod dispatch;
mod handler;
mod hub;
mod protocol;
mod streamer;

pub use dispatch::{ConnectionContext, dispatch_client_message, handle_binary_frame, handle_text_frame};
pub use handler::{OUTBOUND_QUEUE_CAPACITY, handle_client_ws};
pub use hub::ConnectionHub;
pub use protocol::{
    Artifact, ClientMessage, ProtocolError, ServerMessage, SpawnRequest, decode_binary_frame,
    decode_frame,
};
pub use streamer::{run_output_streamer, stream_tick};
