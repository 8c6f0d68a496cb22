pub mod health;
pub mod websocket;

pub use health::health_handler;
pub use websocket::{BANNER, client_handler};
