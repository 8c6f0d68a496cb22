//! Multiplexer - stateless terminal multiplexer operations
//!
//! This crate wraps the handful of tmux operations a session orchestrator
//! needs: make sure a session exists, open a named window, type into it,
//! capture its pane, and close it. It keeps no state of its own and knows
//! nothing about what runs inside the windows.
//!
//! Every external call goes through an argument vector. Nothing here is ever
//! handed to `sh -c`.
//!
//! # Example
//!
//! ```no_run
//! use multiplexer::{Multiplexer, TmuxMultiplexer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let tmux = TmuxMultiplexer::new();
//!
//!     tmux.ensure_session("demo").await.unwrap();
//!     let window_id = tmux.create_window("demo", "build", "/tmp").await.unwrap();
//!     println!("opened window @{}", window_id);
//!
//!     tmux.send_keys("demo", "build", "echo hello", true).await.unwrap();
//!     tmux.send_keys("demo", "build", "Enter", false).await.unwrap();
//!
//!     let screen = tmux.capture_pane("demo", "build", 100).await.unwrap();
//!     println!("{}", screen);
//! }
//! ```

mod error;
mod quote;
mod tmux;

pub use error::MultiplexerError;
pub use quote::{escape_format, shell_quote};
pub use tmux::{TmuxMultiplexer, parse_window_id};

use async_trait::async_trait;

/// Session/window operations of a terminal multiplexer.
///
/// Implementations must not retain state between calls; every method is a
/// discrete operation against the external tool.
#[async_trait]
pub trait Multiplexer: Send + Sync {
    /// Create the session if it does not exist yet.
    ///
    /// Returns `true` when a new session was created, `false` when it was
    /// already there.
    async fn ensure_session(&self, session: &str) -> Result<bool, MultiplexerError>;

    /// Open a detached window named `window` in `session` with its working
    /// directory set to `workdir`, returning the multiplexer's numeric window id.
    ///
    /// Both strings are taken literally. Window names containing `.` or `:`
    /// can be created but not targeted afterwards; callers reject them.
    async fn create_window(
        &self,
        session: &str,
        window: &str,
        workdir: &str,
    ) -> Result<u32, MultiplexerError>;

    /// Send keystrokes to the window's active pane.
    ///
    /// With `literal` set, `keys` is delivered as opaque text and never looked
    /// up as a key name (`Enter`, `C-c`, ...).
    async fn send_keys(
        &self,
        session: &str,
        window: &str,
        keys: &str,
        literal: bool,
    ) -> Result<(), MultiplexerError>;

    /// Capture the visible pane plus `scrollback_lines` of history.
    ///
    /// A window that no longer exists yields an empty string, not an error.
    async fn capture_pane(
        &self,
        session: &str,
        window: &str,
        scrollback_lines: u32,
    ) -> Result<String, MultiplexerError>;

    /// Close the window. Closing a window that is already gone is not an error
    /// for callers to act on; they log and move on.
    async fn kill_window(&self, session: &str, window: &str) -> Result<(), MultiplexerError>;
}
