use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

use crate::Multiplexer;
use crate::error::MultiplexerError;
use crate::quote::escape_format;

/// [`Multiplexer`] backed by the `tmux` command line.
///
/// Targets use tmux's exact-match syntax (`=session:=window`) so a window
/// called `build` never resolves to `build-2`.
#[derive(Debug, Clone)]
pub struct TmuxMultiplexer {
    program: String,
    /// Server socket (`tmux -S`); the default server when unset.
    socket: Option<PathBuf>,
}

impl Default for TmuxMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl TmuxMultiplexer {
    pub fn new() -> Self {
        Self::with_program("tmux")
    }

    /// Use a different executable in place of `tmux` (a wrapper script, or a
    /// specific install path).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            socket: None,
        }
    }

    /// Talk to the tmux server listening on `socket` instead of the user's
    /// default server.
    pub fn with_socket(mut self, socket: impl Into<PathBuf>) -> Self {
        self.socket = Some(socket.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn socket(&self) -> Option<&Path> {
        self.socket.as_deref()
    }

    async fn run(&self, args: &[&str]) -> Result<Output, MultiplexerError> {
        debug!(program = %self.program, ?args, "running multiplexer command");
        let mut command = Command::new(&self.program);
        if let Some(socket) = &self.socket {
            command.arg("-S").arg(socket);
        }
        command
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| MultiplexerError::Spawn {
                program: self.program.clone(),
                source,
            })
    }

    async fn run_checked(
        &self,
        operation: &'static str,
        args: &[&str],
    ) -> Result<Output, MultiplexerError> {
        let output = self.run(args).await?;
        if !output.status.success() {
            return Err(exit_error(operation, &output));
        }
        Ok(output)
    }
}

fn exit_error(operation: &'static str, output: &Output) -> MultiplexerError {
    MultiplexerError::Exit {
        operation,
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

fn session_target(session: &str) -> String {
    format!("={session}")
}

fn window_target(session: &str, window: &str) -> String {
    format!("={session}:={window}")
}

/// Parse the `#{window_id}` format (`@12`) printed by tmux.
///
/// Returns `None` for anything that is not a positive integer, optionally
/// prefixed with `@`.
pub fn parse_window_id(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('@').unwrap_or(trimmed);
    match digits.parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(id) => Some(id),
    }
}

#[async_trait]
impl Multiplexer for TmuxMultiplexer {
    async fn ensure_session(&self, session: &str) -> Result<bool, MultiplexerError> {
        let target = session_target(session);
        let check = self.run(&["has-session", "-t", &target]).await?;
        if check.status.success() {
            return Ok(false);
        }

        self.run_checked("new-session", &["new-session", "-d", "-s", session, "-n", "main"])
            .await?;
        Ok(true)
    }

    async fn create_window(
        &self,
        session: &str,
        window: &str,
        workdir: &str,
    ) -> Result<u32, MultiplexerError> {
        let target = format!("{}:", session_target(session));
        let name = escape_format(window);
        let start_dir = escape_format(workdir);
        let output = self
            .run_checked(
                "new-window",
                &[
                    "new-window",
                    "-d",
                    "-P",
                    "-F",
                    "#{window_id}",
                    "-t",
                    &target,
                    "-n",
                    &name,
                    "-c",
                    &start_dir,
                ],
            )
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_window_id(&stdout).ok_or_else(|| MultiplexerError::Output {
            operation: "new-window",
            output: stdout.trim().to_string(),
        })
    }

    async fn send_keys(
        &self,
        session: &str,
        window: &str,
        keys: &str,
        literal: bool,
    ) -> Result<(), MultiplexerError> {
        let target = window_target(session, window);
        let mut args = vec!["send-keys", "-t", target.as_str()];
        if literal {
            args.push("-l");
        }
        // Keystrokes that start with '-' must not be read as flags.
        args.push("--");
        args.push(keys);

        self.run_checked("send-keys", &args).await?;
        Ok(())
    }

    async fn capture_pane(
        &self,
        session: &str,
        window: &str,
        scrollback_lines: u32,
    ) -> Result<String, MultiplexerError> {
        let target = window_target(session, window);
        let start = format!("-{scrollback_lines}");
        let output = self
            .run(&["capture-pane", "-p", "-t", &target, "-S", &start])
            .await?;

        if !output.status.success() {
            debug!(
                target = %target,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "capture-pane failed, window probably gone"
            );
            return Ok(String::new());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn kill_window(&self, session: &str, window: &str) -> Result<(), MultiplexerError> {
        let target = window_target(session, window);
        self.run_checked("kill-window", &["kill-window", "-t", &target])
            .await?;
        Ok(())
    }
}
