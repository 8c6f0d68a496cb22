use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

// =============================================================================
// Server config (figment-deserialized from defaults / env vars only)
// =============================================================================
//
// Two layers of environment, lowest priority first:
//
//   MOTHERSHIP_SESSION_NAME=agents     (prefixed, any field)
//   PORT=9090 / SKILLS_DIR=/srv/skills (bare, just these two)

/// Runtime configuration for the server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory of skill documents (`*.md`).
    #[serde(default = "default_skills_dir")]
    pub skills_dir: PathBuf,
    /// tmux session that holds one window per sprite.
    #[serde(default = "default_session_name")]
    pub session_name: String,
    /// Agent launched when a spawn request does not name one.
    #[serde(default = "default_agent")]
    pub default_agent: String,
    #[serde(default = "default_stream_interval_ms")]
    pub stream_interval_ms: u64,
    /// History lines captured above the visible pane.
    #[serde(default = "default_scrollback_lines")]
    pub scrollback_lines: u32,
    #[serde(default)]
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            skills_dir: default_skills_dir(),
            session_name: default_session_name(),
            default_agent: default_agent(),
            stream_interval_ms: default_stream_interval_ms(),
            scrollback_lines: default_scrollback_lines(),
            debug: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_skills_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mothership")
        .join("skills")
}
fn default_session_name() -> String {
    "mothership".to_string()
}
fn default_agent() -> String {
    "claude".to_string()
}
fn default_stream_interval_ms() -> u64 {
    100
}
fn default_scrollback_lines() -> u32 {
    100
}

/// Build the figment: defaults → `MOTHERSHIP_*` → bare `PORT` / `SKILLS_DIR`.
pub fn load_config() -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Serialized},
    };

    Figment::from(Serialized::defaults(ServerConfig::default()))
        .merge(Env::prefixed("MOTHERSHIP_"))
        .merge(Env::raw().only(&["port", "skills_dir"]))
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_figment(load_config())
    }

    pub fn from_figment(figment: figment::Figment) -> Result<Self> {
        let config: Self = figment
            .extract()
            .context("Invalid server configuration")?;
        if config.stream_interval_ms == 0 {
            anyhow::bail!("stream_interval_ms must be greater than zero");
        }
        Ok(config)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }

    pub fn stream_interval(&self) -> Duration {
        Duration::from_millis(self.stream_interval_ms)
    }
}
