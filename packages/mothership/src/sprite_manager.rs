use multiplexer::{Multiplexer, shell_quote};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::metrics::ServerMetrics;

/// A managed terminal session: one tmux window running one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sprite {
    pub id: String,
    /// Display label, also the tmux window name.
    pub name: String,
    pub window_id: u32,
    pub workdir: String,
    pub agent: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpriteError {
    #[error("sprite name must not be empty")]
    EmptyName,
    #[error("a sprite named '{0}' is already running")]
    NameInUse(String),
    /// tmux reads `.` and `:` in a target as pane and window separators.
    #[error("sprite name '{0}' must not contain '.' or ':'")]
    InvalidName(String),
}

/// Sprites in creation order plus the shared focus pointer.
///
/// Both live behind one lock so that removing the active sprite and picking
/// its replacement happen in a single step.
#[derive(Default)]
struct SpriteTable {
    sprites: Vec<Sprite>,
    active: Option<String>,
    /// Window names claimed by live sprites and by spawns still talking to tmux.
    names: HashSet<String>,
}

impl SpriteTable {
    fn get(&self, id: &str) -> Option<&Sprite> {
        self.sprites.iter().find(|s| s.id == id)
    }

    /// Remove by id, keeping the rest in creation order.
    fn remove(&mut self, id: &str) -> Option<Sprite> {
        let index = self.sprites.iter().position(|s| s.id == id)?;
        Some(self.sprites.remove(index))
    }

    fn active_sprite(&self) -> Option<&Sprite> {
        self.active.as_deref().and_then(|id| self.get(id))
    }
}

pub struct SpriteManager {
    table: RwLock<SpriteTable>,
    multiplexer: Arc<dyn Multiplexer>,
    session: String,
    default_agent: String,
    scrollback_lines: u32,
    id_counter: AtomicU64,
    window_counter: AtomicU32,
    metrics: Arc<ServerMetrics>,
}

impl SpriteManager {
    pub fn new(
        multiplexer: Arc<dyn Multiplexer>,
        session: impl Into<String>,
        default_agent: impl Into<String>,
        scrollback_lines: u32,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        Self {
            table: RwLock::new(SpriteTable::default()),
            multiplexer,
            session: session.into(),
            default_agent: default_agent.into(),
            scrollback_lines,
            id_counter: AtomicU64::new(0),
            window_counter: AtomicU32::new(0),
            metrics,
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    /// Make sure the backing tmux session exists. Failure is logged, not fatal.
    pub async fn ensure_session(&self) {
        match self.multiplexer.ensure_session(&self.session).await {
            Ok(true) => info!("[tmux] Created session: {}", self.session),
            Ok(false) => info!("[tmux] Session exists: {}", self.session),
            Err(e) => {
                self.metrics.adapter_error();
                warn!("[tmux] Could not ensure session {}: {}", self.session, e);
            }
        }
    }

    fn next_id(&self) -> String {
        let seq = self.id_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("sprite-{}-{}", chrono::Utc::now().timestamp_millis(), seq)
    }

    /// Create a window for a new sprite, start its agent, and focus it.
    ///
    /// Only name validation can fail; tmux failures degrade (fallback window
    /// number, agent not started) and are logged.
    pub async fn spawn(
        &self,
        name: &str,
        workdir: &str,
        agent: Option<&str>,
    ) -> Result<Sprite, SpriteError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SpriteError::EmptyName);
        }
        if name.contains(['.', ':']) {
            return Err(SpriteError::InvalidName(name.to_string()));
        }
        let agent = agent
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.default_agent)
            .to_string();

        {
            let mut table = self.table.write().await;
            if !table.names.insert(name.to_string()) {
                return Err(SpriteError::NameInUse(name.to_string()));
            }
        }

        let id = self.next_id();
        let fallback_window = self.window_counter.fetch_add(1, Ordering::SeqCst) + 1;

        let window_id = match self
            .multiplexer
            .create_window(&self.session, name, workdir)
            .await
        {
            Ok(window_id) => window_id,
            Err(e) => {
                self.metrics.adapter_error();
                warn!(
                    sprite = %id,
                    "Failed to create window '{}', using fallback number {}: {}",
                    name, fallback_window, e
                );
                fallback_window
            }
        };

        let launch = format!("cd -- {} && {}", shell_quote(workdir), shell_quote(&agent));
        if let Err(e) = self
            .multiplexer
            .send_keys(&self.session, name, &launch, true)
            .await
        {
            self.metrics.adapter_error();
            warn!(sprite = %id, "Failed to type launch command: {}", e);
        } else if let Err(e) = self
            .multiplexer
            .send_keys(&self.session, name, "Enter", false)
            .await
        {
            self.metrics.adapter_error();
            warn!(sprite = %id, "Failed to submit launch command: {}", e);
        }

        let sprite = Sprite {
            id: id.clone(),
            name: name.to_string(),
            window_id,
            workdir: workdir.to_string(),
            agent,
        };

        {
            let mut table = self.table.write().await;
            table.sprites.push(sprite.clone());
            // Focus follows the newest sprite.
            table.active = Some(id.clone());
        }

        self.metrics.sprite_spawned();
        info!("[sprite] Created: {} ({}) in {}", sprite.name, sprite.id, sprite.workdir);
        Ok(sprite)
    }

    /// Focus `id` if it names a live sprite. Returns whether focus changed hands.
    pub async fn switch_active(&self, id: &str) -> bool {
        let mut table = self.table.write().await;
        if table.get(id).is_none() {
            debug!("Ignoring switch to unknown sprite {}", id);
            return false;
        }
        table.active = Some(id.to_string());
        true
    }

    /// Close the sprite's window and forget it. Unknown ids are ignored.
    ///
    /// If the sprite had focus, focus moves to the oldest remaining sprite.
    pub async fn kill(&self, id: &str) -> bool {
        let sprite = match self.get(id).await {
            Some(sprite) => sprite,
            None => return false,
        };

        if let Err(e) = self
            .multiplexer
            .kill_window(&self.session, &sprite.name)
            .await
        {
            self.metrics.adapter_error();
            warn!(sprite = %id, "kill-window failed (window may already be gone): {}", e);
        }

        let mut table = self.table.write().await;
        // Another kill may have finished while we were waiting on tmux.
        if table.remove(id).is_none() {
            return false;
        }
        table.names.remove(&sprite.name);
        if table.active.as_deref() == Some(id) {
            table.active = table.sprites.first().map(|s| s.id.clone());
        }
        drop(table);

        self.metrics.sprite_killed();
        info!("[sprite] Killed: {}", sprite.name);
        true
    }

    /// Type `text` into the focused sprite, verbatim. No-op without focus.
    pub async fn send_input(&self, text: &str) {
        let Some(sprite) = self.active_sprite().await else {
            return;
        };

        if let Err(e) = self
            .multiplexer
            .send_keys(&self.session, &sprite.name, text, true)
            .await
        {
            self.metrics.adapter_error();
            warn!(sprite = %sprite.id, "Failed to forward input: {}", e);
        }
    }

    /// Capture the focused sprite's pane, or an empty string without focus.
    ///
    /// Focus is checked again once tmux answers; a capture for a sprite that
    /// lost focus or died in the meantime is discarded.
    pub async fn capture_active(&self) -> String {
        let Some(sprite) = self.active_sprite().await else {
            return String::new();
        };

        let text = match self
            .multiplexer
            .capture_pane(&self.session, &sprite.name, self.scrollback_lines)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                self.metrics.adapter_error();
                warn!(sprite = %sprite.id, "capture-pane failed: {}", e);
                return String::new();
            }
        };

        if self.active_id().await.as_deref() != Some(sprite.id.as_str()) {
            return String::new();
        }
        text
    }

    pub async fn get(&self, id: &str) -> Option<Sprite> {
        self.table.read().await.get(id).cloned()
    }

    /// All live sprites, oldest first.
    pub async fn list(&self) -> Vec<Sprite> {
        self.table.read().await.sprites.clone()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.sprites.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// The focused sprite's id. A pointer to a sprite that is gone reads as `None`.
    pub async fn active_id(&self) -> Option<String> {
        self.table.read().await.active_sprite().map(|s| s.id.clone())
    }

    pub async fn active_sprite(&self) -> Option<Sprite> {
        self.table.read().await.active_sprite().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FakeCall, FakeMultiplexer, test_sprite_manager};
    use std::collections::HashSet;
    use std::time::Duration;

    #[tokio::test]
    async fn spawn_build_scenario() {
        let (mgr, _fake) = test_sprite_manager();
        let sprite = mgr.spawn("build", "/home/u/proj", Some("claude")).await.unwrap();

        assert!(!sprite.id.is_empty());
        assert!(sprite.window_id > 0);
        assert_eq!(sprite.name, "build");
        assert_eq!(sprite.workdir, "/home/u/proj");
        assert_eq!(sprite.agent, "claude");
        assert_eq!(mgr.active_id().await, Some(sprite.id.clone()));
    }

    #[tokio::test]
    async fn spawn_issues_window_then_quoted_launch_line() {
        let (mgr, fake) = test_sprite_manager();
        mgr.spawn("build", "/tmp/it's here", Some("claude")).await.unwrap();

        assert_eq!(
            fake.calls(),
            vec![
                FakeCall::CreateWindow {
                    session: "test".into(),
                    window: "build".into(),
                    workdir: "/tmp/it's here".into(),
                },
                FakeCall::SendKeys {
                    session: "test".into(),
                    window: "build".into(),
                    keys: "cd -- '/tmp/it'\\''s here' && 'claude'".into(),
                    literal: true,
                },
                FakeCall::SendKeys {
                    session: "test".into(),
                    window: "build".into(),
                    keys: "Enter".into(),
                    literal: false,
                },
            ]
        );
    }

    #[tokio::test]
    async fn spawn_defaults_agent() {
        let (mgr, _fake) = test_sprite_manager();
        let sprite = mgr.spawn("a", "/tmp", None).await.unwrap();
        assert_eq!(sprite.agent, "claude");
        let sprite = mgr.spawn("b", "/tmp", Some("  ")).await.unwrap();
        assert_eq!(sprite.agent, "claude");
    }

    #[tokio::test]
    async fn spawn_falls_back_when_window_creation_fails() {
        let (mgr, fake) = test_sprite_manager();
        fake.fail_create_window(true);

        let first = mgr.spawn("a", "/tmp", None).await.unwrap();
        let second = mgr.spawn("b", "/tmp", None).await.unwrap();
        assert_eq!(first.window_id, 1);
        assert_eq!(second.window_id, 2);
        assert_eq!(mgr.len().await, 2);
    }

    #[tokio::test]
    async fn spawn_rejects_empty_and_duplicate_names() {
        let (mgr, fake) = test_sprite_manager();
        assert_eq!(mgr.spawn("  ", "/tmp", None).await, Err(SpriteError::EmptyName));

        mgr.spawn("build", "/tmp", None).await.unwrap();
        let calls_before = fake.calls().len();
        assert_eq!(
            mgr.spawn("build", "/tmp", None).await,
            Err(SpriteError::NameInUse("build".into()))
        );
        assert_eq!(fake.calls().len(), calls_before);
        assert_eq!(mgr.len().await, 1);
    }

    #[tokio::test]
    async fn name_is_reusable_after_kill() {
        let (mgr, _fake) = test_sprite_manager();
        let sprite = mgr.spawn("build", "/tmp", None).await.unwrap();
        assert!(mgr.kill(&sprite.id).await);
        assert!(mgr.spawn("build", "/tmp", None).await.is_ok());
    }

    #[tokio::test]
    async fn ids_unique_and_len_tracks_spawns_minus_kills() {
        let (mgr, _fake) = test_sprite_manager();
        let mut live: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for round in 0..20 {
            let sprite = mgr.spawn(&format!("s{round}"), "/tmp", None).await.unwrap();
            assert!(seen.insert(sprite.id.clone()), "duplicate id {}", sprite.id);
            live.push(sprite.id);

            if round % 3 == 2 {
                let victim = live.remove(round % live.len());
                assert!(mgr.kill(&victim).await);
            }
            assert_eq!(mgr.len().await, live.len());
        }
    }

    #[tokio::test]
    async fn newest_sprite_takes_focus() {
        let (mgr, _fake) = test_sprite_manager();
        let a = mgr.spawn("a", "/tmp", None).await.unwrap();
        assert!(mgr.switch_active(&a.id).await);
        let b = mgr.spawn("b", "/tmp", None).await.unwrap();
        assert_eq!(mgr.active_id().await, Some(b.id));
    }

    #[tokio::test]
    async fn switch_to_unknown_is_noop() {
        let (mgr, _fake) = test_sprite_manager();
        let a = mgr.spawn("a", "/tmp", None).await.unwrap();
        assert!(!mgr.switch_active("sprite-nope").await);
        assert_eq!(mgr.active_id().await, Some(a.id));
    }

    #[tokio::test]
    async fn killing_active_moves_focus_to_oldest_remaining() {
        let (mgr, _fake) = test_sprite_manager();
        let a = mgr.spawn("a", "/tmp", None).await.unwrap();
        let b = mgr.spawn("b", "/tmp", None).await.unwrap();
        let c = mgr.spawn("c", "/tmp", None).await.unwrap();

        assert!(mgr.kill(&c.id).await);
        assert_eq!(mgr.active_id().await, Some(a.id.clone()));

        assert!(mgr.kill(&a.id).await);
        assert_eq!(mgr.active_id().await, Some(b.id.clone()));

        assert!(mgr.kill(&b.id).await);
        assert_eq!(mgr.active_id().await, None);
    }

    #[tokio::test]
    async fn killing_inactive_keeps_focus() {
        let (mgr, _fake) = test_sprite_manager();
        let a = mgr.spawn("a", "/tmp", None).await.unwrap();
        let b = mgr.spawn("b", "/tmp", None).await.unwrap();

        assert!(mgr.kill(&a.id).await);
        assert_eq!(mgr.active_id().await, Some(b.id));
    }

    #[tokio::test]
    async fn kill_preserves_insertion_order() {
        let (mgr, _fake) = test_sprite_manager();
        mgr.spawn("a", "/tmp", None).await.unwrap();
        let b = mgr.spawn("b", "/tmp", None).await.unwrap();
        let c = mgr.spawn("c", "/tmp", None).await.unwrap();
        mgr.kill(&b.id).await;

        let names: Vec<String> = mgr.list().await.into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(mgr.active_id().await, Some(c.id));
    }

    #[tokio::test]
    async fn spawn_rejects_names_tmux_cannot_target() {
        let (mgr, fake) = test_sprite_manager();
        for name in ["v1.2", "host:web", "."] {
            assert_eq!(
                mgr.spawn(name, "/tmp", None).await,
                Err(SpriteError::InvalidName(name.to_string()))
            );
        }
        assert!(mgr.is_empty().await);
        assert!(fake.calls().is_empty());

        // The name is free for a valid spawn afterwards.
        assert!(mgr.spawn("v1-2", "/tmp", None).await.is_ok());
    }

    #[tokio::test]
    async fn format_sequence_name_reaches_adapter_verbatim() {
        let (mgr, fake) = test_sprite_manager();
        let name = "#(touch pwned)";
        let sprite = mgr.spawn(name, "/srv/#(id)", None).await.unwrap();
        assert_eq!(sprite.name, name);

        assert_eq!(
            fake.calls()[0],
            FakeCall::CreateWindow {
                session: "test".into(),
                window: name.into(),
                workdir: "/srv/#(id)".into(),
            }
        );
        // Typed into the shell as a single-quoted word, never evaluated.
        assert_eq!(
            fake.calls()[1],
            FakeCall::SendKeys {
                session: "test".into(),
                window: name.into(),
                keys: "cd -- '/srv/#(id)' && 'claude'".into(),
                literal: true,
            }
        );
    }

    #[tokio::test]
    async fn kill_unknown_is_noop() {
        let (mgr, fake) = test_sprite_manager();
        assert!(!mgr.kill("sprite-nope").await);
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn kill_window_failure_still_removes_sprite() {
        let (mgr, fake) = test_sprite_manager();
        fake.fail_kill_window(true);
        let a = mgr.spawn("a", "/tmp", None).await.unwrap();
        assert!(mgr.kill(&a.id).await);
        assert!(mgr.is_empty().await);
        assert_eq!(mgr.active_id().await, None);
    }

    #[tokio::test]
    async fn input_without_sprites_makes_no_adapter_call() {
        let (mgr, fake) = test_sprite_manager();
        mgr.send_input("ls\r").await;
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn input_goes_literally_to_active_window() {
        let (mgr, fake) = test_sprite_manager();
        mgr.spawn("a", "/tmp", None).await.unwrap();
        mgr.spawn("b", "/tmp", None).await.unwrap();
        fake.clear_calls();

        mgr.send_input("$(rm -rf ~)").await;
        assert_eq!(
            fake.calls(),
            vec![FakeCall::SendKeys {
                session: "test".into(),
                window: "b".into(),
                keys: "$(rm -rf ~)".into(),
                literal: true,
            }]
        );
    }

    #[tokio::test]
    async fn capture_without_focus_is_empty() {
        let (mgr, fake) = test_sprite_manager();
        assert_eq!(mgr.capture_active().await, "");
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn capture_uses_fixed_scrollback() {
        let (mgr, fake) = test_sprite_manager();
        mgr.spawn("a", "/tmp", None).await.unwrap();
        fake.set_capture_text("$ claude\n> hi\n");
        fake.clear_calls();

        assert_eq!(mgr.capture_active().await, "$ claude\n> hi\n");
        assert_eq!(
            fake.calls(),
            vec![FakeCall::CapturePane {
                session: "test".into(),
                window: "a".into(),
                scrollback_lines: 100,
            }]
        );
    }

    #[tokio::test]
    async fn capture_discarded_when_sprite_dies_mid_flight() {
        let fake = Arc::new(FakeMultiplexer::new());
        fake.set_capture_delay(Duration::from_millis(50));
        fake.set_capture_text("stale");
        let mgr = SpriteManager::new(
            fake.clone(),
            "test",
            "claude",
            100,
            Arc::new(ServerMetrics::new()),
        );
        let a = mgr.spawn("a", "/tmp", None).await.unwrap();

        let (text, killed) = tokio::join!(mgr.capture_active(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            mgr.kill(&a.id).await
        });
        assert!(killed);
        assert_eq!(text, "");
    }

    #[test]
    fn sprite_serializes_camel_case() {
        let sprite = Sprite {
            id: "sprite-1-1".into(),
            name: "build".into(),
            window_id: 3,
            workdir: "/tmp".into(),
            agent: "claude".into(),
        };
        let json = serde_json::to_value(&sprite).unwrap();
        assert_eq!(json["windowId"], 3);
        assert_eq!(json["workdir"], "/tmp");
        assert!(json.get("window_id").is_none());
    }
}
