//! Skill hot reload
//!
//! A notify watcher on the skills directory feeds changed paths into a
//! single task that re-reads each document and updates the registry.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::parser::{Skill, parse_skill};
use super::registry::SkillRegistry;
use crate::metrics::ServerMetrics;
use crate::ws::{ConnectionHub, ServerMessage};

const SKILL_EXTENSION: &str = "md";

pub fn is_skill_document(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SKILL_EXTENSION)
}

/// What a single file event did to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillChange {
    /// Parsed and upserted; `SKILL_LOADED` was broadcast.
    Loaded(Skill),
    /// Readable but missing a name or description. Registry untouched.
    Rejected(PathBuf),
    /// Unreadable, treated as deleted; the skill keyed by the file stem is gone.
    Removed(String),
}

/// React to a change of `path`. Returns `None` for files that are not skill
/// documents.
pub async fn apply_skill_change(
    path: &Path,
    registry: &SkillRegistry,
    hub: &ConnectionHub,
    metrics: &ServerMetrics,
) -> Option<SkillChange> {
    if !is_skill_document(path) {
        return None;
    }
    let file_name = path.file_name()?.to_string_lossy().into_owned();

    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            let stem = path.file_stem()?.to_string_lossy().into_owned();
            debug!("[skill] {} unreadable ({}), treating as deleted", file_name, e);
            registry.remove(&stem).await;
            info!("[skill] Removed: {}", stem);
            return Some(SkillChange::Removed(stem));
        }
    };

    match parse_skill(&content, &file_name) {
        Some(skill) => {
            registry.upsert(skill.clone()).await;
            metrics.record_skills_loaded(1);
            info!("[skill] Reloaded: {}", skill.name);
            hub.broadcast(ServerMessage::SkillLoaded(skill.clone())).await;
            Some(SkillChange::Loaded(skill))
        }
        None => {
            info!("[skill] Rejected {}: missing name or description", file_name);
            Some(SkillChange::Rejected(path.to_path_buf()))
        }
    }
}

/// Keeps the filesystem watch alive. Dropping it stops hot reload.
pub struct SkillWatcher {
    _watcher: RecommendedWatcher,
    dir: PathBuf,
}

impl std::fmt::Debug for SkillWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillWatcher")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl SkillWatcher {
    /// Watch `dir` and apply changes until `cancel` fires.
    ///
    /// Returns `None`, after one log line, when the directory is missing or
    /// cannot be watched. Must be called from inside a tokio runtime.
    pub fn start(
        dir: &Path,
        registry: Arc<SkillRegistry>,
        hub: Arc<ConnectionHub>,
        metrics: Arc<ServerMetrics>,
        cancel: CancellationToken,
    ) -> Option<Self> {
        if !dir.is_dir() {
            info!("[skill] Cannot watch skills directory: {} not found", dir.display());
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel::<PathBuf>();
        let handler = move |result: notify::Result<Event>| match result {
            Ok(event) => {
                if !matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    return;
                }
                for path in event.paths {
                    if is_skill_document(&path) {
                        // Receiver gone means the reload task stopped.
                        let _ = tx.send(path);
                    }
                }
            }
            Err(e) => warn!("[skill] Watch error: {}", e),
        };

        let mut watcher = match notify::recommended_watcher(handler) {
            Ok(watcher) => watcher,
            Err(e) => {
                warn!("[skill] Cannot watch skills directory: {}", e);
                return None;
            }
        };
        if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
            warn!("[skill] Cannot watch skills directory {}: {}", dir.display(), e);
            return None;
        }

        tokio::spawn(run_reload_loop(rx, registry, hub, metrics, cancel));
        info!("[skill] Watching: {}", dir.display());

        Some(Self {
            _watcher: watcher,
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

async fn run_reload_loop(
    mut rx: mpsc::UnboundedReceiver<PathBuf>,
    registry: Arc<SkillRegistry>,
    hub: Arc<ConnectionHub>,
    metrics: Arc<ServerMetrics>,
    cancel: CancellationToken,
) {
    loop {
        let path = tokio::select! {
            _ = cancel.cancelled() => break,
            path = rx.recv() => match path {
                Some(path) => path,
                None => break,
            },
        };
        apply_skill_change(&path, &registry, &hub, &metrics).await;
    }
    debug!("[skill] Reload loop stopped");
}
