use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::parser::{Skill, parse_skill};
use super::watcher::is_skill_document;

/// Parsed skills keyed by name. Inserting an existing name replaces it.
#[derive(Default)]
pub struct SkillRegistry {
    skills: RwLock<HashMap<String, Skill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace, returning the skill previously stored under that name.
    pub async fn upsert(&self, skill: Skill) -> Option<Skill> {
        self.skills.write().await.insert(skill.name.clone(), skill)
    }

    pub async fn remove(&self, name: &str) -> Option<Skill> {
        self.skills.write().await.remove(name)
    }

    pub async fn get(&self, name: &str) -> Option<Skill> {
        self.skills.read().await.get(name).cloned()
    }

    /// All skills, sorted by name.
    pub async fn list(&self) -> Vec<Skill> {
        let mut skills: Vec<Skill> = self.skills.read().await.values().cloned().collect();
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        skills
    }

    pub async fn len(&self) -> usize {
        self.skills.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Parse every skill document in `dir` once, returning how many loaded.
    ///
    /// Unreadable and rejected documents are skipped with a log line. A
    /// missing directory leaves the registry empty.
    pub async fn load_dir(&self, dir: &Path) -> usize {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(_) => {
                info!("[skill] Skills directory not found: {}", dir.display());
                return 0;
            }
        };

        let mut loaded = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("[skill] Stopped reading {}: {}", dir.display(), e);
                    break;
                }
            };

            let path = entry.path();
            if !is_skill_document(&path) {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();

            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("[skill] Could not read {}: {}", path.display(), e);
                    continue;
                }
            };

            match parse_skill(&content, &file_name) {
                Some(skill) => {
                    info!("[skill] Loaded: {}", skill.name);
                    self.upsert(skill).await;
                    loaded += 1;
                }
                None => info!("[skill] Rejected {}: missing name or description", file_name),
            }
        }
        loaded
    }
}
