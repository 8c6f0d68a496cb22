//! Skills
//!
//! Tool definitions authored as markdown documents in a directory, parsed
//! into [`Skill`] values, kept in a [`SkillRegistry`], and reloaded by a
//! [`SkillWatcher`] when the files change.

mod parser;
mod registry;
mod watcher;

pub use parser::{Skill, SkillParameter, parse_skill};
pub use registry::SkillRegistry;
pub use watcher::{SkillChange, SkillWatcher, apply_skill_change, is_skill_document};
