use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

/// A tool definition parsed from a skill document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub parameters: Vec<SkillParameter>,
    pub implementation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub description: String,
}

/// `  - path (string): file to read`
static PARAMETER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*-\s+(\w+)\s*\((\w+)\):\s*(.*)$").expect("parameter pattern is valid")
});

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// Parse a skill document.
///
/// The grammar is line oriented and the first rule that matches a line wins:
///
/// | line                                | effect                          |
/// |-------------------------------------|---------------------------------|
/// | `# Skill: <name>` / `- Name: <name>` | set name (last one wins)        |
/// | `Description: ..` / `- Description: ..` | set description (last wins) |
/// | `- <ident> (<ident>): <text>`       | append a parameter              |
/// | contains `## Implementation`        | start capturing implementation  |
/// | a fence, while capturing            | stop, once something was captured |
/// | anything else, while capturing      | append verbatim                 |
///
/// `file_name`'s stem is the name unless the document sets one. Returns
/// `None` unless both name and description end up non-empty.
pub fn parse_skill(content: &str, file_name: &str) -> Option<Skill> {
    let mut name = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut description = String::new();
    let mut parameters = Vec::new();
    let mut implementation = String::new();
    let mut in_implementation = false;

    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("# Skill:") {
            name = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("Description:") {
            description = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("- Name:") {
            name = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("- Description:") {
            description = rest.trim().to_string();
        } else if let Some(caps) = PARAMETER_LINE.captures(line) {
            parameters.push(SkillParameter {
                name: caps[1].to_string(),
                param_type: caps[2].to_string(),
                description: caps[3].trim().to_string(),
            });
        } else if line.contains("## Implementation") {
            in_implementation = true;
        } else if in_implementation && is_fence(line) {
            // The opening fence arrives before any content and is skipped.
            if !implementation.is_empty() {
                in_implementation = false;
            }
        } else if in_implementation {
            implementation.push_str(line);
            implementation.push('\n');
        }
    }

    if name.is_empty() || description.is_empty() {
        return None;
    }

    Some(Skill {
        name,
        description,
        parameters,
        implementation: implementation.trim().to_string(),
    })
}
