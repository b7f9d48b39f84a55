//! Skill descriptor parsing.
//!
//! Every skill may carry a `SKILL.md` descriptor at its root. Parsing is
//! deliberately forgiving: a missing file, a missing key or a malformed
//! line falls back to defaults instead of failing, so one bad skill never
//! aborts a listing.

use std::fs;
use std::path::Path;

use serde::Serialize;

/// Reserved descriptor filename at the root of every skill.
pub const DESCRIPTOR_FILE: &str = "SKILL.md";

/// Description used when the descriptor is missing or has no `description` key.
pub const DEFAULT_DESCRIPTION: &str = "No description available.";

/// Display metadata parsed from a skill descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillMetadata {
    pub name: String,
    pub description: String,
}

/// Parse the descriptor at the root of `skill_dir`.
///
/// Accepts `key: value` lines with half-width (`:`) or full-width (`：`)
/// colons, case-insensitive keys, and tolerates `---` delimiter lines
/// around the metadata block. Falls back to the directory name and a
/// placeholder description.
pub fn parse_descriptor(skill_dir: &Path) -> SkillMetadata {
    let mut meta = SkillMetadata {
        name: skill_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        description: DEFAULT_DESCRIPTION.to_string(),
    };

    let Ok(content) = fs::read_to_string(skill_dir.join(DESCRIPTOR_FILE)) else {
        return meta;
    };

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed == "---" {
            continue;
        }
        if let Some(value) = key_value(trimmed, "name") {
            meta.name = value.to_string();
        } else if let Some(value) = key_value(trimmed, "description") {
            meta.description = value.to_string();
        }
    }
    meta
}

/// Match a `key: value` line, case-insensitive key, `:` or `：` separator.
fn key_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let head = line.get(..key.len())?;
    if !head.eq_ignore_ascii_case(key) {
        return None;
    }
    let rest = &line[key.len()..];
    let value = rest
        .strip_prefix(':')
        .or_else(|| rest.strip_prefix('：'))?;
    Some(value.trim())
}
