//! Serde-serializable interface types consumed by the HTTP entry.

use serde::{Deserialize, Serialize};

/// One entry of the merged skill listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Outcome for one skill affected by an archive upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub skill_id: String,
    pub storage_path: String,
    pub status: String,
}

/// File read response: the whole text plus its individual lines.
#[derive(Debug, Clone, Serialize)]
pub struct FileContent {
    pub content: String,
    pub lines: Vec<String>,
}

/// Storage layer a write is directed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerScope {
    /// Shared per-agent content, update-managed.
    Baseline,
    /// Per-user copy-on-write content shadowing baseline.
    Overlay,
}

impl LayerScope {
    /// Parse a request parameter; anything other than "baseline" means overlay.
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some(v) if v.eq_ignore_ascii_case("baseline") => LayerScope::Baseline,
            _ => LayerScope::Overlay,
        }
    }

    /// Human tag used in upload statuses.
    pub fn tag(&self) -> &'static str {
        match self {
            LayerScope::Baseline => "Baseline",
            LayerScope::Overlay => "Overlay",
        }
    }
}
