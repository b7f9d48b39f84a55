//! Entry-neutral service layer for Skillyard.
//!
//! The (external) HTTP entry maps routes onto these services; everything
//! here is transport-agnostic. [`SkillService`] owns the layered
//! baseline/overlay package store, [`WorkspaceService`] owns the
//! per-agent `skills/` + `files/` workspace and command execution. Both
//! share one [`LockTable`] so skill-layer and workspace operations on the
//! same tenant serialize correctly.

use std::sync::Arc;

use skillyard_core::config::PathsConfig;
use skillyard_core::Result;
use skillyard_fs::LockTable;

pub mod archive;
pub mod skills;
pub mod types;
pub mod workspace;

pub use skills::SkillService;
pub use types::{FileContent, LayerScope, SkillInfo, UploadOutcome};
pub use workspace::WorkspaceService;

pub use skillyard_sandbox::{CommandSpec, ExecutionLimits, ExecutionResult};

/// Both services wired over one shared lock table.
#[derive(Debug)]
pub struct Services {
    pub skills: SkillService,
    pub workspace: WorkspaceService,
}

impl Services {
    pub fn new(paths: &PathsConfig) -> Result<Self> {
        let locks = Arc::new(LockTable::new());
        Ok(Self {
            skills: SkillService::new(paths, Arc::clone(&locks))?,
            workspace: WorkspaceService::new(paths, locks)?,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(&PathsConfig::from_env())
    }
}
