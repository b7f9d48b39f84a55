//! Per-agent workspace operations.
//!
//! Every agent owns one workspace under the product root with two
//! operable subtrees, `skills/` and `files/`. Callers address content by
//! logical paths (`files/notes.txt`); physical resolution always goes
//! through scope validation. Locking is per agent id, shared across the
//! users of that agent.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use skillyard_core::config::PathsConfig;
use skillyard_core::namespace::{validate_component, FILES_AREA, SKILLS_AREA};
use skillyard_core::{scope, Error, Result};
use skillyard_fs::{ops, LockTable};
use skillyard_sandbox::{CommandSpec, ExecutionLimits, ExecutionResult, SandboxContext, SkillArea};

use crate::skills::{read_content, run_audited};
use crate::types::FileContent;

/// Workspace file operations and command execution for one agent root.
#[derive(Debug)]
pub struct WorkspaceService {
    product_root: PathBuf,
    tools_dir: PathBuf,
    locks: Arc<LockTable>,
}

impl WorkspaceService {
    pub fn new(paths: &PathsConfig, locks: Arc<LockTable>) -> Result<Self> {
        fs::create_dir_all(&paths.product_root).map_err(|e| Error::io(&paths.product_root, e))?;
        Ok(Self {
            product_root: paths.product_root.clone(),
            tools_dir: paths.tools_dir.clone(),
            locks,
        })
    }

    fn agent_root(&self, agent_id: &str) -> Result<PathBuf> {
        validate_component(agent_id)?;
        Ok(self.product_root.join(agent_id))
    }

    /// Map a logical path onto the agent's workspace. Only the `skills`
    /// and `files` subtrees are addressable.
    fn resolve_logical(&self, agent_id: &str, logical: &str) -> Result<PathBuf> {
        let normalized = logical.replace('\\', "/");
        let valid_prefix = normalized == SKILLS_AREA
            || normalized.starts_with("skills/")
            || normalized == FILES_AREA
            || normalized.starts_with("files/");
        if !valid_prefix {
            return Err(Error::Security(format!(
                "Path must start with 'skills/' or 'files/'. Current path: {}",
                logical
            )));
        }
        let root = self.agent_root(agent_id)?;
        scope::validate_scope(&root.join(&normalized), &[&root])
    }

    /// Store an uploaded blob under the `files/` subtree.
    ///
    /// Returns the logical path the file is now addressable by.
    pub fn store_file(&self, agent_id: &str, file_name: &str, bytes: &[u8]) -> Result<String> {
        let root = self.agent_root(agent_id)?;
        let target = scope::validate_scope(&root.join(FILES_AREA).join(file_name), &[&root])?;
        self.locks
            .with_write(agent_id, || ops::write_all(&target, bytes))?;
        Ok(format!("{}/{}", FILES_AREA, file_name))
    }

    /// Recursive listing below a logical prefix, relative to the agent root.
    pub fn list_files(&self, agent_id: &str, logical_prefix: &str) -> Result<Vec<String>> {
        let physical = self.resolve_logical(agent_id, logical_prefix)?;
        if !physical.exists() {
            return Err(Error::NotFound(format!("Path not found: {}", logical_prefix)));
        }
        let prefix = logical_prefix.trim_end_matches('/').replace('\\', "/");

        self.locks.with_read(agent_id, || {
            if physical.is_file() {
                return Ok(vec![prefix.clone()]);
            }
            Ok(ops::list_files_recursive(&physical)?
                .into_iter()
                .map(|rel| format!("{}/{}", prefix, rel))
                .collect())
        })
    }

    /// Read a workspace file, whole or as a clamped 1-based line range.
    pub fn read_content(
        &self,
        agent_id: &str,
        logical_path: &str,
        range: Option<(usize, usize)>,
    ) -> Result<FileContent> {
        let physical = self.resolve_logical(agent_id, logical_path)?;
        if !physical.exists() {
            return Err(Error::NotFound(format!("Path not found: {}", logical_path)));
        }
        self.locks
            .with_read(agent_id, || read_content(&physical, range))
    }

    /// Create or overwrite a workspace file; with a range, splice into it.
    pub fn write_content(
        &self,
        agent_id: &str,
        logical_path: &str,
        content: &str,
        range: Option<(usize, usize)>,
    ) -> Result<()> {
        let physical = self.resolve_logical(agent_id, logical_path)?;
        self.locks.with_write(agent_id, || match range {
            Some((start, end)) => ops::replace_line_range(&physical, start, end, content),
            None => ops::write_all(&physical, content.as_bytes()),
        })
    }

    /// Exact-match replacement gated on the expected occurrence count.
    pub fn precise_edit(
        &self,
        agent_id: &str,
        logical_path: &str,
        old: &str,
        new: &str,
        expected: usize,
    ) -> Result<()> {
        let physical = self.resolve_logical(agent_id, logical_path)?;
        if !physical.exists() {
            return Err(Error::NotFound(format!("Path not found: {}", logical_path)));
        }
        self.locks.with_write(agent_id, || {
            ops::precise_replace(&physical, old, new, expected)
        })
    }

    /// Run a command with the agent root as working directory.
    pub fn execute(&self, agent_id: &str, spec: &CommandSpec) -> Result<ExecutionResult> {
        self.execute_with_limits(agent_id, spec, ExecutionLimits::from_env())
    }

    /// Like [`Self::execute`] with an explicit wall-clock limit.
    ///
    /// Not covered by the storage lock: a running command may race a
    /// concurrent edit of the same workspace (inherited behavior, see
    /// DESIGN.md).
    pub fn execute_with_limits(
        &self,
        agent_id: &str,
        spec: &CommandSpec,
        limits: ExecutionLimits,
    ) -> Result<ExecutionResult> {
        let root = self.agent_root(agent_id)?;
        fs::create_dir_all(&root).map_err(|e| Error::io(&root, e))?;

        let ctx = SandboxContext {
            working_dir: root.clone(),
            skill_area: SkillArea::Collection(root.join(SKILLS_AREA)),
            files_area: root.join(FILES_AREA),
            tools_dir: Some(self.tools_dir.clone()),
        };
        run_audited(agent_id, spec, &ctx, limits)
    }
}
