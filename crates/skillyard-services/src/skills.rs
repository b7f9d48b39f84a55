//! Layered skill storage.
//!
//! Two roots per agent: a **baseline** layer shared by every user of the
//! agent, and a per-user **overlay** layer that shadows it copy-on-write.
//! Reads prefer overlay and fall back to baseline; overlay writes never
//! mutate baseline content. All storage operations run under the
//! namespace lock; command execution deliberately does not (a running
//! command may race a concurrent edit — inherited behavior, see DESIGN.md).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use skillyard_core::config::PathsConfig;
use skillyard_core::namespace::{validate_component, FILES_AREA};
use skillyard_core::skill::metadata::parse_descriptor;
use skillyard_core::{observability, scope, Error, Namespace, Result};
use skillyard_fs::{ops, LockTable};
use skillyard_sandbox::{
    run, CommandSpec, ExecutionLimits, ExecutionResult, SandboxContext, SkillArea,
};

use crate::archive;
use crate::types::{FileContent, LayerScope, SkillInfo, UploadOutcome};

/// Package manager over the baseline/overlay skill layers.
#[derive(Debug)]
pub struct SkillService {
    baseline_root: PathBuf,
    overlay_root: PathBuf,
    product_root: PathBuf,
    tools_dir: PathBuf,
    locks: Arc<LockTable>,
}

impl SkillService {
    pub fn new(paths: &PathsConfig, locks: Arc<LockTable>) -> Result<Self> {
        let baseline_root = paths.skill_root.join("baseline");
        let overlay_root = paths.skill_root.join("overlay");
        fs::create_dir_all(&baseline_root).map_err(|e| Error::io(&baseline_root, e))?;
        fs::create_dir_all(&overlay_root).map_err(|e| Error::io(&overlay_root, e))?;
        Ok(Self {
            baseline_root,
            overlay_root,
            product_root: paths.product_root.clone(),
            tools_dir: paths.tools_dir.clone(),
            locks,
        })
    }

    fn baseline_agent_dir(&self, ns: &Namespace) -> PathBuf {
        self.baseline_root.join(&ns.agent_id)
    }

    fn overlay_agent_dir(&self, ns: &Namespace) -> PathBuf {
        self.overlay_root.join(&ns.user_id).join(&ns.agent_id)
    }

    fn target_agent_dir(&self, ns: &Namespace, layer: LayerScope) -> PathBuf {
        match layer {
            LayerScope::Baseline => self.baseline_agent_dir(ns),
            LayerScope::Overlay => self.overlay_agent_dir(ns),
        }
    }

    fn check_namespace(ns: &Namespace) -> Result<()> {
        validate_component(&ns.user_id)?;
        validate_component(&ns.agent_id)?;
        Ok(())
    }

    /// Ingest an uploaded archive into one layer.
    ///
    /// Every top-level directory in the archive is one skill; each
    /// affected skill is fully replaced in the target layer, but skills
    /// the archive does not mention are left alone. Runs entirely under
    /// the write lock, so readers never observe a half-extracted skill.
    pub fn upload_package(
        &self,
        ns: &Namespace,
        bytes: &[u8],
        layer: LayerScope,
    ) -> Result<Vec<UploadOutcome>> {
        Self::check_namespace(ns)?;
        let target_dir = self.target_agent_dir(ns, layer);

        self.locks.with_write(&ns.lock_key(), || {
            fs::create_dir_all(&target_dir).map_err(|e| Error::io(&target_dir, e))?;

            let affected = archive::scan_skill_names(bytes)?;
            for skill in &affected {
                ops::delete_recursive(&target_dir.join(skill))?;
            }
            archive::extract_into(bytes, &target_dir)?;

            tracing::info!(
                namespace = %ns.lock_key(),
                layer = layer.tag(),
                skills = affected.len(),
                "skill package ingested"
            );

            Ok(affected
                .into_iter()
                .map(|skill| UploadOutcome {
                    storage_path: target_dir.join(&skill).to_string_lossy().replace('\\', "/"),
                    status: format!("Success ({})", layer.tag()),
                    skill_id: skill,
                })
                .collect())
        })
    }

    /// Merged listing: baseline entries in directory order, overlay
    /// entries overriding same-id skills in place and appending new ones.
    pub fn list_skills(&self, ns: &Namespace) -> Result<Vec<SkillInfo>> {
        Self::check_namespace(ns)?;
        let baseline = self.baseline_agent_dir(ns);
        let overlay = self.overlay_agent_dir(ns);

        self.locks.with_read(&ns.lock_key(), || {
            let mut merged: Vec<SkillInfo> = Vec::new();
            for dir in [&baseline, &overlay] {
                collect_skills(dir, &mut merged)?;
            }
            Ok(merged)
        })
    }

    /// Relative paths of every file in the resolved layer of one skill.
    pub fn list_files(&self, ns: &Namespace, skill_id: &str) -> Result<Vec<String>> {
        Self::check_namespace(ns)?;
        let dir = self.resolve_skill_dir(ns, skill_id)?;
        if !dir.exists() {
            return Err(Error::NotFound(format!("Skill not found: {}", skill_id)));
        }
        self.locks
            .with_read(&ns.lock_key(), || ops::list_files_recursive(&dir))
    }

    /// Read a skill file, overlay first, baseline as fallback.
    pub fn read_file(
        &self,
        ns: &Namespace,
        skill_id: &str,
        rel_path: &str,
        range: Option<(usize, usize)>,
    ) -> Result<FileContent> {
        Self::check_namespace(ns)?;
        validate_component(skill_id)?;
        let overlay_dir = self.overlay_agent_dir(ns).join(skill_id);
        let baseline_dir = self.baseline_agent_dir(ns).join(skill_id);

        let mut path = overlay_dir.join(rel_path);
        if !path.exists() {
            path = baseline_dir.join(rel_path);
        }
        let path = scope::validate_scope(&path, &[&overlay_dir, &baseline_dir])?;
        if !path.exists() {
            return Err(Error::NotFound(format!("{}/{}", skill_id, rel_path)));
        }

        self.locks
            .with_read(&ns.lock_key(), || read_content(&path, range))
    }

    /// Write a skill file into the layer selected by `layer`.
    ///
    /// A ranged overlay edit of a file that only exists in baseline first
    /// copies the baseline file into the overlay, so unedited lines match
    /// baseline and the baseline copy stays byte-for-byte unchanged.
    pub fn write_file(
        &self,
        ns: &Namespace,
        skill_id: &str,
        rel_path: &str,
        content: &str,
        range: Option<(usize, usize)>,
        layer: LayerScope,
    ) -> Result<()> {
        Self::check_namespace(ns)?;
        validate_component(skill_id)?;
        let target_dir = self.target_agent_dir(ns, layer).join(skill_id);
        let baseline_dir = self.baseline_agent_dir(ns).join(skill_id);

        let path = scope::validate_scope(&target_dir.join(rel_path), &[&target_dir])?;
        let baseline_file = scope::validate_scope(&baseline_dir.join(rel_path), &[&baseline_dir])?;

        self.locks.with_write(&ns.lock_key(), || match range {
            Some((start, end)) => {
                if layer == LayerScope::Overlay && !path.exists() && baseline_file.exists() {
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
                    }
                    fs::copy(&baseline_file, &path).map_err(|e| Error::io(&path, e))?;
                }
                ops::replace_line_range(&path, start, end, content)
            }
            None => ops::write_all(&path, content.as_bytes()),
        })
    }

    /// Directory backing `skill_id` for this namespace: overlay when it
    /// exists there, baseline otherwise.
    pub fn resolve_skill_dir(&self, ns: &Namespace, skill_id: &str) -> Result<PathBuf> {
        validate_component(skill_id)?;
        let overlay = self.overlay_agent_dir(ns).join(skill_id);
        if overlay.exists() {
            Ok(overlay)
        } else {
            Ok(self.baseline_agent_dir(ns).join(skill_id))
        }
    }

    /// Run a command with the skill's directory as working directory.
    pub fn execute_in_skill(
        &self,
        ns: &Namespace,
        skill_id: &str,
        spec: &CommandSpec,
    ) -> Result<ExecutionResult> {
        self.execute_in_skill_with_limits(ns, skill_id, spec, ExecutionLimits::from_env())
    }

    /// Like [`Self::execute_in_skill`] with an explicit wall-clock limit.
    ///
    /// Not covered by the storage lock.
    pub fn execute_in_skill_with_limits(
        &self,
        ns: &Namespace,
        skill_id: &str,
        spec: &CommandSpec,
        limits: ExecutionLimits,
    ) -> Result<ExecutionResult> {
        Self::check_namespace(ns)?;
        let skill_dir = self.resolve_skill_dir(ns, skill_id)?;
        if !skill_dir.exists() {
            return Err(Error::NotFound(format!("Skill not found: {}", skill_id)));
        }

        let ctx = SandboxContext {
            working_dir: skill_dir.clone(),
            skill_area: SkillArea::Single(skill_dir),
            files_area: self.product_root.join(&ns.agent_id).join(FILES_AREA),
            tools_dir: Some(self.tools_dir.clone()),
        };
        run_audited(&ns.lock_key(), spec, &ctx, limits)
    }
}

/// Shared execute path: audit the invocation, run, audit the outcome.
pub(crate) fn run_audited(
    lock_key: &str,
    spec: &CommandSpec,
    ctx: &SandboxContext,
    limits: ExecutionLimits,
) -> Result<ExecutionResult> {
    observability::audit_command_invoked(
        lock_key,
        &spec.display(),
        &ctx.working_dir.display().to_string(),
    );
    let started = Instant::now();
    let outcome = run(spec, ctx, limits);
    match &outcome {
        Ok(result) => observability::audit_execution_completed(
            lock_key,
            result.exit_code,
            started.elapsed().as_millis() as u64,
        ),
        Err(Error::Security(reason)) => observability::audit_security_rejection(lock_key, reason),
        Err(_) => {}
    }
    outcome
}

pub(crate) fn read_content(path: &Path, range: Option<(usize, usize)>) -> Result<FileContent> {
    match range {
        Some((start, end)) => {
            let lines = ops::read_line_range(path, start, end)?;
            Ok(FileContent {
                content: lines.join("\n"),
                lines,
            })
        }
        None => {
            let content = ops::read_to_string(path)?;
            Ok(FileContent {
                lines: content.lines().map(String::from).collect(),
                content,
            })
        }
    }
}

/// Append the skills found directly under `dir`, overriding same-id
/// entries in place so baseline ordering survives an overlay merge.
fn collect_skills(dir: &Path, merged: &mut Vec<SkillInfo>) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    let mut subdirs: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| Error::io(dir, e))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();

    for skill_dir in subdirs {
        let Some(skill_id) = skill_dir.file_name().map(|n| n.to_string_lossy().into_owned())
        else {
            continue;
        };
        let meta = parse_descriptor(&skill_dir);
        let info = SkillInfo {
            id: skill_id,
            name: meta.name,
            description: meta.description,
        };
        match merged.iter().position(|existing| existing.id == info.id) {
            Some(index) => merged[index] = info,
            None => merged.push(info),
        }
    }
    Ok(())
}
