//! Command vetting.
//!
//! Every execution request passes this pipeline before anything is
//! spawned. The argv form is the canonical contract; the shell-string
//! form is a compatibility shim whose fragment scanning is heuristic and
//! cannot be made airtight against adversarial quoting.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use skillyard_core::scope;
use skillyard_core::skill::metadata::DESCRIPTOR_FILE;

use crate::policy::{ALLOWED_COMMANDS, MIN_PATH_FRAGMENT_LEN, SENSITIVE_PATH_PREFIXES};

/// A command to run: an explicit program plus argument vector, or a raw
/// shell line to be run through the host interpreter.
#[derive(Debug, Clone)]
pub enum CommandSpec {
    Argv { program: String, args: Vec<String> },
    Shell(String),
}

impl CommandSpec {
    /// The program name to check against the allowlist. For shell lines
    /// this is the first whitespace-delimited token, quotes stripped.
    pub fn program(&self) -> &str {
        match self {
            CommandSpec::Argv { program, .. } => program.trim(),
            CommandSpec::Shell(line) => {
                let first = line.trim().split_whitespace().next().unwrap_or("");
                first.trim_matches('"')
            }
        }
    }

    /// Full command text, for traversal scanning and audit records.
    pub fn display(&self) -> String {
        match self {
            CommandSpec::Argv { program, args } => {
                let mut out = program.clone();
                for arg in args {
                    out.push(' ');
                    out.push_str(arg);
                }
                out
            }
            CommandSpec::Shell(line) => line.clone(),
        }
    }

    /// Candidate fragments to scan: each argument for the argv form;
    /// quoted spans and unquoted metacharacter-free runs for shell lines.
    fn fragments(&self) -> Vec<String> {
        match self {
            CommandSpec::Argv { args, .. } => args.clone(),
            CommandSpec::Shell(line) => {
                let rest = line
                    .trim()
                    .split_once(char::is_whitespace)
                    .map(|(_, rest)| rest)
                    .unwrap_or("");
                shell_fragments(rest)
            }
        }
    }
}

/// Where a command is allowed to reach.
#[derive(Debug, Clone)]
pub struct SandboxContext {
    /// Directory the process will be pinned to.
    pub working_dir: PathBuf,
    /// The skill subtree reachable from this working directory.
    pub skill_area: SkillArea,
    /// Generic per-tenant files subtree.
    pub files_area: PathBuf,
    /// Shared read-only tools directory, when configured.
    pub tools_dir: Option<PathBuf>,
}

/// Shape of the reachable skill subtree.
#[derive(Debug, Clone)]
pub enum SkillArea {
    /// A directory holding one subdirectory per skill.
    Collection(PathBuf),
    /// The root of a single skill.
    Single(PathBuf),
}

impl SkillArea {
    fn root(&self) -> &Path {
        match self {
            SkillArea::Collection(p) | SkillArea::Single(p) => p,
        }
    }
}

impl SandboxContext {
    fn permitted_roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![
            scope::normalize(self.skill_area.root()),
            scope::normalize(&self.files_area),
        ];
        if let Some(tools) = &self.tools_dir {
            roots.push(scope::normalize(tools));
        }
        roots
    }

    fn permits(&self, resolved: &Path) -> bool {
        self.permitted_roots().iter().any(|r| resolved.starts_with(r))
    }

    fn under_working_dir_or_tools(&self, resolved: &Path) -> bool {
        resolved.starts_with(scope::normalize(&self.working_dir))
            || self
                .tools_dir
                .as_ref()
                .is_some_and(|t| resolved.starts_with(scope::normalize(t)))
    }
}

/// Rejection reasons, each carrying the offending token.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Command cannot be empty")]
    EmptyCommand,

    #[error("Command '{0}' is not allowed")]
    DisallowedCommand(String),

    #[error("Path traversal '..' is strictly forbidden")]
    ParentDirToken,

    #[error("Argument '{0}' references a protected system path")]
    SensitivePath(String),

    #[error("Path '{0}' is out of operable scope. Must stay under 'skills/', 'files/' or the shared tools directory")]
    OutOfScope(String),

    #[error("'SKILL.md' is a system reserved file. You can only reference it at the root of a skill (e.g., skills/my_skill/SKILL.md); got '{0}'")]
    ReservedDescriptor(String),
}

impl From<ValidationError> for skillyard_core::Error {
    fn from(err: ValidationError) -> Self {
        skillyard_core::Error::Security(err.to_string())
    }
}

/// Run the full vetting pipeline, fail-fast.
///
/// Returns the resolved in-scope file-like fragments so the executor can
/// pre-create their parent directories.
pub fn validate(
    spec: &CommandSpec,
    ctx: &SandboxContext,
) -> Result<Vec<PathBuf>, ValidationError> {
    let program = spec.program();
    if program.is_empty() {
        return Err(ValidationError::EmptyCommand);
    }
    if !ALLOWED_COMMANDS.contains(&program) {
        return Err(ValidationError::DisallowedCommand(program.to_string()));
    }

    if spec.display().contains("..") {
        return Err(ValidationError::ParentDirToken);
    }

    let fragments = spec.fragments();

    // Sensitive-prefix scan runs over every fragment, including flags,
    // before the path heuristics get a chance to skip them.
    for frag in &fragments {
        if references_sensitive_path(frag) {
            return Err(ValidationError::SensitivePath(frag.clone()));
        }
    }

    let mut in_scope_files = Vec::new();
    for frag in &fragments {
        if frag.len() < MIN_PATH_FRAGMENT_LEN
            || frag.starts_with('-')
            || frag.chars().all(|c| c.is_ascii_digit() || c == '.')
        {
            continue;
        }
        let path_like = frag.contains('/') || frag.contains('\\') || frag.contains('.');
        if !path_like {
            continue;
        }

        let cleaned = frag.replace('\\', "/");
        let candidate = Path::new(&cleaned);
        let resolved = if candidate.is_absolute() {
            scope::normalize(candidate)
        } else {
            scope::normalize(&ctx.working_dir.join(candidate))
        };

        if is_descriptor(&resolved) && !descriptor_at_skill_root(&resolved, &ctx.skill_area) {
            return Err(ValidationError::ReservedDescriptor(frag.clone()));
        }

        if !ctx.permits(&resolved) {
            return Err(ValidationError::OutOfScope(frag.clone()));
        }

        // Absolute arguments must additionally stay under the working
        // directory (or shared tools): another tenant's or another
        // skill's subtree is unreachable even when it is a skills area.
        if candidate.is_absolute() && !ctx.under_working_dir_or_tools(&resolved) {
            return Err(ValidationError::OutOfScope(frag.clone()));
        }

        if frag.contains('.') {
            in_scope_files.push(resolved);
        }
    }

    Ok(in_scope_files)
}

/// Quoted spans, or unquoted runs free of shell metacharacters.
fn shell_fragments(text: &str) -> Vec<String> {
    static FRAGMENT_RE: OnceLock<Regex> = OnceLock::new();
    let re = FRAGMENT_RE.get_or_init(|| {
        Regex::new(r#""([^"]+)"|([^\s><|&]+)"#).expect("static fragment regex")
    });
    re.captures_iter(text)
        .filter_map(|cap| cap.get(1).or_else(|| cap.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

fn references_sensitive_path(frag: &str) -> bool {
    let lowered = frag.replace('\\', "/").to_lowercase();
    SENSITIVE_PATH_PREFIXES.iter().any(|prefix| {
        lowered == *prefix || lowered.contains(&format!("{}/", prefix))
    })
}

fn is_descriptor(resolved: &Path) -> bool {
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().eq_ignore_ascii_case(DESCRIPTOR_FILE))
        .unwrap_or(false)
}

/// The descriptor may only sit at the root of one individual skill:
/// `<collection>/<skill>/SKILL.md`, or `<skill root>/SKILL.md`.
fn descriptor_at_skill_root(resolved: &Path, area: &SkillArea) -> bool {
    let (root, depth) = match area {
        SkillArea::Collection(root) => (root, 2),
        SkillArea::Single(root) => (root, 1),
    };
    match resolved.strip_prefix(scope::normalize(root)) {
        Ok(rel) => rel.components().count() == depth,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace_ctx() -> SandboxContext {
        SandboxContext {
            working_dir: PathBuf::from("/data/product/agent"),
            skill_area: SkillArea::Collection(PathBuf::from("/data/product/agent/skills")),
            files_area: PathBuf::from("/data/product/agent/files"),
            tools_dir: Some(PathBuf::from("/data/product/skill-creator")),
        }
    }

    fn skill_ctx() -> SandboxContext {
        SandboxContext {
            working_dir: PathBuf::from("/data/skill/baseline/agent/demo"),
            skill_area: SkillArea::Single(PathBuf::from("/data/skill/baseline/agent/demo")),
            files_area: PathBuf::from("/data/product/agent/files"),
            tools_dir: Some(PathBuf::from("/data/product/skill-creator")),
        }
    }

    fn shell(line: &str) -> CommandSpec {
        CommandSpec::Shell(line.to_string())
    }

    // ---- Allowlist ----

    #[test]
    fn test_unknown_command_rejected() {
        let result = validate(&shell("nmap -p 22 localhost"), &workspace_ctx());
        assert!(matches!(result, Err(ValidationError::DisallowedCommand(_))));
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(
            validate(&shell("   "), &workspace_ctx()),
            Err(ValidationError::EmptyCommand)
        ));
    }

    #[test]
    fn test_quoted_program_name_is_unwrapped() {
        let result = validate(&shell("\"echo\" hi"), &workspace_ctx());
        assert!(result.is_ok());
    }

    // ---- Traversal ----

    #[test]
    fn test_parent_dir_token_rejected() {
        let result = validate(&shell("cat skills/../../../etc/passwd"), &workspace_ctx());
        assert!(matches!(result, Err(ValidationError::ParentDirToken)));
    }

    #[test]
    fn test_parent_dir_token_in_argv_rejected() {
        let spec = CommandSpec::Argv {
            program: "cat".into(),
            args: vec!["skills/../secret".into()],
        };
        assert!(matches!(
            validate(&spec, &workspace_ctx()),
            Err(ValidationError::ParentDirToken)
        ));
    }

    // ---- Sensitive system paths ----

    #[test]
    fn test_rm_rf_etc_rejected() {
        let result = validate(&shell("rm -rf /etc"), &workspace_ctx());
        assert!(matches!(result, Err(ValidationError::SensitivePath(_))));
    }

    #[test]
    fn test_sensitive_path_inside_flag_rejected() {
        let result = validate(&shell("grep -f --file=/etc/passwd skills"), &workspace_ctx());
        assert!(matches!(result, Err(ValidationError::SensitivePath(_))));
    }

    #[test]
    fn test_proc_reference_rejected() {
        let result = validate(&shell("cat /proc/self/environ"), &workspace_ctx());
        assert!(matches!(result, Err(ValidationError::SensitivePath(_))));
    }

    // ---- Subtree containment ----

    #[test]
    fn test_relative_skills_path_accepted() {
        let result = validate(&shell("python3 skills/demo/main.py"), &workspace_ctx());
        assert!(result.is_ok());
    }

    #[test]
    fn test_relative_files_path_accepted() {
        let result = validate(&shell("cat files/notes.txt"), &workspace_ctx());
        assert!(result.is_ok());
    }

    #[test]
    fn test_out_of_scope_relative_path_rejected() {
        let result = validate(&shell("cat config.json"), &workspace_ctx());
        assert!(matches!(result, Err(ValidationError::OutOfScope(_))));
    }

    #[test]
    fn test_absolute_path_outside_workspace_rejected() {
        let result = validate(&shell("cat /tmp/loot.txt"), &workspace_ctx());
        assert!(matches!(result, Err(ValidationError::OutOfScope(_))));
    }

    #[test]
    fn test_absolute_path_into_other_agent_rejected() {
        // In scope of no permitted root, and not under the working dir.
        let result = validate(
            &shell("cat /data/product/other-agent/files/notes.txt"),
            &workspace_ctx(),
        );
        assert!(matches!(result, Err(ValidationError::OutOfScope(_))));
    }

    #[test]
    fn test_shared_tools_absolute_path_accepted() {
        let result = validate(
            &shell("python3 /data/product/skill-creator/init_skill.py files/out.txt"),
            &workspace_ctx(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_flags_and_numbers_are_ignored() {
        let result = validate(&shell("chmod 755 skills/demo/run.sh"), &workspace_ctx());
        assert!(result.is_ok());
    }

    #[test]
    fn test_version_like_fragment_is_ignored() {
        let result = validate(&shell("python3 skills/demo/main.py 1.2.3"), &workspace_ctx());
        assert!(result.is_ok());
    }

    #[test]
    fn test_quoted_fragment_with_spaces_is_scanned() {
        let result = validate(&shell("cat \"my secret notes.txt\""), &workspace_ctx());
        assert!(matches!(result, Err(ValidationError::OutOfScope(_))));
    }

    #[test]
    fn test_skill_context_allows_own_tree() {
        let result = validate(&shell("python3 main.py"), &skill_ctx());
        assert!(result.is_ok());
    }

    #[test]
    fn test_skill_context_rejects_sibling_skill_by_absolute_path() {
        let result = validate(
            &shell("cat /data/skill/baseline/agent/other/main.py"),
            &skill_ctx(),
        );
        assert!(matches!(result, Err(ValidationError::OutOfScope(_))));
    }

    // ---- Reserved descriptor ----

    #[test]
    fn test_descriptor_at_skill_root_accepted() {
        let result = validate(&shell("cat skills/demo/SKILL.md"), &workspace_ctx());
        assert!(result.is_ok());
    }

    #[test]
    fn test_descriptor_nested_too_deep_rejected() {
        let result = validate(&shell("cat skills/demo/docs/SKILL.md"), &workspace_ctx());
        assert!(matches!(
            result,
            Err(ValidationError::ReservedDescriptor(_))
        ));
    }

    #[test]
    fn test_descriptor_in_files_area_rejected() {
        let result = validate(&shell("tee files/SKILL.md"), &workspace_ctx());
        assert!(matches!(
            result,
            Err(ValidationError::ReservedDescriptor(_))
        ));
    }

    #[test]
    fn test_descriptor_case_insensitive() {
        let result = validate(&shell("cat skills/demo/docs/skill.md"), &workspace_ctx());
        assert!(matches!(
            result,
            Err(ValidationError::ReservedDescriptor(_))
        ));
    }

    #[test]
    fn test_descriptor_at_single_skill_root_accepted() {
        let result = validate(&shell("cat SKILL.md"), &skill_ctx());
        assert!(result.is_ok());
    }

    // ---- Collected in-scope files ----

    #[test]
    fn test_in_scope_file_fragments_are_returned() {
        let files = validate(&shell("tee files/reports/out.txt"), &workspace_ctx()).unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("/data/product/agent/files/reports/out.txt")]
        );
    }
}
