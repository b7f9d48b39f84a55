//! Path-scope validation.
//!
//! Ensures caller-supplied paths stay within allowed roots, defending
//! against `../` traversal and archive-entry escapes. Validation is
//! lexical: `..` and `.` segments are folded before the prefix check and
//! symbolic links are NOT resolved, so targets that do not exist yet can
//! still be validated.

use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Lexically normalize a path: drop `.` segments and fold `..` against the
/// preceding segment. A `..` with nothing left to fold is kept, so an
/// escaping path can never satisfy a prefix check against a real root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                let folded = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if folded {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Ensure `target` stays inside at least one of `allowed_roots`.
///
/// Both sides are normalized before the component-wise prefix check.
/// Returns the normalized target on success. Must be called before every
/// filesystem read or mutation that takes a caller-supplied relative path.
pub fn validate_scope(target: &Path, allowed_roots: &[&Path]) -> Result<PathBuf> {
    let normalized = normalize(target);
    for root in allowed_roots {
        if normalized.starts_with(normalize(root)) {
            return Ok(normalized);
        }
    }
    Err(Error::Security(format!(
        "Access out of scope. Path: {}",
        target.display()
    )))
}
