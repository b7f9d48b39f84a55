//! Safe file primitives.
//!
//! These run inside a [`crate::LockTable`] guard taken by the caller; none
//! of them lock on their own. All ranged operations use 1-based inclusive
//! line numbers, clamped to the current file bounds.

use std::fs;
use std::io;
use std::path::Path;

use skillyard_core::{Error, Result};
use walkdir::WalkDir;

/// Read the full contents of a file. Fails with NotFound when absent.
pub fn read_all(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::io(path, e))
}

/// Read a file as UTF-8 text, replacing invalid sequences.
pub fn read_to_string(path: &Path) -> Result<String> {
    Ok(String::from_utf8_lossy(&read_all(path)?).into_owned())
}

/// Read a file as a list of lines.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    Ok(read_to_string(path)?.lines().map(String::from).collect())
}

/// Read the 1-based inclusive line range `[start, end]`.
///
/// Values below 1 clamp to the first line; ranges past end-of-file clamp
/// to the last line.
pub fn read_line_range(path: &Path, start: usize, end: usize) -> Result<Vec<String>> {
    let skip = start.saturating_sub(1);
    let take = end.saturating_add(1).saturating_sub(start);
    Ok(read_lines(path)?.into_iter().skip(skip).take(take).collect())
}

/// Truncate-write `bytes`, creating parent directories as needed.
pub fn write_all(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(path, bytes).map_err(|e| Error::io(path, e))
}

/// Splice `content` over the 1-based inclusive line range `[start, end]`.
///
/// Indices are clipped to `[0, line_count]`; a missing file is treated as
/// empty, so the splice creates it.
pub fn replace_line_range(path: &Path, start: usize, end: usize, content: &str) -> Result<()> {
    let mut lines: Vec<String> = if path.exists() {
        read_lines(path)?
    } else {
        Vec::new()
    };
    let new_lines: Vec<String> = if content.is_empty() {
        vec![String::new()]
    } else {
        content.lines().map(String::from).collect()
    };

    let start_idx = start.saturating_sub(1).min(lines.len());
    let end_idx = end.min(lines.len()).max(start_idx);
    lines.splice(start_idx..end_idx, new_lines);

    write_all(path, join_lines(&lines).as_bytes())
}

/// Replace every occurrence of `old` with `new`, but only when the number
/// of non-overlapping left-to-right occurrences equals `expected`.
///
/// On mismatch the file is left untouched and the error carries the
/// actual count so the caller can refine its search string.
pub fn precise_replace(path: &Path, old: &str, new: &str, expected: usize) -> Result<()> {
    let content = read_to_string(path)?;
    let actual = content.matches(old).count();
    if actual != expected {
        return Err(Error::EditMismatch {
            needle: old.to_string(),
            expected,
            actual,
        });
    }
    write_all(path, content.replace(old, new).as_bytes())
}

/// Remove a file or directory tree. Missing paths are a no-op.
pub fn delete_recursive(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).map_err(|e| Error::io(path, e)),
        Ok(_) => fs::remove_file(path).map_err(|e| Error::io(path, e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// All regular files below `root`, as sorted forward-slash relative paths.
pub fn list_files_recursive(root: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::io(root, e.into()))?;
        if entry.file_type().is_file() {
            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            files.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(files)
}

fn join_lines(lines: &[String]) -> String {
    if lines.is_empty() {
        String::new()
    } else {
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}
