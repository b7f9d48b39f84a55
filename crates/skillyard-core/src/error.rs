use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Error taxonomy shared by the storage engine, package manager and
/// execution sandbox.
///
/// Security violations are always raised before any side effect and carry
/// the offending token. A non-zero exit code from a sandboxed command is
/// ordinary data, not an error; only validation failures, archive/storage
/// failures and timeouts surface here.
#[derive(Debug, Error)]
pub enum Error {
    /// Scope escape, disallowed command, or out-of-scope path argument.
    #[error("Security Error: {0}")]
    Security(String),

    /// Missing file, skill or path.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Precise edit declined: the occurrence count did not match.
    #[error("Edit Mismatch: '{needle}' found {actual} times, but expected {expected} times. Please refine your search string.")]
    EditMismatch {
        needle: String,
        expected: usize,
        actual: usize,
    },

    /// Archive could not be decoded or extracted under any attempted encoding.
    #[error("Archive error: {0}")]
    Archive(String),

    /// Underlying storage failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Process exceeded the wall-clock limit and was forcibly killed.
    #[error("Execution Timeout: process killed after {0} seconds")]
    Timeout(u64),
}

impl Error {
    /// Wrap an I/O error with the path it occurred at, mapping a missing
    /// file to [`Error::NotFound`].
    pub fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Error::NotFound(path.display().to_string())
        } else {
            Error::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
