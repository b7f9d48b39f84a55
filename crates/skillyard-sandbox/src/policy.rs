//! Fixed security policy for sandboxed command execution.

/// Commands that may be invoked inside a tenant workspace. Interpreters
/// plus a small set of core utilities; everything else is rejected.
pub const ALLOWED_COMMANDS: &[&str] = &[
    "python", "python3", "bash", "sh", "cmd", "ls", "cat", "echo", "grep", "sed", "mkdir",
    "touch", "cp", "mv", "rm", "tee", "find", "chmod", "xargs", "curl",
];

/// System-sensitive absolute prefixes that no argument may reference,
/// regardless of where in the argument the reference appears.
pub const SENSITIVE_PATH_PREFIXES: &[&str] = &["/etc", "/dev", "/proc", "/sys", "/root", "/boot"];

/// Environment variables preserved for spawned commands; everything else
/// inherited from the host process is discarded.
pub const SAFE_ENV_VARS: &[&str] = &["PATH", "LANG", "LC_ALL", "HOME", "USER", "PWD"];

/// PATH value forced into the sandboxed environment.
pub const SANDBOX_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Default wall-clock execution limit in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Fragments shorter than this are never treated as path candidates.
pub const MIN_PATH_FRAGMENT_LEN: usize = 3;
