//! Observability: tracing init, audit log, security events.
//!
//! Uses [`crate::config::ObservabilityConfig`] for SKILLYARD_QUIET,
//! LOG_LEVEL, LOG_JSON and AUDIT_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

static AUDIT_PATH: OnceLock<Option<String>> = OnceLock::new();

/// Initialize tracing. Call once at process startup.
///
/// `RUST_LOG` takes precedence; otherwise SKILLYARD_LOG_LEVEL applies, and
/// SKILLYARD_QUIET=1 restricts output to warnings.
pub fn init_tracing() {
    let cfg = crate::config::ObservabilityConfig::from_env();
    let level = if cfg.quiet {
        "skillyard=warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

fn audit_path() -> Option<&'static str> {
    AUDIT_PATH
        .get_or_init(|| {
            let path = crate::config::ObservabilityConfig::from_env().audit_log?;
            if let Some(parent) = Path::new(&path).parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            Some(path)
        })
        .as_deref()
}

fn append_jsonl(record: &serde_json::Value) {
    let Some(path) = audit_path() else { return };
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

/// Audit: a vetted command is about to be spawned.
pub fn audit_command_invoked(lock_key: &str, command: &str, working_dir: &str) {
    tracing::info!(target: "skillyard::audit", %lock_key, %command, %working_dir, "command invoked");
    append_jsonl(&json!({
        "ts": Utc::now().to_rfc3339(),
        "event": "command_invoked",
        "namespace": lock_key,
        "command": command,
        "working_dir": working_dir,
    }));
}

/// Audit: a request was rejected on security grounds.
pub fn audit_security_rejection(lock_key: &str, reason: &str) {
    tracing::warn!(target: "skillyard::audit", %lock_key, %reason, "security rejection");
    append_jsonl(&json!({
        "ts": Utc::now().to_rfc3339(),
        "event": "security_rejection",
        "namespace": lock_key,
        "reason": reason,
    }));
}

/// Audit: a command finished (or was killed).
pub fn audit_execution_completed(lock_key: &str, exit_code: i32, duration_ms: u64) {
    tracing::info!(target: "skillyard::audit", %lock_key, exit_code, duration_ms, "execution completed");
    append_jsonl(&json!({
        "ts": Utc::now().to_rfc3339(),
        "event": "execution_completed",
        "namespace": lock_key,
        "exit_code": exit_code,
        "duration_ms": duration_ms,
    }));
}
