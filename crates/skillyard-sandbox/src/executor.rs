//! Sandboxed process execution.
//!
//! Spawns a vetted command with a sanitized environment and pinned
//! working directory, drains stdout/stderr concurrently and enforces a
//! hard wall-clock timeout. Runs outside any storage lock.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use skillyard_core::{config, Error, Result};

use crate::policy::{DEFAULT_TIMEOUT_SECS, SAFE_ENV_VARS, SANDBOX_PATH};
use crate::validator::{self, CommandSpec, SandboxContext};

/// Conventional exit code when the command passed validation but could
/// not be spawned.
const LAUNCH_FAILURE_EXIT_CODE: i32 = 127;

/// Poll interval while waiting for the child.
const WAIT_POLL_MS: u64 = 50;

/// Grace period for the drain threads after the child is gone.
const DRAIN_GRACE_SECS: u64 = 1;

/// Captured output of a finished command. A non-zero `exit_code` is
/// ordinary data, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Wall-clock limit for one execution.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionLimits {
    pub timeout_secs: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ExecutionLimits {
    /// Load from SKILLYARD_TIMEOUT_SECS, defaulting to five minutes.
    pub fn from_env() -> Self {
        let timeout_secs = config::env_optional("SKILLYARD_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self { timeout_secs }
    }
}

/// Vet and run a command inside `ctx`.
///
/// Validation failures surface as Security errors before any side effect;
/// launch failures come back as a structured result with exit code 127 so
/// callers that only inspect `{stdout, stderr, exit_code}` still get a
/// coherent answer; exceeding the wall-clock limit kills the process and
/// returns a Timeout error.
pub fn run(
    spec: &CommandSpec,
    ctx: &SandboxContext,
    limits: ExecutionLimits,
) -> Result<ExecutionResult> {
    let in_scope_files = validator::validate(spec, ctx).map_err(Error::from)?;
    prepare_parent_dirs(&in_scope_files);

    tracing::debug!(
        command = %spec.display(),
        working_dir = %ctx.working_dir.display(),
        "spawning sandboxed command"
    );

    let mut cmd = build_command(spec, ctx);
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return Ok(ExecutionResult {
                stdout: String::new(),
                stderr: format!("Failed to start process: {}", e),
                exit_code: LAUNCH_FAILURE_EXIT_CODE,
            });
        }
    };

    wait_with_timeout(&mut child, limits.timeout_secs)
}

/// Best-effort side effect: create parent directories for in-scope file
/// arguments so the invoked program does not fail purely on a missing
/// directory. Failures are swallowed; the command surfaces its own error
/// if the path is truly unusable.
fn prepare_parent_dirs(files: &[PathBuf]) {
    for file in files {
        if let Some(parent) = file.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
}

fn build_command(spec: &CommandSpec, ctx: &SandboxContext) -> Command {
    let mut cmd = match spec {
        CommandSpec::Argv { program, args } => {
            let mut c = Command::new(program);
            c.args(args);
            c
        }
        CommandSpec::Shell(line) => {
            // Through the host interpreter so redirection and piping
            // syntax in the line is honored.
            if cfg!(windows) {
                let mut c = Command::new("cmd");
                c.arg("/c").arg(line);
                c
            } else {
                let mut c = Command::new("bash");
                c.arg("-c").arg(line);
                c
            }
        }
    };
    cmd.current_dir(&ctx.working_dir);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    sanitize_env(&mut cmd);
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Own process group, so a timeout kill reaches descendants too.
        cmd.process_group(0);
    }
    cmd
}

/// Keep only the fixed safe variable set and force PATH, discarding
/// everything else inherited from the host process.
#[cfg(unix)]
fn sanitize_env(cmd: &mut Command) {
    cmd.env_clear();
    for key in SAFE_ENV_VARS {
        if let Ok(value) = std::env::var(key) {
            cmd.env(key, value);
        }
    }
    cmd.env("PATH", SANDBOX_PATH);
}

/// `cmd /c` children need SystemRoot and friends to function, so the
/// clear-down applies on Unix only.
#[cfg(not(unix))]
fn sanitize_env(_cmd: &mut Command) {}

/// Wait for the child with a wall-clock timeout while draining both
/// output pipes on their own threads. A child writing more than the pipe
/// buffer would otherwise block forever against our wait loop.
fn wait_with_timeout(child: &mut Child, timeout_secs: u64) -> Result<ExecutionResult> {
    let start = Instant::now();
    let timeout = Duration::from_secs(timeout_secs);

    let stdout_rx = child.stdout.take().map(spawn_drain);
    let stderr_rx = child.stderr.take().map(spawn_drain);

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stdout = collect_drained(stdout_rx);
                let stderr = collect_drained(stderr_rx);
                return Ok(ExecutionResult {
                    stdout: decode_console(&stdout).trim_end().to_string(),
                    stderr: decode_console(&stderr).trim_end().to_string(),
                    exit_code: status.code().unwrap_or(-1),
                });
            }
            Ok(None) => {}
            Err(e) => {
                kill_process_tree(child);
                let _ = child.wait();
                return Err(Error::Io {
                    path: PathBuf::from("<child process>"),
                    source: e,
                });
            }
        }

        if start.elapsed() > timeout {
            tracing::warn!(timeout_secs, "execution timeout, killing process");
            kill_process_tree(child);
            let _ = child.wait();
            return Err(Error::Timeout(timeout_secs));
        }

        thread::sleep(Duration::from_millis(WAIT_POLL_MS));
    }
}

fn spawn_drain<R: Read + Send + 'static>(mut stream: R) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}

/// Join a drain thread through its channel with a bounded grace period;
/// an unresponsive drain yields empty output rather than a hung request.
fn collect_drained(rx: Option<mpsc::Receiver<Vec<u8>>>) -> Vec<u8> {
    rx.map(|rx| {
        rx.recv_timeout(Duration::from_secs(DRAIN_GRACE_SECS))
            .unwrap_or_default()
    })
    .unwrap_or_default()
}

/// Kill the child and, where the platform allows, its descendants.
#[cfg(unix)]
fn kill_process_tree(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;
    // The child was spawned as its own process group leader.
    let _ = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL);
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_process_tree(child: &mut Child) {
    let _ = child.kill();
}

/// Decode captured bytes with the platform console encoding.
#[cfg(windows)]
fn decode_console(bytes: &[u8]) -> String {
    let (decoded, _, _) = encoding_rs::GBK.decode(bytes);
    decoded.into_owned()
}

#[cfg(not(windows))]
fn decode_console(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
