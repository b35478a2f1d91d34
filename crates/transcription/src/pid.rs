//! Persisted PID record and orphan recovery.
//!
//! A single integer at a well-known path tracks the spawned backend across
//! application restarts. Absence means "no backend believed running";
//! presence means "attempt termination of this pid on next opportunity".
//! The record is cleared unconditionally after an attempt, success or not.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

/// Grace period between the graceful and forceful termination phases.
pub const STOP_GRACE: Duration = Duration::from_millis(200);

/// Well-known location of the PID record, under the project data dir.
pub fn record_path() -> PathBuf {
    match directories::ProjectDirs::from("", "", "subgen") {
        Some(dirs) => dirs.data_dir().join("server.pid"),
        None => std::env::temp_dir().join("subgen-server.pid"),
    }
}

/// Writes the record, creating parent directories as needed.
pub fn write_record(path: &Path, pid: u32) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, pid.to_string())
}

/// Reads the record. A missing or unparseable file reads as `None`.
pub fn read_record(path: &Path) -> Option<u32> {
    let text = std::fs::read_to_string(path).ok()?;
    text.trim().parse().ok()
}

/// Removes the record. Already-absent is success.
pub fn clear_record(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Two-phase termination of a process by pid: graceful signal, a short
/// grace period, then a forceful signal.
///
/// A pid that no longer exists counts as success — the signal commands
/// exiting non-zero is the normal "already gone" outcome and is only
/// logged at debug level. `Err` is reserved for not being able to issue
/// the signals at all.
pub async fn terminate_pid(pid: u32) -> io::Result<()> {
    match signal(pid, false).await {
        Ok(status) if status.success() => {
            tokio::time::sleep(STOP_GRACE).await;
            let _ = signal(pid, true).await;
        }
        Ok(_) => debug!(pid, "process already gone"),
        Err(e) => return Err(e),
    }
    Ok(())
}

#[cfg(unix)]
async fn signal(pid: u32, force: bool) -> io::Result<std::process::ExitStatus> {
    let sig = if force { "-KILL" } else { "-TERM" };
    Command::new("kill")
        .args([sig, &pid.to_string()])
        .output()
        .await
        .map(|o| o.status)
}

#[cfg(windows)]
async fn signal(pid: u32, force: bool) -> io::Result<std::process::ExitStatus> {
    let mut cmd = Command::new("taskkill");
    cmd.args(["/PID", &pid.to_string()]);
    if force {
        cmd.arg("/F");
    }
    cmd.output().await.map(|o| o.status)
}

/// Orphan recovery, run at application-lifecycle boundaries independent of
/// any active session: terminates whatever pid the record names, then
/// deletes the record.
pub async fn terminate_orphan(path: &Path) {
    let Some(pid) = read_record(path) else {
        debug!("no PID record, nothing to recover");
        return;
    };
    info!(pid, "terminating orphaned backend from a previous run");
    if let Err(e) = terminate_pid(pid).await {
        warn!(pid, error = %e, "failed to signal orphaned backend");
    }
    if let Err(e) = clear_record(path) {
        warn!(path = %path.display(), error = %e, "failed to clear PID record");
    }
}
