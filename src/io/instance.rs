//! High-level instance management for duskshift processes.
//!
//! Builds on the lock primitives in [`crate::io::lock`]. The lock file records
//! the daemon's PID and its custom config directory, which lets client commands
//! find the daemon and reuse its configuration.

use anyhow::{Context, Result};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};

use crate::common::utils;
use crate::io::lock::{self, LockFile};
use crate::io::signals::{self, DaemonCommand};

/// Information about a running duskshift instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    pub pid: u32,
    /// Custom config directory if set
    pub config_dir: Option<PathBuf>,
}

impl InstanceInfo {
    /// Describe the current process.
    pub fn current() -> Self {
        Self {
            pid: std::process::id(),
            config_dir: crate::config::get_custom_config_dir(),
        }
    }

    /// Parse instance info from lock file contents.
    ///
    /// Line 1 is the PID, line 2 the config directory (empty for the default).
    pub fn from_lock_contents(contents: &str) -> Result<Self> {
        let mut lines = contents.lines();

        let pid = lines
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .context("Lock file is empty")?
            .parse::<u32>()
            .context("Invalid PID format in lock file")?;

        let config_dir = lines
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from);

        if lines.any(|line| !line.trim().is_empty()) {
            anyhow::bail!("Invalid lock file format (expected 1-2 lines)");
        }

        Ok(Self { pid, config_dir })
    }

    /// Serialize instance info to lock file format.
    pub fn to_lock_contents(&self) -> String {
        match &self.config_dir {
            Some(dir) => format!("{}\n{}\n", self.pid, dir.display()),
            None => format!("{}\n\n", self.pid),
        }
    }
}

/// Get information about the currently running duskshift instance.
///
/// Adopts the daemon's custom config directory for this process, so commands
/// such as `reload` read the same file the daemon does.
pub fn get_running_instance() -> Result<Option<InstanceInfo>> {
    let lock_content = match std::fs::read_to_string(lock::get_main_lock_path()) {
        Ok(content) => content,
        Err(_) => return Ok(None),
    };

    let info = InstanceInfo::from_lock_contents(&lock_content)?;

    if let Some(ref config_dir) = info.config_dir {
        // Already set when --config was passed explicitly
        let _ = crate::config::set_config_dir(Some(config_dir.display().to_string()));
    }

    if is_instance_running(info.pid) {
        Ok(Some(info))
    } else {
        Ok(None)
    }
}

/// Get just the PID of the running duskshift instance.
pub fn get_running_instance_pid() -> Result<u32> {
    get_running_instance()?
        .map(|info| info.pid)
        .ok_or_else(|| anyhow::anyhow!("No duskshift instance running"))
}

pub fn is_instance_running(pid: u32) -> bool {
    utils::is_process_running(pid)
}

fn send_signal(pid: u32, signal: Signal) -> Result<()> {
    let raw = i32::try_from(pid).context("PID out of range")?;
    kill(Pid::from_raw(raw), signal)
        .map_err(|e| anyhow::anyhow!("Failed to send {signal} to process {pid}: {e}"))
}

/// Terminate a duskshift instance by sending SIGTERM.
pub fn terminate_instance(pid: u32) -> Result<()> {
    send_signal(pid, Signal::SIGTERM)
}

/// Send a reload signal (SIGUSR2) to a running instance.
pub fn send_reload_signal(pid: u32) -> Result<()> {
    send_signal(pid, Signal::SIGUSR2)
}

/// Queue a command for a running instance and wake it with SIGUSR1.
pub fn send_command(pid: u32, command: &DaemonCommand) -> Result<()> {
    signals::write_command(pid, command)?;
    send_signal(pid, Signal::SIGUSR1)
}

/// Acquire the daemon lock, clearing stale locks on the way.
///
/// Returns `Ok(None)` when another live instance holds the lock; the conflict
/// has already been reported to the user.
pub fn ensure_single_instance() -> Result<Option<LockFile>> {
    let lock_path = lock::get_main_lock_path();

    if let Some(lock) = acquire_and_record(&lock_path)? {
        return Ok(Some(lock));
    }

    if !handle_instance_conflict(&lock_path) {
        return Ok(None);
    }

    match acquire_and_record(&lock_path)? {
        Some(lock) => Ok(Some(lock)),
        None => anyhow::bail!("Failed to acquire lock after conflict resolution"),
    }
}

fn acquire_and_record(lock_path: &Path) -> Result<Option<LockFile>> {
    let Some(mut lock) = LockFile::try_acquire(lock_path)? else {
        return Ok(None);
    };
    lock.write(&InstanceInfo::current().to_lock_contents())?;
    Ok(Some(lock))
}

/// Resolve a held lock. Returns `true` when the lock was stale and removed.
fn handle_instance_conflict(lock_path: &Path) -> bool {
    let lock_content = match std::fs::read_to_string(lock_path) {
        Ok(content) => content,
        Err(_) => return true,
    };

    let info = match InstanceInfo::from_lock_contents(&lock_content) {
        Ok(info) => info,
        Err(_) => {
            log_warning!("Lock file format invalid, removing");
            let _ = std::fs::remove_file(lock_path);
            return true;
        }
    };

    if !is_instance_running(info.pid) {
        log_warning!(
            "Removing stale lock file (process {} no longer running)",
            info.pid
        );
        let _ = std::fs::remove_file(lock_path);
        return true;
    }

    log_pipe!();
    log_error!("duskshift is already running (PID: {})", info.pid);
    log_block_start!("Did you mean to:");
    log_indented!("• Reload configuration: duskshift reload");
    log_indented!("• Toggle inversion: duskshift invert toggle");
    log_indented!("• Inspect the daemon: duskshift status");
    log_block_start!("Cannot start - another duskshift instance is running");
    log_end!();
    false
}
