//! Small helpers shared across modules.

use std::path::{Path, PathBuf};

/// Directory for per-session runtime files (lock, status, command drop).
///
/// Prefers `XDG_RUNTIME_DIR`, then `/run/user/{uid}` when it exists, then `/tmp`.
pub fn runtime_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(dir);
    }
    let user_dir = PathBuf::from(format!("/run/user/{}", nix::unistd::getuid()));
    if user_dir.is_dir() {
        user_dir
    } else {
        PathBuf::from("/tmp")
    }
}

/// Replace the home directory prefix with `~` for display.
pub fn private_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(rest) = path.strip_prefix(&home)
    {
        return format!("~/{}", rest.display());
    }
    path.display().to_string()
}

/// Check whether a process with the given PID is alive.
pub fn is_process_running(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

/// Format a second count as a compact human duration ("1h 30m", "45s").
pub fn format_duration_secs(secs: u32) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut parts = Vec::new();
    if h > 0 {
        parts.push(format!("{h}h"));
    }
    if m > 0 {
        parts.push(format!("{m}m"));
    }
    if s > 0 || parts.is_empty() {
        parts.push(format!("{s}s"));
    }
    parts.join(" ")
}
