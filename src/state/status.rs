//! Daemon status snapshot shared with `duskshift status`.
//!
//! The runtime loop rewrites the snapshot after every iteration. Writes go to a
//! temporary file that is renamed into place, so readers never see a partial
//! document.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::common::constants::STATUS_FILE_NAME;
use crate::common::utils::runtime_dir;
use crate::core::EngineStatus;
use crate::core::schedule::format_clock;
use crate::core::wake::Wake;

/// Boundaries of the active schedule as `HH:MM:SS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTimes {
    pub night_start: String,
    pub night_end: String,
    pub day_start: String,
    pub day_end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub pid: u32,
    pub backend: String,
    pub running: bool,
    pub phase: Option<String>,
    pub temperature: Option<u32>,
    /// Reason for the current inversion, `None` when not inverted.
    pub inverted: Option<String>,
    #[serde(default)]
    pub requests: Vec<String>,
    pub paused: bool,
    pub next_wake: Option<String>,
    pub schedule: Option<ScheduleTimes>,
    pub updated_at: DateTime<Local>,
}

impl StatusSnapshot {
    pub fn new(status: Option<EngineStatus>, backend: &str, now: DateTime<Local>) -> Self {
        let mut snapshot = Self {
            pid: std::process::id(),
            backend: backend.to_string(),
            running: status.is_some(),
            phase: None,
            temperature: None,
            inverted: None,
            requests: Vec::new(),
            paused: false,
            next_wake: None,
            schedule: None,
            updated_at: now,
        };

        if let Some(status) = status {
            snapshot.phase = status.phase.map(|p| p.display_name().to_string());
            snapshot.temperature = status.temperature.map(|t| t.round() as u32);
            snapshot.inverted = status.inverted;
            snapshot.requests = status.requests;
            snapshot.paused = status.paused;
            snapshot.next_wake = describe_wake(status.wake);
            snapshot.schedule = Some(ScheduleTimes {
                night_start: format_clock(status.schedule.night_start),
                night_end: format_clock(status.schedule.night_end),
                day_start: format_clock(status.schedule.day_start),
                day_end: format_clock(status.schedule.day_end),
            });
        }
        snapshot
    }
}

fn describe_wake(wake: Wake) -> Option<String> {
    match wake {
        Wake::Idle => None,
        Wake::At(secs) => Some(format_clock(secs)),
        Wake::Every(period) => Some(format!("every {}s", period.as_secs())),
    }
}

pub fn status_path() -> PathBuf {
    runtime_dir().join(STATUS_FILE_NAME)
}

pub fn write_status(snapshot: &StatusSnapshot) -> Result<()> {
    let path = status_path();
    let temp_path = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(&temp_path, json)
        .with_context(|| format!("Failed to write status to {}", temp_path.display()))?;
    fs::rename(&temp_path, &path).context("Failed to move status file into place")?;
    Ok(())
}

/// Read the snapshot, `None` when no daemon has written one.
pub fn read_status() -> Result<Option<StatusSnapshot>> {
    let path = status_path();
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };
    let snapshot = serde_json::from_str(&content).context("Status file is malformed")?;
    Ok(Some(snapshot))
}

pub fn remove_status() {
    let _ = fs::remove_file(status_path());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::phase::Phase;
    use crate::core::schedule::Schedule;
    use serial_test::serial;
    use std::time::Duration;
    use tempfile::tempdir;

    const H: u32 = 3600;

    fn running_status() -> EngineStatus {
        EngineStatus {
            schedule: Schedule::derive(21 * H, 7 * H, 4 * H).unwrap(),
            phase: Some(Phase::Dusk),
            temperature: Some(4650.4),
            inverted: Some("user".to_string()),
            requests: vec!["movie".to_string()],
            paused: false,
            wake: Wake::Every(Duration::from_secs(72)),
        }
    }

    #[test]
    fn test_snapshot_from_running_engine() {
        let snapshot = StatusSnapshot::new(Some(running_status()), "Wayland", Local::now());
        assert!(snapshot.running);
        assert_eq!(snapshot.phase.as_deref(), Some("Dusk"));
        assert_eq!(snapshot.temperature, Some(4650));
        assert_eq!(snapshot.inverted.as_deref(), Some("user"));
        assert_eq!(snapshot.requests, vec!["movie".to_string()]);
        assert_eq!(snapshot.next_wake.as_deref(), Some("every 72s"));
        let schedule = snapshot.schedule.unwrap();
        assert_eq!(schedule.night_start, "19:00:00");
        assert_eq!(schedule.day_end, "09:00:00");
    }

    #[test]
    fn test_snapshot_from_stopped_engine() {
        let snapshot = StatusSnapshot::new(None, "dry-run", Local::now());
        assert!(!snapshot.running);
        assert_eq!(snapshot.phase, None);
        assert_eq!(snapshot.schedule, None);
    }

    #[test]
    #[serial]
    fn test_write_then_read_status() {
        let temp_dir = tempdir().unwrap();
        let original = std::env::var("XDG_RUNTIME_DIR").ok();
        unsafe {
            std::env::set_var("XDG_RUNTIME_DIR", temp_dir.path());
        }

        let before = read_status().unwrap();
        let snapshot = StatusSnapshot::new(Some(running_status()), "Wayland", Local::now());
        write_status(&snapshot).unwrap();
        let after = read_status().unwrap();
        remove_status();
        let removed = read_status().unwrap();

        unsafe {
            match original {
                Some(val) => std::env::set_var("XDG_RUNTIME_DIR", val),
                None => std::env::remove_var("XDG_RUNTIME_DIR"),
            }
        }

        assert_eq!(before, None);
        assert_eq!(after, Some(snapshot));
        assert_eq!(removed, None);
    }
}
