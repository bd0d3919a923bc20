//! Status command - display the running daemon's state.
//!
//! The daemon rewrites its status snapshot after every loop iteration; this
//! command reads it back. A snapshot left behind by a dead process is treated
//! as "not running".

use anyhow::Result;

use crate::common::utils::is_process_running;
use crate::state::{self, StatusSnapshot};

/// Handle `duskshift status [--json]`.
pub fn handle_status_command(json: bool) -> Result<()> {
    let snapshot = match state::read_status()? {
        Some(snapshot) if is_process_running(snapshot.pid) => snapshot,
        _ => {
            if json {
                println!("null");
            } else {
                log_version!();
                log_error_exit!("duskshift isn't running");
            }
            std::process::exit(crate::common::constants::EXIT_FAILURE);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        display_human_readable(&snapshot);
    }
    Ok(())
}

fn display_human_readable(snapshot: &StatusSnapshot) {
    log_version!();
    log_block_start!("duskshift (PID: {}) using {}", snapshot.pid, snapshot.backend);
    for line in summary_lines(snapshot) {
        log_indented!("{line}");
    }
    log_end!();
}

/// Label/value lines shown by the human-readable output.
pub fn summary_lines(snapshot: &StatusSnapshot) -> Vec<String> {
    if !snapshot.running {
        return vec!["State:        stopped".to_string()];
    }

    let mut lines = Vec::new();
    let phase = snapshot.phase.as_deref().unwrap_or("unknown");
    if snapshot.paused {
        lines.push(format!("State:        paused (excluded app focused, {phase})"));
    } else {
        lines.push(format!("State:        {phase}"));
    }
    if let Some(temperature) = snapshot.temperature {
        lines.push(format!("Temperature:  {temperature}K"));
    }
    match &snapshot.inverted {
        Some(reason) => lines.push(format!("Inverted:     yes ({reason})")),
        None => lines.push("Inverted:     no".to_string()),
    }
    if !snapshot.requests.is_empty() {
        lines.push(format!("Requests:     {}", snapshot.requests.join(", ")));
    }
    if let Some(schedule) = &snapshot.schedule {
        lines.push(format!(
            "Dusk:         {} → {}",
            schedule.night_start, schedule.night_end
        ));
        lines.push(format!("Dawn:         {} → {}", schedule.day_start, schedule.day_end));
    }
    if let Some(next) = &snapshot.next_wake {
        lines.push(format!("Next update:  {next}"));
    }
    lines.push(format!(
        "Updated:      {}",
        snapshot.updated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    lines
}

/// Display usage help for the status command (--help flag)
pub fn show_usage() {
    log_version!();
    log_block_start!("Usage: {}", super::help::usage_line("status"));
    log_block_start!("Description:");
    log_indented!("Show what the running daemon is doing");
    log_pipe!();
    log_info!("For detailed help with examples, try: duskshift help status");
    log_end!();
}

/// Display detailed help for the status command (help subcommand)
pub fn display_help() {
    log_version!();
    log_block_start!("status - Show what the running daemon is doing");
    log_block_start!("Usage: {}", super::help::usage_line("status"));
    log_block_start!("Options:");
    log_indented!("-j, --json  Print the raw status snapshot as JSON");
    log_block_start!("Description:");
    log_indented!("Reports the current phase, color temperature, inversion and");
    log_indented!("the time of the next scheduled update. Exits non-zero when");
    log_indented!("no daemon is running.");
    log_block_start!("Examples:");
    log_indented!("duskshift status");
    log_indented!("duskshift status --json | jq .temperature");
    log_end!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::status::ScheduleTimes;
    use chrono::Local;

    fn snapshot() -> StatusSnapshot {
        StatusSnapshot {
            pid: 42,
            backend: "Wayland".into(),
            running: true,
            phase: Some("Dusk".into()),
            temperature: Some(4650),
            inverted: None,
            requests: Vec::new(),
            paused: false,
            next_wake: Some("every 36s".into()),
            schedule: Some(ScheduleTimes {
                night_start: "19:00:00".into(),
                night_end: "23:00:00".into(),
                day_start: "05:00:00".into(),
                day_end: "09:00:00".into(),
            }),
            updated_at: Local::now(),
        }
    }

    #[test]
    fn test_summary_for_running_daemon() {
        let lines = summary_lines(&snapshot());
        assert_eq!(lines[0], "State:        Dusk");
        assert_eq!(lines[1], "Temperature:  4650K");
        assert_eq!(lines[2], "Inverted:     no");
        assert_eq!(lines[3], "Dusk:         19:00:00 → 23:00:00");
        assert_eq!(lines[5], "Next update:  every 36s");
    }

    #[test]
    fn test_summary_reports_pause_and_inversion() {
        let mut snapshot = snapshot();
        snapshot.paused = true;
        snapshot.inverted = Some("movie".into());
        snapshot.requests = vec!["movie".into(), "redshift-night".into()];

        let lines = summary_lines(&snapshot);
        assert_eq!(lines[0], "State:        paused (excluded app focused, Dusk)");
        assert!(lines.contains(&"Inverted:     yes (movie)".to_string()));
        assert!(lines.contains(&"Requests:     movie, redshift-night".to_string()));
    }

    #[test]
    fn test_summary_for_stopped_engine() {
        let mut snapshot = snapshot();
        snapshot.running = false;
        assert_eq!(summary_lines(&snapshot), vec!["State:        stopped".to_string()]);
    }
}
