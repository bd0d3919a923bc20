//! Implementation of the stop command.
//!
//! Sends SIGTERM to the running daemon and waits for it to restore the
//! displays and exit.

use anyhow::Result;
use std::time::Duration;

use crate::io::instance;

const STOP_TIMEOUT_MS: u64 = 3000;
const STOP_POLL_MS: u64 = 100;

/// Handle the stop command to terminate a running duskshift instance.
pub fn handle_stop_command(debug_enabled: bool) -> Result<()> {
    log_version!();

    let Ok(pid) = instance::get_running_instance_pid() else {
        log_error_exit!("duskshift isn't running");
        std::process::exit(crate::common::constants::EXIT_FAILURE);
    };

    log_block_start!("Stopping duskshift instance (PID: {})...", pid);

    if let Err(e) = instance::terminate_instance(pid) {
        log_error_exit!("Failed to terminate instance: {}", e);
        std::process::exit(crate::common::constants::EXIT_FAILURE);
    }
    if debug_enabled {
        log_pipe!();
        log_debug!("SIGTERM sent to process {}", pid);
    }

    if wait_for_exit(pid, Duration::from_millis(STOP_TIMEOUT_MS)) {
        log_pipe!();
        log_info!("Process terminated successfully");
    } else {
        log_pipe!();
        log_warning!("Process did not terminate within the expected time");
        log_indented!("The termination signal was sent, but the process may still be shutting down");
    }
    log_end!();
    Ok(())
}

/// Poll until `pid` is gone or `timeout` passes. Returns `true` if it exited.
fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let attempts = timeout.as_millis() as u64 / STOP_POLL_MS;
    for _ in 0..attempts {
        if !instance::is_instance_running(pid) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(STOP_POLL_MS));
    }
    !instance::is_instance_running(pid)
}

/// Display usage help for the stop command (--help flag)
pub fn show_usage() {
    log_version!();
    log_block_start!("Usage: {}", super::help::usage_line("stop"));
    log_block_start!("Description:");
    log_indented!("Cleanly terminate the running duskshift instance");
    log_pipe!();
    log_info!("For detailed help with examples, try: duskshift help stop");
    log_end!();
}

/// Display detailed help for the stop command (help subcommand)
pub fn display_help() {
    log_version!();
    log_block_start!("stop - Stop the daemon and restore the displays");
    log_block_start!("Usage: {}", super::help::usage_line("stop"));
    log_block_start!("Description:");
    log_indented!("Sends SIGTERM to the running daemon. Before exiting it restores");
    log_indented!("the original gamma on every display it touched.");
    log_pipe!();
    log_indented!("Waits up to three seconds for the process to exit.");
    log_block_start!("Examples:");
    log_indented!("duskshift stop");
    log_end!();
}
