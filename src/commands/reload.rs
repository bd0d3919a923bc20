//! Implementation of the reload command.
//!
//! Validates the configuration the running daemon would load, then signals it
//! with `SIGUSR2`. An invalid file is reported here instead of in the daemon's
//! log.

use anyhow::Result;

use crate::config::Config;
use crate::io::instance;

/// Handle the reload command.
pub fn handle_reload_command(debug_enabled: bool) -> Result<()> {
    log_version!();

    // Adopts the daemon's config directory from the lock file
    let Ok(Some(info)) = instance::get_running_instance() else {
        log_error_exit!("duskshift isn't running");
        std::process::exit(crate::common::constants::EXIT_FAILURE);
    };

    if let Err(e) = Config::load() {
        log_pipe!();
        log_error!("Configuration is invalid, not reloading: {e:#}");
        log_end!();
        std::process::exit(crate::common::constants::EXIT_FAILURE);
    }

    instance::send_reload_signal(info.pid)?;
    if debug_enabled {
        log_pipe!();
        log_debug!("SIGUSR2 sent to process {}", info.pid);
    }

    log_block_start!("Sent reload signal to duskshift (PID: {})", info.pid);
    log_end!();
    Ok(())
}

/// Display usage help for the reload command (--help flag)
pub fn show_usage() {
    log_version!();
    log_block_start!("Usage: {}", super::help::usage_line("reload"));
    log_block_start!("Description:");
    log_indented!("Reload configuration in the running daemon");
    log_pipe!();
    log_info!("For detailed help with examples, try: duskshift help reload");
    log_end!();
}

/// Display detailed help for the reload command (help subcommand)
pub fn display_help() {
    log_version!();
    log_block_start!("reload - Reload configuration in the running daemon");
    log_block_start!("Usage: {}", super::help::usage_line("reload"));
    log_block_start!("Description:");
    log_indented!("Checks the configuration file and asks the daemon to apply it.");
    log_indented!("The daemon already reloads when the file changes on disk, so");
    log_indented!("this is mostly useful when file watching is unavailable.");
    log_pipe!();
    log_indented!("Inversion requests and the user override are kept.");
    log_indented!("Changing the backend requires a restart.");
    log_block_start!("Examples:");
    log_indented!("duskshift reload");
    log_indented!("duskshift --debug reload");
    log_end!();
}
