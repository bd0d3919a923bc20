//! Implementation of the invert command.
//!
//! Sets or toggles the user override in the running daemon. The override wins
//! over every other inversion request and survives restarts.

use anyhow::Result;

use crate::io::instance;
use crate::io::signals::DaemonCommand;

/// Handle `duskshift invert on|off|toggle`.
pub fn handle_invert_command(value: Option<bool>, debug_enabled: bool) -> Result<()> {
    log_version!();

    let Ok(pid) = instance::get_running_instance_pid() else {
        log_error_exit!("duskshift isn't running");
        std::process::exit(crate::common::constants::EXIT_FAILURE);
    };

    let command = DaemonCommand::Invert(value);
    instance::send_command(pid, &command)?;

    if debug_enabled {
        log_pipe!();
        log_debug!("Sent '{}' to process {}", command.to_line(), pid);
    }

    match value {
        Some(true) => log_block_start!("Inversion override set to on"),
        Some(false) => log_block_start!("Inversion override set to off"),
        None => log_block_start!("Inversion override toggled"),
    }
    log_end!();
    Ok(())
}

/// Display usage help for the invert command (--help flag)
pub fn show_usage() {
    log_version!();
    log_block_start!("Usage: {}", super::help::usage_line("invert"));
    log_block_start!("Description:");
    log_indented!("Set or toggle the user inversion override");
    log_pipe!();
    log_info!("For detailed help with examples, try: duskshift help invert");
    log_end!();
}

/// Display detailed help for the invert command (help subcommand)
pub fn display_help() {
    log_version!();
    log_block_start!("invert - Set or toggle the user inversion override");
    log_block_start!("Usage: {}", super::help::usage_line("invert"));
    log_block_start!("Arguments:");
    log_indented!("on      Invert the display regardless of other requests");
    log_indented!("off     Keep the display normal regardless of other requests");
    log_indented!("toggle  Flip whatever is currently applied");
    log_block_start!("Description:");
    log_indented!("The override takes precedence over the night schedule and");
    log_indented!("named requests. It is remembered across restarts.");
    log_block_start!("Examples:");
    log_indented!("# Force normal colors during a night movie");
    log_indented!("duskshift invert off");
    log_pipe!();
    log_indented!("# Bind to a key");
    log_indented!("duskshift invert toggle");
    log_end!();
}
