//! Implementation of the request command.
//!
//! Named requests let scripts ask for inversion without clobbering each other.
//! The display is inverted while any request is active, unless the user
//! override says otherwise.

use anyhow::Result;

use crate::io::instance;
use crate::io::signals::DaemonCommand;

/// Handle `duskshift request <id> on|off`.
pub fn handle_request_command(id: String, invert: bool, debug_enabled: bool) -> Result<()> {
    log_version!();

    let Ok(pid) = instance::get_running_instance_pid() else {
        log_error_exit!("duskshift isn't running");
        std::process::exit(crate::common::constants::EXIT_FAILURE);
    };

    let command = DaemonCommand::Request { id, invert };
    instance::send_command(pid, &command)?;

    if debug_enabled {
        log_pipe!();
        log_debug!("Sent '{}' to process {}", command.to_line(), pid);
    }

    if let DaemonCommand::Request { id, invert } = &command {
        if *invert {
            log_block_start!("Requested inversion as '{id}'");
        } else {
            log_block_start!("Withdrew inversion request '{id}'");
        }
    }
    log_end!();
    Ok(())
}

/// Display usage help for the request command (--help flag)
pub fn show_usage() {
    log_version!();
    log_block_start!("Usage: {}", super::help::usage_line("request"));
    log_block_start!("Description:");
    log_indented!("Add or withdraw a named inversion request");
    log_pipe!();
    log_info!("For detailed help with examples, try: duskshift help request");
    log_end!();
}

/// Display detailed help for the request command (help subcommand)
pub fn display_help() {
    log_version!();
    log_block_start!("request - Add or withdraw a named inversion request");
    log_block_start!("Usage: {}", super::help::usage_line("request"));
    log_block_start!("Arguments:");
    log_indented!("<id>    Any name identifying the requester");
    log_indented!("on|off  Add or withdraw the request");
    log_block_start!("Description:");
    log_indented!("The display stays inverted while at least one request is");
    log_indented!("active. The id 'redshift-night' belongs to the night schedule");
    log_indented!("and cannot be used here.");
    log_block_start!("Examples:");
    log_indented!("duskshift request reading on");
    log_indented!("duskshift request reading off");
    log_end!();
}
