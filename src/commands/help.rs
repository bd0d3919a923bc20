//! Help command implementation for duskshift.
//!
//! Dispatches to each command's detailed help, or shows the general command
//! overview when no command is named.

use anyhow::Result;

/// One-line usage for a command, used in parse errors.
pub fn usage_line(command: &str) -> &'static str {
    match command {
        "invert" => "duskshift invert on|off|toggle",
        "request" => "duskshift request <id> on|off",
        "status" => "duskshift status [--json]",
        "reload" => "duskshift reload",
        "stop" => "duskshift stop",
        "help" => "duskshift help [COMMAND]",
        _ => "duskshift [OPTIONS] [COMMAND]",
    }
}

/// Show brief usage for a command (`duskshift <command> --help`).
pub fn show_command_usage(command: &str) {
    match command {
        "invert" => super::invert::show_usage(),
        "request" => super::request::show_usage(),
        "status" => super::status::show_usage(),
        "reload" => super::reload::show_usage(),
        "stop" => super::stop::show_usage(),
        _ => crate::args::display_help(),
    }
}

/// Run the help command (dispatcher)
///
/// # Arguments
/// * `command` - Optional command name to get help for (None = general help)
pub fn run_help_command(command: Option<&str>) -> Result<()> {
    match command {
        None => display_general_help(),
        Some("invert") => super::invert::display_help(),
        Some("request") => super::request::display_help(),
        Some("status") => super::status::display_help(),
        Some("reload") => super::reload::display_help(),
        Some("stop") => super::stop::display_help(),
        Some("help") => display_help_help(),
        Some(unknown) => {
            log_warning_standalone!("Unknown command: {}", unknown);
            display_general_help();
        }
    }
    Ok(())
}

/// Display general help focused on commands
fn display_general_help() {
    log_version!();
    log_block_start!("Available Commands:");
    log_indented!("invert on|off|toggle    Set or toggle the user inversion override");
    log_indented!("request <id> on|off     Add or withdraw a named inversion request");
    log_indented!("status [--json]         Show what the running daemon is doing");
    log_indented!("reload                  Reload configuration in the running daemon");
    log_indented!("stop                    Stop the daemon and restore the displays");
    log_indented!("help [COMMAND]          Show detailed help for a command");
    log_pipe!();
    log_info!("Use 'duskshift help <command>' to see detailed help for a specific command.");
    log_indented!("Use 'duskshift --help' to see all options and general usage.");
    log_end!();
}

/// Display help for the help command itself
fn display_help_help() {
    log_version!();
    log_block_start!("help - Display help information");
    log_block_start!("Usage: {}", usage_line("help"));
    log_block_start!("Arguments:");
    log_indented!("COMMAND  Optional command to get help for");
    log_indented!("         If omitted, shows general help");
    log_block_start!("Examples:");
    log_indented!("# Show general help");
    log_indented!("duskshift help");
    log_pipe!();
    log_indented!("# Show help for specific commands");
    log_indented!("duskshift help invert");
    log_indented!("duskshift help request");
    log_end!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_line_per_command() {
        assert_eq!(usage_line("invert"), "duskshift invert on|off|toggle");
        assert_eq!(usage_line("request"), "duskshift request <id> on|off");
        assert_eq!(usage_line("nonsense"), "duskshift [OPTIONS] [COMMAND]");
    }
}
