//! Main application entry point.
//!
//! Parses the command line and dispatches to the daemon or a one-shot command.
//! The daemon lifecycle itself lives in [`duskshift::Duskshift`].

use duskshift::args::{self, CliAction, ParsedArgs};
use duskshift::commands;
use duskshift::common::constants::{EXIT_FAILURE, EXIT_SUCCESS};
use duskshift::common::logger::Log;
use duskshift::{Duskshift, config, log_critical, log_end, log_error_exit, log_pipe};

fn main() {
    let parsed_args = ParsedArgs::from_env();

    let result = match parsed_args.action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            args::display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            args::display_help();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::Run {
            debug_enabled,
            config_dir,
            log_file,
        } => run_daemon(debug_enabled, config_dir, log_file),
        CliAction::InvertCommand {
            debug_enabled,
            value,
        } => commands::invert::handle_invert_command(value, debug_enabled),
        CliAction::RequestCommand {
            debug_enabled,
            id,
            invert,
        } => commands::request::handle_request_command(id, invert, debug_enabled),
        CliAction::StatusCommand { json } => commands::status::handle_status_command(json),
        CliAction::ReloadCommand {
            debug_enabled,
            config_dir,
        } => apply_config_dir(config_dir)
            .and_then(|()| commands::reload::handle_reload_command(debug_enabled)),
        CliAction::StopCommand { debug_enabled } => {
            commands::stop::handle_stop_command(debug_enabled)
        }
        CliAction::HelpCommand { command } => {
            commands::help::run_help_command(command.as_deref())
        }
        CliAction::ShowCommandUsage { command } => {
            commands::help::show_command_usage(&command);
            Ok(())
        }
    };

    match result {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(e) => {
            log_pipe!();
            log_critical!("{e:#}");
            log_end!();
            std::process::exit(EXIT_FAILURE);
        }
    }
}

fn run_daemon(
    debug_enabled: bool,
    config_dir: Option<String>,
    log_file: Option<String>,
) -> anyhow::Result<()> {
    apply_config_dir(config_dir)?;

    let log_guard = match log_file {
        Some(path) => Some(Log::start_file_logging(path)?),
        None => None,
    };

    // Logged here so the message reaches the log file before it is closed
    if let Err(e) = Duskshift::new(debug_enabled).run() {
        log_pipe!();
        log_critical!("{e:#}");
        log_end!();
        drop(log_guard);
        std::process::exit(EXIT_FAILURE);
    }
    Ok(())
}

fn apply_config_dir(config_dir: Option<String>) -> anyhow::Result<()> {
    if let Err(e) = config::set_config_dir(config_dir) {
        log_error_exit!("Invalid config directory: {e}");
        std::process::exit(EXIT_FAILURE);
    }
    Ok(())
}
