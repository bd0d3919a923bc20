//! Command-line argument parsing and processing.
//!
//! Flags may appear anywhere on the command line. The first bare word is the
//! subcommand; without one duskshift runs as the daemon.

use crate::commands::COMMAND_NAMES;
use crate::common::constants::NIGHT_REQUEST_KEY;
use crate::io::signals::parse_switch;

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the daemon with these settings
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
        log_file: Option<String>,
    },

    /// Set (`Some`) or toggle (`None`) the user override
    InvertCommand {
        debug_enabled: bool,
        value: Option<bool>,
    },
    /// Add or withdraw a named inversion request
    RequestCommand {
        debug_enabled: bool,
        id: String,
        invert: bool,
    },
    /// Print the daemon status
    StatusCommand { json: bool },
    /// Ask the daemon to reload its configuration
    ReloadCommand {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Stop the daemon
    StopCommand { debug_enabled: bool },
    /// Detailed help for one command, or general help
    HelpCommand { command: Option<String> },
    /// `duskshift <command> --help`
    ShowCommandUsage { command: String },

    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

#[derive(Default)]
struct Flags {
    debug_enabled: bool,
    display_help: bool,
    display_version: bool,
    json: bool,
    config_dir: Option<String>,
    log_file: Option<String>,
    unknown_arg_found: bool,
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// `--version` wins over `--help`, which wins over everything else.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        // Convert to vector for easier indexed access
        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut flags = Flags::default();
        let mut words: Vec<String> = Vec::new();

        let mut i = 0;
        while i < args_vec.len() {
            let arg = &args_vec[i];
            match arg.as_str() {
                "--help" | "-h" => flags.display_help = true,
                "--version" | "-V" | "-v" => flags.display_version = true,
                "--debug" | "-d" => flags.debug_enabled = true,
                "--json" | "-j" => flags.json = true,
                "--config" | "-c" => {
                    match args_vec.get(i + 1).filter(|next| !next.starts_with('-')) {
                        Some(dir) => {
                            flags.config_dir = Some(dir.clone());
                            i += 1;
                        }
                        None => {
                            log_warning!("Missing directory for --config. Usage: --config <directory>");
                            flags.unknown_arg_found = true;
                        }
                    }
                }
                "--log" | "-l" => match args_vec.get(i + 1).filter(|next| !next.starts_with('-')) {
                    Some(file) => {
                        flags.log_file = Some(file.clone());
                        i += 1;
                    }
                    None => {
                        log_warning!("Missing file for --log. Usage: --log <file>");
                        flags.unknown_arg_found = true;
                    }
                },
                other if other.starts_with('-') && other.len() > 1 => {
                    log_warning!("Unknown option: {other}");
                    flags.unknown_arg_found = true;
                }
                _ => words.push(arg.clone()),
            }
            i += 1;
        }

        ParsedArgs {
            action: resolve(flags, words),
        }
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

fn resolve(flags: Flags, words: Vec<String>) -> CliAction {
    if flags.display_version {
        return CliAction::ShowVersion;
    }

    let command = words.first().map(String::as_str);

    if flags.display_help {
        return match command {
            Some(name) if COMMAND_NAMES.contains(&name) && name != "help" => {
                CliAction::ShowCommandUsage {
                    command: name.to_string(),
                }
            }
            _ => CliAction::ShowHelp,
        };
    }

    if flags.unknown_arg_found {
        return CliAction::ShowHelpDueToError;
    }

    if flags.json && command != Some("status") {
        log_warning!("--json is only valid with the status command");
        return CliAction::ShowHelpDueToError;
    }

    if flags.log_file.is_some() && command.is_some() {
        log_warning!("--log is only valid when running the daemon");
        return CliAction::ShowHelpDueToError;
    }

    let Some(command) = command else {
        return CliAction::Run {
            debug_enabled: flags.debug_enabled,
            config_dir: flags.config_dir,
            log_file: flags.log_file,
        };
    };
    let rest = &words[1..];

    match (command, rest) {
        ("invert", [state]) => match parse_switch(state, true) {
            Ok(value) => CliAction::InvertCommand {
                debug_enabled: flags.debug_enabled,
                value,
            },
            Err(e) => usage_error(&format!("Invalid state: {e}"), "invert"),
        },
        ("invert", []) => usage_error("Missing state", "invert"),
        ("request", [id, state]) => {
            if id == NIGHT_REQUEST_KEY {
                return usage_error(&format!("'{id}' is reserved for the night schedule"), "request");
            }
            match parse_switch(state, false) {
                Ok(Some(invert)) => CliAction::RequestCommand {
                    debug_enabled: flags.debug_enabled,
                    id: id.clone(),
                    invert,
                },
                Ok(None) => usage_error("Request state must be 'on' or 'off'", "request"),
                Err(e) => usage_error(&format!("Invalid state: {e}"), "request"),
            }
        }
        ("request", [] | [_]) => usage_error("Missing request id or state", "request"),
        ("status", []) => CliAction::StatusCommand { json: flags.json },
        ("reload", []) => CliAction::ReloadCommand {
            debug_enabled: flags.debug_enabled,
            config_dir: flags.config_dir,
        },
        ("stop", []) => CliAction::StopCommand {
            debug_enabled: flags.debug_enabled,
        },
        ("help", []) => CliAction::HelpCommand { command: None },
        ("help", [topic]) => CliAction::HelpCommand {
            command: Some(topic.clone()),
        },
        (name, extra) if COMMAND_NAMES.contains(&name) => {
            usage_error(&format!("Unexpected argument: {}", extra.join(" ")), name)
        }
        (unknown, _) => {
            log_warning!("Unknown command: {unknown}");
            if let Some(suggestion) = crate::commands::suggest_command(unknown) {
                log_indented!("Did you mean '{suggestion}'?");
            }
            CliAction::ShowHelpDueToError
        }
    }
}

fn usage_error(message: &str, command: &str) -> CliAction {
    log_warning!("{message}. Usage: {}", crate::commands::help::usage_line(command));
    CliAction::ShowHelpDueToError
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("duskshift [OPTIONS] [COMMAND]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>     Use custom configuration directory");
    log_indented!("-d, --debug            Enable detailed debug output");
    log_indented!("-h, --help             Print help information");
    log_indented!("-l, --log <file>       Write daemon output to a file");
    log_indented!("-V, --version          Print version information");
    log_block_start!("Commands:");
    log_indented!("invert on|off|toggle   Set or toggle the user inversion override");
    log_indented!("request <id> on|off    Add or withdraw a named inversion request");
    log_indented!("status [--json]        Show what the running daemon is doing");
    log_indented!("reload                 Reload configuration in the running daemon");
    log_indented!("stop                   Stop the daemon and restore the displays");
    log_indented!("help [COMMAND]         Show detailed help for a command");
    log_end!();
}
