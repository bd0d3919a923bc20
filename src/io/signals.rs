//! Signal handling and the command channel between duskshift processes.
//!
//! Client commands reach the daemon as a line in a per-PID drop file followed by
//! `SIGUSR1`. `SIGUSR2` requests a configuration reload, and `SIGTERM`, `SIGINT`
//! or `SIGHUP` shut the daemon down.
//!
//! Every source funnels into one [`SignalMessage`] channel consumed by the
//! runtime loop. Background threads never touch the engine directly.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR1, SIGUSR2},
    iterator::Signals,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, mpsc};
use std::thread;

use crate::common::utils::runtime_dir;

/// A command sent by a client process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonCommand {
    /// Set or toggle the user override.
    Invert(Option<bool>),
    /// Add or withdraw a named inversion request.
    Request { id: String, invert: bool },
}

impl DaemonCommand {
    /// Parse one line of the command file.
    pub fn parse(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["invert", state] => Ok(Self::Invert(parse_switch(state, true)?)),
            ["request", id, state] => match parse_switch(state, false)? {
                Some(invert) => Ok(Self::Request {
                    id: (*id).to_string(),
                    invert,
                }),
                None => anyhow::bail!("request state must be 'on' or 'off'"),
            },
            _ => anyhow::bail!("unrecognized command: '{}'", line.trim()),
        }
    }

    /// Serialize to the single-line command file format.
    pub fn to_line(&self) -> String {
        match self {
            Self::Invert(Some(true)) => "invert on".to_string(),
            Self::Invert(Some(false)) => "invert off".to_string(),
            Self::Invert(None) => "invert toggle".to_string(),
            Self::Request { id, invert } => {
                format!("request {id} {}", if *invert { "on" } else { "off" })
            }
        }
    }
}

/// Parse `on`/`off` (and `toggle` when allowed) into the override argument.
pub fn parse_switch(value: &str, allow_toggle: bool) -> Result<Option<bool>> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "1" => Ok(Some(true)),
        "off" | "false" | "0" => Ok(Some(false)),
        "toggle" if allow_toggle => Ok(None),
        other => anyhow::bail!(
            "expected on, off{}, got '{other}'",
            if allow_toggle { " or toggle" } else { "" }
        ),
    }
}

/// Unified message type consumed by the runtime loop.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalMessage {
    /// Configuration changed on disk or SIGUSR2 arrived
    Reload,
    /// Client command delivered via the command file and SIGUSR1
    Command(DaemonCommand),
    /// SIGTERM, SIGINT or SIGHUP
    Shutdown,
    /// The wall clock jumped
    TimeChange,
    /// Suspend or resume notification from logind
    Sleep { resuming: bool },
    /// A new application gained focus
    Focus(String),
}

/// Signal handling state shared between threads.
pub struct SignalState {
    /// Cleared once a shutdown signal has been received
    pub running: Arc<AtomicBool>,
    pub signal_receiver: Receiver<SignalMessage>,
    /// Cloned into the D-Bus, focus and config watcher threads
    pub signal_sender: Sender<SignalMessage>,
}

/// Command drop file for the daemon with the given PID.
pub fn command_file_path(pid: u32) -> PathBuf {
    runtime_dir().join(format!("duskshift-cmd-{pid}.tmp"))
}

/// Append a command for `pid` to its drop file.
pub fn write_command(pid: u32, command: &DaemonCommand) -> Result<()> {
    let path = command_file_path(pid);
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open command file {}", path.display()))?;
    writeln!(file, "{}", command.to_line()).context("Failed to write command")?;
    Ok(())
}

/// Drain the drop file for `pid`, returning every parseable command.
pub fn take_commands(pid: u32) -> Vec<DaemonCommand> {
    let path = command_file_path(pid);
    let Ok(content) = std::fs::read_to_string(&path) else {
        return Vec::new();
    };
    let _ = std::fs::remove_file(&path);

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match DaemonCommand::parse(line) {
            Ok(command) => Some(command),
            Err(e) => {
                log_pipe!();
                log_warning!("Ignoring command: {e}");
                None
            }
        })
        .collect()
}

/// Register signal handlers and spawn the listener thread.
pub fn setup_signal_handler(debug_enabled: bool) -> Result<SignalState> {
    let running = Arc::new(AtomicBool::new(true));
    let (signal_sender, signal_receiver) = mpsc::channel::<SignalMessage>();

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR1, SIGUSR2])
        .context("failed to register signal handlers")?;

    let running_clone = running.clone();
    let sender = signal_sender.clone();

    thread::spawn(move || {
        let pid = std::process::id();

        for sig in signals.forever() {
            let delivered = match sig {
                SIGUSR1 => take_commands(pid).into_iter().all(|command| {
                    if debug_enabled {
                        log_pipe!();
                        log_debug!("Received command: {}", command.to_line());
                    }
                    sender.send(SignalMessage::Command(command)).is_ok()
                }),
                SIGUSR2 => {
                    log_pipe!();
                    log_info!("Received configuration reload signal");
                    sender.send(SignalMessage::Reload).is_ok()
                }
                _ => {
                    // The terminal is gone on SIGHUP, so stay quiet
                    if sig != SIGHUP {
                        log_pipe!();
                        if sig == SIGINT && debug_enabled {
                            log_info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
                        } else if sig == SIGINT {
                            log_info!("Received interrupt signal, initiating graceful shutdown...");
                        } else {
                            log_info!("Received termination request, initiating graceful shutdown...");
                        }
                    }
                    running_clone.store(false, Ordering::SeqCst);
                    let _ = sender.send(SignalMessage::Shutdown);
                    false
                }
            };

            // Main loop has gone away or shutdown was requested
            if !delivered {
                break;
            }
        }
    });

    Ok(SignalState {
        running,
        signal_receiver,
        signal_sender,
    })
}
