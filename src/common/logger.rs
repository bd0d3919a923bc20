//! Structured logging with box-drawing output.
//!
//! Every line duskshift prints goes through the macros defined here. They share a
//! single formatting path ([`emit`]) so the visual layout stays consistent between
//! the daemon, the one-shot commands and the file sink used by `--log`.
//!
//! ## Logging Conventions
//!
//! - **`log_block_start!`** opens a new conceptual block (phase changes, loading
//!   configuration, backend selection). Prints an empty `┃` line, then `┣ message`.
//! - **`log_decorated!`** continues a block: `┣ message`.
//! - **`log_indented!`** nests details under the current block: `┃   message`.
//! - **`log_pipe!`** inserts a bare `┃` spacer, typically right before a
//!   `log_warning!`/`log_error!`/`log_info!` that starts its own block.
//! - **`log_version!`** prints the `┏ duskshift vX.Y.Z ━━╸` header once at startup.
//! - **`log_end!`** prints the closing `╹`.
//! - **`log_info!`, `log_warning!`, `log_error!`, `log_debug!`, `log_critical!`** are
//!   the semantic macros with a coloured `[LEVEL]` tag.

use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);
static TIMESTAMPS_ENABLED: AtomicBool = AtomicBool::new(false);

// Set once when `--log <file>` is active
static LOG_CHANNEL: OnceLock<Sender<LogMessage>> = OnceLock::new();

enum LogMessage {
    Formatted(String),
    Shutdown,
}

/// Line shapes produced by the logging macros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    BlockStart,
    Decorated,
    Indented,
    Pipe,
    Version,
    End,
    /// `┣[LEVEL] message`
    Tagged(Level),
    /// `[LEVEL] message`, outside the pipe structure
    Standalone(Level),
    /// `┃` followed by `┗[LEVEL] message`, used right before exiting
    Exit(Level),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Debug,
    Warning,
    Error,
    Critical,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "\x1b[32mINFO\x1b[0m",
            Level::Debug => "\x1b[32mDEBUG\x1b[0m",
            Level::Warning => "\x1b[33mWARNING\x1b[0m",
            Level::Error => "\x1b[31mERROR\x1b[0m",
            Level::Critical => "\x1b[31mCRITICAL\x1b[0m",
        }
    }
}

/// Runtime switches for the logger.
pub struct Log;

impl Log {
    /// Enable or disable all output. Tests and `status --json` run silent.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Prefix every line with the local wall-clock time.
    pub fn set_timestamps(enabled: bool) {
        TIMESTAMPS_ENABLED.store(enabled, Ordering::SeqCst);
    }

    /// Returns `[HH:MM:SS] ` when timestamps are enabled, otherwise an empty string.
    pub fn get_timestamp_prefix() -> String {
        if TIMESTAMPS_ENABLED.load(Ordering::SeqCst) {
            format!("[{}] ", chrono::Local::now().format("%H:%M:%S"))
        } else {
            String::new()
        }
    }

    /// Route all output to `file_path` instead of stdout.
    ///
    /// Lines are written by a dedicated thread with ANSI colour codes removed.
    /// Timestamps are switched on since a log file has no other time reference.
    /// The returned guard flushes and joins the writer when dropped.
    pub fn start_file_logging(file_path: String) -> anyhow::Result<LoggerGuard> {
        let (tx, rx) = channel();

        LOG_CHANNEL
            .set(tx.clone())
            .map_err(|_| anyhow::anyhow!("Logger channel already initialized"))?;

        let handle = std::thread::spawn(move || {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&file_path)?;

            loop {
                match rx.recv() {
                    Ok(LogMessage::Formatted(text)) => file.write_all(text.as_bytes())?,
                    Ok(LogMessage::Shutdown) | Err(_) => {
                        file.flush()?;
                        break;
                    }
                }
            }

            Ok::<(), anyhow::Error>(())
        });

        Self::set_timestamps(true);

        Ok(LoggerGuard {
            tx,
            handle: Some(handle),
        })
    }
}

/// Keeps the file logging thread alive; flushes on drop.
pub struct LoggerGuard {
    tx: Sender<LogMessage>,
    handle: Option<std::thread::JoinHandle<anyhow::Result<()>>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(LogMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == 'm' {
                    break;
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Render a message in the given layout, including the timestamp prefix.
pub fn render(layout: Layout, message: &str) -> String {
    let p = Log::get_timestamp_prefix();
    match layout {
        Layout::BlockStart => format!("{p}┃\n{p}┣ {message}\n"),
        Layout::Decorated => format!("{p}┣ {message}\n"),
        Layout::Indented => format!("{p}┃   {message}\n"),
        Layout::Pipe => format!("{p}┃\n"),
        Layout::Version => format!("{p}┏ {message} ━━╸\n"),
        Layout::End => format!("{p}╹\n"),
        Layout::Tagged(level) => format!("{p}┣[{}] {message}\n", level.tag()),
        Layout::Standalone(level) => format!("{p}[{}] {message}\n", level.tag()),
        Layout::Exit(level) => format!("{p}┃\n{p}┗[{}] {message}\n", level.tag()),
    }
}

/// Format and write one log entry. Called by the macros.
pub fn emit(layout: Layout, message: &str) {
    if Log::is_enabled() {
        write_output(&render(layout, message));
    }
}

pub fn write_output(text: &str) {
    if let Some(tx) = LOG_CHANNEL.get() {
        let _ = tx.send(LogMessage::Formatted(strip_ansi_codes(text)));
    } else {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }
}

// # Logging Macros

#[doc(hidden)]
#[macro_export]
macro_rules! __log_with_layout {
    ($layout:expr; $fmt:literal $($arg:tt)*) => {{
        if $crate::common::logger::Log::is_enabled() {
            let message = format!($fmt $($arg)*);
            $crate::common::logger::emit($layout, &message);
        }
    }};
    ($layout:expr; $expr:expr) => {{
        if $crate::common::logger::Log::is_enabled() {
            let message = $expr.to_string();
            $crate::common::logger::emit($layout, &message);
        }
    }};
}

/// Start a new block of related output.
#[macro_export]
macro_rules! log_block_start {
    ($($arg:tt)+) => {
        $crate::__log_with_layout!($crate::common::logger::Layout::BlockStart; $($arg)+)
    };
}

/// Continue the current block.
#[macro_export]
macro_rules! log_decorated {
    ($($arg:tt)+) => {
        $crate::__log_with_layout!($crate::common::logger::Layout::Decorated; $($arg)+)
    };
}

/// Nested detail line.
#[macro_export]
macro_rules! log_indented {
    ($($arg:tt)+) => {
        $crate::__log_with_layout!($crate::common::logger::Layout::Indented; $($arg)+)
    };
}

/// Empty spacer line.
#[macro_export]
macro_rules! log_pipe {
    () => {
        $crate::common::logger::emit($crate::common::logger::Layout::Pipe, "")
    };
}

/// Application header.
#[macro_export]
macro_rules! log_version {
    () => {
        $crate::common::logger::emit(
            $crate::common::logger::Layout::Version,
            concat!("duskshift v", env!("CARGO_PKG_VERSION")),
        )
    };
}

/// Final termination marker.
#[macro_export]
macro_rules! log_end {
    () => {
        $crate::common::logger::emit($crate::common::logger::Layout::End, "")
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => {
        $crate::__log_with_layout!(
            $crate::common::logger::Layout::Tagged($crate::common::logger::Level::Info); $($arg)+
        )
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => {
        $crate::__log_with_layout!(
            $crate::common::logger::Layout::Tagged($crate::common::logger::Level::Debug); $($arg)+
        )
    };
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)+) => {
        $crate::__log_with_layout!(
            $crate::common::logger::Layout::Tagged($crate::common::logger::Level::Warning); $($arg)+
        )
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => {
        $crate::__log_with_layout!(
            $crate::common::logger::Layout::Tagged($crate::common::logger::Level::Error); $($arg)+
        )
    };
}

#[macro_export]
macro_rules! log_critical {
    ($($arg:tt)+) => {
        $crate::__log_with_layout!(
            $crate::common::logger::Layout::Tagged($crate::common::logger::Level::Critical); $($arg)+
        )
    };
}

/// Warning outside the pipe structure, for output before the header is printed.
#[macro_export]
macro_rules! log_warning_standalone {
    ($($arg:tt)+) => {
        $crate::__log_with_layout!(
            $crate::common::logger::Layout::Standalone($crate::common::logger::Level::Warning); $($arg)+
        )
    };
}

/// Error that closes the log, printed right before a non-zero exit.
#[macro_export]
macro_rules! log_error_exit {
    ($($arg:tt)+) => {
        $crate::__log_with_layout!(
            $crate::common::logger::Layout::Exit($crate::common::logger::Level::Error); $($arg)+
        )
    };
}
