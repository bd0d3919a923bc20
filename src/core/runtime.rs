//! The daemon's main loop.
//!
//! [`Runtime`] owns the [`Engine`] and is the only code that touches it. Every
//! background source (signals, D-Bus, timerfd, focus events, the config
//! watcher) reaches the loop as a [`SignalMessage`]. Between messages the loop
//! sleeps until the deadline of the engine's armed [`Wake`], in
//! [`TOPOLOGY_POLL_MS`] slices so display hotplug is noticed promptly. The
//! deadline is fixed when the wake is armed, so messages that leave the engine
//! alone do not push it back.
//!
//! Engine errors that escape here are classification failures. The loop
//! returns them and the process exits non-zero.

use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crate::common::constants::{NIGHT_REQUEST_KEY, TOPOLOGY_POLL_MS};
use crate::config::Config;
use crate::core::Engine;
use crate::io::focus;
use crate::io::signals::{DaemonCommand, SignalMessage, SignalState};
use crate::state::{self, StatusSnapshot};
use crate::time::TimeSource;

type FocusSource = fn(Sender<SignalMessage>, bool) -> bool;

enum Wakeup {
    Message(SignalMessage),
    Elapsed,
    Rearmed,
    Disconnected,
}

pub struct Runtime {
    engine: Engine,
    config: Config,
    signal_state: SignalState,
    clock: Arc<dyn TimeSource>,
    debug_enabled: bool,
    status_warned: bool,
    /// Wake generation and the deadline derived from it
    armed: Option<(u64, Option<Instant>)>,
    focus_source: FocusSource,
    focus_listening: bool,
}

impl Runtime {
    pub fn new(
        engine: Engine,
        config: Config,
        signal_state: SignalState,
        clock: Arc<dyn TimeSource>,
        debug_enabled: bool,
    ) -> Self {
        Self {
            engine,
            config,
            signal_state,
            clock,
            debug_enabled,
            status_warned: false,
            armed: None,
            focus_source: focus::start_focus_listener,
            focus_listening: false,
        }
    }

    /// Start the engine, run until shutdown, then restore the displays.
    pub fn execute(mut self) -> Result<()> {
        let config = self.config.clone();
        self.ensure_focus_listener(&config);
        let options = self.config.start_options(self.initial_focus());
        self.engine.start(options)?;

        let result = self.main_loop();

        log_block_start!("Shutting down duskshift...");
        self.engine.stop();
        state::remove_status();

        result
    }

    fn main_loop(&mut self) -> Result<()> {
        while self.signal_state.running.load(Ordering::SeqCst) {
            self.publish_status();

            let deadline = self.deadline();

            match self.wait(deadline)? {
                Wakeup::Message(message) => {
                    if !self.handle_message(message)? {
                        break;
                    }
                }
                Wakeup::Elapsed => {
                    self.armed = None;
                    self.engine.on_wake()?;
                }
                // A hotplug recompute re-armed the wake
                Wakeup::Rearmed => {}
                Wakeup::Disconnected => {
                    if self.signal_state.running.load(Ordering::SeqCst) {
                        log_pipe!();
                        log_error!("Signal handler disconnected unexpectedly");
                    }
                    break;
                }
            }
        }
        Ok(())
    }

    /// Deadline of the armed wake, derived once per arming.
    fn deadline(&mut self) -> Option<Instant> {
        let generation = self.engine.wake_generation();
        if let Some((armed, deadline)) = self.armed
            && armed == generation
        {
            return deadline;
        }

        let deadline = self
            .engine
            .wake()
            .time_until(self.clock.now().time())
            .map(|delay| Instant::now() + delay);
        self.armed = Some((generation, deadline));
        deadline
    }

    /// Block until a message arrives or `deadline` passes, polling topology
    /// in between. `None` waits for a message only.
    fn wait(&mut self, deadline: Option<Instant>) -> Result<Wakeup> {
        let slice = Duration::from_millis(TOPOLOGY_POLL_MS);

        loop {
            let chunk = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Ok(Wakeup::Elapsed);
                    }
                    remaining.min(slice)
                }
                None => slice,
            };

            match self.signal_state.signal_receiver.recv_timeout(chunk) {
                Ok(message) => return Ok(Wakeup::Message(message)),
                Err(RecvTimeoutError::Timeout) => {
                    if self.engine.poll_topology()? {
                        return Ok(Wakeup::Rearmed);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(Wakeup::Disconnected),
            }
        }
    }

    /// Returns `false` when the loop should exit.
    fn handle_message(&mut self, message: SignalMessage) -> Result<bool> {
        match message {
            SignalMessage::Shutdown => return Ok(false),
            SignalMessage::Reload => self.reload(),
            SignalMessage::TimeChange | SignalMessage::Sleep { resuming: true } => {
                self.engine.force_recompute()?;
            }
            SignalMessage::Sleep { resuming: false } => {}
            SignalMessage::Focus(app) => {
                if self.debug_enabled {
                    log_pipe!();
                    log_debug!("Focus changed to '{app}'");
                }
                self.engine.focus_changed(&app)?;
            }
            SignalMessage::Command(command) => self.handle_command(command)?,
        }
        Ok(true)
    }

    fn handle_command(&mut self, command: DaemonCommand) -> Result<()> {
        match command {
            DaemonCommand::Invert(value) => self.engine.toggle_invert(value),
            DaemonCommand::Request { id, invert } => {
                if id == NIGHT_REQUEST_KEY {
                    log_pipe!();
                    log_warning!("Ignoring request for reserved key '{id}'");
                    return Ok(());
                }
                self.engine.request_invert(&id, invert)
            }
        }
    }

    /// Reload the config file and restart the engine with it.
    ///
    /// An invalid file keeps the running schedule.
    fn reload(&mut self) {
        match Config::load() {
            Ok(config) => self.apply_config(config),
            Err(e) => {
                log_pipe!();
                log_error!("Failed to reload config: {e:#}");
                log_indented!("Continuing with previous configuration");
            }
        }
    }

    fn apply_config(&mut self, new_config: Config) {
        if new_config == self.config {
            if self.debug_enabled {
                log_pipe!();
                log_debug!("Configuration unchanged, skipping restart");
            }
            return;
        }

        if new_config.backend != self.config.backend {
            log_pipe!();
            log_warning!("Backend changes take effect after a restart");
        }

        self.ensure_focus_listener(&new_config);
        let options = new_config.start_options(self.focus_for(&new_config));
        match self.engine.start(options) {
            Ok(()) => {
                log_block_start!("Configuration reloaded");
                self.config = new_config;
            }
            Err(e) => {
                log_pipe!();
                log_error!("Failed to apply reloaded config: {e:#}");
                log_indented!("Continuing with previous configuration");
            }
        }
    }

    /// Start listening for focus changes once a config excludes apps.
    fn ensure_focus_listener(&mut self, config: &Config) {
        if self.focus_listening || config.exclude_apps().is_empty() {
            return;
        }

        self.focus_listening =
            (self.focus_source)(self.signal_state.signal_sender.clone(), self.debug_enabled);
        if !self.focus_listening {
            log_pipe!();
            log_warning!("No focus event source found, exclude_apps will have no effect");
            log_indented!("Focus tracking currently requires Hyprland");
        }
    }

    fn initial_focus(&self) -> Option<String> {
        self.focus_for(&self.config)
    }

    fn focus_for(&self, config: &Config) -> Option<String> {
        if config.exclude_apps().is_empty() {
            None
        } else {
            focus::query_active_window()
        }
    }

    fn publish_status(&mut self) {
        let snapshot =
            StatusSnapshot::new(self.engine.status(), self.engine.adapter_name(), self.clock.now());
        if let Err(e) = state::write_status(&snapshot)
            && !self.status_warned
        {
            self.status_warned = true;
            log_pipe!();
            log_warning!("Failed to write status file: {e}");
            log_indented!("'duskshift status' will not be able to report state");
        }

        if self.debug_enabled
            && let Some(next) = &snapshot.next_wake
        {
            log_debug!("Next wake: {next}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collaborators::{DisplayAdapter, DisplayHandle, MemorySettingsStore};
    use crate::core::ramp::Rgb;
    use crate::time::ManualClock;
    use chrono::NaiveTime;
    use serial_test::serial;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::{Mutex, mpsc};
    use std::thread;
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct Seen {
        inverted: Arc<Mutex<Vec<bool>>>,
        restores: Arc<Mutex<usize>>,
    }

    struct LoggingAdapter(Seen);

    impl DisplayAdapter for LoggingAdapter {
        fn name(&self) -> &'static str {
            "Logging"
        }

        fn list_displays(&mut self) -> Result<Vec<DisplayHandle>> {
            Ok(vec![DisplayHandle { id: 1, name: "eDP-1".into() }])
        }

        fn set_gamma(&mut self, _: &DisplayHandle, white: Rgb, _: Rgb) -> Result<()> {
            self.0.inverted.lock().unwrap().push(white == Rgb::ZERO);
            Ok(())
        }

        fn restore_gamma(&mut self, _: &DisplayHandle) -> Result<()> {
            *self.0.restores.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn signal_state(messages: Vec<SignalMessage>) -> SignalState {
        let (signal_sender, signal_receiver) = mpsc::channel();
        for message in messages {
            signal_sender.send(message).unwrap();
        }
        SignalState {
            running: Arc::new(AtomicBool::new(true)),
            signal_receiver,
            signal_sender,
        }
    }

    #[test]
    #[serial]
    fn test_commands_drive_engine_until_shutdown() {
        crate::common::logger::Log::set_enabled(false);
        let temp_dir = tempdir().unwrap();
        let original = std::env::var("XDG_RUNTIME_DIR").ok();
        unsafe {
            std::env::set_var("XDG_RUNTIME_DIR", temp_dir.path());
        }

        let seen = Seen::default();
        let clock = Arc::new(ManualClock::at_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
        let engine = Engine::new(
            Box::new(LoggingAdapter(seen.clone())),
            Box::new(MemorySettingsStore::new()),
            clock.clone(),
        );
        let messages = vec![
            SignalMessage::Command(DaemonCommand::Request { id: "movie".into(), invert: true }),
            SignalMessage::Command(DaemonCommand::Request {
                id: NIGHT_REQUEST_KEY.into(),
                invert: true,
            }),
            SignalMessage::Sleep { resuming: false },
            SignalMessage::Command(DaemonCommand::Invert(Some(false))),
            SignalMessage::Shutdown,
        ];
        let runtime = Runtime::new(engine, Config::default(), signal_state(messages), clock, false);
        let result = runtime.execute();
        let status_left = state::status_path().exists();

        unsafe {
            match original {
                Some(val) => std::env::set_var("XDG_RUNTIME_DIR", val),
                None => std::env::remove_var("XDG_RUNTIME_DIR"),
            }
        }

        result.unwrap();
        // Start, movie request, user override off
        assert_eq!(*seen.inverted.lock().unwrap(), vec![false, true, false]);
        assert_eq!(*seen.restores.lock().unwrap(), 1);
        assert!(!status_left);
    }

    #[test]
    #[serial]
    fn test_disconnected_channel_ends_loop() {
        crate::common::logger::Log::set_enabled(false);
        let temp_dir = tempdir().unwrap();
        let original = std::env::var("XDG_RUNTIME_DIR").ok();
        unsafe {
            std::env::set_var("XDG_RUNTIME_DIR", temp_dir.path());
        }

        let seen = Seen::default();
        let clock = Arc::new(ManualClock::at_time(NaiveTime::from_hms_opt(2, 0, 0).unwrap()));
        let engine = Engine::new(
            Box::new(LoggingAdapter(seen.clone())),
            Box::new(MemorySettingsStore::new()),
            clock.clone(),
        );
        let (sender, signal_receiver) = mpsc::channel();
        drop(sender);
        let (signal_sender, _) = mpsc::channel();
        let state = SignalState {
            running: Arc::new(AtomicBool::new(true)),
            signal_receiver,
            signal_sender,
        };
        let result = Runtime::new(engine, Config::default(), state, clock, false).execute();

        unsafe {
            match original {
                Some(val) => std::env::set_var("XDG_RUNTIME_DIR", val),
                None => std::env::remove_var("XDG_RUNTIME_DIR"),
            }
        }

        result.unwrap();
        assert_eq!(seen.inverted.lock().unwrap().len(), 1);
        assert_eq!(*seen.restores.lock().unwrap(), 1);
    }

    fn dusk_config(transition: &str) -> Config {
        Config {
            night_start: Some("21:00".into()),
            night_end: Some("07:00".into()),
            transition: Some(transition.into()),
            ..Config::default()
        }
    }

    #[test]
    #[serial]
    fn test_unrelated_messages_do_not_delay_polling() {
        crate::common::logger::Log::set_enabled(false);
        let temp_dir = tempdir().unwrap();
        let original = std::env::var("XDG_RUNTIME_DIR").ok();
        unsafe {
            std::env::set_var("XDG_RUNTIME_DIR", temp_dir.path());
        }

        let seen = Seen::default();
        // Inside a 200s dusk, so the engine polls every second
        let clock = Arc::new(ManualClock::at_time(NaiveTime::from_hms_opt(21, 0, 0).unwrap()));
        let engine = Engine::new(
            Box::new(LoggingAdapter(seen.clone())),
            Box::new(MemorySettingsStore::new()),
            clock.clone(),
        );
        let state = signal_state(Vec::new());
        let sender = state.signal_sender.clone();
        let mut runtime = Runtime::new(engine, dusk_config("200s"), state, clock, false);
        runtime.focus_source = |_, _| false;

        // Focus switches every 200ms for 3.5s, faster than the polling period
        let feeder = thread::spawn(move || {
            for _ in 0..17 {
                thread::sleep(Duration::from_millis(200));
                sender.send(SignalMessage::Focus("kitty".into())).unwrap();
            }
            thread::sleep(Duration::from_millis(100));
            sender.send(SignalMessage::Shutdown).unwrap();
        });
        let result = runtime.execute();
        feeder.join().unwrap();

        unsafe {
            match original {
                Some(val) => std::env::set_var("XDG_RUNTIME_DIR", val),
                None => std::env::remove_var("XDG_RUNTIME_DIR"),
            }
        }

        result.unwrap();
        // The start plus at least two of the three polls due in 3.5s
        let applied = seen.inverted.lock().unwrap().len();
        assert!(applied >= 3, "only {applied} gamma update(s) during dusk");
    }

    static FOCUS_STARTS: AtomicUsize = AtomicUsize::new(0);

    fn counting_focus_source(_: Sender<SignalMessage>, _: bool) -> bool {
        FOCUS_STARTS.fetch_add(1, Ordering::SeqCst);
        true
    }

    #[test]
    #[serial]
    fn test_reload_with_exclusions_starts_focus_listener() {
        crate::common::logger::Log::set_enabled(false);
        FOCUS_STARTS.store(0, Ordering::SeqCst);

        let seen = Seen::default();
        let clock = Arc::new(ManualClock::at_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
        let engine = Engine::new(
            Box::new(LoggingAdapter(seen.clone())),
            Box::new(MemorySettingsStore::new()),
            clock.clone(),
        );
        let mut runtime =
            Runtime::new(engine, dusk_config("1h"), signal_state(Vec::new()), clock, false);
        runtime.focus_source = counting_focus_source;

        let config = runtime.config.clone();
        runtime.ensure_focus_listener(&config);
        let options = runtime.config.start_options(None);
        runtime.engine.start(options).unwrap();
        assert_eq!(FOCUS_STARTS.load(Ordering::SeqCst), 0);

        let with_exclusions = Config {
            exclude_apps: Some(vec!["mpv".into()]),
            ..dusk_config("1h")
        };
        runtime.apply_config(with_exclusions.clone());
        assert_eq!(FOCUS_STARTS.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.config, with_exclusions);

        runtime.handle_message(SignalMessage::Focus("mpv".into())).unwrap();
        assert!(runtime.engine.is_paused());

        // A second config with exclusions reuses the running listener
        runtime.apply_config(Config {
            exclude_apps: Some(vec!["mpv".into(), "vlc".into()]),
            ..dusk_config("1h")
        });
        assert_eq!(FOCUS_STARTS.load(Ordering::SeqCst), 1);
    }
}
