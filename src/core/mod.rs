//! The schedule engine.
//!
//! [`Engine`] owns the derived schedule, the inversion arbiter and the
//! subscriber registry. Every recompute runs to completion:
//!
//! 1. classify the current time into a phase and temperature
//! 2. update the engine's own night request and resolve the effective inversion
//! 3. look up the gamma for the temperature and program every display
//! 4. notify subscribers if the inversion reason changed
//! 5. arm the next [`Wake`]
//!
//! The engine never sleeps or spawns threads. The runtime loop in [`runtime`]
//! reads [`Engine::wake`] and calls back into the engine when it is due.

pub mod collaborators;
pub mod exclusion;
pub mod inversion;
pub mod phase;
pub mod ramp;
pub mod runtime;
pub mod schedule;
pub mod subscriptions;
pub mod wake;

use anyhow::{Context, Result};
use chrono::Timelike;
use std::sync::Arc;

use crate::common::constants::*;
use crate::core::{
    collaborators::{DisplayAdapter, SettingsStore, TopologyWatcher},
    exclusion::{ExclusionEvent, ExclusionFilter},
    inversion::{InversionArbiter, UserOverride},
    phase::{Classification, Phase, PhaseSettings, classify, log_phase_change},
    ramp::{Rgb, gamma_for},
    schedule::{Schedule, format_clock, parse_clock, parse_duration},
    subscriptions::{InversionCallback, SubscriberRegistry},
    wake::Wake,
};
use crate::time::TimeSource;

/// Parameters for [`Engine::start`].
pub struct StartOptions {
    pub night_temp: u32,
    pub day_temp: u32,
    /// Centre of the dusk transition, `HH:MM[:SS]`.
    pub night_start: String,
    /// Centre of the dawn transition, `HH:MM[:SS]`.
    pub night_end: String,
    /// Transition length, e.g. `"4h"` or `"90m"`.
    pub transition: String,
    pub invert_at_night: bool,
    exclusion: Option<Box<dyn ExclusionFilter>>,
}

impl StartOptions {
    pub fn new(night_temp: u32, night_start: impl Into<String>, night_end: impl Into<String>) -> Self {
        Self {
            night_temp,
            day_temp: DEFAULT_DAY_TEMP,
            night_start: night_start.into(),
            night_end: night_end.into(),
            transition: DEFAULT_TRANSITION.to_string(),
            invert_at_night: DEFAULT_INVERT_AT_NIGHT,
            exclusion: None,
        }
    }

    pub fn transition(mut self, transition: impl Into<String>) -> Self {
        self.transition = transition.into();
        self
    }

    pub fn day_temp(mut self, day_temp: u32) -> Self {
        self.day_temp = day_temp;
        self
    }

    pub fn invert_at_night(mut self, invert: bool) -> Self {
        self.invert_at_night = invert;
        self
    }

    /// Pause the engine while `filter` reports its condition.
    pub fn exclusion(mut self, filter: impl ExclusionFilter + 'static) -> Self {
        self.exclusion = Some(Box::new(filter));
        self
    }
}

/// State that only exists between `start` and `stop`.
struct RunningState {
    schedule: Schedule,
    settings: PhaseSettings,
    exclusion: Option<Box<dyn ExclusionFilter>>,
    paused: bool,
    wake: Wake,
    last: Option<Classification>,
}

/// Read-only view of a running engine, used for status reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    pub schedule: Schedule,
    pub phase: Option<Phase>,
    pub temperature: Option<f64>,
    pub inverted: Option<String>,
    /// Active inversion requests, the engine's own night request included.
    pub requests: Vec<String>,
    pub paused: bool,
    pub wake: Wake,
}

pub struct Engine {
    adapter: Box<dyn DisplayAdapter>,
    topology: Option<Box<dyn TopologyWatcher>>,
    store: Box<dyn SettingsStore>,
    clock: Arc<dyn TimeSource>,
    debug_enabled: bool,
    state: Option<RunningState>,
    arbiter: InversionArbiter,
    subscribers: SubscriberRegistry,
    last_emitted: Option<String>,
    wake_generation: u64,
}

impl Engine {
    pub fn new(
        adapter: Box<dyn DisplayAdapter>,
        store: Box<dyn SettingsStore>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            adapter,
            topology: None,
            store,
            clock,
            debug_enabled: false,
            state: None,
            arbiter: InversionArbiter::new(),
            subscribers: SubscriberRegistry::new(),
            last_emitted: None,
            wake_generation: 0,
        }
    }

    pub fn with_topology(mut self, watcher: Box<dyn TopologyWatcher>) -> Self {
        self.topology = Some(watcher);
        self
    }

    pub fn with_debug(mut self, debug_enabled: bool) -> Self {
        self.debug_enabled = debug_enabled;
        self
    }

    pub fn is_running(&self) -> bool {
        self.state.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.paused)
    }

    pub fn schedule(&self) -> Option<Schedule> {
        self.state.as_ref().map(|s| s.schedule)
    }

    /// The wake the runtime should honor next.
    pub fn wake(&self) -> Wake {
        self.state.as_ref().map(|s| s.wake).unwrap_or_default()
    }

    /// Bumped every time the wake is re-armed, even to the same value.
    ///
    /// A periodic wake restarts its period only when this changes.
    pub fn wake_generation(&self) -> u64 {
        self.wake_generation
    }

    pub fn adapter_name(&self) -> &'static str {
        self.adapter.name()
    }

    pub fn status(&self) -> Option<EngineStatus> {
        self.state.as_ref().map(|s| EngineStatus {
            schedule: s.schedule,
            phase: s.last.map(|c| c.phase),
            temperature: s.last.map(|c| c.temperature),
            inverted: self.last_emitted.clone(),
            requests: self.arbiter.requests().map(str::to_string).collect(),
            paused: s.paused,
            wake: s.wake,
        })
    }

    /// Validate `options`, derive the schedule and begin driving the displays.
    ///
    /// Starting a running engine stops it first, without notifying subscribers
    /// unless the inversion actually changes. On a validation error the engine
    /// is left untouched.
    pub fn start(&mut self, options: StartOptions) -> Result<()> {
        validate_temperature("night_temp", options.night_temp)?;
        validate_temperature("day_temp", options.day_temp)?;
        let night_mid = parse_clock(&options.night_start).context("invalid night_start")?;
        let day_mid = parse_clock(&options.night_end).context("invalid night_end")?;
        let duration = parse_duration(&options.transition).context("invalid transition")?;
        let schedule = Schedule::derive(night_mid, day_mid, duration)?;

        if self.halt() {
            log_block_start!("Restarting with new schedule");
        }

        self.state = Some(RunningState {
            schedule,
            settings: PhaseSettings {
                night_temp: options.night_temp,
                day_temp: options.day_temp,
                invert_at_night: options.invert_at_night,
            },
            exclusion: None,
            paused: false,
            wake: Wake::Idle,
            last: None,
        });

        self.arbiter
            .set_user_override(UserOverride::from_stored(self.store.get(OVERRIDE_SETTING_KEY)));

        if let Some(watcher) = self.topology.as_mut()
            && let Err(e) = watcher.start()
        {
            log_warning!("Display hotplug detection unavailable: {e}");
        }

        log_block_start!(
            "Dusk {} to {}, dawn {} to {}",
            format_clock(schedule.night_start),
            format_clock(schedule.night_end),
            format_clock(schedule.day_start),
            format_clock(schedule.day_end)
        );
        log_indented!(
            "Night {}K, day {}K{}",
            options.night_temp,
            options.day_temp,
            if options.invert_at_night { ", inverted at night" } else { "" }
        );

        self.recompute()?;

        if let Some(mut filter) = options.exclusion {
            let event = filter.subscribe();
            if let Some(state) = self.state.as_mut() {
                state.exclusion = Some(filter);
            }
            if event == Some(ExclusionEvent::Enter) {
                self.pause();
            }
        }

        Ok(())
    }

    /// Restore every display and release the schedule. No-op when stopped.
    ///
    /// Named requests survive a stop; the engine's own night request does not.
    pub fn stop(&mut self) {
        if self.halt() {
            self.emit(None);
            log_block_start!("Stopped, display colors restored");
        }
    }

    /// Tear down the running state without notifying anyone.
    ///
    /// Returns `false` when already stopped.
    fn halt(&mut self) -> bool {
        let Some(mut state) = self.state.take() else {
            return false;
        };
        self.wake_generation += 1;

        self.restore_displays();
        if let Some(watcher) = self.topology.as_mut() {
            watcher.stop();
        }
        if let Some(filter) = state.exclusion.as_mut() {
            filter.unsubscribe();
        }

        self.arbiter.set_request(NIGHT_REQUEST_KEY, false);
        true
    }

    /// Add or withdraw a named inversion request.
    pub fn request_invert(&mut self, id: &str, invert: bool) -> Result<()> {
        validate_key(id)?;
        if id == NIGHT_REQUEST_KEY {
            anyhow::bail!("'{NIGHT_REQUEST_KEY}' is reserved for the night schedule");
        }
        if !self.is_running() {
            return Ok(());
        }

        if self.arbiter.set_request(id, invert) {
            if self.debug_enabled {
                log_pipe!();
                log_debug!("Request '{id}' {}", if invert { "added" } else { "withdrawn" });
            }
            self.recompute()?;
        }
        Ok(())
    }

    /// Apply a user override: `Some` pins it, `None` toggles.
    ///
    /// The resulting override is persisted so it survives restarts.
    pub fn toggle_invert(&mut self, value: Option<bool>) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }

        self.arbiter.toggle(value);
        let persisted = match self.arbiter.user_override().as_stored() {
            Some(flag) => self.store.set(OVERRIDE_SETTING_KEY, flag),
            None => self.store.clear(OVERRIDE_SETTING_KEY),
        };
        if let Err(e) = persisted {
            log_warning!("Failed to save inversion override: {e}");
        }

        log_block_start!(
            "Inversion override: {}",
            match self.arbiter.user_override() {
                UserOverride::Inverted => "inverted",
                UserOverride::NotInverted => "not inverted",
                UserOverride::Unset => "cleared",
            }
        );

        self.recompute()
    }

    /// The current inversion reason, `None` when not inverted or stopped.
    pub fn is_inverted(&self) -> Option<&str> {
        if self.is_running() {
            self.arbiter.effective()
        } else {
            None
        }
    }

    /// Register `callback` for inversion changes and return its key.
    ///
    /// When running, the callback is invoked once right away with the current value.
    pub fn invert_subscribe(&mut self, key: Option<&str>, callback: InversionCallback) -> Result<String> {
        if let Some(key) = key {
            validate_key(key)?;
        }
        let key = self.subscribers.insert(key, callback);
        if self.is_running() {
            self.subscribers.notify_one(&key, self.last_emitted.as_deref());
        }
        Ok(key)
    }

    pub fn invert_unsubscribe(&mut self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.subscribers.remove(key);
        Ok(())
    }

    /// Called by the runtime when the armed wake elapses.
    pub fn on_wake(&mut self) -> Result<()> {
        if self.is_running() && !self.is_paused() {
            self.recompute()?;
        }
        Ok(())
    }

    /// Recompute now, for instance after a clock jump or resume from suspend.
    pub fn force_recompute(&mut self) -> Result<()> {
        if self.is_running() {
            self.recompute()?;
        }
        Ok(())
    }

    /// Check the topology watcher and reapply when displays changed.
    ///
    /// A failing watcher is dropped with a warning; only recompute errors are
    /// returned.
    pub fn poll_topology(&mut self) -> Result<bool> {
        if !self.is_running() || self.is_paused() {
            return Ok(false);
        }
        let Some(watcher) = self.topology.as_mut() else {
            return Ok(false);
        };
        match watcher.poll_changed() {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            Err(e) => {
                watcher.stop();
                self.topology = None;
                log_pipe!();
                log_warning!("Display hotplug detection stopped: {e}");
                return Ok(false);
            }
        }

        log_block_start!("Display configuration changed, reapplying");
        self.recompute()?;
        Ok(true)
    }

    /// Forward a focus change to the exclusion filter.
    pub fn focus_changed(&mut self, app: &str) -> Result<()> {
        let event = self
            .state
            .as_mut()
            .and_then(|s| s.exclusion.as_mut())
            .and_then(|filter| filter.observe(app));
        match event {
            Some(event) => self.handle_exclusion(event),
            None => Ok(()),
        }
    }

    pub fn handle_exclusion(&mut self, event: ExclusionEvent) -> Result<()> {
        match event {
            ExclusionEvent::Enter => {
                self.pause();
                Ok(())
            }
            ExclusionEvent::Exit => self.resume(),
        }
    }

    fn pause(&mut self) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if state.paused {
            return;
        }
        state.paused = true;
        state.wake = Wake::Idle;
        self.wake_generation += 1;

        log_block_start!("Paused while an excluded application has focus");
        self.restore_displays();
    }

    fn resume(&mut self) -> Result<()> {
        let Some(state) = self.state.as_mut() else {
            return Ok(());
        };
        if !state.paused {
            return Ok(());
        }
        state.paused = false;

        log_block_start!("Resumed");
        self.recompute()
    }

    fn recompute(&mut self) -> Result<()> {
        let now = self.clock.now().time();
        let Some(state) = self.state.as_mut() else {
            return Ok(());
        };

        state.wake = Wake::Idle;
        self.wake_generation += 1;
        let classification = classify(now.num_seconds_from_midnight(), &state.schedule, &state.settings)?;
        let previous_phase = state.last.map(|c| c.phase);
        state.last = Some(classification);
        let paused = state.paused;
        let duration = state.schedule.duration;

        self.arbiter
            .set_request(NIGHT_REQUEST_KEY, classification.night_inversion_requested);
        let reason = self.arbiter.effective().map(str::to_string);

        log_phase_change(previous_phase, classification.phase);

        if !paused {
            self.apply(classification.temperature, reason.is_some());
        }

        self.emit(reason);

        if paused {
            return Ok(());
        }

        let wake = match classification.next_wake {
            Some(boundary) => Wake::At(boundary),
            None => Wake::polling(duration),
        };
        if let Some(state) = self.state.as_mut() {
            state.wake = wake;
        }

        if self.debug_enabled {
            log_debug!(
                "{} at {}: {:.0}K, next wake {:?}",
                classification.phase.display_name(),
                now.format("%H:%M:%S"),
                classification.temperature,
                wake
            );
        }

        Ok(())
    }

    fn apply(&mut self, temperature: f64, inverted: bool) {
        let gamma = gamma_for(temperature);
        let (white, black) = if inverted {
            (Rgb::ZERO, gamma)
        } else {
            (gamma, Rgb::ZERO)
        };

        let displays = match self.adapter.list_displays() {
            Ok(displays) => displays,
            Err(e) => {
                log_pipe!();
                log_warning!("Failed to list displays: {e}");
                log_indented!("Will retry on next cycle...");
                return;
            }
        };

        for display in &displays {
            if let Err(e) = self.adapter.set_gamma(display, white, black) {
                log_pipe!();
                log_warning!("Failed to set gamma on {display}: {e}");
            }
        }
    }

    fn restore_displays(&mut self) {
        let displays = match self.adapter.list_displays() {
            Ok(displays) => displays,
            Err(e) => {
                log_warning!("Failed to list displays for restore: {e}");
                return;
            }
        };

        for display in &displays {
            if let Err(e) = self.adapter.restore_gamma(display) {
                log_warning!("Failed to restore gamma on {display}: {e}");
            }
        }
    }

    fn emit(&mut self, reason: Option<String>) {
        if reason == self.last_emitted {
            return;
        }

        match reason.as_deref() {
            Some(reason) => log_decorated!("Display inverted ({reason})"),
            None => log_decorated!("Display inversion off"),
        }

        self.subscribers.notify_all(reason.as_deref());
        self.last_emitted = reason;
    }
}

fn validate_temperature(field: &str, kelvin: u32) -> Result<()> {
    if !(MINIMUM_TEMP..=MAXIMUM_TEMP).contains(&kelvin) {
        anyhow::bail!("{field} ({kelvin}) must be between {MINIMUM_TEMP} and {MAXIMUM_TEMP} Kelvin");
    }
    Ok(())
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        anyhow::bail!("inversion key must not be empty");
    }
    if key.chars().any(char::is_whitespace) {
        anyhow::bail!("inversion key '{key}' must not contain whitespace");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collaborators::{DisplayHandle, MemorySettingsStore, MockSettingsStore};
    use crate::core::exclusion::AppListFilter;
    use crate::time::ManualClock;
    use chrono::NaiveTime;
    use mockall::predicate::eq;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Set { id: u32, white: Rgb, black: Rgb },
        Restore { id: u32 },
    }

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<Call> {
            std::mem::take(&mut *self.calls.lock().unwrap())
        }
    }

    struct RecordingAdapter {
        recorder: Recorder,
        displays: u32,
    }

    impl DisplayAdapter for RecordingAdapter {
        fn name(&self) -> &'static str {
            "Recording"
        }

        fn list_displays(&mut self) -> Result<Vec<DisplayHandle>> {
            Ok((0..self.displays)
                .map(|id| DisplayHandle { id, name: format!("OUT-{id}") })
                .collect())
        }

        fn set_gamma(&mut self, display: &DisplayHandle, white: Rgb, black: Rgb) -> Result<()> {
            self.recorder.calls.lock().unwrap().push(Call::Set { id: display.id, white, black });
            Ok(())
        }

        fn restore_gamma(&mut self, display: &DisplayHandle) -> Result<()> {
            self.recorder.calls.lock().unwrap().push(Call::Restore { id: display.id });
            Ok(())
        }
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn engine_at(time: NaiveTime, store: Box<dyn SettingsStore>) -> (Engine, Recorder, Arc<ManualClock>) {
        crate::common::logger::Log::set_enabled(false);
        let recorder = Recorder::default();
        let clock = Arc::new(ManualClock::at_time(time));
        let adapter = RecordingAdapter { recorder: recorder.clone(), displays: 2 };
        let engine = Engine::new(Box::new(adapter), store, clock.clone());
        (engine, recorder, clock)
    }

    fn options() -> StartOptions {
        StartOptions::new(2800, "21:00", "07:00").transition("4h").invert_at_night(true)
    }

    fn seen() -> (Arc<Mutex<Vec<Option<String>>>>, InversionCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, Box::new(move |r| sink.lock().unwrap().push(r.map(str::to_string))))
    }

    #[test]
    fn test_start_derives_schedule_and_applies_dusk() {
        let (mut engine, recorder, _) = engine_at(at(20, 0), Box::new(MemorySettingsStore::new()));
        engine.start(options()).unwrap();

        let schedule = engine.schedule().unwrap();
        assert_eq!(format_clock(schedule.night_start), "19:00:00");
        assert_eq!(format_clock(schedule.day_end), "09:00:00");

        let status = engine.status().unwrap();
        assert_eq!(status.phase, Some(Phase::Dusk));
        let temp = status.temperature.unwrap();
        assert!(temp > 2800.0 && temp < 6500.0);
        assert_eq!(engine.is_inverted(), None);
        assert!(matches!(engine.wake(), Wake::Every(_)));

        let calls = recorder.take();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], Call::Set { black, .. } if black == Rgb::ZERO));
    }

    #[test]
    fn test_start_rejects_invalid_parameters() {
        let (mut engine, recorder, _) = engine_at(at(12, 0), Box::new(MemorySettingsStore::new()));
        assert!(engine.start(StartOptions::new(15000, "21:00", "07:00")).is_err());
        assert!(engine.start(StartOptions::new(2800, "21:00", "21:30").transition("4h")).is_err());
        assert!(engine.start(StartOptions::new(2800, "25:00", "07:00")).is_err());
        assert!(engine.start(options().transition("0s")).is_err());
        assert!(!engine.is_running());
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn test_night_inverts_with_reserved_reason() {
        let (mut engine, recorder, _) = engine_at(at(2, 0), Box::new(MemorySettingsStore::new()));
        engine.start(options()).unwrap();

        assert_eq!(engine.is_inverted(), Some(NIGHT_REQUEST_KEY));
        assert_eq!(engine.wake(), Wake::At(5 * 3600));
        let calls = recorder.take();
        assert!(matches!(calls[0], Call::Set { white, .. } if white == Rgb::ZERO));
    }

    #[test]
    fn test_requests_are_noops_while_stopped() {
        let (mut engine, recorder, _) = engine_at(at(12, 0), Box::new(MemorySettingsStore::new()));
        engine.request_invert("movie", true).unwrap();
        engine.toggle_invert(None).unwrap();
        assert_eq!(engine.is_inverted(), None);
        assert!(recorder.take().is_empty());

        engine.start(options()).unwrap();
        assert_eq!(engine.is_inverted(), None);
    }

    #[test]
    fn test_request_validation() {
        let (mut engine, _, _) = engine_at(at(12, 0), Box::new(MemorySettingsStore::new()));
        engine.start(options()).unwrap();
        assert!(engine.request_invert("", true).is_err());
        assert!(engine.request_invert("two words", true).is_err());
        assert!(engine.request_invert(NIGHT_REQUEST_KEY, true).is_err());
        assert!(engine.invert_subscribe(Some(" "), Box::new(|_| {})).is_err());
        assert!(engine.invert_unsubscribe("").is_err());
    }

    #[test]
    fn test_subscribe_fires_once_then_only_on_change() {
        let (mut engine, _, _) = engine_at(at(12, 0), Box::new(MemorySettingsStore::new()));
        engine.start(options()).unwrap();

        let (log, callback) = seen();
        let key = engine.invert_subscribe(None, callback).unwrap();
        assert_eq!(*log.lock().unwrap(), vec![None]);

        engine.request_invert("movie", true).unwrap();
        engine.request_invert("movie", true).unwrap();
        engine.request_invert("reader", true).unwrap();
        assert_eq!(*log.lock().unwrap(), vec![None, Some("movie".to_string())]);

        engine.invert_unsubscribe(&key).unwrap();
        engine.request_invert("movie", false).unwrap();
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_subscribe_while_stopped_does_not_fire() {
        let (mut engine, _, _) = engine_at(at(12, 0), Box::new(MemorySettingsStore::new()));
        let (log, callback) = seen();
        engine.invert_subscribe(Some("panel"), callback).unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_toggle_persists_override() {
        let mut store = MockSettingsStore::new();
        store.expect_get().with(eq(OVERRIDE_SETTING_KEY)).return_const(None::<bool>);
        store
            .expect_set()
            .with(eq(OVERRIDE_SETTING_KEY), eq(true))
            .times(1)
            .returning(|_, _| Ok(()));
        store
            .expect_clear()
            .with(eq(OVERRIDE_SETTING_KEY))
            .times(1)
            .returning(|_| Ok(()));

        let (mut engine, _, _) = engine_at(at(12, 0), Box::new(store));
        engine.start(options()).unwrap();

        engine.toggle_invert(None).unwrap();
        assert_eq!(engine.is_inverted(), Some(USER_REASON));
        engine.toggle_invert(None).unwrap();
        assert_eq!(engine.is_inverted(), None);
    }

    #[test]
    fn test_start_restores_persisted_override() {
        let mut store = MockSettingsStore::new();
        store.expect_get().with(eq(OVERRIDE_SETTING_KEY)).return_const(Some(false));

        let (mut engine, _, _) = engine_at(at(2, 0), Box::new(store));
        engine.start(options()).unwrap();

        // Night wants inversion, the stored override says no
        assert_eq!(engine.is_inverted(), None);
    }

    #[test]
    fn test_store_failure_is_not_fatal() {
        let mut store = MockSettingsStore::new();
        store.expect_get().return_const(None::<bool>);
        store
            .expect_set()
            .returning(|_, _| Err(anyhow::anyhow!("read-only file system")));

        let (mut engine, _, _) = engine_at(at(12, 0), Box::new(store));
        engine.start(options()).unwrap();
        engine.toggle_invert(Some(true)).unwrap();
        assert_eq!(engine.is_inverted(), Some(USER_REASON));
    }

    #[test]
    fn test_stop_restores_and_notifies() {
        let (mut engine, recorder, _) = engine_at(at(2, 0), Box::new(MemorySettingsStore::new()));
        engine.start(options()).unwrap();
        engine.request_invert("movie", true).unwrap();
        let (log, callback) = seen();
        engine.invert_subscribe(Some("panel"), callback).unwrap();
        recorder.take();

        engine.stop();
        assert!(!engine.is_running());
        assert_eq!(engine.wake(), Wake::Idle);
        assert_eq!(engine.is_inverted(), None);
        assert_eq!(recorder.take(), vec![Call::Restore { id: 0 }, Call::Restore { id: 1 }]);
        assert_eq!(*log.lock().unwrap(), vec![Some("movie".to_string()), None]);

        // Second stop is a no-op
        engine.stop();
        assert!(recorder.take().is_empty());

        // Named requests survive, the night request does not
        engine.start(options().invert_at_night(false)).unwrap();
        assert_eq!(engine.is_inverted(), Some("movie"));
    }

    #[test]
    fn test_wake_moves_through_phases() {
        let (mut engine, _, clock) = engine_at(at(12, 0), Box::new(MemorySettingsStore::new()));
        engine.start(options()).unwrap();
        assert_eq!(engine.wake(), Wake::At(19 * 3600));

        clock.set_time(at(19, 0));
        engine.on_wake().unwrap();
        assert_eq!(engine.status().unwrap().phase, Some(Phase::Dusk));
        assert_eq!(engine.wake(), Wake::polling(4 * 3600));

        clock.set_time(at(23, 30));
        engine.on_wake().unwrap();
        assert_eq!(engine.status().unwrap().phase, Some(Phase::Night));
        assert_eq!(engine.is_inverted(), Some(NIGHT_REQUEST_KEY));
    }

    #[test]
    fn test_exclusion_pauses_and_resumes() {
        let (mut engine, recorder, _) = engine_at(at(12, 0), Box::new(MemorySettingsStore::new()));
        engine
            .start(options().exclusion(AppListFilter::new(["mpv"])))
            .unwrap();
        recorder.take();

        engine.focus_changed("mpv").unwrap();
        assert!(engine.is_paused());
        assert_eq!(engine.wake(), Wake::Idle);
        assert_eq!(recorder.take(), vec![Call::Restore { id: 0 }, Call::Restore { id: 1 }]);

        // Requests still resolve and notify, displays stay untouched
        let (log, callback) = seen();
        engine.invert_subscribe(None, callback).unwrap();
        engine.request_invert("movie", true).unwrap();
        assert_eq!(engine.is_inverted(), Some("movie"));
        assert_eq!(log.lock().unwrap().last().cloned(), Some(Some("movie".to_string())));
        assert!(recorder.take().is_empty());
        assert_eq!(engine.wake(), Wake::Idle);

        engine.focus_changed("kitty").unwrap();
        assert!(!engine.is_paused());
        assert_eq!(recorder.take().len(), 2);
        assert_eq!(engine.wake(), Wake::At(19 * 3600));
    }

    #[test]
    fn test_exclusion_matching_at_start_pauses_immediately() {
        let (mut engine, _, _) = engine_at(at(12, 0), Box::new(MemorySettingsStore::new()));
        let filter = AppListFilter::new(["mpv"]).with_focus(Some("mpv".into()));
        engine.start(options().exclusion(filter)).unwrap();
        assert!(engine.is_paused());
        assert_eq!(engine.wake(), Wake::Idle);
    }

    #[test]
    fn test_restart_replaces_schedule() {
        let (mut engine, recorder, _) = engine_at(at(12, 0), Box::new(MemorySettingsStore::new()));
        engine.start(options()).unwrap();
        recorder.take();

        engine
            .start(StartOptions::new(3500, "22:00", "06:00").transition("1h"))
            .unwrap();
        let calls = recorder.take();
        assert!(matches!(calls[0], Call::Restore { .. }));
        assert_eq!(format_clock(engine.schedule().unwrap().night_start), "21:30:00");
    }

    #[test]
    fn test_restart_does_not_flicker_inversion() {
        let (mut engine, _, _) = engine_at(at(1, 0), Box::new(MemorySettingsStore::new()));
        engine.start(options()).unwrap();
        let (seen, callback) = seen();
        engine.invert_subscribe(Some("panel"), callback).unwrap();

        engine.start(options()).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![Some(NIGHT_REQUEST_KEY.to_string())]);

        engine.start(options().invert_at_night(false)).unwrap();
        assert_eq!(seen.lock().unwrap().last(), Some(&None));
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_wake_generation_tracks_rearming() {
        let (mut engine, _, _) = engine_at(at(20, 0), Box::new(MemorySettingsStore::new()));
        let stopped = engine.wake_generation();

        engine.start(options()).unwrap();
        let started = engine.wake_generation();
        assert!(started > stopped);

        // No exclusion filter, so focus changes leave the wake alone
        engine.focus_changed("kitty").unwrap();
        assert_eq!(engine.wake_generation(), started);

        // Same polling period, but a fresh arming
        engine.on_wake().unwrap();
        assert!(engine.wake_generation() > started);
        assert_eq!(engine.wake(), Wake::polling(4 * 3600));
    }

    struct ScriptedWatcher {
        results: Vec<Result<bool>>,
    }

    impl TopologyWatcher for ScriptedWatcher {
        fn start(&mut self) -> Result<()> {
            Ok(())
        }

        fn stop(&mut self) {}

        fn poll_changed(&mut self) -> Result<bool> {
            self.results.pop().unwrap_or(Ok(false))
        }
    }

    #[test]
    fn test_topology_change_reapplies() {
        let (engine, recorder, _) = engine_at(at(12, 0), Box::new(MemorySettingsStore::new()));
        // Popped from the back
        let watcher = ScriptedWatcher { results: vec![Ok(false), Ok(true)] };
        let mut engine = engine.with_topology(Box::new(watcher));

        assert!(!engine.poll_topology().unwrap());
        engine.start(options()).unwrap();
        recorder.take();

        assert!(engine.poll_topology().unwrap());
        assert_eq!(recorder.take().len(), 2);
        assert!(!engine.poll_topology().unwrap());
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn test_failing_topology_watcher_is_dropped() {
        let (engine, _, _) = engine_at(at(12, 0), Box::new(MemorySettingsStore::new()));
        let watcher = ScriptedWatcher {
            results: vec![Ok(true), Err(anyhow::anyhow!("connection lost"))],
        };
        let mut engine = engine.with_topology(Box::new(watcher));
        engine.start(options()).unwrap();

        assert!(!engine.poll_topology().unwrap());
        // The queued change is never observed once the watcher is gone
        assert!(!engine.poll_topology().unwrap());
    }
}
