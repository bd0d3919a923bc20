//! System event monitoring.
//!
//! Two background threads feed the runtime loop:
//! - suspend and resume from systemd-logind's `PrepareForSleep` D-Bus signal
//! - wall-clock jumps from a `CLOCK_REALTIME` timerfd armed with
//!   `TFD_TIMER_CANCEL_ON_SET`
//!
//! Either event forces a recompute, so a wake computed before the jump never
//! fires late. Both monitors degrade to a warning when unavailable.

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::time::TimeSpec;
use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use zbus::blocking::Connection;

use crate::io::signals::SignalMessage;

const MAX_MONITOR_RESTARTS: u8 = 3;
const RESTART_DELAY: Duration = Duration::from_secs(2);
/// Clock jumps this soon after resume belong to the resume itself.
const RESUME_GRACE_SECS: i64 = 5;

#[zbus::proxy(
    interface = "org.freedesktop.login1.Manager",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1"
)]
trait LogindManager {
    /// `start` is true before suspend and false after resume.
    #[zbus(signal)]
    fn prepare_for_sleep(&self, start: bool) -> zbus::Result<()>;
}

/// Shared between the two monitors so a resume is not reported twice.
#[derive(Clone, Default)]
struct SuspendState {
    sleeping: Arc<AtomicBool>,
    resumed_at: Arc<AtomicI64>,
}

impl SuspendState {
    fn now_secs() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }

    fn enter_sleep(&self) {
        self.sleeping.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.resumed_at.store(Self::now_secs(), Ordering::SeqCst);
        self.sleeping.store(false, Ordering::SeqCst);
    }

    /// Whether a clock jump should be attributed to suspend.
    fn explains_clock_jump(&self) -> bool {
        if self.sleeping.load(Ordering::Relaxed) {
            return true;
        }
        let resumed_at = self.resumed_at.load(Ordering::Relaxed);
        resumed_at != 0 && Self::now_secs() - resumed_at <= RESUME_GRACE_SECS
    }
}

/// Spawn the suspend and clock-change monitor threads.
pub fn start_system_monitors(signal_sender: Sender<SignalMessage>, debug_enabled: bool) {
    let state = SuspendState::default();

    thread::spawn({
        let signal_sender = signal_sender.clone();
        let state = state.clone();
        move || run_sleep_monitor(signal_sender, debug_enabled, state)
    });

    thread::spawn(move || {
        if let Err(e) = monitor_time_changes(signal_sender, debug_enabled, state) {
            log_pipe!();
            log_warning!("Time change monitor error: {e}");
            log_indented!("System time change detection will not be available");
        }
    });
}

/// Run the D-Bus monitor, reconnecting a bounded number of times.
fn run_sleep_monitor(signal_sender: Sender<SignalMessage>, debug_enabled: bool, state: SuspendState) {
    for attempt in 0..=MAX_MONITOR_RESTARTS {
        match monitor_sleep_signals(&signal_sender, debug_enabled, &state) {
            Ok(()) => return,
            Err(e) => {
                log_pipe!();
                log_warning!("Sleep monitor error: {e}");
                if attempt == MAX_MONITOR_RESTARTS {
                    log_indented!("Sleep/resume detection will not be available");
                    return;
                }
                log_indented!(
                    "Will restart D-Bus monitor (attempt {}/{})",
                    attempt + 1,
                    MAX_MONITOR_RESTARTS
                );
                thread::sleep(RESTART_DELAY);
            }
        }
    }
}

/// Returns `Ok` only when the main loop has gone away.
fn monitor_sleep_signals(
    signal_sender: &Sender<SignalMessage>,
    debug_enabled: bool,
    state: &SuspendState,
) -> Result<()> {
    let connection = Connection::system().context("Failed to connect to system D-Bus")?;
    let logind =
        LogindManagerProxyBlocking::new(&connection).context("Failed to create logind proxy")?;
    let sleep_signals = logind
        .receive_prepare_for_sleep()
        .context("Failed to subscribe to PrepareForSleep signals")?;

    if debug_enabled {
        log_pipe!();
        log_debug!("Subscribed to systemd-logind PrepareForSleep signals");
    }

    for signal in sleep_signals {
        let args = match signal.args() {
            Ok(args) => args,
            Err(e) => {
                log_pipe!();
                log_warning!("Failed to parse PrepareForSleep signal args: {e}");
                continue;
            }
        };

        let resuming = !args.start;
        if resuming {
            state.resume();
            log_pipe!();
            log_info!("System resuming from sleep/suspend");
        } else {
            state.enter_sleep();
            log_pipe!();
            log_info!("System entering sleep/suspend mode");
        }

        if signal_sender.send(SignalMessage::Sleep { resuming }).is_err() {
            return Ok(());
        }
    }

    anyhow::bail!("D-Bus connection lost - PrepareForSleep signal stream ended")
}

/// A realtime timer that fires only when the clock is set.
struct ClockJumpTimer {
    timer: TimerFd,
}

impl ClockJumpTimer {
    fn new() -> nix::Result<Self> {
        let timer = TimerFd::new(ClockId::CLOCK_REALTIME, TimerFlags::empty())?;
        let detector = Self { timer };
        detector.arm()?;
        Ok(detector)
    }

    fn arm(&self) -> nix::Result<()> {
        let flags =
            TimerSetTimeFlags::TFD_TIMER_ABSTIME | TimerSetTimeFlags::TFD_TIMER_CANCEL_ON_SET;
        // Far enough out to never expire on its own
        let far_future = TimeSpec::new(i64::MAX / 1000, 0);
        self.timer.set(Expiration::OneShot(far_future), flags)
    }

    /// Block until the wall clock is changed.
    fn wait(&self) -> Result<()> {
        match self.timer.wait() {
            Ok(()) | Err(Errno::ECANCELED) => {
                self.arm().context("Failed to re-arm clock change timer")
            }
            Err(e) => Err(anyhow::anyhow!("Timer wait error: {e}")),
        }
    }
}

fn monitor_time_changes(
    signal_sender: Sender<SignalMessage>,
    debug_enabled: bool,
    state: SuspendState,
) -> Result<()> {
    let timer = ClockJumpTimer::new().context("Failed to create time change detector")?;

    if debug_enabled {
        log_pipe!();
        log_debug!("Watching for wall-clock changes");
    }

    loop {
        timer.wait()?;

        if state.explains_clock_jump() {
            continue;
        }

        log_pipe!();
        log_info!("System time changed - recalculating schedule");
        if signal_sender.send(SignalMessage::TimeChange).is_err() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suspend_state_attribution() {
        let state = SuspendState::default();
        assert!(!state.explains_clock_jump());

        state.enter_sleep();
        assert!(state.explains_clock_jump());

        state.resume();
        // Within the grace period
        assert!(state.explains_clock_jump());

        state
            .resumed_at
            .store(SuspendState::now_secs() - RESUME_GRACE_SECS - 1, Ordering::SeqCst);
        assert!(!state.explains_clock_jump());
    }
}
