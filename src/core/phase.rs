//! Phase classification and temperature interpolation.
//!
//! Given a [`Schedule`] and the current second of the day, [`classify`] decides
//! which of the four phases is active, what temperature to show, when the next
//! precise re-evaluation is due, and whether the night phase asks for inversion.

use anyhow::Result;

use crate::common::constants::SECONDS_PER_DAY;
use crate::core::schedule::{Schedule, format_clock, is_between};

/// The four phases of the daily cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Transition from day to night temperature.
    Dusk,
    /// Transition from night to day temperature.
    Dawn,
    Day,
    Night,
}

impl Phase {
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Dusk | Self::Dawn)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Dusk => "Dusk",
            Self::Dawn => "Dawn",
            Self::Day => "Day",
            Self::Night => "Night",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Day => "󰖨 ",
            Self::Night => " ",
            Self::Dusk => "󰖛 ",
            Self::Dawn => "󰖜 ",
        }
    }
}

/// Temperatures and night behaviour the classifier works with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseSettings {
    pub night_temp: u32,
    pub day_temp: u32,
    pub invert_at_night: bool,
}

/// Result of classifying one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub phase: Phase,
    /// Kelvin, fractional inside the transitions.
    pub temperature: f64,
    /// Seconds since midnight of the next phase boundary worth waking for.
    /// `None` inside a transition, where the caller polls instead.
    pub next_wake: Option<u32>,
    pub night_inversion_requested: bool,
}

/// Classify `now` (seconds since midnight) against `schedule`.
///
/// Phases are tested in the order dusk, dawn, day, night. Boundaries are
/// inclusive, so a boundary instant belongs to the transition touching it.
///
/// # Errors
/// Returns an error when no phase matches, which cannot happen for a schedule
/// built by [`Schedule::derive`].
pub fn classify(now: u32, schedule: &Schedule, settings: &PhaseSettings) -> Result<Classification> {
    let now = now % SECONDS_PER_DAY;
    let day = f64::from(settings.day_temp);
    let night = f64::from(settings.night_temp);

    if is_between(now, schedule.night_start, schedule.night_end) {
        let progress = progress(now, schedule.night_start, schedule.night_end);
        return Ok(Classification {
            phase: Phase::Dusk,
            temperature: interpolate(day, night, progress),
            next_wake: None,
            night_inversion_requested: false,
        });
    }

    if is_between(now, schedule.day_start, schedule.day_end) {
        let progress = progress(now, schedule.day_start, schedule.day_end);
        return Ok(Classification {
            phase: Phase::Dawn,
            temperature: interpolate(night, day, progress),
            next_wake: None,
            night_inversion_requested: false,
        });
    }

    if is_between(now, schedule.day_end, schedule.night_start) {
        return Ok(Classification {
            phase: Phase::Day,
            temperature: day,
            next_wake: Some(schedule.night_start),
            night_inversion_requested: false,
        });
    }

    if is_between(now, schedule.night_end, schedule.day_start) {
        return Ok(Classification {
            phase: Phase::Night,
            temperature: night,
            next_wake: Some(schedule.day_start),
            night_inversion_requested: settings.invert_at_night,
        });
    }

    anyhow::bail!(
        "BUG: {} matched no phase of schedule night {}-{}, day {}-{}",
        format_clock(now),
        format_clock(schedule.night_start),
        format_clock(schedule.night_end),
        format_clock(schedule.day_start),
        format_clock(schedule.day_end)
    )
}

/// Fraction of the window `[start, end]` elapsed at `now`, unwrapping midnight.
fn progress(now: u32, start: u32, end: u32) -> f64 {
    let (mut now, mut end) = (now, end);
    if end < start {
        end += SECONDS_PER_DAY;
        if now < start {
            now += SECONDS_PER_DAY;
        }
    }
    if end == start {
        return 1.0;
    }
    f64::from(now - start) / f64::from(end - start)
}

fn interpolate(from: f64, to: f64, progress: f64) -> f64 {
    from + (to - from) * progress.clamp(0.0, 1.0)
}

/// Log the announcement for entering `phase`.
pub fn log_phase_announcement(phase: Phase) {
    if phase.is_transitioning() {
        log_block_start!("Commencing {} {}", phase.display_name().to_lowercase(), phase.symbol());
    } else {
        log_block_start!(
            "Entering {} mode {}",
            phase.display_name().to_lowercase(),
            phase.symbol()
        );
    }
}

/// Log a phase change, noting when a transition was skipped over.
pub fn log_phase_change(from: Option<Phase>, to: Phase) {
    match (from, to) {
        (Some(from), to) if from == to => {}
        (Some(from @ (Phase::Dusk | Phase::Dawn)), to @ (Phase::Day | Phase::Night)) => {
            log_decorated!("Transition 100% complete");
            log_block_start!("Completed {} {}", from.display_name().to_lowercase(), from.symbol());
            log_phase_announcement(to);
        }
        (Some(Phase::Day), Phase::Dusk) | (Some(Phase::Night), Phase::Dawn) | (None, _) => {
            log_phase_announcement(to);
        }
        (Some(from), to) => {
            log_pipe!();
            log_warning!("Unexpected phase jump from {:?} to {:?}", from, to);
            log_indented!("This may indicate a system clock change or resume from suspend");
            log_phase_announcement(to);
        }
    }
}
