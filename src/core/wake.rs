//! The engine's next re-evaluation time.

use chrono::{NaiveTime, Timelike};
use std::time::Duration;

use crate::common::constants::{MINIMUM_POLL_SECS, POLL_DIVISOR, SECONDS_PER_DAY};

/// When the engine wants to be recomputed next.
///
/// The runtime loop honors this; the engine itself never sleeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Wake {
    /// Nothing armed (stopped or paused).
    #[default]
    Idle,
    /// Wake once at this second of the day.
    At(u32),
    /// Keep waking with this period while inside a transition.
    Every(Duration),
}

impl Wake {
    /// Polling wake for a transition of `duration` seconds.
    pub fn polling(duration: u32) -> Self {
        Self::Every(Duration::from_secs(u64::from(
            (duration / POLL_DIVISOR).max(MINIMUM_POLL_SECS),
        )))
    }

    /// Time from `now` until this wake fires, or `None` when idle.
    ///
    /// A precise wake equal to `now` is a full day away.
    pub fn time_until(&self, now: NaiveTime) -> Option<Duration> {
        match *self {
            Self::Idle => None,
            Self::Every(period) => Some(period),
            Self::At(target) => {
                let day_ms = u64::from(SECONDS_PER_DAY) * 1000;
                let now_ms = u64::from(now.num_seconds_from_midnight()) * 1000
                    + u64::from(now.nanosecond().min(999_999_999) / 1_000_000);
                let target_ms = u64::from(target % SECONDS_PER_DAY) * 1000;
                let delta = (target_ms + day_ms - now_ms) % day_ms;
                Some(Duration::from_millis(if delta == 0 { day_ms } else { delta }))
            }
        }
    }
}
