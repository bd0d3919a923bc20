//! Clock abstraction so the engine can be driven by real or fixed time.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone};
use std::sync::Mutex;

/// Source of the current local time.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    /// Whether this clock is not the system clock.
    fn is_manual(&self) -> bool {
        false
    }
}

/// The system clock.
pub struct RealClock;

impl TimeSource for RealClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
///
/// Used by the engine tests to pin the time of day.
pub struct ManualClock {
    current: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// A clock reading `time` on a fixed winter date, away from DST switches.
    pub fn at_time(time: NaiveTime) -> Self {
        Self::new(local_on_fixed_date(time))
    }

    pub fn set(&self, when: DateTime<Local>) {
        if let Ok(mut current) = self.current.lock() {
            *current = when;
        }
    }

    pub fn set_time(&self, time: NaiveTime) {
        self.set(local_on_fixed_date(time));
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut current) = self.current.lock() {
            *current += by;
        }
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> DateTime<Local> {
        match self.current.lock() {
            Ok(current) => *current,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn is_manual(&self) -> bool {
        true
    }
}

fn local_on_fixed_date(time: NaiveTime) -> DateTime<Local> {
    let naive = NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap_or_default()
        .and_time(time);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| Local.from_utc_datetime(&naive))
}
