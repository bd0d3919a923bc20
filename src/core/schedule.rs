//! Schedule boundaries on the 24 hour circle.
//!
//! A schedule is described by two clock times, the centres of the dusk and
//! dawn transitions, and a transition length. From those it derives four
//! second offsets from midnight:
//!
//! ```text
//!   night_start ── dusk ── night_end ── night ── day_start ── dawn ── day_end ── day ──┐
//!   ^                                                                                   │
//!   └───────────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All arithmetic is modulo one day, so either window may straddle midnight.

use anyhow::{Context, Result};
use chrono::{NaiveTime, Timelike};
use regex::Regex;
use std::sync::OnceLock;

use crate::common::constants::{MAXIMUM_TRANSITION_SECS, MINIMUM_TRANSITION_SECS, SECONDS_PER_DAY};
use crate::common::utils::format_duration_secs;

/// Derived transition boundaries, each in `[0, 86400)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub night_start: u32,
    pub night_end: u32,
    pub day_start: u32,
    pub day_end: u32,
    /// Transition length in seconds.
    pub duration: u32,
}

impl Schedule {
    /// Build a schedule from the dusk and dawn midpoints (seconds since midnight).
    ///
    /// # Errors
    /// - `duration` is zero or longer than four hours
    /// - the two midpoints are not more than `duration` apart in both directions
    ///   around the clock, which would make the windows touch or overlap
    pub fn derive(night_mid: u32, day_mid: u32, duration: u32) -> Result<Self> {
        if !(MINIMUM_TRANSITION_SECS..=MAXIMUM_TRANSITION_SECS).contains(&duration) {
            anyhow::bail!(
                "transition ({}) must be between {}s and {}",
                format_duration_secs(duration),
                MINIMUM_TRANSITION_SECS,
                format_duration_secs(MAXIMUM_TRANSITION_SECS)
            );
        }

        let night_mid = night_mid % SECONDS_PER_DAY;
        let day_mid = day_mid % SECONDS_PER_DAY;
        let forward = forward_distance(night_mid, day_mid);
        let backward = forward_distance(day_mid, night_mid);
        if forward <= duration || backward <= duration {
            anyhow::bail!(
                "dusk ({}) and dawn ({}) are {} apart, which must exceed the {} transition",
                format_clock(night_mid),
                format_clock(day_mid),
                format_duration_secs(forward.min(backward)),
                format_duration_secs(duration)
            );
        }

        let half = duration / 2;
        Ok(Self {
            night_start: wrap_sub(night_mid, half),
            night_end: wrap_add(night_mid, half),
            day_start: wrap_sub(day_mid, half),
            day_end: wrap_add(day_mid, half),
            duration,
        })
    }
}

/// Cyclic inclusive range test on the 24 hour circle.
///
/// When `start <= end` this is a plain `start..=end` check. Otherwise the window
/// wraps through midnight and covers `start..86400` plus `0..=end`.
pub fn is_between(value: u32, start: u32, end: u32) -> bool {
    if start <= end {
        (start..=end).contains(&value)
    } else {
        value >= start || value <= end
    }
}

/// Seconds travelled going forward from `from` to `to`.
pub fn forward_distance(from: u32, to: u32) -> u32 {
    (to + SECONDS_PER_DAY - from % SECONDS_PER_DAY) % SECONDS_PER_DAY
}

fn wrap_add(value: u32, delta: u32) -> u32 {
    (value + delta) % SECONDS_PER_DAY
}

fn wrap_sub(value: u32, delta: u32) -> u32 {
    (value + SECONDS_PER_DAY - delta % SECONDS_PER_DAY) % SECONDS_PER_DAY
}

/// Parse a clock time (`HH:MM` or `HH:MM:SS`) into seconds since midnight.
pub fn parse_clock(text: &str) -> Result<u32> {
    let text = text.trim();
    let time = NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .with_context(|| format!("invalid clock time '{text}', expected HH:MM or HH:MM:SS"))?;
    Ok(time.num_seconds_from_midnight())
}

/// Format seconds since midnight as `HH:MM:SS`.
pub fn format_clock(secs: u32) -> String {
    let secs = secs % SECONDS_PER_DAY;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn unit_duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(\d+)h)?\s*(?:(\d+)m)?\s*(?:(\d+)s)?$").expect("valid duration regex")
    })
}

fn clock_duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2}):(\d{2})(?::(\d{2}))?$").expect("valid duration regex"))
}

/// Parse a transition length into seconds.
///
/// Accepted forms: unit strings (`"4h"`, `"90m"`, `"1h30m"`, `"45s"`),
/// clock-style spans (`"01:30"`, `"00:45:00"`) and a bare number of seconds.
pub fn parse_duration(text: &str) -> Result<u32> {
    let text = text.trim().to_ascii_lowercase();
    if text.is_empty() {
        anyhow::bail!("transition length is empty");
    }

    if let Ok(secs) = text.parse::<u32>() {
        return Ok(secs);
    }

    let field = |caps: &regex::Captures, i: usize| -> Result<u32> {
        caps.get(i)
            .map(|m| m.as_str().parse::<u32>())
            .transpose()
            .with_context(|| format!("number out of range in '{text}'"))
            .map(|v| v.unwrap_or(0))
    };

    if let Some(caps) = clock_duration_regex().captures(&text) {
        let (h, m, s) = (field(&caps, 1)?, field(&caps, 2)?, field(&caps, 3)?);
        if m >= 60 || s >= 60 {
            anyhow::bail!("invalid transition length '{text}'");
        }
        return Ok(h * 3600 + m * 60 + s);
    }

    match unit_duration_regex().captures(&text) {
        Some(caps) if caps.iter().skip(1).any(|c| c.is_some()) => {
            let (h, m, s) = (field(&caps, 1)?, field(&caps, 2)?, field(&caps, 3)?);
            h.checked_mul(3600)
                .and_then(|v| v.checked_add(m.checked_mul(60)?))
                .and_then(|v| v.checked_add(s))
                .with_context(|| format!("transition length '{text}' is too large"))
        }
        _ => anyhow::bail!(
            "invalid transition length '{text}', expected forms like \"4h\", \"90m\", \"1h30m\" or \"01:30\""
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: u32 = 3600;

    #[test]
    fn test_is_between_plain_window() {
        assert!(is_between(10 * H, 9 * H, 11 * H));
        assert!(is_between(9 * H, 9 * H, 11 * H));
        assert!(is_between(11 * H, 9 * H, 11 * H));
        assert!(!is_between(12 * H, 9 * H, 11 * H));
    }

    #[test]
    fn test_is_between_wraps_midnight() {
        assert!(is_between(23 * H + 30 * 60, 23 * H, H));
        assert!(is_between(0, 23 * H, H));
        assert!(is_between(H, 23 * H, H));
        assert!(!is_between(2 * H, 23 * H, H));
        assert!(!is_between(22 * H, 23 * H, H));
    }

    #[test]
    fn test_derive_boundaries() {
        let schedule = Schedule::derive(21 * H, 7 * H, 4 * H).unwrap();
        assert_eq!(format_clock(schedule.night_start), "19:00:00");
        assert_eq!(format_clock(schedule.night_end), "23:00:00");
        assert_eq!(format_clock(schedule.day_start), "05:00:00");
        assert_eq!(format_clock(schedule.day_end), "09:00:00");
    }

    #[test]
    fn test_derive_wraps_around_midnight() {
        let schedule = Schedule::derive(23 * H + 30 * 60, 8 * H, 2 * H).unwrap();
        assert_eq!(format_clock(schedule.night_start), "22:30:00");
        assert_eq!(format_clock(schedule.night_end), "00:30:00");
    }

    #[test]
    fn test_derive_rejects_close_midpoints() {
        assert!(Schedule::derive(21 * H, 21 * H + 30 * 60, 4 * H).is_err());
        // Exactly the transition apart still touches
        assert!(Schedule::derive(12 * H, 16 * H, 4 * H).is_err());
        // Close going the other way round the clock
        assert!(Schedule::derive(23 * H, H, 4 * H).is_err());
    }

    #[test]
    fn test_derive_rejects_bad_durations() {
        assert!(Schedule::derive(21 * H, 7 * H, 0).is_err());
        assert!(Schedule::derive(21 * H, 7 * H, 4 * H + 1).is_err());
        assert!(Schedule::derive(21 * H, 7 * H, 4 * H).is_ok());
    }

    #[test]
    fn test_forward_distance() {
        assert_eq!(forward_distance(21 * H, 7 * H), 10 * H);
        assert_eq!(forward_distance(7 * H, 21 * H), 14 * H);
        assert_eq!(forward_distance(5, 5), 0);
    }

    #[test]
    fn test_parse_clock() {
        assert_eq!(parse_clock("21:00").unwrap(), 21 * H);
        assert_eq!(parse_clock("07:30:15").unwrap(), 7 * H + 30 * 60 + 15);
        assert_eq!(parse_clock(" 00:00 ").unwrap(), 0);
        assert!(parse_clock("24:00").is_err());
        assert!(parse_clock("nine").is_err());
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("4h").unwrap(), 4 * H);
        assert_eq!(parse_duration("90m").unwrap(), 90 * 60);
        assert_eq!(parse_duration("1h30m").unwrap(), 90 * 60);
        assert_eq!(parse_duration("1h 30m 10s").unwrap(), 90 * 60 + 10);
        assert_eq!(parse_duration("45s").unwrap(), 45);
        assert_eq!(parse_duration("2H").unwrap(), 2 * H);
    }

    #[test]
    fn test_parse_duration_other_forms() {
        assert_eq!(parse_duration("01:30").unwrap(), 90 * 60);
        assert_eq!(parse_duration("00:45:30").unwrap(), 45 * 60 + 30);
        assert_eq!(parse_duration("600").unwrap(), 600);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("1d").is_err());
        assert!(parse_duration("01:75").is_err());
    }
}
