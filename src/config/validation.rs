//! Configuration validation.
//!
//! Rejects values the engine would refuse at start, naming the offending field.

use anyhow::{Context, Result};

use super::Config;
use crate::common::constants::*;
use crate::common::utils::format_duration_secs;
use crate::core::schedule::{Schedule, parse_clock, parse_duration};

pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(temp) = config.night_temp
        && !(MINIMUM_TEMP..=MAXIMUM_TEMP).contains(&temp)
    {
        anyhow::bail!(
            "night_temp ({}) must be between {} and {} Kelvin",
            temp,
            MINIMUM_TEMP,
            MAXIMUM_TEMP
        );
    }

    if let Some(temp) = config.day_temp
        && !(MINIMUM_TEMP..=MAXIMUM_TEMP).contains(&temp)
    {
        anyhow::bail!(
            "day_temp ({}) must be between {} and {} Kelvin",
            temp,
            MINIMUM_TEMP,
            MAXIMUM_TEMP
        );
    }

    let night_mid = parse_clock(config.night_start()).context("Invalid night_start time format")?;
    let day_mid = parse_clock(config.night_end()).context("Invalid night_end time format")?;
    let transition = parse_duration(config.transition()).context("Invalid transition length")?;

    if !(MINIMUM_TRANSITION_SECS..=MAXIMUM_TRANSITION_SECS).contains(&transition) {
        anyhow::bail!(
            "transition ({}) must be between {}s and {}",
            config.transition(),
            MINIMUM_TRANSITION_SECS,
            format_duration_secs(MAXIMUM_TRANSITION_SECS)
        );
    }

    Schedule::derive(night_mid, day_mid, transition)
        .context("night_start and night_end are too close for the configured transition")?;

    if let Some(apps) = &config.exclude_apps
        && apps.iter().any(|a| a.trim().is_empty())
    {
        anyhow::bail!("exclude_apps must not contain empty entries");
    }

    Ok(())
}
