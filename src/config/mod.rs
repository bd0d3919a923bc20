//! Configuration system for duskshift.
//!
//! Settings live in `duskshift.toml`, found at `$XDG_CONFIG_HOME/duskshift/` or in
//! the directory given with `--config`. A commented default file is written on
//! first run.
//!
//! ```toml
//! #[Backend]
//! backend = "auto"          # "auto", "wayland" or "dry-run"
//!
//! #[Schedule]
//! night_start = "21:00"     # Centre of the dusk transition (HH:MM[:SS])
//! night_end = "07:00"       # Centre of the dawn transition (HH:MM[:SS])
//! transition = "1h"         # Transition length: "4h", "90m", "1h30m", "45s" or "HH:MM"
//!
//! #[Colors]
//! night_temp = 2800         # Color temperature during night (1000-10000) Kelvin
//! day_temp = 6500           # Color temperature during day (1000-10000) Kelvin
//! invert_at_night = false   # Invert the display during the night phase
//!
//! #[Exclusions]
//! exclude_apps = []         # App ids or window classes that pause duskshift while focused
//! ```
//!
//! Every field is optional; missing values fall back to the defaults in
//! [`crate::common::constants`]. Validation runs at load time and mirrors the
//! checks in [`crate::core::Engine::start`], so mistakes are reported with the
//! offending field name before anything touches the displays.

pub mod builder;
pub mod loading;
pub mod validation;
pub mod watcher;

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

use crate::backend::BackendType;
use crate::common::constants::*;
use crate::core::StartOptions;
use crate::core::exclusion::AppListFilter;

pub use builder::create_default_config;
pub use loading::{get_config_path, get_custom_config_dir, load, load_from_path, set_config_dir};
pub use watcher::start_config_watcher;

/// Display adapter selection.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// Wayland when `WAYLAND_DISPLAY` is set, dry run otherwise.
    Auto,
    /// wlr-gamma-control-unstable-v1.
    Wayland,
    /// Log gamma tables without applying them.
    DryRun,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Auto => "auto",
            Backend::Wayland => "wayland",
            Backend::DryRun => "dry-run",
        }
    }
}

/// Contents of `duskshift.toml`.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct Config {
    pub backend: Option<Backend>,
    pub night_temp: Option<u32>,
    pub day_temp: Option<u32>,
    pub night_start: Option<String>,
    pub night_end: Option<String>,
    pub transition: Option<String>,
    pub invert_at_night: Option<bool>,
    pub exclude_apps: Option<Vec<String>>,
}

impl Config {
    pub fn load() -> Result<Self> {
        loading::load()
    }

    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        loading::load_from_path(path)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        loading::get_config_path()
    }

    pub fn night_temp(&self) -> u32 {
        self.night_temp.unwrap_or(DEFAULT_NIGHT_TEMP)
    }

    pub fn day_temp(&self) -> u32 {
        self.day_temp.unwrap_or(DEFAULT_DAY_TEMP)
    }

    pub fn night_start(&self) -> &str {
        self.night_start.as_deref().unwrap_or(DEFAULT_NIGHT_START)
    }

    pub fn night_end(&self) -> &str {
        self.night_end.as_deref().unwrap_or(DEFAULT_NIGHT_END)
    }

    pub fn transition(&self) -> &str {
        self.transition.as_deref().unwrap_or(DEFAULT_TRANSITION)
    }

    pub fn invert_at_night(&self) -> bool {
        self.invert_at_night.unwrap_or(DEFAULT_INVERT_AT_NIGHT)
    }

    pub fn exclude_apps(&self) -> &[String] {
        self.exclude_apps.as_deref().unwrap_or_default()
    }

    /// Engine parameters for this configuration.
    ///
    /// `focused` seeds the exclusion filter with the application that had focus
    /// when the engine (re)starts.
    pub fn start_options(&self, focused: Option<String>) -> StartOptions {
        let options = StartOptions::new(self.night_temp(), self.night_start(), self.night_end())
            .day_temp(self.day_temp())
            .transition(self.transition())
            .invert_at_night(self.invert_at_night());

        if self.exclude_apps().is_empty() {
            options
        } else {
            options.exclusion(AppListFilter::new(self.exclude_apps()).with_focus(focused))
        }
    }

    /// Print the loaded configuration.
    pub fn log_config(&self, resolved_backend: Option<BackendType>) {
        log_block_start!("Loaded configuration");
        if let Some(custom_dir) = get_custom_config_dir() {
            log_indented!("From: {}", crate::common::utils::private_path(&custom_dir));
        }

        let backend = self.backend.unwrap_or(DEFAULT_BACKEND);
        match (backend, resolved_backend) {
            (Backend::Auto, Some(resolved)) => {
                log_indented!("Backend: Auto ({})", resolved.name())
            }
            _ => log_indented!("Backend: {}", backend.as_str()),
        }

        log_indented!("Night starts: {}", self.night_start());
        log_indented!("Night ends: {}", self.night_end());
        log_indented!("Transition: {}", self.transition());
        log_indented!("Night temperature: {}K", self.night_temp());
        log_indented!("Day temperature: {}K", self.day_temp());
        if self.invert_at_night() {
            log_indented!("Invert at night: enabled");
        }
        if !self.exclude_apps().is_empty() {
            log_indented!("Paused while focused: {}", self.exclude_apps().join(", "));
        }
    }
}

#[cfg(test)]
mod tests;
