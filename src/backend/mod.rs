//! Display adapter selection.
//!
//! Two adapters are available:
//!
//! - **Wayland**: wlr-gamma-control-unstable-v1, for wlroots-based compositors
//! - **Dry run**: logs what would be applied, for sessions without gamma control
//!
//! Auto-detection picks Wayland whenever `WAYLAND_DISPLAY` is set.

use anyhow::Result;

use crate::config::{Backend, Config};
use crate::core::collaborators::{DisplayAdapter, TopologyWatcher};

pub mod dry_run;
pub mod gamma;
pub mod wayland;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Wayland,
    DryRun,
}

impl BackendType {
    pub fn name(&self) -> &'static str {
        match self {
            BackendType::Wayland => "Wayland",
            BackendType::DryRun => "Dry run",
        }
    }
}

/// Decide which adapter to use from the configuration and environment.
///
/// # Errors
/// Returns an error when `backend = "wayland"` is configured outside a Wayland session.
pub fn detect_backend(config: &Config) -> Result<BackendType> {
    let on_wayland = std::env::var_os("WAYLAND_DISPLAY").is_some();

    match config.backend.unwrap_or(crate::common::constants::DEFAULT_BACKEND) {
        Backend::Wayland if !on_wayland => {
            anyhow::bail!(
                "configuration specifies backend=\"wayland\" but WAYLAND_DISPLAY is not set"
            )
        }
        Backend::Wayland => Ok(BackendType::Wayland),
        Backend::DryRun => Ok(BackendType::DryRun),
        Backend::Auto if on_wayland => Ok(BackendType::Wayland),
        Backend::Auto => {
            log_pipe!();
            log_warning!("WAYLAND_DISPLAY is not set, gamma changes will only be logged");
            log_indented!("Set backend = \"dry-run\" to silence this warning");
            Ok(BackendType::DryRun)
        }
    }
}

/// Create the display adapter for `backend_type`.
pub fn create_adapter(backend_type: BackendType, debug_enabled: bool) -> Result<Box<dyn DisplayAdapter>> {
    match backend_type {
        BackendType::Wayland => Ok(Box::new(wayland::WaylandDisplays::new(debug_enabled)?)),
        BackendType::DryRun => Ok(Box::new(dry_run::DryRunDisplays::new(debug_enabled))),
    }
}

/// Hotplug watcher for `backend_type`, if it has one.
pub fn create_topology_watcher(backend_type: BackendType) -> Option<Box<dyn TopologyWatcher>> {
    match backend_type {
        BackendType::Wayland => Some(Box::new(wayland::WaylandOutputWatcher::new())),
        BackendType::DryRun => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn config_with(backend: Backend) -> Config {
        Config {
            backend: Some(backend),
            ..Config::default()
        }
    }

    #[test]
    #[serial]
    fn test_explicit_dry_run() {
        assert_eq!(detect_backend(&config_with(Backend::DryRun)).unwrap(), BackendType::DryRun);
    }

    #[test]
    #[serial]
    fn test_wayland_requires_session() {
        let saved = std::env::var_os("WAYLAND_DISPLAY");
        unsafe { std::env::remove_var("WAYLAND_DISPLAY") };

        assert!(detect_backend(&config_with(Backend::Wayland)).is_err());
        crate::common::logger::Log::set_enabled(false);
        assert_eq!(detect_backend(&config_with(Backend::Auto)).unwrap(), BackendType::DryRun);

        unsafe { std::env::set_var("WAYLAND_DISPLAY", "wayland-1") };
        assert_eq!(detect_backend(&config_with(Backend::Auto)).unwrap(), BackendType::Wayland);

        match saved {
            Some(value) => unsafe { std::env::set_var("WAYLAND_DISPLAY", value) },
            None => unsafe { std::env::remove_var("WAYLAND_DISPLAY") },
        }
    }
}
