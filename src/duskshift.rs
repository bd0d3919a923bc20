//! Application coordinator that manages the complete lifecycle of the daemon.
//!
//! This module handles resource acquisition and wiring before handing control
//! to the runtime loop:
//! - Configuration loading
//! - Backend detection and adapter creation
//! - Lock file management for single-instance enforcement
//! - Signal handler setup
//! - Monitor initialization (D-Bus, clock jumps, config watcher)
//!
//! The `Duskshift` struct uses a builder pattern so tests and embedders can
//! skip the lock or the version header.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::{
    backend::{create_adapter, create_topology_watcher, detect_backend},
    config::{self, Config},
    core::collaborators::{MemorySettingsStore, SettingsStore},
    core::{Engine, runtime::Runtime},
    io::{dbus, instance, signals::setup_signal_handler},
    state::JsonSettingsStore,
    time::RealClock,
};

/// Builder for configuring and running the duskshift daemon.
///
/// ```no_run
/// use duskshift::Duskshift;
///
/// # fn main() -> anyhow::Result<()> {
/// Duskshift::new(false).run()?;
/// # Ok(())
/// # }
/// ```
pub struct Duskshift {
    debug_enabled: bool,
    create_lock: bool,
    show_headers: bool,
}

impl Duskshift {
    /// Create a new runner with defaults matching normal run
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            create_lock: true,
            show_headers: true,
        }
    }

    /// Skip single-instance enforcement
    pub fn without_lock(mut self) -> Self {
        self.create_lock = false;
        self
    }

    /// Skip the version header
    pub fn without_headers(mut self) -> Self {
        self.show_headers = false;
        self
    }

    /// Execute the daemon until a shutdown signal arrives.
    ///
    /// Displays are restored before this returns, on success and on error.
    pub fn run(self) -> Result<()> {
        if self.show_headers {
            log_version!();
            if self.debug_enabled {
                log_pipe!();
                log_debug!("Debug mode enabled - showing detailed engine operations");
            }
        }

        let config = match Config::load() {
            Ok(config) => config,
            Err(e) => {
                log_error_exit!("Configuration failed");
                eprintln!("{e:?}");
                std::process::exit(crate::common::constants::EXIT_FAILURE);
            }
        };

        let backend_type = match detect_backend(&config) {
            Ok(backend_type) => backend_type,
            Err(e) => {
                log_error_exit!("{e}");
                std::process::exit(crate::common::constants::EXIT_FAILURE);
            }
        };

        // Before any watcher output so a conflict message stands alone
        let lock = if self.create_lock {
            match instance::ensure_single_instance()? {
                Some(lock) => Some(lock),
                None => return Ok(()),
            }
        } else {
            None
        };

        let signal_state = setup_signal_handler(self.debug_enabled)?;

        dbus::start_system_monitors(signal_state.signal_sender.clone(), self.debug_enabled);

        match config::get_config_path() {
            Ok(config_path) => {
                if let Err(e) = config::start_config_watcher(
                    signal_state.signal_sender.clone(),
                    config_path,
                    self.debug_enabled,
                ) {
                    log_pipe!();
                    log_warning!("Config file watching unavailable: {e}");
                    log_indented!("Hot config reload disabled, use 'duskshift reload' instead");
                }
            }
            Err(e) => {
                log_pipe!();
                log_warning!("Config file watching unavailable: {e}");
            }
        }

        config.log_config(Some(backend_type));

        log_block_start!("Detected backend: {}", backend_type.name());
        let adapter = create_adapter(backend_type, self.debug_enabled)
            .with_context(|| format!("Failed to initialize the {} backend", backend_type.name()))?;

        let store: Box<dyn SettingsStore> = match JsonSettingsStore::open_default() {
            Ok(store) => {
                if self.debug_enabled {
                    log_pipe!();
                    log_debug!("Settings stored in {}", store.path().display());
                }
                Box::new(store)
            }
            Err(e) => {
                log_pipe!();
                log_warning!("Settings store unavailable: {e}");
                log_indented!("The inversion override will not survive a restart");
                Box::new(MemorySettingsStore::new())
            }
        };

        let clock = Arc::new(RealClock);
        let mut engine = Engine::new(adapter, store, clock.clone()).with_debug(self.debug_enabled);
        if let Some(watcher) = create_topology_watcher(backend_type) {
            engine = engine.with_topology(watcher);
        }

        if lock.is_some() {
            log_block_start!("Lock acquired, starting duskshift...");
        }

        let result = Runtime::new(engine, config, signal_state, clock, self.debug_enabled).execute();

        // Released only after the displays are restored
        drop(lock);
        log_end!();

        result
    }
}
