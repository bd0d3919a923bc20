//! Interfaces the engine drives but does not implement.
//!
//! Concrete display adapters live in [`crate::backend`], the persistent settings
//! store in [`crate::state`].

use anyhow::Result;
use std::collections::HashMap;
use std::fmt;

use crate::core::ramp::Rgb;

/// An output the adapter can program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayHandle {
    pub id: u32,
    pub name: String,
}

impl fmt::Display for DisplayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "output {}", self.id)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// Writes gamma tables to displays.
///
/// `set_gamma` receives the white and black points of a per-channel linear
/// ramp. Normal output uses `white = gamma, black = ZERO`; inverted output
/// swaps them.
pub trait DisplayAdapter: Send {
    fn name(&self) -> &'static str;

    fn list_displays(&mut self) -> Result<Vec<DisplayHandle>>;

    fn set_gamma(&mut self, display: &DisplayHandle, white: Rgb, black: Rgb) -> Result<()>;

    /// Give the display back its original gamma table.
    fn restore_gamma(&mut self, display: &DisplayHandle) -> Result<()>;
}

/// Reports when displays are added or removed.
pub trait TopologyWatcher: Send {
    fn start(&mut self) -> Result<()>;

    fn stop(&mut self);

    /// Returns `true` once per batch of topology changes since the last call.
    fn poll_changed(&mut self) -> Result<bool>;
}

/// Persists small boolean settings across runs.
#[cfg_attr(test, mockall::automock)]
pub trait SettingsStore: Send {
    fn get(&self, key: &str) -> Option<bool>;

    fn set(&mut self, key: &str, value: bool) -> Result<()>;

    fn clear(&mut self, key: &str) -> Result<()>;
}

/// Settings kept only for the lifetime of the process.
#[derive(Debug, Default, Clone)]
pub struct MemorySettingsStore {
    values: HashMap<String, bool>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Option<bool> {
        self.values.get(key).copied()
    }

    fn set(&mut self, key: &str, value: bool) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn clear(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}
