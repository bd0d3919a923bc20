//! # Duskshift Library
//!
//! Internal library for the duskshift binary.
//!
//! This library exists to enable testing of the schedule engine and to keep CLI
//! dispatch (main.rs) separate from application logic.
//!
//! ## Architecture
//!
//! - **Entry Point**: [`Duskshift`] acquires resources and starts the runtime loop
//! - **Core Logic**: `core` holds the [`Engine`] (color ramp, phase classifier,
//!   inversion arbiter, subscriptions) and the runtime loop that drives it
//! - **Backends**: `backend` with the Wayland gamma adapter and a dry-run adapter
//! - **Configuration**: `config` for TOML settings with hot reload
//! - **Commands**: `commands` for the CLI subcommands (invert, request, status, ...)
//! - **State**: `state` for the persisted override and the daemon status snapshot
//! - **Infrastructure**: `io` for locking, signals, D-Bus and focus events

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod common;

pub mod args;
pub mod backend;
pub mod commands;
pub mod config;
pub mod core;
pub mod io;
pub mod state;
pub mod time;

mod duskshift;

pub use crate::core::collaborators::{
    DisplayAdapter, DisplayHandle, MemorySettingsStore, SettingsStore, TopologyWatcher,
};
pub use crate::core::exclusion::{AppListFilter, ExclusionEvent, ExclusionFilter};
pub use crate::core::phase::Phase;
pub use crate::core::ramp::Rgb;
pub use crate::core::schedule::Schedule;
pub use crate::core::wake::Wake;
pub use crate::core::{Engine, EngineStatus, StartOptions};
pub use crate::time::{ManualClock, RealClock, TimeSource};
pub use duskshift::Duskshift;
