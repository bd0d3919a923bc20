//! Application constants and default values for duskshift.

use crate::config::Backend;

// ═══ Configuration Defaults ═══
// Used when an option is missing from duskshift.toml

pub const DEFAULT_BACKEND: Backend = Backend::Auto;
pub const DEFAULT_NIGHT_TEMP: u32 = 2800; // Kelvin
pub const DEFAULT_DAY_TEMP: u32 = 6500; // Kelvin, the neutral anchor of the ramp
pub const DEFAULT_NIGHT_START: &str = "21:00"; // centre of dusk
pub const DEFAULT_NIGHT_END: &str = "07:00"; // centre of dawn
pub const DEFAULT_TRANSITION: &str = "1h";
pub const DEFAULT_INVERT_AT_NIGHT: bool = false;

// ═══ Validation Limits ═══

pub const MINIMUM_TEMP: u32 = 1000; // first anchor of the color ramp
pub const MAXIMUM_TEMP: u32 = 10000; // last anchor of the color ramp
pub const MINIMUM_TRANSITION_SECS: u32 = 1;
pub const MAXIMUM_TRANSITION_SECS: u32 = 4 * 60 * 60;

// ═══ Scheduling ═══

pub const SECONDS_PER_DAY: u32 = 24 * 60 * 60;
pub const POLL_DIVISOR: u32 = 200; // polling period = transition / 200
pub const MINIMUM_POLL_SECS: u32 = 1;
pub const TOPOLOGY_POLL_MS: u64 = 250; // main loop slice between display hotplug checks

// ═══ Inversion ═══

pub const NIGHT_REQUEST_KEY: &str = "redshift-night"; // owned by the engine
pub const USER_REASON: &str = "user";
pub const OVERRIDE_SETTING_KEY: &str = "invert_user";

// ═══ Files ═══

pub const CONFIG_FILE_NAME: &str = "duskshift.toml";
pub const LOCK_FILE_NAME: &str = "duskshift.lock";
pub const STATUS_FILE_NAME: &str = "duskshift-status.json";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const CONFIG_DEBOUNCE_MS: u64 = 500;

// ═══ Exit Codes ═══

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
