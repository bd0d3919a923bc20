//! State management for duskshift, following XDG Base Directory standards.
//!
//! Persistent settings (the user's inversion override) live in
//! `XDG_STATE_HOME/duskshift/{namespace}`, separate from the configuration.
//! Runtime status for `duskshift status` lives in the runtime directory, see
//! [`status`].

pub mod status;

pub use status::{StatusSnapshot, read_status, remove_status, status_path, write_status};

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::common::constants::SETTINGS_FILE_NAME;
use crate::core::collaborators::SettingsStore;

/// Get the state directory for a given configuration directory.
///
/// The namespace is:
/// - "default" for the default config directory
/// - "custom_<hash>" for custom config directories (via --config)
pub fn get_state_dir(config_dir: Option<&Path>) -> Result<PathBuf> {
    let state_home = match std::env::var("XDG_STATE_HOME") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => dirs::home_dir()
            .context("Could not determine home directory")?
            .join(".local/state"),
    };

    let namespace = match config_dir {
        None => "default".to_string(),
        Some(path) => {
            let is_default = dirs::config_dir()
                .map(|dir| dir.join("duskshift") == path)
                .unwrap_or(false);
            if is_default {
                "default".to_string()
            } else {
                get_state_namespace(path)
            }
        }
    };

    Ok(state_home.join("duskshift").join(namespace))
}

/// Stable namespace for a custom config directory.
fn get_state_namespace(config_path: &Path) -> String {
    let canonical = config_path
        .canonicalize()
        .unwrap_or_else(|_| config_path.to_path_buf());

    // Truncated SHA256 is stable across runs and short enough for a dir name
    let hash = sha256::digest(canonical.to_string_lossy().as_bytes());
    format!("custom_{}", &hash[..16])
}

/// [`SettingsStore`] backed by a JSON object on disk.
///
/// Every `set` and `clear` rewrites the file. A missing or unreadable file
/// reads as empty.
#[derive(Debug)]
pub struct JsonSettingsStore {
    path: PathBuf,
    values: BTreeMap<String, bool>,
}

impl JsonSettingsStore {
    /// Open the store for the active config directory.
    pub fn open_default() -> Result<Self> {
        let config_dir = crate::config::get_custom_config_dir();
        let state_dir = get_state_dir(config_dir.as_deref())?;
        Ok(Self::open(state_dir.join(SETTINGS_FILE_NAME)))
    }

    pub fn open(path: PathBuf) -> Self {
        let values = fs::read_to_string(&path)
            .ok()
            .and_then(|content| match serde_json::from_str(&content) {
                Ok(values) => Some(values),
                Err(e) => {
                    log_pipe!();
                    log_warning!("Ignoring unreadable settings file: {e}");
                    None
                }
            })
            .unwrap_or_default();
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create state directory {}", parent.display())
            })?;
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get(&self, key: &str) -> Option<bool> {
        self.values.get(key).copied()
    }

    fn set(&mut self, key: &str, value: bool) -> Result<()> {
        self.values.insert(key.to_string(), value);
        self.persist()
    }

    fn clear(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    fn test_settings_survive_reopen() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("settings.json");

        let mut store = JsonSettingsStore::open(path.clone());
        assert_eq!(store.get("invert_user"), None);
        store.set("invert_user", true).unwrap();

        let mut reopened = JsonSettingsStore::open(path.clone());
        assert_eq!(reopened.get("invert_user"), Some(true));

        reopened.clear("invert_user").unwrap();
        assert_eq!(JsonSettingsStore::open(path).get("invert_user"), None);
    }

    #[test]
    fn test_corrupt_settings_read_as_empty() {
        crate::common::logger::Log::set_enabled(false);
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();

        let store = JsonSettingsStore::open(path);
        assert_eq!(store.get("invert_user"), None);
    }

    #[test]
    #[serial]
    fn test_state_dir_namespaces() {
        let temp_dir = tempdir().unwrap();
        let original = std::env::var("XDG_STATE_HOME").ok();
        unsafe {
            std::env::set_var("XDG_STATE_HOME", temp_dir.path());
        }

        let default_dir = get_state_dir(None).unwrap();
        let custom_a = get_state_dir(Some(Path::new("/srv/a"))).unwrap();
        let custom_again = get_state_dir(Some(Path::new("/srv/a"))).unwrap();
        let custom_b = get_state_dir(Some(Path::new("/srv/b"))).unwrap();

        unsafe {
            match original {
                Some(val) => std::env::set_var("XDG_STATE_HOME", val),
                None => std::env::remove_var("XDG_STATE_HOME"),
            }
        }

        assert_eq!(default_dir, temp_dir.path().join("duskshift").join("default"));
        assert_eq!(custom_a, custom_again);
        assert_ne!(custom_a, custom_b);
        let name = custom_a.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("custom_"));
        assert_eq!(name.len(), "custom_".len() + 16);
    }
}
