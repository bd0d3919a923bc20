//! Hot reloading of `duskshift.toml`.
//!
//! The parent directory is watched rather than the file itself, since editors
//! usually save by writing a temporary file and renaming it over the original.

use anyhow::{Context, Result};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

use crate::common::constants::CONFIG_DEBOUNCE_MS;
use crate::common::utils::private_path;
use crate::io::signals::SignalMessage;

pub struct ConfigWatcher {
    signal_sender: Sender<SignalMessage>,
    debug_enabled: bool,
    config_path: PathBuf,
}

impl ConfigWatcher {
    pub fn new(signal_sender: Sender<SignalMessage>, config_path: PathBuf, debug_enabled: bool) -> Self {
        Self {
            signal_sender,
            debug_enabled,
            config_path,
        }
    }

    /// Spawn the watcher thread. It exits when the main loop drops its receiver.
    pub fn start(self) -> Result<()> {
        let Some(parent) = self.config_path.parent().map(Path::to_path_buf) else {
            return Ok(());
        };
        if !parent.is_dir() {
            return Ok(());
        }

        let (tx, rx) = std::sync::mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res
                    && matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    )
                {
                    let _ = tx.send(event);
                }
            },
            NotifyConfig::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(&parent, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch directory: {}", private_path(&parent)))?;

        if self.debug_enabled {
            log_pipe!();
            log_debug!("Watching {} for changes", private_path(&self.config_path));
        }

        let Self {
            signal_sender,
            debug_enabled,
            config_path,
        } = self;

        thread::spawn(move || {
            // Dropping the watcher would end the event stream
            let _watcher = watcher;
            let mut last_reload: Option<Instant> = None;

            for event in rx {
                if !affects_config(&event, &config_path) {
                    continue;
                }
                if last_reload.is_some_and(|t| t.elapsed() < Duration::from_millis(CONFIG_DEBOUNCE_MS)) {
                    continue;
                }

                if debug_enabled {
                    log_pipe!();
                    log_info!("Configuration file change detected");
                }

                if signal_sender.send(SignalMessage::Reload).is_err() {
                    break;
                }
                last_reload = Some(Instant::now());
            }
        });

        Ok(())
    }
}

/// Whether `event` touches the config file, including editor temp files next to it.
fn affects_config(event: &Event, config_path: &Path) -> bool {
    let Some(config_name) = config_path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    event.paths.iter().any(|path| {
        path == config_path
            || (path.parent() == config_path.parent()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|name| name.starts_with(config_name)))
    })
}

/// Start watching `config_path` for changes.
pub fn start_config_watcher(
    signal_sender: Sender<SignalMessage>,
    config_path: PathBuf,
    debug_enabled: bool,
) -> Result<()> {
    ConfigWatcher::new(signal_sender, config_path, debug_enabled).start()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_affects_config_matches_file_and_temp_copies() {
        let config = Path::new("/home/u/.config/duskshift/duskshift.toml");
        assert!(affects_config(
            &event(EventKind::Modify(ModifyKind::Any), "/home/u/.config/duskshift/duskshift.toml"),
            config
        ));
        assert!(affects_config(
            &event(EventKind::Create(CreateKind::File), "/home/u/.config/duskshift/duskshift.toml~"),
            config
        ));
        assert!(!affects_config(
            &event(EventKind::Modify(ModifyKind::Any), "/home/u/.config/duskshift/other.toml"),
            config
        ));
    }
}
