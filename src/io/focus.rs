//! Focused-application events from Hyprland.
//!
//! Hyprland publishes events on `.socket2.sock` as `name>>data` lines. The
//! `activewindow>>class,title` event carries the window class, which is what
//! `exclude_apps` matches against. The request socket (`.socket.sock`) answers
//! `j/activewindow` with JSON, used once at startup to seed the current focus.
//!
//! Outside Hyprland there is no socket, and exclusion simply never triggers.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::thread;

use crate::common::utils::runtime_dir;
use crate::io::signals::SignalMessage;

const EVENT_SOCKET: &str = ".socket2.sock";
const REQUEST_SOCKET: &str = ".socket.sock";

fn hyprland_socket(name: &str) -> Option<PathBuf> {
    let signature = std::env::var("HYPRLAND_INSTANCE_SIGNATURE").ok()?;
    let path = runtime_dir().join("hypr").join(signature).join(name);
    path.exists().then_some(path)
}

/// Extract the window class from one event line.
///
/// Returns `Some("")` when focus moved to no window.
pub fn parse_focus_event(line: &str) -> Option<String> {
    let data = line.strip_prefix("activewindow>>")?;
    let class = data.split_once(',').map_or(data, |(class, _)| class);
    Some(class.trim().to_string())
}

/// Ask Hyprland which window class has focus right now.
pub fn query_active_window() -> Option<String> {
    let path = hyprland_socket(REQUEST_SOCKET)?;
    let reply = request(&path, "j/activewindow").ok()?;
    let json: serde_json::Value = serde_json::from_str(&reply).ok()?;
    json.get("class")?.as_str().map(str::to_string)
}

fn request(path: &PathBuf, command: &str) -> Result<String> {
    let mut stream = UnixStream::connect(path)
        .with_context(|| format!("Failed to connect to socket at {path:?}"))?;
    stream
        .write_all(command.as_bytes())
        .context("Failed to write request to socket")?;
    let mut reply = String::new();
    stream
        .read_to_string(&mut reply)
        .context("Failed to read reply from socket")?;
    Ok(reply)
}

/// Forward focus changes as [`SignalMessage::Focus`].
///
/// Returns `false` when no Hyprland event socket is available.
pub fn start_focus_listener(signal_sender: Sender<SignalMessage>, debug_enabled: bool) -> bool {
    let Some(path) = hyprland_socket(EVENT_SOCKET) else {
        if debug_enabled {
            log_pipe!();
            log_debug!("No Hyprland event socket, app exclusion is inactive");
        }
        return false;
    };

    let stream = match UnixStream::connect(&path) {
        Ok(stream) => stream,
        Err(e) => {
            log_pipe!();
            log_warning!("Failed to connect to Hyprland events: {e}");
            log_indented!("App exclusion will not be available");
            return false;
        }
    };

    thread::spawn(move || {
        for line in BufReader::new(stream).lines() {
            let Ok(line) = line else {
                break;
            };
            if let Some(class) = parse_focus_event(&line)
                && signal_sender.send(SignalMessage::Focus(class)).is_err()
            {
                return;
            }
        }
        log_pipe!();
        log_warning!("Hyprland event socket closed, app exclusion stopped");
    });

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_focus_event() {
        assert_eq!(
            parse_focus_event("activewindow>>mpv,video.mkv - mpv"),
            Some("mpv".to_string())
        );
        assert_eq!(parse_focus_event("activewindow>>,"), Some(String::new()));
        assert_eq!(parse_focus_event("activewindowv2>>55d2a6c0"), None);
        assert_eq!(parse_focus_event("workspace>>2"), None);
    }

    #[test]
    fn test_title_commas_stay_out_of_class() {
        assert_eq!(
            parse_focus_event("activewindow>>firefox,a, b, c"),
            Some("firefox".to_string())
        );
    }
}
