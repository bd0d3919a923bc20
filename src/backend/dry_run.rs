//! Adapter that logs gamma tables instead of applying them.
//!
//! Selected with `backend = "dry-run"`, or automatically outside a Wayland
//! session so the schedule can still be observed.

use anyhow::Result;
use std::collections::HashMap;

use crate::core::collaborators::{DisplayAdapter, DisplayHandle};
use crate::core::ramp::Rgb;

pub struct DryRunDisplays {
    displays: Vec<DisplayHandle>,
    applied: HashMap<u32, (Rgb, Rgb)>,
    debug_enabled: bool,
}

impl DryRunDisplays {
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            displays: vec![DisplayHandle {
                id: 0,
                name: "dry-run".to_string(),
            }],
            applied: HashMap::new(),
            debug_enabled,
        }
    }
}

impl DisplayAdapter for DryRunDisplays {
    fn name(&self) -> &'static str {
        "Dry run"
    }

    fn list_displays(&mut self) -> Result<Vec<DisplayHandle>> {
        Ok(self.displays.clone())
    }

    fn set_gamma(&mut self, display: &DisplayHandle, white: Rgb, black: Rgb) -> Result<()> {
        let previous = self.applied.insert(display.id, (white, black));
        let inversion_flipped = previous.is_none_or(|(_, old_black)| (old_black == Rgb::ZERO) != (black == Rgb::ZERO));

        if inversion_flipped || self.debug_enabled {
            log_decorated!("Would set {display}: white {white}, black {black}");
        }
        Ok(())
    }

    fn restore_gamma(&mut self, display: &DisplayHandle) -> Result<()> {
        if self.applied.remove(&display.id).is_some() {
            log_decorated!("Would restore original gamma on {display}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_applied_tables() {
        crate::common::logger::Log::set_enabled(false);
        let mut adapter = DryRunDisplays::new(false);
        let displays = adapter.list_displays().unwrap();
        assert_eq!(displays.len(), 1);

        adapter.set_gamma(&displays[0], Rgb::WHITE, Rgb::ZERO).unwrap();
        assert_eq!(adapter.applied.get(&0), Some(&(Rgb::WHITE, Rgb::ZERO)));

        adapter.restore_gamma(&displays[0]).unwrap();
        assert!(adapter.applied.is_empty());
    }
}
