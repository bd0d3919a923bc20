//! Wayland display adapter using the wlr-gamma-control-unstable-v1 protocol.
//!
//! Works on wlroots-based compositors (Hyprland, niri, Sway, river, Wayfire,
//! labwc). Every bound `wl_output` is one [`DisplayHandle`], identified by its
//! registry name.
//!
//! Restoring a display destroys its gamma control object. The compositor then
//! puts the original gamma table back. The control is recreated on the next
//! `set_gamma`.
//!
//! [`WaylandOutputWatcher`] keeps a second, independent connection that only
//! tracks `wl_output` globals so the engine can reapply after hotplug.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::io::{Seek, SeekFrom, Write};
use std::os::fd::AsFd;

use wayland_client::{
    Connection, Dispatch, EventQueue, Proxy, QueueHandle,
    protocol::{wl_output::WlOutput, wl_registry::WlRegistry},
};
use wayland_protocols_wlr::gamma_control::v1::client::{
    zwlr_gamma_control_manager_v1::ZwlrGammaControlManagerV1,
    zwlr_gamma_control_v1::{Event as GammaControlEvent, ZwlrGammaControlV1},
};

use crate::backend::gamma;
use crate::core::collaborators::{DisplayAdapter, DisplayHandle, TopologyWatcher};
use crate::core::ramp::Rgb;

const GAMMA_MANAGER_INTERFACE: &str = "zwlr_gamma_control_manager_v1";
const OUTPUT_INTERFACE: &str = "wl_output";

pub struct WaylandDisplays {
    connection: Connection,
    event_queue: EventQueue<State>,
    state: State,
    debug_enabled: bool,
}

#[derive(Debug)]
struct OutputInfo {
    output: WlOutput,
    gamma_control: Option<ZwlrGammaControlV1>,
    gamma_size: Option<usize>,
    name: String,
    registry_name: u32,
}

#[derive(Debug)]
struct State {
    gamma_manager: Option<ZwlrGammaControlManagerV1>,
    outputs: Vec<OutputInfo>,
    debug_enabled: bool,
}

impl WaylandDisplays {
    /// Connect to the compositor and bind the gamma control manager.
    ///
    /// # Errors
    /// - `WAYLAND_DISPLAY` is not reachable
    /// - the compositor does not offer wlr-gamma-control-unstable-v1
    pub fn new(debug_enabled: bool) -> Result<Self> {
        let connection =
            Connection::connect_to_env().context("Failed to connect to Wayland display")?;

        let mut event_queue = connection.new_event_queue();
        let qh = event_queue.handle();
        let mut state = State {
            gamma_manager: None,
            outputs: Vec::new(),
            debug_enabled,
        };

        let _registry = connection.display().get_registry(&qh, ());
        event_queue
            .roundtrip(&mut state)
            .context("Failed to enumerate Wayland globals")?;
        // Output names arrive after binding
        event_queue
            .roundtrip(&mut state)
            .context("Failed to read Wayland output details")?;

        if state.gamma_manager.is_none() {
            anyhow::bail!(
                "compositor does not support wlr-gamma-control-unstable-v1 (KWin and Mutter are unsupported)"
            );
        }

        if debug_enabled {
            log_pipe!();
            log_debug!(
                "Found wlr-gamma-control-unstable-v1 support, {} output(s)",
                state.outputs.len()
            );
        }

        Ok(Self {
            connection,
            event_queue,
            state,
            debug_enabled,
        })
    }

    /// Create gamma controls for outputs that lack one and wait for their sizes.
    fn ensure_gamma_controls(&mut self) -> Result<()> {
        let Some(manager) = self.state.gamma_manager.clone() else {
            return Ok(());
        };

        let qh = self.event_queue.handle();
        let mut created = false;
        for output_info in &mut self.state.outputs {
            if output_info.gamma_control.is_none() {
                output_info.gamma_control = Some(manager.get_gamma_control(&output_info.output, &qh, ()));
                output_info.gamma_size = None;
                created = true;
            }
        }

        if created {
            self.event_queue
                .roundtrip(&mut self.state)
                .context("Failed to receive gamma sizes")?;
        }
        Ok(())
    }
}

impl DisplayAdapter for WaylandDisplays {
    fn name(&self) -> &'static str {
        "Wayland"
    }

    fn list_displays(&mut self) -> Result<Vec<DisplayHandle>> {
        // Picks up outputs added or removed since the last call
        self.event_queue
            .roundtrip(&mut self.state)
            .context("Lost connection to the Wayland compositor")?;

        Ok(self
            .state
            .outputs
            .iter()
            .map(|o| DisplayHandle {
                id: o.registry_name,
                name: o.name.clone(),
            })
            .collect())
    }

    fn set_gamma(&mut self, display: &DisplayHandle, white: Rgb, black: Rgb) -> Result<()> {
        self.ensure_gamma_controls()?;

        let output_info = self
            .state
            .outputs
            .iter()
            .find(|o| o.registry_name == display.id)
            .with_context(|| format!("output {display} is gone"))?;
        let (Some(control), Some(size)) = (&output_info.gamma_control, output_info.gamma_size) else {
            anyhow::bail!("gamma control for {display} is not ready");
        };

        let data = gamma::create_gamma_tables(size, white, black)?;

        let mut file = tempfile::tempfile().context("Failed to create temporary file")?;
        file.write_all(&data).context("Failed to write gamma data")?;
        file.flush().context("Failed to flush gamma data")?;
        // The compositor reads from the current offset
        file.seek(SeekFrom::Start(0))
            .context("Failed to rewind gamma data")?;

        control.set_gamma(file.as_fd());

        // The file must outlive the compositor's read
        self.connection
            .roundtrip()
            .context("Failed to hand gamma table to the compositor")?;
        drop(file);

        if self.debug_enabled {
            log_debug!("Applied gamma to {display}: white {white}, black {black}");
        }
        Ok(())
    }

    fn restore_gamma(&mut self, display: &DisplayHandle) -> Result<()> {
        if let Some(output_info) = self
            .state
            .outputs
            .iter_mut()
            .find(|o| o.registry_name == display.id)
            && let Some(control) = output_info.gamma_control.take()
        {
            control.destroy();
            output_info.gamma_size = None;
        }

        self.connection
            .flush()
            .context("Failed to flush Wayland requests")?;
        Ok(())
    }
}

impl Dispatch<WlRegistry, ()> for State {
    fn event(
        state: &mut Self,
        registry: &WlRegistry,
        event: <WlRegistry as Proxy>::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        use wayland_client::protocol::wl_registry::Event;

        match event {
            Event::Global {
                name,
                interface,
                version,
            } => match interface.as_str() {
                GAMMA_MANAGER_INTERFACE => {
                    let manager = registry.bind::<ZwlrGammaControlManagerV1, _, _>(name, version.min(1), qh, ());
                    state.gamma_manager = Some(manager);
                }
                OUTPUT_INTERFACE => {
                    let output = registry.bind::<WlOutput, _, _>(name, version.min(4), qh, ());
                    state.outputs.push(OutputInfo {
                        output,
                        gamma_control: None,
                        gamma_size: None,
                        // Replaced by the Name event on wl_output v4
                        name: format!("output-{name}"),
                        registry_name: name,
                    });
                }
                _ => {}
            },
            Event::GlobalRemove { name } => {
                state.outputs.retain(|output_info| {
                    if output_info.registry_name == name {
                        if state.debug_enabled {
                            log_debug!("Output removed: {}", output_info.name);
                        }
                        false
                    } else {
                        true
                    }
                });
            }
            _ => {}
        }
    }
}

impl Dispatch<ZwlrGammaControlManagerV1, ()> for State {
    fn event(
        _: &mut Self,
        _: &ZwlrGammaControlManagerV1,
        _: <ZwlrGammaControlManagerV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwlrGammaControlV1, ()> for State {
    fn event(
        state: &mut Self,
        gamma_control: &ZwlrGammaControlV1,
        event: GammaControlEvent,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let Some(output_info) = state
            .outputs
            .iter_mut()
            .find(|o| o.gamma_control.as_ref() == Some(gamma_control))
        else {
            return;
        };

        match event {
            GammaControlEvent::GammaSize { size } => {
                output_info.gamma_size = Some(size as usize);
            }
            GammaControlEvent::Failed => {
                // Another client holds the output, or it went away
                log_pipe!();
                log_warning!("Gamma control failed for output '{}'", output_info.name);
                if let Some(control) = output_info.gamma_control.take() {
                    control.destroy();
                }
                output_info.gamma_size = None;
            }
            _ => {}
        }
    }
}

impl Dispatch<WlOutput, ()> for State {
    fn event(
        state: &mut Self,
        output: &WlOutput,
        event: <WlOutput as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        use wayland_client::protocol::wl_output::Event;

        if let Event::Name { name } = event
            && let Some(output_info) = state.outputs.iter_mut().find(|o| &o.output == output)
        {
            if state.debug_enabled && output_info.name.starts_with("output-") {
                log_debug!("Output identified: {name}");
            }
            output_info.name = name;
        }
    }
}

/// Watches `wl_output` globals on a separate connection.
#[derive(Default)]
pub struct WaylandOutputWatcher {
    session: Option<(EventQueue<WatchState>, WatchState)>,
}

#[derive(Debug, Default)]
struct WatchState {
    outputs: BTreeSet<u32>,
    changed: bool,
}

impl WaylandOutputWatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TopologyWatcher for WaylandOutputWatcher {
    fn start(&mut self) -> Result<()> {
        let connection =
            Connection::connect_to_env().context("Failed to connect to Wayland display")?;
        let mut event_queue = connection.new_event_queue();
        let qh = event_queue.handle();
        let mut state = WatchState::default();

        let _registry = connection.display().get_registry(&qh, ());
        event_queue
            .roundtrip(&mut state)
            .context("Failed to enumerate Wayland outputs")?;
        // The initial announcement is not a change
        state.changed = false;

        self.session = Some((event_queue, state));
        Ok(())
    }

    fn stop(&mut self) {
        self.session = None;
    }

    fn poll_changed(&mut self) -> Result<bool> {
        let Some((event_queue, state)) = self.session.as_mut() else {
            return Ok(false);
        };
        event_queue
            .roundtrip(state)
            .context("Lost connection to the Wayland compositor")?;
        Ok(std::mem::take(&mut state.changed))
    }
}

impl Dispatch<WlRegistry, ()> for WatchState {
    fn event(
        state: &mut Self,
        _: &WlRegistry,
        event: <WlRegistry as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        use wayland_client::protocol::wl_registry::Event;

        match event {
            Event::Global { name, interface, .. } if interface == OUTPUT_INTERFACE => {
                state.changed |= state.outputs.insert(name);
            }
            Event::GlobalRemove { name } => {
                state.changed |= state.outputs.remove(&name);
            }
            _ => {}
        }
    }
}
