//! Compositor state machine
//!
//! This module owns the single [`Compositor`] value that every handler mutates.
//! The `impl` is split by concern across the submodules.
//!
//! # Responsibilities
//!
//! - Global advertisement and binding (`wl_compositor`, `wl_seat`, `wl_output`,
//!   `xdg_shell`)
//! - Surface buffer/damage/frame lifecycle (see `commit.rs`)
//! - Pointer focus and grab arbitration (see `pointer.rs`)
//! - Keyboard focus and modifier tracking (see `keyboard.rs`)
//! - `xdg-shell` roles, popup stacking and configure (see `shell.rs`)
//! - Host event intake and host window lifecycle (see `host_events.rs`)
//! - Request routing and resource teardown (see `dispatch.rs`)
//!
//! # NOT Responsible For
//!
//! - Wire marshaling and sockets (see [`ObjectRegistry`])
//! - Painting and windowing (see [`Host`] and [`DrawTarget`](crate::host::DrawTarget))
//! - Driving the loop (see `runtime.rs`)

mod commit;
mod dispatch;
mod host_events;
mod keyboard;
mod output;
mod pointer;
mod shell;

use std::collections::HashMap;

use crate::config::Config;
use crate::error::ProtocolError;
use crate::host::{Host, HostWindow};
use crate::protocol::{ClientId, Global, Interface, ObjectId};
use crate::region::Region;
use crate::registry::{BoundResource, ObjectRegistry, ResourceList};
use crate::surface::Surface;

pub use keyboard::{KeyboardState, Keymap, ModifierIndices, ModifierState};
pub use pointer::{PointerFocus, PointerState};
pub use shell::{Popup, ShellState, ShellSurface};

/// The seat: one pointer, one keyboard
#[derive(Debug)]
pub struct Seat {
    pub(crate) resources: ResourceList,
    pub(crate) pointer: PointerState,
    pub(crate) keyboard: KeyboardState,
}

impl Seat {
    fn new() -> Self {
        Self {
            resources: ResourceList::default(),
            pointer: PointerState::new(),
            keyboard: KeyboardState::default(),
        }
    }

    pub fn pointer(&self) -> &PointerState {
        &self.pointer
    }

    pub fn keyboard(&self) -> &KeyboardState {
        &self.keyboard
    }
}

/// Protocol core of a nested compositor
///
/// Generic over the wire runtime (`R`) and the host toolkit (`H`) so the
/// same state machine runs under a real display and under the test harness.
pub struct Compositor<R: ObjectRegistry, H: Host> {
    pub(crate) registry: R,
    pub(crate) host: H,
    pub(crate) config: Config,

    pub(crate) surfaces: HashMap<ObjectId, Surface>,
    pub(crate) regions: HashMap<ObjectId, Region>,
    /// Frame callback -> surface that queued it
    pub(crate) callbacks: HashMap<ObjectId, ObjectId>,

    pub(crate) compositor_resources: ResourceList,
    pub(crate) outputs: ResourceList,
    pub(crate) seat: Seat,
    pub(crate) shell: ShellState,

    /// Input-only window covering the widget, present while realized
    pub(crate) event_window: Option<HostWindow>,
}

impl<R: ObjectRegistry, H: Host> Compositor<R, H> {
    /// Create the core and advertise its globals
    pub fn new(mut registry: R, host: H, config: Config) -> Self {
        for global in Global::ALL {
            registry.create_global(global, global.version());
        }
        tracing::info!(seat = %config.seat_name, "compositor globals created");

        Self {
            registry,
            host,
            config,
            surfaces: HashMap::new(),
            regions: HashMap::new(),
            callbacks: HashMap::new(),
            compositor_resources: ResourceList::default(),
            outputs: ResourceList::default(),
            seat: Seat::new(),
            shell: ShellState::default(),
            event_window: None,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut R {
        &mut self.registry
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn seat(&self) -> &Seat {
        &self.seat
    }

    pub fn shell(&self) -> &ShellState {
        &self.shell
    }

    pub fn surface(&self, id: ObjectId) -> Option<&Surface> {
        self.surfaces.get(&id)
    }

    pub fn surfaces(&self) -> impl Iterator<Item = &Surface> + '_ {
        self.surfaces.values()
    }

    pub fn region(&self, id: ObjectId) -> Option<&Region> {
        self.regions.get(&id)
    }

    pub fn event_window(&self) -> Option<HostWindow> {
        self.event_window
    }

    /// Write queued events to every client
    pub fn flush(&mut self) {
        self.registry.flush_clients();
    }

    /// A client bound one of our globals
    pub fn bind(&mut self, client: ClientId, global: Global, version: u32, id: u32) {
        let version = version.min(global.version());
        let Some(object) = self.create_resource(client, global.interface(), version, id) else {
            return;
        };
        let bound = BoundResource { id: object, version };
        tracing::debug!(%client, interface = %global.interface(), version, "global bound");

        match global {
            Global::Compositor => self.compositor_resources.insert(bound),
            Global::Seat => self.bind_seat(bound),
            Global::Output => self.bind_output(bound),
            Global::XdgShell => self.shell.resources.insert(bound),
        }
    }

    /// Create a client resource, posting `no_memory` on failure
    pub(crate) fn create_resource(
        &mut self,
        client: ClientId,
        interface: Interface,
        version: u32,
        id: u32,
    ) -> Option<ObjectId> {
        match self.registry.create_resource(client, interface, version, id) {
            Ok(object) => Some(object),
            Err(e) => {
                tracing::warn!(%client, %interface, error = %e, "resource creation failed");
                self.registry.post_no_memory(client);
                None
            }
        }
    }

    pub(crate) fn post_error(&mut self, object: ObjectId, error: ProtocolError) {
        tracing::warn!(%object, code = error.code(), %error, "posting protocol error");
        self.registry.post_error(object, &error);
    }
}
