//! `xdg-shell` (unstable v5) engine
//!
//! Role assignment for shell surfaces and popups, the popup stack, configure
//! events and the host windows backing each role.

use std::collections::{BTreeMap, HashMap};

use smithay::utils::{Logical, Point, Serial, Size};

use super::Compositor;
use crate::error::ProtocolError;
use crate::host::{Host, HostWindow};
use crate::protocol::{
    ClientId, Interface, ObjectId, SurfaceEvent, ToplevelState, XdgPopupEvent, XdgSurfaceEvent,
};
use crate::registry::{ObjectRegistry, ResourceList};
use crate::surface::{Commit, Role};

/// Companion of a role-`ShellSurface` surface
#[derive(Debug, Clone)]
pub struct ShellSurface {
    pub id: ObjectId,
    /// `xdg_shell` object it was created from
    pub shell: ObjectId,
    /// Cleared when the `wl_surface` dies first
    pub surface: Option<ObjectId>,
    pub window: Option<HostWindow>,
    pub title: Option<String>,
    pub app_id: Option<String>,
    pub last_configure: Option<Serial>,
    pub acked_configure: Option<Serial>,
    stack_key: u64,
}

/// Companion of a role-`Popup` surface
#[derive(Debug, Clone)]
pub struct Popup {
    pub id: ObjectId,
    pub shell: ObjectId,
    /// Cleared when the `wl_surface` dies first
    pub surface: Option<ObjectId>,
    pub parent: ObjectId,
    pub serial: Serial,
    pub offset: Point<i32, Logical>,
    pub window: Option<HostWindow>,
    /// `popup_done` has been sent; the popup never maps again
    pub dismissed: bool,
    /// Holds (or held) the explicit pointer grab
    pub grabbed: bool,
}

#[derive(Debug, Default)]
pub struct ShellState {
    pub(crate) resources: ResourceList,
    pub(super) shell_surfaces: HashMap<ObjectId, ShellSurface>,
    /// Bottom to top
    pub(super) stacking: BTreeMap<u64, ObjectId>,
    next_stack_key: u64,
    /// Bottom to top; only the top may parent a new popup
    pub(super) popups: Vec<Popup>,
}

impl ShellState {
    pub fn shell_surface(&self, id: ObjectId) -> Option<&ShellSurface> {
        self.shell_surfaces.get(&id)
    }

    /// Shell surfaces bottom to top
    pub fn shell_surfaces(&self) -> impl Iterator<Item = &ShellSurface> + '_ {
        self.stacking.values().filter_map(|id| self.shell_surfaces.get(id))
    }

    pub fn popups(&self) -> &[Popup] {
        &self.popups
    }

    pub fn popup(&self, id: ObjectId) -> Option<&Popup> {
        self.popups.iter().find(|p| p.id == id)
    }

    /// Topmost popup that has not been dismissed
    pub fn topmost_open_popup(&self) -> Option<&Popup> {
        self.popups.iter().rev().find(|p| !p.dismissed)
    }

    pub(super) fn popup_mut(&mut self, id: ObjectId) -> Option<&mut Popup> {
        self.popups.iter_mut().find(|p| p.id == id)
    }

    fn insert_shell_surface(&mut self, mut shell_surface: ShellSurface) {
        shell_surface.stack_key = self.next_stack_key;
        self.next_stack_key += 1;
        self.stacking.insert(shell_surface.stack_key, shell_surface.id);
        self.shell_surfaces.insert(shell_surface.id, shell_surface);
    }

    fn remove_shell_surface(&mut self, id: ObjectId) -> Option<ShellSurface> {
        let shell_surface = self.shell_surfaces.remove(&id)?;
        self.stacking.remove(&shell_surface.stack_key);
        Some(shell_surface)
    }

    fn has_children(&self, shell: ObjectId) -> bool {
        self.shell_surfaces.values().any(|s| s.shell == shell)
            || self.popups.iter().any(|p| p.shell == shell)
    }

    pub(crate) fn shell_surface_ids(&self) -> Vec<ObjectId> {
        self.stacking.values().copied().collect()
    }

    pub(crate) fn ids_for_client(&self, client: ClientId) -> (Vec<ObjectId>, Vec<ObjectId>) {
        let shell_surfaces = self
            .shell_surfaces
            .keys()
            .filter(|id| id.client == client)
            .copied()
            .collect();
        let popups = self
            .popups
            .iter()
            .filter(|p| p.id.client == client)
            .map(|p| p.id)
            .collect();
        (shell_surfaces, popups)
    }
}

impl<R: ObjectRegistry, H: Host> Compositor<R, H> {
    // ========== xdg_shell ==========

    pub fn use_unstable_version(&mut self, shell: ObjectId, version: i32) {
        let supported = self.config.xdg_shell.effective_max_version();
        if version > supported {
            self.post_error(shell, ProtocolError::UnsupportedVersion { requested: version, supported });
            return;
        }
        tracing::debug!(%shell, version, "xdg_shell version negotiated");
    }

    pub fn destroy_xdg_shell(&mut self, shell: ObjectId) {
        if self.shell.has_children(shell) {
            self.post_error(shell, ProtocolError::DefunctSurfaces);
            return;
        }
        self.shell.resources.remove(shell);
        self.registry.destroy_resource(shell);
    }

    pub fn get_xdg_surface(&mut self, shell: ObjectId, id: u32, surface_id: Option<ObjectId>) {
        let Some(surface) = surface_id.and_then(|s| self.surfaces.get_mut(&s)) else {
            self.post_error(shell, ProtocolError::MissingObject { interface: Interface::WlSurface });
            return;
        };
        let surface_id = surface.id();

        if surface.shell_surface.is_some() || surface.set_role(Role::ShellSurface).is_err() {
            let existing = surface.role();
            self.post_error(shell, ProtocolError::Role { surface: surface_id, existing });
            return;
        }

        let version = self.shell.resources.get(shell).map_or(1, |r| r.version);
        let Some(object) = self.create_resource(shell.client, Interface::XdgSurface, version, id) else {
            return;
        };

        self.shell.insert_shell_surface(ShellSurface {
            id: object,
            shell,
            surface: Some(surface_id),
            window: None,
            title: None,
            app_id: None,
            last_configure: None,
            acked_configure: None,
            stack_key: 0,
        });
        if let Some(surface) = self.surfaces.get_mut(&surface_id) {
            surface.shell_surface = Some(object);
        }
        tracing::info!(xdg_surface = %object, surface = %surface_id, "shell surface created");

        self.send_surface_enter(surface_id);
        self.configure_shell_surface(object);

        // A surface can map before it gets its role
        if self.surfaces.get(&surface_id).is_some_and(|s| s.is_mapped()) {
            self.surface_mapped(surface_id);
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_xdg_popup(
        &mut self,
        shell: ObjectId,
        id: u32,
        surface_id: Option<ObjectId>,
        parent_id: Option<ObjectId>,
        serial: Serial,
        x: i32,
        y: i32,
    ) {
        let Some(surface_id) = surface_id.filter(|s| self.surfaces.contains_key(s)) else {
            self.post_error(shell, ProtocolError::MissingObject { interface: Interface::WlSurface });
            return;
        };

        let parent_role = parent_id.and_then(|p| self.surfaces.get(&p)).map(|p| p.role());
        let parent = match (parent_id, parent_role) {
            (Some(parent), Some(Role::ShellSurface | Role::Popup)) => parent,
            _ => {
                self.post_error(shell, ProtocolError::InvalidPopupParent { parent: parent_id });
                return;
            }
        };

        let top_surface = self.shell.topmost_open_popup().map(|top| top.surface);
        if top_surface.is_some_and(|top| top != Some(parent)) {
            self.post_error(shell, ProtocolError::NotTheTopmostPopup { parent });
            return;
        }

        let Some(surface) = self.surfaces.get_mut(&surface_id) else {
            return;
        };
        if surface.popup.is_some() || surface.set_role(Role::Popup).is_err() {
            let existing = surface.role();
            self.post_error(shell, ProtocolError::Role { surface: surface_id, existing });
            return;
        }

        let version = self.shell.resources.get(shell).map_or(1, |r| r.version);
        let Some(object) = self.create_resource(shell.client, Interface::XdgPopup, version, id) else {
            return;
        };

        let window = if self.host.is_realized() {
            let transient_for = self.window_for_surface(parent);
            match self.host.create_popup_window(transient_for) {
                Ok(window) => Some(window),
                Err(e) => {
                    tracing::warn!(popup = %object, error = %e, "failed to create popup window");
                    None
                }
            }
        } else {
            None
        };

        self.shell.popups.push(Popup {
            id: object,
            shell,
            surface: Some(surface_id),
            parent,
            serial,
            offset: Point::from((x, y)),
            window,
            dismissed: false,
            grabbed: false,
        });
        if let Some(surface) = self.surfaces.get_mut(&surface_id) {
            surface.popup = Some(object);
        }
        tracing::info!(xdg_popup = %object, surface = %surface_id, %parent, serial = u32::from(serial), "popup created");

        self.send_surface_enter(surface_id);

        let grab_window = self.window_for_surface(parent);
        if self.pointer_grab_popup(surface_id, serial, grab_window) {
            if let Some(popup) = self.shell.popup_mut(object) {
                popup.grabbed = true;
            }
        } else {
            tracing::debug!(xdg_popup = %object, "stale popup serial, closing");
            self.close_popup(object);
        }
    }

    // ========== xdg_surface ==========

    pub fn destroy_xdg_surface(&mut self, id: ObjectId) {
        self.shell_surface_destroyed(id);
        self.registry.destroy_resource(id);
    }

    /// Tear down a shell surface; safe whether or not its `wl_surface` is alive
    pub(crate) fn shell_surface_destroyed(&mut self, id: ObjectId) {
        let surface = self.shell.shell_surface(id).and_then(|s| s.surface);
        if let Some(surface) = surface {
            self.unmap_surface(surface);
        }

        let Some(shell_surface) = self.shell.remove_shell_surface(id) else {
            return;
        };
        if let Some(window) = shell_surface.window {
            self.host.destroy_window(window);
        }
        if let Some(surface) = shell_surface.surface.and_then(|s| self.surfaces.get_mut(&s)) {
            surface.shell_surface = None;
        }
        tracing::info!(xdg_surface = %id, "shell surface destroyed");
    }

    pub fn ack_configure(&mut self, id: ObjectId, serial: Serial) {
        if let Some(shell_surface) = self.shell.shell_surfaces.get_mut(&id) {
            shell_surface.acked_configure = Some(serial);
        }
    }

    pub fn set_title(&mut self, id: ObjectId, title: String) {
        if let Some(shell_surface) = self.shell.shell_surfaces.get_mut(&id) {
            shell_surface.title = Some(title);
        }
    }

    pub fn set_app_id(&mut self, id: ObjectId, app_id: String) {
        if let Some(shell_surface) = self.shell.shell_surfaces.get_mut(&id) {
            shell_surface.app_id = Some(app_id);
        }
    }

    /// Send the current size and states to one shell surface
    pub fn configure_shell_surface(&mut self, id: ObjectId) {
        let allocation = self.host.allocation();
        let mut states = vec![ToplevelState::Fullscreen];
        if !self.host.is_backdrop() {
            states.push(ToplevelState::Activated);
        }
        let serial = self.registry.next_serial();

        let Some(shell_surface) = self.shell.shell_surfaces.get_mut(&id) else {
            return;
        };
        shell_surface.last_configure = Some(serial);
        self.registry.send_event(
            id,
            XdgSurfaceEvent::Configure {
                width: allocation.size.w,
                height: allocation.size.h,
                states,
                serial,
            }
            .into(),
        );
    }

    pub fn configure_all_shell_surfaces(&mut self) {
        for id in self.shell.shell_surface_ids() {
            self.configure_shell_surface(id);
        }
    }

    // ========== xdg_popup ==========

    pub fn destroy_xdg_popup(&mut self, id: ObjectId) {
        self.popup_destroyed(id);
        self.registry.destroy_resource(id);
    }

    /// Tear down a popup; safe whether or not its `wl_surface` is alive
    pub(crate) fn popup_destroyed(&mut self, id: ObjectId) {
        let surface = self.shell.popup(id).and_then(|p| p.surface);
        if let Some(surface) = surface {
            self.pointer_popup_gone(surface);
            self.unmap_surface(surface);
        }

        let Some(index) = self.shell.popups.iter().position(|p| p.id == id) else {
            return;
        };
        let popup = self.shell.popups.remove(index);
        if let Some(window) = popup.window {
            self.host.destroy_window(window);
        }
        if let Some(surface) = popup.surface.and_then(|s| self.surfaces.get_mut(&s)) {
            surface.popup = None;
        }
        tracing::info!(xdg_popup = %id, "popup destroyed");
    }

    /// Dismiss a popup: hide it, unmap its surface and send `popup_done`
    pub fn close_popup(&mut self, id: ObjectId) {
        let Some(popup) = self.shell.popup_mut(id) else {
            return;
        };
        if popup.dismissed {
            return;
        }
        popup.dismissed = true;
        let (window, surface) = (popup.window, popup.surface);

        if let Some(window) = window {
            self.host.hide_window(window);
        }
        if let Some(surface) = surface {
            self.pointer_popup_gone(surface);
            self.unmap_surface(surface);
        }
        self.registry.send_event(id, XdgPopupEvent::PopupDone.into());
    }

    /// Dismiss every popup, top to bottom
    pub fn close_all_popups(&mut self) {
        let ids: Vec<ObjectId> = self.shell.popups.iter().rev().map(|p| p.id).collect();
        for id in ids {
            self.close_popup(id);
        }
    }

    /// Popup that should inherit the explicit grab when `gone` loses it
    pub(crate) fn next_grab_popup(&self, gone: ObjectId) -> Option<(ObjectId, Option<HostWindow>)> {
        self.shell
            .popups
            .iter()
            .rev()
            .filter(|p| p.surface != Some(gone) && !p.dismissed && p.grabbed)
            .find_map(|p| p.surface.map(|s| (s, p.window)))
    }

    // ========== Lookups ==========

    /// Host window backing a shell surface or popup surface
    pub fn window_for_surface(&self, surface: ObjectId) -> Option<HostWindow> {
        let surface = self.surfaces.get(&surface)?;
        if let Some(shell_surface) = surface.shell_surface {
            return self.shell.shell_surface(shell_surface)?.window;
        }
        if let Some(popup) = surface.popup {
            return self.shell.popup(popup)?.window;
        }
        None
    }

    /// Resolve a host window to the surface it belongs to
    pub fn surface_for_window(&self, window: HostWindow) -> Option<ObjectId> {
        self.shell
            .shell_surfaces
            .values()
            .find(|s| s.window == Some(window))
            .and_then(|s| s.surface)
            .or_else(|| {
                self.shell
                    .popups
                    .iter()
                    .find(|p| p.window == Some(window))
                    .and_then(|p| p.surface)
            })
    }

    /// Topmost mapped shell surface, the keyboard focus candidate
    pub fn topmost_mapped_surface(&self) -> Option<ObjectId> {
        self.shell
            .stacking
            .values()
            .rev()
            .filter_map(|id| self.shell.shell_surfaces.get(id)?.surface)
            .find(|surface| self.surfaces.get(surface).is_some_and(|s| s.is_mapped()))
    }

    // ========== Host windows ==========

    /// Create the input window of a mapped shell surface
    pub(crate) fn realize_shell_surface(&mut self, id: ObjectId) {
        let Some(parent) = self.event_window else {
            return;
        };
        let Some(shell_surface) = self.shell.shell_surfaces.get(&id) else {
            return;
        };
        if shell_surface.window.is_some() {
            return;
        }
        let size = shell_surface
            .surface
            .and_then(|s| self.surfaces.get(&s))
            .and_then(|s| s.size())
            .unwrap_or_else(|| Size::from((0, 0)));

        match self.host.create_surface_window(parent, size) {
            Ok(window) => {
                self.host.show_window(window);
                if let Some(shell_surface) = self.shell.shell_surfaces.get_mut(&id) {
                    shell_surface.window = Some(window);
                }
            }
            Err(e) => {
                tracing::warn!(xdg_surface = %id, error = %e, "failed to create surface window");
            }
        }
    }

    /// Unmap a shell surface's `wl_surface` and destroy its input window
    pub(crate) fn unrealize_shell_surface(&mut self, id: ObjectId) {
        let surface = self.shell.shell_surface(id).and_then(|s| s.surface);
        if let Some(surface) = surface {
            self.unmap_surface(surface);
        }
        let window = self
            .shell
            .shell_surfaces
            .get_mut(&id)
            .and_then(|s| s.window.take());
        if let Some(window) = window {
            self.host.destroy_window(window);
        }
    }

    // ========== Commit hooks ==========

    pub(crate) fn commit_shell_surface(&mut self, surface: ObjectId, commit: &Commit) {
        let allocation = self.host.allocation();
        let mut damage = commit.damage.clone();
        damage.translate(allocation.loc);
        if !damage.is_empty() {
            self.host.queue_draw(&damage);
        }

        if let (Some(size), Some(window)) = (commit.new_size, self.window_for_surface(surface)) {
            self.host.resize_window(window, size);
        }
    }

    pub(crate) fn commit_popup(&mut self, surface_id: ObjectId, commit: &Commit) {
        let Some(popup) = self
            .surfaces
            .get(&surface_id)
            .and_then(|s| s.popup)
            .and_then(|p| self.shell.popup(p))
        else {
            return;
        };
        if popup.dismissed {
            return;
        }
        let Some(window) = popup.window else {
            return;
        };
        let (parent, offset) = (popup.parent, popup.offset);

        if let Some(size) = commit.new_size.filter(|s| s.w > 0 && s.h > 0) {
            self.host.resize_window(window, size);

            let mapped = self.surfaces.get(&surface_id).is_some_and(|s| s.is_mapped());
            if !mapped {
                let origin = self
                    .window_for_surface(parent)
                    .map(|w| self.host.root_origin(w))
                    .unwrap_or_else(|| Point::from((0, 0)));
                self.host.move_window(window, origin + offset);
                self.host.show_window(window);
            }
        }

        if !commit.damage.is_empty() {
            self.host.queue_draw_window(window, &commit.damage);
        }
    }

    /// `wl_surface.enter` for every output the client bound
    fn send_surface_enter(&mut self, surface: ObjectId) {
        for output in self.outputs.ids_for_client(surface.client) {
            self.registry
                .send_event(surface, SurfaceEvent::Enter { output }.into());
        }
    }
}
