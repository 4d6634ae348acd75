//! Surface engine
//!
//! `wl_compositor`, `wl_region` and `wl_surface` requests, the commit
//! pipeline, map/unmap notification and painting.

use smithay::utils::{Logical, Point, Rectangle};

use super::Compositor;
use crate::host::{DrawTarget, Host};
use crate::protocol::{BufferEvent, CallbackEvent, Interface, ObjectId, WL_CALLBACK_VERSION};
use crate::region::Region;
use crate::registry::ObjectRegistry;
use crate::surface::{Buffer, InputRegion, Role, Surface};

impl<R: ObjectRegistry, H: Host> Compositor<R, H> {
    // ========== wl_compositor ==========

    pub fn create_surface(&mut self, compositor: ObjectId, id: u32) {
        let version = self.compositor_resources.get(compositor).map_or(1, |r| r.version);
        let Some(object) = self.create_resource(compositor.client, Interface::WlSurface, version, id) else {
            return;
        };
        self.surfaces.insert(object, Surface::new(object));
        tracing::debug!(surface = %object, "surface created");
    }

    pub fn create_region(&mut self, compositor: ObjectId, id: u32) {
        let version = self.compositor_resources.get(compositor).map_or(1, |r| r.version);
        let Some(object) = self.create_resource(compositor.client, Interface::WlRegion, version, id) else {
            return;
        };
        self.regions.insert(object, Region::new());
    }

    // ========== wl_region ==========

    pub fn region_add(&mut self, region: ObjectId, rect: Rectangle<i32, Logical>) {
        if let Some(region) = self.regions.get_mut(&region) {
            region.union_rect(rect);
        }
    }

    pub fn region_subtract(&mut self, region: ObjectId, rect: Rectangle<i32, Logical>) {
        if let Some(region) = self.regions.get_mut(&region) {
            region.subtract_rect(rect);
        }
    }

    pub fn destroy_region(&mut self, region: ObjectId) {
        self.regions.remove(&region);
        self.registry.destroy_resource(region);
    }

    // ========== wl_surface pending state ==========

    /// Stage a buffer; `None` detaches on the next commit
    pub fn attach(&mut self, surface: ObjectId, buffer: Option<Buffer>) {
        if let Some(surface) = self.surfaces.get_mut(&surface) {
            surface.attach(buffer);
        }
    }

    pub fn damage(&mut self, surface: ObjectId, rect: Rectangle<i32, Logical>) {
        if let Some(surface) = self.surfaces.get_mut(&surface) {
            surface.add_damage(rect);
        }
    }

    pub fn frame(&mut self, surface: ObjectId, callback: u32) {
        if !self.surfaces.contains_key(&surface) {
            return;
        }
        let Some(object) = self.create_resource(surface.client, Interface::WlCallback, WL_CALLBACK_VERSION, callback)
        else {
            return;
        };
        if let Some(surface) = self.surfaces.get_mut(&surface) {
            surface.pending.frame_callbacks.push(object);
        }
        self.callbacks.insert(object, surface);
    }

    /// Copy `region` into the pending input region; `None` means infinite
    pub fn set_input_region(&mut self, surface: ObjectId, region: Option<ObjectId>) {
        let input_region = match region {
            None => InputRegion::Infinite,
            Some(id) => InputRegion::Region(self.regions.get(&id).cloned().unwrap_or_default()),
        };
        if let Some(surface) = self.surfaces.get_mut(&surface) {
            surface.pending.input_region = Some(input_region);
        }
    }

    /// Non-positive scales are stored but never applied
    pub fn set_buffer_scale(&mut self, surface: ObjectId, scale: i32) {
        if let Some(surface) = self.surfaces.get_mut(&surface) {
            surface.pending.scale = scale;
        }
    }

    // ========== Commit ==========

    pub fn commit(&mut self, id: ObjectId) {
        let Some(surface) = self.surfaces.get_mut(&id) else {
            return;
        };
        let commit = surface.apply_pending();
        let role = surface.role();
        let has_buffer = surface.buffer().is_some();
        let was_mapped = surface.is_mapped();

        if let Some(released) = commit.released {
            self.registry.send_event(released, BufferEvent::Release.into());
        }

        match role {
            Role::ShellSurface => self.commit_shell_surface(id, &commit),
            Role::Popup => self.commit_popup(id, &commit),
            Role::Cursor => self.commit_cursor(id),
            Role::None => {}
        }

        let dismissed = self
            .surfaces
            .get(&id)
            .and_then(|s| s.popup)
            .and_then(|p| self.shell.popup(p))
            .is_some_and(|p| p.dismissed);

        if has_buffer && !was_mapped && !dismissed {
            if let Some(surface) = self.surfaces.get_mut(&id) {
                surface.set_mapped(true);
            }
            self.surface_mapped(id);
        }
    }

    /// Unmap if mapped, notifying focus and role owners
    pub(crate) fn unmap_surface(&mut self, id: ObjectId) {
        let changed = self
            .surfaces
            .get_mut(&id)
            .is_some_and(|s| s.set_mapped(false));
        if changed {
            self.surface_unmapped(id);
        }
    }

    pub(crate) fn surface_mapped(&mut self, id: ObjectId) {
        let Some(surface) = self.surfaces.get(&id) else {
            return;
        };
        tracing::debug!(surface = %id, role = ?surface.role(), "surface mapped");
        let Some(shell_surface) = surface.shell_surface else {
            return;
        };

        if self.host.is_realized() {
            self.realize_shell_surface(shell_surface);
        }
        if self.host.has_focus() && self.seat.keyboard.focus().is_none() {
            self.keyboard_enter(id);
        }
    }

    pub(crate) fn surface_unmapped(&mut self, id: ObjectId) {
        tracing::debug!(surface = %id, "surface unmapped");
        self.keyboard_surface_unmapped(id);
        self.pointer_surface_unmapped(id);

        let Some(surface) = self.surfaces.get(&id) else {
            return;
        };
        let (shell_surface, popup) = (surface.shell_surface, surface.popup);

        if let Some(shell_surface) = shell_surface {
            let window = self
                .shell
                .shell_surfaces
                .get_mut(&shell_surface)
                .and_then(|s| s.window.take());
            if let Some(window) = window {
                self.host.destroy_window(window);
            }
            let allocation = self.host.allocation();
            self.host.queue_draw(&Region::from_rect(allocation));
        }

        if let Some(window) = popup.and_then(|p| self.shell.popup(p)).and_then(|p| p.window) {
            self.host.hide_window(window);
        }
    }

    // ========== Destruction ==========

    pub fn destroy_surface(&mut self, id: ObjectId) {
        self.surface_destroyed(id);
        self.registry.destroy_resource(id);
    }

    /// Tear down a surface; companions outlive it with their link cleared
    pub(crate) fn surface_destroyed(&mut self, id: ObjectId) {
        self.pointer_popup_gone(id);
        self.unmap_surface(id);
        let Some(mut surface) = self.surfaces.remove(&id) else {
            return;
        };

        if let Some(shell_surface) = surface.shell_surface.and_then(|s| self.shell.shell_surfaces.get_mut(&s)) {
            shell_surface.surface = None;
        }
        if let Some(popup) = surface.popup.and_then(|p| self.shell.popup_mut(p)) {
            popup.surface = None;
        }

        for callback in surface.drain_all_callbacks() {
            self.callbacks.remove(&callback);
            self.registry.destroy_resource(callback);
        }

        if self.seat.pointer.cursor_surface() == Some(id) {
            self.clear_cursor();
        }
        tracing::debug!(surface = %id, "surface destroyed");
    }

    /// A client destroyed a frame callback before it fired
    pub(crate) fn callback_destroyed(&mut self, callback: ObjectId) {
        if let Some(surface) = self.callbacks.remove(&callback) {
            if let Some(surface) = self.surfaces.get_mut(&surface) {
                surface.forget_callback(callback);
            }
        }
    }

    /// Drop every reference to a destroyed `wl_buffer`
    pub fn buffer_destroyed(&mut self, buffer: ObjectId) {
        for surface in self.surfaces.values_mut() {
            if surface.pending.buffer.is_some_and(|b| b.id == buffer) {
                surface.pending.buffer = None;
            }
            if surface.current.buffer.is_some_and(|b| b.id == buffer) {
                surface.current.buffer = None;
            }
        }
    }

    // ========== Painting ==========

    /// Paint every shell surface bottom to top, then fire their frame callbacks
    pub fn draw(&mut self, target: &mut impl DrawTarget) {
        let surfaces: Vec<ObjectId> = self.shell.shell_surfaces().filter_map(|s| s.surface).collect();
        for id in surfaces {
            self.paint_surface(id, target, Point::from((0, 0)));
        }
    }

    /// Paint a popup's surface into its own window
    pub fn draw_popup(&mut self, popup: ObjectId, target: &mut impl DrawTarget) {
        let Some(surface) = self.shell.popup(popup).and_then(|p| p.surface) else {
            return;
        };
        self.paint_surface(surface, target, Point::from((0, 0)));
    }

    fn paint_surface(&mut self, id: ObjectId, target: &mut impl DrawTarget, position: Point<i32, Logical>) {
        let Some(surface) = self.surfaces.get(&id) else {
            return;
        };
        if let Some(buffer) = surface.buffer().filter(|b| b.shm.is_some()) {
            target.paint(buffer, surface.scale(), position);
        }
        let time = self.host.frame_time();
        self.fire_frame_callbacks(id, time);
    }

    pub(crate) fn fire_frame_callbacks(&mut self, id: ObjectId, time: u32) {
        let Some(surface) = self.surfaces.get_mut(&id) else {
            return;
        };
        for callback in surface.take_frame_callbacks() {
            self.registry
                .send_event(callback, CallbackEvent::Done { time }.into());
            self.registry.destroy_resource(callback);
            self.callbacks.remove(&callback);
        }
    }

    // ========== Queries ==========

    /// Hit test a surface-local point against the surface's input region
    pub fn surface_accepts_input(&self, surface: ObjectId, point: Point<f64, Logical>) -> bool {
        let point = Point::from((point.x.floor() as i32, point.y.floor() as i32));
        self.surfaces
            .get(&surface)
            .is_some_and(|s| s.accepts_input(point))
    }
}
