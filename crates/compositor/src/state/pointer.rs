//! Pointer engine
//!
//! Turns host crossing/motion/button/scroll events into `wl_pointer` events.
//! Focus changes are suppressed while an implicit grab (buttons held) is
//! active; popups can take an explicit grab when their serial matches the
//! press that started the implicit grab.

use smithay::utils::{Logical, Point, Serial};

use super::Compositor;
use crate::error::ProtocolError;
use crate::host::{ButtonEvent, ButtonKind, CrossingEvent, CrossingMode, DeviceId, Host, HostWindow, MotionEvent, ScrollDirection, ScrollEvent};
use crate::protocol::{Axis, ButtonState, ClientId, Fixed, Interface, ObjectId, PointerEvent};
use crate::registry::{BoundResource, ObjectRegistry, ResourceList};
use crate::surface::Role;

/// Conceptual pointer state, derived from [`PointerState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerFocus {
    Idle,
    EnteredSurface(ObjectId),
    ImplicitGrab {
        client: ClientId,
        buttons: u32,
        initial_surface: Option<ObjectId>,
    },
    PopupGrab(ObjectId),
}

#[derive(Debug, Clone, Copy)]
struct CursorState {
    surface: ObjectId,
    hotspot: Point<i32, Logical>,
    window: Option<HostWindow>,
}

#[derive(Debug)]
pub struct PointerState {
    pub(crate) resources: ResourceList,
    /// Surface the client was told the pointer is in
    current_surface: Option<ObjectId>,
    /// Surface the host last reported the pointer in
    current_host_surface: Option<ObjectId>,
    position: Point<f64, Logical>,
    button_count: u32,
    enter_serial: Option<Serial>,

    grab_client: Option<ClientId>,
    grab_button: u32,
    grab_time: u32,
    // Device, window and serial outlive the implicit grab so later popups
    // can still be granted; they are forgotten when the initial surface unmaps.
    grab_device: Option<DeviceId>,
    grab_window: Option<HostWindow>,
    grab_initial_surface: Option<ObjectId>,
    grab_serial: Option<Serial>,
    grab_popup_surface: Option<ObjectId>,

    cursor: Option<CursorState>,
}

impl PointerState {
    pub(crate) fn new() -> Self {
        Self {
            resources: ResourceList::default(),
            current_surface: None,
            current_host_surface: None,
            position: Point::from((0.0, 0.0)),
            button_count: 0,
            enter_serial: None,
            grab_client: None,
            grab_button: 0,
            grab_time: 0,
            grab_device: None,
            grab_window: None,
            grab_initial_surface: None,
            grab_serial: None,
            grab_popup_surface: None,
            cursor: None,
        }
    }

    pub fn current_surface(&self) -> Option<ObjectId> {
        self.current_surface
    }

    pub fn position(&self) -> Point<f64, Logical> {
        self.position
    }

    pub fn button_count(&self) -> u32 {
        self.button_count
    }

    /// Serial of the press that took the button count from 0 to 1
    pub fn grab_serial(&self) -> Option<Serial> {
        self.grab_serial
    }

    pub fn grab_button(&self) -> u32 {
        self.grab_button
    }

    pub fn grab_window(&self) -> Option<HostWindow> {
        self.grab_window
    }

    pub fn grab_popup_surface(&self) -> Option<ObjectId> {
        self.grab_popup_surface
    }

    pub fn has_implicit_grab(&self) -> bool {
        self.grab_client.is_some() && self.grab_popup_surface.is_none()
    }

    pub fn cursor_surface(&self) -> Option<ObjectId> {
        self.cursor.map(|c| c.surface)
    }

    pub fn focus(&self) -> PointerFocus {
        if let Some(popup) = self.grab_popup_surface {
            return PointerFocus::PopupGrab(popup);
        }
        if let Some(client) = self.grab_client {
            return PointerFocus::ImplicitGrab {
                client,
                buttons: self.button_count,
                initial_surface: self.grab_initial_surface,
            };
        }
        match self.current_surface {
            Some(surface) => PointerFocus::EnteredSurface(surface),
            None => PointerFocus::Idle,
        }
    }
}

/// Toolkit button number to evdev code
pub fn host_button_to_evdev(button: u32) -> u32 {
    match button {
        2 => 274,
        3 => 273,
        _ => button + 271,
    }
}

impl<R: ObjectRegistry, H: Host> Compositor<R, H> {
    pub fn get_pointer(&mut self, seat: ObjectId, id: u32) {
        let version = self.seat.resources.get(seat).map_or(1, |r| r.version);
        let Some(object) = self.create_resource(seat.client, Interface::WlPointer, version, id) else {
            return;
        };
        self.seat.pointer.resources.insert(BoundResource { id: object, version });
    }

    pub fn release_pointer(&mut self, pointer: ObjectId) {
        self.seat.pointer.resources.remove(pointer);
        self.registry.destroy_resource(pointer);
    }

    // ========== Host input ==========

    pub fn pointer_enter(&mut self, surface: ObjectId, event: &CrossingEvent) {
        if event.mode != CrossingMode::Normal {
            return;
        }
        let pointer = &mut self.seat.pointer;
        pointer.current_host_surface = Some(surface);
        pointer.position = event.position;

        // Crossings inside an implicit grab have no Wayland equivalent
        if pointer.has_implicit_grab() {
            return;
        }
        if self.surface_accepts_input(surface, event.position) {
            self.ensure_pointer_entered(surface, event.position);
        }
    }

    pub fn pointer_leave(&mut self, surface: ObjectId, event: &CrossingEvent) {
        if event.mode != CrossingMode::Normal {
            return;
        }
        let pointer = &mut self.seat.pointer;
        if pointer.current_host_surface == Some(surface) {
            pointer.current_host_surface = None;
        }
        pointer.position = event.position;

        if pointer.has_implicit_grab() {
            return;
        }
        // Already left when the surface unmapped
        let Some(current) = pointer.current_surface else {
            return;
        };
        debug_assert_eq!(current, surface, "leave for a surface the pointer is not in");
        if current == surface {
            self.seat.pointer.current_surface = None;
            self.send_pointer_leave(surface);
        }
    }

    pub fn pointer_motion(&mut self, surface: ObjectId, event: &MotionEvent) {
        self.seat.pointer.position = event.position;
        if !self.seat.pointer.has_implicit_grab() && self.surface_accepts_input(surface, event.position) {
            self.ensure_pointer_entered(surface, event.position);
        }

        if !self.pointer_reachable(surface.client) {
            return;
        }
        let (x, y) = (Fixed::from_f64(event.position.x), Fixed::from_f64(event.position.y));
        for pointer in self.seat.pointer.resources.ids_for_client(surface.client) {
            self.registry.send_event(pointer, PointerEvent::Motion { time: event.time, x, y }.into());
        }
    }

    pub fn pointer_button(&mut self, surface: Option<ObjectId>, event: &ButtonEvent) {
        let state = match event.kind {
            ButtonKind::Press => ButtonState::Pressed,
            ButtonKind::Release => ButtonState::Released,
            ButtonKind::DoublePress | ButtonKind::TriplePress => return,
        };
        let button = host_button_to_evdev(event.button);
        let serial = self.registry.next_serial();
        self.seat.pointer.position = event.position;

        if let Some(surface) = surface {
            if !self.seat.pointer.has_implicit_grab() && self.surface_accepts_input(surface, event.position) {
                self.ensure_pointer_entered(surface, event.position);
            }
        }

        if state == ButtonState::Pressed {
            let pointer = &self.seat.pointer;
            if pointer.button_count == 0 && pointer.grab_popup_surface.is_none() {
                if let Some(surface) = surface {
                    self.start_implicit_grab(surface, button, event);
                }
            }
            let pointer = &mut self.seat.pointer;
            pointer.button_count += 1;
            if pointer.button_count == 1 {
                pointer.grab_serial = Some(serial);
                pointer.grab_device = Some(event.device);
                pointer.grab_time = event.time;
            }
        } else {
            let pointer = &mut self.seat.pointer;
            pointer.button_count = pointer.button_count.saturating_sub(1);
        }

        if let Some(surface) = surface.filter(|s| self.pointer_reachable(s.client)) {
            for pointer in self.seat.pointer.resources.ids_for_client(surface.client) {
                self.registry.send_event(
                    pointer,
                    PointerEvent::Button { serial, time: event.time, button, state }.into(),
                );
            }
        }

        if state == ButtonState::Released && self.seat.pointer.button_count == 0 {
            let pointer = &self.seat.pointer;
            if pointer.grab_popup_surface.is_none() {
                if pointer.grab_client.is_some() {
                    self.clear_implicit_grab();
                }
            } else if pointer.current_surface.is_none() {
                tracing::debug!("release outside popups, dismissing");
                self.close_all_popups();
            }
        }
    }

    pub fn pointer_scroll(&mut self, surface: ObjectId, event: &ScrollEvent) {
        if !self.pointer_reachable(surface.client) {
            return;
        }
        let scroll = &self.config.scroll;
        let axes = match event.direction {
            ScrollDirection::Up => vec![(Axis::VerticalScroll, scroll.discrete_to_fixed(-1.0))],
            ScrollDirection::Down => vec![(Axis::VerticalScroll, scroll.discrete_to_fixed(1.0))],
            ScrollDirection::Left => vec![(Axis::HorizontalScroll, scroll.discrete_to_fixed(-1.0))],
            ScrollDirection::Right => vec![(Axis::HorizontalScroll, scroll.discrete_to_fixed(1.0))],
            ScrollDirection::Smooth { dx, dy } => {
                let mut axes = Vec::with_capacity(2);
                if dx != 0.0 {
                    axes.push((Axis::HorizontalScroll, scroll.smooth_to_fixed(dx)));
                }
                if dy != 0.0 {
                    axes.push((Axis::VerticalScroll, scroll.smooth_to_fixed(dy)));
                }
                axes
            }
        };

        for pointer in self.seat.pointer.resources.ids_for_client(surface.client) {
            for &(axis, value) in &axes {
                self.registry
                    .send_event(pointer, PointerEvent::Axis { time: event.time, axis, value }.into());
            }
        }
    }

    // ========== Grabs ==========

    fn start_implicit_grab(&mut self, surface: ObjectId, button: u32, event: &ButtonEvent) {
        let has_shell_role = self
            .surfaces
            .get(&surface)
            .is_some_and(|s| matches!(s.role(), Role::ShellSurface | Role::Popup));
        if has_shell_role && !self.host.has_focus() {
            self.host.grab_focus();
        }

        let pointer = &mut self.seat.pointer;
        pointer.grab_client = Some(surface.client);
        pointer.grab_button = button;
        pointer.grab_window = Some(event.window);
        pointer.grab_initial_surface = Some(surface);
        tracing::debug!(%surface, button, "implicit grab started");
    }

    /// End the implicit grab and catch up on the crossings it suppressed
    fn clear_implicit_grab(&mut self) {
        let pointer = &mut self.seat.pointer;
        pointer.grab_client = None;
        pointer.grab_button = 0;
        self.sync_pointer_focus();
    }

    /// Move the entered surface to wherever the host last reported the pointer
    fn sync_pointer_focus(&mut self) {
        let pointer = &self.seat.pointer;
        let position = pointer.position;
        let host_surface = pointer
            .current_host_surface
            .filter(|s| self.surfaces.get(s).is_some_and(|s| s.is_mapped()))
            .filter(|&s| self.surface_accepts_input(s, position));
        if host_surface == pointer.current_surface {
            return;
        }
        if let Some(old) = self.seat.pointer.current_surface.take() {
            self.send_pointer_leave(old);
        }
        if let Some(new) = host_surface {
            self.seat.pointer.current_surface = Some(new);
            self.send_pointer_enter(new, position);
        }
    }

    /// Try to give `popup_surface` the explicit grab
    ///
    /// Granted exactly when `serial` is the serial of the press that started
    /// the current (or last) implicit grab.
    pub(crate) fn pointer_grab_popup(
        &mut self,
        popup_surface: ObjectId,
        serial: Serial,
        grab_window: Option<HostWindow>,
    ) -> bool {
        let pointer = &self.seat.pointer;
        if pointer.grab_serial != Some(serial) {
            return false;
        }
        let (device, time) = (pointer.grab_device, pointer.grab_time);

        if let (Some(device), Some(window)) = (device, grab_window) {
            if let Err(e) = self.host.grab_pointer(device, window, time) {
                tracing::warn!(surface = %popup_surface, error = %e, "host pointer grab failed");
            }
        }

        let pointer = &mut self.seat.pointer;
        pointer.grab_popup_surface = Some(popup_surface);
        pointer.grab_client = None;
        pointer.grab_button = 0;
        tracing::debug!(surface = %popup_surface, serial = u32::from(serial), "popup grab granted");
        // The implicit grab it replaces may have held back crossings
        self.sync_pointer_focus();
        true
    }

    /// Release the explicit grab if `surface` holds it, mapped or not
    pub(crate) fn pointer_popup_gone(&mut self, surface: ObjectId) {
        if self.seat.pointer.grab_popup_surface == Some(surface) {
            self.release_popup_grab(surface);
        }
    }

    fn release_popup_grab(&mut self, surface: ObjectId) {
        if let Some((next, _)) = self.next_grab_popup(surface) {
            self.seat.pointer.grab_popup_surface = Some(next);
            return;
        }
        let pointer = &mut self.seat.pointer;
        pointer.grab_popup_surface = None;
        pointer.grab_client = None;
        pointer.grab_button = 0;
        if let Some(device) = pointer.grab_device {
            let time = pointer.grab_time;
            self.host.ungrab_pointer(device, time);
        }
    }

    // ========== Focus ==========

    /// A client receives pointer input if it owns the entered surface or the implicit grab
    pub(crate) fn pointer_reachable(&self, client: ClientId) -> bool {
        let pointer = &self.seat.pointer;
        pointer.current_surface.is_some_and(|s| s.client == client)
            || (pointer.has_implicit_grab() && pointer.grab_client == Some(client))
    }

    fn ensure_pointer_entered(&mut self, surface: ObjectId, position: Point<f64, Logical>) {
        if self.seat.pointer.current_surface == Some(surface) {
            return;
        }
        if let Some(old) = self.seat.pointer.current_surface.take() {
            self.send_pointer_leave(old);
        }
        self.seat.pointer.current_surface = Some(surface);
        self.send_pointer_enter(surface, position);
    }

    fn send_pointer_enter(&mut self, surface: ObjectId, position: Point<f64, Logical>) {
        let serial = self.registry.next_serial();
        self.seat.pointer.enter_serial = Some(serial);
        let (x, y) = (Fixed::from_f64(position.x), Fixed::from_f64(position.y));
        for pointer in self.seat.pointer.resources.ids_for_client(surface.client) {
            self.registry
                .send_event(pointer, PointerEvent::Enter { serial, surface, x, y }.into());
        }
    }

    fn send_pointer_leave(&mut self, surface: ObjectId) {
        let serial = self.registry.next_serial();
        for pointer in self.seat.pointer.resources.ids_for_client(surface.client) {
            self.registry
                .send_event(pointer, PointerEvent::Leave { serial, surface }.into());
        }
        self.seat.pointer.cursor = None;
    }

    /// Drop focus and grab state rooted on a surface that just unmapped
    pub(crate) fn pointer_surface_unmapped(&mut self, surface: ObjectId) {
        self.pointer_popup_gone(surface);

        if self.seat.pointer.grab_initial_surface == Some(surface) {
            if self.seat.pointer.has_implicit_grab() {
                self.clear_implicit_grab();
            }
            let pointer = &mut self.seat.pointer;
            pointer.grab_serial = None;
            pointer.grab_device = None;
            pointer.grab_window = None;
            pointer.grab_initial_surface = None;
        }

        let pointer = &mut self.seat.pointer;
        if pointer.current_host_surface == Some(surface) {
            pointer.current_host_surface = None;
        }
        if pointer.current_surface == Some(surface) {
            pointer.current_surface = None;
            self.send_pointer_leave(surface);
        }
    }

    /// Forget everything `client` held in the pointer state
    pub(crate) fn pointer_client_gone(&mut self, client: ClientId) {
        let pointer = &mut self.seat.pointer;
        pointer.resources.remove_client(client);
        if pointer.grab_client == Some(client) {
            pointer.grab_client = None;
            pointer.grab_button = 0;
        }
        if pointer.cursor.is_some_and(|c| c.surface.client == client) {
            pointer.cursor = None;
        }
    }

    // ========== Cursor ==========

    pub fn set_cursor(
        &mut self,
        pointer: ObjectId,
        serial: Serial,
        surface: Option<ObjectId>,
        hotspot: Point<i32, Logical>,
    ) {
        if let Some(id) = surface {
            let Some(cursor_surface) = self.surfaces.get_mut(&id) else {
                return;
            };
            if cursor_surface.set_role(Role::Cursor).is_err() {
                let existing = cursor_surface.role();
                self.post_error(pointer, ProtocolError::CursorRole { surface: id, existing });
                return;
            }
        }

        let state = &self.seat.pointer;
        if state.enter_serial != Some(serial) {
            return;
        }
        let Some(current) = state.current_surface.filter(|s| s.client == pointer.client) else {
            return;
        };

        match surface {
            None => self.seat.pointer.cursor = None,
            Some(id) => {
                let window = self.window_for_surface(current);
                self.seat.pointer.cursor = Some(CursorState { surface: id, hotspot, window });
                self.apply_cursor(id);
            }
        }
    }

    pub(crate) fn clear_cursor(&mut self) {
        self.seat.pointer.cursor = None;
    }

    /// Push the cursor surface's buffer to the host
    fn apply_cursor(&mut self, surface: ObjectId) {
        let Some(cursor) = self.seat.pointer.cursor.filter(|c| c.surface == surface) else {
            return;
        };
        let Some(window) = cursor.window else {
            return;
        };
        let Some(cursor_surface) = self.surfaces.get(&surface) else {
            return;
        };
        let (Some(buffer), Some(size)) = (cursor_surface.buffer().copied(), cursor_surface.size()) else {
            return;
        };
        // Hotspots outside the image are rejected by some hosts
        let hotspot = Point::from((
            cursor.hotspot.x.clamp(0, size.w.max(0)),
            cursor.hotspot.y.clamp(0, size.h.max(0)),
        ));
        let scale = cursor_surface.scale();
        self.host.set_cursor(window, &buffer, hotspot, scale);
    }

    pub(crate) fn commit_cursor(&mut self, surface: ObjectId) {
        self.apply_cursor(surface);
        // Cursor surfaces are never part of a draw pass
        let time = self.host.frame_time();
        self.fire_frame_callbacks(surface, time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_buttons_map_to_evdev() {
        assert_eq!(host_button_to_evdev(1), 272);
        assert_eq!(host_button_to_evdev(2), 274);
        assert_eq!(host_button_to_evdev(3), 273);
        assert_eq!(host_button_to_evdev(8), 279);
    }

    #[test]
    fn fresh_pointer_is_idle() {
        let pointer = PointerState::new();

        assert_eq!(pointer.focus(), PointerFocus::Idle);
        assert!(!pointer.has_implicit_grab());
        assert_eq!(pointer.grab_serial(), None);
    }

    #[test]
    fn popup_grab_takes_precedence_in_focus() {
        let mut pointer = PointerState::new();
        let popup = ObjectId::new(ClientId(1), 5);
        pointer.grab_client = Some(ClientId(1));
        pointer.grab_popup_surface = Some(popup);

        assert_eq!(pointer.focus(), PointerFocus::PopupGrab(popup));
        assert!(!pointer.has_implicit_grab());
    }
}
