//! Host event intake
//!
//! Routes raw toolkit events to the engines and keeps the host windows in
//! step with the widget's realize/unrealize and allocation changes.

use smithay::utils::{Logical, Rectangle};

use super::Compositor;
use crate::host::{Host, HostEvent};
use crate::registry::ObjectRegistry;

impl<R: ObjectRegistry, H: Host> Compositor<R, H> {
    /// Handle one event from the host toolkit
    pub fn handle_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::Motion(motion) => {
                if let Some(surface) = self.surface_for_window(motion.window) {
                    self.pointer_motion(surface, &motion);
                }
            }
            HostEvent::Button(button) => {
                let surface = self.surface_for_window(button.window);
                self.pointer_button(surface, &button);
            }
            HostEvent::Scroll(scroll) => {
                if let Some(surface) = self.surface_for_window(scroll.window) {
                    self.pointer_scroll(surface, &scroll);
                }
            }
            HostEvent::Enter(crossing) => {
                if let Some(surface) = self.surface_for_window(crossing.window) {
                    self.pointer_enter(surface, &crossing);
                }
            }
            HostEvent::Leave(crossing) => {
                if let Some(surface) = self.surface_for_window(crossing.window) {
                    self.pointer_leave(surface, &crossing);
                }
            }
            HostEvent::Key(key) => self.keyboard_key(&key),
            HostEvent::FocusIn => self.keyboard_focus_in(),
            HostEvent::FocusOut => self.keyboard_focus_out(),
            HostEvent::SizeAllocate(allocation) => self.size_allocate(allocation),
            HostEvent::StateFlagsChanged => self.configure_all_shell_surfaces(),
            HostEvent::ScaleChanged => self.refresh_outputs(),
            HostEvent::Realize => self.realize(),
            HostEvent::Unrealize => self.unrealize(),
        }
    }

    /// Create the event window and the windows of already mapped shell surfaces
    pub fn realize(&mut self) {
        if self.event_window.is_some() {
            return;
        }
        let allocation = self.host.allocation();
        match self.host.create_event_window(allocation) {
            Ok(window) => {
                self.host.show_window(window);
                self.event_window = Some(window);
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to create event window");
                return;
            }
        }
        tracing::info!(?allocation, "realized");

        for id in self.shell.shell_surface_ids() {
            let mapped = self
                .shell
                .shell_surface(id)
                .and_then(|s| s.surface)
                .and_then(|s| self.surfaces.get(&s))
                .is_some_and(|s| s.is_mapped());
            if mapped {
                self.realize_shell_surface(id);
            }
        }
    }

    pub fn unrealize(&mut self) {
        for id in self.shell.shell_surface_ids() {
            self.unrealize_shell_surface(id);
        }
        if let Some(window) = self.event_window.take() {
            self.host.destroy_window(window);
        }
        tracing::info!("unrealized");
    }

    /// The widget moved or resized; the host already reports the new allocation
    pub fn size_allocate(&mut self, allocation: Rectangle<i32, Logical>) {
        tracing::debug!(?allocation, "size allocated");
        if let Some(window) = self.event_window {
            self.host.move_window(window, allocation.loc);
            self.host.resize_window(window, allocation.size);
        }
        self.refresh_outputs();
        self.configure_all_shell_surfaces();
    }
}
