//! Keyboard engine
//!
//! Focus follows the host widget's focus onto the topmost mapped shell
//! surface. Host key events carry hardware keycodes and a toolkit modifier
//! mask; both are translated to what `wl_keyboard` expects.

use std::sync::Arc;

use super::Compositor;
use crate::host::{Host, HostModifiers, KeyEvent};
use crate::protocol::{Interface, KeyState, KeyboardEvent, KeymapFormat, ObjectId};
use crate::registry::{BoundResource, ObjectRegistry, ResourceList};

/// Keymap modifier index for each host modifier bit
///
/// [`ModifierIndices::INVALID`] marks a bit the keymap has no modifier for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifierIndices {
    pub shift: u32,
    pub caps: u32,
    pub ctrl: u32,
    pub alt: u32,
    pub mod2: u32,
    pub mod3: u32,
    pub super_: u32,
    pub mod5: u32,
}

impl ModifierIndices {
    pub const INVALID: u32 = u32::MAX;

    fn table(&self) -> [(HostModifiers, u32); 8] {
        [
            (HostModifiers::SHIFT, self.shift),
            (HostModifiers::LOCK, self.caps),
            (HostModifiers::CONTROL, self.ctrl),
            (HostModifiers::MOD1, self.alt),
            (HostModifiers::MOD2, self.mod2),
            (HostModifiers::MOD3, self.mod3),
            (HostModifiers::MOD4, self.super_),
            (HostModifiers::MOD5, self.mod5),
        ]
    }
}

impl Default for ModifierIndices {
    /// Index layout of a standard xkb keymap
    fn default() -> Self {
        Self {
            shift: 0,
            caps: 1,
            ctrl: 2,
            alt: 3,
            mod2: 4,
            mod3: 5,
            super_: 6,
            mod5: 7,
        }
    }
}

/// Modifier state as serialized in `wl_keyboard.modifiers`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    pub depressed: u32,
    pub latched: u32,
    pub locked: u32,
    pub group: u32,
}

impl ModifierState {
    /// Translate a host mask; the host cannot tell latched or locked apart,
    /// so every active bit is reported as depressed.
    pub fn from_host(mask: HostModifiers, group: u32, indices: &ModifierIndices) -> Self {
        let depressed = indices
            .table()
            .into_iter()
            .filter(|&(bit, index)| mask.contains(bit) && index < 32)
            .fold(0, |acc, (_, index)| acc | (1 << index));
        Self {
            depressed,
            latched: 0,
            locked: 0,
            group,
        }
    }
}

/// Keymap shared with every client keyboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keymap {
    pub format: KeymapFormat,
    pub contents: Arc<str>,
    pub indices: ModifierIndices,
}

impl Keymap {
    pub fn xkb_v1(contents: impl Into<Arc<str>>) -> Self {
        Self {
            format: KeymapFormat::XkbV1,
            contents: contents.into(),
            indices: ModifierIndices::default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct KeyboardState {
    pub(crate) resources: ResourceList,
    focus: Option<ObjectId>,
    modifiers: ModifierState,
    keymap: Option<Keymap>,
}

impl KeyboardState {
    pub fn focus(&self) -> Option<ObjectId> {
        self.focus
    }

    pub fn modifiers(&self) -> ModifierState {
        self.modifiers
    }

    pub fn keymap(&self) -> Option<&Keymap> {
        self.keymap.as_ref()
    }

    fn indices(&self) -> ModifierIndices {
        self.keymap.as_ref().map(|k| k.indices).unwrap_or_default()
    }
}

impl<R: ObjectRegistry, H: Host> Compositor<R, H> {
    pub fn get_keyboard(&mut self, seat: ObjectId, id: u32) {
        let version = self.seat.resources.get(seat).map_or(1, |r| r.version);
        let Some(keyboard) = self.create_resource(seat.client, Interface::WlKeyboard, version, id) else {
            return;
        };
        self.seat.keyboard.resources.insert(BoundResource { id: keyboard, version });

        if let Some(keymap) = &self.seat.keyboard.keymap {
            let event = KeyboardEvent::Keymap {
                format: keymap.format,
                contents: Arc::clone(&keymap.contents),
            };
            self.registry.send_event(keyboard, event.into());
        }

        // Late keyboards of the focused client still need to learn the focus
        if let Some(focus) = self.seat.keyboard.focus.filter(|f| f.client == seat.client) {
            self.send_keyboard_enter_to(keyboard, focus);
        }
    }

    pub fn release_keyboard(&mut self, keyboard: ObjectId) {
        self.seat.keyboard.resources.remove(keyboard);
        self.registry.destroy_resource(keyboard);
    }

    /// Install a new keymap and broadcast it to every keyboard
    pub fn set_keymap(&mut self, keymap: Keymap) {
        tracing::info!(format = ?keymap.format, bytes = keymap.contents.len(), "keymap updated");
        for keyboard in self.seat.keyboard.resources.ids() {
            let event = KeyboardEvent::Keymap {
                format: keymap.format,
                contents: Arc::clone(&keymap.contents),
            };
            self.registry.send_event(keyboard, event.into());
        }
        self.seat.keyboard.keymap = Some(keymap);
    }

    // ========== Focus ==========

    pub fn keyboard_focus_in(&mut self) {
        if self.seat.keyboard.focus.is_some() {
            return;
        }
        if let Some(surface) = self.topmost_mapped_surface() {
            self.keyboard_enter(surface);
        }
    }

    pub fn keyboard_focus_out(&mut self) {
        if let Some(surface) = self.seat.keyboard.focus {
            self.keyboard_leave(surface);
        }
    }

    pub(crate) fn keyboard_enter(&mut self, surface: ObjectId) {
        debug_assert!(self.seat.keyboard.focus.is_none(), "keyboard entered twice");
        self.seat.keyboard.focus = Some(surface);
        tracing::debug!(%surface, "keyboard focus");
        for keyboard in self.seat.keyboard.resources.ids_for_client(surface.client) {
            self.send_keyboard_enter_to(keyboard, surface);
        }
    }

    fn send_keyboard_enter_to(&mut self, keyboard: ObjectId, surface: ObjectId) {
        let serial = self.registry.next_serial();
        self.registry.send_event(
            keyboard,
            KeyboardEvent::Enter { serial, surface, keys: Vec::new() }.into(),
        );
        self.send_modifiers_to(keyboard);
    }

    pub(crate) fn keyboard_leave(&mut self, surface: ObjectId) {
        debug_assert_eq!(self.seat.keyboard.focus, Some(surface));
        self.seat.keyboard.focus = None;
        let serial = self.registry.next_serial();
        for keyboard in self.seat.keyboard.resources.ids_for_client(surface.client) {
            self.registry
                .send_event(keyboard, KeyboardEvent::Leave { serial, surface }.into());
        }
    }

    fn send_modifiers_to(&mut self, keyboard: ObjectId) {
        let mods = self.seat.keyboard.modifiers;
        let serial = self.registry.next_serial();
        self.registry.send_event(
            keyboard,
            KeyboardEvent::Modifiers {
                serial,
                depressed: mods.depressed,
                latched: mods.latched,
                locked: mods.locked,
                group: mods.group,
            }
            .into(),
        );
    }

    // ========== Keys ==========

    pub fn keyboard_key(&mut self, event: &KeyEvent) {
        let Some(focus) = self.seat.keyboard.focus else {
            return;
        };
        let keyboards = self.seat.keyboard.resources.ids_for_client(focus.client);

        let indices = self.seat.keyboard.indices();
        let modifiers = ModifierState::from_host(event.modifiers, event.group, &indices);
        if modifiers != self.seat.keyboard.modifiers {
            self.seat.keyboard.modifiers = modifiers;
            for &keyboard in &keyboards {
                self.send_modifiers_to(keyboard);
            }
        }

        let key = self.config.keyboard.to_evdev(event.hardware_keycode);
        let state = if event.pressed {
            KeyState::Pressed
        } else {
            KeyState::Released
        };
        let serial = self.registry.next_serial();
        for keyboard in keyboards {
            self.registry.send_event(
                keyboard,
                KeyboardEvent::Key { serial, time: event.time, key, state }.into(),
            );
        }
    }

    /// Move focus off a surface that just unmapped
    pub(crate) fn keyboard_surface_unmapped(&mut self, surface: ObjectId) {
        if self.seat.keyboard.focus != Some(surface) {
            return;
        }
        self.keyboard_leave(surface);
        if self.host.has_focus() {
            if let Some(next) = self.topmost_mapped_surface().filter(|s| *s != surface) {
                self.keyboard_enter(next);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_mask_maps_through_indices() {
        let indices = ModifierIndices::default();
        let mods = ModifierState::from_host(HostModifiers::SHIFT | HostModifiers::CONTROL, 1, &indices);

        assert_eq!(mods.depressed, 0b101);
        assert_eq!(mods.latched, 0);
        assert_eq!(mods.locked, 0);
        assert_eq!(mods.group, 1);
    }

    #[test]
    fn caps_lock_is_reported_depressed() {
        let mods = ModifierState::from_host(HostModifiers::LOCK, 0, &ModifierIndices::default());
        assert_eq!(mods.depressed, 1 << 1);
        assert_eq!(mods.locked, 0);
    }

    #[test]
    fn invalid_indices_are_skipped() {
        let indices = ModifierIndices {
            super_: ModifierIndices::INVALID,
            ..ModifierIndices::default()
        };
        let mods = ModifierState::from_host(HostModifiers::MOD4 | HostModifiers::MOD1, 0, &indices);
        assert_eq!(mods.depressed, 1 << 3);
    }

    #[test]
    fn remapped_indices_follow_keymap() {
        let indices = ModifierIndices {
            alt: 12,
            ..ModifierIndices::default()
        };
        let mods = ModifierState::from_host(HostModifiers::MOD1, 0, &indices);
        assert_eq!(mods.depressed, 1 << 12);
    }
}
