//! Outbound protocol events

use std::sync::Arc;

use bitflags::bitflags;
use smithay::utils::Serial;

use super::{Fixed, ObjectId};

/// An event addressed to a single resource
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Callback(CallbackEvent),
    Buffer(BufferEvent),
    Surface(SurfaceEvent),
    Seat(SeatEvent),
    Pointer(PointerEvent),
    Keyboard(KeyboardEvent),
    Output(OutputEvent),
    XdgSurface(XdgSurfaceEvent),
    XdgPopup(XdgPopupEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackEvent {
    Done { time: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferEvent {
    Release,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Enter { output: ObjectId },
}

bitflags! {
    /// `wl_seat.capability`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SeatCapabilities: u32 {
        const POINTER = 1;
        const KEYBOARD = 2;
        const TOUCH = 4;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatEvent {
    Capabilities(SeatCapabilities),
    Name(String),
}

/// `wl_pointer.button_state`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Released = 0,
    Pressed = 1,
}

/// `wl_pointer.axis`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    VerticalScroll = 0,
    HorizontalScroll = 1,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointerEvent {
    Enter {
        serial: Serial,
        surface: ObjectId,
        x: Fixed,
        y: Fixed,
    },
    Leave {
        serial: Serial,
        surface: ObjectId,
    },
    Motion {
        time: u32,
        x: Fixed,
        y: Fixed,
    },
    Button {
        serial: Serial,
        time: u32,
        button: u32,
        state: ButtonState,
    },
    Axis {
        time: u32,
        axis: Axis,
        value: Fixed,
    },
}

/// `wl_keyboard.keymap_format`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeymapFormat {
    NoKeymap = 0,
    XkbV1 = 1,
}

/// `wl_keyboard.key_state`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Released = 0,
    Pressed = 1,
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyboardEvent {
    /// The runtime is responsible for moving `contents` into a sealed fd
    Keymap {
        format: KeymapFormat,
        contents: Arc<str>,
    },
    Enter {
        serial: Serial,
        surface: ObjectId,
        keys: Vec<u32>,
    },
    Leave {
        serial: Serial,
        surface: ObjectId,
    },
    Key {
        serial: Serial,
        time: u32,
        key: u32,
        state: KeyState,
    },
    Modifiers {
        serial: Serial,
        depressed: u32,
        latched: u32,
        locked: u32,
        group: u32,
    },
}

/// `wl_output.subpixel`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subpixel {
    Unknown = 0,
}

/// `wl_output.transform`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Normal = 0,
}

bitflags! {
    /// `wl_output.mode`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OutputModeFlags: u32 {
        const CURRENT = 1;
        const PREFERRED = 2;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Geometry {
        x: i32,
        y: i32,
        physical_width: i32,
        physical_height: i32,
        subpixel: Subpixel,
        make: String,
        model: String,
        transform: Transform,
    },
    Mode {
        flags: OutputModeFlags,
        width: i32,
        height: i32,
        refresh: i32,
    },
    Scale(i32),
    Done,
}

/// `xdg_surface.state` (unstable v5 numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToplevelState {
    Maximized = 1,
    Fullscreen = 2,
    Resizing = 3,
    Activated = 4,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XdgSurfaceEvent {
    Configure {
        width: i32,
        height: i32,
        states: Vec<ToplevelState>,
        serial: Serial,
    },
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XdgPopupEvent {
    PopupDone,
}

macro_rules! event_from {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Event {
                fn from(event: $ty) -> Self {
                    Event::$variant(event)
                }
            }
        )*
    };
}

event_from! {
    Callback => CallbackEvent,
    Buffer => BufferEvent,
    Surface => SurfaceEvent,
    Seat => SeatEvent,
    Pointer => PointerEvent,
    Keyboard => KeyboardEvent,
    Output => OutputEvent,
    XdgSurface => XdgSurfaceEvent,
    XdgPopup => XdgPopupEvent,
}
