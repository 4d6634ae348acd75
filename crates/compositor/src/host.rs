//! Contract with the host windowing toolkit
//!
//! The host owns the widget the clients are embedded into. It supplies
//! geometry and raw input, and performs every visual effect on the core's
//! behalf: redraws, auxiliary input/popup windows, pointer grabs, cursors.

use bitflags::bitflags;
use smithay::utils::{Logical, Point, Rectangle, Size};
use thiserror::Error;

use crate::region::Region;
use crate::surface::Buffer;

/// Handle to a host-side window (input-only child or popup overlay)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostWindow(pub u64);

/// Handle to a host input device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u32);

/// Host-side failures; never fatal to the protocol state machine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// Toolkit refused to create a window
    #[error("failed to create host window: {0}")]
    WindowCreation(String),

    /// Pointer grab was not granted
    #[error("pointer grab refused: {0}")]
    GrabRefused(String),
}

bitflags! {
    /// Host modifier mask, X11 layout
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct HostModifiers: u32 {
        const SHIFT = 1 << 0;
        const LOCK = 1 << 1;
        const CONTROL = 1 << 2;
        const MOD1 = 1 << 3;
        const MOD2 = 1 << 4;
        const MOD3 = 1 << 5;
        const MOD4 = 1 << 6;
        const MOD5 = 1 << 7;
    }
}

/// Why the pointer crossed a window boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossingMode {
    Normal,
    Grab,
    Ungrab,
}

/// Pointer entered or left a host window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossingEvent {
    pub window: HostWindow,
    pub mode: CrossingMode,
    pub time: u32,
    pub position: Point<f64, Logical>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEvent {
    pub window: HostWindow,
    pub time: u32,
    pub position: Point<f64, Logical>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    Press,
    /// Synthesized by the toolkit's click counting
    DoublePress,
    /// Synthesized by the toolkit's click counting
    TriplePress,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ButtonEvent {
    pub window: HostWindow,
    pub device: DeviceId,
    pub kind: ButtonKind,
    /// Toolkit button number (1 = left, 2 = middle, 3 = right, ...)
    pub button: u32,
    pub time: u32,
    pub position: Point<f64, Logical>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
    Smooth { dx: f64, dy: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollEvent {
    pub window: HostWindow,
    pub time: u32,
    pub direction: ScrollDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub pressed: bool,
    pub time: u32,
    pub hardware_keycode: u32,
    pub modifiers: HostModifiers,
    pub group: u32,
}

/// Raw event delivered by the host
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Motion(MotionEvent),
    Button(ButtonEvent),
    Scroll(ScrollEvent),
    Enter(CrossingEvent),
    Leave(CrossingEvent),
    Key(KeyEvent),
    FocusIn,
    FocusOut,
    SizeAllocate(Rectangle<i32, Logical>),
    StateFlagsChanged,
    ScaleChanged,
    Realize,
    Unrealize,
}

/// Host toolkit services used by the core
pub trait Host {
    /// Widget allocation relative to its toplevel
    fn allocation(&self) -> Rectangle<i32, Logical>;
    fn scale_factor(&self) -> i32;
    fn is_realized(&self) -> bool;
    /// Toplevel is not the active window
    fn is_backdrop(&self) -> bool;
    fn has_focus(&self) -> bool;
    fn grab_focus(&mut self);
    /// Timestamp passed to frame callbacks, in milliseconds
    fn frame_time(&self) -> u32;

    /// Redraw part of the widget, in the coordinate space of [`Host::allocation`]
    fn queue_draw(&mut self, damage: &Region);
    /// Redraw part of a popup window, in window coordinates
    fn queue_draw_window(&mut self, window: HostWindow, damage: &Region);

    /// Input-only window covering the widget
    fn create_event_window(&mut self, geometry: Rectangle<i32, Logical>) -> Result<HostWindow, HostError>;
    /// Input-only child of `parent` tracking a shell surface's size
    fn create_surface_window(&mut self, parent: HostWindow, size: Size<i32, Logical>) -> Result<HostWindow, HostError>;
    /// Override-redirect overlay, transient for `parent` when it has one
    fn create_popup_window(&mut self, parent: Option<HostWindow>) -> Result<HostWindow, HostError>;
    fn destroy_window(&mut self, window: HostWindow);
    fn move_window(&mut self, window: HostWindow, position: Point<i32, Logical>);
    fn resize_window(&mut self, window: HostWindow, size: Size<i32, Logical>);
    fn show_window(&mut self, window: HostWindow);
    fn hide_window(&mut self, window: HostWindow);
    /// Root-relative origin of `window`
    fn root_origin(&self, window: HostWindow) -> Point<i32, Logical>;

    /// Grab `device` to `window`, still delivering events to our own windows
    fn grab_pointer(&mut self, device: DeviceId, window: HostWindow, time: u32) -> Result<(), HostError>;
    fn ungrab_pointer(&mut self, device: DeviceId, time: u32);

    /// Show `image` as the pointer cursor over `window`
    fn set_cursor(&mut self, window: HostWindow, image: &Buffer, hotspot: Point<i32, Logical>, scale: i32);
}

/// Paint sink handed to [`Compositor::draw`](crate::state::Compositor::draw)
pub trait DrawTarget {
    /// Paint `buffer` at `position` in target coordinates
    fn paint(&mut self, buffer: &Buffer, scale: i32, position: Point<i32, Logical>);
}
