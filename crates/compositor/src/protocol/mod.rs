//! Protocol vocabulary shared by the engines and the wire runtime
//!
//! The runtime decodes client messages into [`Request`] values and hands them
//! to [`Compositor::handle_request`](crate::state::Compositor::handle_request).
//! Everything the core has to tell a client leaves as an [`Event`] through the
//! [`ObjectRegistry`](crate::registry::ObjectRegistry).

mod event;
mod request;

use std::fmt;

pub use event::*;
pub use request::*;

/// `wl_compositor` global version
pub const WL_COMPOSITOR_VERSION: u32 = 3;

/// `wl_seat` global version
pub const WL_SEAT_VERSION: u32 = 4;

/// `wl_output` global version
pub const WL_OUTPUT_VERSION: u32 = 2;

/// `xdg_shell` global version
pub const XDG_SHELL_VERSION: u32 = 1;

/// `wl_callback` resource version
pub const WL_CALLBACK_VERSION: u32 = 1;

/// Opaque connection handle owned by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u32);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// A protocol object: the owning client plus the id the client allocated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    pub client: ClientId,
    pub protocol_id: u32,
}

impl ObjectId {
    pub fn new(client: ClientId, protocol_id: u32) -> Self {
        Self { client, protocol_id }
    }

    /// The client this object belongs to
    pub fn client(self) -> ClientId {
        self.client
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.client, self.protocol_id)
    }
}

/// Interfaces the core creates resources for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interface {
    WlCompositor,
    WlSurface,
    WlRegion,
    WlCallback,
    WlBuffer,
    WlSeat,
    WlPointer,
    WlKeyboard,
    WlOutput,
    XdgShell,
    XdgSurface,
    XdgPopup,
}

impl Interface {
    /// Wire name of the interface
    pub fn name(self) -> &'static str {
        match self {
            Interface::WlCompositor => "wl_compositor",
            Interface::WlSurface => "wl_surface",
            Interface::WlRegion => "wl_region",
            Interface::WlCallback => "wl_callback",
            Interface::WlBuffer => "wl_buffer",
            Interface::WlSeat => "wl_seat",
            Interface::WlPointer => "wl_pointer",
            Interface::WlKeyboard => "wl_keyboard",
            Interface::WlOutput => "wl_output",
            Interface::XdgShell => "xdg_shell",
            Interface::XdgSurface => "xdg_surface",
            Interface::XdgPopup => "xdg_popup",
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Globals advertised to every client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Global {
    Compositor,
    Seat,
    Output,
    XdgShell,
}

impl Global {
    pub const ALL: [Global; 4] = [Global::Compositor, Global::XdgShell, Global::Seat, Global::Output];

    pub fn interface(self) -> Interface {
        match self {
            Global::Compositor => Interface::WlCompositor,
            Global::Seat => Interface::WlSeat,
            Global::Output => Interface::WlOutput,
            Global::XdgShell => Interface::XdgShell,
        }
    }

    /// Highest version the core implements
    pub fn version(self) -> u32 {
        match self {
            Global::Compositor => WL_COMPOSITOR_VERSION,
            Global::Seat => WL_SEAT_VERSION,
            Global::Output => WL_OUTPUT_VERSION,
            Global::XdgShell => XDG_SHELL_VERSION,
        }
    }
}

/// `wl_fixed_t`: signed 24.8 fixed point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(i32);

impl Fixed {
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn from_int(value: i32) -> Self {
        Self(value.saturating_mul(256))
    }

    pub fn from_f64(value: f64) -> Self {
        // `as` saturates, so out-of-range deltas clamp instead of wrapping
        Self((value * 256.0).round() as i32)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / 256.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_from_int_scales_by_256() {
        assert_eq!(Fixed::from_int(10).raw(), 2560);
        assert_eq!(Fixed::from_int(-10).raw(), -2560);
    }

    #[test]
    fn fixed_from_f64_rounds_to_nearest() {
        assert_eq!(Fixed::from_f64(1.5).raw(), 384);
        assert_eq!(Fixed::from_f64(0.001).raw(), 0);
        assert_eq!(Fixed::from_f64(-2.25).to_f64(), -2.25);
    }

    #[test]
    fn fixed_saturates_on_overflow() {
        assert_eq!(Fixed::from_int(i32::MAX).raw(), i32::MAX);
        assert_eq!(Fixed::from_f64(1e12).raw(), i32::MAX);
    }

    #[test]
    fn object_id_display_names_client() {
        let id = ObjectId::new(ClientId(3), 12);
        assert_eq!(id.to_string(), "client#3@12");
        assert_eq!(id.client(), ClientId(3));
    }
}
