//! nestway: embeddable Wayland protocol core
//!
//! This library holds the protocol state machine of a nested compositor:
//! surface buffer/damage lifecycle, seat focus and grab arbitration, and the
//! `xdg-shell` role and popup stacking rules. Wire marshaling is supplied by
//! an [`registry::ObjectRegistry`] implementation and everything visual is
//! delegated to a [`host::Host`] implementation.
//!
//! With the `wire` feature, [`wire`] serves the core to real clients over
//! smithay's `wayland-server`.

pub mod config;
pub mod error;
pub mod host;
pub mod protocol;
pub mod region;
pub mod registry;
pub mod runtime;
pub mod state;
pub mod surface;
#[cfg(feature = "wire")]
pub mod wire;

pub use config::Config;
pub use error::{ProtocolError, ResourceError, RoleError};
pub use state::Compositor;
