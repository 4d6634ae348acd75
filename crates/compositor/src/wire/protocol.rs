//! Server bindings for `xdg-shell-unstable-v5`
//!
//! wayland-protocols no longer ships the unstable v5 revision, so the
//! bindings are generated from the copy under `protocols/`.

pub use generated::{xdg_popup, xdg_shell, xdg_surface};

#[allow(non_snake_case, non_upper_case_globals, non_camel_case_types, missing_docs)]
mod generated {
    use smithay::reexports::wayland_server::{self, protocol::*};

    pub mod __interfaces {
        use smithay::reexports::wayland_server::protocol::__interfaces::*;
        use wayland_backend;
        wayland_scanner::generate_interfaces!("protocols/xdg-shell-unstable-v5.xml");
    }
    use self::__interfaces::*;

    wayland_scanner::generate_server_code!("protocols/xdg-shell-unstable-v5.xml");
}
