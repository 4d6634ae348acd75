//! Request decoding for the wire runtime
//!
//! Each `Dispatch` impl resolves object arguments to [`ObjectId`]s, parks
//! `new_id` resources with the registry and hands the decoded [`Request`]
//! to [`Compositor::handle_request`]. Resources the client tears down
//! without a destructor request reach the core through `destroyed`.

use smithay::delegate_shm;
use smithay::reexports::wayland_server::backend;
use smithay::reexports::wayland_server::protocol::{
    wl_buffer::WlBuffer, wl_callback::WlCallback, wl_compositor, wl_compositor::WlCompositor, wl_keyboard,
    wl_keyboard::WlKeyboard, wl_output, wl_output::WlOutput, wl_pointer, wl_pointer::WlPointer, wl_region,
    wl_region::WlRegion, wl_seat, wl_seat::WlSeat, wl_surface, wl_surface::WlSurface, wl_touch, wl_touch::WlTouch,
};
use smithay::reexports::wayland_server::{Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource, WEnum};
use smithay::wayland::buffer::BufferHandler;
use smithay::wayland::shm::{self as smithay_shm, ShmHandler, ShmState};

use super::protocol::{xdg_popup, xdg_popup::XdgPopup, xdg_shell, xdg_shell::XdgShell, xdg_surface, xdg_surface::XdgSurface};
use super::{shm_buffer, WireCompositor, WireObject};
use crate::host::Host;
use crate::protocol::{
    CompositorRequest, Global, Interface, KeyboardRequest, ObjectId, OutputRequest, PointerRequest, RegionRequest,
    Request, SeatRequest, SurfaceRequest, XdgPopupRequest, XdgShellRequest, XdgSurfaceRequest,
};
use crate::state::Compositor;
use crate::surface::Buffer;

impl<H: Host + 'static> WireCompositor<H> {
    /// Park `new` with the registry and return the id the client allocated
    fn stage<I>(
        &mut self,
        client: &Client,
        data_init: &mut DataInit<'_, Self>,
        new: New<I>,
        wrap: fn(I) -> WireObject,
    ) -> Option<u32>
    where
        I: Resource + 'static,
        Self: Dispatch<I, ()>,
    {
        let resource = data_init.init(new, ());
        let id = self.registry.object_id(client, &resource)?;
        self.registry.stage(id, wrap(resource));
        Some(id.protocol_id)
    }

    fn object_id(&self, client: &Client, resource: &impl Resource) -> Option<ObjectId> {
        self.registry.object_id(client, resource)
    }

    /// Describe an attached `wl_buffer` and start tracking it for release
    fn attached_buffer(&mut self, client: &Client, buffer: WlBuffer) -> Option<Buffer> {
        let id = self.object_id(client, &buffer)?;
        let shm = smithay_shm::with_buffer_contents(&buffer, |_, _, data| {
            shm_buffer(data.format, data.width, data.height, data.stride)
        })
        .ok();
        self.registry.track(id, WireObject::Buffer(buffer));
        Some(Buffer { id, shm })
    }

    fn bind_global<I>(
        &mut self,
        client: &Client,
        data_init: &mut DataInit<'_, Self>,
        resource: New<I>,
        global: Global,
        wrap: fn(I) -> WireObject,
    ) where
        I: Resource + 'static,
        Self: Dispatch<I, ()>,
    {
        let resource = data_init.init(resource, ());
        let version = resource.version();
        let Some(id) = self.registry.object_id(client, &resource) else {
            tracing::warn!(interface = %global.interface(), "bind from a client the registry does not know");
            return;
        };
        self.registry.stage(id, wrap(resource));
        self.bind(id.client, global, version, id.protocol_id);
    }

    /// A resource died on the wire; tell the core unless it already let go
    fn wire_destroyed(&mut self, client: &backend::ClientId, resource: &impl Resource, interface: Interface) {
        let Some(client) = self.registry.client_id(client) else {
            return;
        };
        let id = ObjectId::new(client, resource.id().protocol_id());
        if self.registry.forget(id) {
            self.resource_destroyed(id, interface);
        }
    }
}

macro_rules! global_dispatch {
    ($interface:ty, $global:expr, $variant:ident) => {
        impl<H: Host + 'static> GlobalDispatch<$interface, ()> for Compositor<super::WireRegistry<H>, H> {
            fn bind(
                state: &mut Self,
                _handle: &DisplayHandle,
                client: &Client,
                resource: New<$interface>,
                _global_data: &(),
                data_init: &mut DataInit<'_, Self>,
            ) {
                state.bind_global(client, data_init, resource, $global, WireObject::$variant);
            }
        }
    };
}

global_dispatch!(WlCompositor, Global::Compositor, Compositor);
global_dispatch!(XdgShell, Global::XdgShell, XdgShell);
global_dispatch!(WlSeat, Global::Seat, Seat);
global_dispatch!(WlOutput, Global::Output, Output);

/// `destroyed` forwarding shared by every interface the core tracks
macro_rules! forward_destroyed {
    ($interface:ty, $core:expr) => {
        fn destroyed(state: &mut Self, client: backend::ClientId, resource: &$interface, _data: &()) {
            state.wire_destroyed(&client, resource, $core);
        }
    };
}

impl<H: Host + 'static> Dispatch<WlCompositor, ()> for Compositor<super::WireRegistry<H>, H> {
    fn request(
        state: &mut Self,
        client: &Client,
        resource: &WlCompositor,
        request: wl_compositor::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        let Some(target) = state.object_id(client, resource) else {
            return;
        };
        let request = match request {
            wl_compositor::Request::CreateSurface { id } => {
                let Some(id) = state.stage(client, data_init, id, WireObject::Surface) else {
                    return;
                };
                CompositorRequest::CreateSurface { id }
            }
            wl_compositor::Request::CreateRegion { id } => {
                let Some(id) = state.stage(client, data_init, id, WireObject::Region) else {
                    return;
                };
                CompositorRequest::CreateRegion { id }
            }
            _ => return,
        };
        state.handle_request(Request::Compositor(target, request));
    }

    forward_destroyed!(WlCompositor, Interface::WlCompositor);
}

impl<H: Host + 'static> Dispatch<WlSurface, ()> for Compositor<super::WireRegistry<H>, H> {
    fn request(
        state: &mut Self,
        client: &Client,
        resource: &WlSurface,
        request: wl_surface::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        let Some(target) = state.object_id(client, resource) else {
            return;
        };
        let request = match request {
            wl_surface::Request::Destroy => SurfaceRequest::Destroy,
            wl_surface::Request::Attach { buffer, x, y } => {
                let buffer = buffer.and_then(|buffer| state.attached_buffer(client, buffer));
                SurfaceRequest::Attach { buffer, x, y }
            }
            wl_surface::Request::Damage { x, y, width, height } => SurfaceRequest::Damage { x, y, width, height },
            wl_surface::Request::Frame { callback } => {
                let Some(callback) = state.stage(client, data_init, callback, WireObject::Callback) else {
                    return;
                };
                SurfaceRequest::Frame { callback }
            }
            wl_surface::Request::SetOpaqueRegion { region } => SurfaceRequest::SetOpaqueRegion {
                region: region.and_then(|r| state.object_id(client, &r)),
            },
            wl_surface::Request::SetInputRegion { region } => SurfaceRequest::SetInputRegion {
                region: region.and_then(|r| state.object_id(client, &r)),
            },
            wl_surface::Request::Commit => SurfaceRequest::Commit,
            wl_surface::Request::SetBufferTransform { transform } => {
                let transform = match transform {
                    WEnum::Value(transform) => u32::from(transform),
                    WEnum::Unknown(raw) => raw,
                };
                SurfaceRequest::SetBufferTransform { transform: transform as i32 }
            }
            wl_surface::Request::SetBufferScale { scale } => SurfaceRequest::SetBufferScale { scale },
            _ => return,
        };
        state.handle_request(Request::Surface(target, request));
    }

    forward_destroyed!(WlSurface, Interface::WlSurface);
}

impl<H: Host + 'static> Dispatch<WlRegion, ()> for Compositor<super::WireRegistry<H>, H> {
    fn request(
        state: &mut Self,
        client: &Client,
        resource: &WlRegion,
        request: wl_region::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        let Some(target) = state.object_id(client, resource) else {
            return;
        };
        let request = match request {
            wl_region::Request::Destroy => RegionRequest::Destroy,
            wl_region::Request::Add { x, y, width, height } => RegionRequest::Add { x, y, width, height },
            wl_region::Request::Subtract { x, y, width, height } => RegionRequest::Subtract { x, y, width, height },
            _ => return,
        };
        state.handle_request(Request::Region(target, request));
    }

    forward_destroyed!(WlRegion, Interface::WlRegion);
}

impl<H: Host + 'static> Dispatch<WlCallback, ()> for Compositor<super::WireRegistry<H>, H> {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &WlCallback,
        _request: <WlCallback as Resource>::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }

    forward_destroyed!(WlCallback, Interface::WlCallback);
}

impl<H: Host + 'static> Dispatch<WlSeat, ()> for Compositor<super::WireRegistry<H>, H> {
    fn request(
        state: &mut Self,
        client: &Client,
        resource: &WlSeat,
        request: wl_seat::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        let Some(target) = state.object_id(client, resource) else {
            return;
        };
        let request = match request {
            wl_seat::Request::GetPointer { id } => {
                let Some(id) = state.stage(client, data_init, id, WireObject::Pointer) else {
                    return;
                };
                SeatRequest::GetPointer { id }
            }
            wl_seat::Request::GetKeyboard { id } => {
                let Some(id) = state.stage(client, data_init, id, WireObject::Keyboard) else {
                    return;
                };
                SeatRequest::GetKeyboard { id }
            }
            // Never advertised; the object stays inert
            wl_seat::Request::GetTouch { id } => {
                let touch = data_init.init(id, ());
                SeatRequest::GetTouch { id: touch.id().protocol_id() }
            }
            _ => return,
        };
        state.handle_request(Request::Seat(target, request));
    }

    forward_destroyed!(WlSeat, Interface::WlSeat);
}

impl<H: Host + 'static> Dispatch<WlPointer, ()> for Compositor<super::WireRegistry<H>, H> {
    fn request(
        state: &mut Self,
        client: &Client,
        resource: &WlPointer,
        request: wl_pointer::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        let Some(target) = state.object_id(client, resource) else {
            return;
        };
        let request = match request {
            wl_pointer::Request::SetCursor { serial, surface, hotspot_x, hotspot_y } => PointerRequest::SetCursor {
                serial: serial.into(),
                surface: surface.and_then(|s| state.object_id(client, &s)),
                hotspot_x,
                hotspot_y,
            },
            wl_pointer::Request::Release => PointerRequest::Release,
            _ => return,
        };
        state.handle_request(Request::Pointer(target, request));
    }

    forward_destroyed!(WlPointer, Interface::WlPointer);
}

impl<H: Host + 'static> Dispatch<WlKeyboard, ()> for Compositor<super::WireRegistry<H>, H> {
    fn request(
        state: &mut Self,
        client: &Client,
        resource: &WlKeyboard,
        request: wl_keyboard::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        let Some(target) = state.object_id(client, resource) else {
            return;
        };
        if let wl_keyboard::Request::Release = request {
            state.handle_request(Request::Keyboard(target, KeyboardRequest::Release));
        }
    }

    forward_destroyed!(WlKeyboard, Interface::WlKeyboard);
}

impl<H: Host + 'static> Dispatch<WlTouch, ()> for Compositor<super::WireRegistry<H>, H> {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &WlTouch,
        _request: wl_touch::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }
}

impl<H: Host + 'static> Dispatch<WlOutput, ()> for Compositor<super::WireRegistry<H>, H> {
    fn request(
        state: &mut Self,
        client: &Client,
        resource: &WlOutput,
        request: wl_output::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        let Some(target) = state.object_id(client, resource) else {
            return;
        };
        if let wl_output::Request::Release = request {
            state.handle_request(Request::Output(target, OutputRequest::Release));
        }
    }

    forward_destroyed!(WlOutput, Interface::WlOutput);
}

impl<H: Host + 'static> Dispatch<XdgShell, ()> for Compositor<super::WireRegistry<H>, H> {
    fn request(
        state: &mut Self,
        client: &Client,
        resource: &XdgShell,
        request: xdg_shell::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        let Some(target) = state.object_id(client, resource) else {
            return;
        };
        let request = match request {
            xdg_shell::Request::Destroy => XdgShellRequest::Destroy,
            xdg_shell::Request::UseUnstableVersion { version } => XdgShellRequest::UseUnstableVersion { version },
            xdg_shell::Request::GetXdgSurface { id, surface } => {
                let Some(id) = state.stage(client, data_init, id, WireObject::XdgSurface) else {
                    return;
                };
                XdgShellRequest::GetXdgSurface { id, surface: state.object_id(client, &surface) }
            }
            xdg_shell::Request::GetXdgPopup { id, surface, parent, seat, serial, x, y } => {
                let Some(id) = state.stage(client, data_init, id, WireObject::XdgPopup) else {
                    return;
                };
                let Some(seat) = state.object_id(client, &seat) else {
                    return;
                };
                XdgShellRequest::GetXdgPopup {
                    id,
                    surface: state.object_id(client, &surface),
                    parent: state.object_id(client, &parent),
                    seat,
                    serial: serial.into(),
                    x,
                    y,
                }
            }
            xdg_shell::Request::Pong { serial } => XdgShellRequest::Pong { serial: serial.into() },
            _ => return,
        };
        state.handle_request(Request::XdgShell(target, request));
    }

    forward_destroyed!(XdgShell, Interface::XdgShell);
}

impl<H: Host + 'static> Dispatch<XdgSurface, ()> for Compositor<super::WireRegistry<H>, H> {
    fn request(
        state: &mut Self,
        client: &Client,
        resource: &XdgSurface,
        request: xdg_surface::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        let Some(target) = state.object_id(client, resource) else {
            return;
        };
        let Some(request) = decode_xdg_surface(state, client, request) else {
            return;
        };
        state.handle_request(Request::XdgSurface(target, request));
    }

    forward_destroyed!(XdgSurface, Interface::XdgSurface);
}

fn decode_xdg_surface<H: Host + 'static>(
    state: &WireCompositor<H>,
    client: &Client,
    request: xdg_surface::Request,
) -> Option<XdgSurfaceRequest> {
    let request = match request {
        xdg_surface::Request::Destroy => XdgSurfaceRequest::Destroy,
        xdg_surface::Request::SetParent { parent } => XdgSurfaceRequest::SetParent {
            parent: parent.and_then(|p| state.object_id(client, &p)),
        },
        xdg_surface::Request::SetTitle { title } => XdgSurfaceRequest::SetTitle { title },
        xdg_surface::Request::SetAppId { app_id } => XdgSurfaceRequest::SetAppId { app_id },
        xdg_surface::Request::ShowWindowMenu { seat, serial, x, y } => XdgSurfaceRequest::ShowWindowMenu {
            seat: state.object_id(client, &seat)?,
            serial: serial.into(),
            x,
            y,
        },
        xdg_surface::Request::Move { seat, serial } => XdgSurfaceRequest::Move {
            seat: state.object_id(client, &seat)?,
            serial: serial.into(),
        },
        xdg_surface::Request::Resize { seat, serial, edges } => XdgSurfaceRequest::Resize {
            seat: state.object_id(client, &seat)?,
            serial: serial.into(),
            edges,
        },
        xdg_surface::Request::AckConfigure { serial } => XdgSurfaceRequest::AckConfigure { serial: serial.into() },
        xdg_surface::Request::SetWindowGeometry { x, y, width, height } => {
            XdgSurfaceRequest::SetWindowGeometry { x, y, width, height }
        }
        xdg_surface::Request::SetMaximized => XdgSurfaceRequest::SetMaximized,
        xdg_surface::Request::UnsetMaximized => XdgSurfaceRequest::UnsetMaximized,
        xdg_surface::Request::SetFullscreen { output } => XdgSurfaceRequest::SetFullscreen {
            output: output.and_then(|o| state.object_id(client, &o)),
        },
        xdg_surface::Request::UnsetFullscreen => XdgSurfaceRequest::UnsetFullscreen,
        xdg_surface::Request::SetMinimized => XdgSurfaceRequest::SetMinimized,
        _ => return None,
    };
    Some(request)
}

impl<H: Host + 'static> Dispatch<XdgPopup, ()> for Compositor<super::WireRegistry<H>, H> {
    fn request(
        state: &mut Self,
        client: &Client,
        resource: &XdgPopup,
        request: xdg_popup::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        let Some(target) = state.object_id(client, resource) else {
            return;
        };
        if let xdg_popup::Request::Destroy = request {
            state.handle_request(Request::XdgPopup(target, XdgPopupRequest::Destroy));
        }
    }

    forward_destroyed!(XdgPopup, Interface::XdgPopup);
}

// ========== Shared memory ==========

impl<H: Host + 'static> BufferHandler for Compositor<super::WireRegistry<H>, H> {
    fn buffer_destroyed(&mut self, buffer: &WlBuffer) {
        let Some(client) = buffer.client() else {
            return;
        };
        let Some(id) = self.object_id(&client, buffer) else {
            return;
        };
        if self.registry.forget(id) {
            self.buffer_destroyed(id);
        }
    }
}

impl<H: Host + 'static> ShmHandler for Compositor<super::WireRegistry<H>, H> {
    fn shm_state(&self) -> &ShmState {
        &self.registry.shm
    }
}

delegate_shm!(@<H: Host + 'static> Compositor<super::WireRegistry<H>, H>);
