//! Request routing and resource teardown

use smithay::utils::{Point, Rectangle};

use super::Compositor;
use crate::host::Host;
use crate::protocol::{
    ClientId, CompositorRequest, Interface, KeyboardRequest, ObjectId, OutputRequest, PointerRequest,
    RegionRequest, Request, SeatRequest, SurfaceRequest, XdgPopupRequest, XdgShellRequest,
    XdgSurfaceRequest,
};
use crate::registry::ObjectRegistry;

impl<R: ObjectRegistry, H: Host> Compositor<R, H> {
    /// Handle one demarshaled client request
    pub fn handle_request(&mut self, request: Request) {
        match request {
            Request::Compositor(compositor, request) => match request {
                CompositorRequest::CreateSurface { id } => self.create_surface(compositor, id),
                CompositorRequest::CreateRegion { id } => self.create_region(compositor, id),
            },

            Request::Region(region, request) => match request {
                RegionRequest::Destroy => self.destroy_region(region),
                RegionRequest::Add { x, y, width, height } => {
                    self.region_add(region, Rectangle::new((x, y).into(), (width, height).into()))
                }
                RegionRequest::Subtract { x, y, width, height } => {
                    self.region_subtract(region, Rectangle::new((x, y).into(), (width, height).into()))
                }
            },

            Request::Surface(surface, request) => self.handle_surface_request(surface, request),

            Request::Seat(seat, request) => match request {
                SeatRequest::GetPointer { id } => self.get_pointer(seat, id),
                SeatRequest::GetKeyboard { id } => self.get_keyboard(seat, id),
                // Touch is never advertised
                SeatRequest::GetTouch { id } => {
                    tracing::debug!(%seat, id, "ignoring get_touch");
                }
            },

            Request::Pointer(pointer, request) => match request {
                PointerRequest::SetCursor { serial, surface, hotspot_x, hotspot_y } => {
                    self.set_cursor(pointer, serial, surface, Point::from((hotspot_x, hotspot_y)))
                }
                PointerRequest::Release => self.release_pointer(pointer),
            },

            Request::Keyboard(keyboard, KeyboardRequest::Release) => self.release_keyboard(keyboard),

            Request::Output(output, OutputRequest::Release) => self.release_output(output),

            Request::XdgShell(shell, request) => match request {
                XdgShellRequest::Destroy => self.destroy_xdg_shell(shell),
                XdgShellRequest::UseUnstableVersion { version } => self.use_unstable_version(shell, version),
                XdgShellRequest::GetXdgSurface { id, surface } => self.get_xdg_surface(shell, id, surface),
                XdgShellRequest::GetXdgPopup { id, surface, parent, seat: _, serial, x, y } => {
                    self.get_xdg_popup(shell, id, surface, parent, serial, x, y)
                }
                XdgShellRequest::Pong { serial } => {
                    tracing::trace!(%shell, serial = u32::from(serial), "pong");
                }
            },

            Request::XdgSurface(xdg_surface, request) => self.handle_xdg_surface_request(xdg_surface, request),

            Request::XdgPopup(popup, XdgPopupRequest::Destroy) => self.destroy_xdg_popup(popup),
        }
    }

    fn handle_surface_request(&mut self, surface: ObjectId, request: SurfaceRequest) {
        match request {
            SurfaceRequest::Destroy => self.destroy_surface(surface),
            SurfaceRequest::Attach { buffer, x: _, y: _ } => self.attach(surface, buffer),
            SurfaceRequest::Damage { x, y, width, height } => {
                self.damage(surface, Rectangle::new((x, y).into(), (width, height).into()))
            }
            SurfaceRequest::Frame { callback } => self.frame(surface, callback),
            SurfaceRequest::SetInputRegion { region } => self.set_input_region(surface, region),
            SurfaceRequest::Commit => self.commit(surface),
            SurfaceRequest::SetBufferScale { scale } => self.set_buffer_scale(surface, scale),
            // Everything is painted opaque and untransformed
            SurfaceRequest::SetOpaqueRegion { .. } | SurfaceRequest::SetBufferTransform { .. } => {
                tracing::debug!(%surface, ?request, "ignoring surface request");
            }
        }
    }

    fn handle_xdg_surface_request(&mut self, xdg_surface: ObjectId, request: XdgSurfaceRequest) {
        match request {
            XdgSurfaceRequest::Destroy => self.destroy_xdg_surface(xdg_surface),
            XdgSurfaceRequest::SetTitle { title } => self.set_title(xdg_surface, title),
            XdgSurfaceRequest::SetAppId { app_id } => self.set_app_id(xdg_surface, app_id),
            XdgSurfaceRequest::AckConfigure { serial } => self.ack_configure(xdg_surface, serial),
            // The embedded surface is always fullscreen in the widget
            request => {
                tracing::debug!(%xdg_surface, ?request, "ignoring xdg_surface request");
            }
        }
    }

    pub fn client_connected(&mut self, client: ClientId) {
        tracing::info!(%client, "client connected");
    }

    /// A resource died without a destroy request (client-side destructor
    /// races, `wl_buffer` destruction, ...)
    pub fn resource_destroyed(&mut self, object: ObjectId, interface: Interface) {
        match interface {
            Interface::WlCompositor => {
                self.compositor_resources.remove(object);
            }
            Interface::WlSurface => self.surface_destroyed(object),
            Interface::WlRegion => {
                self.regions.remove(&object);
            }
            Interface::WlCallback => self.callback_destroyed(object),
            Interface::WlBuffer => self.buffer_destroyed(object),
            Interface::WlSeat => {
                self.seat.resources.remove(object);
            }
            Interface::WlPointer => {
                self.seat.pointer.resources.remove(object);
            }
            Interface::WlKeyboard => {
                self.seat.keyboard.resources.remove(object);
            }
            Interface::WlOutput => {
                self.outputs.remove(object);
            }
            Interface::XdgShell => {
                self.shell.resources.remove(object);
            }
            Interface::XdgSurface => self.shell_surface_destroyed(object),
            Interface::XdgPopup => self.popup_destroyed(object),
        }
    }

    /// Drop everything a disconnected client owned
    ///
    /// Every destructor tolerates its peers being gone already, so the order
    /// here is arbitrary.
    pub fn client_disconnected(&mut self, client: ClientId) {
        let (shell_surfaces, popups) = self.shell.ids_for_client(client);
        for popup in popups {
            self.popup_destroyed(popup);
        }
        for shell_surface in shell_surfaces {
            self.shell_surface_destroyed(shell_surface);
        }

        let surfaces: Vec<ObjectId> = self.surfaces.keys().filter(|id| id.client == client).copied().collect();
        for surface in surfaces {
            self.surface_destroyed(surface);
        }

        self.regions.retain(|id, _| id.client != client);
        self.callbacks.retain(|id, _| id.client != client);

        self.compositor_resources.remove_client(client);
        self.outputs.remove_client(client);
        self.seat.resources.remove_client(client);
        self.seat.keyboard.resources.remove_client(client);
        self.shell.resources.remove_client(client);
        self.pointer_client_gone(client);

        tracing::info!(%client, "client disconnected");
    }
}
