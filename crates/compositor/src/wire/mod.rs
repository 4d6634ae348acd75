//! Wayland wire runtime over smithay's frontend
//!
//! [`WireRegistry`] implements [`ObjectRegistry`] on top of
//! `wayland-server`: requests are decoded by the `Dispatch` impls in
//! `dispatch.rs` into [`Request`](crate::protocol::Request) values and the
//! core's [`Event`] values are encoded back onto the typed resources.
//!
//! `wayland-server` wants every `new_id` initialized while the request is
//! being dispatched, before the core has decided anything. Those resources
//! are parked as pending until the core claims them through
//! [`ObjectRegistry::create_resource`]; unclaimed ones die with their client.
//!
//! # Embedding
//!
//! ```ignore
//! let mut event_loop = CompositorLoop::new()?;
//! let display = Display::<WireCompositor<MyHost>>::new()?;
//! let registry = WireRegistry::new(&display.handle(), event_loop.sender());
//! let mut compositor = Compositor::new(registry, host, Config::load());
//! wire::insert_display(&event_loop, display)?;
//! let socket = wire::listen(&event_loop)?;
//! loop {
//!     event_loop.dispatch(&mut compositor, None)?;
//! }
//! ```

mod dispatch;
pub mod protocol;

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::os::fd::{AsFd, OwnedFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use calloop::channel::Sender;
use calloop::generic::Generic;
use calloop::{Interest, Mode, PostAction};
use rustix::fs::{MemfdFlags, SealFlags};
use smithay::reexports::wayland_server::backend::{self, ClientData, DisconnectReason, GlobalId};
use smithay::reexports::wayland_server::protocol::{
    wl_buffer::WlBuffer, wl_callback::WlCallback, wl_compositor::WlCompositor, wl_keyboard, wl_keyboard::WlKeyboard,
    wl_output, wl_output::WlOutput, wl_pointer, wl_pointer::WlPointer, wl_region::WlRegion, wl_seat,
    wl_seat::WlSeat, wl_shm, wl_surface::WlSurface,
};
use smithay::reexports::wayland_server::{Client, DisplayHandle, Resource};
use smithay::utils::{Serial, SERIAL_COUNTER};
use smithay::wayland::shm::{self as smithay_shm, ShmState};
use smithay::wayland::socket::ListeningSocketSource;

use self::protocol::{xdg_popup::XdgPopup, xdg_shell::XdgShell, xdg_surface::XdgSurface};
use crate::error::{ProtocolError, ResourceError};
use crate::host::Host;
use crate::protocol::{
    Axis, ButtonState, CallbackEvent, ClientId, Event, Global, Interface, KeyState, KeyboardEvent, KeymapFormat,
    ObjectId, OutputEvent, PointerEvent, SeatEvent, SurfaceEvent, XdgPopupEvent, XdgSurfaceEvent,
};
use crate::registry::ObjectRegistry;
use crate::runtime::{CompositorLoop, LoopMessage};
use crate::state::Compositor;
use crate::surface::{ShmBuffer, ShmFormat};

pub use smithay::reexports::wayland_server::Display;

/// The core served over the wire
pub type WireCompositor<H> = Compositor<WireRegistry<H>, H>;

/// `wl_display.error.no_memory`
const DISPLAY_NO_MEMORY: u32 = 2;

/// A live `wayland-server` resource the core knows by [`ObjectId`]
#[derive(Debug, Clone)]
pub(crate) enum WireObject {
    Compositor(WlCompositor),
    Surface(WlSurface),
    Region(WlRegion),
    Callback(WlCallback),
    Buffer(WlBuffer),
    Seat(WlSeat),
    Pointer(WlPointer),
    Keyboard(WlKeyboard),
    Output(WlOutput),
    XdgShell(XdgShell),
    XdgSurface(XdgSurface),
    XdgPopup(XdgPopup),
}

macro_rules! each_object {
    ($object:expr, $resource:ident => $body:expr) => {
        match $object {
            WireObject::Compositor($resource) => $body,
            WireObject::Surface($resource) => $body,
            WireObject::Region($resource) => $body,
            WireObject::Callback($resource) => $body,
            WireObject::Buffer($resource) => $body,
            WireObject::Seat($resource) => $body,
            WireObject::Pointer($resource) => $body,
            WireObject::Keyboard($resource) => $body,
            WireObject::Output($resource) => $body,
            WireObject::XdgShell($resource) => $body,
            WireObject::XdgSurface($resource) => $body,
            WireObject::XdgPopup($resource) => $body,
        }
    };
}

impl WireObject {
    pub(crate) fn interface(&self) -> Interface {
        match self {
            WireObject::Compositor(_) => Interface::WlCompositor,
            WireObject::Surface(_) => Interface::WlSurface,
            WireObject::Region(_) => Interface::WlRegion,
            WireObject::Callback(_) => Interface::WlCallback,
            WireObject::Buffer(_) => Interface::WlBuffer,
            WireObject::Seat(_) => Interface::WlSeat,
            WireObject::Pointer(_) => Interface::WlPointer,
            WireObject::Keyboard(_) => Interface::WlKeyboard,
            WireObject::Output(_) => Interface::WlOutput,
            WireObject::XdgShell(_) => Interface::XdgShell,
            WireObject::XdgSurface(_) => Interface::XdgSurface,
            WireObject::XdgPopup(_) => Interface::XdgPopup,
        }
    }

    fn is_alive(&self) -> bool {
        each_object!(self, r => r.is_alive())
    }

    fn version(&self) -> u32 {
        each_object!(self, r => r.version())
    }

    fn post_error(&self, code: u32, message: String) {
        each_object!(self, r => r.post_error(code, message))
    }
}

/// Per-connection data handed to `wayland-server`
pub struct WireClient {
    id: ClientId,
    gone: AtomicBool,
    sender: Mutex<Sender<LoopMessage>>,
}

impl WireClient {
    pub fn id(&self) -> ClientId {
        self.id
    }
}

impl ClientData for WireClient {
    fn initialized(&self, _client_id: backend::ClientId) {}

    fn disconnected(&self, _client_id: backend::ClientId, reason: DisconnectReason) {
        tracing::debug!(client = %self.id, ?reason, "wire client disconnected");
        self.gone.store(true, Ordering::Release);
        let sender = match self.sender.lock() {
            Ok(sender) => sender,
            Err(poisoned) => poisoned.into_inner(),
        };
        if sender.send(LoopMessage::ClientDisconnected(self.id)).is_err() {
            tracing::warn!(client = %self.id, "compositor loop gone, disconnect dropped");
        }
    }
}

/// [`ObjectRegistry`] backed by a `wayland-server` display
pub struct WireRegistry<H> {
    display: DisplayHandle,
    sender: Sender<LoopMessage>,
    pub(crate) shm: ShmState,

    clients: HashMap<ClientId, Client>,
    client_ids: HashMap<backend::ClientId, ClientId>,
    next_client: u32,

    objects: HashMap<ObjectId, WireObject>,
    pending: HashMap<ObjectId, WireObject>,
    globals: Vec<GlobalId>,

    _host: PhantomData<fn() -> H>,
}

impl<H: Host + 'static> WireRegistry<H> {
    /// Registry for `display`; disconnects are reported through `sender`
    pub fn new(display: &DisplayHandle, sender: Sender<LoopMessage>) -> Self {
        let shm = ShmState::new::<WireCompositor<H>>(display, Vec::new());
        Self {
            display: display.clone(),
            sender,
            shm,
            clients: HashMap::new(),
            client_ids: HashMap::new(),
            next_client: 1,
            objects: HashMap::new(),
            pending: HashMap::new(),
            globals: Vec::new(),
            _host: PhantomData,
        }
    }

    /// Hand a connected socket to the display
    pub fn insert_client(&mut self, stream: UnixStream) -> io::Result<ClientId> {
        let id = ClientId(self.next_client);
        self.next_client += 1;
        let data = WireClient {
            id,
            gone: AtomicBool::new(false),
            sender: Mutex::new(self.sender.clone()),
        };
        let client = self.display.insert_client(stream, Arc::new(data))?;
        self.client_ids.insert(client.id(), id);
        self.clients.insert(id, client);
        Ok(id)
    }

    pub fn display_handle(&self) -> &DisplayHandle {
        &self.display
    }

    pub fn global_count(&self) -> usize {
        self.globals.len()
    }

    /// Our id for a `wayland-server` client
    pub(crate) fn client_id(&self, client: &backend::ClientId) -> Option<ClientId> {
        self.client_ids.get(client).copied()
    }

    pub(crate) fn object_id(&self, client: &Client, resource: &impl Resource) -> Option<ObjectId> {
        let client = self.client_id(&client.id())?;
        Some(ObjectId::new(client, resource.id().protocol_id()))
    }

    /// Park a freshly initialized resource until the core claims it
    pub(crate) fn stage(&mut self, id: ObjectId, object: WireObject) {
        self.pending.insert(id, object);
    }

    /// Track a resource the core never creates itself (`wl_buffer`)
    pub(crate) fn track(&mut self, id: ObjectId, object: WireObject) {
        self.objects.insert(id, object);
    }

    /// Forget a resource the client destroyed; returns whether the core still knew it
    pub(crate) fn forget(&mut self, id: ObjectId) -> bool {
        self.pending.remove(&id);
        self.objects.remove(&id).is_some()
    }

    pub(crate) fn surface(&self, id: ObjectId) -> Option<&WlSurface> {
        match self.objects.get(&id)? {
            WireObject::Surface(surface) => Some(surface),
            _ => None,
        }
    }

    fn output(&self, id: ObjectId) -> Option<&WlOutput> {
        match self.objects.get(&id)? {
            WireObject::Output(output) => Some(output),
            _ => None,
        }
    }

    pub fn buffer(&self, id: ObjectId) -> Option<&WlBuffer> {
        match self.objects.get(&id)? {
            WireObject::Buffer(buffer) => Some(buffer),
            _ => None,
        }
    }

    /// Run `f` over the pixels of a shared-memory buffer
    ///
    /// The slice starts at the buffer's first row and spans `stride * height`
    /// bytes. Returns `None` for unknown or non-shm buffers.
    pub fn with_shm_pixels<T>(&self, buffer: ObjectId, f: impl FnOnce(&[u8], ShmBuffer) -> T) -> Option<T> {
        let buffer = self.buffer(buffer)?;
        let result = smithay_shm::with_buffer_contents(buffer, |ptr, len, data| {
            let offset = usize::try_from(data.offset).ok()?;
            let size = usize::try_from(data.stride).ok()? * usize::try_from(data.height).ok()?;
            if offset.checked_add(size)? > len {
                return None;
            }
            // SAFETY: smithay keeps the pool mapping valid for `len` bytes
            // for the duration of this closure and the range is checked above.
            let pixels = unsafe { std::slice::from_raw_parts(ptr.add(offset), size) };
            Some(f(pixels, shm_buffer(data.format, data.width, data.height, data.stride)))
        });
        match result {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = ?e, "buffer contents unavailable");
                None
            }
        }
    }

    /// Drop resources whose client went away without the core noticing
    fn prune(&mut self) {
        self.objects.retain(|_, object| object.is_alive());
        self.pending.retain(|_, object| object.is_alive());
        let gone: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.get_data::<WireClient>().map_or(true, |d| d.gone.load(Ordering::Acquire)))
            .map(|(id, _)| *id)
            .collect();
        for id in gone {
            if let Some(client) = self.clients.remove(&id) {
                self.client_ids.remove(&client.id());
            }
        }
    }

    fn send(&self, target: ObjectId, object: &WireObject, event: Event) {
        match (object, event) {
            (WireObject::Callback(callback), Event::Callback(CallbackEvent::Done { time })) => callback.done(time),
            (WireObject::Buffer(buffer), Event::Buffer(_)) => buffer.release(),
            (WireObject::Surface(surface), Event::Surface(SurfaceEvent::Enter { output })) => {
                if let Some(output) = self.output(output) {
                    surface.enter(output);
                }
            }
            (WireObject::Seat(seat), Event::Seat(event)) => match event {
                SeatEvent::Capabilities(caps) => {
                    seat.capabilities(wl_seat::Capability::from_bits_truncate(caps.bits()));
                }
                SeatEvent::Name(name) => {
                    if seat.version() >= 2 {
                        seat.name(name);
                    }
                }
            },
            (WireObject::Pointer(pointer), Event::Pointer(event)) => self.send_pointer(pointer, event),
            (WireObject::Keyboard(keyboard), Event::Keyboard(event)) => self.send_keyboard(keyboard, event),
            (WireObject::Output(output), Event::Output(event)) => send_output(output, event),
            (WireObject::XdgSurface(xdg_surface), Event::XdgSurface(event)) => match event {
                XdgSurfaceEvent::Configure { width, height, states, serial } => {
                    let states = states.iter().flat_map(|state| (*state as u32).to_ne_bytes()).collect();
                    xdg_surface.configure(width, height, states, serial.into());
                }
                XdgSurfaceEvent::Close => xdg_surface.close(),
            },
            (WireObject::XdgPopup(popup), Event::XdgPopup(XdgPopupEvent::PopupDone)) => popup.popup_done(),
            (object, event) => {
                tracing::warn!(%target, interface = %object.interface(), ?event, "event does not fit the target");
            }
        }
    }

    fn send_pointer(&self, pointer: &WlPointer, event: PointerEvent) {
        match event {
            PointerEvent::Enter { serial, surface, x, y } => {
                if let Some(surface) = self.surface(surface) {
                    pointer.enter(serial.into(), surface, x.to_f64(), y.to_f64());
                }
            }
            PointerEvent::Leave { serial, surface } => {
                if let Some(surface) = self.surface(surface) {
                    pointer.leave(serial.into(), surface);
                }
            }
            PointerEvent::Motion { time, x, y } => pointer.motion(time, x.to_f64(), y.to_f64()),
            PointerEvent::Button { serial, time, button, state } => {
                let state = match state {
                    ButtonState::Pressed => wl_pointer::ButtonState::Pressed,
                    ButtonState::Released => wl_pointer::ButtonState::Released,
                };
                pointer.button(serial.into(), time, button, state);
            }
            PointerEvent::Axis { time, axis, value } => {
                let axis = match axis {
                    Axis::VerticalScroll => wl_pointer::Axis::VerticalScroll,
                    Axis::HorizontalScroll => wl_pointer::Axis::HorizontalScroll,
                };
                pointer.axis(time, axis, value.to_f64());
            }
        }
    }

    fn send_keyboard(&self, keyboard: &WlKeyboard, event: KeyboardEvent) {
        match event {
            KeyboardEvent::Keymap { format, contents } => {
                let format = match format {
                    KeymapFormat::NoKeymap => wl_keyboard::KeymapFormat::NoKeymap,
                    KeymapFormat::XkbV1 => wl_keyboard::KeymapFormat::XkbV1,
                };
                match keymap_file(&contents) {
                    Ok((fd, size)) => keyboard.keymap(format, fd.as_fd(), size),
                    Err(e) => tracing::warn!(error = %e, "failed to share keymap"),
                }
            }
            KeyboardEvent::Enter { serial, surface, keys } => {
                if let Some(surface) = self.surface(surface) {
                    let keys = keys.iter().flat_map(|key| key.to_ne_bytes()).collect();
                    keyboard.enter(serial.into(), surface, keys);
                }
            }
            KeyboardEvent::Leave { serial, surface } => {
                if let Some(surface) = self.surface(surface) {
                    keyboard.leave(serial.into(), surface);
                }
            }
            KeyboardEvent::Key { serial, time, key, state } => {
                let state = match state {
                    KeyState::Pressed => wl_keyboard::KeyState::Pressed,
                    KeyState::Released => wl_keyboard::KeyState::Released,
                };
                keyboard.key(serial.into(), time, key, state);
            }
            KeyboardEvent::Modifiers { serial, depressed, latched, locked, group } => {
                keyboard.modifiers(serial.into(), depressed, latched, locked, group);
            }
        }
    }
}

fn send_output(output: &WlOutput, event: OutputEvent) {
    match event {
        OutputEvent::Geometry { x, y, physical_width, physical_height, make, model, .. } => output.geometry(
            x,
            y,
            physical_width,
            physical_height,
            wl_output::Subpixel::Unknown,
            make,
            model,
            wl_output::Transform::Normal,
        ),
        OutputEvent::Mode { flags, width, height, refresh } => {
            output.mode(wl_output::Mode::from_bits_truncate(flags.bits()), width, height, refresh);
        }
        OutputEvent::Scale(scale) => {
            if output.version() >= 2 {
                output.scale(scale);
            }
        }
        OutputEvent::Done => {
            if output.version() >= 2 {
                output.done();
            }
        }
    }
}

pub(crate) fn shm_buffer(format: wl_shm::Format, width: i32, height: i32, stride: i32) -> ShmBuffer {
    let format = match format {
        wl_shm::Format::Argb8888 => ShmFormat::Argb8888,
        wl_shm::Format::Xrgb8888 => ShmFormat::Xrgb8888,
        other => ShmFormat::Other(other as u32),
    };
    ShmBuffer { width, height, stride, format }
}

/// Sealed, NUL-terminated copy of a keymap for `wl_keyboard.keymap`
pub(crate) fn keymap_file(contents: &str) -> io::Result<(OwnedFd, u32)> {
    let size = u32::try_from(contents.len() + 1)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "keymap too large"))?;
    let fd = rustix::fs::memfd_create("nestway-keymap", MemfdFlags::CLOEXEC | MemfdFlags::ALLOW_SEALING)?;
    let mut file = File::from(fd);
    file.write_all(contents.as_bytes())?;
    file.write_all(&[0])?;
    rustix::fs::fcntl_add_seals(
        &file,
        SealFlags::SEAL | SealFlags::GROW | SealFlags::SHRINK | SealFlags::WRITE,
    )?;
    Ok((OwnedFd::from(file), size))
}

impl<H: Host + 'static> ObjectRegistry for WireRegistry<H> {
    fn create_resource(
        &mut self,
        client: ClientId,
        interface: Interface,
        version: u32,
        id: u32,
    ) -> Result<ObjectId, ResourceError> {
        let object_id = ObjectId::new(client, id);
        let Some(object) = self.pending.remove(&object_id) else {
            tracing::warn!(%object_id, %interface, "no pending resource to claim");
            return Err(ResourceError::NoMemory { client, interface });
        };
        if object.interface() != interface {
            tracing::warn!(%object_id, expected = %interface, found = %object.interface(), "pending resource has another interface");
            return Err(ResourceError::NoMemory { client, interface });
        }
        if object.version() != version {
            tracing::trace!(%object_id, requested = version, bound = object.version(), "resource version fixed by the client");
        }
        self.objects.insert(object_id, object);
        Ok(object_id)
    }

    fn destroy_resource(&mut self, object: ObjectId) {
        self.objects.remove(&object);
    }

    fn send_event(&mut self, target: ObjectId, event: Event) {
        let Some(object) = self.objects.get(&target) else {
            tracing::trace!(%target, "event for a resource that is gone");
            return;
        };
        if !object.is_alive() {
            return;
        }
        self.send(target, object, event);
    }

    fn next_serial(&mut self) -> Serial {
        SERIAL_COUNTER.next_serial()
    }

    fn post_error(&mut self, object: ObjectId, error: &ProtocolError) {
        match self.objects.get(&object).or_else(|| self.pending.get(&object)) {
            Some(resource) => resource.post_error(error.code(), error.to_string()),
            None => tracing::warn!(%object, %error, "cannot post error on a resource that is gone"),
        }
    }

    fn post_no_memory(&mut self, client: ClientId) {
        let Some(wire_client) = self.clients.get(&client) else {
            return;
        };
        let error = backend::protocol::ProtocolError {
            code: DISPLAY_NO_MEMORY,
            object_id: 1,
            object_interface: "wl_display".into(),
            message: "no memory".into(),
        };
        wire_client.kill(&self.display, error);
    }

    fn create_global(&mut self, global: Global, version: u32) {
        let display = &self.display;
        let id = match global {
            Global::Compositor => display.create_global::<WireCompositor<H>, WlCompositor, ()>(version, ()),
            Global::XdgShell => display.create_global::<WireCompositor<H>, XdgShell, ()>(version, ()),
            Global::Seat => display.create_global::<WireCompositor<H>, WlSeat, ()>(version, ()),
            Global::Output => display.create_global::<WireCompositor<H>, WlOutput, ()>(version, ()),
        };
        self.globals.push(id);
    }

    fn flush_clients(&mut self) {
        self.prune();
        if let Err(e) = self.display.flush_clients() {
            tracing::warn!(error = %e, "failed to flush clients");
        }
    }
}

impl<H: Host + 'static> WireCompositor<H> {
    /// Accept a client connection and announce it to the core
    pub fn accept_client(&mut self, stream: UnixStream) -> io::Result<ClientId> {
        let client = self.registry.insert_client(stream)?;
        self.client_connected(client);
        Ok(client)
    }
}

/// Dispatch `display` from the compositor loop whenever a client writes
pub fn insert_display<H: Host + 'static>(
    event_loop: &CompositorLoop<WireRegistry<H>, H>,
    display: Display<WireCompositor<H>>,
) -> anyhow::Result<()> {
    event_loop
        .handle()
        .insert_source(Generic::new(display, Interest::READ, Mode::Level), |_, display, compositor| {
            // SAFETY: the display is never dropped from inside the callback
            unsafe {
                display.get_mut().dispatch_clients(compositor)?;
            }
            Ok(PostAction::Continue)
        })
        .map_err(|e| anyhow::anyhow!("failed to insert display source: {}", e.error))?;
    Ok(())
}

/// Listen on a fresh `wayland-N` socket and accept clients from the loop
///
/// Returns the socket name for `WAYLAND_DISPLAY`.
pub fn listen<H: Host + 'static>(event_loop: &CompositorLoop<WireRegistry<H>, H>) -> anyhow::Result<OsString> {
    let source = ListeningSocketSource::new_auto().context("failed to create Wayland socket")?;
    let name = source.socket_name().to_os_string();
    event_loop
        .handle()
        .insert_source(source, |stream, _, compositor| {
            if let Err(e) = compositor.accept_client(stream) {
                tracing::warn!(error = %e, "failed to accept client");
            }
        })
        .map_err(|e| anyhow::anyhow!("failed to insert socket source: {}", e.error))?;
    tracing::info!(socket = ?name, "listening for Wayland clients");
    Ok(name)
}
