//! Headless compositor driver for testing
//!
//! Plays both clients (by issuing [`Request`]s) and the host toolkit (by
//! feeding [`HostEvent`]s), against a real [`Compositor`].

use std::collections::HashMap;

use nestway::host::{
    ButtonEvent, ButtonKind, CrossingEvent, CrossingMode, DeviceId, HostEvent, HostModifiers, HostWindow,
    KeyEvent, MotionEvent, ScrollDirection, ScrollEvent,
};
use nestway::protocol::{
    ClientId, CompositorRequest, Event, Global, KeyboardEvent, ObjectId, PointerEvent, PointerRequest,
    RegionRequest, Request, SeatRequest, SurfaceRequest, XdgPopupEvent, XdgShellRequest, XdgSurfaceEvent,
    XdgSurfaceRequest,
};
use nestway::surface::{Buffer, ShmBuffer, ShmFormat};
use nestway::{Compositor, Config};
use smithay::utils::{Logical, Point, Rectangle, Serial};
use thiserror::Error;

use crate::host::ScriptedHost;
use crate::registry::{PostedError, RecordingRegistry, SentEvent};

/// Device id the scripted pointer reports
pub const POINTER_DEVICE: DeviceId = DeviceId(2);

/// Window id used for events outside every window the core created
pub const FOREIGN_WINDOW: HostWindow = HostWindow(9999);

#[derive(Error, Debug)]
pub enum TestError {
    #[error("no {kind} event was sent to {target}")]
    MissingEvent { target: ObjectId, kind: &'static str },

    #[error("surface {0} has no host window")]
    NoWindow(ObjectId),
}

/// Objects a test client bound at connection time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestClient {
    pub id: ClientId,
    pub compositor: ObjectId,
    pub seat: ObjectId,
    pub output: ObjectId,
    pub shell: ObjectId,
}

/// A shell surface and its `wl_surface`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toplevel {
    pub surface: ObjectId,
    pub xdg_surface: ObjectId,
}

/// A popup and its `wl_surface`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupHandle {
    pub surface: ObjectId,
    pub xdg_popup: ObjectId,
}

/// Test compositor wrapper
pub struct TestCompositor {
    compositor: Compositor<RecordingRegistry, ScriptedHost>,
    next_client: u32,
    next_ids: HashMap<ClientId, u32>,
    time: u32,
    pointer_position: Point<f64, Logical>,
    modifiers: HostModifiers,
}

impl TestCompositor {
    /// Create an unrealized compositor with a `width`x`height` allocation
    pub fn new_headless(width: i32, height: i32) -> Self {
        Self::with_config(width, height, Config::default())
    }

    pub fn with_config(width: i32, height: i32, config: Config) -> Self {
        crate::init_test_logging();
        Self {
            compositor: Compositor::new(RecordingRegistry::new(), ScriptedHost::new(width, height), config),
            next_client: 1,
            next_ids: HashMap::new(),
            time: 1000,
            pointer_position: Point::from((0.0, 0.0)),
            modifiers: HostModifiers::empty(),
        }
    }

    pub fn compositor(&self) -> &Compositor<RecordingRegistry, ScriptedHost> {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut Compositor<RecordingRegistry, ScriptedHost> {
        &mut self.compositor
    }

    pub fn registry(&self) -> &RecordingRegistry {
        self.compositor.registry()
    }

    pub fn registry_mut(&mut self) -> &mut RecordingRegistry {
        self.compositor.registry_mut()
    }

    pub fn host(&self) -> &ScriptedHost {
        self.compositor.host()
    }

    pub fn host_mut(&mut self) -> &mut ScriptedHost {
        self.compositor.host_mut()
    }

    pub fn events(&self) -> &[SentEvent] {
        self.registry().events()
    }

    pub fn take_events(&mut self) -> Vec<SentEvent> {
        self.registry_mut().take_events()
    }

    pub fn events_for(&self, target: ObjectId) -> Vec<Event> {
        self.registry().events_for(target)
    }

    pub fn errors(&self) -> &[PostedError] {
        self.registry().errors()
    }

    /// Pointer events sent to `pointer`, in order
    pub fn pointer_events(&self, pointer: ObjectId) -> Vec<PointerEvent> {
        self.events_for(pointer)
            .into_iter()
            .filter_map(|e| match e {
                Event::Pointer(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Keyboard events sent to `keyboard`, in order
    pub fn keyboard_events(&self, keyboard: ObjectId) -> Vec<KeyboardEvent> {
        self.events_for(keyboard)
            .into_iter()
            .filter_map(|e| match e {
                Event::Keyboard(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Serial of the last configure sent to `xdg_surface`
    pub fn last_configure(&self, xdg_surface: ObjectId) -> Result<XdgSurfaceEvent, TestError> {
        self.events_for(xdg_surface)
            .into_iter()
            .rev()
            .find_map(|e| match e {
                Event::XdgSurface(event @ XdgSurfaceEvent::Configure { .. }) => Some(event),
                _ => None,
            })
            .ok_or(TestError::MissingEvent { target: xdg_surface, kind: "configure" })
    }

    pub fn popup_done_sent(&self, xdg_popup: ObjectId) -> bool {
        self.events_for(xdg_popup)
            .iter()
            .any(|e| matches!(e, Event::XdgPopup(XdgPopupEvent::PopupDone)))
    }

    /// Serial of the most recent button event sent to `pointer`
    pub fn last_button_serial(&self, pointer: ObjectId) -> Result<Serial, TestError> {
        self.pointer_events(pointer)
            .into_iter()
            .rev()
            .find_map(|e| match e {
                PointerEvent::Button { serial, .. } => Some(serial),
                _ => None,
            })
            .ok_or(TestError::MissingEvent { target: pointer, kind: "button" })
    }

    /// Serial of the most recent pointer enter sent to `pointer`
    pub fn last_enter_serial(&self, pointer: ObjectId) -> Result<Serial, TestError> {
        self.pointer_events(pointer)
            .into_iter()
            .rev()
            .find_map(|e| match e {
                PointerEvent::Enter { serial, .. } => Some(serial),
                _ => None,
            })
            .ok_or(TestError::MissingEvent { target: pointer, kind: "enter" })
    }

    // ========== Clients ==========

    fn alloc_id(&mut self, client: ClientId) -> u32 {
        let next = self.next_ids.entry(client).or_insert(1);
        *next += 1;
        *next
    }

    fn new_object(&mut self, client: ClientId) -> (u32, ObjectId) {
        let id = self.alloc_id(client);
        (id, ObjectId::new(client, id))
    }

    /// Connect a client and bind every global at its highest version
    pub fn connect(&mut self) -> TestClient {
        let id = ClientId(self.next_client);
        self.next_client += 1;
        self.compositor.client_connected(id);

        let bind = |tc: &mut Self, global: Global| {
            let (raw, object) = tc.new_object(id);
            tc.compositor.bind(id, global, global.version(), raw);
            object
        };
        let compositor = bind(self, Global::Compositor);
        let seat = bind(self, Global::Seat);
        let output = bind(self, Global::Output);
        let shell = bind(self, Global::XdgShell);
        TestClient {
            id,
            compositor,
            seat,
            output,
            shell,
        }
    }

    pub fn disconnect(&mut self, client: &TestClient) {
        self.compositor.client_disconnected(client.id);
        self.registry_mut().drop_client(client.id);
    }

    pub fn request(&mut self, request: Request) {
        self.compositor.handle_request(request);
    }

    pub fn create_surface(&mut self, client: &TestClient) -> ObjectId {
        let (id, object) = self.new_object(client.id);
        self.request(Request::Compositor(client.compositor, CompositorRequest::CreateSurface { id }));
        object
    }

    pub fn create_region(&mut self, client: &TestClient, rects: &[Rectangle<i32, Logical>]) -> ObjectId {
        let (id, region) = self.new_object(client.id);
        self.request(Request::Compositor(client.compositor, CompositorRequest::CreateRegion { id }));
        for rect in rects {
            self.request(Request::Region(
                region,
                RegionRequest::Add {
                    x: rect.loc.x,
                    y: rect.loc.y,
                    width: rect.size.w,
                    height: rect.size.h,
                },
            ));
        }
        region
    }

    pub fn get_pointer(&mut self, client: &TestClient) -> ObjectId {
        let (id, pointer) = self.new_object(client.id);
        self.request(Request::Seat(client.seat, SeatRequest::GetPointer { id }));
        pointer
    }

    pub fn get_keyboard(&mut self, client: &TestClient) -> ObjectId {
        let (id, keyboard) = self.new_object(client.id);
        self.request(Request::Seat(client.seat, SeatRequest::GetKeyboard { id }));
        keyboard
    }

    /// Allocate a shm buffer object owned by `surface`'s client
    pub fn shm_buffer(&mut self, surface: ObjectId, width: i32, height: i32) -> Buffer {
        let (_, id) = self.new_object(surface.client);
        Buffer {
            id,
            shm: Some(ShmBuffer {
                width,
                height,
                stride: width * 4,
                format: ShmFormat::Argb8888,
            }),
        }
    }

    pub fn attach(&mut self, surface: ObjectId, buffer: Option<Buffer>) {
        self.request(Request::Surface(surface, SurfaceRequest::Attach { buffer, x: 0, y: 0 }));
    }

    pub fn damage(&mut self, surface: ObjectId, x: i32, y: i32, width: i32, height: i32) {
        self.request(Request::Surface(surface, SurfaceRequest::Damage { x, y, width, height }));
    }

    pub fn commit(&mut self, surface: ObjectId) {
        self.request(Request::Surface(surface, SurfaceRequest::Commit));
    }

    pub fn set_buffer_scale(&mut self, surface: ObjectId, scale: i32) {
        self.request(Request::Surface(surface, SurfaceRequest::SetBufferScale { scale }));
    }

    pub fn set_input_region(&mut self, surface: ObjectId, region: Option<ObjectId>) {
        self.request(Request::Surface(surface, SurfaceRequest::SetInputRegion { region }));
    }

    pub fn frame(&mut self, surface: ObjectId) -> ObjectId {
        let (id, callback) = self.new_object(surface.client);
        self.request(Request::Surface(surface, SurfaceRequest::Frame { callback: id }));
        callback
    }

    /// Attach a fresh `width`x`height` buffer, damage all of it and commit
    pub fn commit_buffer(&mut self, surface: ObjectId, width: i32, height: i32) -> Buffer {
        let buffer = self.shm_buffer(surface, width, height);
        self.attach(surface, Some(buffer));
        self.damage(surface, 0, 0, width, height);
        self.commit(surface);
        buffer
    }

    pub fn destroy_surface(&mut self, surface: ObjectId) {
        self.request(Request::Surface(surface, SurfaceRequest::Destroy));
    }

    // ========== xdg_shell ==========

    pub fn get_xdg_surface(&mut self, client: &TestClient, surface: ObjectId) -> ObjectId {
        let (id, xdg_surface) = self.new_object(client.id);
        self.request(Request::XdgShell(
            client.shell,
            XdgShellRequest::GetXdgSurface { id, surface: Some(surface) },
        ));
        xdg_surface
    }

    pub fn get_xdg_popup(
        &mut self,
        client: &TestClient,
        surface: ObjectId,
        parent: ObjectId,
        serial: Serial,
        offset: (i32, i32),
    ) -> ObjectId {
        let (id, popup) = self.new_object(client.id);
        self.request(Request::XdgShell(
            client.shell,
            XdgShellRequest::GetXdgPopup {
                id,
                surface: Some(surface),
                parent: Some(parent),
                seat: client.seat,
                serial,
                x: offset.0,
                y: offset.1,
            },
        ));
        popup
    }

    pub fn ack_configure(&mut self, xdg_surface: ObjectId, serial: Serial) {
        self.request(Request::XdgSurface(xdg_surface, XdgSurfaceRequest::AckConfigure { serial }));
    }

    pub fn destroy_xdg_surface(&mut self, xdg_surface: ObjectId) {
        self.request(Request::XdgSurface(xdg_surface, XdgSurfaceRequest::Destroy));
    }

    /// Create a surface with the shell-surface role but no content yet
    pub fn create_toplevel(&mut self, client: &TestClient) -> Toplevel {
        let surface = self.create_surface(client);
        let xdg_surface = self.get_xdg_surface(client, surface);
        Toplevel { surface, xdg_surface }
    }

    /// Create a shell surface and commit a `width`x`height` buffer to it
    pub fn map_toplevel(&mut self, client: &TestClient, width: i32, height: i32) -> Toplevel {
        let toplevel = self.create_toplevel(client);
        self.commit_buffer(toplevel.surface, width, height);
        toplevel
    }

    /// Create a popup on `parent` and commit a `width`x`height` buffer to it
    pub fn map_popup(
        &mut self,
        client: &TestClient,
        parent: ObjectId,
        serial: Serial,
        offset: (i32, i32),
        size: (i32, i32),
    ) -> PopupHandle {
        let surface = self.create_surface(client);
        let xdg_popup = self.get_xdg_popup(client, surface, parent, serial, offset);
        self.commit_buffer(surface, size.0, size.1);
        PopupHandle { surface, xdg_popup }
    }

    pub fn set_cursor(
        &mut self,
        pointer: ObjectId,
        serial: Serial,
        surface: Option<ObjectId>,
        hotspot: (i32, i32),
    ) {
        self.request(Request::Pointer(
            pointer,
            PointerRequest::SetCursor {
                serial,
                surface,
                hotspot_x: hotspot.0,
                hotspot_y: hotspot.1,
            },
        ));
    }

    // ========== Host ==========

    fn tick(&mut self) -> u32 {
        self.time += 16;
        self.time
    }

    /// Feed a raw host event, then deliver a focus-in if it asked for focus
    pub fn host_event(&mut self, event: HostEvent) {
        self.compositor.handle_host_event(event);
        if self.host_mut().take_focus_request() && !self.host().focused {
            self.focus_in();
        }
    }

    pub fn realize(&mut self) {
        self.host_mut().realized = true;
        self.host_event(HostEvent::Realize);
    }

    pub fn unrealize(&mut self) {
        self.host_event(HostEvent::Unrealize);
        self.host_mut().realized = false;
    }

    pub fn size_allocate(&mut self, allocation: Rectangle<i32, Logical>) {
        self.host_mut().allocation = allocation;
        self.host_event(HostEvent::SizeAllocate(allocation));
    }

    pub fn set_backdrop(&mut self, backdrop: bool) {
        self.host_mut().backdrop = backdrop;
        self.host_event(HostEvent::StateFlagsChanged);
    }

    pub fn focus_in(&mut self) {
        self.host_mut().focused = true;
        self.compositor.handle_host_event(HostEvent::FocusIn);
    }

    pub fn focus_out(&mut self) {
        self.host_mut().focused = false;
        self.compositor.handle_host_event(HostEvent::FocusOut);
    }

    /// Host window `surface` receives input through
    pub fn window_of(&self, surface: ObjectId) -> Result<HostWindow, TestError> {
        self.compositor
            .window_for_surface(surface)
            .ok_or(TestError::NoWindow(surface))
    }

    fn window_or_foreign(&self, surface: Option<ObjectId>) -> HostWindow {
        surface
            .and_then(|s| self.compositor.window_for_surface(s))
            .unwrap_or(FOREIGN_WINDOW)
    }

    pub fn pointer_enter(&mut self, surface: ObjectId, x: f64, y: f64) {
        self.crossing(Some(surface), x, y, CrossingMode::Normal, true);
    }

    pub fn pointer_leave(&mut self, surface: ObjectId) {
        let (x, y) = (self.pointer_position.x, self.pointer_position.y);
        self.crossing(Some(surface), x, y, CrossingMode::Normal, false);
    }

    pub fn crossing(&mut self, surface: Option<ObjectId>, x: f64, y: f64, mode: CrossingMode, enter: bool) {
        self.pointer_position = Point::from((x, y));
        let event = CrossingEvent {
            window: self.window_or_foreign(surface),
            mode,
            time: self.tick(),
            position: self.pointer_position,
        };
        self.host_event(if enter { HostEvent::Enter(event) } else { HostEvent::Leave(event) });
    }

    pub fn motion(&mut self, surface: ObjectId, x: f64, y: f64) {
        self.pointer_position = Point::from((x, y));
        let event = MotionEvent {
            window: self.window_or_foreign(Some(surface)),
            time: self.tick(),
            position: self.pointer_position,
        };
        self.host_event(HostEvent::Motion(event));
    }

    pub fn button(&mut self, surface: Option<ObjectId>, button: u32, kind: ButtonKind) {
        let event = ButtonEvent {
            window: self.window_or_foreign(surface),
            device: POINTER_DEVICE,
            kind,
            button,
            time: self.tick(),
            position: self.pointer_position,
        };
        self.host_event(HostEvent::Button(event));
    }

    pub fn press(&mut self, surface: Option<ObjectId>, button: u32) {
        self.button(surface, button, ButtonKind::Press);
    }

    pub fn release(&mut self, surface: Option<ObjectId>, button: u32) {
        self.button(surface, button, ButtonKind::Release);
    }

    /// Press and release the left button over `surface`
    pub fn click(&mut self, surface: ObjectId) {
        self.press(Some(surface), 1);
        self.release(Some(surface), 1);
    }

    pub fn scroll(&mut self, surface: ObjectId, direction: ScrollDirection) {
        let event = ScrollEvent {
            window: self.window_or_foreign(Some(surface)),
            time: self.tick(),
            direction,
        };
        self.host_event(HostEvent::Scroll(event));
    }

    pub fn set_modifiers(&mut self, modifiers: HostModifiers) {
        self.modifiers = modifiers;
    }

    pub fn key(&mut self, hardware_keycode: u32, pressed: bool) {
        let event = KeyEvent {
            pressed,
            time: self.tick(),
            hardware_keycode,
            modifiers: self.modifiers,
            group: 0,
        };
        self.host_event(HostEvent::Key(event));
    }
}
