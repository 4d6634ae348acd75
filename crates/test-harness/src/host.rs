//! Scripted host toolkit
//!
//! Records every call the core makes and keeps just enough window state
//! (visibility, position, size) to answer the queries the core asks.

use std::collections::HashMap;

use nestway::host::{DeviceId, DrawTarget, Host, HostError, HostWindow};
use nestway::region::Region;
use nestway::surface::Buffer;
use smithay::utils::{Logical, Point, Rectangle, Size};

/// Root-relative origin of the toplevel the widget lives in
pub const TOPLEVEL_ORIGIN: (i32, i32) = (100, 50);

/// A call made by the core, in order
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    QueueDraw(Region),
    QueueDrawWindow(HostWindow, Region),
    CreateEventWindow(HostWindow, Rectangle<i32, Logical>),
    CreateSurfaceWindow {
        window: HostWindow,
        parent: HostWindow,
        size: Size<i32, Logical>,
    },
    CreatePopupWindow {
        window: HostWindow,
        parent: Option<HostWindow>,
    },
    DestroyWindow(HostWindow),
    MoveWindow(HostWindow, Point<i32, Logical>),
    ResizeWindow(HostWindow, Size<i32, Logical>),
    ShowWindow(HostWindow),
    HideWindow(HostWindow),
    GrabPointer {
        device: DeviceId,
        window: HostWindow,
        time: u32,
    },
    UngrabPointer(DeviceId),
    SetCursor {
        window: HostWindow,
        buffer: Buffer,
        hotspot: Point<i32, Logical>,
        scale: i32,
    },
    GrabFocus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Event,
    Surface,
    Popup,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowState {
    pub kind: WindowKind,
    pub visible: bool,
    /// Parent-relative for child windows, root-relative for popups
    pub position: Point<i32, Logical>,
    pub size: Size<i32, Logical>,
}

#[derive(Debug)]
pub struct ScriptedHost {
    pub allocation: Rectangle<i32, Logical>,
    pub scale: i32,
    pub realized: bool,
    pub backdrop: bool,
    pub focused: bool,
    pub frame_time: u32,
    /// Refuse every window creation
    pub fail_windows: bool,
    /// Refuse every pointer grab
    pub refuse_grabs: bool,
    calls: Vec<HostCall>,
    windows: HashMap<HostWindow, WindowState>,
    next_window: u64,
    focus_requested: bool,
}

impl ScriptedHost {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            allocation: Rectangle::new((0, 0).into(), (width, height).into()),
            scale: 1,
            realized: false,
            backdrop: false,
            focused: false,
            frame_time: 0,
            fail_windows: false,
            refuse_grabs: false,
            calls: Vec::new(),
            windows: HashMap::new(),
            next_window: 1,
            focus_requested: false,
        }
    }

    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<HostCall> {
        std::mem::take(&mut self.calls)
    }

    /// Every `queue_draw` region, in order
    pub fn draws(&self) -> Vec<Region> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HostCall::QueueDraw(region) => Some(region.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn window(&self, window: HostWindow) -> Option<WindowState> {
        self.windows.get(&window).copied()
    }

    pub fn live_windows(&self) -> usize {
        self.windows.len()
    }

    /// `grab_focus` was called since the last check
    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.focus_requested)
    }

    fn new_window(&mut self, kind: WindowKind, position: Point<i32, Logical>, size: Size<i32, Logical>) -> Result<HostWindow, HostError> {
        if self.fail_windows {
            return Err(HostError::WindowCreation(format!("{:?} window refused", kind)));
        }
        let window = HostWindow(self.next_window);
        self.next_window += 1;
        self.windows.insert(
            window,
            WindowState {
                kind,
                visible: false,
                position,
                size,
            },
        );
        Ok(window)
    }
}

impl Host for ScriptedHost {
    fn allocation(&self) -> Rectangle<i32, Logical> {
        self.allocation
    }

    fn scale_factor(&self) -> i32 {
        self.scale
    }

    fn is_realized(&self) -> bool {
        self.realized
    }

    fn is_backdrop(&self) -> bool {
        self.backdrop
    }

    fn has_focus(&self) -> bool {
        self.focused
    }

    fn grab_focus(&mut self) {
        self.calls.push(HostCall::GrabFocus);
        self.focus_requested = true;
    }

    fn frame_time(&self) -> u32 {
        self.frame_time
    }

    fn queue_draw(&mut self, damage: &Region) {
        self.calls.push(HostCall::QueueDraw(damage.clone()));
    }

    fn queue_draw_window(&mut self, window: HostWindow, damage: &Region) {
        self.calls.push(HostCall::QueueDrawWindow(window, damage.clone()));
    }

    fn create_event_window(&mut self, geometry: Rectangle<i32, Logical>) -> Result<HostWindow, HostError> {
        let window = self.new_window(WindowKind::Event, geometry.loc, geometry.size)?;
        self.calls.push(HostCall::CreateEventWindow(window, geometry));
        Ok(window)
    }

    fn create_surface_window(&mut self, parent: HostWindow, size: Size<i32, Logical>) -> Result<HostWindow, HostError> {
        let window = self.new_window(WindowKind::Surface, Point::from((0, 0)), size)?;
        self.calls.push(HostCall::CreateSurfaceWindow { window, parent, size });
        Ok(window)
    }

    fn create_popup_window(&mut self, parent: Option<HostWindow>) -> Result<HostWindow, HostError> {
        let window = self.new_window(WindowKind::Popup, Point::from((0, 0)), Size::from((1, 1)))?;
        self.calls.push(HostCall::CreatePopupWindow { window, parent });
        Ok(window)
    }

    fn destroy_window(&mut self, window: HostWindow) {
        self.windows.remove(&window);
        self.calls.push(HostCall::DestroyWindow(window));
    }

    fn move_window(&mut self, window: HostWindow, position: Point<i32, Logical>) {
        if let Some(state) = self.windows.get_mut(&window) {
            state.position = position;
        }
        self.calls.push(HostCall::MoveWindow(window, position));
    }

    fn resize_window(&mut self, window: HostWindow, size: Size<i32, Logical>) {
        if let Some(state) = self.windows.get_mut(&window) {
            state.size = size;
        }
        self.calls.push(HostCall::ResizeWindow(window, size));
    }

    fn show_window(&mut self, window: HostWindow) {
        if let Some(state) = self.windows.get_mut(&window) {
            state.visible = true;
        }
        self.calls.push(HostCall::ShowWindow(window));
    }

    fn hide_window(&mut self, window: HostWindow) {
        if let Some(state) = self.windows.get_mut(&window) {
            state.visible = false;
        }
        self.calls.push(HostCall::HideWindow(window));
    }

    fn root_origin(&self, window: HostWindow) -> Point<i32, Logical> {
        let toplevel = Point::from(TOPLEVEL_ORIGIN);
        match self.windows.get(&window) {
            Some(state) if state.kind == WindowKind::Popup => state.position,
            // Surface windows sit at the event window's origin
            Some(_) => toplevel + self.allocation.loc,
            None => toplevel,
        }
    }

    fn grab_pointer(&mut self, device: DeviceId, window: HostWindow, time: u32) -> Result<(), HostError> {
        if self.refuse_grabs {
            return Err(HostError::GrabRefused("scripted refusal".to_string()));
        }
        self.calls.push(HostCall::GrabPointer { device, window, time });
        Ok(())
    }

    fn ungrab_pointer(&mut self, device: DeviceId, _time: u32) {
        self.calls.push(HostCall::UngrabPointer(device));
    }

    fn set_cursor(&mut self, window: HostWindow, image: &Buffer, hotspot: Point<i32, Logical>, scale: i32) {
        self.calls.push(HostCall::SetCursor {
            window,
            buffer: *image,
            hotspot,
            scale,
        });
    }
}

/// Draw target that records what was painted
#[derive(Debug, Default)]
pub struct RecordingTarget {
    pub painted: Vec<(Buffer, i32, Point<i32, Logical>)>,
}

impl DrawTarget for RecordingTarget {
    fn paint(&mut self, buffer: &Buffer, scale: i32, position: Point<i32, Logical>) {
        self.painted.push((*buffer, scale, position));
    }
}
