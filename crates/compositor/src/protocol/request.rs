//! Inbound protocol requests, already demarshaled by the runtime
//!
//! Every request is addressed to an existing object; `new_id` arguments carry
//! the raw id the client allocated so the core can create the resource itself
//! through [`ObjectRegistry::create_resource`](crate::registry::ObjectRegistry::create_resource).

use smithay::utils::Serial;

use super::ObjectId;
use crate::surface::Buffer;

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Compositor(ObjectId, CompositorRequest),
    Region(ObjectId, RegionRequest),
    Surface(ObjectId, SurfaceRequest),
    Seat(ObjectId, SeatRequest),
    Pointer(ObjectId, PointerRequest),
    Keyboard(ObjectId, KeyboardRequest),
    Output(ObjectId, OutputRequest),
    XdgShell(ObjectId, XdgShellRequest),
    XdgSurface(ObjectId, XdgSurfaceRequest),
    XdgPopup(ObjectId, XdgPopupRequest),
}

impl Request {
    /// The object the request was sent to
    pub fn target(&self) -> ObjectId {
        match self {
            Request::Compositor(id, _)
            | Request::Region(id, _)
            | Request::Surface(id, _)
            | Request::Seat(id, _)
            | Request::Pointer(id, _)
            | Request::Keyboard(id, _)
            | Request::Output(id, _)
            | Request::XdgShell(id, _)
            | Request::XdgSurface(id, _)
            | Request::XdgPopup(id, _) => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositorRequest {
    CreateSurface { id: u32 },
    CreateRegion { id: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionRequest {
    Destroy,
    Add { x: i32, y: i32, width: i32, height: i32 },
    Subtract { x: i32, y: i32, width: i32, height: i32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceRequest {
    Destroy,
    /// `None` is a null buffer
    Attach {
        buffer: Option<Buffer>,
        x: i32,
        y: i32,
    },
    Damage {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    Frame {
        callback: u32,
    },
    SetOpaqueRegion {
        region: Option<ObjectId>,
    },
    SetInputRegion {
        region: Option<ObjectId>,
    },
    Commit,
    SetBufferTransform {
        transform: i32,
    },
    SetBufferScale {
        scale: i32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatRequest {
    GetPointer { id: u32 },
    GetKeyboard { id: u32 },
    GetTouch { id: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerRequest {
    SetCursor {
        serial: Serial,
        surface: Option<ObjectId>,
        hotspot_x: i32,
        hotspot_y: i32,
    },
    Release,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyboardRequest {
    Release,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputRequest {
    Release,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XdgShellRequest {
    Destroy,
    UseUnstableVersion {
        version: i32,
    },
    GetXdgSurface {
        id: u32,
        surface: Option<ObjectId>,
    },
    GetXdgPopup {
        id: u32,
        surface: Option<ObjectId>,
        parent: Option<ObjectId>,
        seat: ObjectId,
        serial: Serial,
        x: i32,
        y: i32,
    },
    Pong {
        serial: Serial,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XdgSurfaceRequest {
    Destroy,
    SetParent { parent: Option<ObjectId> },
    SetTitle { title: String },
    SetAppId { app_id: String },
    ShowWindowMenu { seat: ObjectId, serial: Serial, x: i32, y: i32 },
    Move { seat: ObjectId, serial: Serial },
    Resize { seat: ObjectId, serial: Serial, edges: u32 },
    AckConfigure { serial: Serial },
    SetWindowGeometry { x: i32, y: i32, width: i32, height: i32 },
    SetMaximized,
    UnsetMaximized,
    SetFullscreen { output: Option<ObjectId> },
    UnsetFullscreen,
    SetMinimized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XdgPopupRequest {
    Destroy,
}
