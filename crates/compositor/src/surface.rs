//! Per-surface double-buffered state
//!
//! A [`Surface`] only tracks protocol state; side effects of a commit (buffer
//! release, host redraws, map notification) are performed by the
//! [`Compositor`](crate::state::Compositor) from the [`Commit`] summary that
//! [`Surface::apply_pending`] returns.

use smithay::utils::{Logical, Point, Rectangle, Size};

use crate::error::RoleError;
use crate::protocol::ObjectId;
use crate::region::Region;

/// Surface role, set at most once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Role {
    #[default]
    None,
    ShellSurface,
    Popup,
    Cursor,
}

/// `wl_shm.format` subset the core cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShmFormat {
    Argb8888,
    Xrgb8888,
    Other(u32),
}

/// Shared-memory buffer description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShmBuffer {
    pub width: i32,
    pub height: i32,
    pub stride: i32,
    pub format: ShmFormat,
}

/// An attached `wl_buffer`
///
/// `shm` is `None` for buffers that are not shared memory; those are tracked
/// for release but have no size and are never painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Buffer {
    pub id: ObjectId,
    pub shm: Option<ShmBuffer>,
}

impl Buffer {
    /// Size in logical pixels at `scale`
    pub fn logical_size(&self, scale: i32) -> Option<Size<i32, Logical>> {
        let shm = self.shm?;
        let scale = scale.max(1);
        Some(Size::from((shm.width / scale, shm.height / scale)))
    }
}

/// Input region of the current state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InputRegion {
    #[default]
    Infinite,
    Region(Region),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingState {
    pub buffer: Option<Buffer>,
    pub scale: i32,
    /// `None` leaves the current input region untouched
    pub input_region: Option<InputRegion>,
    pub frame_callbacks: Vec<ObjectId>,
}

impl Default for PendingState {
    fn default() -> Self {
        Self {
            buffer: None,
            scale: 1,
            input_region: None,
            frame_callbacks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentState {
    pub buffer: Option<Buffer>,
    pub scale: i32,
    pub input_region: InputRegion,
    pub frame_callbacks: Vec<ObjectId>,
}

impl Default for CurrentState {
    fn default() -> Self {
        Self {
            buffer: None,
            scale: 1,
            input_region: InputRegion::Infinite,
            frame_callbacks: Vec::new(),
        }
    }
}

/// What a commit changed
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    /// Buffer replaced by this commit, to be released
    pub released: Option<ObjectId>,
    /// Logical size of a newly attached buffer
    pub new_size: Option<Size<i32, Logical>>,
    /// Surface-local damage, including the area a shrinking buffer vacated
    pub damage: Region,
}

#[derive(Debug, Clone)]
pub struct Surface {
    id: ObjectId,
    role: Role,
    mapped: bool,
    pub(crate) shell_surface: Option<ObjectId>,
    pub(crate) popup: Option<ObjectId>,
    pub(crate) damage: Region,
    pub(crate) pending: PendingState,
    pub(crate) current: CurrentState,
}

impl Surface {
    pub fn new(id: ObjectId) -> Self {
        Self {
            id,
            role: Role::None,
            mapped: false,
            shell_surface: None,
            popup: None,
            damage: Region::new(),
            pending: PendingState::default(),
            current: CurrentState::default(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    pub fn shell_surface(&self) -> Option<ObjectId> {
        self.shell_surface
    }

    pub fn popup(&self) -> Option<ObjectId> {
        self.popup
    }

    pub fn pending(&self) -> &PendingState {
        &self.pending
    }

    pub fn current(&self) -> &CurrentState {
        &self.current
    }

    pub fn pending_damage(&self) -> &Region {
        &self.damage
    }

    pub fn buffer(&self) -> Option<&Buffer> {
        self.current.buffer.as_ref()
    }

    pub fn scale(&self) -> i32 {
        self.current.scale
    }

    /// Logical size of the current buffer
    pub fn size(&self) -> Option<Size<i32, Logical>> {
        self.current.buffer.as_ref()?.logical_size(self.current.scale)
    }

    /// Assign a role; repeating the current role is a no-op
    pub fn set_role(&mut self, role: Role) -> Result<(), RoleError> {
        if self.role == role || role == Role::None {
            return Ok(());
        }
        if self.role != Role::None {
            return Err(RoleError {
                existing: self.role,
                requested: role,
            });
        }
        self.role = role;
        Ok(())
    }

    /// Returns `true` if the flag changed
    pub(crate) fn set_mapped(&mut self, mapped: bool) -> bool {
        std::mem::replace(&mut self.mapped, mapped) != mapped
    }

    pub(crate) fn attach(&mut self, buffer: Option<Buffer>) {
        self.pending.buffer = buffer;
    }

    pub(crate) fn add_damage(&mut self, rect: Rectangle<i32, Logical>) {
        self.damage.union_rect(rect);
    }

    /// Promote pending state to current
    pub(crate) fn apply_pending(&mut self) -> Commit {
        let mut released = None;
        let mut new_size = None;
        let mut vacated = None;

        if let Some(buffer) = self.pending.buffer.take() {
            if let Some(old) = self.current.buffer.take() {
                vacated = old.logical_size(self.current.scale).map(Region::from_size);
                released = Some(old.id);
            }
            let scale = if self.pending.scale > 0 {
                self.pending.scale
            } else {
                self.current.scale
            };
            new_size = buffer.logical_size(scale);
            if let (Some(vacated), Some(size)) = (vacated.as_mut(), new_size) {
                vacated.subtract_rect(Rectangle::from_size(size));
            }
            self.current.buffer = Some(buffer);
        }

        if self.pending.scale > 0 {
            self.current.scale = self.pending.scale;
        }

        self.current
            .frame_callbacks
            .append(&mut self.pending.frame_callbacks);

        if let Some(region) = self.pending.input_region.take() {
            self.current.input_region = region;
        }

        let mut damage = std::mem::take(&mut self.damage);
        if let Some(vacated) = vacated {
            damage.union(&vacated);
        }

        self.pending.scale = 1;

        Commit {
            released,
            new_size,
            damage,
        }
    }

    pub(crate) fn take_frame_callbacks(&mut self) -> Vec<ObjectId> {
        std::mem::take(&mut self.current.frame_callbacks)
    }

    /// Every frame callback, pending and current
    pub(crate) fn drain_all_callbacks(&mut self) -> Vec<ObjectId> {
        let mut callbacks = std::mem::take(&mut self.pending.frame_callbacks);
        callbacks.append(&mut self.current.frame_callbacks);
        callbacks
    }

    pub(crate) fn forget_callback(&mut self, callback: ObjectId) {
        self.pending.frame_callbacks.retain(|c| *c != callback);
        self.current.frame_callbacks.retain(|c| *c != callback);
    }

    /// Hit test in surface-local coordinates against buffer and input region
    pub fn accepts_input(&self, point: Point<i32, Logical>) -> bool {
        let Some(size) = self.size() else {
            return false;
        };
        if !Rectangle::from_size(size).contains(point) {
            return false;
        }
        match &self.current.input_region {
            InputRegion::Infinite => true,
            InputRegion::Region(region) => region.contains(point),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ClientId;

    fn obj(id: u32) -> ObjectId {
        ObjectId::new(ClientId(1), id)
    }

    fn shm_buffer(id: u32, width: i32, height: i32) -> Buffer {
        Buffer {
            id: obj(id),
            shm: Some(ShmBuffer {
                width,
                height,
                stride: width * 4,
                format: ShmFormat::Argb8888,
            }),
        }
    }

    #[test]
    fn role_is_set_once() {
        let mut surface = Surface::new(obj(1));

        assert!(surface.set_role(Role::ShellSurface).is_ok());
        assert!(surface.set_role(Role::ShellSurface).is_ok());
        assert_eq!(
            surface.set_role(Role::Popup),
            Err(RoleError {
                existing: Role::ShellSurface,
                requested: Role::Popup
            })
        );
        assert_eq!(surface.role(), Role::ShellSurface);
    }

    #[test]
    fn first_commit_makes_buffer_current_without_release() {
        let mut surface = Surface::new(obj(1));
        surface.attach(Some(shm_buffer(10, 200, 100)));
        surface.add_damage(Rectangle::new((0, 0).into(), (200, 100).into()));

        let commit = surface.apply_pending();

        assert_eq!(commit.released, None);
        assert_eq!(commit.new_size, Some((200, 100).into()));
        assert_eq!(commit.damage.area(), 200 * 100);
        assert_eq!(surface.size(), Some((200, 100).into()));
        assert!(surface.pending_damage().is_empty());
    }

    #[test]
    fn replacing_buffer_releases_old_and_damages_shrink_delta() {
        let mut surface = Surface::new(obj(1));
        surface.attach(Some(shm_buffer(10, 200, 100)));
        surface.apply_pending();

        surface.attach(Some(shm_buffer(11, 150, 100)));
        let commit = surface.apply_pending();

        assert_eq!(commit.released, Some(obj(10)));
        assert_eq!(commit.damage.area(), 50 * 100);
        assert_eq!(surface.buffer().map(|b| b.id), Some(obj(11)));
    }

    #[test]
    fn commit_without_buffer_keeps_current_and_moves_callbacks() {
        let mut surface = Surface::new(obj(1));
        surface.attach(Some(shm_buffer(10, 20, 20)));
        surface.apply_pending();

        surface.pending.frame_callbacks.push(obj(30));
        let commit = surface.apply_pending();

        assert_eq!(commit.released, None);
        assert_eq!(surface.buffer().map(|b| b.id), Some(obj(10)));
        assert_eq!(surface.current().frame_callbacks, vec![obj(30)]);
        assert!(surface.pending().frame_callbacks.is_empty());
    }

    #[test]
    fn scale_applies_only_when_positive_and_pending_resets() {
        let mut surface = Surface::new(obj(1));
        surface.pending.scale = 2;
        surface.attach(Some(shm_buffer(10, 200, 100)));
        surface.apply_pending();

        assert_eq!(surface.scale(), 2);
        assert_eq!(surface.size(), Some((100, 50).into()));
        assert_eq!(surface.pending().scale, 1);

        surface.pending.scale = 0;
        surface.apply_pending();
        assert_eq!(surface.scale(), 2);
    }

    #[test]
    fn input_region_limits_hit_test() {
        let mut surface = Surface::new(obj(1));
        surface.attach(Some(shm_buffer(10, 100, 100)));
        surface.pending.input_region = Some(InputRegion::Region(Region::from_rect(Rectangle::new(
            (0, 0).into(),
            (50, 50).into(),
        ))));
        surface.apply_pending();

        assert!(surface.accepts_input((10, 10).into()));
        assert!(!surface.accepts_input((60, 60).into()));
        assert!(!surface.accepts_input((200, 10).into()));

        surface.pending.input_region = Some(InputRegion::Infinite);
        surface.apply_pending();
        assert!(surface.accepts_input((60, 60).into()));
    }

    #[test]
    fn unsized_surface_accepts_nothing() {
        let surface = Surface::new(obj(1));
        assert!(!surface.accepts_input((0, 0).into()));
    }
}
