//! Protocol-level assertions over recorded events

use nestway::protocol::{ObjectId, PointerEvent};
use nestway::surface::Role;
use nestway::ProtocolError;

use crate::headless::TestCompositor;

/// Assert that no protocol error has been posted
pub fn assert_no_errors(tc: &TestCompositor) {
    assert!(tc.errors().is_empty(), "unexpected protocol errors: {:?}", tc.errors());
}

/// Assert that exactly one error was posted, on `object`, and return it
pub fn assert_single_error(tc: &TestCompositor, object: ObjectId) -> ProtocolError {
    let errors = tc.errors();
    assert_eq!(errors.len(), 1, "expected one protocol error, got {:?}", errors);
    assert_eq!(errors[0].object, object, "error posted on the wrong object");
    errors[0].error.clone()
}

/// Assert that enters and leaves alternate, each leave naming the entered surface
///
/// Motion, button and axis events may only appear between an enter and its leave.
pub fn assert_enter_leave_paired(events: &[PointerEvent]) {
    let mut entered: Option<ObjectId> = None;
    for (i, event) in events.iter().enumerate() {
        match event {
            PointerEvent::Enter { surface, .. } => {
                assert_eq!(entered, None, "event {}: enter {} while inside {:?}", i, surface, entered);
                entered = Some(*surface);
            }
            PointerEvent::Leave { surface, .. } => {
                assert_eq!(entered, Some(*surface), "event {}: leave {} without matching enter", i, surface);
                entered = None;
            }
            PointerEvent::Motion { .. } | PointerEvent::Axis { .. } => {
                assert!(entered.is_some(), "event {}: {:?} outside any surface", i, event);
            }
            PointerEvent::Button { .. } => {}
        }
    }
}

/// Assert the popup stack discipline over the live popups
///
/// Every popup that is still open has a parent with a shell role, and a
/// popup parent sits below its child in the stack.
pub fn assert_popup_stack_valid(tc: &TestCompositor) {
    let compositor = tc.compositor();
    let popups = compositor.shell().popups();
    for (index, popup) in popups.iter().enumerate() {
        if popup.dismissed {
            continue;
        }
        let Some(parent) = compositor.surface(popup.parent) else {
            continue;
        };
        assert!(
            matches!(parent.role(), Role::ShellSurface | Role::Popup),
            "popup {} has parent {} with role {:?}",
            popup.id,
            popup.parent,
            parent.role()
        );
        if parent.role() == Role::Popup {
            let parent_index = popups.iter().position(|p| p.surface == Some(popup.parent));
            assert!(
                parent_index.is_some_and(|p| p < index),
                "popup {} stacked below its parent {}",
                popup.id,
                popup.parent
            );
        }
    }
}

/// Assert that every surface has at most one companion and it matches its role
pub fn assert_roles_consistent(tc: &TestCompositor) {
    for surface in tc.compositor().surfaces() {
        match surface.role() {
            Role::ShellSurface => assert!(surface.popup().is_none(), "shell surface {} has a popup", surface.id()),
            Role::Popup => assert!(surface.shell_surface().is_none(), "popup {} has a shell surface", surface.id()),
            Role::None | Role::Cursor => {
                assert!(surface.shell_surface().is_none(), "{} has a shell surface without the role", surface.id());
                assert!(surface.popup().is_none(), "{} has a popup without the role", surface.id());
            }
        }
    }
}
