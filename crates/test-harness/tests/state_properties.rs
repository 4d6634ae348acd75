//! Property-based tests for compositor state invariants
//!
//! These tests verify that state invariants hold across arbitrary sequences of operations.

use nestway::protocol::{Request, XdgPopupRequest};
use nestway::surface::Role;
use proptest::prelude::*;
use smithay::utils::Serial;
use test_harness::assertions::{assert_enter_leave_paired, assert_popup_stack_valid, assert_roles_consistent};
use test_harness::fixtures::{client_with_toplevel, realized_compositor, two_clients_with_pointers};
use test_harness::PopupHandle;

/// What the host pointer does next, over one of the surfaces under test
#[derive(Debug, Clone)]
enum PointerOp {
    MoveTo(usize, f64, f64),
    LeaveAll,
    Press(u32),
    Release(u32),
    ScrollDown,
    /// First client opens a popup on its topmost open popup or toplevel
    OpenPopup { commit: bool, fresh_serial: bool },
    /// First client destroys the popup it opened last
    DestroyPopup,
}

fn pointer_op(surfaces: usize) -> impl Strategy<Value = PointerOp> {
    prop_oneof![
        (0..surfaces, 0.0f64..200.0, 0.0f64..100.0).prop_map(|(i, x, y)| PointerOp::MoveTo(i, x, y)),
        Just(PointerOp::LeaveAll),
        (1u32..4).prop_map(PointerOp::Press),
        (1u32..4).prop_map(PointerOp::Release),
        Just(PointerOp::ScrollDown),
        (any::<bool>(), any::<bool>())
            .prop_map(|(commit, fresh_serial)| PointerOp::OpenPopup { commit, fresh_serial }),
        Just(PointerOp::DestroyPopup),
    ]
}

#[derive(Debug, Clone, Copy)]
enum RoleOp {
    ShellSurface(usize),
    Popup(usize),
    Cursor(usize),
}

fn role_op(surfaces: usize) -> impl Strategy<Value = RoleOp> {
    prop_oneof![
        (0..surfaces).prop_map(RoleOp::ShellSurface),
        (0..surfaces).prop_map(RoleOp::Popup),
        (0..surfaces).prop_map(RoleOp::Cursor),
    ]
}

proptest! {
    /// Each pointer sees enters and leaves alternate, whatever the host does
    #[test]
    fn pointer_enter_leave_always_paired(
        ops in prop::collection::vec(pointer_op(2), 1..40),
    ) {
        let (mut tc, [(first_client, first, first_pointer), (_, second, second_pointer)]) = two_clients_with_pointers();
        let surfaces = [first.surface, second.surface];
        // Where the host believes the pointer is
        let mut inside: Option<usize> = None;
        let mut popups: Vec<PopupHandle> = Vec::new();

        for op in ops {
            match op {
                PointerOp::MoveTo(index, x, y) => {
                    if inside == Some(index) {
                        tc.motion(surfaces[index], x, y);
                    } else {
                        if let Some(old) = inside {
                            tc.pointer_leave(surfaces[old]);
                        }
                        tc.pointer_enter(surfaces[index], x, y);
                        inside = Some(index);
                    }
                }
                PointerOp::LeaveAll => {
                    if let Some(old) = inside.take() {
                        tc.pointer_leave(surfaces[old]);
                    }
                }
                PointerOp::Press(button) => tc.press(inside.map(|i| surfaces[i]), button),
                PointerOp::Release(button) => tc.release(inside.map(|i| surfaces[i]), button),
                PointerOp::ScrollDown => {
                    if let Some(index) = inside {
                        tc.scroll(surfaces[index], nestway::host::ScrollDirection::Down);
                    }
                }
                PointerOp::OpenPopup { commit, fresh_serial } => {
                    let parent = tc
                        .compositor()
                        .shell()
                        .topmost_open_popup()
                        .map_or(Some(first.surface), |p| p.surface);
                    // A popup whose surface is gone cannot parent anything
                    let Some(parent) = parent else { continue };
                    let grab_serial = tc.compositor().seat().pointer().grab_serial();
                    let serial = grab_serial.filter(|_| fresh_serial).unwrap_or(Serial::from(0));
                    let surface = tc.create_surface(&first_client);
                    let xdg_popup = tc.get_xdg_popup(&first_client, surface, parent, serial, (0, 0));
                    if commit {
                        tc.commit_buffer(surface, 20, 20);
                    }
                    popups.push(PopupHandle { surface, xdg_popup });
                }
                PointerOp::DestroyPopup => {
                    if let Some(popup) = popups.pop() {
                        tc.request(Request::XdgPopup(popup.xdg_popup, XdgPopupRequest::Destroy));
                        tc.destroy_surface(popup.surface);
                    }
                }
            }

            assert_popup_stack_valid(&tc);
            // The explicit grab always belongs to a live, open popup
            if let Some(grabbing) = tc.compositor().seat().pointer().grab_popup_surface() {
                let open = tc
                    .compositor()
                    .shell()
                    .popups()
                    .iter()
                    .any(|p| p.surface == Some(grabbing) && !p.dismissed);
                prop_assert!(open, "grab held by {} which is not an open popup", grabbing);
            }
        }

        assert_enter_leave_paired(&tc.pointer_events(first_pointer));
        assert_enter_leave_paired(&tc.pointer_events(second_pointer));
        prop_assert!(tc.errors().is_empty(), "errors: {:?}", tc.errors());
    }

    /// A popup is granted the grab exactly when it carries the grabbing press serial
    #[test]
    fn popup_grab_requires_exact_serial(offset in 0u32..4) {
        let (mut tc, client, toplevel) = client_with_toplevel();
        tc.get_pointer(&client);
        tc.pointer_enter(toplevel.surface, 10.0, 10.0);
        tc.press(Some(toplevel.surface), 1);
        let serial = tc.compositor().seat().pointer().grab_serial().unwrap();

        let popup = tc.map_popup(&client, toplevel.surface, Serial::from(u32::from(serial) + offset), (0, 0), (20, 20));

        prop_assert_eq!(tc.popup_done_sent(popup.xdg_popup), offset != 0);
        prop_assert_eq!(tc.compositor().surface(popup.surface).unwrap().is_mapped(), offset == 0);
        prop_assert_eq!(
            tc.compositor().seat().pointer().grab_popup_surface(),
            (offset == 0).then_some(popup.surface)
        );
    }

    /// A commit with nothing pending changes nothing
    #[test]
    fn repeated_commit_is_idempotent(
        width in 1i32..200,
        height in 1i32..150,
        scale in 1i32..4,
        damage in prop::collection::vec((0i32..400, 0i32..300, 1i32..100, 1i32..100), 0..5),
    ) {
        let mut tc = realized_compositor();
        let client = tc.connect();
        let toplevel = tc.create_toplevel(&client);
        let buffer = tc.shm_buffer(toplevel.surface, width * scale, height * scale);
        tc.attach(toplevel.surface, Some(buffer));
        tc.set_buffer_scale(toplevel.surface, scale);
        for (x, y, w, h) in damage {
            tc.damage(toplevel.surface, x, y, w, h);
        }
        tc.commit(toplevel.surface);
        tc.take_events();
        tc.host_mut().take_calls();

        tc.commit(toplevel.surface);

        prop_assert!(tc.events().is_empty(), "events: {:?}", tc.events());
        prop_assert!(tc.host().calls().is_empty(), "host calls: {:?}", tc.host().calls());
        let surface = tc.compositor().surface(toplevel.surface).unwrap();
        prop_assert_eq!(surface.scale(), scale);
    }

    /// Once a surface has a role it keeps it, and its companions always match it
    #[test]
    fn roles_are_exclusive_and_permanent(
        ops in prop::collection::vec(role_op(4), 1..20),
    ) {
        let (mut tc, client, toplevel) = client_with_toplevel();
        let pointer = tc.get_pointer(&client);
        let surfaces: Vec<_> = (0..4).map(|_| tc.create_surface(&client)).collect();
        let mut roles = vec![Role::None; surfaces.len()];

        for op in ops {
            let (index, wanted) = match op {
                RoleOp::ShellSurface(index) => {
                    tc.get_xdg_surface(&client, surfaces[index]);
                    (index, Role::ShellSurface)
                }
                RoleOp::Popup(index) => {
                    // Serial 0 is never handed out, so the popup is dismissed at once
                    tc.get_xdg_popup(&client, surfaces[index], toplevel.surface, Serial::from(0), (0, 0));
                    (index, Role::Popup)
                }
                RoleOp::Cursor(index) => {
                    tc.set_cursor(pointer, Serial::from(0), Some(surfaces[index]), (0, 0));
                    (index, Role::Cursor)
                }
            };
            if roles[index] == Role::None {
                roles[index] = wanted;
            }

            let actual = tc.compositor().surface(surfaces[index]).unwrap().role();
            prop_assert_eq!(actual, roles[index]);
            assert_roles_consistent(&tc);
            assert_popup_stack_valid(&tc);
        }
    }
}
