//! Tests for popup behavior
//!
//! These tests verify popup grab arbitration, the popup stack, dismissal
//! and the host windows backing each popup.

use nestway::state::PointerFocus;
use nestway::surface::Role;
use nestway::ProtocolError;
use smithay::utils::Serial;
use test_harness::assertions::{assert_enter_leave_paired, assert_no_errors, assert_popup_stack_valid, assert_roles_consistent, assert_single_error};
use test_harness::fixtures::toplevel_with_pointer;
use test_harness::headless::POINTER_DEVICE;
use test_harness::{HostCall, PopupHandle, TestClient, TestCompositor, Toplevel};

/// Press on the toplevel and open a 50x30 menu at (10, 20) with the press serial
fn open_menu(tc: &mut TestCompositor, client: &TestClient, toplevel: &Toplevel) -> (PopupHandle, Serial) {
    tc.press(Some(toplevel.surface), 1);
    let serial = tc.compositor().seat().pointer().grab_serial().unwrap();
    let popup = tc.map_popup(client, toplevel.surface, serial, (10, 20), (50, 30));
    tc.release(Some(toplevel.surface), 1);
    (popup, serial)
}

/// A popup created with the serial of the grabbing press takes the grab and maps
#[test]
fn popup_with_press_serial_grabs_and_maps() {
    let (mut tc, client, toplevel, _pointer) = toplevel_with_pointer();
    let parent_window = tc.window_of(toplevel.surface).unwrap();

    let (popup, _) = open_menu(&mut tc, &client, &toplevel);

    let window = tc.window_of(popup.surface).unwrap();
    let calls = tc.host().calls();
    assert!(calls.contains(&HostCall::CreatePopupWindow { window, parent: Some(parent_window) }));
    assert!(calls
        .iter()
        .any(|c| matches!(c, HostCall::GrabPointer { device, window, .. } if *device == POINTER_DEVICE && *window == parent_window)));

    let state = tc.host().window(window).unwrap();
    assert!(state.visible);
    // Parent surface window sits at the toplevel origin (100, 50)
    assert_eq!(state.position, (110, 70).into());
    assert_eq!(state.size, (50, 30).into());

    assert!(!tc.popup_done_sent(popup.xdg_popup));
    assert!(tc.compositor().surface(popup.surface).unwrap().is_mapped());
    assert_eq!(tc.compositor().seat().pointer().focus(), PointerFocus::PopupGrab(popup.surface));
    assert_no_errors(&tc);
}

#[test]
fn popup_damage_redraws_popup_window() {
    let (mut tc, client, toplevel, _pointer) = toplevel_with_pointer();
    let (popup, _) = open_menu(&mut tc, &client, &toplevel);
    let window = tc.window_of(popup.surface).unwrap();
    tc.host_mut().take_calls();

    tc.damage(popup.surface, 1, 2, 3, 4);
    tc.commit(popup.surface);

    assert!(matches!(
        tc.host().calls(),
        [HostCall::QueueDrawWindow(w, region)] if *w == window && region.area() == 12
    ));
    assert!(tc.host().draws().is_empty(), "popup damage must not redraw the widget");
}

/// A stale serial dismisses the popup immediately; it never maps
#[test]
fn stale_serial_dismisses_popup() {
    let (mut tc, client, toplevel, _pointer) = toplevel_with_pointer();

    let popup = tc.map_popup(&client, toplevel.surface, Serial::from(4242), (0, 0), (50, 30));

    assert!(tc.popup_done_sent(popup.xdg_popup));
    assert!(!tc.compositor().surface(popup.surface).unwrap().is_mapped());
    let window = tc.window_of(popup.surface).unwrap();
    assert!(!tc.host().window(window).unwrap().visible);
    assert!(!tc.host().calls().iter().any(|c| matches!(c, HostCall::GrabPointer { .. })));
    assert_no_errors(&tc);
}

/// Releasing a click outside every client surface closes all popups
#[test]
fn click_outside_dismisses_popups() {
    let (mut tc, client, toplevel, _pointer) = toplevel_with_pointer();
    let (popup, _) = open_menu(&mut tc, &client, &toplevel);
    let window = tc.window_of(popup.surface).unwrap();

    tc.pointer_leave(toplevel.surface);
    tc.press(None, 1);
    assert!(!tc.popup_done_sent(popup.xdg_popup), "dismissed on press");
    tc.release(None, 1);

    assert!(tc.popup_done_sent(popup.xdg_popup));
    assert!(tc.host().calls().contains(&HostCall::UngrabPointer(POINTER_DEVICE)));
    assert!(!tc.host().window(window).unwrap().visible);
    assert_eq!(tc.compositor().seat().pointer().focus(), PointerFocus::Idle);
}

#[test]
fn click_inside_client_keeps_popups_open() {
    let (mut tc, client, toplevel, _pointer) = toplevel_with_pointer();
    let (popup, _) = open_menu(&mut tc, &client, &toplevel);

    tc.click(toplevel.surface);

    assert!(!tc.popup_done_sent(popup.xdg_popup));
}

/// Nested popups chain off the topmost popup and stack above it
#[test]
fn nested_popup_stacks_on_parent_popup() {
    let (mut tc, client, toplevel, _pointer) = toplevel_with_pointer();
    let (menu, serial) = open_menu(&mut tc, &client, &toplevel);
    let menu_window = tc.window_of(menu.surface).unwrap();

    let submenu = tc.map_popup(&client, menu.surface, serial, (5, 5), (40, 40));

    let window = tc.window_of(submenu.surface).unwrap();
    let calls = tc.host().calls();
    assert!(calls.contains(&HostCall::CreatePopupWindow { window, parent: Some(menu_window) }));
    assert_eq!(tc.host().window(window).unwrap().position, (115, 75).into());
    assert_eq!(tc.compositor().seat().pointer().focus(), PointerFocus::PopupGrab(submenu.surface));
    assert_popup_stack_valid(&tc);
    assert_roles_consistent(&tc);
    assert_no_errors(&tc);
}

#[test]
fn popup_parent_must_be_topmost() {
    let (mut tc, client, toplevel, _pointer) = toplevel_with_pointer();
    let (_menu, serial) = open_menu(&mut tc, &client, &toplevel);

    let surface = tc.create_surface(&client);
    tc.get_xdg_popup(&client, surface, toplevel.surface, serial, (0, 0));

    let error = assert_single_error(&tc, client.shell);
    assert_eq!(error, ProtocolError::NotTheTopmostPopup { parent: toplevel.surface });
    assert_eq!(tc.compositor().surface(surface).unwrap().role(), Role::None);
}

#[test]
fn dismissed_popups_do_not_block_new_parents() {
    let (mut tc, client, toplevel, _pointer) = toplevel_with_pointer();
    let stale = tc.map_popup(&client, toplevel.surface, Serial::from(4242), (0, 0), (10, 10));
    assert!(tc.popup_done_sent(stale.xdg_popup));

    open_menu(&mut tc, &client, &toplevel);

    assert_no_errors(&tc);
    assert_popup_stack_valid(&tc);
}

#[test]
fn popup_parent_without_shell_role_is_invalid() {
    let (mut tc, client, _toplevel, _pointer) = toplevel_with_pointer();
    let plain = tc.create_surface(&client);
    let surface = tc.create_surface(&client);

    tc.get_xdg_popup(&client, surface, plain, Serial::from(1), (0, 0));

    let error = assert_single_error(&tc, client.shell);
    assert_eq!(error, ProtocolError::InvalidPopupParent { parent: Some(plain) });
}

#[test]
fn shell_surface_cannot_become_popup() {
    let (mut tc, client, toplevel, pointer) = toplevel_with_pointer();
    let other = tc.map_toplevel(&client, 20, 20);
    tc.press(Some(toplevel.surface), 1);
    let serial = tc.last_button_serial(pointer).unwrap();

    tc.get_xdg_popup(&client, other.surface, toplevel.surface, serial, (0, 0));

    let error = assert_single_error(&tc, client.shell);
    assert_eq!(error, ProtocolError::Role { surface: other.surface, existing: Role::ShellSurface });
}

/// Destroying the grabbing popup hands the grab down to the next open one
#[test]
fn destroying_top_popup_returns_grab_to_parent_popup() {
    let (mut tc, client, toplevel, _pointer) = toplevel_with_pointer();
    let (menu, serial) = open_menu(&mut tc, &client, &toplevel);
    let submenu = tc.map_popup(&client, menu.surface, serial, (5, 5), (40, 40));
    tc.host_mut().take_calls();

    tc.request(nestway::protocol::Request::XdgPopup(
        submenu.xdg_popup,
        nestway::protocol::XdgPopupRequest::Destroy,
    ));

    assert_eq!(tc.compositor().seat().pointer().focus(), PointerFocus::PopupGrab(menu.surface));
    assert!(!tc.host().calls().contains(&HostCall::UngrabPointer(POINTER_DEVICE)));
    assert!(tc.compositor().shell().popup(submenu.xdg_popup).is_none());
    assert!(!tc.popup_done_sent(menu.xdg_popup));
}

#[test]
fn refused_host_grab_still_opens_popup() {
    let (mut tc, client, toplevel, _pointer) = toplevel_with_pointer();
    tc.host_mut().refuse_grabs = true;

    let (popup, _) = open_menu(&mut tc, &client, &toplevel);

    assert!(!tc.popup_done_sent(popup.xdg_popup));
    assert!(tc.compositor().surface(popup.surface).unwrap().is_mapped());
}

#[test]
fn popup_before_realize_has_no_window() {
    let mut tc = TestCompositor::new_headless(800, 600);
    let client = tc.connect();
    let toplevel = tc.map_toplevel(&client, 200, 100);
    tc.press(None, 1);
    let serial = tc.compositor().seat().pointer().grab_serial().unwrap();

    let surface = tc.create_surface(&client);
    let xdg_popup = tc.get_xdg_popup(&client, surface, toplevel.surface, serial, (0, 0));

    assert!(tc.window_of(surface).is_err());
    assert!(!tc.host().calls().iter().any(|c| matches!(c, HostCall::CreatePopupWindow { .. } | HostCall::GrabPointer { .. })));
    assert!(!tc.popup_done_sent(xdg_popup));
    assert_eq!(tc.compositor().seat().pointer().focus(), PointerFocus::PopupGrab(surface));
}

/// Take the grab with a popup whose surface never gets a buffer
fn grab_with_unmapped_popup(tc: &mut TestCompositor, client: &TestClient, toplevel: &Toplevel) -> PopupHandle {
    tc.press(Some(toplevel.surface), 1);
    let serial = tc.compositor().seat().pointer().grab_serial().unwrap();
    let surface = tc.create_surface(client);
    let xdg_popup = tc.get_xdg_popup(client, surface, toplevel.surface, serial, (10, 20));
    assert_eq!(tc.compositor().seat().pointer().focus(), PointerFocus::PopupGrab(surface));
    assert!(!tc.compositor().surface(surface).unwrap().is_mapped());
    PopupHandle { surface, xdg_popup }
}

#[test]
fn destroying_unmapped_grabbing_popup_releases_grab() {
    let (mut tc, client, toplevel, _pointer) = toplevel_with_pointer();
    let popup = grab_with_unmapped_popup(&mut tc, &client, &toplevel);
    tc.host_mut().take_calls();

    tc.request(nestway::protocol::Request::XdgPopup(
        popup.xdg_popup,
        nestway::protocol::XdgPopupRequest::Destroy,
    ));
    tc.destroy_surface(popup.surface);

    assert_eq!(tc.compositor().seat().pointer().grab_popup_surface(), None);
    assert!(tc.host().calls().contains(&HostCall::UngrabPointer(POINTER_DEVICE)));

    // Buttons start implicit grabs again
    tc.release(Some(toplevel.surface), 1);
    tc.press(Some(toplevel.surface), 1);
    assert!(tc.compositor().seat().pointer().has_implicit_grab());
    assert_no_errors(&tc);
}

#[test]
fn destroying_unmapped_grabbing_surface_releases_grab() {
    let (mut tc, client, toplevel, _pointer) = toplevel_with_pointer();
    let popup = grab_with_unmapped_popup(&mut tc, &client, &toplevel);
    tc.release(Some(toplevel.surface), 1);
    tc.host_mut().take_calls();

    tc.destroy_surface(popup.surface);

    assert_eq!(tc.compositor().seat().pointer().grab_popup_surface(), None);
    assert_eq!(tc.compositor().seat().pointer().focus(), PointerFocus::EnteredSurface(toplevel.surface));
    assert_eq!(
        tc.host().calls().iter().filter(|c| **c == HostCall::UngrabPointer(POINTER_DEVICE)).count(),
        1
    );
}

#[test]
fn click_outside_dismisses_unmapped_grabbing_popup() {
    let (mut tc, client, toplevel, _pointer) = toplevel_with_pointer();
    let popup = grab_with_unmapped_popup(&mut tc, &client, &toplevel);
    tc.release(Some(toplevel.surface), 1);
    tc.pointer_leave(toplevel.surface);

    tc.press(None, 1);
    tc.release(None, 1);

    assert!(tc.popup_done_sent(popup.xdg_popup));
    assert_eq!(tc.compositor().seat().pointer().grab_popup_surface(), None);
    assert!(tc.host().calls().contains(&HostCall::UngrabPointer(POINTER_DEVICE)));
    assert_eq!(tc.compositor().seat().pointer().focus(), PointerFocus::Idle);

    // A later commit on the dismissed popup does not revive the grab
    tc.commit_buffer(popup.surface, 50, 30);
    assert_eq!(tc.compositor().seat().pointer().grab_popup_surface(), None);
    assert!(tc.compositor().shell().topmost_open_popup().is_none());
}

/// A popup grab that replaces an implicit grab moves focus to where the host pointer is
#[test]
fn popup_grab_catches_up_on_crossings_held_by_implicit_grab() {
    let (mut tc, [(first_client, first, first_pointer), (_, second, second_pointer)]) =
        test_harness::fixtures::two_clients_with_pointers();
    tc.pointer_enter(first.surface, 10.0, 10.0);
    tc.press(Some(first.surface), 1);
    let serial = tc.compositor().seat().pointer().grab_serial().unwrap();
    tc.pointer_leave(first.surface);
    tc.pointer_enter(second.surface, 20.0, 20.0);

    let popup = tc.map_popup(&first_client, first.surface, serial, (0, 0), (50, 30));

    let state = tc.compositor().seat().pointer();
    assert_eq!(state.focus(), PointerFocus::PopupGrab(popup.surface));
    assert_eq!(state.current_surface(), Some(second.surface));

    tc.pointer_leave(second.surface);
    tc.release(None, 1);

    assert_enter_leave_paired(&tc.pointer_events(first_pointer));
    assert_enter_leave_paired(&tc.pointer_events(second_pointer));
    assert!(tc.popup_done_sent(popup.xdg_popup));
    assert_eq!(tc.compositor().seat().pointer().focus(), PointerFocus::Idle);
    assert_no_errors(&tc);
}
