//! Test fixtures for common test scenarios

use crate::headless::{TestClient, TestCompositor, Toplevel};

/// Standard widget allocation
pub const TEST_WIDTH: i32 = 800;
pub const TEST_HEIGHT: i32 = 600;

/// Standard toplevel buffer size
pub const TOPLEVEL_WIDTH: i32 = 200;
pub const TOPLEVEL_HEIGHT: i32 = 100;

/// A realized, focused widget with no clients
pub fn realized_compositor() -> TestCompositor {
    let mut tc = TestCompositor::new_headless(TEST_WIDTH, TEST_HEIGHT);
    tc.realize();
    tc.focus_in();
    tc
}

/// One client with a mapped 200x100 toplevel
pub fn client_with_toplevel() -> (TestCompositor, TestClient, Toplevel) {
    let mut tc = realized_compositor();
    let client = tc.connect();
    let toplevel = tc.map_toplevel(&client, TOPLEVEL_WIDTH, TOPLEVEL_HEIGHT);
    (tc, client, toplevel)
}

/// Mapped toplevel whose client bound a pointer, with the pointer inside it
///
/// Returns: (compositor, client, toplevel, wl_pointer)
pub fn toplevel_with_pointer() -> (TestCompositor, TestClient, Toplevel, nestway::protocol::ObjectId) {
    let (mut tc, client, toplevel) = client_with_toplevel();
    let pointer = tc.get_pointer(&client);
    tc.pointer_enter(toplevel.surface, 10.0, 10.0);
    (tc, client, toplevel, pointer)
}

/// Two clients, each with a mapped toplevel, and a pointer each
///
/// Returns: (compositor, [(client, toplevel, wl_pointer); 2])
pub fn two_clients_with_pointers() -> (TestCompositor, [(TestClient, Toplevel, nestway::protocol::ObjectId); 2]) {
    let mut tc = realized_compositor();
    let first = tc.connect();
    let first_toplevel = tc.map_toplevel(&first, TOPLEVEL_WIDTH, TOPLEVEL_HEIGHT);
    let first_pointer = tc.get_pointer(&first);
    let second = tc.connect();
    let second_toplevel = tc.map_toplevel(&second, TOPLEVEL_WIDTH, TOPLEVEL_HEIGHT);
    let second_pointer = tc.get_pointer(&second);
    (
        tc,
        [
            (first, first_toplevel, first_pointer),
            (second, second_toplevel, second_pointer),
        ],
    )
}
