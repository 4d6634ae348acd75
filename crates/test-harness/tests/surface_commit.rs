//! Tests for the surface commit pipeline
//!
//! Buffer attach/release, damage to redraw translation, frame callbacks,
//! scale and input regions.

use nestway::protocol::{BufferEvent, CallbackEvent, Event};
use nestway::region::Region;
use smithay::utils::{Point, Rectangle};
use test_harness::assertions::assert_no_errors;
use test_harness::fixtures::{client_with_toplevel, realized_compositor};
use test_harness::{HostCall, RecordingTarget};

fn rect(x: i32, y: i32, w: i32, h: i32) -> Rectangle<i32, smithay::utils::Logical> {
    Rectangle::new((x, y).into(), (w, h).into())
}

#[test]
fn first_commit_queues_exact_redraw_and_maps() {
    let mut tc = realized_compositor();
    let client = tc.connect();
    let toplevel = tc.create_toplevel(&client);
    tc.host_mut().take_calls();

    tc.commit_buffer(toplevel.surface, 200, 100);

    assert_eq!(tc.host().draws(), vec![Region::from_rect(rect(0, 0, 200, 100))]);
    let surface = tc.compositor().surface(toplevel.surface).unwrap();
    assert!(surface.is_mapped());
    assert_eq!(surface.size(), Some((200, 100).into()));
    assert_no_errors(&tc);
}

#[test]
fn damage_is_translated_by_allocation_origin() {
    let mut tc = realized_compositor();
    tc.size_allocate(rect(30, 40, 800, 600));
    let client = tc.connect();
    let toplevel = tc.create_toplevel(&client);
    tc.host_mut().take_calls();

    tc.commit_buffer(toplevel.surface, 20, 10);

    assert_eq!(tc.host().draws(), vec![Region::from_rect(rect(30, 40, 20, 10))]);
}

#[test]
fn replacing_buffer_releases_previous_one() {
    let (mut tc, _client, toplevel) = client_with_toplevel();
    let first = tc.compositor().surface(toplevel.surface).unwrap().buffer().copied().unwrap();

    let second = tc.commit_buffer(toplevel.surface, 150, 100);

    assert!(tc.events_for(first.id).contains(&Event::Buffer(BufferEvent::Release)));
    assert!(tc.events_for(second.id).is_empty());
}

#[test]
fn shrinking_buffer_damages_vacated_area() {
    let (mut tc, _client, toplevel) = client_with_toplevel();
    tc.host_mut().take_calls();

    let buffer = tc.shm_buffer(toplevel.surface, 150, 100);
    tc.attach(toplevel.surface, Some(buffer));
    tc.commit(toplevel.surface);

    let draws = tc.host().draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0], Region::from_rect(rect(150, 0, 50, 100)));
}

#[test]
fn repeated_commit_without_changes_is_idempotent() {
    let (mut tc, _client, toplevel) = client_with_toplevel();
    tc.take_events();
    tc.host_mut().take_calls();

    tc.commit(toplevel.surface);
    tc.commit(toplevel.surface);

    assert!(tc.events().is_empty(), "unexpected events: {:?}", tc.events());
    assert!(tc.host().calls().is_empty(), "unexpected host calls: {:?}", tc.host().calls());
    assert!(tc.compositor().surface(toplevel.surface).unwrap().is_mapped());
}

#[test]
fn frame_callbacks_fire_on_draw_after_commit() {
    let (mut tc, _client, toplevel) = client_with_toplevel();
    tc.host_mut().frame_time = 4242;
    let callback = tc.frame(toplevel.surface);

    let mut target = RecordingTarget::default();
    tc.compositor_mut().draw(&mut target);
    assert!(tc.events_for(callback).is_empty(), "pending callback fired before commit");

    tc.commit(toplevel.surface);
    tc.compositor_mut().draw(&mut target);

    assert_eq!(tc.events_for(callback), vec![Event::Callback(CallbackEvent::Done { time: 4242 })]);
    assert!(tc.registry().destroyed().contains(&callback));
    assert!(!tc.registry().is_live(callback));
}

#[test]
fn draw_paints_shell_surfaces_at_origin() {
    let (mut tc, client, first) = client_with_toplevel();
    let second = tc.map_toplevel(&client, 50, 50);

    let mut target = RecordingTarget::default();
    tc.compositor_mut().draw(&mut target);

    let painted: Vec<_> = target.painted.iter().map(|(b, scale, pos)| (b.id, *scale, *pos)).collect();
    let first_buffer = tc.compositor().surface(first.surface).unwrap().buffer().unwrap().id;
    let second_buffer = tc.compositor().surface(second.surface).unwrap().buffer().unwrap().id;
    assert_eq!(
        painted,
        vec![
            (first_buffer, 1, Point::from((0, 0))),
            (second_buffer, 1, Point::from((0, 0))),
        ]
    );
}

#[test]
fn buffer_scale_divides_logical_size() {
    let mut tc = realized_compositor();
    let client = tc.connect();
    let toplevel = tc.create_toplevel(&client);

    tc.set_buffer_scale(toplevel.surface, 2);
    tc.commit_buffer(toplevel.surface, 400, 200);
    assert_eq!(tc.compositor().surface(toplevel.surface).unwrap().size(), Some((200, 100).into()));

    // Non-positive scales are never applied
    tc.set_buffer_scale(toplevel.surface, 0);
    tc.commit(toplevel.surface);
    let surface = tc.compositor().surface(toplevel.surface).unwrap();
    assert_eq!(surface.scale(), 2);
    assert_eq!(surface.pending().scale, 1);
    assert_no_errors(&tc);
}

#[test]
fn input_region_is_copied_and_applied_on_commit() {
    let (mut tc, client, toplevel) = client_with_toplevel();
    let region = tc.create_region(&client, &[rect(0, 0, 50, 50)]);

    tc.set_input_region(toplevel.surface, Some(region));
    assert!(
        tc.compositor().surface_accepts_input(toplevel.surface, (60.0, 60.0).into()),
        "input region applied before commit"
    );

    // Later edits to the region object do not leak into the surface
    tc.request(nestway::protocol::Request::Region(
        region,
        nestway::protocol::RegionRequest::Add { x: 0, y: 0, width: 200, height: 100 },
    ));
    tc.commit(toplevel.surface);

    let compositor = tc.compositor();
    assert!(compositor.surface_accepts_input(toplevel.surface, (10.0, 10.0).into()));
    assert!(!compositor.surface_accepts_input(toplevel.surface, (60.0, 60.0).into()));

    tc.set_input_region(toplevel.surface, None);
    tc.commit(toplevel.surface);
    assert!(tc.compositor().surface_accepts_input(toplevel.surface, (60.0, 60.0).into()));
}

#[test]
fn destroying_surface_destroys_its_callbacks() {
    let (mut tc, _client, toplevel) = client_with_toplevel();
    let current = tc.frame(toplevel.surface);
    tc.commit(toplevel.surface);
    let pending = tc.frame(toplevel.surface);

    tc.destroy_surface(toplevel.surface);

    let destroyed = tc.registry().destroyed();
    assert!(destroyed.contains(&current));
    assert!(destroyed.contains(&pending));
    assert!(destroyed.contains(&toplevel.surface));
    assert!(tc.events_for(current).is_empty());
    assert!(tc.compositor().surface(toplevel.surface).is_none());
}

#[test]
fn destroyed_buffer_is_forgotten() {
    let (mut tc, _client, toplevel) = client_with_toplevel();
    let buffer = tc.compositor().surface(toplevel.surface).unwrap().buffer().copied().unwrap();

    tc.compositor_mut().buffer_destroyed(buffer.id);

    assert!(tc.compositor().surface(toplevel.surface).unwrap().buffer().is_none());
    let mut target = RecordingTarget::default();
    tc.compositor_mut().draw(&mut target);
    assert!(target.painted.is_empty());
}

#[test]
fn failed_allocation_posts_no_memory() {
    let mut tc = realized_compositor();
    let client = tc.connect();

    tc.registry_mut().fail_next_creations(1);
    let surface = tc.create_surface(&client);

    assert_eq!(tc.registry().no_memory(), &[client.id]);
    assert!(tc.compositor().surface(surface).is_none());
}

#[test]
fn unmapping_toplevel_redraws_whole_widget() {
    let (mut tc, _client, toplevel) = client_with_toplevel();
    let window = tc.window_of(toplevel.surface).unwrap();
    tc.host_mut().take_calls();

    tc.destroy_xdg_surface(toplevel.xdg_surface);

    let calls = tc.host().calls();
    assert!(calls.contains(&HostCall::DestroyWindow(window)));
    assert_eq!(tc.host().draws(), vec![Region::from_rect(rect(0, 0, 800, 600))]);
    assert!(!tc.compositor().surface(toplevel.surface).unwrap().is_mapped());
}
