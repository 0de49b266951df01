//! Camera, Controls and Clock Tests
//!
//! Tests for:
//! - CameraRig view / projection conventions
//! - Eye offsets under stereo
//! - Input state tracking and focus loss
//! - FlyController look and WASD priorities
//! - Clock ticking, pacing and XR session shutdown

use std::time::{Duration, Instant};

use glam::{Mat4, Vec2, Vec3, Vec4};
use winit::event::{ElementState, MouseButton};
use winit::keyboard::KeyCode;

use arbor::scene::camera::XR_WORLD_SCALE;
use arbor::scene::{CameraRig, Eye, EyeView, SideBySideSession, XrSession};
use arbor::utils::fly_control::{LOOK_SENSITIVITY, move_direction};
use arbor::utils::time::{FALLBACK_INTERVAL, FramePacing};
use arbor::{Clock, FlyController, Input, Viewport};

const EPSILON: f32 = 1e-4;

fn input_with_keys(keys: &[KeyCode]) -> Input {
    let mut input = Input::new();
    input.handle_resize(800, 600);
    for key in keys {
        input.handle_key(ElementState::Pressed, *key);
    }
    input
}

// ============================================================================
// CameraRig
// ============================================================================

#[test]
fn point_ahead_projects_to_screen_centre() {
    let rig = CameraRig::at(Vec3::new(0.0, 0.0, 10.0));
    let ndc = rig.project(
        Vec4::new(0.0, 0.0, -10.0, 1.0),
        Viewport::full(800, 600),
        None,
    );
    assert!(ndc.x.abs() < EPSILON && ndc.y.abs() < EPSILON, "got {ndc}");
    assert!(ndc.z > 0.0 && ndc.z < 1.0, "depth {}", ndc.z);
}

#[test]
fn point_behind_near_plane_leaves_depth_range() {
    let rig = CameraRig::default();
    let ndc = rig.project(Vec4::new(0.0, 0.0, -0.1, 1.0), Viewport::full(800, 600), None);
    assert!(ndc.z < 0.0, "depth {}", ndc.z);
}

#[test]
fn yaw_turns_the_view_about_y() {
    let rig = CameraRig {
        yaw: std::f32::consts::FRAC_PI_2,
        ..Default::default()
    };
    // A quarter turn about Y brings the +X axis onto the view axis (-Z).
    let view = rig.world_view(None);
    let seen = view.transform_point3(Vec3::new(1.0, 0.0, 0.0));
    assert!(seen.abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), EPSILON), "got {seen}");
}

#[test]
fn world_view_moves_eye_to_origin() {
    let rig = CameraRig {
        position: Vec3::new(3.0, 4.0, 5.0),
        pitch: 0.3,
        yaw: -1.2,
        ..Default::default()
    };
    let origin = rig.world_view(None).transform_point3(rig.position);
    assert!(origin.length() < EPSILON);
}

#[test]
fn inverse_rotation_maps_forward_to_world() {
    let rig = CameraRig {
        yaw: std::f32::consts::FRAC_PI_2,
        ..Default::default()
    };
    let forward = rig.inverse_rotation().transform_vector3(Vec3::NEG_Z);
    assert!(forward.abs_diff_eq(Vec3::X, EPSILON), "got {forward}");
}

#[test]
fn stereo_eye_adds_scaled_head_offset() {
    let rig = CameraRig::at(Vec3::new(10.0, 0.0, 0.0));
    let projection = Mat4::perspective_rh(1.0, 1.0, 0.1, 10.0);
    let view = EyeView {
        eye: Eye::Left,
        projection,
        transform: Mat4::from_translation(Vec3::new(-0.5, 0.0, 0.0)),
        viewport: Viewport::new(0, 0, 400, 600),
    };

    let eye = rig.eye_position(Some(&view));
    assert!(eye.abs_diff_eq(Vec3::new(10.0 - 0.5 * XR_WORLD_SCALE, 0.0, 0.0), EPSILON));
    assert_eq!(rig.projection(Viewport::full(800, 600), Some(&view)), projection);
}

// ============================================================================
// Input
// ============================================================================

#[test]
fn cursor_is_clamped_to_window() {
    let mut input = Input::new();
    input.handle_resize(800, 600);
    input.handle_cursor_move(1000.0, -20.0);
    assert_eq!(input.cursor_position, Vec2::new(800.0, 0.0));
}

#[test]
fn cursor_delta_accumulates_until_frame_end() {
    let mut input = Input::new();
    input.handle_resize(800, 600);
    input.handle_cursor_move(100.0, 100.0);
    input.handle_cursor_move(110.0, 90.0);
    input.handle_cursor_move(120.0, 95.0);
    assert_eq!(input.cursor_delta, Vec2::new(20.0, -5.0));
    input.end_frame();
    assert_eq!(input.cursor_delta, Vec2::ZERO);
}

#[test]
fn focus_loss_releases_everything() {
    let mut input = input_with_keys(&[KeyCode::KeyW, KeyCode::KeyA]);
    input.handle_mouse_input(ElementState::Pressed, MouseButton::Left);
    assert!(input.is_key_pressed(KeyCode::KeyW));

    input.handle_focus(false);
    assert!(!input.is_key_pressed(KeyCode::KeyW));
    assert!(!input.is_key_pressed(KeyCode::KeyA));
    assert!(!input.is_button_pressed(MouseButton::Left));
}

#[test]
fn look_offset_needs_the_button() {
    let mut input = Input::new();
    input.handle_resize(800, 600);
    input.handle_cursor_move(500.0, 250.0);
    assert_eq!(input.offset_from_center(MouseButton::Left), Vec2::ZERO);

    input.handle_mouse_input(ElementState::Pressed, MouseButton::Left);
    assert_eq!(
        input.offset_from_center(MouseButton::Left),
        Vec2::new(100.0, -50.0)
    );
}

// ============================================================================
// FlyController
// ============================================================================

#[test]
fn forward_wins_over_backward() {
    let input = input_with_keys(&[KeyCode::KeyW, KeyCode::KeyS]);
    assert_eq!(move_direction(&input), Vec3::new(0.0, 0.0, -1.0));

    let input = input_with_keys(&[KeyCode::KeyS]);
    assert_eq!(move_direction(&input), Vec3::new(0.0, 0.0, 1.0));
}

#[test]
fn left_wins_over_right() {
    let input = input_with_keys(&[KeyCode::KeyA, KeyCode::KeyD]);
    assert_eq!(move_direction(&input), Vec3::new(-1.0, 0.0, 0.0));

    let input = input_with_keys(&[KeyCode::KeyD]);
    assert_eq!(move_direction(&input), Vec3::new(1.0, 0.0, 0.0));
}

#[test]
fn controller_moves_along_view_axis() {
    let controller = FlyController::new().with_speed(2.0);
    let mut rig = CameraRig::default();

    controller.update(&mut rig, &input_with_keys(&[KeyCode::KeyW]));
    assert!(rig.position.abs_diff_eq(Vec3::new(0.0, 0.0, -2.0), EPSILON));

    rig.yaw = std::f32::consts::FRAC_PI_2;
    rig.position = Vec3::ZERO;
    controller.update(&mut rig, &input_with_keys(&[KeyCode::KeyW]));
    assert!(rig.position.abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), EPSILON), "got {}", rig.position);
}

#[test]
fn diagonal_movement_is_normalised() {
    let controller = FlyController::new();
    let mut rig = CameraRig::default();
    controller.update(&mut rig, &input_with_keys(&[KeyCode::KeyW, KeyCode::KeyD]));
    assert!((rig.position.length() - 1.0).abs() < EPSILON);
}

#[test]
fn controller_turns_by_cursor_offset() {
    let controller = FlyController::new();
    let mut rig = CameraRig::default();
    let mut input = Input::new();
    input.handle_resize(800, 600);
    input.handle_cursor_move(600.0, 200.0);
    input.handle_mouse_input(ElementState::Pressed, MouseButton::Left);

    controller.update(&mut rig, &input);
    assert!((rig.yaw - 200.0 * LOOK_SENSITIVITY).abs() < 1e-7);
    assert!((rig.pitch + 100.0 * LOOK_SENSITIVITY).abs() < 1e-7);
    assert_eq!(rig.position, Vec3::ZERO);
}

// ============================================================================
// Clock
// ============================================================================

#[test]
fn clock_ticks_only_while_running() {
    let mut clock = Clock::default();
    assert!(clock.tick().is_none());

    clock.start();
    assert!(clock.is_running());
    assert!(clock.tick().is_some());
    assert_eq!(clock.frame_count, 1);

    clock.stop();
    assert!(clock.tick().is_none());
    assert_eq!(clock.frame_count, 1);
}

#[test]
fn tick_reports_seconds_between_ticks() {
    let mut clock = Clock::default();
    clock.start();
    let base = Instant::now();

    let first = clock.tick_at(base + Duration::from_millis(500)).unwrap();
    assert!(first >= 0.5 && first < 0.6, "first {first}");

    let second = clock.tick_at(base + Duration::from_millis(750)).unwrap();
    assert!((second - 0.25).abs() < 1e-4, "second {second}");
    assert!(clock.elapsed_seconds() >= 0.75);

    let backwards = clock.tick_at(base).unwrap();
    assert_eq!(backwards, 0.0);
}

#[test]
fn pacing_deadlines() {
    let display = Clock::new(FramePacing::Display);
    assert!(display.next_deadline().is_none());

    let mut timed = Clock::new(FramePacing::fallback());
    assert_eq!(timed.pacing(), FramePacing::Timer(FALLBACK_INTERVAL));
    timed.start();
    let now = Instant::now();
    timed.tick_at(now);
    assert_eq!(timed.next_deadline(), Some(now + Duration::from_millis(16)));
}

#[test]
fn stopping_the_clock_ends_the_session() {
    let mut clock = Clock::default();
    clock.attach_session(Box::new(SideBySideSession::new(800, 600)));
    clock.start();
    clock.tick();

    let frame = clock.xr_frame().unwrap();
    assert_eq!(frame.views.len(), 2);

    clock.stop();
    assert!(!clock.session().unwrap().is_active());
    assert!(clock.xr_frame().is_none());
}

// ============================================================================
// Side-by-side session
// ============================================================================

#[test]
fn side_by_side_splits_the_window() {
    let mut session = SideBySideSession::new(1000, 500);
    session.set_depth_range(1.0, 100.0);
    let frame = session.request_frame(0.0).unwrap();

    let [left, right] = frame.views.as_slice() else {
        panic!("expected two views");
    };
    assert_eq!(left.eye, Eye::Left);
    assert_eq!(right.eye, Eye::Right);
    assert_eq!(left.viewport, Viewport::new(0, 0, 500, 500));
    assert_eq!(right.viewport, Viewport::new(500, 0, 500, 500));
    assert!(left.position().x < 0.0 && right.position().x > 0.0);
    assert!(
        (right.position().x - left.position().x - session.eye_separation).abs() < 1e-6
    );

    session.end();
    assert!(session.request_frame(1.0).is_none());
}
