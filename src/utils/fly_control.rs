use glam::Vec3;
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

use crate::app::Input;
use crate::scene::CameraRig;

/// Radians of yaw or pitch per pixel of cursor offset, per tick.
pub const LOOK_SENSITIVITY: f32 = 0.00008;

/// First-person fly controller.
///
/// Holding the look button turns the camera at a rate proportional to how
/// far the cursor sits from the window centre. W/S move along the view
/// axis and A/D strafe; W wins over S and A over D when both are held.
#[derive(Debug, Clone)]
pub struct FlyController {
    pub sensitivity: f32,
    /// World units per tick.
    pub speed: f32,
    pub look_button: MouseButton,
}

impl Default for FlyController {
    fn default() -> Self {
        Self {
            sensitivity: LOOK_SENSITIVITY,
            speed: 1.0,
            look_button: MouseButton::Left,
        }
    }
}

impl FlyController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn update(&self, rig: &mut CameraRig, input: &Input) {
        let offset = input.offset_from_center(self.look_button);
        rig.yaw += offset.x * self.sensitivity;
        rig.pitch += offset.y * self.sensitivity;

        let direction = move_direction(input);
        let step = rig
            .inverse_rotation()
            .transform_vector3(direction.normalize_or_zero());
        rig.position += step * self.speed;
    }
}

/// View-space direction from the held WASD keys.
#[must_use]
pub fn move_direction(input: &Input) -> Vec3 {
    let mut direction = Vec3::ZERO;
    if input.is_key_pressed(KeyCode::KeyW) {
        direction.z = -1.0;
    } else if input.is_key_pressed(KeyCode::KeyS) {
        direction.z = 1.0;
    }
    if input.is_key_pressed(KeyCode::KeyA) {
        direction.x = -1.0;
    } else if input.is_key_pressed(KeyCode::KeyD) {
        direction.x = 1.0;
    }
    direction
}
