//! Linear algebra helpers.
//!
//! The engine uses [`glam`] value types directly. This module only adds the
//! handful of conversions the scene graph needs on top of them.

pub use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

/// Perspective projection from a vertical field of view in **degrees**.
///
/// Depth maps to `0..1`, matching the wgpu clip space.
#[must_use]
pub fn perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    Mat4::perspective_rh(fov_degrees.to_radians(), aspect, near, far)
}

/// Rotation-only inverse of a view matrix, widened back to 4x4.
///
/// Assumes the upper 3x3 is a pure rotation, so the inverse is the transpose.
#[must_use]
pub fn inverse_rotation(view: &Mat4) -> Mat4 {
    Mat4::from_mat3(Mat3::from_mat4(*view).transpose())
}

/// Transforms a homogeneous point and divides by `w`.
#[must_use]
pub fn project_point(matrix: &Mat4, point: Vec4) -> Vec4 {
    let projected = *matrix * point;
    if projected.w.abs() <= f32::EPSILON {
        return projected;
    }
    projected / projected.w
}
