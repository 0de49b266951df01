//! First-person camera.
//!
//! [`CameraRig`] holds the pose and lens; it lives behind a shared
//! [`CameraHandle`] so a controller can steer it and a
//! [`CameraFixTransform`](super::CameraFixTransform) can follow it while the
//! [`Camera`] node owns the subtree it projects.

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Mat4, Vec3, Vec4};

use super::{EyeView, Graph, Node, XrFrame};
use crate::errors::Result;
use crate::math::{inverse_rotation, perspective, project_point};
use crate::renderer::Viewport;

pub const PROJECTION: &str = "projection";
pub const EYE: &str = "eye";

/// Scale from tracking-space metres to world units under VR.
pub const XR_WORLD_SCALE: f32 = 200.0;

/// Camera pose and lens parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraRig {
    pub position: Vec3,
    /// Rotation about X in radians.
    pub pitch: f32,
    /// Rotation about Y in radians.
    pub yaw: f32,
    pub near: f32,
    pub far: f32,
    /// Vertical field of view in degrees.
    pub fov: f32,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            pitch: 0.0,
            yaw: 0.0,
            near: 0.5,
            far: 5000.0,
            fov: 50.0,
        }
    }
}

pub type CameraHandle = Rc<RefCell<CameraRig>>;

impl CameraRig {
    #[must_use]
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn into_handle(self) -> CameraHandle {
        Rc::new(RefCell::new(self))
    }

    /// Rig position plus the tracked head offset under VR.
    #[must_use]
    pub fn eye_position(&self, view: Option<&EyeView>) -> Vec3 {
        match view {
            Some(view) => self.position + view.position() * XR_WORLD_SCALE,
            None => self.position,
        }
    }

    /// World-to-view matrix.
    ///
    /// Rotations are applied after moving the eye to the origin:
    /// `rotate_x(pitch) * rotate_y(yaw) * translate(-eye)`. Under VR the
    /// rotation is the inverse of the eye pose instead.
    #[must_use]
    pub fn world_view(&self, view: Option<&EyeView>) -> Mat4 {
        let eye = self.eye_position(view);
        let rotation = match view {
            Some(view) => inverse_rotation(&view.transform),
            None => Mat4::from_rotation_x(self.pitch) * Mat4::from_rotation_y(self.yaw),
        };
        rotation * Mat4::from_translation(-eye)
    }

    /// Perspective for `viewport`, or the eye's own projection under VR.
    #[must_use]
    pub fn projection(&self, viewport: Viewport, view: Option<&EyeView>) -> Mat4 {
        match view {
            Some(view) => view.projection,
            None => perspective(self.fov, viewport.aspect(), self.near, self.far),
        }
    }

    /// `projection * world_view`.
    #[must_use]
    pub fn view_projection(&self, viewport: Viewport, view: Option<&EyeView>) -> Mat4 {
        self.projection(viewport, view) * self.world_view(view)
    }

    /// World point to normalised device coordinates.
    #[must_use]
    pub fn project(&self, point: Vec4, viewport: Viewport, view: Option<&EyeView>) -> Vec4 {
        project_point(&self.view_projection(viewport, view), point)
    }

    /// Rotation that takes view-space directions back to world space.
    #[must_use]
    pub fn inverse_rotation(&self) -> Mat4 {
        inverse_rotation(&self.world_view(None))
    }
}

/// Publishes `projection` and `eye` to its subtree.
pub struct Camera {
    rig: CameraHandle,
    children: Vec<Box<dyn Node>>,
}

impl Camera {
    #[must_use]
    pub fn new(children: Vec<Box<dyn Node>>) -> Self {
        Self::with_rig(CameraRig::default().into_handle(), children)
    }

    #[must_use]
    pub fn with_rig(rig: CameraHandle, children: Vec<Box<dyn Node>>) -> Self {
        Self { rig, children }
    }

    /// Shared handle on the pose, for controllers and camera-fixed geometry.
    #[must_use]
    pub fn rig(&self) -> CameraHandle {
        Rc::clone(&self.rig)
    }

    pub fn append(&mut self, child: impl Node + 'static) {
        self.children.push(Box::new(child));
    }
}

impl Node for Camera {
    fn enter(&self, graph: &mut Graph, frame: Option<&XrFrame>) -> Result<()> {
        let view = frame.and(graph.current_view()).cloned();
        let (projection, eye) = {
            let rig = self.rig.borrow();
            (
                rig.view_projection(graph.viewport(), view.as_ref()),
                rig.eye_position(view.as_ref()),
            )
        };
        graph.push_uniforms();
        graph.set_uniform(PROJECTION, projection);
        graph.set_uniform(EYE, eye);
        Ok(())
    }

    fn exit(&self, graph: &mut Graph, _frame: Option<&XrFrame>) -> Result<()> {
        graph.pop_uniforms()
    }

    fn children(&self) -> &[Box<dyn Node>] {
        &self.children
    }
}
