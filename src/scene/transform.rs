use std::cell::Cell;

use glam::{Mat4, Vec3};

use super::{CameraHandle, Graph, Node, XrFrame};
use crate::errors::Result;
use crate::renderer::CullFace;

pub const MODEL_TRANSFORM: &str = "modelTransform";

/// Composes a local matrix onto the inherited `modelTransform`.
///
/// On enter, a new scope is pushed holding `parent * local`, or `local` alone
/// when no ancestor set one.
pub struct Transform {
    pub matrix: Mat4,
    children: Vec<Box<dyn Node>>,
}

impl Transform {
    #[must_use]
    pub fn new(children: Vec<Box<dyn Node>>) -> Self {
        Self {
            matrix: Mat4::IDENTITY,
            children,
        }
    }

    #[must_use]
    pub fn with_matrix(mut self, matrix: Mat4) -> Self {
        self.matrix = matrix;
        self
    }

    pub fn append(&mut self, child: impl Node + 'static) {
        self.children.push(Box::new(child));
    }

    /// Post-multiplies a translation, applied before what is already there.
    pub fn translate(&mut self, offset: Vec3) {
        self.matrix *= Mat4::from_translation(offset);
    }

    /// Post-multiplies a scale.
    pub fn scale(&mut self, factor: Vec3) {
        self.matrix *= Mat4::from_scale(factor);
    }

    pub fn rotate_y(&mut self, angle: f32) {
        self.matrix *= Mat4::from_rotation_y(angle);
    }
}

impl Node for Transform {
    fn enter(&self, graph: &mut Graph, _frame: Option<&XrFrame>) -> Result<()> {
        graph.push_uniforms();
        let composed = match graph.uniform(MODEL_TRANSFORM).and_then(|v| v.as_mat4()) {
            Some(parent) => parent * self.matrix,
            None => self.matrix,
        };
        graph.set_uniform(MODEL_TRANSFORM, composed);
        Ok(())
    }

    fn exit(&self, graph: &mut Graph, _frame: Option<&XrFrame>) -> Result<()> {
        graph.pop_uniforms()
    }

    fn children(&self) -> &[Box<dyn Node>] {
        &self.children
    }
}

/// Transform that flips Y and culls front faces while its subtree draws.
///
/// The flip reverses triangle winding, so swapping the culled face keeps
/// back-face culling correct for the reflected geometry.
pub struct Mirror {
    transform: Transform,
    previous: Cell<CullFace>,
}

impl Mirror {
    #[must_use]
    pub fn new(children: Vec<Box<dyn Node>>) -> Self {
        Self {
            transform: Transform::new(children).with_matrix(Self::flip()),
            previous: Cell::new(CullFace::Back),
        }
    }

    /// Places the mirror plane with `matrix`. The flip stays innermost, so
    /// the result is `matrix * flip`.
    #[must_use]
    pub fn with_matrix(mut self, matrix: Mat4) -> Self {
        self.transform.matrix = matrix * Self::flip();
        self
    }

    fn flip() -> Mat4 {
        Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0))
    }

    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        self.transform.matrix
    }
}

impl Node for Mirror {
    fn enter(&self, graph: &mut Graph, frame: Option<&XrFrame>) -> Result<()> {
        self.previous.set(graph.set_cull_face(CullFace::Front));
        self.transform.enter(graph, frame)
    }

    fn exit(&self, graph: &mut Graph, frame: Option<&XrFrame>) -> Result<()> {
        graph.set_cull_face(self.previous.get());
        self.transform.exit(graph, frame)
    }

    fn children(&self) -> &[Box<dyn Node>] {
        self.transform.children()
    }
}

/// Places its subtree in the camera's frame, ignoring the inherited model
/// transform: `modelTransform = inverse(camera view) * local`.
///
/// Used for geometry that travels with the viewer, such as a cockpit.
pub struct CameraFixTransform {
    pub matrix: Mat4,
    camera: CameraHandle,
    children: Vec<Box<dyn Node>>,
}

impl CameraFixTransform {
    #[must_use]
    pub fn new(camera: CameraHandle, children: Vec<Box<dyn Node>>) -> Self {
        Self {
            matrix: Mat4::IDENTITY,
            camera,
            children,
        }
    }

    #[must_use]
    pub fn with_matrix(mut self, matrix: Mat4) -> Self {
        self.matrix = matrix;
        self
    }
}

impl Node for CameraFixTransform {
    fn enter(&self, graph: &mut Graph, frame: Option<&XrFrame>) -> Result<()> {
        graph.push_uniforms();
        let view = frame.and(graph.current_view());
        let world_view = self.camera.borrow().world_view(view);
        graph.set_uniform(MODEL_TRANSFORM, world_view.inverse() * self.matrix);
        Ok(())
    }

    fn exit(&self, graph: &mut Graph, _frame: Option<&XrFrame>) -> Result<()> {
        graph.pop_uniforms()
    }

    fn children(&self) -> &[Box<dyn Node>] {
        &self.children
    }
}
