//! Full-screen passes and the sky.

use std::rc::Rc;

use super::{Material, Node, SimpleMesh, UniformHandle};
use crate::errors::Result;
use crate::renderer::GpuDevice;
use crate::resources::{Shader, UniformSet, primitives};

/// Draws a screen-covering quad with `shader`.
///
/// Wrap it in a [`RenderTarget`](super::RenderTarget) to chain passes: each
/// stage samples the previous stage's framebuffer through a texture uniform.
pub struct PostProcess {
    children: Vec<Box<dyn Node>>,
    uniforms: UniformHandle,
}

impl PostProcess {
    pub fn new(device: &mut dyn GpuDevice, shader: Rc<Shader>, uniforms: UniformSet) -> Result<Self> {
        let mesh = SimpleMesh::from_positions(device, &primitives::screen_quad())?;
        let material = Material::new(shader, uniforms, crate::nodes![mesh]);
        Ok(Self {
            uniforms: material.handle(),
            children: crate::nodes![material],
        })
    }

    #[must_use]
    pub fn uniforms(&self) -> UniformHandle {
        Rc::clone(&self.uniforms)
    }
}

impl Node for PostProcess {
    fn children(&self) -> &[Box<dyn Node>] {
        &self.children
    }
}

/// Unit cube drawn with a sky shader. Place it under a
/// [`Transform`](super::Transform) scaled to the far plane.
pub struct Skybox {
    children: Vec<Box<dyn Node>>,
    uniforms: UniformHandle,
}

impl Skybox {
    pub fn new(device: &mut dyn GpuDevice, shader: Rc<Shader>, uniforms: UniformSet) -> Result<Self> {
        let mesh = SimpleMesh::from_positions(device, &primitives::cube())?;
        let material = Material::new(shader, uniforms, crate::nodes![mesh]);
        Ok(Self {
            uniforms: material.handle(),
            children: crate::nodes![material],
        })
    }

    #[must_use]
    pub fn uniforms(&self) -> UniformHandle {
        Rc::clone(&self.uniforms)
    }
}

impl Node for Skybox {
    fn children(&self) -> &[Box<dyn Node>] {
        &self.children
    }
}
