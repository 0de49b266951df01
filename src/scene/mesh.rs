use std::rc::Rc;

use smallvec::SmallVec;

use super::{Graph, Node, XrFrame};
use crate::errors::{ArborError, Result};
use crate::renderer::GpuDevice;
use crate::resources::VertexBuffer;

/// Attribute whose buffer sizes the draw call.
pub const POSITION: &str = "position";

/// Leaf that draws named vertex buffers with the active shader.
///
/// The visible uniform scope is sent to the shader first, then each buffer
/// is attached to the location the shader reports for its name, the
/// triangles are drawn, and every buffer is detached again. Buffers the
/// shader has no input for are skipped.
#[derive(Default)]
pub struct SimpleMesh {
    attributes: Vec<(String, Rc<VertexBuffer>)>,
}

impl SimpleMesh {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mesh with a single `position` buffer uploaded from `positions`.
    pub fn from_positions(device: &mut dyn GpuDevice, positions: &[f32]) -> Result<Self> {
        let buffer = VertexBuffer::new(device, positions)?;
        Ok(Self::new().with_attribute(POSITION, Rc::new(buffer)))
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, buffer: Rc<VertexBuffer>) -> Self {
        let name = name.into();
        self.attributes.retain(|(n, _)| *n != name);
        self.attributes.push((name, buffer));
        self
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Rc<VertexBuffer>> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, buffer)| buffer)
    }
}

impl Node for SimpleMesh {
    fn enter(&self, graph: &mut Graph, _frame: Option<&XrFrame>) -> Result<()> {
        let shader = graph.shader().ok_or(ArborError::NoActiveShader)?;
        let positions = self
            .attribute(POSITION)
            .ok_or_else(|| ArborError::MissingAttribute(POSITION.into()))?;

        let flat = graph.flattened_uniforms();
        let device = graph.device();
        shader.set_uniforms(device, flat.iter().map(|(n, v)| (n.as_str(), v)));

        let mut bound: SmallVec<[(u32, &VertexBuffer); 4]> = SmallVec::new();
        for (name, buffer) in &self.attributes {
            match shader.attribute_location(device, name) {
                Some(location) => {
                    buffer.bind(device, location);
                    bound.push((location, buffer.as_ref()));
                }
                None => log::trace!("Shader '{}' has no input '{name}'", shader.label()),
            }
        }

        let drawn = positions.draw_triangles(device);
        for (location, buffer) in bound {
            buffer.unbind(device, location);
        }
        drawn
    }
}
