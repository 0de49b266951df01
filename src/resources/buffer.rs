use crate::errors::Result;
use crate::renderer::{BufferKey, GpuDevice};

/// Floats per vertex in every buffer the engine creates.
pub const COMPONENTS: usize = 3;

/// Static vertex data, three floats per vertex.
///
/// Meshes are raw triangle soups: no index buffer, one buffer per attribute.
#[derive(Debug)]
pub struct VertexBuffer {
    key: BufferKey,
    len: usize,
}

impl VertexBuffer {
    pub fn new(device: &mut dyn GpuDevice, data: &[f32]) -> Result<Self> {
        if data.len() % COMPONENTS != 0 {
            log::warn!(
                "Vertex data length {} is not a multiple of {COMPONENTS}, trailing floats ignored",
                data.len()
            );
        }
        let key = device.create_vertex_buffer(data)?;
        Ok(Self { key, len: data.len() })
    }

    #[must_use]
    pub fn key(&self) -> BufferKey {
        self.key
    }

    /// Number of floats uploaded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        (self.len / COMPONENTS) as u32
    }

    pub fn bind(&self, device: &mut dyn GpuDevice, location: u32) {
        device.bind_vertex_buffer(location, Some(self.key));
    }

    pub fn unbind(&self, device: &mut dyn GpuDevice, location: u32) {
        device.bind_vertex_buffer(location, None);
    }

    /// Draws every vertex as a triangle list.
    pub fn draw_triangles(&self, device: &mut dyn GpuDevice) -> Result<()> {
        device.draw_arrays(0, self.vertex_count())
    }
}
