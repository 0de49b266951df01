//! GPU resource wrappers and the CPU-side data that feeds them.
//!
//! Every wrapper takes the device explicitly in its constructor and keeps only
//! a handle. Resources live as long as the scene that references them.

pub mod buffer;
pub mod framebuffer;
pub mod obj;
pub mod primitives;
pub mod shader;
pub mod shader_library;
pub mod texture;
pub mod uniforms;

pub use buffer::VertexBuffer;
pub use framebuffer::FrameBuffer;
pub use obj::{ObjMesh, parse_obj};
pub use shader::Shader;
pub use shader_library::ShaderLibrary;
pub use texture::Texture;
pub use uniforms::{TextureBinding, UniformSet, UniformValue};
