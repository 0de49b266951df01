//! wgpu backend.
//!
//! Shaders are WGSL. Each program declares its uniforms in a single struct
//! at `@group(0)` and each sampled texture `name` next to a `name_sampler`
//! in the same group. Vertex inputs are `vec3<f32>` at any location, one
//! buffer per attribute.

mod context;
mod device;
mod pipeline;
mod program;
pub mod reflect;

pub use context::WgpuContext;
pub use device::WgpuDevice;
