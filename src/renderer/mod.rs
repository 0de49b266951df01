//! GPU device abstraction.
//!
//! The scene graph never talks to a graphics API directly. Every resource
//! wrapper and every node goes through a [`GpuDevice`], which is handed to
//! constructors explicitly and owned by the [`Graph`](crate::scene::Graph)
//! during traversal.
//!
//! The device is a small state machine: a program is "in use", textures sit
//! on numbered units, one framebuffer is bound, one viewport is active, and
//! `draw_arrays` consumes whatever state is current. Two backends exist:
//!
//! - [`headless::HeadlessDevice`]: records every call, used by the tests
//! - [`wgpu_backend::WgpuDevice`]: the real renderer

pub mod headless;
pub mod settings;
pub mod wgpu_backend;

use glam::{Mat3, Mat4, Vec3, Vec4};
use image::RgbaImage;
use slotmap::new_key_type;

use crate::errors::Result;

pub use settings::RenderSettings;

new_key_type! {
    /// Handle to a sampled 2D texture.
    pub struct TextureKey;
    /// Handle to an offscreen framebuffer (colour + depth).
    pub struct FramebufferKey;
    /// Handle to a vertex buffer.
    pub struct BufferKey;
    /// Handle to a linked shader program.
    pub struct ProgramKey;
}

/// Opaque per-program uniform slot returned by [`GpuDevice::uniform_location`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// Rectangle in framebuffer pixels, origin at the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Viewport covering a whole surface of the given size.
    #[must_use]
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Width over height; `1.0` for a degenerate rectangle.
    #[must_use]
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Which triangle winding gets discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullFace {
    Front,
    #[default]
    Back,
}

/// Colour attachment format of an offscreen framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorFormat {
    /// 8 bits per channel.
    #[default]
    Rgba8,
    /// Half-float per channel, for HDR intermediate targets.
    Rgba16Float,
}

/// Raw value written to a uniform location.
///
/// This is what reaches the device after the scene graph has resolved
/// textures into unit numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformData {
    Float(f32),
    Int(i32),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

/// Handles created for one offscreen framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferAttachments {
    pub framebuffer: FramebufferKey,
    /// Colour attachment, sampleable like any other texture.
    pub color: TextureKey,
}

/// Explicit GPU device handle.
///
/// State-setting calls are infallible: a stale handle is logged and ignored.
/// Creation and drawing return [`Result`] because they can fail for reasons
/// outside the caller's control.
pub trait GpuDevice {
    /// Size of the default framebuffer in pixels.
    fn drawable_size(&self) -> (u32, u32);

    /// Resizes the default framebuffer after the window changed size.
    fn resize(&mut self, width: u32, height: u32);

    /// Starts recording a frame against the default framebuffer.
    fn begin_frame(&mut self) -> Result<()>;

    /// Submits everything recorded since [`begin_frame`](Self::begin_frame).
    fn end_frame(&mut self) -> Result<()>;

    // ========================================================================
    // Resource creation
    // ========================================================================

    /// Uploads an RGBA image and generates its full mip chain.
    fn create_texture(&mut self, image: &RgbaImage) -> Result<TextureKey>;

    /// Allocates a colour texture plus a matching depth attachment.
    fn create_framebuffer(
        &mut self,
        width: u32,
        height: u32,
        format: ColorFormat,
    ) -> Result<FramebufferAttachments>;

    /// Uploads static vertex data (three floats per vertex).
    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<BufferKey>;

    /// Compiles both stages and links them. Failure is fatal to the caller.
    fn create_program(&mut self, vertex: &str, fragment: &str) -> Result<ProgramKey>;

    // ========================================================================
    // Program introspection
    // ========================================================================

    /// `None` means the linked program does not use `name`.
    fn uniform_location(&mut self, program: ProgramKey, name: &str) -> Option<UniformLocation>;

    /// Vertex input slot for an attribute name.
    fn attribute_location(&mut self, program: ProgramKey, name: &str) -> Option<u32>;

    // ========================================================================
    // State
    // ========================================================================

    fn use_program(&mut self, program: ProgramKey);

    /// Writes a value into the program currently in use.
    fn set_uniform(&mut self, location: UniformLocation, value: UniformData);

    /// Binds a texture to a unit, `None` clears the unit.
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureKey>);

    /// Redirects output; `None` is the default framebuffer.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferKey>);

    fn set_viewport(&mut self, viewport: Viewport);

    /// Clears colour and depth of the bound framebuffer.
    fn clear(&mut self, color: Vec4, depth: f32);

    fn set_cull_face(&mut self, face: CullFace);

    /// Attaches a buffer to a vertex input slot, `None` detaches it.
    fn bind_vertex_buffer(&mut self, location: u32, buffer: Option<BufferKey>);

    /// Non-indexed triangle list draw with the current state.
    fn draw_arrays(&mut self, first: u32, count: u32) -> Result<()>;
}
