use std::cell::Cell;

use crate::errors::Result;
use crate::renderer::{
    ColorFormat, FramebufferAttachments, FramebufferKey, GpuDevice, TextureKey, Viewport,
};

/// Offscreen render target: a colour texture plus a depth attachment.
///
/// Binding it as a target also moves the viewport to its own size; the
/// caller restores the previous viewport afterwards. Its colour output can
/// be sampled through the same bind-to-unit interface as [`Texture`].
///
/// [`Texture`]: super::Texture
#[derive(Debug)]
pub struct FrameBuffer {
    attachments: FramebufferAttachments,
    width: u32,
    height: u32,
    format: ColorFormat,
    unit: Cell<Option<u32>>,
}

impl FrameBuffer {
    /// 8-bit-per-channel framebuffer.
    pub fn new(device: &mut dyn GpuDevice, width: u32, height: u32) -> Result<Self> {
        Self::with_format(device, width, height, ColorFormat::default())
    }

    pub fn with_format(
        device: &mut dyn GpuDevice,
        width: u32,
        height: u32,
        format: ColorFormat,
    ) -> Result<Self> {
        let attachments = device.create_framebuffer(width, height, format)?;
        log::debug!("FrameBuffer {width}x{height} ({format:?}) created");
        Ok(Self {
            attachments,
            width,
            height,
            format,
            unit: Cell::new(None),
        })
    }

    #[must_use]
    pub fn key(&self) -> FramebufferKey {
        self.attachments.framebuffer
    }

    /// Colour attachment handle.
    #[must_use]
    pub fn color(&self) -> TextureKey {
        self.attachments.color
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn format(&self) -> ColorFormat {
        self.format
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        Viewport::full(self.width, self.height)
    }

    /// Redirects output here and overrides the viewport to the full target.
    pub fn bind(&self, device: &mut dyn GpuDevice) {
        device.bind_framebuffer(Some(self.attachments.framebuffer));
        device.set_viewport(self.viewport());
    }

    pub fn unbind(&self, device: &mut dyn GpuDevice) {
        device.bind_framebuffer(None);
    }

    /// Binds the colour attachment for sampling.
    pub fn bind_texture(&self, device: &mut dyn GpuDevice, unit: u32) {
        self.unit.set(Some(unit));
        device.bind_texture(unit, Some(self.attachments.color));
    }

    /// Unit remembered from the last [`bind_texture`](Self::bind_texture).
    #[must_use]
    pub fn bound_unit(&self) -> Option<u32> {
        self.unit.get()
    }

    pub fn unbind_texture(&self, device: &mut dyn GpuDevice) {
        device.bind_texture(self.unit.get().unwrap_or(0), None);
    }
}
