use std::cell::Cell;

use image::{DynamicImage, RgbaImage};

use crate::errors::Result;
use crate::renderer::{GpuDevice, TextureKey};

/// Sampled 2D texture created from a decoded image.
///
/// The image is flipped vertically on upload so that texture coordinates
/// have their origin at the bottom-left, and a full mip chain is generated
/// by the device.
#[derive(Debug)]
pub struct Texture {
    key: TextureKey,
    width: u32,
    height: u32,
    unit: Cell<Option<u32>>,
}

impl Texture {
    pub fn from_image(device: &mut dyn GpuDevice, image: &DynamicImage) -> Result<Self> {
        Self::from_rgba(device, &image.to_rgba8())
    }

    pub fn from_rgba(device: &mut dyn GpuDevice, image: &RgbaImage) -> Result<Self> {
        let flipped = image::imageops::flip_vertical(image);
        let key = device.create_texture(&flipped)?;
        log::debug!("Texture {}x{} uploaded", image.width(), image.height());
        Ok(Self {
            key,
            width: image.width(),
            height: image.height(),
            unit: Cell::new(None),
        })
    }

    #[must_use]
    pub fn key(&self) -> TextureKey {
        self.key
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Unit remembered from the last [`bind`](Self::bind) with an explicit unit.
    #[must_use]
    pub fn unit(&self) -> Option<u32> {
        self.unit.get()
    }

    /// Binds to `unit`, or to the remembered unit (0 if none) when `None`.
    pub fn bind(&self, device: &mut dyn GpuDevice, unit: Option<u32>) {
        if let Some(unit) = unit {
            self.unit.set(Some(unit));
        }
        device.bind_texture(self.unit.get().unwrap_or(0), Some(self.key));
    }

    /// Unbinds from the remembered unit (0 if none). The unit stays
    /// remembered for the next [`bind`](Self::bind) with `None`.
    pub fn unbind(&self, device: &mut dyn GpuDevice) {
        device.bind_texture(self.unit.get().unwrap_or(0), None);
    }
}
