//! Uniform values.
//!
//! A [`UniformValue`] is what nodes write into the graph's uniform scope. Most
//! variants are plain data that can be written to a shader location as-is.
//! [`UniformValue::Sampler`] is different: it names a texture that must first
//! be bound to a texture unit, after which the scope carries
//! [`UniformValue::TextureUnit`] and the shader receives the unit number.

use std::rc::Rc;

use glam::{Mat3, Mat4, Vec3, Vec4};

use super::{FrameBuffer, Texture};
use crate::renderer::{GpuDevice, TextureKey, UniformData, UniformLocation};

/// Something that can sit on a texture unit.
#[derive(Debug, Clone)]
pub enum TextureBinding {
    Texture(Rc<Texture>),
    FrameBuffer(Rc<FrameBuffer>),
}

impl TextureBinding {
    /// The texture handle sampled by shaders.
    #[must_use]
    pub fn texture_key(&self) -> TextureKey {
        match self {
            Self::Texture(texture) => texture.key(),
            Self::FrameBuffer(framebuffer) => framebuffer.color(),
        }
    }

    pub fn bind(&self, device: &mut dyn GpuDevice, unit: u32) {
        match self {
            Self::Texture(texture) => texture.bind(device, Some(unit)),
            Self::FrameBuffer(framebuffer) => framebuffer.bind_texture(device, unit),
        }
    }

    /// Clears `unit`. The caller passes the unit it allocated at bind time.
    pub fn release(&self, device: &mut dyn GpuDevice, unit: u32) {
        match self {
            Self::Texture(texture) if texture.unit() == Some(unit) => texture.unbind(device),
            Self::FrameBuffer(framebuffer) if framebuffer.bound_unit() == Some(unit) => {
                framebuffer.unbind_texture(device);
            }
            _ => device.bind_texture(unit, None),
        }
    }

    fn last_unit(&self) -> Option<u32> {
        match self {
            Self::Texture(texture) => texture.unit(),
            Self::FrameBuffer(framebuffer) => framebuffer.bound_unit(),
        }
    }
}

/// A named value in a uniform scope.
#[derive(Debug, Clone)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
    /// A texture that still needs a unit.
    Sampler(TextureBinding),
    /// A unit a texture has been bound to.
    TextureUnit(u32),
}

impl UniformValue {
    /// Device payload for this value.
    ///
    /// A [`Sampler`](Self::Sampler) resolves to the unit it was last bound
    /// to; one that was never bound has nothing to send.
    #[must_use]
    pub fn data(&self) -> Option<UniformData> {
        Some(match self {
            Self::Float(v) => UniformData::Float(*v),
            Self::Int(v) => UniformData::Int(*v),
            Self::Vec3(v) => UniformData::Vec3(*v),
            Self::Vec4(v) => UniformData::Vec4(*v),
            Self::Mat3(v) => UniformData::Mat3(*v),
            Self::Mat4(v) => UniformData::Mat4(*v),
            Self::TextureUnit(unit) => UniformData::Int(*unit as i32),
            Self::Sampler(binding) => UniformData::Int(binding.last_unit()? as i32),
        })
    }

    /// Writes the value to `location` of the program in use.
    pub fn push(&self, device: &mut dyn GpuDevice, location: UniformLocation) {
        if let Some(data) = self.data() {
            device.set_uniform(location, data);
        }
    }

    #[must_use]
    pub fn as_mat4(&self) -> Option<Mat4> {
        match self {
            Self::Mat4(m) => Some(*m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        Self::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        Self::Vec4(v)
    }
}

impl From<Mat3> for UniformValue {
    fn from(v: Mat3) -> Self {
        Self::Mat3(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        Self::Mat4(v)
    }
}

impl From<Rc<Texture>> for UniformValue {
    fn from(v: Rc<Texture>) -> Self {
        Self::Sampler(TextureBinding::Texture(v))
    }
}

impl From<Rc<FrameBuffer>> for UniformValue {
    fn from(v: Rc<FrameBuffer>) -> Self {
        Self::Sampler(TextureBinding::FrameBuffer(v))
    }
}

/// Ordered list of named uniforms.
///
/// Insertion order is kept so that texture units are allocated and released
/// in a fixed order. Setting an existing name replaces its value in place.
#[derive(Debug, Clone, Default)]
pub struct UniformSet {
    entries: Vec<(String, UniformValue)>,
}

impl UniformSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<UniformValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<UniformValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Entries holding a texture, in insertion order.
    pub fn samplers(&self) -> impl Iterator<Item = (&str, &TextureBinding)> {
        self.entries.iter().filter_map(|(n, v)| match v {
            UniformValue::Sampler(binding) => Some((n.as_str(), binding)),
            _ => None,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<UniformValue>> FromIterator<(N, V)> for UniformSet {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (name, value) in iter {
            set.set(name, value);
        }
        set
    }
}
