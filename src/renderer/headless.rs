//! Recording device without a GPU.
//!
//! [`HeadlessDevice`] implements [`GpuDevice`] by tracking the same state a
//! real device would and appending every call to a shared log. The log
//! outlives the device being moved into a [`Graph`](crate::scene::Graph), so
//! tests keep a [`Recorder`] and inspect it after drawing.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec4;
use image::RgbaImage;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use super::{
    BufferKey, ColorFormat, CullFace, FramebufferAttachments, FramebufferKey, GpuDevice,
    ProgramKey, TextureKey, UniformData, UniformLocation, Viewport,
};
use crate::errors::{ArborError, Result, ShaderStage};

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    BeginFrame,
    EndFrame,
    CreateTexture { texture: TextureKey, width: u32, height: u32 },
    CreateFramebuffer { framebuffer: FramebufferKey, width: u32, height: u32 },
    CreateBuffer { buffer: BufferKey, floats: usize },
    CreateProgram { program: ProgramKey },
    QueryUniform { program: ProgramKey, name: String },
    QueryAttribute { program: ProgramKey, name: String },
    UseProgram(ProgramKey),
    SetUniform { name: String, value: UniformData },
    BindTexture { unit: u32, texture: Option<TextureKey> },
    BindFramebuffer(Option<FramebufferKey>),
    Viewport(Viewport),
    Clear { color: Vec4, depth: f32 },
    CullFace(CullFace),
    BindVertexBuffer { location: u32, buffer: Option<BufferKey> },
    Draw(DrawRecord),
}

/// Snapshot of device state at a draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: ProgramKey,
    pub framebuffer: Option<FramebufferKey>,
    pub viewport: Viewport,
    pub cull_face: CullFace,
    pub first: u32,
    pub count: u32,
    /// Units with a texture bound, sorted by unit.
    pub textures: Vec<(u32, TextureKey)>,
    /// Vertex inputs with a buffer attached, sorted by location.
    pub vertex_buffers: Vec<(u32, BufferKey)>,
    /// Every uniform value the program held at draw time.
    pub uniforms: FxHashMap<String, UniformData>,
}

impl DrawRecord {
    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<&UniformData> {
        self.uniforms.get(name)
    }
}

/// Shared handle on a [`HeadlessDevice`] call log.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Rc<RefCell<Vec<DeviceCall>>>,
}

impl Recorder {
    fn push(&self, call: DeviceCall) {
        self.calls.borrow_mut().push(call);
    }

    /// Copy of the full log.
    #[must_use]
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.borrow().clone()
    }

    /// Only the draw snapshots, in submission order.
    #[must_use]
    pub fn draws(&self) -> Vec<DrawRecord> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                DeviceCall::Draw(record) => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

struct HeadlessProgram {
    source: String,
    uniform_names: Vec<String>,
    attributes: FxHashMap<String, u32>,
    values: FxHashMap<u32, UniformData>,
}

impl HeadlessProgram {
    fn declares(&self, name: &str) -> bool {
        self.source
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .any(|word| word == name)
    }
}

/// [`GpuDevice`] that tracks state in memory and records every call.
pub struct HeadlessDevice {
    size: (u32, u32),
    recorder: Recorder,

    textures: SlotMap<TextureKey, (u32, u32)>,
    framebuffers: SlotMap<FramebufferKey, (u32, u32)>,
    buffers: SlotMap<BufferKey, usize>,
    programs: SlotMap<ProgramKey, HeadlessProgram>,

    current_program: Option<ProgramKey>,
    units: FxHashMap<u32, TextureKey>,
    vertex_buffers: FxHashMap<u32, BufferKey>,
    framebuffer: Option<FramebufferKey>,
    viewport: Viewport,
    cull_face: CullFace,
}

impl HeadlessDevice {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            recorder: Recorder::default(),
            textures: SlotMap::with_key(),
            framebuffers: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            current_program: None,
            units: FxHashMap::default(),
            vertex_buffers: FxHashMap::default(),
            framebuffer: None,
            viewport: Viewport::full(width, height),
            cull_face: CullFace::Back,
        }
    }

    /// Handle on the call log that stays valid after the device is moved.
    #[must_use]
    pub fn recorder(&self) -> Recorder {
        self.recorder.clone()
    }

    /// Texture currently sitting on `unit`.
    #[must_use]
    pub fn bound_texture(&self, unit: u32) -> Option<TextureKey> {
        self.units.get(&unit).copied()
    }

    #[must_use]
    pub fn bound_framebuffer(&self) -> Option<FramebufferKey> {
        self.framebuffer
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[must_use]
    pub fn cull_face(&self) -> CullFace {
        self.cull_face
    }
}

impl GpuDevice for HeadlessDevice {
    fn drawable_size(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn begin_frame(&mut self) -> Result<()> {
        self.recorder.push(DeviceCall::BeginFrame);
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        self.recorder.push(DeviceCall::EndFrame);
        Ok(())
    }

    fn create_texture(&mut self, image: &RgbaImage) -> Result<TextureKey> {
        let (width, height) = image.dimensions();
        let texture = self.textures.insert((width, height));
        self.recorder.push(DeviceCall::CreateTexture { texture, width, height });
        Ok(texture)
    }

    fn create_framebuffer(
        &mut self,
        width: u32,
        height: u32,
        _format: ColorFormat,
    ) -> Result<FramebufferAttachments> {
        let framebuffer = self.framebuffers.insert((width, height));
        let color = self.textures.insert((width, height));
        self.recorder.push(DeviceCall::CreateFramebuffer { framebuffer, width, height });
        Ok(FramebufferAttachments { framebuffer, color })
    }

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<BufferKey> {
        let buffer = self.buffers.insert(data.len());
        self.recorder.push(DeviceCall::CreateBuffer { buffer, floats: data.len() });
        Ok(buffer)
    }

    fn create_program(&mut self, vertex: &str, fragment: &str) -> Result<ProgramKey> {
        if vertex.trim().is_empty() {
            return Err(ArborError::ShaderCompile {
                stage: ShaderStage::Vertex,
                message: "empty source".into(),
            });
        }
        if fragment.trim().is_empty() {
            return Err(ArborError::ShaderCompile {
                stage: ShaderStage::Fragment,
                message: "empty source".into(),
            });
        }
        let program = self.programs.insert(HeadlessProgram {
            source: format!("{vertex}\n{fragment}"),
            uniform_names: Vec::new(),
            attributes: FxHashMap::default(),
            values: FxHashMap::default(),
        });
        self.recorder.push(DeviceCall::CreateProgram { program });
        Ok(program)
    }

    fn uniform_location(&mut self, program: ProgramKey, name: &str) -> Option<UniformLocation> {
        self.recorder.push(DeviceCall::QueryUniform { program, name: name.to_owned() });
        let program = self.programs.get_mut(program)?;
        if let Some(index) = program.uniform_names.iter().position(|n| n == name) {
            return Some(UniformLocation(index as u32));
        }
        if !program.declares(name) {
            return None;
        }
        program.uniform_names.push(name.to_owned());
        Some(UniformLocation(program.uniform_names.len() as u32 - 1))
    }

    fn attribute_location(&mut self, program: ProgramKey, name: &str) -> Option<u32> {
        self.recorder.push(DeviceCall::QueryAttribute { program, name: name.to_owned() });
        let program = self.programs.get_mut(program)?;
        if let Some(&location) = program.attributes.get(name) {
            return Some(location);
        }
        if !program.declares(name) {
            return None;
        }
        let location = program.attributes.len() as u32;
        program.attributes.insert(name.to_owned(), location);
        Some(location)
    }

    fn use_program(&mut self, program: ProgramKey) {
        self.current_program = Some(program);
        self.recorder.push(DeviceCall::UseProgram(program));
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformData) {
        let Some(program) = self.current_program.and_then(|key| self.programs.get_mut(key)) else {
            log::warn!("set_uniform without a program in use");
            return;
        };
        let Some(name) = program.uniform_names.get(location.0 as usize).cloned() else {
            return;
        };
        program.values.insert(location.0, value);
        self.recorder.push(DeviceCall::SetUniform { name, value });
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureKey>) {
        match texture {
            Some(texture) => {
                self.units.insert(unit, texture);
            }
            None => {
                self.units.remove(&unit);
            }
        }
        self.recorder.push(DeviceCall::BindTexture { unit, texture });
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferKey>) {
        self.framebuffer = framebuffer;
        self.recorder.push(DeviceCall::BindFramebuffer(framebuffer));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.recorder.push(DeviceCall::Viewport(viewport));
    }

    fn clear(&mut self, color: Vec4, depth: f32) {
        self.recorder.push(DeviceCall::Clear { color, depth });
    }

    fn set_cull_face(&mut self, face: CullFace) {
        self.cull_face = face;
        self.recorder.push(DeviceCall::CullFace(face));
    }

    fn bind_vertex_buffer(&mut self, location: u32, buffer: Option<BufferKey>) {
        match buffer {
            Some(buffer) => {
                self.vertex_buffers.insert(location, buffer);
            }
            None => {
                self.vertex_buffers.remove(&location);
            }
        }
        self.recorder.push(DeviceCall::BindVertexBuffer { location, buffer });
    }

    fn draw_arrays(&mut self, first: u32, count: u32) -> Result<()> {
        let program_key = self.current_program.ok_or(ArborError::NoActiveShader)?;
        let program = self
            .programs
            .get(program_key)
            .ok_or(ArborError::InvalidHandle("program"))?;

        let uniforms = program
            .values
            .iter()
            .filter_map(|(index, value)| {
                program
                    .uniform_names
                    .get(*index as usize)
                    .map(|name| (name.clone(), *value))
            })
            .collect();

        let mut textures: Vec<_> = self.units.iter().map(|(u, t)| (*u, *t)).collect();
        textures.sort_by_key(|(unit, _)| *unit);
        let mut vertex_buffers: Vec<_> = self.vertex_buffers.iter().map(|(l, b)| (*l, *b)).collect();
        vertex_buffers.sort_by_key(|(location, _)| *location);

        self.recorder.push(DeviceCall::Draw(DrawRecord {
            program: program_key,
            framebuffer: self.framebuffer,
            viewport: self.viewport,
            cull_face: self.cull_face,
            first,
            count,
            textures,
            vertex_buffers,
            uniforms,
        }));
        Ok(())
    }
}
