use std::borrow::Cow;
use std::num::NonZeroU64;

use rustc_hash::FxHashMap;

use super::reflect::{self, MemberKind, ProgramInterface};
use crate::errors::{Result, ShaderStage};
use crate::renderer::{UniformData, UniformLocation};

/// What a [`UniformLocation`] points at inside a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Member { offset: u32, kind: MemberKind },
    /// A texture is addressed like a sampler uniform: it receives a unit.
    Texture { binding: u32 },
}

/// A linked WGSL program and the uniform state it currently holds.
///
/// Values persist between draws until overwritten, so each draw snapshots
/// the staging bytes and texture units at the time it is issued.
pub struct GpuProgram {
    pub vertex: wgpu::ShaderModule,
    pub vertex_entry: String,
    pub fragment: wgpu::ShaderModule,
    pub fragment_entry: String,

    pub interface: ProgramInterface,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub pipeline_layout: wgpu::PipelineLayout,
    /// Vertex inputs sorted by location; index is the vertex buffer slot.
    pub inputs: Vec<(u32, String)>,

    slots: Vec<Slot>,
    slot_names: FxHashMap<String, u32>,
    staging: Vec<u8>,
    texture_units: FxHashMap<u32, u32>,
}

impl GpuProgram {
    pub fn new(device: &wgpu::Device, vertex: &str, fragment: &str) -> Result<Self> {
        let (_, vs) = reflect::reflect(vertex, ShaderStage::Vertex)?;
        let (_, fs) = reflect::reflect(fragment, ShaderStage::Fragment)?;
        let interface = reflect::link(&vs, &fs)?;

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&vs.entry_point),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(vertex)),
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&fs.entry_point),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(fragment)),
        });

        let mut entries = Vec::new();
        let mut slots = Vec::new();
        let mut slot_names = FxHashMap::default();
        let mut staging = Vec::new();

        if let Some(block) = &interface.uniforms {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: block.binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(u64::from(block.size)),
                },
                count: None,
            });
            staging.resize(block.size as usize, 0);
            for member in &block.members {
                slot_names.insert(member.name.clone(), slots.len() as u32);
                slots.push(Slot::Member {
                    offset: member.offset,
                    kind: member.kind,
                });
            }
        }

        for texture in &interface.textures {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: texture.binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            if let Some(sampler) = texture.sampler {
                entries.push(wgpu::BindGroupLayoutEntry {
                    binding: sampler,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                });
            }
            slot_names.insert(texture.name.clone(), slots.len() as u32);
            slots.push(Slot::Texture {
                binding: texture.binding,
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Program Layout"),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Program Pipeline Layout"),
            bind_group_layouts: &[Some(&bind_group_layout)],
            immediate_size: 0,
        });

        let mut inputs: Vec<(u32, String)> = interface
            .inputs
            .iter()
            .map(|(name, location)| (*location, name.clone()))
            .collect();
        inputs.sort_unstable();

        Ok(Self {
            vertex: vertex_module,
            vertex_entry: vs.entry_point,
            fragment: fragment_module,
            fragment_entry: fs.entry_point,
            interface,
            bind_group_layout,
            pipeline_layout,
            inputs,
            slots,
            slot_names,
            staging,
            texture_units: FxHashMap::default(),
        })
    }

    #[must_use]
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.slot_names.get(name).copied().map(UniformLocation)
    }

    #[must_use]
    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.interface.inputs.get(name).copied()
    }

    #[must_use]
    pub fn staging(&self) -> &[u8] {
        &self.staging
    }

    /// Unit the texture at `binding` samples from.
    #[must_use]
    pub fn texture_unit(&self, binding: u32) -> Option<u32> {
        self.texture_units.get(&binding).copied()
    }

    pub fn set_uniform(&mut self, location: UniformLocation, value: UniformData) {
        let Some(slot) = self.slots.get(location.0 as usize).copied() else {
            log::warn!("Uniform location {} out of range", location.0);
            return;
        };
        match (slot, value) {
            (Slot::Texture { binding }, UniformData::Int(unit)) => {
                self.texture_units.insert(binding, unit.max(0) as u32);
            }
            (Slot::Member { offset, kind: MemberKind::Float }, UniformData::Float(v)) => {
                self.write(offset, bytemuck::bytes_of(&v));
            }
            (Slot::Member { offset, kind: MemberKind::Int }, UniformData::Int(v)) => {
                self.write(offset, bytemuck::bytes_of(&v));
            }
            (Slot::Member { offset, kind: MemberKind::Vec3 }, UniformData::Vec3(v)) => {
                self.write(offset, bytemuck::bytes_of(&v));
            }
            (Slot::Member { offset, kind: MemberKind::Vec4 }, UniformData::Vec4(v)) => {
                self.write(offset, bytemuck::bytes_of(&v));
            }
            (Slot::Member { offset, kind: MemberKind::Mat3 }, UniformData::Mat3(m)) => {
                // mat3x3<f32> columns are padded to 16 bytes.
                for (i, column) in [m.x_axis, m.y_axis, m.z_axis].iter().enumerate() {
                    self.write(offset + 16 * i as u32, bytemuck::bytes_of(column));
                }
            }
            (Slot::Member { offset, kind: MemberKind::Mat4 }, UniformData::Mat4(m)) => {
                self.write(offset, bytemuck::bytes_of(&m));
            }
            (slot, value) => {
                log::debug!("Uniform value {value:?} does not match {slot:?}, skipped");
            }
        }
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) {
        let start = offset as usize;
        if let Some(dst) = self.staging.get_mut(start..start + bytes.len()) {
            dst.copy_from_slice(bytes);
        }
    }
}
