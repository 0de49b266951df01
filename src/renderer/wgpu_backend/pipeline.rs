use rustc_hash::FxHashMap;

use super::program::GpuProgram;
use crate::renderer::{CullFace, ProgramKey};

/// Floats per vertex in every vertex buffer.
const VERTEX_STRIDE: u64 = 3 * std::mem::size_of::<f32>() as u64;

/// Everything that selects a distinct render pipeline for a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub program: ProgramKey,
    pub color_format: wgpu::TextureFormat,
    pub depth_format: wgpu::TextureFormat,
    pub cull_face: CullFace,
}

/// Render pipelines built on first use and kept for the program's lifetime.
#[derive(Default)]
pub struct PipelineCache {
    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        key: PipelineKey,
        program: &GpuProgram,
    ) -> &wgpu::RenderPipeline {
        self.pipelines
            .entry(key)
            .or_insert_with(|| create_pipeline(device, &key, program))
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    key: &PipelineKey,
    program: &GpuProgram,
) -> wgpu::RenderPipeline {
    log::debug!(
        "Creating pipeline for {}/{} ({:?}, cull {:?})",
        program.vertex_entry,
        program.fragment_entry,
        key.color_format,
        key.cull_face
    );

    let attributes: Vec<[wgpu::VertexAttribute; 1]> = program
        .inputs
        .iter()
        .map(|(location, _)| {
            [wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x3,
                offset: 0,
                shader_location: *location,
            }]
        })
        .collect();
    let buffers: Vec<wgpu::VertexBufferLayout> = attributes
        .iter()
        .map(|attribute| wgpu::VertexBufferLayout {
            array_stride: VERTEX_STRIDE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: attribute,
        })
        .collect();

    let cull_mode = match key.cull_face {
        CullFace::Front => wgpu::Face::Front,
        CullFace::Back => wgpu::Face::Back,
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Scene Pipeline"),
        layout: Some(&program.pipeline_layout),
        vertex: wgpu::VertexState {
            module: &program.vertex,
            entry_point: Some(&program.vertex_entry),
            buffers: &buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &program.fragment,
            entry_point: Some(&program.fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: key.color_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(cull_mode),
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: key.depth_format,
            depth_write_enabled: Some(true),
            depth_compare: Some(wgpu::CompareFunction::Less),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}
