use std::num::NonZeroU64;
use std::sync::Arc;

use glam::Vec4;
use image::RgbaImage;
use image::imageops::FilterType;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;
use wgpu::util::DeviceExt;
use winit::window::Window;

use super::context::WgpuContext;
use super::pipeline::{PipelineCache, PipelineKey};
use super::program::GpuProgram;
use crate::errors::{ArborError, Result};
use crate::renderer::settings::RenderSettings;
use crate::renderer::{
    BufferKey, ColorFormat, CullFace, FramebufferAttachments, FramebufferKey, GpuDevice,
    ProgramKey, TextureKey, UniformData, UniformLocation, Viewport,
};

const MIN_UNIFORM_CAPACITY: u64 = 64 * 1024;

struct GpuTexture {
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

struct GpuFramebuffer {
    color: TextureKey,
    depth: wgpu::TextureView,
    format: wgpu::TextureFormat,
    size: (u32, u32),
}

struct GpuBuffer {
    buffer: wgpu::Buffer,
    vertices: u32,
}

struct BoundTexture {
    binding: u32,
    sampler: Option<u32>,
    texture: TextureKey,
}

struct DrawCommand {
    target: Option<FramebufferKey>,
    viewport: Viewport,
    pipeline: PipelineKey,
    uniform_offset: u32,
    textures: SmallVec<[BoundTexture; 4]>,
    vertex_buffers: SmallVec<[BufferKey; 4]>,
    first: u32,
    count: u32,
}

enum Command {
    Clear {
        target: Option<FramebufferKey>,
        color: Vec4,
        depth: f32,
    },
    Draw(DrawCommand),
}

impl Command {
    fn target(&self) -> Option<FramebufferKey> {
        match self {
            Self::Clear { target, .. } => *target,
            Self::Draw(draw) => draw.target,
        }
    }
}

/// wgpu implementation of [`GpuDevice`].
///
/// State calls only update the tracked state. Clears and draws snapshot it
/// into a command list, and [`end_frame`](GpuDevice::end_frame) replays the
/// list: consecutive commands on the same target share a render pass, a
/// clear opens a new pass, and every draw reads its uniforms from one
/// per-frame buffer at its own dynamic offset.
pub struct WgpuDevice {
    ctx: WgpuContext,
    max_texture_units: u32,

    textures: SlotMap<TextureKey, GpuTexture>,
    framebuffers: SlotMap<FramebufferKey, GpuFramebuffer>,
    buffers: SlotMap<BufferKey, GpuBuffer>,
    programs: SlotMap<ProgramKey, GpuProgram>,
    pipelines: PipelineCache,
    fallback_texture: TextureKey,

    current_program: Option<ProgramKey>,
    units: FxHashMap<u32, TextureKey>,
    vertex_buffers: FxHashMap<u32, BufferKey>,
    framebuffer: Option<FramebufferKey>,
    viewport: Viewport,
    cull_face: CullFace,

    commands: Vec<Command>,
    uniform_arena: Vec<u8>,
    uniform_alignment: usize,
    uniform_buffer: wgpu::Buffer,
}

impl WgpuDevice {
    pub async fn new(
        window: Arc<Window>,
        width: u32,
        height: u32,
        settings: &RenderSettings,
    ) -> Result<Self> {
        let ctx = WgpuContext::new(window, settings, width, height).await?;
        let uniform_alignment = ctx.device.limits().min_uniform_buffer_offset_alignment as usize;
        let uniform_buffer = create_uniform_buffer(&ctx.device, MIN_UNIFORM_CAPACITY);
        let (width, height) = ctx.size();

        let mut device = Self {
            ctx,
            max_texture_units: settings.max_texture_units,
            textures: SlotMap::with_key(),
            framebuffers: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            pipelines: PipelineCache::new(),
            fallback_texture: TextureKey::default(),
            current_program: None,
            units: FxHashMap::default(),
            vertex_buffers: FxHashMap::default(),
            framebuffer: None,
            viewport: Viewport::full(width, height),
            cull_face: CullFace::Back,
            commands: Vec::new(),
            uniform_arena: Vec::new(),
            uniform_alignment: uniform_alignment.max(1),
            uniform_buffer,
        };
        let white = RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
        device.fallback_texture = device.upload_texture(&white, "Fallback Texture")?;
        Ok(device)
    }

    #[must_use]
    pub fn context(&self) -> &WgpuContext {
        &self.ctx
    }

    fn upload_texture(&mut self, image: &RgbaImage, label: &str) -> Result<TextureKey> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            log::warn!("{label}: empty image replaced by the fallback texture");
            return Ok(self.fallback_texture);
        }
        let mip_level_count = 32 - width.max(height).leading_zeros();

        let texture = self.ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for level in 0..mip_level_count {
            let w = (width >> level).max(1);
            let h = (height >> level).max(1);
            let resized;
            let pixels = if level == 0 {
                image
            } else {
                resized = image::imageops::resize(image, w, h, FilterType::Triangle);
                &resized
            };
            self.ctx.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: level,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                pixels.as_raw(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * w),
                    rows_per_image: Some(h),
                },
                wgpu::Extent3d {
                    width: w,
                    height: h,
                    depth_or_array_layers: 1,
                },
            );
        }

        let sampler = self.ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        log::debug!("Texture {label} {width}x{height} with {mip_level_count} mips");
        Ok(self.textures.insert(GpuTexture { view, sampler }))
    }

    /// Resolves the textures a program samples to the keys currently
    /// bound on their units. Unbound units and the active render target
    /// sample the fallback texture.
    fn resolve_textures(&self, program: &GpuProgram) -> SmallVec<[BoundTexture; 4]> {
        let target_color = self
            .framebuffer
            .and_then(|fb| self.framebuffers.get(fb))
            .map(|fb| fb.color);
        program
            .interface
            .textures
            .iter()
            .map(|slot| {
                let bound = program
                    .texture_unit(slot.binding)
                    .and_then(|unit| self.units.get(&unit).copied())
                    .filter(|key| self.textures.contains_key(*key));
                let texture = match bound {
                    Some(key) if Some(key) == target_color => {
                        log::warn!("'{}' samples the framebuffer it renders to", slot.name);
                        self.fallback_texture
                    }
                    Some(key) => key,
                    None => self.fallback_texture,
                };
                BoundTexture {
                    binding: slot.binding,
                    sampler: slot.sampler,
                    texture,
                }
            })
            .collect()
    }

    fn target_format(&self, target: Option<FramebufferKey>) -> wgpu::TextureFormat {
        target
            .and_then(|fb| self.framebuffers.get(fb))
            .map_or(self.ctx.color_format(), |fb| fb.format)
    }

    fn ensure_uniform_capacity(&mut self) {
        let needed = self.uniform_arena.len() as u64;
        if needed > self.uniform_buffer.size() {
            let capacity = needed.next_power_of_two().max(MIN_UNIFORM_CAPACITY);
            log::debug!("Growing uniform buffer to {capacity} bytes");
            self.uniform_buffer = create_uniform_buffer(&self.ctx.device, capacity);
        }
    }

    fn create_bind_group(&self, draw: &DrawCommand, program: &GpuProgram) -> wgpu::BindGroup {
        let mut entries: SmallVec<[wgpu::BindGroupEntry; 8]> = SmallVec::new();
        if let Some(block) = &program.interface.uniforms {
            entries.push(wgpu::BindGroupEntry {
                binding: block.binding,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &self.uniform_buffer,
                    offset: 0,
                    size: NonZeroU64::new(u64::from(block.size)),
                }),
            });
        }
        for bound in &draw.textures {
            let texture = self
                .textures
                .get(bound.texture)
                .or_else(|| self.textures.get(self.fallback_texture));
            let Some(texture) = texture else {
                continue;
            };
            entries.push(wgpu::BindGroupEntry {
                binding: bound.binding,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            });
            if let Some(sampler) = bound.sampler {
                entries.push(wgpu::BindGroupEntry {
                    binding: sampler,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                });
            }
        }
        self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw Bind Group"),
            layout: &program.bind_group_layout,
            entries: &entries,
        })
    }

    fn replay(&mut self, commands: &[Command], surface_view: &wgpu::TextureView) {
        self.ensure_uniform_capacity();
        if !self.uniform_arena.is_empty() {
            self.ctx
                .queue
                .write_buffer(&self.uniform_buffer, 0, &self.uniform_arena);
        }

        let bind_groups: Vec<Option<wgpu::BindGroup>> = commands
            .iter()
            .map(|command| match command {
                Command::Draw(draw) => self
                    .programs
                    .get(draw.pipeline.program)
                    .map(|program| self.create_bind_group(draw, program)),
                Command::Clear { .. } => None,
            })
            .collect();

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let mut index = 0;
        while index < commands.len() {
            let target = commands[index].target();
            let (clear, start) = match &commands[index] {
                Command::Clear { color, depth, .. } => (Some((*color, *depth)), index + 1),
                Command::Draw(_) => (None, index),
            };
            let mut end = start;
            while end < commands.len()
                && matches!(&commands[end], Command::Draw(draw) if draw.target == target)
            {
                end += 1;
            }
            index = end;

            let views = target_views(
                &self.ctx,
                &self.framebuffers,
                &self.textures,
                target,
                surface_view,
            );
            let Some((color_view, depth_view, size)) = views else {
                log::warn!("Skipping commands for a released framebuffer");
                continue;
            };

            let color_load = match clear {
                Some((color, _)) => wgpu::LoadOp::Clear(wgpu::Color {
                    r: f64::from(color.x),
                    g: f64::from(color.y),
                    b: f64::from(color.z),
                    a: f64::from(color.w),
                }),
                None => wgpu::LoadOp::Load,
            };
            let depth_load = match clear {
                Some((_, depth)) => wgpu::LoadOp::Clear(depth),
                None => wgpu::LoadOp::Load,
            };

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            for (command, bind_group) in commands[start..end].iter().zip(&bind_groups[start..end]) {
                let (Command::Draw(draw), Some(bind_group)) = (command, bind_group) else {
                    continue;
                };
                let Some(program) = self.programs.get(draw.pipeline.program) else {
                    continue;
                };
                let Some((x, y, w, h)) = framebuffer_rect(draw.viewport, size) else {
                    continue;
                };
                pass.set_viewport(x, y, w, h, 0.0, 1.0);

                let pipeline = self
                    .pipelines
                    .get_or_create(&self.ctx.device, draw.pipeline, program);
                pass.set_pipeline(pipeline);

                let offsets: &[u32] = if program.interface.uniforms.is_some() {
                    std::slice::from_ref(&draw.uniform_offset)
                } else {
                    &[]
                };
                pass.set_bind_group(0, bind_group, offsets);

                for (slot, key) in draw.vertex_buffers.iter().enumerate() {
                    if let Some(buffer) = self.buffers.get(*key) {
                        pass.set_vertex_buffer(slot as u32, buffer.buffer.slice(..));
                    }
                }
                pass.draw(draw.first..draw.first + draw.count, 0..1);
            }
        }

        self.ctx.queue.submit(Some(encoder.finish()));
    }
}

fn create_uniform_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Frame Uniforms"),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Target views and size, `None` if the framebuffer is gone.
fn target_views<'a>(
    ctx: &'a WgpuContext,
    framebuffers: &'a SlotMap<FramebufferKey, GpuFramebuffer>,
    textures: &'a SlotMap<TextureKey, GpuTexture>,
    target: Option<FramebufferKey>,
    surface_view: &'a wgpu::TextureView,
) -> Option<(&'a wgpu::TextureView, &'a wgpu::TextureView, (u32, u32))> {
    match target {
        None => Some((surface_view, &ctx.depth_texture_view, ctx.size())),
        Some(key) => {
            let fb = framebuffers.get(key)?;
            let color = textures.get(fb.color)?;
            Some((&color.view, &fb.depth, fb.size))
        }
    }
}

/// Converts a bottom-left-origin viewport into a top-left-origin rectangle
/// clipped to the target. `None` if nothing is left.
fn framebuffer_rect(viewport: Viewport, (width, height): (u32, u32)) -> Option<(f32, f32, f32, f32)> {
    let top = height as i32 - (viewport.y + viewport.height as i32);
    let x0 = viewport.x.max(0);
    let y0 = top.max(0);
    let x1 = (viewport.x + viewport.width as i32).min(width as i32);
    let y1 = (top + viewport.height as i32).min(height as i32);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0 as f32, y0 as f32, (x1 - x0) as f32, (y1 - y0) as f32))
}

fn color_format(format: ColorFormat) -> wgpu::TextureFormat {
    match format {
        ColorFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        ColorFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
    }
}

impl GpuDevice for WgpuDevice {
    fn drawable_size(&self) -> (u32, u32) {
        self.ctx.size()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
    }

    fn begin_frame(&mut self) -> Result<()> {
        self.commands.clear();
        self.uniform_arena.clear();
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        let commands = std::mem::take(&mut self.commands);
        if commands.is_empty() {
            return Ok(());
        }

        let (output, suboptimal) = match self.ctx.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(output) => (output, false),
            wgpu::CurrentSurfaceTexture::Suboptimal(output) => (output, true),
            wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated => {
                self.ctx.reconfigure();
                return Ok(());
            }
            wgpu::CurrentSurfaceTexture::Timeout | wgpu::CurrentSurfaceTexture::Occluded => {
                log::warn!("Surface not ready, frame dropped");
                return Ok(());
            }
            wgpu::CurrentSurfaceTexture::Validation => {
                return Err(ArborError::SurfaceError(
                    "validation error while acquiring the frame".into(),
                ));
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.replay(&commands, &view);
        output.present();
        if suboptimal {
            self.ctx.reconfigure();
        }

        self.commands = commands;
        self.commands.clear();
        Ok(())
    }

    fn create_texture(&mut self, image: &RgbaImage) -> Result<TextureKey> {
        self.upload_texture(image, "Image Texture")
    }

    fn create_framebuffer(
        &mut self,
        width: u32,
        height: u32,
        format: ColorFormat,
    ) -> Result<FramebufferAttachments> {
        let (width, height) = (width.max(1), height.max(1));
        let format = color_format(format);
        let texture = self.ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Framebuffer Color"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Framebuffer Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let color = self.textures.insert(GpuTexture { view, sampler });
        let depth = WgpuContext::create_depth_texture(
            &self.ctx.device,
            width,
            height,
            self.ctx.depth_format,
        );
        let framebuffer = self.framebuffers.insert(GpuFramebuffer {
            color,
            depth,
            format,
            size: (width, height),
        });
        log::debug!("Framebuffer {width}x{height} ({format:?})");
        Ok(FramebufferAttachments { framebuffer, color })
    }

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<BufferKey> {
        const EMPTY: [f32; 3] = [0.0; 3];
        let contents = if data.is_empty() { &EMPTY[..] } else { data };
        let buffer = self
            .ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Vertex Buffer"),
                contents: bytemuck::cast_slice(contents),
                usage: wgpu::BufferUsages::VERTEX,
            });
        Ok(self.buffers.insert(GpuBuffer {
            buffer,
            vertices: (data.len() / 3) as u32,
        }))
    }

    fn create_program(&mut self, vertex: &str, fragment: &str) -> Result<ProgramKey> {
        let program = GpuProgram::new(&self.ctx.device, vertex, fragment)?;
        Ok(self.programs.insert(program))
    }

    fn uniform_location(&mut self, program: ProgramKey, name: &str) -> Option<UniformLocation> {
        self.programs.get(program)?.uniform_location(name)
    }

    fn attribute_location(&mut self, program: ProgramKey, name: &str) -> Option<u32> {
        self.programs.get(program)?.attribute_location(name)
    }

    fn use_program(&mut self, program: ProgramKey) {
        if self.programs.contains_key(program) {
            self.current_program = Some(program);
        } else {
            log::warn!("use_program: unknown program");
        }
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformData) {
        match self.current_program.and_then(|key| self.programs.get_mut(key)) {
            Some(program) => program.set_uniform(location, value),
            None => log::warn!("set_uniform without a program in use"),
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureKey>) {
        if unit >= self.max_texture_units {
            log::warn!("Texture unit {unit} exceeds the limit of {}", self.max_texture_units);
            return;
        }
        match texture {
            Some(key) => {
                self.units.insert(unit, key);
            }
            None => {
                self.units.remove(&unit);
            }
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferKey>) {
        self.framebuffer = framebuffer;
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn clear(&mut self, color: Vec4, depth: f32) {
        self.commands.push(Command::Clear {
            target: self.framebuffer,
            color,
            depth,
        });
    }

    fn set_cull_face(&mut self, face: CullFace) {
        self.cull_face = face;
    }

    fn bind_vertex_buffer(&mut self, location: u32, buffer: Option<BufferKey>) {
        match buffer {
            Some(key) => {
                self.vertex_buffers.insert(location, key);
            }
            None => {
                self.vertex_buffers.remove(&location);
            }
        }
    }

    fn draw_arrays(&mut self, first: u32, count: u32) -> Result<()> {
        let key = self.current_program.ok_or(ArborError::NoActiveShader)?;
        let program = self
            .programs
            .get(key)
            .ok_or(ArborError::InvalidHandle("program"))?;

        let mut vertex_buffers = SmallVec::new();
        let mut available = u32::MAX;
        for (location, name) in &program.inputs {
            let buffer = self
                .vertex_buffers
                .get(location)
                .and_then(|key| self.buffers.get(*key).map(|b| (*key, b)))
                .ok_or_else(|| ArborError::MissingAttribute(name.clone()))?;
            available = available.min(buffer.1.vertices);
            vertex_buffers.push(buffer.0);
        }
        let end = first.saturating_add(count).min(available);
        if end <= first || self.viewport.width == 0 || self.viewport.height == 0 {
            return Ok(());
        }

        let textures = self.resolve_textures(program);
        let pipeline = PipelineKey {
            program: key,
            color_format: self.target_format(self.framebuffer),
            depth_format: self.ctx.depth_format,
            cull_face: self.cull_face,
        };

        let aligned = self.uniform_arena.len().next_multiple_of(self.uniform_alignment);
        let staging = program.staging();
        self.uniform_arena.resize(aligned, 0);
        self.uniform_arena.extend_from_slice(staging);

        self.commands.push(Command::Draw(DrawCommand {
            target: self.framebuffer,
            viewport: self.viewport,
            pipeline,
            uniform_offset: aligned as u32,
            textures,
            vertex_buffers,
            first,
            count: end - first,
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::framebuffer_rect;
    use crate::renderer::Viewport;

    #[test]
    fn viewport_origin_moves_to_top_left() {
        let rect = framebuffer_rect(Viewport::new(0, 0, 100, 50), (200, 100));
        assert_eq!(rect, Some((0.0, 50.0, 100.0, 50.0)));
    }

    #[test]
    fn viewport_is_clipped_to_target() {
        let rect = framebuffer_rect(Viewport::new(150, 0, 100, 100), (200, 100));
        assert_eq!(rect, Some((150.0, 0.0, 50.0, 100.0)));
        assert_eq!(framebuffer_rect(Viewport::new(300, 0, 10, 10), (200, 100)), None);
    }
}
