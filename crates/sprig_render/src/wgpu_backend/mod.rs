//! [`GraphicsApi`] on top of wgpu
//!
//! wgpu has no immediate-mode draws, so each `draw_elements` is turned into a recorded
//! command: its indices, the vertex bytes it reads & the program's matrix are copied into
//! per-frame arenas, which keeps later buffer updates in the same frame from clobbering
//! earlier draws. [`WgpuBackend::render`] uploads the arenas once & replays every command in
//! a single render pass. Commands hold on to the texture they sample, so deleting a texture
//! before `render` doesn't change what an earlier draw shows.
//!
//! Supported shader interface: the texture bound to unit 0 at `@group(0)` (texture at
//! binding 0, sampler at binding 1) & one `mat4x4<f32>` uniform at `@group(1) @binding(0)`.
//! Entry points are `vs_main` & `fs_main`.

mod pipeline;
mod texture;

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::ops::Range;

use glam::Mat4;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindingResource, Buffer,
    BufferBinding, BufferDescriptor, BufferUsages, Device, ErrorFilter, IndexFormat, LoadOp,
    Operations, PipelineLayout, Queue, RenderPassColorAttachment, RenderPassDescriptor,
    RenderPipeline, ShaderModule, ShaderModuleDescriptor, ShaderSource, StoreOp, TextureFormat,
    TextureView,
};

use self::{
    pipeline::{PipelineKey, SlotLayout, UNIFORM_SIZE},
    texture::TextureUploader,
};
use crate::{
    gpu::{
        AttributeFormat, BlendEquation, BlendFunc, BufferId, BufferTarget, BufferUsage,
        GraphicsApi, IndexType, Primitive, ProgramId, TextureId, TextureTarget, VertexArrayId,
    },
    shadow::Shadow,
};

// vertex buffer offsets & copy sizes must be multiples of this
const COPY_ALIGNMENT: usize = wgpu::COPY_BUFFER_ALIGNMENT as usize;

struct Program {
    vertex: ShaderModule,
    fragment: ShaderModule,
    matrix: Mat4,
    matrix_uniform: Option<String>,
}

struct DrawCommand {
    pipeline: usize,
    texture: BindGroup,
    uniform_offset: u32,
    slots: Vec<Range<u64>>,
    indices: Range<u32>,
}

#[derive(Default)]
struct Frame {
    vertices: Vec<u8>,
    indices: Vec<u32>,
    uniforms: Vec<u8>,
    commands: Vec<DrawCommand>,
}

impl Frame {
    fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.uniforms.clear();
        self.commands.clear();
    }
}

#[derive(Default)]
struct FrameBuffers {
    vertex: Option<Buffer>,
    index: Option<Buffer>,
    uniform: Option<Buffer>,
    uniform_bind_group: Option<BindGroup>,
}

/// Renders through wgpu, emulating GL's bind-then-draw model
pub struct WgpuBackend {
    device: Device,
    queue: Queue,
    format: TextureFormat,
    uploader: TextureUploader,
    uniform_layout: BindGroupLayout,
    pipeline_layout: PipelineLayout,
    uniform_alignment: usize,
    shadow: Shadow,
    programs: HashMap<ProgramId, Program>,
    program: Option<ProgramId>,
    textures: HashMap<TextureId, BindGroup>,
    bound_textures: HashMap<(u32, TextureTarget), TextureId>,
    white: BindGroup,
    blend_enabled: bool,
    blend_equation: (BlendEquation, BlendEquation),
    blend_func: BlendFunc,
    pipelines: Vec<Option<RenderPipeline>>,
    pipeline_ids: HashMap<PipelineKey, usize>,
    frame: Frame,
    gpu_buffers: FrameBuffers,
}

impl WgpuBackend {
    /// Creates a backend drawing into render targets of `format`
    pub fn new(device: Device, queue: Queue, format: TextureFormat) -> Self {
        let uploader =
            TextureUploader::new(&device, pipeline::create_texture_bind_group_layout(&device));
        let uniform_layout = pipeline::create_uniform_bind_group_layout(&device);
        let pipeline_layout =
            pipeline::create_pipeline_layout(&device, uploader.layout(), &uniform_layout);
        let white = uploader.white(&device, &queue);
        let uniform_alignment = device.limits().min_uniform_buffer_offset_alignment as usize;

        log::info!("wgpu backend ready, target format {format:?}");

        Self {
            device,
            queue,
            format,
            uploader,
            uniform_layout,
            pipeline_layout,
            uniform_alignment,
            shadow: Shadow::default(),
            programs: HashMap::new(),
            program: None,
            textures: HashMap::new(),
            bound_textures: HashMap::new(),
            white,
            blend_enabled: false,
            blend_equation: (BlendEquation::Add, BlendEquation::Add),
            blend_func: BlendFunc::REPLACE,
            pipelines: Vec::new(),
            pipeline_ids: HashMap::new(),
            frame: Frame::default(),
            gpu_buffers: FrameBuffers::default(),
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Draw commands waiting for the next [`render`](Self::render)
    pub fn pending_draws(&self) -> usize {
        self.frame.commands.len()
    }

    /// Replays every draw recorded since the last call into `view` & submits the work
    ///
    /// `clear` wipes the target first; `None` draws over what is already there.
    pub fn render(&mut self, view: &TextureView, clear: Option<wgpu::Color>) {
        let mut frame = std::mem::take(&mut self.frame);
        pad_to(&mut frame.vertices, COPY_ALIGNMENT);
        self.upload(&frame);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Sprig Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Sprig Pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: Operations {
                        load: clear.map_or(LoadOp::Load, LoadOp::Clear),
                        store: StoreOp::Store,
                    },
                })],
                ..Default::default()
            });

            if let (Some(vertex), Some(index), Some(uniforms)) = (
                &self.gpu_buffers.vertex,
                &self.gpu_buffers.index,
                &self.gpu_buffers.uniform_bind_group,
            ) {
                pass.set_index_buffer(index.slice(..), IndexFormat::Uint32);
                for command in &frame.commands {
                    let Some(pipeline) = &self.pipelines[command.pipeline] else {
                        continue;
                    };
                    pass.set_pipeline(pipeline);
                    pass.set_bind_group(0, &command.texture, &[]);
                    pass.set_bind_group(1, uniforms, &[command.uniform_offset]);
                    for (slot, range) in command.slots.iter().enumerate() {
                        pass.set_vertex_buffer(slot as u32, vertex.slice(range.clone()));
                    }
                    pass.draw_indexed(command.indices.clone(), 0, 0..1);
                }
            }
        }
        self.queue.submit(Some(encoder.finish()));

        log::trace!("submitted {} draws", frame.commands.len());
        frame.clear();
        self.frame = frame;
    }

    // Writes the frame arenas into GPU buffers, growing them when needed
    fn upload(&mut self, frame: &Frame) {
        if frame.commands.is_empty() {
            return;
        }
        let device = &self.device;
        ensure_buffer(
            device,
            &mut self.gpu_buffers.vertex,
            frame.vertices.len(),
            BufferUsages::VERTEX,
            "Sprig Vertex Arena",
        );
        ensure_buffer(
            device,
            &mut self.gpu_buffers.index,
            frame.indices.len() * IndexType::U32.size(),
            BufferUsages::INDEX,
            "Sprig Index Arena",
        );

        let grown = ensure_buffer(
            device,
            &mut self.gpu_buffers.uniform,
            frame.uniforms.len(),
            BufferUsages::UNIFORM,
            "Sprig Uniform Arena",
        );
        if let (true, Some(buffer)) = (grown, &self.gpu_buffers.uniform) {
            log::debug!("uniform arena grown to {} bytes", buffer.size());
            self.gpu_buffers.uniform_bind_group =
                Some(device.create_bind_group(&BindGroupDescriptor {
                    label: Some("Sprig Uniform Bind Group"),
                    layout: &self.uniform_layout,
                    entries: &[BindGroupEntry {
                        binding: 0,
                        resource: BindingResource::Buffer(BufferBinding {
                            buffer,
                            offset: 0,
                            size: NonZeroU64::new(UNIFORM_SIZE),
                        }),
                    }],
                }));
        }

        if let Some(buffer) = &self.gpu_buffers.vertex {
            self.queue.write_buffer(buffer, 0, &frame.vertices);
        }
        if let Some(buffer) = &self.gpu_buffers.index {
            self.queue
                .write_buffer(buffer, 0, bytemuck::cast_slice(&frame.indices));
        }
        if let Some(buffer) = &self.gpu_buffers.uniform {
            self.queue.write_buffer(buffer, 0, &frame.uniforms);
        }
    }

    fn pipeline_index(&mut self, key: PipelineKey) -> Option<usize> {
        if let Some(&index) = self.pipeline_ids.get(&key) {
            return Some(index);
        }
        let program = self.programs.get(&key.program)?;

        self.device.push_error_scope(ErrorFilter::Validation);
        let pipeline = pipeline::create_pipeline(
            &self.device,
            &self.pipeline_layout,
            &program.vertex,
            &program.fragment,
            &key,
            self.format,
        );
        let pipeline = match pollster::block_on(self.device.pop_error_scope()) {
            None => Some(pipeline),
            Some(err) => {
                // remembered as unusable so the error is reported once
                log::warn!("pipeline for program {:?} rejected: {err}", key.program);
                None
            }
        };

        let index = self.pipelines.len();
        self.pipelines.push(pipeline);
        self.pipeline_ids.insert(key, index);
        log::debug!("created pipeline #{index}");
        Some(index)
    }

    // Copies the vertex data the bound vertex array feeds to indices up to `max_index`
    // into the frame arena, returning the slot layouts & their arena ranges
    fn copy_vertex_slots(&mut self, max_index: usize) -> Option<(Vec<SlotLayout>, Vec<Range<u64>>)> {
        let (_, vao) = self.shadow.bound_vertex_array()?;
        let mut pointers: Vec<_> = vao.active_pointers().collect();
        pointers.sort_by_key(|(_, p)| (p.buffer, p.effective_stride(), p.offset));

        // attributes sharing a buffer & stride whose bytes fit in one stride share a slot
        let mut groups: Vec<(usize, Vec<(u32, crate::shadow::AttribPointer)>)> = Vec::new();
        for (location, pointer) in pointers {
            let size = attribute_size(pointer.format);
            let joins = groups.last().is_some_and(|(base, group)| {
                let first = group[0].1;
                first.buffer == pointer.buffer
                    && first.effective_stride() == pointer.effective_stride()
                    && pointer.offset - base + size <= pointer.effective_stride()
            });
            match groups.last_mut() {
                Some((_, group)) if joins => group.push((location, pointer)),
                _ => {
                    let base = pointer.offset;
                    groups.push((base, vec![(location, pointer)]));
                }
            }
        }

        let mut layouts = Vec::with_capacity(groups.len());
        let mut ranges = Vec::with_capacity(groups.len());
        for (base, group) in groups {
            let stride = group[0].1.effective_stride();
            let mut attributes = Vec::with_capacity(group.len());
            let mut extent = 0;
            for (location, pointer) in &group {
                let Some(format) = pipeline::vertex_format(pointer.format) else {
                    log::warn!("unsupported vertex format {:?}", pointer.format);
                    return None;
                };
                extent = extent.max(pointer.offset - base + attribute_size(pointer.format));
                attributes.push(wgpu::VertexAttribute {
                    format,
                    offset: (pointer.offset - base) as u64,
                    shader_location: *location,
                });
            }

            let needed = stride * max_index + extent;
            let Some(bytes) = self
                .shadow
                .buffer(group[0].1.buffer)
                .and_then(|data| data.get(base..base + needed))
            else {
                log::warn!("draw reads past the end of buffer {:?}", group[0].1.buffer);
                return None;
            };

            pad_to(&mut self.frame.vertices, COPY_ALIGNMENT);
            let start = self.frame.vertices.len() as u64;
            self.frame.vertices.extend_from_slice(bytes);
            ranges.push(start..self.frame.vertices.len() as u64);
            layouts.push(SlotLayout {
                stride: stride as u64,
                attributes,
            });
        }
        Some((layouts, ranges))
    }

    // What unit 0 samples right now; unbound or deleted textures read as white
    fn sampled_texture(&self) -> &BindGroup {
        self.bound_textures
            .get(&(0, TextureTarget::Texture2D))
            .and_then(|texture| self.textures.get(texture))
            .unwrap_or(&self.white)
    }

    fn warn_misuse(result: Result<(), String>) {
        if let Err(message) = result {
            log::warn!("{message}");
        }
    }
}

fn attribute_size(format: AttributeFormat) -> usize {
    format.data_type.size() * format.count as usize
}

fn pad_to(bytes: &mut Vec<u8>, alignment: usize) {
    let len = bytes.len().next_multiple_of(alignment);
    bytes.resize(len, 0);
}

// Replaces `slot` with a larger buffer when it can't hold `size` bytes; reports growth
fn ensure_buffer(
    device: &Device,
    slot: &mut Option<Buffer>,
    size: usize,
    usage: BufferUsages,
    label: &str,
) -> bool {
    let size = (size.max(COPY_ALIGNMENT) as u64).next_power_of_two();
    if slot.as_ref().is_some_and(|buffer| buffer.size() >= size) {
        return false;
    }
    *slot = Some(device.create_buffer(&BufferDescriptor {
        label: Some(label),
        size,
        usage: usage | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    }));
    true
}

impl GraphicsApi for WgpuBackend {
    fn create_buffer(&mut self) -> BufferId {
        self.shadow.create_buffer()
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        Self::warn_misuse(self.shadow.delete_buffer(buffer));
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        Self::warn_misuse(self.shadow.bind_buffer(target, buffer));
    }

    // Contents live on the CPU until a draw copies them out, so usage hints don't matter
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], _usage: BufferUsage) {
        Self::warn_misuse(self.shadow.buffer_data(target, data));
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        Self::warn_misuse(self.shadow.buffer_sub_data(target, offset, data));
    }

    fn create_vertex_array(&mut self) -> VertexArrayId {
        self.shadow.create_vertex_array()
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.shadow.delete_vertex_array(vertex_array);
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        self.shadow.bind_vertex_array(vertex_array);
    }

    fn vertex_attrib_pointer(
        &mut self,
        location: u32,
        format: AttributeFormat,
        stride: usize,
        offset: usize,
    ) {
        Self::warn_misuse(
            self.shadow
                .vertex_attrib_pointer(location, format, stride, offset),
        );
    }

    fn enable_vertex_attrib(&mut self, location: u32) {
        Self::warn_misuse(self.shadow.set_vertex_attrib_enabled(location, true));
    }

    fn disable_vertex_attrib(&mut self, location: u32) {
        Self::warn_misuse(self.shadow.set_vertex_attrib_enabled(location, false));
    }

    fn create_program(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<ProgramId, String> {
        self.device.push_error_scope(ErrorFilter::Validation);
        let vertex = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Sprig Vertex Shader"),
            source: ShaderSource::Wgsl(vertex_src.into()),
        });
        let fragment = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Sprig Fragment Shader"),
            source: ShaderSource::Wgsl(fragment_src.into()),
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(err.to_string());
        }

        let program = ProgramId(self.shadow.next_id());
        self.programs.insert(
            program,
            Program {
                vertex,
                fragment,
                matrix: Mat4::IDENTITY,
                matrix_uniform: None,
            },
        );
        Ok(program)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        if self.program == Some(program) {
            self.program = None;
        }
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.program = program;
    }

    fn uniform_mat4(&mut self, program: ProgramId, name: &str, value: &Mat4) {
        let Some(p) = self.programs.get_mut(&program) else {
            log::warn!("uniform `{name}` set on unknown program {program:?}");
            return;
        };
        match &p.matrix_uniform {
            Some(known) if known != name => {
                log::warn!("program {program:?} only supports one matrix, ignoring `{name}`");
            }
            _ => {
                p.matrix_uniform = Some(name.to_owned());
                p.matrix = *value;
            }
        }
    }

    // Samplers are fixed to unit 0
    fn uniform_i32(&mut self, program: ProgramId, name: &str, value: i32) {
        if value != 0 {
            log::warn!("program {program:?}: `{name}` = {value} ignored, only unit 0 is sampled");
        }
    }

    // Invalid pixels leave the id without storage, so draws sample white
    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> TextureId {
        let texture = TextureId(self.shadow.next_id());
        match self
            .uploader
            .upload(&self.device, &self.queue, width, height, rgba)
        {
            Ok(bind_group) => {
                self.textures.insert(texture, bind_group);
            }
            Err(err) => log::warn!("texture {texture:?} sampled as white: {err}"),
        }
        texture
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.bound_textures.retain(|_, bound| *bound != texture);
    }

    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: Option<TextureId>) {
        match texture {
            Some(texture) => {
                self.bound_textures.insert((unit, target), texture);
            }
            None => {
                self.bound_textures.remove(&(unit, target));
            }
        }
    }

    fn set_blend_enabled(&mut self, enabled: bool) {
        self.blend_enabled = enabled;
    }

    fn blend_equation_separate(&mut self, rgb: BlendEquation, alpha: BlendEquation) {
        self.blend_equation = (rgb, alpha);
    }

    fn blend_func_separate(&mut self, func: BlendFunc) {
        self.blend_func = func;
    }

    // Render targets have no depth attachment
    fn depth_mask(&mut self, write: bool) {
        log::trace!("depth writes {write}, no depth attachment");
    }

    fn draw_elements(
        &mut self,
        primitive: Primitive,
        count: usize,
        index_type: IndexType,
        offset: usize,
    ) {
        let Some(program) = self.program else {
            log::warn!("draw without a program in use");
            return;
        };
        let indices = match self.shadow.read_indices(count, index_type, offset) {
            Ok(indices) => indices,
            Err(message) => {
                log::warn!("{message}");
                return;
            }
        };
        let Some(&max_index) = indices.iter().max() else {
            return;
        };
        let Some(matrix) = self.programs.get(&program).map(|p| p.matrix) else {
            log::warn!("draw with deleted program {program:?}");
            return;
        };
        let Some((slots, ranges)) = self.copy_vertex_slots(max_index as usize) else {
            return;
        };

        let key = PipelineKey {
            program,
            slots,
            blend: self
                .blend_enabled
                .then_some((self.blend_func, self.blend_equation.0, self.blend_equation.1)),
            primitive,
        };
        let Some(pipeline) = self.pipeline_index(key) else {
            return;
        };

        let uniforms = &mut self.frame.uniforms;
        pad_to(uniforms, self.uniform_alignment);
        let uniform_offset = uniforms.len() as u32;
        uniforms.extend_from_slice(bytemuck::cast_slice(&matrix.to_cols_array()));

        let texture = self.sampled_texture().clone();
        let first = self.frame.indices.len() as u32;
        self.frame.indices.extend_from_slice(&indices);
        self.frame.commands.push(DrawCommand {
            pipeline,
            texture,
            uniform_offset,
            slots: ranges,
            indices: first..self.frame.indices.len() as u32,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        math::vec2,
        sprite_batch::{SpriteBatch, SpriteBatchConfig},
        state::GpuContext,
        texture::Texture,
    };

    const SIZE: u32 = 4;
    const FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
    // rows of a texture-to-buffer copy are padded to this
    const ROW_BYTES: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

    fn backend() -> Option<WgpuBackend> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&Default::default())).ok()?;
        let (device, queue) =
            pollster::block_on(adapter.request_device(&Default::default())).ok()?;
        Some(WgpuBackend::new(device, queue, FORMAT))
    }

    fn target(device: &Device) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: None,
            size: wgpu::Extent3d {
                width: SIZE,
                height: SIZE,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    fn first_pixel(backend: &WgpuBackend, target: &wgpu::Texture) -> [u8; 4] {
        let device = backend.device();
        let readback = device.create_buffer(&BufferDescriptor {
            label: None,
            size: (ROW_BYTES * SIZE) as u64,
            usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&Default::default());
        encoder.copy_texture_to_buffer(
            target.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(ROW_BYTES),
                    rows_per_image: Some(SIZE),
                },
            },
            target.size(),
        );
        backend.queue().submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        slice.map_async(wgpu::MapMode::Read, |result| result.unwrap());
        device.poll(wgpu::PollType::Wait).unwrap();
        let bytes = slice.get_mapped_range();
        [bytes[0], bytes[1], bytes[2], bytes[3]]
    }

    #[test]
    fn textures_deleted_before_render_still_show() {
        let Some(backend) = backend() else {
            eprintln!("no GPU adapter, skipping");
            return;
        };
        let target = target(backend.device());
        let view = target.create_view(&Default::default());

        let mut ctx = GpuContext::new(backend);
        let mut batch = SpriteBatch::new(
            &mut ctx,
            SpriteBatchConfig {
                max_sprites: 1,
                viewport: vec2(SIZE as f32, SIZE as f32),
                ..Default::default()
            },
        )
        .unwrap();
        let red = Texture::new(&mut ctx, 1, 1, &[255, 0, 0, 255]).unwrap();

        batch.begin(&mut ctx).unwrap();
        batch
            .draw_sized(&mut ctx, &red, 0.0, 0.0, SIZE as f32, SIZE as f32)
            .unwrap();
        batch.end(&mut ctx).unwrap();
        red.close(&mut ctx);
        assert_eq!(ctx.api().pending_draws(), 1);

        ctx.api_mut().render(&view, Some(wgpu::Color::BLACK));
        assert_eq!(first_pixel(ctx.api(), &target), [255, 0, 0, 255]);
    }

    #[test]
    fn invalid_pixels_fall_back_to_white() {
        let Some(mut backend) = backend() else {
            eprintln!("no GPU adapter, skipping");
            return;
        };
        let empty = backend.create_texture(0, 0, &[]);
        let short = backend.create_texture(2, 2, &[0; 4]);

        assert!(!backend.textures.contains_key(&empty));
        assert!(!backend.textures.contains_key(&short));
        backend.bind_texture(0, TextureTarget::Texture2D, Some(short));
        assert!(std::ptr::eq(backend.sampled_texture(), &backend.white));
    }
}
