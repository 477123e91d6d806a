use std::num::NonZeroU64;

use wgpu::{
    BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType, BlendComponent,
    BlendOperation, BlendState, BufferBindingType, ColorTargetState, ColorWrites, Device,
    FragmentState, IndexFormat, PipelineLayout, PipelineLayoutDescriptor, PrimitiveState,
    PrimitiveTopology, RenderPipeline, RenderPipelineDescriptor, SamplerBindingType,
    ShaderModule, ShaderStages, TextureFormat, TextureSampleType, TextureViewDimension,
    VertexAttribute, VertexBufferLayout, VertexFormat, VertexState, VertexStepMode,
};

use crate::gpu::{
    AttributeFormat, BlendEquation, BlendFactor, BlendFunc, DataType, Primitive, ProgramId,
};

/// Bytes of the per-draw uniform block (one `mat4x4<f32>`)
pub(super) const UNIFORM_SIZE: u64 = 64;

/// One vertex buffer slot: a stride & the attributes read from it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct SlotLayout {
    pub stride: u64,
    pub attributes: Vec<VertexAttribute>,
}

/// Everything a render pipeline depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct PipelineKey {
    pub program: ProgramId,
    pub slots: Vec<SlotLayout>,
    pub blend: Option<(BlendFunc, BlendEquation, BlendEquation)>,
    pub primitive: Primitive,
}

/// Creates the bind group layout for texture sampling
///
/// - Binding 0: 2D texture (fragment shader)
/// - Binding 1: Sampler (fragment shader)
pub(super) fn create_texture_bind_group_layout(device: &Device) -> BindGroupLayout {
    device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("Sprig Texture Bind Group Layout"),
        entries: &[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: true },
                    view_dimension: TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Sampler(SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

/// Creates the bind group layout for the program's matrix
///
/// Every draw of a frame reads its matrix from the same buffer at its own dynamic offset.
pub(super) fn create_uniform_bind_group_layout(device: &Device) -> BindGroupLayout {
    device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("Sprig Uniform Bind Group Layout"),
        entries: &[BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStages::VERTEX,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: NonZeroU64::new(UNIFORM_SIZE),
            },
            count: None,
        }],
    })
}

pub(super) fn create_pipeline_layout(
    device: &Device,
    texture_layout: &BindGroupLayout,
    uniform_layout: &BindGroupLayout,
) -> PipelineLayout {
    device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("Sprig Pipeline Layout"),
        bind_group_layouts: &[texture_layout, uniform_layout],
        push_constant_ranges: &[],
    })
}

/// Builds the pipeline described by `key` out of a program's two shader modules
pub(super) fn create_pipeline(
    device: &Device,
    layout: &PipelineLayout,
    vertex: &ShaderModule,
    fragment: &ShaderModule,
    key: &PipelineKey,
    format: TextureFormat,
) -> RenderPipeline {
    let buffers: Vec<_> = key
        .slots
        .iter()
        .map(|slot| VertexBufferLayout {
            array_stride: slot.stride,
            step_mode: VertexStepMode::Vertex,
            attributes: &slot.attributes,
        })
        .collect();
    let (topology, strip_index_format) = topology(key.primitive);

    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("Sprig Pipeline"),
        layout: Some(layout),
        vertex: VertexState {
            module: vertex,
            entry_point: Some("vs_main"),
            buffers: &buffers,
            compilation_options: Default::default(),
        },
        primitive: PrimitiveState {
            topology,
            strip_index_format,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: Default::default(),
        fragment: Some(FragmentState {
            module: fragment,
            entry_point: Some("fs_main"),
            targets: &[Some(ColorTargetState {
                format,
                blend: key
                    .blend
                    .map(|(func, rgb, alpha)| blend_state(func, rgb, alpha)),
                write_mask: ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        multiview: None,
        cache: None,
    })
}

pub(super) fn topology(primitive: Primitive) -> (PrimitiveTopology, Option<IndexFormat>) {
    match primitive {
        Primitive::Points => (PrimitiveTopology::PointList, None),
        Primitive::Lines => (PrimitiveTopology::LineList, None),
        Primitive::LineStrip => (PrimitiveTopology::LineStrip, Some(IndexFormat::Uint32)),
        Primitive::Triangles => (PrimitiveTopology::TriangleList, None),
        Primitive::TriangleStrip => (PrimitiveTopology::TriangleStrip, Some(IndexFormat::Uint32)),
    }
}

pub(super) fn blend_state(func: BlendFunc, rgb: BlendEquation, alpha: BlendEquation) -> BlendState {
    BlendState {
        color: blend_component(func.src_rgb, func.dst_rgb, rgb),
        alpha: blend_component(func.src_alpha, func.dst_alpha, alpha),
    }
}

fn blend_component(src: BlendFactor, dst: BlendFactor, equation: BlendEquation) -> BlendComponent {
    let operation = match equation {
        BlendEquation::Add => BlendOperation::Add,
        BlendEquation::Subtract => BlendOperation::Subtract,
        BlendEquation::ReverseSubtract => BlendOperation::ReverseSubtract,
        BlendEquation::Min => BlendOperation::Min,
        BlendEquation::Max => BlendOperation::Max,
    };
    // min/max ignore the factors, & wgpu insists they be One
    if matches!(operation, BlendOperation::Min | BlendOperation::Max) {
        return BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation,
        };
    }
    BlendComponent {
        src_factor: blend_factor(src),
        dst_factor: blend_factor(dst),
        operation,
    }
}

fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        // wgpu has a single blend constant; alpha variants read the same value
        BlendFactor::ConstantColor | BlendFactor::ConstantAlpha => wgpu::BlendFactor::Constant,
        BlendFactor::OneMinusConstantColor | BlendFactor::OneMinusConstantAlpha => {
            wgpu::BlendFactor::OneMinusConstant
        }
        BlendFactor::SrcAlphaSaturate => wgpu::BlendFactor::SrcAlphaSaturated,
    }
}

/// wgpu vertex format reading `format`, if there is one
pub(super) fn vertex_format(format: AttributeFormat) -> Option<VertexFormat> {
    use VertexFormat as F;
    let AttributeFormat {
        data_type,
        count,
        normalized,
    } = format;
    Some(match (data_type, count, normalized) {
        (DataType::Float, 1, _) => F::Float32,
        (DataType::Float, 2, _) => F::Float32x2,
        (DataType::Float, 3, _) => F::Float32x3,
        (DataType::Float, 4, _) => F::Float32x4,
        (DataType::Double, 1, _) => F::Float64,
        (DataType::Double, 2, _) => F::Float64x2,
        (DataType::Double, 3, _) => F::Float64x3,
        (DataType::Double, 4, _) => F::Float64x4,
        (DataType::UnsignedByte, 2, true) => F::Unorm8x2,
        (DataType::UnsignedByte, 4, true) => F::Unorm8x4,
        (DataType::UnsignedByte, 2, false) => F::Uint8x2,
        (DataType::UnsignedByte, 4, false) => F::Uint8x4,
        (DataType::Byte, 2, true) => F::Snorm8x2,
        (DataType::Byte, 4, true) => F::Snorm8x4,
        (DataType::Byte, 2, false) => F::Sint8x2,
        (DataType::Byte, 4, false) => F::Sint8x4,
        (DataType::UnsignedShort, 2, true) => F::Unorm16x2,
        (DataType::UnsignedShort, 4, true) => F::Unorm16x4,
        (DataType::UnsignedShort, 2, false) => F::Uint16x2,
        (DataType::UnsignedShort, 4, false) => F::Uint16x4,
        (DataType::Short, 2, true) => F::Snorm16x2,
        (DataType::Short, 4, true) => F::Snorm16x4,
        (DataType::Short, 2, false) => F::Sint16x2,
        (DataType::Short, 4, false) => F::Sint16x4,
        (DataType::Int, 1, false) => F::Sint32,
        (DataType::Int, 2, false) => F::Sint32x2,
        (DataType::Int, 3, false) => F::Sint32x3,
        (DataType::Int, 4, false) => F::Sint32x4,
        (DataType::UnsignedInt, 1, false) => F::Uint32,
        (DataType::UnsignedInt, 2, false) => F::Uint32x2,
        (DataType::UnsignedInt, 3, false) => F::Uint32x3,
        (DataType::UnsignedInt, 4, false) => F::Uint32x4,
        _ => return None,
    })
}
