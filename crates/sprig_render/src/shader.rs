
use glam::Mat4;

use crate::{
    error::{RenderError, Result},
    gpu::{DataType, GraphicsApi, ProgramId},
    state::GpuContext,
    vertex::{
        COLOR_ATTRIBUTE, POSITION_ATTRIBUTE, TEXCOORD_ATTRIBUTE, VertexAttribute, VertexLayout,
    },
};

pub const DEFAULT_MATRIX_UNIFORM: &str = "u_projTrans";
pub const DEFAULT_TEXTURE_UNIFORM: &str = "u_texture";

/// Attribute names the sprite batch's vertex layout & default shader agree on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeNames {
    pub position: String,
    pub color: String,
    pub tex_coords: String,
}

impl Default for AttributeNames {
    fn default() -> Self {
        Self {
            position: POSITION_ATTRIBUTE.to_owned(),
            color: COLOR_ATTRIBUTE.to_owned(),
            tex_coords: format!("{TEXCOORD_ATTRIBUTE}0"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum UniformValue {
    Mat4(Mat4),
    I32(i32),
}

/// A linked program plus uniform writes waiting to be uploaded
///
/// Cloning copies the handle; both clones refer to the same GPU program.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    id: ProgramId,
    matrix_uniform: String,
    texture_uniform: String,
    pending: Vec<(String, UniformValue)>,
}

impl ShaderProgram {
    /// Compiles & links a program, surfacing the backend's log on failure
    pub fn new<A: GraphicsApi>(
        ctx: &mut GpuContext<A>,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<Self> {
        let id = ctx
            .create_program(vertex_src, fragment_src)
            .map_err(RenderError::ShaderCompilation)?;
        log::debug!("Shader program {id:?} linked");
        Ok(Self {
            id,
            matrix_uniform: DEFAULT_MATRIX_UNIFORM.to_owned(),
            texture_uniform: DEFAULT_TEXTURE_UNIFORM.to_owned(),
            pending: Vec::new(),
        })
    }

    /// Builds the default sprite program for `layout`
    pub fn default_sprite<A: GraphicsApi>(
        ctx: &mut GpuContext<A>,
        names: &AttributeNames,
        layout: &VertexLayout,
    ) -> Result<Self> {
        let (vertex_src, fragment_src) =
            default_sprite_shader_source(names, layout, DEFAULT_MATRIX_UNIFORM);
        Self::new(ctx, &vertex_src, &fragment_src)
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    /// Uniform the sprite batch writes its combined projection × transform matrix to
    pub fn matrix_uniform(&self) -> &str {
        &self.matrix_uniform
    }

    pub fn with_matrix_uniform(mut self, name: impl Into<String>) -> Self {
        self.matrix_uniform = name.into();
        self
    }

    /// Sampler uniform set to the texture unit the batch binds its texture on
    pub fn texture_uniform(&self) -> &str {
        &self.texture_uniform
    }

    pub fn with_texture_uniform(mut self, name: impl Into<String>) -> Self {
        self.texture_uniform = name.into();
        self
    }

    pub fn set_uniform_mat4(&mut self, name: &str, value: Mat4) {
        queue(&mut self.pending, name, UniformValue::Mat4(value));
    }

    pub fn set_uniform_i32(&mut self, name: &str, value: i32) {
        queue(&mut self.pending, name, UniformValue::I32(value));
    }

    /// Queues `value` for [`matrix_uniform`](Self::matrix_uniform)
    pub fn set_combined_matrix(&mut self, value: Mat4) {
        queue(&mut self.pending, &self.matrix_uniform, UniformValue::Mat4(value));
    }

    /// Queues `unit` for [`texture_uniform`](Self::texture_uniform)
    pub fn set_texture_unit(&mut self, unit: i32) {
        queue(&mut self.pending, &self.texture_uniform, UniformValue::I32(unit));
    }

    pub fn has_pending_uniforms(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Sends all pending uniform writes to the GPU
    pub fn upload_uniforms<A: GraphicsApi>(&mut self, ctx: &mut GpuContext<A>) {
        for (name, value) in self.pending.drain(..) {
            match value {
                UniformValue::Mat4(m) => ctx.uniform_mat4(self.id, &name, &m),
                UniformValue::I32(v) => ctx.uniform_i32(self.id, &name, v),
            }
        }
    }

    /// Makes this the active program
    pub fn bind<A: GraphicsApi>(&self, ctx: &mut GpuContext<A>) {
        ctx.use_program(Some(self.id));
    }

    pub fn close<A: GraphicsApi>(self, ctx: &mut GpuContext<A>) {
        ctx.delete_program(self.id);
    }
}

// a later write to the same name replaces the earlier one
fn queue(pending: &mut Vec<(String, UniformValue)>, name: &str, value: UniformValue) {
    match pending.iter_mut().find(|(n, _)| n == name) {
        Some((_, slot)) => *slot = value,
        None => pending.push((name.to_owned(), value)),
    }
}

fn wgsl_type(attribute: &VertexAttribute) -> String {
    let scalar = match attribute.data_type() {
        DataType::Float | DataType::Double => "f32",
        _ if attribute.normalized() => "f32",
        DataType::Byte | DataType::Short | DataType::Int => "i32",
        DataType::UnsignedByte | DataType::UnsignedShort | DataType::UnsignedInt => "u32",
    };
    match attribute.count() {
        1 => scalar.to_owned(),
        n => format!("vec{n}<{scalar}>"),
    }
}

// Widens an attribute expression to vec4<f32>, filling the gaps like GL does (0, 0, 0, 1)
fn to_vec4(attribute: &VertexAttribute, expr: &str) -> String {
    let expr = match wgsl_type(attribute).as_str() {
        "f32" | "vec2<f32>" | "vec3<f32>" | "vec4<f32>" => expr.to_owned(),
        other if other.starts_with("vec") => {
            format!("vec{}<f32>({expr})", attribute.count())
        }
        _ => format!("f32({expr})"),
    };
    match attribute.count() {
        1 => format!("vec4<f32>({expr}, 0.0, 0.0, 1.0)"),
        2 => format!("vec4<f32>({expr}, 0.0, 1.0)"),
        3 => format!("vec4<f32>({expr}, 1.0)"),
        _ => expr,
    }
}

const VARYINGS: &str = "struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) uv: vec2<f32>,
};
";

/// WGSL `(vertex, fragment)` sources of the default sprite shader
///
/// The vertex stage transforms the position by `matrix_uniform` & passes color & the first
/// texture coordinates through, rescaling alpha by 255/254 to undo the packed color's
/// lossy alpha. The fragment stage multiplies the texture sample by the vertex color.
/// Attributes missing from `layout` fall back to white & `(0, 0)`.
pub fn default_sprite_shader_source(
    names: &AttributeNames,
    layout: &VertexLayout,
    matrix_uniform: &str,
) -> (String, String) {
    let inputs: String = layout
        .attributes()
        .iter()
        .map(|attribute| {
            format!(
                "    @location({}) {}: {},\n",
                attribute.index().unwrap_or_default(),
                attribute.name(),
                wgsl_type(attribute)
            )
        })
        .collect();

    let attr = |name: &str| layout.get(name).map(|a| to_vec4(a, &format!("v.{}", a.name())));
    let position = attr(&names.position).unwrap_or_else(|| "vec4<f32>(0.0, 0.0, 0.0, 1.0)".into());
    let color = attr(&names.color).unwrap_or_else(|| "vec4<f32>(1.0)".into());
    let uv = attr(&names.tex_coords)
        .map(|uv| format!("{uv}.xy"))
        .unwrap_or_else(|| "vec2<f32>(0.0)".into());

    let vs = format!(
        "struct Transform {{
    {matrix_uniform}: mat4x4<f32>,
}};

@group(1) @binding(0)
var<uniform> transform: Transform;

{VARYINGS}
struct VertexInput {{
{inputs}}};

@vertex
fn vs_main(v: VertexInput) -> VertexOutput {{
    var out: VertexOutput;
    out.color = {color};
    out.color.a = out.color.a * (255.0 / 254.0);
    out.uv = {uv};
    out.position = transform.{matrix_uniform} * {position};
    return out;
}}
"
    );

    let texture = DEFAULT_TEXTURE_UNIFORM;
    let fs = format!(
        "@group(0) @binding(0)
var {texture}: texture_2d<f32>;
@group(0) @binding(1)
var {texture}_sampler: sampler;

{VARYINGS}
@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {{
    return input.color * textureSample({texture}, {texture}_sampler, input.uv);
}}
"
    );

    (vs, fs)
}
