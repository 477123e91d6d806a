//! The graphics API surface the batching core is written against
//!
//! Shaped after GL's immediate-mode calls so that the state cache in [`crate::state`] can sit
//! in front of it. Implemented by [`RecordingBackend`](crate::recording::RecordingBackend) for
//! headless use & tests and by [`WgpuBackend`](crate::wgpu_backend::WgpuBackend) for drawing
//! on a real GPU.

use glam::Mat4;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);
    };
}

handle!(
    /// GPU buffer object
    BufferId
);
handle!(
    /// Vertex array object (attribute pointers + element buffer binding)
    VertexArrayId
);
handle!(
    /// Linked shader program
    ProgramId
);
handle!(
    /// GPU texture object
    TextureId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
}

/// Hint describing how often a buffer's contents change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    Static,
    #[default]
    Dynamic,
    Stream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureTarget {
    Texture2D,
    CubeMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Primitive {
    Points,
    Lines,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    pub fn size(self) -> usize {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Component type of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Float,
    Double,
}

impl DataType {
    /// Size of a single component in bytes
    pub fn size(self) -> usize {
        match self {
            DataType::Byte | DataType::UnsignedByte => 1,
            DataType::Short | DataType::UnsignedShort => 2,
            DataType::Int | DataType::UnsignedInt | DataType::Float => 4,
            DataType::Double => 8,
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, DataType::Float | DataType::Double)
    }
}

/// How the GPU should read one attribute out of a vertex buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeFormat {
    pub data_type: DataType,
    pub count: u8,
    pub normalized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
    SrcAlphaSaturate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendEquation {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Source/destination factors for the color & alpha channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendFunc {
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl BlendFunc {
    /// Classic straight-alpha blending
    pub const ALPHA: BlendFunc =
        BlendFunc::new(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
    /// Blending for premultiplied-alpha textures
    pub const PREMULTIPLIED: BlendFunc =
        BlendFunc::new(BlendFactor::One, BlendFactor::OneMinusSrcAlpha);
    pub const ADDITIVE: BlendFunc = BlendFunc::new(BlendFactor::SrcAlpha, BlendFactor::One);
    /// What a fresh GL context starts with
    pub const REPLACE: BlendFunc = BlendFunc::new(BlendFactor::One, BlendFactor::Zero);

    /// Uses the same factors for color & alpha
    pub const fn new(src: BlendFactor, dst: BlendFactor) -> Self {
        Self {
            src_rgb: src,
            dst_rgb: dst,
            src_alpha: src,
            dst_alpha: dst,
        }
    }

    pub const fn separate(
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) -> Self {
        Self {
            src_rgb,
            dst_rgb,
            src_alpha,
            dst_alpha,
        }
    }
}

/// Low-level graphics device
///
/// Calls follow GL semantics: [`buffer_data`](Self::buffer_data) and friends act on the
/// buffer bound to `target`, attribute pointers capture the bound array buffer & are stored
/// in the bound vertex array, and binding an element buffer attaches it to the bound vertex
/// array. Nothing here caches; see [`GpuContext`](crate::state::GpuContext) for that.
pub trait GraphicsApi {
    fn create_buffer(&mut self) -> BufferId;
    fn delete_buffer(&mut self, buffer: BufferId);
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>);
    /// (Re)allocates the bound buffer to exactly `data.len()` bytes
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage);
    /// Overwrites part of the bound buffer without reallocating it
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]);

    fn create_vertex_array(&mut self) -> VertexArrayId;
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId);
    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>);
    fn vertex_attrib_pointer(
        &mut self,
        location: u32,
        format: AttributeFormat,
        stride: usize,
        offset: usize,
    );
    fn enable_vertex_attrib(&mut self, location: u32);
    fn disable_vertex_attrib(&mut self, location: u32);

    /// Compiles & links a program, returning the driver's log on failure
    fn create_program(&mut self, vertex_src: &str, fragment_src: &str)
    -> Result<ProgramId, String>;
    fn delete_program(&mut self, program: ProgramId);
    fn use_program(&mut self, program: Option<ProgramId>);
    fn uniform_mat4(&mut self, program: ProgramId, name: &str, value: &Mat4);
    fn uniform_i32(&mut self, program: ProgramId, name: &str, value: i32);

    /// Creates a texture from tightly packed 8-bit RGBA pixels
    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> TextureId;
    fn delete_texture(&mut self, texture: TextureId);
    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: Option<TextureId>);

    fn set_blend_enabled(&mut self, enabled: bool);
    fn blend_equation_separate(&mut self, rgb: BlendEquation, alpha: BlendEquation);
    fn blend_func_separate(&mut self, func: BlendFunc);
    fn depth_mask(&mut self, write: bool);

    /// Draws `count` indices from the element buffer of the bound vertex array,
    /// starting `offset` bytes into it
    fn draw_elements(
        &mut self,
        primitive: Primitive,
        count: usize,
        index_type: IndexType,
        offset: usize,
    );
}
