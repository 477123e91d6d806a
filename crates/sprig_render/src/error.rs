use thiserror::Error;

/// Everything that can go wrong while building or driving a batch
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("SpriteBatch.end must be called before begin")]
    AlreadyDrawing,
    #[error("SpriteBatch.begin must be called before {0}")]
    NotDrawing(&'static str),
    #[error("can't have more than {max} sprites per batch: {requested}")]
    TooManySprites { requested: usize, max: usize },
    #[error("unknown vertex attribute: {0}")]
    UnknownAttribute(String),
    #[error("vertex attribute `{0}` is already part of the layout")]
    DuplicateAttribute(String),
    #[error("vertex attribute index {0} is already in use")]
    DuplicateAttributeIndex(u32),
    #[error("vertex attributes need 1 to 4 components, got {0}")]
    InvalidComponentCount(u8),
    #[error("expected {expected} floats for {vertex_count} vertices, got {actual}")]
    VertexDataLength {
        vertex_count: usize,
        expected: usize,
        actual: usize,
    },
    #[error("sprite vertex data must come in runs of {sprite_size} floats, got {len}")]
    PartialSprite { len: usize, sprite_size: usize },
    #[error("shader compilation failed: {0}")]
    ShaderCompilation(String),
    #[error("texture dimensions must be non-zero, got {width}x{height}")]
    EmptyTexture { width: u32, height: u32 },
    #[error("a {width}x{height} texture doesn't fit in memory")]
    TextureTooLarge { width: u32, height: u32 },
    #[error("a {width}x{height} texture needs {expected} bytes of RGBA pixels, got {actual}")]
    TextureDataLength {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("failed to decode texture: {0}")]
    TextureDecode(#[from] image::ImageError),
}

pub type Result<T, E = RenderError> = std::result::Result<T, E>;
