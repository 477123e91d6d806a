pub mod render {
    pub use sprig_render::{
        GpuContext, GraphicsApi, Model, RecordingBackend, ShaderProgram, SpriteBatch,
        SpriteBatchConfig, SpriteDraw, Texture, VertexAttribute, VertexLayout, WgpuBackend,
        wgpu,
    };
}

pub mod gpu {
    pub use sprig_render::gpu::*;
}

pub mod math {
    pub use sprig_render::{Mat4, SourceRect, Vec2, vec2};
}

pub use sprig_render::{BlendFunc, Color, RenderError, Result};
