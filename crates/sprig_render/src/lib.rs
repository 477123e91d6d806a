//! Sprite batching over a GL-shaped graphics API
//!
//! [`SpriteBatch`] accumulates textured quads on the CPU & submits them through a [`Model`] in as
//! few draws as possible. All GPU traffic goes through [`GpuContext`], which skips calls that
//! wouldn't change the state the driver already has. Two [`GraphicsApi`] backends ship here:
//! [`WgpuBackend`] for real output & [`RecordingBackend`] for headless use and tests.

pub mod color;
pub mod error;
pub mod gpu;
pub mod math;
pub mod model;
pub mod recording;
pub mod shader;
mod shadow;
pub mod sprite_batch;
pub mod state;
pub mod texture;
pub mod vertex;
pub mod wgpu_backend;

pub use wgpu;

pub use crate::color::Color;
pub use error::{RenderError, Result};
pub use gpu::{BlendEquation, BlendFactor, BlendFunc, GraphicsApi, Primitive};
pub use math::{Mat4, SourceRect, Vec2, vec2};
pub use model::Model;
pub use recording::RecordingBackend;
pub use shader::{AttributeNames, ShaderProgram};
pub use sprite_batch::{SpriteBatch, SpriteBatchConfig, SpriteDraw};
pub use state::GpuContext;
pub use texture::Texture;
pub use vertex::{VertexAttribute, VertexLayout};
pub use wgpu_backend::WgpuBackend;
