use crate::{
    error::{RenderError, Result},
    gpu::{GraphicsApi, TextureId},
    state::GpuContext,
};

/// A 2D texture living on the GPU
///
/// A plain handle: copies refer to the same GPU object and compare equal by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Texture {
    id: TextureId,
    width: u32,
    height: u32,
}

impl Texture {
    /// Uploads tightly packed 8-bit RGBA pixels, top row first
    ///
    /// Both dimensions must be non-zero & `rgba` must hold exactly `width * height * 4` bytes.
    pub fn new<A: GraphicsApi>(
        ctx: &mut GpuContext<A>,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<Self> {
        check_pixels(width, height, rgba)?;
        let id = ctx.create_texture(width, height, rgba);
        log::debug!("Texture {id:?} created: {width}x{height}");
        Ok(Self { id, width, height })
    }

    /// Decodes an encoded image (PNG) & uploads it
    pub fn decode<A: GraphicsApi>(ctx: &mut GpuContext<A>, bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)?.to_rgba8();
        let (w, h) = img.dimensions();
        Self::new(ctx, w, h, &img)
    }

    /// Creates a 1×1 white texture, handy for drawing untextured tinted quads
    pub fn white<A: GraphicsApi>(ctx: &mut GpuContext<A>) -> Self {
        Self {
            id: ctx.create_texture(1, 1, &WHITE_PIXEL),
            width: 1,
            height: 1,
        }
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Binds as a 2D texture on `unit`
    pub fn bind<A: GraphicsApi>(&self, ctx: &mut GpuContext<A>, unit: u32) {
        ctx.bind_texture_2d(unit, self.id);
    }

    pub fn close<A: GraphicsApi>(self, ctx: &mut GpuContext<A>) {
        ctx.delete_texture(self.id);
    }
}

pub(crate) const WHITE_PIXEL: [u8; 4] = [255; 4];

/// Byte length of a tightly packed `width`×`height` RGBA image
pub fn rgba_len(width: u32, height: u32) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(RenderError::EmptyTexture { width, height });
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or(RenderError::TextureTooLarge { width, height })
}

/// Checks that `rgba` is exactly one `width`×`height` image
pub fn check_pixels(width: u32, height: u32, rgba: &[u8]) -> Result<()> {
    let expected = rgba_len(width, height)?;
    if rgba.len() != expected {
        return Err(RenderError::TextureDataLength {
            width,
            height,
            expected,
            actual: rgba.len(),
        });
    }
    Ok(())
}
