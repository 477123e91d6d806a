use crate::{
    color::Color,
    error::{RenderError, Result},
    gpu::{BlendFactor, BlendFunc, GraphicsApi},
    math::{Mat4, SourceRect, Vec2, ortho_2d},
    model::Model,
    shader::{AttributeNames, ShaderProgram},
    state::GpuContext,
    texture::Texture,
    vertex::VertexLayout,
};

/// Floats per vertex: x, y, packed color, u, v
pub const VERTEX_SIZE: usize = 5;
/// Floats per sprite (4 vertices)
pub const SPRITE_SIZE: usize = 4 * VERTEX_SIZE;
pub const INDICES_PER_SPRITE: usize = 6;
/// Largest batch whose vertex indices still fit in 31 bits
pub const MAX_SPRITES: usize = 536_870_911;

/// Construction options for a [`SpriteBatch`]
#[derive(Debug, Clone)]
pub struct SpriteBatchConfig {
    /// Sprites queued before an implicit flush
    pub max_sprites: usize,
    /// Size of the area the default projection maps onto the viewport
    pub viewport: Vec2,
    pub attribute_names: AttributeNames,
    /// Shown in log messages
    pub label: String,
}

impl Default for SpriteBatchConfig {
    fn default() -> Self {
        Self {
            max_sprites: 1000,
            viewport: Vec2::new(800.0, 600.0),
            attribute_names: AttributeNames::default(),
            label: "SpriteBatch".to_owned(),
        }
    }
}

/// A transformed sprite for [`SpriteBatch::draw_sprite`]
///
/// Scaling & rotation happen around `origin`, relative to the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteDraw {
    pub position: Vec2,
    pub origin: Vec2,
    pub size: Vec2,
    pub scale: Vec2,
    /// Counterclockwise, in degrees
    pub rotation: f32,
    /// Pixel region of the texture; the whole texture when `None`
    pub region: Option<SourceRect>,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl SpriteDraw {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            origin: Vec2::ZERO,
            size: Vec2::new(width, height),
            scale: Vec2::ONE,
            rotation: 0.0,
            region: None,
            flip_x: false,
            flip_y: false,
        }
    }

    pub fn origin(mut self, x: f32, y: f32) -> Self {
        self.origin = Vec2::new(x, y);
        self
    }

    pub fn scale(mut self, x: f32, y: f32) -> Self {
        self.scale = Vec2::new(x, y);
        self
    }

    pub fn rotation(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn region(mut self, region: SourceRect) -> Self {
        self.region = Some(region);
        self
    }

    pub fn flip(mut self, x: bool, y: bool) -> Self {
        self.flip_x = x;
        self.flip_y = y;
        self
    }
}

/// Batches textured quads into as few draw calls as possible
///
/// Sprites queue up on the CPU between [`begin`](Self::begin) & [`end`](Self::end) and
/// are drawn together when the batch fills up, the texture changes, render state changes,
/// or the batch ends.
pub struct SpriteBatch {
    label: String,
    model: Model,
    vertices: Vec<f32>,
    // write cursor into `vertices`
    idx: usize,
    drawing: bool,
    last_texture: Option<Texture>,
    inv_tex_width: f32,
    inv_tex_height: f32,
    color: Color,
    packed_color: f32,
    blending_disabled: bool,
    // `None` leaves whatever blend function is set alone
    blend_func: Option<BlendFunc>,
    projection: Mat4,
    transform: Mat4,
    shader: ShaderProgram,
    custom_shader: Option<ShaderProgram>,
    render_calls: usize,
    total_render_calls: usize,
    max_sprites_in_batch: usize,
}

impl SpriteBatch {
    /// Allocates the GPU buffers & compiles the default shader
    pub fn new<A: GraphicsApi>(ctx: &mut GpuContext<A>, config: SpriteBatchConfig) -> Result<Self> {
        if config.max_sprites > MAX_SPRITES {
            return Err(RenderError::TooManySprites {
                requested: config.max_sprites,
                max: MAX_SPRITES,
            });
        }
        let max_sprites = if config.max_sprites == 0 {
            log::warn!("{}: max_sprites of 0 raised to 1", config.label);
            1
        } else {
            config.max_sprites
        };

        let names = &config.attribute_names;
        let layout = VertexLayout::sprite(&names.position, &names.color, &names.tex_coords)?;
        let mut model = Model::new(
            ctx,
            layout,
            max_sprites * 4,
            max_sprites * INDICES_PER_SPRITE,
        )?;
        model.set_indices(ctx, &sprite_indices(max_sprites));
        let shader = ShaderProgram::default_sprite(ctx, names, model.layout())?;

        log::debug!("{}: created with room for {max_sprites} sprites", config.label);

        let color = Color::WHITE;
        Ok(Self {
            label: config.label,
            model,
            vertices: vec![0.0; max_sprites * SPRITE_SIZE],
            idx: 0,
            drawing: false,
            last_texture: None,
            inv_tex_width: 0.0,
            inv_tex_height: 0.0,
            color,
            packed_color: color.to_float_bits(),
            blending_disabled: false,
            blend_func: Some(BlendFunc::ALPHA),
            projection: ortho_2d(0.0, 0.0, config.viewport.x, config.viewport.y),
            transform: Mat4::IDENTITY,
            shader,
            custom_shader: None,
            render_calls: 0,
            total_render_calls: 0,
            max_sprites_in_batch: 0,
        })
    }

    /// Starts queueing sprites; disables depth writes & binds the shader
    pub fn begin<A: GraphicsApi>(&mut self, ctx: &mut GpuContext<A>) -> Result<()> {
        if self.drawing {
            return Err(RenderError::AlreadyDrawing);
        }
        self.render_calls = 0;

        ctx.depth_mask(false);
        self.active_shader().bind(ctx);
        self.setup_matrices(ctx);

        self.drawing = true;
        Ok(())
    }

    /// Draws whatever is queued & restores depth writes & blending
    pub fn end<A: GraphicsApi>(&mut self, ctx: &mut GpuContext<A>) -> Result<()> {
        if !self.drawing {
            return Err(RenderError::NotDrawing("end"));
        }
        self.flush(ctx)?;
        self.last_texture = None;
        self.drawing = false;

        ctx.depth_mask(true);
        ctx.disable_blend();
        Ok(())
    }

    /// Draws the queued sprites in one call
    pub fn flush<A: GraphicsApi>(&mut self, ctx: &mut GpuContext<A>) -> Result<()> {
        if self.idx == 0 {
            return Ok(());
        }

        let sprites = self.idx / SPRITE_SIZE;
        if let Some(texture) = self.last_texture {
            texture.bind(ctx, 0);
        }
        self.model
            .set_vertices(ctx, sprites * 4, &self.vertices[..self.idx])?;

        self.render_calls += 1;
        self.total_render_calls += 1;
        self.max_sprites_in_batch = self.max_sprites_in_batch.max(sprites);
        self.model
            .set_index_count_limit(Some(sprites * INDICES_PER_SPRITE));

        if self.blending_disabled {
            ctx.disable_blend();
        } else {
            ctx.enable_blend();
            if let Some(func) = self.blend_func {
                ctx.blend_func_separate(func);
            }
        }

        let shader = self.active_shader_mut();
        shader.bind(ctx);
        shader.upload_uniforms(ctx);
        self.model.render(ctx);

        log::trace!("{}: flushed {sprites} sprites", self.label);
        self.idx = 0;
        Ok(())
    }

    /// Draws the whole texture at its pixel size
    pub fn draw<A: GraphicsApi>(
        &mut self,
        ctx: &mut GpuContext<A>,
        texture: &Texture,
        x: f32,
        y: f32,
    ) -> Result<()> {
        self.draw_sized(ctx, texture, x, y, texture.width() as f32, texture.height() as f32)
    }

    /// Draws the whole texture stretched over `width` × `height`
    pub fn draw_sized<A: GraphicsApi>(
        &mut self,
        ctx: &mut GpuContext<A>,
        texture: &Texture,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<()> {
        self.draw_uv(ctx, texture, x, y, width, height, [0.0, 1.0, 1.0, 0.0])
    }

    /// Draws an axis aligned quad with explicit texture coordinates `[u, v, u2, v2]`,
    /// `(u, v)` mapping to the bottom-left corner
    #[allow(clippy::too_many_arguments)]
    pub fn draw_uv<A: GraphicsApi>(
        &mut self,
        ctx: &mut GpuContext<A>,
        texture: &Texture,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        [u, v, u2, v2]: [f32; 4],
    ) -> Result<()> {
        self.prepare(ctx, texture)?;
        let (fx2, fy2) = (x + width, y + height);
        self.emit([(x, y), (x, fy2), (fx2, fy2), (fx2, y)], [u, v, u2, v2]);
        Ok(())
    }

    /// Draws a pixel region of the texture at the region's size
    #[allow(clippy::too_many_arguments)]
    pub fn draw_region<A: GraphicsApi>(
        &mut self,
        ctx: &mut GpuContext<A>,
        texture: &Texture,
        x: f32,
        y: f32,
        region: SourceRect,
        flip_x: bool,
        flip_y: bool,
    ) -> Result<()> {
        self.prepare(ctx, texture)?;
        let uv = self.region_uv(region, flip_x, flip_y);
        let (fx2, fy2) = (x + region.width as f32, y + region.height as f32);
        self.emit([(x, y), (x, fy2), (fx2, fy2), (fx2, y)], uv);
        Ok(())
    }

    /// Draws a scaled and/or rotated sprite
    pub fn draw_sprite<A: GraphicsApi>(
        &mut self,
        ctx: &mut GpuContext<A>,
        texture: &Texture,
        sprite: &SpriteDraw,
    ) -> Result<()> {
        self.prepare(ctx, texture)?;

        let world_origin = sprite.position + sprite.origin;
        // corners relative to the origin
        let mut min = -sprite.origin;
        let mut max = sprite.size - sprite.origin;
        if sprite.scale != Vec2::ONE {
            min *= sprite.scale;
            max *= sprite.scale;
        }

        let (mut x1, mut y1) = (min.x, min.y);
        let (mut x2, mut y2) = (min.x, max.y);
        let (mut x3, mut y3) = (max.x, max.y);
        let (mut x4, mut y4) = (max.x, min.y);
        if sprite.rotation != 0.0 {
            let (sin, cos) = sprite.rotation.to_radians().sin_cos();
            (x1, y1) = (cos * min.x - sin * min.y, sin * min.x + cos * min.y);
            (x2, y2) = (cos * min.x - sin * max.y, sin * min.x + cos * max.y);
            (x3, y3) = (cos * max.x - sin * max.y, sin * max.x + cos * max.y);
            // the quad stays a parallelogram, so the last corner follows from the others
            x4 = x1 + (x3 - x2);
            y4 = y3 - (y2 - y1);
        }

        let region = sprite.region.unwrap_or(SourceRect::new(
            0,
            0,
            texture.width() as i32,
            texture.height() as i32,
        ));
        let uv = self.region_uv(region, sprite.flip_x, sprite.flip_y);
        let o = world_origin;
        self.emit(
            [
                (x1 + o.x, y1 + o.y),
                (x2 + o.x, y2 + o.y),
                (x3 + o.x, y3 + o.y),
                (x4 + o.x, y4 + o.y),
            ],
            uv,
        );
        Ok(())
    }

    /// Queues raw sprite vertices, [`SPRITE_SIZE`] floats per sprite laid out
    /// `x, y, packed color, u, v` per vertex
    ///
    /// May flush several times when `vertices` holds more sprites than the batch.
    pub fn draw_vertices<A: GraphicsApi>(
        &mut self,
        ctx: &mut GpuContext<A>,
        texture: &Texture,
        vertices: &[f32],
    ) -> Result<()> {
        if vertices.len() % SPRITE_SIZE != 0 {
            return Err(RenderError::PartialSprite {
                len: vertices.len(),
                sprite_size: SPRITE_SIZE,
            });
        }
        self.prepare(ctx, texture)?;

        let mut remaining = vertices;
        while !remaining.is_empty() {
            let room = self.vertices.len() - self.idx;
            if room == 0 {
                self.flush(ctx)?;
                continue;
            }
            let (chunk, rest) = remaining.split_at(room.min(remaining.len()));
            self.vertices[self.idx..self.idx + chunk.len()].copy_from_slice(chunk);
            self.idx += chunk.len();
            remaining = rest;
        }
        Ok(())
    }

    // Draw preamble: checks the state, then flushes on a texture switch or a full batch
    fn prepare<A: GraphicsApi>(&mut self, ctx: &mut GpuContext<A>, texture: &Texture) -> Result<()> {
        if !self.drawing {
            return Err(RenderError::NotDrawing("draw"));
        }
        if self.last_texture.map(|t| t.id()) != Some(texture.id()) {
            self.flush(ctx)?;
            self.last_texture = Some(*texture);
            self.inv_tex_width = 1.0 / texture.width() as f32;
            self.inv_tex_height = 1.0 / texture.height() as f32;
        } else if self.idx == self.vertices.len() {
            self.flush(ctx)?;
        }
        Ok(())
    }

    // Pixel rect (y down) to `[u, v, u2, v2]` with v at the bottom edge
    fn region_uv(&self, region: SourceRect, flip_x: bool, flip_y: bool) -> [f32; 4] {
        let mut u = region.x as f32 * self.inv_tex_width;
        let mut v = (region.y + region.height) as f32 * self.inv_tex_height;
        let mut u2 = (region.x + region.width) as f32 * self.inv_tex_width;
        let mut v2 = region.y as f32 * self.inv_tex_height;
        if flip_x {
            std::mem::swap(&mut u, &mut u2);
        }
        if flip_y {
            std::mem::swap(&mut v, &mut v2);
        }
        [u, v, u2, v2]
    }

    // Writes one quad: bottom-left, top-left, top-right, bottom-right
    fn emit(&mut self, corners: [(f32, f32); 4], [u, v, u2, v2]: [f32; 4]) {
        let c = self.packed_color;
        let uvs = [(u, v), (u, v2), (u2, v2), (u2, v)];
        let quad = &mut self.vertices[self.idx..self.idx + SPRITE_SIZE];
        for (vertex, ((x, y), (u, v))) in quad
            .chunks_exact_mut(VERTEX_SIZE)
            .zip(corners.into_iter().zip(uvs))
        {
            vertex.copy_from_slice(&[x, y, c, u, v]);
        }
        self.idx += SPRITE_SIZE;
    }

    /// Tint applied to sprites drawn from now on
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
        self.packed_color = color.to_float_bits();
    }

    /// Sets the tint from a value produced by [`Color::to_float_bits`]
    pub fn set_packed_color(&mut self, packed: f32) {
        self.color = Color::from_float_bits(packed);
        self.packed_color = packed;
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn packed_color(&self) -> f32 {
        self.packed_color
    }

    pub fn enable_blending<A: GraphicsApi>(&mut self, ctx: &mut GpuContext<A>) -> Result<()> {
        if !self.blending_disabled {
            return Ok(());
        }
        self.flush(ctx)?;
        self.blending_disabled = false;
        Ok(())
    }

    pub fn disable_blending<A: GraphicsApi>(&mut self, ctx: &mut GpuContext<A>) -> Result<()> {
        if self.blending_disabled {
            return Ok(());
        }
        self.flush(ctx)?;
        self.blending_disabled = true;
        Ok(())
    }

    pub fn is_blending_enabled(&self) -> bool {
        !self.blending_disabled
    }

    pub fn set_blend_function<A: GraphicsApi>(
        &mut self,
        ctx: &mut GpuContext<A>,
        src: BlendFactor,
        dst: BlendFactor,
    ) -> Result<()> {
        self.set_blend_function_separate(ctx, BlendFunc::new(src, dst))
    }

    pub fn set_blend_function_separate<A: GraphicsApi>(
        &mut self,
        ctx: &mut GpuContext<A>,
        func: BlendFunc,
    ) -> Result<()> {
        self.replace_blend_function(ctx, Some(func))
    }

    /// Stops the batch from setting a blend function, keeping whatever is current
    pub fn preserve_blend_function<A: GraphicsApi>(
        &mut self,
        ctx: &mut GpuContext<A>,
    ) -> Result<()> {
        self.replace_blend_function(ctx, None)
    }

    fn replace_blend_function<A: GraphicsApi>(
        &mut self,
        ctx: &mut GpuContext<A>,
        func: Option<BlendFunc>,
    ) -> Result<()> {
        if self.blend_func == func {
            return Ok(());
        }
        self.flush(ctx)?;
        self.blend_func = func;
        Ok(())
    }

    /// `None` when the blend function is preserved
    pub fn blend_function(&self) -> Option<BlendFunc> {
        self.blend_func
    }

    /// Installs a custom shader, or goes back to the default one with `None`
    ///
    /// Returns the custom shader that was replaced. Installing the program that is already
    /// active does nothing.
    pub fn set_shader<A: GraphicsApi>(
        &mut self,
        ctx: &mut GpuContext<A>,
        shader: Option<ShaderProgram>,
    ) -> Result<Option<ShaderProgram>> {
        let current = self.custom_shader.as_ref().map(ShaderProgram::id);
        if current == shader.as_ref().map(ShaderProgram::id) {
            return Ok(None);
        }
        if self.drawing {
            self.flush(ctx)?;
        }
        let previous = std::mem::replace(&mut self.custom_shader, shader);
        if self.drawing {
            self.active_shader().bind(ctx);
            self.setup_matrices(ctx);
        }
        Ok(previous)
    }

    /// The shader sprites are currently drawn with
    pub fn shader(&self) -> &ShaderProgram {
        self.active_shader()
    }

    pub fn is_custom_shader(&self) -> bool {
        self.custom_shader.is_some()
    }

    pub fn set_projection_matrix<A: GraphicsApi>(
        &mut self,
        ctx: &mut GpuContext<A>,
        projection: Mat4,
    ) -> Result<()> {
        if self.projection == projection {
            return Ok(());
        }
        if self.drawing {
            self.flush(ctx)?;
        }
        self.projection = projection;
        if self.drawing {
            self.setup_matrices(ctx);
        }
        Ok(())
    }

    /// Sets the model matrix applied before the projection
    pub fn set_transform_matrix<A: GraphicsApi>(
        &mut self,
        ctx: &mut GpuContext<A>,
        transform: Mat4,
    ) -> Result<()> {
        if self.transform == transform {
            return Ok(());
        }
        if self.drawing {
            self.flush(ctx)?;
        }
        self.transform = transform;
        if self.drawing {
            self.setup_matrices(ctx);
        }
        Ok(())
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn transform_matrix(&self) -> Mat4 {
        self.transform
    }

    fn active_shader(&self) -> &ShaderProgram {
        self.custom_shader.as_ref().unwrap_or(&self.shader)
    }

    fn active_shader_mut(&mut self) -> &mut ShaderProgram {
        self.custom_shader.as_mut().unwrap_or(&mut self.shader)
    }

    fn setup_matrices<A: GraphicsApi>(&mut self, ctx: &mut GpuContext<A>) {
        let combined = self.projection * self.transform;
        let shader = self.active_shader_mut();
        shader.set_combined_matrix(combined);
        shader.set_texture_unit(0);
        shader.upload_uniforms(ctx);
    }

    /// Draw calls since the last [`begin`](Self::begin)
    pub fn render_calls(&self) -> usize {
        self.render_calls
    }

    /// Draw calls over the batch's lifetime
    pub fn total_render_calls(&self) -> usize {
        self.total_render_calls
    }

    /// Most sprites ever drawn by a single flush
    pub fn max_sprites_in_batch(&self) -> usize {
        self.max_sprites_in_batch
    }

    pub fn pending_sprites(&self) -> usize {
        self.idx / SPRITE_SIZE
    }

    /// Vertex data queued for the next flush
    pub fn pending_vertices(&self) -> &[f32] {
        &self.vertices[..self.idx]
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    /// Sprites the batch holds before flushing on its own
    pub fn capacity(&self) -> usize {
        self.vertices.len() / SPRITE_SIZE
    }

    /// Releases the buffers & the default shader; a custom shader stays alive
    pub fn close<A: GraphicsApi>(self, ctx: &mut GpuContext<A>) {
        log::debug!("{}: closed", self.label);
        self.model.close(ctx);
        self.shader.close(ctx);
    }
}

/// Two counterclockwise triangles per sprite: `[0, 1, 2, 2, 3, 0]` offset by 4 per sprite
pub fn sprite_indices(sprites: usize) -> Vec<u32> {
    (0..sprites as u32)
        .flat_map(|i| {
            let j = i * 4;
            [j, j + 1, j + 2, j + 2, j + 3, j]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{DrawRecord, RecordingBackend};

    struct Fixture {
        ctx: GpuContext<RecordingBackend>,
        batch: SpriteBatch,
        a: Texture,
        b: Texture,
    }

    fn fixture(max_sprites: usize) -> Fixture {
        let mut ctx = GpuContext::new(RecordingBackend::new());
        let batch = SpriteBatch::new(
            &mut ctx,
            SpriteBatchConfig {
                max_sprites,
                ..Default::default()
            },
        )
        .unwrap();
        let a = Texture::new(&mut ctx, 64, 32, &[255; 64 * 32 * 4]).unwrap();
        let b = Texture::white(&mut ctx);
        ctx.api_mut().clear_calls();
        Fixture { ctx, batch, a, b }
    }

    fn draws(f: &Fixture) -> &[DrawRecord] {
        f.ctx.api().draws()
    }

    #[test]
    fn overflowing_the_batch_flushes_a_full_batch_first() {
        let mut f = fixture(4);
        f.batch.begin(&mut f.ctx).unwrap();
        for i in 0..5 {
            f.batch
                .draw_sized(&mut f.ctx, &f.a, i as f32, 0.0, 1.0, 1.0)
                .unwrap();
        }
        f.batch.end(&mut f.ctx).unwrap();

        let counts: Vec<_> = draws(&f).iter().map(|d| d.indices.len()).collect();
        assert_eq!(counts, vec![24, 6]);
        assert_eq!(f.batch.render_calls(), 2);
        assert_eq!(f.batch.max_sprites_in_batch(), 4);
        assert!(f.ctx.api().errors().is_empty());
    }

    #[test]
    fn switching_textures_splits_draws() {
        let mut f = fixture(10);
        f.batch.begin(&mut f.ctx).unwrap();
        f.batch.draw(&mut f.ctx, &f.a, 0.0, 0.0).unwrap();
        f.batch.draw(&mut f.ctx, &f.b, 0.0, 0.0).unwrap();
        f.batch.end(&mut f.ctx).unwrap();

        let textures: Vec<_> = draws(&f).iter().map(|d| d.texture).collect();
        assert_eq!(textures, vec![Some(f.a.id()), Some(f.b.id())]);
        assert!(draws(&f).iter().all(|d| d.indices.len() == 6));
    }

    #[test]
    fn state_machine_is_strict() {
        let mut f = fixture(10);

        let err = f.batch.draw(&mut f.ctx, &f.a, 0.0, 0.0).unwrap_err();
        assert!(matches!(err, RenderError::NotDrawing("draw")));
        assert!(matches!(
            f.batch.end(&mut f.ctx),
            Err(RenderError::NotDrawing("end"))
        ));

        f.batch.begin(&mut f.ctx).unwrap();
        assert!(matches!(
            f.batch.begin(&mut f.ctx),
            Err(RenderError::AlreadyDrawing)
        ));
        assert!(f.batch.is_drawing());
    }

    #[test]
    fn axis_aligned_quads_go_counterclockwise_from_bottom_left() {
        let mut f = fixture(10);
        f.batch.begin(&mut f.ctx).unwrap();
        f.batch
            .draw_sized(&mut f.ctx, &f.a, 0.0, 0.0, 10.0, 20.0)
            .unwrap();

        let c = Color::WHITE.to_float_bits();
        #[rustfmt::skip]
        let expected = [
            0.0, 0.0, c, 0.0, 1.0,
            0.0, 20.0, c, 0.0, 0.0,
            10.0, 20.0, c, 1.0, 0.0,
            10.0, 0.0, c, 1.0, 1.0,
        ];
        assert_eq!(f.batch.pending_vertices(), &expected);
    }

    #[test]
    fn indices_repeat_per_sprite() {
        assert_eq!(
            sprite_indices(2),
            vec![0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]
        );

        let mut f = fixture(10);
        f.batch.begin(&mut f.ctx).unwrap();
        f.batch.draw(&mut f.ctx, &f.a, 0.0, 0.0).unwrap();
        f.batch.draw(&mut f.ctx, &f.a, 5.0, 0.0).unwrap();
        f.batch.end(&mut f.ctx).unwrap();
        assert_eq!(draws(&f)[0].indices, sprite_indices(2));
    }

    #[test]
    fn capacity_is_capped() {
        let mut ctx = GpuContext::new(RecordingBackend::new());
        let result = SpriteBatch::new(
            &mut ctx,
            SpriteBatchConfig {
                max_sprites: MAX_SPRITES + 1,
                ..Default::default()
            },
        );
        assert!(matches!(
            result,
            Err(RenderError::TooManySprites {
                requested: 536_870_912,
                max: MAX_SPRITES
            })
        ));
    }

    #[test]
    fn changing_the_projection_mid_batch_flushes() {
        let mut f = fixture(10);
        f.batch.begin(&mut f.ctx).unwrap();
        f.batch.draw(&mut f.ctx, &f.a, 0.0, 0.0).unwrap();

        let same = f.batch.projection_matrix();
        f.batch.set_projection_matrix(&mut f.ctx, same).unwrap();
        assert!(draws(&f).is_empty());
        assert_eq!(f.batch.pending_sprites(), 1);

        let projection = ortho_2d(0.0, 0.0, 320.0, 240.0);
        f.batch.set_projection_matrix(&mut f.ctx, projection).unwrap();
        assert_eq!(draws(&f).len(), 1);
        assert_eq!(f.batch.pending_sprites(), 0);

        let program = f.batch.shader().id();
        assert_eq!(
            f.ctx.api().uniform_mat4(program, "u_projTrans"),
            Some(projection)
        );
    }

    #[test]
    fn changing_the_transform_mid_batch_flushes() {
        let mut f = fixture(10);
        f.batch.begin(&mut f.ctx).unwrap();
        f.batch.draw(&mut f.ctx, &f.a, 0.0, 0.0).unwrap();

        f.batch
            .set_transform_matrix(&mut f.ctx, Mat4::IDENTITY)
            .unwrap();
        assert!(draws(&f).is_empty());
        assert_eq!(f.batch.pending_sprites(), 1);

        let transform = Mat4::from_scale(glam::Vec3::new(2.0, 2.0, 1.0));
        f.batch.set_transform_matrix(&mut f.ctx, transform).unwrap();
        assert_eq!(draws(&f).len(), 1);
        assert_eq!(f.batch.pending_sprites(), 0);
        assert_eq!(f.batch.transform_matrix(), transform);

        let program = f.batch.shader().id();
        assert_eq!(
            f.ctx.api().uniform_mat4(program, "u_projTrans"),
            Some(f.batch.projection_matrix() * transform)
        );

        f.batch.draw(&mut f.ctx, &f.a, 0.0, 0.0).unwrap();
        f.batch.end(&mut f.ctx).unwrap();
        assert_eq!(draws(&f).len(), 2);
    }

    #[test]
    fn repeated_attribute_names_are_rejected() {
        let mut ctx = GpuContext::new(RecordingBackend::new());
        let result = SpriteBatch::new(
            &mut ctx,
            SpriteBatchConfig {
                attribute_names: AttributeNames {
                    color: "a_position".into(),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        assert!(matches!(
            result,
            Err(RenderError::DuplicateAttribute(name)) if name == "a_position"
        ));
    }

    #[test]
    fn failed_uploads_leave_the_batch_untouched() {
        let mut f = fixture(10);
        // a model whose layout disagrees with the 5-float sprite vertices
        let narrow = VertexLayout::interleaved()
            .with(crate::vertex::VertexAttribute::position_2d())
            .unwrap();
        let model = Model::new(&mut f.ctx, narrow, 40, 60).unwrap();
        std::mem::replace(&mut f.batch.model, model).close(&mut f.ctx);

        f.batch.begin(&mut f.ctx).unwrap();
        f.batch.draw(&mut f.ctx, &f.a, 0.0, 0.0).unwrap();
        let err = f.batch.flush(&mut f.ctx).unwrap_err();

        assert!(matches!(err, RenderError::VertexDataLength { .. }));
        assert_eq!(f.batch.render_calls(), 0);
        assert_eq!(f.batch.total_render_calls(), 0);
        assert_eq!(f.batch.max_sprites_in_batch(), 0);
        assert_eq!(f.batch.pending_sprites(), 1);
        assert!(draws(&f).is_empty());
    }

    #[test]
    fn begin_uploads_the_combined_matrix() {
        let mut f = fixture(10);
        let transform = Mat4::from_translation(glam::Vec3::new(5.0, 6.0, 0.0));
        f.batch.set_transform_matrix(&mut f.ctx, transform).unwrap();
        f.batch.begin(&mut f.ctx).unwrap();

        let program = f.batch.shader().id();
        let api = f.ctx.api();
        assert_eq!(api.current_program(), Some(program));
        assert_eq!(
            api.uniform_mat4(program, "u_projTrans"),
            Some(f.batch.projection_matrix() * transform)
        );
        assert_eq!(api.uniform_i32(program, "u_texture"), Some(0));
        assert!(!api.depth_mask_enabled());
    }

    #[test]
    fn end_restores_render_state() {
        let mut f = fixture(10);
        f.batch.begin(&mut f.ctx).unwrap();
        f.batch.draw(&mut f.ctx, &f.a, 0.0, 0.0).unwrap();
        f.batch.end(&mut f.ctx).unwrap();

        let draw = &draws(&f)[0];
        assert!(draw.blend_enabled);
        assert_eq!(draw.blend_func, BlendFunc::ALPHA);
        assert!(!draw.depth_mask);

        let api = f.ctx.api();
        assert!(api.depth_mask_enabled());
        assert!(!api.blend_enabled());
        assert!(!f.batch.is_drawing());
    }

    #[test]
    fn rotation_turns_corners_around_the_origin() {
        let mut f = fixture(10);
        f.batch.begin(&mut f.ctx).unwrap();
        let sprite = SpriteDraw::new(10.0, 10.0, 4.0, 2.0)
            .origin(2.0, 1.0)
            .rotation(90.0);
        f.batch.draw_sprite(&mut f.ctx, &f.a, &sprite).unwrap();

        let corners: Vec<(f32, f32)> = f
            .batch
            .pending_vertices()
            .chunks_exact(VERTEX_SIZE)
            .map(|v| (v[0], v[1]))
            .collect();
        let expected = [(13.0, 9.0), (11.0, 9.0), (11.0, 13.0), (13.0, 13.0)];
        for (got, want) in corners.iter().zip(expected) {
            assert!((got.0 - want.0).abs() < 1e-4, "{got:?} vs {want:?}");
            assert!((got.1 - want.1).abs() < 1e-4, "{got:?} vs {want:?}");
        }
    }

    #[test]
    fn scaling_without_rotation_stays_axis_aligned() {
        let mut f = fixture(10);
        f.batch.begin(&mut f.ctx).unwrap();
        let sprite = SpriteDraw::new(0.0, 0.0, 4.0, 4.0)
            .origin(2.0, 2.0)
            .scale(2.0, 0.5);
        f.batch.draw_sprite(&mut f.ctx, &f.a, &sprite).unwrap();

        let v = f.batch.pending_vertices();
        assert_eq!((v[0], v[1]), (-2.0, 1.0));
        assert_eq!((v[10], v[11]), (6.0, 3.0));
        // whole texture by default
        assert_eq!((v[3], v[4], v[13], v[14]), (0.0, 1.0, 1.0, 0.0));
    }

    #[test]
    fn regions_map_pixels_to_flipped_uvs() {
        let mut f = fixture(10);
        f.batch.begin(&mut f.ctx).unwrap();
        let region = SourceRect::new(16, 8, 16, 8);
        f.batch
            .draw_region(&mut f.ctx, &f.a, 0.0, 0.0, region, false, false)
            .unwrap();
        f.batch
            .draw_region(&mut f.ctx, &f.a, 0.0, 0.0, region, true, true)
            .unwrap();

        let v = f.batch.pending_vertices();
        // (u, v) at the bottom-left, (u2, v2) at the top-right
        assert_eq!((v[3], v[4]), (0.25, 0.5));
        assert_eq!((v[13], v[14]), (0.5, 0.25));
        assert_eq!((v[10], v[11]), (16.0, 8.0));
        assert_eq!((v[23], v[24]), (0.5, 0.25));
        assert_eq!((v[33], v[34]), (0.25, 0.5));
    }

    #[test]
    fn raw_vertices_may_span_several_flushes() {
        let mut f = fixture(2);
        f.batch.begin(&mut f.ctx).unwrap();

        let err = f.batch.draw_vertices(&mut f.ctx, &f.a, &[0.0; 7]).unwrap_err();
        assert!(matches!(err, RenderError::PartialSprite { len: 7, .. }));

        f.batch
            .draw_vertices(&mut f.ctx, &f.a, &[1.0; SPRITE_SIZE * 5])
            .unwrap();
        assert_eq!(draws(&f).len(), 2);
        assert_eq!(f.batch.pending_sprites(), 1);
        f.batch.end(&mut f.ctx).unwrap();
        assert_eq!(draws(&f).len(), 3);
    }

    #[test]
    fn tint_only_affects_later_sprites() {
        let mut f = fixture(10);
        f.batch.begin(&mut f.ctx).unwrap();
        f.batch.draw(&mut f.ctx, &f.a, 0.0, 0.0).unwrap();
        f.batch.set_color(Color::RED);
        f.batch.draw(&mut f.ctx, &f.a, 0.0, 0.0).unwrap();

        let v = f.batch.pending_vertices();
        assert_eq!(v[2].to_bits(), Color::WHITE.to_float_bits().to_bits());
        assert_eq!(v[22].to_bits(), Color::RED.to_float_bits().to_bits());
        assert_eq!(f.batch.color(), Color::RED);

        f.batch.set_packed_color(Color::BLUE.to_float_bits());
        assert_eq!(f.batch.color().components(), Color::BLUE.components());
    }

    #[test]
    fn packed_colors_reach_the_gpu_bit_for_bit() {
        let mut f = fixture(10);
        f.batch.set_color(Color::rgba(0.2, 0.4, 0.6, 0.5));
        f.batch.begin(&mut f.ctx).unwrap();
        f.batch.draw(&mut f.ctx, &f.a, 3.0, 4.0).unwrap();
        let queued: Vec<u8> = bytemuck::cast_slice(f.batch.pending_vertices()).to_vec();
        f.batch.end(&mut f.ctx).unwrap();

        assert_eq!(&draws(&f)[0].vertex_data[..queued.len()], &queued[..]);
    }

    #[test]
    fn blend_settings_apply_at_flush() {
        let mut f = fixture(10);
        f.batch.begin(&mut f.ctx).unwrap();
        f.batch.draw(&mut f.ctx, &f.a, 0.0, 0.0).unwrap();
        f.batch
            .set_blend_function(&mut f.ctx, BlendFactor::One, BlendFactor::One)
            .unwrap();
        f.batch.draw(&mut f.ctx, &f.a, 0.0, 0.0).unwrap();
        f.batch.disable_blending(&mut f.ctx).unwrap();
        f.batch.draw(&mut f.ctx, &f.a, 0.0, 0.0).unwrap();
        f.batch.enable_blending(&mut f.ctx).unwrap();
        f.batch.preserve_blend_function(&mut f.ctx).unwrap();
        f.batch.draw(&mut f.ctx, &f.a, 0.0, 0.0).unwrap();
        f.batch.end(&mut f.ctx).unwrap();

        let state: Vec<_> = draws(&f)
            .iter()
            .map(|d| (d.blend_enabled, d.blend_func))
            .collect();
        let ones = BlendFunc::new(BlendFactor::One, BlendFactor::One);
        assert_eq!(
            state,
            vec![
                (true, BlendFunc::ALPHA),
                (true, ones),
                (false, ones),
                (true, ones),
            ]
        );
        assert_eq!(f.batch.blend_function(), None);
    }

    #[test]
    fn custom_shaders_flush_only_when_they_change() {
        let mut f = fixture(10);
        let custom = ShaderProgram::new(&mut f.ctx, "custom vs", "custom fs")
            .unwrap()
            .with_matrix_uniform("u_mvp");

        f.batch.begin(&mut f.ctx).unwrap();
        f.batch.draw(&mut f.ctx, &f.a, 0.0, 0.0).unwrap();
        let previous = f.batch.set_shader(&mut f.ctx, Some(custom.clone())).unwrap();
        assert!(previous.is_none());
        assert_eq!(draws(&f).len(), 1);

        f.batch.draw(&mut f.ctx, &f.a, 0.0, 0.0).unwrap();
        f.batch.set_shader(&mut f.ctx, Some(custom.clone())).unwrap();
        assert_eq!(draws(&f).len(), 1);

        let previous = f.batch.set_shader(&mut f.ctx, None).unwrap();
        assert_eq!(previous.map(|s| s.id()), Some(custom.id()));
        f.batch.end(&mut f.ctx).unwrap();

        let programs: Vec<_> = draws(&f).iter().map(|d| d.program).collect();
        assert_eq!(programs, vec![Some(f.batch.shader().id()), Some(custom.id())]);
        assert!(f.ctx.api().uniform_mat4(custom.id(), "u_mvp").is_some());
    }

    #[test]
    fn render_calls_reset_per_session() {
        let mut f = fixture(10);
        for _ in 0..2 {
            f.batch.begin(&mut f.ctx).unwrap();
            f.batch.draw(&mut f.ctx, &f.a, 0.0, 0.0).unwrap();
            f.batch.end(&mut f.ctx).unwrap();
        }
        assert_eq!(f.batch.render_calls(), 1);
        assert_eq!(f.batch.total_render_calls(), 2);
    }

    #[test]
    fn close_releases_gpu_objects() {
        let f = fixture(10);
        let mut ctx = f.ctx;
        f.batch.close(&mut ctx);
        assert_eq!(ctx.api().live_buffers(), 0);
        assert_eq!(ctx.api().live_programs(), 0);
    }
}
