use std::error::Error;

use sprig::Color;
use sprig::math::{SourceRect, vec2};
use sprig::render::{
    GpuContext, GraphicsApi, RecordingBackend, SpriteBatch, SpriteBatchConfig, SpriteDraw,
    Texture, WgpuBackend, wgpu,
};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;
const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let instance = wgpu::Instance::default();
    let Ok(adapter) = pollster::block_on(instance.request_adapter(&Default::default())) else {
        log::warn!("no GPU adapter, recording calls instead");
        let mut ctx = GpuContext::new(RecordingBackend::new());
        let scene = Scene::draw(&mut ctx)?;
        log::info!("{} draws recorded", ctx.api().draws().len());
        scene.close(&mut ctx);
        return Ok(());
    };
    let (device, queue) = pollster::block_on(adapter.request_device(&Default::default()))?;

    let target = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Headless Target"),
        size: wgpu::Extent3d {
            width: WIDTH,
            height: HEIGHT,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = target.create_view(&Default::default());

    let mut ctx = GpuContext::new(WgpuBackend::new(device, queue, FORMAT));
    let scene = Scene::draw(&mut ctx)?;
    let draws = ctx.api().pending_draws();
    ctx.api_mut().render(&view, Some(Color::BLACK.into()));
    log::info!("rendered {draws} draws into a {WIDTH}x{HEIGHT} target");
    scene.close(&mut ctx);

    Ok(())
}

struct Scene {
    batch: SpriteBatch,
    white: Texture,
    atlas: Texture,
}

impl Scene {
    // A checkerboard grid, a tinted strip of atlas cells & a spinning sprite
    fn draw<A: GraphicsApi>(ctx: &mut GpuContext<A>) -> sprig::Result<Self> {
        let mut batch = SpriteBatch::new(
            ctx,
            SpriteBatchConfig {
                max_sprites: 64,
                viewport: vec2(WIDTH as f32, HEIGHT as f32),
                ..Default::default()
            },
        )?;
        let white = Texture::white(ctx);
        let atlas = Texture::new(ctx, 2, 2, &checker())?;

        batch.begin(ctx)?;
        batch.enable_blending(ctx)?;
        for row in 0..HEIGHT / 16 {
            for col in 0..WIDTH / 16 {
                let shade = if (row + col) % 2 == 0 { 0.2 } else { 0.3 };
                batch.set_color(Color::rgba(shade, shade, shade, 1.0));
                batch.draw_sized(ctx, &white, (col * 16) as f32, (row * 16) as f32, 16.0, 16.0)?;
            }
        }

        batch.set_color(Color::RED);
        for i in 0..4 {
            let cell = SourceRect::new(i % 2, i / 2, 1, 1);
            batch.draw_region(ctx, &atlas, 40.0 + i as f32 * 8.0, 40.0, cell, false, i % 2 == 1)?;
        }

        batch.set_color(Color::WHITE);
        let spinner = SpriteDraw::new(WIDTH as f32 / 2.0, HEIGHT as f32 / 2.0, 32.0, 32.0)
            .origin(16.0, 16.0)
            .scale(1.5, 1.5)
            .rotation(30.0);
        batch.draw_sprite(ctx, &atlas, &spinner)?;
        batch.end(ctx)?;

        log::info!(
            "{} render calls, at most {} sprites in one batch",
            batch.render_calls(),
            batch.max_sprites_in_batch()
        );
        Ok(Self {
            batch,
            white,
            atlas,
        })
    }

    // once the frame is rendered
    fn close<A: GraphicsApi>(self, ctx: &mut GpuContext<A>) {
        self.batch.close(ctx);
        self.atlas.close(ctx);
        self.white.close(ctx);
    }
}

fn checker() -> Vec<u8> {
    [[255, 255, 255, 255], [0, 0, 0, 255], [0, 0, 0, 255], [255, 255, 255, 255]].concat()
}
