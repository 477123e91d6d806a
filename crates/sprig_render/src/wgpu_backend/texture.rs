use wgpu::{
    AddressMode, BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout,
    BindingResource, Device, Extent3d, FilterMode, Origin3d, Queue, Sampler, SamplerDescriptor,
    TexelCopyBufferLayout, TexelCopyTextureInfo, TextureAspect, TextureDescriptor,
    TextureDimension, TextureFormat, TextureUsages,
};

use crate::{
    error::Result,
    texture::{WHITE_PIXEL, check_pixels},
};

/// Turns RGBA pixels into bind groups for `@group(0)`
///
/// Every texture shares one nearest-neighbour, edge-clamped sampler.
pub(super) struct TextureUploader {
    layout: BindGroupLayout,
    sampler: Sampler,
}

impl TextureUploader {
    pub fn new(device: &Device, layout: BindGroupLayout) -> Self {
        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("Sprig Sampler"),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            ..Default::default()
        });
        Self { layout, sampler }
    }

    pub fn layout(&self) -> &BindGroupLayout {
        &self.layout
    }

    /// Rejects empty images & pixel data that doesn't match the dimensions
    pub fn upload(
        &self,
        device: &Device,
        queue: &Queue,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<BindGroup> {
        check_pixels(width, height, rgba)?;
        Ok(self.upload_unchecked(device, queue, width, height, rgba))
    }

    pub fn white(&self, device: &Device, queue: &Queue) -> BindGroup {
        self.upload_unchecked(device, queue, 1, 1, &WHITE_PIXEL)
    }

    fn upload_unchecked(
        &self,
        device: &Device,
        queue: &Queue,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> BindGroup {
        let extent = Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&TextureDescriptor {
            label: Some("Sprig Texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8UnormSrgb,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            rgba,
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            extent,
        );

        // the bind group keeps the texture alive after the handle is dropped
        let view = texture.create_view(&Default::default());
        device.create_bind_group(&BindGroupDescriptor {
            label: Some("Sprig Texture Bind Group"),
            layout: &self.layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(&view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }
}
