// renderer/texture.rs

use log::info;

use super::device::{GraphicsDevice, SamplerParams, TextureDesc, TextureId};
use crate::asset::compressed::CompressedImage;
use crate::asset::ContentError;

/// A device texture plus the metadata the renderer needs (size, format).
#[derive(Debug, Clone)]
pub struct Texture {
    id: TextureId,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    sampler: SamplerParams,
}

impl Texture {
    /// Calculate the number of mip levels for a given texture size
    pub fn calculate_mip_levels(width: u32, height: u32) -> u32 {
        let max_dimension = width.max(height).max(1);
        u32::BITS - max_dimension.leading_zeros()
    }

    pub fn from_rgba8(
        device: &mut dyn GraphicsDevice,
        label: &str,
        width: u32,
        height: u32,
        data: &[u8],
        is_srgb: bool,
        sampler: SamplerParams,
    ) -> Self {
        let format = if is_srgb {
            wgpu::TextureFormat::Rgba8UnormSrgb
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        };
        Self::create(device, label, width, height, format, sampler, Some(data))
    }

    /// Uninitialized texture used as a render target attachment.
    pub fn render_target(
        device: &mut dyn GraphicsDevice,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        sampler: SamplerParams,
    ) -> Self {
        Self::create(device, label, width, height, format, sampler, None)
    }

    pub fn from_compressed(
        device: &mut dyn GraphicsDevice,
        label: &str,
        image: &CompressedImage,
    ) -> Result<Self, ContentError> {
        let format = image.texture_format()?;
        info!(
            "Loading compressed texture '{}' ({}x{}, {:?})",
            label, image.width, image.height, format
        );
        Ok(Self::create(
            device,
            label,
            image.width,
            image.height,
            format,
            SamplerParams::default(),
            Some(&image.data),
        ))
    }

    fn create(
        device: &mut dyn GraphicsDevice,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        sampler: SamplerParams,
        data: Option<&[u8]>,
    ) -> Self {
        let id = device.create_texture(&TextureDesc {
            label: Some(label),
            width,
            height,
            format,
            sampler,
            data,
        });

        Self {
            id,
            width,
            height,
            format,
            sampler,
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

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn sampler(&self) -> SamplerParams {
        self.sampler
    }

    pub fn mip_level_count(&self) -> u32 {
        if self.sampler.mipmaps {
            Self::calculate_mip_levels(self.width, self.height)
        } else {
            1
        }
    }
}
