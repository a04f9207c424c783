// renderer/framebuffer.rs
//! Offscreen render targets: the deferred G-buffer, the light accumulation
//! buffer and the post-processing auxiliary buffers.

use glam::Vec4;
use log::error;

use super::device::{
    ClearFlags, FramebufferId, FramebufferStatus, GraphicsDevice, SamplerParams,
};
use super::error::FramebufferError;
use super::texture::Texture;

pub const GBUFFER_DIFFUSE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const GBUFFER_SPECULAR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const GBUFFER_NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgb10a2Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;
pub const ACCUMULATION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const AUX_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[derive(Debug, Clone, Copy)]
pub struct ColorAttachment {
    pub format: wgpu::TextureFormat,
    pub sampler: SamplerParams,
}

#[derive(Debug)]
pub struct FrameBuffer {
    id: FramebufferId,
    width: u32,
    height: u32,
    color: Vec<Texture>,
    depth: Option<Texture>,
}

impl FrameBuffer {
    pub fn new(
        device: &mut dyn GraphicsDevice,
        label: &str,
        width: u32,
        height: u32,
        color: &[ColorAttachment],
        depth: Option<wgpu::TextureFormat>,
    ) -> Result<Self, FramebufferError> {
        let max = device.max_color_attachments();
        if color.len() > max {
            return Err(FramebufferError::TooManyAttachments {
                requested: color.len(),
                max,
            });
        }
        if width == 0 || height == 0 {
            return Err(FramebufferError::ZeroSize { width, height });
        }

        let color: Vec<Texture> = color
            .iter()
            .enumerate()
            .map(|(i, attachment)| {
                Texture::render_target(
                    device,
                    &format!("{label} color {i}"),
                    width,
                    height,
                    attachment.format,
                    attachment.sampler,
                )
            })
            .collect();

        let depth = depth.map(|format| {
            Texture::render_target(
                device,
                &format!("{label} depth"),
                width,
                height,
                format,
                SamplerParams::POINT_CLAMP,
            )
        });

        let color_ids: Vec<_> = color.iter().map(Texture::id).collect();
        let id = device.create_framebuffer(&color_ids, depth.as_ref().map(Texture::id));

        match device.framebuffer_status(id) {
            FramebufferStatus::Complete => Ok(Self {
                id,
                width,
                height,
                color,
                depth,
            }),
            FramebufferStatus::Incomplete(reason) => Err(FramebufferError::Incomplete(reason)),
        }
    }

    /// Single-target buffer, optionally with depth.
    pub fn render_texture(
        device: &mut dyn GraphicsDevice,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        with_depth: bool,
    ) -> Result<Self, FramebufferError> {
        Self::new(
            device,
            label,
            width,
            height,
            &[ColorAttachment {
                format,
                sampler: SamplerParams::LINEAR_CLAMP,
            }],
            with_depth.then_some(DEPTH_FORMAT),
        )
    }

    pub fn bind(&self, device: &mut dyn GraphicsDevice) {
        device.bind_framebuffer(Some(self.id));
        device.set_viewport(self.width, self.height);
    }

    /// Binds the backbuffer.
    pub fn unbind(device: &mut dyn GraphicsDevice, width: u32, height: u32) {
        device.bind_framebuffer(None);
        device.set_viewport(width, height);
    }

    /// Clears the bound buffer. Depth is cleared only if it has one.
    pub fn clear(&self, device: &mut dyn GraphicsDevice, color: Vec4) {
        let mut flags = ClearFlags::COLOR;
        if self.depth.is_some() {
            flags |= ClearFlags::DEPTH;
        }
        device.clear(flags, color);
    }

    pub fn id(&self) -> FramebufferId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn color(&self, index: usize) -> Option<&Texture> {
        self.color.get(index)
    }

    pub fn color_count(&self) -> usize {
        self.color.len()
    }

    pub fn depth(&self) -> Option<&Texture> {
        self.depth.as_ref()
    }
}

/// Geometry buffer of the deferred path.
#[derive(Debug)]
pub struct GBuffer {
    target: FrameBuffer,
}

impl GBuffer {
    pub fn new(
        device: &mut dyn GraphicsDevice,
        width: u32,
        height: u32,
    ) -> Result<Self, FramebufferError> {
        let attachment = |format| ColorAttachment {
            format,
            sampler: SamplerParams::POINT_CLAMP,
        };
        let target = FrameBuffer::new(
            device,
            "gbuffer",
            width,
            height,
            &[
                attachment(GBUFFER_DIFFUSE_FORMAT),
                attachment(GBUFFER_SPECULAR_FORMAT),
                attachment(GBUFFER_NORMAL_FORMAT),
            ],
            Some(DEPTH_FORMAT),
        )?;
        Ok(Self { target })
    }

    pub fn target(&self) -> &FrameBuffer {
        &self.target
    }

    pub fn diffuse(&self) -> Option<&Texture> {
        self.target.color(0)
    }

    pub fn specular_smoothness(&self) -> Option<&Texture> {
        self.target.color(1)
    }

    pub fn normal(&self) -> Option<&Texture> {
        self.target.color(2)
    }

    pub fn depth(&self) -> Option<&Texture> {
        self.target.depth()
    }
}

/// Logs a target setup failure and turns it into `None`.
pub(crate) fn log_setup_failure<T>(name: &str, result: Result<T, FramebufferError>) -> Option<T> {
    match result {
        Ok(target) => Some(target),
        Err(err) => {
            error!("Could not create {} render target: {}", name, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::device::HeadlessDevice;

    #[test]
    fn gbuffer_has_three_targets_and_depth() {
        let mut device = HeadlessDevice::new();
        let gbuffer = GBuffer::new(&mut device, 320, 240).unwrap();
        assert_eq!(gbuffer.target().color_count(), 3);
        assert_eq!(
            gbuffer.normal().map(Texture::format),
            Some(GBUFFER_NORMAL_FORMAT)
        );
        assert!(gbuffer.depth().is_some());
    }

    #[test]
    fn attachment_limit_is_enforced() {
        let mut device = HeadlessDevice::with_limits(16, 2);
        let err = GBuffer::new(&mut device, 64, 64).unwrap_err();
        assert_eq!(
            err,
            FramebufferError::TooManyAttachments {
                requested: 3,
                max: 2
            }
        );
    }

    #[test]
    fn exactly_max_attachments_is_allowed() {
        let mut device = HeadlessDevice::with_limits(16, 3);
        assert!(GBuffer::new(&mut device, 64, 64).is_ok());
    }

    #[test]
    fn zero_sized_targets_are_rejected() {
        let mut device = HeadlessDevice::new();
        let err = FrameBuffer::render_texture(&mut device, "acc", 0, 10, AUX_FORMAT, false)
            .unwrap_err();
        assert!(matches!(err, FramebufferError::ZeroSize { .. }));
    }
}
