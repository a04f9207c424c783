// renderer/device/mod.rs
//! Immediate-mode graphics device boundary.
//!
//! Everything above this module talks to the GPU through [`GraphicsDevice`].
//! Calls are synchronous from the caller's point of view and mirror the
//! fixed-function state model the renderer diffs against (capability
//! toggles, cull face, depth mask, blend functions...). Resource formats are
//! described with `wgpu` vocabulary so pipeline-baked backends can translate
//! them one to one.

mod headless;

pub use headless::{DeviceCounters, DeviceState, DrawRecord, HeadlessDevice};

use bitflags::bitflags;
use glam::Vec4;

use crate::renderer::render_state::{BlendEquation, BlendFactor, CompareFunction, CullMode};
use crate::renderer::shader::ShaderValue;

macro_rules! device_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);
    };
}

device_id!(
    /// Compiled shader stage object.
    ShaderId
);
device_id!(
    /// Linked program object.
    ProgramId
);
device_id!(TextureId);
device_id!(FramebufferId);
device_id!(
    /// Uploaded vertex + index buffer pair.
    GeometryId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    CullFace,
    DepthTest,
    Blend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
    TessControl,
    TessEvaluation,
    Compute,
}

impl ShaderStage {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "vertex" => Some(Self::Vertex),
            "fragment" => Some(Self::Fragment),
            "geometry" => Some(Self::Geometry),
            "tess_control" => Some(Self::TessControl),
            "tess_evaluation" => Some(Self::TessEvaluation),
            "compute" => Some(Self::Compute),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
            Self::Geometry => "geometry",
            Self::TessControl => "tess_control",
            Self::TessEvaluation => "tess_evaluation",
            Self::Compute => "compute",
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
    }
}

#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub shader: ShaderId,
    pub success: bool,
    pub log: String,
}

#[derive(Debug, Clone)]
pub struct LinkOutput {
    pub program: ProgramId,
    pub success: bool,
    pub log: String,
}

/// One entry of a linked program's active uniform list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUniform {
    pub name: String,
    pub location: UniformLocation,
    pub sampler: bool,
}

/// Sampling parameters for a texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerParams {
    pub filter: wgpu::FilterMode,
    pub address_mode: wgpu::AddressMode,
    pub mipmaps: bool,
}

impl SamplerParams {
    pub const POINT_CLAMP: Self = Self {
        filter: wgpu::FilterMode::Nearest,
        address_mode: wgpu::AddressMode::ClampToEdge,
        mipmaps: false,
    };

    pub const LINEAR_CLAMP: Self = Self {
        filter: wgpu::FilterMode::Linear,
        address_mode: wgpu::AddressMode::ClampToEdge,
        mipmaps: false,
    };

    pub const POINT_REPEAT: Self = Self {
        filter: wgpu::FilterMode::Nearest,
        address_mode: wgpu::AddressMode::Repeat,
        mipmaps: false,
    };
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            filter: wgpu::FilterMode::Linear,
            address_mode: wgpu::AddressMode::Repeat,
            mipmaps: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TextureDesc<'a> {
    pub label: Option<&'a str>,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub sampler: SamplerParams,
    pub data: Option<&'a [u8]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramebufferStatus {
    Complete,
    Incomplete(String),
}

/// Vertex data handed to [`GraphicsDevice::upload_geometry`].
#[derive(Debug, Clone)]
pub struct GeometryDesc<'a> {
    pub label: Option<&'a str>,
    pub vertices: &'a [u8],
    pub layout: wgpu::VertexBufferLayout<'a>,
    pub indices: &'a [u32],
}

pub trait GraphicsDevice {
    // fixed-function state
    fn set_capability(&mut self, capability: Capability, enabled: bool);
    fn cull_face(&mut self, mode: CullMode);
    fn depth_mask(&mut self, write: bool);
    fn polygon_offset(&mut self, factor: f32, units: f32);
    fn depth_func(&mut self, func: CompareFunction);
    fn blend_color(&mut self, color: Vec4);
    fn blend_equation_separate(&mut self, color: BlendEquation, alpha: BlendEquation);
    fn blend_func_separate(
        &mut self,
        src: BlendFactor,
        dst: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    );

    // programs
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> CompileOutput;
    fn link_program(&mut self, shaders: &[ShaderId]) -> LinkOutput;
    fn active_uniforms(&self, program: ProgramId) -> Vec<ActiveUniform>;
    fn use_program(&mut self, program: Option<ProgramId>);
    /// Writes to the currently bound program.
    fn set_uniform(&mut self, location: UniformLocation, value: &ShaderValue);

    // textures and targets
    fn max_combined_texture_units(&self) -> usize;
    fn max_color_attachments(&self) -> usize;
    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> TextureId;
    fn bind_texture_unit(&mut self, unit: usize, texture: Option<TextureId>);
    fn create_framebuffer(
        &mut self,
        color: &[TextureId],
        depth: Option<TextureId>,
    ) -> FramebufferId;
    fn framebuffer_status(&self, framebuffer: FramebufferId) -> FramebufferStatus;
    /// `None` binds the backbuffer.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);
    fn set_viewport(&mut self, width: u32, height: u32);
    fn clear(&mut self, flags: ClearFlags, color: Vec4);
    fn set_srgb_conversion(&mut self, enabled: bool);

    // geometry
    fn upload_geometry(&mut self, desc: &GeometryDesc<'_>) -> GeometryId;
    fn bind_geometry(&mut self, geometry: Option<GeometryId>);
    fn draw_indexed(&mut self, first_index: u32, index_count: u32);

    fn present(&mut self);
}
