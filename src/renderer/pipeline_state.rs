// renderer/pipeline_state.rs
//! Translation of [`RenderState`] into the pipeline descriptors of `wgpu`,
//! for backends that bake fixed-function state into pipelines.

use super::render_state::{BlendEquation, BlendFactor, CompareFunction, CullMode, RenderState};

impl From<CompareFunction> for wgpu::CompareFunction {
    fn from(func: CompareFunction) -> Self {
        match func {
            CompareFunction::Never => wgpu::CompareFunction::Never,
            CompareFunction::Less => wgpu::CompareFunction::Less,
            CompareFunction::Equal => wgpu::CompareFunction::Equal,
            CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
            CompareFunction::Greater => wgpu::CompareFunction::Greater,
            CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
            CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
            CompareFunction::Always => wgpu::CompareFunction::Always,
        }
    }
}

/// `wgpu` has a single blend constant, so the alpha-only constant factors
/// map onto it.
impl From<BlendFactor> for wgpu::BlendFactor {
    fn from(factor: BlendFactor) -> Self {
        match factor {
            BlendFactor::Zero => wgpu::BlendFactor::Zero,
            BlendFactor::One => wgpu::BlendFactor::One,
            BlendFactor::SrcColor => wgpu::BlendFactor::Src,
            BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
            BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
            BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
            BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
            BlendFactor::DstColor => wgpu::BlendFactor::Dst,
            BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
            BlendFactor::SrcAlphaSaturate => wgpu::BlendFactor::SrcAlphaSaturated,
            BlendFactor::ConstantColor | BlendFactor::ConstantAlpha => wgpu::BlendFactor::Constant,
            BlendFactor::OneMinusConstantColor | BlendFactor::OneMinusConstantAlpha => {
                wgpu::BlendFactor::OneMinusConstant
            }
        }
    }
}

impl From<BlendEquation> for wgpu::BlendOperation {
    fn from(equation: BlendEquation) -> Self {
        match equation {
            BlendEquation::Add => wgpu::BlendOperation::Add,
            BlendEquation::Subtract => wgpu::BlendOperation::Subtract,
            BlendEquation::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
            BlendEquation::Min => wgpu::BlendOperation::Min,
            BlendEquation::Max => wgpu::BlendOperation::Max,
        }
    }
}

fn blend_component(src: BlendFactor, dst: BlendFactor, equation: BlendEquation) -> wgpu::BlendComponent {
    let operation = wgpu::BlendOperation::from(equation);
    // min/max ignore the factors and wgpu only accepts One for them
    let (src_factor, dst_factor) = match operation {
        wgpu::BlendOperation::Min | wgpu::BlendOperation::Max => {
            (wgpu::BlendFactor::One, wgpu::BlendFactor::One)
        }
        _ => (src.into(), dst.into()),
    };
    wgpu::BlendComponent {
        src_factor,
        dst_factor,
        operation,
    }
}

impl RenderState {
    /// Culling of both faces cannot be expressed in a pipeline; callers skip
    /// the draw instead.
    pub fn culls_everything(&self) -> bool {
        self.cull_enabled && self.cull_mode == CullMode::FrontAndBack
    }

    pub fn primitive_state(&self) -> wgpu::PrimitiveState {
        let cull_mode = match (self.cull_enabled, self.cull_mode) {
            (false, _) => None,
            (true, CullMode::Front) => Some(wgpu::Face::Front),
            (true, CullMode::Back | CullMode::FrontAndBack) => Some(wgpu::Face::Back),
        };
        wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode,
            front_face: wgpu::FrontFace::Ccw,
            polygon_mode: wgpu::PolygonMode::Fill,
            ..Default::default()
        }
    }

    /// A disabled depth test also disables depth writes.
    pub fn depth_stencil_state(&self, format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
        let (depth_write_enabled, depth_compare) = if self.depth_test_enabled {
            (self.depth_write, self.depth_function.into())
        } else {
            (false, wgpu::CompareFunction::Always)
        };
        wgpu::DepthStencilState {
            format,
            depth_write_enabled,
            depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState {
                constant: self.depth_offset_units.round() as i32,
                slope_scale: self.depth_offset_factor,
                clamp: 0.0,
            },
        }
    }

    pub fn blend_state(&self) -> Option<wgpu::BlendState> {
        self.blend_enabled.then(|| wgpu::BlendState {
            color: blend_component(self.blend_source, self.blend_dest, self.blend_equation),
            alpha: blend_component(
                self.blend_source_alpha,
                self.blend_dest_alpha,
                self.blend_equation_alpha,
            ),
        })
    }

    /// Value for `set_blend_constant`.
    pub fn blend_constant(&self) -> wgpu::Color {
        let c = self.blend_color.as_dvec4();
        wgpu::Color {
            r: c.x,
            g: c.y,
            b: c.z,
            a: c.w,
        }
    }
}
