// renderer/shader/value.rs
//! Closed set of values a shader property can carry.

use glam::{IVec2, IVec3, IVec4, Mat3, Mat4, UVec2, UVec3, UVec4, Vec2, Vec3, Vec4};
use serde_json::Value;

use super::{ShaderProgram, UniformId};
use crate::renderer::device::TextureId;
use crate::renderer::json;
use crate::renderer::render_context::RenderContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    UInt,
    UVec2,
    UVec3,
    UVec4,
    Mat3,
    Mat4,
    Mat4x3,
    Texture,
}

impl ValueType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "float" => Self::Float,
            "vec2" => Self::Vec2,
            "vec3" => Self::Vec3,
            "vec4" => Self::Vec4,
            "int" => Self::Int,
            "ivec2" => Self::IVec2,
            "ivec3" => Self::IVec3,
            "ivec4" => Self::IVec4,
            "uint" => Self::UInt,
            "uvec2" => Self::UVec2,
            "uvec3" => Self::UVec3,
            "uvec4" => Self::UVec4,
            "mat3" => Self::Mat3,
            "mat4" => Self::Mat4,
            "mat4x3" => Self::Mat4x3,
            "texture" => Self::Texture,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::Int => "int",
            Self::IVec2 => "ivec2",
            Self::IVec3 => "ivec3",
            Self::IVec4 => "ivec4",
            Self::UInt => "uint",
            Self::UVec2 => "uvec2",
            Self::UVec3 => "uvec3",
            Self::UVec4 => "uvec4",
            Self::Mat3 => "mat3",
            Self::Mat4 => "mat4",
            Self::Mat4x3 => "mat4x3",
            Self::Texture => "texture",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShaderValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Int(i32),
    IVec2(IVec2),
    IVec3(IVec3),
    IVec4(IVec4),
    UInt(u32),
    UVec2(UVec2),
    UVec3(UVec3),
    UVec4(UVec4),
    Mat3(Mat3),
    Mat4(Mat4),
    /// Four columns of three components.
    Mat4x3([Vec3; 4]),
    Texture(Option<TextureId>),
}

impl ShaderValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Float(_) => ValueType::Float,
            Self::Vec2(_) => ValueType::Vec2,
            Self::Vec3(_) => ValueType::Vec3,
            Self::Vec4(_) => ValueType::Vec4,
            Self::Int(_) => ValueType::Int,
            Self::IVec2(_) => ValueType::IVec2,
            Self::IVec3(_) => ValueType::IVec3,
            Self::IVec4(_) => ValueType::IVec4,
            Self::UInt(_) => ValueType::UInt,
            Self::UVec2(_) => ValueType::UVec2,
            Self::UVec3(_) => ValueType::UVec3,
            Self::UVec4(_) => ValueType::UVec4,
            Self::Mat3(_) => ValueType::Mat3,
            Self::Mat4(_) => ValueType::Mat4,
            Self::Mat4x3(_) => ValueType::Mat4x3,
            Self::Texture(_) => ValueType::Texture,
        }
    }

    /// Zero for scalars and vectors, identity for matrices, no texture.
    pub fn default_of(ty: ValueType) -> Self {
        match ty {
            ValueType::Float => Self::Float(0.0),
            ValueType::Vec2 => Self::Vec2(Vec2::ZERO),
            ValueType::Vec3 => Self::Vec3(Vec3::ZERO),
            ValueType::Vec4 => Self::Vec4(Vec4::ZERO),
            ValueType::Int => Self::Int(0),
            ValueType::IVec2 => Self::IVec2(IVec2::ZERO),
            ValueType::IVec3 => Self::IVec3(IVec3::ZERO),
            ValueType::IVec4 => Self::IVec4(IVec4::ZERO),
            ValueType::UInt => Self::UInt(0),
            ValueType::UVec2 => Self::UVec2(UVec2::ZERO),
            ValueType::UVec3 => Self::UVec3(UVec3::ZERO),
            ValueType::UVec4 => Self::UVec4(UVec4::ZERO),
            ValueType::Mat3 => Self::Mat3(Mat3::IDENTITY),
            ValueType::Mat4 => Self::Mat4(Mat4::IDENTITY),
            ValueType::Mat4x3 => Self::Mat4x3([Vec3::X, Vec3::Y, Vec3::Z, Vec3::ZERO]),
            ValueType::Texture => Self::Texture(None),
        }
    }

    /// Parses `json` as a value of type `ty`. Textures are given by name and
    /// resolved through `texture`.
    pub fn from_json(
        ty: ValueType,
        json: &Value,
        texture: &mut dyn FnMut(&str) -> Option<TextureId>,
    ) -> Option<Self> {
        let f = || json::floats(json);
        let i = || ints(json);

        Some(match ty {
            ValueType::Float => Self::Float(json.as_f64()? as f32),
            ValueType::Vec2 => Self::Vec2(Vec2::from_slice(&exact(f()?, 2)?)),
            ValueType::Vec3 => Self::Vec3(Vec3::from_slice(&exact(f()?, 3)?)),
            ValueType::Vec4 => Self::Vec4(Vec4::from_slice(&exact(f()?, 4)?)),
            ValueType::Int => Self::Int(i32::try_from(json.as_i64()?).ok()?),
            ValueType::IVec2 => Self::IVec2(IVec2::from_slice(&exact(i()?, 2)?)),
            ValueType::IVec3 => Self::IVec3(IVec3::from_slice(&exact(i()?, 3)?)),
            ValueType::IVec4 => Self::IVec4(IVec4::from_slice(&exact(i()?, 4)?)),
            ValueType::UInt => Self::UInt(u32::try_from(json.as_u64()?).ok()?),
            ValueType::UVec2 => Self::UVec2(UVec2::from_slice(&exact(uints(json)?, 2)?)),
            ValueType::UVec3 => Self::UVec3(UVec3::from_slice(&exact(uints(json)?, 3)?)),
            ValueType::UVec4 => Self::UVec4(UVec4::from_slice(&exact(uints(json)?, 4)?)),
            ValueType::Mat3 => Self::Mat3(Mat3::from_cols_slice(&exact(f()?, 9)?)),
            ValueType::Mat4 => Self::Mat4(Mat4::from_cols_slice(&exact(f()?, 16)?)),
            ValueType::Mat4x3 => {
                let v = exact(f()?, 12)?;
                Self::Mat4x3([
                    Vec3::from_slice(&v[0..3]),
                    Vec3::from_slice(&v[3..6]),
                    Vec3::from_slice(&v[6..9]),
                    Vec3::from_slice(&v[9..12]),
                ])
            }
            ValueType::Texture => Self::Texture(Some(texture(json.as_str()?)?)),
        })
    }

    /// Writes the value to `id` on the bound `program`.
    pub fn apply(&self, id: UniformId, program: &ShaderProgram, ctx: &mut RenderContext<'_>) {
        match self {
            Self::Texture(Some(texture)) => program.set_texture(ctx, id, *texture),
            Self::Texture(None) => {
                if let Some(texture) = ctx.fallback_texture {
                    program.set_texture(ctx, id, texture);
                }
            }
            _ => program.set_uniform(ctx.device, id, self),
        }
    }
}

fn exact<T>(values: Vec<T>, len: usize) -> Option<Vec<T>> {
    (values.len() == len).then_some(values)
}

fn ints(json: &Value) -> Option<Vec<i32>> {
    json.as_array()?
        .iter()
        .map(|v| v.as_i64().and_then(|i| i32::try_from(i).ok()))
        .collect()
}

fn uints(json: &Value) -> Option<Vec<u32>> {
    json.as_array()?
        .iter()
        .map(|v| v.as_u64().and_then(|i| u32::try_from(i).ok()))
        .collect()
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ShaderValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from!(
    f32 => Float,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    i32 => Int,
    IVec2 => IVec2,
    IVec3 => IVec3,
    IVec4 => IVec4,
    u32 => UInt,
    UVec2 => UVec2,
    UVec3 => UVec3,
    UVec4 => UVec4,
    Mat3 => Mat3,
    Mat4 => Mat4,
);

impl From<TextureId> for ShaderValue {
    fn from(texture: TextureId) -> Self {
        Self::Texture(Some(texture))
    }
}
