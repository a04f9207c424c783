pub mod builtin;
pub mod culling;
pub mod device;
pub mod effect;
pub mod engine;
pub mod error;
pub mod framebuffer;
pub mod image_effect;
pub(crate) mod json;
pub mod lights;
pub mod material;
pub mod pipeline_state;
pub mod primitives;
pub mod queue;
pub mod render_context;
pub mod render_state;
pub mod shader;
pub mod texture;
pub mod texture_units;
pub mod uniforms;
pub mod vertex;

pub use device::{GraphicsDevice, HeadlessDevice};
pub use effect::{Effect, LightMode, Pass};
pub use engine::{FramePhase, FrameStats, OutputMode, RenderEngine};
pub use framebuffer::{FrameBuffer, GBuffer};
pub use image_effect::{ImageEffect, PostProcessContext, SimpleImageEffect};
pub use lights::{Light, LightType};
pub use material::Material;
pub use render_state::RenderState;
pub use texture::Texture;
pub use vertex::Vertex;
