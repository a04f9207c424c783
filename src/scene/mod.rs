// scene/mod.rs

pub mod camera;
pub mod components;
pub mod scene;
pub mod transform;

pub use camera::Camera;
pub use components::{Active, ImageEffectStack, MeshRenderer, Name};
pub use scene::Scene;
pub use transform::Transform;
