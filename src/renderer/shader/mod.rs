// renderer/shader/mod.rs

pub mod preprocessor;
pub mod program;
pub mod property;
pub mod uniform_id;
pub mod value;

pub use preprocessor::{preprocess, PreprocessedSource};
pub use program::{SamplerBinding, Shader, ShaderProgram};
pub use property::{PropertySet, ShaderProperty};
pub use uniform_id::{uniform_id, UniformId};
pub use value::{ShaderValue, ValueType};
