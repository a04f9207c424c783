//! Hybrid deferred/forward render engine core.
//!
//! Content (effects, materials, shader programs, textures) is resolved from
//! JSON descriptions through [`asset::Content`], scenes live in a `hecs`
//! world wrapped by [`scene::Scene`], and [`renderer::RenderEngine`] turns
//! both into frames on any [`renderer::GraphicsDevice`].

pub mod asset;
pub mod renderer;
pub mod scene;
pub mod settings;

pub use renderer::RenderEngine;
pub use settings::RenderSettings;

/// Installs `env_logger` at info level; `RUST_LOG` module directives still
/// apply. Calling it again is harmless.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
