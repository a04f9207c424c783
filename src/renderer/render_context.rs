// src/renderer/render_context.rs

use super::device::{GraphicsDevice, TextureId};
use super::texture_units::TextureUnitManager;

/// Mutable device access handed to binding code.
///
/// Bundles the device with the texture unit cache so anything that binds a
/// sampler can make its texture resident without reaching back into the
/// engine.
pub struct RenderContext<'a> {
    pub device: &'a mut dyn GraphicsDevice,
    pub texture_units: &'a mut TextureUnitManager,
    /// Bound in place of texture values that never resolved.
    pub fallback_texture: Option<TextureId>,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        device: &'a mut dyn GraphicsDevice,
        texture_units: &'a mut TextureUnitManager,
    ) -> Self {
        Self {
            device,
            texture_units,
            fallback_texture: None,
        }
    }

    pub fn with_fallback_texture(mut self, texture: Option<TextureId>) -> Self {
        self.fallback_texture = texture;
        self
    }
}
