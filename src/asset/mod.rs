pub mod cache;
pub mod compressed;
pub mod content;
pub mod handle;
pub mod mesh;

pub use cache::AssetCache;
pub use compressed::CompressedImage;
pub use content::{Content, ContentError};
pub use handle::Handle;
pub use mesh::{Drawable, Mesh, SubMesh};

use crate::renderer::device::TextureId;
use crate::renderer::shader::{Shader, ShaderProgram};
use crate::renderer::{Effect, Material, Texture};

/// Every loaded resource, addressed by [`Handle`].
#[derive(Default)]
pub struct Assets {
    pub meshes: AssetCache<Mesh>,
    pub textures: AssetCache<Texture>,
    pub shaders: AssetCache<Shader>,
    pub programs: AssetCache<ShaderProgram>,
    pub effects: AssetCache<Effect>,
    pub materials: AssetCache<Material>,
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Device texture registered under `name`.
    pub fn texture_id(&self, name: &str) -> Option<TextureId> {
        let handle = self.textures.find(name)?;
        self.textures.get(handle).map(Texture::id)
    }

    /// Effect of a material, if both exist.
    pub fn material_effect(&self, material: Handle<Material>) -> Option<(&Material, &Effect)> {
        let material = self.materials.get(material)?;
        let effect = self.effects.get(material.effect()?)?;
        Some((material, effect))
    }
}
