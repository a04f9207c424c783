// scene/components.rs
// Plain hecs components. Lights and cameras live in their own modules.

use crate::asset::{Handle, Mesh};
use crate::renderer::image_effect::ImageEffect;
use crate::renderer::Material;

/// Draws a mesh with one material per submesh. Missing materials skip the
/// submesh.
#[derive(Debug, Clone)]
pub struct MeshRenderer {
    pub mesh: Handle<Mesh>,
    pub materials: Vec<Option<Handle<Material>>>,
}

impl MeshRenderer {
    pub fn new(mesh: Handle<Mesh>, material: Handle<Material>) -> Self {
        Self {
            mesh,
            materials: vec![Some(material)],
        }
    }

    pub fn with_materials(mesh: Handle<Mesh>, materials: Vec<Option<Handle<Material>>>) -> Self {
        Self { mesh, materials }
    }

    pub fn material(&self, submesh: usize) -> Option<Handle<Material>> {
        self.materials.get(submesh).copied().flatten()
    }
}

/// Post-processing effects of a camera, applied in order.
#[derive(Default)]
pub struct ImageEffectStack(pub Vec<Box<dyn ImageEffect>>);

impl ImageEffectStack {
    pub fn push(&mut self, effect: impl ImageEffect + 'static) {
        self.0.push(Box::new(effect));
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ImageEffect> {
        self.0.iter().map(|e| e.as_ref())
    }
}

/// Name component for debugging
#[derive(Debug, Clone)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// Inactive entities are ignored by the renderer. Entities without the
/// component count as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Active(pub bool);

impl Default for Active {
    fn default() -> Self {
        Self(true)
    }
}
