// scene/scene.rs
use glam::Vec4;
use hecs::{Entity, World};
use log::{debug, warn};

use super::components::{Active, ImageEffectStack, MeshRenderer, Name};
use crate::renderer::Light;
use crate::scene::{Camera, Transform};

/// The entity world plus the per-scene values the renderer reads every frame.
pub struct Scene {
    pub world: World,
    back_color: Vec4,
    ambient: Vec4,
    camera: Option<Entity>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            back_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            ambient: Vec4::ZERO,
            camera: None,
        }
    }

    pub fn back_color(&self) -> Vec4 {
        self.back_color
    }

    pub fn set_back_color(&mut self, color: Vec4) {
        self.back_color = color;
    }

    pub fn ambient(&self) -> Vec4 {
        self.ambient
    }

    pub fn set_ambient(&mut self, ambient: Vec4) {
        self.ambient = ambient;
    }

    /// Spawns a camera. The first camera becomes the active one.
    pub fn spawn_camera(&mut self, name: &str, transform: Transform, camera: Camera) -> Entity {
        let entity = self.world.spawn((
            Name::new(name),
            transform,
            camera,
            ImageEffectStack::default(),
        ));
        if self.camera.is_none() {
            self.camera = Some(entity);
        }
        entity
    }

    pub fn spawn_mesh(&mut self, name: &str, transform: Transform, renderer: MeshRenderer) -> Entity {
        self.world.spawn((Name::new(name), transform, renderer))
    }

    pub fn spawn_light(&mut self, name: &str, transform: Transform, light: Light) -> Entity {
        self.world.spawn((Name::new(name), transform, light))
    }

    /// Makes `entity` the active camera if it has a camera component.
    pub fn set_active_camera(&mut self, entity: Entity) -> bool {
        if self.world.get::<&Camera>(entity).is_err() {
            warn!("Entity {:?} has no camera component", entity);
            return false;
        }
        self.camera = Some(entity);
        true
    }

    pub fn active_camera_entity(&self) -> Option<Entity> {
        self.camera
    }

    /// Transform and camera of the active camera, if it still exists and is
    /// active.
    pub fn active_camera(&self) -> Option<(Transform, Camera)> {
        let entity = self.camera?;
        if !self.is_active(entity) {
            return None;
        }
        let transform = self.world.get::<&Transform>(entity).ok()?;
        let camera = self.world.get::<&Camera>(entity).ok()?;
        Some((*transform, *camera))
    }

    pub fn is_active(&self, entity: Entity) -> bool {
        if !self.world.contains(entity) {
            return false;
        }
        self.world
            .get::<&Active>(entity)
            .map(|a| a.0)
            .unwrap_or(true)
    }

    pub fn set_active(&mut self, entity: Entity, active: bool) {
        if let Err(err) = self.world.insert_one(entity, Active(active)) {
            debug!("Cannot change activity of {:?}: {}", entity, err);
        }
    }

    pub fn despawn(&mut self, entity: Entity) {
        if self.world.despawn(entity).is_ok() && self.camera == Some(entity) {
            self.camera = None;
        }
    }

    pub fn transform_mut(&mut self, entity: Entity) -> Option<hecs::RefMut<'_, Transform>> {
        self.world.get::<&mut Transform>(entity).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn first_camera_is_active() {
        let mut scene = Scene::new();
        let a = scene.spawn_camera("a", Transform::default(), Camera::default());
        let b = scene.spawn_camera("b", Transform::default(), Camera::default());
        assert_eq!(scene.active_camera_entity(), Some(a));
        assert!(scene.set_active_camera(b));
        assert_eq!(scene.active_camera_entity(), Some(b));

        let light = scene.spawn_light("sun", Transform::default(), Light::default());
        assert!(!scene.set_active_camera(light));
    }

    #[test]
    fn inactive_camera_is_not_returned() {
        let mut scene = Scene::new();
        let cam = scene.spawn_camera(
            "cam",
            Transform::from_translation(Vec3::Z),
            Camera::default(),
        );
        assert!(scene.active_camera().is_some());
        scene.set_active(cam, false);
        assert!(scene.active_camera().is_none());
        scene.despawn(cam);
        assert_eq!(scene.active_camera_entity(), None);
    }
}
