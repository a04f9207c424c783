use glam::Mat4;
use serde_json::Value;

use crate::renderer::json;

/// Perspective camera component. The view comes from the entity transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn projection(&self, width: u32, height: u32) -> Mat4 {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        Mat4::perspective_rh_gl(self.fov.to_radians(), aspect, self.near, self.far)
    }

    pub fn from_json(json: &Value) -> Self {
        let mut camera = Self::default();
        if let Some(fov) = json::float(json, "fov") {
            camera.fov = fov;
        }
        if let Some(near) = json::float(json, "nearPlane") {
            camera.near = near;
        }
        if let Some(far) = json::float(json, "farPlane") {
            camera.far = far;
        }
        camera
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov: 60.0,
            near: 0.1,
            far: 100.0,
        }
    }
}
