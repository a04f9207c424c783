use glam::{Mat4, Quat, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn from_trs(t: Vec3, r: Quat, s: Vec3) -> Self {
        Self {
            translation: t,
            rotation: r,
            scale: s,
        }
    }

    pub fn from_translation(t: Vec3) -> Self {
        Self {
            translation: t,
            ..Self::default()
        }
    }

    /// Rotation and translation only.
    pub fn rigid(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.translation)
    }

    /// Inverse of [`Transform::rigid`]; the view matrix of a camera.
    pub fn inverse_rigid(&self) -> Mat4 {
        let inv = self.rotation.inverse();
        Mat4::from_rotation_translation(inv, inv * -self.translation)
    }

    /// Local -Z in world space.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn looking_at(mut self, target: Vec3, up: Vec3) -> Self {
        let view = Mat4::look_at_rh(self.translation, target, up);
        self.rotation = Quat::from_mat4(&view.inverse());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn default_is_identity() {
        let m = Transform::default().matrix();
        assert!(m.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn translate_then_scale_ok() {
        let tr = Transform::from_trs(Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY, Vec3::splat(2.0));
        let p = tr.matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!(p.abs_diff_eq(Vec3::new(3.0, 2.0, 3.0), 1e-6));
    }

    #[test]
    fn inverse_rigid_ignores_scale() {
        let tr = Transform::from_trs(
            Vec3::new(4.0, -1.0, 2.0),
            Quat::from_rotation_y(0.7),
            Vec3::splat(3.0),
        );
        assert!((tr.inverse_rigid() * tr.rigid()).abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn looking_at_points_forward_at_target() {
        let tr = Transform::from_translation(Vec3::new(0.0, 0.0, 5.0))
            .looking_at(Vec3::new(5.0, 0.0, 5.0), Vec3::Y);
        assert!(tr.forward().abs_diff_eq(Vec3::X, 1e-5));
    }
}
