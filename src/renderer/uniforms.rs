// renderer/uniforms.rs
use glam::{Mat4, Vec3, Vec4};

use super::device::GraphicsDevice;
use super::shader::{ShaderProgram, ShaderValue};

/// Ids of the uniforms the engine writes itself.
pub mod builtin {
    use crate::renderer::shader::{uniform_id, UniformId};

    pub const CM_MAT_PROJ: UniformId = uniform_id("cm_mat_proj");
    pub const CM_MAT_VIEW: UniformId = uniform_id("cm_mat_view");
    pub const CM_MAT_WORLD: UniformId = uniform_id("cm_mat_world");
    pub const CM_MAT_TIWORLD: UniformId = uniform_id("cm_mat_tiworld");
    pub const CM_MAT_VP: UniformId = uniform_id("cm_mat_vp");
    pub const CM_MAT_IVP: UniformId = uniform_id("cm_mat_ivp");
    pub const CM_MAT_WVP: UniformId = uniform_id("cm_mat_wvp");
    pub const CM_CAM_POS: UniformId = uniform_id("cm_cam_pos");

    pub const CM_LIGHT_AMBIENT: UniformId = uniform_id("cm_light_ambient");
    pub const CM_LIGHT_COLOR: UniformId = uniform_id("cm_light_color");
    pub const CM_LIGHT_DIR: UniformId = uniform_id("cm_light_dir");
    pub const CM_LIGHT_SPOT: UniformId = uniform_id("cm_light_spot");
    pub const CM_LIGHT_ATTEN: UniformId = uniform_id("cm_light_atten");

    pub const TRANSFORM: UniformId = uniform_id("transform");
    pub const GBUF_DIFFUSE: UniformId = uniform_id("gbuf_diffuse");
    pub const GBUF_SPEC_SMOOTH: UniformId = uniform_id("gbuf_specSmooth");
    pub const GBUF_NORMAL: UniformId = uniform_id("gbuf_normal");
    pub const GBUF_DEPTH: UniformId = uniform_id("gbuf_depth");

    pub const MODE: UniformId = uniform_id("mode");
    pub const NEAR_PLANE: UniformId = uniform_id("nearPlane");
    pub const FAR_PLANE: UniformId = uniform_id("farPlane");

    pub const IMG_SOURCE: UniformId = uniform_id("img_source");
    pub const IMG_RESOLUTION: UniformId = uniform_id("img_resolution");
}

/// Camera matrices, computed once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    pub proj: Mat4,
    pub view: Mat4,
    pub view_proj: Mat4,
    pub inverse_view_proj: Mat4,
    pub camera_pos: Vec3,
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO)
    }
}

impl FrameUniforms {
    pub fn new(proj: Mat4, view: Mat4, camera_pos: Vec3) -> Self {
        let view_proj = proj * view;
        Self {
            proj,
            view,
            view_proj,
            inverse_view_proj: view_proj.inverse(),
            camera_pos,
        }
    }

    pub fn apply(&self, program: &ShaderProgram, device: &mut dyn GraphicsDevice) {
        program.set_uniform(device, builtin::CM_MAT_PROJ, &ShaderValue::Mat4(self.proj));
        program.set_uniform(device, builtin::CM_MAT_VIEW, &ShaderValue::Mat4(self.view));
        program.set_uniform(device, builtin::CM_MAT_VP, &ShaderValue::Mat4(self.view_proj));
        program.set_uniform(
            device,
            builtin::CM_MAT_IVP,
            &ShaderValue::Mat4(self.inverse_view_proj),
        );
        program.set_uniform(device, builtin::CM_CAM_POS, &ShaderValue::Vec3(self.camera_pos));
    }
}

/// World-dependent matrices of one draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectUniforms {
    pub world: Mat4,
    pub ti_world: Mat4,
    pub wvp: Mat4,
}

impl ObjectUniforms {
    pub fn new(world: Mat4, frame: &FrameUniforms) -> Self {
        Self {
            world,
            ti_world: world.inverse().transpose(),
            wvp: frame.view_proj * world,
        }
    }

    pub fn apply(&self, program: &ShaderProgram, device: &mut dyn GraphicsDevice) {
        program.set_uniform(device, builtin::CM_MAT_WORLD, &ShaderValue::Mat4(self.world));
        program.set_uniform(device, builtin::CM_MAT_TIWORLD, &ShaderValue::Mat4(self.ti_world));
        program.set_uniform(device, builtin::CM_MAT_WVP, &ShaderValue::Mat4(self.wvp));
    }
}

pub fn apply_ambient(program: &ShaderProgram, device: &mut dyn GraphicsDevice, ambient: Vec4) {
    program.set_uniform(device, builtin::CM_LIGHT_AMBIENT, &ShaderValue::Vec4(ambient));
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn inverse_view_proj_round_trips() {
        let proj = Mat4::perspective_rh_gl(1.0, 1.5, 0.1, 50.0);
        let view = Mat4::look_at_rh(Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO, Vec3::Y);
        let frame = FrameUniforms::new(proj, view, Vec3::new(1.0, 2.0, 3.0));
        assert!((frame.view_proj * frame.inverse_view_proj).abs_diff_eq(Mat4::IDENTITY, 1e-4));
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let world = Mat4::from_scale_rotation_translation(
            Vec3::new(2.0, 1.0, 1.0),
            Quat::IDENTITY,
            Vec3::new(0.0, 5.0, 0.0),
        );
        let object = ObjectUniforms::new(world, &FrameUniforms::default());
        let n = object.ti_world.transform_vector3(Vec3::new(1.0, 1.0, 0.0));
        assert!(n.abs_diff_eq(Vec3::new(0.5, 1.0, 0.0), 1e-6));
        assert!(object.wvp.abs_diff_eq(world, 1e-6));
    }

    #[test]
    fn builtin_names_hash_distinctly() {
        let ids = [
            builtin::CM_MAT_WORLD,
            builtin::CM_MAT_WVP,
            builtin::CM_LIGHT_DIR,
            builtin::GBUF_DEPTH,
            builtin::IMG_SOURCE,
            builtin::TRANSFORM,
        ];
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
