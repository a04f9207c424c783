use glam::{Vec3, Vec4};
use log::warn;
use serde_json::Value;

use super::device::GraphicsDevice;
use super::json;
use super::shader::{ShaderProgram, ShaderValue};
use super::uniforms::builtin;
use crate::scene::Transform;

/// Declaration order is the light queue order: directional lights first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LightType {
    Directional,
    Point,
    Spot,
}

impl LightType {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "directional" => Some(Self::Directional),
            "point" => Some(Self::Point),
            "spot" => Some(Self::Spot),
            _ => None,
        }
    }
}

/// Light component. Position and direction come from the entity transform;
/// lights shine along their local -Z axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub light_type: LightType,
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
    /// Cone half angle in degrees.
    pub spot_angle: f32,
    /// Fraction of the cone where the falloff starts.
    pub spot_falloff: f32,
    pub priority: i32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            light_type: LightType::Directional,
            color: Vec3::ONE,
            intensity: 1.0,
            range: 10.0,
            spot_angle: 15.0,
            spot_falloff: 0.5,
            priority: 0,
        }
    }
}

impl Light {
    pub fn directional(color: Vec3, intensity: f32) -> Self {
        Self {
            color,
            intensity,
            ..Self::default()
        }
    }

    pub fn point(color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            light_type: LightType::Point,
            color,
            intensity,
            range,
            ..Self::default()
        }
    }

    pub fn spot(color: Vec3, intensity: f32, range: f32, angle: f32) -> Self {
        Self {
            light_type: LightType::Spot,
            color,
            intensity,
            range,
            spot_angle: angle,
            ..Self::default()
        }
    }

    pub fn from_json(json: &Value) -> Self {
        let mut light = Self::default();

        if let Some(keyword) = json.get("lightType").and_then(Value::as_str) {
            match LightType::from_keyword(keyword) {
                Some(ty) => light.light_type = ty,
                None => warn!("Unknown light type '{}'", keyword),
            }
        }
        if let Some(color) = json.get("color").and_then(json::parse_color) {
            light.color = color.truncate();
        }
        if let Some(v) = json::float(json, "intensity") {
            light.intensity = v;
        }
        if let Some(v) = json::float(json, "range") {
            light.range = v;
        }
        if let Some(v) = json::float(json, "spotAngle") {
            light.spot_angle = v;
        }
        if let Some(v) = json::float(json, "spotFalloff") {
            light.spot_falloff = v;
        }
        if let Some(v) = json.get("priority").and_then(Value::as_i64) {
            light.priority = v as i32;
        }

        light
    }

    /// A light without range or intensity contributes nothing.
    pub fn is_visible(&self) -> bool {
        self.range > 0.0 && self.intensity > 0.0
    }

    pub fn uniforms(&self, transform: &Transform) -> LightUniforms {
        let forward = transform.forward();
        let mut uniforms = LightUniforms {
            color: (self.color * self.intensity).extend(1.0),
            dir: Vec4::ZERO,
            atten: Vec4::ZERO,
            spot: Vec4::new(0.0, 0.0, 0.0, -1.0),
        };

        if self.light_type == LightType::Directional {
            uniforms.dir = forward.extend(0.0);
        } else {
            uniforms.dir = transform.translation.extend(1.0);
            uniforms.atten.x = self.range * self.range;
        }

        if self.light_type == LightType::Spot {
            let cos_angle = self.spot_angle.to_radians().cos();
            let cos_falloff = (self.spot_angle * self.spot_falloff).to_radians().cos();
            uniforms.spot = forward.extend(cos_angle);
            uniforms.atten.y = cos_falloff;
            uniforms.atten.z = 1.0 / (cos_angle - cos_falloff);
        }

        uniforms
    }
}

/// Values of the `cm_light_*` uniforms for one light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightUniforms {
    pub color: Vec4,
    /// Direction (w = 0) or position (w = 1).
    pub dir: Vec4,
    /// Squared range, falloff cosine, inverse falloff width.
    pub atten: Vec4,
    /// Spot direction and cone cosine; w = -1 for non-spot lights.
    pub spot: Vec4,
}

impl LightUniforms {
    /// Black light, written for base passes that have no light to show.
    pub const NONE: Self = Self {
        color: Vec4::ZERO,
        dir: Vec4::ZERO,
        atten: Vec4::ZERO,
        spot: Vec4::new(0.0, 0.0, 0.0, -1.0),
    };

    pub fn apply(&self, program: &ShaderProgram, device: &mut dyn GraphicsDevice) {
        program.set_uniform(device, builtin::CM_LIGHT_COLOR, &ShaderValue::Vec4(self.color));
        program.set_uniform(device, builtin::CM_LIGHT_DIR, &ShaderValue::Vec4(self.dir));
        program.set_uniform(device, builtin::CM_LIGHT_ATTEN, &ShaderValue::Vec4(self.atten));
        program.set_uniform(device, builtin::CM_LIGHT_SPOT, &ShaderValue::Vec4(self.spot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use serde_json::json;

    #[test]
    fn defaults_match_component_defaults() {
        let light = Light::default();
        assert_eq!(light.light_type, LightType::Directional);
        assert_eq!(light.range, 10.0);
        assert_eq!(light.spot_angle, 15.0);
        assert!(light.is_visible());
        assert!(!Light { intensity: 0.0, ..light }.is_visible());
        assert!(!Light { range: 0.0, ..light }.is_visible());
    }

    #[test]
    fn directional_uniforms_use_forward_axis() {
        let light = Light::directional(Vec3::new(1.0, 0.5, 0.25), 2.0);
        let transform = Transform::default();
        let u = light.uniforms(&transform);
        assert_eq!(u.color, Vec4::new(2.0, 1.0, 0.5, 1.0));
        assert_eq!(u.dir, Vec4::new(0.0, 0.0, -1.0, 0.0));
        assert_eq!(u.spot.w, -1.0);
        assert_eq!(u.atten, Vec4::ZERO);
    }

    #[test]
    fn spot_uniforms_encode_cone() {
        let light = Light::spot(Vec3::ONE, 1.0, 4.0, 30.0);
        let transform = Transform::from_trs(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            Vec3::ONE,
        );
        let u = light.uniforms(&transform);

        assert_eq!(u.dir, Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(u.atten.x, 16.0);
        let ca = 30f32.to_radians().cos();
        let cf = 15f32.to_radians().cos();
        assert!((u.spot.w - ca).abs() < 1e-6);
        assert!((u.atten.y - cf).abs() < 1e-6);
        assert!((u.atten.z - 1.0 / (ca - cf)).abs() < 1e-3);
        assert!(u.spot.truncate().abs_diff_eq(Vec3::NEG_X, 1e-6));
    }

    #[test]
    fn json_overrides_fields() {
        let light = Light::from_json(&json!({
            "lightType": "point",
            "color": [1.0, 0.0, 0.0],
            "range": 3.5,
            "priority": 2
        }));
        assert_eq!(light.light_type, LightType::Point);
        assert_eq!(light.color, Vec3::X);
        assert_eq!(light.range, 3.5);
        assert_eq!(light.priority, 2);
        assert_eq!(light.intensity, 1.0);
    }
}
