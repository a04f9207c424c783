use log::debug;
use serde_json::Value;

use super::device::TextureId;
use super::effect::Effect;
use super::shader::{uniform_id, PropertySet, ShaderProperty, ShaderValue};
use crate::asset::Handle;

/// Per-object overrides of an effect's property defaults.
#[derive(Debug, Clone, Default)]
pub struct Material {
    name: String,
    effect: Option<Handle<Effect>>,
    properties: PropertySet,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn effect(&self) -> Option<Handle<Effect>> {
        self.effect
    }

    /// Switches to `effect` and merges in its defaults. Existing values are
    /// kept when their type still matches the effect's declaration and
    /// refreshed otherwise.
    pub fn set_effect(&mut self, handle: Handle<Effect>, effect: &Effect) {
        self.effect = Some(handle);

        for default in effect.properties().iter() {
            let keep = self
                .properties
                .get(default.id())
                .is_some_and(|p| p.value_type() == default.value_type());
            if !keep {
                self.properties.insert(default.clone());
            }
        }
    }

    pub fn clear_effect(&mut self) {
        self.effect = None;
    }

    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&ShaderProperty> {
        self.properties.get_by_name(name)
    }

    /// Sets a known property if `value` has its type, or adds a new one.
    /// Returns false when the type does not match.
    pub fn set(&mut self, name: &str, value: impl Into<ShaderValue>) -> bool {
        match self.properties.get_mut(uniform_id(name)) {
            Some(property) => property.set(value),
            None => {
                self.properties.insert(ShaderProperty::new(name, value));
                true
            }
        }
    }

    /// Stores `property` as is, replacing any property with the same id
    /// whatever its type.
    pub fn set_property(&mut self, property: ShaderProperty) {
        self.properties.insert(property);
    }

    /// Assigns values from a `{ name: value }` object. Only properties the
    /// material already has are assigned, each parsed as its current type.
    pub fn assign_json(
        &mut self,
        json: &Value,
        texture: &mut dyn FnMut(&str) -> Option<TextureId>,
    ) {
        let Some(values) = json.as_object() else {
            return;
        };

        for (name, value) in values {
            match self.properties.get_mut(uniform_id(name)) {
                Some(property) => {
                    if !property.assign_json(value, texture) {
                        debug!(
                            "Material '{}': value for '{}' is not a {}",
                            self.name,
                            name,
                            property.value_type().name()
                        );
                    }
                }
                None => debug!("Material '{}': unknown property '{}'", self.name, name),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::device::HeadlessDevice;
    use crate::renderer::render_context::RenderContext;
    use crate::renderer::shader::{preprocess, Shader, ShaderProgram};
    use crate::renderer::texture_units::TextureUnitManager;
    use glam::{Vec3, Vec4};
    use serde_json::json;

    fn no_textures(_: &str) -> Option<TextureId> {
        None
    }

    fn no_includes(_: &str) -> Option<String> {
        None
    }

    fn effect_with_gloss() -> Effect {
        let mut effect = Effect::new("shiny");
        effect.add_property(ShaderProperty::new("gloss", 1.0f32));
        effect.add_property(ShaderProperty::new("tint", Vec4::ONE));
        effect
    }

    #[test]
    fn set_effect_keeps_matching_overrides() {
        let effect = effect_with_gloss();
        let mut material = Material::new("m");
        material.set("gloss", 0.25f32);
        material.set_property(ShaderProperty::new("tint", Vec3::ZERO));

        material.set_effect(Handle::new(0), &effect);

        assert_eq!(
            material.property("gloss").map(|p| *p.value()),
            Some(ShaderValue::Float(0.25))
        );
        // the stale vec3 was refreshed to the effect's vec4 default
        assert_eq!(
            material.property("tint").map(|p| *p.value()),
            Some(ShaderValue::Vec4(Vec4::ONE))
        );
    }

    #[test]
    fn assign_json_only_touches_known_properties() {
        let effect = effect_with_gloss();
        let mut material = Material::new("m");
        material.set_effect(Handle::new(0), &effect);

        material.assign_json(
            &json!({ "gloss": 0.5, "tint": "not a colour", "extra": 3 }),
            &mut no_textures,
        );

        assert_eq!(
            material.property("gloss").map(|p| *p.value()),
            Some(ShaderValue::Float(0.5))
        );
        assert_eq!(
            material.property("tint").map(|p| *p.value()),
            Some(ShaderValue::Vec4(Vec4::ONE))
        );
        assert!(material.property("extra").is_none());
    }

    #[test]
    fn apply_properties_falls_back_on_type_mismatch() {
        let mut device = HeadlessDevice::new();
        let mut units = TextureUnitManager::new();
        let source = preprocess(
            "fs",
            "#pragma type fragment\nuniform float gloss;\nvoid main() {}",
            &no_includes,
        )
        .unwrap();
        let shader = Shader::compile(&mut device, "fs", &source);
        let program = ShaderProgram::link(&mut device, "p", &[&shader]);
        program.bind(&mut device);

        let mut effect = Effect::new("e");
        effect.add_property(ShaderProperty::new("gloss", 1.0f32));

        let mut material = Material::new("m");
        material.set_property(ShaderProperty::new("gloss", Vec3::ONE));

        let mut ctx = RenderContext::new(&mut device, &mut units);
        effect.apply_properties(&program, Some(&material), &mut ctx);
        assert_eq!(
            device.uniform_value(program.handle(), "gloss"),
            Some(&ShaderValue::Float(1.0))
        );

        material.set_property(ShaderProperty::new("gloss", 0.5f32));
        let mut ctx = RenderContext::new(&mut device, &mut units);
        effect.apply_properties(&program, Some(&material), &mut ctx);
        assert_eq!(
            device.uniform_value(program.handle(), "gloss"),
            Some(&ShaderValue::Float(0.5))
        );
    }
}
