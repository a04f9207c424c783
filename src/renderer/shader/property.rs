// renderer/shader/property.rs

use std::collections::HashMap;

use log::warn;
use serde_json::Value;

use super::value::{ShaderValue, ValueType};
use super::{uniform_id, ShaderProgram, UniformId};
use crate::renderer::device::TextureId;
use crate::renderer::render_context::RenderContext;

/// A named uniform value. The value's type is fixed at construction; only
/// [`ShaderProperty::replace`] may change it.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderProperty {
    name: String,
    id: UniformId,
    value: ShaderValue,
}

impl ShaderProperty {
    pub fn new(name: impl Into<String>, value: impl Into<ShaderValue>) -> Self {
        let name = name.into();
        Self {
            id: uniform_id(&name),
            name,
            value: value.into(),
        }
    }

    /// Builds a property from a `{ "name", "type", "default" }` declaration.
    /// A missing or malformed default falls back to the type's zero value.
    pub fn from_declaration(
        json: &Value,
        texture: &mut dyn FnMut(&str) -> Option<TextureId>,
    ) -> Option<Self> {
        let name = json.get("name")?.as_str()?;
        let type_name = json.get("type")?.as_str()?;
        let Some(ty) = ValueType::from_name(type_name) else {
            warn!("Property '{}' has unknown type '{}'", name, type_name);
            return None;
        };

        let value = match json.get("default") {
            Some(default) => ShaderValue::from_json(ty, default, texture).unwrap_or_else(|| {
                warn!("Invalid default for property '{}' ({})", name, type_name);
                ShaderValue::default_of(ty)
            }),
            None => ShaderValue::default_of(ty),
        };

        Some(Self::new(name, value))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> UniformId {
        self.id
    }

    pub fn value(&self) -> &ShaderValue {
        &self.value
    }

    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }

    /// Stores `value` if it has the property's type. Returns whether it did.
    pub fn set(&mut self, value: impl Into<ShaderValue>) -> bool {
        let value = value.into();
        if value.value_type() != self.value_type() {
            return false;
        }
        self.value = value;
        true
    }

    /// Stores `value` regardless of type.
    pub fn replace(&mut self, value: impl Into<ShaderValue>) {
        self.value = value.into();
    }

    /// Parses `json` as the property's current type.
    pub fn assign_json(
        &mut self,
        json: &Value,
        texture: &mut dyn FnMut(&str) -> Option<TextureId>,
    ) -> bool {
        match ShaderValue::from_json(self.value_type(), json, texture) {
            Some(value) => {
                self.value = value;
                true
            }
            None => false,
        }
    }

    pub fn apply(&self, program: &ShaderProgram, ctx: &mut RenderContext<'_>) {
        self.value.apply(self.id, program, ctx);
    }
}

/// Insertion-ordered set of properties keyed by uniform id.
#[derive(Debug, Clone, Default)]
pub struct PropertySet {
    properties: Vec<ShaderProperty>,
    index: HashMap<UniformId, usize>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the property with the same id.
    pub fn insert(&mut self, property: ShaderProperty) {
        match self.index.get(&property.id) {
            Some(&i) => self.properties[i] = property,
            None => {
                self.index.insert(property.id, self.properties.len());
                self.properties.push(property);
            }
        }
    }

    pub fn get(&self, id: UniformId) -> Option<&ShaderProperty> {
        self.index.get(&id).map(|&i| &self.properties[i])
    }

    pub fn get_mut(&mut self, id: UniformId) -> Option<&mut ShaderProperty> {
        self.index.get(&id).map(|&i| &mut self.properties[i])
    }

    pub fn get_by_name(&self, name: &str) -> Option<&ShaderProperty> {
        self.get(uniform_id(name))
    }

    pub fn contains(&self, id: UniformId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShaderProperty> {
        self.properties.iter()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use serde_json::json;

    #[test]
    fn set_refuses_other_types() {
        let mut p = ShaderProperty::new("gloss", 0.5f32);
        assert!(!p.set(Vec3::ONE));
        assert_eq!(p.value(), &ShaderValue::Float(0.5));
        assert!(p.set(0.25f32));
        assert_eq!(p.value(), &ShaderValue::Float(0.25));

        p.replace(Vec3::ONE);
        assert_eq!(p.value_type(), ValueType::Vec3);
    }

    #[test]
    fn declarations_parse_defaults() {
        let decl = json!({ "name": "tint", "type": "vec4", "default": [1, 0, 0, 1] });
        let p = ShaderProperty::from_declaration(&decl, &mut |_| None).unwrap();
        assert_eq!(p.name(), "tint");
        assert_eq!(p.id(), uniform_id("tint"));
        assert_eq!(p.value_type(), ValueType::Vec4);

        let decl = json!({ "name": "count", "type": "int", "default": "many" });
        let p = ShaderProperty::from_declaration(&decl, &mut |_| None).unwrap();
        assert_eq!(p.value(), &ShaderValue::Int(0));

        let decl = json!({ "name": "x", "type": "quaternion" });
        assert!(ShaderProperty::from_declaration(&decl, &mut |_| None).is_none());
    }

    #[test]
    fn set_keeps_insertion_order_and_replaces_by_id() {
        let mut set = PropertySet::new();
        set.insert(ShaderProperty::new("a", 1.0f32));
        set.insert(ShaderProperty::new("b", 2.0f32));
        set.insert(ShaderProperty::new("a", 3i32));

        let names: Vec<_> = set.iter().map(|p| p.name()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(set.get_by_name("a").unwrap().value(), &ShaderValue::Int(3));
    }
}
