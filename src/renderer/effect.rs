// renderer/effect.rs
//! Effects: ordered render passes plus the default values of the shader
//! properties their programs read.

use std::collections::HashMap;

use log::{error, warn};
use serde_json::Value;

use super::device::TextureId;
use super::material::Material;
use super::render_context::RenderContext;
use super::render_state::RenderState;
use super::shader::{PropertySet, ShaderProgram, ShaderProperty};
use crate::asset::{AssetCache, Handle};

pub const QUEUE_BACKGROUND: i32 = 0;
pub const QUEUE_GEOMETRY: i32 = 1000;
pub const QUEUE_ALPHA_TEST: i32 = 2000;
pub const QUEUE_TRANSPARENT: i32 = 3000;
pub const QUEUE_EFFECT: i32 = 4000;

fn queue_from_keyword(keyword: &str) -> Option<i32> {
    match keyword {
        "background" => Some(QUEUE_BACKGROUND),
        "geometry" => Some(QUEUE_GEOMETRY),
        "alphaTest" => Some(QUEUE_ALPHA_TEST),
        "transparent" => Some(QUEUE_TRANSPARENT),
        "effect" => Some(QUEUE_EFFECT),
        _ => None,
    }
}

/// `"keyword"` or `["keyword", offset]`. Unknown keywords mean geometry.
pub fn parse_render_queue(json: &Value) -> i32 {
    let base = |v: &Value| {
        v.as_str()
            .and_then(queue_from_keyword)
            .unwrap_or(QUEUE_GEOMETRY)
    };

    match json {
        Value::String(_) => base(json),
        Value::Array(items) if items.len() >= 2 => {
            let offset = items[1]
                .as_i64()
                .and_then(|o| i32::try_from(o).ok())
                .unwrap_or(0);
            base(&items[0]) + offset
        }
        _ => QUEUE_GEOMETRY,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderType {
    #[default]
    Opaque,
    Cutout,
    Transparent,
}

impl RenderType {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "opaque" => Some(Self::Opaque),
            "cutout" => Some(Self::Cutout),
            "transparent" => Some(Self::Transparent),
            _ => None,
        }
    }
}

/// Which lighting path a pass belongs to. Base passes sort before additive
/// passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum LightMode {
    #[default]
    ForwardBase,
    ForwardAdd,
    Deferred,
    ShadowCast,
}

impl LightMode {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "forwardBase" => Some(Self::ForwardBase),
            "forwardAdd" => Some(Self::ForwardAdd),
            "deferred" => Some(Self::Deferred),
            "shadowCast" => Some(Self::ShadowCast),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pass {
    pub name: String,
    pub light_mode: LightMode,
    pub state: RenderState,
    pub program: Handle<ShaderProgram>,
}

impl Pass {
    /// A pass draws only if its program exists and is good.
    pub fn is_usable(&self, programs: &AssetCache<ShaderProgram>) -> bool {
        programs
            .get(self.program)
            .is_some_and(ShaderProgram::is_good)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Effect {
    name: String,
    render_type: RenderType,
    queue: i32,
    passes: Vec<Pass>,
    by_name: HashMap<String, usize>,
    by_mode: HashMap<LightMode, usize>,
    properties: PropertySet,
}

impl Effect {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue: QUEUE_GEOMETRY,
            ..Self::default()
        }
    }

    /// Builds an effect from its JSON description. Programs and textures are
    /// resolved through the given callbacks; passes whose program cannot be
    /// resolved are dropped.
    pub fn from_json(
        name: impl Into<String>,
        json: &Value,
        program: &mut dyn FnMut(&Value) -> Option<Handle<ShaderProgram>>,
        texture: &mut dyn FnMut(&str) -> Option<TextureId>,
    ) -> Self {
        let mut effect = Self::new(name);

        if let Some(queue) = json.get("renderQueue") {
            effect.queue = parse_render_queue(queue);
        }
        if let Some(keyword) = json.get("renderType").and_then(Value::as_str) {
            match RenderType::from_keyword(keyword) {
                Some(ty) => effect.render_type = ty,
                None => warn!("Effect '{}': unknown render type '{}'", effect.name, keyword),
            }
        }

        for declaration in json
            .get("properties")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            if let Some(property) = ShaderProperty::from_declaration(declaration, texture) {
                effect.properties.insert(property);
            }
        }

        for pass_json in json
            .get("passes")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let name = pass_json
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            let light_mode = match pass_json.get("lightMode").and_then(Value::as_str) {
                Some(keyword) => LightMode::from_keyword(keyword).unwrap_or_else(|| {
                    warn!("Pass '{}': unknown light mode '{}'", name, keyword);
                    LightMode::default()
                }),
                None => LightMode::default(),
            };
            let state = pass_json
                .get("state")
                .map(RenderState::from_json)
                .unwrap_or_default();
            let Some(program) = pass_json.get("program").and_then(|p| program(p)) else {
                warn!("Effect '{}': pass '{}' has no program", effect.name, name);
                continue;
            };

            effect.add_pass(Pass {
                name,
                light_mode,
                state,
                program,
            });
        }

        effect
    }

    /// Appends a pass. Names are unique: a second pass with a known name is
    /// rejected. The first pass of each light mode is the one found by mode.
    pub fn add_pass(&mut self, pass: Pass) -> bool {
        if self.by_name.contains_key(&pass.name) {
            warn!(
                "Effect '{}' already has a pass named '{}'",
                self.name, pass.name
            );
            return false;
        }

        let index = self.passes.len();
        self.by_name.insert(pass.name.clone(), index);
        self.by_mode.entry(pass.light_mode).or_insert(index);
        self.passes.push(pass);
        true
    }

    pub fn add_property(&mut self, property: ShaderProperty) {
        self.properties.insert(property);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render_type(&self) -> RenderType {
        self.render_type
    }

    pub fn set_render_type(&mut self, render_type: RenderType) {
        self.render_type = render_type;
    }

    pub fn queue_priority(&self) -> i32 {
        self.queue
    }

    pub fn set_queue_priority(&mut self, queue: i32) {
        self.queue = queue;
    }

    pub fn pass(&self, index: usize) -> Option<&Pass> {
        self.passes.get(index)
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    pub fn pass_index_by_mode(&self, mode: LightMode) -> Option<usize> {
        self.by_mode.get(&mode).copied()
    }

    pub fn pass_by_mode(&self, mode: LightMode) -> Option<&Pass> {
        self.pass_index_by_mode(mode).map(|i| &self.passes[i])
    }

    pub fn pass_index_by_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn pass_by_name(&self, name: &str) -> Option<&Pass> {
        self.pass_index_by_name(name).map(|i| &self.passes[i])
    }

    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    /// Writes every effect property to `program`, taking the material's value
    /// when it has one of the same type and the effect default otherwise.
    pub fn apply_properties(
        &self,
        program: &ShaderProgram,
        material: Option<&Material>,
        ctx: &mut RenderContext<'_>,
    ) {
        for default in self.properties.iter() {
            let resolved = material
                .and_then(|m| m.properties().get(default.id()))
                .filter(|p| p.value_type() == default.value_type())
                .unwrap_or(default);
            resolved.apply(program, ctx);
        }
    }

    /// Logs every pass whose program is unusable. Returns how many there are.
    pub fn report_unusable_passes(&self, programs: &AssetCache<ShaderProgram>) -> usize {
        let mut count = 0;
        for pass in &self.passes {
            if pass.is_usable(programs) {
                continue;
            }
            count += 1;
            match programs.get(pass.program) {
                Some(program) => error!(
                    "Effect '{}': shader program '{}' has errors (pass '{}'):\n{}",
                    self.name,
                    program.name(),
                    pass.name,
                    program.log()
                ),
                None => error!(
                    "Effect '{}': pass '{}' references a missing program",
                    self.name, pass.name
                ),
            }
        }
        count
    }
}
