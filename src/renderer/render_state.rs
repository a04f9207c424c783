// renderer/render_state.rs
//! Fixed-function state carried by every effect pass.
//!
//! A [`RenderState`] is a plain value. The engine keeps the last state it
//! pushed and moves to the next one with [`RenderState::differential_apply`],
//! which only touches the categories that actually changed.

use glam::Vec4;
use log::warn;
use serde_json::Value;

use super::device::{Capability, GraphicsDevice};
use super::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    Back,
    Front,
    FrontAndBack,
}

impl CullMode {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "back" => Some(Self::Back),
            "front" => Some(Self::Front),
            "frontAndBack" => Some(Self::FrontAndBack),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl CompareFunction {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "never" => Some(Self::Never),
            "less" => Some(Self::Less),
            "equal" => Some(Self::Equal),
            "lequal" => Some(Self::LessEqual),
            "greater" => Some(Self::Greater),
            "notEqual" => Some(Self::NotEqual),
            "gequal" => Some(Self::GreaterEqual),
            "always" => Some(Self::Always),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    DstColor,
    OneMinusDstColor,
    SrcAlphaSaturate,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
}

impl BlendFactor {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "zero" => Some(Self::Zero),
            "one" => Some(Self::One),
            "srcColor" => Some(Self::SrcColor),
            "oneMinusSrcColor" => Some(Self::OneMinusSrcColor),
            "srcAlpha" => Some(Self::SrcAlpha),
            "oneMinusSrcAlpha" => Some(Self::OneMinusSrcAlpha),
            "dstAlpha" => Some(Self::DstAlpha),
            "oneMinusDstAlpha" => Some(Self::OneMinusDstAlpha),
            "dstColor" => Some(Self::DstColor),
            "oneMinusDstColor" => Some(Self::OneMinusDstColor),
            "srcAlphaSaturate" => Some(Self::SrcAlphaSaturate),
            "constantColor" => Some(Self::ConstantColor),
            "oneMinusConstantColor" => Some(Self::OneMinusConstantColor),
            "constantAlpha" => Some(Self::ConstantAlpha),
            "oneMinusConstantAlpha" => Some(Self::OneMinusConstantAlpha),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendEquation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

impl BlendEquation {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "add" => Some(Self::Add),
            "subtract" => Some(Self::Subtract),
            "reverseSubtract" => Some(Self::ReverseSubtract),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    pub cull_enabled: bool,
    pub cull_mode: CullMode,

    pub depth_write: bool,

    pub depth_offset_factor: f32,
    pub depth_offset_units: f32,

    pub depth_test_enabled: bool,
    pub depth_function: CompareFunction,

    pub blend_enabled: bool,
    pub blend_source: BlendFactor,
    pub blend_dest: BlendFactor,
    pub blend_source_alpha: BlendFactor,
    pub blend_dest_alpha: BlendFactor,
    pub blend_equation: BlendEquation,
    pub blend_equation_alpha: BlendEquation,
    pub blend_color: Vec4,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            cull_enabled: true,
            cull_mode: CullMode::Back,
            depth_write: true,
            depth_offset_factor: 0.0,
            depth_offset_units: 0.0,
            depth_test_enabled: true,
            depth_function: CompareFunction::Less,
            blend_enabled: false,
            blend_source: BlendFactor::One,
            blend_dest: BlendFactor::Zero,
            blend_source_alpha: BlendFactor::One,
            blend_dest_alpha: BlendFactor::Zero,
            blend_equation: BlendEquation::Add,
            blend_equation_alpha: BlendEquation::Add,
            blend_color: Vec4::ZERO,
        }
    }
}

impl RenderState {
    /// State used for full-screen blits: everything that could reject a
    /// fragment is off.
    pub fn fullscreen() -> Self {
        Self {
            cull_enabled: false,
            depth_write: false,
            depth_test_enabled: false,
            ..Self::default()
        }
    }

    pub fn from_json(json: &Value) -> Self {
        let mut state = Self::default();
        state.apply_json(json);
        state
    }

    /// Pushes every category. Parameters of a disabled category are left
    /// untouched on the device.
    pub fn apply(&self, device: &mut dyn GraphicsDevice) {
        self.apply_culling(device);
        self.apply_depth_write(device);
        self.apply_depth_offset(device);
        self.apply_depth_test(device);
        self.apply_blending(device);
    }

    /// Moves the device from `previous` to `self`, pushing only what changed.
    ///
    /// `previous` must describe what the device currently holds. Parameters
    /// of a category are re-sent whenever the category becomes enabled, since
    /// they were not tracked on the device while it was off.
    pub fn differential_apply(&self, previous: &RenderState, device: &mut dyn GraphicsDevice) {
        // culling
        if previous.cull_enabled != self.cull_enabled {
            device.set_capability(Capability::CullFace, self.cull_enabled);
        }
        if self.cull_enabled && (!previous.cull_enabled || previous.cull_mode != self.cull_mode) {
            device.cull_face(self.cull_mode);
        }

        if previous.depth_write != self.depth_write {
            self.apply_depth_write(device);
        }

        if previous.depth_offset_factor != self.depth_offset_factor
            || previous.depth_offset_units != self.depth_offset_units
        {
            self.apply_depth_offset(device);
        }

        // depth test
        if previous.depth_test_enabled != self.depth_test_enabled {
            device.set_capability(Capability::DepthTest, self.depth_test_enabled);
        }
        if self.depth_test_enabled
            && (!previous.depth_test_enabled || previous.depth_function != self.depth_function)
        {
            device.depth_func(self.depth_function);
        }

        // blending
        if previous.blend_enabled != self.blend_enabled {
            device.set_capability(Capability::Blend, self.blend_enabled);
        }
        if self.blend_enabled {
            let refresh = !previous.blend_enabled;

            if refresh || previous.blend_color != self.blend_color {
                device.blend_color(self.blend_color);
            }

            if refresh
                || previous.blend_equation != self.blend_equation
                || previous.blend_equation_alpha != self.blend_equation_alpha
            {
                device.blend_equation_separate(self.blend_equation, self.blend_equation_alpha);
            }

            if refresh
                || previous.blend_source != self.blend_source
                || previous.blend_dest != self.blend_dest
                || previous.blend_source_alpha != self.blend_source_alpha
                || previous.blend_dest_alpha != self.blend_dest_alpha
            {
                self.apply_blend_function(device);
            }
        }
    }

    fn apply_culling(&self, device: &mut dyn GraphicsDevice) {
        device.set_capability(Capability::CullFace, self.cull_enabled);
        if self.cull_enabled {
            device.cull_face(self.cull_mode);
        }
    }

    fn apply_depth_write(&self, device: &mut dyn GraphicsDevice) {
        device.depth_mask(self.depth_write);
    }

    fn apply_depth_offset(&self, device: &mut dyn GraphicsDevice) {
        device.polygon_offset(self.depth_offset_factor, self.depth_offset_units);
    }

    fn apply_depth_test(&self, device: &mut dyn GraphicsDevice) {
        device.set_capability(Capability::DepthTest, self.depth_test_enabled);
        if self.depth_test_enabled {
            device.depth_func(self.depth_function);
        }
    }

    fn apply_blending(&self, device: &mut dyn GraphicsDevice) {
        device.set_capability(Capability::Blend, self.blend_enabled);
        if self.blend_enabled {
            device.blend_color(self.blend_color);
            device.blend_equation_separate(self.blend_equation, self.blend_equation_alpha);
            self.apply_blend_function(device);
        }
    }

    fn apply_blend_function(&self, device: &mut dyn GraphicsDevice) {
        device.blend_func_separate(
            self.blend_source,
            self.blend_dest,
            self.blend_source_alpha,
            self.blend_dest_alpha,
        );
    }

    /// Overrides the fields present in `json`; unknown keys and malformed
    /// values are ignored with a warning.
    pub fn apply_json(&mut self, json: &Value) {
        if let Some(cull) = json.get("cull") {
            match cull {
                Value::Bool(enabled) => self.cull_enabled = *enabled,
                Value::String(keyword) => match CullMode::from_keyword(keyword) {
                    Some(mode) => {
                        self.cull_mode = mode;
                        self.cull_enabled = true;
                    }
                    None => {
                        warn!("Unknown cull mode '{}'", keyword);
                        self.cull_enabled = false;
                    }
                },
                _ => warn!("Ignoring malformed 'cull' value {}", cull),
            }
        }

        if let Some(test) = json.get("depthTest") {
            match test {
                Value::Bool(enabled) => self.depth_test_enabled = *enabled,
                Value::String(keyword) => match CompareFunction::from_keyword(keyword) {
                    Some(func) => {
                        self.depth_function = func;
                        self.depth_test_enabled = true;
                    }
                    None => {
                        warn!("Unknown depth compare function '{}'", keyword);
                        self.depth_test_enabled = false;
                    }
                },
                _ => warn!("Ignoring malformed 'depthTest' value {}", test),
            }
        }

        if let Some(write) = json.get("depthWrite").and_then(Value::as_bool) {
            self.depth_write = write;
        }

        if let Some(offset) = json.get("depthOffset").and_then(Value::as_array) {
            if let Some(factor) = offset.first().and_then(Value::as_f64) {
                self.depth_offset_factor = factor as f32;
            }
            if let Some(units) = offset.get(1).and_then(Value::as_f64) {
                self.depth_offset_units = units as f32;
            }
        }

        if let Some(blend) = json.get("blend") {
            match blend {
                Value::Bool(enabled) => self.blend_enabled = *enabled,
                Value::Object(_) => self.apply_blend_json(blend),
                _ => warn!("Ignoring malformed 'blend' value {}", blend),
            }
        }
    }

    fn apply_blend_json(&mut self, blend: &Value) {
        let factor = |key: &str| -> Option<BlendFactor> {
            let keyword = blend.get(key)?.as_str()?;
            let parsed = BlendFactor::from_keyword(keyword);
            if parsed.is_none() {
                warn!("Unknown blend function '{}' for '{}'", keyword, key);
            }
            parsed
        };
        let equation = |key: &str| -> Option<BlendEquation> {
            let keyword = blend.get(key)?.as_str()?;
            let parsed = BlendEquation::from_keyword(keyword);
            if parsed.is_none() {
                warn!("Unknown blend equation '{}' for '{}'", keyword, key);
            }
            parsed
        };

        if let Some(src) = factor("source") {
            self.blend_source = src;
            self.blend_source_alpha = src;
        }
        if let Some(src_alpha) = factor("sourceAlpha") {
            self.blend_source_alpha = src_alpha;
        }

        if let Some(dst) = factor("dest") {
            self.blend_dest = dst;
            self.blend_dest_alpha = dst;
        }
        if let Some(dst_alpha) = factor("destAlpha") {
            self.blend_dest_alpha = dst_alpha;
        }

        if let Some(eq) = equation("equation") {
            self.blend_equation = eq;
            self.blend_equation_alpha = eq;
        }
        if let Some(eq_alpha) = equation("equationAlpha") {
            self.blend_equation_alpha = eq_alpha;
        }

        if let Some(color) = blend.get("color").and_then(json::parse_color) {
            self.blend_color = color;
        }

        self.blend_enabled = true;
    }
}
