// renderer/device/headless.rs
//! In-memory [`GraphicsDevice`] used by tests and the headless demo.
//!
//! The device keeps the fixed-function state it was told about, records
//! every draw together with the state it was issued under, and emulates the
//! program pipeline by scanning sources: a stage fails to compile when it
//! contains an `#error` line, a program fails to link when it has no stages,
//! a failed stage, or a `#pragma link_error` line, and active uniforms are
//! the `uniform <type> <name>;` declarations of its stages.

use std::collections::HashMap;

use glam::Vec4;
use log::trace;

use super::{
    ActiveUniform, Capability, ClearFlags, CompileOutput, FramebufferId, FramebufferStatus,
    GeometryDesc, GeometryId, GraphicsDevice, LinkOutput, ProgramId, ShaderId, ShaderStage,
    TextureDesc, TextureId, UniformLocation,
};
use crate::renderer::render_state::{BlendEquation, BlendFactor, CompareFunction, CullMode};
use crate::renderer::shader::ShaderValue;

const DEFAULT_TEXTURE_UNITS: usize = 16;
const DEFAULT_COLOR_ATTACHMENTS: usize = 8;

/// Fixed-function state as last pushed to the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceState {
    pub cull_enabled: bool,
    pub cull_mode: CullMode,
    pub depth_write: bool,
    pub depth_offset_factor: f32,
    pub depth_offset_units: f32,
    pub depth_test_enabled: bool,
    pub depth_function: CompareFunction,
    pub blend_enabled: bool,
    /// src, dst, src alpha, dst alpha
    pub blend_factors: [BlendFactor; 4],
    /// color, alpha
    pub blend_equations: [BlendEquation; 2],
    pub blend_color: Vec4,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            cull_enabled: false,
            cull_mode: CullMode::Back,
            depth_write: true,
            depth_offset_factor: 0.0,
            depth_offset_units: 0.0,
            depth_test_enabled: false,
            depth_function: CompareFunction::Less,
            blend_enabled: false,
            blend_factors: [
                BlendFactor::One,
                BlendFactor::Zero,
                BlendFactor::One,
                BlendFactor::Zero,
            ],
            blend_equations: [BlendEquation::Add, BlendEquation::Add],
            blend_color: Vec4::ZERO,
        }
    }
}

impl DeviceState {
    /// The state with parameters of disabled categories reset, i.e. only
    /// what can influence rasterization.
    pub fn effective(&self) -> Self {
        let defaults = Self::default();
        let mut state = *self;

        if !state.cull_enabled {
            state.cull_mode = defaults.cull_mode;
        }
        if !state.depth_test_enabled {
            state.depth_function = defaults.depth_function;
        }
        if !state.blend_enabled {
            state.blend_factors = defaults.blend_factors;
            state.blend_equations = defaults.blend_equations;
            state.blend_color = defaults.blend_color;
        }

        state
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCounters {
    pub state_calls: u32,
    pub program_binds: u32,
    pub uniform_writes: u32,
    pub texture_binds: u32,
    pub framebuffer_binds: u32,
    pub draw_calls: u32,
    pub clears: u32,
    pub presents: u32,
}

#[derive(Debug, Clone)]
pub struct DrawRecord {
    pub program: Option<ProgramId>,
    pub framebuffer: Option<FramebufferId>,
    pub geometry: Option<GeometryId>,
    pub first_index: u32,
    pub index_count: u32,
    pub state: DeviceState,
}

struct ShaderRecord {
    source: String,
    compiled: bool,
}

struct ProgramRecord {
    linked: bool,
    uniforms: Vec<ActiveUniform>,
}

struct TextureRecord {
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
}

struct FramebufferRecord {
    color: Vec<TextureId>,
    depth: Option<TextureId>,
}

struct GeometryRecord {
    index_count: u32,
}

pub struct HeadlessDevice {
    state: DeviceState,
    counters: DeviceCounters,
    max_texture_units: usize,
    max_color_attachments: usize,

    shaders: Vec<ShaderRecord>,
    programs: Vec<ProgramRecord>,
    textures: Vec<TextureRecord>,
    framebuffers: Vec<FramebufferRecord>,
    geometries: Vec<GeometryRecord>,

    current_program: Option<ProgramId>,
    current_framebuffer: Option<FramebufferId>,
    current_geometry: Option<GeometryId>,
    texture_units: Vec<Option<TextureId>>,
    uniform_values: HashMap<(ProgramId, UniformLocation), ShaderValue>,
    draws: Vec<DrawRecord>,
    viewport: (u32, u32),
    srgb_conversion: bool,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_TEXTURE_UNITS, DEFAULT_COLOR_ATTACHMENTS)
    }

    pub fn with_limits(max_texture_units: usize, max_color_attachments: usize) -> Self {
        Self {
            state: DeviceState::default(),
            counters: DeviceCounters::default(),
            max_texture_units,
            max_color_attachments,
            shaders: Vec::new(),
            programs: Vec::new(),
            textures: Vec::new(),
            framebuffers: Vec::new(),
            geometries: Vec::new(),
            current_program: None,
            current_framebuffer: None,
            current_geometry: None,
            texture_units: vec![None; max_texture_units],
            uniform_values: HashMap::new(),
            draws: Vec::new(),
            viewport: (0, 0),
            srgb_conversion: false,
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn counters(&self) -> DeviceCounters {
        self.counters
    }

    pub fn reset_counters(&mut self) {
        self.counters = DeviceCounters::default();
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn clear_draws(&mut self) {
        self.draws.clear();
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.current_program
    }

    pub fn current_framebuffer(&self) -> Option<FramebufferId> {
        self.current_framebuffer
    }

    pub fn bound_texture(&self, unit: usize) -> Option<TextureId> {
        self.texture_units.get(unit).copied().flatten()
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn srgb_conversion(&self) -> bool {
        self.srgb_conversion
    }

    pub fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures
            .get(texture.0 as usize)
            .map(|t| (t.width, t.height))
    }

    /// Last value written to the named uniform of `program`.
    pub fn uniform_value(&self, program: ProgramId, name: &str) -> Option<&ShaderValue> {
        let record = self.programs.get(program.0 as usize)?;
        let uniform = record.uniforms.iter().find(|u| u.name == name)?;
        self.uniform_values.get(&(program, uniform.location))
    }

    fn state_call(&mut self) {
        self.counters.state_calls += 1;
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        self.state_call();
        match capability {
            Capability::CullFace => self.state.cull_enabled = enabled,
            Capability::DepthTest => self.state.depth_test_enabled = enabled,
            Capability::Blend => self.state.blend_enabled = enabled,
        }
    }

    fn cull_face(&mut self, mode: CullMode) {
        self.state_call();
        self.state.cull_mode = mode;
    }

    fn depth_mask(&mut self, write: bool) {
        self.state_call();
        self.state.depth_write = write;
    }

    fn polygon_offset(&mut self, factor: f32, units: f32) {
        self.state_call();
        self.state.depth_offset_factor = factor;
        self.state.depth_offset_units = units;
    }

    fn depth_func(&mut self, func: CompareFunction) {
        self.state_call();
        self.state.depth_function = func;
    }

    fn blend_color(&mut self, color: Vec4) {
        self.state_call();
        self.state.blend_color = color;
    }

    fn blend_equation_separate(&mut self, color: BlendEquation, alpha: BlendEquation) {
        self.state_call();
        self.state.blend_equations = [color, alpha];
    }

    fn blend_func_separate(
        &mut self,
        src: BlendFactor,
        dst: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        self.state_call();
        self.state.blend_factors = [src, dst, src_alpha, dst_alpha];
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> CompileOutput {
        let errors: Vec<String> = source
            .lines()
            .enumerate()
            .filter_map(|(line, text)| {
                text.trim_start()
                    .strip_prefix("#error")
                    .map(|msg| format!("ERROR: 0:{}: {}", line + 1, msg.trim()))
            })
            .collect();

        let shader = ShaderId(self.shaders.len() as u32);
        let compiled = errors.is_empty();
        self.shaders.push(ShaderRecord {
            source: source.to_owned(),
            compiled,
        });
        trace!("compiled {} shader {:?} (ok: {})", stage.keyword(), shader, compiled);

        CompileOutput {
            shader,
            success: compiled,
            log: errors.join("\n"),
        }
    }

    fn link_program(&mut self, shaders: &[ShaderId]) -> LinkOutput {
        let program = ProgramId(self.programs.len() as u32);
        let mut log = Vec::new();

        if shaders.is_empty() {
            log.push("error: no shader stages attached".to_owned());
        }

        let mut uniforms: Vec<ActiveUniform> = Vec::new();
        for id in shaders {
            let Some(record) = self.shaders.get(id.0 as usize) else {
                log.push(format!("error: unknown shader object {}", id.0));
                continue;
            };
            if !record.compiled {
                log.push(format!("error: shader object {} is not compiled", id.0));
            }
            if record
                .source
                .lines()
                .any(|l| l.trim() == "#pragma link_error")
            {
                log.push(format!("error: unresolved symbols in shader object {}", id.0));
            }
            for (name, sampler) in scan_uniforms(&record.source) {
                if uniforms.iter().all(|u| u.name != name) {
                    let location = UniformLocation(uniforms.len() as i32);
                    uniforms.push(ActiveUniform {
                        name,
                        location,
                        sampler,
                    });
                }
            }
        }

        let linked = log.is_empty();
        if !linked {
            uniforms.clear();
        }
        self.programs.push(ProgramRecord { linked, uniforms });

        LinkOutput {
            program,
            success: linked,
            log: log.join("\n"),
        }
    }

    fn active_uniforms(&self, program: ProgramId) -> Vec<ActiveUniform> {
        self.programs
            .get(program.0 as usize)
            .filter(|p| p.linked)
            .map(|p| p.uniforms.clone())
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        if program.is_some() {
            self.counters.program_binds += 1;
        }
        self.current_program = program;
    }

    fn set_uniform(&mut self, location: UniformLocation, value: &ShaderValue) {
        let Some(program) = self.current_program else {
            trace!("uniform write at {:?} without a bound program", location);
            return;
        };
        self.counters.uniform_writes += 1;
        self.uniform_values.insert((program, location), *value);
    }

    fn max_combined_texture_units(&self) -> usize {
        self.max_texture_units
    }

    fn max_color_attachments(&self) -> usize {
        self.max_color_attachments
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> TextureId {
        let id = TextureId(self.textures.len() as u32);
        trace!(
            "texture {:?} '{}' {}x{} {:?}",
            id,
            desc.label.unwrap_or("unnamed"),
            desc.width,
            desc.height,
            desc.format
        );
        self.textures.push(TextureRecord {
            width: desc.width,
            height: desc.height,
            format: desc.format,
        });
        id
    }

    fn bind_texture_unit(&mut self, unit: usize, texture: Option<TextureId>) {
        if let Some(slot) = self.texture_units.get_mut(unit) {
            self.counters.texture_binds += 1;
            *slot = texture;
        }
    }

    fn create_framebuffer(
        &mut self,
        color: &[TextureId],
        depth: Option<TextureId>,
    ) -> FramebufferId {
        let id = FramebufferId(self.framebuffers.len() as u32);
        self.framebuffers.push(FramebufferRecord {
            color: color.to_vec(),
            depth,
        });
        id
    }

    fn framebuffer_status(&self, framebuffer: FramebufferId) -> FramebufferStatus {
        let Some(record) = self.framebuffers.get(framebuffer.0 as usize) else {
            return FramebufferStatus::Incomplete("unknown framebuffer".to_owned());
        };

        if record.color.is_empty() && record.depth.is_none() {
            return FramebufferStatus::Incomplete("missing attachment".to_owned());
        }
        if record.color.len() > self.max_color_attachments {
            return FramebufferStatus::Incomplete("too many color attachments".to_owned());
        }

        let mut size = None;
        for (id, depth) in record
            .color
            .iter()
            .map(|id| (*id, false))
            .chain(record.depth.map(|id| (id, true)))
        {
            let Some(texture) = self.textures.get(id.0 as usize) else {
                return FramebufferStatus::Incomplete(format!("unknown texture {}", id.0));
            };
            if texture.format.is_depth_stencil_format() != depth {
                return FramebufferStatus::Incomplete(format!(
                    "attachment format {:?} does not fit its slot",
                    texture.format
                ));
            }
            match size {
                None => size = Some((texture.width, texture.height)),
                Some(s) if s != (texture.width, texture.height) => {
                    return FramebufferStatus::Incomplete(
                        "attachment dimensions differ".to_owned(),
                    );
                }
                Some(_) => {}
            }
        }

        FramebufferStatus::Complete
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.counters.framebuffer_binds += 1;
        self.current_framebuffer = framebuffer;
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn clear(&mut self, _flags: ClearFlags, _color: Vec4) {
        self.counters.clears += 1;
    }

    fn set_srgb_conversion(&mut self, enabled: bool) {
        self.srgb_conversion = enabled;
    }

    fn upload_geometry(&mut self, desc: &GeometryDesc<'_>) -> GeometryId {
        let id = GeometryId(self.geometries.len() as u32);
        trace!(
            "geometry {:?} '{}': {} vertex bytes, stride {}, {} indices",
            id,
            desc.label.unwrap_or("unnamed"),
            desc.vertices.len(),
            desc.layout.array_stride,
            desc.indices.len()
        );
        self.geometries.push(GeometryRecord {
            index_count: desc.indices.len() as u32,
        });
        id
    }

    fn bind_geometry(&mut self, geometry: Option<GeometryId>) {
        self.current_geometry = geometry;
    }

    fn draw_indexed(&mut self, first_index: u32, index_count: u32) {
        if let Some(geometry) = self
            .current_geometry
            .and_then(|g| self.geometries.get(g.0 as usize))
        {
            debug_assert!(first_index + index_count <= geometry.index_count);
        }

        self.counters.draw_calls += 1;
        self.draws.push(DrawRecord {
            program: self.current_program,
            framebuffer: self.current_framebuffer,
            geometry: self.current_geometry,
            first_index,
            index_count,
            state: self.state,
        });
    }

    fn present(&mut self) {
        self.counters.presents += 1;
    }
}

/// `uniform [precision] <type> <name>[array];` declarations, in order.
fn scan_uniforms(source: &str) -> Vec<(String, bool)> {
    source
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("uniform ")?;
            let mut tokens = rest
                .split_whitespace()
                .filter(|t| !matches!(*t, "lowp" | "mediump" | "highp"));
            let ty = tokens.next()?;
            let name = tokens.next()?;
            let name = name.trim_end_matches(';');
            let name = name.split('[').next().unwrap_or(name);
            if name.is_empty() {
                return None;
            }
            let sampler = ty.starts_with("sampler")
                || ty.starts_with("isampler")
                || ty.starts_with("usampler");
            Some((name.to_owned(), sampler))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = "uniform mat4 cm_mat_wvp;\nuniform highp vec4 tint;\nvoid main() {}";
    const FS: &str = "uniform sampler2D albedo;\nuniform vec4 tint;\nvoid main() {}";

    #[test]
    fn compile_fails_on_error_directive() {
        let mut device = HeadlessDevice::new();
        let ok = device.compile_shader(ShaderStage::Vertex, VS);
        let bad = device.compile_shader(ShaderStage::Fragment, "#error broken\nvoid main() {}");
        assert!(ok.success);
        assert!(!bad.success);
        assert!(bad.log.contains("broken"));
    }

    #[test]
    fn linked_programs_report_uniforms_in_declaration_order() {
        let mut device = HeadlessDevice::new();
        let vs = device.compile_shader(ShaderStage::Vertex, VS).shader;
        let fs = device.compile_shader(ShaderStage::Fragment, FS).shader;
        let link = device.link_program(&[vs, fs]);
        assert!(link.success);

        let uniforms = device.active_uniforms(link.program);
        let names: Vec<_> = uniforms.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["cm_mat_wvp", "tint", "albedo"]);
        assert!(uniforms[2].sampler);
        assert!(!uniforms[1].sampler);
    }

    #[test]
    fn link_fails_with_bad_stage() {
        let mut device = HeadlessDevice::new();
        let bad = device.compile_shader(ShaderStage::Fragment, "#error nope").shader;
        let link = device.link_program(&[bad]);
        assert!(!link.success);
        assert!(device.active_uniforms(link.program).is_empty());
    }

    #[test]
    fn framebuffer_with_mismatched_sizes_is_incomplete() {
        let mut device = HeadlessDevice::new();
        let desc = |w| TextureDesc {
            label: None,
            width: w,
            height: 4,
            format: wgpu::TextureFormat::Rgba8Unorm,
            sampler: Default::default(),
            data: None,
        };
        let a = device.create_texture(&desc(4));
        let b = device.create_texture(&desc(8));
        let fb = device.create_framebuffer(&[a, b], None);
        assert!(matches!(
            device.framebuffer_status(fb),
            FramebufferStatus::Incomplete(_)
        ));
    }

    #[test]
    fn draws_capture_current_state() {
        let mut device = HeadlessDevice::new();
        device.set_capability(Capability::Blend, true);
        device.draw_indexed(0, 3);
        assert_eq!(device.draws().len(), 1);
        assert!(device.draws()[0].state.blend_enabled);
        assert_eq!(device.counters().draw_calls, 1);
    }
}
