// renderer/shader/program.rs

use std::collections::HashMap;

use log::{debug, trace};

use super::preprocessor::PreprocessedSource;
use super::{uniform_id, ShaderValue, UniformId};
use crate::renderer::device::{
    GraphicsDevice, ProgramId, ShaderId, ShaderStage, TextureId, UniformLocation,
};
use crate::renderer::render_context::RenderContext;

/// A compiled shader stage.
#[derive(Debug, Clone)]
pub struct Shader {
    name: String,
    id: ShaderId,
    stage: ShaderStage,
    compiled: bool,
    log: String,
}

impl Shader {
    pub fn compile(
        device: &mut dyn GraphicsDevice,
        name: impl Into<String>,
        source: &PreprocessedSource,
    ) -> Self {
        let name = name.into();
        let output = device.compile_shader(source.stage, &source.source);
        if !output.success {
            debug!(
                "Failed to compile {} shader '{}':\n{}",
                source.stage.keyword(),
                name,
                output.log
            );
        }

        Self {
            name,
            id: output.shader,
            stage: source.stage,
            compiled: output.success,
            log: output.log,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> ShaderId {
        self.id
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn has_compiler_errors(&self) -> bool {
        !self.compiled
    }

    pub fn log(&self) -> &str {
        &self.log
    }
}

/// Sampler uniform of a program together with the unit index it was
/// assigned at link time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerBinding {
    pub location: UniformLocation,
    pub unit: usize,
}

/// A linked program with its uniform tables.
///
/// A program is good when it linked and all of its stages compiled. A bad
/// program keeps its log for diagnostics but never binds and has no
/// uniforms.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    name: String,
    handle: ProgramId,
    good: bool,
    log: String,
    uniforms: HashMap<UniformId, UniformLocation>,
    samplers: HashMap<UniformId, SamplerBinding>,
}

impl ShaderProgram {
    pub fn link(device: &mut dyn GraphicsDevice, name: impl Into<String>, stages: &[&Shader]) -> Self {
        let name = name.into();
        let ids: Vec<ShaderId> = stages.iter().map(|s| s.id()).collect();
        let output = device.link_program(&ids);

        let good = output.success && stages.iter().all(|s| !s.has_compiler_errors());

        // compile errors surface through the program log, reported once by the effect
        let mut log = String::new();
        for stage in stages.iter().filter(|s| s.has_compiler_errors()) {
            log.push_str(&format!(
                "{} shader '{}':\n{}\n",
                stage.stage().keyword(),
                stage.name(),
                stage.log()
            ));
        }
        log.push_str(&output.log);

        let mut program = Self {
            name,
            handle: output.program,
            good,
            log,
            uniforms: HashMap::new(),
            samplers: HashMap::new(),
        };

        if program.good {
            program.collect_uniforms(device);
        } else {
            debug!("Program '{}' is unusable: {}", program.name, program.log);
        }

        program
    }

    fn collect_uniforms(&mut self, device: &dyn GraphicsDevice) {
        let mut unit = 0;
        for uniform in device.active_uniforms(self.handle) {
            let id = uniform_id(&uniform.name);
            if uniform.sampler {
                self.samplers.insert(
                    id,
                    SamplerBinding {
                        location: uniform.location,
                        unit,
                    },
                );
                unit += 1;
            } else {
                self.uniforms.insert(id, uniform.location);
            }
        }
        trace!(
            "Program '{}': {} uniforms, {} samplers",
            self.name,
            self.uniforms.len(),
            self.samplers.len()
        );
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> ProgramId {
        self.handle
    }

    pub fn is_good(&self) -> bool {
        self.good
    }

    pub fn log(&self) -> &str {
        &self.log
    }

    pub fn get_uniform_loc(&self, id: UniformId) -> Option<UniformLocation> {
        self.uniforms.get(&id).copied()
    }

    pub fn sampler(&self, id: UniformId) -> Option<SamplerBinding> {
        self.samplers.get(&id).copied()
    }

    pub fn uniform_count(&self) -> usize {
        self.uniforms.len()
    }

    pub fn sampler_count(&self) -> usize {
        self.samplers.len()
    }

    /// Writes `value` if the program has the uniform. Optimized-out uniforms
    /// are skipped silently.
    pub fn set_uniform(
        &self,
        device: &mut dyn GraphicsDevice,
        id: UniformId,
        value: &ShaderValue,
    ) {
        if let Some(location) = self.get_uniform_loc(id) {
            device.set_uniform(location, value);
        }
    }

    /// Makes `texture` resident on a texture unit and points the sampler at it.
    pub fn set_texture(&self, ctx: &mut RenderContext<'_>, id: UniformId, texture: TextureId) {
        if let Some(sampler) = self.sampler(id) {
            let unit = ctx.texture_units.bind_texture(ctx.device, texture);
            ctx.device
                .set_uniform(sampler.location, &ShaderValue::Int(unit as i32));
        }
    }

    /// Binds the program. A bad program is left unbound and `false` returned.
    pub fn bind(&self, device: &mut dyn GraphicsDevice) -> bool {
        if !self.good {
            trace!("Skipping bind of unusable program '{}'", self.name);
            return false;
        }
        device.use_program(Some(self.handle));
        true
    }

    pub fn unbind(device: &mut dyn GraphicsDevice) {
        device.use_program(None);
    }
}
