// renderer/image_effect.rs
//! Full-screen post-processing on top of the light accumulation buffer.
//!
//! Effects run in registration order. Every effect but the last renders into
//! an auxiliary buffer; the last one writes the backbuffer.

use glam::Vec4;
use log::{debug, trace};

use super::engine::FrameStats;
use super::framebuffer::FrameBuffer;
use super::material::Material;
use super::render_context::RenderContext;
use super::render_state::RenderState;
use super::shader::ShaderValue;
use super::texture::Texture;
use super::uniforms::builtin;
use crate::asset::{Assets, Drawable, Handle, SubMesh};
use crate::renderer::device::GraphicsDevice;

pub trait ImageEffect: Send + Sync {
    /// Renders `input` into `output`, `None` being the backbuffer.
    fn apply(&self, post: &mut PostProcessContext<'_>, input: &Texture, output: Option<&FrameBuffer>);

    fn is_enabled(&self) -> bool {
        true
    }

    /// Whether every resource the effect needs exists and is usable.
    fn is_good(&self, assets: &Assets) -> bool;

    /// Linear output gets sRGB conversion on write.
    fn output_linear(&self) -> bool {
        true
    }
}

/// What an [`ImageEffect`] may touch while it runs.
pub struct PostProcessContext<'a> {
    pub(crate) ctx: RenderContext<'a>,
    pub(crate) assets: &'a Assets,
    pub(crate) quad: SubMesh,
    pub(crate) aux: &'a [FrameBuffer],
    pub(crate) backbuffer: (u32, u32),
    /// State the device currently holds.
    pub(crate) state: &'a mut RenderState,
    pub(crate) copy_material: Option<Handle<Material>>,
    pub(crate) stats: &'a mut FrameStats,
}

impl<'a> PostProcessContext<'a> {
    pub fn assets(&self) -> &'a Assets {
        self.assets
    }

    pub fn device(&mut self) -> &mut dyn GraphicsDevice {
        &mut *self.ctx.device
    }

    pub fn set_srgb_conversion(&mut self, enabled: bool) {
        self.ctx.device.set_srgb_conversion(enabled);
    }

    pub fn copy_material(&self) -> Option<Handle<Material>> {
        self.copy_material
    }

    /// An auxiliary buffer that is neither sampled as `input` nor written as
    /// `output`.
    pub fn aux_other_than(
        &self,
        input: &Texture,
        output: Option<&FrameBuffer>,
    ) -> Option<&'a FrameBuffer> {
        self.aux.iter().find(|aux| {
            aux.color(0).map(Texture::id) != Some(input.id())
                && output.map_or(true, |o| o.id() != aux.id())
        })
    }

    /// Draws a full-screen quad into `dest` with `pass` of the material's
    /// effect, sampling `source` as `img_source`. Without a material the
    /// built-in copy material is used. Returns false when nothing was drawn.
    pub fn blit(
        &mut self,
        source: &Texture,
        dest: Option<&FrameBuffer>,
        material: Option<Handle<Material>>,
        pass: usize,
    ) -> bool {
        let Some(material) = material.or(self.copy_material) else {
            trace!("No material to blit with");
            return false;
        };
        let assets = self.assets;
        let Some((material, effect)) = assets.material_effect(material) else {
            trace!("Blit material has no effect");
            return false;
        };
        let Some(pass) = effect.pass(pass) else {
            trace!("Effect '{}' has no pass {}", effect.name(), pass);
            return false;
        };
        let Some(program) = assets.programs.get(pass.program).filter(|p| p.is_good()) else {
            trace!("Skipping blit pass '{}': program unusable", pass.name);
            return false;
        };

        let (width, height) = match dest {
            Some(target) => {
                target.bind(self.ctx.device);
                (target.width(), target.height())
            }
            None => {
                let (width, height) = self.backbuffer;
                FrameBuffer::unbind(self.ctx.device, width, height);
                (width, height)
            }
        };

        if *self.state != pass.state {
            pass.state.differential_apply(self.state, self.ctx.device);
            *self.state = pass.state;
            self.stats.state_applications += 1;
        }
        program.bind(self.ctx.device);
        self.stats.program_binds += 1;

        effect.apply_properties(program, Some(material), &mut self.ctx);
        program.set_texture(&mut self.ctx, builtin::IMG_SOURCE, source.id());
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        program.set_uniform(
            self.ctx.device,
            builtin::IMG_RESOLUTION,
            &ShaderValue::Vec4(Vec4::new(w, h, 1.0 / w, 1.0 / h)),
        );

        self.quad.bind(self.ctx.device);
        self.quad.draw(self.ctx.device);
        self.stats.draw_calls += 1;
        true
    }
}

/// Runs every pass of a material's effect as a blit, ping-ponging between
/// the output and a free auxiliary buffer so that the last pass lands in the
/// output.
#[derive(Debug, Clone)]
pub struct SimpleImageEffect {
    material: Option<Handle<Material>>,
    enabled: bool,
    output_linear: bool,
}

impl SimpleImageEffect {
    pub fn new(material: Handle<Material>) -> Self {
        Self {
            material: Some(material),
            enabled: true,
            output_linear: true,
        }
    }

    /// Plain copy through the built-in copy material.
    pub fn copy() -> Self {
        Self {
            material: None,
            enabled: true,
            output_linear: true,
        }
    }

    pub fn material(&self) -> Option<Handle<Material>> {
        self.material
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_output_linear(&mut self, linear: bool) {
        self.output_linear = linear;
    }
}

impl ImageEffect for SimpleImageEffect {
    fn apply(&self, post: &mut PostProcessContext<'_>, input: &Texture, output: Option<&FrameBuffer>) {
        post.set_srgb_conversion(self.output_linear);

        let passes = self
            .material
            .or(post.copy_material())
            .and_then(|m| post.assets().material_effect(m))
            .map_or(0, |(_, effect)| effect.pass_count());
        if passes == 0 {
            return;
        }

        let Some(aux) = post.aux_other_than(input, output) else {
            if passes > 1 {
                debug!("No free auxiliary buffer, running 1 of {} passes", passes);
            }
            post.blit(input, output, self.material, 0);
            return;
        };

        let mut cur_output = output;
        let mut cur_input = Some(aux);
        if passes % 2 == 0 {
            std::mem::swap(&mut cur_output, &mut cur_input);
        }

        for i in 0..passes {
            let source = if i == 0 {
                Some(input)
            } else {
                cur_input.and_then(|target| target.color(0))
            };
            let Some(source) = source else {
                trace!("Pass {} would sample the backbuffer, stopping", i);
                break;
            };
            post.blit(source, cur_output, self.material, i);
            std::mem::swap(&mut cur_input, &mut cur_output);
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn is_good(&self, assets: &Assets) -> bool {
        let Some(material) = self.material else {
            return true;
        };
        assets
            .material_effect(material)
            .is_some_and(|(_, effect)| {
                effect.pass_count() > 0
                    && effect.passes().iter().all(|p| p.is_usable(&assets.programs))
            })
    }

    fn output_linear(&self) -> bool {
        self.output_linear
    }
}
