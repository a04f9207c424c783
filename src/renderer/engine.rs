// renderer/engine.rs
//! The frame pipeline.
//!
//! A frame runs strictly in order: frustum update, queue fill, the deferred
//! geometry and lighting passes (when the deferred path is available), the
//! forward pass, post-processing and present. Nothing in here returns an
//! error; broken content is skipped and shows up in the log.

use std::mem;

use glam::{Mat4, Quat, Vec3, Vec4};
use hecs::{Entity, World};
use log::{debug, error, info, trace, warn};
use serde_json::json;

use super::builtin;
use super::culling::{
    intersect_aabb_sphere, intersect_obb_frustum, intersect_sphere_frustum, Aabb, Frustum, Obb,
    Sphere,
};
use super::device::{ClearFlags, GraphicsDevice, TextureId};
use super::effect::{Effect, LightMode, Pass, RenderType};
use super::framebuffer::{log_setup_failure, FrameBuffer, GBuffer, ACCUMULATION_FORMAT, AUX_FORMAT};
use super::image_effect::{ImageEffect, PostProcessContext};
use super::lights::{Light, LightType, LightUniforms};
use super::material::Material;
use super::primitives::{light_sphere_radius, light_volume_geometry};
use super::queue::{sort_lights, QueuedLight, RenderJob, RenderQueue, SortKey};
use super::render_context::RenderContext;
use super::render_state::RenderState;
use super::shader::{ShaderProgram, ShaderValue};
use super::texture::Texture;
use super::texture_units::TextureUnitManager;
use super::uniforms::{apply_ambient, builtin as uniform, FrameUniforms, ObjectUniforms};
use crate::asset::{Assets, Content, Drawable, Handle, Mesh, SubMesh};
use crate::scene::{Camera, ImageEffectStack, MeshRenderer, Scene, Transform};
use crate::settings::RenderSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePhase {
    #[default]
    Idle,
    FrustumUpdate,
    QueueFill,
    GeometryPass,
    LightingPass,
    ForwardPass,
    PostProcess,
    Present,
}

/// Which buffer ends up on screen. Everything but `Default` shows a
/// G-buffer channel through the deferred light effect's debug pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Default = 0,
    Diffuse = 1,
    Specular = 2,
    Smoothness = 3,
    Normal = 4,
    Depth = 5,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    /// Triangles of every enqueued drawable, counted once per drawable.
    pub triangles: u32,
    pub avg_lights_per_object: f32,
    pub draw_calls: u32,
    pub program_binds: u32,
    pub state_applications: u32,
}

#[derive(Debug, Clone, Copy)]
struct LightVolumes {
    quad: SubMesh,
    sphere: SubMesh,
}

impl LightVolumes {
    fn upload(device: &mut dyn GraphicsDevice) -> Option<Self> {
        let geometry = light_volume_geometry();
        let mesh = Mesh::with_submeshes(
            device,
            "light volumes",
            &geometry.vertices,
            &geometry.indices,
            &[geometry.quad, geometry.sphere],
        );
        Some(Self {
            quad: *mesh.submesh(0)?,
            sphere: *mesh.submesh(1)?,
        })
    }
}

/// Pass indices of the deferred light effect.
#[derive(Debug, Clone, Copy)]
struct DeferredLighting {
    effect: Handle<Effect>,
    ambient: Option<usize>,
    light: Option<usize>,
    debug: Option<usize>,
}

impl DeferredLighting {
    fn load(device: &mut dyn GraphicsDevice, content: &mut Content, name: &str) -> Option<Self> {
        let effect = match content.effect(device, &json!(name)) {
            Ok(effect) => effect,
            Err(err) => {
                warn!(
                    "Deferred light effect '{}' unavailable ({}). Deferred materials fall back to forward passes.",
                    name, err
                );
                return None;
            }
        };
        let passes = content.assets.effects.get(effect)?;
        let find = |pass: &str| {
            let index = passes.pass_index_by_name(pass);
            if index.is_none() {
                warn!("Deferred light effect '{}' has no '{}' pass", name, pass);
            }
            index
        };
        Some(Self {
            effect,
            ambient: find("ambient"),
            light: find("light"),
            debug: find("debug"),
        })
    }
}

/// Everything a job of one submesh shares whatever pass it runs.
struct JobTemplate {
    entity: Entity,
    world: Mat4,
    drawable: SubMesh,
    drawable_key: (Handle<Mesh>, usize),
    material: Handle<Material>,
    effect: Handle<Effect>,
    priority: i32,
}

impl JobTemplate {
    fn job(&self, index: usize, pass: &Pass, light: Option<usize>) -> RenderJob {
        let light_mode = match pass.light_mode {
            LightMode::Deferred => None,
            mode => Some(mode),
        };
        RenderJob {
            entity: self.entity,
            world: self.world,
            drawable: self.drawable,
            material: self.material,
            effect: self.effect,
            pass: index,
            light,
            key: SortKey {
                priority: self.priority,
                program: pass.program,
                light_mode,
                pass: (self.effect, index),
                material: self.material,
                drawable: self.drawable_key,
            },
        }
    }
}

pub struct RenderEngine<D: GraphicsDevice> {
    device: D,
    settings: RenderSettings,
    texture_units: TextureUnitManager,
    width: u32,
    height: u32,

    gbuffer: Option<GBuffer>,
    accumulation: Option<FrameBuffer>,
    aux: Vec<FrameBuffer>,
    volumes: Option<LightVolumes>,
    deferred_lighting: Option<DeferredLighting>,
    copy_material: Option<Handle<Material>>,
    fallback_texture: Option<TextureId>,

    renderers: Vec<Entity>,
    lights: Vec<Entity>,
    deferred_queue: RenderQueue,
    forward_queue: RenderQueue,
    light_queue: Vec<QueuedLight>,

    current_state: RenderState,
    state_dirty: bool,
    output_mode: OutputMode,
    phase: FramePhase,
    stats: FrameStats,
    frustum: Frustum,
    frame: FrameUniforms,
    camera: Camera,
}

impl<D: GraphicsDevice> RenderEngine<D> {
    /// Sets up render targets and built-in content. `content` must be the
    /// pool whose assets are later passed to [`RenderEngine::render`].
    pub fn new(mut device: D, settings: RenderSettings, content: &mut Content) -> Self {
        let settings = settings.validate();

        for (name, rgba) in [("white", [255, 255, 255, 255]), ("black", [0, 0, 0, 255])] {
            if content.assets.textures.find(name).is_none() {
                content.register_solid_texture(&mut device, name, rgba);
            }
        }

        let fallback_texture = content.assets.texture_id("black");
        builtin::register_defaults(content);
        let copy_material = builtin::copy_material(&mut device, content);
        let deferred_lighting = if settings.deferred_enabled {
            DeferredLighting::load(&mut device, content, &settings.deferred_light_effect)
        } else {
            None
        };

        let volumes = LightVolumes::upload(&mut device);
        if volumes.is_none() {
            error!("Could not build light volume geometry");
        }

        // the device starts out in an unknown state
        let current_state = RenderState::default();
        current_state.apply(&mut device);

        let mut engine = Self {
            device,
            width: settings.resolution.width,
            height: settings.resolution.height,
            settings,
            texture_units: TextureUnitManager::new(),
            gbuffer: None,
            accumulation: None,
            aux: Vec::new(),
            volumes,
            deferred_lighting,
            copy_material,
            fallback_texture,
            renderers: Vec::new(),
            lights: Vec::new(),
            deferred_queue: RenderQueue::new(),
            forward_queue: RenderQueue::new(),
            light_queue: Vec::new(),
            current_state,
            state_dirty: false,
            output_mode: OutputMode::Default,
            phase: FramePhase::Idle,
            stats: FrameStats::default(),
            frustum: Frustum::default(),
            frame: FrameUniforms::default(),
            camera: Camera::default(),
        };
        engine.allocate_targets();

        info!(
            "Render engine ready ({}x{}, deferred: {})",
            engine.width,
            engine.height,
            engine.gbuffer.is_some() && engine.deferred_lighting.is_some()
        );
        engine
    }

    fn allocate_targets(&mut self) {
        let (width, height) = (self.width, self.height);
        let device: &mut dyn GraphicsDevice = &mut self.device;

        self.gbuffer = if self.settings.deferred_enabled {
            log_setup_failure("G-buffer", GBuffer::new(device, width, height))
        } else {
            None
        };
        self.accumulation = log_setup_failure(
            "accumulation",
            FrameBuffer::render_texture(device, "accumulation", width, height, ACCUMULATION_FORMAT, true),
        );
        self.aux = (0..self.settings.aux_buffer_count)
            .filter_map(|i| {
                log_setup_failure(
                    "auxiliary",
                    FrameBuffer::render_texture(device, &format!("aux {i}"), width, height, AUX_FORMAT, false),
                )
            })
            .collect();

        // the old attachments may still be resident
        self.texture_units.empty_cache(device);
    }

    /// Registers the renderer and light capabilities of `entity`.
    pub fn add_component(&mut self, world: &World, entity: Entity) {
        let Ok(components) = world.entity(entity) else {
            debug!("Cannot register {:?}: no such entity", entity);
            return;
        };
        if components.has::<MeshRenderer>() && !self.renderers.contains(&entity) {
            self.renderers.push(entity);
        }
        if components.has::<Light>() && !self.lights.contains(&entity) {
            self.lights.push(entity);
        }
    }

    pub fn remove_component(&mut self, entity: Entity) {
        self.renderers.retain(|&e| e != entity);
        self.lights.retain(|&e| e != entity);
    }

    /// Registers every entity of `scene`.
    pub fn add_scene(&mut self, scene: &Scene) {
        let entities: Vec<Entity> = scene.world.iter().map(|e| e.entity()).collect();
        for entity in entities {
            self.add_component(&scene.world, entity);
        }
    }

    /// Forgets all registered entities and texture bindings, for switching
    /// to another scene.
    pub fn clear_scene(&mut self) {
        self.renderers.clear();
        self.lights.clear();
        self.texture_units.empty_cache(&mut self.device);
    }

    pub fn on_resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            debug!("Ignoring resize to {}x{}", width, height);
            return;
        }
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        self.allocate_targets();
        info!("Render targets resized to {}x{}", width, height);
    }

    pub fn set_output_mode(&mut self, mode: OutputMode) {
        self.output_mode = mode;
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Direct device access. The tracked render state is pushed again in
    /// full on the next frame.
    pub fn device_mut(&mut self) -> &mut D {
        self.state_dirty = true;
        &mut self.device
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn gbuffer(&self) -> Option<&GBuffer> {
        self.gbuffer.as_ref()
    }

    pub fn accumulation(&self) -> Option<&FrameBuffer> {
        self.accumulation.as_ref()
    }

    pub fn aux_buffers(&self) -> &[FrameBuffer] {
        &self.aux
    }

    pub fn deferred_queue(&self) -> &RenderQueue {
        &self.deferred_queue
    }

    pub fn forward_queue(&self) -> &RenderQueue {
        &self.forward_queue
    }

    pub fn light_queue(&self) -> &[QueuedLight] {
        &self.light_queue
    }

    pub fn texture_units(&self) -> &TextureUnitManager {
        &self.texture_units
    }

    /// Renders one frame of `scene` and presents it.
    pub fn render(&mut self, scene: &Scene, assets: &Assets) {
        self.stats = FrameStats::default();
        if self.state_dirty {
            self.current_state.apply(&mut self.device);
            self.state_dirty = false;
        }

        self.enter(FramePhase::FrustumUpdate);
        let Some((camera_transform, camera)) = scene.active_camera() else {
            debug!("No active camera, skipping frame");
            self.enter(FramePhase::Idle);
            return;
        };
        let proj = camera.projection(self.width, self.height);
        self.frame = FrameUniforms::new(
            proj,
            camera_transform.inverse_rigid(),
            camera_transform.translation,
        );
        self.frustum = Frustum::from_matrix(&self.frame.view_proj);
        self.camera = camera;

        let deferred = self.deferred_path(assets);

        self.enter(FramePhase::QueueFill);
        self.fill_queues(scene, assets, deferred);

        if deferred {
            self.enter(FramePhase::GeometryPass);
            self.geometry_pass(assets);
            self.enter(FramePhase::LightingPass);
            self.lighting_pass(scene, assets);
        }

        self.enter(FramePhase::ForwardPass);
        self.forward_pass(scene, assets, deferred);

        self.enter(FramePhase::PostProcess);
        self.post_process(scene, assets);

        self.enter(FramePhase::Present);
        self.device.present();
        self.enter(FramePhase::Idle);
    }

    fn enter(&mut self, phase: FramePhase) {
        trace!("{:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    fn deferred_path(&self, assets: &Assets) -> bool {
        if !self.settings.deferred_enabled || self.gbuffer.is_none() || self.accumulation.is_none() {
            return false;
        }
        let Some(lighting) = self.deferred_lighting else {
            return false;
        };
        lighting
            .light
            .and_then(|i| assets.effects.get(lighting.effect)?.pass(i))
            .is_some_and(|pass| pass.is_usable(&assets.programs))
    }

    /// Moves the device to `next`, touching only what differs.
    fn transition(&mut self, next: &RenderState) {
        if self.current_state != *next {
            next.differential_apply(&self.current_state, &mut self.device);
            self.current_state = *next;
            self.stats.state_applications += 1;
        }
    }

    fn fill_queues(&mut self, scene: &Scene, assets: &Assets, deferred: bool) {
        self.deferred_queue.clear();
        self.forward_queue.clear();
        self.light_queue.clear();

        let world = &scene.world;
        let registered = self.renderers.len() + self.lights.len();
        self.renderers.retain(|&e| world.contains(e));
        self.lights.retain(|&e| world.contains(e));
        let pruned = registered - self.renderers.len() - self.lights.len();
        if pruned > 0 {
            debug!("Dropped {} despawned entities from the render lists", pruned);
        }

        let culling = self.settings.frustum_culling;

        for &entity in &self.lights {
            if !scene.is_active(entity) {
                continue;
            }
            let Ok(light) = world.get::<&Light>(entity) else {
                continue;
            };
            if !light.is_visible() {
                continue;
            }
            let transform = world
                .get::<&Transform>(entity)
                .map(|t| *t)
                .unwrap_or_default();
            if culling
                && light.light_type != LightType::Directional
                && !intersect_sphere_frustum(
                    &Sphere::new(transform.translation, light.range),
                    &self.frustum,
                )
            {
                trace!("Light {:?} culled", entity);
                continue;
            }
            self.light_queue.push(QueuedLight {
                entity,
                light: *light,
                transform,
            });
        }
        sort_lights(&mut self.light_queue);

        let budget = self
            .settings
            .max_forward_lights
            .map_or(usize::MAX, |n| n as usize);
        let mut forward_objects = 0u32;
        let mut forward_lights = 0u32;

        for &entity in &self.renderers {
            if !scene.is_active(entity) {
                continue;
            }
            let Ok(renderer) = world.get::<&MeshRenderer>(entity) else {
                continue;
            };
            let Some(mesh) = assets.meshes.get(renderer.mesh) else {
                trace!("{:?}: mesh not loaded", entity);
                continue;
            };
            let transform = world
                .get::<&Transform>(entity)
                .map(|t| *t)
                .unwrap_or_default();
            if culling {
                let obb = Obb::from_local(
                    &mesh.bounds(),
                    transform.translation,
                    transform.rotation,
                    transform.scale,
                );
                if !intersect_obb_frustum(&obb, &self.frustum) {
                    continue;
                }
            }

            let world_matrix = transform.matrix();
            let mut object_lights: Option<Vec<usize>> = None;
            let mut lights_used: Option<usize> = None;

            for (index, submesh) in mesh.submeshes().iter().enumerate() {
                let Some(material_handle) = renderer.material(index) else {
                    continue;
                };
                let Some((material, effect)) = assets.material_effect(material_handle) else {
                    trace!("{:?}: material without effect", entity);
                    continue;
                };
                let Some(effect_handle) = material.effect() else {
                    continue;
                };
                let template = JobTemplate {
                    entity,
                    world: world_matrix,
                    drawable: *submesh,
                    drawable_key: (renderer.mesh, index),
                    material: material_handle,
                    effect: effect_handle,
                    priority: effect.queue_priority(),
                };
                let usable = |mode: LightMode| {
                    let index = effect.pass_index_by_mode(mode)?;
                    let pass = effect.pass(index)?;
                    if pass.is_usable(&assets.programs) {
                        Some((index, pass))
                    } else {
                        trace!("Effect '{}': skipping unusable pass '{}'", effect.name(), pass.name);
                        None
                    }
                };

                // blending cannot go through the G-buffer
                if deferred && effect.render_type() != RenderType::Transparent {
                    if let Some((pass_index, pass)) = usable(LightMode::Deferred) {
                        self.stats.triangles += submesh.triangle_count();
                        self.deferred_queue.push(template.job(pass_index, pass, None));
                        continue;
                    }
                }

                // additive passes only accumulate on top of a base pass
                let Some((base_index, base_pass)) = usable(LightMode::ForwardBase) else {
                    trace!("{:?}: effect '{}' has no forward base pass", entity, effect.name());
                    continue;
                };
                self.stats.triangles += submesh.triangle_count();

                let lights = object_lights
                    .get_or_insert_with(|| self.lights_for(&mesh.bounds(), &transform));
                let mut remaining = lights.as_slice();
                let mut used = 0;

                let light = remaining.first().copied();
                if light.is_some() {
                    remaining = &remaining[1..];
                    used += 1;
                }
                self.forward_queue.push(template.job(base_index, base_pass, light));

                if let Some((pass_index, pass)) = usable(LightMode::ForwardAdd) {
                    for &light in remaining.iter().take(budget) {
                        self.forward_queue.push(template.job(pass_index, pass, Some(light)));
                        used += 1;
                    }
                }
                lights_used = Some(lights_used.unwrap_or(0).max(used));
            }

            if let Some(used) = lights_used {
                forward_objects += 1;
                forward_lights += used as u32;
            }
        }

        self.deferred_queue.sort();
        self.forward_queue.sort();
        self.stats.avg_lights_per_object = if forward_objects == 0 {
            0.0
        } else {
            forward_lights as f32 / forward_objects as f32
        };
        trace!(
            "Queued {} deferred and {} forward jobs, {} lights",
            self.deferred_queue.len(),
            self.forward_queue.len(),
            self.light_queue.len()
        );
    }

    /// Indices into the light queue of every light that can reach an object
    /// with local `bounds` placed by `transform`.
    fn lights_for(&self, bounds: &Aabb, transform: &Transform) -> Vec<usize> {
        let to_local = transform.inverse_rigid();
        let scaled = bounds.scaled(transform.scale);
        self.light_queue
            .iter()
            .enumerate()
            .filter(|(_, queued)| match queued.light.light_type {
                LightType::Directional => true,
                LightType::Point | LightType::Spot => intersect_aabb_sphere(
                    &scaled,
                    to_local.transform_point3(queued.position()),
                    queued.light.range,
                ),
            })
            .map(|(i, _)| i)
            .collect()
    }

    fn execute_queue(&mut self, queue: &RenderQueue, assets: &Assets, ambient: Vec4) {
        let mut bound_program: Option<Handle<ShaderProgram>> = None;
        let mut bound_material: Option<Handle<Material>> = None;

        for job in queue.iter() {
            let Some((material, effect)) = assets.material_effect(job.material) else {
                continue;
            };
            let Some(pass) = effect.pass(job.pass) else {
                continue;
            };
            let Some(program) = assets.programs.get(pass.program).filter(|p| p.is_good()) else {
                trace!("Skipping pass '{}': program unusable", pass.name);
                continue;
            };

            self.transition(&pass.state);
            if bound_program != Some(pass.program) {
                program.bind(&mut self.device);
                self.stats.program_binds += 1;
                self.frame.apply(program, &mut self.device);
                bound_program = Some(pass.program);
                bound_material = None;
            }
            if bound_material != Some(job.material) {
                let mut ctx = RenderContext::new(&mut self.device, &mut self.texture_units)
                    .with_fallback_texture(self.fallback_texture);
                effect.apply_properties(program, Some(material), &mut ctx);
                bound_material = Some(job.material);
            }

            ObjectUniforms::new(job.world, &self.frame).apply(program, &mut self.device);
            match pass.light_mode {
                LightMode::ForwardBase => apply_ambient(program, &mut self.device, ambient),
                LightMode::ForwardAdd => apply_ambient(program, &mut self.device, Vec4::ZERO),
                LightMode::Deferred | LightMode::ShadowCast => {}
            }
            if job.key.light_mode.is_some() {
                job.light
                    .and_then(|i| self.light_queue.get(i))
                    .map_or(LightUniforms::NONE, |l| l.light.uniforms(&l.transform))
                    .apply(program, &mut self.device);
            }

            job.drawable.bind(&mut self.device);
            job.drawable.draw(&mut self.device);
            self.stats.draw_calls += 1;
        }
    }

    fn geometry_pass(&mut self, assets: &Assets) {
        // depth writes must be on for the clear
        self.transition(&RenderState::default());
        if let Some(gbuffer) = &self.gbuffer {
            gbuffer.target().bind(&mut self.device);
            gbuffer.target().clear(&mut self.device, Vec4::ZERO);
        }

        let queue = mem::take(&mut self.deferred_queue);
        self.execute_queue(&queue, assets, Vec4::ZERO);
        self.deferred_queue = queue;
    }

    fn lighting_pass(&mut self, scene: &Scene, assets: &Assets) {
        self.transition(&RenderState::default());
        if let Some(accumulation) = &self.accumulation {
            accumulation.bind(&mut self.device);
            accumulation.clear(&mut self.device, scene.back_color());
        }

        let (Some(lighting), Some(volumes)) = (self.deferred_lighting, self.volumes) else {
            return;
        };
        let Some(effect) = assets.effects.get(lighting.effect) else {
            return;
        };

        if self.output_mode != OutputMode::Default {
            if let Some(program) = lighting
                .debug
                .and_then(|pass| self.begin_light_pass(effect, pass, assets))
            {
                let device = &mut self.device;
                program.set_uniform(device, uniform::MODE, &ShaderValue::Int(self.output_mode as i32));
                program.set_uniform(device, uniform::NEAR_PLANE, &ShaderValue::Float(self.camera.near));
                program.set_uniform(device, uniform::FAR_PLANE, &ShaderValue::Float(self.camera.far));
                self.draw_volume(program, volumes.quad, Mat4::IDENTITY);
                return;
            }
            trace!("No debug pass, showing the lit image");
        }

        if let Some(program) = lighting
            .ambient
            .and_then(|pass| self.begin_light_pass(effect, pass, assets))
        {
            apply_ambient(program, &mut self.device, scene.ambient());
            self.draw_volume(program, volumes.quad, Mat4::IDENTITY);
        }

        if let Some(program) = lighting
            .light
            .and_then(|pass| self.begin_light_pass(effect, pass, assets))
        {
            for index in 0..self.light_queue.len() {
                let queued = self.light_queue[index];
                queued
                    .light
                    .uniforms(&queued.transform)
                    .apply(program, &mut self.device);
                let (volume, transform) = self.light_volume(&queued, &volumes);
                self.draw_volume(program, volume, transform);
            }
        }
    }

    /// Binds a pass of the deferred light effect with the G-buffer samplers.
    fn begin_light_pass<'a>(
        &mut self,
        effect: &'a Effect,
        index: usize,
        assets: &'a Assets,
    ) -> Option<&'a ShaderProgram> {
        let pass = effect.pass(index)?;
        let Some(program) = assets.programs.get(pass.program).filter(|p| p.is_good()) else {
            trace!("Skipping light pass '{}': program unusable", pass.name);
            return None;
        };

        self.transition(&pass.state);
        program.bind(&mut self.device);
        self.stats.program_binds += 1;
        self.frame.apply(program, &mut self.device);

        let mut ctx = RenderContext::new(&mut self.device, &mut self.texture_units)
            .with_fallback_texture(self.fallback_texture);
        effect.apply_properties(program, None, &mut ctx);
        if let Some(gbuffer) = &self.gbuffer {
            let samplers = [
                (uniform::GBUF_DIFFUSE, gbuffer.diffuse()),
                (uniform::GBUF_SPEC_SMOOTH, gbuffer.specular_smoothness()),
                (uniform::GBUF_NORMAL, gbuffer.normal()),
                (uniform::GBUF_DEPTH, gbuffer.depth()),
            ];
            for (id, texture) in samplers {
                if let Some(texture) = texture {
                    program.set_texture(&mut ctx, id, texture.id());
                }
            }
        }
        Some(program)
    }

    /// Sphere for point and spot lights, unless the sphere reaches the near
    /// plane; the full-screen quad otherwise.
    fn light_volume(&self, queued: &QueuedLight, volumes: &LightVolumes) -> (SubMesh, Mat4) {
        if queued.light.light_type == LightType::Directional {
            return (volumes.quad, Mat4::IDENTITY);
        }
        let center = queued.position();
        let reach = queued.light.range * light_sphere_radius();
        if center.distance(self.frame.camera_pos) <= reach + self.near_plane_reach() {
            return (volumes.quad, Mat4::IDENTITY);
        }
        let model = Mat4::from_scale_rotation_translation(
            Vec3::splat(queued.light.range),
            Quat::IDENTITY,
            center,
        );
        (volumes.sphere, self.frame.view_proj * model)
    }

    /// Distance from the eye to the corners of the near plane.
    fn near_plane_reach(&self) -> f32 {
        let aspect = self.width.max(1) as f32 / self.height.max(1) as f32;
        let half = (self.camera.fov.to_radians() * 0.5).tan();
        self.camera.near * (1.0 + half * half * (1.0 + aspect * aspect)).sqrt()
    }

    fn draw_volume(&mut self, program: &ShaderProgram, volume: SubMesh, transform: Mat4) {
        program.set_uniform(&mut self.device, uniform::TRANSFORM, &ShaderValue::Mat4(transform));
        volume.bind(&mut self.device);
        volume.draw(&mut self.device);
        self.stats.draw_calls += 1;
    }

    fn forward_pass(&mut self, scene: &Scene, assets: &Assets, deferred: bool) {
        if !deferred {
            self.transition(&RenderState::default());
            match &self.accumulation {
                Some(accumulation) => {
                    accumulation.bind(&mut self.device);
                    accumulation.clear(&mut self.device, scene.back_color());
                }
                None => {
                    FrameBuffer::unbind(&mut self.device, self.width, self.height);
                    let color = Vec4::from_array(self.settings.clear_color);
                    self.device.clear(ClearFlags::COLOR | ClearFlags::DEPTH, color);
                }
            }
        } else if let Some(accumulation) = &self.accumulation {
            accumulation.bind(&mut self.device);
        }

        let queue = mem::take(&mut self.forward_queue);
        self.execute_queue(&queue, assets, scene.ambient());
        self.forward_queue = queue;
    }

    fn post_process(&mut self, scene: &Scene, assets: &Assets) {
        // without an accumulation buffer the forward pass drew to the screen
        let Some(input) = self.accumulation.as_ref().and_then(|a| a.color(0)) else {
            return;
        };
        let Some(volumes) = self.volumes else {
            return;
        };

        let stack = scene
            .active_camera_entity()
            .and_then(|camera| scene.world.get::<&ImageEffectStack>(camera).ok());
        let effects: Vec<&dyn ImageEffect> = stack
            .iter()
            .flat_map(|stack| stack.iter())
            .filter(|effect| effect.is_enabled() && effect.is_good(assets))
            .collect();

        let aux = &self.aux;
        let mut post = PostProcessContext {
            ctx: RenderContext::new(&mut self.device, &mut self.texture_units)
                .with_fallback_texture(self.fallback_texture),
            assets,
            quad: volumes.quad,
            aux,
            backbuffer: (self.width, self.height),
            state: &mut self.current_state,
            copy_material: self.copy_material,
            stats: &mut self.stats,
        };

        if effects.is_empty() {
            post.set_srgb_conversion(true);
            post.blit(input, None, None, 0);
            return;
        }

        let mut source: &Texture = input;
        for (k, effect) in effects.iter().enumerate() {
            let output = if k + 1 == effects.len() || aux.is_empty() {
                None
            } else {
                aux.get(k % aux.len())
                    .filter(|target| target.color(0).map(Texture::id) != Some(source.id()))
            };
            post.set_srgb_conversion(true);
            effect.apply(&mut post, source, output);

            match output.and_then(|target| target.color(0)) {
                Some(next) => source = next,
                None => {
                    if k + 1 < effects.len() {
                        trace!("Image effect chain ended early on the backbuffer");
                    }
                    break;
                }
            }
        }
    }
}
