// Frame-level behaviour of the render engine on the headless device.

use glam::{Vec3, Vec4};
use hybrid_renderer::asset::{Content, Handle, Mesh};
use hybrid_renderer::renderer::device::{GraphicsDevice, ProgramId};
use hybrid_renderer::renderer::primitives::cube_mesh;
use hybrid_renderer::renderer::shader::{ShaderProperty, ShaderValue};
use hybrid_renderer::renderer::{
    FramePhase, HeadlessDevice, Light, Material, OutputMode, RenderEngine, RenderState,
    SimpleImageEffect,
};
use hybrid_renderer::scene::{Camera, ImageEffectStack, MeshRenderer, Scene, Transform};
use hybrid_renderer::settings::Resolution;
use hybrid_renderer::{init_logging, RenderSettings};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

const VERTEX: &str = "#pragma type vertex
uniform mat4 cm_mat_wvp;
uniform mat4 cm_mat_world;
layout(location = 0) in vec3 position;
void main() { gl_Position = cm_mat_wvp * vec4(position, 1.0); }
";

const GBUFFER: &str = "#pragma type fragment
uniform vec4 tint;
uniform float gloss;
void main() {}
";

const BASE: &str = "#pragma type fragment
uniform vec4 tint;
uniform float gloss;
uniform vec4 cm_light_ambient;
uniform vec4 cm_light_color;
uniform vec4 cm_light_dir;
void main() {}
";

const ADD: &str = "#pragma type fragment
uniform vec4 tint;
uniform vec4 cm_light_color;
uniform vec4 cm_light_dir;
void main() {}
";

const BROKEN: &str = "#pragma type fragment
#error unsupported feature
void main() {}
";

const POST: &str = "#pragma type fragment
uniform sampler2D img_source;
uniform vec4 img_resolution;
void main() {}
";

fn program(name: &str, fragment: &str) -> Value {
    json!({ "name": name, "shaders": ["test.vert", fragment] })
}

fn properties() -> Value {
    json!([
        { "name": "tint", "type": "vec4", "default": [1.0, 1.0, 1.0, 1.0] },
        { "name": "gloss", "type": "float", "default": 0.5 }
    ])
}

fn content() -> Content {
    let mut content = Content::new();
    for (name, source) in [
        ("test.vert", VERTEX),
        ("gbuffer.frag", GBUFFER),
        ("base.frag", BASE),
        ("add.frag", ADD),
        ("broken.frag", BROKEN),
        ("post.frag", POST),
    ] {
        content.register_source(name, source);
    }

    let additive = json!({ "depthWrite": false, "blend": { "source": "one", "dest": "one" } });
    content.register_document(
        "lit",
        json!({
            "renderQueue": "geometry",
            "properties": properties(),
            "passes": [
                { "name": "gbuffer", "lightMode": "deferred", "program": program("gbuffer", "gbuffer.frag") },
                { "name": "base", "lightMode": "forwardBase", "program": program("base", "base.frag") },
                { "name": "add", "lightMode": "forwardAdd", "state": additive, "program": program("add", "add.frag") }
            ]
        }),
    );
    content.register_document(
        "forward",
        json!({
            "renderQueue": "transparent",
            "properties": properties(),
            "passes": [
                { "name": "base", "lightMode": "forwardBase", "program": program("base", "base.frag") },
                { "name": "add", "lightMode": "forwardAdd", "state": additive, "program": program("add", "add.frag") }
            ]
        }),
    );
    content.register_document(
        "broken_deferred",
        json!({
            "properties": properties(),
            "passes": [
                { "name": "gbuffer", "lightMode": "deferred", "program": program("broken", "broken.frag") },
                { "name": "base", "lightMode": "forwardBase", "program": program("base", "base.frag") }
            ]
        }),
    );
    content.register_document(
        "broken",
        json!({
            "passes": [
                { "name": "base", "lightMode": "forwardBase", "program": program("broken", "broken.frag") }
            ]
        }),
    );
    content.register_document(
        "tinted_glass",
        json!({
            "renderQueue": "transparent",
            "renderType": "transparent",
            "properties": properties(),
            "passes": [
                { "name": "gbuffer", "lightMode": "deferred", "program": program("gbuffer", "gbuffer.frag") },
                { "name": "base", "lightMode": "forwardBase", "program": program("base", "base.frag") }
            ]
        }),
    );
    content.register_document(
        "additive_only",
        json!({
            "properties": properties(),
            "passes": [
                { "name": "add", "lightMode": "forwardAdd", "state": additive, "program": program("add", "add.frag") }
            ]
        }),
    );
    content.register_document(
        "post",
        json!({
            "passes": [
                { "name": "blit", "state": { "cull": false, "depthTest": false, "depthWrite": false },
                  "program": { "name": "post", "shaders": ["builtin_copy.vert", "post.frag"] } }
            ]
        }),
    );
    content
}

fn settings(deferred: bool) -> RenderSettings {
    RenderSettings {
        deferred_enabled: deferred,
        resolution: Resolution {
            width: 320,
            height: 240,
        },
        ..RenderSettings::default()
    }
}

struct Fixture {
    engine: RenderEngine<HeadlessDevice>,
    content: Content,
    scene: Scene,
    cube: Handle<Mesh>,
}

impl Fixture {
    fn new(settings: RenderSettings) -> Self {
        init_logging();
        let mut content = content();
        let mut engine = RenderEngine::new(HeadlessDevice::new(), settings, &mut content);

        let (vertices, indices) = cube_mesh();
        let mesh = Mesh::from_vertices(engine.device_mut(), "cube", &vertices, &indices);
        let cube = content.add_mesh("cube", mesh);

        let mut scene = Scene::new();
        scene.spawn_camera(
            "camera",
            Transform::from_translation(Vec3::new(0.0, 0.0, 10.0)),
            Camera::default(),
        );

        Self {
            engine,
            content,
            scene,
            cube,
        }
    }

    fn material(&mut self, json: Value) -> Handle<Material> {
        let device = self.engine.device_mut();
        self.content.material(device, &json).unwrap()
    }

    fn spawn_cube(&mut self, position: Vec3, material: Handle<Material>) {
        let entity = self.scene.spawn_mesh(
            "cube",
            Transform::from_translation(position),
            MeshRenderer::new(self.cube, material),
        );
        self.engine.add_component(&self.scene.world, entity);
    }

    fn spawn_light(&mut self, position: Vec3, light: Light) {
        let entity = self
            .scene
            .spawn_light("light", Transform::from_translation(position), light);
        self.engine.add_component(&self.scene.world, entity);
    }

    fn add_image_effect(&mut self, effect: SimpleImageEffect) {
        let camera = self.scene.active_camera_entity().unwrap();
        self.scene
            .world
            .get::<&mut ImageEffectStack>(camera)
            .unwrap()
            .push(effect);
    }

    fn render(&mut self) {
        self.engine.device_mut().clear_draws();
        self.engine.render(&self.scene, &self.content.assets);
    }

    fn program(&self, name: &str) -> ProgramId {
        let handle = self.content.assets.programs.find(name).unwrap();
        self.content.assets.programs.get(handle).unwrap().handle()
    }

    fn draws_with(&self, program: &str) -> usize {
        let id = self.program(program);
        self.engine
            .device()
            .draws()
            .iter()
            .filter(|d| d.program == Some(id))
            .count()
    }
}

fn random_state(rng: &mut SmallRng) -> RenderState {
    const CULL: [&str; 3] = ["back", "front", "frontAndBack"];
    const DEPTH: [&str; 8] = [
        "never", "less", "equal", "lequal", "greater", "notEqual", "gequal", "always",
    ];
    const FACTORS: [&str; 6] = [
        "zero",
        "one",
        "srcAlpha",
        "oneMinusSrcAlpha",
        "dstColor",
        "constantColor",
    ];
    const EQUATIONS: [&str; 3] = ["add", "subtract", "max"];

    fn pick(rng: &mut SmallRng, options: &[&'static str]) -> &'static str {
        options.choose(rng).copied().unwrap_or("one")
    }

    let cull = if rng.gen_bool(0.3) {
        json!(false)
    } else {
        json!(pick(rng, &CULL))
    };
    let depth_test = if rng.gen_bool(0.3) {
        json!(false)
    } else {
        json!(pick(rng, &DEPTH))
    };
    let blend = if rng.gen_bool(0.4) {
        json!(false)
    } else {
        json!({
            "source": pick(rng, &FACTORS),
            "dest": pick(rng, &FACTORS),
            "destAlpha": pick(rng, &FACTORS),
            "equation": pick(rng, &EQUATIONS),
            "color": [rng.gen::<f32>(), 0.0, 1.0, rng.gen::<f32>()]
        })
    };
    RenderState::from_json(&json!({
        "cull": cull,
        "depthTest": depth_test,
        "depthWrite": rng.gen_bool(0.5),
        "depthOffset": [rng.gen_range(0.0..2.0f32), rng.gen_range(0.0..4.0f32)],
        "blend": blend
    }))
}

#[test]
fn differential_apply_matches_a_full_apply() {
    let mut rng = SmallRng::seed_from_u64(0x5eed);
    for _ in 0..200 {
        let previous = random_state(&mut rng);
        let next = random_state(&mut rng);

        let mut incremental = HeadlessDevice::new();
        previous.apply(&mut incremental);
        next.differential_apply(&previous, &mut incremental);

        let mut fresh = HeadlessDevice::new();
        next.apply(&mut fresh);

        assert_eq!(
            incremental.state().effective(),
            fresh.state().effective(),
            "{previous:?} -> {next:?}"
        );
    }
}

#[test]
fn frame_walks_through_every_phase_and_presents() {
    let mut fx = Fixture::new(settings(true));
    let lit = fx.material(json!({ "effect": "lit" }));
    fx.spawn_cube(Vec3::ZERO, lit);
    fx.spawn_light(Vec3::new(1.0, 1.0, 1.0), Light::point(Vec3::ONE, 1.0, 4.0));

    fx.render();

    assert_eq!(fx.engine.phase(), FramePhase::Idle);
    assert_eq!(fx.engine.device().counters().presents, 1);
    assert_eq!(fx.engine.deferred_queue().len(), 1);
    assert!(fx.engine.forward_queue().is_empty());

    let gbuffer = fx.engine.gbuffer().unwrap().target().id();
    let geometry_draws: Vec<_> = fx
        .engine
        .device()
        .draws()
        .iter()
        .filter(|d| d.framebuffer == Some(gbuffer))
        .collect();
    assert_eq!(geometry_draws.len(), 1);
    assert_eq!(geometry_draws[0].program, Some(fx.program("gbuffer")));

    // ambient quad plus one volume per light
    assert_eq!(fx.draws_with("deferred_light_ambient"), 1);
    assert_eq!(fx.draws_with("deferred_light_light"), 1);

    let last = fx.engine.device().draws().last().unwrap();
    assert_eq!(last.framebuffer, None);
    assert_eq!(last.program, Some(fx.program("builtin_copy")));
    assert!(fx.engine.device().srgb_conversion());
}

#[test]
fn missing_camera_skips_the_frame() {
    let mut fx = Fixture::new(settings(true));
    let lit = fx.material(json!({ "effect": "lit" }));
    fx.spawn_cube(Vec3::ZERO, lit);
    fx.scene = Scene::new();

    fx.render();

    assert_eq!(fx.engine.device().counters().presents, 0);
    assert!(fx.engine.device().draws().is_empty());
    assert_eq!(fx.engine.phase(), FramePhase::Idle);
}

#[test]
fn jobs_with_equal_keys_keep_registration_order() {
    let mut fx = Fixture::new(settings(false));
    let forward = fx.material(json!({ "effect": "forward" }));
    for i in 0..12 {
        fx.spawn_cube(Vec3::new(i as f32 * 0.5 - 3.0, 0.0, 0.0), forward);
    }
    let registered: Vec<_> = fx
        .scene
        .world
        .query::<&MeshRenderer>()
        .iter()
        .map(|(entity, _)| entity)
        .collect();

    fx.render();
    let first: Vec<_> = fx.engine.forward_queue().iter().map(|j| j.entity).collect();
    fx.render();
    let second: Vec<_> = fx.engine.forward_queue().iter().map(|j| j.entity).collect();

    assert_eq!(first, registered);
    assert_eq!(first, second);
}

#[test]
fn queue_groups_by_priority_then_program() {
    let mut fx = Fixture::new(settings(true));
    let lit = fx.material(json!({ "effect": "lit" }));
    let glass = fx.material(json!({ "effect": "forward" }));
    let fallback = fx.material(json!({ "effect": "broken_deferred" }));

    fx.spawn_cube(Vec3::new(-2.0, 0.0, 0.0), glass);
    fx.spawn_cube(Vec3::new(0.0, 0.0, 0.0), lit);
    fx.spawn_cube(Vec3::new(2.0, 0.0, 0.0), fallback);
    fx.spawn_light(Vec3::ZERO, Light::point(Vec3::ONE, 1.0, 10.0));

    fx.render();

    assert_eq!(fx.engine.deferred_queue().len(), 1);
    let priorities: Vec<i32> = fx
        .engine
        .forward_queue()
        .iter()
        .map(|j| j.key.priority)
        .collect();
    let mut sorted = priorities.clone();
    sorted.sort();
    assert_eq!(priorities, sorted);
    // the geometry-queue fallback object draws before the transparent one
    assert_eq!(priorities.first(), Some(&1000));
    assert_eq!(priorities.last(), Some(&3000));
}

#[test]
fn broken_passes_never_draw() {
    let mut fx = Fixture::new(settings(false));
    let broken = fx.material(json!({ "effect": "broken" }));
    fx.spawn_cube(Vec3::ZERO, broken);

    let effect = fx.content.assets.effects.find("broken").unwrap();
    let effect = fx.content.assets.effects.get(effect).unwrap();
    let pass = effect.pass(0).unwrap();
    assert!(!pass.is_usable(&fx.content.assets.programs));

    for _ in 0..3 {
        fx.render();
        assert!(fx.engine.forward_queue().is_empty());
        assert_eq!(fx.draws_with("broken"), 0);
    }
}

#[test]
fn broken_deferred_pass_falls_back_to_forward() {
    let mut fx = Fixture::new(settings(true));
    let material = fx.material(json!({ "effect": "broken_deferred" }));
    fx.spawn_cube(Vec3::ZERO, material);

    fx.render();

    assert!(fx.engine.deferred_queue().is_empty());
    assert_eq!(fx.engine.forward_queue().len(), 1);
    assert_eq!(fx.draws_with("base"), 1);
}

#[test]
fn transparent_effects_skip_the_deferred_path() {
    let mut fx = Fixture::new(settings(true));
    let glass = fx.material(json!({ "effect": "tinted_glass" }));
    fx.spawn_cube(Vec3::ZERO, glass);

    fx.render();

    assert!(fx.engine.deferred_queue().is_empty());
    assert_eq!(fx.engine.forward_queue().len(), 1);
    assert_eq!(fx.draws_with("gbuffer"), 0);
    assert_eq!(fx.draws_with("base"), 1);
}

#[test]
fn additive_pass_without_base_pass_is_not_queued() {
    let mut fx = Fixture::new(settings(false));
    let material = fx.material(json!({ "effect": "additive_only" }));
    fx.spawn_cube(Vec3::ZERO, material);
    fx.spawn_light(Vec3::Y, Light::point(Vec3::ONE, 1.0, 10.0));

    fx.render();

    assert!(fx.engine.forward_queue().is_empty());
    assert_eq!(fx.draws_with("add"), 0);
    assert_eq!(fx.engine.stats().triangles, 0);
}

#[test]
fn stale_material_values_fall_back_to_effect_defaults() {
    let mut fx = Fixture::new(settings(false));
    let material = fx.material(json!({
        "effect": "forward",
        "properties": { "tint": [0.2, 0.4, 0.6, 1.0] }
    }));
    fx.content
        .assets
        .materials
        .get_mut(material)
        .unwrap()
        .set_property(ShaderProperty::new("gloss", Vec3::ONE));
    fx.spawn_cube(Vec3::ZERO, material);

    fx.render();

    let base = fx.program("base");
    let device = fx.engine.device();
    assert_eq!(
        device.uniform_value(base, "tint"),
        Some(&ShaderValue::Vec4(Vec4::new(0.2, 0.4, 0.6, 1.0)))
    );
    assert_eq!(device.uniform_value(base, "gloss"), Some(&ShaderValue::Float(0.5)));
}

#[test]
fn forward_light_budget_limits_additive_passes() {
    let run = |budget: Option<u32>| {
        let mut fx = Fixture::new(RenderSettings {
            max_forward_lights: budget,
            ..settings(false)
        });
        let forward = fx.material(json!({ "effect": "forward" }));
        fx.spawn_cube(Vec3::ZERO, forward);
        for i in 0..5 {
            let offset = Vec3::new(i as f32 * 0.4 - 0.8, 1.0, 0.0);
            fx.spawn_light(offset, Light::point(Vec3::ONE, 1.0, 3.0));
        }
        // too small to reach the cube
        fx.spawn_light(Vec3::new(4.0, 0.0, 0.0), Light::point(Vec3::ONE, 1.0, 0.5));

        fx.render();
        (
            fx.engine.forward_queue().len(),
            fx.engine.stats().avg_lights_per_object,
            fx.draws_with("add"),
        )
    };

    let (jobs, lights, adds) = run(Some(2));
    assert_eq!(jobs, 3);
    assert_eq!(lights, 3.0);
    assert_eq!(adds, 2);

    let (jobs, lights, adds) = run(None);
    assert_eq!(jobs, 5);
    assert_eq!(lights, 5.0);
    assert_eq!(adds, 4);
}

#[test]
fn frame_stats_count_what_was_drawn() {
    let mut fx = Fixture::new(settings(false));
    let forward = fx.material(json!({ "effect": "forward" }));
    fx.spawn_cube(Vec3::new(-1.0, 0.0, 0.0), forward);
    fx.spawn_cube(Vec3::new(1.0, 0.0, 0.0), forward);
    // culled by the frustum
    fx.spawn_cube(Vec3::new(0.0, 0.0, 50.0), forward);

    fx.render();

    let stats = *fx.engine.stats();
    let (_, indices) = cube_mesh();
    assert_eq!(stats.triangles, 2 * indices.len() as u32 / 3);
    assert_eq!(stats.avg_lights_per_object, 0.0);
    // two objects plus the final copy
    assert_eq!(stats.draw_calls, 3);
    assert_eq!(stats.draw_calls as usize, fx.engine.device().draws().len());
    // one bind for the shared base program, one for the copy
    assert_eq!(stats.program_binds, 2);
}

#[test]
fn image_effects_ping_pong_and_end_on_the_backbuffer() {
    let mut fx = Fixture::new(settings(false));
    let post = fx.material(json!({ "effect": "post" }));
    for _ in 0..3 {
        fx.add_image_effect(SimpleImageEffect::new(post));
    }
    let mut disabled = SimpleImageEffect::new(post);
    disabled.set_enabled(false);
    fx.add_image_effect(disabled);

    fx.render();

    let aux: Vec<_> = fx.engine.aux_buffers().iter().map(|a| Some(a.id())).collect();
    let targets: Vec<_> = fx
        .engine
        .device()
        .draws()
        .iter()
        .map(|d| d.framebuffer)
        .collect();
    assert_eq!(targets, vec![aux[0], aux[1], None]);
    assert_eq!(fx.draws_with("post"), 3);
}

#[test]
fn output_modes_show_gbuffer_channels() {
    let mut fx = Fixture::new(settings(true));
    let lit = fx.material(json!({ "effect": "lit" }));
    fx.spawn_cube(Vec3::ZERO, lit);
    fx.spawn_light(Vec3::ONE, Light::point(Vec3::ONE, 1.0, 4.0));

    fx.engine.set_output_mode(OutputMode::Normal);
    fx.render();

    let debug = fx.program("deferred_light_debug");
    assert_eq!(fx.draws_with("deferred_light_debug"), 1);
    assert_eq!(fx.draws_with("deferred_light_light"), 0);
    assert_eq!(
        fx.engine.device().uniform_value(debug, "mode"),
        Some(&ShaderValue::Int(OutputMode::Normal as i32))
    );
    assert_eq!(
        fx.engine.device().uniform_value(debug, "farPlane"),
        Some(&ShaderValue::Float(Camera::default().far))
    );

    fx.engine.set_output_mode(OutputMode::Default);
    fx.render();
    assert_eq!(fx.draws_with("deferred_light_debug"), 0);
    assert_eq!(fx.draws_with("deferred_light_light"), 1);
}

#[test]
fn resize_rebuilds_targets_and_viewport() {
    let mut fx = Fixture::new(settings(true));
    fx.engine.on_resize(640, 480);
    fx.render();

    let gbuffer = fx.engine.gbuffer().unwrap();
    let diffuse = gbuffer.diffuse().unwrap().id();
    assert_eq!(fx.engine.device().texture_size(diffuse), Some((640, 480)));
    for aux in fx.engine.aux_buffers() {
        assert_eq!((aux.width(), aux.height()), (640, 480));
    }
    assert_eq!(fx.engine.device().viewport(), (640, 480));

    fx.engine.on_resize(640, 0);
    assert_eq!(fx.engine.size(), (640, 480));
}

#[test]
fn removed_and_despawned_entities_stop_rendering() {
    let mut fx = Fixture::new(settings(false));
    let forward = fx.material(json!({ "effect": "forward" }));
    fx.spawn_cube(Vec3::ZERO, forward);
    fx.spawn_cube(Vec3::X, forward);
    let entities: Vec<_> = fx
        .scene
        .world
        .query::<&MeshRenderer>()
        .iter()
        .map(|(entity, _)| entity)
        .collect();

    fx.engine.remove_component(entities[0]);
    fx.render();
    assert_eq!(fx.engine.forward_queue().len(), 1);

    fx.scene.despawn(entities[1]);
    fx.render();
    assert!(fx.engine.forward_queue().is_empty());
}

#[test]
fn direct_device_access_resets_tracked_state() {
    let mut fx = Fixture::new(settings(false));
    let forward = fx.material(json!({ "effect": "forward" }));
    fx.spawn_cube(Vec3::ZERO, forward);
    fx.render();

    // neither the copy nor the base pass touches the depth offset
    fx.engine.device_mut().polygon_offset(4.0, 8.0);
    fx.render();

    let base = fx.program("base");
    let draw = fx
        .engine
        .device()
        .draws()
        .iter()
        .find(|d| d.program == Some(base))
        .unwrap();
    assert_eq!(draw.state.depth_offset_factor, 0.0);
    assert_eq!(draw.state.depth_offset_units, 0.0);
}
