use glam::{Quat, Vec3, Vec4};
use hybrid_renderer::asset::{Content, Mesh};
use hybrid_renderer::renderer::primitives::{cube_mesh, sphere_mesh};
use hybrid_renderer::renderer::{
    HeadlessDevice, Light, OutputMode, RenderEngine, SimpleImageEffect,
};
use hybrid_renderer::scene::{Camera, ImageEffectStack, MeshRenderer, Scene, Transform};
use hybrid_renderer::{init_logging, RenderSettings};
use log::{error, info};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

const GRID: i32 = 6;
const LIGHTS: usize = 24;
const FRAMES: usize = 3;

fn main() {
    init_logging();

    let settings = RenderSettings::load();
    let mut content = Content::with_root(concat!(env!("CARGO_MANIFEST_DIR"), "/assets"));
    let mut engine = RenderEngine::new(HeadlessDevice::new(), settings, &mut content);

    let Some(scene) = build_scene(&mut engine, &mut content) else {
        error!("Demo content failed to load");
        return;
    };
    engine.add_scene(&scene);

    for frame in 0..FRAMES {
        engine.render(&scene, &content.assets);
        let stats = engine.stats();
        info!(
            "frame {}: {} triangles, {} draw calls, {} program binds, {} state changes, {:.2} lights per forward object",
            frame,
            stats.triangles,
            stats.draw_calls,
            stats.program_binds,
            stats.state_applications,
            stats.avg_lights_per_object
        );
    }

    for mode in [OutputMode::Normal, OutputMode::Depth] {
        engine.set_output_mode(mode);
        engine.render(&scene, &content.assets);
        info!("{:?} view: {} draw calls", mode, engine.stats().draw_calls);
    }
    engine.set_output_mode(OutputMode::Default);

    engine.on_resize(1920, 1080);
    engine.render(&scene, &content.assets);
    info!(
        "after resize to {:?}: {} draw calls",
        engine.size(),
        engine.stats().draw_calls
    );
}

/// A grid of opaque cubes lit through the deferred path, a row of glass
/// spheres drawn forward and a cloud of coloured point lights.
fn build_scene(engine: &mut RenderEngine<HeadlessDevice>, content: &mut Content) -> Option<Scene> {
    let device = engine.device_mut();

    let (vertices, indices) = cube_mesh();
    let cube = content.add_mesh("cube", Mesh::from_vertices(device, "cube", &vertices, &indices));
    let (vertices, indices) = sphere_mesh(24, 16);
    let sphere = content.add_mesh(
        "sphere",
        Mesh::from_vertices(device, "sphere", &vertices, &indices),
    );

    let stone = load(content.material(
        device,
        &json!({ "name": "stone", "effect": "surface", "properties": { "tint": [0.8, 0.75, 0.7, 1.0] } }),
    ))?;
    let glass = load(content.material(device, &json!({ "name": "glass", "effect": "glass" })))?;
    let vignette = load(content.material(
        device,
        &json!({ "name": "vignette", "effect": "vignette", "properties": { "strength": 0.8 } }),
    ))?;

    let mut scene = Scene::new();
    scene.set_back_color(Vec4::new(0.05, 0.05, 0.08, 1.0));
    scene.set_ambient(Vec4::new(0.1, 0.1, 0.12, 1.0));

    let eye = Vec3::new(0.0, 12.0, 18.0);
    let camera = scene.spawn_camera(
        "camera",
        Transform::from_trs(
            eye,
            Quat::from_rotation_arc(Vec3::NEG_Z, (-eye).normalize()),
            Vec3::ONE,
        ),
        Camera::default(),
    );
    if let Ok(mut effects) = scene.world.get::<&mut ImageEffectStack>(camera) {
        effects.push(SimpleImageEffect::new(vignette));
    }

    for x in -GRID..GRID {
        for z in -GRID..GRID {
            let position = Vec3::new(x as f32 * 2.0, 0.0, z as f32 * 2.0);
            scene.spawn_mesh(
                &format!("cube {x},{z}"),
                Transform::from_translation(position),
                MeshRenderer::new(cube, stone),
            );
        }
    }
    for i in 0..GRID {
        let position = Vec3::new(i as f32 * 3.0 - 7.5, 2.0, 4.0);
        scene.spawn_mesh(
            &format!("glass {i}"),
            Transform::from_trs(position, Quat::IDENTITY, Vec3::splat(1.2)),
            MeshRenderer::new(sphere, glass),
        );
    }

    scene.spawn_light(
        "sun",
        Transform::from_trs(
            Vec3::ZERO,
            Quat::from_rotation_x(-std::f32::consts::FRAC_PI_3),
            Vec3::ONE,
        ),
        Light::directional(Vec3::new(1.0, 0.95, 0.9), 0.6),
    );

    let mut rng = SmallRng::seed_from_u64(7);
    for i in 0..LIGHTS {
        let position = Vec3::new(
            rng.gen_range(-12.0..12.0),
            rng.gen_range(0.5..4.0),
            rng.gen_range(-12.0..12.0),
        );
        let color = Vec3::new(rng.gen(), rng.gen(), rng.gen());
        let range = rng.gen_range(2.0..6.0);
        scene.spawn_light(
            &format!("light {i}"),
            Transform::from_translation(position),
            Light::point(color, 2.0, range),
        );
    }

    Some(scene)
}

fn load<T, E: std::fmt::Display>(result: Result<T, E>) -> Option<T> {
    result.map_err(|err| error!("{}", err)).ok()
}
