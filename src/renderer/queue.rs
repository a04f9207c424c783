// renderer/queue.rs
//! Per-frame render jobs and the queues that order them.

use glam::{Mat4, Vec3};
use hecs::Entity;

use super::effect::{Effect, LightMode};
use super::lights::Light;
use super::material::Material;
use super::shader::ShaderProgram;
use crate::asset::{Handle, Mesh, SubMesh};
use crate::scene::Transform;

/// Composite ordering key. Fields compare in declaration order.
///
/// Deferred jobs leave `light_mode` empty, so the deferred order is
/// (priority, program, pass, material, drawable). Forward jobs carry it so
/// base passes run before additive ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey {
    pub priority: i32,
    pub program: Handle<ShaderProgram>,
    pub light_mode: Option<LightMode>,
    pub pass: (Handle<Effect>, usize),
    pub material: Handle<Material>,
    pub drawable: (Handle<Mesh>, usize),
}

/// One draw: an object's submesh with one pass of its material, lit by at
/// most one light.
#[derive(Debug, Clone, Copy)]
pub struct RenderJob {
    pub entity: Entity,
    pub world: Mat4,
    pub drawable: SubMesh,
    pub material: Handle<Material>,
    pub effect: Handle<Effect>,
    pub pass: usize,
    /// Index into the frame's light queue.
    pub light: Option<usize>,
    pub key: SortKey,
}

#[derive(Debug, Default)]
pub struct RenderQueue {
    jobs: Vec<RenderJob>,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, job: RenderJob) {
        self.jobs.push(job);
    }

    /// Stable sort: jobs with equal keys keep their insertion order.
    pub fn sort(&mut self) {
        self.jobs.sort_by(|a, b| a.key.cmp(&b.key));
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
    }

    pub fn jobs(&self) -> &[RenderJob] {
        &self.jobs
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RenderJob> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// A visible light captured for one frame.
#[derive(Debug, Clone, Copy)]
pub struct QueuedLight {
    pub entity: Entity,
    pub light: Light,
    pub transform: Transform,
}

impl QueuedLight {
    pub fn position(&self) -> Vec3 {
        self.transform.translation
    }
}

/// Orders lights by (type, priority); registration order breaks ties.
pub fn sort_lights(lights: &mut [QueuedLight]) {
    lights.sort_by_key(|l| (l.light.light_type, l.light.priority));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::lights::LightType;
    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn submesh() -> SubMesh {
        let mut device = crate::renderer::device::HeadlessDevice::new();
        let (v, i) = crate::renderer::primitives::cube_mesh();
        *Mesh::from_vertices(&mut device, "cube", &v, &i).submesh(0).unwrap()
    }

    fn job(
        id: u32,
        priority: i32,
        program: usize,
        material: usize,
        light_mode: Option<LightMode>,
    ) -> RenderJob {
        let drawable = submesh();
        RenderJob {
            entity: Entity::from_bits((1u64 << 32) | id as u64).unwrap(),
            world: Mat4::IDENTITY,
            drawable,
            material: Handle::new(material),
            effect: Handle::new(0),
            pass: 0,
            light: None,
            key: SortKey {
                priority,
                program: Handle::new(program),
                light_mode,
                pass: (Handle::new(0), 0),
                material: Handle::new(material),
                drawable: (Handle::new(0), 0),
            },
        }
    }

    #[test]
    fn priority_dominates_program() {
        let mut queue = RenderQueue::new();
        queue.push(job(0, 3000, 0, 0, None));
        queue.push(job(1, 1000, 5, 0, None));
        queue.push(job(2, 1000, 1, 0, None));
        queue.sort();
        let order: Vec<_> = queue.iter().map(|j| j.entity.id()).collect();
        assert_eq!(order, vec![2, 1, 0]);
    }

    #[test]
    fn base_passes_precede_additive_within_program() {
        let mut queue = RenderQueue::new();
        queue.push(job(0, 1000, 0, 0, Some(LightMode::ForwardAdd)));
        queue.push(job(1, 1000, 0, 1, Some(LightMode::ForwardBase)));
        queue.sort();
        assert_eq!(queue.jobs()[0].key.light_mode, Some(LightMode::ForwardBase));
    }

    #[test]
    fn equal_keys_keep_insertion_order_across_shuffles() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut jobs: Vec<RenderJob> = (0..64)
            .map(|i| job(i, 1000 * (i as i32 % 3), (i % 4) as usize, 0, None))
            .collect();

        let sorted_ids = |jobs: &[RenderJob]| {
            let mut queue = RenderQueue::new();
            for j in jobs {
                queue.push(*j);
            }
            queue.sort();
            queue.iter().map(|j| j.entity.id()).collect::<Vec<_>>()
        };

        let baseline = sorted_ids(&jobs);
        for _ in 0..8 {
            let again = sorted_ids(&jobs);
            assert_eq!(again, baseline);
        }

        // equal-key groups follow insertion order whatever that order is
        jobs.shuffle(&mut rng);
        let shuffled = sorted_ids(&jobs);
        for pair in shuffled.windows(2) {
            let a = jobs.iter().position(|j| j.entity.id() == pair[0]).unwrap();
            let b = jobs.iter().position(|j| j.entity.id() == pair[1]).unwrap();
            let ka = jobs[a].key;
            let kb = jobs[b].key;
            assert!(ka < kb || (ka == kb && a < b));
        }
    }

    #[test]
    fn lights_sort_by_type_then_priority_then_registration() {
        let entity = |i: u32| Entity::from_bits((1u64 << 32) | i as u64).unwrap();
        let queued = |i, light| QueuedLight {
            entity: entity(i),
            light,
            transform: Transform::default(),
        };
        let mut lights = vec![
            queued(0, Light { priority: 1, ..Light::point(Vec3::ONE, 1.0, 5.0) }),
            queued(1, Light::spot(Vec3::ONE, 1.0, 5.0, 20.0)),
            queued(2, Light::point(Vec3::ONE, 1.0, 5.0)),
            queued(3, Light::directional(Vec3::ONE, 1.0)),
            queued(4, Light::point(Vec3::ONE, 1.0, 2.0)),
        ];
        sort_lights(&mut lights);

        let order: Vec<_> = lights.iter().map(|l| l.entity.id()).collect();
        assert_eq!(order, vec![3, 2, 4, 0, 1]);
        assert_eq!(lights[0].light.light_type, LightType::Directional);
    }
}
