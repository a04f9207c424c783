use super::vertex::{v, Vertex};
use std::f32::consts::PI;

/// Index range of one piece of a combined mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    pub first: u32,
    pub count: u32,
}

/// UV sphere of radius 0.5, used for demo geometry.
pub fn sphere_mesh(segments: u32, rings: u32) -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for ring in 0..=rings {
        let phi = PI * ring as f32 / rings as f32;
        let y = phi.cos();
        let ring_radius = phi.sin();

        for segment in 0..=segments {
            let theta = 2.0 * PI * segment as f32 / segments as f32;
            let x = ring_radius * theta.cos();
            let z = ring_radius * theta.sin();

            let u = segment as f32 / segments as f32;
            let tex_v = ring as f32 / rings as f32;

            vertices.push(v([x * 0.5, y * 0.5, z * 0.5], [x, y, z], [u, tex_v]));
        }
    }

    for ring in 0..rings {
        for segment in 0..segments {
            let current = ring * (segments + 1) + segment;
            let next = current + segments + 1;

            indices.extend_from_slice(&[current, next, current + 1]);
            indices.extend_from_slice(&[current + 1, next, next + 1]);
        }
    }

    (vertices, indices)
}

/// Unit cube centred on the origin with per-face normals.
pub fn cube_mesh() -> (Vec<Vertex>, Vec<u32>) {
    // (normal, tangent u, tangent v) per face
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (n, t, b) in faces {
        let base = vertices.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let p = [
                0.5 * (n[0] + su * t[0] + sv * b[0]),
                0.5 * (n[1] + su * t[1] + sv * b[1]),
                0.5 * (n[2] + su * t[2] + sv * b[2]),
            ];
            vertices.push(v(p, n, [(su + 1.0) * 0.5, (1.0 - sv) * 0.5]));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    (vertices, indices)
}

pub const LIGHT_SPHERE_RINGS: u32 = 6;
pub const LIGHT_SPHERE_SECTORS: u32 = 12;

/// Radius that makes the faceted sphere enclose the unit sphere.
pub fn light_sphere_radius() -> f32 {
    1.0 / (PI / LIGHT_SPHERE_SECTORS as f32).cos()
}

/// Geometry for deferred light volumes: a full-screen quad in clip space
/// followed by a low-poly sphere. Both are position-only.
pub struct LightVolumeGeometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub quad: IndexRange,
    pub sphere: IndexRange,
}

pub fn light_volume_geometry() -> LightVolumeGeometry {
    let mut vertices = vec![
        Vertex::at([-1.0, -1.0, -1.0]),
        Vertex::at([1.0, -1.0, -1.0]),
        Vertex::at([-1.0, 1.0, -1.0]),
        Vertex::at([1.0, 1.0, -1.0]),
    ];
    let mut indices = vec![0, 1, 2, 2, 1, 3];
    let quad = IndexRange { first: 0, count: 6 };

    let base = vertices.len() as u32;
    let (sphere_vertices, sphere_indices) =
        faceted_sphere(LIGHT_SPHERE_RINGS, LIGHT_SPHERE_SECTORS, light_sphere_radius());
    vertices.extend(sphere_vertices);
    let sphere = IndexRange {
        first: indices.len() as u32,
        count: sphere_indices.len() as u32,
    };
    indices.extend(sphere_indices.into_iter().map(|i| i + base));

    LightVolumeGeometry {
        vertices,
        indices,
        quad,
        sphere,
    }
}

/// Pole vertices plus `rings - 1` rings of `sectors` vertices.
fn faceted_sphere(rings: u32, sectors: u32, radius: f32) -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = vec![Vertex::at([0.0, radius, 0.0])];
    for ring in 1..rings {
        let phi = PI * ring as f32 / rings as f32;
        let y = phi.cos() * radius;
        let r = phi.sin() * radius;
        for sector in 0..sectors {
            let theta = 2.0 * PI * sector as f32 / sectors as f32;
            vertices.push(Vertex::at([r * theta.cos(), y, r * theta.sin()]));
        }
    }
    let bottom = vertices.len() as u32;
    vertices.push(Vertex::at([0.0, -radius, 0.0]));

    let ring_start = |ring: u32| 1 + (ring - 1) * sectors;
    let mut indices = Vec::new();

    for s in 0..sectors {
        let next = (s + 1) % sectors;
        indices.extend_from_slice(&[0, ring_start(1) + next, ring_start(1) + s]);
    }

    for ring in 1..rings - 1 {
        let top = ring_start(ring);
        let low = ring_start(ring + 1);
        for s in 0..sectors {
            let next = (s + 1) % sectors;
            indices.extend_from_slice(&[top + s, top + next, low + s]);
            indices.extend_from_slice(&[low + s, top + next, low + next]);
        }
    }

    let last = ring_start(rings - 1);
    for s in 0..sectors {
        let next = (s + 1) % sectors;
        indices.extend_from_slice(&[bottom, last + s, last + next]);
    }

    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn light_volume_layout() {
        let geometry = light_volume_geometry();
        assert_eq!(geometry.vertices.len(), 4 + 62);
        assert_eq!(geometry.quad, IndexRange { first: 0, count: 6 });
        assert_eq!(geometry.sphere, IndexRange { first: 6, count: 360 });
        assert!(geometry
            .indices
            .iter()
            .all(|&i| (i as usize) < geometry.vertices.len()));
    }

    #[test]
    fn light_sphere_encloses_unit_sphere() {
        let geometry = light_volume_geometry();
        let r = light_sphere_radius();
        for vertex in &geometry.vertices[4..] {
            let len = glam::Vec3::from(vertex.position).length();
            assert!((len - r).abs() < 1e-5);
        }
        // centre of every face lies at or beyond the unit sphere's surface
        let s = geometry.sphere;
        for tri in geometry.indices[s.first as usize..(s.first + s.count) as usize].chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]]
                .map(|i| glam::Vec3::from(geometry.vertices[i as usize].position));
            let normal = (b - a).cross(c - a).normalize();
            assert!(normal.dot(a) > 0.95, "face not outward or too close");
        }
    }

    #[test]
    fn cube_is_closed_and_unit_sized() {
        let (vertices, indices) = cube_mesh();
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        for vertex in vertices {
            assert!(vertex.position.iter().all(|c| c.abs() == 0.5));
        }
    }
}
