use crate::renderer::culling::Aabb;
use crate::renderer::device::{GeometryDesc, GeometryId, GraphicsDevice};
use crate::renderer::primitives::IndexRange;
use crate::renderer::Vertex;

/// Something that can be bound and drawn with a single indexed call.
pub trait Drawable {
    fn bind(&self, device: &mut dyn GraphicsDevice);
    fn draw(&self, device: &mut dyn GraphicsDevice);
    /// Local-space bounds.
    fn bounds(&self) -> Aabb;
    fn triangle_count(&self) -> u32;
}

/// One index range of a [`Mesh`]. Cheap to copy into render jobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubMesh {
    geometry: GeometryId,
    range: IndexRange,
    bounds: Aabb,
}

impl SubMesh {
    pub fn geometry(&self) -> GeometryId {
        self.geometry
    }

    pub fn range(&self) -> IndexRange {
        self.range
    }
}

impl Drawable for SubMesh {
    fn bind(&self, device: &mut dyn GraphicsDevice) {
        device.bind_geometry(Some(self.geometry));
    }

    fn draw(&self, device: &mut dyn GraphicsDevice) {
        device.draw_indexed(self.range.first, self.range.count);
    }

    fn bounds(&self) -> Aabb {
        self.bounds
    }

    fn triangle_count(&self) -> u32 {
        self.range.count / 3
    }
}

/// Uploaded vertex/index data split into submeshes, one per material slot.
#[derive(Debug, Clone)]
pub struct Mesh {
    geometry: GeometryId,
    bounds: Aabb,
    submeshes: Vec<SubMesh>,
}

impl Mesh {
    pub fn from_vertices(
        device: &mut dyn GraphicsDevice,
        label: &str,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Self {
        let whole = IndexRange {
            first: 0,
            count: indices.len() as u32,
        };
        Self::with_submeshes(device, label, vertices, indices, &[whole])
    }

    /// Uploads one geometry and splits it along `ranges`. Ranges reaching
    /// past the index buffer are clamped.
    pub fn with_submeshes(
        device: &mut dyn GraphicsDevice,
        label: &str,
        vertices: &[Vertex],
        indices: &[u32],
        ranges: &[IndexRange],
    ) -> Self {
        let geometry = device.upload_geometry(&GeometryDesc {
            label: Some(label),
            vertices: bytemuck::cast_slice(vertices),
            layout: Vertex::layout(),
            indices,
        });

        let bounds_of = |indices: &[u32]| {
            Aabb::from_points(
                indices
                    .iter()
                    .filter_map(|&i| vertices.get(i as usize))
                    .map(|v| glam::Vec3::from(v.position)),
            )
            .unwrap_or(Aabb::new(glam::Vec3::ZERO, glam::Vec3::ZERO))
        };

        let total = indices.len() as u32;
        let submeshes = ranges
            .iter()
            .map(|range| {
                let first = range.first.min(total);
                let count = range.count.min(total - first);
                SubMesh {
                    geometry,
                    range: IndexRange { first, count },
                    bounds: bounds_of(&indices[first as usize..(first + count) as usize]),
                }
            })
            .collect();

        Self {
            geometry,
            bounds: bounds_of(indices),
            submeshes,
        }
    }

    pub fn geometry(&self) -> GeometryId {
        self.geometry
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn submesh(&self, index: usize) -> Option<&SubMesh> {
        self.submeshes.get(index)
    }

    pub fn submeshes(&self) -> &[SubMesh] {
        &self.submeshes
    }

    pub fn submesh_count(&self) -> usize {
        self.submeshes.len()
    }
}
