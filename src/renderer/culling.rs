// renderer/culling.rs
//! Bounding volumes and the intersection tests used for view frustum and
//! light culling. Degenerate input (non-finite values, inverted boxes,
//! negative radii) always tests as intersecting.

use glam::{Mat3, Mat4, Quat, Vec3, Vec4};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |b, p| {
            Self::new(b.min.min(p), b.max.max(p))
        }))
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half size along each axis.
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min.cmple(self.max).all()
    }

    /// Component-wise scale about the origin; negative factors keep the box
    /// well-formed.
    pub fn scaled(&self, scale: Vec3) -> Self {
        let a = self.min * scale;
        let b = self.max * scale;
        Self::new(a.min(b), a.max(b))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    fn is_valid(&self) -> bool {
        self.center.is_finite() && self.radius.is_finite() && self.radius >= 0.0
    }
}

/// Oriented box: center, half extents along the columns of `axes`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obb {
    pub center: Vec3,
    pub extents: Vec3,
    pub axes: Mat3,
}

impl Obb {
    /// World-space box of local bounds placed by translation, rotation and scale.
    pub fn from_local(bounds: &Aabb, translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        // signed scale places mirrored bounds, the ordered result keeps extents positive
        let scaled = bounds.scaled(scale);
        Self {
            center: translation + rotation * scaled.center(),
            extents: scaled.extents(),
            axes: Mat3::from_quat(rotation),
        }
    }

    fn is_valid(&self) -> bool {
        self.center.is_finite()
            && self.extents.is_finite()
            && self.extents.cmpge(Vec3::ZERO).all()
            && self.axes.is_finite()
    }
}

/// `normal . p + d >= 0` on the inner side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    fn from_vec4(v: Vec4) -> Self {
        let normal = v.truncate();
        let len = normal.length();
        if len > 0.0 {
            Self {
                normal: normal / len,
                d: v.w / len,
            }
        } else {
            Self { normal, d: v.w }
        }
    }

    pub fn distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) + self.d
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// left, right, bottom, top, near, far
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extracts the normalized planes of a view-projection matrix.
    pub fn from_matrix(vp: &Mat4) -> Self {
        let w = vp.row(3);
        let plane = |i: usize, sign: f32| Plane::from_vec4(w + vp.row(i) * sign);
        Self {
            planes: [
                plane(0, 1.0),
                plane(0, -1.0),
                plane(1, 1.0),
                plane(1, -1.0),
                plane(2, 1.0),
                plane(2, -1.0),
            ],
        }
    }
}

impl Default for Frustum {
    /// A frustum that contains everything.
    fn default() -> Self {
        Self {
            planes: [Plane {
                normal: Vec3::ZERO,
                d: f32::MAX,
            }; 6],
        }
    }
}

/// Squared distance from `center` to the closest point of `aabb`, compared
/// against `radius` squared. Touching counts as intersecting.
pub fn intersect_aabb_sphere(aabb: &Aabb, center: Vec3, radius: f32) -> bool {
    if !aabb.is_valid() || !Sphere::new(center, radius).is_valid() {
        return true;
    }

    let mut dist_sq = 0.0;
    for axis in 0..3 {
        let c = center[axis];
        if c < aabb.min[axis] {
            let d = aabb.min[axis] - c;
            dist_sq += d * d;
        } else if c > aabb.max[axis] {
            let d = c - aabb.max[axis];
            dist_sq += d * d;
        }
    }

    dist_sq <= radius * radius
}

pub fn intersect_sphere_frustum(sphere: &Sphere, frustum: &Frustum) -> bool {
    if !sphere.is_valid() {
        return true;
    }
    frustum
        .planes
        .iter()
        .all(|plane| plane.distance(sphere.center) + sphere.radius >= 0.0)
}

pub fn intersect_obb_frustum(obb: &Obb, frustum: &Frustum) -> bool {
    if !obb.is_valid() {
        return true;
    }
    frustum.planes.iter().all(|plane| {
        let n = plane.normal;
        let r = obb.extents.x * n.dot(obb.axes.x_axis).abs()
            + obb.extents.y * n.dot(obb.axes.y_axis).abs()
            + obb.extents.z * n.dot(obb.axes.z_axis).abs();
        plane.distance(obb.center) + r >= 0.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Aabb {
        Aabb::new(Vec3::ZERO, Vec3::ONE)
    }

    fn camera_frustum() -> Frustum {
        let proj = Mat4::perspective_rh_gl(60f32.to_radians(), 1.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        Frustum::from_matrix(&(proj * view))
    }

    #[test]
    fn aabb_sphere_boundary_is_inclusive() {
        let center = Vec3::new(2.0, 0.5, 0.5);
        assert!(intersect_aabb_sphere(&unit_box(), center, 1.0));
        assert!(!intersect_aabb_sphere(&unit_box(), center, 0.99));
    }

    #[test]
    fn aabb_sphere_corner_distance() {
        let center = Vec3::new(2.0, 2.0, 1.0);
        let r = 2f32.sqrt();
        assert!(intersect_aabb_sphere(&unit_box(), center, r + 1e-4));
        assert!(!intersect_aabb_sphere(&unit_box(), center, r - 1e-3));
    }

    #[test]
    fn sphere_inside_box_intersects() {
        assert!(intersect_aabb_sphere(&unit_box(), Vec3::splat(0.5), 0.0));
    }

    #[test]
    fn degenerate_bounds_are_visible() {
        let inverted = Aabb::new(Vec3::ONE, Vec3::ZERO);
        assert!(intersect_aabb_sphere(&inverted, Vec3::splat(100.0), 1.0));
        let nan = Aabb::new(Vec3::splat(f32::NAN), Vec3::ONE);
        assert!(intersect_aabb_sphere(&nan, Vec3::splat(100.0), 1.0));

        let frustum = camera_frustum();
        let sphere = Sphere::new(Vec3::new(0.0, 0.0, 500.0), f32::INFINITY);
        assert!(intersect_sphere_frustum(&sphere, &frustum));
    }

    #[test]
    fn frustum_planes_are_normalized() {
        for plane in camera_frustum().planes {
            assert!((plane.normal.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn sphere_frustum_in_front_and_behind() {
        let frustum = camera_frustum();
        assert!(intersect_sphere_frustum(
            &Sphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0),
            &frustum
        ));
        assert!(!intersect_sphere_frustum(
            &Sphere::new(Vec3::new(0.0, 0.0, 10.0), 1.0),
            &frustum
        ));
        // behind the camera but reaching through the near plane
        assert!(intersect_sphere_frustum(
            &Sphere::new(Vec3::new(0.0, 0.0, 1.0), 2.0),
            &frustum
        ));
        assert!(!intersect_sphere_frustum(
            &Sphere::new(Vec3::new(0.0, 0.0, -200.0), 1.0),
            &frustum
        ));
    }

    #[test]
    fn obb_frustum_respects_rotation() {
        let frustum = camera_frustum();
        // long thin box to the side of the view, only inside when rotated
        let bounds = Aabb::new(Vec3::new(-0.1, -0.1, -20.0), Vec3::new(0.1, 0.1, 20.0));
        let translation = Vec3::new(25.0, 0.0, -10.0);

        let straight = Obb::from_local(&bounds, translation, Quat::IDENTITY, Vec3::ONE);
        assert!(!intersect_obb_frustum(&straight, &frustum));

        let turned = Obb::from_local(
            &bounds,
            translation,
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            Vec3::ONE,
        );
        assert!(intersect_obb_frustum(&turned, &frustum));
    }

    #[test]
    fn obb_frustum_follows_mirrored_scale() {
        let frustum = camera_frustum();
        // behind the camera until z is mirrored
        let bounds = Aabb::new(Vec3::new(-0.5, -0.5, 5.0), Vec3::new(0.5, 0.5, 6.0));

        let plain = Obb::from_local(&bounds, Vec3::ZERO, Quat::IDENTITY, Vec3::ONE);
        assert!(!intersect_obb_frustum(&plain, &frustum));

        let mirrored = Obb::from_local(
            &bounds,
            Vec3::ZERO,
            Quat::IDENTITY,
            Vec3::new(1.0, 1.0, -1.0),
        );
        assert_eq!(mirrored.center, Vec3::new(0.0, 0.0, -5.5));
        assert_eq!(mirrored.extents, Vec3::splat(0.5));
        assert!(intersect_obb_frustum(&mirrored, &frustum));
    }

    #[test]
    fn scaled_bounds_stay_ordered() {
        let b = unit_box().scaled(Vec3::new(-2.0, 1.0, 3.0));
        assert!(b.is_valid());
        assert_eq!(b.min, Vec3::new(-2.0, 0.0, 0.0));
        assert_eq!(b.max, Vec3::new(0.0, 1.0, 3.0));
    }
}
