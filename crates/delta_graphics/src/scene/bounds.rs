//! Bounding volumes and frustum tests
//!
//! World-space boxes and spheres computed for meshes and models, plus the
//! six-plane frustum they are culled against.

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};

/// Result of a containment test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intersection {
    /// Entirely outside
    Outside,
    /// Straddles the boundary
    Intersect,
    /// Entirely inside
    Inside,
}

/// Axis-Aligned Bounding Box for spatial queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Default for AABB {
    fn default() -> Self {
        Self::empty()
    }
}

impl AABB {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// An inverted box that any point or merge will replace
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(f32::MAX),
            max: Vec3::repeat(f32::MIN),
        }
    }

    /// Create an AABB centered at a point with given extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Smallest box containing every point
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut aabb = Self::empty();
        for point in points {
            aabb.extend(point);
        }
        aabb
    }

    /// True once at least one point has been added
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Full edge lengths
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Grow to include a point
    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.inf(&point);
        self.max = self.max.sup(&point);
    }

    /// Smallest box containing both boxes
    pub fn merged(&self, other: &AABB) -> AABB {
        if !other.is_valid() {
            return *self;
        }
        if !self.is_valid() {
            return *other;
        }
        AABB::new(self.min.inf(&other.min), self.max.sup(&other.max))
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Check if another box lies entirely inside this one
    pub fn contains(&self, other: &AABB) -> bool {
        self.contains_xz(other) && other.min.y >= self.min.y && other.max.y <= self.max.y
    }

    /// Containment on the X and Z axes only; Y is unbounded
    pub fn contains_xz(&self, other: &AABB) -> bool {
        other.min.x >= self.min.x && other.max.x <= self.max.x &&
        other.min.z >= self.min.z && other.max.z <= self.max.z
    }

    /// Check if this AABB intersects another AABB
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Box moved by an offset
    pub fn translated(&self, offset: Vec3) -> AABB {
        AABB::new(self.min + offset, self.max + offset)
    }

    /// Conservative box around this box after an affine transform.
    ///
    /// The center is transformed; the extents are projected through the
    /// absolute value of the linear part.
    pub fn transformed(&self, transform: &Mat4) -> AABB {
        let center = self.center();
        let extents = self.extents();
        let new_center = transform.transform_point(&center.into()).coords;

        let mut new_extents = Vec3::zeros();
        for row in 0..3 {
            new_extents[row] = (0..3)
                .map(|column| transform[(row, column)].abs() * extents[column])
                .sum();
        }

        AABB::from_center_extents(new_center, new_extents)
    }

    /// Box translated by the translation part of a matrix
    pub fn translated_by(&self, transform: &Mat4) -> AABB {
        self.translated(transform.translation_part())
    }
}

/// Bounding sphere
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingSphere {
    /// Center in world space
    pub center: Vec3,
    /// Radius; zero means "not computed yet"
    pub radius: f32,
}

impl BoundingSphere {
    /// Create a sphere
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Conservative sphere around a box: half of its largest edge
    pub fn around(aabb: &AABB) -> Self {
        Self {
            center: aabb.center(),
            radius: aabb.size().max() * 0.5,
        }
    }

    /// Sphere moved by an offset
    pub fn translated(&self, offset: Vec3) -> Self {
        Self::new(self.center + offset, self.radius)
    }
}

/// Frustum for visibility culling
#[derive(Debug, Clone)]
pub struct Frustum {
    /// Six inward-facing planes (near, far, left, right, top, bottom)
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Create a frustum from six planes
    pub fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Classify a box against the frustum
    pub fn classify_aabb(&self, aabb: &AABB) -> Intersection {
        let mut result = Intersection::Inside;

        for plane in &self.planes {
            // Corner furthest along the normal
            let mut p = aabb.min;
            if plane.normal.x >= 0.0 { p.x = aabb.max.x; }
            if plane.normal.y >= 0.0 { p.y = aabb.max.y; }
            if plane.normal.z >= 0.0 { p.z = aabb.max.z; }

            // If this point is outside the plane, the entire AABB is outside
            if plane.distance_to_point(p) < 0.0 {
                return Intersection::Outside;
            }

            let mut n = aabb.max;
            if plane.normal.x >= 0.0 { n.x = aabb.min.x; }
            if plane.normal.y >= 0.0 { n.y = aabb.min.y; }
            if plane.normal.z >= 0.0 { n.z = aabb.min.z; }

            if plane.distance_to_point(n) < 0.0 {
                result = Intersection::Intersect;
            }
        }

        result
    }

    /// Check if an AABB is inside or intersects the frustum
    pub fn intersects_aabb(&self, aabb: &AABB) -> bool {
        self.classify_aabb(aabb) != Intersection::Outside
    }

    /// Check if a sphere is inside or intersects the frustum
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(sphere.center) >= -sphere.radius)
    }
}

/// Plane defined by normal and distance from origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Normal vector (should be normalized)
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a new plane from normal and distance
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal: normal.normalize(), distance }
    }

    /// Plane through a point with the given normal
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize();
        Self { normal, distance: -normal.dot(&point) }
    }

    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box() -> AABB {
        AABB::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn empty_box_merges_to_other() {
        let merged = AABB::empty().merged(&unit_box());
        assert_eq!(merged, unit_box());
        assert!(!AABB::empty().is_valid());
    }

    #[test]
    fn xz_containment_ignores_height() {
        let outer = AABB::new(Vec3::new(-10.0, 0.0, -10.0), Vec3::new(10.0, 1.0, 10.0));
        let tall = AABB::new(Vec3::new(-1.0, -50.0, -1.0), Vec3::new(1.0, 50.0, 1.0));
        assert!(outer.contains_xz(&tall));
        assert!(!outer.contains(&tall));
    }

    #[test]
    fn transformed_box_follows_rotation() {
        let flat = AABB::new(Vec3::new(-2.0, -1.0, -1.0), Vec3::new(2.0, 1.0, 1.0));
        let rotation = Mat4::rotation_z(std::f32::consts::FRAC_PI_2);
        let rotated = flat.transformed(&(Mat4::new_translation(&Vec3::new(0.0, 0.0, 5.0)) * rotation));

        assert_relative_eq!(rotated.extents(), Vec3::new(1.0, 2.0, 1.0), epsilon = 1e-5);
        assert_relative_eq!(rotated.center(), Vec3::new(0.0, 0.0, 5.0), epsilon = 1e-5);
    }

    #[test]
    fn sphere_uses_half_of_largest_edge() {
        let aabb = AABB::new(Vec3::zeros(), Vec3::new(2.0, 8.0, 4.0));
        let sphere = BoundingSphere::around(&aabb);
        assert_relative_eq!(sphere.radius, 4.0);
        assert_relative_eq!(sphere.center, Vec3::new(1.0, 4.0, 2.0));
    }

    #[test]
    fn frustum_classifies_boxes() {
        // Axis-aligned slab x in [-5, 5], y in [-5, 5], z in [1, 100]
        let frustum = Frustum::new([
            Plane::from_point_normal(Vec3::new(0.0, 0.0, 1.0), Vec3::z()),
            Plane::from_point_normal(Vec3::new(0.0, 0.0, 100.0), -Vec3::z()),
            Plane::from_point_normal(Vec3::new(-5.0, 0.0, 0.0), Vec3::x()),
            Plane::from_point_normal(Vec3::new(5.0, 0.0, 0.0), -Vec3::x()),
            Plane::from_point_normal(Vec3::new(0.0, 5.0, 0.0), -Vec3::y()),
            Plane::from_point_normal(Vec3::new(0.0, -5.0, 0.0), Vec3::y()),
        ]);

        let inside = unit_box().translated(Vec3::new(0.0, 0.0, 10.0));
        let straddling = unit_box().translated(Vec3::new(5.0, 0.0, 10.0));
        let behind = unit_box().translated(Vec3::new(0.0, 0.0, -10.0));

        assert_eq!(frustum.classify_aabb(&inside), Intersection::Inside);
        assert_eq!(frustum.classify_aabb(&straddling), Intersection::Intersect);
        assert_eq!(frustum.classify_aabb(&behind), Intersection::Outside);
        assert!(frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(0.0, 0.0, 0.5), 1.0)));
        assert!(!frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(0.0, 0.0, -3.0), 1.0)));
    }
}
