//! # Camera
//!
//! Perspective camera producing view/projection matrices and the culling
//! frustum used by model, mesh and quadtree rendering.
//!
//! ## Coordinate System
//! Left-handed, Y-up render space:
//! - X+ = Right
//! - Y+ = Up
//! - Z+ = Forward, away from the viewer
//!
//! Model files store Z-up data; meshes flip Y and Z when moving into
//! render space, so everything the camera sees is already Y-up.

use crate::foundation::math::{Mat4, Vec3};
use crate::scene::bounds::{Frustum, Plane};

/// Perspective camera with a cached frustum
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera position in world space
    pub eye: Vec3,

    /// Point the camera is looking at in world space
    pub target: Vec3,

    /// Up vector for camera orientation (typically [0, 1, 0])
    pub up: Vec3,

    /// Vertical field of view in radians
    pub fov: f32,

    /// Aspect ratio (width / height)
    pub aspect: f32,

    /// Distance to near clipping plane
    pub near: f32,

    /// Distance to far clipping plane
    pub far: f32,

    frustum: Frustum,
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(
            Vec3::new(0.0, 0.0, -10.0),
            Vec3::zeros(),
            std::f32::consts::FRAC_PI_4,
            4.0 / 3.0,
            1.0,
            10_000.0,
        )
    }
}

impl Camera {
    /// Create a perspective camera looking from `eye` at `target` with a Y-up vector
    pub fn perspective(eye: Vec3, target: Vec3, fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            eye,
            target,
            up: Vec3::y(),
            fov,
            aspect,
            near,
            far,
            frustum: Frustum::new([Plane::new(Vec3::z(), 0.0); 6]),
        };
        camera.update_frustum();
        camera
    }

    /// Move the camera and rebuild the frustum
    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        self.eye = eye;
        self.target = target;
        self.up = up;
        self.update_frustum();
    }

    /// Change the projection and rebuild the frustum
    pub fn define(&mut self, fov: f32, aspect: f32, near: f32, far: f32) {
        self.fov = fov;
        self.aspect = aspect;
        self.near = near;
        self.far = far;
        self.update_frustum();
    }

    /// Active culling frustum
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Orthonormal camera basis (right, up, forward)
    fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let forward = (self.target - self.eye).normalize();
        let right = self.up.cross(&forward).normalize();
        let up = forward.cross(&right);
        (right, up, forward)
    }

    /// Left-handed view matrix
    pub fn view_matrix(&self) -> Mat4 {
        let (right, up, forward) = self.basis();

        Mat4::new(
            right.x, right.y, right.z, -right.dot(&self.eye),
            up.x, up.y, up.z, -up.dot(&self.eye),
            forward.x, forward.y, forward.z, -forward.dot(&self.eye),
            0.0, 0.0, 0.0, 1.0,
        )
    }

    /// Left-handed perspective projection with depth in [0, 1]
    pub fn projection_matrix(&self) -> Mat4 {
        let y_scale = 1.0 / (self.fov * 0.5).tan();
        let x_scale = y_scale / self.aspect;
        let depth = self.far / (self.far - self.near);

        Mat4::new(
            x_scale, 0.0, 0.0, 0.0,
            0.0, y_scale, 0.0, 0.0,
            0.0, 0.0, depth, -self.near * depth,
            0.0, 0.0, 1.0, 0.0,
        )
    }

    /// Rebuild the six inward-facing planes from the camera geometry
    fn update_frustum(&mut self) {
        let (right, up, forward) = self.basis();

        let tan_half = (self.fov * 0.5).tan();
        let near_height = self.near * tan_half;
        let near_width = near_height * self.aspect;

        let near_center = self.eye + forward * self.near;
        let far_center = self.eye + forward * self.far;

        let top_point = near_center + up * near_height;
        let bottom_point = near_center - up * near_height;
        let left_point = near_center - right * near_width;
        let right_point = near_center + right * near_width;

        let top_dir = (top_point - self.eye).normalize();
        let bottom_dir = (bottom_point - self.eye).normalize();
        let left_dir = (left_point - self.eye).normalize();
        let right_dir = (right_point - self.eye).normalize();

        self.frustum = Frustum::new([
            Plane::from_point_normal(near_center, forward),
            Plane::from_point_normal(far_center, -forward),
            Plane::from_point_normal(left_point, up.cross(&left_dir)),
            Plane::from_point_normal(right_point, right_dir.cross(&up)),
            Plane::from_point_normal(top_point, right.cross(&top_dir)),
            Plane::from_point_normal(bottom_point, bottom_dir.cross(&right)),
        ]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::bounds::{AABB, BoundingSphere, Intersection};
    use approx::assert_relative_eq;

    fn camera() -> Camera {
        Camera::perspective(Vec3::zeros(), Vec3::z(), std::f32::consts::FRAC_PI_2, 1.0, 1.0, 100.0)
    }

    #[test]
    fn boxes_in_front_are_visible() {
        let aabb = AABB::from_center_extents(Vec3::new(0.0, 0.0, 20.0), Vec3::repeat(1.0));
        assert_eq!(camera().frustum().classify_aabb(&aabb), Intersection::Inside);
    }

    #[test]
    fn boxes_behind_or_beside_are_culled() {
        let frustum = camera();
        let behind = AABB::from_center_extents(Vec3::new(0.0, 0.0, -20.0), Vec3::repeat(1.0));
        let left = AABB::from_center_extents(Vec3::new(-50.0, 0.0, 10.0), Vec3::repeat(1.0));
        let above = AABB::from_center_extents(Vec3::new(0.0, 50.0, 10.0), Vec3::repeat(1.0));
        let beyond = AABB::from_center_extents(Vec3::new(0.0, 0.0, 500.0), Vec3::repeat(1.0));

        for aabb in [behind, left, above, beyond] {
            assert!(!frustum.frustum().intersects_aabb(&aabb), "{aabb:?} should be culled");
        }
    }

    #[test]
    fn spheres_use_radius_slack() {
        let frustum = camera();
        let near_miss = BoundingSphere::new(Vec3::new(0.0, 0.0, 0.5), 1.0);
        assert!(frustum.frustum().intersects_sphere(&near_miss));
    }

    #[test]
    fn view_matrix_moves_target_onto_forward_axis() {
        let camera = Camera::perspective(
            Vec3::new(0.0, 0.0, -10.0),
            Vec3::zeros(),
            std::f32::consts::FRAC_PI_4,
            1.0,
            1.0,
            100.0,
        );
        let target_in_view = camera.view_matrix().transform_point(&Vec3::zeros().into());
        assert_relative_eq!(target_in_view.coords, Vec3::new(0.0, 0.0, 10.0), epsilon = 1e-5);
    }
}
