//! Scene-space primitives
//!
//! Bounding volumes, planes and the camera frustum shared by the mesh
//! renderer and the quadtree.

mod bounds;
mod camera;

pub use bounds::{AABB, BoundingSphere, Frustum, Intersection, Plane};
pub use camera::Camera;
