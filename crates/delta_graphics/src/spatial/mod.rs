//! Spatial partitioning data structures
//!
//! Partitions a model's meshes so invisible regions are skipped as a whole
//! and the visible ones are drawn in blending order.

mod quadtree;

pub use quadtree::{Node, NodeId, Quadtree, DEFAULT_MAX_MESHES, MAX_DEPTH};
