//! # Delta Graphics
//!
//! Animated-mesh pipeline for SMD models.
//!
//! ## Features
//!
//! - **SMD Loading**: Binary model files in the 0.62 and 0.64 layouts
//! - **Mesh Welding**: Shared vertices collapse into one buffer per stream
//! - **Skeletal Animation**: Keyframed hierarchies with GPU or CPU skinning
//! - **Materials**: Binary records, XML overrides and attribute animations
//! - **Quadtree Culling**: Frustum culling and back-to-front transparency
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use delta_graphics::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut gfx = Graphics::headless(GraphicsConfig::default());
//!     let mut model = Model::load("game/models/tower.smd", None, false, &mut gfx)?;
//!
//!     let mut tree = Quadtree::from_config(&gfx.config);
//!     tree.build(&mut model, &mut gfx);
//!
//!     tree.render(&model, &mut gfx);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod assets;
pub mod scene;
pub mod render;
pub mod spatial;

/// Common imports for users of the pipeline
pub mod prelude {
    pub use crate::{
        assets::{AssetError, AssetResult},
        config::{Config, GraphicsConfig},
        foundation::math::{IVec3, Mat4, Vec3},
        render::{
            CustomMeshRenderer, Graphics, Material, MaterialCollection, MaterialId, Mesh, MeshId, Model,
            RenderClass, RenderError, RenderResult,
        },
        scene::{AABB, BoundingSphere, Camera},
        spatial::Quadtree,
    };
}
