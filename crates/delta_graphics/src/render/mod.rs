//! # Rendering System
//!
//! The animated-mesh pipeline: materials, meshes and models built from SMD
//! files, drawn through an abstract device.
//!
//! ## Architecture
//!
//! - **Device**: [`GraphicsDevice`], [`ShaderFactory`] and [`TextureFactory`]
//!   hide the GPU behind opaque handles
//! - **Renderer**: camera, world-matrix stack and deferred draws
//! - **Model**: an ordered mesh hierarchy with its materials and bone texture
//! - **Mesh / MeshPart**: welded vertex buffers and per-material index batches
//!
//! Everything that touches the GPU receives a [`Graphics`] context
//! explicitly; there is no global device.

pub mod device;
pub mod headless;
pub mod material;
pub mod material_collection;
pub mod mesh;
pub mod mesh_part;
pub mod model;
pub mod renderer;
pub mod vertex;

pub use device::{
    BlendMode, BufferDesc, BufferId, BufferUsage, CullMode, GpuResource, GraphicsDevice, LockGuard, ShaderDefine,
    ShaderEffect, ShaderFactory, Texture, TextureFactory, TextureId, TextureOptions, VertexDeclaration,
};
pub use headless::{HeadlessDevice, HeadlessShaderFactory, HeadlessTextureFactory};
pub use material::{Material, MaterialBuildOptions};
pub use material_collection::{MaterialCollection, MaterialId};
pub use mesh::{Mesh, MeshId, ParentRef};
pub use mesh_part::{MeshPart, RenderClass};
pub use model::{CustomMeshRenderer, Model, ModelId};
pub use renderer::{DebugGeometry, DebugShape, DeferredMesh, Renderer};
pub use vertex::{PackedVertex, VertexWelder};

use thiserror::Error;

use crate::assets::AttributeAnimationFactory;
use crate::config::GraphicsConfig;

/// # Graphics Context
///
/// Everything a load or draw needs from the outside world: the device, the
/// shader and texture factories, the shared attribute animations, the
/// frame renderer and the device configuration.
///
/// Fields are public so callers can borrow them independently, e.g. the
/// device mutably while reading the renderer.
pub struct Graphics {
    /// GPU device
    pub device: Box<dyn GraphicsDevice>,

    /// Texture loader
    pub textures: Box<dyn TextureFactory>,

    /// Effect compiler
    pub shaders: Box<dyn ShaderFactory>,

    /// Shared attribute animations, advanced once per frame
    pub animations: AttributeAnimationFactory,

    /// Frame state
    pub renderer: Renderer,

    /// Capabilities and pipeline constants
    pub config: GraphicsConfig,
}

impl Graphics {
    /// Context over the given device and factories
    pub fn new(
        device: Box<dyn GraphicsDevice>,
        textures: Box<dyn TextureFactory>,
        shaders: Box<dyn ShaderFactory>,
        config: GraphicsConfig,
    ) -> Self {
        Self {
            device,
            textures,
            shaders,
            animations: AttributeAnimationFactory::new(),
            renderer: Renderer::new(),
            config,
        }
    }

    /// Context backed by the in-memory device
    pub fn headless(config: GraphicsConfig) -> Self {
        Self::new(
            Box::new(HeadlessDevice::new()),
            Box::<HeadlessTextureFactory>::default(),
            Box::<HeadlessShaderFactory>::default(),
            config,
        )
    }

    /// The device, if it is a [`HeadlessDevice`]
    pub fn headless_device(&self) -> Option<&HeadlessDevice> {
        self.device.as_any().downcast_ref()
    }

    /// The shader factory, if it is a [`HeadlessShaderFactory`]
    pub fn headless_shaders(&self) -> Option<&HeadlessShaderFactory> {
        self.shaders.as_any().downcast_ref()
    }

    /// The texture factory, if it is a [`HeadlessTextureFactory`]
    pub fn headless_textures(&self) -> Option<&HeadlessTextureFactory> {
        self.textures.as_any().downcast_ref()
    }

    /// Advance world time and every attribute animation by `elapsed` milliseconds
    pub fn update(&mut self, elapsed: f32) {
        self.renderer.update(elapsed);
        self.animations.update(elapsed);
    }
}

impl std::fmt::Debug for Graphics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graphics")
            .field("renderer", &self.renderer)
            .field("animations", &self.animations.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Rendering system errors
///
/// Covers resource creation, mapping and draw failures. Resource errors
/// are usually recovered at the call site by drawing without the resource.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Resource creation or management failed
    ///
    /// Occurs when GPU resources (buffers, textures) cannot be created,
    /// typically due to memory constraints or invalid sizes.
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// A resource could not be mapped or written
    #[error("Buffer lock failed: {0}")]
    BufferLockFailed(String),

    /// Bone matrices do not match the skeleton they are uploaded for
    ///
    /// The bone texture holds exactly one matrix per ordered skeleton mesh.
    #[error("Bone count mismatch: expected {expected}, got {actual}")]
    BoneCountMismatch {
        /// Ordered meshes in the skeleton
        expected: usize,
        /// Matrices supplied
        actual: usize,
    },

    /// A rendering operation failed during execution
    #[error("Rendering failed: {0}")]
    RenderingFailed(String),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_context_downcasts() {
        let gfx = Graphics::headless(GraphicsConfig::default());
        assert!(gfx.headless_device().is_some());
        assert!(gfx.headless_shaders().is_some());
        assert!(gfx.headless_textures().unwrap().is_empty());
    }

    #[test]
    fn bone_mismatch_message_names_both_counts() {
        let error = RenderError::BoneCountMismatch { expected: 3, actual: 2 };
        assert_eq!(error.to_string(), "Bone count mismatch: expected 3, got 2");
    }
}
