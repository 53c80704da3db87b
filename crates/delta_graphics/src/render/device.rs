//! Device abstraction
//!
//! The mesh pipeline talks to the GPU only through [`GraphicsDevice`],
//! [`ShaderFactory`] and [`TextureFactory`]. Resources are opaque handles;
//! mapping memory goes through a [`LockGuard`] that unlocks on drop.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use bytemuck::Pod;

use super::{RenderError, RenderResult};
use crate::foundation::math::Mat4;

/// Handle to a vertex or index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

/// Handle to a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// Any lockable resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuResource {
    /// Vertex or index buffer
    Buffer(BufferId),
    /// Dynamic texture
    Texture(TextureId),
}

/// How often a buffer is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Written once at load
    Static,
    /// Rewritten every frame
    Dynamic,
}

/// Buffer creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Update frequency
    pub usage: BufferUsage,
    /// Bytes per element
    pub element_size: usize,
    /// Number of elements
    pub element_count: usize,
}

impl BufferDesc {
    /// Static buffer of `element_count` values of `T`
    pub fn of<T>(usage: BufferUsage, element_count: usize) -> Self {
        Self {
            usage,
            element_size: std::mem::size_of::<T>(),
            element_count,
        }
    }

    /// Total size in bytes
    pub fn byte_size(&self) -> usize {
        self.element_size * self.element_count
    }
}

/// Vertex stream layout for a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexDeclaration {
    /// Position, normal, color and `n` UV channels
    Textured(usize),
    /// As `Textured`, plus a blend-index stream
    SkinnedTextured(usize),
}

/// Face culling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    /// Draw both sides
    None,
    /// Cull clockwise faces
    Clockwise,
}

/// Blend state selected by a material's blend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlendMode(pub i32);

impl BlendMode {
    /// Opaque
    pub const NONE: Self = Self(0);
}

/// One shader preprocessor define
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDefine {
    /// Macro name
    pub name: String,
    /// Macro value
    pub value: String,
}

impl ShaderDefine {
    /// Define `name` as `1`
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: "1".to_string(),
        }
    }
}

/// GPU device
pub trait GraphicsDevice {
    /// Create a vertex buffer
    fn create_vertex_buffer(&mut self, desc: BufferDesc) -> RenderResult<BufferId>;

    /// Create a 32-bit index buffer
    fn create_index_buffer(&mut self, desc: BufferDesc) -> RenderResult<BufferId>;

    /// Create a dynamic four-channel float texture
    fn create_dynamic_texture(&mut self, width: u32, height: u32) -> RenderResult<TextureId>;

    /// Release a resource; unknown handles are ignored
    fn release(&mut self, resource: GpuResource);

    /// Map a resource for writing. Prefer [`LockGuard::new`].
    fn lock(&mut self, resource: GpuResource) -> RenderResult<()>;

    /// Mapped memory of a locked resource
    fn mapped(&mut self, resource: GpuResource) -> Option<&mut [u8]>;

    /// Unmap a resource
    fn unlock(&mut self, resource: GpuResource);

    /// Bind a vertex stream
    fn set_stream_source(&mut self, stream: u32, buffer: BufferId, stride: usize);

    /// Bind the index buffer
    fn set_indices(&mut self, buffer: BufferId);

    /// Select the vertex layout
    fn set_vertex_declaration(&mut self, declaration: VertexDeclaration);

    /// Bind a texture slot; `None` clears it
    fn set_texture(&mut self, slot: u32, texture: Option<TextureId>);

    /// Set the blend state
    fn set_blend_mode(&mut self, mode: BlendMode);

    /// Set the cull state
    fn set_cull_mode(&mut self, mode: CullMode);

    /// Set the fixed-function world transform
    fn set_world_transform(&mut self, world: &Mat4);

    /// Draw an indexed triangle list
    fn draw_indexed_triangles(&mut self, vertex_count: usize, triangle_count: usize);

    /// Downcast to the concrete device
    fn as_any(&self) -> &dyn Any;
}

/// Scoped mapping of a resource; unlocks when dropped
pub struct LockGuard<'a> {
    device: &'a mut dyn GraphicsDevice,
    resource: GpuResource,
}

impl<'a> LockGuard<'a> {
    /// Lock `resource` on `device`
    pub fn new(device: &'a mut dyn GraphicsDevice, resource: GpuResource) -> RenderResult<Self> {
        device.lock(resource)?;
        Ok(Self { device, resource })
    }

    /// Mapped bytes
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.device.mapped(self.resource).unwrap_or_default()
    }

    /// Copy `data` to the start of the mapping
    pub fn write<T: Pod>(&mut self, data: &[T]) -> RenderResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let resource = self.resource;
        let target = self.bytes_mut();

        if bytes.len() > target.len() {
            return Err(RenderError::BufferLockFailed(format!(
                "{resource:?}: writing {} bytes into a {} byte mapping",
                bytes.len(),
                target.len()
            )));
        }

        target[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.device.unlock(self.resource);
    }
}

/// Create a buffer and fill it with `data`
pub fn create_filled_vertex_buffer<T: Pod>(
    device: &mut dyn GraphicsDevice,
    usage: BufferUsage,
    data: &[T],
) -> RenderResult<BufferId> {
    let buffer = device.create_vertex_buffer(BufferDesc::of::<T>(usage, data.len()))?;
    LockGuard::new(device, GpuResource::Buffer(buffer))?.write(data)?;
    Ok(buffer)
}

/// Create an index buffer and fill it with `indices`
pub fn create_filled_index_buffer(device: &mut dyn GraphicsDevice, indices: &[u32]) -> RenderResult<BufferId> {
    let buffer = device.create_index_buffer(BufferDesc::of::<u32>(BufferUsage::Static, indices.len()))?;
    LockGuard::new(device, GpuResource::Buffer(buffer))?.write(indices)?;
    Ok(buffer)
}

/// Compiled shader effect.
///
/// Effects are shared between materials, so setters take `&self`.
pub trait ShaderEffect: fmt::Debug {
    /// Set an integer parameter
    fn set_int(&self, name: &str, value: i32);

    /// Set a boolean parameter
    fn set_bool(&self, name: &str, value: bool);

    /// Set a float parameter
    fn set_float(&self, name: &str, value: f32);

    /// Set a float array parameter
    fn set_float_array(&self, name: &str, values: &[f32]);

    /// Set a matrix parameter
    fn set_matrix(&self, name: &str, value: &Mat4);

    /// Bind a texture parameter
    fn set_texture(&self, name: &str, texture: Option<TextureId>);

    /// Select the technique
    fn set_technique(&self, name: &str);

    /// Flush parameter changes made inside a pass
    fn commit_changes(&self);

    /// Begin the technique; returns the number of passes
    fn begin(&self) -> u32;

    /// Begin one pass
    fn begin_pass(&self, pass: u32);

    /// End the current pass
    fn end_pass(&self);

    /// End the technique
    fn end(&self);
}

/// Creates shader effects from source files
pub trait ShaderFactory {
    /// Compile `path` with `defines`; `None` when unavailable
    fn create(&mut self, path: &str, defines: &[ShaderDefine]) -> Option<Rc<dyn ShaderEffect>>;

    /// Downcast to the concrete factory
    fn as_any(&self) -> &dyn Any;
}

/// Texture loaded by a [`TextureFactory`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    /// Device handle
    pub id: TextureId,
    /// Source path
    pub path: String,
}

/// Texture creation options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureOptions {
    /// Mip levels to generate
    pub mip_levels: u32,
    /// Released when the owning scene unloads
    pub temporary: bool,
    /// Mip levels to drop
    pub reduce_quality: u32,
}

/// Loads textures from files
pub trait TextureFactory {
    /// Load `path`; `None` when it cannot be loaded
    fn create(&mut self, path: &str, options: TextureOptions) -> Option<Rc<Texture>>;

    /// Downcast to the concrete factory
    fn as_any(&self) -> &dyn Any;
}
