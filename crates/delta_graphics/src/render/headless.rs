//! In-memory device
//!
//! Backs buffers and textures with plain byte vectors and records every
//! draw call, so loading and rendering can run without a GPU. Tools use it
//! to inspect models; tests use it to observe what would be drawn.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::device::{
    BlendMode, BufferDesc, BufferId, CullMode, GpuResource, GraphicsDevice, ShaderDefine, ShaderEffect,
    ShaderFactory, Texture, TextureFactory, TextureId, TextureOptions, VertexDeclaration,
};
use super::{RenderError, RenderResult};
use crate::foundation::math::Mat4;

/// Bytes per texel of a dynamic texture (four floats)
const TEXEL_SIZE: usize = 16;

fn decode_f32(data: &[u8]) -> Vec<f32> {
    data.chunks_exact(4)
        .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn decode_u32(data: &[u8]) -> Vec<u32> {
    data.chunks_exact(4)
        .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// A recorded indexed draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    /// Buffer bound to stream 0
    pub position_buffer: Option<BufferId>,
    /// Bound index buffer
    pub index_buffer: Option<BufferId>,
    /// Active vertex layout
    pub declaration: Option<VertexDeclaration>,
    /// Texture in slot 0
    pub texture: Option<TextureId>,
    /// World transform at draw time
    pub world: Mat4,
    /// Vertices addressed by the draw
    pub vertex_count: usize,
    /// Triangles drawn
    pub triangle_count: usize,
}

#[derive(Debug)]
struct HeadlessBuffer {
    desc: BufferDesc,
    index: bool,
    data: Vec<u8>,
    locked: bool,
}

#[derive(Debug)]
struct HeadlessTexture {
    width: u32,
    height: u32,
    data: Vec<u8>,
    locked: bool,
}

/// Device that keeps resources in memory
#[derive(Debug)]
pub struct HeadlessDevice {
    next_id: u64,
    buffers: HashMap<BufferId, HeadlessBuffer>,
    textures: HashMap<TextureId, HeadlessTexture>,
    streams: HashMap<u32, (BufferId, usize)>,
    indices: Option<BufferId>,
    declaration: Option<VertexDeclaration>,
    texture_slots: [Option<TextureId>; 8],
    blend_mode: BlendMode,
    cull_mode: CullMode,
    world: Mat4,
    draw_calls: Vec<DrawCall>,
    /// Fail every resource creation, to exercise degraded paths
    pub fail_allocations: bool,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self {
            next_id: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            streams: HashMap::new(),
            indices: None,
            declaration: None,
            texture_slots: [None; 8],
            blend_mode: BlendMode::NONE,
            cull_mode: CullMode::Clockwise,
            world: Mat4::identity(),
            draw_calls: Vec::new(),
            fail_allocations: false,
        }
    }
}

impl HeadlessDevice {
    /// Empty device
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn create_buffer(&mut self, desc: BufferDesc, index: bool) -> RenderResult<BufferId> {
        if self.fail_allocations || desc.byte_size() == 0 {
            return Err(RenderError::ResourceCreationFailed(format!("buffer {desc:?}")));
        }

        let id = BufferId(self.allocate_id());
        self.buffers.insert(
            id,
            HeadlessBuffer {
                desc,
                index,
                data: vec![0; desc.byte_size()],
                locked: false,
            },
        );
        Ok(id)
    }

    /// Draws recorded so far
    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draw_calls
    }

    /// Forget recorded draws
    pub fn clear_draw_calls(&mut self) {
        self.draw_calls.clear();
    }

    /// Contents of a buffer
    pub fn buffer_data(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.data.as_slice())
    }

    /// Contents of a buffer as `f32`
    pub fn buffer_floats(&self, buffer: BufferId) -> Option<Vec<f32>> {
        self.buffer_data(buffer).map(decode_f32)
    }

    /// Contents of an index buffer
    pub fn buffer_indices(&self, buffer: BufferId) -> Option<Vec<u32>> {
        self.buffers
            .get(&buffer)
            .filter(|b| b.index)
            .map(|b| decode_u32(&b.data))
    }

    /// Creation parameters of a buffer
    pub fn buffer_desc(&self, buffer: BufferId) -> Option<BufferDesc> {
        self.buffers.get(&buffer).map(|b| b.desc)
    }

    /// Contents of a texture as `f32`
    pub fn texture_floats(&self, texture: TextureId) -> Option<Vec<f32>> {
        self.textures.get(&texture).map(|t| decode_f32(&t.data))
    }

    /// Dimensions of a texture
    pub fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&texture).map(|t| (t.width, t.height))
    }

    /// Number of live buffers
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Whether any resource is still mapped
    pub fn has_locked_resources(&self) -> bool {
        self.buffers.values().any(|b| b.locked) || self.textures.values().any(|t| t.locked)
    }

    /// Texture bound to `slot`
    pub fn bound_texture(&self, slot: usize) -> Option<TextureId> {
        self.texture_slots.get(slot).copied().flatten()
    }

    /// Current blend state
    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    /// Current cull state
    pub fn cull_mode(&self) -> CullMode {
        self.cull_mode
    }

    /// Buffer bound to `stream`
    pub fn stream(&self, stream: u32) -> Option<BufferId> {
        self.streams.get(&stream).map(|&(buffer, _)| buffer)
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_vertex_buffer(&mut self, desc: BufferDesc) -> RenderResult<BufferId> {
        self.create_buffer(desc, false)
    }

    fn create_index_buffer(&mut self, desc: BufferDesc) -> RenderResult<BufferId> {
        self.create_buffer(desc, true)
    }

    fn create_dynamic_texture(&mut self, width: u32, height: u32) -> RenderResult<TextureId> {
        if self.fail_allocations || width == 0 || height == 0 {
            return Err(RenderError::ResourceCreationFailed(format!("texture {width}x{height}")));
        }

        let id = TextureId(self.allocate_id());
        self.textures.insert(
            id,
            HeadlessTexture {
                width,
                height,
                data: vec![0; width as usize * height as usize * TEXEL_SIZE],
                locked: false,
            },
        );
        Ok(id)
    }

    fn release(&mut self, resource: GpuResource) {
        match resource {
            GpuResource::Buffer(id) => {
                self.buffers.remove(&id);
            }
            GpuResource::Texture(id) => {
                self.textures.remove(&id);
            }
        }
    }

    fn lock(&mut self, resource: GpuResource) -> RenderResult<()> {
        let locked = match resource {
            GpuResource::Buffer(id) => self.buffers.get_mut(&id).map(|b| &mut b.locked),
            GpuResource::Texture(id) => self.textures.get_mut(&id).map(|t| &mut t.locked),
        };

        match locked {
            Some(flag) if !*flag => {
                *flag = true;
                Ok(())
            }
            Some(_) => Err(RenderError::BufferLockFailed(format!("{resource:?} is already locked"))),
            None => Err(RenderError::BufferLockFailed(format!("{resource:?} does not exist"))),
        }
    }

    fn mapped(&mut self, resource: GpuResource) -> Option<&mut [u8]> {
        match resource {
            GpuResource::Buffer(id) => self
                .buffers
                .get_mut(&id)
                .filter(|b| b.locked)
                .map(|b| b.data.as_mut_slice()),
            GpuResource::Texture(id) => self
                .textures
                .get_mut(&id)
                .filter(|t| t.locked)
                .map(|t| t.data.as_mut_slice()),
        }
    }

    fn unlock(&mut self, resource: GpuResource) {
        match resource {
            GpuResource::Buffer(id) => {
                if let Some(buffer) = self.buffers.get_mut(&id) {
                    buffer.locked = false;
                }
            }
            GpuResource::Texture(id) => {
                if let Some(texture) = self.textures.get_mut(&id) {
                    texture.locked = false;
                }
            }
        }
    }

    fn set_stream_source(&mut self, stream: u32, buffer: BufferId, stride: usize) {
        self.streams.insert(stream, (buffer, stride));
    }

    fn set_indices(&mut self, buffer: BufferId) {
        self.indices = Some(buffer);
    }

    fn set_vertex_declaration(&mut self, declaration: VertexDeclaration) {
        self.declaration = Some(declaration);
    }

    fn set_texture(&mut self, slot: u32, texture: Option<TextureId>) {
        if let Some(entry) = self.texture_slots.get_mut(slot as usize) {
            *entry = texture;
        }
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend_mode = mode;
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.cull_mode = mode;
    }

    fn set_world_transform(&mut self, world: &Mat4) {
        self.world = *world;
    }

    fn draw_indexed_triangles(&mut self, vertex_count: usize, triangle_count: usize) {
        self.draw_calls.push(DrawCall {
            position_buffer: self.stream(0),
            index_buffer: self.indices,
            declaration: self.declaration,
            texture: self.texture_slots[0],
            world: self.world,
            vertex_count,
            triangle_count,
        });
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Parameter value recorded by a [`HeadlessEffect`]
#[derive(Debug, Clone, PartialEq)]
pub enum EffectValue {
    /// Integer
    Int(i32),
    /// Boolean
    Bool(bool),
    /// Float
    Float(f32),
    /// Float array
    Floats(Vec<f32>),
    /// Matrix
    Matrix(Mat4),
    /// Texture binding
    Texture(Option<TextureId>),
}

/// Effect that records its parameters
#[derive(Debug, Default)]
pub struct HeadlessEffect {
    path: String,
    defines: Vec<ShaderDefine>,
    parameters: RefCell<HashMap<String, EffectValue>>,
    technique: RefCell<String>,
    passes_run: RefCell<u32>,
}

impl HeadlessEffect {
    /// Effect for `path` compiled with `defines`
    pub fn new(path: &str, defines: &[ShaderDefine]) -> Self {
        Self {
            path: path.to_string(),
            defines: defines.to_vec(),
            ..Self::default()
        }
    }

    /// Source path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether `name` was defined at compile time
    pub fn has_define(&self, name: &str) -> bool {
        self.defines.iter().any(|d| d.name == name)
    }

    /// Last value set for `name`
    pub fn parameter(&self, name: &str) -> Option<EffectValue> {
        self.parameters.borrow().get(name).cloned()
    }

    /// Selected technique
    pub fn technique(&self) -> String {
        self.technique.borrow().clone()
    }

    /// Passes begun so far
    pub fn passes_run(&self) -> u32 {
        *self.passes_run.borrow()
    }

    fn set(&self, name: &str, value: EffectValue) {
        self.parameters.borrow_mut().insert(name.to_string(), value);
    }
}

impl ShaderEffect for HeadlessEffect {
    fn set_int(&self, name: &str, value: i32) {
        self.set(name, EffectValue::Int(value));
    }

    fn set_bool(&self, name: &str, value: bool) {
        self.set(name, EffectValue::Bool(value));
    }

    fn set_float(&self, name: &str, value: f32) {
        self.set(name, EffectValue::Float(value));
    }

    fn set_float_array(&self, name: &str, values: &[f32]) {
        self.set(name, EffectValue::Floats(values.to_vec()));
    }

    fn set_matrix(&self, name: &str, value: &Mat4) {
        self.set(name, EffectValue::Matrix(*value));
    }

    fn set_texture(&self, name: &str, texture: Option<TextureId>) {
        self.set(name, EffectValue::Texture(texture));
    }

    fn set_technique(&self, name: &str) {
        *self.technique.borrow_mut() = name.to_string();
    }

    fn commit_changes(&self) {}

    fn begin(&self) -> u32 {
        1
    }

    fn begin_pass(&self, _pass: u32) {
        *self.passes_run.borrow_mut() += 1;
    }

    fn end_pass(&self) {}

    fn end(&self) {}
}

/// Shader factory creating [`HeadlessEffect`]s
#[derive(Debug, Default)]
pub struct HeadlessShaderFactory {
    effects: Vec<Rc<HeadlessEffect>>,
}

impl HeadlessShaderFactory {
    /// Effects created so far
    pub fn effects(&self) -> &[Rc<HeadlessEffect>] {
        &self.effects
    }
}

impl ShaderFactory for HeadlessShaderFactory {
    fn create(&mut self, path: &str, defines: &[ShaderDefine]) -> Option<Rc<dyn ShaderEffect>> {
        let effect = Rc::new(HeadlessEffect::new(path, defines));
        self.effects.push(Rc::clone(&effect));
        Some(effect)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Texture factory that accepts every path and hands out cached handles
#[derive(Debug)]
pub struct HeadlessTextureFactory {
    next_id: u64,
    cache: HashMap<String, Rc<Texture>>,
    /// Only accept paths that exist on disk
    pub require_files: bool,
}

impl Default for HeadlessTextureFactory {
    fn default() -> Self {
        Self {
            // Disjoint from device-created texture ids
            next_id: 1 << 32,
            cache: HashMap::new(),
            require_files: false,
        }
    }
}

impl HeadlessTextureFactory {
    /// Number of distinct textures handed out
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether no texture was created
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Texture created for `path`, matched case-insensitively
    pub fn get(&self, path: &str) -> Option<Rc<Texture>> {
        self.cache.get(&path.to_ascii_lowercase()).cloned()
    }
}

impl TextureFactory for HeadlessTextureFactory {
    fn create(&mut self, path: &str, _options: TextureOptions) -> Option<Rc<Texture>> {
        if path.is_empty() || (self.require_files && !std::path::Path::new(path).exists()) {
            return None;
        }

        let key = path.to_ascii_lowercase();
        if let Some(texture) = self.cache.get(&key) {
            return Some(Rc::clone(texture));
        }

        let texture = Rc::new(Texture {
            id: TextureId(self.next_id),
            path: path.to_string(),
        });
        self.next_id += 1;
        self.cache.insert(key, Rc::clone(&texture));
        Some(texture)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::device::{create_filled_index_buffer, BufferUsage, LockGuard};

    #[test]
    fn lock_guard_unlocks_on_drop() {
        let mut device = HeadlessDevice::new();
        let buffer = device
            .create_vertex_buffer(BufferDesc::of::<f32>(BufferUsage::Static, 4))
            .unwrap();

        {
            let mut guard = LockGuard::new(&mut device, GpuResource::Buffer(buffer)).unwrap();
            guard.write(&[1.0f32, 2.0, 3.0, 4.0]).unwrap();
        }

        assert!(!device.has_locked_resources());
        assert_eq!(device.buffer_floats(buffer).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn overflowing_write_is_rejected_and_still_unlocks() {
        let mut device = HeadlessDevice::new();
        let buffer = device
            .create_vertex_buffer(BufferDesc::of::<f32>(BufferUsage::Static, 1))
            .unwrap();

        let result = LockGuard::new(&mut device, GpuResource::Buffer(buffer)).and_then(|mut guard| guard.write(&[1.0f32, 2.0]));
        assert!(matches!(result, Err(RenderError::BufferLockFailed(_))));
        assert!(!device.has_locked_resources());
    }

    #[test]
    fn double_lock_fails() {
        let mut device = HeadlessDevice::new();
        let texture = device.create_dynamic_texture(4, 1).unwrap();
        device.lock(GpuResource::Texture(texture)).unwrap();
        assert!(device.lock(GpuResource::Texture(texture)).is_err());
    }

    #[test]
    fn records_draw_state() {
        let mut device = HeadlessDevice::new();
        let indices = create_filled_index_buffer(&mut device, &[0, 1, 2]).unwrap();
        let positions = device
            .create_vertex_buffer(BufferDesc::of::<[f32; 3]>(BufferUsage::Static, 3))
            .unwrap();

        device.set_stream_source(0, positions, 12);
        device.set_indices(indices);
        device.set_vertex_declaration(VertexDeclaration::Textured(1));
        device.draw_indexed_triangles(3, 1);

        let call = &device.draw_calls()[0];
        assert_eq!(call.position_buffer, Some(positions));
        assert_eq!(call.triangle_count, 1);
        assert_eq!(device.buffer_indices(indices).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn failing_allocations_surface_as_errors() {
        let mut device = HeadlessDevice::new();
        device.fail_allocations = true;
        assert!(matches!(
            device.create_dynamic_texture(4, 4),
            Err(RenderError::ResourceCreationFailed(_))
        ));
    }

    #[test]
    fn textures_are_cached_case_insensitively() {
        let mut factory = HeadlessTextureFactory::default();
        let a = factory.create("Body.bmp", TextureOptions::default()).unwrap();
        let b = factory.create("body.BMP", TextureOptions::default()).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(factory.len(), 1);
        assert!(factory.create("", TextureOptions::default()).is_none());
    }
}
