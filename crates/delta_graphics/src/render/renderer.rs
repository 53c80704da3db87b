//! # Renderer
//!
//! Per-frame state shared by everything that draws: the active camera, the
//! world-matrix stack, world time and the queue of meshes deferred until
//! the main pass is done.
//!
//! ## World Stack
//!
//! `push_world_matrix(m)` composes `m` onto the current top, so the most
//! recently pushed matrix is applied to vertices first. Every push and pop
//! forwards the new top to the device.

use bitflags::bitflags;

use super::device::{GraphicsDevice, ShaderEffect};
use super::mesh::MeshId;
use super::model::ModelId;
use crate::foundation::math::{Color, Mat4};
use crate::scene::{BoundingSphere, Camera, AABB};

bitflags! {
    /// Debug overlays to record while rendering
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DebugGeometry: u32 {
        /// Mesh world boxes
        const AABB = 1 << 0;
        /// Model bounding spheres
        const SPHERE = 1 << 1;
        /// Quadtree node boxes
        const QUADTREE = 1 << 2;
    }
}

/// A debug overlay recorded during the frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DebugShape {
    /// Wire box
    Aabb(AABB),
    /// Wire sphere
    Sphere(BoundingSphere),
}

/// A mesh whose draw was deferred to after the main pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeferredMesh {
    /// Owning model
    pub model: ModelId,
    /// Mesh inside the model
    pub mesh: MeshId,
}

/// Frame-level render state
#[derive(Debug)]
pub struct Renderer {
    camera: Camera,
    world_stack: Vec<Mat4>,
    world_time: f32,
    debug_geometry: DebugGeometry,
    debug_shapes: Vec<DebugShape>,
    post_render: Vec<DeferredMesh>,

    /// Ambient term handed to every effect
    pub ambient_color: Color,

    /// Fog end distance handed to every effect
    pub fog_end: f32,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            camera: Camera::default(),
            world_stack: Vec::new(),
            world_time: 0.0,
            debug_geometry: DebugGeometry::empty(),
            debug_shapes: Vec::new(),
            post_render: Vec::new(),
            ambient_color: Color::new(0.5, 0.5, 0.5, 1.0),
            fog_end: 1500.0,
        }
    }
}

impl Renderer {
    /// Wrap in [0, 100) seconds so shader time keeps its precision
    const WORLD_TIME_WRAP: f32 = 100.0;

    /// Renderer with a default camera
    pub fn new() -> Self {
        Self::default()
    }

    /// Active camera
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Active camera, for moving it
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Replace the active camera
    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    /// Start a frame: identity world and no debug shapes
    pub fn begin_frame(&mut self, device: &mut dyn GraphicsDevice) {
        self.world_stack.clear();
        self.debug_shapes.clear();
        self.push_world_matrix(device, &Mat4::identity());
    }

    /// Finish a frame, dropping anything left in the deferred queue
    pub fn end_frame(&mut self, device: &mut dyn GraphicsDevice) {
        self.pop_world_matrix(device);
        self.post_render.clear();
    }

    /// Compose `matrix` onto the world stack
    pub fn push_world_matrix(&mut self, device: &mut dyn GraphicsDevice, matrix: &Mat4) {
        let top = self.world_matrix() * matrix;
        self.world_stack.push(top);
        device.set_world_transform(&top);
    }

    /// Undo the last push
    pub fn pop_world_matrix(&mut self, device: &mut dyn GraphicsDevice) {
        if self.world_stack.pop().is_none() {
            log::warn!("World matrix stack underflow");
        }
        device.set_world_transform(&self.world_matrix());
    }

    /// Current top of the world stack
    pub fn world_matrix(&self) -> Mat4 {
        self.world_stack.last().copied().unwrap_or_else(Mat4::identity)
    }

    /// Depth of the world stack
    pub fn world_stack_depth(&self) -> usize {
        self.world_stack.len()
    }

    /// Hand the frame constants to `effect`; false when there is none
    pub fn prepare(&self, effect: Option<&dyn ShaderEffect>) -> bool {
        let Some(effect) = effect else {
            return false;
        };

        effect.set_float("WorldTime", self.world_time);
        effect.set_float("FogEnd", self.fog_end);
        effect.set_matrix("World", &self.world_matrix());
        effect.set_matrix("View", &self.camera.view_matrix());
        effect.set_matrix("Projection", &self.camera.projection_matrix());
        effect.set_float_array("CameraEye", self.camera.eye.as_slice());
        effect.set_float_array("CameraLookAt", self.camera.target.as_slice());
        effect.set_float_array("AmbientColor", &self.ambient_color.to_array());
        true
    }

    /// Advance world time by `elapsed` milliseconds
    pub fn update(&mut self, elapsed: f32) {
        self.world_time += elapsed / 1000.0;
        if self.world_time >= Self::WORLD_TIME_WRAP {
            self.world_time = 0.0;
        }
    }

    /// Seconds since the last wrap
    pub fn world_time(&self) -> f32 {
        self.world_time
    }

    /// Enabled debug overlays
    pub fn debug_geometry(&self) -> DebugGeometry {
        self.debug_geometry
    }

    /// Select debug overlays
    pub fn set_debug_geometry(&mut self, flags: DebugGeometry) {
        self.debug_geometry = flags;
    }

    /// Whether every flag in `flags` is enabled
    pub fn is_debug_geometry(&self, flags: DebugGeometry) -> bool {
        self.debug_geometry.contains(flags)
    }

    /// Record a wire box
    pub fn draw_debug_aabb(&mut self, aabb: AABB) {
        self.debug_shapes.push(DebugShape::Aabb(aabb));
    }

    /// Record a wire sphere
    pub fn draw_debug_sphere(&mut self, sphere: BoundingSphere) {
        self.debug_shapes.push(DebugShape::Sphere(sphere));
    }

    /// Debug shapes recorded this frame
    pub fn debug_shapes(&self) -> &[DebugShape] {
        &self.debug_shapes
    }

    /// Drain the recorded debug shapes
    pub fn take_debug_shapes(&mut self) -> Vec<DebugShape> {
        std::mem::take(&mut self.debug_shapes)
    }

    /// Defer a mesh to after the main pass
    pub fn push_post_render(&mut self, mesh: DeferredMesh) {
        self.post_render.push(mesh);
    }

    /// Meshes deferred so far
    pub fn post_render(&self) -> &[DeferredMesh] {
        &self.post_render
    }

    /// Drain the deferred meshes in submission order
    pub fn take_post_render(&mut self) -> Vec<DeferredMesh> {
        std::mem::take(&mut self.post_render)
    }
}
