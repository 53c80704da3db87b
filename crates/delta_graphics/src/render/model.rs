//! # Model
//!
//! A model is the set of meshes stored in one SMD file, arranged into a
//! hierarchy, together with the materials they draw with.
//!
//! Skinned models are loaded against a separate skeleton model. The skinned
//! model keeps only a weak reference to it: the skeleton is animated once
//! per frame and its ordered mesh transforms act as bones. For hardware
//! skinning the skeleton also owns a dynamic texture holding one 3x4 matrix
//! per bone.

use std::cell::RefCell;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use super::device::{GpuResource, GraphicsDevice, LockGuard, TextureId};
use super::material::MaterialBuildOptions;
use super::material_collection::MaterialCollection;
use super::mesh::{Mesh, MeshId, MeshRenderContext, ParentPose, ParentRef, SkeletonPose};
use super::mesh_part::RenderClass;
use super::renderer::{DebugGeometry, DeferredMesh};
use super::{Graphics, RenderError, RenderResult};
use crate::assets::smd::{FrameInfo, ObjectInfo, SmdError, SmdHeader, SmdReader, SmdVersion};
use crate::assets::{AssetError, AssetResult};
use crate::config::GraphicsConfig;
use crate::foundation::math::{Color, IVec3, Mat4, Mat4Ext, Vec3};
use crate::scene::{BoundingSphere, AABB};

/// Process-unique model identity, used to find models from deferred draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub u64);

impl ModelId {
    /// A fresh id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Replaces the regular mesh draw for models with a custom material type
pub trait CustomMeshRenderer {
    /// Draw one mesh
    fn render(&mut self, mesh: &Mesh, gfx: &mut Graphics);
}

/// Floats per packed bone matrix
const BONE_FLOATS: usize = 12;

fn count(value: i32, what: &str) -> AssetResult<usize> {
    usize::try_from(value).map_err(|_| SmdError::InvalidFormat(format!("negative {what} count {value}")).into())
}

/// Ordered mesh hierarchy with its materials
pub struct Model {
    id: ModelId,
    name: String,
    version: SmdVersion,

    meshes: Vec<Mesh>,
    ordered_meshes: Vec<MeshId>,
    skeleton: Option<Weak<RefCell<Model>>>,
    materials: Option<MaterialCollection>,
    clips: Vec<FrameInfo>,

    frame: i32,
    max_frame: i32,
    auto_animate: bool,
    force_update: bool,
    use_frustum_culling: bool,
    last_animation_frame: Option<i32>,
    last_rotation: Option<IVec3>,

    position: Vec3,
    rotation: IVec3,
    scaling: Vec3,
    size: Vec3,
    world_box: AABB,
    bounding_sphere: BoundingSphere,

    bone_texture: Option<TextureId>,
    bones_world_matrices: Vec<Mat4>,
    bones_transformations: Vec<f32>,

    custom_renderer: Option<Box<dyn CustomMeshRenderer>>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("meshes", &self.meshes.len())
            .field("ordered_meshes", &self.ordered_meshes)
            .field("frame", &self.frame)
            .field("max_frame", &self.max_frame)
            .field("bone_texture", &self.bone_texture)
            .finish_non_exhaustive()
    }
}

impl Model {
    /// Empty model
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ModelId::next(),
            name: name.into(),
            version: SmdVersion::V62,
            meshes: Vec::new(),
            ordered_meshes: Vec::new(),
            skeleton: None,
            materials: None,
            clips: Vec::new(),
            frame: 0,
            max_frame: 0,
            auto_animate: false,
            force_update: false,
            use_frustum_culling: true,
            last_animation_frame: None,
            last_rotation: None,
            position: Vec3::zeros(),
            rotation: IVec3::zeros(),
            scaling: Vec3::repeat(1.0),
            size: Vec3::zeros(),
            world_box: AABB::empty(),
            bounding_sphere: BoundingSphere::default(),
            bone_texture: None,
            bones_world_matrices: Vec::new(),
            bones_transformations: Vec::new(),
            custom_renderer: None,
        }
    }

    /// Load an SMD file.
    ///
    /// With a `skeleton`, vertices are bound to the skeleton's ordered
    /// meshes by name and, unless skinning runs on the CPU, the skeleton
    /// gets a bone texture. A `.txt` material list next to the file
    /// overrides the embedded materials.
    pub fn load(
        path: impl AsRef<Path>,
        skeleton: Option<&Rc<RefCell<Model>>>,
        temporary_textures: bool,
        gfx: &mut Graphics,
    ) -> AssetResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|error| AssetError::from_io(path, error))?;
        let mut reader = SmdReader::new(BufReader::new(file));

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut model = Self::new(name);

        let header = SmdHeader::read(&mut reader)?;
        model.version = header.version;
        model.clips = header.clips().to_vec();

        let objects = (0..count(header.object_count, "object")?)
            .map(|_| ObjectInfo::read(&mut reader))
            .collect::<Result<Vec<_>, _>>()?;

        if header.material_count > 0 {
            let sidecar = path.with_extension("txt");
            let has_sidecar = sidecar.is_file();
            let v64 = header.version == SmdVersion::V64;

            let options = MaterialBuildOptions {
                skinned: skeleton.is_some(),
                load_textures: !has_sidecar,
                use_vertex_color: v64,
                mip_levels: if v64 { gfx.config.mip_maps_default } else { 0 },
                temporary_textures,
            };

            let mut materials = MaterialCollection::new(model.name.clone());
            materials.build(&mut reader, options, gfx)?;
            if has_sidecar {
                materials.load(&sidecar, gfx)?;
            }
            if v64 {
                materials.material_type = 0;
            }
            model.materials = Some(materials);
        }

        {
            let skeleton = skeleton.map(|skeleton| skeleton.borrow());
            for object in &objects {
                if header.version == SmdVersion::V62 {
                    let offset = u64::try_from(object.file_offset)
                        .map_err(|_| SmdError::InvalidFormat(format!("object '{}' offset", object.name)))?;
                    reader.seek_to(offset)?;
                }

                let mesh = Mesh::build(
                    &mut reader,
                    skeleton.as_deref(),
                    header.version.has_vertex_colors(),
                    model.materials.as_ref(),
                    gfx,
                )?;
                model.add_mesh(mesh);
            }
        }

        model.reorder_meshes();

        if let Some(skeleton) = skeleton {
            model.skeleton = Some(Rc::downgrade(skeleton));
            if !gfx.config.use_software_skinning {
                skeleton.borrow_mut().create_bone_texture(gfx);
            }
        }

        log::info!(
            "Loaded model '{}' ({:?}): {} meshes, {} materials, {} clips",
            model.name,
            model.version,
            model.meshes.len(),
            model.materials.as_ref().map_or(0, MaterialCollection::len),
            model.clips.len()
        );
        Ok(model)
    }

    /// Give this skeleton a bone texture sized for its ordered meshes
    fn create_bone_texture(&mut self, gfx: &mut Graphics) {
        if self.bone_texture.is_some() {
            return;
        }

        match gfx.device.create_dynamic_texture(gfx.config.bone_texture_width, 1) {
            Ok(texture) => {
                self.bone_texture = Some(texture);
                self.bones_world_matrices = vec![Mat4::identity(); self.ordered_meshes.len()];
                self.bones_transformations = vec![0.0; self.ordered_meshes.len() * BONE_FLOATS];
                self.force_update = true;
            }
            Err(error) => log::warn!("Skeleton '{}' has no bone texture: {error}", self.name),
        }
    }

    /// Append a mesh in file order
    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        if self.meshes.is_empty() {
            self.position = mesh.base_frame().translation_part();
        }

        let last_frame = mesh.last_key_frame();
        self.max_frame = self.max_frame.max(last_frame);

        let bounds = mesh.local_box();
        self.size.x = self.size.x.max(bounds.max.x).max(bounds.max.z);
        self.size.y = self.size.y.max(bounds.max.y);

        self.meshes.push(mesh);
        MeshId(self.meshes.len() - 1)
    }

    /// Resolve parent names and order the meshes ancestors first
    pub fn reorder_meshes(&mut self) {
        let parents: Vec<Option<MeshId>> = self
            .meshes
            .iter()
            .map(|mesh| {
                if mesh.parent_name().is_empty() {
                    None
                } else {
                    self.mesh_index(mesh.parent_name())
                }
            })
            .collect();

        for (mesh, parent) in self.meshes.iter_mut().zip(&parents) {
            if let Some(parent) = parent {
                mesh.set_parent(Some(ParentRef::Local(*parent)));
            }
        }

        let local_parent = |id: MeshId| match self.meshes[id.0].parent() {
            Some(ParentRef::Local(parent)) => Some(parent),
            _ => None,
        };

        let mut placed = vec![false; self.meshes.len()];
        let mut ordered = Vec::with_capacity(self.meshes.len());

        for index in 0..self.meshes.len() {
            if local_parent(MeshId(index)).is_none() {
                placed[index] = true;
                ordered.push(MeshId(index));
            }
        }

        for index in 0..self.meshes.len() {
            if placed[index] {
                continue;
            }

            let mut chain = Vec::new();
            let mut ancestor = local_parent(MeshId(index));
            while let Some(parent) = ancestor {
                if placed[parent.0] {
                    break;
                }
                if parent.0 == index || chain.contains(&parent) {
                    log::warn!("'{}': parent cycle at mesh '{}'", self.name, self.meshes[index].name());
                    break;
                }
                chain.push(parent);
                ancestor = local_parent(parent);
            }

            for &parent in chain.iter().rev() {
                placed[parent.0] = true;
                ordered.push(parent);
            }
            placed[index] = true;
            ordered.push(MeshId(index));
        }

        self.ordered_meshes = ordered;
    }

    /// Attach every mesh to `mesh_parent` of `skeleton`
    pub fn set_parent(&mut self, skeleton: Option<&Rc<RefCell<Model>>>, mesh_parent: Option<MeshId>) {
        self.skeleton = skeleton.map(Rc::downgrade);
        for mesh in &mut self.meshes {
            mesh.set_parent(mesh_parent.map(ParentRef::Skeleton));
        }
    }

    /// The skeleton, if it is still alive
    pub fn skeleton(&self) -> Option<Rc<RefCell<Model>>> {
        self.skeleton.as_ref().and_then(Weak::upgrade)
    }

    /// First mesh named `name`, ignoring case
    pub fn mesh(&self, name: &str) -> Option<&Mesh> {
        self.meshes.iter().find(|mesh| mesh.name().eq_ignore_ascii_case(name))
    }

    /// First mesh named `name`, ignoring case, for editing
    pub fn mesh_mut(&mut self, name: &str) -> Option<&mut Mesh> {
        self.meshes.iter_mut().find(|mesh| mesh.name().eq_ignore_ascii_case(name))
    }

    /// File-order index of the first mesh named `name`
    pub fn mesh_index(&self, name: &str) -> Option<MeshId> {
        self.meshes
            .iter()
            .position(|mesh| mesh.name().eq_ignore_ascii_case(name))
            .map(MeshId)
    }

    /// Position of the mesh named `name` in hierarchy order
    pub fn ordered_mesh_index(&self, name: &str) -> Option<usize> {
        self.ordered_meshes
            .iter()
            .position(|id| self.meshes[id.0].name().eq_ignore_ascii_case(name))
    }

    /// Every mesh named `name`
    pub fn meshes_named(&self, name: &str) -> Vec<MeshId> {
        self.meshes
            .iter()
            .enumerate()
            .filter(|(_, mesh)| mesh.name().eq_ignore_ascii_case(name))
            .map(|(index, _)| MeshId(index))
            .collect()
    }

    /// Mesh by id
    pub fn mesh_by_id(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id.0)
    }

    /// Mesh by id, for editing
    pub fn mesh_by_id_mut(&mut self, id: MeshId) -> Option<&mut Mesh> {
        self.meshes.get_mut(id.0)
    }

    /// Meshes in file order
    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    /// Mesh ids, ancestors before descendants
    pub fn ordered_meshes(&self) -> &[MeshId] {
        &self.ordered_meshes
    }

    /// World matrix of every mesh in hierarchy order
    pub fn bone_matrices(&self) -> Vec<Mat4> {
        self.ordered_meshes.iter().map(|id| *self.meshes[id.0].world()).collect()
    }

    fn skeleton_bones(&self) -> Option<Vec<Mat4>> {
        let skeleton = self.skeleton()?;
        let bones = skeleton.try_borrow().ok()?.bone_matrices();
        Some(bones)
    }

    fn parent_pose(&self, parent: Option<ParentRef>) -> Option<ParentPose> {
        match parent? {
            ParentRef::Local(id) => self.meshes.get(id.0).map(Mesh::pose),
            ParentRef::Skeleton(id) => {
                let skeleton = self.skeleton()?;
                let skeleton = skeleton.try_borrow().ok()?;
                skeleton.meshes.get(id.0).map(Mesh::pose)
            }
        }
    }

    /// Pose the model for `frame`, animating its skeleton instead when it has one.
    ///
    /// Bounding volumes are refreshed afterwards; see
    /// [`Self::update_bounding_volumes`].
    pub fn set_frame(&mut self, frame: i32, clip: Option<&FrameInfo>, gfx: &mut Graphics) {
        if frame >= 0 {
            match self.skeleton() {
                Some(skeleton) => {
                    match skeleton.try_borrow_mut() {
                        Ok(mut skeleton) => skeleton.animate(frame, self.rotation, clip, gfx),
                        Err(_) => log::warn!("Skeleton of '{}' is busy, frame {frame} skipped", self.name),
                    }

                    let skeleton = skeleton.try_borrow().ok();
                    for index in 0..self.meshes.len() {
                        let world = match self.meshes[index].parent() {
                            Some(ParentRef::Local(parent)) => self.meshes.get(parent.0).map(|m| *m.world()),
                            Some(ParentRef::Skeleton(parent)) => skeleton
                                .as_ref()
                                .and_then(|skeleton| skeleton.meshes.get(parent.0))
                                .map(|m| *m.world()),
                            None => None,
                        };
                        if let Some(world) = world {
                            self.meshes[index].set_world(world);
                        }
                    }
                }
                None => self.animate(frame, self.rotation, clip, gfx),
            }
        }

        self.update_bounding_volumes(false);
    }

    /// Animate every mesh in hierarchy order.
    ///
    /// Nothing happens when `frame` and `rotation` match the previous call,
    /// unless an update is forced. Skeletons with a bone texture upload the
    /// new bone matrices.
    pub fn animate(&mut self, frame: i32, rotation: IVec3, clip: Option<&FrameInfo>, gfx: &mut Graphics) {
        if !self.force_update && self.last_animation_frame == Some(frame) && self.last_rotation == Some(rotation) {
            return;
        }
        self.last_animation_frame = Some(frame);
        self.last_rotation = Some(rotation);
        self.force_update = false;

        for position in 0..self.ordered_meshes.len() {
            let id = self.ordered_meshes[position];
            let parent = self.parent_pose(self.meshes[id.0].parent());
            let mesh = &mut self.meshes[id.0];
            mesh.animate(frame, rotation, clip, parent, self.scaling);

            if let Some(slot) = self.bones_world_matrices.get_mut(position) {
                *slot = *mesh.world();
            }
        }

        if let Err(error) = self.update_bones_transformations(gfx.device.as_mut()) {
            log::warn!("Bone upload for '{}' failed: {error}", self.name);
        }
    }

    /// Pack the recorded bone matrices and upload them to the bone texture
    pub fn update_bones_transformations(&mut self, device: &mut dyn GraphicsDevice) -> RenderResult<()> {
        let Some(texture) = self.bone_texture else {
            return Ok(());
        };

        if self.bones_world_matrices.len() != self.ordered_meshes.len() {
            return Err(RenderError::BoneCountMismatch {
                expected: self.ordered_meshes.len(),
                actual: self.bones_world_matrices.len(),
            });
        }

        self.bones_transformations.clear();
        for matrix in &self.bones_world_matrices {
            self.bones_transformations.extend_from_slice(&matrix.to_flipped_3x4());
        }

        LockGuard::new(device, GpuResource::Texture(texture))?.write(&self.bones_transformations)
    }

    /// Refresh the meshes' bounds and the model box and sphere.
    ///
    /// Without `force` this only runs while the sphere is still empty.
    pub fn update_bounding_volumes(&mut self, force: bool) {
        if self.bounding_sphere.radius != 0.0 && !force {
            return;
        }

        let bones = self.skeleton_bones();

        let mut aabb = AABB::empty();
        for id in &self.ordered_meshes {
            let mesh = &mut self.meshes[id.0];
            mesh.update_bounding_volumes(bones.as_deref());
            aabb = aabb.merged(mesh.world_box());
        }

        if aabb.is_valid() {
            self.bounding_sphere = BoundingSphere::around(&aabb);
        }
        self.world_box = aabb;
    }

    /// Advance the auto-animation clock by `elapsed` milliseconds
    pub fn update(&mut self, elapsed: f32, config: &GraphicsConfig) {
        if !self.auto_animate {
            return;
        }

        self.frame += (self.max_frame as f32 / config.animation_duration * elapsed) as i32;
        if self.frame > self.max_frame {
            self.frame = config.animation_restart_frame;
        }
    }

    /// Borrow what meshes need to draw: materials, skeleton bones, scale
    pub fn with_render_context<T>(&self, f: impl FnOnce(&MeshRenderContext<'_>) -> T) -> T {
        let skeleton = self.skeleton();
        let skeleton = skeleton.as_ref().and_then(|skeleton| skeleton.try_borrow().ok());
        let bones = skeleton.as_ref().map(|skeleton| skeleton.bone_matrices());

        let context = MeshRenderContext {
            materials: self.materials.as_ref(),
            skeleton: skeleton.as_ref().zip(bones.as_deref()).map(|(skeleton, bones)| SkeletonPose {
                bones,
                bone_texture: skeleton.bone_texture,
            }),
            scaling: self.scaling,
        };
        f(&context)
    }

    /// Draw one mesh with the model's context
    pub fn render_mesh(&self, id: MeshId, gfx: &mut Graphics) -> bool {
        let Some(mesh) = self.meshes.get(id.0) else {
            return false;
        };
        self.with_render_context(|context| mesh.render(context, gfx))
    }

    /// Render class of a mesh; `None` for meshes without parts
    pub fn mesh_render_class(&self, id: MeshId) -> Option<RenderClass> {
        self.meshes.get(id.0)?.can_render(self.materials.as_ref())
    }

    fn uses_custom_renderer(&self) -> bool {
        self.custom_renderer.is_some()
            && self.skeleton.is_none()
            && self.materials.as_ref().is_some_and(|materials| materials.material_type != 0)
    }

    /// Draw the model at its current frame.
    ///
    /// With a non-empty `model_group` only the listed meshes are drawn.
    /// Returns false when the model lies outside the camera frustum.
    pub fn render(&mut self, clip: Option<&FrameInfo>, model_group: Option<&[MeshId]>, gfx: &mut Graphics) -> bool {
        let custom = self.uses_custom_renderer();
        let sphere = self.bounding_sphere.translated(self.position);

        if !custom
            && self.use_frustum_culling
            && gfx.config.use_frustum_culling
            && self.bounding_sphere.radius != 0.0
            && !gfx.renderer.camera().frustum().intersects_sphere(&sphere)
        {
            return false;
        }

        self.set_frame(self.frame, clip, gfx);

        if gfx.renderer.is_debug_geometry(DebugGeometry::SPHERE) {
            gfx.renderer.draw_debug_sphere(self.bounding_sphere.translated(self.position));
        }

        if custom {
            if let Some(renderer) = self.custom_renderer.as_mut() {
                for mesh in &self.meshes {
                    renderer.render(mesh, gfx);
                }
            }
            return true;
        }

        let model = self.id;
        self.with_render_context(|context| {
            for (index, mesh) in self.meshes.iter().enumerate() {
                let id = MeshId(index);
                if mesh.is_post_render() {
                    gfx.renderer.push_post_render(DeferredMesh { model, mesh: id });
                } else if model_group.map_or(true, |group| group.is_empty() || group.contains(&id)) {
                    mesh.render(context, gfx);
                }
            }
        });

        true
    }

    /// Move and rotate the model and every mesh
    pub fn set_position_rotation(&mut self, position: Vec3, rotation: IVec3) {
        self.position = position;
        self.rotation = rotation;
        for mesh in &mut self.meshes {
            mesh.set_position_rotation(position, rotation);
        }
    }

    /// Scale applied on top of the animation
    pub fn set_scaling(&mut self, scaling: Vec3) {
        self.scaling = scaling;
        self.force_update = true;
    }

    /// Tint every material
    pub fn set_diffuse_color(&mut self, color: Color) {
        if let Some(materials) = &mut self.materials {
            for material in materials.iter_mut() {
                material.set_diffuse_color(color);
            }
        }
    }

    /// Add a color to every material
    pub fn set_add_color(&mut self, color: Color) {
        if let Some(materials) = &mut self.materials {
            for material in materials.iter_mut() {
                material.set_add_color(color);
            }
        }
    }

    /// Install or remove the custom mesh renderer
    pub fn set_custom_renderer(&mut self, renderer: Option<Box<dyn CustomMeshRenderer>>) {
        self.custom_renderer = renderer;
    }

    /// Defer a mesh to the renderer's post-render queue
    pub fn set_post_render(&mut self, id: MeshId, post_render: bool) {
        if let Some(mesh) = self.meshes.get_mut(id.0) {
            mesh.set_post_render(post_render);
        }
    }

    /// Release every GPU resource of the model
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        for mesh in &mut self.meshes {
            mesh.release(device);
        }
        if let Some(texture) = self.bone_texture.take() {
            device.release(GpuResource::Texture(texture));
        }
    }

    /// Model id
    pub fn id(&self) -> ModelId {
        self.id
    }

    /// File name without extension
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Format revision the model was loaded from
    pub fn version(&self) -> SmdVersion {
        self.version
    }

    /// Animation clips from the header
    pub fn clips(&self) -> &[FrameInfo] {
        &self.clips
    }

    /// Materials, when the file had any
    pub fn materials(&self) -> Option<&MaterialCollection> {
        self.materials.as_ref()
    }

    /// Materials, for editing
    pub fn materials_mut(&mut self) -> Option<&mut MaterialCollection> {
        self.materials.as_mut()
    }

    /// Current frame
    pub fn frame(&self) -> i32 {
        self.frame
    }

    /// Set the frame drawn by [`Self::render`]
    pub fn set_current_frame(&mut self, frame: i32) {
        self.frame = frame;
    }

    /// Last key frame over every mesh
    pub fn max_frame(&self) -> i32 {
        self.max_frame
    }

    /// Whether [`Self::update`] advances the frame
    pub fn auto_animate(&self) -> bool {
        self.auto_animate
    }

    /// Let [`Self::update`] advance the frame
    pub fn set_auto_animate(&mut self, auto_animate: bool) {
        self.auto_animate = auto_animate;
    }

    /// Animate on the next frame even if nothing changed
    pub fn force_update(&mut self) {
        self.force_update = true;
    }

    /// Skip the bounding-sphere test in [`Self::render`]
    pub fn set_use_frustum_culling(&mut self, enabled: bool) {
        self.use_frustum_culling = enabled;
    }

    /// Model position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Model rotation in fixed-point angle units
    pub fn rotation(&self) -> IVec3 {
        self.rotation
    }

    /// Model scale
    pub fn scaling(&self) -> Vec3 {
        self.scaling
    }

    /// Largest extents of the stored mesh bounds
    pub fn size(&self) -> Vec3 {
        self.size
    }

    /// Union of the mesh world boxes
    pub fn world_box(&self) -> &AABB {
        &self.world_box
    }

    /// Sphere around [`Self::world_box`]
    pub fn bounding_sphere(&self) -> &BoundingSphere {
        &self.bounding_sphere
    }

    /// Bone texture of a skeleton used for hardware skinning
    pub fn bone_texture(&self) -> Option<TextureId> {
        self.bone_texture
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::smd::test_writer::{MaterialSpec, MeshSpec, SmdWriter};
    use crate::render::device::VertexDeclaration;
    use approx::assert_relative_eq;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, bytes: Vec<u8>) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    fn skeleton_file(dir: &TempDir) -> PathBuf {
        let mut spine = MeshSpec::bone("Bip01 Spine", "Bip01");
        spine.base_frame = Mat4::new_translation(&Vec3::new(0.0, 0.0, 1.0));
        let bytes = SmdWriter::model(true, &[], &[], &[MeshSpec::bone("Bip01", ""), spine]);
        write(dir, "skeleton.smd", bytes)
    }

    fn skinned_file(dir: &TempDir) -> PathBuf {
        let mut root = MeshSpec::bone("Bip01", "");
        root.bone_names = Some(Vec::new());
        let mut body = MeshSpec::quad("body", 0);
        body.parent = "Bip01".to_string();
        body.bone_names = Some(vec!["Bip01".to_string(); 4]);

        let bytes = SmdWriter::model(true, &[], &[MaterialSpec::textured(&["skin.bmp"])], &[root, body]);
        write(dir, "soldier.smd", bytes)
    }

    #[derive(Default)]
    struct CountingRenderer {
        meshes: Rc<RefCell<Vec<String>>>,
    }

    impl CustomMeshRenderer for CountingRenderer {
        fn render(&mut self, mesh: &Mesh, _gfx: &mut Graphics) {
            self.meshes.borrow_mut().push(mesh.name().to_string());
        }
    }

    #[test]
    fn hierarchy_places_parents_first() {
        let dir = tempfile::tempdir().unwrap();
        let meshes = [
            MeshSpec::bone("wheel", "axle"),
            MeshSpec::bone("axle", "body"),
            MeshSpec::bone("body", ""),
            MeshSpec::bone("flag", "BODY"),
        ];
        let path = write(&dir, "cart.smd", SmdWriter::model(false, &[], &[], &meshes));

        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let model = Model::load(&path, None, false, &mut gfx).unwrap();

        assert_eq!(model.name(), "cart");
        assert_eq!(model.version(), SmdVersion::V62);
        assert_eq!(model.ordered_meshes(), &[MeshId(2), MeshId(1), MeshId(0), MeshId(3)]);

        for (position, id) in model.ordered_meshes().iter().enumerate() {
            if let Some(ParentRef::Local(parent)) = model.meshes()[id.0].parent() {
                let parent_position = model.ordered_meshes().iter().position(|p| *p == parent).unwrap();
                assert!(parent_position < position);
            }
        }
        assert_eq!(model.ordered_mesh_index("FLAG"), Some(3));
        assert_eq!(model.mesh_index("Axle"), Some(MeshId(1)));
        assert_eq!(model.meshes_named("wheel"), vec![MeshId(0)]);
        assert!(model.mesh("missing").is_none());
    }

    #[test]
    fn add_mesh_tracks_position_frames_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = MeshSpec::quad("hull", 0).offset(Vec3::new(0.0, 2.0, 3.0));
        first.base_frame = Mat4::new_translation(&Vec3::new(4.0, 5.0, 6.0));
        first.rotation_keys = vec![(0, [0.0, 0.0, 0.0, 1.0]), (480, [0.0, 0.0, 0.0, 1.0])];
        let mut second = MeshSpec::bone("mast", "hull");
        second.rotation_keys = vec![(0, [0.0, 0.0, 0.0, 1.0]), (900, [0.0, 0.0, 0.0, 1.0])];
        second.position_keys = vec![(0, [0.0; 3]), (300, [0.0; 3])];
        let path = write(&dir, "boat.smd", SmdWriter::model(false, &[], &[], &[first, second]));

        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let model = Model::load(&path, None, false, &mut gfx).unwrap();

        assert_relative_eq!(model.position(), Vec3::new(4.0, 5.0, 6.0));
        assert_eq!(model.max_frame(), 480);
        assert_relative_eq!(model.size(), Vec3::new(3.0, 3.0, 0.0));
    }

    #[test]
    fn auto_animation_wraps_to_the_restart_frame() {
        let mut model = Model::new("clock");
        model.max_frame = 480;
        let config = GraphicsConfig::default();

        model.update(1000.0, &config);
        assert_eq!(model.frame(), 0);

        model.set_auto_animate(true);
        model.update(1000.0, &config);
        assert_eq!(model.frame(), 100);

        model.set_current_frame(470);
        model.update(1000.0, &config);
        assert_eq!(model.frame(), 160);
    }

    #[test]
    fn set_frame_animates_children_through_parents() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = MeshSpec::bone("body", "");
        body.position_keys = vec![(0, [0.0; 3]), (10, [10.0, 0.0, 0.0])];
        let mut arm = MeshSpec::bone("arm", "body");
        arm.base_frame = Mat4::new_translation(&Vec3::new(0.0, 0.0, 2.0));
        let path = write(&dir, "robot.smd", SmdWriter::model(false, &[], &[], &[arm, body]));

        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let mut model = Model::load(&path, None, false, &mut gfx).unwrap();
        model.set_frame(5, None, &mut gfx);

        let arm = model.mesh("arm").unwrap();
        assert_relative_eq!(arm.world().translation_part(), Vec3::new(5.0, 0.0, 2.0), epsilon = 1.0e-4);
    }

    #[test]
    fn skinned_model_binds_to_the_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        let mut gfx = Graphics::headless(GraphicsConfig::default());

        let skeleton = Rc::new(RefCell::new(Model::load(skeleton_file(&dir), None, false, &mut gfx).unwrap()));
        let mut soldier = Model::load(skinned_file(&dir), Some(&skeleton), false, &mut gfx).unwrap();

        assert_eq!(soldier.meshes().len(), 2);
        assert_eq!(soldier.meshes()[soldier.ordered_meshes()[0].0].name(), "Bip01");

        let body_id = soldier.mesh_index("body").unwrap();
        let body = soldier.mesh_by_id(body_id).unwrap();
        assert_eq!(body.bone_indices(), Some(&[0, 0, 0, 0][..]));
        assert!(body.is_skinned());
        assert!(body.blend_buffer().is_some());
        assert_eq!(soldier.mesh_render_class(body_id), Some(RenderClass::Render));
        assert!(skeleton.borrow().bone_texture().is_some());

        assert!(soldier.render(None, None, &mut gfx));

        let device = gfx.headless_device().unwrap();
        assert_eq!(device.draw_calls().len(), 1);
        assert_eq!(device.draw_calls()[0].declaration, Some(VertexDeclaration::SkinnedTextured(1)));

        let texture = skeleton.borrow().bone_texture().unwrap();
        let bones = device.texture_floats(texture).unwrap();
        assert_eq!(&bones[..12], &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(&bones[12..24], &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0]);
        assert!(!device.has_locked_resources());

        assert_relative_eq!(soldier.bounding_sphere().radius, 0.5);
    }

    #[test]
    fn bone_upload_checks_the_bone_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let skeleton = Rc::new(RefCell::new(Model::load(skeleton_file(&dir), None, false, &mut gfx).unwrap()));
        let _soldier = Model::load(skinned_file(&dir), Some(&skeleton), false, &mut gfx).unwrap();

        let mut skeleton = skeleton.borrow_mut();
        skeleton.bones_world_matrices.pop();
        let error = skeleton.update_bones_transformations(gfx.device.as_mut()).unwrap_err();
        assert!(matches!(error, RenderError::BoneCountMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn software_skinning_needs_no_bone_texture() {
        let dir = tempfile::tempdir().unwrap();
        let config = GraphicsConfig { use_software_skinning: true, ..GraphicsConfig::default() };
        let mut gfx = Graphics::headless(config);

        let skeleton = Rc::new(RefCell::new(Model::load(skeleton_file(&dir), None, false, &mut gfx).unwrap()));
        let mut soldier = Model::load(skinned_file(&dir), Some(&skeleton), false, &mut gfx).unwrap();
        assert!(skeleton.borrow().bone_texture().is_none());

        assert!(soldier.render(None, None, &mut gfx));
        let body = soldier.mesh("body").unwrap();
        assert!(body.blend_buffer().is_none());

        let device = gfx.headless_device().unwrap();
        let positions = device.buffer_floats(body.position_buffer().unwrap()).unwrap();
        // File (x, y, z) lands at render (x, z, y)
        assert_relative_eq!(positions[6], 1.0);
        assert_relative_eq!(positions[7], 0.0);
        assert_relative_eq!(positions[8], 1.0);
    }

    #[test]
    fn render_culls_defers_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let meshes = [MeshSpec::quad("hull", 0), MeshSpec::quad("sail", 0), MeshSpec::quad("flag", 0)];
        let path = write(&dir, "ship.smd", SmdWriter::model(false, &[], &[MaterialSpec::textured(&["a.bmp"])], &meshes));

        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let mut model = Model::load(&path, None, false, &mut gfx).unwrap();
        model.set_post_render(MeshId(2), true);

        assert!(model.render(None, Some(&[MeshId(1)]), &mut gfx));
        assert_eq!(gfx.headless_device().unwrap().draw_calls().len(), 1);
        assert_eq!(gfx.renderer.post_render(), &[DeferredMesh { model: model.id(), mesh: MeshId(2) }]);

        model.set_position_rotation(Vec3::new(0.0, 0.0, -1000.0), IVec3::zeros());
        assert!(!model.render(None, None, &mut gfx));
        assert_eq!(gfx.headless_device().unwrap().draw_calls().len(), 1);
    }

    #[test]
    fn custom_renderer_replaces_mesh_draws() {
        let dir = tempfile::tempdir().unwrap();
        let meshes = [MeshSpec::quad("hull", 0), MeshSpec::quad("sail", 0)];
        let path = write(&dir, "ship.smd", SmdWriter::model(false, &[], &[MaterialSpec::textured(&["a.bmp"])], &meshes));

        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let mut model = Model::load(&path, None, false, &mut gfx).unwrap();
        let renderer = CountingRenderer::default();
        let drawn = Rc::clone(&renderer.meshes);
        model.set_custom_renderer(Some(Box::new(renderer)));

        model.materials_mut().unwrap().material_type = 1;
        assert!(model.render(None, None, &mut gfx));

        assert_eq!(*drawn.borrow(), vec!["hull".to_string(), "sail".to_string()]);
        assert!(gfx.headless_device().unwrap().draw_calls().is_empty());
    }

    #[test]
    fn colors_apply_to_every_material() {
        let mut model = Model::new("crate");
        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let mut materials = MaterialCollection::new("crate");
        materials.create_material("wood.bmp", false, true, 0, &mut gfx);
        materials.create_material("metal.bmp", false, true, 0, &mut gfx);
        model.materials = Some(materials);

        let red = Color::new(1.0, 0.0, 0.0, 1.0);
        model.set_diffuse_color(red);
        for material in model.materials().unwrap().iter() {
            assert!(material.custom_material);
            assert_eq!(material.diffuse_color, red);
        }
    }
}
