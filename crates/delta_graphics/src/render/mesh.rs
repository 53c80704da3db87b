//! # Mesh
//!
//! One object of an SMD model: raw geometry and animation tracks as read
//! from the file, the welded GPU buffers built from them, and the per-frame
//! pose.
//!
//! ## Animation
//!
//! Each frame [`Mesh::animate`] samples the rotation, scale and position
//! tracks, composes the result with the parent's pose and layers the model
//! rotation and scale on top. Matrices use nalgebra's column-vector
//! convention; file space is Z-up and is flipped into Y-up render space
//! only when vertices are transformed.
//!
//! ## Skinning
//!
//! Meshes loaded against a skeleton carry a bone index per vertex. With
//! software skinning the positions are rewritten on the CPU every draw;
//! otherwise the bone index is uploaded as a blend stream and the shader
//! reads the bone matrices from the skeleton's bone texture.

use std::collections::BTreeMap;
use std::io::{Read, Seek};

use super::device::{
    create_filled_vertex_buffer, BufferId, BufferUsage, GpuResource, GraphicsDevice, LockGuard, TextureId,
};
use super::material_collection::{MaterialCollection, MaterialId};
use super::mesh_part::{MeshPart, RenderClass};
use super::model::Model;
use super::renderer::DebugGeometry;
use super::vertex::{PackedVertex, VertexWelder, OPAQUE_WHITE};
use super::{Graphics, RenderResult};
use crate::assets::smd::{
    FrameInfo, KeyPosition, KeyRotation, KeyScale, Keyframe, MeshRecord, RawVertex, SmdReader, TextureLink,
    MAX_FRAMES, MAX_UV_CHANNELS,
};
use crate::assets::AssetResult;
use crate::foundation::math::{utils, IVec3, Mat4, Mat4Ext, Point3, Vec3};
use crate::scene::{BoundingSphere, AABB};

/// Index of a mesh inside its model, in file order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub usize);

/// Resolved parent of a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentRef {
    /// A mesh of the same model
    Local(MeshId),
    /// A mesh of the skeleton model
    Skeleton(MeshId),
}

/// Parent state a child composes its animation with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParentPose {
    /// Inverse rest pose of the parent
    pub base_frame_inverse: Mat4,
    /// Animated pose of the parent
    pub result_animation: Mat4,
}

/// Skeleton state for drawing skinned meshes
#[derive(Debug, Clone, Copy)]
pub struct SkeletonPose<'a> {
    /// World matrix per ordered skeleton mesh
    pub bones: &'a [Mat4],
    /// Packed bone matrices for hardware skinning
    pub bone_texture: Option<TextureId>,
}

/// What a mesh borrows from its model while drawing
#[derive(Debug, Clone, Copy)]
pub struct MeshRenderContext<'a> {
    /// Materials the parts index into
    pub materials: Option<&'a MaterialCollection>,
    /// Skeleton pose, for models loaded against a skeleton
    pub skeleton: Option<SkeletonPose<'a>>,
    /// Model scale
    pub scaling: Vec3,
}

/// Skeleton meshes carry no geometry worth drawing
const BONE_PREFIX: &str = "Bip01";

fn is_bone_name(name: &str) -> bool {
    name.get(..BONE_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(BONE_PREFIX))
}

/// Bracketing keys around `frame`: `(previous, next, t)`.
///
/// `None` before the first key. Past the last key the final bracket is
/// returned with `t = 1`.
fn bracket<K: Keyframe>(keys: &[K], frame: i32) -> Option<(usize, usize, f32)> {
    if keys.first()?.frame() > frame {
        return None;
    }

    let mut index = 0;
    while index + 1 < keys.len() && keys[index + 1].frame() <= frame {
        index += 1;
    }

    if index + 1 == keys.len() {
        return Some(match index {
            0 => (0, 0, 0.0),
            last => (last - 1, last, 1.0),
        });
    }

    let previous = keys[index].frame();
    let next = keys[index + 1].frame();
    let t = if next > previous {
        (frame - previous) as f32 / (next - previous) as f32
    } else {
        0.0
    };
    Some((index, index + 1, t))
}

/// Range of the keys of the clip covering `frame`, if any
fn clip_range(table: &[FrameInfo], key_count: usize, frame: i32) -> Option<std::ops::Range<usize>> {
    let clip = table.iter().find(|clip| clip.covers(frame))?;
    let start = usize::try_from(clip.key_frame_start_index).ok()?;
    let count = usize::try_from(clip.key_frame_count).ok()?;
    let end = start.saturating_add(count).min(key_count);
    (start < end).then_some(start..end)
}

/// Links of a UV chain, at most [`MAX_UV_CHANNELS`]
fn link_chain(links: &[TextureLink], start: Option<usize>) -> impl Iterator<Item = &TextureLink> {
    let mut next = start;
    std::iter::from_fn(move || {
        let link = links.get(next?)?;
        next = link.next;
        Some(link)
    })
    .take(MAX_UV_CHANNELS)
}

#[derive(Debug, Clone, Default, PartialEq)]
struct MeshBuffers {
    position: Option<BufferId>,
    normal: Option<BufferId>,
    color: Option<BufferId>,
    blend: Option<BufferId>,
    uvs: Vec<BufferId>,
    vertex_count: usize,
}

impl MeshBuffers {
    fn resources(&self) -> impl Iterator<Item = BufferId> + '_ {
        [self.position, self.normal, self.color, self.blend]
            .into_iter()
            .flatten()
            .chain(self.uvs.iter().copied())
    }

    /// Create every stream; on failure the buffers created so far stay set for release
    fn upload(
        &mut self,
        device: &mut dyn GraphicsDevice,
        streams: &VertexStreams,
        skinned: bool,
        software: bool,
    ) -> RenderResult<()> {
        let position_usage = if skinned && software { BufferUsage::Dynamic } else { BufferUsage::Static };
        self.position = Some(create_filled_vertex_buffer(device, position_usage, &streams.positions)?);
        self.normal = Some(create_filled_vertex_buffer(device, BufferUsage::Static, &streams.normals)?);
        self.color = Some(create_filled_vertex_buffer(device, BufferUsage::Static, &streams.colors)?);

        if skinned && !software {
            self.blend = Some(create_filled_vertex_buffer(device, BufferUsage::Static, &streams.blend)?);
        }

        for channel in &streams.uvs {
            self.uvs.push(create_filled_vertex_buffer(device, BufferUsage::Static, channel)?);
        }
        Ok(())
    }

    fn release(&mut self, device: &mut dyn GraphicsDevice) {
        let buffers: Vec<_> = self.resources().collect();
        for buffer in buffers {
            device.release(GpuResource::Buffer(buffer));
        }
        *self = Self::default();
    }
}

/// Vertex streams before upload, one entry per welded vertex
#[derive(Debug, Default)]
struct VertexStreams {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    colors: Vec<u32>,
    blend: Vec<f32>,
    uvs: Vec<Vec<[f32; 2]>>,
}

/// An animated object of a model
#[derive(Debug)]
pub struct Mesh {
    name: String,
    parent_name: String,
    parent: Option<ParentRef>,

    local_box: AABB,
    world_box: AABB,
    bounding_sphere: BoundingSphere,

    position: Vec3,
    rotation: IVec3,
    translation: Mat4,

    base_frame: Mat4,
    base_frame_inverse: Mat4,
    base_rotation: Mat4,
    result_animation: Mat4,
    world: Mat4,
    local: Mat4,
    base_position: [i32; 3],
    last_frame: i32,

    frames_info_rotation: [FrameInfo; MAX_FRAMES],
    frames_info_position: [FrameInfo; MAX_FRAMES],
    frames_info_scaling: [FrameInfo; MAX_FRAMES],
    frames_info_count: usize,

    vertices: Vec<RawVertex>,
    rotation_keys: Vec<KeyRotation>,
    position_keys: Vec<KeyPosition>,
    scale_keys: Vec<KeyScale>,
    previous_rotations: Vec<Mat4>,

    bone_indices: Option<Vec<i32>>,
    skinning_vertices: Vec<(Vec3, i32)>,
    buffers: MeshBuffers,
    parts: BTreeMap<MaterialId, MeshPart>,
    post_render: bool,
}

impl Mesh {
    /// Read one mesh block and build its GPU buffers.
    ///
    /// With a `skeleton` the block carries a bone name per vertex, resolved
    /// against the skeleton's ordered meshes. Faces are batched by material
    /// from `materials`; faces whose material is missing are dropped.
    pub fn build<R: Read + Seek>(
        reader: &mut SmdReader<R>,
        skeleton: Option<&Model>,
        read_vertex_color: bool,
        materials: Option<&MaterialCollection>,
        gfx: &mut Graphics,
    ) -> AssetResult<Self> {
        let record = MeshRecord::read(reader, skeleton.is_some(), read_vertex_color)?;
        Ok(Self::from_record(record, skeleton, materials, gfx))
    }

    /// Build a mesh from an already parsed block
    pub fn from_record(
        record: MeshRecord,
        skeleton: Option<&Model>,
        materials: Option<&MaterialCollection>,
        gfx: &mut Graphics,
    ) -> Self {
        let bone_indices = match (skeleton, &record.bone_names) {
            (Some(skeleton), Some(names)) => Some(
                names
                    .iter()
                    .map(|name| {
                        skeleton
                            .ordered_mesh_index(name)
                            .and_then(|index| i32::try_from(index).ok())
                            .unwrap_or(-1)
                    })
                    .collect::<Vec<_>>(),
            ),
            _ => None,
        };

        let mut mesh = Self {
            name: record.name.clone(),
            parent_name: record.parent_name.clone(),
            parent: None,
            local_box: record.bounds,
            world_box: AABB::empty(),
            bounding_sphere: BoundingSphere::default(),
            position: record.base_frame.translation_part(),
            rotation: record.rotation,
            translation: Mat4::identity(),
            base_frame: record.base_frame,
            base_frame_inverse: record.base_frame_inverse,
            base_rotation: record.base_rotation,
            result_animation: record.result_animation,
            world: record.world,
            local: record.local,
            base_position: record.base_position,
            last_frame: record.last_frame,
            frames_info_rotation: record.frames_info_rotation,
            frames_info_position: record.frames_info_position,
            frames_info_scaling: record.frames_info_scaling,
            frames_info_count: record.frames_info_count,
            vertices: Vec::new(),
            rotation_keys: Vec::new(),
            position_keys: Vec::new(),
            scale_keys: Vec::new(),
            previous_rotations: Vec::new(),
            bone_indices,
            skinning_vertices: Vec::new(),
            buffers: MeshBuffers::default(),
            parts: BTreeMap::new(),
            post_render: false,
        };

        if !record.faces.is_empty() && !is_bone_name(&record.name) {
            mesh.build_buffers(&record, materials, gfx);
        }

        log::debug!(
            "Mesh '{}': {} vertices, {} faces, {} welded, {} parts",
            mesh.name,
            record.vertices.len(),
            record.faces.len(),
            mesh.buffers.vertex_count,
            mesh.parts.len()
        );

        mesh.vertices = record.vertices;
        mesh.rotation_keys = record.rotation_keys;
        mesh.position_keys = record.position_keys;
        mesh.scale_keys = record.scale_keys;
        mesh.previous_rotations = record.previous_rotations;
        mesh
    }

    /// Whether any vertex is bound to a skeleton bone
    pub fn is_skinned(&self) -> bool {
        self.bone_indices
            .as_ref()
            .is_some_and(|indices| indices.iter().any(|&bone| bone >= 0))
    }

    fn bone_of(&self, vertex: usize) -> i32 {
        bone_at(self.bone_indices.as_deref(), vertex)
    }

    fn build_buffers(&mut self, record: &MeshRecord, materials: Option<&MaterialCollection>, gfx: &mut Graphics) {
        let skinned = self.is_skinned();
        let software = gfx.config.use_software_skinning;

        let channels = record
            .faces
            .iter()
            .find_map(|face| face.texture_link)
            .map_or(0, |first| link_chain(&record.texture_links, Some(first)).count());

        let bone_indices = self.bone_indices.as_deref();
        let mut welder = VertexWelder::new();
        let mut streams = VertexStreams {
            uvs: vec![Vec::new(); channels],
            ..VertexStreams::default()
        };

        for (face_index, face) in record.faces.iter().enumerate() {
            let material = MaterialId(usize::from(face.material));
            if materials.map_or(true, |collection| collection.get(material).is_none()) || face.texture_link.is_none() {
                continue;
            }

            if face.vertices.iter().any(|&v| usize::from(v) >= record.vertices.len()) {
                log::warn!("Mesh '{}': face {face_index} references a missing vertex", self.name);
                continue;
            }

            let part = self.parts.entry(material).or_insert_with(|| MeshPart::new(material));

            for (corner, &vertex_index) in face.vertices.iter().enumerate() {
                let vertex_index = usize::from(vertex_index);
                let raw = &record.vertices[vertex_index];

                let mut packed = PackedVertex {
                    position: raw.position(),
                    color: record
                        .vertex_colors
                        .as_ref()
                        .and_then(|colors| colors.get(vertex_index))
                        .map_or(OPAQUE_WHITE, |color| color.to_argb()),
                    bone_index: if skinned { bone_at(bone_indices, vertex_index) } else { -1 },
                    ..PackedVertex::default()
                };
                for (channel, link) in link_chain(&record.texture_links, face.texture_link)
                    .take(channels)
                    .enumerate()
                {
                    packed.uv[channel] = link.uv(corner);
                }

                let (index, inserted) = welder.weld(packed);
                part.push_index(index);
                if !inserted {
                    continue;
                }

                let normal = raw.normal();
                streams.positions.push(packed.position.into());
                streams.normals.push(normal.into());
                streams.colors.push(packed.color);
                for (channel, uvs) in streams.uvs.iter_mut().enumerate() {
                    uvs.push(packed.uv[channel]);
                }
                if skinned {
                    streams.blend.push(packed.bone_index as f32);
                    if software {
                        self.skinning_vertices.push((packed.position, packed.bone_index));
                    }
                }
            }
        }

        if streams.positions.is_empty() {
            return;
        }

        let device = gfx.device.as_mut();
        let mut buffers = MeshBuffers {
            vertex_count: streams.positions.len(),
            ..MeshBuffers::default()
        };

        match buffers.upload(device, &streams, skinned, software) {
            Ok(()) => {
                self.buffers = buffers;
                for part in self.parts.values_mut() {
                    part.build(device);
                }
            }
            Err(error) => {
                buffers.release(device);
                log::warn!("Mesh '{}' will not draw: {error}", self.name);
            }
        }
    }

    /// Release every GPU buffer of the mesh
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        self.buffers.release(device);
        for part in self.parts.values_mut() {
            if let Some(buffer) = part.index_buffer() {
                device.release(GpuResource::Buffer(buffer));
            }
        }
        self.parts.clear();
    }

    /// Last frame of the animation tracks; the position track wins when present
    pub fn last_key_frame(&self) -> i32 {
        self.position_keys
            .last()
            .map(|key| key.frame)
            .or_else(|| self.rotation_keys.last().map(|key| key.frame))
            .unwrap_or(0)
    }

    fn clip_or_track(
        &self,
        table: &[FrameInfo; MAX_FRAMES],
        key_count: usize,
        last: Option<i32>,
        frame: i32,
    ) -> Option<std::ops::Range<usize>> {
        if self.frames_info_count > 0 {
            clip_range(&table[..self.frames_info_count], key_count, frame)
        } else {
            last.filter(|&last| last > frame).map(|_| 0..key_count)
        }
    }

    fn sample_rotation(&self, range: std::ops::Range<usize>, frame: i32, clip: Option<&FrameInfo>) -> Mat4 {
        let keys = &self.rotation_keys[range.clone()];
        let Some((previous, next, mut t)) = bracket(keys, frame) else {
            return Mat4::identity();
        };

        if clip.is_some_and(|clip| keys[next].frame > clip.end_frame) {
            t = 0.0;
        }

        let from = keys[previous].rotation();
        let to = keys[next].rotation();
        let rotation = from
            .try_slerp(&to, t, 1.0e-6)
            .unwrap_or(if t < 0.5 { from } else { to });

        let previous_rotation = self
            .previous_rotations
            .get(range.start + previous)
            .copied()
            .unwrap_or_else(Mat4::identity);

        rotation.to_homogeneous() * previous_rotation
    }

    fn sample_scaling(&self, range: std::ops::Range<usize>, frame: i32) -> Mat4 {
        let keys = &self.scale_keys[range];
        match bracket(keys, frame) {
            Some((previous, next, t)) => {
                let from = keys[previous].scale();
                let to = keys[next].scale();
                Mat4::new_nonuniform_scaling(&from.lerp(&to, t))
            }
            None => Mat4::identity(),
        }
    }

    fn sample_position(&self, range: std::ops::Range<usize>, frame: i32) -> Option<Vec3> {
        let keys = &self.position_keys[range];
        let (previous, next, t) = bracket(keys, frame)?;
        Some(keys[previous].position.lerp(&keys[next].position, t))
    }

    /// Pose the mesh for `frame`.
    ///
    /// `rotation` is the model's Euler rotation in fixed-point angle units;
    /// `clip` bounds interpolation to a clip of the model; `parent` is the
    /// pose of the resolved parent, already animated this frame.
    pub fn animate(
        &mut self,
        frame: i32,
        rotation: IVec3,
        clip: Option<&FrameInfo>,
        parent: Option<ParentPose>,
        scaling: Vec3,
    ) {
        let rotation_range = self.clip_or_track(
            &self.frames_info_rotation,
            self.rotation_keys.len(),
            self.rotation_keys.last().map(|key| key.frame),
            frame,
        );
        let position_range = self.clip_or_track(
            &self.frames_info_position,
            self.position_keys.len(),
            self.position_keys.last().map(|key| key.frame),
            frame,
        );
        let scaling_range = self.clip_or_track(
            &self.frames_info_scaling,
            self.scale_keys.len(),
            self.scale_keys.last().map(|key| key.frame),
            frame,
        );

        let animated = if self.frames_info_count > 0 {
            rotation_range.is_some() || position_range.is_some() || scaling_range.is_some()
        } else {
            !self.rotation_keys.is_empty() || !self.position_keys.is_empty() || !self.scale_keys.is_empty()
        };

        let result = if animated {
            let mut result = match rotation_range {
                Some(range) => self.sample_rotation(range, frame, clip),
                None => self.base_rotation,
            };

            if let Some(range) = scaling_range {
                result = self.sample_scaling(range, frame) * result;
            }

            let translation = position_range
                .and_then(|range| self.sample_position(range, frame))
                .unwrap_or_else(|| utils::fixed_to_vec3(self.base_position));
            result.set_translation_part(translation);
            result
        } else if let Some(parent) = parent {
            parent.base_frame_inverse * self.base_frame
        } else {
            self.base_frame
        };

        self.result_animation = match parent {
            Some(parent) => parent.result_animation * result,
            None => result,
        };

        let mut world = self.result_animation;
        if rotation != IVec3::zeros() {
            self.local = Mat4::rotation_z(utils::angle_to_radians(rotation.y))
                * Mat4::rotation_x(utils::angle_to_radians(rotation.x))
                * Mat4::rotation_y(utils::angle_to_radians(rotation.z));
            world = self.local * world;
        }

        if scaling != Vec3::repeat(1.0) {
            world = Mat4::new_nonuniform_scaling(&scaling) * world;
        }

        self.world = world;
    }

    /// Set where the mesh is drawn
    pub fn set_position_rotation(&mut self, position: Vec3, rotation: IVec3) {
        self.position = position;
        self.rotation = rotation;
        self.translation = Mat4::new_translation(&position);
    }

    /// Recompute the world box and sphere from the current pose.
    ///
    /// Skinned meshes transform each vertex by its bone from `bones`; rigid
    /// meshes use their own world matrix.
    pub fn update_bounding_volumes(&mut self, bones: Option<&[Mat4]>) {
        if self.vertices.is_empty() {
            return;
        }

        let bones = bones.filter(|_| self.bone_indices.is_some());
        let world = self.world.flipped_yz();

        let mut aabb = AABB::empty();
        for (index, vertex) in self.vertices.iter().enumerate() {
            let matrix = match bones {
                Some(bones) => usize::try_from(self.bone_of(index))
                    .ok()
                    .and_then(|bone| bones.get(bone))
                    .map_or_else(Mat4::identity, Mat4Ext::flipped_yz),
                None => world,
            };
            aabb.extend(matrix.transform_point(&Point3::from(vertex.position())).coords);
        }

        let size = aabb.size();
        self.bounding_sphere = BoundingSphere::new(aabb.center(), size.x.max(size.y).max(size.z) * 0.5);
        self.world_box = aabb;
    }

    fn apply_software_skinning(&self, bones: &[Mat4], device: &mut dyn GraphicsDevice) -> RenderResult<()> {
        let Some(buffer) = self.buffers.position else {
            return Ok(());
        };
        if self.skinning_vertices.is_empty() {
            return Ok(());
        }

        let positions: Vec<[f32; 3]> = self
            .skinning_vertices
            .iter()
            .map(|&(position, bone)| {
                let matrix = usize::try_from(bone)
                    .ok()
                    .and_then(|bone| bones.get(bone))
                    .map_or_else(Mat4::identity, Mat4Ext::flipped_yz);
                matrix.transform_point(&Point3::from(position)).coords.into()
            })
            .collect();

        LockGuard::new(device, GpuResource::Buffer(buffer))?.write(&positions)
    }

    /// Draw every part of the mesh.
    ///
    /// Returns false when the mesh has nothing to draw or lies outside the
    /// camera frustum.
    pub fn render(&self, context: &MeshRenderContext<'_>, gfx: &mut Graphics) -> bool {
        let (Some(position), Some(normal), Some(color)) =
            (self.buffers.position, self.buffers.normal, self.buffers.color)
        else {
            return false;
        };
        let Some(materials) = context.materials else {
            return false;
        };
        if self.buffers.uvs.is_empty() {
            return false;
        }

        let skeleton = context.skeleton.filter(|_| self.is_skinned());
        let skinned = skeleton.is_some();

        let Graphics { device, renderer, config, .. } = gfx;
        let device = device.as_mut();

        let world_box = self.world_box.translated_by(&self.translation);
        if !renderer.camera().frustum().intersects_aabb(&world_box) {
            return false;
        }
        if renderer.is_debug_geometry(DebugGeometry::AABB) {
            renderer.draw_debug_aabb(world_box);
        }

        device.set_stream_source(0, position, std::mem::size_of::<[f32; 3]>());
        device.set_stream_source(1, normal, std::mem::size_of::<[f32; 3]>());
        device.set_stream_source(2, color, std::mem::size_of::<u32>());
        if skinned {
            if let Some(blend) = self.buffers.blend {
                device.set_stream_source(3, blend, std::mem::size_of::<f32>());
            }
        }
        let first_uv_stream = if skinned { 4 } else { 3 };
        for (stream, &buffer) in (first_uv_stream..).zip(&self.buffers.uvs) {
            device.set_stream_source(stream, buffer, std::mem::size_of::<[f32; 2]>());
        }

        if let Some(skeleton) = skeleton {
            if config.use_software_skinning {
                if let Err(error) = self.apply_software_skinning(skeleton.bones, device) {
                    log::warn!("Mesh '{}': skinning failed: {error}", self.name);
                }
            }
        }

        let base = if skinned {
            self.translation
        } else {
            self.translation * self.world.flipped_yz()
        };
        let scale = (context.scaling != Vec3::repeat(1.0)).then(|| Mat4::new_nonuniform_scaling(&context.scaling));

        for part in self.parts.values() {
            renderer.push_world_matrix(device, &base);
            if let Some(scale) = &scale {
                renderer.push_world_matrix(device, scale);
            }

            if let Some(skeleton) = skeleton.filter(|_| !config.use_software_skinning) {
                if let (Some(texture), Some(effect)) = (
                    skeleton.bone_texture,
                    materials.get(part.material()).and_then(|material| material.effect()),
                ) {
                    effect.set_texture("BonesMap", Some(texture));
                }
            }

            part.render(materials, self.buffers.vertex_count, skinned, renderer, device);

            if scale.is_some() {
                renderer.pop_world_matrix(device);
            }
            renderer.pop_world_matrix(device);
        }

        true
    }

    /// Classification of the parts, stopping at the first one that never draws.
    ///
    /// `None` for meshes without parts.
    pub fn can_render(&self, materials: Option<&MaterialCollection>) -> Option<RenderClass> {
        let mut class = None;
        for part in self.parts.values() {
            let current = part.can_render(materials);
            class = Some(current);
            if current == RenderClass::NotRender {
                break;
            }
        }
        class
    }

    /// Mesh name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the parent mesh as stored in the file
    pub fn parent_name(&self) -> &str {
        &self.parent_name
    }

    /// Resolved parent
    pub fn parent(&self) -> Option<ParentRef> {
        self.parent
    }

    /// Attach to another mesh
    pub fn set_parent(&mut self, parent: Option<ParentRef>) {
        self.parent = parent;
    }

    /// Object-space bounds stored in the file
    pub fn local_box(&self) -> &AABB {
        &self.local_box
    }

    /// Render-space bounds of the current pose, before translation
    pub fn world_box(&self) -> &AABB {
        &self.world_box
    }

    /// Sphere around [`Self::world_box`]
    pub fn bounding_sphere(&self) -> &BoundingSphere {
        &self.bounding_sphere
    }

    /// Draw translation
    pub fn translation(&self) -> &Mat4 {
        &self.translation
    }

    /// Draw position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Draw rotation
    pub fn rotation(&self) -> IVec3 {
        self.rotation
    }

    /// Rest pose
    pub fn base_frame(&self) -> &Mat4 {
        &self.base_frame
    }

    /// Inverse rest pose
    pub fn base_frame_inverse(&self) -> &Mat4 {
        &self.base_frame_inverse
    }

    /// Animated pose relative to the hierarchy root
    pub fn result_animation(&self) -> &Mat4 {
        &self.result_animation
    }

    /// World matrix of the current pose, in file space
    pub fn world(&self) -> &Mat4 {
        &self.world
    }

    /// Replace the world matrix
    pub fn set_world(&mut self, world: Mat4) {
        self.world = world;
    }

    /// Model rotation applied by the last [`Self::animate`]
    pub fn local(&self) -> &Mat4 {
        &self.local
    }

    /// State a child animates against
    pub fn pose(&self) -> ParentPose {
        ParentPose {
            base_frame_inverse: self.base_frame_inverse,
            result_animation: self.result_animation,
        }
    }

    /// Last frame recorded by the exporter
    pub fn last_frame(&self) -> i32 {
        self.last_frame
    }

    /// Vertices as stored in the file
    pub fn vertices(&self) -> &[RawVertex] {
        &self.vertices
    }

    /// Rotation keys
    pub fn rotation_keys(&self) -> &[KeyRotation] {
        &self.rotation_keys
    }

    /// Position keys
    pub fn position_keys(&self) -> &[KeyPosition] {
        &self.position_keys
    }

    /// Scale keys
    pub fn scale_keys(&self) -> &[KeyScale] {
        &self.scale_keys
    }

    /// Skeleton bone per file vertex; -1 where the name matched no bone
    pub fn bone_indices(&self) -> Option<&[i32]> {
        self.bone_indices.as_deref()
    }

    /// Parts by material
    pub fn parts(&self) -> impl Iterator<Item = &MeshPart> {
        self.parts.values()
    }

    /// Part drawing `material`
    pub fn part(&self, material: MaterialId) -> Option<&MeshPart> {
        self.parts.get(&material)
    }

    /// Number of welded GPU vertices
    pub fn vertex_count(&self) -> usize {
        self.buffers.vertex_count
    }

    /// Position stream, once built
    pub fn position_buffer(&self) -> Option<BufferId> {
        self.buffers.position
    }

    /// Blend-index stream of hardware-skinned meshes
    pub fn blend_buffer(&self) -> Option<BufferId> {
        self.buffers.blend
    }

    /// UV streams, one per channel
    pub fn uv_buffers(&self) -> &[BufferId] {
        &self.buffers.uvs
    }

    /// Whether the mesh is drawn after the main pass
    pub fn is_post_render(&self) -> bool {
        self.post_render
    }

    /// Draw the mesh after the main pass
    pub fn set_post_render(&mut self, post_render: bool) {
        self.post_render = post_render;
    }
}

fn bone_at(indices: Option<&[i32]>, vertex: usize) -> i32 {
    indices.and_then(|indices| indices.get(vertex).copied()).unwrap_or(-1)
}
