//! Mesh block: fixed header followed by the geometry and key arrays

use std::io::{Read, Seek};

use super::header::FrameInfo;
use super::reader::SmdReader;
use super::records::{Face, KeyPosition, KeyRotation, KeyScale, RawVertex, TextureLink};
use super::{SmdError, SmdResult, MAX_FRAMES};
use crate::foundation::math::{Color, IVec3, Mat4, Vec3};
use crate::scene::AABB;

/// Everything stored for one mesh object
#[derive(Debug, Clone)]
pub struct MeshRecord {
    /// Mesh name
    pub name: String,
    /// Name of the parent mesh, empty for roots
    pub parent_name: String,
    /// Object-space bounds
    pub bounds: AABB,
    /// Rendering position
    pub position: Vec3,
    /// Rendering rotation, fixed-point angle units
    pub rotation: IVec3,

    /// Rest pose
    pub base_frame: Mat4,
    /// Inverse of the rest pose
    pub base_frame_inverse: Mat4,
    /// Animation result stored by the exporter
    pub result_animation: Mat4,
    /// Rest rotation
    pub base_rotation: Mat4,
    /// World transform stored by the exporter
    pub world: Mat4,
    /// Local transform stored by the exporter
    pub local: Mat4,

    /// Last animated frame
    pub last_frame: i32,
    /// Rest translation, 8.8 fixed point
    pub base_position: [i32; 3],

    /// Clip table of the rotation track
    pub frames_info_rotation: [FrameInfo; MAX_FRAMES],
    /// Clip table of the position track
    pub frames_info_position: [FrameInfo; MAX_FRAMES],
    /// Clip table of the scale track
    pub frames_info_scaling: [FrameInfo; MAX_FRAMES],
    /// Valid entries in the clip tables
    pub frames_info_count: usize,

    /// Vertices
    pub vertices: Vec<RawVertex>,
    /// Faces, links resolved to indices
    pub faces: Vec<Face>,
    /// UV chain links, `next` resolved to indices
    pub texture_links: Vec<TextureLink>,
    /// Rotation keys
    pub rotation_keys: Vec<KeyRotation>,
    /// Position keys
    pub position_keys: Vec<KeyPosition>,
    /// Scale keys
    pub scale_keys: Vec<KeyScale>,
    /// Accumulated rotation preceding each rotation key
    pub previous_rotations: Vec<Mat4>,

    /// Per-vertex bone names, present for skinned meshes
    pub bone_names: Option<Vec<String>>,
    /// Per-vertex colors, present when the file carries them
    pub vertex_colors: Option<Vec<Color>>,
}

fn count(value: i32, what: &str) -> SmdResult<usize> {
    usize::try_from(value).map_err(|_| SmdError::InvalidFormat(format!("negative {what} count {value}")))
}

impl MeshRecord {
    /// Bytes before the first array
    pub const BLOCK_SIZE: usize = 2236;

    /// Read a mesh block and its arrays.
    ///
    /// Bone names follow the arrays only for meshes loaded against a
    /// skeleton; the vertex color block only in files that carry one.
    pub fn read<R: Read + Seek>(
        reader: &mut SmdReader<R>,
        read_bone_names: bool,
        read_vertex_color: bool,
    ) -> SmdResult<Self> {
        let _header = reader.read_u32("mesh header")?;
        let _vertices_pointer = reader.read_u32("mesh header")?;
        let _faces_pointer = reader.read_u32("mesh header")?;
        let links_pointer = reader.read_u32("mesh header")?;
        reader.skip(4 + RawVertex::SIZE)?;

        let mut min = Vec3::zeros();
        let mut max = Vec3::zeros();
        max.z = reader.read_fixed("mesh bounds")?;
        min.z = reader.read_fixed("mesh bounds")?;
        max.y = reader.read_fixed("mesh bounds")?;
        min.y = reader.read_fixed("mesh bounds")?;
        max.x = reader.read_fixed("mesh bounds")?;
        min.x = reader.read_fixed("mesh bounds")?;
        reader.skip(16)?;

        let vertex_count = count(reader.read_i32("mesh counts")?, "vertex")?;
        let face_count = count(reader.read_i32("mesh counts")?, "face")?;
        let link_count = count(reader.read_i32("mesh counts")?, "texture link")?;
        reader.skip(8)?;

        let position = reader.read_vec3("mesh position")?;
        reader.skip(12)?;
        let rotation = IVec3::from(reader.read_i32x3("mesh rotation")?);
        reader.skip(32)?;

        let name = reader.read_name("mesh name")?;
        let parent_name = reader.read_name("mesh parent name")?;
        reader.skip(4)?;

        let base_frame = reader.read_fixed_matrix("base frame")?;
        let base_frame_inverse = reader.read_fixed_matrix("base frame inverse")?;
        let result_animation = reader.read_float_matrix("result animation")?;
        let base_rotation = reader.read_fixed_matrix("base rotation")?;
        let world = reader.read_fixed_matrix("world matrix")?;
        let local = reader.read_fixed_matrix("local matrix")?;

        let last_frame = reader.read_i32("last frame")?;
        reader.skip(28)?;
        let base_position = reader.read_i32x3("base position")?;
        // Runtime key array pointers
        reader.skip(16)?;

        let rotation_count = count(reader.read_i32("key counts")?, "rotation key")?;
        let position_count = count(reader.read_i32("key counts")?, "position key")?;
        let scale_count = count(reader.read_i32("key counts")?, "scale key")?;

        let frames_info_rotation = FrameInfo::read_table(reader)?;
        let frames_info_position = FrameInfo::read_table(reader)?;
        let frames_info_scaling = FrameInfo::read_table(reader)?;
        let frames_info_count = count(reader.read_i32("frame info count")?, "frame info")?.min(MAX_FRAMES);

        let vertices = (0..vertex_count)
            .map(|_| RawVertex::read(reader))
            .collect::<SmdResult<Vec<_>>>()?;

        let raw_faces = (0..face_count)
            .map(|_| Face::read(reader))
            .collect::<SmdResult<Vec<_>>>()?;

        let raw_links = (0..link_count)
            .map(|_| TextureLink::read(reader))
            .collect::<SmdResult<Vec<_>>>()?;

        let rotation_keys = (0..rotation_count)
            .map(|_| KeyRotation::read(reader))
            .collect::<SmdResult<Vec<_>>>()?;
        let position_keys = (0..position_count)
            .map(|_| KeyPosition::read(reader))
            .collect::<SmdResult<Vec<_>>>()?;
        let scale_keys = (0..scale_count)
            .map(|_| KeyScale::read(reader))
            .collect::<SmdResult<Vec<_>>>()?;
        let previous_rotations = (0..rotation_count)
            .map(|_| reader.read_float_matrix("previous rotation"))
            .collect::<SmdResult<Vec<_>>>()?;

        let resolve = |pointer: u32, what: &str| {
            let index = TextureLink::index_from_pointer(pointer, links_pointer, link_count);
            if pointer != 0 && index.is_none() {
                log::warn!("Mesh '{name}': dropping out-of-range {what} pointer {pointer:#x}");
            }
            index
        };

        let texture_links = raw_links
            .into_iter()
            .map(|(link, next)| TextureLink { next: resolve(next, "texture link"), ..link })
            .collect();

        let faces = raw_faces
            .into_iter()
            .map(|(face, link)| Face { texture_link: resolve(link, "face link"), ..face })
            .collect();

        let bone_names = if read_bone_names {
            let names = (0..vertex_count)
                .map(|_| reader.read_name("bone names"))
                .collect::<SmdResult<Vec<_>>>()?;
            Some(names)
        } else {
            None
        };

        let vertex_colors = if read_vertex_color && reader.read_u8("vertex color flag")? != 0 {
            let colors = (0..vertex_count)
                .map(|_| {
                    let rgb = reader.read_vec3("vertex colors")?;
                    Ok(Color::new(rgb.x, rgb.y, rgb.z, 1.0))
                })
                .collect::<SmdResult<Vec<_>>>()?;
            Some(colors)
        } else {
            None
        };

        Ok(Self {
            name,
            parent_name,
            bounds: AABB::new(min, max),
            position,
            rotation,
            base_frame,
            base_frame_inverse,
            result_animation,
            base_rotation,
            world,
            local,
            last_frame,
            base_position,
            frames_info_rotation,
            frames_info_position,
            frames_info_scaling,
            frames_info_count,
            vertices,
            faces,
            texture_links,
            rotation_keys,
            position_keys,
            scale_keys,
            previous_rotations,
            bone_names,
            vertex_colors,
        })
    }
}
