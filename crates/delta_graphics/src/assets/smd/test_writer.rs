//! Little-endian SMD writer for test fixtures

use super::header::FrameInfo;
use super::{MAX_FRAMES, NAME_LENGTH, SIGNATURE_LENGTH, SIGNATURE_V64};
use crate::foundation::math::{utils, Mat4, Vec3};
use crate::scene::AABB;

/// Arbitrary non-zero address of the texture link array
const LINK_BASE: u32 = 0x0040_0000;

/// Material record contents
#[derive(Debug, Clone)]
pub(crate) struct MaterialSpec {
    pub use_count: i32,
    pub textures: Vec<String>,
    pub animated_textures: Vec<String>,
    pub stage_state: [i32; 8],
    pub texture_transform: [i32; 8],
    /// Stored alpha, which the loader inverts
    pub transparency: f32,
    pub has_opacity_map: bool,
    pub two_sided: bool,
    pub color_transform: i32,
    pub mesh_transform: i32,
}

impl MaterialSpec {
    pub fn textured(textures: &[&str]) -> Self {
        Self {
            use_count: 1,
            textures: textures.iter().map(|t| t.to_string()).collect(),
            animated_textures: Vec::new(),
            stage_state: [0; 8],
            texture_transform: [0; 8],
            transparency: 0.0,
            has_opacity_map: false,
            two_sided: false,
            color_transform: 0,
            mesh_transform: 0,
        }
    }
}

/// Mesh block contents
#[derive(Debug, Clone)]
pub(crate) struct MeshSpec {
    pub name: String,
    pub parent: String,
    pub vertices: Vec<Vec3>,
    /// Vertex indices and material id
    pub faces: Vec<([u16; 3], u16)>,
    /// Per-face corner UVs; defaults to the vertex X/Y
    pub face_uvs: Option<Vec<[[f32; 2]; 3]>>,
    /// Chain a second UV channel to every face
    pub extra_uv_channel: bool,
    pub base_frame: Mat4,
    /// Stored as raw floats, unlike the other matrices
    pub result_animation: Mat4,
    pub base_position: [i32; 3],
    pub rotation_keys: Vec<(i32, [f32; 4])>,
    pub position_keys: Vec<(i32, [f32; 3])>,
    pub scale_keys: Vec<(i32, [f32; 3])>,
    /// Defaults to identity per rotation key
    pub previous_rotations: Option<Vec<Mat4>>,
    pub frames_info_rotation: Vec<FrameInfo>,
    pub bone_names: Option<Vec<String>>,
    pub vertex_colors: Option<Vec<[f32; 3]>>,
}

impl MeshSpec {
    /// Geometry-free mesh, as exported for skeleton bones
    pub fn bone(name: &str, parent: &str) -> Self {
        Self {
            name: name.to_string(),
            parent: parent.to_string(),
            vertices: Vec::new(),
            faces: Vec::new(),
            face_uvs: None,
            extra_uv_channel: false,
            base_frame: Mat4::identity(),
            result_animation: Mat4::identity(),
            base_position: [0; 3],
            rotation_keys: Vec::new(),
            position_keys: Vec::new(),
            scale_keys: Vec::new(),
            previous_rotations: None,
            frames_info_rotation: Vec::new(),
            bone_names: None,
            vertex_colors: None,
        }
    }

    /// One triangle in the XY plane
    pub fn triangle(name: &str, material: u16) -> Self {
        Self {
            vertices: vec![Vec3::zeros(), Vec3::x(), Vec3::y()],
            faces: vec![([0, 1, 2], material)],
            ..Self::bone(name, "")
        }
    }

    /// Unit quad as two triangles sharing an edge
    pub fn quad(name: &str, material: u16) -> Self {
        Self {
            vertices: vec![Vec3::zeros(), Vec3::x(), Vec3::new(1.0, 1.0, 0.0), Vec3::y()],
            faces: vec![([0, 1, 2], material), ([0, 2, 3], material)],
            ..Self::bone(name, "")
        }
    }

    /// Same geometry moved by an offset
    pub fn offset(mut self, offset: Vec3) -> Self {
        for vertex in &mut self.vertices {
            *vertex += offset;
        }
        self
    }

    fn channels(&self) -> usize {
        if self.extra_uv_channel { 2 } else { 1 }
    }

    fn uv(&self, face: usize, corner: usize) -> [f32; 2] {
        match &self.face_uvs {
            Some(uvs) => uvs[face][corner],
            None => {
                let vertex = self.vertices[usize::from(self.faces[face].0[corner])];
                [vertex.x, vertex.y]
            }
        }
    }
}

/// Byte sink with the format's primitive encodings
#[derive(Debug, Default)]
pub(crate) struct SmdWriter {
    bytes: Vec<u8>,
}

impl SmdWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn f32(&mut self, value: f32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn fixed(&mut self, value: f32) {
        self.i32(utils::float_to_fixed(value));
    }

    pub fn zeros(&mut self, count: usize) {
        self.bytes.resize(self.bytes.len() + count, 0);
    }

    pub fn text(&mut self, text: &str, width: usize) {
        let raw = text.as_bytes();
        let len = raw.len().min(width - 1);
        self.bytes.extend_from_slice(&raw[..len]);
        self.zeros(width - len);
    }

    pub fn name(&mut self, name: &str) {
        self.text(name, NAME_LENGTH);
    }

    /// Column-major storage is the file's row-vector row-major order
    pub fn fixed_matrix(&mut self, matrix: &Mat4) {
        for &value in matrix.as_slice() {
            self.fixed(value);
        }
    }

    pub fn float_matrix(&mut self, matrix: &Mat4) {
        for &value in matrix.as_slice() {
            self.f32(value);
        }
    }

    pub fn frame_info(&mut self, info: &FrameInfo) {
        self.i32(info.start_frame);
        self.i32(info.end_frame);
        self.i32(info.key_frame_start_index);
        self.i32(info.key_frame_count);
    }

    fn frame_table(&mut self, infos: &[FrameInfo]) {
        for slot in 0..MAX_FRAMES {
            self.frame_info(&infos.get(slot).copied().unwrap_or_default());
        }
    }

    pub fn write_header(&mut self, signature: &str, objects: i32, materials: i32, first_object: i32, clips: &[FrameInfo]) {
        self.text(signature, SIGNATURE_LENGTH);
        self.i32(objects);
        self.i32(materials);
        self.i32(0);
        self.i32(first_object);
        self.i32(clips.len() as i32);
        self.frame_table(clips);
    }

    pub fn write_material(&mut self, spec: &MaterialSpec) {
        self.i32(spec.use_count);
        self.i32(spec.textures.len() as i32);
        self.zeros(32);
        for &state in &spec.stage_state {
            self.i32(state);
        }
        for &transform in &spec.texture_transform {
            self.i32(transform);
        }
        self.i32(0);

        self.i32(i32::from(spec.has_opacity_map));
        self.i32(i32::from(!spec.animated_textures.is_empty()));
        self.i32(0);
        self.i32(1);
        self.i32(i32::from(spec.two_sided));

        self.u32(0);
        for channel in [1.0, 1.0, 1.0, spec.transparency] {
            self.f32(channel);
        }
        self.f32(0.0);
        self.zeros(12);

        self.i32(spec.color_transform);
        self.i32(0);
        self.i32(spec.mesh_transform);
        self.zeros(128);

        self.i32(spec.animated_textures.len() as i32);
        self.i32(spec.animated_textures.len() as i32);
        self.i32(0);
        self.i32(0);

        if spec.use_count != 0 {
            let mut block = Vec::new();
            for name in spec.textures.iter().chain(&spec.animated_textures) {
                block.extend_from_slice(name.as_bytes());
                block.extend_from_slice(b"\0\0");
            }
            self.i32(block.len() as i32);
            self.bytes.extend_from_slice(&block);
        }
    }

    pub fn write_material_block(&mut self, material_type: i32, materials: &[MaterialSpec]) {
        self.u32(0);
        self.u32(0);
        self.i32(materials.len() as i32);
        self.i32(material_type);
        self.zeros(72);
        for material in materials {
            self.write_material(material);
        }
    }

    pub fn write_mesh(&mut self, spec: &MeshSpec) {
        let channels = spec.channels();
        let link_count = spec.faces.len() * channels;

        self.u32(0);
        self.u32(0);
        self.u32(0);
        self.u32(LINK_BASE);
        self.zeros(28);

        let bounds = if spec.vertices.is_empty() {
            AABB::new(Vec3::zeros(), Vec3::zeros())
        } else {
            AABB::from_points(spec.vertices.iter().copied())
        };
        for value in [bounds.max.z, bounds.min.z, bounds.max.y, bounds.min.y, bounds.max.x, bounds.min.x] {
            self.fixed(value);
        }
        self.zeros(16);

        self.i32(spec.vertices.len() as i32);
        self.i32(spec.faces.len() as i32);
        self.i32(link_count as i32);
        self.zeros(8);

        self.zeros(12);
        self.zeros(12);
        self.zeros(12);
        self.zeros(32);

        self.name(&spec.name);
        self.name(&spec.parent);
        self.zeros(4);

        let inverse = spec.base_frame.try_inverse().unwrap_or_else(Mat4::identity);
        self.fixed_matrix(&spec.base_frame);
        self.fixed_matrix(&inverse);
        self.float_matrix(&spec.result_animation);
        for _ in 0..3 {
            self.fixed_matrix(&Mat4::identity());
        }

        let last_frame = spec.rotation_keys.last().map_or(0, |k| k.0);
        self.i32(last_frame);
        self.zeros(28);
        for &value in &spec.base_position {
            self.i32(value);
        }
        self.zeros(16);

        self.i32(spec.rotation_keys.len() as i32);
        self.i32(spec.position_keys.len() as i32);
        self.i32(spec.scale_keys.len() as i32);

        self.frame_table(&spec.frames_info_rotation);
        self.frame_table(&[]);
        self.frame_table(&[]);
        self.i32(spec.frames_info_rotation.len() as i32);

        for vertex in &spec.vertices {
            self.fixed(vertex.x);
            self.fixed(vertex.y);
            self.fixed(vertex.z);
            self.fixed(0.0);
            self.fixed(0.0);
            self.fixed(1.0);
        }

        for (index, (vertices, material)) in spec.faces.iter().enumerate() {
            for &vertex in vertices {
                self.u16(vertex);
            }
            self.u16(*material);
            self.zeros(24);
            self.u32(LINK_BASE + (index * channels) as u32 * 32);
        }

        for face in 0..spec.faces.len() {
            for channel in 0..channels {
                let uvs: Vec<[f32; 2]> = (0..3).map(|corner| spec.uv(face, corner)).collect();
                for uv in &uvs {
                    self.f32(uv[0] + channel as f32);
                }
                for uv in &uvs {
                    self.f32(uv[1]);
                }
                self.u32(0);
                let next = if channel + 1 < channels {
                    LINK_BASE + (face * channels + channel + 1) as u32 * 32
                } else {
                    0
                };
                self.u32(next);
            }
        }

        for (frame, [x, y, z, w]) in &spec.rotation_keys {
            self.i32(*frame);
            for value in [x, y, z, w] {
                self.f32(*value);
            }
        }
        for (frame, position) in &spec.position_keys {
            self.i32(*frame);
            for value in position {
                self.f32(*value);
            }
        }
        for (frame, scale) in &spec.scale_keys {
            self.i32(*frame);
            for value in scale {
                self.fixed(*value);
            }
        }
        for index in 0..spec.rotation_keys.len() {
            let matrix = spec
                .previous_rotations
                .as_ref()
                .and_then(|m| m.get(index).copied())
                .unwrap_or_else(Mat4::identity);
            self.float_matrix(&matrix);
        }

        if let Some(names) = &spec.bone_names {
            for name in names {
                self.name(name);
            }
        }

        if let Some(colors) = &spec.vertex_colors {
            self.u8(1);
            for rgb in colors {
                for &channel in rgb {
                    self.f32(channel);
                }
            }
        }
    }

    /// Complete file: header, object directory, materials, meshes
    pub fn model(v64: bool, clips: &[FrameInfo], materials: &[MaterialSpec], meshes: &[MeshSpec]) -> Vec<u8> {
        let signature = if v64 { SIGNATURE_V64 } else { "SMD Model data Ver 0.62" };

        let mut material_block = SmdWriter::new();
        if !materials.is_empty() {
            material_block.write_material_block(0, materials);
        }

        let mesh_blocks: Vec<Vec<u8>> = meshes
            .iter()
            .map(|mesh| {
                let mut block = SmdWriter::new();
                block.write_mesh(mesh);
                if v64 && mesh.vertex_colors.is_none() {
                    // V64 always stores the color flag
                    block.u8(0);
                }
                block.into_bytes()
            })
            .collect();

        let directory_end = super::SmdHeader::SIZE + meshes.len() * super::ObjectInfo::SIZE;
        let first_object = directory_end + material_block.len();

        let mut writer = SmdWriter::new();
        writer.write_header(signature, meshes.len() as i32, materials.len() as i32, first_object as i32, clips);

        let mut offset = first_object;
        for (mesh, block) in meshes.iter().zip(&mesh_blocks) {
            writer.name(&mesh.name);
            writer.i32(block.len() as i32);
            writer.i32(offset as i32);
            offset += block.len();
        }

        writer.bytes.extend_from_slice(&material_block.into_bytes());
        for block in mesh_blocks {
            writer.bytes.extend_from_slice(&block);
        }
        writer.into_bytes()
    }
}
