//! Fixed-size array records of a mesh block

use std::io::{Read, Seek};

use super::reader::SmdReader;
use super::SmdResult;
use crate::foundation::math::{utils, Quat, Quaternion, Vec3};

/// Fixed-point vertex position and normal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawVertex {
    /// Position, 8.8 fixed point
    pub position: [i32; 3],
    /// Normal, 8.8 fixed point
    pub normal: [i32; 3],
}

impl RawVertex {
    /// Size on disk
    pub const SIZE: i64 = 24;

    /// Read one record
    pub fn read<R: Read + Seek>(reader: &mut SmdReader<R>) -> SmdResult<Self> {
        Ok(Self {
            position: reader.read_i32x3("vertex")?,
            normal: reader.read_i32x3("vertex")?,
        })
    }

    /// Decoded position
    pub fn position(&self) -> Vec3 {
        utils::fixed_to_vec3(self.position)
    }

    /// Decoded normal
    pub fn normal(&self) -> Vec3 {
        utils::fixed_to_vec3(self.normal)
    }
}

/// Triangle referencing three vertices and one material
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Face {
    /// Vertex indices
    pub vertices: [u16; 3],
    /// Material id inside the model's collection
    pub material: u16,
    /// Head of the texture-coordinate chain
    pub texture_link: Option<usize>,
}

impl Face {
    /// Size on disk
    pub const SIZE: i64 = 36;

    /// Read one record; returns the face and its raw link pointer
    pub fn read<R: Read + Seek>(reader: &mut SmdReader<R>) -> SmdResult<(Self, u32)> {
        let vertices = [
            reader.read_u16("face")?,
            reader.read_u16("face")?,
            reader.read_u16("face")?,
        ];
        let material = reader.read_u16("face")?;
        // Unused per-corner UVs, superseded by the link chain
        reader.skip(24)?;
        let link = reader.read_u32("face")?;

        Ok((Self { vertices, material, texture_link: None }, link))
    }
}

/// One UV channel of a face, chained to the next channel
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextureLink {
    /// U per face corner
    pub u: [f32; 3],
    /// V per face corner
    pub v: [f32; 3],
    /// Next channel in the chain
    pub next: Option<usize>,
}

impl TextureLink {
    /// Size on disk
    pub const SIZE: u32 = 32;

    /// Read one record; returns the link and its raw `next` pointer
    pub fn read<R: Read + Seek>(reader: &mut SmdReader<R>) -> SmdResult<(Self, u32)> {
        let mut link = Self::default();
        for u in &mut link.u {
            *u = reader.read_f32("texture link")?;
        }
        for v in &mut link.v {
            *v = reader.read_f32("texture link")?;
        }
        // Texture handle slot, runtime only
        reader.skip(4)?;
        let next = reader.read_u32("texture link")?;
        Ok((link, next))
    }

    /// UV of one face corner
    pub fn uv(&self, corner: usize) -> [f32; 2] {
        [self.u[corner], self.v[corner]]
    }

    /// Convert a stored pointer into an index of the link array.
    ///
    /// `base` is the array pointer stored in the mesh header. Zero means no
    /// link; pointers outside the array are rejected.
    pub fn index_from_pointer(pointer: u32, base: u32, count: usize) -> Option<usize> {
        if pointer == 0 {
            return None;
        }
        let offset = pointer.checked_sub(base)?;
        if offset % Self::SIZE != 0 {
            return None;
        }
        let index = (offset / Self::SIZE) as usize;
        (index < count).then_some(index)
    }
}

/// Animation sample ordered by frame
pub trait Keyframe {
    /// Frame the sample belongs to
    fn frame(&self) -> i32;
}

/// Rotation sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyRotation {
    /// Frame number
    pub frame: i32,
    /// Quaternion x
    pub x: f32,
    /// Quaternion y
    pub y: f32,
    /// Quaternion z
    pub z: f32,
    /// Quaternion w
    pub w: f32,
}

impl KeyRotation {
    /// Size on disk
    pub const SIZE: i64 = 20;

    /// Read one record
    pub fn read<R: Read + Seek>(reader: &mut SmdReader<R>) -> SmdResult<Self> {
        Ok(Self {
            frame: reader.read_i32("rotation key")?,
            x: reader.read_f32("rotation key")?,
            y: reader.read_f32("rotation key")?,
            z: reader.read_f32("rotation key")?,
            w: reader.read_f32("rotation key")?,
        })
    }

    /// Normalized rotation
    pub fn rotation(&self) -> Quat {
        Quat::new_normalize(Quaternion::new(self.w, self.x, self.y, self.z))
    }
}

impl Keyframe for KeyRotation {
    fn frame(&self) -> i32 {
        self.frame
    }
}

/// Translation sample, stored as floats
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPosition {
    /// Frame number
    pub frame: i32,
    /// Translation
    pub position: Vec3,
}

impl KeyPosition {
    /// Size on disk
    pub const SIZE: i64 = 16;

    /// Read one record
    pub fn read<R: Read + Seek>(reader: &mut SmdReader<R>) -> SmdResult<Self> {
        Ok(Self {
            frame: reader.read_i32("position key")?,
            position: reader.read_vec3("position key")?,
        })
    }
}

impl Keyframe for KeyPosition {
    fn frame(&self) -> i32 {
        self.frame
    }
}

/// Scale sample, stored as 8.8 fixed point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyScale {
    /// Frame number
    pub frame: i32,
    /// Per-axis scale, 8.8 fixed point
    pub scale: [i32; 3],
}

impl KeyScale {
    /// Size on disk
    pub const SIZE: i64 = 16;

    /// Read one record
    pub fn read<R: Read + Seek>(reader: &mut SmdReader<R>) -> SmdResult<Self> {
        Ok(Self {
            frame: reader.read_i32("scale key")?,
            scale: reader.read_i32x3("scale key")?,
        })
    }

    /// Decoded scale
    pub fn scale(&self) -> Vec3 {
        utils::fixed_to_vec3(self.scale)
    }
}

impl Keyframe for KeyScale {
    fn frame(&self) -> i32 {
        self.frame
    }
}
