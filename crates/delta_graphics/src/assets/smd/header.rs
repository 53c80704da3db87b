//! File header, clip table and object directory

use std::io::{Read, Seek};

use super::reader::{decode_name, SmdReader};
use super::{SmdResult, MAX_FRAMES, SIGNATURE_LENGTH, SIGNATURE_V64};

/// Format revision, chosen by the header signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmdVersion {
    /// Objects located through explicit file offsets
    V62,
    /// Objects stored back to back, with per-vertex colors
    V64,
}

impl SmdVersion {
    /// Detect the version from the signature text
    pub fn from_signature(signature: &str) -> Self {
        if signature.eq_ignore_ascii_case(SIGNATURE_V64) {
            Self::V64
        } else {
            Self::V62
        }
    }

    /// Whether meshes of this version carry a vertex color block
    pub fn has_vertex_colors(self) -> bool {
        self == Self::V64
    }
}

/// A clip range inside a key-frame track
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInfo {
    /// First frame of the clip
    pub start_frame: i32,
    /// Frame the clip ends at (exclusive)
    pub end_frame: i32,
    /// Index of the clip's first key
    pub key_frame_start_index: i32,
    /// Number of keys in the clip
    pub key_frame_count: i32,
}

impl FrameInfo {
    /// Size on disk
    pub const SIZE: i64 = 16;

    /// Read one record
    pub fn read<R: Read + Seek>(reader: &mut SmdReader<R>) -> SmdResult<Self> {
        Ok(Self {
            start_frame: reader.read_i32("frame info")?,
            end_frame: reader.read_i32("frame info")?,
            key_frame_start_index: reader.read_i32("frame info")?,
            key_frame_count: reader.read_i32("frame info")?,
        })
    }

    /// Read a fixed table of [`MAX_FRAMES`] records
    pub fn read_table<R: Read + Seek>(reader: &mut SmdReader<R>) -> SmdResult<[Self; MAX_FRAMES]> {
        let mut table = [Self::default(); MAX_FRAMES];
        for entry in &mut table {
            *entry = Self::read(reader)?;
        }
        Ok(table)
    }

    /// Whether this clip has keys and covers `frame`
    pub fn covers(&self, frame: i32) -> bool {
        self.key_frame_count > 0 && self.start_frame <= frame && self.end_frame > frame
    }
}

/// File header
#[derive(Debug, Clone)]
pub struct SmdHeader {
    /// Signature text
    pub signature: String,
    /// Detected version
    pub version: SmdVersion,
    /// Number of object records
    pub object_count: i32,
    /// Number of materials
    pub material_count: i32,
    /// Offset of the material block
    pub materials_offset: i32,
    /// Offset of the first object
    pub first_object_offset: i32,
    /// Number of valid entries in `frames`
    pub frame_count: i32,
    /// Animation clips
    pub frames: [FrameInfo; MAX_FRAMES],
}

impl SmdHeader {
    /// Size on disk
    pub const SIZE: usize = SIGNATURE_LENGTH + 5 * 4 + MAX_FRAMES * 16;

    /// Read the header from the start of the file
    pub fn read<R: Read + Seek>(reader: &mut SmdReader<R>) -> SmdResult<Self> {
        let mut signature = [0u8; SIGNATURE_LENGTH];
        reader.read_exact(&mut signature, "header signature")?;
        let signature = decode_name(&signature);
        let version = SmdVersion::from_signature(&signature);

        Ok(Self {
            object_count: reader.read_i32("header")?,
            material_count: reader.read_i32("header")?,
            materials_offset: reader.read_i32("header")?,
            first_object_offset: reader.read_i32("header")?,
            frame_count: reader.read_i32("header")?,
            frames: FrameInfo::read_table(reader)?,
            signature,
            version,
        })
    }

    /// Valid clips
    pub fn clips(&self) -> &[FrameInfo] {
        let count = usize::try_from(self.frame_count).unwrap_or(0).min(MAX_FRAMES);
        &self.frames[..count]
    }
}

/// Directory entry for one mesh object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Object name
    pub name: String,
    /// Byte length of the object block
    pub length: i32,
    /// Absolute offset of the object block
    pub file_offset: i32,
}

impl ObjectInfo {
    /// Size on disk
    pub const SIZE: usize = super::NAME_LENGTH + 8;

    /// Read one entry
    pub fn read<R: Read + Seek>(reader: &mut SmdReader<R>) -> SmdResult<Self> {
        Ok(Self {
            name: reader.read_name("object name")?,
            length: reader.read_i32("object length")?,
            file_offset: reader.read_i32("object offset")?,
        })
    }
}
