//! Material block: collection header and per-material records

use std::io::{Read, Seek};

use super::reader::{decode_name, SmdReader};
use super::{SmdError, SmdResult};
use crate::foundation::math::Color;

/// Texture-stage operation that adds the stage to the previous result
pub const STAGE_OP_ADD: i32 = 7;

/// Colour-transform bit that hides a material
pub const COLOR_TRANSFORM_HIDDEN: i32 = 0x0400;

/// Mesh-transform bit for animated water surfaces
pub const MESH_TRANSFORM_WATER: i32 = 0x0200;

/// Per-stage texture coordinate animation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureTransform {
    /// Static coordinates
    None,
    /// Scroll at base speed
    Scrolling,
    /// Environment reflection, not animated here
    Reflex,
    /// Scroll at twice the base speed
    Scrolling2x,
    /// Scroll at four times the base speed
    Scrolling4x,
    /// Any other exporter value
    Other(i32),
}

impl From<i32> for TextureTransform {
    fn from(value: i32) -> Self {
        match value {
            0 => Self::None,
            4 => Self::Scrolling,
            5 => Self::Reflex,
            6 => Self::Scrolling2x,
            8 => Self::Scrolling4x,
            other => Self::Other(other),
        }
    }
}

impl TextureTransform {
    /// Whether the stage scrolls
    pub fn is_scrolling(self) -> bool {
        matches!(self, Self::Scrolling | Self::Scrolling2x | Self::Scrolling4x)
    }

    /// Slot of the scroll animation to play (1x, 2x, 4x)
    pub fn scroll_slot(self) -> Option<usize> {
        match self {
            Self::Scrolling => Some(0),
            Self::Scrolling2x => Some(1),
            Self::Scrolling4x => Some(2),
            Self::Other(value) if value >= 4 => Some(1),
            _ => None,
        }
    }
}

/// Header of the material block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialBlockHeader {
    /// Exporter tag
    pub header: u32,
    /// Runtime pointer slot
    pub pointer: u32,
    /// Number of material records
    pub count: usize,
    /// Material type of the collection
    pub material_type: i32,
}

impl MaterialBlockHeader {
    /// Size on disk, including the reserved tail
    pub const SIZE: usize = 16 + 72;

    /// Read the header and skip its reserved tail
    pub fn read<R: Read + Seek>(reader: &mut SmdReader<R>) -> SmdResult<Self> {
        let header = reader.read_u32("material block")?;
        let pointer = reader.read_u32("material block")?;
        let count = reader.read_i32("material block")?;
        let material_type = reader.read_i32("material block")?;
        reader.skip(72)?;

        let count = usize::try_from(count)
            .map_err(|_| SmdError::InvalidFormat(format!("negative material count {count}")))?;

        Ok(Self { header, pointer, count, material_type })
    }
}

/// One stored material
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialRecord {
    /// Number of faces using the material; zero means unused
    pub use_count: i32,
    /// Texture-stage operations
    pub texture_stage_state: [i32; 8],
    /// Texture-stage coordinate transforms
    pub texture_transform: [i32; 8],
    /// Material type
    pub material_type: i32,
    /// The first texture carries an opacity mask
    pub has_opacity_map: bool,
    /// Cycles through animated textures
    pub animated: bool,
    /// Blend state
    pub blend_type: i32,
    /// Lit
    pub shading: bool,
    /// Rendered without back-face culling
    pub two_sided: bool,
    /// Exporter serial id
    pub serial_id: u32,
    /// Diffuse color; alpha stores transparency, not opacity
    pub diffuse: Color,
    /// Self-illumination amount
    pub self_illumination: f32,
    /// Colour-transform flags
    pub color_transform: i32,
    /// Mesh flags
    pub mesh_flags: i32,
    /// Mesh-transform flags
    pub mesh_transform: i32,
    /// Frames of the texture animation
    pub frame_total: i32,
    /// Speed of the texture animation
    pub frame_speed: i32,
    /// Current texture animation frame
    pub animation_frame: i32,
    /// Static texture file names
    pub texture_names: Vec<String>,
    /// Animated texture file names
    pub animated_texture_names: Vec<String>,
}

impl MaterialRecord {
    /// Size on disk, excluding the trailing name block
    pub const SIZE: usize = 320;

    /// Read one record and its name block
    pub fn read<R: Read + Seek>(reader: &mut SmdReader<R>) -> SmdResult<Self> {
        let use_count = reader.read_i32("material")?;
        let textures_count = reader.read_i32("material")?;
        reader.skip(32)?;

        let mut texture_stage_state = [0; 8];
        for state in &mut texture_stage_state {
            *state = reader.read_i32("material stage state")?;
        }
        let mut texture_transform = [0; 8];
        for transform in &mut texture_transform {
            *transform = reader.read_i32("material texture transform")?;
        }
        let material_type = reader.read_i32("material")?;

        let has_opacity_map = reader.read_bool32("material")?;
        let animated = reader.read_bool32("material")?;
        let blend_type = reader.read_i32("material")?;
        let shading = reader.read_bool32("material")?;
        let two_sided = reader.read_bool32("material")?;

        let serial_id = reader.read_u32("material")?;
        let diffuse = Color::new(
            reader.read_f32("material diffuse")?,
            reader.read_f32("material diffuse")?,
            reader.read_f32("material diffuse")?,
            reader.read_f32("material diffuse")?,
        );
        let self_illumination = reader.read_f32("material")?;
        reader.skip(12)?;

        let color_transform = reader.read_i32("material")?;
        let mesh_flags = reader.read_i32("material")?;
        let mesh_transform = reader.read_i32("material")?;
        reader.skip(128)?;

        let animated_count = reader.read_i32("material")?;
        let frame_total = reader.read_i32("material")?;
        let frame_speed = reader.read_i32("material")?;
        let animation_frame = reader.read_i32("material")?;

        let mut texture_names = Vec::new();
        let mut animated_texture_names = Vec::new();

        if use_count != 0 {
            let block = reader.read_block("material names")?;
            if textures_count >= 0 && animated_count >= 0 {
                // Each texture is a pair of strings; only the first names a file
                let mut strings = block.split(|&b| b == 0).map(decode_name);
                for _ in 0..textures_count {
                    texture_names.push(strings.next().unwrap_or_default());
                    strings.next();
                }
                for _ in 0..animated_count {
                    animated_texture_names.push(strings.next().unwrap_or_default());
                    strings.next();
                }
            }
        }

        Ok(Self {
            use_count,
            texture_stage_state,
            texture_transform,
            material_type,
            has_opacity_map,
            animated,
            blend_type,
            shading,
            two_sided,
            serial_id,
            diffuse,
            self_illumination,
            color_transform,
            mesh_flags,
            mesh_transform,
            frame_total,
            frame_speed,
            animation_frame,
            texture_names,
            animated_texture_names,
        })
    }

    /// Stage transform as an enum
    pub fn transform(&self, stage: usize) -> TextureTransform {
        TextureTransform::from(self.texture_transform[stage])
    }
}
