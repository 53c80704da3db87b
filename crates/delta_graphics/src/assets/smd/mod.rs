//! SMD binary model format
//!
//! Little-endian layout produced by the model exporter. Parsing is
//! split into plain records (this module) and the GPU-facing build steps in
//! [`crate::render`]: a [`MeshRecord`] is everything a mesh block holds, a
//! [`MaterialRecord`] is one entry of the material block.
//!
//! ```text
//! header (556) | object info x N (40 each) | material block | mesh blocks
//! ```

mod header;
mod material_record;
mod mesh_record;
mod reader;
mod records;

#[cfg(test)]
pub(crate) mod test_writer;

pub use header::{FrameInfo, ObjectInfo, SmdHeader, SmdVersion};
pub use material_record::{
    MaterialBlockHeader, MaterialRecord, TextureTransform, COLOR_TRANSFORM_HIDDEN, MESH_TRANSFORM_WATER,
    STAGE_OP_ADD,
};
pub use mesh_record::MeshRecord;
pub use reader::{decode_name, SmdReader};
pub use records::{Face, KeyPosition, KeyRotation, KeyScale, Keyframe, RawVertex, TextureLink};

/// Length of every fixed-width name field
pub const NAME_LENGTH: usize = 32;

/// Clip slots in the header and per mesh track
pub const MAX_FRAMES: usize = 32;

/// Maximum UV channels per face
pub const MAX_UV_CHANNELS: usize = 8;

/// Length of the header signature field
pub const SIGNATURE_LENGTH: usize = 24;

/// Signature selecting [`SmdVersion::V64`]
pub const SIGNATURE_V64: &str = "SMD Model data Ver 0.64";

/// SMD parsing errors
#[derive(thiserror::Error, Debug)]
pub enum SmdError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended inside a record
    #[error("Unexpected end of file while reading {context}")]
    UnexpectedEof {
        /// What was being read
        context: &'static str,
    },

    /// A field holds a value the layout cannot describe
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Result type for SMD parsing
pub type SmdResult<T> = Result<T, SmdError>;
