//! Asset formats
//!
//! Parsing of the files the mesh pipeline consumes: the binary SMD model
//! format and XML attribute animations. XML material definitions are parsed
//! by [`crate::render::Material::load`] since they create GPU resources.

pub mod attribute_animation;
pub mod smd;

pub use attribute_animation::{
    AttributeAnimation, AttributeAnimationFactory, AttributeAnimationType, AttributeValue, Easing, ValueAnimation,
};

use std::path::PathBuf;

/// Asset loading errors
#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    /// The file does not exist
    #[error("Asset not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Binary model error
    #[error("SMD error: {0}")]
    Smd(#[from] smd::SmdError),

    /// XML document could not be parsed
    #[error("XML error in {}: {message}", path.display())]
    Xml {
        /// File being parsed
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for asset loading
pub type AssetResult<T> = Result<T, AssetError>;

impl AssetError {
    /// Map an IO error on `path`, distinguishing missing files
    pub fn from_io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.into()),
            _ => Self::Io(error),
        }
    }
}
