//! Configuration system
//!
//! [`GraphicsConfig`] carries the device capability flags and tuning
//! constants the mesh pipeline reads at load and render time. Any type
//! implementing [`Config`] can be loaded from or saved to `.toml` and `.ron`.

use std::path::Path;

pub use serde::{Serialize, Deserialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match extension(path) {
            Some("toml") => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Some("ron") => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match extension(path) {
            Some("toml") => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?,
            Some("ron") => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Device capabilities and pipeline constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    /// Skin vertices on the CPU instead of sampling a bone texture
    pub use_software_skinning: bool,

    /// Mip levels dropped from textures of 3D models
    pub reduce_quality_texture: u32,

    /// Highest supported pixel shader major version
    pub pixel_shader_version_major: u32,

    /// Cull whole models against the camera before animating them
    pub use_frustum_culling: bool,

    /// Mip levels requested for textures embedded in model files
    pub mip_maps_default: u32,

    /// Meshes a quadtree node may hold before it is split
    pub quadtree_max_meshes: usize,

    /// Time, in the units passed to `Model::update`, to play `max_frame` frames
    pub animation_duration: f32,

    /// Frame auto-animation wraps back to
    pub animation_restart_frame: i32,

    /// Width in texels of the bone matrix texture
    pub bone_texture_width: u32,

    /// Effect used by materials built from model files
    pub shader_path: String,

    /// Attribute animations for scrolling texture transforms (1x, 2x, 4x)
    pub scroll_animation_paths: [String; 3],
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            use_software_skinning: false,
            reduce_quality_texture: 0,
            pixel_shader_version_major: 3,
            use_frustum_culling: true,
            mip_maps_default: 3,
            quadtree_max_meshes: 4,
            animation_duration: 4800.0,
            animation_restart_frame: 160,
            bone_texture_width: 384,
            shader_path: "game/scripts/shaders/LitSolid.fx".to_string(),
            scroll_animation_paths: [
                "game/scripts/animations/scroll1.xml".to_string(),
                "game/scripts/animations/scroll2.xml".to_string(),
                "game/scripts/animations/scroll4.xml".to_string(),
            ],
        }
    }
}

impl Config for GraphicsConfig {}
