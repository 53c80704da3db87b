//! Materials of one model
//!
//! The collection is read from the material block of an SMD file. A text
//! file next to the model (same path, `.txt` extension) may override it
//! with XML material definitions, one path per line in material order.

use std::io::{Read, Seek};
use std::path::Path;

use super::device::{GraphicsDevice, TextureOptions};
use super::material::{Material, MaterialBuildOptions};
use super::renderer::Renderer;
use super::Graphics;
use crate::assets::smd::{MaterialBlockHeader, MaterialRecord, SmdReader};
use crate::assets::{AssetError, AssetResult};

/// Index of a material inside its [`MaterialCollection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub usize);

/// Lines of the sidecar list containing this marker keep the binary material
const NO_TEXTURE_MARKER: &str = "NoTexture";

/// Materials of a model, addressed by [`MaterialId`]
#[derive(Debug, Clone, Default)]
pub struct MaterialCollection {
    /// Model name
    pub name: String,
    /// Exporter tag of the material block
    pub header: u32,
    /// Non-zero for collections drawn by a custom renderer
    pub material_type: i32,
    materials: Vec<Material>,
}

impl MaterialCollection {
    /// Empty collection
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Read the material block: header, reserved tail, then every record
    pub fn build<R: Read + Seek>(
        &mut self,
        reader: &mut SmdReader<R>,
        options: MaterialBuildOptions,
        gfx: &mut Graphics,
    ) -> AssetResult<()> {
        let block = MaterialBlockHeader::read(reader)?;
        self.header = block.header;
        self.material_type = block.material_type;

        self.materials.clear();
        self.materials.reserve(block.count);
        for _ in 0..block.count {
            let record = MaterialRecord::read(reader)?;
            self.materials.push(Material::build(&record, options, gfx));
        }

        log::debug!("Material block of '{}': {} materials", self.name, self.materials.len());
        Ok(())
    }

    /// Apply the sidecar material list.
    ///
    /// Line `n` names the XML definition of material `n`. Missing files,
    /// lines marked `NoTexture` and lines past the last material are
    /// skipped; a definition that fails to parse is logged and skipped.
    pub fn load(&mut self, path: impl AsRef<Path>, gfx: &mut Graphics) -> AssetResult<()> {
        let path = path.as_ref();
        let list = std::fs::read_to_string(path).map_err(|error| AssetError::from_io(path, error))?;

        for (index, line) in list.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.contains(NO_TEXTURE_MARKER) || !Path::new(line).is_file() {
                continue;
            }

            let Some(material) = self.materials.get_mut(index) else {
                log::warn!("{}: line {} has no matching material", path.display(), index + 1);
                continue;
            };

            if let Err(error) = material.load(line, true, gfx) {
                log::warn!("{}: {error}", path.display());
            }
        }

        Ok(())
    }

    /// Append a single-texture material
    pub fn create_material(
        &mut self,
        texture: &str,
        two_sided: bool,
        shading: bool,
        blend_type: i32,
        gfx: &mut Graphics,
    ) -> MaterialId {
        let mut material = Material::default();
        material.use_count = 2;
        material.shading = shading;
        material.two_sided = two_sided;
        material.blend_type = blend_type;
        material.diffuse_color.a = 0.0;

        if let Some(texture) = gfx.textures.create(texture, TextureOptions::default()) {
            material.textures.push(texture);
        }

        self.materials.push(material);
        MaterialId(self.materials.len() - 1)
    }

    /// Append a texture to a material
    pub fn add_texture(&mut self, id: MaterialId, texture: &str, gfx: &mut Graphics) {
        let Some(material) = self.materials.get_mut(id.0) else {
            return;
        };
        if let Some(texture) = gfx.textures.create(texture, TextureOptions::default()) {
            material.textures.push(texture);
        }
    }

    /// Turn a material into a texture animation over `textures`
    pub fn add_animated_texture(
        &mut self,
        id: MaterialId,
        textures: &[&str],
        blend_type: i32,
        auto_animate: bool,
        gfx: &mut Graphics,
    ) {
        let Some(material) = self.materials.get_mut(id.0) else {
            return;
        };

        for name in textures {
            if let Some(texture) = gfx.textures.create(name, TextureOptions::default()) {
                material.animated_textures.push(texture);
            }
        }

        material.has_opacity_map = false;
        material.diffuse_color.a = 0.0;
        material.frame_total = textures.len() as i32 - 1;
        material.frame_speed = 6;
        material.color_transform = 0;
        material.animated = true;
        material.blend_type = blend_type;
        material.animation_frame = if auto_animate { 0x100 } else { 0 };
        material.use_count += 1;
    }

    /// Set the texture animation frame; returns the previous one
    pub fn set_frame(&mut self, id: MaterialId, frame: i32) -> Option<i32> {
        let material = self.materials.get_mut(id.0)?;
        Some(std::mem::replace(&mut material.animation_frame, frame))
    }

    /// First used material with a static or animated texture loaded from `path`
    pub fn material_by_texture(&self, path: &str) -> Option<MaterialId> {
        self.materials
            .iter()
            .position(|material| {
                material.use_count != 0
                    && material
                        .textures
                        .iter()
                        .chain(&material.animated_textures)
                        .any(|texture| texture.path.eq_ignore_ascii_case(path))
            })
            .map(MaterialId)
    }

    /// Overlay `material` on every material of the collection
    pub fn set_blending_material(&mut self, material: Option<MaterialId>, use_blending_map: bool) {
        for target in &mut self.materials {
            target.set_blending_material(material, use_blending_map);
        }
    }

    /// Prepare material `id` for drawing, resolving its overlay
    pub fn prepare(&self, id: MaterialId, renderer: &Renderer, device: &mut dyn GraphicsDevice) -> bool {
        let Some(material) = self.get(id) else {
            return false;
        };
        let blending = material.blending_material().and_then(|overlay| self.get(overlay));
        material.prepare(blending, renderer, device)
    }

    /// Material by id
    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0)
    }

    /// Material by id, for editing
    pub fn get_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id.0)
    }

    /// All materials in id order
    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.materials.iter()
    }

    /// All materials in id order, for editing
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Material> {
        self.materials.iter_mut()
    }

    /// Number of materials
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Whether the collection holds no material
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
