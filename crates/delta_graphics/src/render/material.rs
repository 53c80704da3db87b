//! # Material
//!
//! Surface state for one material of a model: textures, blend and cull
//! state, attribute animations and the compiled effect.
//!
//! Materials come from the binary material block of an SMD file and can be
//! overridden by an XML definition:
//!
//! ```xml
//! <Material>
//!     <Effect file="game/scripts/shaders/LitSolid.fx" defines="DIFFUSEMAP"/>
//!     <Texture file="body.dds"/>
//!     <Texture file="glow.dds" blendMode="Add"/>
//!     <AnimatedTexture file="fire%d.dds" count="4"/>
//!     <Attribute type="DiffuseColor" value="1 1 1 1"/>
//!     <AttributeAnimation file="game/scripts/animations/pulse.xml"/>
//! </Material>
//! ```

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use super::device::{BlendMode, CullMode, GraphicsDevice, ShaderDefine, ShaderEffect, Texture, TextureOptions};
use super::material_collection::MaterialId;
use super::renderer::Renderer;
use super::Graphics;
use crate::assets::smd::{MaterialRecord, TextureTransform, MESH_TRANSFORM_WATER, STAGE_OP_ADD};
use crate::assets::{AssetError, AssetResult, AttributeAnimation, AttributeAnimationType};
use crate::foundation::math::{Color, Vec2};

/// Texture slots set by [`Material::apply`]
pub const MAX_TEXTURE_SLOTS: usize = 8;

/// Defines announcing the texture in stage 0 and 1
const STAGE_DEFINES: [&str; 2] = ["DIFFUSEMAP", "SELFILLUMINATIONMAP"];

/// Animated textures advance this many frames per second of world time
const ANIMATED_TEXTURE_FPS: f32 = 16.0;

/// How a material record is turned into a [`Material`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialBuildOptions {
    /// Meshes using the material are skinned
    pub skinned: bool,
    /// Create textures, animations and the effect; otherwise keep only the record
    pub load_textures: bool,
    /// Meshes using the material carry vertex colors
    pub use_vertex_color: bool,
    /// Mip levels requested for textures
    pub mip_levels: u32,
    /// Textures are released with the scene
    pub temporary_textures: bool,
}

/// Appearance of a batch of faces
#[derive(Debug, Clone)]
pub struct Material {
    /// Faces using the material; zero means unused
    pub use_count: i32,
    /// Texture-stage operations
    pub texture_stage_state: [i32; 8],
    /// Texture coordinate animations per stage
    pub texture_transform: [i32; 8],
    /// Material type
    pub material_type: i32,
    /// First texture carries an opacity mask
    pub has_opacity_map: bool,
    /// Cycles through `animated_textures`
    pub animated: bool,
    /// Blend state index
    pub blend_type: i32,
    /// Lit
    pub shading: bool,
    /// Drawn without back-face culling
    pub two_sided: bool,
    /// Exporter serial id
    pub serial_id: u32,
    /// Diffuse color; alpha is opacity once textures are loaded
    pub diffuse_color: Color,
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

    /// Static textures, in stage order
    pub textures: Vec<Rc<Texture>>,
    /// Frames of the texture animation
    pub animated_textures: Vec<Rc<Texture>>,
    /// Shared colour and scroll animations
    pub attribute_animations: Vec<Rc<RefCell<AttributeAnimation>>>,

    /// Diffuse color was set explicitly and is used as-is
    pub custom_material: bool,
    /// Color added after lighting
    pub add_color: Color,
    /// 1 when the self-illumination stage adds instead of modulating
    pub self_illumination_blending_mode: i32,

    effect: Option<Rc<dyn ShaderEffect>>,
    blending_material: Option<MaterialId>,
    use_blending_material: bool,
    use_blending_map: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            use_count: 0,
            texture_stage_state: [0; 8],
            texture_transform: [0; 8],
            material_type: 0,
            has_opacity_map: false,
            animated: false,
            blend_type: 0,
            shading: false,
            two_sided: false,
            serial_id: 0,
            diffuse_color: Color::WHITE,
            self_illumination: 0.0,
            color_transform: 0,
            mesh_flags: 0,
            mesh_transform: 0,
            frame_total: 0,
            frame_speed: 0,
            animation_frame: 0,
            textures: Vec::new(),
            animated_textures: Vec::new(),
            attribute_animations: Vec::new(),
            custom_material: false,
            add_color: Color::TRANSPARENT,
            self_illumination_blending_mode: 0,
            effect: None,
            blending_material: None,
            use_blending_material: false,
            use_blending_map: false,
        }
    }
}

fn push_define(defines: &mut Vec<ShaderDefine>, name: &str) {
    if !defines.iter().any(|define| define.name == name) {
        defines.push(ShaderDefine::flag(name));
    }
}

impl Material {
    /// Plain copy of the stored fields, without any resource
    pub fn from_record(record: &MaterialRecord) -> Self {
        Self {
            use_count: record.use_count,
            texture_stage_state: record.texture_stage_state,
            texture_transform: record.texture_transform,
            material_type: record.material_type,
            has_opacity_map: record.has_opacity_map,
            animated: record.animated,
            blend_type: record.blend_type,
            shading: record.shading,
            two_sided: record.two_sided,
            serial_id: record.serial_id,
            diffuse_color: record.diffuse,
            self_illumination: record.self_illumination,
            color_transform: record.color_transform,
            mesh_flags: record.mesh_flags,
            mesh_transform: record.mesh_transform,
            frame_total: record.frame_total,
            frame_speed: record.frame_speed,
            animation_frame: record.animation_frame,
            ..Self::default()
        }
    }

    /// Build a material from its binary record.
    ///
    /// With `load_textures` the stored transparency becomes opacity, the
    /// named textures and scroll animations are loaded and the effect is
    /// compiled with defines describing what was found.
    pub fn build(record: &MaterialRecord, options: MaterialBuildOptions, gfx: &mut Graphics) -> Self {
        let mut material = Self::from_record(record);
        if !options.load_textures {
            return material;
        }

        let mut defines = Vec::new();
        material.diffuse_color.a = 1.0 - material.diffuse_color.a;

        let texture_options = TextureOptions {
            mip_levels: options.mip_levels,
            temporary: options.temporary_textures,
            reduce_quality: gfx.config.reduce_quality_texture,
        };

        for (stage, name) in record.texture_names.iter().enumerate() {
            if record.texture_stage_state.get(stage) == Some(&STAGE_OP_ADD) {
                material.self_illumination_blending_mode = 1;
            }

            match gfx.textures.create(name, texture_options) {
                Some(texture) => {
                    if let Some(define) = STAGE_DEFINES.get(stage) {
                        push_define(&mut defines, define);
                    }
                    material.textures.push(texture);
                }
                None => log::warn!("Texture '{name}' could not be loaded"),
            }
        }

        for name in &record.animated_texture_names {
            match gfx.textures.create(name, texture_options) {
                Some(texture) => material.animated_textures.push(texture),
                None => log::warn!("Animated texture '{name}' could not be loaded"),
            }
            material.animated = true;
        }

        let mut animation_files = Vec::new();
        for stage in 0..material.texture_transform.len() {
            let transform = record.transform(stage);
            if transform == TextureTransform::Reflex {
                continue;
            }
            if let Some(slot) = transform.scroll_slot() {
                animation_files.push(gfx.config.scroll_animation_paths[slot].clone());
            }
        }
        if material.mesh_transform & MESH_TRANSFORM_WATER != 0 {
            animation_files.push(gfx.config.scroll_animation_paths[0].clone());
        }

        for file in &animation_files {
            material.add_attribute_animations(file, gfx, &mut defines);
        }

        if options.skinned && !gfx.config.use_software_skinning {
            push_define(&mut defines, "SKINNED");
        }
        if options.use_vertex_color {
            push_define(&mut defines, "VERTEXCOLOR");
        }
        if gfx.config.pixel_shader_version_major == 3 {
            push_define(&mut defines, "_PS_3_0");
        }

        material.effect = gfx.shaders.create(&gfx.config.shader_path, &defines);
        if material.effect.is_none() {
            log::warn!("Effect '{}' is unavailable; material will not draw", gfx.config.shader_path);
        }

        material
    }

    fn add_attribute_animations(&mut self, file: &str, gfx: &mut Graphics, defines: &mut Vec<ShaderDefine>) {
        for animation in gfx.animations.create_all(file) {
            if animation.borrow().kind() == AttributeAnimationType::ScrollUV {
                push_define(defines, "SCROLLUV");
            }
            self.attribute_animations.push(animation);
        }
    }

    /// Reset the fields an XML definition is expected to describe
    fn apply_default_settings(&mut self) {
        self.use_count = 1;
        self.shading = false;
        self.two_sided = false;
        self.material_type = 0;
        self.texture_stage_state[0] = 0;
        self.texture_transform[0] = 0;
        self.has_opacity_map = false;
        self.diffuse_color.a = 1.0;
        self.color_transform = 0;
        self.animated = false;
        self.blend_type = BlendMode::NONE.0;
    }

    /// Apply an XML material definition on top of the current state.
    ///
    /// Textures and animations are appended; the effect is replaced only
    /// when the file names one.
    pub fn load(&mut self, path: impl AsRef<Path>, default_settings: bool, gfx: &mut Graphics) -> AssetResult<()> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|error| AssetError::from_io(path, error))?;
        let document = roxmltree::Document::parse(&source).map_err(|error| AssetError::Xml {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;

        let root = document.root_element();
        if !root.has_tag_name("Material") {
            return Err(AssetError::Xml {
                path: path.to_path_buf(),
                message: format!("expected <Material>, found <{}>", root.tag_name().name()),
            });
        }

        if default_settings {
            self.apply_default_settings();
        }
        self.custom_material = true;

        let effect_node = root.children().find(|node| node.has_tag_name("Effect"));
        let mut defines: Vec<ShaderDefine> = Vec::new();
        for name in effect_node
            .and_then(|node| node.attribute("defines"))
            .unwrap_or_default()
            .split_whitespace()
        {
            push_define(&mut defines, name);
        }

        let texture_options = TextureOptions {
            mip_levels: 3,
            temporary: false,
            reduce_quality: gfx.config.reduce_quality_texture,
        };

        for node in root.children().filter(|node| node.has_tag_name("Texture")) {
            if node.attribute("blendMode").is_some_and(|mode| mode.eq_ignore_ascii_case("Add")) {
                self.self_illumination_blending_mode = 1;
            }

            let file = node.attribute("file").unwrap_or_default();
            match gfx.textures.create(file, texture_options) {
                Some(texture) => self.textures.push(texture),
                None => log::warn!("{}: texture '{file}' could not be loaded", path.display()),
            }
        }

        for node in root.children().filter(|node| node.has_tag_name("AnimatedTexture")) {
            let count: u32 = node.attribute("count").and_then(|c| c.trim().parse().ok()).unwrap_or(0);
            if count == 0 {
                continue;
            }

            let pattern = node.attribute("file").unwrap_or_default();
            for frame in 0..count {
                let file = pattern.replacen("%d", &frame.to_string(), 1);
                if let Some(texture) = gfx.textures.create(&file, texture_options) {
                    self.animated_textures.push(texture);
                }
            }
            self.animated = true;
        }

        for node in root.children().filter(|node| node.has_tag_name("Attribute")) {
            if !node.attribute("type").is_some_and(|t| t.eq_ignore_ascii_case("DiffuseColor")) {
                continue;
            }

            let color = &mut self.diffuse_color;
            let channels = [&mut color.r, &mut color.g, &mut color.b, &mut color.a];
            for (channel, token) in channels.into_iter().zip(node.attribute("value").unwrap_or_default().split_whitespace()) {
                match token.parse() {
                    Ok(value) => *channel = value,
                    Err(_) => break,
                }
            }
        }

        for node in root.children().filter(|node| node.has_tag_name("AttributeAnimation")) {
            if let Some(file) = node.attribute("file").filter(|file| !file.is_empty()) {
                self.add_attribute_animations(file, gfx, &mut defines);
            }
        }

        if let Some(node) = effect_node {
            let file = node.attribute("file").unwrap_or_default();
            self.effect = gfx.shaders.create(file, &defines);
            if self.effect.is_none() {
                log::warn!("{}: effect '{file}' is unavailable", path.display());
            }
        }

        Ok(())
    }

    /// Set the effect parameters and device state for drawing.
    ///
    /// `blending` is the material named by [`Self::blending_material`],
    /// resolved by the owning collection. Returns false when the material
    /// has no effect.
    pub fn prepare(&self, blending: Option<&Self>, renderer: &Renderer, device: &mut dyn GraphicsDevice) -> bool {
        let Some(effect) = self.effect.as_deref() else {
            return false;
        };
        if !renderer.prepare(Some(effect)) {
            return false;
        }

        let mut diffuse = if self.custom_material {
            self.diffuse_color
        } else {
            Color { a: self.diffuse_color.a, ..Color::WHITE }
        };
        let mut scrolling = Vec2::zeros();

        for animation in &self.attribute_animations {
            let animation = animation.borrow();
            let Some(value) = animation.value() else {
                continue;
            };
            match animation.kind() {
                AttributeAnimationType::Color => diffuse = value.as_color().unwrap_or(diffuse),
                AttributeAnimationType::ScrollUV => scrolling = value.as_vector2().unwrap_or(scrolling),
                _ => {}
            }
        }

        effect.set_int("SelfIlluminationBlendingMode", self.self_illumination_blending_mode);
        effect.set_bool("UseBlendingMaterial", self.use_blending_material);
        effect.set_bool("UseBlendingMap", self.use_blending_map);
        effect.set_float_array("DiffuseColor", &diffuse.to_array());
        effect.set_float_array("DiffuseScrolling", scrolling.as_slice());
        effect.set_float_array("AddColor", &self.add_color.to_array());
        effect.set_technique("LitSolid");
        effect.set_bool(
            "ApplyScrollingSelfIllumination",
            TextureTransform::from(self.texture_transform[1]).is_scrolling(),
        );

        if self.textures.len() >= 2 {
            let amount = if (self.self_illumination - 1.0).abs() < f32::EPSILON {
                0.0
            } else {
                self.self_illumination
            };
            effect.set_float("SelfIlluminationAmount", 1.0 - amount);
        }

        if self.use_blending_material {
            if let Some(blending) = blending {
                Self::prepare_blending_overlay(effect, blending);
            }
        }

        effect.commit_changes();
        self.apply(blending, renderer.world_time(), device);
        true
    }

    fn prepare_blending_overlay(effect: &dyn ShaderEffect, blending: &Self) {
        if blending.attribute_animations.is_empty() {
            return;
        }

        let mut color = Color::TRANSPARENT;
        let mut blinking = Color::TRANSPARENT;
        let mut scrolling = Vec2::zeros();

        for animation in &blending.attribute_animations {
            let animation = animation.borrow();
            let Some(value) = animation.value() else {
                continue;
            };
            match animation.kind() {
                AttributeAnimationType::Color => color = value.as_color().unwrap_or(color),
                AttributeAnimationType::BlinkingColor => blinking = value.as_color().unwrap_or(blinking),
                AttributeAnimationType::ScrollUV => scrolling = value.as_vector2().unwrap_or(scrolling),
                AttributeAnimationType::Undefined => {}
            }
        }

        effect.set_float_array("OverlayColor", &color.to_array());
        effect.set_float_array("OverlayBlinkingColor", &blinking.to_array());
        effect.set_float_array("OverlayScrolling", scrolling.as_slice());
    }

    /// Bind textures, blend and cull state
    pub fn apply(&self, blending: Option<&Self>, world_time: f32, device: &mut dyn GraphicsDevice) {
        if self.animated && !self.animated_textures.is_empty() {
            let frame = (ANIMATED_TEXTURE_FPS * world_time.max(0.0)) as usize % self.animated_textures.len();
            device.set_texture(0, Some(self.animated_textures[frame].id));
        } else {
            for slot in 0..MAX_TEXTURE_SLOTS {
                device.set_texture(slot as u32, self.textures.get(slot).map(|texture| texture.id));
            }

            if self.use_blending_material {
                if let Some(texture) = blending.and_then(|material| material.textures.first()) {
                    device.set_texture(2, Some(texture.id));
                }
            }
        }

        device.set_blend_mode(BlendMode(self.blend_type));
        device.set_cull_mode(if self.two_sided { CullMode::None } else { CullMode::Clockwise });
    }

    /// Overlay another material of the same collection; `None` removes it
    pub fn set_blending_material(&mut self, material: Option<MaterialId>, use_blending_map: bool) {
        self.blending_material = material;
        self.use_blending_map = use_blending_map;
        self.use_blending_material = material.is_some();
    }

    /// Overlay material, if any
    pub fn blending_material(&self) -> Option<MaterialId> {
        self.blending_material
    }

    /// Copy the stored fields of `other` and mark this material custom.
    ///
    /// Textures, animations and the effect are kept.
    pub fn clone_settings(&mut self, other: &Self) {
        self.use_count = other.use_count;
        self.texture_stage_state = other.texture_stage_state;
        self.texture_transform = other.texture_transform;
        self.material_type = other.material_type;
        self.has_opacity_map = other.has_opacity_map;
        self.animated = other.animated;
        self.blend_type = other.blend_type;
        self.shading = other.shading;
        self.two_sided = other.two_sided;
        self.serial_id = other.serial_id;
        self.diffuse_color = other.diffuse_color;
        self.self_illumination = other.self_illumination;
        self.color_transform = other.color_transform;
        self.mesh_flags = other.mesh_flags;
        self.mesh_transform = other.mesh_transform;
        self.frame_total = other.frame_total;
        self.frame_speed = other.frame_speed;
        self.animation_frame = other.animation_frame;
        self.custom_material = true;
    }

    /// Override the diffuse color
    pub fn set_diffuse_color(&mut self, color: Color) {
        self.custom_material = true;
        self.diffuse_color = color;
    }

    /// Override the additive color
    pub fn set_add_color(&mut self, color: Color) {
        self.custom_material = true;
        self.add_color = color;
    }

    /// Compiled effect
    pub fn effect(&self) -> Option<&Rc<dyn ShaderEffect>> {
        self.effect.as_ref()
    }

    /// Replace the effect
    pub fn set_effect(&mut self, effect: Option<Rc<dyn ShaderEffect>>) {
        self.effect = effect;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphicsConfig;
    use crate::render::headless::{EffectValue, HeadlessDevice, HeadlessEffect};
    use approx::assert_relative_eq;
    use std::fs;

    fn record(textures: &[&str]) -> MaterialRecord {
        MaterialRecord {
            use_count: 1,
            texture_stage_state: [0; 8],
            texture_transform: [0; 8],
            material_type: 0,
            has_opacity_map: false,
            animated: false,
            blend_type: 0,
            shading: true,
            two_sided: false,
            serial_id: 0,
            diffuse: Color::new(1.0, 1.0, 1.0, 0.25),
            self_illumination: 0.0,
            color_transform: 0,
            mesh_flags: 0,
            mesh_transform: 0,
            frame_total: 0,
            frame_speed: 0,
            animation_frame: 0,
            texture_names: textures.iter().map(|t| t.to_string()).collect(),
            animated_texture_names: Vec::new(),
        }
    }

    fn options(skinned: bool) -> MaterialBuildOptions {
        MaterialBuildOptions {
            skinned,
            load_textures: true,
            use_vertex_color: false,
            mip_levels: 3,
            temporary_textures: false,
        }
    }

    fn last_effect(gfx: &Graphics) -> Rc<HeadlessEffect> {
        Rc::clone(gfx.headless_shaders().unwrap().effects().last().unwrap())
    }

    #[test]
    fn build_loads_textures_and_defines() {
        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let mut stored = record(&["body.bmp", "glow.bmp"]);
        stored.texture_stage_state[1] = STAGE_OP_ADD;

        let material = Material::build(&stored, options(true), &mut gfx);

        assert_eq!(material.textures.len(), 2);
        assert_relative_eq!(material.diffuse_color.a, 0.75);
        assert_eq!(material.self_illumination_blending_mode, 1);

        let effect = last_effect(&gfx);
        assert_eq!(effect.path(), GraphicsConfig::default().shader_path);
        for define in ["DIFFUSEMAP", "SELFILLUMINATIONMAP", "SKINNED", "_PS_3_0"] {
            assert!(effect.has_define(define), "missing {define}");
        }
        assert!(!effect.has_define("VERTEXCOLOR"));
    }

    #[test]
    fn software_skinning_drops_skinned_define() {
        let config = GraphicsConfig { use_software_skinning: true, ..GraphicsConfig::default() };
        let mut gfx = Graphics::headless(config);
        Material::build(&record(&["body.bmp"]), options(true), &mut gfx);
        assert!(!last_effect(&gfx).has_define("SKINNED"));
    }

    #[test]
    fn build_without_textures_keeps_record_only() {
        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let material = Material::build(
            &record(&["body.bmp"]),
            MaterialBuildOptions { load_textures: false, ..options(false) },
            &mut gfx,
        );

        assert!(material.textures.is_empty());
        assert!(material.effect().is_none());
        assert_relative_eq!(material.diffuse_color.a, 0.25);
    }

    #[test]
    fn scrolling_stage_loads_scroll_animation() {
        let dir = tempfile::tempdir().unwrap();
        let scroll = dir.path().join("scroll2.xml");
        fs::write(
            &scroll,
            r#"<AttributeAnimation><Animation type="Scrolling"><KeyFrame time="0" value="0.5 0"/></Animation></AttributeAnimation>"#,
        )
        .unwrap();

        let mut config = GraphicsConfig::default();
        config.scroll_animation_paths[1] = scroll.to_string_lossy().into_owned();
        let mut gfx = Graphics::headless(config);

        let mut stored = record(&["water.bmp"]);
        stored.texture_transform[0] = 6;
        let material = Material::build(&stored, options(false), &mut gfx);

        assert_eq!(material.attribute_animations.len(), 1);
        assert!(last_effect(&gfx).has_define("SCROLLUV"));
    }

    #[test]
    fn xml_definition_overrides_material() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("armor.xml");
        fs::write(
            &path,
            r#"<Material>
                <Effect file="custom.fx" defines="DIFFUSEMAP  GLOW"/>
                <Texture file="armor.dds"/>
                <Texture file="armor_glow.dds" blendMode="add"/>
                <AnimatedTexture file="fire%d.dds" count="3"/>
                <Attribute type="DiffuseColor" value="0.5 0.25 1 0.8"/>
            </Material>"#,
        )
        .unwrap();

        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let mut material = Material::default();
        material.load(&path, true, &mut gfx).unwrap();

        assert!(material.custom_material);
        assert_eq!(material.textures.len(), 2);
        assert_eq!(material.self_illumination_blending_mode, 1);
        assert_eq!(material.animated_textures[2].path, "fire2.dds");
        assert!(material.animated);
        assert_relative_eq!(material.diffuse_color.g, 0.25);
        assert_relative_eq!(material.diffuse_color.a, 0.8);

        let effect = last_effect(&gfx);
        assert_eq!(effect.path(), "custom.fx");
        assert!(effect.has_define("GLOW"));
    }

    #[test]
    fn missing_definition_is_not_found() {
        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let result = Material::default().load("does/not/exist.xml", true, &mut gfx);
        assert!(matches!(result, Err(AssetError::NotFound(_))));
    }

    #[test]
    fn prepare_sets_parameters_and_state() {
        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let mut stored = record(&["body.bmp"]);
        stored.two_sided = true;
        stored.blend_type = 2;
        let material = Material::build(&stored, options(false), &mut gfx);

        let mut device = HeadlessDevice::new();
        assert!(material.prepare(None, &gfx.renderer, &mut device));

        let effect = last_effect(&gfx);
        assert_eq!(effect.technique(), "LitSolid");
        assert_eq!(
            effect.parameter("DiffuseColor"),
            Some(EffectValue::Floats(vec![1.0, 1.0, 1.0, 0.75]))
        );
        assert_eq!(device.bound_texture(0), Some(material.textures[0].id));
        assert_eq!(device.bound_texture(1), None);
        assert_eq!(device.cull_mode(), CullMode::None);
        assert_eq!(device.blend_mode(), BlendMode(2));
    }

    #[test]
    fn prepare_without_effect_fails() {
        let gfx = Graphics::headless(GraphicsConfig::default());
        let mut device = HeadlessDevice::new();
        assert!(!Material::default().prepare(None, &gfx.renderer, &mut device));
    }

    #[test]
    fn animated_textures_follow_world_time() {
        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let mut stored = record(&[]);
        stored.animated_texture_names = vec!["a.bmp".into(), "b.bmp".into(), "c.bmp".into()];
        let material = Material::build(&stored, options(false), &mut gfx);

        let mut device = HeadlessDevice::new();
        // 16 frames per second: 0.25s is frame 4, wrapped to 1
        material.apply(None, 0.25, &mut device);
        assert_eq!(device.bound_texture(0), Some(material.animated_textures[1].id));
    }

    #[test]
    fn blending_material_binds_slot_two() {
        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let overlay = Material::build(&record(&["overlay.bmp"]), options(false), &mut gfx);
        let mut material = Material::build(&record(&["body.bmp"]), options(false), &mut gfx);
        material.set_blending_material(Some(MaterialId(1)), true);

        let mut device = HeadlessDevice::new();
        material.apply(Some(&overlay), 0.0, &mut device);
        assert_eq!(device.bound_texture(2), Some(overlay.textures[0].id));

        material.set_blending_material(None, false);
        material.apply(Some(&overlay), 0.0, &mut device);
        assert_eq!(device.bound_texture(2), None);
    }

    #[test]
    fn clone_settings_marks_custom() {
        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let mut source = Material::build(&record(&["body.bmp"]), options(false), &mut gfx);
        source.two_sided = true;

        let mut target = Material::default();
        target.clone_settings(&source);
        assert!(target.two_sided);
        assert!(target.custom_material);
        assert!(target.textures.is_empty());
    }
}
