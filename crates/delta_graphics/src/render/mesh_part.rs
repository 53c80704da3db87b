//! Faces of a mesh sharing one material

use std::cell::OnceCell;

use super::device::{create_filled_index_buffer, BufferId, GraphicsDevice, VertexDeclaration};
use super::material::Material;
use super::material_collection::{MaterialCollection, MaterialId};
use super::renderer::Renderer;
use crate::assets::smd::COLOR_TRANSFORM_HIDDEN;

/// Diffuse alpha at or below which a part is drawn back to front
const TRANSPARENCY_THRESHOLD: f32 = 0.95;

/// How a part takes part in drawing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderClass {
    /// Drawn immediately
    Render,
    /// Sorted back to front after the opaque pass
    Transparent,
    /// Alpha-tested, drawn after the opaque pass
    Opacity,
    /// Never drawn
    NotRender,
}

/// Index batch for one material of a mesh
#[derive(Debug)]
pub struct MeshPart {
    material: MaterialId,
    indices: Vec<u32>,
    index_buffer: Option<BufferId>,
    render_class: OnceCell<RenderClass>,
}

impl MeshPart {
    /// Empty batch for `material`
    pub fn new(material: MaterialId) -> Self {
        Self {
            material,
            indices: Vec::new(),
            index_buffer: None,
            render_class: OnceCell::new(),
        }
    }

    /// Material drawn by this part
    pub fn material(&self) -> MaterialId {
        self.material
    }

    /// Append one welded vertex index
    pub fn push_index(&mut self, index: u32) {
        self.indices.push(index);
    }

    /// Welded indices, three per triangle
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Index buffer, once built
    pub fn index_buffer(&self) -> Option<BufferId> {
        self.index_buffer
    }

    /// Upload the indices; a failure leaves the part undrawable
    pub fn build(&mut self, device: &mut dyn GraphicsDevice) {
        if self.indices.is_empty() || self.index_buffer.is_some() {
            return;
        }

        match create_filled_index_buffer(device, &self.indices) {
            Ok(buffer) => self.index_buffer = Some(buffer),
            Err(error) => log::warn!("Index buffer for material {}: {error}", self.material.0),
        }
    }

    /// Classify the part. The first answer is kept for the part's lifetime.
    pub fn can_render(&self, materials: Option<&MaterialCollection>) -> RenderClass {
        *self
            .render_class
            .get_or_init(|| Self::classify(materials.and_then(|m| m.get(self.material))))
    }

    fn classify(material: Option<&Material>) -> RenderClass {
        let Some(material) = material else {
            return RenderClass::NotRender;
        };

        if material.textures.is_empty() && material.animated_textures.is_empty() {
            RenderClass::NotRender
        } else if material.color_transform & COLOR_TRANSFORM_HIDDEN != 0 {
            RenderClass::NotRender
        } else if material.diffuse_color.a <= TRANSPARENCY_THRESHOLD {
            RenderClass::Transparent
        } else if material.has_opacity_map {
            RenderClass::Opacity
        } else {
            RenderClass::Render
        }
    }

    /// Draw the part with the currently bound vertex streams.
    ///
    /// Returns whether a draw was issued.
    pub fn render(
        &self,
        materials: &MaterialCollection,
        vertex_count: usize,
        skinned: bool,
        renderer: &Renderer,
        device: &mut dyn GraphicsDevice,
    ) -> bool {
        if self.can_render(Some(materials)) == RenderClass::NotRender {
            return false;
        }

        let (Some(index_buffer), Some(material)) = (self.index_buffer, materials.get(self.material)) else {
            return false;
        };

        device.set_indices(index_buffer);
        let channels = if skinned { 1 } else { 2 };
        device.set_vertex_declaration(if skinned {
            VertexDeclaration::SkinnedTextured(channels)
        } else {
            VertexDeclaration::Textured(channels)
        });

        if !materials.prepare(self.material, renderer, device) {
            return false;
        }

        let Some(effect) = material.effect() else {
            return false;
        };

        let passes = effect.begin();
        for pass in 0..passes {
            effect.begin_pass(pass);
            device.draw_indexed_triangles(vertex_count, self.indices.len() / 3);
            effect.end_pass();
        }
        effect.end();

        passes > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::smd::test_writer::{MaterialSpec, SmdWriter};
    use crate::assets::smd::SmdReader;
    use crate::config::GraphicsConfig;
    use crate::render::headless::HeadlessDevice;
    use crate::render::{Graphics, MaterialBuildOptions};
    use std::io::Cursor;

    fn collection(specs: &[MaterialSpec], gfx: &mut Graphics) -> MaterialCollection {
        let mut writer = SmdWriter::new();
        writer.write_material_block(0, specs);
        let mut reader = SmdReader::new(Cursor::new(writer.into_bytes()));

        let options = MaterialBuildOptions {
            skinned: false,
            load_textures: true,
            use_vertex_color: false,
            mip_levels: 3,
            temporary_textures: false,
        };
        let mut collection = MaterialCollection::new("test");
        collection.build(&mut reader, options, gfx).unwrap();
        collection
    }

    #[test]
    fn classification_order() {
        let mut gfx = Graphics::headless(GraphicsConfig::default());

        let solid = MaterialSpec::textured(&["a.bmp"]);
        let untextured = MaterialSpec::textured(&[]);
        let mut hidden = MaterialSpec::textured(&["a.bmp"]);
        hidden.color_transform = COLOR_TRANSFORM_HIDDEN;
        hidden.transparency = 0.5;
        let mut glass = MaterialSpec::textured(&["a.bmp"]);
        glass.transparency = 0.5;
        glass.has_opacity_map = true;
        let mut leaves = MaterialSpec::textured(&["a.bmp"]);
        leaves.has_opacity_map = true;

        let materials = collection(&[solid, untextured, hidden, glass, leaves], &mut gfx);
        let classes: Vec<_> = (0..6)
            .map(|id| MeshPart::new(MaterialId(id)).can_render(Some(&materials)))
            .collect();

        assert_eq!(
            classes,
            [
                RenderClass::Render,
                RenderClass::NotRender,
                RenderClass::NotRender,
                RenderClass::Transparent,
                RenderClass::Opacity,
                RenderClass::NotRender,
            ]
        );
    }

    #[test]
    fn classification_is_memoized() {
        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let mut materials = collection(&[MaterialSpec::textured(&["a.bmp"])], &mut gfx);
        let part = MeshPart::new(MaterialId(0));
        assert_eq!(part.can_render(Some(&materials)), RenderClass::Render);

        materials.get_mut(MaterialId(0)).unwrap().diffuse_color.a = 0.1;
        assert_eq!(part.can_render(Some(&materials)), RenderClass::Render);
        assert_eq!(part.can_render(None), RenderClass::Render);
    }

    #[test]
    fn render_draws_once_per_pass() {
        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let materials = collection(&[MaterialSpec::textured(&["a.bmp"])], &mut gfx);
        let mut device = HeadlessDevice::new();

        let mut part = MeshPart::new(MaterialId(0));
        for index in [0, 1, 2, 0, 2, 3] {
            part.push_index(index);
        }
        assert!(!part.render(&materials, 4, false, &gfx.renderer, &mut device));

        part.build(&mut device);
        assert_eq!(device.buffer_indices(part.index_buffer().unwrap()), Some(vec![0, 1, 2, 0, 2, 3]));

        assert!(part.render(&materials, 4, false, &gfx.renderer, &mut device));
        let draws = device.draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].vertex_count, 4);
        assert_eq!(draws[0].triangle_count, 2);
        assert_eq!(draws[0].declaration, Some(VertexDeclaration::Textured(2)));
        assert!(!device.has_locked_resources());
    }

    #[test]
    fn hidden_part_never_draws() {
        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let mut hidden = MaterialSpec::textured(&["a.bmp"]);
        hidden.color_transform = COLOR_TRANSFORM_HIDDEN;
        let materials = collection(&[hidden], &mut gfx);
        let mut device = HeadlessDevice::new();

        let mut part = MeshPart::new(MaterialId(0));
        part.push_index(0);
        part.build(&mut device);
        assert!(!part.render(&materials, 1, false, &gfx.renderer, &mut device));
        assert!(device.draw_calls().is_empty());
    }
}
