//! Vertex welding
//!
//! Faces reference vertices per corner, so the same position shows up once
//! per adjacent face, possibly with different UVs or bones. A
//! [`PackedVertex`] holds everything that makes a GPU vertex distinct;
//! [`VertexWelder`] hands out one index per distinct key.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::assets::smd::MAX_UV_CHANNELS;
use crate::foundation::math::Vec3;

/// Vertex color used when a mesh carries none
pub const OPAQUE_WHITE: u32 = 0xFFFF_FFFF;

/// Everything that distinguishes one GPU vertex from another.
///
/// Equality and hashing compare the raw float bits: two vertices weld only
/// when they are identical, and `-0.0`/`0.0` stay distinct.
#[derive(Debug, Clone, Copy)]
pub struct PackedVertex {
    /// Object-space position
    pub position: Vec3,
    /// Packed ARGB color
    pub color: u32,
    /// Skeleton bone, -1 for rigid meshes
    pub bone_index: i32,
    /// UV per channel; unused channels are zero
    pub uv: [[f32; 2]; MAX_UV_CHANNELS],
}

impl Default for PackedVertex {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            color: OPAQUE_WHITE,
            bone_index: -1,
            uv: [[0.0; 2]; MAX_UV_CHANNELS],
        }
    }
}

impl PackedVertex {
    fn bits(&self) -> ([u32; 3], u32, i32, [[u32; 2]; MAX_UV_CHANNELS]) {
        let mut uv = [[0; 2]; MAX_UV_CHANNELS];
        for (bits, value) in uv.iter_mut().zip(&self.uv) {
            *bits = [value[0].to_bits(), value[1].to_bits()];
        }
        (
            [self.position.x.to_bits(), self.position.y.to_bits(), self.position.z.to_bits()],
            self.color,
            self.bone_index,
            uv,
        )
    }
}

impl PartialEq for PackedVertex {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for PackedVertex {}

impl Hash for PackedVertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

/// Assigns sequential indices to distinct vertices
#[derive(Debug, Default)]
pub struct VertexWelder {
    indices: HashMap<PackedVertex, u32>,
}

impl VertexWelder {
    /// Empty welder
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `vertex`, and whether it was seen for the first time
    pub fn weld(&mut self, vertex: PackedVertex) -> (u32, bool) {
        let next = self.indices.len() as u32;
        match self.indices.entry(vertex) {
            std::collections::hash_map::Entry::Occupied(entry) => (*entry.get(), false),
            std::collections::hash_map::Entry::Vacant(entry) => (*entry.insert(next), true),
        }
    }

    /// Number of distinct vertices
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether nothing was welded yet
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f32) -> PackedVertex {
        PackedVertex { position: Vec3::new(x, 1.0, 2.0), ..PackedVertex::default() }
    }

    #[test]
    fn same_key_welds_to_one_slot() {
        let mut welder = VertexWelder::new();
        assert_eq!(welder.weld(vertex(0.5)), (0, true));
        assert_eq!(welder.weld(vertex(0.5)), (0, false));
        assert_eq!(welder.weld(vertex(0.75)), (1, true));
        assert_eq!(welder.len(), 2);
    }

    #[test]
    fn any_attribute_splits_a_vertex() {
        let base = vertex(0.0);
        let mut uv = base;
        uv.uv[3] = [0.0, 1.0];
        let mut bone = base;
        bone.bone_index = 2;
        let mut color = base;
        color.color = 0xFF00_0000;

        for other in [uv, bone, color] {
            assert_ne!(base, other);
        }
    }

    #[test]
    fn comparison_is_bitwise() {
        assert_ne!(vertex(0.0), vertex(-0.0));
        let nan = vertex(f32::NAN);
        assert_eq!(nan, nan);
    }
}
