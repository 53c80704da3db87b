//! Quadtree over the meshes of one model
//!
//! Partitions the model's meshes on the X/Z plane so whole regions can be
//! culled against the camera frustum at once. Each mesh lives in the
//! deepest node whose box contains it. Rendering walks the visible nodes,
//! draws opaque meshes immediately and queues the rest: alpha-tested
//! meshes in traversal order, transparent meshes back to front.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};

use slotmap::{new_key_type, SlotMap};

use crate::config::GraphicsConfig;
use crate::foundation::math::{Mat4, Vec3};
use crate::render::mesh::MeshRenderContext;
use crate::render::{DebugGeometry, DeferredMesh, Graphics, MeshId, Model, ModelId, RenderClass};
use crate::scene::AABB;

new_key_type! {
    /// Handle of a quadtree node
    pub struct NodeId;
}

/// Meshes a node holds before it is split
pub const DEFAULT_MAX_MESHES: usize = 4;

/// Deepest level a node is created at; the root is level 0
pub const MAX_DEPTH: u32 = 16;

/// One region of the partition
#[derive(Debug, Clone)]
pub struct Node {
    /// Region in model space
    pub bounds: AABB,
    /// Enclosing node
    pub parent: Option<NodeId>,
    /// Quadrants that contain at least one mesh
    pub children: [Option<NodeId>; 4],
    /// Meshes assigned to this node and no deeper one
    pub meshes: Vec<MeshId>,
}

impl Node {
    fn new(bounds: AABB, parent: Option<NodeId>) -> Self {
        Self {
            bounds,
            parent,
            children: [None; 4],
            meshes: Vec::new(),
        }
    }

    /// Whether the node was never split
    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }
}

/// Transparent mesh waiting to be drawn, ordered by camera distance
#[derive(Debug, Clone, Copy)]
struct SortJob {
    distance: f32,
    mesh: MeshId,
}

impl PartialEq for SortJob {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortJob {}

impl PartialOrd for SortJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortJob {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| other.mesh.cmp(&self.mesh))
    }
}

/// Meshes deferred past the tree walk
#[derive(Debug, Default)]
struct DrawQueues {
    transparent: BinaryHeap<SortJob>,
    opacity: VecDeque<MeshId>,
}

/// Spatial partition of a model's meshes
#[derive(Debug)]
pub struct Quadtree {
    nodes: SlotMap<NodeId, Node>,
    root: Option<NodeId>,
    mesh_nodes: HashMap<MeshId, NodeId>,
    translation: Mat4,
    max_meshes: usize,
    queues: DrawQueues,
}

impl Default for Quadtree {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESHES)
    }
}

impl Quadtree {
    /// Empty tree splitting nodes above `max_meshes`
    pub fn new(max_meshes: usize) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root: None,
            mesh_nodes: HashMap::new(),
            translation: Mat4::identity(),
            max_meshes,
            queues: DrawQueues::default(),
        }
    }

    /// Empty tree using the configured split threshold
    pub fn from_config(config: &GraphicsConfig) -> Self {
        Self::new(config.quadtree_max_meshes)
    }

    /// Partition `model`, posed at frame 0
    pub fn build(&mut self, model: &mut Model, gfx: &mut Graphics) {
        self.clear();

        model.set_frame(0, None, gfx);
        self.translation = Mat4::new_translation(&model.position());

        let root = self.nodes.insert(Node::new(*model.world_box(), None));
        self.root = Some(root);
        self.create_node(root, model, 0);

        log::debug!(
            "Quadtree for '{}': {} nodes, {} of {} meshes placed",
            model.name(),
            self.nodes.len(),
            self.mesh_nodes.len(),
            model.meshes().len()
        );
    }

    fn contained_meshes(model: &Model, bounds: &AABB) -> Vec<MeshId> {
        model
            .meshes()
            .iter()
            .enumerate()
            .filter(|(_, mesh)| mesh.world_box().is_valid() && bounds.contains_xz(mesh.world_box()))
            .map(|(index, _)| MeshId(index))
            .collect()
    }

    fn quadrants(bounds: &AABB) -> [AABB; 4] {
        let half = bounds.size() * 0.5;
        let (min, max) = (bounds.min, bounds.max);
        [
            AABB::new(min, Vec3::new(max.x - half.x, max.y, max.z - half.z)),
            AABB::new(Vec3::new(min.x + half.x, min.y, min.z), Vec3::new(max.x, max.y, max.z - half.z)),
            AABB::new(Vec3::new(min.x, min.y, min.z + half.z), Vec3::new(max.x - half.x, max.y, max.z)),
            AABB::new(Vec3::new(min.x + half.x, min.y, min.z + half.z), max),
        ]
    }

    fn create_node(&mut self, node: NodeId, model: &Model, depth: u32) {
        let Some(bounds) = self.nodes.get(node).map(|n| n.bounds) else {
            return;
        };

        let contained = Self::contained_meshes(model, &bounds);
        if contained.is_empty() {
            return;
        }

        for &mesh in &contained {
            if let Some(previous) = self.mesh_nodes.insert(mesh, node) {
                if let Some(previous) = self.nodes.get_mut(previous) {
                    previous.meshes.retain(|&m| m != mesh);
                }
            }
            self.nodes[node].meshes.push(mesh);
        }

        if contained.len() <= self.max_meshes {
            return;
        }

        // Meshes sharing one X/Z footprint never separate, however far the box is halved
        let size = bounds.size();
        if depth >= MAX_DEPTH || (size.x <= 0.0 && size.z <= 0.0) {
            log::debug!(
                "Quadtree node at depth {depth} keeps {} meshes above the split threshold",
                contained.len()
            );
            return;
        }

        for (slot, quadrant) in Self::quadrants(&bounds).into_iter().enumerate() {
            if Self::contained_meshes(model, &quadrant).is_empty() {
                continue;
            }
            let child = self.nodes.insert(Node::new(quadrant, Some(node)));
            self.nodes[node].children[slot] = Some(child);
            self.create_node(child, model, depth + 1);
        }
    }

    /// Draw the visible meshes of `model`: opaque first, then alpha-tested,
    /// then transparent from the farthest to the nearest
    pub fn render(&mut self, model: &Model, gfx: &mut Graphics) {
        let Some(root) = self.root else {
            return;
        };

        let Self { nodes, translation, queues, .. } = self;
        model.with_render_context(|context| {
            let walk = TreeWalk {
                nodes,
                translation,
                model,
                model_id: model.id(),
                context,
            };
            walk.render_node(root, queues, gfx);

            while let Some(mesh) = queues.opacity.pop_front() {
                walk.draw(mesh, gfx);
            }
            while let Some(job) = queues.transparent.pop() {
                walk.draw(job.mesh, gfx);
            }
        });
    }

    /// Node holding `mesh`
    pub fn node_of(&self, mesh: MeshId) -> Option<NodeId> {
        self.mesh_nodes.get(&mesh).copied()
    }

    /// Level of `id` below the root
    pub fn depth(&self, id: NodeId) -> Option<u32> {
        let mut node = self.nodes.get(id)?;
        let mut depth = 0;
        while let Some(parent) = node.parent.and_then(|parent| self.nodes.get(parent)) {
            node = parent;
            depth += 1;
        }
        Some(depth)
    }

    /// Node by handle
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Root node, once built
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Every node
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds no node
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop every node
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.mesh_nodes.clear();
        self.root = None;
        self.queues = DrawQueues::default();
    }
}

/// Borrowed state of one render pass
struct TreeWalk<'a> {
    nodes: &'a SlotMap<NodeId, Node>,
    translation: &'a Mat4,
    model: &'a Model,
    model_id: ModelId,
    context: &'a MeshRenderContext<'a>,
}

impl TreeWalk<'_> {
    fn draw(&self, mesh: MeshId, gfx: &mut Graphics) {
        if let Some(mesh) = self.model.mesh_by_id(mesh) {
            mesh.render(self.context, gfx);
        }
    }

    fn render_node(&self, node_id: NodeId, queues: &mut DrawQueues, gfx: &mut Graphics) {
        let Some(node) = self.nodes.get(node_id) else {
            return;
        };

        let bounds = node.bounds.translated_by(self.translation);
        if !gfx.renderer.camera().frustum().intersects_aabb(&bounds) {
            return;
        }

        for child in node.children.iter().flatten() {
            self.render_node(*child, queues, gfx);
        }

        for &id in &node.meshes {
            let Some(mesh) = self.model.mesh_by_id(id) else {
                continue;
            };

            if mesh.is_post_render() {
                gfx.renderer.push_post_render(DeferredMesh { model: self.model_id, mesh: id });
                continue;
            }

            match mesh.can_render(self.context.materials) {
                Some(RenderClass::Render) => {
                    mesh.render(self.context, gfx);
                }
                Some(RenderClass::Transparent) => {
                    let center = mesh.world_box().translated_by(mesh.translation()).center();
                    let distance = (center - gfx.renderer.camera().eye).norm();
                    queues.transparent.push(SortJob { distance, mesh: id });
                }
                Some(RenderClass::Opacity) => queues.opacity.push_back(id),
                Some(RenderClass::NotRender) | None => {}
            }
        }

        if gfx.renderer.is_debug_geometry(DebugGeometry::QUADTREE) {
            gfx.renderer.draw_debug_aabb(bounds);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::smd::test_writer::{MaterialSpec, MeshSpec, SmdWriter};
    use crate::foundation::math::IVec3;
    use tempfile::TempDir;

    fn load(dir: &TempDir, materials: &[MaterialSpec], meshes: &[MeshSpec], gfx: &mut Graphics) -> Model {
        let path = dir.path().join("scene.smd");
        std::fs::write(&path, SmdWriter::model(false, &[], materials, meshes)).unwrap();
        Model::load(&path, None, false, gfx).unwrap()
    }

    fn solid() -> MaterialSpec {
        MaterialSpec::textured(&["stone.bmp"])
    }

    fn glass() -> MaterialSpec {
        let mut glass = MaterialSpec::textured(&["glass.bmp"]);
        glass.transparency = 0.5;
        glass
    }

    fn leaves() -> MaterialSpec {
        let mut leaves = MaterialSpec::textured(&["leaves.bmp"]);
        leaves.has_opacity_map = true;
        leaves
    }

    fn drawn_meshes(model: &Model, gfx: &Graphics) -> Vec<usize> {
        gfx.headless_device()
            .unwrap()
            .draw_calls()
            .iter()
            .map(|draw| {
                model
                    .meshes()
                    .iter()
                    .position(|mesh| mesh.position_buffer() == draw.position_buffer)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn every_mesh_lands_in_one_containing_node() {
        let dir = tempfile::tempdir().unwrap();
        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let offsets = [(0.0, 0.0), (20.0, 0.0), (0.0, 20.0), (20.0, 20.0), (2.0, 2.0), (9.5, 3.0)];
        let meshes: Vec<_> = offsets
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| MeshSpec::quad(&format!("tile{i}"), 0).offset(Vec3::new(x, y, 0.0)))
            .collect();
        let mut model = load(&dir, &[solid()], &meshes, &mut gfx);

        let mut tree = Quadtree::from_config(&gfx.config);
        tree.build(&mut model, &mut gfx);
        assert!(tree.len() > 1);

        for (index, mesh) in model.meshes().iter().enumerate() {
            let id = MeshId(index);
            let holder = tree.node_of(id).unwrap();
            let owners = tree.nodes().filter(|(_, node)| node.meshes.contains(&id)).count();
            assert_eq!(owners, 1);
            assert!(tree.node(holder).unwrap().bounds.contains_xz(mesh.world_box()));
        }

        let root = tree.node(tree.root().unwrap()).unwrap();
        assert!(!root.is_leaf());
        assert!(root.meshes.is_empty());
    }

    fn pole(name: &str) -> MeshSpec {
        let mut pole = MeshSpec::triangle(name, 0);
        pole.vertices = vec![Vec3::new(3.0, 3.0, 0.0), Vec3::new(3.0, 3.0, 1.0), Vec3::new(3.0, 3.0, 2.0)];
        pole
    }

    #[test]
    fn colocated_meshes_stop_the_split() {
        let dir = tempfile::tempdir().unwrap();
        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let poles: Vec<_> = (0..5).map(|i| pole(&format!("pole{i}"))).collect();
        let mut model = load(&dir, &[solid()], &poles, &mut gfx);

        let mut tree = Quadtree::default();
        tree.build(&mut model, &mut gfx);

        let root = tree.root().unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.node(root).unwrap().meshes.len(), 5);
        assert!((0..5).all(|i| tree.node_of(MeshId(i)) == Some(root)));
    }

    #[test]
    fn split_depth_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let mut meshes: Vec<_> = (0..5).map(|i| pole(&format!("pole{i}"))).collect();
        meshes.push(MeshSpec::quad("ground", 0));
        let mut model = load(&dir, &[solid()], &meshes, &mut gfx);

        let mut tree = Quadtree::default();
        tree.build(&mut model, &mut gfx);

        for index in 0..meshes.len() {
            let id = MeshId(index);
            let holder = tree.node_of(id).unwrap();
            assert!(tree.depth(holder).unwrap() <= MAX_DEPTH);
            assert_eq!(tree.nodes().filter(|(_, node)| node.meshes.contains(&id)).count(), 1);
        }
        let deepest = tree.nodes().filter_map(|(id, _)| tree.depth(id)).max().unwrap();
        assert_eq!(deepest, MAX_DEPTH);
    }

    #[test]
    fn transparent_meshes_draw_back_to_front() {
        let dir = tempfile::tempdir().unwrap();
        let mut gfx = Graphics::headless(GraphicsConfig::default());
        // Quads centered on render z = -5, 5 and 0; the eye sits at z = -10
        let meshes = [
            MeshSpec::quad("near", 0).offset(Vec3::new(-0.5, -5.5, 0.0)),
            MeshSpec::quad("far", 0).offset(Vec3::new(-0.5, 4.5, 0.0)),
            MeshSpec::quad("middle", 0).offset(Vec3::new(-0.5, -0.5, 0.0)),
        ];
        let mut model = load(&dir, &[glass()], &meshes, &mut gfx);

        let mut tree = Quadtree::default();
        tree.build(&mut model, &mut gfx);
        tree.render(&model, &mut gfx);

        assert_eq!(drawn_meshes(&model, &gfx), vec![1, 2, 0]);
    }

    #[test]
    fn alpha_tested_meshes_follow_opaque_ones_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let meshes = [
            MeshSpec::quad("bush", 1),
            MeshSpec::quad("wall", 0),
            MeshSpec::quad("window", 2),
            MeshSpec::quad("hedge", 1),
            MeshSpec::quad("floor", 0),
        ];
        let mut model = load(&dir, &[solid(), leaves(), glass()], &meshes, &mut gfx);

        let mut tree = Quadtree::new(8);
        tree.build(&mut model, &mut gfx);
        tree.render(&model, &mut gfx);
        assert_eq!(drawn_meshes(&model, &gfx), vec![1, 4, 0, 3, 2]);

        tree.render(&model, &mut gfx);
        assert_eq!(drawn_meshes(&model, &gfx), vec![1, 4, 0, 3, 2, 1, 4, 0, 3, 2]);
    }

    #[test]
    fn nodes_behind_the_camera_draw_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let mut model = load(&dir, &[solid()], &[MeshSpec::quad("rock", 0)], &mut gfx);
        model.set_position_rotation(Vec3::new(0.0, 0.0, -400.0), IVec3::zeros());

        let mut tree = Quadtree::default();
        tree.build(&mut model, &mut gfx);
        tree.render(&model, &mut gfx);

        assert!(gfx.headless_device().unwrap().draw_calls().is_empty());
    }

    #[test]
    fn post_render_meshes_are_deferred() {
        let dir = tempfile::tempdir().unwrap();
        let mut gfx = Graphics::headless(GraphicsConfig::default());
        let mut model = load(&dir, &[solid()], &[MeshSpec::quad("a", 0), MeshSpec::quad("b", 0)], &mut gfx);
        model.set_post_render(MeshId(0), true);

        let mut tree = Quadtree::default();
        tree.build(&mut model, &mut gfx);
        tree.render(&model, &mut gfx);

        assert_eq!(drawn_meshes(&model, &gfx), vec![1]);
        assert_eq!(gfx.renderer.post_render(), &[DeferredMesh { model: model.id(), mesh: MeshId(0) }]);
    }
}
