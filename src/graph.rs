use crate::description::LightKind;
use crate::mesh::{Material, Mesh};
use glam::{Mat4, Quat, Vec3};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub struct MeshInstance {
    pub mesh: Arc<Mesh>,
    pub material: Material,
}

#[derive(Debug, Clone)]
pub struct LightNode {
    pub kind: LightKind,
    pub color: Vec3,
    pub strength: f32,
    /// World-space point the light aims at (directional and spot kinds).
    pub target: Vec3,
    /// Cosine of the spot cone half-angle; unused by other kinds.
    pub cone_cos: f32,
    pub cast_shadows: bool,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Group,
    Mesh(MeshInstance),
    Light(LightNode),
    Helper,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub kind: NodeKind,
    pub visible: bool,
    pub cast_shadows: bool,
    pub receive_shadows: bool,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            name: None,
            parent: None,
            children: Vec::new(),
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            kind,
            visible: true,
            cast_shadows: false,
            receive_shadows: false,
        }
    }

    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Owned scene graph, one per viewport instance. Loaded model nodes have no
/// existence outside it.
pub struct SceneGraph {
    nodes: Vec<Node>,
    root: NodeId,
}

impl SceneGraph {
    pub fn new() -> Self {
        let mut root = Node::new(NodeKind::Group);
        root.name = Some("root".to_string());
        Self { nodes: vec![root], root: NodeId(0) }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn insert(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.nodes[id.0].parent = Some(parent);
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn add_group(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        let mut node = Node::new(NodeKind::Group);
        node.name = Some(name.into());
        self.insert(parent, node)
    }

    pub fn add_mesh(
        &mut self,
        parent: NodeId,
        name: Option<String>,
        mesh: Arc<Mesh>,
        material: Material,
    ) -> NodeId {
        let mut node = Node::new(NodeKind::Mesh(MeshInstance { mesh, material }));
        node.name = name;
        self.insert(parent, node)
    }

    pub fn add_light(&mut self, parent: NodeId, light: LightNode) -> NodeId {
        self.insert(parent, Node::new(NodeKind::Light(light)))
    }

    pub fn add_helper(&mut self, parent: NodeId, name: impl Into<String>, mesh: Arc<Mesh>, material: Material) -> NodeId {
        let mut node = Node::new(NodeKind::Mesh(MeshInstance { mesh, material }));
        node.name = Some(name.into());
        // Helpers never participate in picking or shadows.
        node.cast_shadows = false;
        node.receive_shadows = false;
        self.insert(parent, node)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(index, node)| (NodeId(index), node))
    }

    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut chain = self.nodes[id.0].local_matrix();
        let mut cursor = self.nodes[id.0].parent;
        while let Some(parent) = cursor {
            chain = self.nodes[parent.0].local_matrix() * chain;
            cursor = self.nodes[parent.0].parent;
        }
        chain
    }

    pub fn world_position(&self, id: NodeId) -> Vec3 {
        self.world_matrix(id).transform_point3(Vec3::ZERO)
    }

    pub fn set_trs(&mut self, id: NodeId, translation: Vec3, rotation: Quat, scale: Vec3) {
        let node = &mut self.nodes[id.0];
        node.translation = translation;
        node.rotation = rotation;
        node.scale = scale;
    }

    /// Depth-first descendants of `id`, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut pending: Vec<NodeId> = self.nodes[id.0].children.clone();
        while let Some(next) = pending.pop() {
            out.push(next);
            pending.extend_from_slice(&self.nodes[next.0].children);
        }
        out
    }

    /// Walks the parent chain of `id` to the child of `under` that contains
    /// it. Returns `None` when `id` is not inside `under`.
    pub fn top_level_ancestor(&self, id: NodeId, under: NodeId) -> Option<NodeId> {
        let mut cursor = id;
        loop {
            let parent = self.nodes[cursor.0].parent?;
            if parent == under {
                return Some(cursor);
            }
            cursor = parent;
        }
    }

    /// Whether the node or any ancestor is hidden.
    pub fn effectively_visible(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(node) = cursor {
            if !self.nodes[node.0].visible {
                return false;
            }
            cursor = self.nodes[node.0].parent;
        }
        true
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_matrix_composes_parent_chain() {
        let mut graph = SceneGraph::new();
        let group = graph.add_group(graph.root(), "group");
        graph.set_trs(group, Vec3::new(1.0, 0.0, 0.0), Quat::IDENTITY, Vec3::ONE);
        let child = graph.add_group(group, "child");
        graph.set_trs(child, Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY, Vec3::splat(2.0));
        let world = graph.world_position(child);
        assert!((world - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-6);
        let scaled = graph.world_matrix(child).transform_point3(Vec3::X);
        assert!((scaled - Vec3::new(3.0, 2.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn top_level_ancestor_stops_at_the_grouping_node() {
        let mut graph = SceneGraph::new();
        let group = graph.add_group(graph.root(), "models");
        let model_root = graph.add_group(group, "model");
        let inner = graph.add_group(model_root, "inner");
        let mesh = graph.add_group(inner, "mesh");
        assert_eq!(graph.top_level_ancestor(mesh, group), Some(model_root));
        assert_eq!(graph.top_level_ancestor(model_root, group), Some(model_root));
        let outside = graph.add_group(graph.root(), "outside");
        assert_eq!(graph.top_level_ancestor(outside, group), None);
    }
}
