use crate::authoring::{EditorSurface, TextPosition};
use crate::camera::OrbitControls;
use crate::compose::ViewportScene;
use crate::description::{color_to_hex, round3, Background, SceneDescription};
use crate::graph::{NodeId, NodeKind, SceneGraph};
use crate::load::model_rotation;
use crate::mesh::{Material, MeshTopology};
use glam::{EulerRot, Quat, Vec2, Vec3};
use std::collections::HashMap;
use winit::dpi::PhysicalSize;

const HOVER_COLOR: Vec3 = Vec3::new(0.95, 0.8, 0.1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GizmoMode {
    Translate,
    Rotate,
}

impl Default for GizmoMode {
    fn default() -> Self {
        GizmoMode::Translate
    }
}

/// Raycast picking, hover highlighting, gizmo edits and the writeback of
/// live state into canonical block text. The only component that flows
/// information backward, from the scene to the document.
#[derive(Default)]
pub struct EditOverlay {
    pub mode: GizmoMode,
    selected: Option<NodeId>,
    hovered: Option<NodeId>,
    original_materials: HashMap<NodeId, Material>,
    dragging: bool,
}

fn ray_aabb(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<f32> {
    let inv = dir.recip();
    let t1 = (min - origin) * inv;
    let t2 = (max - origin) * inv;
    let tmin = t1.min(t2).max_element();
    let tmax = t1.max(t2).min_element();
    if tmax >= tmin.max(0.0) {
        Some(tmin.max(0.0))
    } else {
        None
    }
}

/// Nearest mesh node hit by the world-space ray, with its distance.
fn raycast_meshes(graph: &SceneGraph, origin: Vec3, dir: Vec3) -> Option<(NodeId, f32)> {
    let mut best: Option<(NodeId, f32)> = None;
    for (id, node) in graph.iter() {
        let NodeKind::Mesh(instance) = &node.kind else {
            continue;
        };
        if instance.mesh.topology == MeshTopology::Lines || !graph.effectively_visible(id) {
            continue;
        }
        let world = graph.world_matrix(id);
        let inverse = world.inverse();
        let local_origin = inverse.transform_point3(origin);
        let local_dir = inverse.transform_vector3(dir);
        let bounds = &instance.mesh.bounds;
        let Some(t_local) = ray_aabb(local_origin, local_dir, bounds.min, bounds.max) else {
            continue;
        };
        let hit_world = world.transform_point3(local_origin + local_dir * t_local);
        let distance = (hit_world - origin).length();
        if best.map(|(_, previous)| distance < previous).unwrap_or(true) {
            best = Some((id, distance));
        }
    }
    best
}

impl EditOverlay {
    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn hovered(&self) -> Option<NodeId> {
        self.hovered
    }

    pub fn begin_drag(&mut self) {
        self.dragging = true;
    }

    pub fn end_drag(&mut self) {
        self.dragging = false;
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            GizmoMode::Translate => GizmoMode::Rotate,
            GizmoMode::Rotate => GizmoMode::Translate,
        };
    }

    /// Click selection: attaches the gizmo to the top-level grouping
    /// ancestor of the hit mesh, detaches on a miss. Ignored mid-drag.
    pub fn pointer_click(
        &mut self,
        scene: &ViewportScene,
        screen: Vec2,
        viewport: PhysicalSize<u32>,
    ) -> Option<NodeId> {
        if self.dragging {
            return self.selected;
        }
        let hit = scene
            .camera
            .screen_ray(screen, viewport)
            .and_then(|(origin, dir)| raycast_meshes(&scene.graph, origin, dir))
            .and_then(|(id, _)| scene.graph.top_level_ancestor(id, scene.group));
        self.selected = hit;
        self.selected
    }

    /// Hover highlight: wireframe override on the hovered group, original
    /// materials cached per mesh and restored verbatim when hover leaves.
    pub fn pointer_hover(
        &mut self,
        scene: &mut ViewportScene,
        screen: Vec2,
        viewport: PhysicalSize<u32>,
    ) -> Option<NodeId> {
        let hit = scene
            .camera
            .screen_ray(screen, viewport)
            .and_then(|(origin, dir)| raycast_meshes(&scene.graph, origin, dir))
            .and_then(|(id, _)| scene.graph.top_level_ancestor(id, scene.group));
        if hit == self.hovered {
            return self.hovered;
        }
        self.restore_materials(&mut scene.graph);
        if let Some(group) = hit {
            self.apply_highlight(&mut scene.graph, group);
        }
        self.hovered = hit;
        self.hovered
    }

    fn apply_highlight(&mut self, graph: &mut SceneGraph, group: NodeId) {
        let mut targets = graph.descendants(group);
        targets.push(group);
        for id in targets {
            if let NodeKind::Mesh(instance) = &mut graph.node_mut(id).kind {
                self.original_materials.insert(id, instance.material);
                instance.material = Material::wireframe_override(HOVER_COLOR);
            }
        }
    }

    fn restore_materials(&mut self, graph: &mut SceneGraph) {
        for (id, material) in self.original_materials.drain() {
            if let NodeKind::Mesh(instance) = &mut graph.node_mut(id).kind {
                instance.material = material;
            }
        }
    }

    /// Applies a gizmo drag step to the selected group.
    pub fn drag_step(&mut self, scene: &mut ViewportScene, delta: Vec3) {
        let Some(selected) = self.selected else {
            return;
        };
        self.dragging = true;
        let node = scene.graph.node_mut(selected);
        match self.mode {
            GizmoMode::Translate => {
                node.translation += delta;
            }
            GizmoMode::Rotate => {
                let step = Quat::from_euler(EulerRot::XYZ, delta.x, delta.y, delta.z);
                node.rotation = (step * node.rotation).normalize();
            }
        }
    }

    /// Serializes the live transforms of every model, the live camera
    /// pose and the live background color back into the in-memory
    /// description. Values are rounded to 3 decimals.
    pub fn apply_to_description(&self, scene: &ViewportScene) -> SceneDescription {
        let mut description = scene.description.clone();
        for (model_index, root) in &scene.model_roots {
            let Some(spec) = description.models.get_mut(*model_index) else {
                continue;
            };
            let node = scene.graph.node(*root);
            spec.position = [
                round3(node.translation.x),
                round3(node.translation.y),
                round3(node.translation.z),
            ];
            let (rx, ry, rz) = node.rotation.to_euler(EulerRot::XYZ);
            spec.rotation = [
                round3(rx.to_degrees()),
                round3(ry.to_degrees()),
                round3(rz.to_degrees()),
            ];
            spec.scale = round3(live_scale(&scene.graph, *root));
        }
        description.camera.cam_pos = [
            round3(scene.camera.position.x),
            round3(scene.camera.position.y),
            round3(scene.camera.position.z),
        ];
        description.camera.look_at = [
            round3(scene.controls.target.x),
            round3(scene.controls.target.y),
            round3(scene.controls.target.z),
        ];
        match scene.background {
            Background::Color(color) => {
                description.scene.background_color = Some(color_to_hex(color));
            }
            Background::Transparent => {
                description.scene.background_color = Some("transparent".to_string());
            }
            Background::Environment { .. } => {}
        }
        description
    }

    /// Apply & save: renders the updated description as canonical text and
    /// replaces the block's range in the host document.
    pub fn save(
        &self,
        scene: &ViewportScene,
        editor: &mut dyn EditorSurface,
        from: TextPosition,
        to: TextPosition,
    ) -> SceneDescription {
        let description = self.apply_to_description(scene);
        editor.replace_range(from, to, &description.to_block_text());
        description
    }

    /// Reset: reads the original, pre-edit configuration back onto the live
    /// graph and controls without touching the document text.
    pub fn reset(&mut self, scene: &mut ViewportScene) {
        self.restore_materials(&mut scene.graph);
        self.hovered = None;
        self.selected = None;
        self.dragging = false;

        let original = scene.description.clone();
        for (model_index, root) in scene.model_roots.clone() {
            let Some(spec) = original.models.get(model_index) else {
                continue;
            };
            let per_mesh = mesh_children_scaled(&scene.graph, root);
            let root_scale = if per_mesh { Vec3::ONE } else { Vec3::splat(spec.scale) };
            scene.graph.set_trs(
                root,
                Vec3::from_array(spec.position),
                model_rotation(spec),
                root_scale,
            );
            if per_mesh {
                for child in scene.graph.children(root).to_vec() {
                    if matches!(scene.graph.node(child).kind, NodeKind::Mesh(_)) {
                        scene.graph.node_mut(child).scale = Vec3::splat(spec.scale);
                    }
                }
            }
        }
        scene.camera.position = Vec3::from_array(original.camera.cam_pos);
        scene.camera.target = Vec3::from_array(original.camera.look_at);
        scene.controls =
            OrbitControls::from_camera(&scene.camera, original.scene.orbit_control_damping);
        scene.background = original.scene.background();
        let group = scene.graph.node_mut(scene.group);
        group.rotation = Quat::IDENTITY;
    }
}

/// Uniform scale of a model root, reading through to mesh children for
/// formats whose scale is applied per mesh.
fn live_scale(graph: &SceneGraph, root: NodeId) -> f32 {
    let root_scale = graph.node(root).scale;
    if (root_scale - Vec3::ONE).length() > 1e-6 {
        return root_scale.x;
    }
    graph
        .children(root)
        .iter()
        .find(|child| matches!(graph.node(**child).kind, NodeKind::Mesh(_)))
        .map(|child| graph.node(*child).scale.x)
        .unwrap_or(root_scale.x)
}

fn mesh_children_scaled(graph: &SceneGraph, root: NodeId) -> bool {
    graph.children(root).iter().any(|child| {
        matches!(graph.node(*child).kind, NodeKind::Mesh(_))
            && (graph.node(*child).scale - Vec3::ONE).length() > 1e-6
    })
}
