use crate::camera::{Camera, OrbitControls};
use crate::description::{parse_hex_color, Background, LightKind, LightSpec, SceneDescription};
use crate::environment::{EnvironmentMap, EnvironmentSlot};
use crate::error::AssetWarning;
use crate::graph::{LightNode, NodeId, SceneGraph};
use crate::load::{queue_environment, LoadOutcome};
use crate::mesh::{Material, Mesh};
use crate::resolve::AssetResolver;
use glam::{EulerRot, Quat, Vec3};
use std::sync::Arc;

/// Ground-shadow receiver sits slightly below the origin.
const GROUND_PLANE_OFFSET: f32 = -0.5;
const GROUND_PLANE_SIZE: f32 = 40.0;
const LIGHT_MARKER_RADIUS: f32 = 0.15;

/// One composed scene: graph, camera, navigation and the single grouping
/// node that owns all loaded models and non-camera lights.
pub struct ViewportScene {
    pub description: SceneDescription,
    pub graph: SceneGraph,
    pub camera: Camera,
    pub controls: OrbitControls,
    /// The grouping node; unit of whole-scene auto-rotation.
    pub group: NodeId,
    /// Per-model root nodes, keyed by the model's index in the description.
    pub model_roots: Vec<(usize, NodeId)>,
    /// Rig node tracking the camera; camera-attached lights live under it.
    pub camera_rig: NodeId,
    camera_lights: Vec<NodeId>,
    pub background: Background,
    pub environment: EnvironmentSlot,
    /// Radians per second around each axis.
    auto_rotation: Vec3,
    pub warnings: Vec<AssetWarning>,
}

/// Assembles one scene graph from a validated description and the settled
/// set of loaded models. Runs after the load barrier; the environment map
/// alone is allowed to arrive later.
pub fn compose(
    description: SceneDescription,
    loaded: LoadOutcome,
    resolver: &dyn AssetResolver,
) -> ViewportScene {
    let mut graph = SceneGraph::new();
    let root = graph.root();

    let group = graph.add_group(root, "models");
    let mut model_roots = Vec::with_capacity(loaded.models.len());
    for prepared in &loaded.models {
        let node = prepared.spawn_into(&mut graph, group, description.stl.as_ref());
        model_roots.push((prepared.index, node));
    }

    let camera = Camera::from_spec(&description.camera);
    let camera_rig = graph.add_group(root, "camera");
    graph.node_mut(camera_rig).translation = camera.position;

    let mut camera_lights = Vec::new();
    for light in &description.lights {
        let parent = if light.kind == LightKind::CameraDirectional { camera_rig } else { group };
        let node = spawn_light(&mut graph, parent, light);
        if light.kind == LightKind::CameraDirectional {
            camera_lights.push(node);
        }
    }

    if description.scene.show_axis_helper {
        spawn_axis_helper(&mut graph, root, description.scene.length);
    }
    if description.scene.show_grid_helper {
        let mesh = Arc::new(Mesh::grid_lines(description.scene.grid_size, 10));
        graph.add_helper(root, "grid-helper", mesh, Material::line(Vec3::splat(0.35)));
    }
    if description.scene.show_ground_shadows {
        let mesh = Arc::new(Mesh::plane(GROUND_PLANE_SIZE));
        let plane = graph.add_helper(
            root,
            "ground-shadow",
            mesh,
            Material { base_color: [0.0, 0.0, 0.0, 0.35], wireframe: false, unlit: true },
        );
        graph.node_mut(plane).translation = Vec3::new(0.0, GROUND_PLANE_OFFSET, 0.0);
        graph.node_mut(plane).receive_shadows = true;
    }

    let environment = match &description.scene.hdri_background {
        Some(hdri) => queue_environment(hdri, resolver),
        None => EnvironmentSlot::Empty,
    };

    let controls = OrbitControls::from_camera(&camera, description.scene.orbit_control_damping);
    let auto_rotation = Vec3::new(
        description.scene.auto_rotation[0].to_radians(),
        description.scene.auto_rotation[1].to_radians(),
        description.scene.auto_rotation[2].to_radians(),
    );
    let background = description.scene.background();

    ViewportScene {
        description,
        graph,
        camera,
        controls,
        group,
        model_roots,
        camera_rig,
        camera_lights,
        background,
        environment,
        auto_rotation,
        warnings: loaded.warnings,
    }
}

fn spawn_light(graph: &mut SceneGraph, parent: NodeId, spec: &LightSpec) -> NodeId {
    let color = parse_hex_color(&spec.color).unwrap_or(Vec3::ONE);
    let node = graph.add_light(
        parent,
        LightNode {
            kind: spec.kind,
            color,
            strength: spec.strength,
            target: spec.target.map(Vec3::from_array).unwrap_or(Vec3::ZERO),
            cone_cos: spec.angle.unwrap_or(30.0).to_radians().cos(),
            cast_shadows: spec.cast_shadows
                && matches!(spec.kind, LightKind::Directional | LightKind::Spot),
        },
    );
    graph.node_mut(node).translation = Vec3::from_array(spec.pos);
    if spec.show {
        let marker = Arc::new(Mesh::uv_sphere(LIGHT_MARKER_RADIUS, 12, 8));
        graph.add_helper(node, "light-marker", marker, Material::line(color));
    }
    node
}

fn spawn_axis_helper(graph: &mut SceneGraph, parent: NodeId, length: f32) {
    let axes = [
        (Vec3::X, Vec3::new(0.9, 0.2, 0.2)),
        (Vec3::Y, Vec3::new(0.2, 0.9, 0.2)),
        (Vec3::Z, Vec3::new(0.2, 0.4, 0.9)),
    ];
    for (direction, color) in axes {
        let mesh = Arc::new(Mesh::axis_segment(direction, length));
        graph.add_helper(parent, "axis-helper", mesh, Material::line(color));
    }
}

impl ViewportScene {
    /// Per-frame responsibilities, in fixed order before drawing: advance
    /// auto-rotation, update navigation, sync the camera rig, re-target
    /// camera-attached directional lights, and poll the environment slot.
    /// Returns the environment map on the frame it first becomes ready.
    pub fn advance(&mut self, dt: f32) -> Option<Arc<EnvironmentMap>> {
        if self.auto_rotation != Vec3::ZERO {
            let step = Quat::from_euler(
                EulerRot::XYZ,
                self.auto_rotation.x * dt,
                self.auto_rotation.y * dt,
                self.auto_rotation.z * dt,
            );
            let group = self.graph.node_mut(self.group);
            group.rotation = (step * group.rotation).normalize();
        }

        self.controls.update(dt);
        self.controls.apply_to(&mut self.camera);
        self.graph.node_mut(self.camera_rig).translation = self.camera.position;

        // A directional light's direction is the vector to its target, so a
        // camera-relative light needs continuous retargeting.
        let camera_position = self.camera.position;
        for light in &self.camera_lights {
            if let crate::graph::NodeKind::Light(light_node) = &mut self.graph.node_mut(*light).kind {
                light_node.target = camera_position;
            }
        }

        self.environment.poll_swap()
    }

    pub fn mesh_count(&self) -> usize {
        self.graph
            .iter()
            .filter(|(_, node)| matches!(node.kind, crate::graph::NodeKind::Mesh(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{CameraSpec, SceneSettings};
    use crate::load::LoadOutcome;
    use crate::resolve::{AssetLocation, AssetResolver};

    struct NullResolver;

    impl AssetResolver for NullResolver {
        fn resolve(&self, _name: &str) -> Option<AssetLocation> {
            None
        }
    }

    fn empty_description(lights: Vec<LightSpec>, scene: SceneSettings) -> SceneDescription {
        SceneDescription {
            models: Vec::new(),
            camera: CameraSpec { orthographic: false, cam_pos: [0.0, 5.0, 10.0], look_at: [0.0; 3] },
            lights,
            scene,
            render_block: None,
            stl: None,
        }
    }

    fn empty_outcome() -> LoadOutcome {
        LoadOutcome { models: Vec::new(), warnings: Vec::new() }
    }

    #[test]
    fn camera_attached_lights_parent_to_the_rig_and_retarget() {
        let light = LightSpec {
            kind: LightKind::CameraDirectional,
            color: "#ffffff".to_string(),
            pos: [0.0, 1.0, 0.0],
            target: None,
            distance: None,
            angle: None,
            strength: 1.0,
            cast_shadows: false,
            show: false,
        };
        let description = empty_description(vec![light], SceneSettings::default());
        let mut scene = compose(description, empty_outcome(), &NullResolver);
        assert_eq!(scene.camera_lights.len(), 1);
        let light_node = scene.camera_lights[0];
        assert_eq!(scene.graph.parent(light_node), Some(scene.camera_rig));

        scene.controls.pointer_drag(glam::Vec2::new(0.8, 0.0));
        scene.advance(1.0);
        let crate::graph::NodeKind::Light(light) = &scene.graph.node(light_node).kind else {
            panic!("light node expected");
        };
        assert!((light.target - scene.camera.position).length() < 1e-5);
        // The rig follows the camera, so the light's world position moves.
        let world = scene.graph.world_position(light_node);
        assert!((world - (scene.camera.position + Vec3::new(0.0, 1.0, 0.0))).length() < 1e-4);
    }

    #[test]
    fn non_camera_lights_join_the_grouping_node() {
        let light = LightSpec {
            kind: LightKind::Point,
            color: "#ffaa00".to_string(),
            pos: [2.0, 3.0, 4.0],
            target: None,
            distance: Some(10.0),
            angle: None,
            strength: 0.5,
            cast_shadows: true,
            show: true,
        };
        let description = empty_description(vec![light], SceneSettings::default());
        let scene = compose(description, empty_outcome(), &NullResolver);
        let lights: Vec<NodeId> = scene
            .graph
            .iter()
            .filter(|(_, node)| matches!(node.kind, crate::graph::NodeKind::Light(_)))
            .map(|(id, _)| id)
            .collect();
        assert_eq!(lights.len(), 1);
        assert_eq!(scene.graph.parent(lights[0]), Some(scene.group));
        // Marker sphere requested via `show`.
        assert_eq!(scene.graph.children(lights[0]).len(), 1);
        // Point lights never cast shadows here.
        let crate::graph::NodeKind::Light(light_node) = &scene.graph.node(lights[0]).kind else {
            panic!("light node expected");
        };
        assert!(!light_node.cast_shadows);
    }

    #[test]
    fn auto_rotation_spins_the_grouping_node() {
        let mut settings = SceneSettings::default();
        settings.auto_rotation = [0.0, 90.0, 0.0];
        let description = empty_description(Vec::new(), settings);
        let mut scene = compose(description, empty_outcome(), &NullResolver);
        scene.advance(1.0);
        let rotation = scene.graph.node(scene.group).rotation;
        let (_, angle) = rotation.to_axis_angle();
        assert!((angle - 90.0f32.to_radians()).abs() < 1e-4);
    }

    #[test]
    fn helpers_and_ground_plane_are_conditional() {
        let mut settings = SceneSettings::default();
        settings.show_axis_helper = true;
        settings.show_grid_helper = true;
        settings.show_ground_shadows = true;
        let with = compose(
            empty_description(Vec::new(), settings),
            empty_outcome(),
            &NullResolver,
        );
        let without = compose(
            empty_description(Vec::new(), SceneSettings::default()),
            empty_outcome(),
            &NullResolver,
        );
        // 3 axis segments + grid + ground plane.
        assert_eq!(with.mesh_count(), without.mesh_count() + 5);
    }

    #[test]
    fn zero_resolved_models_leave_an_empty_grouping_node() {
        let description = empty_description(Vec::new(), SceneSettings::default());
        let scene = compose(description, empty_outcome(), &NullResolver);
        assert!(scene.graph.children(scene.group).is_empty());
        assert_eq!(scene.mesh_count(), 0);
    }
}
