use crate::decode::{decoder_for, DecodeContext, DecodedModel, ScalePlacement};
use crate::description::{HdriSettings, ModelSpec, StlSettings};
use crate::environment::{EnvironmentMap, EnvironmentSlot};
use crate::error::{AssetWarning, BlockError};
use crate::graph::{NodeId, SceneGraph};
use crate::mesh::Material;
use crate::resolve::AssetResolver;
use crate::settings::FirstModelPolicy;
use glam::{EulerRot, Quat, Vec3};
use std::sync::Arc;

/// One model after resolve + decode, ready to be spawned into a graph.
pub struct PreparedModel {
    pub index: usize,
    pub spec: ModelSpec,
    pub model: DecodedModel,
    pub placement: ScalePlacement,
}

pub struct LoadOutcome {
    pub models: Vec<PreparedModel>,
    pub warnings: Vec<AssetWarning>,
}

/// Loads every requested model, tolerating individual failures: the barrier
/// is "wait for all, skipping what failed", never "fail on first error".
/// Composition awaits this before building the grouping node. The primary
/// model doubles as the block's path validation under the default policy.
pub async fn load_models(
    specs: &[ModelSpec],
    resolver: &dyn AssetResolver,
    policy: FirstModelPolicy,
) -> Result<LoadOutcome, BlockError> {
    let mut models = Vec::with_capacity(specs.len());
    let mut warnings = Vec::new();
    for (index, spec) in specs.iter().enumerate() {
        if index == 0
            && policy == FirstModelPolicy::Fatal
            && resolver.resolve(&spec.name).is_none()
        {
            return Err(BlockError::PrimaryModelUnresolved(spec.name.clone()));
        }
        match load_one(index, spec, resolver).await {
            Ok(prepared) => models.push(prepared),
            Err(warning) => {
                log::warn!("{warning}");
                warnings.push(warning);
            }
        }
    }
    Ok(LoadOutcome { models, warnings })
}

async fn load_one(
    index: usize,
    spec: &ModelSpec,
    resolver: &dyn AssetResolver,
) -> Result<PreparedModel, AssetWarning> {
    let extension = spec
        .extension()
        .ok_or_else(|| AssetWarning::new(&spec.name, "the name has no file extension"))?;
    let decoder = decoder_for(&extension)
        .ok_or_else(|| AssetWarning::new(&spec.name, format!("unsupported format '.{extension}'")))?;
    let location = resolver
        .resolve(&spec.name)
        .ok_or_else(|| AssetWarning::new(&spec.name, "the asset could not be resolved"))?;
    let bytes = location.read().map_err(|err| AssetWarning::new(&spec.name, err.to_string()))?;
    let companion = decoder.companion_name(&spec.name).and_then(|companion_name| {
        let resolved = resolver.resolve_companion(&companion_name);
        if resolved.is_none() {
            log::debug!("companion '{companion_name}' for '{}' not resolved", spec.name);
        }
        resolved.and_then(|location| location.read().ok())
    });
    let context = DecodeContext { asset: &spec.name, companion: companion.as_deref() };
    let model = decoder
        .decode(&bytes, &context)
        .map_err(|err| AssetWarning::new(&spec.name, err.reason.clone()))?;
    Ok(PreparedModel {
        index,
        spec: spec.clone(),
        model,
        placement: decoder.scale_placement(),
    })
}

pub fn model_rotation(spec: &ModelSpec) -> Quat {
    Quat::from_euler(
        EulerRot::XYZ,
        spec.rotation[0].to_radians(),
        spec.rotation[1].to_radians(),
        spec.rotation[2].to_radians(),
    )
}

impl PreparedModel {
    /// Spawns the decoded meshes under one root group and applies the
    /// declared transform in fixed order: scale, then rotation
    /// (degrees→radians), then translation. Every mesh node both casts and
    /// receives shadows.
    pub fn spawn_into(
        &self,
        graph: &mut SceneGraph,
        parent: NodeId,
        stl: Option<&StlSettings>,
    ) -> NodeId {
        let root = graph.add_group(parent, self.spec.name.clone());
        let rotation = model_rotation(&self.spec);
        let translation = Vec3::from_array(self.spec.position);
        let root_scale = match self.placement {
            ScalePlacement::Root => Vec3::splat(self.spec.scale),
            ScalePlacement::PerMesh => Vec3::ONE,
        };
        graph.set_trs(root, translation, rotation, root_scale);

        let stl_material = match (self.spec.extension().as_deref(), stl) {
            (Some("stl"), Some(settings)) => {
                let color = settings
                    .color
                    .as_deref()
                    .and_then(crate::description::parse_hex_color);
                Some(Material {
                    base_color: color
                        .map(|c| [c.x, c.y, c.z, 1.0])
                        .unwrap_or(Material::default().base_color),
                    wireframe: settings.wireframe,
                    unlit: settings.wireframe,
                })
            }
            _ => None,
        };

        for decoded in &self.model.meshes {
            let material = stl_material.unwrap_or(decoded.material);
            let node = graph.add_mesh(
                root,
                decoded.name.clone(),
                Arc::new(decoded.mesh.clone()),
                material,
            );
            if self.placement == ScalePlacement::PerMesh {
                let mesh_node = graph.node_mut(node);
                mesh_node.scale = Vec3::splat(self.spec.scale);
            }
            let mesh_node = graph.node_mut(node);
            mesh_node.cast_shadows = true;
            mesh_node.receive_shadows = true;
        }
        root
    }
}

/// Queues the HDRI panorama load as an awaitable unit; the render loop
/// hot-swaps the result in whenever it resolves. Never blocks composition.
pub fn queue_environment(hdri: &HdriSettings, resolver: &dyn AssetResolver) -> EnvironmentSlot {
    let Some(location) = resolver.resolve(&hdri.texture_path) else {
        log::warn!("hdri panorama '{}' could not be resolved", hdri.texture_path);
        return EnvironmentSlot::Failed;
    };
    let asset = hdri.texture_path.clone();
    EnvironmentSlot::pending(async move {
        let bytes = location
            .read()
            .map_err(|err| crate::error::DecodeError::new(&asset, err.to_string()))?;
        EnvironmentMap::from_hdr_bytes(&bytes, &asset)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::FolderResolver;
    use glam::Mat4;
    use std::fs;

    fn triangle_stl() -> Vec<u8> {
        let mut bytes = vec![0u8; 80];
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 12]);
        for vertex in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            for value in vertex {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        bytes.extend_from_slice(&[0u8; 2]);
        bytes
    }

    fn spec(name: &str) -> ModelSpec {
        ModelSpec { name: name.to_string(), scale: 1.0, position: [0.0; 3], rotation: [0.0; 3] }
    }

    #[test]
    fn unresolved_models_warn_but_do_not_fail() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("first.stl"), triangle_stl()).expect("stl write");
        let resolver = FolderResolver::new(dir.path());
        let specs = vec![spec("first.stl"), spec("missing.stl"), spec("also-missing.stl")];
        let outcome =
            pollster::block_on(load_models(&specs, &resolver, FirstModelPolicy::Fatal))
                .expect("first model resolves, so the block loads");
        assert_eq!(outcome.models.len(), 1);
        assert_eq!(outcome.warnings.len(), 2);
        assert_eq!(outcome.warnings[0].model, "missing.stl");
    }

    #[test]
    fn unresolved_primary_model_is_fatal_by_policy() {
        let dir = tempfile::tempdir().expect("temp dir");
        let resolver = FolderResolver::new(dir.path());
        let specs = vec![spec("missing.stl")];
        let fatal = pollster::block_on(load_models(&specs, &resolver, FirstModelPolicy::Fatal));
        assert!(matches!(fatal, Err(BlockError::PrimaryModelUnresolved(name)) if name == "missing.stl"));

        let tolerant =
            pollster::block_on(load_models(&specs, &resolver, FirstModelPolicy::BestEffort))
                .expect("best-effort policy keeps the block alive");
        assert!(tolerant.models.is_empty());
        assert_eq!(tolerant.warnings.len(), 1);
    }

    #[test]
    fn transform_application_is_idempotent() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("part.stl"), triangle_stl()).expect("stl write");
        let resolver = FolderResolver::new(dir.path());
        let mut specs = vec![spec("part.stl")];
        specs[0].scale = 2.0;
        specs[0].position = [1.0, 2.0, 3.0];
        specs[0].rotation = [0.0, 90.0, 0.0];
        let outcome = pollster::block_on(load_models(&specs, &resolver, FirstModelPolicy::Fatal))
            .expect("load");
        let prepared = &outcome.models[0];

        let mut first_graph = SceneGraph::new();
        let group = first_graph.add_group(first_graph.root(), "models");
        let first_root = prepared.spawn_into(&mut first_graph, group, None);
        let first = first_graph.world_matrix(first_root);

        let mut second_graph = SceneGraph::new();
        let group = second_graph.add_group(second_graph.root(), "models");
        let root_a = prepared.spawn_into(&mut second_graph, group, None);
        // Re-apply with identical inputs onto the same node.
        let node = second_graph.node(root_a);
        let (translation, rotation, scale) = (node.translation, node.rotation, node.scale);
        second_graph.set_trs(root_a, translation, rotation, scale);
        let second = second_graph.world_matrix(root_a);

        let delta = (first - second).to_cols_array();
        assert!(delta.iter().all(|value| value.abs() < 1e-6));
        let expected = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            model_rotation(&prepared.spec),
            Vec3::new(1.0, 2.0, 3.0),
        );
        let diff = (first - expected).to_cols_array();
        assert!(diff.iter().all(|value| value.abs() < 1e-6));
    }

    #[test]
    fn mesh_nodes_cast_and_receive_shadows() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("part.stl"), triangle_stl()).expect("stl write");
        let resolver = FolderResolver::new(dir.path());
        let outcome = pollster::block_on(load_models(
            &[spec("part.stl")],
            &resolver,
            FirstModelPolicy::Fatal,
        ))
        .expect("load");
        let mut graph = SceneGraph::new();
        let group = graph.add_group(graph.root(), "models");
        let root = outcome.models[0].spawn_into(&mut graph, group, None);
        for child in graph.children(root) {
            let node = graph.node(*child);
            assert!(node.cast_shadows && node.receive_shadows);
        }
    }

    #[test]
    fn stl_settings_override_material() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("part.stl"), triangle_stl()).expect("stl write");
        let resolver = FolderResolver::new(dir.path());
        let outcome = pollster::block_on(load_models(
            &[spec("part.stl")],
            &resolver,
            FirstModelPolicy::Fatal,
        ))
        .expect("load");
        let settings =
            StlSettings { color: Some("#ff0000".to_string()), wireframe: true };
        let mut graph = SceneGraph::new();
        let parent = graph.root();
        let root = outcome.models[0].spawn_into(&mut graph, parent, Some(&settings));
        let child = graph.children(root)[0];
        let crate::graph::NodeKind::Mesh(instance) = &graph.node(child).kind else {
            panic!("mesh child expected");
        };
        assert!(instance.material.wireframe);
        assert_eq!(instance.material.base_color[0], 1.0);
    }
}
