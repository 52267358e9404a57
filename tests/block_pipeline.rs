use glam::Vec3;
use merlin_viewer::compose::compose;
use merlin_viewer::error::BlockError;
use merlin_viewer::graph::NodeKind;
use merlin_viewer::load::load_models;
use merlin_viewer::parse::parse_scene_block;
use merlin_viewer::resolve::FolderResolver;
use merlin_viewer::settings::FirstModelPolicy;
use std::fs;

fn cube_stl() -> Vec<u8> {
    // Two faces are enough to exercise decode; geometry spans the origin.
    let triangles = [
        [[-0.5f32, -0.5, 0.0], [0.5, -0.5, 0.0], [0.5, 0.5, 0.0]],
        [[-0.5, -0.5, 0.0], [0.5, 0.5, 0.0], [-0.5, 0.5, 0.0]],
    ];
    let mut bytes = vec![0u8; 80];
    bytes.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
    for tri in &triangles {
        bytes.extend_from_slice(&[0u8; 12]);
        for vertex in tri {
            for value in vertex {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        bytes.extend_from_slice(&[0u8; 2]);
    }
    bytes
}

const CUBE_BLOCK: &str = r#"
"models": [
   { "name": "cube.stl", "scale": 1, "position": [0, 0, 0], "rotation": [0, 0, 0] }
],
"camera": { "camPosXYZ": [0, 5, 10], "LookatXYZ": [0, 0, 0] }
"#;

#[test]
fn cube_block_produces_one_mesh_at_the_origin() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("cube.stl"), cube_stl()).expect("stl write");
    let resolver = FolderResolver::new(dir.path());

    let description = parse_scene_block(CUBE_BLOCK).expect("block parses");
    let loaded = pollster::block_on(load_models(
        &description.models,
        &resolver,
        FirstModelPolicy::Fatal,
    ))
    .expect("cube resolves");
    let scene = compose(description, loaded, &resolver);

    assert_eq!(scene.mesh_count(), 1);
    assert!(scene.warnings.is_empty());
    let (_, root) = scene.model_roots[0];
    assert!((scene.graph.world_position(root) - Vec3::ZERO).length() < 1e-6);
    assert!((scene.camera.position - Vec3::new(0.0, 5.0, 10.0)).length() < 1e-6);
    assert!((scene.camera.target - Vec3::ZERO).length() < 1e-6);
}

#[test]
fn zero_resolved_models_warn_without_failing() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("first.stl"), cube_stl()).expect("stl write");
    let resolver = FolderResolver::new(dir.path());

    let body = r#"
"models": [
   { "name": "first.stl", "scale": 1, "position": [0, 0, 0], "rotation": [0, 0, 0] },
   { "name": "gone-a.stl", "scale": 1, "position": [0, 0, 0], "rotation": [0, 0, 0] },
   { "name": "gone-b.obj", "scale": 1, "position": [0, 0, 0], "rotation": [0, 0, 0] }
],
"camera": { "camPosXYZ": [0, 5, 10], "LookatXYZ": [0, 0, 0] }
"#;
    let description = parse_scene_block(body).expect("block parses");
    let loaded = pollster::block_on(load_models(
        &description.models,
        &resolver,
        FirstModelPolicy::Fatal,
    ))
    .expect("first model resolves");
    assert_eq!(loaded.warnings.len(), 2);
    let scene = compose(description, loaded, &resolver);
    assert_eq!(scene.graph.children(scene.group).len(), 1);
    assert_eq!(scene.warnings.len(), 2);
}

#[test]
fn unresolved_primary_model_fails_the_block() {
    let dir = tempfile::tempdir().expect("temp dir");
    let resolver = FolderResolver::new(dir.path());
    let description = parse_scene_block(CUBE_BLOCK).expect("block parses");
    let result = pollster::block_on(load_models(
        &description.models,
        &resolver,
        FirstModelPolicy::Fatal,
    ));
    assert!(matches!(result, Err(BlockError::PrimaryModelUnresolved(name)) if name == "cube.stl"));
}

#[test]
fn decode_failures_skip_the_model_with_a_named_warning() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("good.stl"), cube_stl()).expect("stl write");
    fs::write(dir.path().join("broken.stl"), b"solid nope").expect("bad stl write");
    let resolver = FolderResolver::new(dir.path());

    let body = r#"
"models": [
   { "name": "good.stl", "scale": 1, "position": [0, 0, 0], "rotation": [0, 0, 0] },
   { "name": "broken.stl", "scale": 1, "position": [2, 0, 0], "rotation": [0, 0, 0] }
],
"camera": { "camPosXYZ": [0, 5, 10], "LookatXYZ": [0, 0, 0] }
"#;
    let description = parse_scene_block(body).expect("block parses");
    let loaded = pollster::block_on(load_models(
        &description.models,
        &resolver,
        FirstModelPolicy::Fatal,
    ))
    .expect("good model resolves");
    assert_eq!(loaded.models.len(), 1);
    assert_eq!(loaded.warnings.len(), 1);
    assert_eq!(loaded.warnings[0].model, "broken.stl");
}

#[test]
fn shadow_flags_are_set_on_every_decoded_mesh() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("cube.stl"), cube_stl()).expect("stl write");
    let resolver = FolderResolver::new(dir.path());
    let description = parse_scene_block(CUBE_BLOCK).expect("block parses");
    let loaded = pollster::block_on(load_models(
        &description.models,
        &resolver,
        FirstModelPolicy::Fatal,
    ))
    .expect("load");
    let scene = compose(description, loaded, &resolver);
    for (id, node) in scene.graph.iter() {
        if matches!(node.kind, NodeKind::Mesh(_))
            && scene.graph.top_level_ancestor(id, scene.group).is_some()
        {
            assert!(node.cast_shadows, "model meshes cast shadows");
            assert!(node.receive_shadows, "model meshes receive shadows");
        }
    }
}
