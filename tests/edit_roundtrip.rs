use glam::{Vec2, Vec3};
use merlin_viewer::authoring::{EditorSurface, TextPosition};
use merlin_viewer::compose::compose;
use merlin_viewer::load::load_models;
use merlin_viewer::overlay::EditOverlay;
use merlin_viewer::parse::parse_scene_block;
use merlin_viewer::resolve::FolderResolver;
use merlin_viewer::settings::FirstModelPolicy;
use std::fs;
use winit::dpi::PhysicalSize;

fn triangle_stl() -> Vec<u8> {
    let mut bytes = vec![0u8; 80];
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&[0u8; 12]);
    for vertex in [[-0.5f32, -0.5, 0.0], [0.5, -0.5, 0.0], [0.0, 0.5, 0.0]] {
        for value in vertex {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    bytes.extend_from_slice(&[0u8; 2]);
    bytes
}

#[derive(Default)]
struct RecordingEditor {
    replaced: Option<String>,
}

impl EditorSurface for RecordingEditor {
    fn selection(&self) -> String {
        String::new()
    }

    fn current_line(&self) -> String {
        String::new()
    }

    fn insert_at_cursor(&mut self, _text: &str) {}

    fn replace_range(&mut self, _from: TextPosition, _to: TextPosition, text: &str) {
        self.replaced = Some(text.to_string());
    }
}

const BLOCK: &str = r##"
"models": [
   { "name": "part.stl", "scale": 2, "position": [0.5, 0, -1], "rotation": [0, 45, 0] }
],
"camera": { "camPosXYZ": [0, 0, 10], "LookatXYZ": [0, 0, 0] },
"scene": { "backgroundColor": "#204060" }
"##;

#[test]
fn saved_text_reparses_to_the_live_transforms() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("part.stl"), triangle_stl()).expect("stl write");
    let resolver = FolderResolver::new(dir.path());

    let description = parse_scene_block(BLOCK).expect("block parses");
    let loaded = pollster::block_on(load_models(
        &description.models,
        &resolver,
        FirstModelPolicy::Fatal,
    ))
    .expect("load");
    let mut scene = compose(description, loaded, &resolver);

    let mut overlay = EditOverlay::default();
    let viewport = PhysicalSize::new(800, 600);
    overlay
        .pointer_click(&scene, Vec2::new(400.0, 300.0), viewport)
        .expect("model under the cursor");
    overlay.drag_step(&mut scene, Vec3::new(1.2345678, -0.75, 0.125));
    overlay.end_drag();

    let live_root = scene.model_roots[0].1;
    let live_translation = scene.graph.node(live_root).translation;
    let live_rotation = scene.graph.node(live_root).rotation;

    let mut editor = RecordingEditor::default();
    overlay.save(&scene, &mut editor, TextPosition { line: 10, column: 0 }, TextPosition {
        line: 18,
        column: 0,
    });
    let replaced = editor.replaced.expect("document text replaced");

    let reparsed = parse_scene_block(&replaced).expect("canonical text reparses");
    let model = &reparsed.models[0];
    for axis in 0..3 {
        assert!(
            (model.position[axis] - live_translation[axis]).abs() < 1e-3,
            "position axis {axis} drifted: {} vs {}",
            model.position[axis],
            live_translation[axis]
        );
    }
    let reparsed_rotation = merlin_viewer::load::model_rotation(model);
    // Compare quaternions up to sign.
    let dot = reparsed_rotation.dot(live_rotation).abs();
    assert!(dot > 1.0 - 1e-4, "rotation drifted, |dot| = {dot}");
    assert!((model.scale - 2.0).abs() < 1e-3);
    assert_eq!(reparsed.camera.cam_pos, [0.0, 0.0, 10.0]);
    assert_eq!(reparsed.scene.background_color.as_deref(), Some("#204060"));
}

#[test]
fn reparsed_text_is_stable_under_a_second_save() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("part.stl"), triangle_stl()).expect("stl write");
    let resolver = FolderResolver::new(dir.path());

    let description = parse_scene_block(BLOCK).expect("block parses");
    let loaded = pollster::block_on(load_models(
        &description.models,
        &resolver,
        FirstModelPolicy::Fatal,
    ))
    .expect("load");
    let scene = compose(description, loaded, &resolver);
    let overlay = EditOverlay::default();

    let first = overlay.apply_to_description(&scene).to_block_text();
    let reparsed = parse_scene_block(&first).expect("first render reparses");
    let reloaded = pollster::block_on(load_models(
        &reparsed.models,
        &resolver,
        FirstModelPolicy::Fatal,
    ))
    .expect("reload");
    let second_scene = compose(reparsed, reloaded, &resolver);
    let second = overlay.apply_to_description(&second_scene).to_block_text();
    assert_eq!(first, second, "canonical text must be a fixed point");
}
