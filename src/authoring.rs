use crate::settings::ViewerSettings;

/// Position in the host document, 0-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPosition {
    pub line: usize,
    pub column: usize,
}

/// Host document-editing capability: cursor/selection access, insertion and
/// range replacement. The host adapter implements this; the core never
/// touches the editor directly.
pub trait EditorSurface {
    fn selection(&self) -> String;
    fn current_line(&self) -> String;
    fn insert_at_cursor(&mut self, text: &str);
    fn replace_range(&mut self, from: TextPosition, to: TextPosition, text: &str);
}

/// Extracts `[[...]]`-bracketed references, stripping alias and heading
/// suffixes. Order of appearance is preserved; duplicates are kept.
pub fn extract_bracketed_refs(text: &str) -> Vec<String> {
    let mut refs = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("[[") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("]]") else {
            break;
        };
        let inner = &after[..end];
        let inner = inner.split(['|', '#']).next().unwrap_or(inner).trim();
        if !inner.is_empty() {
            refs.push(inner.to_string());
        }
        rest = &after[end + 2..];
    }
    refs
}

fn vec3_text(values: [f32; 3]) -> String {
    format!("[{}, {}, {}]", values[0], values[1], values[2])
}

fn model_entry(name: &str, scale: f32) -> String {
    format!(
        "   {{ \"name\": \"{name}\", \"scale\": {scale}, \"position\": [0, 0, 0], \"rotation\": [0, 0, 0] }}"
    )
}

/// Single-scene block template prefilled from settings and the model
/// references found in the current selection or line.
pub fn scene_block_template(settings: &ViewerSettings, refs: &[String]) -> String {
    let mut models = String::new();
    if refs.is_empty() {
        models.push_str(&model_entry("model.stl", settings.default_model_scale));
    } else {
        let entries: Vec<String> = refs
            .iter()
            .map(|name| model_entry(name, settings.default_model_scale))
            .collect();
        models.push_str(&entries.join(",\n"));
    }
    format!(
        "\"models\": [\n{models}\n],\n\"camera\": {{ \"camPosXYZ\": {cam}, \"LookatXYZ\": {look} }},\n\"scene\": {{ \"backgroundColor\": \"{background}\", \"orbitControlDamping\": {damping} }}",
        cam = vec3_text(settings.default_camera_position),
        look = vec3_text(settings.default_look_at),
        background = settings.default_background_color,
        damping = settings.orbit_control_damping,
    )
}

/// Multi-cell grid block: one cell per bracketed reference in the
/// selection, plus grid settings.
pub fn grid_block_template(settings: &ViewerSettings, refs: &[String]) -> String {
    let mut cells = String::new();
    let names: Vec<&str> = if refs.is_empty() {
        vec!["model.stl"]
    } else {
        refs.iter().map(String::as_str).collect()
    };
    for (index, name) in names.iter().enumerate() {
        let cell = format!(
            "\"cell{n}\": {{\n\"models\": [\n{model}\n],\n\"camera\": {{ \"camPosXYZ\": {cam}, \"LookatXYZ\": {look} }}\n}},\n",
            n = index + 1,
            model = model_entry(name, settings.default_model_scale),
            cam = vec3_text(settings.default_camera_position),
            look = vec3_text(settings.default_look_at),
        );
        cells.push_str(&cell);
    }
    format!(
        "{cells}\"gridSettings\": {{ \"columns\": {columns}, \"rowHeight\": {row_height}, \"gapX\": {gap_x}, \"gapY\": {gap_y} }}",
        columns = settings.grid.columns,
        row_height = settings.grid.row_height,
        gap_x = settings.grid.gap_x,
        gap_y = settings.grid.gap_y,
    )
}

/// Insert-scene command: template from the selection, falling back to the
/// current line when nothing is selected.
pub fn insert_scene_block(editor: &mut dyn EditorSurface, settings: &ViewerSettings) {
    let selection = editor.selection();
    let source = if selection.trim().is_empty() { editor.current_line() } else { selection };
    let refs = extract_bracketed_refs(&source);
    editor.insert_at_cursor(&scene_block_template(settings, &refs));
}

/// Build-grid command over every bracketed reference in the selection.
pub fn insert_grid_block(editor: &mut dyn EditorSurface, settings: &ViewerSettings) {
    let refs = extract_bracketed_refs(&editor.selection());
    editor.insert_at_cursor(&grid_block_template(settings, &refs));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse_grid_block, parse_scene_block, CellPolicy};

    #[derive(Default)]
    struct FakeEditor {
        selection: String,
        line: String,
        inserted: Vec<String>,
    }

    impl EditorSurface for FakeEditor {
        fn selection(&self) -> String {
            self.selection.clone()
        }

        fn current_line(&self) -> String {
            self.line.clone()
        }

        fn insert_at_cursor(&mut self, text: &str) {
            self.inserted.push(text.to_string());
        }

        fn replace_range(&mut self, _from: TextPosition, _to: TextPosition, text: &str) {
            self.inserted.push(text.to_string());
        }
    }

    #[test]
    fn bracketed_refs_strip_aliases_and_headings() {
        let refs = extract_bracketed_refs(
            "see [[bracket.stl|the bracket]] and [[housing.obj#top]] plus [[gear.glb]]",
        );
        assert_eq!(refs, vec!["bracket.stl", "housing.obj", "gear.glb"]);
        assert!(extract_bracketed_refs("no refs here").is_empty());
        assert!(extract_bracketed_refs("broken [[ref").is_empty());
    }

    #[test]
    fn scene_template_parses_as_a_valid_block() {
        let settings = ViewerSettings::default();
        let refs = vec!["part.stl".to_string(), "lid.obj".to_string()];
        let body = scene_block_template(&settings, &refs);
        let description = parse_scene_block(&body).expect("template must be valid");
        assert_eq!(description.models.len(), 2);
        assert_eq!(description.models[0].name, "part.stl");
        assert_eq!(description.camera.cam_pos, [0.0, 5.0, 10.0]);
    }

    #[test]
    fn grid_template_parses_with_one_cell_per_ref() {
        let settings = ViewerSettings::default();
        let refs = vec!["a.stl".to_string(), "b.stl".to_string(), "c.stl".to_string()];
        let body = grid_block_template(&settings, &refs);
        let outcome = parse_grid_block(&body, CellPolicy::AllOrNothing).expect("template valid");
        assert_eq!(outcome.grid.cells.len(), 3);
        assert_eq!(outcome.grid.cells[1].description.models[0].name, "b.stl");
        assert_eq!(outcome.grid.settings.columns, settings.grid.columns);
    }

    #[test]
    fn insert_command_falls_back_to_the_current_line() {
        let mut editor = FakeEditor {
            selection: String::new(),
            line: "parts: [[bracket.stl]]".to_string(),
            inserted: Vec::new(),
        };
        insert_scene_block(&mut editor, &ViewerSettings::default());
        assert_eq!(editor.inserted.len(), 1);
        assert!(editor.inserted[0].contains("bracket.stl"));
    }
}
