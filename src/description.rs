use glam::Vec3;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Root parsed and validated unit for one embedded scene block. Produced
/// only by the validator; nothing downstream consumes untyped data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    #[serde(default)]
    pub models: Vec<ModelSpec>,
    pub camera: CameraSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lights: Vec<LightSpec>,
    #[serde(default)]
    pub scene: SceneSettings,
    #[serde(default, rename = "renderBlock", skip_serializing_if = "Option::is_none")]
    pub render_block: Option<RenderBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stl: Option<StlSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub scale: f32,
    pub position: [f32; 3],
    /// Euler angles in degrees; converted to radians at apply time.
    pub rotation: [f32; 3],
}

impl ModelSpec {
    pub fn extension(&self) -> Option<String> {
        let (_, ext) = self.name.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSpec {
    #[serde(default)]
    pub orthographic: bool,
    #[serde(rename = "camPosXYZ")]
    pub cam_pos: [f32; 3],
    #[serde(rename = "LookatXYZ")]
    pub look_at: [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LightKind {
    Point,
    /// Hemisphere-style fill light.
    Ambient,
    Directional,
    Spot,
    /// Directional light parented to the camera, re-targeted every frame.
    CameraDirectional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightSpec {
    #[serde(rename = "type")]
    pub kind: LightKind,
    #[serde(default = "default_light_color")]
    pub color: String,
    #[serde(default = "default_light_pos")]
    pub pos: [f32; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f32>,
    #[serde(default = "default_light_strength")]
    pub strength: f32,
    #[serde(default, rename = "castShadows")]
    pub cast_shadows: bool,
    #[serde(default)]
    pub show: bool,
}

fn default_light_color() -> String {
    "#ffffff".to_string()
}

fn default_light_pos() -> [f32; 3] {
    [0.0, 5.0, 0.0]
}

const fn default_light_strength() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default)]
    pub show_gui_overlay: bool,
    #[serde(default)]
    pub auto_rotation: [f32; 3],
    #[serde(default)]
    pub show_ground_shadows: bool,
    #[serde(default = "default_orbit_damping")]
    pub orbit_control_damping: bool,
    #[serde(default)]
    pub show_axis_helper: bool,
    #[serde(default = "default_axis_length")]
    pub length: f32,
    #[serde(default)]
    pub show_grid_helper: bool,
    #[serde(default = "default_grid_size")]
    pub grid_size: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdri_background: Option<HdriSettings>,
}

const fn default_orbit_damping() -> bool {
    true
}

const fn default_axis_length() -> f32 {
    5.0
}

const fn default_grid_size() -> f32 {
    10.0
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            background_color: None,
            show_gui_overlay: false,
            auto_rotation: [0.0; 3],
            show_ground_shadows: false,
            orbit_control_damping: default_orbit_damping(),
            show_axis_helper: false,
            length: default_axis_length(),
            show_grid_helper: false,
            grid_size: default_grid_size(),
            hdri_background: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HdriSettings {
    pub texture_path: String,
    #[serde(default)]
    pub scene_background: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_geometry: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderBlock {
    #[serde(default = "default_width_percentage")]
    pub width_percentage: f32,
    #[serde(default = "default_block_height")]
    pub height: f32,
    #[serde(default = "default_alignment")]
    pub alignment: String,
}

const fn default_width_percentage() -> f32 {
    100.0
}

const fn default_block_height() -> f32 {
    400.0
}

fn default_alignment() -> String {
    "center".to_string()
}

impl Default for RenderBlock {
    fn default() -> Self {
        Self {
            width_percentage: default_width_percentage(),
            height: default_block_height(),
            alignment: default_alignment(),
        }
    }
}

/// Applies to triangulated-mesh models of the block only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StlSettings {
    #[serde(rename = "stlColorHexString", default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(rename = "stlWireframe", default)]
    pub wireframe: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSettings {
    #[serde(default = "default_grid_columns")]
    pub columns: usize,
    #[serde(default = "default_row_height")]
    pub row_height: f32,
    #[serde(default = "default_gap")]
    pub gap_x: f32,
    #[serde(default = "default_gap")]
    pub gap_y: f32,
}

const fn default_grid_columns() -> usize {
    2
}

const fn default_row_height() -> f32 {
    300.0
}

const fn default_gap() -> f32 {
    8.0
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            columns: default_grid_columns(),
            row_height: default_row_height(),
            gap_x: default_gap(),
            gap_y: default_gap(),
        }
    }
}

/// A grid-mode document: named cells, each a full scene description.
#[derive(Debug, Clone, PartialEq)]
pub struct GridDescription {
    pub cells: Vec<GridCell>,
    pub settings: GridSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    pub name: String,
    pub description: SceneDescription,
}

/// Background resolved from the `scene` section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Background {
    Transparent,
    Color(Vec3),
    Environment { scene_background: bool },
}

impl SceneSettings {
    pub fn background(&self) -> Background {
        if let Some(hdri) = &self.hdri_background {
            return Background::Environment { scene_background: hdri.scene_background };
        }
        match self.background_color.as_deref() {
            None => Background::Color(Vec3::new(0.12, 0.12, 0.14)),
            Some("transparent") => Background::Transparent,
            Some(hex) => match parse_hex_color(hex) {
                Some(color) => Background::Color(color),
                None => {
                    log::warn!("unparseable background color '{hex}', falling back to default");
                    Background::Color(Vec3::new(0.12, 0.12, 0.14))
                }
            },
        }
    }
}

/// Parses `#rgb` and `#rrggbb` strings into linear-ish 0..1 components.
pub fn parse_hex_color(text: &str) -> Option<Vec3> {
    let digits = text.strip_prefix('#').unwrap_or(text);
    let (r, g, b) = match digits.len() {
        3 => {
            let mut chars = digits.chars();
            let r = chars.next()?.to_digit(16)?;
            let g = chars.next()?.to_digit(16)?;
            let b = chars.next()?.to_digit(16)?;
            ((r * 17) as f32, (g * 17) as f32, (b * 17) as f32)
        }
        6 => {
            let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
            let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
            let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
            (r as f32, g as f32, b as f32)
        }
        _ => return None,
    };
    Some(Vec3::new(r / 255.0, g / 255.0, b / 255.0))
}

pub fn color_to_hex(color: Vec3) -> String {
    let channel = |v: f32| ((v.clamp(0.0, 1.0) * 255.0).round() as u8);
    format!("#{:02x}{:02x}{:02x}", channel(color.x), channel(color.y), channel(color.z))
}

impl SceneDescription {
    /// Renders the canonical block text: no outer braces, top-level keys
    /// unindented, flat objects on one line, nested structures one key per
    /// line at 3-space indentation. Floats are rounded to 3 decimals.
    pub fn to_block_text(&self) -> String {
        let value = serde_json::to_value(self).unwrap_or(Value::Null);
        render_top_level(&value)
    }
}

impl GridDescription {
    pub fn to_block_text(&self) -> String {
        let mut out = String::new();
        for cell in &self.cells {
            let value = serde_json::to_value(&cell.description).unwrap_or(Value::Null);
            out.push_str(&format!("\"{}\": {},\n", cell.name, render_value(&value, 0)));
        }
        let settings = serde_json::to_value(&self.settings).unwrap_or(Value::Null);
        out.push_str(&format!("\"gridSettings\": {}", render_value(&settings, 0)));
        out
    }
}

fn render_top_level(value: &Value) -> String {
    let Value::Object(map) = value else {
        return render_value(value, 0);
    };
    let mut lines = Vec::with_capacity(map.len());
    for (key, entry) in map {
        lines.push(format!("\"{}\": {}", key, render_value(entry, 0)));
    }
    lines.join(",\n")
}

/// A value is flat when all of its properties are primitives or arrays of
/// primitives; flat values render compactly on one line.
fn is_flat(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.values().all(|entry| match entry {
            Value::Object(_) => false,
            Value::Array(items) => items.iter().all(|item| !item.is_object() && !item.is_array()),
            _ => true,
        }),
        Value::Array(items) => items.iter().all(|item| !item.is_object() && !item.is_array()),
        _ => true,
    }
}

fn render_value(value: &Value, depth: usize) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => format_number(number),
        Value::String(text) => format!("\"{text}\""),
        Value::Array(items) => {
            if is_flat(value) {
                let parts: Vec<String> = items.iter().map(|item| render_value(item, depth)).collect();
                format!("[{}]", parts.join(", "))
            } else {
                let indent = " ".repeat((depth + 1) * 3);
                let closing = " ".repeat(depth * 3);
                let parts: Vec<String> =
                    items.iter().map(|item| format!("{indent}{}", render_value(item, depth + 1))).collect();
                format!("[\n{}\n{closing}]", parts.join(",\n"))
            }
        }
        Value::Object(map) => {
            if is_flat(value) {
                let parts: Vec<String> =
                    map.iter().map(|(key, entry)| format!("\"{key}\": {}", render_value(entry, depth))).collect();
                format!("{{{}}}", parts.join(", "))
            } else {
                let indent = " ".repeat((depth + 1) * 3);
                let closing = " ".repeat(depth * 3);
                let parts: Vec<String> = map
                    .iter()
                    .map(|(key, entry)| format!("{indent}\"{key}\": {}", render_value(entry, depth + 1)))
                    .collect();
                format!("{{\n{}\n{closing}}}", parts.join(",\n"))
            }
        }
    }
}

fn format_number(number: &serde_json::Number) -> String {
    if let Some(int) = number.as_i64() {
        return int.to_string();
    }
    let float = number.as_f64().unwrap_or(0.0);
    let rounded = (float * 1000.0).round() / 1000.0;
    if rounded == rounded.trunc() {
        format!("{}", rounded as i64)
    } else {
        let text = format!("{rounded:.3}");
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

pub fn round3(value: f32) -> f32 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_parse_in_both_widths() {
        let full = parse_hex_color("#ff8000").expect("6-digit hex");
        assert!((full.x - 1.0).abs() < 1e-3);
        assert!((full.y - 0.502).abs() < 1e-2);
        assert!(full.z.abs() < 1e-3);
        let short = parse_hex_color("#f80").expect("3-digit hex");
        assert!((short.x - 1.0).abs() < 1e-3);
        assert!(parse_hex_color("#12345").is_none());
    }

    #[test]
    fn background_falls_back_when_color_is_garbage() {
        let mut settings = SceneSettings::default();
        settings.background_color = Some("notacolor".to_string());
        assert!(matches!(settings.background(), Background::Color(_)));
        settings.background_color = Some("transparent".to_string());
        assert_eq!(settings.background(), Background::Transparent);
    }

    #[test]
    fn block_text_keeps_flat_objects_on_one_line() {
        let description = SceneDescription {
            models: vec![ModelSpec {
                name: "cube.stl".to_string(),
                scale: 1.0,
                position: [0.0, 0.0, 0.0],
                rotation: [0.0, 0.0, 0.0],
            }],
            camera: CameraSpec { orthographic: false, cam_pos: [0.0, 5.0, 10.0], look_at: [0.0; 3] },
            lights: Vec::new(),
            scene: SceneSettings::default(),
            render_block: None,
            stl: None,
        };
        let text = description.to_block_text();
        let model_line = text
            .lines()
            .find(|line| line.contains("cube.stl"))
            .expect("model entry should be rendered");
        assert!(model_line.contains("\"scale\": 1"));
        assert!(model_line.contains("\"position\": [0, 0, 0]"));
        for line in text.lines() {
            if line.starts_with(' ') {
                let leading = line.len() - line.trim_start().len();
                assert_eq!(leading % 3, 0, "indentation must be a multiple of 3: {line:?}");
            }
        }
    }

    #[test]
    fn numbers_round_to_three_decimals() {
        let number = serde_json::Number::from_f64(1.23456789).expect("finite");
        assert_eq!(format_number(&number), "1.235");
        let whole = serde_json::Number::from_f64(2.0).expect("finite");
        assert_eq!(format_number(&whole), "2");
    }
}
