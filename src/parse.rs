use crate::description::{GridCell, GridDescription, GridSettings, SceneDescription};
use crate::error::{BlockError, FieldIssue, ParseCause, ParseDiagnostic};
use serde_json::Value;

/// Policy for grid-mode blocks where some cells fail validation. Both modes
/// are legitimate; the selection is a configuration choice, not a bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CellPolicy {
    /// Invalid cells are reported but valid cells still render.
    #[default]
    SkipInvalid,
    /// Any invalid cell invalidates the whole block.
    AllOrNothing,
}

/// Outcome of parsing a grid block under [`CellPolicy::SkipInvalid`]:
/// the valid cells plus a report per failed cell.
#[derive(Debug)]
pub struct GridOutcome {
    pub grid: GridDescription,
    pub failures: Vec<(String, BlockError)>,
}

/// Block bodies arrive without their enclosing braces by convention; the
/// parser wraps them before structural parsing. The wrapper adds one line,
/// which line-number recovery subtracts back out.
fn wrap_body(body: &str) -> String {
    format!("{{\n{body}\n}}")
}

/// Parses and validates one scene block body.
pub fn parse_scene_block(body: &str) -> Result<SceneDescription, BlockError> {
    let value = parse_structure(body)?;
    let issues = validate_scene_value(&value);
    if !issues.is_empty() {
        return Err(BlockError::Validation(issues));
    }
    typed_description(value)
}

/// Parses a grid block: a mapping of named cells, each independently
/// validated as a full scene description, plus `gridSettings`.
pub fn parse_grid_block(body: &str, policy: CellPolicy) -> Result<GridOutcome, BlockError> {
    let value = parse_structure(body)?;
    let Value::Object(map) = value else {
        return Err(BlockError::Validation(vec![FieldIssue {
            parent: "grid".to_string(),
            field: "cell1".to_string(),
            index: None,
            example: "cell1: { models: [...], camera: {...} }",
        }]));
    };

    let settings = match map.get("gridSettings") {
        Some(raw) => serde_json::from_value::<GridSettings>(raw.clone()).unwrap_or_default(),
        None => GridSettings::default(),
    };

    let mut cell_keys: Vec<&String> = map.keys().filter(|key| key.starts_with("cell")).collect();
    cell_keys.sort_by_key(|key| key.trim_start_matches("cell").parse::<usize>().unwrap_or(usize::MAX));
    if cell_keys.is_empty() {
        return Err(BlockError::Validation(vec![FieldIssue {
            parent: "grid".to_string(),
            field: "cell1".to_string(),
            index: None,
            example: "cell1: { models: [...], camera: {...} }",
        }]));
    }

    let mut cells = Vec::with_capacity(cell_keys.len());
    let mut failures = Vec::new();
    for key in cell_keys {
        let cell_value = map.get(key).cloned().unwrap_or(Value::Null);
        let issues = validate_scene_value(&cell_value);
        let outcome = if issues.is_empty() {
            typed_description(cell_value)
        } else {
            Err(BlockError::Validation(issues))
        };
        match outcome {
            Ok(description) => cells.push(GridCell { name: key.clone(), description }),
            Err(err) => match policy {
                CellPolicy::AllOrNothing => return Err(err),
                CellPolicy::SkipInvalid => {
                    log::warn!("grid cell '{key}' skipped: {err}");
                    failures.push((key.clone(), err));
                }
            },
        }
    }

    Ok(GridOutcome { grid: GridDescription { cells, settings }, failures })
}

fn parse_structure(body: &str) -> Result<Value, BlockError> {
    let wrapped = wrap_body(body);
    serde_json::from_str::<Value>(&wrapped).map_err(|err| BlockError::Parse(diagnose(body, &err)))
}

fn typed_description(value: Value) -> Result<SceneDescription, BlockError> {
    serde_json::from_value::<SceneDescription>(value).map_err(|err| {
        // A field present with the wrong shape slips past the required-field
        // pass; report it through the same validation surface.
        BlockError::Validation(vec![FieldIssue {
            parent: "block".to_string(),
            field: err.to_string(),
            index: None,
            example: "see the field examples above",
        }])
    })
}

/// Recovers the 1-based line of the syntactic failure in the original body
/// and ranks the candidate causes. The ranking is heuristic; all candidates
/// are reported so the author can judge.
fn diagnose(body: &str, err: &serde_json::Error) -> ParseDiagnostic {
    let lines: Vec<&str> = body.lines().collect();
    let reported = err.line();
    // Wrapping added a leading "{" line.
    let line = reported.saturating_sub(1).clamp(1, lines.len().max(1));
    let line_text = lines.get(line - 1).map(|text| text.trim().to_string()).unwrap_or_default();
    ParseDiagnostic { line, line_text: line_text.clone(), causes: rank_causes(body, &line_text), detail: err.to_string() }
}

fn rank_causes(body: &str, line_text: &str) -> Vec<ParseCause> {
    let mut ranked = Vec::with_capacity(4);
    let push = |cause: ParseCause, ranked: &mut Vec<ParseCause>| {
        if !ranked.contains(&cause) {
            ranked.push(cause);
        }
    };

    let quote_count = line_text.matches('"').count();
    if quote_count % 2 == 1 {
        push(ParseCause::UnmatchedQuote, &mut ranked);
    }
    if line_text.trim_end().ends_with(',')
        || line_text.starts_with('}')
        || line_text.starts_with(']')
    {
        push(ParseCause::TrailingComma, &mut ranked);
    }
    let opens = body.matches(['{', '[']).count();
    let closes = body.matches(['}', ']']).count();
    if opens != closes {
        push(ParseCause::UnbalancedDelimiter, &mut ranked);
    }

    for cause in [
        ParseCause::TrailingComma,
        ParseCause::MissingComma,
        ParseCause::UnbalancedDelimiter,
        ParseCause::UnmatchedQuote,
    ] {
        push(cause, &mut ranked);
    }
    ranked
}

const EXAMPLE_MODELS: &str = "models: [{ name: \"model.stl\", scale: 1, position: [0,0,0], rotation: [0,0,0] }]";
const EXAMPLE_NAME: &str = "name: \"model.stl\"";
const EXAMPLE_SCALE: &str = "scale: 1";
const EXAMPLE_POSITION: &str = "position: [0, 0, 0]";
const EXAMPLE_ROTATION: &str = "rotation: [0, 0, 0]";
const EXAMPLE_CAMERA: &str = "camera: { camPosXYZ: [0,5,10], LookatXYZ: [0,0,0] }";
const EXAMPLE_CAM_POS: &str = "camPosXYZ: [0, 5, 10]";
const EXAMPLE_LOOK_AT: &str = "LookatXYZ: [0, 0, 0]";

/// Enumerates every missing required field across every array element.
/// Validation runs before any resource loading.
pub fn validate_scene_value(value: &Value) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    let Value::Object(map) = value else {
        issues.push(issue("block", "models", None, EXAMPLE_MODELS));
        issues.push(issue("block", "camera", None, EXAMPLE_CAMERA));
        return issues;
    };

    match map.get("models") {
        Some(Value::Array(models)) => {
            for (index, model) in models.iter().enumerate() {
                validate_model(model, index, &mut issues);
            }
        }
        _ => issues.push(issue("block", "models", None, EXAMPLE_MODELS)),
    }

    match map.get("camera") {
        Some(Value::Object(camera)) => {
            if !is_vec3(camera.get("camPosXYZ")) {
                issues.push(issue("camera", "camPosXYZ", None, EXAMPLE_CAM_POS));
            }
            if !is_vec3(camera.get("LookatXYZ")) {
                issues.push(issue("camera", "LookatXYZ", None, EXAMPLE_LOOK_AT));
            }
        }
        _ => issues.push(issue("block", "camera", None, EXAMPLE_CAMERA)),
    }

    issues
}

fn validate_model(model: &Value, index: usize, issues: &mut Vec<FieldIssue>) {
    let Value::Object(map) = model else {
        issues.push(issue("models", "name", Some(index), EXAMPLE_NAME));
        issues.push(issue("models", "scale", Some(index), EXAMPLE_SCALE));
        issues.push(issue("models", "position", Some(index), EXAMPLE_POSITION));
        issues.push(issue("models", "rotation", Some(index), EXAMPLE_ROTATION));
        return;
    };
    match map.get("name") {
        Some(Value::String(name)) if !name.is_empty() => {}
        _ => issues.push(issue("models", "name", Some(index), EXAMPLE_NAME)),
    }
    if !matches!(map.get("scale"), Some(Value::Number(_))) {
        issues.push(issue("models", "scale", Some(index), EXAMPLE_SCALE));
    }
    if !is_vec3(map.get("position")) {
        issues.push(issue("models", "position", Some(index), EXAMPLE_POSITION));
    }
    if !is_vec3(map.get("rotation")) {
        issues.push(issue("models", "rotation", Some(index), EXAMPLE_ROTATION));
    }
}

fn is_vec3(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Array(items))
        if items.len() == 3 && items.iter().all(|item| item.is_number()))
}

fn issue(parent: &str, field: &str, index: Option<usize>, example: &'static str) -> FieldIssue {
    FieldIssue { parent: parent.to_string(), field: field.to_string(), index, example }
}
