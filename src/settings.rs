use crate::description::GridSettings;
use crate::parse::CellPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Which models block a render versus load best-effort. The historical
/// behavior (first model fatal, the rest best-effort) is kept as the
/// default but is an explicit policy rather than an accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FirstModelPolicy {
    #[default]
    Fatal,
    BestEffort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerSettings {
    #[serde(default = "ViewerSettings::default_camera_position")]
    pub default_camera_position: [f32; 3],
    #[serde(default)]
    pub default_look_at: [f32; 3],
    #[serde(default = "ViewerSettings::default_model_scale")]
    pub default_model_scale: f32,
    #[serde(default = "ViewerSettings::default_background_color")]
    pub default_background_color: String,
    #[serde(default = "ViewerSettings::default_orbit_damping")]
    pub orbit_control_damping: bool,
    #[serde(default)]
    pub grid: GridSettings,
    #[serde(default)]
    pub cell_policy: CellPolicy,
    #[serde(default)]
    pub first_model_policy: FirstModelPolicy,
}

impl ViewerSettings {
    const fn default_camera_position() -> [f32; 3] {
        [0.0, 5.0, 10.0]
    }

    const fn default_model_scale() -> f32 {
        1.0
    }

    fn default_background_color() -> String {
        "#1e1e1e".to_string()
    }

    const fn default_orbit_damping() -> bool {
        true
    }
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            default_camera_position: Self::default_camera_position(),
            default_look_at: [0.0; 3],
            default_model_scale: Self::default_model_scale(),
            default_background_color: Self::default_background_color(),
            orbit_control_damping: Self::default_orbit_damping(),
            grid: GridSettings::default(),
            cell_policy: CellPolicy::default(),
            first_model_policy: FirstModelPolicy::default(),
        }
    }
}

/// Persistence boundary for user preferences. The host decides where the
/// key-value store actually lives.
pub trait SettingsStore {
    fn load(&self) -> Result<ViewerSettings>;
    fn save(&self, settings: &ViewerSettings) -> Result<()>;
}

/// File-backed store for standalone use and the CLI.
pub struct JsonSettingsStore {
    path: std::path::PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn load_or_default(&self) -> ViewerSettings {
        match self.load() {
            Ok(settings) => settings,
            Err(err) => {
                log::warn!("settings load error: {err:?}; falling back to defaults");
                ViewerSettings::default()
            }
        }
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Result<ViewerSettings> {
        let bytes = fs::read(&self.path)
            .with_context(|| format!("reading settings file {}", self.path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing settings file {}", self.path.display()))
    }

    fn save(&self, settings: &ViewerSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating settings directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, json.as_bytes())
            .with_context(|| format!("writing settings file {}", self.path.display()))?;
        Ok(())
    }
}
