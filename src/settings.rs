//! Project-scoped companion config files and the per-user fallback store.
//!
//! Two JSON files live under `{project}/.screenforge/`: `canvas.json` with the
//! sprite/animation/selection state and `settings.json` with the workspace
//! flags. Both tolerate absence (first run). A per-user settings file supplies
//! auto-save defaults only when the project-local values are missing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::canvas::Orientation;

/// Directory under the project root that holds companion config files
pub const CONFIG_DIR: &str = ".screenforge";

pub const DEFAULT_GRID_SIZE: u32 = 10;
pub const DEFAULT_AUTO_SAVE_INTERVAL_MS: u64 = 10_000;
pub const MIN_AUTO_SAVE_INTERVAL_MS: u64 = 1_000;
pub const MAX_AUTO_SAVE_INTERVAL_MS: u64 = 60_000;

pub fn config_dir(base_dir: &Path) -> PathBuf {
    base_dir.join(CONFIG_DIR)
}

pub fn canvas_config_path(base_dir: &Path) -> PathBuf {
    config_dir(base_dir).join("canvas.json")
}

pub fn settings_path(base_dir: &Path) -> PathBuf {
    config_dir(base_dir).join("settings.json")
}

/// Milliseconds since the Unix epoch
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Workspace flags persisted to `settings.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectSettings {
    pub snap_to_grid: bool,
    pub grid_size: u32,
    pub allow_dnd: bool,
    pub auto_save_enabled: bool,
    pub auto_save_interval: u64,
    pub history_max_steps: u32,
    pub last_modified: u64,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            snap_to_grid: false,
            grid_size: DEFAULT_GRID_SIZE,
            allow_dnd: true,
            auto_save_enabled: true,
            auto_save_interval: DEFAULT_AUTO_SAVE_INTERVAL_MS,
            history_max_steps: crate::history::DEFAULT_MAX_STEPS,
            last_modified: 0,
        }
    }
}

impl ProjectSettings {
    /// Load project-local settings; `None` when the file is absent or unreadable
    pub fn load(base_dir: &Path) -> Option<Self> {
        let path = settings_path(base_dir);
        let text = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&text) {
            Ok(settings) => Some(settings),
            Err(e) => {
                debug!("Ignoring unreadable settings at {:?}: {}", path, e);
                None
            }
        }
    }

    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let path = settings_path(base_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }

    /// Read-modify-write update preserving whatever is already on disk
    pub fn update(base_dir: &Path, apply: impl FnOnce(&mut ProjectSettings)) -> Result<()> {
        let mut settings = Self::load(base_dir).unwrap_or_default();
        apply(&mut settings);
        settings.save(base_dir)
    }
}

/// Per-screen sprite animation maps, keyed by screen index then asset name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScreenMaps {
    pub icon_frames: BTreeMap<usize, BTreeMap<String, u32>>,
    pub icon_frame_counts: BTreeMap<usize, BTreeMap<String, u32>>,
    pub icon_orientations: BTreeMap<usize, BTreeMap<String, Orientation>>,
}

/// Sprite/animation/selection state persisted to `canvas.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanvasConfig {
    pub sprite_assets: BTreeMap<String, bool>,
    pub screens: ScreenMaps,
    pub selected_states: BTreeMap<String, Option<usize>>,
}

impl CanvasConfig {
    /// Load the canvas config; `None` when absent or unreadable
    pub fn load(base_dir: &Path) -> Option<Self> {
        let path = canvas_config_path(base_dir);
        let text = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&text) {
            Ok(config) => Some(config),
            Err(e) => {
                debug!("Ignoring unreadable canvas config at {:?}: {}", path, e);
                None
            }
        }
    }

    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let path = canvas_config_path(base_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }
}

/// Per-user fallback values, consulted only when project-local settings are absent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AppSettingsValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    auto_save_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    auto_save_interval: Option<u64>,
}

/// Process-wide persisted key/value store for app-level defaults
#[derive(Debug, Default)]
pub struct AppSettings {
    values: AppSettingsValues,
    config_path: PathBuf,
}

impl AppSettings {
    /// Load from the per-user config directory
    pub fn load() -> Self {
        Self::load_from(Self::default_path())
    }

    /// Load from an explicit path (tests point this at a temp dir)
    pub fn load_from(config_path: PathBuf) -> Self {
        let values = std::fs::read_to_string(&config_path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default();
        Self {
            values,
            config_path,
        }
    }

    fn default_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".config")
            });
        config_dir.join("screenforge").join("settings.json")
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.config_path, content)
            .with_context(|| format!("Failed to write {:?}", self.config_path))?;
        Ok(())
    }

    pub fn auto_save_enabled(&self) -> Option<bool> {
        self.values.auto_save_enabled
    }

    pub fn auto_save_interval(&self) -> Option<u64> {
        self.values.auto_save_interval
    }

    pub fn set_auto_save_enabled(&mut self, enabled: bool) {
        self.values.auto_save_enabled = Some(enabled);
    }

    pub fn set_auto_save_interval(&mut self, interval_ms: u64) {
        self.values.auto_save_interval = Some(interval_ms);
    }
}
