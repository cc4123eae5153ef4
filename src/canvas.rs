//! Canvas/workspace state - view state that lives outside the document.
//!
//! Selection, zoom, per-screen sprite animation config, grid/snap settings,
//! and the auto-save machinery. The four sprite/selection maps are the
//! undoable part: the history engine snapshots them together with the
//! document (see [`CanvasSnapshot`]); everything else is pure navigation
//! state that undo never touches.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::history::HistoryEngine;
use crate::notify::Notices;
use crate::project::ProjectState;
use crate::settings::{
    now_millis, AppSettings, CanvasConfig, ProjectSettings, DEFAULT_AUTO_SAVE_INTERVAL_MS,
    DEFAULT_GRID_SIZE, MAX_AUTO_SAVE_INTERVAL_MS, MIN_AUTO_SAVE_INTERVAL_MS,
};

const DEFAULT_ZOOM: f32 = 0.85;
const DEFAULT_TAB: &str = "screens";

/// Sprite strip frame layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    #[default]
    Vertical,
}

/// View or edit interaction mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CanvasMode {
    #[default]
    View,
    Edit,
}

/// Explorer asset filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssetFilter {
    #[default]
    All,
    Backgrounds,
    Icons,
    Sprites,
    Stacked,
}

/// Screen list presentation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScreenListMode {
    #[default]
    List,
    Detail,
}

/// Trailing-debounce deadline for auto-save.
///
/// Every edit re-arms the deadline; it fires only after a full quiet
/// interval. Rapid edits therefore postpone the save until quiescence.
#[derive(Debug, Default)]
pub struct AutoSaveTimer {
    deadline: Option<Instant>,
}

impl AutoSaveTimer {
    pub fn rearm(&mut self, now: Instant, interval: Duration) {
        self.deadline = Some(now + interval);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Report expiry exactly once, clearing the deadline
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// The four canvas fields captured in every history entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanvasSnapshot {
    pub icon_frames: BTreeMap<usize, BTreeMap<String, u32>>,
    pub icon_frame_counts: BTreeMap<usize, BTreeMap<String, u32>>,
    pub icon_orientations: BTreeMap<usize, BTreeMap<String, Orientation>>,
    pub selected_states: BTreeMap<String, Option<usize>>,
}

/// Workspace/view state store
#[derive(Debug)]
pub struct CanvasState {
    // Selection - at most one of the three is active
    selected_icon_index: Option<usize>,
    selected_color_key: Option<String>,
    selected_asset_path: Option<String>,
    hovered_asset_name: Option<String>,

    // Navigation
    zoom: f32,
    search_query: String,
    active_tab: String,
    active_screen_idx: usize,
    asset_filter: AssetFilter,
    canvas_mode: CanvasMode,
    screen_list_mode: ScreenListMode,

    // Undoable sprite/animation/selection state
    icon_frames: BTreeMap<usize, BTreeMap<String, u32>>,
    icon_frame_counts: BTreeMap<usize, BTreeMap<String, u32>>,
    icon_orientations: BTreeMap<usize, BTreeMap<String, Orientation>>,
    selected_states: BTreeMap<String, Option<usize>>,

    // Persisted workspace flags
    snap_to_grid: bool,
    grid_size: u32,
    allow_dnd: bool,
    auto_save_enabled: bool,
    auto_save_interval_ms: u64,

    has_unsaved_changes: bool,
    autosave: AutoSaveTimer,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            selected_icon_index: None,
            selected_color_key: None,
            selected_asset_path: None,
            hovered_asset_name: None,
            zoom: DEFAULT_ZOOM,
            search_query: String::new(),
            active_tab: DEFAULT_TAB.to_string(),
            active_screen_idx: 0,
            asset_filter: AssetFilter::default(),
            canvas_mode: CanvasMode::default(),
            screen_list_mode: ScreenListMode::default(),
            icon_frames: BTreeMap::new(),
            icon_frame_counts: BTreeMap::new(),
            icon_orientations: BTreeMap::new(),
            selected_states: BTreeMap::new(),
            snap_to_grid: false,
            grid_size: DEFAULT_GRID_SIZE,
            allow_dnd: true,
            auto_save_enabled: true,
            auto_save_interval_ms: DEFAULT_AUTO_SAVE_INTERVAL_MS,
            has_unsaved_changes: false,
            autosave: AutoSaveTimer::default(),
        }
    }
}

fn state_key(screen_idx: usize, asset_name: &str) -> String {
    format!("{}_{}", screen_idx, asset_name)
}

impl CanvasState {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Selection (mutually exclusive) ---

    pub fn set_selected_icon(&mut self, index: Option<usize>) {
        self.selected_icon_index = index;
        self.selected_color_key = None;
        self.selected_asset_path = None;
    }

    pub fn set_selected_color_key(&mut self, key: Option<String>) {
        self.selected_color_key = key;
        self.selected_icon_index = None;
        self.selected_asset_path = None;
    }

    pub fn set_selected_asset_path(&mut self, path: Option<String>) {
        self.selected_asset_path = path;
        self.selected_icon_index = None;
        self.selected_color_key = None;
    }

    pub fn selected_icon_index(&self) -> Option<usize> {
        self.selected_icon_index
    }

    pub fn selected_color_key(&self) -> Option<&str> {
        self.selected_color_key.as_deref()
    }

    pub fn selected_asset_path(&self) -> Option<&str> {
        self.selected_asset_path.as_deref()
    }

    // --- Navigation (never dirties the workspace) ---

    pub fn set_hovered_asset_name(&mut self, name: Option<String>) {
        self.hovered_asset_name = name;
    }

    pub fn hovered_asset_name(&self) -> Option<&str> {
        self.hovered_asset_name.as_deref()
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom;
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn set_active_tab(&mut self, tab: impl Into<String>) {
        self.active_tab = tab.into();
    }

    pub fn active_tab(&self) -> &str {
        &self.active_tab
    }

    pub fn set_active_screen_idx(&mut self, idx: usize) {
        self.active_screen_idx = idx;
    }

    pub fn active_screen_idx(&self) -> usize {
        self.active_screen_idx
    }

    pub fn set_asset_filter(&mut self, filter: AssetFilter) {
        self.asset_filter = filter;
    }

    pub fn asset_filter(&self) -> AssetFilter {
        self.asset_filter
    }

    pub fn set_canvas_mode(&mut self, mode: CanvasMode) {
        self.canvas_mode = mode;
    }

    pub fn canvas_mode(&self) -> CanvasMode {
        self.canvas_mode
    }

    pub fn set_screen_list_mode(&mut self, mode: ScreenListMode) {
        self.screen_list_mode = mode;
    }

    pub fn screen_list_mode(&self) -> ScreenListMode {
        self.screen_list_mode
    }

    // --- Workspace flags (dirty the workspace) ---

    pub fn set_snap_to_grid(&mut self, snap: bool) {
        self.snap_to_grid = snap;
        self.mark_dirty();
    }

    pub fn snap_to_grid(&self) -> bool {
        self.snap_to_grid
    }

    pub fn set_grid_size(&mut self, size: u32) {
        self.grid_size = size;
        self.mark_dirty();
    }

    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    pub fn set_allow_dnd(&mut self, allow: bool) {
        self.allow_dnd = allow;
        self.mark_dirty();
    }

    pub fn allow_dnd(&self) -> bool {
        self.allow_dnd
    }

    // --- Sprite animation config (dirty, undoable) ---

    pub fn set_icon_frame(&mut self, screen_idx: usize, asset_name: &str, frame: u32) {
        self.icon_frames
            .entry(screen_idx)
            .or_default()
            .insert(asset_name.to_string(), frame);
        self.mark_dirty();
    }

    /// Current frame for an asset on a screen; 0 when unset
    pub fn icon_frame(&self, screen_idx: usize, asset_name: &str) -> u32 {
        self.icon_frames
            .get(&screen_idx)
            .and_then(|m| m.get(asset_name))
            .copied()
            .unwrap_or(0)
    }

    pub fn set_icon_frame_count(&mut self, screen_idx: usize, asset_name: &str, count: u32) {
        self.icon_frame_counts
            .entry(screen_idx)
            .or_default()
            .insert(asset_name.to_string(), count);
        self.mark_dirty();
    }

    /// Frame count for an asset on a screen; 1 when unset
    pub fn icon_frame_count(&self, screen_idx: usize, asset_name: &str) -> u32 {
        self.icon_frame_counts
            .get(&screen_idx)
            .and_then(|m| m.get(asset_name))
            .copied()
            .unwrap_or(1)
    }

    pub fn set_icon_orientation(
        &mut self,
        screen_idx: usize,
        asset_name: &str,
        orientation: Orientation,
    ) {
        self.icon_orientations
            .entry(screen_idx)
            .or_default()
            .insert(asset_name.to_string(), orientation);
        self.mark_dirty();
    }

    /// Strip orientation for an asset on a screen; vertical when unset
    pub fn icon_orientation(&self, screen_idx: usize, asset_name: &str) -> Orientation {
        self.icon_orientations
            .get(&screen_idx)
            .and_then(|m| m.get(asset_name))
            .copied()
            .unwrap_or_default()
    }

    pub fn set_selected_state(
        &mut self,
        screen_idx: usize,
        asset_name: &str,
        state_idx: Option<usize>,
    ) {
        self.selected_states
            .insert(state_key(screen_idx, asset_name), state_idx);
        self.mark_dirty();
    }

    /// Active state preview for an asset on a screen; `None` when unset
    pub fn selected_state(&self, screen_idx: usize, asset_name: &str) -> Option<usize> {
        self.selected_states
            .get(&state_key(screen_idx, asset_name))
            .copied()
            .flatten()
    }

    // --- Auto-save ---

    /// Enable/disable auto-save, persisting the choice to the per-user store
    pub fn set_auto_save_enabled(&mut self, enabled: bool, app: &mut AppSettings) {
        self.auto_save_enabled = enabled;
        if !enabled {
            self.autosave.cancel();
        }
        app.set_auto_save_enabled(enabled);
        if let Err(e) = app.save() {
            warn!("Failed to persist auto-save setting: {:#}", e);
        }
    }

    pub fn auto_save_enabled(&self) -> bool {
        self.auto_save_enabled
    }

    /// Set the debounce interval (clamped to 1-60 seconds), persisting it
    pub fn set_auto_save_interval(&mut self, interval_ms: u64, app: &mut AppSettings) {
        let clamped = interval_ms.clamp(MIN_AUTO_SAVE_INTERVAL_MS, MAX_AUTO_SAVE_INTERVAL_MS);
        self.auto_save_interval_ms = clamped;
        app.set_auto_save_interval(clamped);
        if let Err(e) = app.save() {
            warn!("Failed to persist auto-save interval: {:#}", e);
        }
    }

    pub fn auto_save_interval_ms(&self) -> u64 {
        self.auto_save_interval_ms
    }

    /// True once the quiet interval has elapsed since the last edit.
    /// Reports at most once per armed deadline; the caller runs
    /// [`CanvasState::save_workspace`] in response.
    pub fn autosave_due(&mut self, now: Instant) -> bool {
        if !self.auto_save_enabled {
            return false;
        }
        self.autosave.poll(now)
    }

    // --- Dirty flag ---

    pub fn has_unsaved_changes(&self) -> bool {
        self.has_unsaved_changes
    }

    pub fn set_has_unsaved_changes(&mut self, dirty: bool) {
        if dirty {
            self.mark_dirty();
        } else {
            self.has_unsaved_changes = false;
            self.autosave.cancel();
        }
    }

    fn mark_dirty(&mut self) {
        self.has_unsaved_changes = true;
        if self.auto_save_enabled {
            self.autosave.rearm(
                Instant::now(),
                Duration::from_millis(self.auto_save_interval_ms),
            );
        }
    }

    // --- History snapshot interface ---

    /// Deep copy of the undoable canvas fields
    pub fn snapshot(&self) -> CanvasSnapshot {
        CanvasSnapshot {
            icon_frames: self.icon_frames.clone(),
            icon_frame_counts: self.icon_frame_counts.clone(),
            icon_orientations: self.icon_orientations.clone(),
            selected_states: self.selected_states.clone(),
        }
    }

    /// Replace the undoable fields from a history snapshot.
    /// Does not touch the dirty flag: time travel is not a workspace edit.
    pub fn restore(&mut self, snapshot: &CanvasSnapshot) {
        self.icon_frames = snapshot.icon_frames.clone();
        self.icon_frame_counts = snapshot.icon_frame_counts.clone();
        self.icon_orientations = snapshot.icon_orientations.clone();
        self.selected_states = snapshot.selected_states.clone();
    }

    // --- Workspace persistence ---

    /// Write both companion config files. Clears the dirty flag on success.
    pub fn save_workspace(
        &mut self,
        project: &ProjectState,
        history: &HistoryEngine,
        notices: &mut Notices,
    ) -> bool {
        let Some(base_dir) = project.base_dir().map(PathBuf::from) else {
            return false;
        };

        let mut sprite_assets = BTreeMap::new();
        if let Some(doc) = project.document() {
            for obj in &doc.objects {
                if obj.is_sprite {
                    sprite_assets.insert(obj.name.clone(), true);
                }
            }
        }

        let canvas_config = CanvasConfig {
            sprite_assets,
            screens: crate::settings::ScreenMaps {
                icon_frames: self.icon_frames.clone(),
                icon_frame_counts: self.icon_frame_counts.clone(),
                icon_orientations: self.icon_orientations.clone(),
            },
            selected_states: self.selected_states.clone(),
        };

        let settings = ProjectSettings {
            snap_to_grid: self.snap_to_grid,
            grid_size: self.grid_size,
            allow_dnd: self.allow_dnd,
            auto_save_enabled: self.auto_save_enabled,
            auto_save_interval: self.auto_save_interval_ms,
            history_max_steps: history.max_steps(),
            last_modified: now_millis(),
        };

        let result = canvas_config
            .save(&base_dir)
            .and_then(|_| settings.save(&base_dir));

        match result {
            Ok(()) => {
                self.has_unsaved_changes = false;
                self.autosave.cancel();
                notices.success("Workspace saved");
                true
            }
            Err(e) => {
                notices.error(format!("Save failed: {:#}", e));
                false
            }
        }
    }

    /// Write the workspace only when there are unsaved changes.
    /// Best-effort teardown flush; no durability guarantee.
    pub fn flush_if_dirty(
        &mut self,
        project: &ProjectState,
        history: &HistoryEngine,
        notices: &mut Notices,
    ) -> bool {
        if self.has_unsaved_changes {
            self.save_workspace(project, history, notices)
        } else {
            false
        }
    }

    /// Load both companion files, tolerating absence, then reinitialize the
    /// history engine with the recovered retention bound. Project-local
    /// settings win; the per-user store only fills absent auto-save values.
    pub fn load_workspace(
        &mut self,
        base_dir: &Path,
        app: &AppSettings,
        history: &mut HistoryEngine,
    ) {
        if let Some(config) = CanvasConfig::load(base_dir) {
            self.icon_frames = config.screens.icon_frames;
            self.icon_frame_counts = config.screens.icon_frame_counts;
            self.icon_orientations = config.screens.icon_orientations;
            self.selected_states = config.selected_states;
        }

        let max_steps = match ProjectSettings::load(base_dir) {
            Some(settings) => {
                self.snap_to_grid = settings.snap_to_grid;
                self.grid_size = settings.grid_size;
                self.allow_dnd = settings.allow_dnd;
                self.auto_save_enabled = settings.auto_save_enabled;
                self.auto_save_interval_ms = settings.auto_save_interval;
                settings.history_max_steps
            }
            None => {
                self.auto_save_enabled = app.auto_save_enabled().unwrap_or(true);
                self.auto_save_interval_ms = app
                    .auto_save_interval()
                    .unwrap_or(DEFAULT_AUTO_SAVE_INTERVAL_MS);
                crate::history::DEFAULT_MAX_STEPS
            }
        };

        self.has_unsaved_changes = false;
        self.autosave.cancel();

        history.initialize(Some(base_dir), Some(max_steps));
    }

    /// Clear selection/animation/unsaved state and close the project's history
    pub fn reset_canvas(&mut self, history: &mut HistoryEngine) {
        history.close_project();
        self.selected_icon_index = None;
        self.selected_color_key = None;
        self.selected_asset_path = None;
        self.selected_states.clear();
        self.icon_frames.clear();
        self.icon_frame_counts.clear();
        self.icon_orientations.clear();
        self.zoom = DEFAULT_ZOOM;
        self.search_query.clear();
        self.active_tab = DEFAULT_TAB.to_string();
        self.active_screen_idx = 0;
        self.has_unsaved_changes = false;
        self.autosave.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_is_mutually_exclusive() {
        let mut canvas = CanvasState::new();
        canvas.set_selected_icon(Some(3));
        assert_eq!(canvas.selected_icon_index(), Some(3));

        canvas.set_selected_color_key(Some("ACCENT".into()));
        assert_eq!(canvas.selected_icon_index(), None);
        assert_eq!(canvas.selected_color_key(), Some("ACCENT"));

        canvas.set_selected_asset_path(Some("icons/gear.png".into()));
        assert_eq!(canvas.selected_color_key(), None);
        assert_eq!(canvas.selected_asset_path(), Some("icons/gear.png"));
    }

    #[test]
    fn navigation_setters_do_not_dirty() {
        let mut canvas = CanvasState::new();
        canvas.set_selected_icon(Some(0));
        canvas.set_zoom(1.5);
        canvas.set_search_query("gear");
        canvas.set_active_tab("objects");
        canvas.set_active_screen_idx(2);
        assert!(!canvas.has_unsaved_changes());
    }

    #[test]
    fn workspace_setters_dirty() {
        let mut canvas = CanvasState::new();
        canvas.set_snap_to_grid(true);
        assert!(canvas.has_unsaved_changes());

        let mut canvas = CanvasState::new();
        canvas.set_icon_frame_count(0, "anim", 8);
        assert!(canvas.has_unsaved_changes());

        let mut canvas = CanvasState::new();
        canvas.set_selected_state(0, "gear", Some(1));
        assert!(canvas.has_unsaved_changes());
    }

    #[test]
    fn sparse_maps_have_defaults() {
        let canvas = CanvasState::new();
        assert_eq!(canvas.icon_frame(0, "anim"), 0);
        assert_eq!(canvas.icon_frame_count(0, "anim"), 1);
        assert_eq!(canvas.icon_orientation(0, "anim"), Orientation::Vertical);
        assert_eq!(canvas.selected_state(0, "anim"), None);
    }

    #[test]
    fn interval_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = AppSettings::load_from(dir.path().join("settings.json"));
        let mut canvas = CanvasState::new();

        canvas.set_auto_save_interval(10, &mut app);
        assert_eq!(canvas.auto_save_interval_ms(), MIN_AUTO_SAVE_INTERVAL_MS);

        canvas.set_auto_save_interval(600_000, &mut app);
        assert_eq!(canvas.auto_save_interval_ms(), MAX_AUTO_SAVE_INTERVAL_MS);
    }

    #[test]
    fn autosave_timer_debounces() {
        let mut timer = AutoSaveTimer::default();
        let start = Instant::now();
        let interval = Duration::from_secs(10);

        timer.rearm(start, interval);
        assert!(!timer.poll(start + Duration::from_secs(5)));

        // A new edit postpones the deadline
        timer.rearm(start + Duration::from_secs(5), interval);
        assert!(!timer.poll(start + Duration::from_secs(12)));
        assert!(timer.poll(start + Duration::from_secs(15)));

        // Fires at most once per arm
        assert!(!timer.poll(start + Duration::from_secs(16)));
    }

    #[test]
    fn edits_arm_the_autosave_timer() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = AppSettings::load_from(dir.path().join("settings.json"));
        let mut canvas = CanvasState::new();
        canvas.set_auto_save_interval(1_000, &mut app);

        canvas.set_snap_to_grid(true);
        assert!(!canvas.autosave_due(Instant::now()));
        assert!(canvas.autosave_due(Instant::now() + Duration::from_secs(2)));
        assert!(!canvas.autosave_due(Instant::now() + Duration::from_secs(3)));
    }

    #[test]
    fn autosave_never_fires_while_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = AppSettings::load_from(dir.path().join("settings.json"));
        let mut canvas = CanvasState::new();
        canvas.set_auto_save_enabled(false, &mut app);

        canvas.set_snap_to_grid(true);
        assert!(canvas.has_unsaved_changes());
        assert!(!canvas.autosave_due(Instant::now() + Duration::from_secs(60)));
    }

    #[test]
    fn snapshot_restore_round_trip() {
        let mut canvas = CanvasState::new();
        canvas.set_icon_frame(0, "anim", 3);
        canvas.set_icon_orientation(1, "anim", Orientation::Horizontal);
        canvas.set_selected_state(0, "gear", Some(2));

        let snapshot = canvas.snapshot();

        canvas.set_icon_frame(0, "anim", 7);
        canvas.set_selected_state(0, "gear", None);
        canvas.restore(&snapshot);

        assert_eq!(canvas.icon_frame(0, "anim"), 3);
        assert_eq!(canvas.selected_state(0, "gear"), Some(2));
        assert_eq!(canvas.icon_orientation(1, "anim"), Orientation::Horizontal);
    }

    #[test]
    fn snapshots_are_independent_copies() {
        let mut canvas = CanvasState::new();
        canvas.set_icon_frame(0, "anim", 3);
        let snapshot = canvas.snapshot();

        canvas.set_icon_frame(0, "anim", 9);
        assert_eq!(snapshot.icon_frames[&0]["anim"], 3);
    }
}
