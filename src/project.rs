//! Project store - owns the live document and every mutation operation.
//!
//! Mutations are synchronous, validate their inputs, and degrade to no-ops on
//! stale indices. Operations that represent a user-meaningful edit return an
//! [`Edit`] label; recording it in history is the caller's decision, which is
//! what lets a drag stream transient [`ProjectState::update_icon`] patches and
//! commit a single entry at gesture end.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::canvas::CanvasState;
use crate::document::{
    is_background_path, load_document, normalize_color_hex, normalize_color_key, AssetKind,
    AssetObject, IconInstance, IconState, ProjectDocument, Screen,
};
use crate::notify::Notices;
use crate::scan::AssetScanner;
use crate::settings::CanvasConfig;

/// Label for a committed, history-worthy edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub description: String,
}

impl Edit {
    fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// Outcome of [`ProjectState::rename_instance`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// Renamed; record the edit
    Renamed(Edit),
    /// Name unchanged; success with nothing to record
    Unchanged,
    /// Collision or stale index; nothing changed
    Rejected,
}

impl RenameOutcome {
    pub fn succeeded(&self) -> bool {
        !matches!(self, RenameOutcome::Rejected)
    }
}

/// Conversion target for [`ProjectState::convert_asset_type`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetType {
    Icon,
    Sprite,
}

#[derive(Debug, Clone, Default)]
pub struct ScreenPatch {
    pub name: Option<String>,
    pub background: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IconPatch {
    pub x: Option<i32>,
    pub y: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub name: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AssetPatch {
    pub path: Option<String>,
}

/// Optional overrides for [`ProjectState::add_instance`]
#[derive(Debug, Clone, Default)]
pub struct InstanceOptions {
    pub name: Option<String>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub states: Option<Vec<IconState>>,
}

/// The document store
#[derive(Debug, Default)]
pub struct ProjectState {
    document: Option<ProjectDocument>,
    project_path: Option<PathBuf>,
    base_dir: Option<PathBuf>,
    scanned_files: Vec<String>,
}

impl ProjectState {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Lifecycle ---

    /// Replace the whole document (a load, not an edit - no history label).
    ///
    /// Synthesizes one default screen into an empty screen list and merges
    /// sprite flags from the workspace config; a missing or unreadable config
    /// silently leaves every flag false.
    pub fn set_project(&mut self, path: &Path, mut document: ProjectDocument) {
        if document.screens.is_empty() {
            document.screens.push(Screen::default());
        }

        let base_dir = path.parent().map(PathBuf::from);
        if let Some(base) = &base_dir {
            if let Some(config) = CanvasConfig::load(base) {
                for obj in &mut document.objects {
                    obj.is_sprite = config.sprite_assets.get(&obj.name).copied().unwrap_or(false);
                }
            }
        }

        self.document = Some(document);
        self.project_path = Some(path.to_path_buf());
        self.base_dir = base_dir;
        self.scanned_files.clear();
    }

    /// Read, validate, and install a document from disk
    pub fn open_project(&mut self, path: &Path) -> Result<()> {
        let document = load_document(path)?;
        self.set_project(path, document);
        Ok(())
    }

    /// Forget the open project
    pub fn close_project(&mut self) {
        self.document = None;
        self.project_path = None;
        self.base_dir = None;
        self.scanned_files.clear();
    }

    /// Write the document to its project path.
    ///
    /// The saved form strips sprite flags, re-resolves each `Type` from the
    /// asset path, and orders objects backgrounds-first, sprites-last.
    pub fn save_project(&self, notices: &mut Notices) -> bool {
        let (Some(doc), Some(path)) = (&self.document, &self.project_path) else {
            return false;
        };

        match write_document(doc, path) {
            Ok(()) => {
                notices.success("Project saved");
                true
            }
            Err(e) => {
                notices.error(format!("Save failed: {:#}", e));
                false
            }
        }
    }

    /// Refresh the scanned asset file list via the scan collaborator
    pub fn scan_directory(&mut self, scanner: &dyn AssetScanner) {
        let Some(base_dir) = &self.base_dir else {
            return;
        };
        match scanner.scan(base_dir) {
            Ok(files) => self.scanned_files = files,
            Err(e) => {
                warn!("Failed to scan project assets: {:#}", e);
                self.scanned_files.clear();
            }
        }
    }

    /// Install an externally produced scan result
    pub fn set_scanned_files(&mut self, files: Vec<String>) {
        self.scanned_files = files;
    }

    // --- Accessors ---

    pub fn document(&self) -> Option<&ProjectDocument> {
        self.document.as_ref()
    }

    pub fn project_path(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    pub fn scanned_files(&self) -> &[String] {
        &self.scanned_files
    }

    /// Replace the document without touching paths or scan state.
    /// History restore runs through here; never a user edit.
    pub fn restore_document(&mut self, document: ProjectDocument) {
        self.document = Some(document);
    }

    /// True when no icon instance on any screen carries this name
    pub fn is_name_unique(&self, name: &str) -> bool {
        match &self.document {
            Some(doc) => !doc
                .screens
                .iter()
                .any(|s| s.icons.iter().any(|ic| ic.name == name)),
            None => true,
        }
    }

    /// Every `(screen_idx, icon_idx)` placement of an asset
    pub fn asset_instances(&self, asset_name: &str) -> Vec<(usize, usize)> {
        let Some(doc) = &self.document else {
            return Vec::new();
        };
        let mut instances = Vec::new();
        for (screen_idx, screen) in doc.screens.iter().enumerate() {
            for (icon_idx, icon) in screen.icons.iter().enumerate() {
                if icon.name == asset_name {
                    instances.push((screen_idx, icon_idx));
                }
            }
        }
        instances
    }

    fn icon_mut(&mut self, screen_idx: usize, icon_idx: usize) -> Option<&mut IconInstance> {
        self.document
            .as_mut()?
            .screens
            .get_mut(screen_idx)?
            .icons
            .get_mut(icon_idx)
    }

    // --- Screens ---

    pub fn update_screen(&mut self, screen_idx: usize, patch: ScreenPatch) -> Option<Edit> {
        let screen = self.document.as_mut()?.screens.get_mut(screen_idx)?;
        if let Some(name) = patch.name {
            screen.name = name;
        }
        if let Some(background) = patch.background {
            screen.background = background;
        }
        Some(Edit::new("Updated screen"))
    }

    pub fn add_screen(&mut self) -> Option<Edit> {
        let doc = self.document.as_mut()?;
        let number = doc.screens.len() + 1;
        doc.screens.push(Screen::new(format!("SCREEN_{}", number)));
        Some(Edit::new("Added screen"))
    }

    /// Insert a copy immediately after the source screen
    pub fn duplicate_screen(&mut self, index: usize) -> Option<Edit> {
        let doc = self.document.as_mut()?;
        let mut copy = doc.screens.get(index)?.clone();
        copy.name = format!("{} Copy", copy.name);
        doc.screens.insert(index + 1, copy);
        Some(Edit::new("Duplicated screen"))
    }

    /// Remove a screen; the last remaining screen is never deleted
    pub fn delete_screen(&mut self, index: usize, notices: &mut Notices) -> Option<Edit> {
        let doc = self.document.as_mut()?;
        if index >= doc.screens.len() {
            return None;
        }
        if doc.screens.len() == 1 {
            notices.error("Cannot delete the last screen");
            return None;
        }
        doc.screens.remove(index);
        Some(Edit::new("Deleted screen"))
    }

    // --- Colors ---

    pub fn add_color(&mut self, name: &str, hex: &str) -> Option<Edit> {
        let doc = self.document.as_mut()?;
        doc.colors
            .insert(normalize_color_key(name), normalize_color_hex(hex));
        Some(Edit::new(format!("Added color \"{}\"", name)))
    }

    /// Rename and/or recolor a palette entry. The old key is removed only
    /// when it differs from the new one.
    pub fn update_color(&mut self, old_name: &str, new_name: &str, hex: &str) -> Option<Edit> {
        let doc = self.document.as_mut()?;
        if old_name != new_name {
            doc.colors.remove(old_name);
        }
        doc.colors
            .insert(normalize_color_key(new_name), normalize_color_hex(hex));
        Some(Edit::new(format!("Updated color \"{}\"", new_name)))
    }

    /// Remove a palette entry. Icon states referencing the key keep it
    /// dangling and render with the consumer's fallback color.
    pub fn delete_color(&mut self, name: &str) -> Option<Edit> {
        let doc = self.document.as_mut()?;
        doc.colors.remove(name)?;
        Some(Edit::new(format!("Deleted color \"{}\"", name)))
    }

    // --- Icons ---

    /// Raw positional patch. Used for transient drag updates; never yields a
    /// history label (commit the gesture via
    /// [`ProjectState::commit_icon_position`]).
    pub fn update_icon(&mut self, screen_idx: usize, icon_idx: usize, patch: IconPatch) -> bool {
        let Some(icon) = self.icon_mut(screen_idx, icon_idx) else {
            return false;
        };
        if let Some(x) = patch.x {
            icon.x = x;
        }
        if let Some(y) = patch.y {
            icon.y = y;
        }
        true
    }

    /// Commit an icon position at gesture end, clamped into display bounds
    pub fn commit_icon_position(
        &mut self,
        screen_idx: usize,
        icon_idx: usize,
        x: i32,
        y: i32,
    ) -> Option<Edit> {
        let doc = self.document.as_ref()?;
        let max_x = doc.display_width as i32 - 1;
        let max_y = doc.display_height as i32 - 1;

        let icon = self.icon_mut(screen_idx, icon_idx)?;
        icon.x = x.clamp(0, max_x);
        icon.y = y.clamp(0, max_y);
        let name = icon.name.clone();
        Some(Edit::new(format!("Moved \"{}\"", name)))
    }

    pub fn add_icon_state(&mut self, screen_idx: usize, icon_idx: usize) -> Option<Edit> {
        let icon = self.icon_mut(screen_idx, icon_idx)?;
        icon.states.push(IconState::new("NEW_STATE", "WHITE"));
        Some(Edit::new("Added icon state"))
    }

    pub fn update_icon_state(
        &mut self,
        screen_idx: usize,
        icon_idx: usize,
        state_idx: usize,
        patch: StatePatch,
    ) -> Option<Edit> {
        let state = self.icon_mut(screen_idx, icon_idx)?.states.get_mut(state_idx)?;
        if let Some(name) = patch.name {
            state.name = name;
        }
        if let Some(color) = patch.color {
            state.color = color;
        }
        Some(Edit::new("Updated icon state"))
    }

    pub fn delete_icon_state(
        &mut self,
        screen_idx: usize,
        icon_idx: usize,
        state_idx: usize,
    ) -> Option<Edit> {
        let states = &mut self.icon_mut(screen_idx, icon_idx)?.states;
        if state_idx >= states.len() {
            return None;
        }
        states.remove(state_idx);
        Some(Edit::new("Deleted icon state"))
    }

    // --- Instances ---

    /// Place a new instance of an asset on a screen.
    ///
    /// Rejects a taken name. When no AssetObject exists under the instance
    /// name yet, one is cloned from the source asset - sprite flag included,
    /// so a new instance of a sprite stays a sprite.
    pub fn add_instance(
        &mut self,
        screen_idx: usize,
        asset_name: &str,
        options: InstanceOptions,
        notices: &mut Notices,
    ) -> Option<Edit> {
        let doc = self.document.as_ref()?;
        if screen_idx >= doc.screens.len() {
            return None;
        }

        let instance_name = options
            .name
            .clone()
            .unwrap_or_else(|| asset_name.to_string());
        if !self.is_name_unique(&instance_name) {
            notices.error(format!("Name \"{}\" already exists", instance_name));
            return None;
        }

        let source = self
            .document
            .as_ref()
            .and_then(|d| d.object(asset_name))
            .cloned();

        let doc = self.document.as_mut()?;
        doc.screens[screen_idx].icons.push(IconInstance {
            name: instance_name.clone(),
            x: options.x.unwrap_or(0),
            y: options.y.unwrap_or(0),
            states: options
                .states
                .unwrap_or_else(|| vec![IconState::new("DEFAULT", "PURE_WHITE")]),
        });

        if doc.object(&instance_name).is_none() {
            if let Some(asset) = source {
                doc.objects.push(AssetObject {
                    name: instance_name.clone(),
                    ..asset
                });
            }
        }

        notices.success(format!("Instance \"{}\" created", instance_name));
        Some(Edit::new(format!("Added instance \"{}\"", instance_name)))
    }

    /// Rename an instance and its matching AssetObject together
    pub fn rename_instance(
        &mut self,
        screen_idx: usize,
        icon_idx: usize,
        new_name: &str,
        notices: &mut Notices,
    ) -> RenameOutcome {
        let Some(old_name) = self
            .document
            .as_ref()
            .and_then(|d| d.screens.get(screen_idx))
            .and_then(|s| s.icons.get(icon_idx))
            .map(|ic| ic.name.clone())
        else {
            return RenameOutcome::Rejected;
        };

        if old_name == new_name {
            return RenameOutcome::Unchanged;
        }
        if !self.is_name_unique(new_name) {
            notices.error(format!("Name \"{}\" already exists", new_name));
            return RenameOutcome::Rejected;
        }

        if let Some(doc) = self.document.as_mut() {
            if let Some(icon) = doc
                .screens
                .get_mut(screen_idx)
                .and_then(|s| s.icons.get_mut(icon_idx))
            {
                icon.name = new_name.to_string();
            }
            for obj in &mut doc.objects {
                if obj.name == old_name {
                    obj.name = new_name.to_string();
                }
            }
        }

        notices.success(format!("Renamed to \"{}\"", new_name));
        RenameOutcome::Renamed(Edit::new(format!("Renamed to \"{}\"", new_name)))
    }

    /// Clone an instance under a generated `_copy` name, offset +20/+20
    pub fn duplicate_icon(
        &mut self,
        screen_idx: usize,
        icon_idx: usize,
        notices: &mut Notices,
    ) -> Option<Edit> {
        let icon = self
            .document
            .as_ref()?
            .screens
            .get(screen_idx)?
            .icons
            .get(icon_idx)?
            .clone();

        let mut new_name = format!("{}_copy", icon.name);
        let mut counter = 1;
        while !self.is_name_unique(&new_name) {
            new_name = format!("{}_copy{}", icon.name, counter);
            counter += 1;
        }

        let source = self
            .document
            .as_ref()
            .and_then(|d| d.object(&icon.name))
            .cloned();

        let doc = self.document.as_mut()?;
        doc.screens[screen_idx].icons.push(IconInstance {
            name: new_name.clone(),
            x: icon.x + 20,
            y: icon.y + 20,
            states: if icon.states.is_empty() {
                vec![IconState::new("DEFAULT", "PURE_WHITE")]
            } else {
                icon.states.clone()
            },
        });
        if let Some(asset) = source {
            doc.objects.push(AssetObject {
                name: new_name.clone(),
                ..asset
            });
        }

        notices.success(format!("Duplicated as \"{}\"", new_name));
        Some(Edit::new(format!("Duplicated \"{}\"", icon.name)))
    }

    /// Remove an instance; the AssetObject goes too unless another screen
    /// still references the name
    pub fn delete_icon(
        &mut self,
        screen_idx: usize,
        icon_idx: usize,
        notices: &mut Notices,
    ) -> Option<Edit> {
        let doc = self.document.as_mut()?;
        let screen = doc.screens.get_mut(screen_idx)?;
        if icon_idx >= screen.icons.len() {
            return None;
        }
        let name = screen.icons.remove(icon_idx).name;

        let used_elsewhere = doc
            .screens
            .iter()
            .enumerate()
            .any(|(si, s)| si != screen_idx && s.icons.iter().any(|ic| ic.name == name));
        if !used_elsewhere {
            doc.objects.retain(|o| o.name != name);
        }

        notices.success(format!("Removed \"{}\"", name));
        Some(Edit::new(format!("Deleted \"{}\"", name)))
    }

    // --- Assets ---

    pub fn update_object(&mut self, name: &str, patch: AssetPatch) -> bool {
        let Some(doc) = self.document.as_mut() else {
            return false;
        };
        let Some(obj) = doc.objects.iter_mut().find(|o| o.name == name) else {
            return false;
        };
        if let Some(path) = patch.path {
            obj.path = path;
            obj.kind = AssetKind::from_path(&obj.path);
        }
        true
    }

    pub fn add_object(&mut self, object: AssetObject) -> bool {
        let Some(doc) = self.document.as_mut() else {
            return false;
        };
        doc.objects.push(object);
        true
    }

    /// Remove an asset and cascade: every instance referencing it goes, and
    /// any screen background pointing at it is cleared
    pub fn delete_object(&mut self, name: &str) -> Option<Edit> {
        let doc = self.document.as_mut()?;
        let before = doc.objects.len();
        doc.objects.retain(|o| o.name != name);
        if doc.objects.len() == before {
            return None;
        }

        for screen in &mut doc.screens {
            screen.icons.retain(|ic| ic.name != name);
            if screen.background == name {
                screen.background.clear();
            }
        }

        Some(Edit::new(format!("Deleted asset \"{}\"", name)))
    }

    /// Toggle the sprite flag. The flag lives in the workspace config, so
    /// the canvas store is marked dirty rather than the document file.
    pub fn convert_asset_type(
        &mut self,
        asset_name: &str,
        target: AssetType,
        canvas: &mut CanvasState,
        notices: &mut Notices,
    ) -> Option<Edit> {
        let doc = self.document.as_mut()?;
        let obj = doc.objects.iter_mut().find(|o| o.name == asset_name)?;
        obj.is_sprite = target == AssetType::Sprite;

        canvas.set_has_unsaved_changes(true);

        let label = match target {
            AssetType::Sprite => "sprite",
            AssetType::Icon => "icon",
        };
        notices.success(format!("Converted to {}", label));
        Some(Edit::new(format!("Converted \"{}\" to {}", asset_name, label)))
    }

    /// Register every scanned path not already present as an AssetObject.
    /// Consumes the scan list; returns how many were added.
    pub fn register_all_assets(&mut self) -> usize {
        let Some(doc) = self.document.as_mut() else {
            return 0;
        };
        if self.scanned_files.is_empty() {
            return 0;
        }

        let existing: HashSet<String> = doc.objects.iter().map(|o| o.path.clone()).collect();
        let mut added = 0;
        for path in std::mem::take(&mut self.scanned_files) {
            if !existing.contains(&path) {
                let name = asset_name_from_path(&path);
                doc.objects.push(AssetObject::new(name, path));
                added += 1;
            }
        }
        added
    }

    /// Register scanned paths and drop a default instance of each
    /// non-background asset onto the target screen. Returns the instance
    /// count.
    pub fn register_and_add_instances(
        &mut self,
        screen_idx: usize,
        notices: &mut Notices,
    ) -> usize {
        let Some(doc) = self.document.as_mut() else {
            return 0;
        };
        if self.scanned_files.is_empty() || screen_idx >= doc.screens.len() {
            return 0;
        }

        let existing: HashSet<String> = doc.objects.iter().map(|o| o.path.clone()).collect();
        let mut added = 0;
        for path in std::mem::take(&mut self.scanned_files) {
            if existing.contains(&path) {
                continue;
            }
            let name = asset_name_from_path(&path);
            let background = is_background_path(&path);
            doc.objects.push(AssetObject::new(name.clone(), path));

            if !background {
                doc.screens[screen_idx].icons.push(IconInstance {
                    name: name.to_lowercase(),
                    x: 0,
                    y: 0,
                    states: vec![IconState::new("OFF", "PURE_BLANK")],
                });
                added += 1;
            }
        }

        notices.success(format!(
            "Added {} instance{} to screen",
            added,
            if added == 1 { "" } else { "s" }
        ));
        added
    }
}

/// Last path component with its extension stripped; the whole path when that
/// leaves nothing
fn asset_name_from_path(path: &str) -> String {
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
    if stem.is_empty() {
        path.to_string()
    } else {
        stem.to_string()
    }
}

fn save_order(path: &str) -> u8 {
    let lowered = path.to_lowercase();
    if lowered.contains("backgrounds") {
        0
    } else if lowered.contains("sprites") {
        2
    } else {
        1
    }
}

fn write_document(doc: &ProjectDocument, path: &Path) -> Result<()> {
    let mut save_doc = doc.clone();
    for obj in &mut save_doc.objects {
        obj.kind = AssetKind::from_path(&obj.path);
        obj.is_sprite = false;
    }
    save_doc.objects.sort_by_key(|o| save_order(&o.path));

    let content = save_doc.to_json_pretty()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to save to {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Severity;

    fn project_with_assets() -> ProjectState {
        let mut doc = ProjectDocument::new(320, 240);
        doc.objects.push(AssetObject::new("gear", "icons/gear.png"));
        doc.objects.push(AssetObject::new("sky", "backgrounds/sky.png"));
        let mut project = ProjectState::new();
        project.restore_document(doc);
        project
    }

    #[test]
    fn add_instance_places_icon_and_claims_name() {
        let mut project = project_with_assets();
        let mut notices = Notices::new();

        let edit = project.add_instance(
            0,
            "gear",
            InstanceOptions {
                name: Some("gear_1".into()),
                x: Some(10),
                y: Some(20),
                ..InstanceOptions::default()
            },
            &mut notices,
        );

        assert!(edit.is_some());
        assert!(!project.is_name_unique("gear_1"));

        let doc = project.document().unwrap();
        assert_eq!(doc.screens[0].icons.len(), 1);
        assert_eq!(doc.screens[0].icons[0].name, "gear_1");
        assert_eq!(doc.screens[0].icons[0].x, 10);
        assert_eq!(doc.screens[0].icons[0].y, 20);
        // AssetObject cloned under the instance name
        assert!(doc.object("gear_1").is_some());
    }

    #[test]
    fn add_instance_rejects_taken_name() {
        let mut project = project_with_assets();
        let mut notices = Notices::new();

        let options = InstanceOptions {
            name: Some("gear_1".into()),
            ..InstanceOptions::default()
        };
        assert!(project
            .add_instance(0, "gear", options.clone(), &mut notices)
            .is_some());
        notices.drain();

        assert!(project.add_instance(0, "gear", options, &mut notices).is_none());
        assert_eq!(project.document().unwrap().screens[0].icons.len(), 1);
        assert_eq!(notices.pending().len(), 1);
        assert_eq!(notices.pending()[0].severity, Severity::Error);
    }

    #[test]
    fn cloned_asset_inherits_sprite_flag() {
        let mut project = project_with_assets();
        if let Some(doc) = project.document.as_mut() {
            doc.objects[0].is_sprite = true;
        }
        let mut notices = Notices::new();

        project.add_instance(
            0,
            "gear",
            InstanceOptions {
                name: Some("gear_1".into()),
                ..InstanceOptions::default()
            },
            &mut notices,
        );

        assert!(project.document().unwrap().object("gear_1").unwrap().is_sprite);
    }

    #[test]
    fn rename_instance_updates_asset_too() {
        let mut project = project_with_assets();
        let mut notices = Notices::new();
        project.add_instance(
            0,
            "gear",
            InstanceOptions::default(),
            &mut notices,
        );

        let outcome = project.rename_instance(0, 0, "cog", &mut notices);
        assert!(matches!(outcome, RenameOutcome::Renamed(_)));

        let doc = project.document().unwrap();
        assert_eq!(doc.screens[0].icons[0].name, "cog");
        assert!(doc.object("cog").is_some());
        assert!(doc.object("gear").is_none());
    }

    #[test]
    fn rename_to_unchanged_name_is_quiet_success() {
        let mut project = project_with_assets();
        let mut notices = Notices::new();
        project.add_instance(0, "gear", InstanceOptions::default(), &mut notices);
        notices.drain();

        let outcome = project.rename_instance(0, 0, "gear", &mut notices);
        assert_eq!(outcome, RenameOutcome::Unchanged);
        assert!(notices.is_empty());
    }

    #[test]
    fn rename_collision_across_screens_rejects() {
        let mut project = project_with_assets();
        let mut notices = Notices::new();
        project.add_screen();
        project.add_instance(0, "gear", InstanceOptions::default(), &mut notices);
        project.add_instance(
            1,
            "gear",
            InstanceOptions {
                name: Some("gear_b".into()),
                ..InstanceOptions::default()
            },
            &mut notices,
        );

        let outcome = project.rename_instance(1, 0, "gear", &mut notices);
        assert_eq!(outcome, RenameOutcome::Rejected);

        let doc = project.document().unwrap();
        assert_eq!(doc.screens[1].icons[0].name, "gear_b");
        assert!(doc.object("gear_b").is_some());
    }

    #[test]
    fn duplicate_icon_generates_unique_names() {
        let mut project = project_with_assets();
        let mut notices = Notices::new();
        project.add_instance(0, "gear", InstanceOptions::default(), &mut notices);

        project.duplicate_icon(0, 0, &mut notices).unwrap();
        project.duplicate_icon(0, 0, &mut notices).unwrap();

        let doc = project.document().unwrap();
        let names: Vec<_> = doc.screens[0].icons.iter().map(|ic| ic.name.as_str()).collect();
        assert_eq!(names, vec!["gear", "gear_copy", "gear_copy1"]);
        assert_eq!(doc.screens[0].icons[1].x, 20);
        assert!(doc.object("gear_copy").is_some());
    }

    #[test]
    fn delete_icon_cascades_unless_used_elsewhere() {
        let mut project = project_with_assets();
        let mut notices = Notices::new();
        project.add_instance(0, "gear", InstanceOptions::default(), &mut notices);
        project.duplicate_screen(0);

        // Both screens hold "gear"; deleting one keeps the asset
        project.delete_icon(0, 0, &mut notices).unwrap();
        assert!(project.document().unwrap().object("gear").is_some());
        assert!(!project.is_name_unique("gear"));

        // Last reference gone - asset follows
        project.delete_icon(1, 0, &mut notices).unwrap();
        assert!(project.document().unwrap().object("gear").is_none());
        assert!(project.is_name_unique("gear"));
    }

    #[test]
    fn delete_object_cascades_instances_and_backgrounds() {
        let mut project = project_with_assets();
        let mut notices = Notices::new();
        project.add_instance(0, "gear", InstanceOptions::default(), &mut notices);
        project.update_screen(
            0,
            ScreenPatch {
                background: Some("sky".into()),
                ..ScreenPatch::default()
            },
        );

        project.delete_object("sky").unwrap();
        assert_eq!(project.document().unwrap().screens[0].background, "");

        project.delete_object("gear").unwrap();
        assert!(project.document().unwrap().screens[0].icons.is_empty());
    }

    #[test]
    fn delete_color_leaves_dangling_state_keys() {
        let mut project = project_with_assets();
        let mut notices = Notices::new();
        project.add_color("accent", "#ff8800");
        project.add_instance(
            0,
            "gear",
            InstanceOptions {
                states: Some(vec![IconState::new("ON", "ACCENT")]),
                ..InstanceOptions::default()
            },
            &mut notices,
        );

        project.delete_color("ACCENT").unwrap();

        let doc = project.document().unwrap();
        assert!(!doc.colors.contains_key("ACCENT"));
        assert_eq!(doc.screens[0].icons[0].states[0].color, "ACCENT");
    }

    #[test]
    fn color_values_are_normalized() {
        let mut project = project_with_assets();
        project.add_color("accent", "#ff8800");
        assert_eq!(
            project.document().unwrap().colors.get("ACCENT").unwrap(),
            "#00ff8800"
        );

        project.update_color("ACCENT", "ACCENT", "#00112233");
        let doc = project.document().unwrap();
        assert_eq!(doc.colors.len(), 1);
        assert_eq!(doc.colors.get("ACCENT").unwrap(), "#00112233");
    }

    #[test]
    fn delete_missing_color_is_a_noop() {
        let mut project = project_with_assets();
        assert!(project.delete_color("NOPE").is_none());
    }

    #[test]
    fn last_screen_is_never_deleted() {
        let mut project = project_with_assets();
        let mut notices = Notices::new();

        assert!(project.delete_screen(0, &mut notices).is_none());
        assert_eq!(project.document().unwrap().screens.len(), 1);
        assert_eq!(notices.pending().len(), 1);
    }

    #[test]
    fn screens_get_sequential_default_names() {
        let mut project = project_with_assets();
        project.add_screen().unwrap();
        project.add_screen().unwrap();

        let doc = project.document().unwrap();
        assert_eq!(doc.screens[1].name, "SCREEN_2");
        assert_eq!(doc.screens[2].name, "SCREEN_3");
    }

    #[test]
    fn duplicate_screen_inserts_copy_after_source() {
        let mut project = project_with_assets();
        project.add_screen().unwrap();
        project.duplicate_screen(0).unwrap();

        let doc = project.document().unwrap();
        assert_eq!(doc.screens.len(), 3);
        assert_eq!(doc.screens[1].name, "Screen 1 Copy");
        assert_eq!(doc.screens[2].name, "SCREEN_2");
    }

    #[test]
    fn commit_clamps_into_display_bounds() {
        let mut project = project_with_assets();
        let mut notices = Notices::new();
        project.add_instance(0, "gear", InstanceOptions::default(), &mut notices);

        project.commit_icon_position(0, 0, -15, 400).unwrap();
        let icon = &project.document().unwrap().screens[0].icons[0];
        assert_eq!(icon.x, 0);
        assert_eq!(icon.y, 239);
    }

    #[test]
    fn transient_updates_skip_clamping() {
        let mut project = project_with_assets();
        let mut notices = Notices::new();
        project.add_instance(0, "gear", InstanceOptions::default(), &mut notices);

        assert!(project.update_icon(
            0,
            0,
            IconPatch {
                x: Some(-15),
                y: None
            }
        ));
        assert_eq!(project.document().unwrap().screens[0].icons[0].x, -15);
    }

    #[test]
    fn stale_indices_degrade_to_noops() {
        let mut project = project_with_assets();
        let mut notices = Notices::new();

        assert!(project.update_screen(9, ScreenPatch::default()).is_none());
        assert!(!project.update_icon(0, 9, IconPatch::default()));
        assert!(project.add_icon_state(0, 9).is_none());
        assert!(project.delete_icon(0, 9, &mut notices).is_none());
        assert!(project.duplicate_icon(9, 0, &mut notices).is_none());
    }

    #[test]
    fn icon_state_crud() {
        let mut project = project_with_assets();
        let mut notices = Notices::new();
        project.add_instance(0, "gear", InstanceOptions::default(), &mut notices);

        project.add_icon_state(0, 0).unwrap();
        {
            let states = &project.document().unwrap().screens[0].icons[0].states;
            assert_eq!(states.len(), 2);
            assert_eq!(states[1].name, "NEW_STATE");
            assert_eq!(states[1].color, "WHITE");
        }

        project
            .update_icon_state(
                0,
                0,
                1,
                StatePatch {
                    color: Some("ACCENT".into()),
                    ..StatePatch::default()
                },
            )
            .unwrap();
        assert_eq!(
            project.document().unwrap().screens[0].icons[0].states[1].color,
            "ACCENT"
        );

        project.delete_icon_state(0, 0, 0).unwrap();
        assert_eq!(project.document().unwrap().screens[0].icons[0].states.len(), 1);
    }

    #[test]
    fn register_all_assets_skips_known_paths() {
        let mut project = project_with_assets();
        project.set_scanned_files(vec![
            "icons/gear.png".into(),
            "icons/lamp.png".into(),
            "backgrounds/night.png".into(),
        ]);

        assert_eq!(project.register_all_assets(), 2);
        let doc = project.document().unwrap();
        assert!(doc.object("lamp").is_some());
        assert_eq!(doc.object("night").unwrap().kind, AssetKind::Bin);
        assert!(project.scanned_files().is_empty());
    }

    #[test]
    fn register_and_add_instances_skips_backgrounds() {
        let mut project = project_with_assets();
        let mut notices = Notices::new();
        project.set_scanned_files(vec![
            "icons/Lamp.png".into(),
            "backgrounds/night.png".into(),
        ]);

        assert_eq!(project.register_and_add_instances(0, &mut notices), 1);

        let doc = project.document().unwrap();
        assert!(doc.object("night").is_some());
        let icons = &doc.screens[0].icons;
        assert_eq!(icons.len(), 1);
        assert_eq!(icons[0].name, "lamp");
        assert_eq!(icons[0].states[0].name, "OFF");
        assert_eq!(icons[0].states[0].color, "PURE_BLANK");
    }

    #[test]
    fn set_project_synthesizes_default_screen() {
        let mut doc = ProjectDocument::new(320, 240);
        doc.screens.clear();

        let mut project = ProjectState::new();
        project.set_project(Path::new("/tmp/pack/project.json"), doc);

        let doc = project.document().unwrap();
        assert_eq!(doc.screens.len(), 1);
        assert_eq!(doc.screens[0].name, "Screen 1");
        assert_eq!(project.base_dir(), Some(Path::new("/tmp/pack")));
    }

    #[test]
    fn set_project_merges_sprite_flags() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CanvasConfig::default();
        config.sprite_assets.insert("gear".into(), true);
        config.save(dir.path()).unwrap();

        let mut doc = ProjectDocument::new(320, 240);
        doc.objects.push(AssetObject::new("gear", "icons/gear.png"));
        doc.objects.push(AssetObject::new("lamp", "icons/lamp.png"));

        let mut project = ProjectState::new();
        project.set_project(&dir.path().join("project.json"), doc);

        let doc = project.document().unwrap();
        assert!(doc.object("gear").unwrap().is_sprite);
        assert!(!doc.object("lamp").unwrap().is_sprite);
    }

    #[test]
    fn save_strips_sprites_and_orders_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");

        let mut doc = ProjectDocument::new(320, 240);
        doc.objects.push(AssetObject::new("anim", "sprites/anim.png"));
        doc.objects.push(AssetObject::new("gear", "icons/gear.png"));
        doc.objects.push(AssetObject::new("sky", "backgrounds/sky.png"));
        if let Some(obj) = doc.objects.iter_mut().find(|o| o.name == "anim") {
            obj.is_sprite = true;
        }

        let mut project = ProjectState::new();
        project.set_project(&path, doc);

        let mut notices = Notices::new();
        assert!(project.save_project(&mut notices));

        let saved = load_document(&path).unwrap();
        let names: Vec<_> = saved.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["sky", "gear", "anim"]);
        assert_eq!(saved.objects[0].kind, AssetKind::Bin);
        assert!(saved.objects.iter().all(|o| !o.is_sprite));
    }

    #[test]
    fn asset_instances_lists_every_placement() {
        let mut project = project_with_assets();
        let mut notices = Notices::new();
        project.add_instance(0, "gear", InstanceOptions::default(), &mut notices);
        project.duplicate_screen(0);

        assert_eq!(project.asset_instances("gear"), vec![(0, 0), (1, 0)]);
        assert!(project.asset_instances("lamp").is_empty());
    }
}
