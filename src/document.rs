//! Project document model - the normalized source of truth for a resource pack.
//!
//! A [`ProjectDocument`] holds the target display size, the registered asset
//! objects, the named color table, and the ordered screens with their placed
//! icon instances. The on-disk format is PascalCase JSON; everything the view
//! layer derives (sprite flags, animation frames) lives outside this file and
//! is merged in at load time.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Default name for the screen synthesized into an empty document
pub const DEFAULT_SCREEN_NAME: &str = "Screen 1";

/// Path segment that classifies an asset as a background
const BACKGROUNDS_SEGMENT: &str = "backgrounds";

/// On-disk asset type tag. Backgrounds save as `Bin`, everything else as `Ico`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    Ico,
    Bin,
}

impl AssetKind {
    /// Classify by path: anything under a `backgrounds` directory is `Bin`
    pub fn from_path(path: &str) -> Self {
        if is_background_path(path) {
            AssetKind::Bin
        } else {
            AssetKind::Ico
        }
    }
}

/// True when the asset path points into a backgrounds directory
pub fn is_background_path(path: &str) -> bool {
    path.to_lowercase().contains(BACKGROUNDS_SEGMENT)
}

/// A registered resource-file reference, unique by name.
///
/// `is_sprite` is view metadata: it never persists into the document file and
/// is merged back in from the workspace config when a project loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssetObject {
    pub name: String,
    pub path: String,
    #[serde(rename = "Type")]
    pub kind: AssetKind,
    #[serde(skip)]
    pub is_sprite: bool,
}

impl AssetObject {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        let kind = AssetKind::from_path(&path);
        Self {
            name: name.into(),
            path,
            kind,
            is_sprite: false,
        }
    }
}

/// A named color state of an icon instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IconState {
    pub name: String,
    pub color: String,
}

impl IconState {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }
}

/// A placed, positioned occurrence of an asset on a screen.
///
/// The instance name doubles as the foreign key into [`ProjectDocument::objects`]
/// and must be unique across the whole document, not just its screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IconInstance {
    pub name: String,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub states: Vec<IconState>,
}

/// One screen of the resource pack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Screen {
    pub name: String,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub icons: Vec<IconInstance>,
}

impl Screen {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            background: String::new(),
            icons: Vec::new(),
        }
    }
}

impl Default for Screen {
    fn default() -> Self {
        Self::new(DEFAULT_SCREEN_NAME)
    }
}

/// The root document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectDocument {
    pub display_width: u32,
    pub display_height: u32,
    #[serde(default)]
    pub objects: Vec<AssetObject>,
    #[serde(default)]
    pub colors: BTreeMap<String, String>,
    #[serde(default)]
    pub screens: Vec<Screen>,
}

impl ProjectDocument {
    pub fn new(display_width: u32, display_height: u32) -> Self {
        Self {
            display_width,
            display_height,
            objects: Vec::new(),
            colors: BTreeMap::new(),
            screens: vec![Screen::default()],
        }
    }

    /// Parse and validate document JSON.
    ///
    /// Dimensions must be positive; missing collections deserialize as empty
    /// and are tolerated (an empty screen list is repaired at project load,
    /// not here).
    pub fn from_json(text: &str) -> Result<Self> {
        let doc: ProjectDocument =
            serde_json::from_str(text).context("Failed to parse project document")?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize project document")
    }

    fn validate(&self) -> Result<()> {
        if self.display_width == 0 || self.display_height == 0 {
            bail!(
                "Invalid display size {}x{}",
                self.display_width,
                self.display_height
            );
        }
        Ok(())
    }

    /// Find a registered asset by name
    pub fn object(&self, name: &str) -> Option<&AssetObject> {
        self.objects.iter().find(|o| o.name == name)
    }
}

/// Load and validate a document from disk
pub fn load_document(path: &Path) -> Result<ProjectDocument> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    ProjectDocument::from_json(&text)
}

/// Force the reserved-alpha prefix onto a color value.
///
/// The leading `00` byte marks "blank/no-render" semantics rather than a real
/// alpha channel; every stored color carries it. Idempotent.
pub fn normalize_color_hex(hex: &str) -> String {
    let lowered = hex.to_lowercase();
    if lowered.starts_with("#00") {
        lowered
    } else {
        let rest = lowered.strip_prefix('#').unwrap_or(&lowered);
        format!("#00{}", rest)
    }
}

/// Color keys are uppercase, underscore-delimited
pub fn normalize_color_key(name: &str) -> String {
    name.to_uppercase()
}
