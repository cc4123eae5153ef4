//! screenforge - state engine for a screen/icon resource-pack composer.
//!
//! Three explicitly-constructed stores cooperate on a single thread:
//!
//! - [`project::ProjectState`] owns the normalized document (screens, assets,
//!   colors) and its mutation operations. Edits return an [`project::Edit`]
//!   label; recording it is the caller's decision.
//! - [`canvas::CanvasState`] owns view/session state: selection, sprite
//!   animation config, grid/snap/auto-save settings, and the workspace
//!   save/load round-trip to the project's companion config files.
//! - [`history::HistoryEngine`] snapshots document + undoable canvas fields
//!   on every recorded edit and restores both atomically on
//!   undo/redo/jump_to, with bounded retention.
//!
//! Validation rejections and I/O failures surface through
//! [`notify::Notices`]; rendering, interaction math, and dialogs belong to
//! the consuming UI layer.

pub mod canvas;
pub mod document;
pub mod history;
pub mod notify;
pub mod project;
pub mod recent;
pub mod scan;
pub mod settings;

pub use canvas::{CanvasSnapshot, CanvasState, Orientation};
pub use document::{
    normalize_color_hex, normalize_color_key, AssetKind, AssetObject, IconInstance, IconState,
    ProjectDocument, Screen,
};
pub use history::{HistoryEngine, HistoryEntry};
pub use notify::{Notice, Notices, Severity};
pub use project::{Edit, InstanceOptions, ProjectState, RenameOutcome};
pub use settings::AppSettings;
