//! Undo/redo manager over combined document + canvas snapshots.
//!
//! Each committed edit captures a deep copy of the live [`ProjectDocument`]
//! together with the undoable canvas fields, so time travel restores both
//! stores atomically. One entry list, one cursor: pushing after an undo
//! discards the redo branch, and retention evicts from the front once the
//! list exceeds the configured bound.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::canvas::{CanvasSnapshot, CanvasState};
use crate::document::ProjectDocument;
use crate::project::ProjectState;
use crate::settings::{now_millis, ProjectSettings};

/// Retention bound used when none is configured
pub const DEFAULT_MAX_STEPS: u32 = 50;

const MIN_MAX_STEPS: u32 = 1;
const MAX_MAX_STEPS: u32 = 100;

/// History entry identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One point in time: a labeled deep copy of document + canvas state
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: EntryId,
    pub description: String,
    pub timestamp_ms: u64,
    project: ProjectDocument,
    canvas: CanvasSnapshot,
}

impl HistoryEntry {
    pub fn project(&self) -> &ProjectDocument {
        &self.project
    }

    pub fn canvas(&self) -> &CanvasSnapshot {
        &self.canvas
    }
}

/// Manages undo/redo with bounded snapshot retention
#[derive(Debug)]
pub struct HistoryEngine {
    entries: Vec<HistoryEntry>,
    /// Cursor into `entries`; `None` means no history yet
    current: Option<usize>,
    max_steps: u32,
    /// Project dir for persisting the retention bound; `None` disables it
    base_dir: Option<PathBuf>,
}

impl HistoryEngine {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            current: None,
            max_steps: DEFAULT_MAX_STEPS,
            base_dir: None,
        }
    }

    /// Reset for a newly opened project (or `None` for "no project open",
    /// which also disables settings persistence)
    pub fn initialize(&mut self, base_dir: Option<&Path>, max_steps: Option<u32>) {
        self.entries.clear();
        self.current = None;
        self.base_dir = base_dir.map(PathBuf::from);
        self.max_steps = if self.base_dir.is_some() {
            max_steps.unwrap_or(DEFAULT_MAX_STEPS)
        } else {
            DEFAULT_MAX_STEPS
        };
    }

    /// Lifecycle hook: forget all history when the project closes
    pub fn close_project(&mut self) {
        self.entries.clear();
        self.current = None;
    }

    /// User command: forget history but keep working
    pub fn clear(&mut self) {
        self.entries.clear();
        self.current = None;
    }

    /// Snapshot the current live state as a new entry.
    ///
    /// Truncates the redo branch, appends, then evicts from the front while
    /// over the retention bound. Silently a no-op when no document is loaded.
    pub fn push(&mut self, description: &str, project: &ProjectState, canvas: &CanvasState) {
        let Some(doc) = project.document() else {
            return;
        };

        let keep = self.current.map_or(0, |i| i + 1);
        self.entries.truncate(keep);

        self.entries.push(HistoryEntry {
            id: EntryId::new(),
            description: description.to_string(),
            timestamp_ms: now_millis(),
            project: doc.clone(),
            canvas: canvas.snapshot(),
        });

        while self.entries.len() > self.max_steps as usize {
            self.entries.remove(0);
        }

        self.current = Some(self.entries.len() - 1);
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.current, Some(i) if i > 0)
    }

    pub fn can_redo(&self) -> bool {
        let next = self.current.map_or(0, |i| i + 1);
        next < self.entries.len()
    }

    /// Step back one entry, restoring both stores. No-op at the start.
    pub fn undo(&mut self, project: &mut ProjectState, canvas: &mut CanvasState) -> bool {
        let Some(current) = self.current else {
            return false;
        };
        if current == 0 {
            return false;
        }
        let target = current - 1;
        self.restore_entry(target, project, canvas);
        self.current = Some(target);
        true
    }

    /// Step forward one entry. No-op at the end.
    pub fn redo(&mut self, project: &mut ProjectState, canvas: &mut CanvasState) -> bool {
        if !self.can_redo() {
            return false;
        }
        let target = self.current.map_or(0, |i| i + 1);
        self.restore_entry(target, project, canvas);
        self.current = Some(target);
        true
    }

    /// Seek directly to any retained entry. Out-of-range is a no-op.
    pub fn jump_to(
        &mut self,
        index: usize,
        project: &mut ProjectState,
        canvas: &mut CanvasState,
    ) -> bool {
        if index >= self.entries.len() {
            return false;
        }
        self.restore_entry(index, project, canvas);
        self.current = Some(index);
        true
    }

    fn restore_entry(&self, index: usize, project: &mut ProjectState, canvas: &mut CanvasState) {
        let entry = &self.entries[index];
        project.restore_document(entry.project.clone());
        canvas.restore(&entry.canvas);
    }

    /// Change the retention bound (clamped to 1-100), evicting from the
    /// front immediately if the list is over the new bound. Persists to the
    /// open project's settings; with no project open the bound applies in
    /// memory only. Returns the clamped value.
    pub fn set_max_steps(&mut self, steps: u32, canvas: &CanvasState) -> u32 {
        let clamped = steps.clamp(MIN_MAX_STEPS, MAX_MAX_STEPS);
        self.max_steps = clamped;

        let bound = clamped as usize;
        if self.entries.len() > bound {
            let evicted = self.entries.len() - bound;
            self.entries.drain(0..evicted);
            self.current = self.current.map(|i| i.saturating_sub(evicted));
        }

        if let Some(base_dir) = self.base_dir.clone() {
            let result = ProjectSettings::update(&base_dir, |s| {
                s.history_max_steps = clamped;
                s.snap_to_grid = canvas.snap_to_grid();
                s.grid_size = canvas.grid_size();
                s.allow_dnd = canvas.allow_dnd();
                s.auto_save_enabled = canvas.auto_save_enabled();
                s.auto_save_interval = canvas.auto_save_interval_ms();
            });
            if let Err(e) = result {
                warn!("Failed to persist history settings: {:#}", e);
            }
        } else {
            debug!("No project open; history retention kept in memory only");
        }

        clamped
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// Retained entries, oldest first (for a history-browser UI)
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }
}

impl Default for HistoryEngine {
    fn default() -> Self {
        Self::new()
    }
}
