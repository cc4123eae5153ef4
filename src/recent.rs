//! Recent projects registry.
//!
//! Tracks recently opened projects with their display metadata and persists
//! them to the per-user config directory.

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::settings::now_millis;

/// Maximum number of recent projects to track
const MAX_RECENT_PROJECTS: usize = 10;

/// A recently opened project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentProject {
    pub id: String,
    pub path: PathBuf,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub last_opened: u64,
}

/// Manager for recent projects
#[derive(Debug, Default)]
pub struct RecentProjects {
    projects: Vec<RecentProject>,
    config_path: PathBuf,
}

impl RecentProjects {
    /// Load recent projects from the per-user config directory
    pub fn load() -> Self {
        Self::load_from(Self::default_path())
    }

    /// Load from an explicit path (tests point this at a temp dir)
    pub fn load_from(config_path: PathBuf) -> Self {
        let projects = fs::read_to_string(&config_path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();
        Self {
            projects,
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
        config_dir.join("screenforge").join("recent.json")
    }

    /// Save recent projects to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.projects)?;
        fs::write(&self.config_path, content)?;
        Ok(())
    }

    /// Record a project open (moves to front if already tracked)
    pub fn add(&mut self, path: PathBuf, display_name: impl Into<String>) -> &RecentProject {
        self.projects.retain(|p| p.path != path);
        self.projects.insert(
            0,
            RecentProject {
                id: Uuid::new_v4().to_string(),
                path,
                display_name: display_name.into(),
                description: None,
                last_opened: now_millis(),
            },
        );
        self.projects.truncate(MAX_RECENT_PROJECTS);
        &self.projects[0]
    }

    /// Drop an entry by id
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.projects.len();
        self.projects.retain(|p| p.id != id);
        self.projects.len() != before
    }

    /// Update display name and description of an entry
    pub fn update_meta(
        &mut self,
        id: &str,
        display_name: impl Into<String>,
        description: Option<String>,
    ) -> bool {
        match self.projects.iter_mut().find(|p| p.id == id) {
            Some(project) => {
                project.display_name = display_name.into();
                project.description = description;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, index: usize) -> Option<&RecentProject> {
        self.projects.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecentProject> {
        self.projects.iter()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
