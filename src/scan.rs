//! Asset discovery - the directory scan collaborator.
//!
//! The stores only consume the resulting relative path list; where it comes
//! from is behind [`AssetScanner`]. [`FsScanner`] is the filesystem
//! implementation used by the desktop shell.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::settings::CONFIG_DIR;

/// File extensions treated as asset images
const IMAGE_EXTENSIONS: &[&str] = &["png", "bmp", "gif", "jpg", "jpeg", "ico"];

/// Produces the relative paths of asset files under a project directory
pub trait AssetScanner {
    fn scan(&self, base_dir: &Path) -> Result<Vec<String>>;
}

/// Recursive filesystem scanner
#[derive(Debug, Default)]
pub struct FsScanner;

impl FsScanner {
    fn walk(&self, base_dir: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
        let entries =
            std::fs::read_dir(dir).with_context(|| format!("Failed to read {:?}", dir))?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if path.is_dir() {
                // Skip the companion config dir and hidden directories
                if name == CONFIG_DIR || name.starts_with('.') {
                    continue;
                }
                self.walk(base_dir, &path, out)?;
            } else if is_image_file(&name) {
                if let Ok(relative) = path.strip_prefix(base_dir) {
                    out.push(relative.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        Ok(())
    }
}

fn is_image_file(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

impl AssetScanner for FsScanner {
    fn scan(&self, base_dir: &Path) -> Result<Vec<String>> {
        let mut files = Vec::new();
        self.walk(base_dir, base_dir, &mut files)?;
        files.sort();
        debug!("Scanned {} asset files under {:?}", files.len(), base_dir);
        Ok(files)
    }
}
