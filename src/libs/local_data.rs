//! The local copy of the shared station data.
//!
//! The document content is opaque JSON. [`LocalDataFile`] keeps the working
//! content in memory next to what was last written to disk, so callers can
//! tell whether there are unsaved edits before a pull overwrites them.

use crate::libs::error::{SyncError, SyncResult};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What the sync orchestrator needs from the application's data.
pub trait LocalDocument {
    fn has_unsaved_changes(&self) -> bool;

    /// Persists the working content.
    fn save(&mut self) -> SyncResult<()>;

    /// Current working content.
    fn snapshot(&self) -> Value;

    /// Replaces the working content with `content` and persists it.
    fn replace(&mut self, content: Value) -> SyncResult<()>;
}

#[derive(Debug, Clone)]
pub struct LocalDataFile {
    path: PathBuf,
    content: Value,
    saved: Value,
}

impl LocalDataFile {
    /// Loads `path`. A missing file starts as an empty JSON object.
    pub fn load(path: impl Into<PathBuf>) -> SyncResult<Self> {
        let path = path.into();
        let content = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|e| SyncError::io(&path, e))?;
            serde_json::from_str(&raw)?
        } else {
            debug!("{} does not exist yet", path.display());
            Value::Object(Map::new())
        };

        Ok(Self {
            path,
            saved: content.clone(),
            content,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Edits the working content without saving it.
    pub fn set_content(&mut self, content: Value) {
        self.content = content;
    }

    /// Number of entries under `key` when it holds an object or array.
    pub fn count(&self, key: &str) -> usize {
        match self.content.get(key) {
            Some(Value::Object(map)) => map.len(),
            Some(Value::Array(items)) => items.len(),
            _ => 0,
        }
    }

    fn write(&self) -> SyncResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
            }
        }
        let pretty = serde_json::to_string_pretty(&self.content)?;
        fs::write(&self.path, pretty).map_err(|e| SyncError::io(&self.path, e))
    }
}

impl LocalDocument for LocalDataFile {
    fn has_unsaved_changes(&self) -> bool {
        self.content != self.saved
    }

    fn save(&mut self) -> SyncResult<()> {
        self.write()?;
        self.saved = self.content.clone();
        Ok(())
    }

    fn snapshot(&self) -> Value {
        self.content.clone()
    }

    fn replace(&mut self, content: Value) -> SyncResult<()> {
        self.content = content;
        self.save()
    }
}
