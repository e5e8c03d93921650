//! On-disk working copy of one EPUB plus its persisted progress.

use crate::archive::entry_name;
use crate::cache::SegmentCache;
use crate::error::StateError;
use crate::progress::ProgressTracker;
use crate::utils::write_atomic;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions of documents that get translated.
const TRANSLATABLE_EXTENSIONS: &[&str] = &["html", "xhtml", "htm"];

/// A translatable file inside the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// `/`-separated path relative to the workspace root; the state key.
    pub relative: String,
    /// Absolute location on disk.
    pub path: PathBuf,
}

/// Extracted book directory and its state files.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    stem: String,
}

impl Workspace {
    /// Creates a handle for the workspace at `root` belonging to the book `stem`.
    pub fn new(root: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            stem: stem.into(),
        }
    }

    /// Default workspace directory for a book, relative to `base`.
    pub fn default_root(base: &Path, stem: &str) -> PathBuf {
        base.join(format!("temp_epub_translation_{}", stem))
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name of the progress record.
    pub fn status_file_name(&self) -> String {
        format!("{}_translation_status.json", self.stem)
    }

    /// File name of the segment cache.
    pub fn cache_file_name(&self) -> String {
        format!("{}_translation_cache.json", self.stem)
    }

    /// Full path of the progress record.
    pub fn status_path(&self) -> PathBuf {
        self.root.join(self.status_file_name())
    }

    /// Full path of the segment cache.
    pub fn cache_path(&self) -> PathBuf {
        self.root.join(self.cache_file_name())
    }

    /// Returns true if the workspace exists and holds at least one entry.
    pub fn is_populated(&self) -> bool {
        std::fs::read_dir(&self.root)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }

    /// Loads the progress record, or an empty one if there is none yet.
    pub fn load_progress(&self) -> Result<ProgressTracker, StateError> {
        load_json(&self.status_path())
    }

    /// Loads the segment cache, or an empty one if there is none yet.
    pub fn load_cache(&self) -> Result<SegmentCache, StateError> {
        load_json(&self.cache_path())
    }

    /// Persists the progress record.
    pub fn save_progress(&self, tracker: &ProgressTracker) -> Result<(), StateError> {
        save_json(&self.status_path(), tracker)
    }

    /// Persists the segment cache.
    pub fn save_cache(&self, cache: &SegmentCache) -> Result<(), StateError> {
        save_json(&self.cache_path(), cache)
    }

    /// Lists every HTML/XHTML file, sorted by relative path.
    pub fn translatable_files(&self) -> Result<Vec<SourceFile>, StateError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry?;
            if !entry.file_type().is_file() || !is_translatable(entry.path()) {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map(entry_name)
                .unwrap_or_default();
            files.push(SourceFile {
                relative,
                path: entry.into_path(),
            });
        }
        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(files)
    }

    /// Deletes the workspace and everything in it.
    pub fn remove(&self) -> std::io::Result<()> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }
}

fn is_translatable(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            TRANSLATABLE_EXTENSIONS
                .iter()
                .any(|t| e.eq_ignore_ascii_case(t))
        })
        .unwrap_or(false)
}

fn load_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StateError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| StateError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StateError> {
    let content = serde_json::to_string_pretty(value)?;
    write_atomic(path, content.as_bytes())?;
    Ok(())
}
