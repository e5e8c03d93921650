//! Content-addressed memo of translated segments.
//!
//! Entries are scoped by the source file's relative path and keyed by the
//! SHA-256 of the trimmed segment text. Persisting the cache is the
//! caller's job; this type only holds the mapping.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Translations per file, per segment hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentCache {
    files: BTreeMap<String, BTreeMap<String, String>>,
}

/// Returns the cache key for a segment: hex SHA-256 of its trimmed text.
pub fn segment_key(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.trim().as_bytes()))
}

impl SegmentCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the translation of `text` within `file`.
    pub fn lookup(&self, file: &str, text: &str) -> Option<&str> {
        self.files
            .get(file)
            .and_then(|segments| segments.get(&segment_key(text)))
            .map(String::as_str)
    }

    /// Records the translation of `text` within `file`.
    pub fn store(&mut self, file: &str, text: &str, translated: &str) {
        let segments = self.files.entry(file.to_string()).or_default();
        let key = segment_key(text);
        if segments.get(&key).map(String::as_str) != Some(translated) {
            segments.insert(key, translated.to_string());
        }
    }

    /// Number of cached segments for `file`.
    pub fn file_len(&self, file: &str) -> usize {
        self.files.get(file).map_or(0, BTreeMap::len)
    }

    /// Total number of cached segments.
    pub fn len(&self) -> usize {
        self.files.values().map(BTreeMap::len).sum()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
