//! Per-file translation progress.
//!
//! Files absent from the tracker are pending. A completed file is skipped
//! wholesale on resume; a failed one is walked again from the start.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Translation state of one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileStatus::Pending => "pending",
            FileStatus::Completed => "completed",
            FileStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Status map keyed by relative file path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressTracker {
    files: BTreeMap<String, FileStatus>,
}

impl ProgressTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the status of `file`, pending if it was never marked.
    pub fn status_of(&self, file: &str) -> FileStatus {
        self.files.get(file).copied().unwrap_or(FileStatus::Pending)
    }

    /// Records the outcome of processing `file`. Marking pending forgets it.
    pub fn mark(&mut self, file: &str, status: FileStatus) {
        match status {
            FileStatus::Pending => {
                self.files.remove(file);
            }
            status => {
                self.files.insert(file.to_string(), status);
            }
        }
    }

    /// Returns true if every tracked file is completed.
    ///
    /// Vacuously true for an empty tracker.
    pub fn all_completed(&self) -> bool {
        self.files.values().all(|s| *s == FileStatus::Completed)
    }

    /// Number of tracked files with the given status.
    pub fn count(&self, status: FileStatus) -> usize {
        self.files.values().filter(|s| **s == status).count()
    }

    /// Number of tracked files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if no file has been marked.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_file_is_pending() {
        let tracker = ProgressTracker::new();
        assert_eq!(tracker.status_of("OEBPS/ch1.xhtml"), FileStatus::Pending);
        assert!(tracker.all_completed());
    }

    #[test]
    fn test_mark_and_query() {
        let mut tracker = ProgressTracker::new();
        tracker.mark("a.xhtml", FileStatus::Completed);
        tracker.mark("b.xhtml", FileStatus::Failed);

        assert_eq!(tracker.status_of("a.xhtml"), FileStatus::Completed);
        assert_eq!(tracker.status_of("b.xhtml"), FileStatus::Failed);
        assert!(!tracker.all_completed());
        assert_eq!(tracker.count(FileStatus::Failed), 1);

        tracker.mark("b.xhtml", FileStatus::Completed);
        assert!(tracker.all_completed());
    }

    #[test]
    fn test_mark_pending_forgets() {
        let mut tracker = ProgressTracker::new();
        tracker.mark("a.xhtml", FileStatus::Failed);
        tracker.mark("a.xhtml", FileStatus::Pending);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_json_format() {
        let mut tracker = ProgressTracker::new();
        tracker.mark("OEBPS/ch2.xhtml", FileStatus::Failed);
        tracker.mark("OEBPS/ch1.xhtml", FileStatus::Completed);

        let json = serde_json::to_string(&tracker).unwrap();
        assert_eq!(
            json,
            r#"{"OEBPS/ch1.xhtml":"completed","OEBPS/ch2.xhtml":"failed"}"#
        );

        let restored: ProgressTracker = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, tracker);
    }
}
