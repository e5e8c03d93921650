//! Translation orchestrator.
//!
//! Drives one run over a book: extract the EPUB into a workspace (or reuse
//! one left by an interrupted run), translate every HTML/XHTML file not yet
//! completed, persist progress after each file, repackage, and remove the
//! workspace once everything is completed.

use crate::archive;
use crate::cache::SegmentCache;
use crate::console::Console;
use crate::document::{Document, ParserKind, with_original_spacing};
use crate::error::{RunError, StateError};
use crate::pool::RotationPool;
use crate::progress::{FileStatus, ProgressTracker};
use crate::translator::{Resolution, Translator};
use crate::workspace::{SourceFile, Workspace};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Suffix of the translated EPUB's file stem.
const OUTPUT_SUFFIX: &str = "_zh-Hans";

/// Phases of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Initializing,
    Extracting,
    Walking,
    Finalizing,
    CleaningUp,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Where a run reads from and writes to.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Source EPUB.
    pub epub_path: PathBuf,
    /// Directory receiving the translated EPUB.
    pub output_dir: PathBuf,
    /// Explicit workspace; defaults to `temp_epub_translation_<stem>` in the
    /// current directory.
    pub workspace_dir: Option<PathBuf>,
}

/// Outcome of a run that got past initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Files walked in this run.
    pub processed: usize,
    /// Files skipped as already completed.
    pub skipped: usize,
    /// Files walked in this run that ended up failed.
    pub failed: usize,
    /// Translated EPUB.
    pub output_path: PathBuf,
    /// Workspace location.
    pub workspace: PathBuf,
    /// Whether the workspace was deleted because every file completed.
    pub workspace_removed: bool,
}

/// Per-file counters.
#[derive(Debug, Default)]
struct FileReport {
    translated: usize,
    cached: usize,
    passed: usize,
    failed: usize,
}

/// Runs the whole translation pipeline for one book.
pub struct Orchestrator {
    translator: Translator,
    pool: RotationPool,
    parser: ParserKind,
    console: Console,
    state: RunState,
}

impl Orchestrator {
    /// Create a new Orchestrator.
    pub fn new(translator: Translator, pool: RotationPool, parser: ParserKind) -> Self {
        Self {
            translator,
            pool,
            parser,
            console: Console::new(),
            state: RunState::Initializing,
        }
    }

    /// Current phase.
    pub fn state(&self) -> RunState {
        self.state
    }

    fn enter(&mut self, state: RunState) {
        debug!(from = %self.state, to = %state, "Run state transition");
        self.state = state;
    }

    /// Runs every phase for the book described by `options`.
    pub async fn run(&mut self, options: &RunOptions) -> Result<RunSummary, RunError> {
        self.enter(RunState::Initializing);
        let stem = validate_input(&options.epub_path)?;
        let root = match &options.workspace_dir {
            Some(dir) => dir.clone(),
            None => Workspace::default_root(&std::env::current_dir()?, &stem),
        };
        let workspace = Workspace::new(root, stem.as_str());
        let output_path = options
            .output_dir
            .join(format!("{}{}.epub", stem, OUTPUT_SUFFIX));
        std::fs::create_dir_all(&options.output_dir)?;

        self.console.info(&format!("Workspace: {}", workspace.root().display()));
        self.console.info(&format!("Output: {}", output_path.display()));

        let mut tracker = self.load_state(&workspace, Workspace::load_progress);
        let mut cache = self.load_state(&workspace, Workspace::load_cache);

        if self.pool.active().is_none() && !self.pool.activate_next().await {
            return Err(RunError::NoWorkingConfiguration {
                pairs: self.pool.len(),
            });
        }
        if let Some(active) = self.pool.active() {
            self.console.success(&format!(
                "Using key {} with model {}",
                active.label, active.model
            ));
        }

        self.enter(RunState::Extracting);
        if workspace.is_populated() {
            self.console.info("Workspace already populated, resuming incremental translation");
        } else {
            self.console.step("Extracting EPUB...");
            if let Err(e) = archive::extract(&options.epub_path, workspace.root()) {
                if let Err(cleanup) = workspace.remove() {
                    warn!(error = %cleanup, "Failed to remove partial workspace");
                }
                return Err(RunError::Extraction(e));
            }
            self.console.success("EPUB extracted");
        }

        self.enter(RunState::Walking);
        let files = workspace.translatable_files()?;
        if files.is_empty() {
            self.console
                .warning("No HTML/XHTML files found in the EPUB. Nothing to translate.");
        } else {
            self.console.info(&format!(
                "Found {} HTML files in EPUB structure",
                self.console.count(files.len())
            ));
        }

        let mut processed = 0;
        let mut skipped = 0;
        let mut failed = 0;
        for (i, file) in files.iter().enumerate() {
            let status = tracker.status_of(&file.relative);
            if status == FileStatus::Completed {
                self.console.info(&format!(
                    "{} Skipping already completed {}",
                    self.console.file_position(i + 1, files.len()),
                    file.relative
                ));
                skipped += 1;
                continue;
            }

            self.console
                .file_header(i + 1, files.len(), &file.relative, &status.to_string());
            let outcome = self.process_file(&workspace, file, &mut cache).await?;
            processed += 1;
            if outcome == FileStatus::Failed {
                failed += 1;
            }
            tracker.mark(&file.relative, outcome);
            workspace.save_progress(&tracker)?;
        }

        self.console.info(&format!(
            "Processed {} files, skipped {} already completed files",
            self.console.count(processed),
            self.console.count(skipped)
        ));

        self.enter(RunState::Finalizing);
        self.console.step("Creating translated EPUB...");
        let excluded = [workspace.status_file_name(), workspace.cache_file_name()];
        let excluded: Vec<&str> = excluded.iter().map(String::as_str).collect();
        archive::pack(workspace.root(), &output_path, &excluded).map_err(RunError::Packaging)?;
        self.console.success(&format!(
            "Translated EPUB saved to: {}",
            output_path.display()
        ));

        self.enter(RunState::CleaningUp);
        let workspace_removed = tracker.all_completed();
        if workspace_removed {
            workspace.remove()?;
            self.console.info(&format!(
                "Cleaned up workspace: {}",
                workspace.root().display()
            ));
        } else {
            self.console.warning(&format!(
                "Workspace '{}' preserved for incremental translation ({} files failed)",
                workspace.root().display(),
                tracker.count(FileStatus::Failed)
            ));
        }

        self.enter(RunState::Done);
        Ok(RunSummary {
            processed,
            skipped,
            failed,
            output_path,
            workspace: workspace.root().to_path_buf(),
            workspace_removed,
        })
    }

    /// Loads one persisted state record, starting fresh if it is unreadable.
    fn load_state<T: Default>(
        &self,
        workspace: &Workspace,
        load: fn(&Workspace) -> Result<T, StateError>,
    ) -> T {
        match load(workspace) {
            Ok(value) => value,
            Err(e) => {
                self.console
                    .warning(&format!("{}. Starting fresh for this EPUB.", e));
                T::default()
            }
        }
    }

    /// Translates one file in place and returns its resulting status.
    ///
    /// The cache is persisted before the file is rewritten, and every fresh
    /// translation is also cached under its own text, so a file rewritten
    /// just before a crash resolves from the cache when walked again.
    async fn process_file(
        &mut self,
        workspace: &Workspace,
        file: &SourceFile,
        cache: &mut SegmentCache,
    ) -> Result<FileStatus, RunError> {
        let bytes = match std::fs::read(&file.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.console
                    .error(&format!("Failed to read {}: {}", file.relative, e));
                return Ok(FileStatus::Failed);
            }
        };

        let mut document = match Document::parse(&bytes, self.parser) {
            Ok(document) => document,
            Err(e) => {
                self.console.error(&format!(
                    "Failed to parse {}: {}. Skipping file.",
                    file.relative, e
                ));
                return Ok(FileStatus::Failed);
            }
        };

        let segments = document.segments();
        let mut report = FileReport::default();
        let mut replacements = Vec::with_capacity(segments.len());

        for original in &segments {
            let trimmed = original.trim();
            let resolved = match cache.lookup(&file.relative, trimmed) {
                Some(hit) => {
                    report.cached += 1;
                    hit.to_string()
                }
                None => {
                    let resolution = self.translator.translate(&mut self.pool, trimmed).await;
                    match &resolution {
                        Resolution::Translated(t) => {
                            report.translated += 1;
                            cache.store(&file.relative, trimmed, t);
                            if cache.lookup(&file.relative, t).is_none() {
                                cache.store(&file.relative, t, t);
                            }
                        }
                        Resolution::PassedThrough(t) => {
                            report.passed += 1;
                            cache.store(&file.relative, trimmed, t);
                        }
                        Resolution::Failed(_) => report.failed += 1,
                    }
                    resolution.text().to_string()
                }
            };

            if resolved.is_empty() {
                replacements.push(original.clone());
            } else {
                replacements.push(with_original_spacing(original, &resolved));
            }
        }

        workspace.save_cache(cache)?;

        if let Err(e) = document.replace_segments(&replacements) {
            self.console
                .error(&format!("Failed to update {}: {}", file.relative, e));
            return Ok(FileStatus::Failed);
        }

        if let Err(e) = std::fs::write(&file.path, document.to_bytes()) {
            self.console
                .error(&format!("Failed to write {}: {}", file.relative, e));
            return Ok(FileStatus::Failed);
        }

        info!(
            file = %file.relative,
            translated = report.translated,
            cached = report.cached,
            passed = report.passed,
            failed = report.failed,
            "Finished file"
        );

        if report.failed > 0 {
            self.console.warning(&format!(
                "Finished processing: {} (some segments failed)",
                file.relative
            ));
            Ok(FileStatus::Failed)
        } else {
            self.console.success(&format!(
                "Finished processing: {} (all segments successful)",
                file.relative
            ));
            Ok(FileStatus::Completed)
        }
    }
}

/// Checks the input path and returns the book's file stem.
fn validate_input(epub_path: &Path) -> Result<String, RunError> {
    if !epub_path.is_file() {
        return Err(RunError::InputNotFound(epub_path.to_path_buf()));
    }

    let is_epub = epub_path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("epub"));
    if !is_epub {
        return Err(RunError::NotAnEpub(epub_path.to_path_buf()));
    }

    Ok(epub_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "book".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::scripted::ScriptedConnector;
    use crate::config::TranslationConfig;
    use std::fs::File;
    use std::io::{Read, Write};
    use tempfile::TempDir;
    use zip::ZipArchive;
    use zip::write::SimpleFileOptions;

    const CONTAINER: &str = r#"<?xml version="1.0"?><container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container"><rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles></container>"#;

    fn chapter(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>Chapter</title></head><body><p>{}</p></body></html>"#,
            body
        )
    }

    struct Fixture {
        dir: TempDir,
        connector: ScriptedConnector,
    }

    impl Fixture {
        fn new(chapters: &[(&str, &str)]) -> Self {
            let dir = TempDir::new().unwrap();
            let mut writer = zip::ZipWriter::new(File::create(dir.path().join("book.epub")).unwrap());
            let options = SimpleFileOptions::default();
            writer.start_file("mimetype", options).unwrap();
            writer.write_all(b"application/epub+zip").unwrap();
            writer.start_file("META-INF/container.xml", options).unwrap();
            writer.write_all(CONTAINER.as_bytes()).unwrap();
            for (name, body) in chapters {
                writer.start_file(format!("OEBPS/{}", name), options).unwrap();
                writer.write_all(chapter(body).as_bytes()).unwrap();
            }
            writer.finish().unwrap();

            Self {
                dir,
                connector: ScriptedConnector::new(),
            }
        }

        fn options(&self) -> RunOptions {
            RunOptions {
                epub_path: self.dir.path().join("book.epub"),
                output_dir: self.dir.path().join("out"),
                workspace_dir: Some(self.workspace_root()),
            }
        }

        fn workspace_root(&self) -> PathBuf {
            self.dir.path().join("work")
        }

        fn workspace(&self) -> Workspace {
            Workspace::new(self.workspace_root(), "book")
        }

        fn orchestrator(&self, keys: &[&str], parser: ParserKind) -> Orchestrator {
            let pool = RotationPool::new(
                Box::new(self.connector.clone()),
                keys.iter().map(|k| k.to_string()).collect(),
                vec!["m1".to_string()],
            );
            let translator = Translator::new(String::new(), TranslationConfig::immediate());
            Orchestrator::new(translator, pool, parser)
        }

        async fn run(&self) -> RunSummary {
            self.orchestrator(&["k1"], ParserKind::Auto)
                .run(&self.options())
                .await
                .unwrap()
        }

        fn output_path(&self) -> PathBuf {
            self.dir.path().join("out").join("book_zh-Hans.epub")
        }

        fn read_output(&self, name: &str) -> String {
            let mut archive = ZipArchive::new(File::open(self.output_path()).unwrap()).unwrap();
            let mut content = String::new();
            archive
                .by_name(name)
                .unwrap()
                .read_to_string(&mut content)
                .unwrap();
            content
        }

        fn prepare_workspace(&self, statuses: &[(&str, FileStatus)]) {
            archive::extract(&self.options().epub_path, &self.workspace_root()).unwrap();
            let mut tracker = ProgressTracker::new();
            for (file, status) in statuses {
                tracker.mark(file, *status);
            }
            self.workspace().save_progress(&tracker).unwrap();
        }
    }

    #[tokio::test]
    async fn test_end_to_end_translation() {
        let fixture = Fixture::new(&[("ch1.xhtml", "The sun rose."), ("ch2.xhtml", "12345")]);

        let summary = fixture.run().await;

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.failed, 0);
        assert!(summary.workspace_removed);
        assert!(!fixture.workspace_root().exists());
        assert_eq!(summary.output_path, fixture.output_path());

        assert!(fixture.read_output("OEBPS/ch1.xhtml").contains("<p>THE SUN ROSE.</p>"));
        assert!(fixture.read_output("OEBPS/ch2.xhtml").contains("<p>12345</p>"));
        assert_eq!(fixture.connector.call_count(), 1);
    }

    #[tokio::test]
    async fn test_output_archive_layout() {
        let fixture = Fixture::new(&[("ch1.xhtml", "The sun rose.")]);
        fixture.run().await;

        let archive = ZipArchive::new(File::open(fixture.output_path()).unwrap()).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(names[0], "mimetype");
        assert!(names.contains(&"META-INF/container.xml"));
        assert!(!names.iter().any(|n| n.ends_with(".json")));
    }

    #[tokio::test]
    async fn test_duplicate_segments_translated_once() {
        let fixture = Fixture::new(&[(
            "ch1.xhtml",
            "Hello there.</p><p>Hello there.</p><p>  Hello there.  ",
        )]);

        fixture.run().await;

        assert_eq!(fixture.connector.call_count(), 1);
        let content = fixture.read_output("OEBPS/ch1.xhtml");
        assert_eq!(content.matches("HELLO THERE.").count(), 3);
        assert!(content.contains("<p>  HELLO THERE.  </p>"));
    }

    #[tokio::test]
    async fn test_resume_skips_completed_files() {
        let fixture = Fixture::new(&[("ch1.xhtml", "The sun rose."), ("ch2.xhtml", "Night fell.")]);
        fixture.prepare_workspace(&[("OEBPS/ch1.xhtml", FileStatus::Completed)]);

        let summary = fixture.run().await;

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.processed, 1);
        assert!(fixture.read_output("OEBPS/ch1.xhtml").contains("<p>The sun rose.</p>"));
        assert!(fixture.read_output("OEBPS/ch2.xhtml").contains("<p>NIGHT FELL.</p>"));
        let prompts: Vec<String> = fixture.connector.calls().into_iter().map(|(_, p)| p).collect();
        assert_eq!(prompts, vec!["Night fell.".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_file_is_rewalked_using_cache() {
        let fixture = Fixture::new(&[("ch1.xhtml", "The sun rose.")]);
        fixture.prepare_workspace(&[("OEBPS/ch1.xhtml", FileStatus::Failed)]);
        let mut cache = SegmentCache::new();
        cache.store("OEBPS/ch1.xhtml", "The sun rose.", "太阳升起了。");
        fixture.workspace().save_cache(&cache).unwrap();

        let summary = fixture.run().await;

        assert_eq!(summary.processed, 1);
        assert!(summary.workspace_removed);
        assert_eq!(fixture.connector.call_count(), 0);
        assert!(fixture.read_output("OEBPS/ch1.xhtml").contains("<p>太阳升起了。</p>"));
    }

    #[tokio::test]
    async fn test_fully_completed_run_is_idempotent() {
        let fixture = Fixture::new(&[("ch1.xhtml", "The sun rose."), ("ch2.xhtml", "Night fell.")]);
        let all_done = [
            ("OEBPS/ch1.xhtml", FileStatus::Completed),
            ("OEBPS/ch2.xhtml", FileStatus::Completed),
        ];

        fixture.prepare_workspace(&all_done);
        let first = fixture.run().await;
        let first_bytes = std::fs::read(fixture.output_path()).unwrap();

        fixture.prepare_workspace(&all_done);
        let second = fixture.run().await;
        let second_bytes = std::fs::read(fixture.output_path()).unwrap();

        assert_eq!(first.skipped, 2);
        assert_eq!(second.skipped, 2);
        assert_eq!(fixture.connector.call_count(), 0);
        assert_eq!(first_bytes, second_bytes);
    }

    #[tokio::test]
    async fn test_unparseable_file_preserves_workspace() {
        let fixture = Fixture::new(&[("ch1.xhtml", "The sun rose.")]);
        fixture.prepare_workspace(&[]);
        std::fs::write(
            fixture.workspace_root().join("OEBPS/bad.xhtml"),
            b"<html><body><p>caf\xE9</p></body></html>",
        )
        .unwrap();

        let summary = fixture
            .orchestrator(&["k1"], ParserKind::Utf8)
            .run(&fixture.options())
            .await
            .unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.workspace_removed);
        assert!(fixture.output_path().exists());

        let tracker = fixture.workspace().load_progress().unwrap();
        assert_eq!(tracker.status_of("OEBPS/bad.xhtml"), FileStatus::Failed);
        assert_eq!(tracker.status_of("OEBPS/ch1.xhtml"), FileStatus::Completed);
        let cache = fixture.workspace().load_cache().unwrap();
        assert_eq!(cache.lookup("OEBPS/ch1.xhtml", "The sun rose."), Some("THE SUN ROSE."));
    }

    #[tokio::test]
    async fn test_rewritten_file_without_status_is_not_billed_again() {
        let fixture = Fixture::new(&[("ch1.xhtml", "The sun rose.")]);
        fixture.prepare_workspace(&[]);
        std::fs::write(
            fixture.workspace_root().join("OEBPS/bad.xhtml"),
            b"<html><body><p>caf\xE9</p></body></html>",
        )
        .unwrap();

        fixture
            .orchestrator(&["k1"], ParserKind::Utf8)
            .run(&fixture.options())
            .await
            .unwrap();
        assert_eq!(fixture.connector.call_count(), 1);

        // Killed after ch1 was rewritten but before its status was saved
        std::fs::remove_file(fixture.workspace().status_path()).unwrap();

        let summary = fixture
            .orchestrator(&["k1"], ParserKind::Utf8)
            .run(&fixture.options())
            .await
            .unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(fixture.connector.call_count(), 1);
        assert!(fixture.read_output("OEBPS/ch1.xhtml").contains("<p>THE SUN ROSE.</p>"));
        let tracker = fixture.workspace().load_progress().unwrap();
        assert_eq!(tracker.status_of("OEBPS/ch1.xhtml"), FileStatus::Completed);
    }

    #[tokio::test]
    async fn test_cache_saved_with_rewritten_file() {
        let fixture = Fixture::new(&[("ch1.xhtml", "The sun rose.")]);
        fixture.prepare_workspace(&[]);
        std::fs::write(
            fixture.workspace_root().join("OEBPS/bad.xhtml"),
            b"<html><body><p>caf\xE9</p></body></html>",
        )
        .unwrap();

        fixture
            .orchestrator(&["k1"], ParserKind::Utf8)
            .run(&fixture.options())
            .await
            .unwrap();

        let cache = fixture.workspace().load_cache().unwrap();
        assert_eq!(cache.lookup("OEBPS/ch1.xhtml", "The sun rose."), Some("THE SUN ROSE."));
        assert_eq!(cache.lookup("OEBPS/ch1.xhtml", "THE SUN ROSE."), Some("THE SUN ROSE."));
    }

    #[tokio::test]
    async fn test_no_working_configuration_is_fatal() {
        let fixture = Fixture::new(&[("ch1.xhtml", "The sun rose.")]);
        fixture.connector.break_key("k1").break_key("k2");

        let mut orchestrator = fixture.orchestrator(&["k1", "k2"], ParserKind::Auto);
        let result = orchestrator.run(&fixture.options()).await;

        assert!(matches!(
            result,
            Err(RunError::NoWorkingConfiguration { pairs: 2 })
        ));
        assert!(!fixture.workspace_root().exists());
        assert_eq!(orchestrator.state(), RunState::Initializing);
    }

    #[tokio::test]
    async fn test_invalid_inputs_rejected() {
        let fixture = Fixture::new(&[]);
        let mut orchestrator = fixture.orchestrator(&["k1"], ParserKind::Auto);

        let mut options = fixture.options();
        options.epub_path = fixture.dir.path().join("missing.epub");
        assert!(matches!(
            orchestrator.run(&options).await,
            Err(RunError::InputNotFound(_))
        ));

        let text = fixture.dir.path().join("book.txt");
        std::fs::write(&text, "not a book").unwrap();
        options.epub_path = text;
        assert!(matches!(
            orchestrator.run(&options).await,
            Err(RunError::NotAnEpub(_))
        ));
        assert_eq!(fixture.connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_archive_removes_workspace() {
        let fixture = Fixture::new(&[]);
        std::fs::write(fixture.dir.path().join("book.epub"), b"not a zip").unwrap();

        let result = fixture
            .orchestrator(&["k1"], ParserKind::Auto)
            .run(&fixture.options())
            .await;

        assert!(matches!(result, Err(RunError::Extraction(_))));
        assert!(!fixture.workspace_root().exists());
    }

    #[tokio::test]
    async fn test_book_without_documents() {
        let fixture = Fixture::new(&[]);

        let summary = fixture.run().await;

        assert_eq!(summary.processed, 0);
        assert!(summary.workspace_removed);
        assert!(fixture.output_path().exists());
    }
}
