//! Fanyi - EPUB to Simplified Chinese translator.
//!
//! This library provides functionality for:
//! - Extracting an EPUB into a resumable workspace and repackaging it
//! - Walking HTML/XHTML text nodes and replacing them with translations
//! - Translating segments through OpenAI-compatible APIs with key/model rotation
//! - Persisting per-file progress and a per-segment cache between runs

pub mod archive;
pub mod backend;
pub mod cache;
pub mod config;
pub mod console;
pub mod document;
pub mod error;
pub mod filter;
pub mod orchestrator;
pub mod pool;
pub mod progress;
pub mod translator;
pub mod utils;
pub mod workspace;

// Re-export commonly used types
pub use backend::{Connector, OpenAiConnector, Session};
pub use config::Config;
pub use console::Console;
pub use document::{Document, ParserKind};
pub use error::{ArchiveError, ConfigError, DocumentError, RemoteError, RunError, StateError};
pub use orchestrator::{Orchestrator, RunOptions, RunState, RunSummary};
pub use pool::RotationPool;
pub use progress::{FileStatus, ProgressTracker};
pub use translator::{Resolution, Translator};
