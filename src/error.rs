//! Error types for the Fanyi application.
//!
//! Uses `thiserror` for structured error definitions that provide
//! clear context about what went wrong.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Missing required configuration value
    #[error("Missing required config value: {0}")]
    MissingValue(String),

    /// Invalid configuration value
    #[error("Invalid config value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Config directory not found
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Broad category of a remote failure, used to pick a recovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Quota or rate limit hit: rotate away immediately.
    Quota,
    /// Worth retrying against the same configuration.
    Retryable,
}

/// Error type for calls to the remote translation service.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The credential/model pair ran out of quota or was rate limited
    #[error("Quota exhausted: {0}")]
    QuotaExhausted(String),

    /// Network hiccup or server-side failure
    #[error("Transient API failure: {0}")]
    Transient(String),

    /// The model answered with nothing usable
    #[error("Empty response from model")]
    EmptyResponse,

    /// Any other API error
    #[error("API error: {0}")]
    Other(String),
}

impl RemoteError {
    /// Returns the recovery category of this error.
    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            RemoteError::QuotaExhausted(_) => RemoteErrorKind::Quota,
            RemoteError::Transient(_) | RemoteError::EmptyResponse | RemoteError::Other(_) => {
                RemoteErrorKind::Retryable
            }
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            RemoteError::Transient(e.to_string())
        } else {
            RemoteError::Other(e.to_string())
        }
    }
}

/// Error type for HTML/XHTML document handling.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// Bytes are not valid in the encoding a strategy requires
    #[error("{parser} parser could not decode document: {message}")]
    Decode {
        parser: &'static str,
        message: String,
    },

    /// Every configured parser strategy failed
    #[error("No parser strategy could read the document ({0})")]
    Unparseable(String),

    /// Replacement list does not line up with the document's segments
    #[error("Expected {expected} replacement segments, got {actual}")]
    SegmentMismatch { expected: usize, actual: usize },
}

/// Error type for EPUB archive operations.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Filesystem failure
    #[error("Archive I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed zip container
    #[error("Invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Entry would escape the extraction directory
    #[error("Unsafe entry path in archive: {0}")]
    UnsafePath(String),

    /// EPUB directory has no mimetype file
    #[error("mimetype file not found in {0}")]
    MissingMimetype(PathBuf),

    /// Directory walk failed
    #[error("Failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Error type for persisted workspace state.
#[derive(Error, Debug)]
pub enum StateError {
    /// Failed to read or write a state file
    #[error("State file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// State file exists but is not valid JSON of the expected shape
    #[error("Corrupt state file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Failed to serialize state
    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Directory walk failed
    #[error("Failed to walk workspace: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Fatal errors that stop a translation run.
#[derive(Error, Debug)]
pub enum RunError {
    /// Input EPUB does not exist
    #[error("EPUB file not found at '{0}'")]
    InputNotFound(PathBuf),

    /// Input does not have an .epub extension
    #[error("The provided file '{0}' does not appear to be an EPUB file")]
    NotAnEpub(PathBuf),

    /// No API credentials were supplied
    #[error("No API key provided")]
    NoCredentials,

    /// No model identifiers were supplied
    #[error("No model configured")]
    NoModels,

    /// Not a single credential/model pair could be activated
    #[error("No usable API configuration out of {pairs} credential/model pairs")]
    NoWorkingConfiguration { pairs: usize },

    /// Unpacking the EPUB failed
    #[error("Failed to extract EPUB: {0}")]
    Extraction(#[source] ArchiveError),

    /// Repacking the EPUB failed
    #[error("Failed to create translated EPUB: {0}")]
    Packaging(#[source] ArchiveError),

    /// Persisted state could not be read or written
    #[error(transparent)]
    State(#[from] StateError),

    /// Filesystem failure outside the archive and state layers
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using anyhow for application-level error handling.
pub type Result<T> = anyhow::Result<T>;
