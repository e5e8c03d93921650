//! Remote translation capability.
//!
//! A [`Connector`] turns one (API key, model) pair into a live [`Session`];
//! a session answers prompts. Errors are classified so the caller can
//! choose between retrying, rotating and cooling down.

mod openai;
#[cfg(test)]
pub(crate) mod scripted;

pub use openai::OpenAiConnector;

use crate::error::RemoteError;
use async_trait::async_trait;

/// Establishes sessions for credential/model pairs.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns the human-readable name of this backend.
    fn name(&self) -> &'static str;

    /// Builds a working session bound to `credential` and `model`.
    async fn connect(&self, credential: &str, model: &str)
    -> Result<Box<dyn Session>, RemoteError>;
}

/// A live handle bound to one credential/model pair.
#[async_trait]
pub trait Session: Send + Sync {
    /// Sends a single text prompt and returns the model's answer.
    async fn generate(&self, prompt: &str) -> Result<String, RemoteError>;
}
