//! Translation client.
//!
//! Wraps a single remote call with per-configuration retries, rotation to
//! the next credential/model pair on persistent failure, and a cooldown
//! wait when the whole pool is exhausted.

use crate::config::TranslationConfig;
use crate::console::Console;
use crate::error::{RemoteError, RemoteErrorKind};
use crate::filter::is_meaningful;
use crate::pool::RotationPool;
use crate::utils::preview;
use std::time::Duration;
use tracing::{debug, warn};

/// Characters shown in diagnostic logs.
const PREVIEW_CHARS: usize = 70;

/// Outcome of resolving one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The model returned a translation.
    Translated(String),
    /// Not worth translating; the original is its own translation.
    PassedThrough(String),
    /// No configuration could ever be established; the original is kept.
    Failed(String),
}

impl Resolution {
    /// The resulting text.
    pub fn text(&self) -> &str {
        match self {
            Resolution::Translated(t) | Resolution::PassedThrough(t) | Resolution::Failed(t) => t,
        }
    }

    /// Whether the segment resolved without an unrecoverable error.
    pub fn succeeded(&self) -> bool {
        !matches!(self, Resolution::Failed(_))
    }
}

/// Translator for turning segments into Simplified Chinese.
pub struct Translator {
    /// Instruction prepended to every segment.
    prompt: String,
    /// Retry and pacing configuration.
    config: TranslationConfig,
    /// Console for output.
    console: Console,
}

impl Translator {
    /// Create a new Translator.
    pub fn new(prompt: String, config: TranslationConfig) -> Self {
        Self {
            prompt,
            config,
            console: Console::new(),
        }
    }

    /// Builds the request payload for `text`.
    fn build_prompt(&self, text: &str) -> String {
        format!("{}{}", self.prompt, text)
    }

    /// Backoff before retry number `attempt` (1-based) on the same pair.
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2f64.powi(attempt.saturating_sub(1) as i32);
        Duration::from_secs_f64(self.config.retry_base_delay_sec * factor)
    }

    /// Translates one segment.
    ///
    /// Filtered text is passed through without a call. Otherwise the call is
    /// retried until it succeeds: errors are retried on the same pair with
    /// exponential backoff, and quota errors rotate immediately. Once every
    /// pair has failed (or none can be activated) the client cools down and
    /// starts over on the current pair. The only way to give up is a pool
    /// that never had a working pair.
    pub async fn translate(&self, pool: &mut RotationPool, text: &str) -> Resolution {
        if !is_meaningful(text) {
            debug!(text = %preview(text, PREVIEW_CHARS), "Skipping non-meaningful segment");
            return Resolution::PassedThrough(text.to_string());
        }

        if pool.active().is_none() && !pool.activate_next().await {
            self.console.error("No working API configuration, keeping original text");
            return Resolution::Failed(text.to_string());
        }

        let prompt = self.build_prompt(text);
        let mut attempt: u32 = 0;
        // Pairs given up on since the last cooldown; reaching the pool size
        // means every pair has failed once.
        let mut rotations: usize = 0;

        loop {
            let Some(active) = pool.active() else {
                return Resolution::Failed(text.to_string());
            };

            let result = match active.session().generate(&prompt).await {
                Ok(reply) if !reply.trim().is_empty() => Ok(reply.trim().to_string()),
                Ok(_) => Err(RemoteError::EmptyResponse),
                Err(e) => Err(e),
            };

            let error = match result {
                Ok(translated) => {
                    self.console.segment(text, &translated);
                    if self.config.delay_between_requests_sec > 0.0 {
                        tokio::time::sleep(Duration::from_secs_f64(
                            self.config.delay_between_requests_sec,
                        ))
                        .await;
                    }
                    return Resolution::Translated(translated);
                }
                Err(e) => e,
            };

            attempt += 1;
            if error.kind() == RemoteErrorKind::Retryable && attempt < self.config.retries {
                let delay = self.backoff(attempt);
                self.console.warning(&format!(
                    "{}, retrying in {:?} (attempt {}/{})",
                    error,
                    delay,
                    attempt + 1,
                    self.config.retries
                ));
                tokio::time::sleep(delay).await;
                continue;
            }

            warn!(error = %error, attempts = attempt, "Rotating API configuration");
            attempt = 0;
            rotations += 1;
            if rotations < pool.len() && pool.activate_next().await {
                if let Some(active) = pool.active() {
                    self.console.warning(&format!(
                        "Switched to key {} with model {}",
                        active.label, active.model
                    ));
                }
                continue;
            }

            let cooldown = Duration::from_secs_f64(self.config.cooldown_sec);
            self.console.warning(&format!(
                "All API configurations exhausted, waiting {:?} before retrying",
                cooldown
            ));
            tokio::time::sleep(cooldown).await;
            rotations = 0;
        }
    }
}
