//! Configuration management for Fanyi.
//!
//! Handles loading, saving, and validating configuration from
//! platform-specific config directories.

use crate::document::ParserKind;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application name used for config directory.
const APP_NAME: &str = "fanyi";

/// Default config filename.
const CONFIG_FILENAME: &str = "config.toml";

/// Default instruction prepended to every segment sent to the model.
pub const DEFAULT_TRANSLATION_PROMPT: &str = r#"
Translate the following content into Simplified Chinese **only if the text clearly consists of meaningful, natural language** — such as full sentences, phrases, documentation, or conversational content.
Do **not translate** or modify the input if it meets **any** of the following conditions:
- It is structured content such as XML, HTML, JSON, or programming code.
- It contains markup, configuration, commands, paths, keys, tags, or variable names.
- It is composed only of symbols, placeholders, punctuation (e.g., ——— or ***), or lacks any semantic meaning.
- It is an isolated number, acronym, abbreviation, or Roman numeral without context.
- It is ambiguous or contextless and cannot be reliably identified as human language.
If the text **does not meet the criteria for confident, accurate translation**, return it **exactly as received**, with **no modifications**, **no formatting**, and **no added or invented content**.
Do **not include** any introductory text, explanation, or labels. Output only the translated text, or the original text unchanged if translation is not applicable.
"#;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Translation API configuration.
    pub api: ApiConfig,

    /// Retry and pacing settings.
    pub translation: TranslationConfig,

    /// LLM prompts.
    pub prompts: PromptsConfig,

    /// Document parsing settings.
    pub document: DocumentConfig,
}

/// API configuration for LLM endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the OpenAI-compatible endpoint.
    pub base_url: String,

    /// API keys, rotated through on failure.
    pub keys: Vec<String>,

    /// Model identifiers, rotated through on failure.
    pub models: Vec<String>,

    /// Per-request timeout in seconds.
    pub request_timeout_sec: u64,

    /// Probe the endpoint when activating a key so invalid keys are skipped early.
    pub verify_on_connect: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            keys: Vec::new(),
            models: vec!["gemini-2.0-flash-lite".to_string()],
            request_timeout_sec: 120,
            verify_on_connect: false,
        }
    }
}

impl ApiConfig {
    /// Checks if at least one usable API key is configured.
    pub fn is_configured(&self) -> bool {
        self.keys.iter().any(|k| !k.trim().is_empty())
    }
}

/// Translation behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Attempts against one key/model pair before rotating.
    pub retries: u32,

    /// First backoff delay in seconds, doubled after every failed attempt.
    pub retry_base_delay_sec: f64,

    /// Wait in seconds once every key/model pair has failed.
    pub cooldown_sec: f64,

    /// Delay between successful API requests in seconds.
    pub delay_between_requests_sec: f64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_base_delay_sec: 2.0,
            cooldown_sec: 60.0,
            delay_between_requests_sec: 0.0,
        }
    }
}

impl TranslationConfig {
    /// Settings with every delay zeroed, for tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            retry_base_delay_sec: 0.0,
            cooldown_sec: 0.0,
            delay_between_requests_sec: 0.0,
            ..Self::default()
        }
    }
}

/// LLM prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Instruction prepended to every segment.
    pub translation: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            translation: DEFAULT_TRANSLATION_PROMPT.to_string(),
        }
    }
}

/// Document parsing configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Which parser strategies to try.
    pub parser: ParserKind,
}

impl Config {
    /// Returns the platform-specific config directory path.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Returns the full path to the config file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Loads configuration from the default location.
    ///
    /// If the config file doesn't exist, creates a default one.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.api.is_configured() {
            return Err(ConfigError::MissingValue(
                "api.keys (pass --api-key or set GOOGLE_API_KEY)".to_string(),
            ));
        }

        if !self.api.models.iter().any(|m| !m.trim().is_empty()) {
            return Err(ConfigError::MissingValue("api.models".to_string()));
        }

        if url::Url::parse(&self.api.base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                key: "api.base_url".to_string(),
                message: format!("'{}' is not a valid URL", self.api.base_url),
            });
        }

        if self.api.request_timeout_sec == 0 {
            return Err(ConfigError::InvalidValue {
                key: "api.request_timeout_sec".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.translation.retries == 0 {
            return Err(ConfigError::InvalidValue {
                key: "translation.retries".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        let delays = [
            ("translation.retry_base_delay_sec", self.translation.retry_base_delay_sec),
            ("translation.cooldown_sec", self.translation.cooldown_sec),
            (
                "translation.delay_between_requests_sec",
                self.translation.delay_between_requests_sec,
            ),
        ];
        for (key, value) in delays {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be a non-negative number of seconds".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Returns the non-empty API keys, trimmed, in configured order.
    pub fn credentials(&self) -> Vec<String> {
        non_empty(&self.api.keys)
    }

    /// Returns the non-empty model identifiers, trimmed, in configured order.
    pub fn models(&self) -> Vec<String> {
        non_empty(&self.api.models)
    }
}

fn non_empty(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Environment variable holding comma-separated API keys.
pub const KEYS_ENV: &str = "FANYI_API_KEYS";

/// Single-key environment variable honored for compatibility.
pub const GOOGLE_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Picks the highest-priority non-empty credential source.
///
/// Command-line keys win over `FANYI_API_KEYS`, which wins over
/// `GOOGLE_API_KEY`. Returns `None` when the config file should be used.
pub fn credential_override(
    cli_keys: &[String],
    keys_env: Option<&str>,
    google_env: Option<&str>,
) -> Option<Vec<String>> {
    let cli = non_empty(cli_keys);
    if !cli.is_empty() {
        return Some(cli);
    }
    if let Some(keys) = keys_env.map(parse_key_list).filter(|k| !k.is_empty()) {
        return Some(keys);
    }
    google_env
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|k| vec![k.to_string()])
}

/// Reads a custom prompt file.
///
/// Returns the trimmed content followed by a blank line, or `None` if the
/// file is missing, unreadable, or blank.
pub fn read_prompt_file(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("{}\n\n", trimmed))
    }
}

/// Parses a comma-separated list of API keys, as accepted from the environment.
pub fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}
