//! Utility functions for common operations.

use crate::error::RemoteError;
use reqwest::StatusCode;
use std::io;
use std::path::Path;

/// Body fragments that identify a quota or rate-limit failure.
const QUOTA_MARKERS: &[&str] = &["resource_exhausted", "quota", "rate limit", "rate_limit"];

/// Shortens `text` to at most `max_chars` characters, appending `...` when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Masks an API key for display, keeping only a short prefix and suffix.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Maps an unsuccessful HTTP status and body to a classified remote error.
pub fn classify_status(status: StatusCode, body: &str) -> RemoteError {
    let message = format!("HTTP {}: {}", status, body);
    let lower = body.to_lowercase();

    if status == StatusCode::TOO_MANY_REQUESTS || QUOTA_MARKERS.iter().any(|m| lower.contains(m)) {
        RemoteError::QuotaExhausted(message)
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        RemoteError::Transient(message)
    } else {
        RemoteError::Other(message)
    }
}

/// Checks if an HTTP response is successful, and if not, returns a classified error.
pub async fn check_response_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, RemoteError> {
    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(classify_status(status, &text));
    }
    Ok(response)
}

/// Writes `contents` to `path` via a sibling temporary file and a rename,
/// so a crash never leaves a half-written file behind.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_preview_short_text() {
        assert_eq!(preview("Hello", 70), "Hello");
        assert_eq!(preview("", 70), "");
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("太阳升起了", 2), "太阳...");
        assert_eq!(preview("abcdef", 6), "abcdef");
        assert_eq!(preview("abcdefg", 6), "abcdef...");
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("short"), "*****");
        assert_eq!(mask_key("AIzaSyA1234567890xyz"), "AIza...0xyz");
    }

    #[test]
    fn test_classify_rate_limit() {
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, RemoteError::QuotaExhausted(_)));

        let err = classify_status(
            StatusCode::FORBIDDEN,
            r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#,
        );
        assert!(matches!(err, RemoteError::QuotaExhausted(_)));
    }

    #[test]
    fn test_classify_server_and_client_errors() {
        let err = classify_status(StatusCode::SERVICE_UNAVAILABLE, "overloaded");
        assert!(matches!(err, RemoteError::Transient(_)));

        let err = classify_status(StatusCode::BAD_REQUEST, "invalid model");
        assert!(matches!(err, RemoteError::Other(_)));
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("status.json");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert!(!dir.path().join("state").join("status.json.tmp").exists());
    }
}
