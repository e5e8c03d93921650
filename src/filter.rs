//! Heuristic filter deciding whether a text fragment is worth translating.
//!
//! Separators, page numbers and stray markup artifacts are passed through
//! untouched instead of being sent to the model.

use regex::Regex;
use std::sync::LazyLock;

/// Digits, whitespace and numeric punctuation only.
static NUMERIC_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d\s.,\-+]+$").expect("Invalid NUMERIC_REGEX"));

/// A run of symbols, optionally with one letter or ideograph in the middle.
static SYMBOL_RUN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\p{L}\p{N}\s]+(?:[\p{Latin}\p{Han}\p{Cyrillic}][^\p{L}\p{N}\s]+)?$")
        .expect("Invalid SYMBOL_RUN_REGEX")
});

/// Texts longer than this are subject to the script ratio check.
const RATIO_MIN_LENGTH: usize = 5;

/// Minimum share of Latin, CJK or Cyrillic characters.
const MIN_MEANINGFUL_RATIO: f64 = 0.15;

/// Returns true if `c` belongs to a script we treat as natural language.
fn is_meaningful_char(c: char) -> bool {
    matches!(c,
        'a'..='z'
        | 'A'..='Z'
        | '\u{00C0}'..='\u{00D6}'
        | '\u{00D8}'..='\u{00F6}'
        | '\u{00F8}'..='\u{024F}'
        | '\u{0400}'..='\u{04FF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}'
    )
}

/// Decides whether `text` should be sent to the translation service.
pub fn is_meaningful(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }

    if NUMERIC_REGEX.is_match(text) {
        return false;
    }

    let total = text.chars().count();
    if total > RATIO_MIN_LENGTH {
        let meaningful = text.chars().filter(|&c| is_meaningful_char(c)).count();
        if (meaningful as f64 / total as f64) < MIN_MEANINGFUL_RATIO {
            return false;
        }
    }

    !SYMBOL_RUN_REGEX.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_whitespace() {
        assert!(!is_meaningful(""));
        assert!(!is_meaningful("   \n\t"));
    }

    #[test]
    fn test_numbers_rejected() {
        assert!(!is_meaningful("12345"));
        assert!(!is_meaningful(" 3.14 "));
        assert!(!is_meaningful("+1 555-0100"));
        assert!(!is_meaningful("1,000"));
    }

    #[test]
    fn test_separators_rejected() {
        assert!(!is_meaningful("----"));
        assert!(!is_meaningful("***"));
        assert!(!is_meaningful("———"));
        assert!(!is_meaningful("---A---"));
        assert!(!is_meaningful("~~x~~"));
    }

    #[test]
    fn test_low_ratio_rejected() {
        assert!(!is_meaningful("$$$$$$$$a"));
        assert!(!is_meaningful("{} [] () <> 42"));
    }

    #[test]
    fn test_natural_language_accepted() {
        assert!(is_meaningful("Hello world"));
        assert!(is_meaningful("The sun rose."));
        assert!(is_meaningful("Chapter 1"));
        assert!(is_meaningful("Ça va?"));
        assert!(is_meaningful("Привет, мир"));
        assert!(is_meaningful("你好"));
        assert!(is_meaningful("I"));
    }

    #[test]
    fn test_short_mixed_text_accepted() {
        // Too short for the ratio check and not a pure symbol run
        assert!(is_meaningful("(a) b"));
        assert!(is_meaningful("a."));
    }
}
