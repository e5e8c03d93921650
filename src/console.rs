//! Console output formatting with ANSI color support.
//!
//! User-facing progress for a translation run: per-file headers, per-segment
//! echoes and the final summary. Colors follow TTY detection and NO_COLOR.

use crate::utils::preview;
use std::io::{self, IsTerminal};

/// Characters shown when echoing a segment.
const SEGMENT_PREVIEW_CHARS: usize = 70;

/// ANSI style codes for terminal formatting.
#[derive(Debug, Clone, Copy)]
pub enum Style {
    Bold,
    Red,
    Green,
    Yellow,
    Blue,
    Cyan,
    Gray,
}

impl Style {
    /// Returns the ANSI escape code for this style.
    fn code(self) -> &'static str {
        match self {
            Style::Bold => "1",
            Style::Red => "31",
            Style::Green => "32",
            Style::Yellow => "33",
            Style::Blue => "34",
            Style::Cyan => "36",
            Style::Gray => "90",
        }
    }
}

const RESET: &str = "\x1b[0m";

/// Severity of a labelled console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Info,
    Ok,
    Warn,
    Error,
    Step,
}

impl Level {
    fn tag(self) -> (&'static str, Style) {
        match self {
            Level::Info => ("INFO", Style::Blue),
            Level::Ok => ("OK", Style::Green),
            Level::Warn => ("WARN", Style::Yellow),
            Level::Error => ("ERROR", Style::Red),
            Level::Step => ("STEP", Style::Cyan),
        }
    }
}

/// Run progress printer; colors follow TTY detection and NO_COLOR.
#[derive(Debug, Default)]
pub struct Console {
    colors_enabled: bool,
}

impl Console {
    /// Creates a console, enabling colors only for a terminal without `NO_COLOR`.
    pub fn new() -> Self {
        Self::with_colors(std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal())
    }

    /// Creates a Console with colors explicitly enabled or disabled.
    pub fn with_colors(enabled: bool) -> Self {
        Self {
            colors_enabled: enabled,
        }
    }

    /// Applies ANSI styles to text if colors are enabled.
    pub fn style(&self, text: &str, styles: &[Style]) -> String {
        if !self.colors_enabled || styles.is_empty() {
            return text.to_string();
        }

        let codes: Vec<&str> = styles.iter().map(|s| s.code()).collect();
        format!("\x1b[{}m{}{}", codes.join(";"), text, RESET)
    }

    /// Formats `message` behind its `[LABEL]`.
    fn line(&self, level: Level, message: &str) -> String {
        let (tag, color) = level.tag();
        format!("[{}] {}", self.style(tag, &[color, Style::Bold]), message)
    }

    fn emit(&self, level: Level, message: &str) {
        let line = self.line(level, message);
        if level == Level::Error {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    pub fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }

    pub fn success(&self, message: &str) {
        self.emit(Level::Ok, message);
    }

    pub fn warning(&self, message: &str) {
        self.emit(Level::Warn, message);
    }

    /// Printed to stderr.
    pub fn error(&self, message: &str) {
        self.emit(Level::Error, message);
    }

    pub fn step(&self, message: &str) {
        self.emit(Level::Step, message);
    }

    /// Prints a blank line and a bold heading.
    pub fn section(&self, message: &str) {
        println!();
        println!("{}", self.style(message, &[Style::Bold]));
    }

    /// Returns text styled as muted (dim gray).
    pub fn muted(&self, text: &str) -> String {
        self.style(text, &[Style::Gray])
    }

    /// Formats a count with styling (e.g., for file totals).
    pub fn count(&self, n: usize) -> String {
        self.style(&n.to_string(), &[Style::Green, Style::Bold])
    }

    /// Formats a file position like `[3/12]` with styling.
    pub fn file_position(&self, index: usize, total: usize) -> String {
        self.style(&format!("[{}/{}]", index, total), &[Style::Cyan, Style::Bold])
    }

    /// Formats the original/translated pair of a segment as two lines.
    pub fn segment_lines(&self, original: &str, translated: &str) -> (String, String) {
        (
            format!(
                "  {} {}",
                self.muted("Original:"),
                preview(original, SEGMENT_PREVIEW_CHARS)
            ),
            format!(
                "  {} {}",
                self.style("Translated:", &[Style::Green]),
                preview(translated, SEGMENT_PREVIEW_CHARS)
            ),
        )
    }

    /// Prints a freshly translated segment.
    pub fn segment(&self, original: &str, translated: &str) {
        let (first, second) = self.segment_lines(original, translated);
        println!("{}", first);
        println!("{}", second);
    }

    /// Prints the header for the file about to be translated.
    pub fn file_header(&self, index: usize, total: usize, name: &str, status: &str) {
        println!(
            "{} {} {}",
            self.file_position(index, total),
            self.style(name, &[Style::Bold]),
            self.muted(&format!("(status: {})", status))
        );
    }
}
