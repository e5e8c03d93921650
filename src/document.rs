//! HTML/XHTML document handling.
//!
//! Documents are decoded by an ordered list of parser strategies, walked for
//! translatable text nodes, patched in place and serialized back as UTF-8.

use crate::error::DocumentError;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use regex::Regex;
use ego_tree::NodeRef;
use ego_tree::iter::Edge;
use scraper::{Html, Node};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt::Write;
use std::sync::LazyLock;

/// Elements whose text is never translated.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "title", "meta", "link", "head", "noscript", "code",
];

/// Elements written with a self-closing tag.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose text the parser keeps verbatim, entities included.
const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

/// How many leading bytes are inspected for a charset declaration.
const SNIFF_LEN: usize = 1024;

/// Leading XML declaration, kept aside because the HTML tree builder
/// would turn it into a comment.
static XML_DECL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(<\?xml[^>]*\?>)").expect("Invalid XML_DECL_REGEX"));

/// `encoding="..."` inside an XML declaration.
static XML_ENCODING_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"encoding\s*=\s*["']([A-Za-z0-9._-]+)["']"#).expect("Invalid XML_ENCODING_REGEX")
});

/// `<meta charset>` or `content="...; charset=..."`.
static META_CHARSET_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*charset\s*=\s*["']?([A-Za-z0-9._-]+)"#)
        .expect("Invalid META_CHARSET_REGEX")
});

/// `charset=` inside a `<meta http-equiv>` content attribute.
static CONTENT_CHARSET_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(charset\s*=\s*)[A-Za-z0-9._-]+").expect("Invalid CONTENT_CHARSET_REGEX")
});

/// Which parser strategies to try, selected once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    /// Strict UTF-8 first, then charset-sniffing decode.
    #[default]
    Auto,
    /// Strict UTF-8 only.
    Utf8,
    /// Charset-sniffing decode only.
    Lossy,
}

impl ParserKind {
    /// Returns the strategies to try, in order.
    pub fn strategies(self) -> Vec<Box<dyn ParserStrategy>> {
        match self {
            ParserKind::Auto => vec![Box::new(Utf8Parser), Box::new(LossyParser)],
            ParserKind::Utf8 => vec![Box::new(Utf8Parser)],
            ParserKind::Lossy => vec![Box::new(LossyParser)],
        }
    }
}

/// One way of turning raw bytes into a [`Document`].
pub trait ParserStrategy {
    /// Returns the human-readable name of this strategy.
    fn name(&self) -> &'static str;

    /// Decodes and parses `bytes`.
    fn parse(&self, bytes: &[u8]) -> Result<Document, DocumentError>;
}

/// Accepts only well-formed UTF-8, with or without a BOM.
pub struct Utf8Parser;

impl ParserStrategy for Utf8Parser {
    fn name(&self) -> &'static str {
        "utf-8"
    }

    fn parse(&self, bytes: &[u8]) -> Result<Document, DocumentError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let text = std::str::from_utf8(bytes).map_err(|e| DocumentError::Decode {
            parser: self.name(),
            message: e.to_string(),
        })?;
        Ok(Document::from_text(text))
    }
}

/// Decodes using the BOM or a declared charset, falling back to windows-1252.
pub struct LossyParser;

impl LossyParser {
    fn sniff(bytes: &[u8]) -> (&'static Encoding, usize) {
        if let Some(found) = Encoding::for_bom(bytes) {
            return found;
        }

        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(SNIFF_LEN)]);
        let declared = XML_DECL_REGEX
            .captures(&head)
            .and_then(|c| XML_ENCODING_REGEX.captures(c.get(1)?.as_str()))
            .or_else(|| META_CHARSET_REGEX.captures(&head))
            .and_then(|c| Encoding::for_label(c.get(1)?.as_str().as_bytes()));

        match declared {
            Some(encoding) => (encoding, 0),
            None if std::str::from_utf8(bytes).is_ok() => (UTF_8, 0),
            None => (WINDOWS_1252, 0),
        }
    }
}

impl ParserStrategy for LossyParser {
    fn name(&self) -> &'static str {
        "charset-sniffing"
    }

    fn parse(&self, bytes: &[u8]) -> Result<Document, DocumentError> {
        let (encoding, bom_len) = Self::sniff(bytes);
        let (text, _, had_errors) = encoding.decode(&bytes[bom_len..]);
        if had_errors {
            tracing::debug!(
                encoding = encoding.name(),
                "Replaced malformed sequences while decoding"
            );
        }
        Ok(Document::from_text(&text))
    }
}

/// A parsed HTML/XHTML document.
pub struct Document {
    html: Html,
    xml_declaration: Option<String>,
}

/// Returns true if `node` is a text node worth translating, given its parent.
fn is_translatable(node: &Node, parent: Option<&Node>) -> bool {
    let Some(text) = node.as_text() else {
        return false;
    };
    if text.trim().is_empty() {
        return false;
    }
    match parent.and_then(Node::as_element) {
        Some(element) => !SKIPPED_TAGS.contains(&element.name()),
        None => false,
    }
}

impl Document {
    /// Parses `bytes` with each strategy in turn, returning the first success.
    pub fn parse(bytes: &[u8], kind: ParserKind) -> Result<Self, DocumentError> {
        let mut failures = Vec::new();
        for strategy in kind.strategies() {
            match strategy.parse(bytes) {
                Ok(document) => return Ok(document),
                Err(e) => {
                    tracing::debug!(parser = strategy.name(), error = %e, "Parser strategy failed");
                    failures.push(e.to_string());
                }
            }
        }
        Err(DocumentError::Unparseable(failures.join("; ")))
    }

    /// Parses already decoded text.
    pub fn from_text(text: &str) -> Self {
        let (xml_declaration, body) = match XML_DECL_REGEX.captures(text) {
            Some(caps) => {
                let whole = caps.get(0).map_or(0, |m| m.end());
                let decl = caps.get(1).map(|m| normalize_declaration(m.as_str()));
                (decl, &text[whole..])
            }
            None => (None, text),
        };

        Self {
            html: Html::parse_document(body),
            xml_declaration,
        }
    }

    /// Returns the text of every translatable node, in document order.
    pub fn segments(&self) -> Vec<String> {
        self.html
            .tree
            .root()
            .descendants()
            .filter(|n| is_translatable(n.value(), n.parent().map(|p| p.value())))
            .filter_map(|n| n.value().as_text().map(|t| t.to_string()))
            .collect()
    }

    /// Replaces the text of every translatable node, in the order returned
    /// by [`segments`](Self::segments).
    pub fn replace_segments(&mut self, replacements: &[String]) -> Result<(), DocumentError> {
        let ids: Vec<_> = self
            .html
            .tree
            .root()
            .descendants()
            .filter(|n| is_translatable(n.value(), n.parent().map(|p| p.value())))
            .map(|n| n.id())
            .collect();

        if ids.len() != replacements.len() {
            return Err(DocumentError::SegmentMismatch {
                expected: ids.len(),
                actual: replacements.len(),
            });
        }

        for (id, replacement) in ids.into_iter().zip(replacements) {
            if let Some(mut node) = self.html.tree.get_mut(id) {
                if let Node::Text(text) = node.value() {
                    text.text = replacement.as_str().into();
                }
            }
        }
        Ok(())
    }

    /// Serializes the document as UTF-8 XHTML.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        if let Some(decl) = &self.xml_declaration {
            out.push_str(decl);
            out.push('\n');
        }
        for edge in self.html.tree.root().traverse() {
            match edge {
                Edge::Open(node) => open_node(node, &mut out),
                Edge::Close(node) => close_node(node, &mut out),
            }
        }
        out.into_bytes()
    }
}

/// Writes the opening half of `node` in XML syntax.
fn open_node(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Document | Node::Fragment => {}
        Node::Doctype(doctype) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(doctype.name());
            match (doctype.public_id(), doctype.system_id()) {
                ("", "") => {}
                ("", system) => {
                    let _ = write!(out, r#" SYSTEM "{}""#, system);
                }
                (public, system) => {
                    let _ = write!(out, r#" PUBLIC "{}" "{}""#, public, system);
                }
            }
            out.push('>');
        }
        Node::Comment(comment) => {
            let _ = write!(out, "<!--{}-->", &**comment);
        }
        Node::ProcessingInstruction(pi) => {
            let _ = write!(out, "<?{} {}?>", pi.target, pi.data);
        }
        Node::Text(text) => {
            let raw = node
                .parent()
                .and_then(|p| p.value().as_element())
                .is_some_and(|e| RAW_TEXT_TAGS.contains(&e.name()));
            if raw {
                out.push_str(text);
            } else {
                escape_into(text, false, out);
            }
        }
        Node::Element(element) => {
            out.push('<');
            out.push_str(element.name());
            for (name, value) in element.attrs.iter() {
                out.push(' ');
                if let Some(prefix) = &name.prefix {
                    let _ = write!(out, "{}:", prefix);
                }
                out.push_str(&name.local);
                out.push_str("=\"");
                escape_into(&output_attribute(element.name(), &name.local, value), true, out);
                out.push('"');
            }
            if is_void(element.name()) && !node.has_children() {
                out.push_str("/>");
            } else {
                out.push('>');
            }
        }
    }
}

/// Writes the closing half of `node`, if it has one.
fn close_node(node: NodeRef<'_, Node>, out: &mut String) {
    if let Node::Element(element) = node.value() {
        if !(is_void(element.name()) && !node.has_children()) {
            let _ = write!(out, "</{}>", element.name());
        }
    }
}

/// Rewrites charset declarations in `<meta>`, since output is always UTF-8.
fn output_attribute<'a>(element: &str, attribute: &str, value: &'a str) -> Cow<'a, str> {
    if element != "meta" {
        return Cow::Borrowed(value);
    }
    match attribute {
        "charset" => Cow::Borrowed("utf-8"),
        "content" => CONTENT_CHARSET_REGEX.replace(value, "${1}utf-8"),
        _ => Cow::Borrowed(value),
    }
}

fn is_void(name: &str) -> bool {
    VOID_TAGS.contains(&name)
}

/// Escapes markup characters; quotes too when writing an attribute value.
fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

/// Rewrites a declared non-UTF-8 encoding, since output is always UTF-8.
fn normalize_declaration(decl: &str) -> String {
    match XML_ENCODING_REGEX.captures(decl).and_then(|c| c.get(1)) {
        Some(m) if !m.as_str().eq_ignore_ascii_case("utf-8") => {
            XML_ENCODING_REGEX
                .replace(decl, r#"encoding="utf-8""#)
                .into_owned()
        }
        _ => decl.to_string(),
    }
}

/// Keeps the edge whitespace of `original` around `resolved`.
pub fn with_original_spacing(original: &str, resolved: &str) -> String {
    let trimmed_start = original.trim_start();
    let leading = &original[..original.len() - trimmed_start.len()];
    let trailing = &trimmed_start[trimmed_start.trim_end().len()..];
    format!("{}{}{}", leading, resolved, trailing)
}
