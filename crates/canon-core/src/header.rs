//! Document header extraction.
//!
//! Canonical documents are small XML fragments with a `<header>` section
//! carrying a `<title>` and any number of additional scalar fields. Only the
//! header is read here; the body is stored as-is.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

/// Typed failures raised while reading a document header.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("document has no <header> section")]
    MissingHeader,
    #[error("document header has no non-blank <title>")]
    MissingTitle,
}

/// Parsed header: the title plus every top-level header field.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderPayload {
    pub title: String,
    /// Field name to text. Repeated fields collapse into an array.
    pub payload: Map<String, JsonValue>,
}

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<header\b[^>]*>(.*?)</header\s*>").expect("valid header regex")
    })
}

fn open_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<([A-Za-z_][\w:.-]*)\b[^>]*?(/?)>").expect("valid tag regex"))
}

fn markup_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid markup regex"))
}

/// Extract the title and structured header fields from a raw document.
pub fn parse_header(raw: &str) -> Result<HeaderPayload, HeaderError> {
    let section = header_regex()
        .captures(raw)
        .and_then(|c| c.get(1))
        .ok_or(HeaderError::MissingHeader)?
        .as_str();

    let mut payload = Map::new();
    let mut cursor = 0;
    while let Some(open) = open_tag_regex().captures_at(section, cursor) {
        let Some(whole) = open.get(0).map(|m| m.range()) else {
            break;
        };
        let name = &open[1];
        if !open[2].is_empty() {
            insert_field(&mut payload, name, String::new());
            cursor = whole.end;
            continue;
        }
        let close = format!("</{}>", name);
        let Some(rel_end) = section[whole.end..].find(&close) else {
            // Unbalanced element; skip the opening tag and keep scanning.
            cursor = whole.end;
            continue;
        };
        let inner = &section[whole.end..whole.end + rel_end];
        insert_field(&mut payload, name, element_text(inner));
        cursor = whole.end + rel_end + close.len();
    }

    let title = match payload.get("title") {
        Some(JsonValue::String(t)) => t.clone(),
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(JsonValue::as_str)
            .find(|t| !t.is_empty())
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    };
    if title.is_empty() {
        return Err(HeaderError::MissingTitle);
    }

    Ok(HeaderPayload { title, payload })
}

fn insert_field(payload: &mut Map<String, JsonValue>, name: &str, text: String) {
    match payload.get_mut(name) {
        None => {
            payload.insert(name.to_string(), JsonValue::String(text));
        }
        Some(JsonValue::Array(items)) => items.push(JsonValue::String(text)),
        Some(existing) => {
            let first = existing.take();
            *existing = JsonValue::Array(vec![first, JsonValue::String(text)]);
        }
    }
}

/// Flatten nested markup, unescape entities and collapse whitespace.
fn element_text(inner: &str) -> String {
    let stripped = markup_regex().replace_all(inner, " ");
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    unescape_xml(&collapsed)
}

/// Escape text for inclusion in element content or attribute values.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Reverse [`escape_xml`]. `&amp;` is handled last so double-escaped input
/// round-trips one level only.
pub fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
