//! Per-line classification into raw text, JSON objects, and JSON arrays.

use serde_json::{Map, Value};

/// A single classified line from a text stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SieveEvent {
    /// A line that is not a JSON object or array, untrimmed.
    RawLine(String),
    /// A line holding a complete JSON object.
    JsonObject(Map<String, Value>),
    /// A line holding a complete JSON array.
    JsonArray(Vec<Value>),
}

impl SieveEvent {
    /// Returns true if the line parsed as JSON.
    #[must_use]
    pub fn is_json(&self) -> bool {
        matches!(self, Self::JsonObject(_) | Self::JsonArray(_))
    }

    /// Returns the raw text if this is a `RawLine`.
    #[must_use]
    pub fn as_line(&self) -> Option<&str> {
        match self {
            Self::RawLine(line) => Some(line),
            _ => None,
        }
    }

    /// Convert a JSON event into a `serde_json::Value`.
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::JsonObject(map) => Some(Value::Object(map)),
            Self::JsonArray(items) => Some(Value::Array(items)),
            Self::RawLine(_) => None,
        }
    }
}

/// Characters ignored around a JSON candidate: whitespace, the byte order
/// mark, and ASCII control characters.
fn is_fuzz(c: char) -> bool {
    c.is_whitespace() || c <= '\u{1f}' || c == '\u{feff}'
}

/// Classify one line, excluding its terminating newline.
///
/// Only object and array shapes are ever decoded; bare strings and numbers
/// stay raw lines since they are common in ordinary output.
#[must_use]
pub fn classify_line(line: &str) -> SieveEvent {
    let trimmed = line.trim_matches(is_fuzz);

    if trimmed.len() >= 2 {
        if trimmed.starts_with('{') && trimmed.ends_with('}') {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
                return SieveEvent::JsonObject(map);
            }
        }

        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) {
                return SieveEvent::JsonArray(items);
            }
        }
    }

    SieveEvent::RawLine(line.to_string())
}
