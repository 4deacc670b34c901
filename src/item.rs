//! Items and layouts as loaded from a data source.
//!
//! Identifiers are path-like strings that always start and end with a slash
//! (`/`, `/about/`, `/blog/first-post/`). [`normalize_identifier`] is the only
//! way identifiers enter the system, so lookups can compare them verbatim.

use crate::content::{Content, Kind};
use std::time::SystemTime;

/// A modification time. `None` means unknown, which always forces
/// recompilation of whatever depends on it.
pub type Timestamp = Option<SystemTime>;

/// Name of the representation every item has.
pub const DEFAULT_REP: &str = "default";

/// Ensure an identifier has exactly one leading and one trailing slash.
///
/// - `"about"` → `"/about/"`
/// - `"/blog/post"` → `"/blog/post/"`
/// - `""` → `"/"`
pub fn normalize_identifier(raw: &str) -> String {
    let trimmed = raw.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

/// A unit of source content.
#[derive(Debug, Clone)]
pub struct Item {
    pub identifier: String,
    pub attributes: toml::Table,
    /// Text content, or the path of the source file for binary items.
    pub raw: Content,
    pub mtime: Timestamp,
}

impl Item {
    pub fn new(identifier: &str, raw: Content, mtime: Timestamp) -> Self {
        Self {
            identifier: normalize_identifier(identifier),
            attributes: toml::Table::new(),
            raw,
            mtime,
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Binary or text, fixed at load time.
    pub fn kind(&self) -> Kind {
        self.raw.kind()
    }

    pub fn attribute(&self, key: &str) -> Option<&toml::Value> {
        self.attributes.get(key)
    }

    /// String attribute, or `None` when absent or not a string.
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attribute(key).and_then(|v| v.as_str())
    }
}

/// A reusable wrapper template. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Layout {
    pub identifier: String,
    pub attributes: toml::Table,
    pub content: String,
    pub mtime: Timestamp,
}

impl Layout {
    pub fn new(identifier: &str, content: &str, mtime: Timestamp) -> Self {
        Self {
            identifier: normalize_identifier(identifier),
            attributes: toml::Table::new(),
            content: content.to_string(),
            mtime,
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&toml::Value> {
        self.attributes.get(key)
    }
}

/// Render an attribute value for text output: strings unquoted, everything
/// else in TOML notation.
pub fn display_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
