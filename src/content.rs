//! Content values and the per-representation snapshot store.
//!
//! A representation's content is either a text buffer or a reference to a
//! binary file on disk, never both. [`Content`] carries that distinction as
//! a tagged variant so the kind of whatever sits in a slot is always known
//! from the value itself.
//!
//! The [`SnapshotStore`] is a set of named slots rather than a history: the
//! `last` slot is overwritten by every pipeline step, and named slots
//! (`raw`, `pre`, `post`, user-defined ones) are written explicitly and stay
//! frozen until written again.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Initial content, captured before any filter runs.
pub const RAW: &str = "raw";
/// Content before the first layout is applied.
pub const PRE: &str = "pre";
/// Content right after a layout is applied.
pub const POST: &str = "post";
/// Most recently produced content. Always present.
pub const LAST: &str = "last";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Snapshot '{0}' was never written")]
    Missing(String),
}

/// Whether content is a text buffer or a file reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Text,
    Binary,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Text => f.write_str("text"),
            Kind::Binary => f.write_str("binary"),
        }
    }
}

/// Content of a representation at some pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Binary(PathBuf),
}

impl Content {
    pub fn kind(&self) -> Kind {
        match self {
            Content::Text(_) => Kind::Text,
            Content::Binary(_) => Kind::Binary,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(s) => Some(s),
            Content::Binary(_) => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Content::Text(_) => None,
            Content::Binary(p) => Some(p),
        }
    }
}

/// Named content slots for one representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStore {
    last: Content,
    named: BTreeMap<String, Content>,
}

impl SnapshotStore {
    /// Create a store whose `raw` and `last` slots hold `initial`.
    pub fn new(initial: Content) -> Self {
        let mut named = BTreeMap::new();
        named.insert(RAW.to_string(), initial.clone());
        Self {
            last: initial,
            named,
        }
    }

    /// Create a store holding only `last`, with no named slots.
    ///
    /// Used for representations restored from previous output, whose
    /// intermediate snapshots are unknown.
    pub fn with_last(last: Content) -> Self {
        Self {
            last,
            named: BTreeMap::new(),
        }
    }

    /// Write `value` to `slot`. `last` is always updated as well.
    pub fn write(&mut self, slot: &str, value: Content) {
        if slot != LAST {
            self.named.insert(slot.to_string(), value.clone());
        }
        self.last = value;
    }

    /// Copy `last` into `slot`, leaving every other slot untouched.
    pub fn capture(&mut self, slot: &str) {
        if slot != LAST {
            self.named.insert(slot.to_string(), self.last.clone());
        }
    }

    pub fn read(&self, slot: &str) -> Result<&Content, SnapshotError> {
        if slot == LAST {
            return Ok(&self.last);
        }
        self.named
            .get(slot)
            .ok_or_else(|| SnapshotError::Missing(slot.to_string()))
    }

    pub fn last(&self) -> &Content {
        &self.last
    }

    pub fn contains(&self, slot: &str) -> bool {
        slot == LAST || self.named.contains_key(slot)
    }

    /// Kind of the content currently in `last`.
    pub fn kind(&self) -> Kind {
        self.last.kind()
    }

    /// The slot `compiled_content` reads when none is named: `pre` if it
    /// exists, `last` otherwise.
    pub fn default_slot(&self) -> &'static str {
        if self.named.contains_key(PRE) { PRE } else { LAST }
    }

    /// All textual slots, `last` included. Binary slots are left out.
    pub fn text_slots(&self) -> BTreeMap<String, String> {
        let mut slots: BTreeMap<String, String> = self
            .named
            .iter()
            .filter_map(|(name, c)| c.as_text().map(|t| (name.clone(), t.to_string())))
            .collect();
        if let Some(text) = self.last.as_text() {
            slots.insert(LAST.to_string(), text.to_string());
        }
        slots
    }

    /// Rebuild a store from persisted textual slots. Returns `None` when
    /// `last` is missing.
    pub fn from_text_slots(slots: &BTreeMap<String, String>) -> Option<Self> {
        let last = Content::Text(slots.get(LAST)?.clone());
        let named = slots
            .iter()
            .filter(|(name, _)| name.as_str() != LAST)
            .map(|(name, text)| (name.clone(), Content::Text(text.clone())))
            .collect();
        Some(Self { last, named })
    }
}
