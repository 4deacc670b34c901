//! Filters: named content transformations.
//!
//! A [`Filter`] declares the kind of content it accepts and the kind it
//! produces. The compiler checks the declared input kind against the
//! representation's current content before running a filter, and checks the
//! returned content against the declared output kind afterwards, so a filter
//! only ever converts between text and binary when it says it does.
//!
//! Filters that produce binary content write a file to
//! [`FilterContext::output_filename`] and return a reference to it.
//!
//! | Filter | Input | Output | Purpose |
//! |--------|-------|--------|---------|
//! | [`markdown`] | text | text | CommonMark to HTML |
//! | [`template`] | text | text | `{{ ... }}` substitution, used for layouts |
//! | [`checksum`] | binary | text | SHA-256 digest of a file |
//!
//! Lookup is by name through a [`FilterRegistry`], resolved once per step.

pub mod checksum;
pub mod markdown;
pub mod template;

use crate::content::{Content, Kind, SnapshotError};
use crate::item::{DEFAULT_REP, Item, Layout, normalize_identifier};
use crate::rep::{ItemRep, Outcome, find_rep};
use crate::site::Site;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Snapshot(#[from] SnapshotError),
    #[error("Template error: {0}")]
    Template(String),
    #[error("Unknown template expression: {0}")]
    UnknownExpression(String),
    #[error("No representation '{rep}' for item {identifier}")]
    UnknownRep { identifier: String, rep: String },
    #[error("Compiled content of {0} is binary")]
    BinaryContent(String),
    #[error("{0}")]
    Failed(String),
}

/// Everything a filter may read while it runs.
pub struct FilterContext<'a> {
    pub item: &'a Item,
    /// Name of the representation being compiled.
    pub rep: &'a str,
    /// Web path of the representation being compiled, if routed.
    pub path: Option<&'a str>,
    pub site: &'a Site,
    /// The layout being applied, when the filter renders one.
    pub layout: Option<&'a Layout>,
    /// The representation's current content. When a layout is rendered this
    /// is the content the layout wraps.
    pub content: &'a Content,
    /// Where a binary-producing filter must write its output.
    pub output_filename: PathBuf,
    pub(crate) reps: &'a [ItemRep],
}

impl FilterContext<'_> {
    /// Compiled content of another representation, or `NotReady` if it
    /// hasn't been compiled yet. Defaults: rep `default`, snapshot `pre` if
    /// present, else `last`.
    pub fn compiled_content(
        &self,
        identifier: &str,
        rep: Option<&str>,
        snapshot: Option<&str>,
    ) -> Result<Outcome<String>, FilterError> {
        let identifier = normalize_identifier(identifier);
        let name = rep.unwrap_or(DEFAULT_REP);
        let target =
            find_rep(self.reps, &identifier, name).ok_or_else(|| FilterError::UnknownRep {
                identifier: identifier.clone(),
                rep: name.to_string(),
            })?;
        match target.compiled_content(snapshot)? {
            Outcome::NotReady(id) => Ok(Outcome::NotReady(id)),
            Outcome::Ready(Content::Text(text)) => Ok(Outcome::Ready(text.clone())),
            Outcome::Ready(Content::Binary(_)) => {
                Err(FilterError::BinaryContent(target.to_string()))
            }
        }
    }
}

pub trait Filter {
    fn input_kind(&self) -> Kind {
        Kind::Text
    }

    fn output_kind(&self) -> Kind {
        Kind::Text
    }

    fn run(
        &self,
        input: &Content,
        params: &toml::Table,
        ctx: &FilterContext<'_>,
    ) -> Result<Outcome<Content>, FilterError>;
}

/// Filters by name.
#[derive(Default)]
pub struct FilterRegistry {
    filters: HashMap<String, Box<dyn Filter>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `markdown`, `template` and `checksum`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("markdown", markdown::Markdown);
        registry.register("template", template::Template);
        registry.register("checksum", checksum::Checksum);
        registry
    }

    /// Register `filter` under `name`, replacing any filter already there.
    pub fn register(&mut self, name: &str, filter: impl Filter + 'static) {
        self.filters.insert(name.to_string(), Box::new(filter));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Filter> {
        self.filters.get(name).map(|f| f.as_ref())
    }
}

/// Text input of a text filter. Binary input here means the compiler's kind
/// check was bypassed.
pub(crate) fn expect_text<'c>(input: &'c Content, filter: &str) -> Result<&'c str, FilterError> {
    input
        .as_text()
        .ok_or_else(|| FilterError::Failed(format!("{filter} filter received binary content")))
}
