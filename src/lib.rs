//! # Rendition
//!
//! An incremental static-site compiler. Source items (text or binary) are
//! compiled into output files by per-item pipelines of filters, layouts and
//! snapshots, and only items whose inputs changed are recompiled.
//!
//! # Architecture: Load, Route, Compile
//!
//! ```text
//! 1. Load     content/ + layouts/ + rules.toml  →  Site, RuleSet
//! 2. Route    every representation              →  output path (collisions fail here)
//! 3. Compile  outdated representations          →  output/, tmp/compiled_content.json
//! ```
//!
//! An item has one or more *representations* (reps): `default`, plus any
//! named in the rules. Each rep runs its own pipeline and writes its own file.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `config.toml` loading, stock defaults, merging and validation |
//! | [`data_source`] | Loads items and layouts from the filesystem, with `+++` TOML front matter |
//! | [`site`] | The loaded site and the timestamps that invalidate output |
//! | [`item`] | Items, layouts, identifier normalization |
//! | [`rules`] | `rules.toml`: compile steps, routes, layout filters |
//! | [`router`] | Output paths per rep, collision detection |
//! | [`content`] | Text/binary content and the per-rep snapshot store |
//! | [`outdated`] | Whether a rep's output is stale |
//! | [`rep`] | Rep state, writing output, the per-attempt pipeline |
//! | [`compiler`] | Runs the whole site, resolving cross-item dependencies by retry |
//! | [`filters`] | Filter trait, registry and the built-in filters |
//! | [`cache`] | Compiled content cache and file comparison |
//! | [`notify`] | Lifecycle events sent over a channel |
//! | [`stack`] | Compilation stack for failure traces |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Dependencies Without a Graph
//!
//! A rep can embed another rep's compiled content (an index listing its
//! posts). Those dependencies are discovered while compiling: asking for a
//! rep that isn't compiled yet returns [`rep::Outcome::NotReady`], the attempt
//! is discarded and the dependency goes first. A dependency chain that loops
//! back on itself is a fatal cycle.
//!
//! ## Text and Binary Are Different Types
//!
//! Content is either a `String` or a path to a file ([`content::Content`]).
//! Filters declare which they take and which they return; converting between
//! the two takes a filter that says so.
//!
//! ## Up-To-Date Means Untouched
//!
//! A rep whose output file is newer than its item, all layouts, the `lib/`
//! code, the config and the rules is not recompiled at all. Its compiled
//! content comes from the cache in `tmp/`, or from the output file itself.

pub mod cache;
pub mod compiler;
pub mod config;
pub mod content;
pub mod data_source;
pub mod filters;
pub mod item;
pub mod notify;
pub mod outdated;
pub mod output;
pub mod rep;
pub mod router;
pub mod rules;
pub mod site;
pub mod stack;

#[cfg(test)]
pub(crate) mod test_helpers;
