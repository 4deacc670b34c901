//! Shared test utilities.
//!
//! [`TestSite`] is an in-memory site rooted in a temp directory, with its own
//! rules and filter registry. Items carry epoch timestamps, so anything
//! written during a test is newer than its sources.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let site = TestSite::new()
//!     .item(text_item("/about/", "# About"))
//!     .rules("[[compile]]\npattern = \"*\"\nsteps = [{ filter = \"markdown\" }]\n");
//!
//! site.compiler().compile(&CompileOptions::default()).unwrap();
//! assert_eq!(site.read_output("about/index.html"), "<h1>About</h1>\n");
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::TempDir;

use crate::compiler::Compiler;
use crate::config::SiteConfig;
use crate::content::Content;
use crate::filters::{Filter, FilterContext, FilterRegistry};
use crate::item::{Item, Layout};
use crate::notify::Notifier;
use crate::rep::{ItemRep, PipelineEnv, RepId, build_reps};
use crate::router::assign_routes;
use crate::rules::RuleSet;
use crate::site::Site;

// =========================================================================
// Items
// =========================================================================

/// A text item last modified at the epoch.
pub fn text_item(identifier: &str, text: &str) -> Item {
    Item::new(
        identifier,
        Content::Text(text.to_string()),
        Some(SystemTime::UNIX_EPOCH),
    )
}

/// A binary item referencing `source`, last modified at the epoch.
pub fn binary_item(identifier: &str, source: &Path) -> Item {
    let mut item = Item::new(
        identifier,
        Content::Binary(source.to_path_buf()),
        Some(SystemTime::UNIX_EPOCH),
    );
    if let Some(ext) = source.extension() {
        item = item.with_attribute("extension", ext.to_string_lossy().into_owned());
    }
    item
}

// =========================================================================
// Sites
// =========================================================================

pub struct TestSite {
    dir: TempDir,
    site: Site,
    rules: RuleSet,
    filters: FilterRegistry,
}

impl TestSite {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let site = Site::new(dir.path(), SiteConfig::default());
        Self {
            dir,
            site,
            rules: RuleSet::new(),
            filters: FilterRegistry::with_builtins(),
        }
    }

    pub fn item(mut self, item: Item) -> Self {
        self.site.items.push(item);
        self
    }

    /// Swap the item with the same identifier, keeping its position.
    pub fn replace_item(mut self, item: Item) -> Self {
        match self
            .site
            .items
            .iter()
            .position(|i| i.identifier == item.identifier)
        {
            Some(pos) => self.site.items[pos] = item,
            None => self.site.items.push(item),
        }
        self
    }

    /// A layout last modified at the epoch.
    pub fn layout(self, identifier: &str, content: &str) -> Self {
        self.with_layout(Layout::new(
            identifier,
            content,
            Some(SystemTime::UNIX_EPOCH),
        ))
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.site.layouts.push(layout);
        self
    }

    /// Replace the rules with ones parsed from TOML.
    pub fn rules(mut self, source: &str) -> Self {
        self.rules = RuleSet::from_toml(source).unwrap();
        self
    }

    pub fn filter(mut self, name: &str, filter: impl Filter + 'static) -> Self {
        self.filters.register(name, filter);
        self
    }

    pub fn configure(mut self, f: impl FnOnce(&mut SiteConfig)) -> Self {
        f(&mut self.site.config);
        self
    }

    /// Write a source file under the content directory and return its path.
    pub fn write_source(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self
            .dir
            .path()
            .join(&self.site.config.content_dir)
            .join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, bytes).unwrap();
        path
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn output_dir(&self) -> PathBuf {
        self.site.output_dir()
    }

    /// Read an output file as text. Panics if missing.
    pub fn read_output(&self, relative: &str) -> String {
        let path = self.output_dir().join(relative);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.site.tmp_dir().join("binary")
    }

    // =====================================================================
    // Engine pieces
    // =====================================================================

    pub fn reps(&self) -> Vec<ItemRep> {
        build_reps(&self.site, &self.rules)
    }

    pub fn routed_reps(&self) -> Vec<ItemRep> {
        let reps = self.reps();
        assign_routes(&self.site, &self.rules, &reps).unwrap();
        reps
    }

    /// Filter context for rep `id`, outside any layout.
    pub fn context<'a>(
        &'a self,
        reps: &'a [ItemRep],
        id: RepId,
        content: &'a Content,
    ) -> FilterContext<'a> {
        let rep = &reps[id];
        FilterContext {
            item: &self.site.items[rep.item],
            rep: &rep.name,
            path: rep.path(),
            site: &self.site,
            layout: None,
            content,
            output_filename: self.scratch_dir().join(format!("out-{id}")),
            reps,
        }
    }

    pub fn env<'a>(
        &'a self,
        reps: &'a [ItemRep],
        notifier: &'a Notifier,
        scratch_dir: &'a Path,
    ) -> PipelineEnv<'a> {
        PipelineEnv {
            site: &self.site,
            rules: &self.rules,
            filters: &self.filters,
            reps,
            notifier,
            scratch_dir,
        }
    }

    pub fn compiler(&self) -> Compiler<'_> {
        Compiler::new(&self.site, &self.rules, &self.filters)
    }
}
