//! The loaded site: configuration, items, layouts and the timestamps of
//! everything that can invalidate compiled output.

use crate::config::SiteConfig;
use crate::item::{Item, Layout, Timestamp, normalize_identifier};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone)]
pub struct Site {
    pub root: PathBuf,
    pub config: SiteConfig,
    pub items: Vec<Item>,
    pub layouts: Vec<Layout>,
    /// Newest modification time of the auxiliary code.
    pub code_mtime: Timestamp,
    pub config_mtime: Timestamp,
    pub rules_mtime: Timestamp,
}

impl Site {
    /// An empty site rooted at `root`. Code, config and rules timestamps start
    /// at the epoch, i.e. they never force recompilation.
    pub fn new(root: &Path, config: SiteConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
            items: Vec::new(),
            layouts: Vec::new(),
            code_mtime: Some(SystemTime::UNIX_EPOCH),
            config_mtime: Some(SystemTime::UNIX_EPOCH),
            rules_mtime: Some(SystemTime::UNIX_EPOCH),
        }
    }

    pub fn item(&self, identifier: &str) -> Option<&Item> {
        let identifier = normalize_identifier(identifier);
        self.items.iter().find(|i| i.identifier == identifier)
    }

    pub fn layout(&self, identifier: &str) -> Option<&Layout> {
        let identifier = normalize_identifier(identifier);
        self.layouts.iter().find(|l| l.identifier == identifier)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.config.output_dir)
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join(&self.config.tmp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Content;

    #[test]
    fn lookups_normalize_identifiers() {
        let mut site = Site::new(Path::new("/site"), SiteConfig::default());
        site.items
            .push(Item::new("/about/", Content::Text(String::new()), None));
        site.layouts.push(Layout::new("/default/", "", None));

        assert!(site.item("about").is_some());
        assert!(site.item("/missing/").is_none());
        assert!(site.layout("default").is_some());
    }

    #[test]
    fn directories_are_relative_to_root() {
        let site = Site::new(Path::new("/site"), SiteConfig::default());
        assert_eq!(site.output_dir(), PathBuf::from("/site/output"));
        assert_eq!(site.tmp_dir(), PathBuf::from("/site/tmp"));
    }
}
