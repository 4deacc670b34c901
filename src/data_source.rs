//! Filesystem data source.
//!
//! Loads items and layouts from the site directory and records the timestamps
//! the outdated check compares against.
//!
//! ## Directory Structure
//!
//! ```text
//! site/
//! ├── config.toml
//! ├── rules.toml
//! ├── content/
//! │   ├── index.md            # → /
//! │   ├── about.md            # → /about/
//! │   ├── blog/
//! │   │   ├── index.md        # → /blog/
//! │   │   └── first-post.md   # → /blog/first-post/
//! │   └── images/
//! │       └── logo.png        # → /images/logo/  (binary)
//! ├── layouts/
//! │   └── default.html        # → /default/
//! └── lib/                    # newest mtime here invalidates everything
//! ```
//!
//! ## Front Matter
//!
//! Text files may start with a TOML block fenced by `+++` lines. Its keys
//! become the item's (or layout's) attributes:
//!
//! ```text
//! +++
//! title = "About"
//! +++
//! # About this site
//! ```
//!
//! Every item and layout also gets `extension` and `filename` attributes
//! unless its front matter sets them.
//!
//! ## Text or Binary
//!
//! Files whose extension is listed in `text_extensions` are loaded as text.
//! Everything else is binary: the item holds a reference to the source file
//! and its content is never read here.

use crate::config::{self, CONFIG_FILENAME, SiteConfig};
use crate::content::Content;
use crate::item::{Item, Layout, Timestamp, normalize_identifier};
use crate::site::Site;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use walkdir::WalkDir;

const FRONT_MATTER_FENCE: &str = "+++";

#[derive(Error, Debug)]
pub enum DataSourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Invalid front matter in {path}: {source}")]
    FrontMatter {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Unterminated front matter in {0}")]
    UnterminatedFrontMatter(PathBuf),
    #[error("Identifier {identifier} is claimed by both {first} and {second}")]
    DuplicateIdentifier {
        identifier: String,
        first: PathBuf,
        second: PathBuf,
    },
}

/// Load config, items, layouts and timestamps from a site directory.
pub fn load_site(root: &Path) -> Result<Site, DataSourceError> {
    let config = config::load_config(root)?;
    let mut site = Site::new(root, config);

    site.items = load_items(&root.join(&site.config.content_dir), &site.config)?;
    site.layouts = load_layouts(&root.join(&site.config.layouts_dir))?;
    site.code_mtime = newest_mtime(&root.join(&site.config.lib_dir))?;
    site.config_mtime = optional_mtime(&root.join(CONFIG_FILENAME));
    site.rules_mtime = mtime(&root.join(&site.config.rules_file));

    Ok(site)
}

/// Load every file under `dir` as an item, in sorted path order.
pub fn load_items(dir: &Path, config: &SiteConfig) -> Result<Vec<Item>, DataSourceError> {
    let mut items = Vec::new();
    let mut claimed: HashMap<String, PathBuf> = HashMap::new();

    for path in collect_files(dir)? {
        let identifier = identifier_for(dir, &path);
        claim(&mut claimed, &identifier, &path)?;

        let extension = extension_of(&path);
        let (attributes, raw) = if config.is_text_extension(&extension) {
            let text = fs::read_to_string(&path)?;
            let (attributes, body) = split_front_matter(&path, &text)?;
            (attributes, Content::Text(body.to_string()))
        } else {
            (toml::Table::new(), Content::Binary(path.clone()))
        };

        let mut item = Item::new(&identifier, raw, mtime(&path));
        item.attributes = with_file_attributes(attributes, &path, &extension);
        items.push(item);
    }

    Ok(items)
}

/// Load every file under `dir` as a layout. Layouts are always text.
pub fn load_layouts(dir: &Path) -> Result<Vec<Layout>, DataSourceError> {
    let mut layouts = Vec::new();
    let mut claimed: HashMap<String, PathBuf> = HashMap::new();

    for path in collect_files(dir)? {
        let identifier = identifier_for(dir, &path);
        claim(&mut claimed, &identifier, &path)?;

        let text = fs::read_to_string(&path)?;
        let (attributes, body) = split_front_matter(&path, &text)?;
        let mut layout = Layout::new(&identifier, body, mtime(&path));
        layout.attributes = with_file_attributes(attributes, &path, &extension_of(&path));
        layouts.push(layout);
    }

    Ok(layouts)
}

/// Derive an identifier from a path relative to its root directory.
///
/// `blog/first-post.md` → `/blog/first-post/`, `blog/index.md` → `/blog/`,
/// `index.md` → `/`.
pub fn identifier_for(dir: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(dir).unwrap_or(path);
    let stem = rel
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let parent = rel
        .parent()
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default();

    if stem == "index" {
        normalize_identifier(&parent)
    } else if parent.is_empty() {
        normalize_identifier(&stem)
    } else {
        normalize_identifier(&format!("{parent}/{stem}"))
    }
}

/// Split a `+++` fenced TOML block off the front of `text`.
///
/// Text without an opening fence has no attributes and is returned whole.
pub fn split_front_matter<'a>(
    path: &Path,
    text: &'a str,
) -> Result<(toml::Table, &'a str), DataSourceError> {
    let Some(rest) = strip_fence_line(text) else {
        return Ok((toml::Table::new(), text));
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FRONT_MATTER_FENCE {
            let header = &rest[..offset];
            let body = &rest[offset + line.len()..];
            let attributes: toml::Table =
                toml::from_str(header).map_err(|source| DataSourceError::FrontMatter {
                    path: path.to_path_buf(),
                    source,
                })?;
            return Ok((attributes, body));
        }
        offset += line.len();
    }

    Err(DataSourceError::UnterminatedFrontMatter(path.to_path_buf()))
}

fn strip_fence_line(text: &str) -> Option<&str> {
    let rest = text.strip_prefix(FRONT_MATTER_FENCE)?;
    rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))
}

fn with_file_attributes(mut attributes: toml::Table, path: &Path, extension: &str) -> toml::Table {
    if !attributes.contains_key("extension") {
        attributes.insert("extension".into(), extension.into());
    }
    if !attributes.contains_key("filename") {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        attributes.insert("filename".into(), filename.into());
    }
    attributes
}

fn claim(
    claimed: &mut HashMap<String, PathBuf>,
    identifier: &str,
    path: &Path,
) -> Result<(), DataSourceError> {
    if let Some(first) = claimed.get(identifier) {
        return Err(DataSourceError::DuplicateIdentifier {
            identifier: identifier.to_string(),
            first: first.clone(),
            second: path.to_path_buf(),
        });
    }
    claimed.insert(identifier.to_string(), path.to_path_buf());
    Ok(())
}

/// All regular, non-hidden files under `dir`, sorted by path. A missing
/// directory yields no files.
fn collect_files(dir: &Path) -> Result<Vec<PathBuf>, DataSourceError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn mtime(path: &Path) -> Timestamp {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Modification time of a file that may legitimately be absent. Absent files
/// never force recompilation, so they report the epoch.
fn optional_mtime(path: &Path) -> Timestamp {
    if path.exists() {
        mtime(path)
    } else {
        Some(SystemTime::UNIX_EPOCH)
    }
}

/// Newest modification time of any file under `dir`. Unknown if any file's
/// time can't be read; the epoch if the directory is absent or empty.
fn newest_mtime(dir: &Path) -> Result<Timestamp, DataSourceError> {
    let mut newest = SystemTime::UNIX_EPOCH;
    for path in collect_files(dir)? {
        match mtime(&path) {
            Some(t) => newest = newest.max(t),
            None => return Ok(None),
        }
    }
    Ok(Some(newest))
}
