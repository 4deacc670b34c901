//! Compiled content cache for incremental builds.
//!
//! Representations whose output is up to date are never recompiled, but an
//! outdated representation may still ask for their compiled content (an
//! index page embedding its posts, say). This module persists the textual
//! snapshots of every compiled representation so up-to-date ones can answer
//! those queries without running their filters again.
//!
//! # Design
//!
//! Entries are keyed by `"{identifier}:{rep}"` and hold every textual
//! snapshot (`raw`, `pre`, `post`, `last`, user-named). Binary snapshots are
//! not cached: a binary representation's compiled content is its output file.
//!
//! When an entry is missing (first build after the cache was deleted), the
//! compiler falls back to the existing output file as `last`.
//!
//! ## Storage
//!
//! The cache is a JSON file at `<tmp_dir>/compiled_content.json`. A missing,
//! corrupt or older-version file loads as an empty cache.
//!
//! # Comparing files
//!
//! [`files_identical`] decides whether a binary output changed. Sizes are
//! compared first; content is hashed only when sizes match.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache file within the tmp directory.
const CACHE_FILENAME: &str = "compiled_content.json";

/// Version of the cache format. Bump this to invalidate all existing caches
/// when the format or key computation changes.
const CACHE_VERSION: u32 = 1;

/// Cached snapshots of one representation.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CachedRep {
    /// The final content was binary; only the output file holds it.
    #[serde(default)]
    pub binary: bool,
    pub snapshots: BTreeMap<String, String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CompiledContentCache {
    pub version: u32,
    pub entries: HashMap<String, CachedRep>,
}

fn key(identifier: &str, rep: &str) -> String {
    format!("{identifier}:{rep}")
}

impl CompiledContentCache {
    /// Create an empty cache (first build, or after `--force`).
    pub fn empty() -> Self {
        Self {
            version: CACHE_VERSION,
            entries: HashMap::new(),
        }
    }

    /// Load from the tmp directory. Returns an empty cache if the file
    /// doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(tmp_dir: &Path) -> Self {
        let content = match fs::read_to_string(cache_path(tmp_dir)) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let cache: Self = match serde_json::from_str(&content) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        if cache.version != CACHE_VERSION {
            return Self::empty();
        }
        cache
    }

    /// Save to the tmp directory, creating it if needed.
    pub fn save(&self, tmp_dir: &Path) -> io::Result<()> {
        fs::create_dir_all(tmp_dir)?;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(cache_path(tmp_dir), json)
    }

    pub fn get(&self, identifier: &str, rep: &str) -> Option<&CachedRep> {
        self.entries.get(&key(identifier, rep))
    }

    pub fn insert(&mut self, identifier: &str, rep: &str, entry: CachedRep) {
        self.entries.insert(key(identifier, rep), entry);
    }
}

/// Resolve the cache file path for a tmp directory.
pub fn cache_path(tmp_dir: &Path) -> PathBuf {
    tmp_dir.join(CACHE_FILENAME)
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

/// Whether two files have the same content. Files of different sizes are
/// never hashed.
pub fn files_identical(a: &Path, b: &Path) -> io::Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }
    Ok(hash_file(a)? == hash_file(b)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(last: &str) -> CachedRep {
        let mut snapshots = BTreeMap::new();
        snapshots.insert("last".to_string(), last.to_string());
        CachedRep {
            binary: false,
            snapshots,
        }
    }

    // =========================================================================
    // Cache basics
    // =========================================================================

    #[test]
    fn empty_cache_has_no_entries() {
        let c = CompiledContentCache::empty();
        assert_eq!(c.version, CACHE_VERSION);
        assert!(c.entries.is_empty());
    }

    #[test]
    fn entries_are_keyed_by_identifier_and_rep() {
        let mut c = CompiledContentCache::empty();
        c.insert("/a/", "default", entry("A"));
        c.insert("/a/", "print", entry("P"));

        assert_eq!(c.get("/a/", "default"), Some(&entry("A")));
        assert_eq!(c.get("/a/", "print"), Some(&entry("P")));
        assert_eq!(c.get("/b/", "default"), None);
    }

    // =========================================================================
    // Save / Load roundtrip
    // =========================================================================

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("tmp");
        let mut c = CompiledContentCache::empty();
        c.insert("/a/", "default", entry("A"));
        c.insert(
            "/logo/",
            "default",
            CachedRep {
                binary: true,
                snapshots: BTreeMap::new(),
            },
        );

        c.save(&dir).unwrap();
        let loaded = CompiledContentCache::load(&dir);

        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(loaded.get("/a/", "default"), Some(&entry("A")));
        assert!(loaded.get("/logo/", "default").unwrap().binary);
    }

    #[test]
    fn load_missing_file_returns_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(CompiledContentCache::load(tmp.path()).entries.is_empty());
    }

    #[test]
    fn load_corrupt_json_returns_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(cache_path(tmp.path()), "not json").unwrap();
        assert!(CompiledContentCache::load(tmp.path()).entries.is_empty());
    }

    #[test]
    fn load_wrong_version_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let json = format!(
            r#"{{"version": {}, "entries": {{"/a/:default": {{"snapshots": {{"last": "x"}}}}}}}}"#,
            CACHE_VERSION + 1
        );
        fs::write(cache_path(tmp.path()), json).unwrap();
        assert!(CompiledContentCache::load(tmp.path()).entries.is_empty());
    }

    // =========================================================================
    // Hashing and comparison
    // =========================================================================

    #[test]
    fn hash_file_deterministic() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.bin");
        fs::write(&path, b"hello world").unwrap();

        let h1 = hash_file(&path).unwrap();
        let h2 = hash_file(&path).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64); // SHA-256 hex is 64 chars
    }

    #[test]
    fn hash_file_changes_with_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.bin");

        fs::write(&path, b"version 1").unwrap();
        let h1 = hash_file(&path).unwrap();

        fs::write(&path, b"version 2").unwrap();
        let h2 = hash_file(&path).unwrap();

        assert_ne!(h1, h2);
    }

    #[test]
    fn identical_files() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        fs::write(&a, b"same").unwrap();
        fs::write(&b, b"same").unwrap();
        assert!(files_identical(&a, &b).unwrap());
    }

    #[test]
    fn same_size_different_content() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        fs::write(&a, b"abcd").unwrap();
        fs::write(&b, b"abce").unwrap();
        assert!(!files_identical(&a, &b).unwrap());
    }

    #[test]
    fn different_sizes() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        fs::write(&a, b"short").unwrap();
        fs::write(&b, b"much longer").unwrap();
        assert!(!files_identical(&a, &b).unwrap());
    }

    #[test]
    fn missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a");
        fs::write(&a, b"x").unwrap();
        assert!(files_identical(&a, &tmp.path().join("missing")).is_err());
    }
}
