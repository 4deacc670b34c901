//! `config.toml`: where a site keeps its directories and what counts as text.
//!
//! The user's file is layered over the stock defaults, so it only names the
//! keys it changes.
//!
//! ## Location
//!
//! `config.toml` lives at the site root, next to the rules file:
//!
//! ```text
//! site/
//! ├── config.toml      # Site config (optional)
//! ├── rules.toml       # Compile, route and layout rules
//! ├── content/         # Items
//! ├── layouts/         # Layouts
//! └── lib/             # Auxiliary code (only its timestamps matter)
//! ```
//!
//! ## Keys
//!
//! ```toml
//! # Defaults
//!
//! output_dir = "output"       # Where compiled files are written
//! content_dir = "content"     # Items are loaded from here
//! layouts_dir = "layouts"     # Layouts are loaded from here
//! lib_dir = "lib"             # Auxiliary code; newer code forces recompilation
//! tmp_dir = "tmp"             # Compiled content cache and binary scratch files
//! rules_file = "rules.toml"   # Compile/route/layout rules
//!
//! # Extensions treated as text; everything else is binary.
//! text_extensions = ["md", "markdown", "html", "htm", "txt", "css", "js",
//!                    "json", "xml", "svg", "toml", "yaml", "erb"]
//!
//! # File names stripped from the web-facing path.
//! index_filenames = ["index.html"]
//!
//! # Write a unified diff of every modified text file to `output.diff`.
//! enable_output_diff = false
//! ```
//!
//! A key not listed here is an error.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file at the site root.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Resolved site settings. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Directory compiled files are written to, relative to the site root.
    pub output_dir: String,
    /// Directory items are loaded from.
    pub content_dir: String,
    /// Directory layouts are loaded from.
    pub layouts_dir: String,
    /// Directory holding auxiliary code. Only modification times are used.
    pub lib_dir: String,
    /// Directory for the compiled content cache and binary filter output.
    pub tmp_dir: String,
    /// Rules file, relative to the site root.
    pub rules_file: String,
    /// File extensions (without the dot) loaded as text.
    pub text_extensions: Vec<String>,
    /// Output file names stripped from web-facing paths.
    pub index_filenames: Vec<String>,
    /// Write unified diffs of modified text output to `output.diff`.
    pub enable_output_diff: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            output_dir: "output".to_string(),
            content_dir: "content".to_string(),
            layouts_dir: "layouts".to_string(),
            lib_dir: "lib".to_string(),
            tmp_dir: "tmp".to_string(),
            rules_file: "rules.toml".to_string(),
            text_extensions: [
                "md", "markdown", "html", "htm", "txt", "css", "js", "json", "xml", "svg", "toml",
                "yaml", "erb",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            index_filenames: vec!["index.html".to_string()],
            enable_output_diff: false,
        }
    }
}

impl SiteConfig {
    /// Reject empty directory names, an output directory that is also the
    /// content directory, and dotted text extensions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dirs = [
            ("output_dir", &self.output_dir),
            ("content_dir", &self.content_dir),
            ("layouts_dir", &self.layouts_dir),
            ("tmp_dir", &self.tmp_dir),
            ("rules_file", &self.rules_file),
        ];
        for (key, value) in dirs {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        if self.output_dir == self.content_dir {
            return Err(ConfigError::Validation(
                "output_dir must differ from content_dir".into(),
            ));
        }
        if let Some(ext) = self.text_extensions.iter().find(|e| e.starts_with('.')) {
            return Err(ConfigError::Validation(format!(
                "text_extensions entries are written without a leading dot: {ext}"
            )));
        }
        Ok(())
    }

    /// Whether files with this extension are loaded as text.
    pub fn is_text_extension(&self, extension: &str) -> bool {
        self.text_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }

    /// Value of a top-level key as a display string, for `{{ config.<key> }}`.
    pub fn lookup(&self, key: &str) -> Option<String> {
        match toml::Value::try_from(self).ok()?.get(key)? {
            toml::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// [`SiteConfig::default`] as a TOML table, the bottom layer of every merge.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Layer `overlay` over `base`. Tables merge per key, recursively; any other
/// overlay value wins outright.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// The user's `config.toml` as untyped TOML, or `None` when the site has none.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let path = root.join(CONFIG_FILENAME);
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(&path)?;
    Ok(Some(toml::from_str(&text)?))
}

/// Apply the user's layer, if there is one, and check the result.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let layered = match overlay {
        Some(user) => merge_toml(base, user),
        None => base,
    };
    let config: SiteConfig = layered.try_into()?;
    config.validate()?;
    Ok(config)
}

/// The site's config: stock defaults with `config.toml` applied on top.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Annotated `config.toml` printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# Rendition Configuration
# =======================
# Every key is optional; delete the ones you keep at their default.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Directories (relative to the site root)
# ---------------------------------------------------------------------------
# Compiled files are written here.
output_dir = "output"

# Items are loaded from here. `content/about.md` becomes `/about/`.
content_dir = "content"

# Layouts are loaded from here. `layouts/default.html` becomes `/default/`.
layouts_dir = "layouts"

# Auxiliary code. When anything in here changes, every item is recompiled.
lib_dir = "lib"

# Compiled content cache and scratch files written by binary filters.
tmp_dir = "tmp"

# Compile, route and layout rules.
rules_file = "rules.toml"

# ---------------------------------------------------------------------------
# Content
# ---------------------------------------------------------------------------
# Extensions (without the dot) loaded as text. Everything else is binary and
# is passed to filters as a file reference.
text_extensions = ["md", "markdown", "html", "htm", "txt", "css", "js", "json", "xml", "svg", "toml", "yaml", "erb"]

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
# File names stripped from web-facing paths: /about/index.html -> /about/
index_filenames = ["index.html"]

# Write a unified diff of every modified text file to `output.diff`.
enable_output_diff = false
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_directories() {
        let config = SiteConfig::default();
        assert_eq!(config.output_dir, "output");
        assert_eq!(config.content_dir, "content");
        assert_eq!(config.layouts_dir, "layouts");
        assert_eq!(config.rules_file, "rules.toml");
        assert!(!config.enable_output_diff);
    }

    #[test]
    fn parse_partial_config() {
        let config: SiteConfig = toml::from_str(r#"output_dir = "public""#).unwrap();
        assert_eq!(config.output_dir, "public");
        // Default values preserved
        assert_eq!(config.content_dir, "content");
        assert_eq!(config.index_filenames, vec!["index.html"]);
    }

    #[test]
    fn text_extension_check_is_case_insensitive() {
        let config = SiteConfig::default();
        assert!(config.is_text_extension("md"));
        assert!(config.is_text_extension("HTML"));
        assert!(!config.is_text_extension("png"));
    }

    #[test]
    fn lookup_renders_strings_and_scalars() {
        let config = SiteConfig::default();
        assert_eq!(config.lookup("output_dir").as_deref(), Some("output"));
        assert_eq!(config.lookup("enable_output_diff").as_deref(), Some("false"));
        assert_eq!(config.lookup("missing"), None);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, SiteConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "output_dir = \"public\"\nenable_output_diff = true\n",
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.output_dir, "public");
        assert!(config.enable_output_diff);
        assert_eq!(config.tmp_dir, "tmp");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "this is not toml {{{").unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "ouptut_dir = \"x\"\n").unwrap();
        assert!(load_config(tmp.path()).is_err());
    }

    // =========================================================================
    // Merging
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("a = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_integer(), Some(3));
        assert_eq!(merged["b"].as_integer(), Some(2));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[t]\nx = 1\ny = 2").unwrap();
        let overlay: toml::Value = toml::from_str("[t]\ny = 5").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["t"]["x"].as_integer(), Some(1));
        assert_eq!(merged["t"]["y"].as_integer(), Some(5));
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base: toml::Value = toml::from_str("v = [1, 2, 3]").unwrap();
        let overlay: toml::Value = toml::from_str("v = [9]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["v"].as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(SiteConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_output_equal_to_content() {
        let config = SiteConfig {
            output_dir: "content".into(),
            ..SiteConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn validate_rejects_dotted_extension() {
        let config = SiteConfig {
            text_extensions: vec![".md".into()],
            ..SiteConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_directory() {
        let config = SiteConfig {
            tmp_dir: " ".into(),
            ..SiteConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn resolve_config_rejects_invalid_values() {
        let overlay: toml::Value = toml::from_str(r#"output_dir = """#).unwrap();
        assert!(resolve_config(stock_defaults_value(), Some(overlay)).is_err());
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let parsed: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(parsed, SiteConfig::default());
    }

    #[test]
    fn stock_defaults_value_is_table() {
        assert!(stock_defaults_value().is_table());
    }
}
