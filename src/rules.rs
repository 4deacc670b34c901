//! Compile, route and layout rules.
//!
//! The compiler only consumes the *resolved* effect of the rules: for an item
//! and representation name, which pipeline steps to run and where the output
//! goes; for a layout, which filter renders it. [`RuleResolver`] is that
//! interface. [`RuleSet`] implements it from a `rules.toml` file:
//!
//! ```toml
//! [[compile]]
//! pattern = "/blog/*"
//! steps = [
//!     { filter = "markdown" },
//!     { snapshot = "body" },
//!     { layout = "/post/" },
//! ]
//!
//! [[compile]]
//! pattern = "/blog/*"
//! rep = "raw"            # adds a second representation
//!
//! [[route]]
//! pattern = "/blog/*"
//! rep = "raw"
//! path = "{stem}.md"
//!
//! [[route]]
//! pattern = "/drafts/*"
//! skip = true
//!
//! [[layout]]
//! pattern = "*"
//! filter = "template"
//! ```
//!
//! Patterns are globs over identifiers; `*` also matches `/`. For each kind
//! of rule, the first rule that matches wins.

use crate::item::{DEFAULT_REP, Item, Layout};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RulesError {
    #[error("IO error reading rules: {0}")]
    Io(#[from] std::io::Error),
    #[error("Rules parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },
}

/// One operation in a representation's pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Step {
    Filter {
        filter: String,
        #[serde(default)]
        params: toml::Table,
    },
    Layout {
        layout: String,
    },
    Snapshot {
        snapshot: String,
    },
}

impl Step {
    pub fn filter(name: &str) -> Self {
        Step::Filter {
            filter: name.to_string(),
            params: toml::Table::new(),
        }
    }

    pub fn layout(identifier: &str) -> Self {
        Step::Layout {
            layout: identifier.to_string(),
        }
    }

    pub fn snapshot(name: &str) -> Self {
        Step::Snapshot {
            snapshot: name.to_string(),
        }
    }
}

fn default_rep() -> String {
    DEFAULT_REP.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompileRule {
    pub pattern: String,
    #[serde(default = "default_rep")]
    pub rep: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteRule {
    pub pattern: String,
    #[serde(default = "default_rep")]
    pub rep: String,
    /// Custom output path. Placeholders: `{identifier}`, `{stem}`, `{rep}`,
    /// `{extension}`.
    pub path: Option<String>,
    /// Extension used by the conventional path.
    pub extension: Option<String>,
    /// Compile the representation but never write it.
    #[serde(default)]
    pub skip: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutRule {
    pub pattern: String,
    pub filter: String,
    #[serde(default)]
    pub params: toml::Table,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RulesFile {
    compile: Vec<CompileRule>,
    route: Vec<RouteRule>,
    layout: Vec<LayoutRule>,
}

/// What the compiler needs to know from the rules.
pub trait RuleResolver {
    /// Representation names for an item. Always contains [`DEFAULT_REP`].
    fn rep_names(&self, item: &Item) -> Vec<String>;

    /// Pipeline steps for a representation. Empty means the raw content is
    /// written unchanged.
    fn steps(&self, item: &Item, rep: &str) -> Vec<Step>;

    /// Routing rule for a representation, if any matches.
    fn route(&self, item: &Item, rep: &str) -> Option<&RouteRule>;

    /// Filter name and params that render a layout.
    fn layout_filter(&self, layout: &Layout) -> Option<(String, toml::Table)>;
}

#[derive(Debug)]
struct Matched<T> {
    pattern: glob::Pattern,
    rule: T,
}

impl<T> Matched<T> {
    fn new(pattern: &str, rule: T) -> Result<Self, RulesError> {
        let pattern = glob::Pattern::new(pattern).map_err(|source| RulesError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { pattern, rule })
    }

    fn matches(&self, identifier: &str) -> bool {
        self.pattern.matches(identifier)
    }
}

/// Rules loaded from TOML, in declaration order.
#[derive(Debug, Default)]
pub struct RuleSet {
    compile: Vec<Matched<CompileRule>>,
    route: Vec<Matched<RouteRule>>,
    layout: Vec<Matched<LayoutRule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml(source: &str) -> Result<Self, RulesError> {
        let file: RulesFile = toml::from_str(source)?;
        let mut rules = Self::new();
        for rule in file.compile {
            rules.compile.push(Matched::new(&rule.pattern.clone(), rule)?);
        }
        for rule in file.route {
            rules.route.push(Matched::new(&rule.pattern.clone(), rule)?);
        }
        for rule in file.layout {
            rules.layout.push(Matched::new(&rule.pattern.clone(), rule)?);
        }
        Ok(rules)
    }

    pub fn add_compile(&mut self, pattern: &str, rep: &str, steps: Vec<Step>) -> Result<(), RulesError> {
        let rule = CompileRule {
            pattern: pattern.to_string(),
            rep: rep.to_string(),
            steps,
        };
        self.compile.push(Matched::new(pattern, rule)?);
        Ok(())
    }

    pub fn add_route(&mut self, rule: RouteRule) -> Result<(), RulesError> {
        self.route.push(Matched::new(&rule.pattern.clone(), rule)?);
        Ok(())
    }

    pub fn add_layout(&mut self, pattern: &str, filter: &str) -> Result<(), RulesError> {
        let rule = LayoutRule {
            pattern: pattern.to_string(),
            filter: filter.to_string(),
            params: toml::Table::new(),
        };
        self.layout.push(Matched::new(pattern, rule)?);
        Ok(())
    }
}

impl RuleResolver for RuleSet {
    fn rep_names(&self, item: &Item) -> Vec<String> {
        let mut names = vec![DEFAULT_REP.to_string()];
        let declared = self
            .compile
            .iter()
            .filter(|m| m.matches(&item.identifier))
            .map(|m| &m.rule.rep)
            .chain(
                self.route
                    .iter()
                    .filter(|m| m.matches(&item.identifier))
                    .map(|m| &m.rule.rep),
            );
        for name in declared {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    fn steps(&self, item: &Item, rep: &str) -> Vec<Step> {
        self.compile
            .iter()
            .find(|m| m.rule.rep == rep && m.matches(&item.identifier))
            .map(|m| m.rule.steps.clone())
            .unwrap_or_default()
    }

    fn route(&self, item: &Item, rep: &str) -> Option<&RouteRule> {
        self.route
            .iter()
            .find(|m| m.rule.rep == rep && m.matches(&item.identifier))
            .map(|m| &m.rule)
    }

    fn layout_filter(&self, layout: &Layout) -> Option<(String, toml::Table)> {
        self.layout
            .iter()
            .find(|m| m.matches(&layout.identifier))
            .map(|m| (m.rule.filter.clone(), m.rule.params.clone()))
    }
}

/// Load rules from a TOML file.
pub fn load_rules(path: &Path) -> Result<RuleSet, RulesError> {
    let source = fs::read_to_string(path)?;
    RuleSet::from_toml(&source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Content;

    fn item(identifier: &str) -> Item {
        Item::new(identifier, Content::Text(String::new()), None)
    }

    const RULES: &str = r#"
[[compile]]
pattern = "/blog/*"
steps = [
    { filter = "markdown", params = { smart = true } },
    { snapshot = "body" },
    { layout = "/post/" },
]

[[compile]]
pattern = "/blog/*"
rep = "source"

[[compile]]
pattern = "*"
steps = [{ layout = "/default/" }]

[[route]]
pattern = "/blog/*"
rep = "source"
path = "{stem}.md"

[[route]]
pattern = "/drafts/*"
skip = true

[[layout]]
pattern = "/feed/"
filter = "passthrough"

[[layout]]
pattern = "*"
filter = "template"
params = { wrapper = "main" }
"#;

    #[test]
    fn parses_steps_in_order() {
        let rules = RuleSet::from_toml(RULES).unwrap();
        let steps = rules.steps(&item("/blog/hello/"), DEFAULT_REP);
        assert_eq!(steps.len(), 3);
        match &steps[0] {
            Step::Filter { filter, params } => {
                assert_eq!(filter, "markdown");
                assert_eq!(params["smart"].as_bool(), Some(true));
            }
            other => panic!("expected filter step, got {other:?}"),
        }
        assert_eq!(steps[1], Step::snapshot("body"));
        assert_eq!(steps[2], Step::layout("/post/"));
    }

    #[test]
    fn first_matching_compile_rule_wins() {
        let rules = RuleSet::from_toml(RULES).unwrap();
        assert_eq!(
            rules.steps(&item("/about/"), DEFAULT_REP),
            vec![Step::layout("/default/")]
        );
    }

    #[test]
    fn unmatched_rep_has_no_steps() {
        let rules = RuleSet::from_toml(RULES).unwrap();
        assert!(rules.steps(&item("/blog/hello/"), "source").is_empty());
        assert!(rules.steps(&item("/about/"), "print").is_empty());
    }

    #[test]
    fn rep_names_include_default_and_declared() {
        let rules = RuleSet::from_toml(RULES).unwrap();
        assert_eq!(rules.rep_names(&item("/blog/hello/")), vec!["default", "source"]);
        assert_eq!(rules.rep_names(&item("/about/")), vec!["default"]);
    }

    #[test]
    fn route_lookup_by_rep() {
        let rules = RuleSet::from_toml(RULES).unwrap();
        let route = rules.route(&item("/blog/hello/"), "source").unwrap();
        assert_eq!(route.path.as_deref(), Some("{stem}.md"));
        assert!(rules.route(&item("/blog/hello/"), DEFAULT_REP).is_none());
        assert!(rules.route(&item("/drafts/wip/"), DEFAULT_REP).unwrap().skip);
    }

    #[test]
    fn layout_filter_resolution() {
        let rules = RuleSet::from_toml(RULES).unwrap();
        let feed = Layout::new("/feed/", "", None);
        let page = Layout::new("/default/", "", None);
        assert_eq!(rules.layout_filter(&feed).unwrap().0, "passthrough");
        let (filter, params) = rules.layout_filter(&page).unwrap();
        assert_eq!(filter, "template");
        assert_eq!(params["wrapper"].as_str(), Some("main"));
    }

    #[test]
    fn no_layout_rule_is_none() {
        let rules = RuleSet::new();
        assert!(rules.layout_filter(&Layout::new("/x/", "", None)).is_none());
    }

    #[test]
    fn invalid_pattern_is_error() {
        let result = RuleSet::from_toml("[[compile]]\npattern = \"[\"\n");
        assert!(matches!(result, Err(RulesError::Pattern { .. })));
    }

    #[test]
    fn unknown_key_is_error() {
        assert!(RuleSet::from_toml("[[compile]]\npatern = \"*\"\n").is_err());
    }

    #[test]
    fn builder_methods_add_rules() {
        let mut rules = RuleSet::new();
        rules
            .add_compile("/a/", DEFAULT_REP, vec![Step::filter("markdown")])
            .unwrap();
        rules.add_layout("*", "template").unwrap();
        rules
            .add_route(RouteRule {
                pattern: "/a/".into(),
                rep: DEFAULT_REP.into(),
                path: Some("/a.html".into()),
                ..RouteRule::default()
            })
            .unwrap();
        assert_eq!(rules.steps(&item("/a/"), DEFAULT_REP).len(), 1);
        assert!(rules.route(&item("/a/"), DEFAULT_REP).is_some());
    }
}
