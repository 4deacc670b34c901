//! Output paths for representations.
//!
//! Every routed representation gets two paths:
//!
//! - `path`: the web-facing path, with index file names stripped
//!   (`/about/index.html` → `/about/`)
//! - `raw_path`: where the file lands on disk (`<output_dir>/about/index.html`)
//!
//! ## Convention
//!
//! Without a custom path in the matching route rule:
//!
//! ```text
//! text item    /about/        → /about/index.html        (default rep)
//!                             → /about/index-print.html  (rep "print")
//! binary item  /images/logo/  → /images/logo.png         (item extension)
//!                             → /images/logo-thumb.png   (rep "thumb")
//! ```
//!
//! A rule's `extension` replaces the extension in either case. A rule's
//! `path` is a template with `{identifier}`, `{stem}`, `{rep}` and
//! `{extension}` placeholders, where `{stem}` is the identifier without its
//! trailing slash.
//!
//! Two representations resolving to the same file is a configuration error,
//! reported before anything is compiled.

use crate::content::Kind;
use crate::item::{DEFAULT_REP, Item};
use crate::rep::ItemRep;
use crate::rules::{RouteRule, RuleResolver};
use crate::site::Site;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("{first} and {second} both write to {path}")]
    Collision {
        path: PathBuf,
        first: String,
        second: String,
    },
    #[error("Route for {rep} leaves the output directory: {path}")]
    OutsideOutput { rep: String, path: String },
}

/// Resolved location of a representation's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    pub raw_path: PathBuf,
}

/// Compute the route of one representation. `Ok(None)` means the rule skips
/// writing it.
pub fn route_for(
    site: &Site,
    item: &Item,
    rep: &str,
    rule: Option<&RouteRule>,
) -> Result<Option<Route>, RouteError> {
    if rule.is_some_and(|r| r.skip) {
        return Ok(None);
    }

    let extension = rule
        .and_then(|r| r.extension.clone())
        .unwrap_or_else(|| default_extension(item));
    let stem = item.identifier.trim_end_matches('/');

    let full_path = match rule.and_then(|r| r.path.as_deref()) {
        Some(template) => template
            .replace("{identifier}", &item.identifier)
            .replace("{stem}", stem)
            .replace("{rep}", rep)
            .replace("{extension}", &extension),
        None => conventional_path(item, rep, stem, &extension),
    };
    let full_path = if full_path.starts_with('/') {
        full_path
    } else {
        format!("/{full_path}")
    };

    let relative = full_path.trim_start_matches('/');
    if Path::new(relative)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(RouteError::OutsideOutput {
            rep: format!("{} ({rep})", item.identifier),
            path: full_path,
        });
    }

    Ok(Some(Route {
        raw_path: site.output_dir().join(relative),
        path: web_path(&full_path, &site.config.index_filenames),
    }))
}

fn default_extension(item: &Item) -> String {
    match item.kind() {
        Kind::Text => "html".to_string(),
        Kind::Binary => item.attribute_str("extension").unwrap_or("bin").to_string(),
    }
}

fn conventional_path(item: &Item, rep: &str, stem: &str, extension: &str) -> String {
    let suffix = if rep == DEFAULT_REP {
        String::new()
    } else {
        format!("-{rep}")
    };
    match item.kind() {
        Kind::Text => format!("{}index{suffix}.{extension}", item.identifier),
        Kind::Binary if stem.is_empty() => format!("/index{suffix}.{extension}"),
        Kind::Binary => format!("{stem}{suffix}.{extension}"),
    }
}

/// Strip a trailing index file name: `/about/index.html` → `/about/`.
fn web_path(full_path: &str, index_filenames: &[String]) -> String {
    for index in index_filenames {
        if let Some(dir) = full_path.strip_suffix(index.as_str())
            && dir.ends_with('/')
        {
            return dir.to_string();
        }
    }
    full_path.to_string()
}

/// Route every representation, caching each route on its rep, and reject
/// collisions.
pub fn assign_routes(
    site: &Site,
    rules: &dyn RuleResolver,
    reps: &[ItemRep],
) -> Result<(), RouteError> {
    let mut claimed: HashMap<PathBuf, String> = HashMap::new();

    for rep in reps {
        if !rep.is_route_assigned() {
            let item = &site.items[rep.item];
            let route = route_for(site, item, &rep.name, rules.route(item, &rep.name))?;
            rep.assign_route(route);
        }
        let Some(route) = rep.route() else {
            continue;
        };
        if let Some(first) = claimed.get(&route.raw_path) {
            return Err(RouteError::Collision {
                path: route.raw_path.clone(),
                first: first.clone(),
                second: rep.to_string(),
            });
        }
        claimed.insert(route.raw_path.clone(), rep.to_string());
    }

    Ok(())
}
