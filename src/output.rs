//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Compile
//!
//! One line per file touched, paths relative to the site root:
//!
//! ```text
//!     create  output/index.html
//!     update  output/about/index.html
//!  identical  output/blog/first/index.html
//!       skip  /blog/second/ (default)
//!
//! Compiled 3, skipped 1 (1 created, 1 updated, 1 identical)
//! ```
//!
//! `skip` and the per-rep lifecycle lines (`compile`, `filter`, `wait`) only
//! show with `--verbose`.
//!
//! ## Failures
//!
//! ```text
//! Compilation of /about/ (default) failed
//!     in layout /page/
//!     in item /about/ (default)
//! ```
//!
//! ## Check
//!
//! ```text
//! /about/ (default) → /about/
//! /drafts/x/ (default) → (not written)
//! ```
//!
//! # Architecture
//!
//! Each `format_*` function returns `Vec<String>` for testability; `print_*`
//! wrappers write to stdout. Format functions are pure.

use crate::compiler::CompileReport;
use crate::notify::CompileEvent;
use crate::router::Route;
use std::path::Path;

/// Width of the action column.
const ACTION_WIDTH: usize = 10;

fn action_line(action: &str, subject: &str) -> String {
    format!("{action:>ACTION_WIDTH$}  {subject}")
}

fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

// ============================================================================
// Compile events
// ============================================================================

/// Lines for one compile event. Quiet events yield nothing unless `verbose`.
pub fn format_event(event: &CompileEvent, root: &Path, verbose: bool) -> Vec<String> {
    match event {
        CompileEvent::FileCreated(path) => vec![action_line("create", &relative(path, root))],
        CompileEvent::FileUpdated(path) => vec![action_line("update", &relative(path, root))],
        CompileEvent::FileIdentical(path) => {
            vec![action_line("identical", &relative(path, root))]
        }
        CompileEvent::CompilationFailed { rep, trace } => format_error_trace(rep, trace),
        _ if !verbose => Vec::new(),
        CompileEvent::Skipped { rep } => vec![action_line("skip", rep)],
        CompileEvent::CompilationStarted { rep, reason } => match reason {
            Some(reason) => vec![action_line("compile", &format!("{rep} ({reason})"))],
            None => vec![action_line("compile", rep)],
        },
        CompileEvent::CompilationEnded { .. } => Vec::new(),
        CompileEvent::FilteringStarted { rep, filter } => {
            vec![action_line("filter", &format!("{rep} [{filter}]"))]
        }
        CompileEvent::FilteringEnded { .. } => Vec::new(),
        CompileEvent::DependencyUnmet { rep, target } => {
            vec![action_line("wait", &format!("{rep} needs {target}"))]
        }
    }
}

pub fn print_event(event: &CompileEvent, root: &Path, verbose: bool) {
    for line in format_event(event, root, verbose) {
        println!("{}", line);
    }
}

/// Failure header followed by the compilation stack, innermost first.
pub fn format_error_trace(rep: &str, trace: &[String]) -> Vec<String> {
    let mut lines = vec![format!("Compilation of {rep} failed")];
    lines.extend(trace.iter().map(|frame| format!("    in {frame}")));
    lines
}

// ============================================================================
// Summary
// ============================================================================

pub fn format_report(report: &CompileReport, root: &Path) -> Vec<String> {
    let mut lines = vec![String::new(), report.to_string()];
    if let Some(diff) = &report.diff {
        lines.push(format!("Diff written to {}", relative(diff, root)));
    }
    lines
}

pub fn print_report(report: &CompileReport, root: &Path) {
    for line in format_report(report, root) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

pub fn format_routes(routes: &[(String, Option<Route>)]) -> Vec<String> {
    routes
        .iter()
        .map(|(rep, route)| match route {
            Some(route) => format!("{rep} → {}", route.path),
            None => format!("{rep} → (not written)"),
        })
        .collect()
}

pub fn print_routes(routes: &[(String, Option<Route>)]) {
    for line in format_routes(routes) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outdated::OutdatedReason;
    use std::path::PathBuf;

    fn root() -> PathBuf {
        PathBuf::from("/site")
    }

    #[test]
    fn action_column_is_right_aligned() {
        assert_eq!(action_line("create", "x"), "    create  x");
        assert_eq!(action_line("identical", "x"), " identical  x");
    }

    #[test]
    fn file_events_show_relative_paths() {
        let event = CompileEvent::FileCreated("/site/output/index.html".into());
        assert_eq!(
            format_event(&event, &root(), false),
            vec!["    create  output/index.html"]
        );
        let event = CompileEvent::FileUpdated("/elsewhere/a.html".into());
        assert_eq!(
            format_event(&event, &root(), false),
            vec!["    update  /elsewhere/a.html"]
        );
    }

    #[test]
    fn lifecycle_events_need_verbose() {
        let event = CompileEvent::Skipped {
            rep: "/a/ (default)".into(),
        };
        assert!(format_event(&event, &root(), false).is_empty());
        assert_eq!(
            format_event(&event, &root(), true),
            vec!["      skip  /a/ (default)"]
        );
    }

    #[test]
    fn compile_line_gives_reason() {
        let event = CompileEvent::CompilationStarted {
            rep: "/a/ (default)".into(),
            reason: Some(OutdatedReason::SourceModified),
        };
        assert_eq!(
            format_event(&event, &root(), true),
            vec!["   compile  /a/ (default) (source modified)"]
        );
    }

    #[test]
    fn ended_events_are_silent() {
        let event = CompileEvent::CompilationEnded {
            rep: "/a/ (default)".into(),
        };
        assert!(format_event(&event, &root(), true).is_empty());
    }

    #[test]
    fn filtering_and_dependency_lines() {
        let filtering = CompileEvent::FilteringStarted {
            rep: "/a/ (default)".into(),
            filter: "markdown".into(),
        };
        assert_eq!(
            format_event(&filtering, &root(), true),
            vec!["    filter  /a/ (default) [markdown]"]
        );
        let unmet = CompileEvent::DependencyUnmet {
            rep: "/a/ (default)".into(),
            target: "/b/ (default)".into(),
        };
        assert_eq!(
            format_event(&unmet, &root(), true),
            vec!["      wait  /a/ (default) needs /b/ (default)"]
        );
    }

    #[test]
    fn failures_always_show_trace() {
        let event = CompileEvent::CompilationFailed {
            rep: "/a/ (default)".into(),
            trace: vec!["layout /page/".into(), "item /a/ (default)".into()],
        };
        assert_eq!(
            format_event(&event, &root(), false),
            vec![
                "Compilation of /a/ (default) failed",
                "    in layout /page/",
                "    in item /a/ (default)",
            ]
        );
    }

    #[test]
    fn report_mentions_diff() {
        let report = CompileReport {
            compiled: 1,
            updated: 1,
            diff: Some("/site/output.diff".into()),
            ..CompileReport::default()
        };
        let lines = format_report(&report, &root());
        assert_eq!(lines[0], "");
        assert!(lines[1].starts_with("Compiled 1"));
        assert_eq!(lines[2], "Diff written to output.diff");
    }

    #[test]
    fn routes_listing() {
        let routes = vec![
            (
                "/a/ (default)".to_string(),
                Some(Route {
                    path: "/a/".into(),
                    raw_path: "/site/output/a/index.html".into(),
                }),
            ),
            ("/b/ (default)".to_string(), None),
        ];
        assert_eq!(
            format_routes(&routes),
            vec!["/a/ (default) → /a/", "/b/ (default) → (not written)"]
        );
    }
}
