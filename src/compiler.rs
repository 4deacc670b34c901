//! Compiles every outdated representation of a site and writes the results.
//!
//! ## Run
//!
//! ```text
//! build reps ─▶ assign routes ─▶ outdated? ─┬─ no ──▶ restore snapshots (Skipped)
//!                                           └─ yes ─▶ queue
//!                                                       │
//!                  ┌────────────────────────────────────┘
//!                  ▼
//!            pop rep ─▶ attempt ─┬─ Ready ─────▶ commit, write, cache
//!                  ▲             └─ NotReady(t) ─▶ push t, then rep, to the front
//!                  └──────────────────────────────────────┘
//! ```
//!
//! There is no dependency graph. A rep asking for another rep's compiled
//! content before that rep is compiled gets `NotReady`; its attempt is
//! thrown away and the target is compiled first. Reps suspended that way
//! form a chain; a target already on the chain (or the rep itself) is a
//! cycle and aborts the run.
//!
//! Up-to-date reps still answer compiled-content queries, from the compiled
//! content cache or, failing that, from their existing output file.

use crate::cache::{CachedRep, CompiledContentCache};
use crate::content::{Content, Kind, SnapshotStore};
use crate::filters::{FilterError, FilterRegistry};
use crate::item::normalize_identifier;
use crate::notify::{CompileEvent, Notifier};
use crate::outdated::{OutdatedInputs, OutdatedReason, outdatedness};
use crate::rep::{ItemRep, Outcome, Pipeline, PipelineEnv, RepId, build_reps};
use crate::router::{Route, RouteError, assign_routes};
use crate::rules::RuleResolver;
use crate::site::Site;
use crate::stack::{CompilationStack, Frame};
use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

/// Name of the diff file written at the site root.
pub const DIFF_FILENAME: &str = "output.diff";

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Unknown filter '{0}'")]
    UnknownFilter(String),
    #[error("Unknown layout '{0}'")]
    UnknownLayout(String),
    #[error("Filter '{filter}' expects {expected} content but {rep} has {actual} content")]
    FilterKindMismatch {
        filter: String,
        rep: String,
        expected: Kind,
        actual: Kind,
    },
    #[error("Cannot apply a layout to binary representation {0}")]
    CannotLayoutBinary(String),
    #[error("No layout rule gives a filter for layout {0}")]
    CannotDetermineFilter(String),
    #[error("Filter '{filter}' did not write its output file {}", .path.display())]
    MissingBinaryOutput { filter: String, path: PathBuf },
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
    #[error("No item with identifier {0}")]
    UnknownItem(String),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("Filter '{filter}' failed on {rep}: {source}")]
    Filter {
        filter: String,
        rep: String,
        source: FilterError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Recompile everything regardless of timestamps.
    pub force: bool,
    /// Start from this item's reps only. Reps it depends on are still
    /// compiled as needed.
    pub only: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileReport {
    pub compiled: usize,
    pub skipped: usize,
    pub created: usize,
    pub updated: usize,
    pub identical: usize,
    /// Diff file written this run, if any.
    pub diff: Option<PathBuf>,
}

impl fmt::Display for CompileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Compiled {}, skipped {} ({} created, {} updated, {} identical)",
            self.compiled, self.skipped, self.created, self.updated, self.identical
        )
    }
}

pub struct Compiler<'a> {
    site: &'a Site,
    rules: &'a dyn RuleResolver,
    filters: &'a FilterRegistry,
    reps: Vec<ItemRep>,
    /// Why each rep of the current run is being recompiled; `None` when up to date.
    reasons: Vec<Option<OutdatedReason>>,
    notifier: Notifier,
}

impl<'a> Compiler<'a> {
    pub fn new(site: &'a Site, rules: &'a dyn RuleResolver, filters: &'a FilterRegistry) -> Self {
        Self {
            site,
            rules,
            filters,
            reps: build_reps(site, rules),
            reasons: Vec::new(),
            notifier: Notifier::silent(),
        }
    }

    /// Send lifecycle events to `tx`.
    pub fn with_events(mut self, tx: Sender<CompileEvent>) -> Self {
        self.notifier = Notifier::new(tx);
        self
    }

    /// Reps of the last run (or of a fresh build before any run).
    pub fn reps(&self) -> &[ItemRep] {
        &self.reps
    }

    pub fn rep(&self, identifier: &str, name: &str) -> Option<&ItemRep> {
        let identifier = normalize_identifier(identifier);
        self.reps
            .iter()
            .find(|r| r.identifier() == identifier && r.name == name)
    }

    /// Route every rep without compiling anything. Collisions are errors.
    pub fn routes(&mut self) -> Result<Vec<(String, Option<Route>)>, CompileError> {
        self.reset()?;
        Ok(self
            .reps
            .iter()
            .map(|r| (r.to_string(), r.route().cloned()))
            .collect())
    }

    pub fn compile(&mut self, options: &CompileOptions) -> Result<CompileReport, CompileError> {
        self.reset()?;
        let only = match &options.only {
            Some(identifier) => {
                let identifier = normalize_identifier(identifier);
                if self.site.item(&identifier).is_none() {
                    return Err(CompileError::UnknownItem(identifier));
                }
                Some(identifier)
            }
            None => None,
        };
        if options.force {
            self.reps.iter_mut().for_each(ItemRep::force_outdated);
        }

        let tmp_dir = self.site.tmp_dir();
        let mut cache = CompiledContentCache::load(&tmp_dir);
        let mut report = CompileReport::default();

        let mut queue = VecDeque::new();
        for id in 0..self.reps.len() {
            let rep = &self.reps[id];
            let inputs = OutdatedInputs::gather(self.site, &self.site.items[rep.item], rep);
            if let Some(reason) = outdatedness(&inputs) {
                self.reasons[id] = Some(reason);
                if only.as_deref().is_none_or(|o| o == rep.identifier()) {
                    queue.push_back(id);
                }
                continue;
            }
            let store = self.restored_snapshots(id, &cache);
            let rep = &mut self.reps[id];
            rep.restore(store);
            report.skipped += 1;
            self.notifier.send(CompileEvent::Skipped {
                rep: rep.to_string(),
            });
        }

        // Reps finished before a failure are already on disk; their cache
        // entries must be too.
        let result = self.run_queue(queue, &tmp_dir, &mut cache, &mut report);
        cache.save(&tmp_dir)?;
        result?;

        if self.site.config.enable_output_diff {
            report.diff = self.write_diff()?;
        }
        Ok(report)
    }

    /// Rebuild reps and routes, dropping all state of a previous run.
    fn reset(&mut self) -> Result<(), CompileError> {
        self.reps = build_reps(self.site, self.rules);
        self.reasons = vec![None; self.reps.len()];
        assign_routes(self.site, self.rules, &self.reps)?;
        Ok(())
    }

    fn run_queue(
        &mut self,
        mut queue: VecDeque<RepId>,
        tmp_dir: &Path,
        cache: &mut CompiledContentCache,
        report: &mut CompileReport,
    ) -> Result<(), CompileError> {
        let scratch_dir = tmp_dir.join("binary");
        let mut stack = CompilationStack::new();
        // Reps suspended on an unmet dependency, outermost first.
        let mut waiting: Vec<RepId> = Vec::new();

        while let Some(id) = queue.pop_front() {
            if self.reps[id].is_compiled() {
                continue;
            }
            if waiting.last() == Some(&id) {
                waiting.pop();
            }

            match self.attempt(id, &mut stack, &scratch_dir)? {
                Outcome::Ready(store) => self.finish(id, store, cache, report)?,
                Outcome::NotReady(target) => {
                    if target == id || waiting.contains(&target) {
                        return Err(CompileError::Cycle(self.cycle(&waiting, id, target)));
                    }
                    self.notifier.send(CompileEvent::DependencyUnmet {
                        rep: self.reps[id].to_string(),
                        target: self.reps[target].to_string(),
                    });
                    waiting.push(id);
                    queue.push_front(id);
                    queue.push_front(target);
                }
            }
        }
        Ok(())
    }

    /// Run one attempt. On `NotReady` the rep is back to `Pending` and the
    /// attempt's snapshots are gone.
    fn attempt(
        &mut self,
        id: RepId,
        stack: &mut CompilationStack,
        scratch_dir: &Path,
    ) -> Result<Outcome<SnapshotStore>, CompileError> {
        let label = self.reps[id].to_string();
        let steps = {
            let rep = &self.reps[id];
            self.rules.steps(&self.site.items[rep.item], &rep.name)
        };

        self.reps[id].begin();
        self.notifier.send(CompileEvent::CompilationStarted {
            rep: label.clone(),
            reason: self.reasons[id],
        });
        stack.push(Frame::Rep(label.clone()));

        let env = PipelineEnv {
            site: self.site,
            rules: self.rules,
            filters: self.filters,
            reps: &self.reps,
            notifier: &self.notifier,
            scratch_dir,
        };
        let result = Pipeline::new(env, id, stack).run(&steps);

        match result {
            Ok(Outcome::Ready(store)) => {
                stack.pop();
                Ok(Outcome::Ready(store))
            }
            Ok(Outcome::NotReady(target)) => {
                stack.pop();
                self.reps[id].abandon();
                Ok(Outcome::NotReady(target))
            }
            Err(e) => {
                self.notifier.send(CompileEvent::CompilationFailed {
                    rep: label,
                    trace: stack.trace(),
                });
                stack.clear();
                self.reps[id].fail();
                Err(e)
            }
        }
    }

    fn finish(
        &mut self,
        id: RepId,
        store: SnapshotStore,
        cache: &mut CompiledContentCache,
        report: &mut CompileReport,
    ) -> Result<(), CompileError> {
        let entry = CachedRep {
            binary: store.kind() == Kind::Binary,
            snapshots: store.text_slots(),
        };
        let rep = &mut self.reps[id];
        rep.commit(store);
        cache.insert(rep.identifier(), &rep.name, entry);
        report.compiled += 1;

        if let Some(outcome) = rep.write()?
            && let Some(path) = rep.raw_path()
        {
            let path = path.to_path_buf();
            let event = if outcome.created {
                report.created += 1;
                CompileEvent::FileCreated(path)
            } else if outcome.modified {
                report.updated += 1;
                CompileEvent::FileUpdated(path)
            } else {
                report.identical += 1;
                CompileEvent::FileIdentical(path)
            };
            self.notifier.send(event);
        }

        self.notifier.send(CompileEvent::CompilationEnded {
            rep: rep.to_string(),
        });
        Ok(())
    }

    /// Snapshots of an up-to-date rep: the cached ones, or the output file
    /// as `last`.
    fn restored_snapshots(&self, id: RepId, cache: &CompiledContentCache) -> SnapshotStore {
        let rep = &self.reps[id];
        let item = &self.site.items[rep.item];
        let Some(raw_path) = rep.raw_path() else {
            return SnapshotStore::new(item.raw.clone());
        };

        if let Some(entry) = cache.get(rep.identifier(), &rep.name) {
            if entry.binary {
                return SnapshotStore::with_last(Content::Binary(raw_path.to_path_buf()));
            }
            if let Some(store) = SnapshotStore::from_text_slots(&entry.snapshots) {
                return store;
            }
        }

        match item.kind() {
            Kind::Text => match fs::read_to_string(raw_path) {
                Ok(text) => SnapshotStore::with_last(Content::Text(text)),
                Err(_) => SnapshotStore::with_last(Content::Binary(raw_path.to_path_buf())),
            },
            Kind::Binary => SnapshotStore::with_last(Content::Binary(raw_path.to_path_buf())),
        }
    }

    /// Labels of the cycle closed by `id` needing `target`.
    fn cycle(&self, waiting: &[RepId], id: RepId, target: RepId) -> Vec<String> {
        let start = waiting
            .iter()
            .position(|w| *w == target)
            .unwrap_or(waiting.len());
        waiting[start..]
            .iter()
            .chain([&id, &target])
            .map(|r| self.reps[*r].to_string())
            .collect()
    }

    /// Write the diffs of every modified text rep to the diff file. A stale
    /// diff file is removed when nothing changed.
    fn write_diff(&self) -> Result<Option<PathBuf>, CompileError> {
        let path = self.site.root.join(DIFF_FILENAME);
        let diffs: Vec<String> = self.reps.iter().filter_map(ItemRep::diff).collect();
        if diffs.is_empty() {
            if path.exists() {
                fs::remove_file(&path)?;
            }
            return Ok(None);
        }
        fs::write(&path, diffs.concat())?;
        Ok(Some(path))
    }
}
