//! Item representations and the pipeline that compiles them.
//!
//! Every item has one [`ItemRep`] per representation name (always at least
//! `default`). Reps of the whole site live in one `Vec`, in declaration
//! order, and refer to each other by index ([`RepId`]).
//!
//! ## Lifecycle within one run
//!
//! ```text
//! Pending ──begin──▶ Compiling ──commit──▶ Compiled ──write──▶ (written)
//!    ▲                   │
//!    └─────abandon───────┤
//!                        └──fail──▶ Failed
//! ```
//!
//! Up-to-date reps go straight from `Pending` to `Compiled` via `restore`.
//!
//! ## Attempts
//!
//! A compilation attempt runs in a [`Pipeline`], which owns a fresh
//! [`SnapshotStore`]. The rep itself is not touched until the attempt
//! completes and the compiler commits the store. When a step asks for the
//! compiled content of a rep that isn't compiled yet, the pipeline returns
//! [`Outcome::NotReady`] and the whole attempt is dropped; nothing of it
//! survives into the rep.

use crate::cache::files_identical;
use crate::compiler::CompileError;
use crate::content::{Content, Kind, LAST, POST, PRE, SnapshotError, SnapshotStore};
use crate::filters::{FilterContext, FilterRegistry};
use crate::item::Item;
use crate::notify::{CompileEvent, Notifier};
use crate::router::Route;
use crate::rules::{RuleResolver, Step};
use crate::site::Site;
use crate::stack::{CompilationStack, Frame};
use std::cell::OnceCell;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Index of a rep in the site-wide rep list.
pub type RepId = usize;

/// Result of anything that may need another rep's compiled content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Ready(T),
    /// The given rep must be compiled first.
    NotReady(RepId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepState {
    Pending,
    Compiling,
    Compiled,
    Failed,
}

/// What writing a rep's output did to the file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// No file existed at the output path before.
    pub created: bool,
    /// The file's content changed (always true when created).
    pub modified: bool,
}

#[derive(Debug)]
pub struct ItemRep {
    pub id: RepId,
    /// Index of the owning item in `Site::items`.
    pub item: usize,
    pub name: String,
    identifier: String,
    state: RepState,
    snapshots: Option<SnapshotStore>,
    route: OnceCell<Option<Route>>,
    forced_outdated: bool,
    written: Option<WriteOutcome>,
    /// Text of the output file before and after the last write, kept for
    /// the diff. `None` for binary output.
    previous_text: Option<String>,
    current_text: Option<String>,
}

impl fmt::Display for ItemRep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.identifier, self.name)
    }
}

impl ItemRep {
    pub fn new(id: RepId, item: usize, identifier: &str, name: &str) -> Self {
        Self {
            id,
            item,
            name: name.to_string(),
            identifier: identifier.to_string(),
            state: RepState::Pending,
            snapshots: None,
            route: OnceCell::new(),
            forced_outdated: false,
            written: None,
            previous_text: None,
            current_text: None,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn state(&self) -> RepState {
        self.state
    }

    pub fn is_compiled(&self) -> bool {
        self.state == RepState::Compiled
    }

    pub fn force_outdated(&mut self) {
        self.forced_outdated = true;
    }

    pub fn is_forced_outdated(&self) -> bool {
        self.forced_outdated
    }

    // -- routing ------------------------------------------------------------

    pub fn is_route_assigned(&self) -> bool {
        self.route.get().is_some()
    }

    /// Set the route. Only the first assignment counts.
    pub fn assign_route(&self, route: Option<Route>) {
        let _ = self.route.set(route);
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.get().and_then(|r| r.as_ref())
    }

    /// Web path, if routed.
    pub fn path(&self) -> Option<&str> {
        self.route().map(|r| r.path.as_str())
    }

    /// On-disk output path, if routed.
    pub fn raw_path(&self) -> Option<&Path> {
        self.route().map(|r| r.raw_path.as_path())
    }

    // -- state transitions --------------------------------------------------

    pub fn begin(&mut self) {
        self.state = RepState::Compiling;
    }

    /// Back to `Pending` after an attempt hit an unmet dependency.
    pub fn abandon(&mut self) {
        self.state = RepState::Pending;
    }

    pub fn fail(&mut self) {
        self.state = RepState::Failed;
    }

    /// Take the snapshots of a completed attempt.
    pub fn commit(&mut self, store: SnapshotStore) {
        self.snapshots = Some(store);
        self.state = RepState::Compiled;
    }

    /// Mark an up-to-date rep compiled with snapshots recovered from a
    /// previous run. Nothing is written.
    pub fn restore(&mut self, store: SnapshotStore) {
        self.commit(store);
    }

    pub fn snapshots(&self) -> Option<&SnapshotStore> {
        self.snapshots.as_ref()
    }

    /// Compiled content at `snapshot` (default: `pre` if present, else
    /// `last`), or `NotReady` if this rep isn't compiled yet.
    pub fn compiled_content(
        &self,
        snapshot: Option<&str>,
    ) -> Result<Outcome<&Content>, SnapshotError> {
        let Some(store) = self.snapshots.as_ref().filter(|_| self.is_compiled()) else {
            return Ok(Outcome::NotReady(self.id));
        };
        let slot = snapshot.unwrap_or_else(|| store.default_slot());
        store.read(slot).map(Outcome::Ready)
    }

    // -- output -------------------------------------------------------------

    /// Write `last` to the output path. `Ok(None)` when the rep isn't routed
    /// or has nothing compiled.
    ///
    /// The file is always rewritten, so its modification time moves past the
    /// inputs even when the content is identical.
    pub fn write(&mut self) -> io::Result<Option<WriteOutcome>> {
        let (Some(raw_path), Some(store)) = (self.raw_path(), self.snapshots.as_ref()) else {
            return Ok(None);
        };
        let raw_path = raw_path.to_path_buf();
        if let Some(parent) = raw_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let created = !raw_path.exists();

        let (modified, previous_text, current_text) = match store.last() {
            Content::Text(text) => {
                let previous = if created { None } else { Some(fs::read(&raw_path)?) };
                fs::write(&raw_path, text)?;
                let modified = previous.as_deref() != Some(text.as_bytes());
                let previous_text = previous.map(|b| String::from_utf8(b).ok());
                (modified, previous_text.flatten(), Some(text.clone()))
            }
            Content::Binary(source) => {
                let modified = created || !files_identical(source, &raw_path)?;
                if source != &raw_path {
                    fs::copy(source, &raw_path)?;
                }
                (modified, None, None)
            }
        };

        let outcome = WriteOutcome { created, modified };
        self.written = Some(outcome);
        self.previous_text = previous_text;
        self.current_text = current_text;
        Ok(Some(outcome))
    }

    pub fn written(&self) -> Option<WriteOutcome> {
        self.written
    }

    pub fn created(&self) -> bool {
        self.written.is_some_and(|w| w.created)
    }

    pub fn modified(&self) -> bool {
        self.written.is_some_and(|w| w.modified)
    }

    /// Unified diff between the previous and the new output. `None` when
    /// nothing changed, the file is new, or either side isn't text.
    pub fn diff(&self) -> Option<String> {
        if !self.modified() {
            return None;
        }
        let (old, new) = (self.previous_text.as_deref()?, self.current_text.as_deref()?);
        let label = self.path().unwrap_or(&self.identifier);
        let diff = similar::TextDiff::from_lines(old, new)
            .unified_diff()
            .context_radius(3)
            .header(&format!("a{label}"), &format!("b{label}"))
            .to_string();
        Some(diff)
    }
}

/// One rep per (item, rep name), items in order.
pub fn build_reps(site: &Site, rules: &dyn RuleResolver) -> Vec<ItemRep> {
    let mut reps = Vec::new();
    for (index, item) in site.items.iter().enumerate() {
        for name in rules.rep_names(item) {
            reps.push(ItemRep::new(reps.len(), index, &item.identifier, &name));
        }
    }
    reps
}

/// Find a rep by item identifier (already normalized) and rep name.
pub fn find_rep<'r>(reps: &'r [ItemRep], identifier: &str, name: &str) -> Option<&'r ItemRep> {
    reps.iter().find(|r| r.identifier == identifier && r.name == name)
}

// ============================================================================
// Pipeline
// ============================================================================

/// Read-only state shared by every attempt in a run.
#[derive(Clone, Copy)]
pub struct PipelineEnv<'a> {
    pub site: &'a Site,
    pub rules: &'a dyn RuleResolver,
    pub filters: &'a FilterRegistry,
    pub reps: &'a [ItemRep],
    pub notifier: &'a Notifier,
    /// Where binary-producing filters write their output.
    pub scratch_dir: &'a Path,
}

/// One compilation attempt of one rep.
pub struct Pipeline<'a> {
    env: PipelineEnv<'a>,
    rep: &'a ItemRep,
    item: &'a Item,
    label: String,
    stack: &'a mut CompilationStack,
    store: SnapshotStore,
    step: usize,
}

impl<'a> Pipeline<'a> {
    pub fn new(env: PipelineEnv<'a>, rep: RepId, stack: &'a mut CompilationStack) -> Self {
        let rep = &env.reps[rep];
        let item = &env.site.items[rep.item];
        Self {
            env,
            rep,
            item,
            label: rep.to_string(),
            stack,
            store: SnapshotStore::new(item.raw.clone()),
            step: 0,
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Run `steps` in order. The finished store is handed back for the
    /// compiler to commit.
    pub fn run(mut self, steps: &[Step]) -> Result<Outcome<SnapshotStore>, CompileError> {
        for step in steps {
            let outcome = match step {
                Step::Filter { filter, params } => self.filter(filter, params)?,
                Step::Layout { layout } => self.layout(layout)?,
                Step::Snapshot { snapshot } => {
                    self.snapshot(snapshot);
                    Outcome::Ready(())
                }
            };
            if let Outcome::NotReady(target) = outcome {
                return Ok(Outcome::NotReady(target));
            }
        }
        Ok(Outcome::Ready(self.store))
    }

    /// Run a filter over `last`. Captures `pre` while no layout has been
    /// applied yet.
    pub fn filter(
        &mut self,
        name: &str,
        params: &toml::Table,
    ) -> Result<Outcome<()>, CompileError> {
        let filters = self.env.filters;
        let filter = filters
            .get(name)
            .ok_or_else(|| CompileError::UnknownFilter(name.to_string()))?;
        self.check_input(name, filter.input_kind(), self.store.kind())?;

        let output_filename = self.next_output_filename();
        if filter.output_kind() == Kind::Binary {
            fs::create_dir_all(self.env.scratch_dir)?;
        }

        self.notify_filtering(name, true);
        let result = {
            let ctx = self.context(None, self.store.last(), output_filename);
            filter.run(self.store.last(), params, &ctx)
        };
        self.notify_filtering(name, false);

        let content = match result.map_err(|source| self.filter_error(name, source))? {
            Outcome::Ready(content) => content,
            Outcome::NotReady(target) => return Ok(Outcome::NotReady(target)),
        };
        self.check_output(name, filter.output_kind(), &content)?;

        self.store.write(LAST, content);
        if !self.store.contains(POST) {
            self.store.capture(PRE);
        }
        Ok(Outcome::Ready(()))
    }

    /// Render a layout around `last` and capture the result in `post`.
    pub fn layout(&mut self, identifier: &str) -> Result<Outcome<()>, CompileError> {
        let site = self.env.site;
        let layout = site
            .layout(identifier)
            .ok_or_else(|| CompileError::UnknownLayout(identifier.to_string()))?;
        if self.store.kind() == Kind::Binary {
            return Err(CompileError::CannotLayoutBinary(self.label.clone()));
        }
        if !self.store.contains(PRE) {
            self.store.capture(PRE);
        }

        let (filter_name, params) = self
            .env
            .rules
            .layout_filter(layout)
            .ok_or_else(|| CompileError::CannotDetermineFilter(layout.identifier.clone()))?;
        let filters = self.env.filters;
        let filter = filters
            .get(&filter_name)
            .ok_or_else(|| CompileError::UnknownFilter(filter_name.clone()))?;
        self.check_input(&filter_name, filter.input_kind(), Kind::Text)?;

        let output_filename = self.next_output_filename();
        let source = Content::Text(layout.content.clone());

        self.stack.push(Frame::Layout(layout.identifier.clone()));
        self.notify_filtering(&filter_name, true);
        let result = {
            let ctx = self.context(Some(layout), self.store.last(), output_filename);
            filter.run(&source, &params, &ctx)
        };
        self.notify_filtering(&filter_name, false);

        // On error the frame stays so the trace shows the layout.
        let content = match result.map_err(|source| self.filter_error(&filter_name, source))? {
            Outcome::Ready(content) => content,
            Outcome::NotReady(target) => {
                self.stack.pop();
                return Ok(Outcome::NotReady(target));
            }
        };
        self.check_output(&filter_name, filter.output_kind(), &content)?;
        self.stack.pop();

        self.store.write(LAST, content);
        self.store.capture(POST);
        Ok(Outcome::Ready(()))
    }

    pub fn snapshot(&mut self, name: &str) {
        self.store.capture(name);
    }

    fn context<'c>(
        &'c self,
        layout: Option<&'c crate::item::Layout>,
        content: &'c Content,
        output_filename: PathBuf,
    ) -> FilterContext<'c> {
        FilterContext {
            item: self.item,
            rep: &self.rep.name,
            path: self.rep.path(),
            site: self.env.site,
            layout,
            content,
            output_filename,
            reps: self.env.reps,
        }
    }

    fn next_output_filename(&mut self) -> PathBuf {
        self.step += 1;
        let stem = match self.item.identifier.trim_matches('/') {
            "" => "index".to_string(),
            s => s.replace('/', "_"),
        };
        self.env
            .scratch_dir
            .join(format!("{stem}-{}-{}", self.rep.name, self.step))
    }

    fn check_input(&self, filter: &str, expected: Kind, actual: Kind) -> Result<(), CompileError> {
        if expected == actual {
            return Ok(());
        }
        Err(CompileError::FilterKindMismatch {
            filter: filter.to_string(),
            rep: self.label.clone(),
            expected,
            actual,
        })
    }

    fn check_output(&self, filter: &str, declared: Kind, content: &Content) -> Result<(), CompileError> {
        self.check_input(filter, declared, content.kind())?;
        if let Content::Binary(path) = content
            && !path.is_file()
        {
            return Err(CompileError::MissingBinaryOutput {
                filter: filter.to_string(),
                path: path.clone(),
            });
        }
        Ok(())
    }

    fn filter_error(&self, filter: &str, source: crate::filters::FilterError) -> CompileError {
        CompileError::Filter {
            filter: filter.to_string(),
            rep: self.label.clone(),
            source,
        }
    }

    fn notify_filtering(&self, filter: &str, started: bool) {
        let rep = self.label.clone();
        let filter = filter.to_string();
        self.env.notifier.send(if started {
            CompileEvent::FilteringStarted { rep, filter }
        } else {
            CompileEvent::FilteringEnded { rep, filter }
        });
    }
}
