//! Compilation lifecycle events.
//!
//! The compiler reports progress by sending [`CompileEvent`]s over an
//! optional `mpsc` channel. Delivery is best-effort: a dropped receiver never
//! affects compilation.

use crate::outdated::OutdatedReason;
use std::path::PathBuf;
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileEvent {
    /// `reason` is why the rep's output was stale.
    CompilationStarted {
        rep: String,
        reason: Option<OutdatedReason>,
    },
    CompilationEnded { rep: String },
    FilteringStarted { rep: String, filter: String },
    FilteringEnded { rep: String, filter: String },
    /// `rep` asked for `target`'s compiled content before it was compiled.
    DependencyUnmet { rep: String, target: String },
    /// Output was up to date; nothing ran.
    Skipped { rep: String },
    FileCreated(PathBuf),
    FileUpdated(PathBuf),
    FileIdentical(PathBuf),
    /// Compilation aborted; `trace` is the compilation stack, innermost first.
    CompilationFailed { rep: String, trace: Vec<String> },
}

/// Sending half of the event channel, or nothing.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    tx: Option<Sender<CompileEvent>>,
}

impl Notifier {
    pub fn new(tx: Sender<CompileEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A notifier that discards everything.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn send(&self, event: CompileEvent) {
        if let Some(tx) = &self.tx {
            tx.send(event).ok();
        }
    }
}
