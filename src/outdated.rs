//! Decides whether a representation must be recompiled.
//!
//! [`outdatedness`] is a pure function over timestamps; [`OutdatedInputs::gather`]
//! is the only part that touches the filesystem (to stat the existing output
//! file). Nothing is cached between runs.
//!
//! Checks, in order, stopping at the first that applies:
//!
//! 1. the item's modification time is unknown
//! 2. the representation was forced outdated
//! 3. the representation has no output path (it is never written, so there
//!    is no previous output to reuse)
//! 4. no file exists yet at the output path
//! 5. the item is newer than the output file
//! 6. any layout, the auxiliary code, the config or the rules has an unknown
//!    modification time or is newer than the output file

use crate::item::{Item, Timestamp};
use crate::rep::ItemRep;
use crate::site::Site;
use std::fmt;
use std::fs;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutdatedReason {
    UnknownSourceTime,
    Forced,
    NotRouted,
    NotWritten,
    SourceModified,
    LayoutsModified,
    CodeModified,
    ConfigModified,
    RulesModified,
}

impl fmt::Display for OutdatedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            OutdatedReason::UnknownSourceTime => "source modification time unknown",
            OutdatedReason::Forced => "forced",
            OutdatedReason::NotRouted => "not written to disk",
            OutdatedReason::NotWritten => "no compiled output yet",
            OutdatedReason::SourceModified => "source modified",
            OutdatedReason::LayoutsModified => "layouts modified",
            OutdatedReason::CodeModified => "code modified",
            OutdatedReason::ConfigModified => "config modified",
            OutdatedReason::RulesModified => "rules modified",
        };
        f.write_str(text)
    }
}

/// Everything the outdated check compares.
#[derive(Debug, Clone, Default)]
pub struct OutdatedInputs {
    pub item: Timestamp,
    pub forced: bool,
    pub routed: bool,
    /// Modification time of the existing output file; `None` when there is
    /// no file or its time can't be read.
    pub compiled_at: Option<SystemTime>,
    pub layouts: Vec<Timestamp>,
    pub code: Timestamp,
    pub config: Timestamp,
    pub rules: Timestamp,
}

impl OutdatedInputs {
    /// Collect inputs for one representation. Stats its output file.
    pub fn gather(site: &Site, item: &Item, rep: &ItemRep) -> Self {
        let compiled_at = rep
            .raw_path()
            .and_then(|p| fs::metadata(p).and_then(|m| m.modified()).ok());
        Self {
            item: item.mtime,
            forced: rep.is_forced_outdated(),
            routed: rep.route().is_some(),
            compiled_at,
            layouts: site.layouts.iter().map(|l| l.mtime).collect(),
            code: site.code_mtime,
            config: site.config_mtime,
            rules: site.rules_mtime,
        }
    }
}

/// Why a representation must be recompiled, or `None` if its existing
/// output is up to date.
pub fn outdatedness(inputs: &OutdatedInputs) -> Option<OutdatedReason> {
    let Some(item_time) = inputs.item else {
        return Some(OutdatedReason::UnknownSourceTime);
    };
    if inputs.forced {
        return Some(OutdatedReason::Forced);
    }
    if !inputs.routed {
        return Some(OutdatedReason::NotRouted);
    }
    let Some(compiled_at) = inputs.compiled_at else {
        return Some(OutdatedReason::NotWritten);
    };
    if item_time > compiled_at {
        return Some(OutdatedReason::SourceModified);
    }

    let newer = |t: &Timestamp| t.is_none_or(|t| t > compiled_at);
    if inputs.layouts.iter().any(newer) {
        return Some(OutdatedReason::LayoutsModified);
    }
    if newer(&inputs.code) {
        return Some(OutdatedReason::CodeModified);
    }
    if newer(&inputs.config) {
        return Some(OutdatedReason::ConfigModified);
    }
    if newer(&inputs.rules) {
        return Some(OutdatedReason::RulesModified);
    }
    None
}
