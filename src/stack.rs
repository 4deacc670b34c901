//! Trace of what is being compiled right now.
//!
//! One [`CompilationStack`] lives for one compilation run and is passed
//! explicitly to whatever starts a representation or a layout step. It only
//! feeds diagnostics: when a step fails, the stack says which representation
//! and which (possibly nested) layout it happened in.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Rep(String),
    Layout(String),
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Rep(label) => write!(f, "item {label}"),
            Frame::Layout(identifier) => write!(f, "layout {identifier}"),
        }
    }
}

#[derive(Debug, Default)]
pub struct CompilationStack {
    frames: Vec<Frame>,
}

impl CompilationStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Innermost frame first.
    pub fn trace(&self) -> Vec<String> {
        self.frames.iter().rev().map(|f| f.to_string()).collect()
    }
}
