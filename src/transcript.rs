//! Append-only log of classified terminal lines.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::OutputStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Command,
    Stdout,
    Stderr,
    Info,
    Success,
    Error,
}

impl LineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LineKind::Command => "command",
            LineKind::Stdout => "stdout",
            LineKind::Stderr => "stderr",
            LineKind::Info => "info",
            LineKind::Success => "success",
            LineKind::Error => "error",
        }
    }
}

impl From<OutputStream> for LineKind {
    fn from(stream: OutputStream) -> Self {
        match stream {
            OutputStream::Stdout => LineKind::Stdout,
            OutputStream::Stderr => LineKind::Stderr,
        }
    }
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable transcript line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalLine {
    pub id: Uuid,
    pub content: String,
    pub kind: LineKind,
    pub timestamp: DateTime<Utc>,
}

/// Ordered transcript. Lines are only ever appended; `reset` clears everything.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    lines: Vec<TerminalLine>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, content: impl Into<String>, kind: LineKind) -> &TerminalLine {
        let index = self.lines.len();
        self.lines.push(TerminalLine {
            id: Uuid::new_v4(),
            content: content.into(),
            kind,
            timestamp: Utc::now(),
        });
        &self.lines[index]
    }

    pub fn reset(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[TerminalLine] {
        &self.lines
    }

    /// Lines appended after the first `seen` lines.
    pub fn since(&self, seen: usize) -> &[TerminalLine] {
        self.lines.get(seen..).unwrap_or(&[])
    }

    pub fn last(&self) -> Option<&TerminalLine> {
        self.lines.last()
    }

    pub fn count(&self, kind: LineKind) -> usize {
        self.lines.iter().filter(|line| line.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
