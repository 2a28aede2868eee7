//! Submitted-command history with a browse cursor.

/// Append-only command history.
///
/// `cursor` is `None` while the operator is not browsing, otherwise an index
/// into `entries` from oldest (0) to newest.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<String>,
    cursor: Option<usize>,
}

/// Result of stepping forward through history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recall {
    /// Show this entry in the input.
    Entry(String),
    /// Stepped past the newest entry; clear the input.
    Cleared,
    /// Nothing to do.
    Unchanged,
}

impl Recall {
    /// The entry to show, if any.
    pub fn entry(&self) -> Option<&str> {
        match self {
            Recall::Entry(entry) => Some(entry),
            _ => None,
        }
    }
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a submitted command and stop browsing.
    pub fn record(&mut self, raw: impl Into<String>) {
        self.entries.push(raw.into());
        self.cursor = None;
    }

    /// Step toward older entries, clamping at the oldest one.
    pub fn previous(&mut self) -> Option<&str> {
        let last = self.entries.len().checked_sub(1)?;
        let index = match self.cursor {
            None => last,
            Some(index) => index.saturating_sub(1),
        };
        self.cursor = Some(index);
        self.entries.get(index).map(String::as_str)
    }

    /// Step toward newer entries; past the newest one browsing ends.
    pub fn next(&mut self) -> Recall {
        let Some(index) = self.cursor else {
            return Recall::Unchanged;
        };
        if index + 1 < self.entries.len() {
            self.cursor = Some(index + 1);
            Recall::Entry(self.entries[index + 1].clone())
        } else {
            self.cursor = None;
            Recall::Cleared
        }
    }

    pub fn is_browsing(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
