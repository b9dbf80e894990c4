//! Session history with a cursor, in the shape of the History API.

use serde::{Deserialize, Serialize};

/// State saved with each entry and handed back on back/forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryState {
    pub route: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub state: HistoryState,
    pub title: String,
    pub url: String,
}

/// Linear history. Pushing after going back discards the forward entries.
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
    cursor: Option<usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        let keep = self.cursor.map_or(0, |c| c + 1);
        self.entries.truncate(keep);
        self.entries.push(entry);
        self.cursor = Some(self.entries.len() - 1);
    }

    /// Step back; returns the state of the entry now current.
    pub fn back(&mut self) -> Option<HistoryState> {
        let cursor = self.cursor?;
        if cursor == 0 {
            return None;
        }
        self.cursor = Some(cursor - 1);
        Some(self.entries[cursor - 1].state.clone())
    }

    /// Step forward; returns the state of the entry now current.
    pub fn forward(&mut self) -> Option<HistoryState> {
        let cursor = self.cursor?;
        if cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor = Some(cursor + 1);
        Some(self.entries[cursor + 1].state.clone())
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.cursor.and_then(|c| self.entries.get(c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }
}
