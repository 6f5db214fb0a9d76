//! History Log
//!
//! Append-only record of concluded polls. Entries are never edited or
//! removed, except that an optional retention cap drops the oldest entries
//! to bound memory. The query surface is newest-first.

use std::collections::VecDeque;

use crate::polls::HistoryEntry;

/// Append-only log of concluded polls.
#[derive(Debug)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
    cap: Option<usize>,
}

impl HistoryLog {
    /// Create a log. `cap = None` keeps every entry.
    pub fn new(cap: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            cap,
        }
    }

    /// Append an entry, evicting the oldest if the cap is exceeded.
    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        if let Some(cap) = self.cap {
            while self.entries.len() > cap {
                self.entries.pop_front();
            }
        }
    }

    /// Entries newest-first.
    pub fn list(&self) -> Vec<HistoryEntry> {
        self.entries.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
