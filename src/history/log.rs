use chrono::Utc;

use super::entry::{EntryKind, HistoryEntry, NewEntry};
use super::stats::{compute_stats, HistoryStats};

pub const SESSION_STARTED: &str = "System started - Session begins";
pub const SESSION_CLEARED: &str = "Session cleared - New session begins";

#[derive(Debug)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
    // Survives clear() so ids stay distinct for the whole session.
    next_id: u64,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryLog {
    /// A fresh log always opens with one system entry.
    pub fn new() -> Self {
        let mut log = Self { entries: Vec::new(), next_id: 0 };
        let first = log.build(NewEntry::system(SESSION_STARTED));
        log.entries.push(first);
        log
    }

    fn build(&mut self, entry: NewEntry) -> HistoryEntry {
        self.next_id += 1;
        HistoryEntry {
            id: self.next_id,
            kind: entry.kind,
            message: entry.message,
            tokens: entry.tokens,
            timestamp: entry.timestamp.unwrap_or_else(Utc::now),
        }
    }

    pub fn append(&mut self, entry: NewEntry) -> &HistoryEntry {
        let built = self.build(entry);
        self.entries.push(built);
        &self.entries[self.entries.len() - 1]
    }

    /// Replaces the whole log with a single fresh system entry. The
    /// replacement is built first and swapped in, so no reader ever sees an
    /// empty log.
    pub fn clear(&mut self) {
        let fresh = vec![self.build(NewEntry::system(SESSION_CLEARED))];
        self.entries = fresh;
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn of_kind(&self, kind: EntryKind) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    pub fn stats(&self) -> HistoryStats {
        compute_stats(&self.entries)
    }
}
