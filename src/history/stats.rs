use serde::Serialize;
use std::collections::HashMap;

use super::entry::{EntryKind, HistoryEntry};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryStats {
    pub entries: usize,
    pub total_tokens: u64,
    pub by_kind: HashMap<EntryKind, usize>,
}

impl HistoryStats {
    pub fn count(&self, kind: EntryKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }
}

/// Pure fold over the log. Called on every read.
pub fn compute_stats(entries: &[HistoryEntry]) -> HistoryStats {
    let mut stats = HistoryStats {
        entries: entries.len(),
        ..Default::default()
    };
    for entry in entries {
        if let Some(tokens) = entry.tokens {
            stats.total_tokens += u64::from(tokens);
        }
        *stats.by_kind.entry(entry.kind).or_insert(0) += 1;
    }
    stats
}

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens<'a>(texts: impl IntoIterator<Item = &'a str>) -> u32 {
    let chars: usize = texts.into_iter().map(|t| t.chars().count()).sum();
    chars.div_ceil(4) as u32
}
