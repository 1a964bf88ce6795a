use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    System,
    User,
    Other,
    Generate,
    Commit,
    Error,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::System => "system",
            EntryKind::User => "user",
            EntryKind::Other => "other",
            EntryKind::Generate => "generate",
            EntryKind::Commit => "commit",
            EntryKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub kind: EntryKind,
    pub message: String,
    pub tokens: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

/// What a caller hands to `HistoryLog::append`. The log fills in the id and,
/// when absent, the timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub kind: EntryKind,
    pub message: String,
    pub tokens: Option<u32>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewEntry {
    pub fn new(kind: EntryKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            tokens: None,
            timestamp: None,
        }
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::new(EntryKind::System, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EntryKind::Error, message)
    }

    pub fn with_tokens(mut self, tokens: u32) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}
