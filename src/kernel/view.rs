use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use super::event::ConnectionStatus;
use super::state::SessionState;
use crate::history::{HistoryEntry, HistoryStats};
use crate::services::backend::Quote;
use crate::transcript::Utterance;
use crate::tree::{IdeaNode, NodeKind, Suggestion};

/// Read-only projection of the session for presentation layers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub client_id: Uuid,
    pub version: u64,
    pub connection: ConnectionStatus,
    pub capturing: bool,
    pub utterances: Vec<Utterance>,
    pub fragment: Option<String>,
    pub tree: Vec<TreeRow>,
    pub live_suggestions: Vec<Suggestion>,
    pub related_quotes: Vec<Quote>,
    pub history: Vec<HistoryEntry>,
    pub total_tokens: u64,
    pub pending: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeRow {
    pub depth: usize,
    pub node: IdeaNode,
}

impl SessionView {
    pub fn project(state: &SessionState, pending: usize) -> Self {
        let stats: HistoryStats = state.history.stats();
        Self {
            client_id: state.client_id(),
            version: state.version,
            connection: state.connection,
            capturing: state.capturing,
            utterances: state.transcript.utterances().to_vec(),
            fragment: state.transcript.fragment().map(|f| f.text.clone()),
            tree: state
                .tree
                .flatten()
                .into_iter()
                .map(|(depth, node)| TreeRow { depth, node: node.clone() })
                .collect(),
            live_suggestions: state.live_suggestions.clone(),
            related_quotes: state.related_quotes.clone(),
            history: state.history.entries().to_vec(),
            total_tokens: stats.total_tokens,
            pending,
        }
    }
}

impl fmt::Display for SessionView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "== session {} | {} | {} ==",
            self.client_id,
            self.connection.as_str(),
            if self.capturing { "recording" } else { "idle" }
        )?;

        writeln!(f, "-- transcript --")?;
        for u in &self.utterances {
            writeln!(f, "[{}] {}: {}", u.timestamp.format("%H:%M:%S"), u.speaker.label(), u.text)?;
        }
        if let Some(fragment) = &self.fragment {
            writeln!(f, "... {}", fragment)?;
        }

        writeln!(f, "-- mind map --")?;
        for row in &self.tree {
            let marker = match row.node.kind {
                NodeKind::Root => "*",
                NodeKind::Committed => "+",
                NodeKind::Candidate => "?",
            };
            let confidence = row
                .node
                .confidence
                .map(|c| format!(" ({:.2})", c))
                .unwrap_or_default();
            writeln!(f, "{}{} {} {}{}", "  ".repeat(row.depth), marker, row.node.id, row.node.content, confidence)?;
        }
        if self.pending > 0 {
            writeln!(f, "({} generating)", self.pending)?;
        }

        if !self.live_suggestions.is_empty() {
            writeln!(f, "-- live suggestions --")?;
            for s in &self.live_suggestions {
                writeln!(f, "- {}", s.content)?;
            }
        }

        for q in &self.related_quotes {
            writeln!(f, "> \"{}\" ({})", q.quote, q.source)?;
        }

        writeln!(f, "-- history ({} entries, ~{} tokens) --", self.history.len(), self.total_tokens)?;
        for entry in &self.history {
            writeln!(f, "[{}] {:<8} {}", entry.timestamp.format("%H:%M:%S"), entry.kind.as_str(), entry.message)?;
        }
        Ok(())
    }
}
