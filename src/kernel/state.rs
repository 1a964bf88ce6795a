use tracing::warn;
use uuid::Uuid;

use super::event::ConnectionStatus;
use crate::history::{HistoryLog, NewEntry};
use crate::services::backend::Quote;
use crate::transcript::{Speaker, TranscriptAggregator, TranscriptPayload};
use crate::tree::{IdeaTree, NodeId, Suggestion};

pub const DEFAULT_ROOT: &str = "Listening to the conversation...";

/// Strict state delta. This is the ONLY way session state mutates.
#[derive(Debug, Clone)]
pub enum StateDelta {
    Streaming(String),
    TranscriptSettled(TranscriptPayload),
    ManualUtterance { text: String, speaker: Speaker },
    TranscriptCleared,
    NodeCommitted(NodeId),
    CandidatesAdded { parent: NodeId, suggestions: Vec<Suggestion> },
    ManualBranch { parent: NodeId, content: String },
    TreeReset(String),
    RelatedQuotes(Vec<Quote>),
    LiveSuggestions(Vec<Suggestion>),
    History(NewEntry),
    HistoryCleared,
    Connection(ConnectionStatus),
    Capturing(bool),
}

/// Everything one session knows. Owned by the controller; presentation
/// only ever sees it through `SessionView`.
#[derive(Debug)]
pub struct SessionState {
    client_id: Uuid,
    pub transcript: TranscriptAggregator,
    pub tree: IdeaTree,
    pub history: HistoryLog,
    /// Quotes that came with the most recent generation.
    pub related_quotes: Vec<Quote>,
    /// Latest suggestion list pushed by the server, outside the tree.
    pub live_suggestions: Vec<Suggestion>,
    pub connection: ConnectionStatus,
    pub capturing: bool,
    // Monotonic; bumped by every reduction.
    pub version: u64,
}

impl SessionState {
    pub fn new(client_id: Uuid) -> Self {
        Self {
            client_id,
            transcript: TranscriptAggregator::new(),
            tree: IdeaTree::new(DEFAULT_ROOT),
            history: HistoryLog::new(),
            related_quotes: Vec::new(),
            live_suggestions: Vec::new(),
            connection: ConnectionStatus::Disconnected,
            capturing: false,
            version: 0,
        }
    }

    /// Fixed for the lifetime of the session.
    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    /// Pure reduction: State + Delta -> Mutated State
    pub fn reduce(&mut self, delta: StateDelta) {
        self.version += 1;

        match delta {
            StateDelta::Streaming(text) => self.transcript.apply_streaming(&text),
            StateDelta::TranscriptSettled(payload) => {
                self.transcript.settle(payload);
            }
            StateDelta::ManualUtterance { text, speaker } => {
                if let Err(e) = self.transcript.submit_manual(&text, speaker) {
                    warn!("Manual utterance rejected: {}", e);
                }
            }
            StateDelta::TranscriptCleared => self.transcript.clear(),
            StateDelta::NodeCommitted(id) => {
                if let Err(e) = self.tree.commit(id) {
                    warn!("Commit of {} rejected: {}", id, e);
                }
            }
            StateDelta::CandidatesAdded { parent, suggestions } => {
                if let Err(e) = self.tree.add_candidates(parent, &suggestions) {
                    warn!("Candidates for {} rejected: {}", parent, e);
                }
            }
            StateDelta::ManualBranch { parent, content } => {
                if let Err(e) = self.tree.add_manual(parent, &content) {
                    warn!("Manual branch under {} rejected: {}", parent, e);
                }
            }
            StateDelta::TreeReset(root) => {
                self.tree.reset(&root);
                self.related_quotes.clear();
            }
            StateDelta::RelatedQuotes(quotes) => self.related_quotes = quotes,
            StateDelta::LiveSuggestions(list) => self.live_suggestions = list,
            StateDelta::History(entry) => {
                self.history.append(entry);
            }
            StateDelta::HistoryCleared => self.history.clear(),
            StateDelta::Connection(status) => self.connection = status,
            StateDelta::Capturing(active) => self.capturing = active,
        }
    }
}
