use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::services::backend::SuggestionBatch;
use crate::transcript::{Speaker, TranscriptPayload};
use crate::tree::{NodeId, Suggestion};

/// Everything the controller reacts to. Each event runs to completion
/// before the next one is taken off the queue.
#[derive(Debug, Clone)]
pub enum Event {
    /// Decoded live-channel traffic, or a unary transcription result.
    Server(ServerEvent),
    /// Something the user did.
    Input(InputEvent),
    /// A suggestion request finished. `epoch` is the tree epoch it was issued under.
    SuggestionsResolved {
        node_id: NodeId,
        epoch: u64,
        outcome: Result<SuggestionBatch, SessionError>,
    },
    Capture(CaptureSignal),
    Connection(ConnectionStatus),
    /// A driver-side failure to surface in history.
    Failure(SessionError),
}

/// The closed set of inbound server messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    StreamingText(String),
    Transcript(TranscriptPayload),
    Suggestions(Vec<Suggestion>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Typed dialogue, attributed to either side.
    Say { text: String, speaker: Speaker },
    /// Click on a mind-map node.
    Activate(NodeId),
    /// A branch the user writes under an existing node.
    Branch { parent: NodeId, content: String },
    /// Restart the mind map from the other side's latest utterance.
    SeedFromTranscript,
    ResetTree(String),
    ClearHistory,
    ClearTranscript,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSignal {
    Started,
    /// `submitted` is the payload size handed to delivery, `None` if the
    /// recording was too short and was discarded.
    Stopped { submitted: Option<usize> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Open,
    Closed,
}

// Helpers for drivers and tests
impl InputEvent {
    pub fn say(text: &str, speaker: Speaker) -> Self {
        InputEvent::Say { text: text.to_string(), speaker }
    }
}

impl Event {
    pub fn activate(id: NodeId) -> Self {
        Event::Input(InputEvent::Activate(id))
    }

    pub fn resolved(node_id: NodeId, epoch: u64, outcome: Result<SuggestionBatch, SessionError>) -> Self {
        Event::SuggestionsResolved { node_id, epoch, outcome }
    }
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Open => "open",
            ConnectionStatus::Closed => "closed",
        }
    }
}
