use thiserror::Error;

use crate::tree::NodeId;

/// Every failure the session core can surface.
///
/// All variants are recoverable at the session level. They are `Clone` so a
/// failure observed by a driver task can travel to the controller as an event.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    /// Microphone permission denied or no input device. Shown to the user, never retried.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Live channel closed or unreachable.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx or malformed backend response.
    #[error("backend error{}: {message}", status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Backend { status: Option<u16>, message: String },

    /// Malformed inbound frame.
    #[error("decode error: {0}")]
    Decode(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown node {0}")]
    UnknownNode(NodeId),
}

impl SessionError {
    pub fn backend(message: impl Into<String>) -> Self {
        SessionError::Backend { status: None, message: message.into() }
    }

    /// Short label used when the failure is written to the history log.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::DeviceUnavailable(_) => "device",
            SessionError::Transport(_) => "transport",
            SessionError::Backend { .. } => "backend",
            SessionError::Decode(_) => "decode",
            SessionError::InvalidInput(_) => "input",
            SessionError::UnknownNode(_) => "tree",
        }
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return SessionError::Backend { status: None, message: format!("malformed response: {}", e) };
        }
        match e.status() {
            Some(status) => SessionError::Backend { status: Some(status.as_u16()), message: e.to_string() },
            None => SessionError::Transport(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::Decode(e.to_string())
    }
}
