use chrono::Utc;
use tracing::debug;

use super::utterance::{parse_timestamp, Speaker, StreamingFragment, TranscriptPayload, Utterance};
use crate::error::SessionError;

/// Confidence assigned to text the user typed in directly.
pub const MANUAL_CONFIDENCE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// A streaming fragment is visible and not yet settled.
    Pending,
    /// No live fragment; the last turn (if any) produced its utterance.
    Settled,
}

/// Merges streaming and final transcription events into one ordered log.
///
/// The log is append-only and ordered by arrival. At most one fragment is
/// live at a time and it never enters the log itself; a `settle` call
/// produces the utterance and clears it.
#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    utterances: Vec<Utterance>,
    fragment: Option<StreamingFragment>,
    next_id: u64,
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TurnState {
        if self.fragment.is_some() {
            TurnState::Pending
        } else {
            TurnState::Settled
        }
    }

    /// Last write wins. The utterance log is untouched.
    pub fn apply_streaming(&mut self, text: &str) {
        self.fragment = Some(StreamingFragment {
            text: text.to_string(),
            updated_at: Utc::now(),
        });
    }

    /// Settles the current turn into exactly one utterance and clears the
    /// fragment, whether or not any streaming text was seen.
    pub fn settle(&mut self, payload: TranscriptPayload) -> &Utterance {
        self.fragment = None;

        let speaker = payload
            .speaker
            .as_deref()
            .and_then(Speaker::parse)
            .unwrap_or(Speaker::User);
        let confidence = payload
            .confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(1.0);
        let timestamp = payload
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);

        self.push(payload.text, speaker, confidence, timestamp)
    }

    /// Typed text skips the pending state entirely.
    pub fn submit_manual(&mut self, text: &str, speaker: Speaker) -> Result<&Utterance, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::InvalidInput("empty utterance".to_string()));
        }
        Ok(self.push(text.to_string(), speaker, MANUAL_CONFIDENCE, Utc::now()))
    }

    fn push(&mut self, text: String, speaker: Speaker, confidence: f32, timestamp: chrono::DateTime<Utc>) -> &Utterance {
        self.next_id += 1;
        debug!("Utterance #{} settled ({}, {} chars)", self.next_id, speaker.as_str(), text.chars().count());
        self.utterances.push(Utterance {
            id: self.next_id,
            text,
            speaker,
            confidence,
            timestamp,
        });
        // Just pushed, so the log is non-empty.
        &self.utterances[self.utterances.len() - 1]
    }

    pub fn utterances(&self) -> &[Utterance] {
        &self.utterances
    }

    pub fn fragment(&self) -> Option<&StreamingFragment> {
        self.fragment.as_ref()
    }

    pub fn last_from(&self, speaker: Speaker) -> Option<&Utterance> {
        self.utterances.iter().rev().find(|u| u.speaker == speaker)
    }

    /// The last `n` utterances as speaker-labelled lines, oldest first.
    pub fn recent_text(&self, n: usize) -> String {
        let start = self.utterances.len().saturating_sub(n);
        self.utterances[start..]
            .iter()
            .map(|u| format!("{}: {}", u.speaker.label(), u.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn char_count(&self) -> usize {
        self.utterances.iter().map(|u| u.text.chars().count()).sum()
    }

    /// Drops the log and any live fragment. Ids keep increasing.
    pub fn clear(&mut self) {
        self.utterances.clear();
        self.fragment = None;
    }
}
