use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::backend::{ClientFrame, SuggestionBatch};
use crate::audio::AudioPayload;
use crate::error::SessionError;
use crate::kernel::event::{Event, ServerEvent};
use crate::transcript::{Speaker, TranscriptPayload};

/// The bidirectional channel as seen by senders.
#[async_trait]
pub trait LiveSink: Send + Sync {
    fn is_open(&self) -> bool;

    /// Gives a dropped channel the chance to come back before a send.
    async fn ensure_open(&self) -> bool {
        self.is_open()
    }

    async fn send(&self, frame: ClientFrame) -> Result<(), SessionError>;
}

/// The request/response path.
#[async_trait]
pub trait UnaryBackend: Send + Sync {
    async fn submit_audio(&self, payload: &AudioPayload) -> Result<TranscriptPayload, SessionError>;
    async fn submit_text(&self, text: &str, speaker: Speaker) -> Result<TranscriptPayload, SessionError>;
    async fn suggest(&self, text: &str, parent_content: Option<&str>) -> Result<SuggestionBatch, SessionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Live channel when open (re-dialing a dropped one first), unary when it
    /// stays down or the send fails.
    PreferLive,
    /// Never touch the live channel for outbound payloads.
    UnaryOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Accepted by the live channel; the transcript arrives as a channel event.
    Live,
    /// Delivered over the unary path, which answered synchronously.
    Unary(TranscriptPayload),
}

/// One "send this, reliably" capability over both paths.
///
/// A payload handed to this sender is lost only if the unary path fails
/// too; a closed live channel alone never drops it.
#[derive(Clone)]
pub struct ReliableSender {
    live: Arc<dyn LiveSink>,
    unary: Arc<dyn UnaryBackend>,
    policy: FallbackPolicy,
}

impl ReliableSender {
    pub fn new(live: Arc<dyn LiveSink>, unary: Arc<dyn UnaryBackend>, policy: FallbackPolicy) -> Self {
        Self { live, unary, policy }
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    pub fn unary(&self) -> Arc<dyn UnaryBackend> {
        self.unary.clone()
    }

    pub async fn send_audio(&self, payload: &AudioPayload) -> Result<Delivery, SessionError> {
        if self.try_live(ClientFrame::audio(payload)).await {
            return Ok(Delivery::Live);
        }
        let transcript = self.unary.submit_audio(payload).await?;
        Ok(Delivery::Unary(transcript))
    }

    pub async fn send_text(&self, text: &str, speaker: Speaker) -> Result<Delivery, SessionError> {
        if self.try_live(ClientFrame::text(text, speaker)).await {
            return Ok(Delivery::Live);
        }
        let transcript = self.unary.submit_text(text, speaker).await?;
        Ok(Delivery::Unary(transcript))
    }

    /// Delivers a finished recording and returns what the controller should
    /// hear about it: nothing for a live send, since the transcript comes
    /// back as a channel event.
    pub async fn submit_recording(&self, payload: &AudioPayload) -> Option<Event> {
        match self.send_audio(payload).await {
            Ok(Delivery::Live) => None,
            Ok(Delivery::Unary(transcript)) => Some(Event::Server(ServerEvent::Transcript(transcript))),
            Err(e) => Some(Event::Failure(e)),
        }
    }

    async fn try_live(&self, frame: ClientFrame) -> bool {
        if self.policy == FallbackPolicy::UnaryOnly {
            return false;
        }
        if !self.live.ensure_open().await {
            debug!("Live channel unavailable, using unary path");
            return false;
        }
        match self.live.send(frame).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Live send failed ({}), falling back to unary path", e);
                false
            }
        }
    }
}
