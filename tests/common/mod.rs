#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chatbuff::audio::{AudioFormat, AudioPayload, AudioSource};
use chatbuff::config::CaptureConfig;
use chatbuff::error::SessionError;
use chatbuff::services::backend::{ClientFrame, SuggestionBatch};
use chatbuff::services::delivery::{LiveSink, UnaryBackend};
use chatbuff::transcript::{Speaker, TranscriptPayload};

/// Shared view of what a `FakeSource` did, kept after the source is moved
/// into a capture session.
#[derive(Clone, Default)]
pub struct SourceTap {
    pub open: Arc<AtomicBool>,
    pub closes: Arc<AtomicUsize>,
    pending: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl SourceTap {
    /// Queues bytes for the next `drain` call.
    pub fn feed(&self, bytes: Vec<u8>) {
        self.pending.lock().unwrap().push_back(bytes);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

pub struct FakeSource {
    pub rate: Result<u32, SessionError>,
    pub tap: SourceTap,
}

impl FakeSource {
    pub fn new(rate: u32) -> (Self, SourceTap) {
        let tap = SourceTap::default();
        (Self { rate: Ok(rate), tap: tap.clone() }, tap)
    }

    pub fn denied() -> (Self, SourceTap) {
        let tap = SourceTap::default();
        let rate = Err(SessionError::DeviceUnavailable("permission denied".into()));
        (Self { rate, tap: tap.clone() }, tap)
    }
}

impl AudioSource for FakeSource {
    fn open(&mut self) -> Result<u32, SessionError> {
        let rate = self.rate.clone()?;
        self.tap.open.store(true, Ordering::SeqCst);
        Ok(rate)
    }

    fn drain(&mut self, out: &mut Vec<u8>) {
        if let Some(bytes) = self.tap.pending.lock().unwrap().pop_front() {
            out.extend_from_slice(&bytes);
        }
    }

    fn close(&mut self) {
        self.tap.open.store(false, Ordering::SeqCst);
        self.tap.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// 250 Hz mono makes one 1000 ms chunk exactly 500 bytes.
pub const FAKE_RATE: u32 = 250;

pub fn capture_config(format: AudioFormat) -> CaptureConfig {
    CaptureConfig {
        chunk_ms: 1000,
        min_payload_bytes: 1000,
        max_buffered_ms: 120_000,
        format,
    }
}

#[derive(Default)]
pub struct FakeLive {
    pub open: AtomicBool,
    pub fail: AtomicBool,
    /// Whether a re-dial of a dropped channel succeeds.
    pub redial: AtomicBool,
    pub redials: AtomicUsize,
    pub sent: Mutex<Vec<ClientFrame>>,
}

impl FakeLive {
    pub fn open() -> Arc<Self> {
        let live = Self::default();
        live.open.store(true, Ordering::SeqCst);
        Arc::new(live)
    }

    pub fn closed() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let live = Self::default();
        live.open.store(true, Ordering::SeqCst);
        live.fail.store(true, Ordering::SeqCst);
        Arc::new(live)
    }

    /// Dropped, but comes back when re-dialed.
    pub fn dropped() -> Arc<Self> {
        let live = Self::default();
        live.redial.store(true, Ordering::SeqCst);
        Arc::new(live)
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl LiveSink for FakeLive {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn ensure_open(&self) -> bool {
        if !self.is_open() {
            self.redials.fetch_add(1, Ordering::SeqCst);
            if self.redial.load(Ordering::SeqCst) {
                self.open.store(true, Ordering::SeqCst);
            }
        }
        self.is_open()
    }

    async fn send(&self, frame: ClientFrame) -> Result<(), SessionError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SessionError::Transport("socket reset".into()));
        }
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeUnary {
    pub audio: Mutex<Vec<AudioPayload>>,
    pub texts: Mutex<Vec<(String, Speaker)>>,
    pub suggest_calls: Mutex<Vec<(String, Option<String>)>>,
    pub suggestions: Mutex<Option<Result<SuggestionBatch, SessionError>>>,
    pub fail: AtomicBool,
}

impl FakeUnary {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answering(batch: SuggestionBatch) -> Arc<Self> {
        let fake = Self::default();
        *fake.suggestions.lock().unwrap() = Some(Ok(batch));
        Arc::new(fake)
    }

    pub fn failing() -> Arc<Self> {
        let fake = Self::default();
        fake.fail.store(true, Ordering::SeqCst);
        Arc::new(fake)
    }

    pub fn audio_calls(&self) -> usize {
        self.audio.lock().unwrap().len()
    }

    fn check(&self) -> Result<(), SessionError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SessionError::Backend { status: Some(500), message: "boom".into() });
        }
        Ok(())
    }
}

#[async_trait]
impl UnaryBackend for FakeUnary {
    async fn submit_audio(&self, payload: &AudioPayload) -> Result<TranscriptPayload, SessionError> {
        self.check()?;
        self.audio.lock().unwrap().push(payload.clone());
        Ok(TranscriptPayload::new("heard you"))
    }

    async fn submit_text(&self, text: &str, speaker: Speaker) -> Result<TranscriptPayload, SessionError> {
        self.check()?;
        self.texts.lock().unwrap().push((text.to_string(), speaker));
        Ok(TranscriptPayload::new(text).with_speaker(speaker))
    }

    async fn suggest(&self, text: &str, parent_content: Option<&str>) -> Result<SuggestionBatch, SessionError> {
        self.check()?;
        self.suggest_calls
            .lock()
            .unwrap()
            .push((text.to_string(), parent_content.map(str::to_string)));
        self.suggestions
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(SuggestionBatch::default()))
    }
}
