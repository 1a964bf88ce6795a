use std::collections::VecDeque;
use std::io::Cursor;
use tracing::{debug, info, warn};

use super::{AudioFormat, AudioPayload, AudioSource};
use crate::config::CaptureConfig;
use crate::error::SessionError;

const BYTES_PER_SAMPLE: usize = 2;

/// How often a recording session should be polled. Independent of
/// `chunk_ms`: the device ring only holds a few seconds.
pub const POLL_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
}

/// Owns the microphone for the duration of one recording and turns the
/// raw sample stream into fixed-duration chunks.
pub struct CaptureSession<S: AudioSource> {
    source: S,
    config: CaptureConfig,
    state: CaptureState,
    sample_rate: u32,
    chunk_bytes: usize,
    max_chunks: usize,
    chunks: VecDeque<Vec<u8>>,
    current: Vec<u8>,
}

impl<S: AudioSource> CaptureSession<S> {
    pub fn new(source: S, config: CaptureConfig) -> Self {
        Self {
            source,
            config,
            state: CaptureState::Idle,
            sample_rate: 0,
            chunk_bytes: 0,
            max_chunks: 0,
            chunks: VecDeque::new(),
            current: Vec::new(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == CaptureState::Recording
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Closed chunks held so far (the partial tail is not counted).
    pub fn buffered_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Acquires the device. A denied or missing device is reported as
    /// `DeviceUnavailable` and nothing is retried.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.is_recording() {
            return Err(SessionError::InvalidInput("capture already running".to_string()));
        }

        let rate = match self.source.open() {
            Ok(rate) if rate > 0 => rate,
            Ok(_) => {
                self.source.close();
                return Err(SessionError::DeviceUnavailable("device reported a zero sample rate".to_string()));
            }
            Err(e) => {
                self.source.close();
                return Err(e);
            }
        };

        let samples_per_chunk = (rate as u64 * self.config.chunk_ms / 1000).max(1) as usize;
        self.sample_rate = rate;
        self.chunk_bytes = samples_per_chunk * BYTES_PER_SAMPLE;
        self.max_chunks = (self.config.max_buffered_ms / self.config.chunk_ms.max(1)).max(1) as usize;
        self.chunks.clear();
        self.current.clear();
        self.state = CaptureState::Recording;

        info!("Capture started: {}Hz, {} byte chunks", rate, self.chunk_bytes);
        Ok(())
    }

    /// Pulls whatever the device produced and closes any full chunks.
    /// Returns the number of chunks closed by this call.
    pub fn poll(&mut self) -> usize {
        if !self.is_recording() {
            return 0;
        }
        self.source.drain(&mut self.current);

        let mut closed = 0;
        while self.current.len() >= self.chunk_bytes {
            let rest = self.current.split_off(self.chunk_bytes);
            let chunk = std::mem::replace(&mut self.current, rest);
            self.chunks.push_back(chunk);
            closed += 1;

            if self.chunks.len() > self.max_chunks {
                self.chunks.pop_front();
                warn!("Capture buffer full, dropped oldest chunk");
            }
        }
        if closed > 0 {
            debug!("Capture: {} chunk(s) closed, {} buffered", closed, self.chunks.len());
        }
        closed
    }

    /// Flushes outstanding audio, finalizes one payload and releases the
    /// device. The device is released on every path, including a failed
    /// finalization. Returns `Ok(None)` for captures too short to submit.
    pub fn stop(&mut self) -> Result<Option<AudioPayload>, SessionError> {
        if !self.is_recording() {
            return Ok(None);
        }

        self.source.drain(&mut self.current);
        self.source.close();
        self.state = CaptureState::Idle;

        let mut raw = Vec::with_capacity(self.chunks.iter().map(Vec::len).sum::<usize>() + self.current.len());
        for chunk in self.chunks.drain(..) {
            raw.extend_from_slice(&chunk);
        }
        raw.append(&mut self.current);

        if raw.len() < self.config.min_payload_bytes {
            info!("Capture discarded: {} bytes below {} byte minimum", raw.len(), self.config.min_payload_bytes);
            return Ok(None);
        }

        let bytes = match self.config.format {
            AudioFormat::Pcm16 => raw,
            AudioFormat::Wav => encode_wav(&raw, self.sample_rate)?,
        };
        info!("Capture finalized: {} bytes ({})", bytes.len(), self.config.format.as_str());

        Ok(Some(AudioPayload {
            bytes,
            sample_rate: self.sample_rate,
            format: self.config.format,
        }))
    }
}

impl<S: AudioSource> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        if self.is_recording() {
            self.source.close();
        }
    }
}

/// Wraps little-endian 16-bit mono PCM in a WAV container.
pub fn encode_wav(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>, SessionError> {
    if pcm.len() % BYTES_PER_SAMPLE != 0 {
        return Err(SessionError::InvalidInput(format!("odd PCM length {}", pcm.len())));
    }
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let wav_err = |e: hound::Error| SessionError::InvalidInput(format!("wav encoding failed: {}", e));
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(wav_err)?;
        for pair in pcm.chunks_exact(BYTES_PER_SAMPLE) {
            writer.write_sample(i16::from_le_bytes([pair[0], pair[1]])).map_err(wav_err)?;
        }
        writer.finalize().map_err(wav_err)?;
    }
    Ok(cursor.into_inner())
}
