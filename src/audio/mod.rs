pub mod capture;
pub mod session;

pub use capture::MicrophoneSource;
pub use session::*;

use crate::error::SessionError;

/// Container for a finalized capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// Raw 16-bit little-endian mono PCM.
    Pcm16,
    /// The same samples inside a RIFF/WAV header.
    Wav,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Pcm16 => "pcm16",
            AudioFormat::Wav => "wav",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pcm16" | "pcm" | "raw" => Some(AudioFormat::Pcm16),
            "wav" => Some(AudioFormat::Wav),
            _ => None,
        }
    }
}

/// One finalized recording, ready for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPayload {
    pub bytes: Vec<u8>,
    pub sample_rate: u32,
    pub format: AudioFormat,
}

/// The hardware seam. A source owns the exclusive device handle between
/// `open` and `close`.
pub trait AudioSource {
    /// Acquires the device and returns the mono sample rate it delivers.
    fn open(&mut self) -> Result<u32, SessionError>;

    /// Moves every sample captured since the last call into `out` as
    /// 16-bit little-endian PCM.
    fn drain(&mut self, out: &mut Vec<u8>);

    /// Releases the device. Must be safe to call when not open.
    fn close(&mut self);
}
