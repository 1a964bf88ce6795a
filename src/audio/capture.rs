use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapRb};
use tracing::{error, info, warn};

use super::AudioSource;
use crate::error::SessionError;

// Rates the transcription backend handles natively, best first.
const TARGET_RATES: [u32; 4] = [16000, 48000, 32000, 8000];

/// ~4s of 48kHz mono between drains before samples are dropped. Drains run
/// every `POLL_INTERVAL_MS`, whatever the chunk length.
pub const RING_CAPACITY: usize = 48000 * 4;

/// The default input device, read through cpal into a lock-free ring.
///
/// The cpal callback only pushes into the ring; `drain` runs on the
/// session's thread and converts to little-endian bytes.
pub struct MicrophoneSource {
    stream: Option<cpal::Stream>,
    consumer: Option<HeapCons<i16>>,
}

impl MicrophoneSource {
    pub fn new() -> Self {
        Self { stream: None, consumer: None }
    }
}

impl Default for MicrophoneSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MicrophoneSource {
    fn open(&mut self) -> Result<u32, SessionError> {
        if self.stream.is_some() {
            return Err(SessionError::DeviceUnavailable("microphone already open".to_string()));
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| SessionError::DeviceUnavailable("no input device available".to_string()))?;

        info!("Audio Input Device: {}", device.name().unwrap_or_default());

        let unavailable = |e: &dyn std::fmt::Display| SessionError::DeviceUnavailable(e.to_string());

        let mut selected = None;
        for &rate in &TARGET_RATES {
            let configs = device.supported_input_configs().map_err(|e| unavailable(&e))?;
            for range in configs {
                if range.min_sample_rate().0 <= rate && range.max_sample_rate().0 >= rate {
                    selected = Some(range.with_sample_rate(cpal::SampleRate(rate)));
                    break;
                }
            }
            if selected.is_some() {
                break;
            }
        }
        let config = match selected {
            Some(c) => c,
            None => device.default_input_config().map_err(|e| unavailable(&e))?,
        };

        let sample_rate = config.sample_rate().0;
        let channels = config.channels().max(1) as usize;
        info!("Audio Config Selected: Rate={}Hz, Channels={}", sample_rate, channels);

        let (mut producer, consumer) = HeapRb::<i16>::new(RING_CAPACITY).split();
        let err_fn = |err| error!("an error occurred on stream: {}", err);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &config.into(),
                move |data: &[f32], _: &_| {
                    for frame in data.chunks(channels) {
                        let sample = (frame[0].clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                        // Full ring: drop rather than block the audio thread.
                        let _ = producer.try_push(sample);
                    }
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::I16 => device.build_input_stream(
                &config.into(),
                move |data: &[i16], _: &_| {
                    for frame in data.chunks(channels) {
                        let _ = producer.try_push(frame[0]);
                    }
                },
                err_fn,
                None,
            ),
            other => {
                return Err(SessionError::DeviceUnavailable(format!("unsupported sample format {:?}", other)));
            }
        }
        .map_err(|e| unavailable(&e))?;

        stream.play().map_err(|e| unavailable(&e))?;

        self.stream = Some(stream);
        self.consumer = Some(consumer);
        Ok(sample_rate)
    }

    fn drain(&mut self, out: &mut Vec<u8>) {
        if let Some(consumer) = self.consumer.as_mut() {
            for sample in consumer.pop_iter() {
                out.extend_from_slice(&sample.to_le_bytes());
            }
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("Failed to pause input stream: {}", e);
            }
            drop(stream);
            info!("Microphone released");
        }
        self.consumer = None;
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.close();
    }
}
