use std::time::Duration;
use tracing::warn;

use crate::audio::AudioFormat;
use crate::services::delivery::FallbackPolicy;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8000";

/// Runtime knobs for one session. Everything has a sane default so the
/// console driver works against a local backend with no environment set.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub backend_url: String,
    pub ws_url: String,
    pub capture: CaptureConfig,
    pub request_timeout: Duration,
    pub fallback: FallbackPolicy,
    /// Capacity of the controller's event queue.
    pub event_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Duration of one buffered chunk.
    pub chunk_ms: u64,
    /// Payloads below this size are treated as silence and never submitted.
    pub min_payload_bytes: usize,
    /// Upper bound on buffered audio before the oldest chunk is dropped.
    pub max_buffered_ms: u64,
    pub format: AudioFormat,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            chunk_ms: 1000,
            min_payload_bytes: 1000,
            max_buffered_ms: 120_000,
            format: AudioFormat::Pcm16,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            capture: CaptureConfig::default(),
            request_timeout: Duration::from_secs(30),
            fallback: FallbackPolicy::PreferLive,
            event_capacity: 100,
        }
    }
}

impl SessionConfig {
    /// Reads `CHATBUFF_*` overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` but with an injectable lookup, so tests never touch
    /// the real environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("CHATBUFF_BACKEND_URL") {
            config.backend_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = lookup("CHATBUFF_WS_URL") {
            config.ws_url = url.trim_end_matches('/').to_string();
        }
        if let Some(ms) = parse_or_warn::<u64>(&lookup, "CHATBUFF_CHUNK_MS") {
            if ms > 0 {
                config.capture.chunk_ms = ms;
            } else {
                warn!("CHATBUFF_CHUNK_MS must be positive, keeping {}", config.capture.chunk_ms);
            }
        }
        if let Some(bytes) = parse_or_warn::<usize>(&lookup, "CHATBUFF_MIN_PAYLOAD_BYTES") {
            config.capture.min_payload_bytes = bytes;
        }
        if let Some(ms) = parse_or_warn::<u64>(&lookup, "CHATBUFF_REQUEST_TIMEOUT_MS") {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup("CHATBUFF_AUDIO_FORMAT") {
            match AudioFormat::parse(&raw) {
                Some(format) => config.capture.format = format,
                None => warn!("Unknown CHATBUFF_AUDIO_FORMAT '{}', keeping {}", raw, config.capture.format.as_str()),
            }
        }
        if let Some(raw) = lookup("CHATBUFF_FALLBACK") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "live" | "prefer_live" => config.fallback = FallbackPolicy::PreferLive,
                "unary" | "unary_only" => config.fallback = FallbackPolicy::UnaryOnly,
                other => warn!("Unknown CHATBUFF_FALLBACK '{}', keeping {:?}", other, config.fallback),
            }
        }

        config
    }
}

fn parse_or_warn<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring invalid {}='{}'", key, raw);
            None
        }
    }
}
