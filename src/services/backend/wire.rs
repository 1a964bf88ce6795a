use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audio::AudioPayload;
use crate::error::SessionError;
use crate::kernel::event::ServerEvent;
use crate::transcript::{Speaker, TranscriptPayload};
use crate::tree::Suggestion;

// --- Unary requests ---

#[derive(Debug, Serialize)]
pub struct TranscribeRequest {
    pub audio_data: String,
    pub sample_rate: u32,
    pub format: String,
}

impl TranscribeRequest {
    pub fn from_payload(payload: &AudioPayload) -> Self {
        Self {
            audio_data: base64::engine::general_purpose::STANDARD.encode(&payload.bytes),
            sample_rate: payload.sample_rate,
            format: payload.format.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TextRequest<'a> {
    pub text: &'a str,
    pub speaker: Speaker,
}

#[derive(Debug, Serialize)]
pub struct SuggestionRequestBody<'a> {
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_content: Option<&'a str>,
}

// --- Unary responses ---

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub quote: String,
    #[serde(default)]
    pub source: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub author: String,
}

/// The backend returns suggestions either as bare strings or as objects.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SuggestionItem {
    Plain(String),
    Rich {
        content: String,
        #[serde(rename = "type", default)]
        kind: Option<String>,
    },
}

impl From<SuggestionItem> for Suggestion {
    fn from(item: SuggestionItem) -> Self {
        match item {
            SuggestionItem::Plain(content) => Suggestion { content, category: None },
            SuggestionItem::Rich { content, kind, .. } => Suggestion { content, category: kind },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SuggestionResponse {
    #[serde(default)]
    pub suggestions: Vec<SuggestionItem>,
    #[serde(default)]
    pub related_quotes: Vec<Quote>,
    #[serde(default)]
    pub related_news: Vec<Value>,
}

/// A normalized suggestion response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SuggestionBatch {
    pub suggestions: Vec<Suggestion>,
    pub related_quotes: Vec<Quote>,
    pub related_news: Vec<Value>,
}

impl From<SuggestionResponse> for SuggestionBatch {
    fn from(resp: SuggestionResponse) -> Self {
        Self {
            suggestions: resp
                .suggestions
                .into_iter()
                .map(Suggestion::from)
                .filter(|s| !s.content.trim().is_empty())
                .collect(),
            related_quotes: resp.related_quotes,
            related_news: resp.related_news,
        }
    }
}

impl SuggestionBatch {
    pub fn of<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suggestions: items.into_iter().map(Suggestion::plain).collect(),
            ..Default::default()
        }
    }
}

// --- Live channel frames ---

/// Client → server frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Audio { audio_data: String, sample_rate: u32 },
    Text { text: String, speaker: Speaker },
}

impl ClientFrame {
    pub fn audio(payload: &AudioPayload) -> Self {
        ClientFrame::Audio {
            audio_data: base64::engine::general_purpose::STANDARD.encode(&payload.bytes),
            sample_rate: payload.sample_rate,
        }
    }

    pub fn text(text: &str, speaker: Speaker) -> Self {
        ClientFrame::Text { text: text.to_string(), speaker }
    }
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

/// Decodes one server → client text frame.
///
/// `Ok(None)` is a recognised housekeeping frame with nothing to apply.
/// Anything outside the known set is a `Decode` error for the caller to log
/// and drop.
pub fn decode_frame(raw: &str) -> Result<Option<ServerEvent>, SessionError> {
    let frame: RawFrame = serde_json::from_str(raw)?;

    match frame.kind.as_str() {
        "streaming_text" => {
            let text = frame
                .text
                .or_else(|| frame.data.as_ref().and_then(|d| d.as_str().map(str::to_string)))
                .ok_or_else(|| SessionError::Decode("streaming_text without text".to_string()))?;
            Ok(Some(ServerEvent::StreamingText(text)))
        }
        "transcript" => {
            let payload = match frame.data {
                Some(data @ Value::Object(_)) => serde_json::from_value::<TranscriptPayload>(data)?,
                _ => TranscriptPayload::new(
                    frame
                        .text
                        .ok_or_else(|| SessionError::Decode("transcript without text".to_string()))?,
                ),
            };
            Ok(Some(ServerEvent::Transcript(payload)))
        }
        "suggestions" => {
            let data = frame
                .data
                .ok_or_else(|| SessionError::Decode("suggestions without data".to_string()))?;
            let items: Vec<SuggestionItem> = match data {
                Value::Array(_) => serde_json::from_value(data)?,
                Value::Object(mut obj) => match obj.remove("suggestions") {
                    Some(list) => serde_json::from_value(list)?,
                    None => return Err(SessionError::Decode("suggestions object without list".to_string())),
                },
                other => return Err(SessionError::Decode(format!("unexpected suggestions payload: {}", other))),
            };
            Ok(Some(ServerEvent::Suggestions(items.into_iter().map(Suggestion::from).collect())))
        }
        "connected" | "pong" => Ok(None),
        other => Err(SessionError::Decode(format!("unknown frame type '{}'", other))),
    }
}
