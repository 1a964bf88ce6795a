use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::wire::{SuggestionBatch, SuggestionRequestBody, SuggestionResponse, TextRequest, TranscribeRequest};
use crate::audio::AudioPayload;
use crate::error::SessionError;
use crate::services::delivery::UnaryBackend;
use crate::transcript::{Speaker, TranscriptPayload};

/// The unary HTTP path to the backend.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, SessionError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SessionError::Backend {
                status: Some(status.as_u16()),
                message: if detail.is_empty() { status.to_string() } else { detail },
            });
        }

        Ok(response.json::<R>().await?)
    }

    /// `POST /api/transcribe`
    pub async fn transcribe(&self, payload: &AudioPayload) -> Result<TranscriptPayload, SessionError> {
        let body = TranscribeRequest::from_payload(payload);
        self.post("/api/transcribe", &body).await
    }

    /// `POST /api/text`
    pub async fn submit_text(&self, text: &str, speaker: Speaker) -> Result<TranscriptPayload, SessionError> {
        self.post("/api/text", &TextRequest { text, speaker }).await
    }

    /// `POST /api/suggestion`
    pub async fn suggest(&self, text: &str, parent_content: Option<&str>) -> Result<SuggestionBatch, SessionError> {
        let body = SuggestionRequestBody { text, parent_content };
        let resp: SuggestionResponse = self.post("/api/suggestion", &body).await?;
        Ok(resp.into())
    }
}

#[async_trait]
impl UnaryBackend for BackendClient {
    async fn submit_audio(&self, payload: &AudioPayload) -> Result<TranscriptPayload, SessionError> {
        self.transcribe(payload).await
    }

    async fn submit_text(&self, text: &str, speaker: Speaker) -> Result<TranscriptPayload, SessionError> {
        BackendClient::submit_text(self, text, speaker).await
    }

    async fn suggest(&self, text: &str, parent_content: Option<&str>) -> Result<SuggestionBatch, SessionError> {
        BackendClient::suggest(self, text, parent_content).await
    }
}
