//! Synthesis engine abstraction and the HTTP-backed implementation.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{TtsError, TtsResult};

/// A text-to-speech backend. Implementations return complete encoded audio
/// (WAV) for one utterance; the scheduler handles ordering and playback.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Synthesizes `text` with the given voice and returns encoded audio.
    async fn synthesize(&self, text: &str, voice_id: &str) -> TtsResult<Vec<u8>>;
}

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    #[serde(rename = "voiceId")]
    voice_id: &'a str,
}

/// Synthesizer backed by a remote HTTP service that accepts a JSON body
/// and responds with WAV bytes.
pub struct HttpSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpSynthesizer {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    fn name(&self) -> &str {
        "http"
    }

    async fn synthesize(&self, text: &str, voice_id: &str) -> TtsResult<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(TtsError::InvalidInput("empty text".to_string()));
        }

        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&SynthesisRequest { text, voice_id });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TtsError::SynthesisError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(TtsError::ServiceError {
                status: status.as_u16(),
                detail,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TtsError::SynthesisError(e.to_string()))?;
        if bytes.is_empty() {
            return Err(TtsError::SynthesisError(
                "service returned empty audio".to_string(),
            ));
        }
        Ok(bytes.to_vec())
    }
}
