//! HTTP synthesis backend.
//!
//! Speaks the service's wire format: a JSON body
//! `{"text": ..., "audio_paths": [...]}` posted to a single URL, answered by
//! HTTP 200 with the raw audio as the response body.

use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::StatusCode;
use serde::Serialize;

use super::{SynthesisBackend, VoiceReference};
use crate::config::BackendConfig;
use crate::error::SynthesisError;

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    audio_paths: Vec<String>,
}

/// [`SynthesisBackend`] over `reqwest`.
///
/// The client is cheap to clone and pools connections internally, so a
/// single instance serves every worker.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpBackend {
    /// Build a backend for `config.url` with `config.timeout()` applied to
    /// every request.
    pub fn new(config: &BackendConfig) -> Result<Self, SynthesisError> {
        let timeout = config.timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SynthesisError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            timeout,
        })
    }

    /// Endpoint this backend posts to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn classify(&self, err: reqwest::Error) -> SynthesisError {
        if err.is_timeout() {
            SynthesisError::Timeout(self.timeout)
        } else {
            SynthesisError::from(err)
        }
    }
}

#[async_trait::async_trait]
impl SynthesisBackend for HttpBackend {
    async fn synthesize(&self, text: &str, voice: &VoiceReference) -> Result<Bytes, SynthesisError> {
        let body = SynthesisRequest {
            text,
            audio_paths: vec![voice.path().to_string_lossy().into_owned()],
        };

        let started = Instant::now();
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::debug!(
                status = status.as_u16(),
                voice = voice.name(),
                "Synthesis backend rejected request"
            );
            return Err(SynthesisError::Status {
                status: status.as_u16(),
            });
        }

        let audio = response.bytes().await.map_err(|e| self.classify(e))?;

        tracing::trace!(
            bytes = audio.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Synthesis backend responded"
        );
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_wire_format() {
        let body = SynthesisRequest {
            text: "你好",
            audio_paths: vec!["./wavs/nahida.wav".to_string()],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"text": "你好", "audio_paths": ["./wavs/nahida.wav"]})
        );
    }

    #[test]
    fn backend_keeps_configured_url() {
        let backend = HttpBackend::new(&BackendConfig::default()).unwrap();
        assert_eq!(backend.url(), crate::config::DEFAULT_BACKEND_URL);
    }
}
