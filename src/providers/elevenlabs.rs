//! ElevenLabs streaming text-to-speech client.
//!
//! The reply is requested with a fixed voice, model, latency setting and
//! output format, and handed back as the raw chunk stream from the response
//! body. The caller decides whether to buffer it or write it straight out.

use super::{status_error, AudioStream, ProviderError, SpeechSynthesizer};
use crate::config::TtsConfig;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const PROVIDER: &str = "elevenlabs";

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

pub struct ElevenLabsSynthesizer {
    client: Client,
    base_url: String,
    api_key: String,
    voice_id: String,
    model_id: String,
    optimize_streaming_latency: u8,
    output_format: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(config: &TtsConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|source| ProviderError::Transport { provider: PROVIDER, source })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            voice_id: config.voice_id.clone(),
            model_id: config.model_id.clone(),
            optimize_streaming_latency: config.optimize_streaming_latency,
            output_format: config.output_format.clone(),
        })
    }

    fn stream_url(&self) -> String {
        format!("{}/text-to-speech/{}/stream", self.base_url, self.voice_id)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioStream, ProviderError> {
        let latency = self.optimize_streaming_latency.to_string();
        let response = self
            .client
            .post(self.stream_url())
            .header("xi-api-key", &self.api_key)
            .query(&[
                ("optimize_streaming_latency", latency.as_str()),
                ("output_format", self.output_format.as_str()),
            ])
            .json(&SynthesisRequest {
                text,
                model_id: &self.model_id,
            })
            .send()
            .await
            .map_err(|source| ProviderError::Transport { provider: PROVIDER, source })?;

        if !response.status().is_success() {
            return Err(status_error(PROVIDER, response).await);
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|source| ProviderError::Transport { provider: PROVIDER, source }))
            .boxed())
    }

    fn voice(&self) -> &str {
        &self.voice_id
    }
}
