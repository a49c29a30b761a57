//! # External Providers
//!
//! The interview needs two remote services: a text-generation model that
//! writes the interviewer's reply, and a speech-synthesis service that voices
//! it. Both sit behind traits so the turn processor can be driven by fakes
//! in tests and by real HTTP clients in the server.
//!
//! ## Implementations:
//! - **openai**: chat completions endpoint (`OpenAiGenerator`)
//! - **elevenlabs**: streaming text-to-speech endpoint (`ElevenLabsSynthesizer`)

pub mod elevenlabs;
pub mod openai;

pub use elevenlabs::ElevenLabsSynthesizer;
pub use openai::OpenAiGenerator;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

/// Failure talking to a provider. None of these are retried.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection, TLS, timeout or body-read failure
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Provider answered with a non-success status (quota, auth, bad request...)
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    /// Provider answered 2xx but the payload was not what we expected
    #[error("{provider} returned a malformed response: {message}")]
    Malformed {
        provider: &'static str,
        message: String,
    },
}

/// Finite, consume-once sequence of encoded audio chunks.
pub type AudioStream = BoxStream<'static, Result<Bytes, ProviderError>>;

/// Produces a single completion for a flattened prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Model identifier, for logs and health output.
    fn model(&self) -> &str;
}

/// Turns reply text into encoded audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioStream, ProviderError>;

    /// Voice identifier, for logs and health output.
    fn voice(&self) -> &str;
}

/// Read a non-success response into a `ProviderError::Status`.
pub(crate) async fn status_error(provider: &'static str, response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    ProviderError::Status { provider, status, body }
}
