//! OpenAI chat completions client used as the interviewer's text generator.
//!
//! The whole conversation is sent as one `user` message; the session has
//! already flattened it into a single prompt.

use super::{status_error, ProviderError, TextGenerator};
use crate::config::LlmConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const PROVIDER: &str = "openai";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct OpenAiGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|source| ProviderError::Transport { provider: PROVIDER, source })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = build_request(&self.model, prompt);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|source| ProviderError::Transport { provider: PROVIDER, source })?;

        if !response.status().is_success() {
            return Err(status_error(PROVIDER, response).await);
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| ProviderError::Transport { provider: PROVIDER, source })?;

        let reply = parse_reply(&body)?;
        debug!(model = %self.model, reply_chars = reply.len(), "Completion received");
        Ok(reply)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn build_request<'a>(model: &'a str, prompt: &'a str) -> ChatCompletionRequest<'a> {
    ChatCompletionRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
    }
}

/// Decode a 2xx body. Anything that is not a completion is a malformed reply.
fn parse_reply(body: &[u8]) -> Result<String, ProviderError> {
    let parsed: ChatCompletionResponse = serde_json::from_slice(body).map_err(|err| ProviderError::Malformed {
        provider: PROVIDER,
        message: format!("invalid completion body: {}", err),
    })?;
    extract_reply(parsed)
}

fn extract_reply(response: ChatCompletionResponse) -> Result<String, ProviderError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ProviderError::Malformed {
            provider: PROVIDER,
            message: "no message content in first choice".to_string(),
        })?;

    if content.trim().is_empty() {
        return Err(ProviderError::Malformed {
            provider: PROVIDER,
            message: "completion was empty".to_string(),
        });
    }

    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_sends_prompt_as_single_user_message() {
        let json = serde_json::to_value(build_request("gpt-3.5-turbo", "Persona.\nCandidate: hi \nKaty: ")).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Persona.\nCandidate: hi \nKaty: ");
    }

    #[test]
    fn test_extract_reply_takes_first_choice() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "Great, tell me more."}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_reply(response).unwrap(), "Great, tell me more.");
    }

    #[test]
    fn test_extract_reply_rejects_missing_or_blank_content() {
        let empty: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(extract_reply(empty), Err(ProviderError::Malformed { .. })));

        let null: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert!(matches!(extract_reply(null), Err(ProviderError::Malformed { .. })));

        let blank: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "  "}}]}"#).unwrap();
        assert!(matches!(extract_reply(blank), Err(ProviderError::Malformed { .. })));
    }

    #[test]
    fn test_undecodable_body_is_malformed_not_transport() {
        assert!(matches!(
            parse_reply(br#"{"choices":"oops"}"#),
            Err(ProviderError::Malformed { provider: "openai", .. })
        ));
        assert!(matches!(
            parse_reply(b"<html>gateway</html>"),
            Err(ProviderError::Malformed { .. })
        ));
        assert_eq!(
            parse_reply(br#"{"choices": [{"message": {"content": "Go on."}}]}"#).unwrap(),
            "Go on."
        );
    }
}
