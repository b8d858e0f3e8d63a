use crate::config::ModelConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

// Alias for the stream type we'll return
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

// One prompt turn sent to the model
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

// Trait defining the interface for LLM API providers
#[async_trait]
pub trait LLMApiProvider: Send + Sync {
    // Returns a stream of content deltas.
    async fn send_chat_stream_request(
        &self,
        config: &ModelConfig,
        api_key: &str,
        messages: &[PromptMessage],
    ) -> Result<DeltaStream>;

    // Returns the complete response text.
    async fn send_chat_request(
        &self,
        config: &ModelConfig,
        api_key: &str,
        messages: &[PromptMessage],
    ) -> Result<String>;
}

// --- OpenAI Compatible Provider Implementation ---

#[derive(Serialize, Debug)]
struct OpenAIRequestBody<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    stream: bool,
}

// Response structure for STREAMING chunks
#[derive(Deserialize, Debug)]
struct OpenAIStreamChunk {
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Deserialize, Debug)]
struct OpenAIStreamChoice {
    delta: OpenAIStreamDelta,
}

#[derive(Deserialize, Debug)]
struct OpenAIStreamDelta {
    content: Option<String>,
}

// Response structure for a complete (non-streaming) completion
#[derive(Deserialize, Debug)]
struct OpenAICompletion {
    choices: Vec<OpenAICompletionChoice>,
}

#[derive(Deserialize, Debug)]
struct OpenAICompletionChoice {
    message: OpenAICompletionMessage,
}

#[derive(Deserialize, Debug)]
struct OpenAICompletionMessage {
    content: Option<String>,
}

/// Interprets one SSE `data` payload from the provider.
///
/// `Ok(None)` means the event carries no text (end marker, ping, role-only
/// delta) and should be skipped.
pub fn parse_stream_chunk(event_data: &str) -> Result<Option<String>> {
    let event_data = event_data.trim();

    // Check for the special [DONE] message
    if event_data == "[DONE]" {
        log::info!("Stream finished with [DONE]");
        return Ok(None);
    }

    match serde_json::from_str::<OpenAIStreamChunk>(event_data) {
        Ok(chunk) => Ok(chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())),
        Err(e) => {
            // Try parsing as generic JSON to check for known event types like ping.
            match serde_json::from_str::<serde_json::Value>(event_data) {
                Ok(json_value) if json_value.get("type").and_then(|t| t.as_str()) == Some("ping") => {
                    log::debug!("Received stream ping event, skipping.");
                    Ok(None)
                }
                Ok(_) => {
                    log::warn!("Stream chunk was valid JSON but not a completion chunk: {} - Data: {}", e, event_data);
                    Err(anyhow::Error::from(e)
                        .context(format!("Parsed as JSON but not a valid OpenAIStreamChunk: {}", event_data)))
                }
                Err(_) => {
                    log::warn!("Failed to parse stream chunk as JSON: {} - Data: {}", e, event_data);
                    Err(anyhow::Error::from(e)
                        .context(format!("Failed to parse stream chunk as JSON: {}", event_data)))
                }
            }
        }
    }
}

pub struct OpenAICompatibleProvider {
    client: Client,
}

impl OpenAICompatibleProvider {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }

    async fn post(
        &self,
        config: &ModelConfig,
        api_key: &str,
        messages: &[PromptMessage],
        stream: bool,
    ) -> Result<reqwest::Response> {
        let request_body = OpenAIRequestBody {
            model: &config.model,
            messages,
            stream,
        };
        let request_url = format!("{}/chat/completions", config.api_url.trim_end_matches('/'));

        let mut request = self.client.post(&request_url);
        if !api_key.is_empty() {
            request = request.bearer_auth(api_key);
        }
        let response = request
            .timeout(config.request_timeout)
            .json(&request_body)
            .send()
            .await
            .context("Failed to send request to the model API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "<Failed to read error body>".to_string());
            log::error!("Model API request failed with status {}: {}", status, error_body);
            return Err(anyhow::anyhow!("API request failed with status {}: {}", status, error_body));
        }

        Ok(response)
    }
}

impl Default for OpenAICompatibleProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMApiProvider for OpenAICompatibleProvider {
    async fn send_chat_stream_request(
        &self,
        config: &ModelConfig,
        api_key: &str,
        messages: &[PromptMessage],
    ) -> Result<DeltaStream> {
        log::info!("Sending STREAM request to {} using model: {}", config.api_url, config.model);
        let response = self.post(config, api_key, messages, true).await?;

        let delta_stream = response
            .bytes_stream()
            .eventsource()
            .map(|event_result| -> Result<Option<String>> {
                let event = event_result.context("Error reading stream event")?;
                parse_stream_chunk(&event.data)
            })
            // Keep text and errors, drop empty events
            .filter_map(|result| async move {
                match result {
                    Ok(Some(content)) => Some(Ok(content)),
                    Ok(None) => None,
                    Err(e) => {
                        log::error!("Error processing stream chunk: {:?}", e);
                        Some(Err(e))
                    }
                }
            });

        Ok(Box::pin(delta_stream))
    }

    async fn send_chat_request(
        &self,
        config: &ModelConfig,
        api_key: &str,
        messages: &[PromptMessage],
    ) -> Result<String> {
        log::info!("Sending request to {} using model: {}", config.api_url, config.model);
        let response = self.post(config, api_key, messages, false).await?;

        let completion: OpenAICompletion = response
            .json()
            .await
            .context("Failed to decode model API response")?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .context("Model API response contained no message content")
    }
}
