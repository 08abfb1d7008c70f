// ABOUTME: OpenAI-compatible chat completions client for local and hosted LLM gateways
// ABOUTME: Works with Ollama, vLLM, LocalAI, and any endpoint speaking the OpenAI API
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Parley Contributors

//! # `OpenAI`-Compatible Provider
//!
//! Generic chat completions client for any endpoint implementing the `OpenAI`
//! chat completions API. This covers the common local inference servers
//! (Ollama, vLLM, `LocalAI`) as well as hosted gateways behind an API key.
//!
//! Streaming responses use the shared SSE parser in [`super::sse_parser`] so
//! that events split across TCP chunks are reassembled correctly.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use super::sse_parser::create_sse_stream;
use super::{
    ChatMessage, ChatRequest, ChatResponse, ChatStream, LlmCapabilities, LlmProvider, StreamChunk,
    TokenUsage,
};
use crate::config::LlmConfig;
use crate::errors::{AppError, ErrorCode};

/// Connection timeout for the gateway
const CONNECT_TIMEOUT_SECS: u64 = 30;
/// Overall request timeout (generation can be slow on local hardware)
const REQUEST_TIMEOUT_SECS: u64 = 300;

// ============================================================================
// Wire Types
// ============================================================================

/// Chat completions request body
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// A message in the `OpenAI` wire format
#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

impl From<&ChatMessage> for OpenAiMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
        }
    }
}

/// Chat completions response body
#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

/// A single completion choice
#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

/// The message inside a completion choice
#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

/// Token usage block
#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(rename = "prompt_tokens")]
    prompt: u32,
    #[serde(rename = "completion_tokens")]
    completion: u32,
    #[serde(rename = "total_tokens")]
    total: u32,
}

/// A streaming chunk in the `OpenAI` wire format
#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

/// A single streaming choice
#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
    finish_reason: Option<String>,
}

/// Content delta within a streaming choice
#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
}

/// Error response body
#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetails,
}

/// Error details within an error response
#[derive(Debug, Deserialize)]
struct OpenAiErrorDetails {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Generic `OpenAI`-compatible LLM provider
///
/// Works with any endpoint that implements the `OpenAI` chat completions API,
/// including Ollama, vLLM, `LocalAI`, and cloud services.
pub struct OpenAiCompatibleProvider {
    client: Client,
    config: LlmConfig,
    provider_name: &'static str,
    display_name: &'static str,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider for the configured gateway
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: LlmConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        // Detect the backend from well-known ports for friendlier log output
        let (provider_name, display_name) = if config.base_url.contains(":11434") {
            ("ollama", "Ollama (Local)")
        } else if config.base_url.contains(":8000") {
            ("vllm", "vLLM (Local)")
        } else {
            ("local", "Local LLM")
        };

        Ok(Self {
            client,
            config,
            provider_name,
            display_name,
        })
    }

    /// Build the API URL for a given endpoint
    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    /// Convert internal messages to `OpenAI` format
    fn convert_messages(messages: &[ChatMessage]) -> Vec<OpenAiMessage> {
        messages.iter().map(OpenAiMessage::from).collect()
    }

    /// Add authorization header if an API key is configured
    fn add_auth_header(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref api_key) = self.config.api_key {
            request.header("Authorization", format!("Bearer {api_key}"))
        } else {
            request
        }
    }

    /// Map a request send failure to an application error
    fn map_send_error(&self, e: &reqwest::Error) -> AppError {
        error!("Failed to send request to {}: {}", self.provider_name, e);
        if e.is_connect() {
            AppError::new(
                ErrorCode::ExternalServiceUnavailable,
                format!(
                    "Cannot connect to {}. Is the server running at {}?",
                    self.display_name, self.config.base_url
                ),
            )
        } else {
            AppError::external_service(self.provider_name, format!("Failed to connect: {e}"))
        }
    }

    /// Parse an error response from the API
    fn parse_error_response(
        provider_name: &str,
        status: reqwest::StatusCode,
        body: &str,
    ) -> AppError {
        if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            let error_type = error_response
                .error
                .error_type
                .unwrap_or_else(|| "unknown".to_owned());

            match status.as_u16() {
                400 => AppError::invalid_input(format!(
                    "API validation error: {}",
                    error_response.error.message
                )),
                404 => AppError::not_found(format!(
                    "Model or endpoint: {}",
                    error_response.error.message
                )),
                503 => AppError::new(
                    ErrorCode::ExternalServiceUnavailable,
                    format!(
                        "Service unavailable (is the local server running?): {}",
                        error_response.error.message
                    ),
                ),
                _ => AppError::external_service(
                    provider_name,
                    format!("{} - {}", error_type, error_response.error.message),
                ),
            }
        } else {
            // Non-JSON error responses are common with local servers
            match status.as_u16() {
                502..=504 => AppError::new(
                    ErrorCode::ExternalServiceUnavailable,
                    "LLM gateway is not responding. Is Ollama/vLLM running?".to_owned(),
                ),
                _ => AppError::external_service(
                    provider_name,
                    format!(
                        "API error ({}): {}",
                        status,
                        body.chars().take(200).collect::<String>()
                    ),
                ),
            }
        }
    }

    /// Parse a single streaming data payload into a `StreamChunk`
    fn parse_stream_data(json_str: &str) -> Option<Result<StreamChunk, AppError>> {
        match serde_json::from_str::<OpenAiStreamChunk>(json_str) {
            Ok(chunk) => {
                let choice = chunk.choices.into_iter().next()?;
                Some(Ok(StreamChunk {
                    delta: choice.delta.content.unwrap_or_default(),
                    is_final: choice.finish_reason.is_some(),
                    finish_reason: choice.finish_reason,
                }))
            }
            Err(e) => {
                warn!("Failed to parse stream chunk: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &'static str {
        self.provider_name
    }

    fn display_name(&self) -> &'static str {
        self.display_name
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::text_only()
    }

    fn default_model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip(self, request), fields(model = %request.model.as_deref().unwrap_or(&self.config.model)))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        let model = request.model.as_deref().unwrap_or(&self.config.model);

        let openai_request = OpenAiRequest {
            model: model.to_owned(),
            messages: Self::convert_messages(&request.messages),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: Some(false),
        };

        debug!(
            "Sending chat completion request to {} with {} messages",
            self.provider_name,
            openai_request.messages.len()
        );

        let http_request = self
            .client
            .post(self.api_url("chat/completions"))
            .header("Content-Type", "application/json")
            .json(&openai_request);

        let response = self
            .add_auth_header(http_request)
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!("Failed to read API response: {}", e);
            AppError::external_service(self.provider_name, format!("Failed to read response: {e}"))
        })?;

        if !status.is_success() {
            return Err(Self::parse_error_response(self.provider_name, status, &body));
        }

        let openai_response: OpenAiResponse = serde_json::from_str(&body).map_err(|e| {
            // Character-based truncation; a byte slice could split a UTF-8
            // sequence and panic
            error!(
                "Failed to parse API response: {} - body: {}",
                e,
                body.chars().take(500).collect::<String>()
            );
            AppError::external_service(self.provider_name, format!("Failed to parse response: {e}"))
        })?;

        let choice = openai_response.choices.into_iter().next().ok_or_else(|| {
            AppError::external_service(self.provider_name, "API returned no choices")
        })?;

        let content = choice.message.content.unwrap_or_default();

        debug!(
            "Received response from {}: {} chars, finish_reason: {:?}",
            self.provider_name,
            content.len(),
            choice.finish_reason
        );

        Ok(ChatResponse {
            content,
            model: openai_response.model,
            usage: openai_response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt,
                completion_tokens: u.completion,
                total_tokens: u.total,
            }),
            finish_reason: choice.finish_reason,
        })
    }

    #[instrument(skip(self, request), fields(model = %request.model.as_deref().unwrap_or(&self.config.model)))]
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        let model = request.model.as_deref().unwrap_or(&self.config.model);

        debug!(
            "Sending streaming chat completion request to {}",
            self.provider_name
        );

        let openai_request = OpenAiRequest {
            model: model.to_owned(),
            messages: Self::convert_messages(&request.messages),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: Some(true),
        };

        let http_request = self
            .client
            .post(self.api_url("chat/completions"))
            .header("Content-Type", "application/json")
            .json(&openai_request);

        let response = self
            .add_auth_header(http_request)
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error_response(self.provider_name, status, &body));
        }

        Ok(create_sse_stream(
            response.bytes_stream(),
            Self::parse_stream_data,
            self.provider_name,
        ))
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<bool, AppError> {
        debug!(
            "Performing {} health check at {}",
            self.provider_name, self.config.base_url
        );

        // The models endpoint is a lightweight liveness probe
        let http_request = self.client.get(self.api_url("models"));

        let response = self
            .add_auth_header(http_request)
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        let healthy = response.status().is_success();

        if healthy {
            debug!("{} health check passed", self.provider_name);
        } else {
            warn!(
                "{} health check failed with status: {}",
                self.provider_name,
                response.status()
            );
        }

        Ok(healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stream_data_with_delta() {
        let json = r#"{"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        let chunk = OpenAiCompatibleProvider::parse_stream_data(json)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.delta, "Hel");
        assert!(!chunk.is_final);
    }

    #[test]
    fn test_parse_stream_data_final_chunk() {
        let json = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let chunk = OpenAiCompatibleProvider::parse_stream_data(json)
            .unwrap()
            .unwrap();
        assert!(chunk.delta.is_empty());
        assert!(chunk.is_final);
        assert_eq!(chunk.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_parse_stream_data_malformed_is_skipped() {
        assert!(OpenAiCompatibleProvider::parse_stream_data("not json").is_none());
        assert!(OpenAiCompatibleProvider::parse_stream_data(r#"{"choices":[]}"#).is_none());
    }

    #[test]
    fn test_error_response_truncates_multibyte_body() {
        let body = "服务器错误".repeat(100);
        let err = OpenAiCompatibleProvider::parse_error_response(
            "ollama",
            reqwest::StatusCode::IM_A_TEAPOT,
            &body,
        );
        assert_eq!(err.code, ErrorCode::ExternalServiceError);
        assert!(err.message.contains("服务器错误"));
    }

    #[test]
    fn test_error_response_mapping() {
        let body = r#"{"error":{"message":"model not found","type":"invalid_request_error"}}"#;
        let err = OpenAiCompatibleProvider::parse_error_response(
            "ollama",
            reqwest::StatusCode::NOT_FOUND,
            body,
        );
        assert_eq!(err.code, ErrorCode::ResourceNotFound);

        let err = OpenAiCompatibleProvider::parse_error_response(
            "ollama",
            reqwest::StatusCode::BAD_GATEWAY,
            "<html>bad gateway</html>",
        );
        assert_eq!(err.code, ErrorCode::ExternalServiceUnavailable);
    }
}
