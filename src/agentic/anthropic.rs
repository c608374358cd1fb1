//! Anthropic Claude API client implementation.
//!
//! Implements the `LlmClient` trait for calling Anthropic's Messages API.
//! Calls are one-shot: a failed tick is retried by the next scheduled tick.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::agentic::llm::{LlmClient, LlmRequest, LlmResponse};
use crate::error::{Error, Result};

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default base URL for Anthropic API.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic API client.
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    /// Create a new Anthropic client.
    ///
    /// Reads API key from `ANTHROPIC_API_KEY` environment variable if not provided.
    pub fn new(api_key: Option<String>, base_url: Option<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key
            .or_else(|| env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| Error::Config("ANTHROPIC_API_KEY not set".to_string()))?;

        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Api(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url,
        })
    }

    fn build_request(&self, request: &LlmRequest) -> AnthropicRequest {
        AnthropicRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            system: request.system.clone(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
        }
    }

    /// Convert Anthropic API response to internal format.
    fn convert_response(&self, response: AnthropicResponse) -> LlmResponse {
        let content = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<String>();

        LlmResponse {
            content,
            stop_reason: response.stop_reason,
            tokens_used: response.usage.input_tokens + response.usage.output_tokens,
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let body = self.build_request(request);

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Request failed: {}", e)))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(Error::Api(format!("API error {}: {}", status, text)));
        }

        let api_response: AnthropicResponse = serde_json::from_str(&text)
            .map_err(|e| Error::Api(format!("Failed to parse response: {} - {}", e, text)))?;

        Ok(self.convert_response(api_response))
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}
