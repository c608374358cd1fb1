//! LLM client abstraction for persona generation.
//!
//! Every persona call is a single system instruction plus one user message.

use async_trait::async_trait;

use crate::error::Result;

/// A single-turn generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmRequest {
    /// Model identifier.
    pub model: String,
    /// System instruction fixing persona and output contract.
    pub system: String,
    /// The one user message.
    pub prompt: String,
    /// Output length cap.
    pub max_tokens: u32,
}

impl LlmRequest {
    /// Create a request.
    pub fn new(model: impl Into<String>, system: impl Into<String>, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            prompt: prompt.into(),
            max_tokens,
        }
    }
}

/// Response from the LLM.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Text content of the response.
    pub content: String,
    /// Reason the response stopped.
    pub stop_reason: Option<String>,
    /// Number of tokens used (input + output).
    pub tokens_used: u64,
}

impl LlmResponse {
    /// Create a new response with just content.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            stop_reason: Some("end_turn".to_string()),
            tokens_used: 0,
        }
    }
}

/// Trait for LLM clients.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate one reply for the request.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;
}

/// Mock LLM client for testing.
#[cfg(test)]
pub struct MockLlmClient {
    /// Responses to return in order.
    pub responses: std::sync::Mutex<Vec<LlmResponse>>,
    /// Every request received, in order.
    pub requests: std::sync::Mutex<Vec<LlmRequest>>,
    /// When set, every call fails with this message.
    pub failure: Option<String>,
}

#[cfg(test)]
impl MockLlmClient {
    /// Create a new mock client with predefined responses.
    pub fn new(responses: Vec<LlmResponse>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses),
            requests: std::sync::Mutex::new(Vec::new()),
            failure: None,
        }
    }

    /// Create a mock that always returns the same response.
    pub fn always(response: LlmResponse) -> Self {
        Self::new(vec![response; 100])
    }

    /// Create a mock whose every call fails.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(Vec::new())
        }
    }

    /// Requests seen so far.
    pub fn seen(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(message) = &self.failure {
            return Err(crate::error::Error::Api(message.clone()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(LlmResponse::text("No more mock responses"))
        } else {
            Ok(responses.remove(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_response_text() {
        let response = LlmResponse::text("Hello");
        assert_eq!(response.content, "Hello");
        assert_eq!(response.stop_reason, Some("end_turn".to_string()));
    }

    #[tokio::test]
    async fn test_mock_llm_client() {
        let client = MockLlmClient::new(vec![LlmResponse::text("First"), LlmResponse::text("Second")]);
        let request = LlmRequest::new("test", "system", "prompt", 10);

        assert_eq!(client.complete(&request).await.unwrap().content, "First");
        assert_eq!(client.complete(&request).await.unwrap().content, "Second");
        assert_eq!(
            client.complete(&request).await.unwrap().content,
            "No more mock responses"
        );
        assert_eq!(client.seen().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_llm_client_failing() {
        let client = MockLlmClient::failing("overloaded");
        let request = LlmRequest::new("test", "system", "prompt", 10);

        let err = client.complete(&request).await.unwrap_err();
        assert!(err.to_string().contains("overloaded"));
    }
}
