use std::time::Duration;
use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::providers::{BatchTranslator, ChatRequest};

/// Anthropic client for interacting with the Anthropic messages API
#[derive(Debug)]
pub struct Anthropic {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API endpoint URL
    endpoint: String,
    /// Model name
    model: String,
}

/// Anthropic message format
#[derive(Debug, Serialize)]
struct AnthropicMessage {
    /// Role of the message sender (user, assistant)
    role: String,
    /// Content of the message
    content: String,
}

/// Anthropic message request
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    /// The model to use
    model: String,
    /// The messages for the conversation
    messages: Vec<AnthropicMessage>,
    /// System prompt to guide the AI
    system: String,
    /// Temperature for generation
    temperature: f32,
    /// Maximum number of tokens to generate
    max_tokens: u32,
}

/// Individual content block in an Anthropic response
#[derive(Debug, Deserialize)]
struct AnthropicContent {
    /// The type of content
    #[serde(rename = "type")]
    content_type: String,
    /// The actual text content
    #[serde(default)]
    text: String,
}

/// Anthropic response
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    /// The content of the response
    content: Vec<AnthropicContent>,
}

impl Anthropic {
    /// Create a new Anthropic client
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: model.into(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.endpoint.trim_end_matches('/'))
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let body = AnthropicRequest {
            model: self.model.clone(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            system: request.system.clone(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self.client
            .post(self.messages_url())
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ProviderError::ConnectionError(e.to_string())
                } else {
                    ProviderError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Anthropic API error ({}): {}", status, message);
            return Err(match status.as_u16() {
                401 | 403 => ProviderError::AuthenticationError(message),
                429 => ProviderError::RateLimitExceeded(message),
                code => ProviderError::ApiError { status_code: code, message },
            });
        }

        let parsed = response.json::<AnthropicResponse>().await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let text: String = parsed.content
            .iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.as_str())
            .collect();

        if text.is_empty() {
            return Err(ProviderError::ParseError("Response contained no text blocks".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl BatchTranslator for Anthropic {
    fn id(&self) -> &str {
        "anthropic"
    }

    async fn translate(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        self.complete(request).await
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let request = ChatRequest::new("You are a translator.", "Say OK.");
        self.complete(&request).await.map(|_| ())
    }
}
