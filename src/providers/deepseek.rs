use std::time::Duration;
use async_trait::async_trait;
use log::{error, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::providers::{BatchTranslator, ChatRequest};

/// DeepSeek client speaking the OpenAI-compatible chat completions API
#[derive(Debug)]
pub struct DeepSeek {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API endpoint URL
    endpoint: String,
    /// Model name
    model: String,
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
}

/// Chat message object
#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    role: String,
    /// Content of the message
    content: String,
}

/// Chat completion request body
#[derive(Debug, Serialize)]
struct CompletionRequest {
    /// Model name to use for generation
    model: String,
    /// Messages of the conversation
    messages: Vec<ChatMessage>,
    /// Sampling temperature
    temperature: f32,
    /// Maximum tokens to generate
    max_tokens: u32,
    /// Whether to stream the response
    stream: bool,
}

/// One completion choice in the response
#[derive(Debug, Deserialize)]
struct CompletionChoice {
    /// The generated message
    message: ChatMessage,
}

/// Chat completion response body
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    /// Generated choices
    choices: Vec<CompletionChoice>,
}

impl DeepSeek {
    /// Create a new DeepSeek client
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: model.into(),
            max_retries,
            backoff_base_ms,
        }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.endpoint.trim_end_matches('/')
        )
    }

    async fn complete_once(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let body = CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: request.system.clone() },
                ChatMessage { role: "user".to_string(), content: request.prompt.clone() },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };

        let response = self.client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
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
            error!("DeepSeek API error ({}): {}", status, message);
            return Err(match status.as_u16() {
                401 | 403 => ProviderError::AuthenticationError(message),
                429 => ProviderError::RateLimitExceeded(message),
                code => ProviderError::ApiError { status_code: code, message },
            });
        }

        let completion = response.json::<CompletionResponse>().await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        completion.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::ParseError("Response contained no choices".to_string()))
    }
}

#[async_trait]
impl BatchTranslator for DeepSeek {
    fn id(&self) -> &str {
        "deepseek"
    }

    async fn translate(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.max_retries {
            if attempt > 0 {
                let backoff = self.backoff_base_ms * (1u64 << (attempt - 1));
                warn!("Retrying DeepSeek request (attempt {}/{}) after {}ms",
                      attempt + 1, self.max_retries + 1, backoff);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            match self.complete_once(request).await {
                Ok(text) => return Ok(text),
                // Auth failures won't heal on retry
                Err(e @ ProviderError::AuthenticationError(_)) => return Err(e),
                Err(e) => last_error = Some(e),
            }
            attempt += 1;
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::RequestFailed("Retry budget exhausted".to_string())
        }))
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let request = ChatRequest::new("You are a translator.", "Say OK.");
        self.complete_once(&request).await.map(|_| ())
    }
}
