use std::time::Duration;
use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::providers::{BatchTranslator, ChatRequest};

/// Ollama client for interacting with a local Ollama server
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// HTTP client for making requests
    client: Client,
    /// Model name
    model: String,
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
}

/// Generation options for the Ollama API
#[derive(Debug, Serialize)]
struct GenerationOptions {
    /// Temperature for generation
    temperature: f32,
    /// Maximum number of tokens to generate
    num_predict: u32,
}

/// Generate request for the Ollama API
#[derive(Debug, Serialize)]
struct GenerationRequest {
    /// Model name to use for generation
    model: String,
    /// Prompt to generate from
    prompt: String,
    /// System message to guide the model
    system: String,
    /// Additional model parameters
    options: GenerationOptions,
    /// Whether to stream the response
    stream: bool,
}

/// Generation response from the Ollama API
#[derive(Debug, Deserialize)]
struct GenerationResponse {
    /// Generated text
    response: String,
}

/// Tag listing response, used for connection tests
#[derive(Debug, Deserialize)]
struct TagsResponse {
    /// Installed models
    #[serde(default)]
    models: Vec<serde_json::Value>,
}

impl Ollama {
    /// Create a new Ollama client from an endpoint URL
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Self {
        let endpoint = endpoint.into();
        let base_url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.trim_end_matches('/').to_string()
        } else {
            // No scheme; local servers speak plain HTTP
            format!("http://{}", endpoint.trim_end_matches('/'))
        };

        Self {
            base_url,
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                // Ollama uses HTTP/1.1
                .http1_only()
                .build()
                .unwrap_or_default(),
            model: model.into(),
            max_retries,
            backoff_base_ms,
        }
    }

    async fn generate_once(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerationRequest {
            model: self.model.clone(),
            prompt: request.prompt.clone(),
            system: request.system.clone(),
            options: GenerationOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
            stream: false,
        };

        let response = self.client
            .post(&url)
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
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        let generation = response.json::<GenerationResponse>().await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(generation.response)
    }
}

#[async_trait]
impl BatchTranslator for Ollama {
    fn id(&self) -> &str {
        "ollama"
    }

    async fn translate(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.max_retries {
            if attempt > 0 {
                let backoff = self.backoff_base_ms * (1u64 << (attempt - 1));
                warn!("Retrying Ollama request (attempt {}/{}) after {}ms",
                      attempt + 1, self.max_retries + 1, backoff);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            match self.generate_once(request).await {
                Ok(text) => return Ok(text),
                Err(e) => last_error = Some(e),
            }
            attempt += 1;
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::RequestFailed("Retry budget exhausted".to_string())
        }))
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::ApiError {
                status_code: response.status().as_u16(),
                message: "Ollama server responded to tag listing with an error".to_string(),
            });
        }

        let _tags = response.json::<TagsResponse>().await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_withBareHost_shouldPrependScheme() {
        let client = Ollama::new("localhost:11434", "llama3.2:3b", 30, 3, 1000);
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_new_withTrailingSlash_shouldTrim() {
        let client = Ollama::new("http://localhost:11434/", "llama3.2:3b", 30, 3, 1000);
        assert_eq!(client.base_url, "http://localhost:11434");
    }
}
