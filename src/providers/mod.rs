/*!
 * Provider implementations for batch translation backends.
 *
 * This module contains client implementations for the translation providers:
 * - DeepSeek: OpenAI-compatible hosted API (the default primary)
 * - Ollama: Local LLM server
 * - Anthropic: Anthropic API integration
 *
 * Providers are interchangeable entries in an ordered fallback chain; the
 * translation client walks the chain and stops at the first provider whose
 * reply survives parsing.
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;

/// A single batched translation request, already serialized into the
/// numbered-line protocol by the translation client.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// System prompt guiding the translation
    pub system: String,

    /// User prompt carrying the numbered source lines
    pub prompt: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,
}

impl ChatRequest {
    /// Create a new request with the pipeline's generation defaults
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            temperature: 0.3,
            max_tokens: 4000,
        }
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Common interface for all batch translation backends.
///
/// Implementations return the provider's raw reply text; shaping that reply
/// into translated lines is the response parser's job, so providers stay
/// interchangeable in the fallback chain.
#[async_trait]
pub trait BatchTranslator: Send + Sync + Debug {
    /// Stable identifier used in cache keys
    fn id(&self) -> &str;

    /// Complete a translation request and return the raw reply text
    async fn translate(&self, request: &ChatRequest) -> Result<String, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;
}

pub mod anthropic;
pub mod deepseek;
pub mod mock;
pub mod ollama;
