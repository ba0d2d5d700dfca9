/*!
 * Mock translation backends for testing.
 *
 * This module provides mock providers that simulate different behaviors:
 * - `MockTranslator::echo(prefix)` - Replies with numbered lines, each the
 *   prefix plus the source line (pick a prefix in the target script to make
 *   the quality validator happy, or an empty one to make it unhappy)
 * - `MockTranslator::failing()` - Always fails with a connection error
 * - `MockTranslator::empty()` - Replies with an empty body
 */

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::ProviderError;
use crate::providers::{BatchTranslator, ChatRequest};

static NUMBERED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\d+[.)]\s*(.+)$").unwrap());

/// Behavior mode for the mock translator
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Numbered reply, each line `{prefix} {source line}`
    Echo {
        /// Text prepended to every line
        prefix: String,
    },
    /// Same content as Echo but serialized as a JSON list of records
    Json {
        /// Text prepended to every line
        prefix: String,
    },
    /// Same content as Echo but as bare newline-delimited lines
    Plain {
        /// Text prepended to every line
        prefix: String,
    },
    /// Numbered reply with only the first N lines present
    Dropping {
        /// Lines kept from the front of the batch
        keep: usize,
        /// Text prepended to kept lines
        prefix: String,
    },
    /// Always fails with a connection error
    Failing,
    /// Fails intermittently (every Nth request)
    Intermittent {
        /// Period of the failure
        fail_every: usize,
    },
    /// Returns an empty reply body
    Empty,
}

/// Mock provider for exercising the translation client and validator
#[derive(Debug)]
pub struct MockTranslator {
    /// Provider identifier reported to cache keys
    id: String,
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter, shared across clones
    request_count: Arc<AtomicUsize>,
    /// Custom response generator (optional, wins over behavior)
    custom_response: Option<fn(&ChatRequest) -> String>,
}

impl MockTranslator {
    /// Create a mock with the given identifier and behavior
    pub fn new(id: impl Into<String>, behavior: MockBehavior) -> Self {
        Self {
            id: id.into(),
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            custom_response: None,
        }
    }

    /// Numbered echo replies with the given line prefix
    pub fn echo(prefix: impl Into<String>) -> Self {
        Self::new("mock", MockBehavior::Echo { prefix: prefix.into() })
    }

    /// Always fails with a connection error
    pub fn failing() -> Self {
        Self::new("mock-failing", MockBehavior::Failing)
    }

    /// Replies with an empty body
    pub fn empty() -> Self {
        Self::new("mock-empty", MockBehavior::Empty)
    }

    /// Numbered replies missing all but the first `keep` lines
    pub fn dropping(keep: usize, prefix: impl Into<String>) -> Self {
        Self::new("mock-dropping", MockBehavior::Dropping { keep, prefix: prefix.into() })
    }

    /// Set a custom response generator
    pub fn with_custom_response(mut self, generator: fn(&ChatRequest) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Override the provider identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Number of requests served so far
    pub fn requests_served(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Source lines recovered from the numbered-line prompt
    fn prompt_lines(request: &ChatRequest) -> Vec<String> {
        NUMBERED_LINE
            .captures_iter(&request.prompt)
            .filter_map(|cap| cap.get(1).map(|m| m.as_str().trim().to_string()))
            .collect()
    }

    fn render_reply(&self, request: &ChatRequest) -> String {
        let lines = Self::prompt_lines(request);
        match &self.behavior {
            MockBehavior::Echo { prefix } => lines
                .iter()
                .enumerate()
                .map(|(i, line)| format!("{}. {} {}", i + 1, prefix, line))
                .collect::<Vec<_>>()
                .join("\n"),

            MockBehavior::Json { prefix } => {
                let records: Vec<serde_json::Value> = lines
                    .iter()
                    .enumerate()
                    .map(|(i, line)| {
                        serde_json::json!({"index": i + 1, "text": format!("{} {}", prefix, line)})
                    })
                    .collect();
                serde_json::to_string(&records).unwrap_or_default()
            }

            MockBehavior::Plain { prefix } => lines
                .iter()
                .map(|line| format!("{} {}", prefix, line))
                .collect::<Vec<_>>()
                .join("\n"),

            MockBehavior::Dropping { keep, prefix } => lines
                .iter()
                .take(*keep)
                .enumerate()
                .map(|(i, line)| format!("{}. {} {}", i + 1, prefix, line))
                .collect::<Vec<_>>()
                .join("\n"),

            MockBehavior::Failing | MockBehavior::Intermittent { .. } | MockBehavior::Empty => {
                String::new()
            }
        }
    }
}

impl Clone for MockTranslator {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            behavior: self.behavior.clone(),
            request_count: Arc::clone(&self.request_count),
            custom_response: self.custom_response,
        }
    }
}

#[async_trait]
impl BatchTranslator for MockTranslator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn translate(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);

        if let MockBehavior::Failing = self.behavior {
            return Err(ProviderError::ConnectionError(
                "Simulated provider failure".to_string(),
            ));
        }

        if let MockBehavior::Intermittent { fail_every } = self.behavior {
            if count % fail_every == fail_every - 1 {
                return Err(ProviderError::ApiError {
                    status_code: 503,
                    message: format!("Simulated intermittent failure (request #{})", count + 1),
                });
            }
        }

        if let Some(generator) = self.custom_response {
            return Ok(generator(request));
        }

        Ok(self.render_reply(request))
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError(
                "Simulated provider failure".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_request() -> ChatRequest {
        ChatRequest::new(
            "You are a translator.",
            "Translate these lines:\n\n1. Hello there\n2. How are you\n3. Goodbye",
        )
    }

    #[tokio::test]
    async fn test_echoTranslator_shouldReturnNumberedLines() {
        let provider = MockTranslator::echo("سلام");
        let reply = provider.translate(&numbered_request()).await.unwrap();

        let lines: Vec<&str> = reply.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("1. سلام"));
        assert!(lines[2].contains("Goodbye"));
    }

    #[tokio::test]
    async fn test_failingTranslator_shouldReturnConnectionError() {
        let provider = MockTranslator::failing();
        let result = provider.translate(&numbered_request()).await;
        assert!(matches!(result, Err(ProviderError::ConnectionError(_))));
    }

    #[tokio::test]
    async fn test_droppingTranslator_shouldKeepOnlyFirstLines() {
        let provider = MockTranslator::dropping(1, "x");
        let reply = provider.translate(&numbered_request()).await.unwrap();
        assert_eq!(reply.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_intermittentTranslator_shouldFailPeriodically() {
        let provider = MockTranslator::new("mock", MockBehavior::Intermittent { fail_every: 3 });
        let request = numbered_request();

        assert!(provider.translate(&request).await.is_ok());
        assert!(provider.translate(&request).await.is_ok());
        assert!(provider.translate(&request).await.is_err());
        assert!(provider.translate(&request).await.is_ok());
    }

    #[tokio::test]
    async fn test_clonedTranslator_shouldShareRequestCount() {
        let provider = MockTranslator::echo("x");
        let cloned = provider.clone();

        let _ = provider.translate(&numbered_request()).await;
        let _ = cloned.translate(&numbered_request()).await;
        assert_eq!(provider.requests_served(), 2);
    }

    #[tokio::test]
    async fn test_customResponseGenerator_shouldBeUsed() {
        let provider = MockTranslator::echo("x")
            .with_custom_response(|req| format!("CUSTOM: {}", req.system));
        let reply = provider.translate(&numbered_request()).await.unwrap();
        assert!(reply.starts_with("CUSTOM:"));
    }
}
