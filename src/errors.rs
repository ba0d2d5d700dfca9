/*!
 * Error types for the polysub pipeline.
 *
 * This module contains custom error types for different parts of the pipeline,
 * using the thiserror crate for ergonomic error definitions.
 */

// Allow dead code - error types are for library consumers
#![allow(dead_code)]

use thiserror::Error;

/// Errors that can occur when talking to a translation provider API
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    /// Whether the provider could not be reached at all, as opposed to
    /// answering with something unusable.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ProviderError::RequestFailed(_) | ProviderError::ConnectionError(_)
        )
    }
}

/// Errors that can occur while driving the subtitle pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The speech-to-text engine or every configured translation provider
    /// is unreachable. Fatal for the current video.
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    /// A provider reply could not be parsed into enough translated lines.
    /// Recoverable: the parser degrades gracefully and the quality
    /// validator takes over from here.
    #[error("Malformed response: recovered {recovered} of {expected} lines")]
    MalformedResponse {
        /// Lines recovered from the reply
        recovered: usize,
        /// Lines that were expected
        expected: usize,
    },

    /// A batch stayed below the quality threshold after the bounded retry
    /// budget and the operator declined to accept it.
    #[error("Quality below threshold after {retries} retries: {fraction:.2} valid")]
    QualityBelowThreshold {
        /// Fraction of lines that passed validation
        fraction: f64,
        /// Retries that were spent
        retries: u32,
    },

    /// A cached payload failed to deserialize. Callers treat this as a
    /// cache miss; it never crosses a component boundary.
    #[error("Corrupt cache entry for key {0}")]
    CacheCorrupt(String),

    /// Error with subtitle parsing or writing
    #[error("Subtitle error: {0}")]
    Subtitle(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from the pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
