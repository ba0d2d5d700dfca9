use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::PathBuf;

/// Application configuration module
/// This module handles the pipeline configuration including loading,
/// validating and saving configuration settings.
/// Represents the pipeline configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO 639-1)
    pub source_language: String,

    /// Target language codes (ISO 639-1), in priority order. The first
    /// entry is the primary language for bilingual rendering.
    pub target_languages: Vec<String>,

    /// Speech-to-text model size selector
    #[serde(default)]
    pub model_size: ModelSize,

    /// Force re-transcription and re-translation, ignoring caches and
    /// existing output files
    #[serde(default)]
    pub force: bool,

    /// Resume from a previously written, partially translated output
    #[serde(default)]
    pub resume: bool,

    /// Subtitle styling options
    #[serde(default)]
    pub style: StyleConfig,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Cache directory override. Defaults to the platform cache dir.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Speech-to-text model size
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    #[default]
    Medium,
    Large,
}

impl ModelSize {
    // @returns: Model identifier passed to the speech engine
    pub fn identifier(&self) -> &str {
        match self {
            Self::Tiny => "tiny",
            Self::Base => "base",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large-v3",
        }
    }
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

/// Horizontal alignment of rendered cues
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    #[default]
    Center,
    Right,
}

/// Subtitle styling options
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StyleConfig {
    /// Named style template
    #[serde(default = "default_style_template")]
    pub template: String,

    /// Cue alignment
    #[serde(default)]
    pub alignment: Alignment,

    /// Override for the 1080p base font size. Scaled with resolution
    /// like the per-language defaults.
    #[serde(default)]
    pub font_size_override: Option<f32>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            template: default_style_template(),
            alignment: Alignment::default(),
            font_size_override: None,
        }
    }
}

/// Provider configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Max segments per batch
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    // @field: Timeout seconds per call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    // @param provider_type: Provider identifier string
    // @returns: Provider config with defaults
    pub fn new(provider_type: &str) -> Self {
        match provider_type {
            "deepseek" => Self {
                provider_type: "deepseek".to_string(),
                model: default_deepseek_model(),
                api_key: String::new(),
                endpoint: default_deepseek_endpoint(),
                max_batch_size: default_max_batch_size(),
                timeout_secs: default_timeout_secs(),
            },
            "anthropic" => Self {
                provider_type: "anthropic".to_string(),
                model: default_anthropic_model(),
                api_key: String::new(),
                endpoint: default_anthropic_endpoint(),
                max_batch_size: default_anthropic_max_batch_size(),
                timeout_secs: default_anthropic_timeout_secs(),
            },
            _ => Self {
                provider_type: "ollama".to_string(),
                model: default_ollama_model(),
                api_key: String::new(),
                endpoint: default_ollama_endpoint(),
                max_batch_size: default_max_batch_size(),
                timeout_secs: default_timeout_secs(),
            },
        }
    }

    /// Batch size clamped to the range providers can actually honor
    pub fn effective_batch_size(&self) -> usize {
        self.max_batch_size.clamp(1, 40)
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Provider chain in fallback order: the first entry is tried first,
    /// later entries only when earlier ones fail.
    #[serde(default = "default_provider_chain")]
    pub providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            providers: default_provider_chain(),
            common: TranslationCommonConfig::default(),
        }
    }
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// Retry count for failed provider requests
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff base for retries (in milliseconds, doubled per retry)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Minimum fraction of batch lines the response parser must recover
    /// before a provider's reply is taken
    #[serde(default = "default_min_recovery")]
    pub min_recovery: f64,

    /// Quality threshold for auto-accepting a validated batch
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,

    /// Bounded retry budget for below-threshold batches
    #[serde(default = "default_quality_retries")]
    pub quality_retries: u32,

    /// Resume matching tolerance in milliseconds
    #[serde(default = "default_resume_tolerance_ms")]
    pub resume_tolerance_ms: u64,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            temperature: default_temperature(),
            min_recovery: default_min_recovery(),
            quality_threshold: default_quality_threshold(),
            quality_retries: default_quality_retries(),
            resume_tolerance_ms: default_resume_tolerance_ms(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_max_batch_size() -> usize {
    30
}

fn default_anthropic_max_batch_size() -> usize {
    20
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_anthropic_timeout_secs() -> u64 {
    60
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

fn default_temperature() -> f32 {
    0.3
}

fn default_min_recovery() -> f64 {
    0.6
}

fn default_quality_threshold() -> f64 {
    0.8
}

fn default_quality_retries() -> u32 {
    3
}

fn default_resume_tolerance_ms() -> u64 {
    500
}

fn default_style_template() -> String {
    "default".to_string()
}

fn default_deepseek_endpoint() -> String {
    "https://api.deepseek.com".to_string()
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_deepseek_model() -> String {
    "deepseek-chat".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-haiku".to_string()
}

fn default_provider_chain() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new("deepseek"),
        ProviderConfig::new("ollama"),
    ]
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        // Validate languages
        let _source = crate::languages::resolve(&self.source_language)?;
        if self.target_languages.is_empty() {
            return Err(anyhow!("At least one target language is required"));
        }
        for code in &self.target_languages {
            let _target = crate::languages::resolve(code)?;
        }

        if self.translation.providers.is_empty() {
            return Err(anyhow!("At least one translation provider is required"));
        }

        // Remote providers need credentials up front; failing here beats
        // failing after transcription.
        for provider in &self.translation.providers {
            match provider.provider_type.as_str() {
                "deepseek" | "anthropic" => {
                    if provider.api_key.is_empty() {
                        return Err(anyhow!(
                            "API key is required for the {} provider",
                            provider.provider_type
                        ));
                    }
                }
                _ => {}
            }
        }

        let threshold = self.translation.common.quality_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(anyhow!("Quality threshold must be within [0, 1]"));
        }

        Ok(())
    }

    /// Batch size usable across the whole provider chain. Batches are cut
    /// once, before fallback, so the smallest provider limit wins.
    pub fn chain_batch_size(&self) -> usize {
        self.translation
            .providers
            .iter()
            .map(|p| p.effective_batch_size())
            .min()
            .unwrap_or(default_max_batch_size())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "en".to_string(),
            target_languages: vec!["fa".to_string()],
            model_size: ModelSize::default(),
            force: false,
            resume: false,
            style: StyleConfig::default(),
            translation: TranslationConfig::default(),
            cache_dir: None,
            log_level: LogLevel::default(),
        }
    }
}
