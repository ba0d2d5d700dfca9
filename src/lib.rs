/*!
 * # polysub - Multilingual Subtitle Generation
 *
 * A Rust library for generating multilingual subtitles for videos:
 * transcribe, batch-translate through AI providers, validate, and render a
 * styled subtitle track.
 *
 * ## Features
 *
 * - Cache-aware transcription through an external speech-to-text engine
 * - Batched translation with an ordered provider fallback chain:
 *   - DeepSeek (OpenAI-compatible hosted API)
 *   - Ollama (local LLM)
 *   - Anthropic API
 * - Multi-format reply parsing tolerant of provider drift
 * - Script-aware quality validation with a bounded interactive retry
 * - Resume of interrupted jobs by timing reconciliation
 * - Resolution-scaled, bidi-safe styled track rendering (ASS)
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `subtitle_processor`: Segment data model and timed-text file handling
 * - `cache_store`: Content-addressed persistence of computed results
 * - `transcribe`: Cache-aware invocation of the speech-to-text engine
 * - `translation`: Batched AI translation:
 *   - `translation::batch`: Provider-sized segment batching
 *   - `translation::parser`: Multi-format reply parsing
 *   - `translation::client`: Provider fallback chain and caching
 *   - `translation::validator`: Quality checks and the retry protocol
 * - `resume`: Reconciliation of prior partial output by timing
 * - `render`: Styled track rendering
 * - `encode`: Hand-off to the external video encoder
 * - `pipeline`: The per-video orchestrator state machine
 * - `providers`: Client implementations for the translation backends
 * - `languages`: Language profile registry
 * - `errors`: Custom error types for the pipeline
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod cache_store;
pub mod encode;
pub mod errors;
pub mod file_utils;
pub mod languages;
pub mod pipeline;
pub mod providers;
pub mod render;
pub mod resume;
pub mod subtitle_processor;
pub mod transcribe;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use cache_store::{CacheKey, CacheStore, FsCacheStore, MemoryCacheStore};
pub use errors::{AppError, PipelineError, ProviderError};
pub use pipeline::{Pipeline, PipelineReport, StageState};
pub use render::StyledTrack;
pub use subtitle_processor::Segment;
pub use translation::{QualityValidator, TranslationClient, ValidationVerdict};
