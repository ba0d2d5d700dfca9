/*!
 * Transcript acquisition.
 *
 * Wraps the external speech-to-text engine with cache-aware invocation:
 * identical audio transcribed with the same model is served from the cache
 * store instead of paying for the engine again. Engine failure is fatal for
 * the video - retrying belongs to the engine's own contract, not this layer.
 */

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::process::Command;

use crate::cache_store::{CacheKey, CacheNamespace, CacheStore};
use crate::errors::PipelineError;
use crate::subtitle_processor::{self, Segment};

/// External speech-to-text collaborator
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Produce timestamped segments from the audio of the given file
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: &str,
        model: &str,
    ) -> Result<Vec<Segment>, PipelineError>;
}

/// Engine invoking a whisper CLI binary
pub struct WhisperCliEngine {
    /// Binary name or path
    binary: String,

    /// Hard ceiling on one transcription run
    timeout: Duration,
}

impl WhisperCliEngine {
    /// Create an engine around the given whisper binary
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

impl Default for WhisperCliEngine {
    fn default() -> Self {
        // Long-form audio on CPU is slow; an hour covers most inputs
        Self::new("whisper", Duration::from_secs(3600))
    }
}

#[async_trait]
impl SpeechEngine for WhisperCliEngine {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: &str,
        model: &str,
    ) -> Result<Vec<Segment>, PipelineError> {
        let output_dir = tempfile::tempdir()
            .map_err(|e| PipelineError::EngineUnavailable(format!("temp dir: {}", e)))?;

        let whisper_future = Command::new(&self.binary)
            .args([
                "--model", model,
                "--language", language,
                "--output_format", "srt",
                "--output_dir", output_dir.path().to_str().unwrap_or_default(),
                audio_path.to_str().unwrap_or_default(),
            ])
            .output();

        let result = tokio::select! {
            result = whisper_future => {
                result.map_err(|e| PipelineError::EngineUnavailable(
                    format!("Failed to execute {}: {}", self.binary, e)
                ))?
            },
            _ = tokio::time::sleep(self.timeout) => {
                return Err(PipelineError::EngineUnavailable(
                    format!("{} timed out after {:?}", self.binary, self.timeout)
                ));
            }
        };

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(PipelineError::EngineUnavailable(format!(
                "{} exited with {}: {}",
                self.binary,
                result.status,
                stderr.trim()
            )));
        }

        // whisper writes <stem>.srt into the output dir
        let stem = audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let srt_path = output_dir.path().join(format!("{}.srt", stem));

        subtitle_processor::read_srt_file(&srt_path)
            .map_err(|e| PipelineError::EngineUnavailable(format!("Unreadable engine output: {}", e)))
    }
}

/// Engine returning preset segments, for tests and dry runs
pub struct StaticSpeechEngine {
    /// Segments handed out on every call
    segments: Vec<Segment>,

    /// Calls served so far
    calls: parking_lot::Mutex<usize>,
}

impl StaticSpeechEngine {
    /// Create an engine that always yields the given segments
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            segments,
            calls: parking_lot::Mutex::new(0),
        }
    }

    /// Number of transcription calls served
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl SpeechEngine for StaticSpeechEngine {
    async fn transcribe(
        &self,
        _audio_path: &Path,
        _language: &str,
        _model: &str,
    ) -> Result<Vec<Segment>, PipelineError> {
        *self.calls.lock() += 1;
        Ok(self.segments.clone())
    }
}

/// Cache-aware transcript provider
pub struct TranscriptSource {
    /// The external engine
    engine: Arc<dyn SpeechEngine>,

    /// Shared result cache
    cache: Arc<dyn CacheStore>,

    /// Source language passed to the engine
    language: String,
}

impl TranscriptSource {
    /// Create a transcript source for the given language
    pub fn new(engine: Arc<dyn SpeechEngine>, cache: Arc<dyn CacheStore>, language: impl Into<String>) -> Self {
        Self {
            engine,
            cache,
            language: language.into(),
        }
    }

    /// Transcribe the audio, serving from the cache unless `force` is set.
    ///
    /// Fresh results get stable zero-based indices in chronological order
    /// before they are persisted.
    pub async fn transcribe(
        &self,
        audio_path: &Path,
        model: &str,
        force: bool,
    ) -> Result<Vec<Segment>, PipelineError> {
        let audio_content = tokio::fs::read(audio_path).await.map_err(|e| {
            PipelineError::EngineUnavailable(format!(
                "Cannot read {}: {}",
                audio_path.display(),
                e
            ))
        })?;

        let key = CacheKey::for_transcription(&audio_content, model);

        if !force {
            if let Some(payload) = self.cache.get(CacheNamespace::Transcripts, &key) {
                match serde_json::from_slice::<Vec<Segment>>(&payload) {
                    Ok(segments) => {
                        info!(
                            "Transcript served from cache ({} segments)",
                            segments.len()
                        );
                        return Ok(segments);
                    }
                    // Corrupt cache entries read as misses
                    Err(e) => debug!("Corrupt transcript cache entry {}: {}", key, e),
                }
            }
        }

        info!(
            "Transcribing {} with model {}",
            audio_path.display(),
            model
        );
        let mut segments = self.engine.transcribe(audio_path, &self.language, model).await?;

        segments.sort_by_key(|s| s.start_ms);
        for (i, segment) in segments.iter_mut().enumerate() {
            segment.index = i;
        }

        match serde_json::to_vec(&segments) {
            Ok(payload) => self.cache.put(CacheNamespace::Transcripts, &key, &payload),
            Err(e) => warn!("Failed to serialize transcript for cache: {}", e),
        }

        Ok(segments)
    }
}
