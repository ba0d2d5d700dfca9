/*!
 * Pipeline orchestration.
 *
 * Sequences transcription, resume reconciliation, batching, translation,
 * validation and rendering per (video, target language), then hands the
 * result to the external video encoder. Target languages run sequentially
 * so interactive validation prompts present unambiguously, one at a time.
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{Context, Result};
use log::{debug, error, info, warn};

use crate::app_config::Config;
use crate::cache_store::CacheStore;
use crate::encode::{self, EncodeJob, EncoderFamily, VideoEncoder};
use crate::errors::PipelineError;
use crate::file_utils::FileManager;
use crate::render::{self, PRIMARY_STYLE, SECONDARY_STYLE};
use crate::resume::{self, PriorCue, ResumeMerger};
use crate::subtitle_processor::{self, Segment, TrackText};
use crate::transcribe::{SpeechEngine, TranscriptSource};
use crate::translation::validator::{OperatorPrompt, QualityValidator, ValidationVerdict};
use crate::translation::{make_batches, TranslationClient};

// Upstream line length ceiling; rendering never wraps
const MAX_LINE_CHARS: usize = 42;

/// Per-(video, language) processing state. Transitions are strictly
/// forward; the only re-entry is resume, which starts over from Pending
/// with a pre-populated partial result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StageState {
    Pending,
    Transcribed,
    Batched,
    Translating,
    Validated,
    Rendered,
    /// Operator declined a below-threshold batch
    AbortedByUser,
    /// Unrecoverable engine error
    Failed,
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Transcribed => "TRANSCRIBED",
            Self::Batched => "BATCHED",
            Self::Translating => "TRANSLATING",
            Self::Validated => "VALIDATED",
            Self::Rendered => "RENDERED",
            Self::AbortedByUser => "ABORTED_BY_USER",
            Self::Failed => "FAILED",
        };
        write!(f, "{}", name)
    }
}

/// Result of processing one target language
#[derive(Debug)]
pub struct LanguageOutcome {
    /// Target language code
    pub language: String,

    /// Terminal state reached
    pub state: StageState,

    /// Written per-language subtitle file, if any
    pub subtitle_path: Option<PathBuf>,

    /// Verdicts of every judged batch
    pub verdicts: Vec<ValidationVerdict>,

    /// Segments with translations, kept for rendering
    segments: Vec<Segment>,
}

/// Result of one pipeline run
#[derive(Debug)]
pub struct PipelineReport {
    /// The processed video
    pub video_path: PathBuf,

    /// One outcome per target language, in configuration order
    pub outcomes: Vec<LanguageOutcome>,

    /// Written styled track, when at least one language validated
    pub styled_track_path: Option<PathBuf>,

    /// Burned-in output, when an encoder was attached and succeeded
    pub encoded_output_path: Option<PathBuf>,
}

impl PipelineReport {
    /// Terminal state of one language
    pub fn state_of(&self, language: &str) -> Option<StageState> {
        self.outcomes
            .iter()
            .find(|o| o.language == language)
            .map(|o| o.state)
    }
}

/// The pipeline orchestrator
pub struct Pipeline {
    config: Config,
    transcript_source: TranscriptSource,
    client: TranslationClient,
    validator: QualityValidator,
    merger: ResumeMerger,
    prompt: Arc<dyn OperatorPrompt>,
    encoder: Option<Arc<dyn VideoEncoder>>,
    video_height_override: Option<u32>,
}

impl Pipeline {
    /// Build a pipeline from configuration and injected collaborators
    pub fn new(
        config: Config,
        engine: Arc<dyn SpeechEngine>,
        cache: Arc<dyn CacheStore>,
        prompt: Arc<dyn OperatorPrompt>,
    ) -> Result<Self> {
        config.validate()?;

        let client = TranslationClient::from_config(&config.translation, cache.clone())?;
        let transcript_source =
            TranscriptSource::new(engine, cache, config.source_language.clone());
        let common = &config.translation.common;
        let validator = QualityValidator::new(common.quality_threshold, common.quality_retries);
        let merger = ResumeMerger::new(common.resume_tolerance_ms);

        Ok(Self {
            config,
            transcript_source,
            client,
            validator,
            merger,
            prompt,
            encoder: None,
            video_height_override: None,
        })
    }

    /// Attach the external video encoder; rendering hands off to it
    pub fn with_encoder(mut self, encoder: Arc<dyn VideoEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Replace the translation client (tests inject mock provider chains)
    pub fn with_client(mut self, client: TranslationClient) -> Self {
        self.client = client;
        self
    }

    /// Skip height probing and render for the given vertical resolution
    pub fn with_video_height(mut self, height: u32) -> Self {
        self.video_height_override = Some(height);
        self
    }

    /// Process one video through every configured target language
    pub async fn run(&self, video_path: &Path) -> Result<PipelineReport> {
        info!("Processing video: {}", video_path.display());

        let mut report = PipelineReport {
            video_path: video_path.to_path_buf(),
            outcomes: Vec::new(),
            styled_track_path: None,
            encoded_output_path: None,
        };

        // Transcription is shared by all target languages; its failure is
        // fatal for the whole video.
        let raw_segments = self
            .transcript_source
            .transcribe(video_path, self.config.model_size.identifier(), self.config.force)
            .await
            .context("Transcription failed")?;

        let source_segments = subtitle_processor::split_long_segments(&raw_segments, MAX_LINE_CHARS);
        info!(
            "Transcript ready: {} segments ({} after resegmentation)",
            raw_segments.len(),
            source_segments.len()
        );

        let source_srt = FileManager::subtitle_path(video_path, &self.config.source_language);
        subtitle_processor::write_srt_file(&source_srt, &source_segments, TrackText::Source)?;

        let mut engine_down = false;
        for (position, language) in self.config.target_languages.iter().enumerate() {
            if engine_down {
                break;
            }
            if language == &self.config.source_language {
                warn!("Target language {} equals the source, skipping", language);
                continue;
            }

            let outcome = self
                .process_language(video_path, language, position, &source_segments)
                .await;

            // An unreachable provider chain terminates the whole video
            engine_down = outcome.state == StageState::Failed;
            report.outcomes.push(outcome);
        }

        self.render_and_encode(video_path, &mut report).await?;

        for outcome in &report.outcomes {
            info!("{} -> {}", outcome.language, outcome.state);
        }
        Ok(report)
    }

    /// Drive one target language through the state machine
    async fn process_language(
        &self,
        video_path: &Path,
        language: &str,
        position: usize,
        source_segments: &[Segment],
    ) -> LanguageOutcome {
        let mut state = StageState::Pending;
        let mut verdicts = Vec::new();
        let subtitle_path = FileManager::subtitle_path(video_path, language);

        // Resume re-entry: Pending with a pre-populated partial result
        let prior = self.load_prior_track(video_path, language, position);
        let mut segments: Vec<Segment> = source_segments.to_vec();
        if let Some(prior) = prior {
            segments = self.merger.merge(&prior, segments);
        }

        advance(&mut state, StageState::Transcribed, language);

        let untranslated: Vec<Segment> = segments
            .iter()
            .filter(|s| s.translated_text.is_none())
            .cloned()
            .collect();
        let batches = make_batches(&untranslated, self.config.chain_batch_size(), language);
        advance(&mut state, StageState::Batched, language);

        info!(
            "{}: {} segments to translate in {} batches ({} carried over)",
            language,
            untranslated.len(),
            batches.len(),
            segments.len() - untranslated.len()
        );

        advance(&mut state, StageState::Translating, language);
        let mut fresh_translations: HashMap<usize, String> = HashMap::new();

        for batch in batches {
            let translated = match self.client.translate_batch(&batch, self.config.force).await {
                Ok(batch) => batch,
                Err(PipelineError::EngineUnavailable(reason)) => {
                    error!("{}: translation chain unreachable: {}", language, reason);
                    state = StageState::Failed;
                    return LanguageOutcome {
                        language: language.to_string(),
                        state,
                        subtitle_path: None,
                        verdicts,
                        segments,
                    };
                }
                Err(e) => {
                    error!("{}: batch {} failed: {}", language, batch.batch_index, e);
                    state = StageState::Failed;
                    return LanguageOutcome {
                        language: language.to_string(),
                        state,
                        subtitle_path: None,
                        verdicts,
                        segments,
                    };
                }
            };

            let (accepted_batch, verdict) = match self
                .validator
                .validate(translated, &self.client, self.prompt.as_ref())
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    error!("{}: validation retry failed: {}", language, e);
                    state = StageState::Failed;
                    return LanguageOutcome {
                        language: language.to_string(),
                        state,
                        subtitle_path: None,
                        verdicts,
                        segments,
                    };
                }
            };

            let accepted = verdict.accepted;
            verdicts.push(verdict);

            if !accepted {
                // Binding decision: this language never reaches the
                // renderer or the encoder
                state = StageState::AbortedByUser;
                return LanguageOutcome {
                    language: language.to_string(),
                    state,
                    subtitle_path: None,
                    verdicts,
                    segments,
                };
            }

            for segment in accepted_batch.segments {
                if let Some(text) = segment.translated_text {
                    fresh_translations.insert(segment.index, text);
                }
            }
        }

        for segment in segments.iter_mut() {
            if let Some(text) = fresh_translations.remove(&segment.index) {
                segment.translated_text = Some(text);
            }
        }

        advance(&mut state, StageState::Validated, language);

        if let Err(e) =
            subtitle_processor::write_srt_file(&subtitle_path, &segments, TrackText::Translation)
        {
            error!("{}: failed to write subtitle file: {}", language, e);
        }

        LanguageOutcome {
            language: language.to_string(),
            state,
            subtitle_path: Some(subtitle_path),
            verdicts,
            segments,
        }
    }

    /// Recover a prior run's translations for resume.
    ///
    /// The per-language SRT is the primary source; the styled track serves
    /// as fallback when only the ASS artifact survived.
    fn load_prior_track(
        &self,
        video_path: &Path,
        language: &str,
        position: usize,
    ) -> Option<Vec<PriorCue>> {
        if self.config.force {
            return None;
        }

        // Without the resume flag an existing track is still merged in; the
        // translation cache is only the second line of defense against
        // re-paying for finished work.
        let srt_path = FileManager::subtitle_path(video_path, language);
        if FileManager::file_exists(&srt_path) {
            match subtitle_processor::read_srt_file(&srt_path) {
                Ok(track) => {
                    info!("{}: resuming from {}", language, srt_path.display());
                    return Some(PriorCue::from_segments(&track));
                }
                Err(e) => warn!("{}: unreadable prior track: {}", language, e),
            }
        }

        if self.config.resume && position < 2 {
            let ass_path =
                FileManager::styled_track_path(video_path, &self.config.target_languages);
            if FileManager::file_exists(&ass_path) {
                let style = if position == 0 { PRIMARY_STYLE } else { SECONDARY_STYLE };
                if let Ok(content) = std::fs::read_to_string(&ass_path) {
                    let cues = resume::parse_ass_track(&content, Some(style));
                    if !cues.is_empty() {
                        info!("{}: resuming from styled track {}", language, ass_path.display());
                        return Some(cues);
                    }
                }
            }
        }

        None
    }

    /// Render every validated language and hand the track to the encoder.
    /// Rendering is gated on validation: declined or failed languages never
    /// reach this point.
    async fn render_and_encode(&self, video_path: &Path, report: &mut PipelineReport) -> Result<()> {
        let validated: Vec<usize> = report
            .outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| o.state == StageState::Validated)
            .map(|(i, _)| i)
            .collect();

        if validated.is_empty() {
            debug!("No validated language, skipping render");
            return Ok(());
        }

        let video_height = match self.video_height_override {
            Some(height) => height,
            None => match encode::probe_video_height(video_path).await {
                Ok(height) => height,
                Err(e) => {
                    warn!("Height probe failed ({}), assuming 1080", e);
                    1080
                }
            },
        };

        let segments_by_language: Vec<(String, Vec<Segment>)> = validated
            .iter()
            .map(|&i| {
                let outcome = &report.outcomes[i];
                (outcome.language.clone(), outcome.segments.clone())
            })
            .collect();

        let languages: Vec<String> = segments_by_language
            .iter()
            .map(|(lang, _)| lang.clone())
            .collect();

        let track = render::render(&segments_by_language, &self.config.style, video_height)?;
        let track_path = FileManager::styled_track_path(video_path, &languages);
        track.write_to_file(&track_path)?;
        report.styled_track_path = Some(track_path.clone());

        for &i in &validated {
            advance_to_rendered(&mut report.outcomes[i]);
        }
        info!(
            "Styled track written: {} ({} cues)",
            track_path.display(),
            track.cues.len()
        );

        if let Some(encoder) = &self.encoder {
            let output_path = FileManager::subtitled_output_path(video_path, &languages);
            let job = EncodeJob {
                video_path: video_path.to_path_buf(),
                styled_track_path: track_path,
                output_path: output_path.clone(),
                target_bitrate: encode::bitrate_for_height(video_height).to_string(),
                encoder_family: EncoderFamily::H264,
            };

            match encoder.burn_in(&job).await {
                Ok(()) => {
                    info!("Encoded: {}", output_path.display());
                    report.encoded_output_path = Some(output_path);
                }
                Err(e) => error!("Video encoder failed: {}", e),
            }
        }

        Ok(())
    }
}

// Forward-only transition helper; regressions are bugs
fn advance(state: &mut StageState, next: StageState, language: &str) {
    debug_assert!(next > *state, "state machine must move forward");
    debug!("{}: {} -> {}", language, state, next);
    *state = next;
}

fn advance_to_rendered(outcome: &mut LanguageOutcome) {
    let mut state = outcome.state;
    advance(&mut state, StageState::Rendered, &outcome.language);
    outcome.state = state;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stageState_ordering_shouldBeStrictlyForward() {
        assert!(StageState::Pending < StageState::Transcribed);
        assert!(StageState::Transcribed < StageState::Batched);
        assert!(StageState::Batched < StageState::Translating);
        assert!(StageState::Translating < StageState::Validated);
        assert!(StageState::Validated < StageState::Rendered);
    }

    #[test]
    fn test_stageState_display_shouldMatchProtocolNames() {
        assert_eq!(StageState::AbortedByUser.to_string(), "ABORTED_BY_USER");
        assert_eq!(StageState::Rendered.to_string(), "RENDERED");
    }
}
