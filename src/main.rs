// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

use polysub::app_config::{Alignment, Config, LogLevel, ModelSize};
use polysub::cache_store::FsCacheStore;
use polysub::encode::FfmpegEncoder;
use polysub::file_utils::FileManager;
use polysub::pipeline::{Pipeline, StageState};
use polysub::transcribe::WhisperCliEngine;
use polysub::translation::validator::{OperatorPrompt, ValidationVerdict};

/// CLI wrapper for ModelSize to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl From<CliModelSize> for ModelSize {
    fn from(value: CliModelSize) -> Self {
        match value {
            CliModelSize::Tiny => ModelSize::Tiny,
            CliModelSize::Base => ModelSize::Base,
            CliModelSize::Small => ModelSize::Small,
            CliModelSize::Medium => ModelSize::Medium,
            CliModelSize::Large => ModelSize::Large,
        }
    }
}

/// CLI wrapper for Alignment to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliAlignment {
    Left,
    Center,
    Right,
}

impl From<CliAlignment> for Alignment {
    fn from(value: CliAlignment) -> Self {
        match value {
            CliAlignment::Left => Alignment::Left,
            CliAlignment::Center => Alignment::Center,
            CliAlignment::Right => Alignment::Right,
        }
    }
}

/// CLI wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// polysub - multilingual subtitle generation
///
/// Transcribes a video, translates the transcript into one or more target
/// languages through AI providers, validates the result, and renders a
/// styled subtitle track ready for burn-in.
#[derive(Parser, Debug)]
#[command(name = "polysub")]
#[command(version)]
#[command(about = "AI-powered multilingual subtitle generation")]
#[command(long_about = "polysub transcribes videos and translates the transcript using AI providers.

EXAMPLES:
    polysub video.mp4                        # English source, Persian target
    polysub -s en -t fa -t ar video.mp4      # Two target languages
    polysub -r video.mp4                     # Also burn subtitles into the video
    polysub --resume video.mp4               # Carry over a prior partial run
    polysub -f --model-size large video.mp4  # Force fresh transcription

CONFIGURATION:
    Settings are read from conf.json by default (see --config). Command line
    flags override the file.")]
struct CommandLineOptions {
    /// Input video file or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Source language code (e.g. 'en')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code, repeatable; the first is the primary language
    #[arg(short, long = "target-language")]
    target_language: Vec<String>,

    /// Speech-to-text model size
    #[arg(short, long, value_enum)]
    model_size: Option<CliModelSize>,

    /// Force re-transcription and re-translation
    #[arg(short, long)]
    force: bool,

    /// Resume from previously written partial output
    #[arg(long)]
    resume: bool,

    /// Burn the styled track into the video after rendering
    #[arg(short, long)]
    render: bool,

    /// Cue alignment override
    #[arg(long, value_enum)]
    alignment: Option<CliAlignment>,

    /// Base font size override (at 1080p)
    #[arg(long)]
    font_size: Option<f32>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger { level });
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let now = chrono::Local::now().format("%H:%M:%S%.3f");
        let mut stderr = std::io::stderr();
        let _ = match record.level() {
            Level::Error => writeln!(stderr, "\x1B[1;31m{} {}\x1B[0m", now, record.args()),
            Level::Warn => writeln!(stderr, "\x1B[1;33m{} {}\x1B[0m", now, record.args()),
            Level::Info => writeln!(stderr, "{} {}", now, record.args()),
            _ => writeln!(stderr, "\x1B[2m{} {}\x1B[0m", now, record.args()),
        };
    }

    fn flush(&self) {}
}

/// Interactive prompt blocking on the operator's decision
struct ConsolePrompt;

impl OperatorPrompt for ConsolePrompt {
    fn confirm_low_quality(&self, verdict: &ValidationVerdict) -> bool {
        eprintln!(
            "Batch {} ({}) is only {:.0}% valid after {} retries.",
            verdict.batch_index,
            verdict.target_language,
            verdict.valid_fraction * 100.0,
            verdict.retries_used
        );
        eprint!("Accept it anyway? [y/N] ");
        let _ = std::io::stderr().flush();

        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

fn load_config(options: &CommandLineOptions) -> Result<Config> {
    let mut config = if std::path::Path::new(&options.config_path).exists() {
        let content = std::fs::read_to_string(&options.config_path)
            .with_context(|| format!("Failed to read config: {}", options.config_path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", options.config_path))?
    } else {
        Config::default()
    };

    if let Some(source) = &options.source_language {
        config.source_language = source.clone();
    }
    if !options.target_language.is_empty() {
        config.target_languages = options.target_language.clone();
    }
    if let Some(size) = options.model_size.clone() {
        config.model_size = size.into();
    }
    if let Some(alignment) = options.alignment.clone() {
        config.style.alignment = alignment.into();
    }
    if let Some(font_size) = options.font_size {
        config.style.font_size_override = Some(font_size);
    }
    config.force |= options.force;
    config.resume |= options.resume;
    if let Some(level) = &options.log_level {
        config.log_level = match level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        };
    }

    Ok(config)
}

fn level_filter(level: &LogLevel) -> LevelFilter {
    match level {
        LogLevel::Error => LevelFilter::Error,
        LogLevel::Warn => LevelFilter::Warn,
        LogLevel::Info => LevelFilter::Info,
        LogLevel::Debug => LevelFilter::Debug,
        LogLevel::Trace => LevelFilter::Trace,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let options = CommandLineOptions::parse();
    let config = load_config(&options)?;

    CustomLogger::init(level_filter(&config.log_level))
        .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;

    config.validate()?;

    let videos = if options.input_path.is_dir() {
        let found = FileManager::find_video_files(&options.input_path)?;
        if found.is_empty() {
            return Err(anyhow!("No video files found in {}", options.input_path.display()));
        }
        found
    } else if FileManager::file_exists(&options.input_path) {
        vec![options.input_path.clone()]
    } else {
        return Err(anyhow!("Input not found: {}", options.input_path.display()));
    };

    let cache = Arc::new(match &config.cache_dir {
        Some(dir) => FsCacheStore::new(dir.clone()),
        None => FsCacheStore::default_location(),
    });
    let engine = Arc::new(WhisperCliEngine::default());

    let mut pipeline = Pipeline::new(config, engine, cache, Arc::new(ConsolePrompt))?;
    if options.render {
        pipeline = pipeline.with_encoder(Arc::new(FfmpegEncoder::default()));
    }

    let progress = if videos.len() > 1 {
        let bar = ProgressBar::new(videos.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Some(bar)
    } else {
        None
    };

    let mut failures = 0;
    for video in &videos {
        if let Some(bar) = &progress {
            bar.set_message(
                video.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
            );
        }

        match pipeline.run(video).await {
            Ok(report) => {
                for outcome in &report.outcomes {
                    match outcome.state {
                        StageState::Rendered | StageState::Validated => info!(
                            "{}: {} -> {}",
                            video.display(),
                            outcome.language,
                            outcome.state
                        ),
                        state => {
                            warn!("{}: {} -> {}", video.display(), outcome.language, state);
                            failures += 1;
                        }
                    }
                }
            }
            Err(e) => {
                error!("{}: {}", video.display(), e);
                failures += 1;
            }
        }

        if let Some(bar) = &progress {
            bar.inc(1);
        }
    }
    if let Some(bar) = &progress {
        bar.finish_and_clear();
    }

    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}
