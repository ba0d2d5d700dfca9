/*!
 * Common test utilities for the polysub test suite
 */

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use anyhow::Result;
use tempfile::TempDir;

use polysub::app_config::{Config, ProviderConfig};
use polysub::subtitle_processor::Segment;

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a dummy video file the transcript source can hash
pub fn create_test_video(dir: &TempDir, name: &str) -> Result<PathBuf> {
    let path = dir.path().join(name);
    let mut file = File::create(&path)?;
    file.write_all(b"not really a video, but stable bytes to hash")?;
    Ok(path)
}

/// A valid configuration over a local-only provider chain
pub fn test_config(targets: &[&str]) -> Config {
    let mut config = Config::default();
    config.target_languages = targets.iter().map(|t| t.to_string()).collect();
    // Ollama needs no API key, so the config validates in tests; the
    // actual chain is replaced with mocks via Pipeline::with_client
    config.translation.providers = vec![ProviderConfig::new("ollama")];
    config
}

/// Three short source segments with well-spaced timing
pub fn three_segments() -> Vec<Segment> {
    vec![
        Segment::new(0, 1_000, 3_000, "Hello and welcome back".to_string()),
        Segment::new(1, 4_000, 6_500, "Today we talk about subtitles".to_string()),
        Segment::new(2, 7_000, 9_000, "Thanks for watching".to_string()),
    ]
}
