/*!
 * Resume workflow scenarios.
 *
 * A prior, partially translated track is reconciled against freshly
 * transcribed segments by timing proximity; only the segments without a
 * close prior neighbor go back through translation.
 */

use std::sync::Arc;

use polysub::cache_store::MemoryCacheStore;
use polysub::file_utils::FileManager;
use polysub::pipeline::{Pipeline, StageState};
use polysub::providers::mock::MockTranslator;
use polysub::subtitle_processor::{read_srt_file, write_srt_file, Segment, TrackText};
use polysub::transcribe::StaticSpeechEngine;
use polysub::translation::validator::DeclineAll;
use polysub::translation::TranslationClient;

use crate::common;

/// Fresh transcription: two segments match the prior run within tolerance,
/// the third is new material
fn shifted_segments() -> Vec<Segment> {
    vec![
        Segment::new(0, 10_050, 11_950, "first line".to_string()),
        Segment::new(1, 20_020, 22_000, "second line".to_string()),
        Segment::new(2, 50_000, 52_000, "brand new material".to_string()),
    ]
}

/// Write the prior run's partial Persian track next to the video
fn write_prior_track(video: &std::path::Path) {
    let prior = vec![
        Segment::new(0, 10_000, 12_000, "ترجمه اول".to_string()),
        Segment::new(1, 20_000, 22_000, "ترجمه دوم".to_string()),
    ];
    let path = FileManager::subtitle_path(video, "fa");
    write_srt_file(&path, &prior, TrackText::Source).unwrap();
}

#[tokio::test]
async fn test_resume_shouldCarryPriorTranslationsAndTranslateOnlyTheRest() {
    let dir = common::create_temp_dir().unwrap();
    let video = common::create_test_video(&dir, "clip.mp4").unwrap();
    write_prior_track(&video);

    let cache = Arc::new(MemoryCacheStore::new());
    let engine = Arc::new(StaticSpeechEngine::new(shifted_segments()));
    let provider = MockTranslator::echo("ترجمه تازه");
    let counter = provider.clone();
    let client = TranslationClient::new(vec![Arc::new(provider)], cache.clone());

    let mut config = common::test_config(&["fa"]);
    config.resume = true;

    let pipeline = Pipeline::new(config, engine, cache, Arc::new(DeclineAll))
        .unwrap()
        .with_client(client)
        .with_video_height(1080);

    let report = pipeline.run(&video).await.unwrap();
    assert_eq!(report.state_of("fa"), Some(StageState::Rendered));

    // One batch with exactly the one unmatched segment went out
    assert_eq!(counter.requests_served(), 1);

    let track = read_srt_file(FileManager::subtitle_path(&video, "fa")).unwrap();
    assert_eq!(track.len(), 3);
    assert_eq!(track[0].source_text, "ترجمه اول");
    assert_eq!(track[1].source_text, "ترجمه دوم");
    assert!(track[2].source_text.contains("ترجمه تازه"));
}

#[tokio::test]
async fn test_resume_withForce_shouldIgnorePriorTrack() {
    let dir = common::create_temp_dir().unwrap();
    let video = common::create_test_video(&dir, "clip.mp4").unwrap();
    write_prior_track(&video);

    let cache = Arc::new(MemoryCacheStore::new());
    let engine = Arc::new(StaticSpeechEngine::new(shifted_segments()));
    let provider = MockTranslator::echo("ترجمه تازه");
    let counter = provider.clone();
    let client = TranslationClient::new(vec![Arc::new(provider)], cache.clone());

    let mut config = common::test_config(&["fa"]);
    config.resume = true;
    config.force = true;

    let pipeline = Pipeline::new(config, engine, cache, Arc::new(DeclineAll))
        .unwrap()
        .with_client(client)
        .with_video_height(1080);

    let report = pipeline.run(&video).await.unwrap();
    assert_eq!(report.state_of("fa"), Some(StageState::Rendered));

    // Everything re-translated, nothing carried over
    assert_eq!(counter.requests_served(), 1);
    let track = read_srt_file(FileManager::subtitle_path(&video, "fa")).unwrap();
    assert!(track.iter().all(|s| s.source_text.contains("ترجمه تازه")));
}

#[tokio::test]
async fn test_resume_withDistantPriorCues_shouldLeaveFreshUntranslatedForProvider() {
    let dir = common::create_temp_dir().unwrap();
    let video = common::create_test_video(&dir, "clip.mp4").unwrap();

    // Prior cue far from every fresh segment
    let prior = vec![Segment::new(0, 90_000, 92_000, "ترجمه دور".to_string())];
    write_srt_file(
        FileManager::subtitle_path(&video, "fa"),
        &prior,
        TrackText::Source,
    )
    .unwrap();

    let cache = Arc::new(MemoryCacheStore::new());
    let engine = Arc::new(StaticSpeechEngine::new(shifted_segments()));
    let provider = MockTranslator::echo("ترجمه تازه");
    let counter = provider.clone();
    let client = TranslationClient::new(vec![Arc::new(provider)], cache.clone());

    let mut config = common::test_config(&["fa"]);
    config.resume = true;

    let pipeline = Pipeline::new(config, engine, cache, Arc::new(DeclineAll))
        .unwrap()
        .with_client(client)
        .with_video_height(1080);

    let report = pipeline.run(&video).await.unwrap();
    assert_eq!(report.state_of("fa"), Some(StageState::Rendered));
    assert_eq!(counter.requests_served(), 1);

    let track = read_srt_file(FileManager::subtitle_path(&video, "fa")).unwrap();
    assert!(track.iter().all(|s| s.source_text.contains("ترجمه تازه")));
}
