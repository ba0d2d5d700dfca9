/*!
 * End-to-end pipeline scenarios with mock collaborators.
 *
 * The speech engine, cache store, provider chain and operator prompt are
 * all injected, so these tests exercise the full orchestration path
 * without any external process or network call.
 */

use std::sync::Arc;

use polysub::cache_store::MemoryCacheStore;
use polysub::file_utils::FileManager;
use polysub::pipeline::{Pipeline, StageState};
use polysub::providers::mock::MockTranslator;
use polysub::providers::BatchTranslator;
use polysub::render::PRIMARY_STYLE;
use polysub::resume::parse_ass_track;
use polysub::transcribe::StaticSpeechEngine;
use polysub::translation::validator::{AcceptAll, DeclineAll};
use polysub::translation::TranslationClient;

use crate::common;

fn mock_client(
    cache: Arc<MemoryCacheStore>,
    providers: Vec<Arc<dyn BatchTranslator>>,
) -> TranslationClient {
    TranslationClient::new(providers, cache)
}

#[tokio::test]
async fn test_pipeline_withValidTranslations_shouldReachRendered() {
    let dir = common::create_temp_dir().unwrap();
    let video = common::create_test_video(&dir, "clip.mp4").unwrap();

    let cache = Arc::new(MemoryCacheStore::new());
    let engine = Arc::new(StaticSpeechEngine::new(common::three_segments()));
    let client = mock_client(cache.clone(), vec![Arc::new(MockTranslator::echo("ترجمه"))]);

    let pipeline = Pipeline::new(common::test_config(&["fa"]), engine, cache, Arc::new(DeclineAll))
        .unwrap()
        .with_client(client)
        .with_video_height(720);

    let report = pipeline.run(&video).await.unwrap();

    assert_eq!(report.state_of("fa"), Some(StageState::Rendered));

    // The plain interchange artifacts exist for source and target
    assert!(FileManager::subtitle_path(&video, "en").is_file());
    assert!(FileManager::subtitle_path(&video, "fa").is_file());

    // The styled track carries one cue per segment, scaled for 720p
    let track_path = report.styled_track_path.expect("styled track written");
    let content = std::fs::read_to_string(&track_path).unwrap();
    assert!(content.contains("PlayResY: 720"));
    // Persian base size 30 at 720/1080 scale
    assert!(content.contains("Style: Primary,B Nazanin,20,"));

    let cues = parse_ass_track(&content, Some(PRIMARY_STYLE));
    assert_eq!(cues.len(), 3);
    assert!(cues.iter().all(|c| c.text.contains("ترجمه")));
}

#[tokio::test]
async fn test_pipeline_withOperatorDecline_shouldAbortAndNeverRender() {
    let dir = common::create_temp_dir().unwrap();
    let video = common::create_test_video(&dir, "clip.mp4").unwrap();

    let cache = Arc::new(MemoryCacheStore::new());
    let engine = Arc::new(StaticSpeechEngine::new(common::three_segments()));
    // English-only replies never contain Persian script, so the batch
    // stays below threshold through every retry
    let provider = MockTranslator::echo("still english");
    let counter = provider.clone();
    let client = mock_client(cache.clone(), vec![Arc::new(provider)]);

    let pipeline = Pipeline::new(common::test_config(&["fa"]), engine, cache, Arc::new(DeclineAll))
        .unwrap()
        .with_client(client)
        .with_video_height(1080);

    let report = pipeline.run(&video).await.unwrap();

    assert_eq!(report.state_of("fa"), Some(StageState::AbortedByUser));
    assert!(report.styled_track_path.is_none());
    assert!(report.encoded_output_path.is_none());

    // Initial attempt plus the bounded retry budget, nothing more
    assert_eq!(counter.requests_served(), 4);

    // The renderer never ran: no styled track on disk
    let ass_path = FileManager::styled_track_path(&video, &["fa".to_string()]);
    assert!(!ass_path.exists());
}

#[tokio::test]
async fn test_pipeline_withOperatorAcceptance_shouldProceedDespiteLowQuality() {
    let dir = common::create_temp_dir().unwrap();
    let video = common::create_test_video(&dir, "clip.mp4").unwrap();

    let cache = Arc::new(MemoryCacheStore::new());
    let engine = Arc::new(StaticSpeechEngine::new(common::three_segments()));
    let client = mock_client(
        cache.clone(),
        vec![Arc::new(MockTranslator::echo("still english"))],
    );

    let pipeline = Pipeline::new(common::test_config(&["fa"]), engine, cache, Arc::new(AcceptAll))
        .unwrap()
        .with_client(client)
        .with_video_height(1080);

    let report = pipeline.run(&video).await.unwrap();
    assert_eq!(report.state_of("fa"), Some(StageState::Rendered));

    let verdicts = &report.outcomes[0].verdicts;
    assert_eq!(verdicts.len(), 1);
    assert!(verdicts[0].accepted);
    assert_eq!(verdicts[0].retries_used, 3);
}

#[tokio::test]
async fn test_pipeline_bilingual_shouldStackBothLanguages() {
    let dir = common::create_temp_dir().unwrap();
    let video = common::create_test_video(&dir, "clip.mp4").unwrap();

    let cache = Arc::new(MemoryCacheStore::new());
    let engine = Arc::new(StaticSpeechEngine::new(common::three_segments()));
    // One chain serves both languages; Persian script satisfies the fa
    // check and differs from the English source for the fr check
    let client = mock_client(cache.clone(), vec![Arc::new(MockTranslator::echo("ترجمه"))]);

    let pipeline = Pipeline::new(
        common::test_config(&["fa", "fr"]),
        engine,
        cache,
        Arc::new(DeclineAll),
    )
    .unwrap()
    .with_client(client)
    .with_video_height(1080);

    let report = pipeline.run(&video).await.unwrap();

    assert_eq!(report.state_of("fa"), Some(StageState::Rendered));
    assert_eq!(report.state_of("fr"), Some(StageState::Rendered));

    let content = std::fs::read_to_string(report.styled_track_path.unwrap()).unwrap();
    assert!(content.contains("Style: Primary,"));
    assert!(content.contains("Style: Secondary,"));
    assert_eq!(parse_ass_track(&content, None).len(), 6);
}

#[tokio::test]
async fn test_pipeline_withUnreachableChain_shouldFail() {
    let dir = common::create_temp_dir().unwrap();
    let video = common::create_test_video(&dir, "clip.mp4").unwrap();

    let cache = Arc::new(MemoryCacheStore::new());
    let engine = Arc::new(StaticSpeechEngine::new(common::three_segments()));
    let client = mock_client(cache.clone(), vec![Arc::new(MockTranslator::failing())]);

    let pipeline = Pipeline::new(common::test_config(&["fa"]), engine, cache, Arc::new(AcceptAll))
        .unwrap()
        .with_client(client)
        .with_video_height(1080);

    let report = pipeline.run(&video).await.unwrap();
    assert_eq!(report.state_of("fa"), Some(StageState::Failed));
    assert!(report.styled_track_path.is_none());
}

#[tokio::test]
async fn test_pipeline_secondRun_shouldNotCallProvidersAgain() {
    let dir = common::create_temp_dir().unwrap();
    let video = common::create_test_video(&dir, "clip.mp4").unwrap();

    let cache = Arc::new(MemoryCacheStore::new());
    let engine = Arc::new(StaticSpeechEngine::new(common::three_segments()));
    let provider = MockTranslator::echo("ترجمه");
    let counter = provider.clone();
    let client = mock_client(cache.clone(), vec![Arc::new(provider)]);

    let pipeline = Pipeline::new(common::test_config(&["fa"]), engine.clone(), cache, Arc::new(DeclineAll))
        .unwrap()
        .with_client(client)
        .with_video_height(1080);

    let first = pipeline.run(&video).await.unwrap();
    assert_eq!(first.state_of("fa"), Some(StageState::Rendered));
    assert_eq!(counter.requests_served(), 1);
    assert_eq!(engine.calls(), 1);

    // Second run: transcript comes from cache, translations are carried
    // over from the existing track, nothing is re-paid
    let second = pipeline.run(&video).await.unwrap();
    assert_eq!(second.state_of("fa"), Some(StageState::Rendered));
    assert_eq!(counter.requests_served(), 1);
    assert_eq!(engine.calls(), 1);
}
