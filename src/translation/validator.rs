/*!
 * Quality validation of translated batches.
 *
 * Two complementary line checks depending on the target script: non-Latin
 * targets must show at least one code point of their own script, Latin
 * targets must differ from the source (a no-op "translation" is worthless).
 * Lines carrying a parenthesized technical term must keep it verbatim.
 *
 * Below-threshold batches get a bounded retry budget; after that the
 * decision goes to the injected operator strategy, and declining is final
 * for the batch.
 */

use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::PipelineError;
use crate::languages::{self, LanguageProfile};
use crate::translation::batch::Batch;
use crate::translation::client::TranslationClient;

// Parenthesized Latin-script token marking a technical term
static TECH_TERM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([A-Za-z][A-Za-z0-9 .+_/-]*)\)").unwrap());

/// Terminal judgement on one batch
#[derive(Debug, Clone)]
pub struct ValidationVerdict {
    /// Index of the judged batch
    pub batch_index: usize,

    /// Target language of the batch
    pub target_language: String,

    /// Valid lines over total lines
    pub valid_fraction: f64,

    /// Whether the batch may proceed to rendering
    pub accepted: bool,

    /// Retries spent before the verdict became terminal
    pub retries_used: u32,
}

/// Strategy deciding what happens when a batch exhausts its retry budget.
///
/// The interactive implementation blocks on the operator; tests inject a
/// deterministic answer.
pub trait OperatorPrompt: Send + Sync {
    /// Return true to accept the below-threshold batch anyway
    fn confirm_low_quality(&self, verdict: &ValidationVerdict) -> bool;
}

/// Prompt that accepts everything, for non-interactive runs and tests
pub struct AcceptAll;

impl OperatorPrompt for AcceptAll {
    fn confirm_low_quality(&self, _verdict: &ValidationVerdict) -> bool {
        true
    }
}

/// Prompt that declines everything, for tests
pub struct DeclineAll;

impl OperatorPrompt for DeclineAll {
    fn confirm_low_quality(&self, _verdict: &ValidationVerdict) -> bool {
        false
    }
}

/// Validator driving the completeness/script checks and the retry protocol
pub struct QualityValidator {
    /// Fraction of valid lines required for automatic acceptance
    threshold: f64,

    /// Bounded retry budget for below-threshold batches
    max_retries: u32,
}

impl Default for QualityValidator {
    fn default() -> Self {
        Self::new(0.8, 3)
    }
}

impl QualityValidator {
    /// Create a validator with the given threshold and retry budget
    pub fn new(threshold: f64, max_retries: u32) -> Self {
        Self {
            threshold,
            max_retries,
        }
    }

    /// Fraction of lines in the batch that pass validation
    pub fn assess(&self, batch: &Batch) -> f64 {
        if batch.is_empty() {
            return 1.0;
        }

        let profile = match languages::resolve(&batch.target_language) {
            Ok(profile) => profile,
            Err(_) => return 0.0,
        };

        let valid = batch
            .segments
            .iter()
            .filter(|s| line_is_valid(&s.source_text, s.translated_text.as_deref(), &profile))
            .count();

        valid as f64 / batch.len() as f64
    }

    /// Judge a batch, retrying through the translation client while below
    /// threshold, then deferring to the operator strategy.
    ///
    /// Retries bypass the cache - resubmitting the cached bad result would
    /// spin without progress. The returned batch is the best attempt seen.
    pub async fn validate(
        &self,
        batch: Batch,
        client: &TranslationClient,
        prompt: &dyn OperatorPrompt,
    ) -> Result<(Batch, ValidationVerdict), PipelineError> {
        let mut best = batch;
        let mut best_fraction = self.assess(&best);
        let mut retries_used = 0;

        while best_fraction < self.threshold && retries_used < self.max_retries {
            retries_used += 1;
            warn!(
                "Batch {} below quality threshold ({:.2} < {:.2}), retry {}/{}",
                best.batch_index, best_fraction, self.threshold, retries_used, self.max_retries
            );

            let attempt = client.translate_batch(&best, true).await?;
            let fraction = self.assess(&attempt);
            if fraction > best_fraction {
                best = attempt;
                best_fraction = fraction;
            }
        }

        let mut verdict = ValidationVerdict {
            batch_index: best.batch_index,
            target_language: best.target_language.clone(),
            valid_fraction: best_fraction,
            accepted: best_fraction >= self.threshold,
            retries_used,
        };

        if verdict.accepted {
            info!(
                "Batch {} accepted ({:.0}% valid, {} retries)",
                verdict.batch_index,
                verdict.valid_fraction * 100.0,
                verdict.retries_used
            );
        } else {
            // The operator's answer is binding and final for this batch
            verdict.accepted = prompt.confirm_low_quality(&verdict);
            if verdict.accepted {
                warn!(
                    "Batch {} accepted by operator at {:.0}% valid",
                    verdict.batch_index,
                    verdict.valid_fraction * 100.0
                );
            } else {
                warn!("Batch {} declined by operator", verdict.batch_index);
            }
        }

        Ok((best, verdict))
    }
}

/// Parenthesized Latin technical terms found in a source line
pub fn technical_terms(source: &str) -> Vec<String> {
    TECH_TERM
        .captures_iter(source)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

fn line_is_valid(source: &str, translated: Option<&str>, profile: &LanguageProfile) -> bool {
    let Some(translated) = translated else {
        return false;
    };
    if translated.trim().is_empty() {
        return false;
    }

    let script_ok = if profile.has_script_ranges() {
        profile.contains_script_char(translated)
    } else {
        translated.trim() != source.trim()
    };
    if !script_ok {
        return false;
    }

    // Technical terms must survive verbatim, in parentheses
    technical_terms(source)
        .iter()
        .all(|term| translated.contains(&format!("({})", term)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_store::MemoryCacheStore;
    use crate::providers::mock::MockTranslator;
    use crate::providers::BatchTranslator;
    use crate::subtitle_processor::Segment;
    use crate::translation::batch::make_batches;
    use std::sync::Arc;

    fn batch_with_translations(total: usize, valid: usize, target: &str) -> Batch {
        let segments: Vec<Segment> = (0..total)
            .map(|i| Segment::new(i, i as u64 * 1000, i as u64 * 1000 + 900, format!("line {}", i)))
            .collect();
        let mut batch = make_batches(&segments, 40, target).remove(0);
        for (i, segment) in batch.segments.iter_mut().enumerate() {
            segment.translated_text = if i < valid {
                Some(format!("ترجمه {}", i))
            } else {
                Some(format!("line {}", i))
            };
        }
        batch
    }

    #[test]
    fn test_assess_withEightOfTenValid_shouldMeetThreshold() {
        let validator = QualityValidator::default();
        let fraction = validator.assess(&batch_with_translations(10, 8, "fa"));
        assert!((fraction - 0.8).abs() < f64::EPSILON);
        assert!(fraction >= 0.8);
    }

    #[test]
    fn test_assess_withSevenOfTenValid_shouldMissThreshold() {
        let validator = QualityValidator::default();
        let fraction = validator.assess(&batch_with_translations(10, 7, "fa"));
        assert!(fraction < 0.8);
    }

    #[test]
    fn test_assess_latinTarget_shouldRequireDifferenceFromSource() {
        let segments = vec![Segment::new(0, 0, 1000, "bonjour le monde".to_string())];
        let mut batch = make_batches(&segments, 40, "fr").remove(0);

        batch.segments[0].translated_text = Some("bonjour le monde".to_string());
        let validator = QualityValidator::default();
        assert!(validator.assess(&batch) < 1.0);

        batch.segments[0].translated_text = Some("hello world".to_string());
        assert!((validator.assess(&batch) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_assess_withMissingTechnicalTerm_shouldInvalidateLine() {
        let segments = vec![Segment::new(0, 0, 1000, "We use the (Kalman filter) here".to_string())];
        let mut batch = make_batches(&segments, 40, "fa").remove(0);

        batch.segments[0].translated_text = Some("اینجا از فیلتر استفاده می‌کنیم".to_string());
        let validator = QualityValidator::default();
        assert!(validator.assess(&batch) < 1.0);

        batch.segments[0].translated_text =
            Some("اینجا از (Kalman filter) استفاده می‌کنیم".to_string());
        assert!((validator.assess(&batch) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_technicalTerms_shouldExtractLatinParenthesizedTokens() {
        let terms = technical_terms("این (API) و (machine learning) است ولی (نه این)");
        assert_eq!(terms, vec!["API".to_string(), "machine learning".to_string()]);
    }

    #[tokio::test]
    async fn test_validate_withGoodBatch_shouldAcceptWithoutRetries() {
        let cache = Arc::new(MemoryCacheStore::new());
        let providers: Vec<Arc<dyn BatchTranslator>> = vec![Arc::new(MockTranslator::echo("ترجمه"))];
        let client = TranslationClient::new(providers, cache);
        let validator = QualityValidator::default();

        let (batch, verdict) = validator
            .validate(batch_with_translations(10, 10, "fa"), &client, &DeclineAll)
            .await
            .unwrap();

        assert!(verdict.accepted);
        assert_eq!(verdict.retries_used, 0);
        assert!(batch.is_translated());
    }

    #[tokio::test]
    async fn test_validate_withUnimprovingProvider_shouldExhaustRetriesAndRespectDecline() {
        // Echo with a Latin prefix never contains Persian script, so every
        // retry stays invalid for a Persian target
        let provider = MockTranslator::echo("still english");
        let counter = provider.clone();
        let cache = Arc::new(MemoryCacheStore::new());
        let providers: Vec<Arc<dyn BatchTranslator>> = vec![Arc::new(provider)];
        let client = TranslationClient::new(providers, cache);
        let validator = QualityValidator::default();

        let (_batch, verdict) = validator
            .validate(batch_with_translations(10, 0, "fa"), &client, &DeclineAll)
            .await
            .unwrap();

        assert!(!verdict.accepted);
        assert_eq!(verdict.retries_used, 3);
        assert_eq!(counter.requests_served(), 3);
    }

    #[tokio::test]
    async fn test_validate_withOperatorAcceptance_shouldAcceptDespiteLowFraction() {
        let cache = Arc::new(MemoryCacheStore::new());
        let providers: Vec<Arc<dyn BatchTranslator>> =
            vec![Arc::new(MockTranslator::echo("still english"))];
        let client = TranslationClient::new(providers, cache);
        let validator = QualityValidator::default();

        let (_batch, verdict) = validator
            .validate(batch_with_translations(4, 0, "fa"), &client, &AcceptAll)
            .await
            .unwrap();

        assert!(verdict.accepted);
        assert_eq!(verdict.retries_used, 3);
    }

    #[tokio::test]
    async fn test_validate_withImprovingRetry_shouldAcceptAfterRetry() {
        // First reply is unusable (empty), the validator's retry then gets
        // a good Persian reply through the second provider
        let cache = Arc::new(MemoryCacheStore::new());
        let providers: Vec<Arc<dyn BatchTranslator>> = vec![
            Arc::new(MockTranslator::new(
                "flaky",
                crate::providers::mock::MockBehavior::Intermittent { fail_every: 1 },
            )),
            Arc::new(MockTranslator::echo("ترجمه").with_id("good")),
        ];
        let client = TranslationClient::new(providers, cache);
        let validator = QualityValidator::default();

        let (batch, verdict) = validator
            .validate(batch_with_translations(5, 0, "fa"), &client, &DeclineAll)
            .await
            .unwrap();

        assert!(verdict.accepted);
        assert!(verdict.retries_used >= 1);
        assert!(batch.is_translated());
    }
}
