/*!
 * Translation client.
 *
 * Drives a batch through the ordered provider chain: cache probe first,
 * then each provider in turn until one yields a reply the parser can
 * recover enough lines from. Successful results are cached under the
 * winning provider's key so later runs keep preferring the same output.
 */

use std::sync::Arc;
use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::app_config::{ProviderConfig, TranslationCommonConfig, TranslationConfig};
use crate::cache_store::{CacheKey, CacheNamespace, CacheStore};
use crate::errors::PipelineError;
use crate::languages;
use crate::providers::anthropic::Anthropic;
use crate::providers::deepseek::DeepSeek;
use crate::providers::ollama::Ollama;
use crate::providers::{BatchTranslator, ChatRequest};
use crate::translation::batch::Batch;
use crate::translation::parser;

/// Zero-width non-joiner, the glue of Persian orthography
const ZWNJ: char = '\u{200C}';

static PLURAL_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w)(های?)(\s|$)").unwrap());

static VERB_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(می|نمی)(کنم|کنی|کند|کنیم|کنید|کنند|شم|شی|شود|شیم|شید|شوند|رم|ری|رود|ریم|رید|روند|گم|گی|گوید|گیم|گید|گویند|دانم|دانی|داند|دانیم|دانید|دانند)",
    )
    .unwrap()
});

/// Client walking a batch through the provider fallback chain
pub struct TranslationClient {
    /// Providers in fallback order
    providers: Vec<Arc<dyn BatchTranslator>>,

    /// Shared result cache
    cache: Arc<dyn CacheStore>,

    /// Sampling temperature passed to providers
    temperature: f32,

    /// Minimum fraction of lines the parser must recover
    min_recovery: f64,
}

impl TranslationClient {
    /// Create a client over an explicit provider chain
    pub fn new(providers: Vec<Arc<dyn BatchTranslator>>, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            providers,
            cache,
            temperature: 0.3,
            min_recovery: 0.6,
        }
    }

    /// Build the provider chain from configuration
    pub fn from_config(config: &TranslationConfig, cache: Arc<dyn CacheStore>) -> Result<Self> {
        let mut providers: Vec<Arc<dyn BatchTranslator>> = Vec::new();
        for provider_config in &config.providers {
            providers.push(build_provider(provider_config, &config.common)?);
        }

        Ok(Self {
            providers,
            cache,
            temperature: config.common.temperature,
            min_recovery: config.common.min_recovery,
        })
    }

    /// Set the minimum parser recovery fraction
    pub fn with_min_recovery(mut self, min_recovery: f64) -> Self {
        self.min_recovery = min_recovery;
        self
    }

    /// The configured provider chain
    pub fn providers(&self) -> &[Arc<dyn BatchTranslator>] {
        &self.providers
    }

    /// Translate one batch, returning it with `translated_text` populated.
    ///
    /// `bypass_cache` skips the cache probe (used by quality retries) but
    /// still writes the fresh result back. If every provider fails at the
    /// transport level the whole chain is considered unreachable; if
    /// providers respond but nothing parses, the batch comes back
    /// untranslated for the validator to judge.
    pub async fn translate_batch(&self, batch: &Batch, bypass_cache: bool) -> Result<Batch, PipelineError> {
        if batch.is_empty() {
            return Ok(batch.clone());
        }

        let texts = batch.source_texts();
        let target = &batch.target_language;

        if !bypass_cache {
            if let Some(cached) = self.probe_cache(&texts, target) {
                debug!("Batch {} served from cache", batch.batch_index);
                return Ok(apply_lines(batch, &cached));
            }
        }

        let profile = languages::resolve(target)
            .map_err(|e| PipelineError::Subtitle(e.to_string()))?;
        let request = ChatRequest::new(
            system_prompt_for(target, profile.display_name),
            build_user_prompt(&texts, profile.display_name),
        )
        .temperature(self.temperature);

        let mut transport_failures = 0;

        for provider in &self.providers {
            match provider.translate(&request).await {
                Ok(raw) => match parser::parse(&raw, texts.len(), self.min_recovery) {
                    Ok(reply) => {
                        let mut lines = reply.lines;
                        if target == "fa" {
                            for line in lines.iter_mut().flatten() {
                                *line = fix_persian_text(line);
                            }
                        }

                        if !reply_differs_from_source(&lines, &texts) {
                            warn!(
                                "Provider {} echoed the source text for batch {}",
                                provider.id(),
                                batch.batch_index
                            );
                            continue;
                        }

                        info!(
                            "Batch {} translated by {} ({}/{} lines)",
                            batch.batch_index,
                            provider.id(),
                            lines.iter().filter(|l| l.is_some()).count(),
                            texts.len()
                        );
                        self.store_result(&texts, target, provider.id(), &lines);
                        return Ok(apply_lines(batch, &lines));
                    }
                    Err(e) => {
                        warn!("Provider {} reply unusable: {}", provider.id(), e);
                    }
                },
                Err(e) => {
                    warn!("Provider {} failed: {}", provider.id(), e);
                    if e.is_transport() {
                        transport_failures += 1;
                    }
                }
            }
        }

        if transport_failures == self.providers.len() {
            return Err(PipelineError::EngineUnavailable(
                "No translation provider reachable".to_string(),
            ));
        }

        warn!(
            "Batch {} left untranslated after exhausting the provider chain",
            batch.batch_index
        );
        Ok(batch.clone())
    }

    /// Walk the chain's cache keys in order and return the first hit
    fn probe_cache(&self, texts: &[&str], target: &str) -> Option<Vec<Option<String>>> {
        for provider in &self.providers {
            let key = CacheKey::for_translation(texts, target, provider.id());
            let Some(payload) = self.cache.get(CacheNamespace::Translations, &key) else {
                continue;
            };
            match serde_json::from_slice::<Vec<Option<String>>>(&payload) {
                Ok(lines) if lines.len() == texts.len() => return Some(lines),
                Ok(_) => debug!("Cached entry {} has wrong line count, ignoring", key),
                // Corrupt entry reads as a miss
                Err(e) => debug!("Cached entry {} is corrupt: {}", key, e),
            }
        }
        None
    }

    fn store_result(&self, texts: &[&str], target: &str, provider_id: &str, lines: &[Option<String>]) {
        let key = CacheKey::for_translation(texts, target, provider_id);
        match serde_json::to_vec(lines) {
            Ok(payload) => self.cache.put(CacheNamespace::Translations, &key, &payload),
            Err(e) => debug!("Failed to serialize translation for cache: {}", e),
        }
    }
}

/// A reply where every recovered line equals its source is a no-op
/// "translation" and never worth caching.
fn reply_differs_from_source(lines: &[Option<String>], texts: &[&str]) -> bool {
    lines
        .iter()
        .zip(texts)
        .any(|(line, source)| line.as_deref().is_some_and(|l| l.trim() != source.trim()))
}

fn apply_lines(batch: &Batch, lines: &[Option<String>]) -> Batch {
    let mut result = batch.clone();
    for (segment, line) in result.segments.iter_mut().zip(lines) {
        segment.translated_text = line.clone();
    }
    result
}

fn build_user_prompt(texts: &[&str], language_name: &str) -> String {
    let numbered: Vec<String> = texts
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. {}", i + 1, t))
        .collect();

    format!(
        "Translate these lines to {} (MANDATORY, keep the numbering):\n\n{}",
        language_name,
        numbered.join("\n")
    )
}

fn system_prompt_for(code: &str, language_name: &str) -> String {
    if code == "fa" {
        return "You are a professional Persian translator for short-form video subtitles.\n\
                Translate EXACTLY what is said. Keep the tone (casual/funny/serious).\n\
                1. Use informal/conversational register ('hast' not 'mibashad').\n\
                2. Use ZWNJ for prefixes (mi-, nemi-).\n\
                3. Keep any parenthesized technical term EXACTLY as written, inside parentheses.\n\
                Only output: number. Translation"
            .to_string();
    }
    format!(
        "Translate to {} with the EXACT same tone and slang. Keep it CONCISE for subtitle \
         constraints. Keep any parenthesized technical term EXACTLY as written, inside \
         parentheses. Only output: number. Translation",
        language_name
    )
}

/// Fix common Persian typography issues in translated text:
/// ZWNJ between می/نمی prefixes and their verb stems, detached plural
/// suffixes, and formal-register verbs replaced with conversational forms.
pub fn fix_persian_text(text: &str) -> String {
    if text.is_empty() {
        return text.to_string();
    }

    let mut text = text.to_string();

    for (formal, informal) in [
        ("می‌باشند", "هستن"),
        ("می‌باشد", "هست"),
        ("باشد", "باشه"),
        ("گردید", "شد"),
    ] {
        text = text.replace(formal, informal);
    }

    let mut text = PLURAL_SUFFIX
        .replace_all(&text, format!("${{1}}{}${{2}}${{3}}", ZWNJ).as_str())
        .to_string();

    // Leftover joined forms the suffix pattern cannot see
    for (joined, separated) in [
        ("صحبتهای", "صحبت‌های"),
        ("صحبتها", "صحبت‌ها"),
        ("ویدیوهای", "ویدیو‌های"),
        ("ویدیوها", "ویدیو‌ها"),
        ("فیلمهای", "فیلم‌های"),
        ("فیلمها", "فیلم‌ها"),
    ] {
        text = text.replace(joined, separated);
    }

    VERB_PREFIX
        .replace_all(&text, format!("${{1}}{}${{2}}", ZWNJ).as_str())
        .to_string()
}

fn build_provider(
    config: &ProviderConfig,
    common: &TranslationCommonConfig,
) -> Result<Arc<dyn BatchTranslator>> {
    match config.provider_type.as_str() {
        "deepseek" => Ok(Arc::new(DeepSeek::new(
            config.api_key.clone(),
            config.endpoint.clone(),
            config.model.clone(),
            config.timeout_secs,
            common.retry_count,
            common.retry_backoff_ms,
        ))),
        "ollama" => Ok(Arc::new(Ollama::new(
            config.endpoint.clone(),
            config.model.clone(),
            config.timeout_secs,
            common.retry_count,
            common.retry_backoff_ms,
        ))),
        "anthropic" => Ok(Arc::new(Anthropic::new(
            config.api_key.clone(),
            config.endpoint.clone(),
            config.model.clone(),
            config.timeout_secs,
        ))),
        other => Err(anyhow!("Unknown provider type: {}", other)),
    }
}
