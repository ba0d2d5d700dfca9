/*!
 * Content-addressed persistence for transcription and translation results.
 *
 * Results are keyed by a deterministic SHA-256 digest of the inputs that
 * produced them, so identical work is never paid for twice. The store is
 * injected into the components that use it; tests substitute the in-memory
 * implementation.
 */

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use log::debug;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

/// Cache namespaces, kept separate on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// Transcription results
    Transcripts,
    /// Translated batches
    Translations,
}

impl CacheNamespace {
    /// Directory name of the namespace
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Transcripts => "transcripts",
            Self::Translations => "translations",
        }
    }
}

/// Deterministic digest identifying a previously computed result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a transcription result: audio content plus model identifier
    pub fn for_transcription(audio_content: &[u8], model_identifier: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(audio_content);
        hasher.update([0u8]);
        hasher.update(model_identifier.as_bytes());
        Self(to_hex(&hasher.finalize()))
    }

    /// Key for a translated batch: source texts, target language and the
    /// provider that produced (or would produce) the translation
    pub fn for_translation<S: AsRef<str>>(
        source_texts: &[S],
        target_language: &str,
        provider_identifier: &str,
    ) -> Self {
        let mut hasher = Sha256::new();
        for text in source_texts {
            hasher.update(text.as_ref().as_bytes());
            hasher.update([b'\n']);
        }
        hasher.update([0u8]);
        hasher.update(target_language.as_bytes());
        hasher.update([0u8]);
        hasher.update(provider_identifier.as_bytes());
        Self(to_hex(&hasher.finalize()))
    }

    /// Hex representation of the digest
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Content-addressed store for pipeline results.
///
/// `get` never fails for a missing key - absence is a normal outcome.
/// `put` is idempotent: writing the same key twice with the same value is a
/// no-op in effect, and racing writers are safe because two processes
/// computing the same key compute the same value.
pub trait CacheStore: Send + Sync {
    /// Fetch a payload, or None if it was never computed
    fn get(&self, namespace: CacheNamespace, key: &CacheKey) -> Option<Vec<u8>>;

    /// Persist a payload under the given key
    fn put(&self, namespace: CacheNamespace, key: &CacheKey, payload: &[u8]);
}

/// Durable cache backed by flat files, one per key, per namespace
pub struct FsCacheStore {
    /// Root directory holding the namespace subdirectories
    root: PathBuf,
}

impl FsCacheStore {
    /// Create a store rooted at the given directory
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Default store under the platform cache directory
    pub fn default_location() -> Self {
        let root = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("polysub");
        Self::new(root)
    }

    fn entry_path(&self, namespace: CacheNamespace, key: &CacheKey) -> PathBuf {
        self.root.join(namespace.dir_name()).join(key.as_hex())
    }
}

impl CacheStore for FsCacheStore {
    fn get(&self, namespace: CacheNamespace, key: &CacheKey) -> Option<Vec<u8>> {
        let path = self.entry_path(namespace, key);
        match fs::read(&path) {
            Ok(bytes) => {
                debug!("Cache hit for {} ({})", key, namespace.dir_name());
                Some(bytes)
            }
            Err(_) => {
                debug!("Cache miss for {} ({})", key, namespace.dir_name());
                None
            }
        }
    }

    fn put(&self, namespace: CacheNamespace, key: &CacheKey, payload: &[u8]) {
        let path = self.entry_path(namespace, key);
        let Some(parent) = path.parent() else { return };
        if let Err(e) = fs::create_dir_all(parent) {
            debug!("Cache directory creation failed: {}", e);
            return;
        }

        // Write-then-rename keeps concurrent writers from exposing a
        // half-written entry; last writer wins.
        let write_result = tempfile::NamedTempFile::new_in(parent).and_then(|mut tmp| {
            tmp.write_all(payload)?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        });

        match write_result {
            Ok(()) => debug!("Cached {} bytes under {} ({})", payload.len(), key, namespace.dir_name()),
            Err(e) => debug!("Cache write failed for {}: {}", key, e),
        }
    }
}

/// In-memory cache with hit/miss counters, for tests and dry runs
pub struct MemoryCacheStore {
    /// Internal cache storage
    cache: Arc<RwLock<HashMap<(CacheNamespace, CacheKey), Vec<u8>>>>,

    /// Cache hit counter
    hits: Arc<RwLock<usize>>,

    /// Cache miss counter
    misses: Arc<RwLock<usize>>,
}

impl MemoryCacheStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            hits: Arc::new(RwLock::new(0)),
            misses: Arc::new(RwLock::new(0)),
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> (usize, usize, f64) {
        let hits = *self.hits.read();
        let misses = *self.misses.read();
        let total = hits + misses;

        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        (hits, misses, hit_rate)
    }

    /// Number of entries in the cache
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryCacheStore {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            hits: self.hits.clone(),
            misses: self.misses.clone(),
        }
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, namespace: CacheNamespace, key: &CacheKey) -> Option<Vec<u8>> {
        let cache = self.cache.read();
        match cache.get(&(namespace, key.clone())) {
            Some(payload) => {
                *self.hits.write() += 1;
                Some(payload.clone())
            }
            None => {
                *self.misses.write() += 1;
                None
            }
        }
    }

    fn put(&self, namespace: CacheNamespace, key: &CacheKey, payload: &[u8]) {
        self.cache
            .write()
            .insert((namespace, key.clone()), payload.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cacheKey_withIdenticalInputs_shouldBeDeterministic() {
        let a = CacheKey::for_transcription(b"audio-bytes", "medium");
        let b = CacheKey::for_transcription(b"audio-bytes", "medium");
        assert_eq!(a, b);

        let texts = ["hello", "world"];
        let x = CacheKey::for_translation(&texts, "fa", "deepseek");
        let y = CacheKey::for_translation(&texts, "fa", "deepseek");
        assert_eq!(x, y);
    }

    #[test]
    fn test_cacheKey_withDifferentInputs_shouldDiffer() {
        let texts = ["hello", "world"];
        let base = CacheKey::for_translation(&texts, "fa", "deepseek");
        assert_ne!(base, CacheKey::for_translation(&texts, "ar", "deepseek"));
        assert_ne!(base, CacheKey::for_translation(&texts, "fa", "ollama"));
        assert_ne!(base, CacheKey::for_translation(&["hello"], "fa", "deepseek"));
        // Joining must not be ambiguous across line boundaries
        assert_ne!(
            CacheKey::for_translation(&["ab", "c"], "fa", "deepseek"),
            CacheKey::for_translation(&["a", "bc"], "fa", "deepseek"),
        );
    }

    #[test]
    fn test_memoryStore_shouldReturnStoredPayloadAndCountHits() {
        let store = MemoryCacheStore::new();
        let key = CacheKey::for_transcription(b"abc", "small");

        assert!(store.get(CacheNamespace::Transcripts, &key).is_none());
        store.put(CacheNamespace::Transcripts, &key, b"payload");
        assert_eq!(
            store.get(CacheNamespace::Transcripts, &key).as_deref(),
            Some(&b"payload"[..])
        );

        let (hits, misses, rate) = store.stats();
        assert_eq!((hits, misses), (1, 1));
        assert!((rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_memoryStore_shouldKeepNamespacesSeparate() {
        let store = MemoryCacheStore::new();
        let key = CacheKey::for_transcription(b"abc", "small");

        store.put(CacheNamespace::Transcripts, &key, b"transcript");
        assert!(store.get(CacheNamespace::Translations, &key).is_none());
    }

    #[test]
    fn test_fsStore_shouldRoundTripByteIdentical() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCacheStore::new(dir.path().to_path_buf());
        let key = CacheKey::for_translation(&["line"], "fa", "mock");

        assert!(store.get(CacheNamespace::Translations, &key).is_none());

        let payload: Vec<u8> = (0u8..=255).collect();
        store.put(CacheNamespace::Translations, &key, &payload);
        assert_eq!(
            store.get(CacheNamespace::Translations, &key),
            Some(payload.clone())
        );

        // Idempotent rewrite
        store.put(CacheNamespace::Translations, &key, &payload);
        assert_eq!(store.get(CacheNamespace::Translations, &key), Some(payload));
    }

    #[test]
    fn test_fsStore_shouldLayOutNamespacedHexFiles() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCacheStore::new(dir.path().to_path_buf());
        let key = CacheKey::for_transcription(b"abc", "tiny");

        store.put(CacheNamespace::Transcripts, &key, b"x");
        let expected = dir.path().join("transcripts").join(key.as_hex());
        assert!(expected.is_file());
        assert_eq!(key.as_hex().len(), 64);
        assert!(key.as_hex().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
