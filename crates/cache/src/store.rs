//! Enrichment-fetch cache keyed by fingerprint (spec §4.3).

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex as AsyncMutex;

use zoe_core::ContextCacheEntry;
use zoe_llm::{InferenceBackend, Message};

use crate::source_kind::SourceKind;
use crate::CacheError;

const DEFAULT_TTL_SECONDS: i64 = 86_400;
const DEFAULT_MIN_FETCH_MS: u64 = 100;
const MAX_ENTRIES: usize = 1000;
const SUMMARY_MAX_CHARS: usize = 1000;

/// TTL given to an entry whose underlying fetch was cheaper than
/// `min_fetch_ms` — still shared with any concurrent caller, just not worth
/// keeping around once the single-flight window closes.
const CHEAP_ENTRY_TTL_SECONDS: i64 = 5;

pub struct ContextCache {
    entries: DashMap<String, ContextCacheEntry>,
    fingerprint_locks: DashMap<String, Arc<AsyncMutex<()>>>,
    inference: Arc<dyn InferenceBackend>,
    ttl_seconds: i64,
    max_entries: usize,
    min_fetch_ms: u64,
}

impl ContextCache {
    pub fn new(inference: Arc<dyn InferenceBackend>) -> Self {
        Self {
            entries: DashMap::new(),
            fingerprint_locks: DashMap::new(),
            inference,
            ttl_seconds: DEFAULT_TTL_SECONDS,
            max_entries: MAX_ENTRIES,
            min_fetch_ms: DEFAULT_MIN_FETCH_MS,
        }
    }

    pub fn with_ttl_seconds(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    pub fn with_min_fetch_ms(mut self, min_fetch_ms: u64) -> Self {
        self.min_fetch_ms = min_fetch_ms;
        self
    }

    fn lock_for(&self, fingerprint: &str) -> Arc<AsyncMutex<()>> {
        self.fingerprint_locks.entry(fingerprint.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    fn is_expired(entry: &ContextCacheEntry) -> bool {
        let age = chrono::Utc::now().signed_duration_since(entry.created_at).num_seconds();
        age >= entry.ttl_seconds
    }

    /// Single-flight: concurrent callers for the same fingerprint serialize
    /// on `lock_for` so only one runs `compute_fn`; the rest observe the
    /// freshly-populated cache entry once they acquire the lock. The result
    /// is always cached once computed — there is no latency threshold that
    /// would let a queued waiter fall through and re-invoke `compute_fn`.
    pub async fn fetch_or_compute<F, Fut>(
        &self,
        fingerprint: &str,
        source_kind: SourceKind,
        compute_fn: F,
    ) -> Result<String, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, CacheError>>,
    {
        let lock = self.lock_for(fingerprint);
        let _guard = lock.lock().await;

        if let Some(mut entry) = self.entries.get_mut(fingerprint) {
            if !Self::is_expired(&entry) {
                entry.hits += 1;
                return Ok(entry.summary_text.clone());
            }
        }

        let start = Instant::now();
        let raw = compute_fn().await?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if raw.is_empty() {
            return Ok(raw);
        }

        let summary = self.summarize(source_kind, &raw).await?;

        if !summary.is_empty() {
            // A fetch cheaper than `min_fetch_ms` isn't worth keeping around
            // long-term, but it's still inserted — any caller still queued
            // on `lock_for` must see it rather than re-running `compute_fn`.
            let ttl_seconds = if elapsed_ms >= self.min_fetch_ms { self.ttl_seconds } else { CHEAP_ENTRY_TTL_SECONDS };

            let mut source_kinds = std::collections::HashSet::new();
            source_kinds.insert(source_kind.as_str().to_string());
            self.entries.insert(
                fingerprint.to_string(),
                ContextCacheEntry {
                    fingerprint: fingerprint.to_string(),
                    summary_text: summary.clone(),
                    source_kinds,
                    created_at: chrono::Utc::now(),
                    ttl_seconds,
                    hits: 0,
                },
            );
            self.evict_if_needed();
        }

        Ok(summary)
    }

    async fn summarize(&self, source_kind: SourceKind, raw: &str) -> Result<String, CacheError> {
        let messages = vec![Message::system(source_kind.summarizer_instruction()), Message::user(raw.to_string())];
        let result = self
            .inference
            .generate(&messages)
            .await
            .map_err(|e| CacheError::Summarization(e.to_string()))?;

        let mut text = result.text;
        if text.chars().count() > SUMMARY_MAX_CHARS {
            text = text.chars().take(SUMMARY_MAX_CHARS).collect();
        }
        Ok(text)
    }

    /// Explicit invalidation by predicate over fingerprints.
    pub fn invalidate_where(&self, predicate: impl Fn(&str) -> bool) {
        self.entries.retain(|fingerprint, _| !predicate(fingerprint));
    }

    /// Periodic cleanup: drop expired entries, then trim to `max_entries` by
    /// LRU (oldest `created_at`) with hit count as the tiebreak.
    pub fn cleanup(&self) {
        self.entries.retain(|_, entry| !Self::is_expired(entry));
        self.evict_if_needed();
    }

    fn evict_if_needed(&self) {
        if self.entries.len() <= self.max_entries {
            return;
        }
        let mut all: Vec<(String, chrono::DateTime<chrono::Utc>, u64)> =
            self.entries.iter().map(|e| (e.key().clone(), e.value().created_at, e.value().hits)).collect();
        all.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)));
        let overflow = self.entries.len() - self.max_entries;
        for (fingerprint, _, _) in all.into_iter().take(overflow) {
            self.entries.remove(&fingerprint);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use zoe_llm::{FinishReason, GenerationResult, LlmError};

    struct EchoBackend;

    #[async_trait]
    impl InferenceBackend for EchoBackend {
        async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
            let text = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(GenerationResult {
                text,
                tokens: 1,
                time_to_first_token_ms: 0,
                total_time_ms: 0,
                tokens_per_second: 0.0,
                finish_reason: FinishReason::Stop,
                context: None,
            })
        }

        async fn generate_stream(&self, _messages: &[Message], _tx: mpsc::Sender<String>) -> Result<GenerationResult, LlmError> {
            unimplemented!()
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn fast_nonempty_results_are_cached() {
        let cache = ContextCache::new(Arc::new(EchoBackend));
        cache.fetch_or_compute("fp1", SourceKind::Memory, || async { Ok("hello".to_string()) }).await.unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn slow_nonempty_results_are_cached_and_hit() {
        let cache = ContextCache::new(Arc::new(EchoBackend));
        cache
            .fetch_or_compute("fp2", SourceKind::Calendar, || async {
                tokio::time::sleep(Duration::from_millis(110)).await;
                Ok("three meetings today".to_string())
            })
            .await
            .unwrap();
        assert_eq!(cache.len(), 1);

        let hit = cache.fetch_or_compute("fp2", SourceKind::Calendar, || async { Ok(String::new()) }).await.unwrap();
        assert_eq!(hit, "three meetings today");
    }

    #[tokio::test]
    async fn concurrent_callers_invoke_compute_fn_at_most_once() {
        let cache = Arc::new(ContextCache::new(Arc::new(EchoBackend)));
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .fetch_or_compute("fp3", SourceKind::Memory, || async move {
                        calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        Ok("shared result".to_string())
                    })
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), "shared result");
        }
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_where_removes_matching_entries() {
        let cache = ContextCache::new(Arc::new(EchoBackend));
        cache
            .fetch_or_compute("user:42:memory", SourceKind::Memory, || async {
                tokio::time::sleep(Duration::from_millis(110)).await;
                Ok("facts about user 42".to_string())
            })
            .await
            .unwrap();
        assert_eq!(cache.len(), 1);
        cache.invalidate_where(|fp| fp.starts_with("user:42:"));
        assert_eq!(cache.len(), 0);
    }
}
