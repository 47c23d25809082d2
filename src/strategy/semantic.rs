use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, warn};

use unified_search_core::models::{Chunk, Filter};
use unified_search_core::search::SearchHit;
use unified_search_core::store::memory::InMemoryVectorStore;
use unified_search_core::store::VectorStore;

use super::{cut_and_limit, SearchStrategy, StrategyContext, StrategyKind};
use crate::cache::embedding_key;
use crate::config::SemanticConfig;
use crate::error::{Result, SearchError};

/// Vector-similarity ranking.
///
/// Chunk vectors come from, in order: the vector already attached to the
/// chunk, the shared embedding cache, and finally the embedder (whose
/// result is stored in the cache). A chunk whose embedding fails is left
/// out of the vector store for that pass.
pub struct SemanticStrategy {
    config: SemanticConfig,
    ctx: StrategyContext,
    store: Box<dyn VectorStore>,
    chunks: HashMap<String, Arc<Chunk>>,
    query_vectors: Mutex<LruCache<String, Vec<f32>>>,
}

#[derive(Debug, Default)]
struct IndexPass {
    reused: usize,
    from_cache: usize,
    embedded: usize,
    failed: usize,
    removed: usize,
}

impl SemanticStrategy {
    pub fn new(config: SemanticConfig, ctx: StrategyContext) -> Self {
        Self::with_store(config, ctx, Box::new(InMemoryVectorStore::new()))
    }

    pub fn with_store(config: SemanticConfig, ctx: StrategyContext, store: Box<dyn VectorStore>) -> Self {
        let capacity = NonZeroUsize::new(config.query_cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            ctx,
            store,
            chunks: HashMap::new(),
            query_vectors: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Matches at or above the threshold, without the result limit.
    pub(crate) fn above_cutoff(&self, query: &str, filter: &Filter) -> Result<Vec<SearchHit>> {
        let threshold = self.config.score_threshold as f64;
        Ok(self
            .raw_search(query, filter)?
            .into_iter()
            .filter(|hit| hit.score >= threshold)
            .collect())
    }

    /// Resolve the vector for a chunk, or `None` when embedding failed.
    fn chunk_vector(&self, chunk: &Chunk, pass: &mut IndexPass) -> Option<Vec<f32>> {
        if let Some(vector) = chunk.embedding.as_ref().filter(|v| !v.is_empty()) {
            pass.reused += 1;
            return Some(vector.clone());
        }

        let key = embedding_key(self.ctx.embedder.model_name(), &chunk.chunk_id);
        if let Some(vector) = self.ctx.cache.get(&key) {
            pass.from_cache += 1;
            return Some(vector);
        }

        match self.ctx.embedder.embed(&chunk.text_content) {
            Ok(vector) => {
                pass.embedded += 1;
                self.ctx.cache.put(key, vector.clone());
                Some(vector)
            }
            Err(e) => {
                pass.failed += 1;
                warn!(chunk_id = %chunk.chunk_id, error = %e, "embedding failed, chunk excluded from semantic ranking");
                None
            }
        }
    }

    fn query_vector(&self, query: &str) -> Option<Vec<f32>> {
        if let Some(vector) = self.query_vectors.lock().get(query) {
            return Some(vector.clone());
        }
        match self.ctx.embedder.embed(query) {
            Ok(vector) => {
                self.query_vectors.lock().put(query.to_string(), vector.clone());
                Some(vector)
            }
            Err(e) => {
                warn!(error = %e, "query embedding failed, returning no semantic matches");
                None
            }
        }
    }
}

fn store_error(e: anyhow::Error) -> SearchError {
    SearchError::Index(format!("vector store: {}", e))
}

impl SearchStrategy for SemanticStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Semantic
    }

    fn index(&mut self, chunks: &mut [Arc<Chunk>]) -> Result<()> {
        let mut pass = IndexPass::default();
        let mut next: HashMap<String, Arc<Chunk>> = HashMap::with_capacity(chunks.len());

        for slot in chunks.iter_mut() {
            let unchanged = slot.embedding.is_some()
                && self
                    .chunks
                    .get(&slot.key)
                    .is_some_and(|prev| Arc::ptr_eq(prev, &*slot));
            if unchanged {
                next.insert(slot.key.clone(), slot.clone());
                continue;
            }

            match self.chunk_vector(slot, &mut pass) {
                Some(vector) => {
                    self.store
                        .upsert(&slot.key, &vector, &slot.metadata)
                        .map_err(store_error)?;
                    if slot.embedding.as_ref() != Some(&vector) {
                        Arc::make_mut(slot).embedding = Some(vector);
                    }
                    next.insert(slot.key.clone(), slot.clone());
                }
                None => {
                    self.store.delete(&slot.key).map_err(store_error)?;
                }
            }
        }

        for key in self.chunks.keys() {
            if !next.contains_key(key) {
                self.store.delete(key).map_err(store_error)?;
                pass.removed += 1;
            }
        }

        debug!(
            reused = pass.reused,
            from_cache = pass.from_cache,
            embedded = pass.embedded,
            failed = pass.failed,
            removed = pass.removed,
            "semantic index updated"
        );
        self.chunks = next;
        Ok(())
    }

    fn search(&self, query: &str, filter: &Filter, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        Ok(cut_and_limit(
            self.raw_search(query, filter)?,
            self.config.score_threshold as f64,
            limit.unwrap_or(self.config.default_limit),
        ))
    }

    fn raw_search(&self, query: &str, filter: &Filter) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() || self.store.is_empty() {
            return Ok(Vec::new());
        }
        let Some(query_vec) = self.query_vector(query) else {
            return Ok(Vec::new());
        };

        let matches = self
            .store
            .query(&query_vec, self.store.len(), filter)
            .map_err(store_error)?;

        Ok(matches
            .into_iter()
            .filter_map(|m| {
                self.chunks
                    .get(&m.key)
                    .map(|chunk| SearchHit::new(chunk.clone(), m.score as f64))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EmbeddingCache;
    use crate::embedding::{DisabledEmbedder, Embedder, HashEmbedder};
    use crate::strategy::test_support::{chunks, texts, user_doc};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use unified_search_core::models::SearchableDocument;

    struct Counting {
        inner: HashEmbedder,
        calls: AtomicUsize,
    }

    impl Embedder for Counting {
        fn model_name(&self) -> &str {
            self.inner.model_name()
        }
        fn dims(&self) -> usize {
            self.inner.dims()
        }
        fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text)
        }
    }

    fn config(threshold: f32) -> SemanticConfig {
        SemanticConfig {
            score_threshold: threshold,
            default_limit: 50,
            query_cache_size: 8,
        }
    }

    fn setup(threshold: f32) -> (SemanticStrategy, Arc<Counting>, Arc<EmbeddingCache>) {
        let embedder = Arc::new(Counting {
            inner: HashEmbedder::new(256),
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(EmbeddingCache::in_memory(100));
        let ctx = StrategyContext {
            embedder: embedder.clone(),
            cache: cache.clone(),
        };
        (SemanticStrategy::new(config(threshold), ctx), embedder, cache)
    }

    #[test]
    fn test_ranks_by_similarity_with_threshold() {
        let (mut s, _, _) = setup(0.5);
        let mut c = chunks(vec![
            SearchableDocument::new("Weekly sync notes"),
            SearchableDocument::new("invoice payment overdue"),
        ]);
        s.index(&mut c).unwrap();

        let hits = s.search("weekly sync", &Filter::new(), None).unwrap();
        assert_eq!(texts(&hits), vec!["Weekly sync notes"]);
        assert_eq!(s.raw_search("weekly sync", &Filter::new()).unwrap().len(), 2);
    }

    #[test]
    fn test_index_writes_embeddings_back() {
        let (mut s, embedder, cache) = setup(0.5);
        let mut c = chunks(vec![SearchableDocument::new("alpha"), SearchableDocument::new("beta")]);
        s.index(&mut c).unwrap();

        assert!(c.iter().all(|chunk| chunk.embedding.is_some()));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);

        // Same slice again: nothing is embedded or looked up.
        let misses = cache.stats().misses;
        s.index(&mut c).unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().misses, misses);
    }

    #[test]
    fn test_cache_shared_across_strategies() {
        let (mut first, embedder, cache) = setup(0.5);
        let mut c = chunks(vec![SearchableDocument::new("shared text")]);
        first.index(&mut c).unwrap();

        let ctx = StrategyContext {
            embedder: embedder.clone(),
            cache: cache.clone(),
        };
        let mut second = SemanticStrategy::new(config(0.5), ctx);
        let mut fresh = chunks(vec![SearchableDocument::new("shared text").with_original(json!({"other": true}))]);
        second.index(&mut fresh).unwrap();

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_removed_chunks_leave_the_store() {
        let (mut s, _, _) = setup(0.0);
        let mut c = chunks(vec![SearchableDocument::new("alpha beta"), SearchableDocument::new("alpha gamma")]);
        s.index(&mut c).unwrap();
        assert_eq!(s.raw_search("alpha", &Filter::new()).unwrap().len(), 2);

        let mut c = vec![c[0].clone()];
        s.index(&mut c).unwrap();
        assert_eq!(texts(&s.raw_search("alpha", &Filter::new()).unwrap()), vec!["alpha beta"]);
    }

    #[test]
    fn test_filter_is_applied() {
        let (mut s, _, _) = setup(0.0);
        let mut c = chunks(vec![user_doc("weekly sync", "u1"), user_doc("weekly sync", "u2")]);
        s.index(&mut c).unwrap();

        let mut filter = Filter::new();
        filter.insert("user_id".into(), "u2".into());
        let hits = s.search("weekly sync", &filter, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.metadata.get("user_id"), Some(&json!("u2")));
    }

    #[test]
    fn test_query_vectors_are_memoized() {
        let (mut s, embedder, _) = setup(0.0);
        let mut c = chunks(vec![SearchableDocument::new("alpha")]);
        s.index(&mut c).unwrap();
        let before = embedder.calls.load(Ordering::SeqCst);
        s.search("alpha", &Filter::new(), None).unwrap();
        s.search("alpha", &Filter::new(), None).unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn test_embedding_failure_yields_no_matches() {
        let ctx = StrategyContext {
            embedder: Arc::new(DisabledEmbedder),
            cache: Arc::new(EmbeddingCache::in_memory(10)),
        };
        let mut s = SemanticStrategy::new(config(0.0), ctx);
        let mut c = chunks(vec![SearchableDocument::new("alpha")]);
        s.index(&mut c).unwrap();

        assert!(c[0].embedding.is_none());
        assert!(s.search("alpha", &Filter::new(), None).unwrap().is_empty());
    }
}
