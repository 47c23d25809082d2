//! Size-bounded, disk-persisted embedding cache shared by every engine.
//!
//! Entries are keyed by `"{model}:{chunk_id}"`. Because `chunk_id` is a
//! pure function of the chunk text, identical text in different services
//! shares one vector, while switching embedding models never returns a
//! vector of the wrong shape.
//!
//! Every operation (including `get`, which promotes recency) runs under a
//! single mutex. Disk failures are logged and degrade to an in-memory
//! cache; they are never returned to callers.
//!
//! # File format
//!
//! ```json
//! { "version": 1, "saved_at": "2026-01-01T00:00:00Z",
//!   "entries": [ { "key": "...", "vector": [0.1, ...] } ] }
//! ```
//!
//! Entries are written least- to most-recently used so that a reload
//! restores recency order.

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::CacheConfig;

const CACHE_FORMAT_VERSION: u32 = 1;

/// Cache key for a chunk's vector under a given embedding model.
pub fn embedding_key(model: &str, chunk_id: &str) -> String {
    format!("{}:{}", model, chunk_id)
}

/// Counters since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

#[derive(Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    entries: Vec<CacheFileEntry>,
}

#[derive(Serialize, Deserialize)]
struct CacheFileEntry {
    key: String,
    vector: Vec<f32>,
}

struct CacheState {
    lru: LruCache<String, Vec<f32>>,
    dirty: bool,
    hits: u64,
    misses: u64,
    evictions: u64,
}

pub struct EmbeddingCache {
    state: Mutex<CacheState>,
    /// Serializes file writes so snapshots reach disk in order.
    write_lock: Mutex<()>,
    path: Option<PathBuf>,
}

impl EmbeddingCache {
    /// A cache that lives only for the process lifetime.
    pub fn in_memory(max_cache_size: usize) -> Self {
        Self::with_path(None, max_cache_size)
    }

    /// A cache persisted at `path` (if any). Nothing is read until [`load`](Self::load).
    pub fn with_path(path: Option<PathBuf>, max_cache_size: usize) -> Self {
        let capacity = NonZeroUsize::new(max_cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(CacheState {
                lru: LruCache::new(capacity),
                dirty: false,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            write_lock: Mutex::new(()),
            path,
        }
    }

    /// Build from configuration and load any existing cache file.
    pub fn from_config(config: &CacheConfig) -> Self {
        let cache = Self::with_path(config.path.clone(), config.max_cache_size);
        cache.load();
        cache
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().lru.cap().get()
    }

    /// Look up a vector, marking it most recently used.
    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        let mut state = self.state.lock();
        match state.lru.get(key).cloned() {
            Some(vector) => {
                state.hits += 1;
                Some(vector)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Insert or replace a vector, evicting the least recently used entry when full.
    pub fn put(&self, key: impl Into<String>, vector: Vec<f32>) {
        let key = key.into();
        let mut state = self.state.lock();
        if let Some((old_key, _)) = state.lru.push(key.clone(), vector) {
            if old_key != key {
                state.evictions += 1;
                debug!(evicted = %old_key, "embedding cache eviction");
            }
        }
        state.dirty = true;
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().lru.contains(key)
    }

    pub fn len(&self) -> usize {
        self.state.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            entries: state.lru.len(),
        }
    }

    /// Replace the in-memory contents with the persisted file.
    ///
    /// A missing file leaves the cache empty. An unreadable or corrupt file
    /// is logged and also leaves the cache empty.
    pub fn load(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if !path.exists() {
            debug!(path = %path.display(), "no embedding cache file yet");
            return;
        }

        let file = match read_cache_file(path) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load embedding cache, starting empty");
                return;
            }
        };

        let mut state = self.state.lock();
        state.lru.clear();
        let capacity = state.lru.cap().get();
        let skip = file.entries.len().saturating_sub(capacity);
        for entry in file.entries.into_iter().skip(skip) {
            state.lru.put(entry.key, entry.vector);
        }
        state.dirty = false;
        info!(path = %path.display(), entries = state.lru.len(), "loaded embedding cache");
    }

    /// Write the cache to disk if it has changed since the last load/flush.
    ///
    /// Entries are snapshotted under the lock and written after releasing
    /// it, so lookups proceed during disk I/O. Memory-only caches never
    /// touch disk. Write failures are logged and mark the cache dirty again.
    pub fn flush(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let _writer = self.write_lock.lock();

        let entries: Vec<CacheFileEntry> = {
            let mut state = self.state.lock();
            if !state.dirty {
                return;
            }
            state.dirty = false;
            state
                .lru
                .iter()
                .rev()
                .map(|(key, vector)| CacheFileEntry {
                    key: key.clone(),
                    vector: vector.clone(),
                })
                .collect()
        };

        let file = CacheFile {
            version: CACHE_FORMAT_VERSION,
            saved_at: Some(Utc::now()),
            entries,
        };

        match write_cache_file(path, &file) {
            Ok(()) => {
                info!(path = %path.display(), entries = file.entries.len(), "flushed embedding cache");
            }
            Err(e) => {
                self.state.lock().dirty = true;
                warn!(path = %path.display(), error = %e, "failed to flush embedding cache");
            }
        }
    }
}

impl Drop for EmbeddingCache {
    fn drop(&mut self) {
        self.flush();
    }
}

fn read_cache_file(path: &Path) -> anyhow::Result<CacheFile> {
    let content = std::fs::read_to_string(path)?;
    let file: CacheFile = serde_json::from_str(&content)?;
    if file.version != CACHE_FORMAT_VERSION {
        anyhow::bail!("unsupported cache version {}", file.version);
    }
    Ok(file)
}

fn write_cache_file(path: &Path, file: &CacheFile) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, serde_json::to_vec(file)?)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_eviction_removes_least_recently_used() {
        let cache = EmbeddingCache::in_memory(3);
        cache.put("a", vec![1.0]);
        cache.put("b", vec![2.0]);
        cache.put("c", vec![3.0]);
        cache.put("d", vec![4.0]);

        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("d"));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_get_renews_recency() {
        let cache = EmbeddingCache::in_memory(3);
        cache.put("a", vec![1.0]);
        cache.put("b", vec![2.0]);
        cache.put("c", vec![3.0]);
        assert_eq!(cache.get("a"), Some(vec![1.0]));
        cache.put("d", vec![4.0]);

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
    }

    #[test]
    fn test_replacing_key_is_not_an_eviction() {
        let cache = EmbeddingCache::in_memory(2);
        cache.put("a", vec![1.0]);
        cache.put("a", vec![2.0]);
        assert_eq!(cache.get("a"), Some(vec![2.0]));
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_hit_miss_counters() {
        let cache = EmbeddingCache::in_memory(4);
        assert!(cache.get("x").is_none());
        cache.put("x", vec![0.5]);
        assert!(cache.get("x").is_some());
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn test_flush_and_reload_preserves_recency() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache").join("embeddings.json");

        {
            let cache = EmbeddingCache::with_path(Some(path.clone()), 3);
            cache.put("a", vec![1.0]);
            cache.put("b", vec![2.0]);
            cache.put("c", vec![3.0]);
            cache.get("a");
            cache.flush();
        }
        assert!(path.exists());

        let reloaded = EmbeddingCache::with_path(Some(path.clone()), 3);
        reloaded.load();
        assert_eq!(reloaded.len(), 3);
        // "b" is now least recently used.
        reloaded.put("d", vec![4.0]);
        assert!(!reloaded.contains("b"));
        assert!(reloaded.contains("a"));
    }

    #[test]
    fn test_load_keeps_most_recent_tail() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("embeddings.json");
        {
            let cache = EmbeddingCache::with_path(Some(path.clone()), 4);
            for key in ["a", "b", "c", "d"] {
                cache.put(key, vec![1.0]);
            }
        }

        let small = EmbeddingCache::with_path(Some(path.clone()), 2);
        small.load();
        assert_eq!(small.len(), 2);
        assert!(small.contains("c"));
        assert!(small.contains("d"));
    }

    #[test]
    fn test_drop_flushes_dirty_cache() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("embeddings.json");
        {
            let cache = EmbeddingCache::with_path(Some(path.clone()), 8);
            cache.put("k", vec![0.25, 0.75]);
        }
        let cache = EmbeddingCache::with_path(Some(path), 8);
        cache.load();
        assert_eq!(cache.get("k"), Some(vec![0.25, 0.75]));
    }

    #[test]
    fn test_corrupt_file_degrades_to_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("embeddings.json");
        std::fs::write(&path, "not json {").unwrap();

        let cache = EmbeddingCache::with_path(Some(path), 8);
        cache.load();
        assert!(cache.is_empty());
        cache.put("k", vec![1.0]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_unwritable_path_does_not_panic() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        // Parent of the cache path is a regular file.
        let cache = EmbeddingCache::with_path(Some(blocker.join("embeddings.json")), 8);
        cache.put("k", vec![1.0]);
        cache.flush();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failed_flush_is_retried() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("cache");
        std::fs::write(&dir, "x").unwrap();
        let path = dir.join("embeddings.json");

        let cache = EmbeddingCache::with_path(Some(path.clone()), 8);
        cache.put("k", vec![1.0]);
        cache.flush();
        assert!(!path.exists());

        std::fs::remove_file(&dir).unwrap();
        cache.flush();
        assert!(path.exists());

        let reloaded = EmbeddingCache::with_path(Some(path), 8);
        reloaded.load();
        assert_eq!(reloaded.get("k"), Some(vec![1.0]));
    }

    #[test]
    fn test_puts_during_flushes_are_persisted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("embeddings.json");
        let cache = std::sync::Arc::new(EmbeddingCache::with_path(Some(path.clone()), 1000));

        let writer = {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    cache.put(format!("k{}", i), vec![i as f32]);
                }
            })
        };
        for _ in 0..20 {
            cache.flush();
            assert!(cache.get("missing").is_none());
        }
        writer.join().unwrap();
        cache.flush();

        let reloaded = EmbeddingCache::with_path(Some(path), 1000);
        reloaded.load();
        assert_eq!(reloaded.len(), 200);
        assert_eq!(reloaded.get("k199"), Some(vec![199.0]));
    }

    #[test]
    fn test_memory_only_cache_never_writes() {
        let tmp = TempDir::new().unwrap();
        let cache = EmbeddingCache::in_memory(8);
        cache.put("k", vec![1.0]);
        cache.flush();
        assert!(cache.path().is_none());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_embedding_key_includes_model() {
        assert_ne!(embedding_key("m1", "id"), embedding_key("m2", "id"));
    }
}
