//! In-memory [`VectorStore`] implementation.
//!
//! Uses a `HashMap` behind a `parking_lot::RwLock`. Similarity search is
//! brute-force cosine over every stored vector that passes the filter.

use std::collections::HashMap;

use anyhow::Result;
use parking_lot::RwLock;

use crate::embedding::cosine_similarity;
use crate::filter;
use crate::models::{Filter, Metadata};

use super::{VectorMatch, VectorStore};

struct StoredVector {
    vector: Vec<f32>,
    metadata: Metadata,
}

/// Brute-force in-memory vector store.
pub struct InMemoryVectorStore {
    vectors: RwLock<HashMap<String, StoredVector>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            vectors: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorStore for InMemoryVectorStore {
    fn upsert(&self, key: &str, vector: &[f32], metadata: &Metadata) -> Result<()> {
        self.vectors.write().insert(
            key.to_string(),
            StoredVector {
                vector: vector.to_vec(),
                metadata: metadata.clone(),
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.vectors.write().remove(key);
        Ok(())
    }

    fn query(&self, query_vec: &[f32], top_k: usize, filter: &Filter) -> Result<Vec<VectorMatch>> {
        let vectors = self.vectors.read();
        let mut matches: Vec<VectorMatch> = vectors
            .iter()
            .filter(|(_, sv)| filter::matches(&sv.metadata, filter))
            .map(|(key, sv)| VectorMatch {
                key: key.clone(),
                score: cosine_similarity(query_vec, &sv.vector),
            })
            .collect();
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.key.cmp(&b.key))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    fn len(&self) -> usize {
        self.vectors.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(user: &str) -> Metadata {
        let mut m = Metadata::new();
        m.insert("user_id".to_string(), json!(user));
        m
    }

    #[test]
    fn test_query_orders_by_similarity() {
        let store = InMemoryVectorStore::new();
        store.upsert("a", &[1.0, 0.0], &meta("u1")).unwrap();
        store.upsert("b", &[0.7, 0.7], &meta("u1")).unwrap();
        store.upsert("c", &[0.0, 1.0], &meta("u1")).unwrap();

        let hits = store.query(&[1.0, 0.0], 10, &Filter::new()).unwrap();
        let keys: Vec<&str> = hits.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_query_respects_top_k_and_filter() {
        let store = InMemoryVectorStore::new();
        store.upsert("a", &[1.0, 0.0], &meta("u1")).unwrap();
        store.upsert("b", &[1.0, 0.1], &meta("u2")).unwrap();

        let mut f = Filter::new();
        f.insert("user_id".to_string(), json!("u2"));
        let hits = store.query(&[1.0, 0.0], 10, &f).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "b");

        let top1 = store.query(&[1.0, 0.0], 1, &Filter::new()).unwrap();
        assert_eq!(top1.len(), 1);
    }

    #[test]
    fn test_upsert_replaces_and_delete_removes() {
        let store = InMemoryVectorStore::new();
        store.upsert("a", &[1.0, 0.0], &meta("u1")).unwrap();
        store.upsert("a", &[0.0, 1.0], &meta("u1")).unwrap();
        assert_eq!(store.len(), 1);

        let hits = store.query(&[0.0, 1.0], 1, &Filter::new()).unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-6);

        store.delete("a").unwrap();
        store.delete("missing").unwrap();
        assert!(store.is_empty());
    }
}
