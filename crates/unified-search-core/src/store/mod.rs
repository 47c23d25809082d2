//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the boundary to the vector-similarity
//! engine used by the semantic and hybrid strategies. It is treated as an
//! opaque collaborator: upsert `(key, vector, metadata)`, delete by key,
//! and query by vector with a metadata filter.
//!
//! Implementations must be `Send + Sync`; strategies may be driven from
//! several request threads.

pub mod memory;

use anyhow::Result;

use crate::models::{Filter, Metadata};

/// A single similarity match.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    /// Chunk key passed to [`VectorStore::upsert`].
    pub key: String,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub score: f32,
}

/// Abstract similarity index over chunk vectors.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Insert or replace a vector and its metadata |
/// | [`delete`](VectorStore::delete) | Remove a key (no-op when absent) |
/// | [`query`](VectorStore::query) | Top-k similarity search under a metadata filter |
pub trait VectorStore: Send + Sync {
    fn upsert(&self, key: &str, vector: &[f32], metadata: &Metadata) -> Result<()>;

    fn delete(&self, key: &str) -> Result<()>;

    /// Return at most `top_k` matches admitted by `filter`, best first.
    fn query(&self, query_vec: &[f32], top_k: usize, filter: &Filter) -> Result<Vec<VectorMatch>>;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
