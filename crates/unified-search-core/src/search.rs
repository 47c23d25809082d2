//! Scored results and the helpers strategies share for ranking them.
//!
//! # Merging
//!
//! Hybrid retrieval produces several hit lists over the same chunk set.
//! [`merge_max`] unions them by chunk key, keeping each chunk's highest
//! score, and re-sorts. [`unique_objects`] projects ranked hits onto the
//! distinct `original_json_obj`s that services consume.

use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::models::Chunk;

/// A ranked chunk with the score assigned by the producing strategy.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk: Arc<Chunk>,
    /// Strategy-specific score; higher is always better.
    pub score: f64,
}

impl SearchHit {
    pub fn new(chunk: Arc<Chunk>, score: f64) -> Self {
        Self { chunk, score }
    }

    pub fn key(&self) -> &str {
        &self.chunk.key
    }
}

/// Sort by score descending. Ties keep their incoming order.
pub fn sort_hits(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Union hit lists by chunk key, keeping the maximum score per key.
pub fn merge_max<I>(lists: I) -> Vec<SearchHit>
where
    I: IntoIterator<Item = Vec<SearchHit>>,
{
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<SearchHit> = Vec::new();

    for hit in lists.into_iter().flatten() {
        match position.get(hit.key()) {
            Some(&idx) => {
                if hit.score > merged[idx].score {
                    merged[idx].score = hit.score;
                }
            }
            None => {
                position.insert(hit.key().to_string(), merged.len());
                merged.push(hit);
            }
        }
    }

    sort_hits(&mut merged);
    merged
}

/// Distinct payloads in rank order, deduplicated by payload hash.
pub fn unique_objects(hits: &[SearchHit], limit: Option<usize>) -> Vec<Value> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut objects = Vec::new();
    for hit in hits {
        if limit.is_some_and(|l| objects.len() >= l) {
            break;
        }
        if seen.insert(hit.chunk.original_json_obj_hash.as_str()) {
            objects.push(hit.chunk.original_json_obj.clone());
        }
    }
    objects
}
