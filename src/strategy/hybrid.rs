use std::sync::Arc;

use unified_search_core::models::{Chunk, Filter};
use unified_search_core::search::{merge_max, SearchHit};

use super::{FuzzyStrategy, SearchStrategy, SemanticStrategy, StrategyKind};
use crate::config::HybridConfig;
use crate::error::Result;

/// Fuzzy and semantic retrieval run independently, then unioned.
///
/// Both score scales are normalized to `[0, 1]` (fuzzy / 100, cosine
/// clamped at 0) and a chunk found by both keeps the higher score.
pub struct HybridStrategy {
    config: HybridConfig,
    fuzzy: FuzzyStrategy,
    semantic: SemanticStrategy,
}

impl HybridStrategy {
    pub fn new(config: HybridConfig, fuzzy: FuzzyStrategy, semantic: SemanticStrategy) -> Self {
        Self {
            config,
            fuzzy,
            semantic,
        }
    }
}

fn normalize(hits: Vec<SearchHit>, scale: impl Fn(f64) -> f64) -> Vec<SearchHit> {
    hits.into_iter()
        .map(|mut hit| {
            hit.score = scale(hit.score);
            hit
        })
        .collect()
}

fn combine(fuzzy: Vec<SearchHit>, semantic: Vec<SearchHit>) -> Vec<SearchHit> {
    merge_max(vec![
        normalize(fuzzy, |s| (s / 100.0).clamp(0.0, 1.0)),
        normalize(semantic, |s| s.clamp(0.0, 1.0)),
    ])
}

impl SearchStrategy for HybridStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Hybrid
    }

    fn index(&mut self, chunks: &mut [Arc<Chunk>]) -> Result<()> {
        // Semantic first so fuzzy holds the chunks with embeddings attached.
        self.semantic.index(chunks)?;
        self.fuzzy.index(chunks)
    }

    fn search(&self, query: &str, filter: &Filter, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        let mut hits = combine(
            self.fuzzy.above_cutoff(query, filter),
            self.semantic.above_cutoff(query, filter)?,
        );
        hits.truncate(limit.unwrap_or(self.config.default_limit));
        Ok(hits)
    }

    fn raw_search(&self, query: &str, filter: &Filter) -> Result<Vec<SearchHit>> {
        Ok(combine(
            self.fuzzy.raw_search(query, filter)?,
            self.semantic.raw_search(query, filter)?,
        ))
    }
}
