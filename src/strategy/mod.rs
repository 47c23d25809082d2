//! Retrieval strategies.
//!
//! A strategy owns the index structures for one retrieval algorithm. The
//! engine hands it the authoritative, already-reconciled chunk set through
//! [`SearchStrategy::index`]; the strategy may skip rework for chunks it
//! has seen before.
//!
//! The set of strategies is closed. [`Strategy`] is the tagged variant the
//! engine holds, built by [`Strategy::build`] from a [`StrategyKind`] and the
//! merged configuration:
//!
//! | Kind        | Scoring                                | Score cut         |
//! |-------------|----------------------------------------|-------------------|
//! | `substring` | containment, every match scores 1.0    | none              |
//! | `keyword`   | BM25 over an in-RAM tantivy index       | none              |
//! | `fuzzy`     | token/edit similarity, 0–100            | `score_cutoff`    |
//! | `semantic`  | cosine similarity of embeddings         | `score_threshold` |
//! | `hybrid`    | max of normalized fuzzy/semantic scores | per component     |
//!
//! `search` applies the cut and a per-call limit (falling back to the
//! strategy's `default_limit`);
//! `raw_search` applies neither. Both apply the metadata filter first and
//! return nothing for an empty query.

mod fuzzy;
mod hybrid;
mod keyword;
mod semantic;
mod substring;

pub use fuzzy::FuzzyStrategy;
pub use hybrid::HybridStrategy;
pub use keyword::KeywordStrategy;
pub use semantic::SemanticStrategy;
pub use substring::SubstringStrategy;

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use unified_search_core::embedding::Embedder;
use unified_search_core::models::{Chunk, Filter};
use unified_search_core::search::SearchHit;

use crate::cache::EmbeddingCache;
use crate::config::StrategySettings;
use crate::error::{Result, SearchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Substring,
    Keyword,
    Fuzzy,
    Semantic,
    Hybrid,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::Substring,
        StrategyKind::Keyword,
        StrategyKind::Fuzzy,
        StrategyKind::Semantic,
        StrategyKind::Hybrid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Substring => "substring",
            StrategyKind::Keyword => "keyword",
            StrategyKind::Fuzzy => "fuzzy",
            StrategyKind::Semantic => "semantic",
            StrategyKind::Hybrid => "hybrid",
        }
    }

    /// Whether the strategy needs chunk embeddings.
    pub fn uses_embeddings(&self) -> bool {
        matches!(self, StrategyKind::Semantic | StrategyKind::Hybrid)
    }
}

impl FromStr for StrategyKind {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SearchError::UnknownStrategy(s.to_string()))
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared collaborators available to vector-requiring strategies.
#[derive(Clone)]
pub struct StrategyContext {
    pub embedder: Arc<dyn Embedder>,
    pub cache: Arc<EmbeddingCache>,
}

/// The contract every retrieval algorithm implements.
pub trait SearchStrategy: Send {
    fn kind(&self) -> StrategyKind;

    /// Bring internal structures in line with `chunks`, the full current set.
    ///
    /// Strategies that attach data to chunks (embeddings) write it back
    /// through `chunks` so the engine retains it across passes.
    fn index(&mut self, chunks: &mut [Arc<Chunk>]) -> Result<()>;

    /// Filtered, ranked, and cut results, at most `limit` of them
    /// (the strategy's `default_limit` when `None`).
    fn search(&self, query: &str, filter: &Filter, limit: Option<usize>) -> Result<Vec<SearchHit>>;

    /// Every filtered match with its raw score.
    fn raw_search(&self, query: &str, filter: &Filter) -> Result<Vec<SearchHit>>;
}

pub enum Strategy {
    Substring(SubstringStrategy),
    Keyword(KeywordStrategy),
    Fuzzy(FuzzyStrategy),
    Semantic(SemanticStrategy),
    Hybrid(HybridStrategy),
}

impl Strategy {
    /// Construct an empty strategy of `kind` from typed settings.
    pub fn build(kind: StrategyKind, settings: &StrategySettings, ctx: &StrategyContext) -> Result<Self> {
        Ok(match kind {
            StrategyKind::Substring => Strategy::Substring(SubstringStrategy::new(settings.substring.clone())),
            StrategyKind::Keyword => Strategy::Keyword(KeywordStrategy::new(settings.keyword.clone())?),
            StrategyKind::Fuzzy => Strategy::Fuzzy(FuzzyStrategy::new(settings.fuzzy.clone())),
            StrategyKind::Semantic => {
                Strategy::Semantic(SemanticStrategy::new(settings.semantic.clone(), ctx.clone()))
            }
            StrategyKind::Hybrid => Strategy::Hybrid(HybridStrategy::new(
                settings.hybrid.clone(),
                FuzzyStrategy::new(settings.fuzzy.clone()),
                SemanticStrategy::new(settings.semantic.clone(), ctx.clone()),
            )),
        })
    }

    fn inner(&self) -> &dyn SearchStrategy {
        match self {
            Strategy::Substring(s) => s,
            Strategy::Keyword(s) => s,
            Strategy::Fuzzy(s) => s,
            Strategy::Semantic(s) => s,
            Strategy::Hybrid(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn SearchStrategy {
        match self {
            Strategy::Substring(s) => s,
            Strategy::Keyword(s) => s,
            Strategy::Fuzzy(s) => s,
            Strategy::Semantic(s) => s,
            Strategy::Hybrid(s) => s,
        }
    }
}

impl SearchStrategy for Strategy {
    fn kind(&self) -> StrategyKind {
        self.inner().kind()
    }

    fn index(&mut self, chunks: &mut [Arc<Chunk>]) -> Result<()> {
        self.inner_mut().index(chunks)
    }

    fn search(&self, query: &str, filter: &Filter, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        self.inner().search(query, filter, limit)
    }

    fn raw_search(&self, query: &str, filter: &Filter) -> Result<Vec<SearchHit>> {
        self.inner().raw_search(query, filter)
    }
}

/// Drop hits below `cutoff` and keep at most `limit`. Input must be ranked.
pub(crate) fn cut_and_limit(hits: Vec<SearchHit>, cutoff: f64, limit: usize) -> Vec<SearchHit> {
    hits.into_iter()
        .filter(|hit| hit.score >= cutoff)
        .take(limit)
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use unified_search_core::chunk::build_chunks;
    use unified_search_core::models::SearchableDocument;

    pub fn chunks(docs: Vec<SearchableDocument>) -> Vec<Arc<Chunk>> {
        build_chunks(docs).into_iter().map(Arc::new).collect()
    }

    pub fn texts(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.chunk.text_content.as_str()).collect()
    }

    pub fn user_doc(text: &str, user: &str) -> SearchableDocument {
        SearchableDocument::new(text).with_metadata("user_id", user)
    }
}
