use std::sync::Arc;

use unified_search_core::filter::matches;
use unified_search_core::models::{Chunk, Filter};
use unified_search_core::search::SearchHit;

use super::{SearchStrategy, StrategyKind};
use crate::config::SubstringConfig;
use crate::error::Result;

/// Containment match. Results keep adapter order.
pub struct SubstringStrategy {
    config: SubstringConfig,
    chunks: Vec<Arc<Chunk>>,
    /// Lowercased text per chunk, parallel to `chunks`. Empty when case-sensitive.
    folded: Vec<String>,
}

impl SubstringStrategy {
    pub fn new(config: SubstringConfig) -> Self {
        Self {
            config,
            chunks: Vec::new(),
            folded: Vec::new(),
        }
    }
}

impl SearchStrategy for SubstringStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Substring
    }

    fn index(&mut self, chunks: &mut [Arc<Chunk>]) -> Result<()> {
        self.chunks = chunks.to_vec();
        self.folded = if self.config.case_sensitive {
            Vec::new()
        } else {
            chunks.iter().map(|c| c.text_content.to_lowercase()).collect()
        };
        Ok(())
    }

    fn search(&self, query: &str, filter: &Filter, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        let mut hits = self.raw_search(query, filter)?;
        hits.truncate(limit.unwrap_or(self.config.default_limit));
        Ok(hits)
    }

    fn raw_search(&self, query: &str, filter: &Filter) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let needle = if self.config.case_sensitive {
            query.to_string()
        } else {
            query.to_lowercase()
        };

        let hits = self
            .chunks
            .iter()
            .enumerate()
            .filter(|(_, chunk)| matches(&chunk.metadata, filter))
            .filter(|(i, chunk)| {
                let haystack = if self.config.case_sensitive {
                    chunk.text_content.as_str()
                } else {
                    self.folded[*i].as_str()
                };
                haystack.contains(&needle)
            })
            .map(|(_, chunk)| SearchHit::new(chunk.clone(), 1.0))
            .collect();
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::{chunks, texts, user_doc};
    use unified_search_core::models::SearchableDocument;

    fn strategy(case_sensitive: bool, limit: usize) -> SubstringStrategy {
        SubstringStrategy::new(SubstringConfig {
            case_sensitive,
            default_limit: limit,
        })
    }

    #[test]
    fn test_case_insensitive_by_default() {
        let mut s = strategy(false, 50);
        let mut c = chunks(vec![
            SearchableDocument::new("Weekly sync notes"),
            SearchableDocument::new("Quarterly planning"),
        ]);
        s.index(&mut c).unwrap();

        let hits = s.search("weekly", &Filter::new(), None).unwrap();
        assert_eq!(texts(&hits), vec!["Weekly sync notes"]);
        assert_eq!(hits[0].score, 1.0);
    }

    #[test]
    fn test_case_sensitive() {
        let mut s = strategy(true, 50);
        let mut c = chunks(vec![SearchableDocument::new("Weekly sync notes")]);
        s.index(&mut c).unwrap();
        assert!(s.search("weekly", &Filter::new(), None).unwrap().is_empty());
        assert_eq!(s.search("Weekly", &Filter::new(), None).unwrap().len(), 1);
    }

    #[test]
    fn test_keeps_adapter_order_and_limit() {
        let mut s = strategy(false, 2);
        let mut c = chunks(vec![
            SearchableDocument::new("note c"),
            SearchableDocument::new("note a"),
            SearchableDocument::new("note b"),
        ]);
        s.index(&mut c).unwrap();

        assert_eq!(texts(&s.search("note", &Filter::new(), None).unwrap()), vec!["note c", "note a"]);
        assert_eq!(s.raw_search("note", &Filter::new()).unwrap().len(), 3);
    }

    #[test]
    fn test_filter_and_empty_query() {
        let mut s = strategy(false, 50);
        let mut c = chunks(vec![user_doc("hello there", "u1"), user_doc("hello again", "u2")]);
        s.index(&mut c).unwrap();

        let mut filter = Filter::new();
        filter.insert("user_id".into(), "u2".into());
        assert_eq!(texts(&s.search("hello", &filter, None).unwrap()), vec!["hello again"]);
        assert!(s.search("", &Filter::new(), None).unwrap().is_empty());
        assert!(s.search(" ", &Filter::new(), None).unwrap().is_empty());
        assert!(s.raw_search("  \t", &Filter::new()).unwrap().is_empty());
    }
}
