use std::collections::BTreeSet;
use std::sync::Arc;

use strsim::normalized_levenshtein;

use unified_search_core::filter::matches;
use unified_search_core::models::{Chunk, Filter};
use unified_search_core::search::{sort_hits, SearchHit};

use super::{cut_and_limit, SearchStrategy, StrategyKind};
use crate::config::{FuzzyConfig, FuzzyScorer};
use crate::error::Result;

/// Edit-distance and token-similarity scoring on a 0–100 scale.
pub struct FuzzyStrategy {
    config: FuzzyConfig,
    /// Chunks with their pre-processed text.
    entries: Vec<(Arc<Chunk>, String)>,
}

impl FuzzyStrategy {
    pub fn new(config: FuzzyConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
        }
    }

    pub fn score_cutoff(&self) -> f64 {
        self.config.score_cutoff
    }

    /// Matches at or above the cutoff, without the result limit.
    pub(crate) fn above_cutoff(&self, query: &str, filter: &Filter) -> Vec<SearchHit> {
        let cutoff = self.config.score_cutoff;
        self.scored(query, filter)
            .into_iter()
            .filter(|hit| hit.score >= cutoff)
            .collect()
    }

    fn scored(&self, query: &str, filter: &Filter) -> Vec<SearchHit> {
        let query = process(query);
        if query.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .filter(|(chunk, _)| matches(&chunk.metadata, filter))
            .filter_map(|(chunk, text)| {
                let score = score(self.config.scorer, &query, text);
                (score > 0.0).then(|| SearchHit::new(chunk.clone(), score))
            })
            .collect();
        sort_hits(&mut hits);
        hits
    }
}

impl SearchStrategy for FuzzyStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Fuzzy
    }

    fn index(&mut self, chunks: &mut [Arc<Chunk>]) -> Result<()> {
        self.entries = chunks
            .iter()
            .map(|chunk| (chunk.clone(), process(&chunk.text_content)))
            .collect();
        Ok(())
    }

    fn search(&self, query: &str, filter: &Filter, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        Ok(cut_and_limit(
            self.scored(query, filter),
            self.config.score_cutoff,
            limit.unwrap_or(self.config.default_limit),
        ))
    }

    fn raw_search(&self, query: &str, filter: &Filter) -> Result<Vec<SearchHit>> {
        Ok(self.scored(query, filter))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Scorers
// ═══════════════════════════════════════════════════════════════════════

/// Lowercase, replace non-alphanumerics with spaces, collapse whitespace.
fn process(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    replaced
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn score(scorer: FuzzyScorer, a: &str, b: &str) -> f64 {
    match scorer {
        FuzzyScorer::Ratio => ratio(a, b),
        FuzzyScorer::PartialRatio => partial_ratio(a, b),
        FuzzyScorer::TokenSortRatio => token_sort_ratio(a, b),
        FuzzyScorer::TokenSetRatio => token_set_ratio(a, b),
        FuzzyScorer::WRatio => wratio(a, b),
    }
}

fn ratio(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b) * 100.0
}

/// Best `ratio` of the shorter string against every equal-length window of the longer.
fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let short_len = short.chars().count();
    if short_len == 0 {
        return if long.is_empty() { 100.0 } else { 0.0 };
    }

    let long_chars: Vec<char> = long.chars().collect();
    if long_chars.len() == short_len {
        return ratio(short, long);
    }

    let mut best = 0.0f64;
    for window in long_chars.windows(short_len) {
        let candidate: String = window.iter().collect();
        best = best.max(ratio(short, &candidate));
        if best >= 100.0 {
            break;
        }
    }
    best
}

fn sorted_tokens(text: &str) -> String {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn token_set_ratio(a: &str, b: &str) -> f64 {
    let set_a: BTreeSet<&str> = a.split_whitespace().collect();
    let set_b: BTreeSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let common: Vec<&str> = set_a.intersection(&set_b).copied().collect();
    let only_a: Vec<&str> = set_a.difference(&set_b).copied().collect();
    let only_b: Vec<&str> = set_b.difference(&set_a).copied().collect();

    // One side's tokens are a subset of the other's.
    if !common.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100.0;
    }

    let sect = common.join(" ");
    let join = |rest: &[&str]| {
        if sect.is_empty() {
            rest.join(" ")
        } else {
            format!("{} {}", sect, rest.join(" "))
        }
    };
    let combined_a = join(&only_a);
    let combined_b = join(&only_b);

    let mut best = ratio(&combined_a, &combined_b);
    if !sect.is_empty() {
        best = best.max(ratio(&sect, &combined_a)).max(ratio(&sect, &combined_b));
    }
    best
}

/// Weighted blend that picks the best scorer for the length ratio of the inputs.
fn wratio(a: &str, b: &str) -> f64 {
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a == 0 || len_b == 0 {
        return 0.0;
    }

    let base = ratio(a, b);
    let len_ratio = len_a.max(len_b) as f64 / len_a.min(len_b) as f64;

    if len_ratio < 1.5 {
        return base
            .max(token_sort_ratio(a, b) * 0.95)
            .max(token_set_ratio(a, b) * 0.95);
    }

    let scale = if len_ratio < 8.0 { 0.9 } else { 0.6 };
    base.max(partial_ratio(a, b) * scale)
        .max(token_set_ratio(a, b) * 0.95 * scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::{chunks, texts, user_doc};
    use unified_search_core::models::SearchableDocument;

    fn strategy(cutoff: f64, scorer: FuzzyScorer) -> FuzzyStrategy {
        let mut s = FuzzyStrategy::new(FuzzyConfig {
            score_cutoff: cutoff,
            scorer,
            default_limit: 50,
        });
        let mut c = chunks(vec![
            user_doc("Weekly sync notes", "u1"),
            user_doc("Quarterly budget review", "u1"),
            user_doc("weekly sync agenda", "u2"),
        ]);
        s.index(&mut c).unwrap();
        s
    }

    #[test]
    fn test_tolerates_typos() {
        let s = strategy(70.0, FuzzyScorer::WRatio);
        let hits = s.search("weekly sinc", &Filter::new(), None).unwrap();
        let found = texts(&hits);
        assert!(found.contains(&"Weekly sync notes"));
        assert!(!found.contains(&"Quarterly budget review"));
    }

    #[test]
    fn test_raw_search_ignores_cutoff() {
        let s = strategy(99.0, FuzzyScorer::WRatio);
        let cut = s.search("weekly sinc", &Filter::new(), None).unwrap();
        let raw = s.raw_search("weekly sinc", &Filter::new()).unwrap();
        assert!(raw.len() > cut.len());
        for hit in &cut {
            assert!(raw.iter().any(|r| r.key() == hit.key()));
        }
    }

    #[test]
    fn test_raising_cutoff_never_adds_results() {
        let mut previous = usize::MAX;
        for cutoff in [0.0, 30.0, 60.0, 80.0, 95.0, 100.0] {
            let count = strategy(cutoff, FuzzyScorer::WRatio)
                .search("weekly sync", &Filter::new(), None)
                .unwrap()
                .len();
            assert!(count <= previous);
            previous = count;
        }
    }

    #[test]
    fn test_filter_restricts_results() {
        let s = strategy(50.0, FuzzyScorer::WRatio);
        let mut filter = Filter::new();
        filter.insert("user_id".into(), "u2".into());
        assert_eq!(texts(&s.search("weekly sync", &filter, None).unwrap()), vec!["weekly sync agenda"]);
    }

    #[test]
    fn test_results_sorted_descending() {
        let s = strategy(0.0, FuzzyScorer::Ratio);
        let hits = s.raw_search("weekly sync notes", &Filter::new()).unwrap();
        assert_eq!(hits[0].chunk.text_content, "Weekly sync notes");
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_empty_query() {
        let s = strategy(0.0, FuzzyScorer::WRatio);
        assert!(s.search("  !! ", &Filter::new(), None).unwrap().is_empty());
    }

    #[test]
    fn test_scorers() {
        assert_eq!(ratio("abc", "abc"), 100.0);
        assert_eq!(partial_ratio("sync", "weekly sync notes"), 100.0);
        assert_eq!(token_sort_ratio("notes sync", "sync notes"), 100.0);
        assert_eq!(token_set_ratio("sync", "weekly sync notes"), 100.0);
        assert!(wratio("weekly", "weekly sync notes") >= 80.0);
        assert_eq!(wratio("", "abc"), 0.0);
        assert_eq!(process("  Hello,   World! "), "hello world");
    }

    #[test]
    fn test_unicode_windows() {
        let mut s = FuzzyStrategy::new(FuzzyConfig {
            score_cutoff: 90.0,
            scorer: FuzzyScorer::PartialRatio,
            default_limit: 50,
        });
        let mut c = chunks(vec![SearchableDocument::new("Réunion à Zürich demain")]);
        s.index(&mut c).unwrap();
        assert_eq!(s.search("zürich", &Filter::new(), None).unwrap().len(), 1);
    }
}
