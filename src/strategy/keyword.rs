use std::collections::HashMap;
use std::sync::Arc;

use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::debug;

use unified_search_core::filter::matches;
use unified_search_core::models::{Chunk, Filter};
use unified_search_core::search::SearchHit;

use super::{SearchStrategy, StrategyKind};
use crate::config::KeywordConfig;
use crate::error::Result;

const WRITER_MEMORY_BYTES: usize = 20_000_000;

/// BM25 ranking over an in-RAM tantivy index.
///
/// Only chunks whose text changed are re-tokenized. Payload-only changes
/// swap the chunk reference without touching the index.
///
/// A writer exists only for the duration of an `index` call, so no tantivy
/// worker or merge thread outlives it.
pub struct KeywordStrategy {
    config: KeywordConfig,
    index: Index,
    reader: IndexReader,
    key_field: Field,
    text_field: Field,
    chunks: HashMap<String, Arc<Chunk>>,
}

impl KeywordStrategy {
    pub fn new(config: KeywordConfig) -> Result<Self> {
        let mut builder = Schema::builder();
        let key_field = builder.add_text_field("key", STRING | STORED);
        let text_field = builder.add_text_field("text", TEXT);
        let index = Index::create_in_ram(builder.build());

        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            config,
            index,
            reader,
            key_field,
            text_field,
            chunks: HashMap::new(),
        })
    }
}

impl SearchStrategy for KeywordStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Keyword
    }

    fn index(&mut self, chunks: &mut [Arc<Chunk>]) -> Result<()> {
        let next: HashMap<String, Arc<Chunk>> =
            chunks.iter().map(|c| (c.key.clone(), c.clone())).collect();

        let stale: Vec<&str> = self
            .chunks
            .keys()
            .filter(|key| !next.contains_key(*key))
            .map(String::as_str)
            .collect();
        let retokenize: Vec<&Arc<Chunk>> = chunks
            .iter()
            .filter(|chunk| match self.chunks.get(&chunk.key) {
                Some(prev) => prev.chunk_id != chunk.chunk_id,
                None => true,
            })
            .collect();

        if !retokenize.is_empty() || !stale.is_empty() {
            let mut writer: IndexWriter = self.index.writer_with_num_threads(1, WRITER_MEMORY_BYTES)?;
            for chunk in &retokenize {
                writer.delete_term(Term::from_field_text(self.key_field, &chunk.key));
                writer.add_document(doc!(
                    self.key_field => chunk.key.clone(),
                    self.text_field => chunk.text_content.clone(),
                ))?;
            }
            for key in &stale {
                writer.delete_term(Term::from_field_text(self.key_field, key));
            }
            writer.commit()?;
            writer.wait_merging_threads()?;
            self.reader.reload()?;
            debug!(changed = retokenize.len(), removed = stale.len(), "keyword index updated");
        }

        self.chunks = next;
        Ok(())
    }

    fn search(&self, query: &str, filter: &Filter, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        let mut hits = self.raw_search(query, filter)?;
        hits.truncate(limit.unwrap_or(self.config.default_limit));
        Ok(hits)
    }

    fn raw_search(&self, query: &str, filter: &Filter) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() || self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let parser = QueryParser::for_index(&self.index, vec![self.text_field]);
        let (parsed, _errors) = parser.parse_query_lenient(query);
        let limit = (searcher.num_docs() as usize).max(1);
        let top_docs = searcher.search(&*parsed, &TopDocs::with_limit(limit))?;

        let mut hits = Vec::new();
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let Some(key) = doc.get_first(self.key_field).and_then(|v| v.as_str()) else {
                continue;
            };
            if let Some(chunk) = self.chunks.get(key) {
                if matches(&chunk.metadata, filter) {
                    hits.push(SearchHit::new(chunk.clone(), score as f64));
                }
            }
        }
        Ok(hits)
    }
}
