//! The adapter contract between a simulated service and the search core.
//!
//! An adapter converts the service's live data into [`SearchableDocument`]s.
//! Only `SearchableDocument` crosses this boundary; the engine never sees
//! service-specific types.
//!
//! # Example
//!
//! ```rust
//! use anyhow::Result;
//! use unified_search_core::adapter::Adapter;
//! use unified_search_core::models::SearchableDocument;
//!
//! struct NotesAdapter;
//!
//! impl Adapter for NotesAdapter {
//!     fn service_name(&self) -> &str { "notes" }
//!
//!     fn to_searchable_documents(&self) -> Result<Vec<SearchableDocument>> {
//!         Ok(vec![SearchableDocument::new("buy milk")])
//!     }
//! }
//! ```

use anyhow::Result;
use parking_lot::RwLock;

use crate::models::SearchableDocument;

/// Converts a service's current state into searchable documents.
///
/// Implementations must be side-effect free and must not memoize: the
/// engine calls [`to_searchable_documents`](Adapter::to_searchable_documents)
/// at the start of every query and does its own diffing.
pub trait Adapter: Send + Sync {
    /// Stable per-service identity (e.g. `"gmail"`).
    fn service_name(&self) -> &str;

    /// Snapshot the service's data as documents.
    fn to_searchable_documents(&self) -> Result<Vec<SearchableDocument>>;
}

/// Adapter over a mutable in-memory document list.
///
/// Useful for services whose state already lives in memory, and for tests
/// that need to mutate the data between queries.
pub struct InMemoryAdapter {
    service: String,
    documents: RwLock<Vec<SearchableDocument>>,
}

impl InMemoryAdapter {
    pub fn new(service: impl Into<String>, documents: Vec<SearchableDocument>) -> Self {
        Self {
            service: service.into(),
            documents: RwLock::new(documents),
        }
    }

    /// Replace the whole document set.
    pub fn set_documents(&self, documents: Vec<SearchableDocument>) {
        *self.documents.write() = documents;
    }

    pub fn push(&self, document: SearchableDocument) {
        self.documents.write().push(document);
    }
}

impl Adapter for InMemoryAdapter {
    fn service_name(&self) -> &str {
        &self.service
    }

    fn to_searchable_documents(&self) -> Result<Vec<SearchableDocument>> {
        Ok(self.documents.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_adapter_reflects_mutations() {
        let adapter = InMemoryAdapter::new("notes", vec![SearchableDocument::new("a")]);
        assert_eq!(adapter.service_name(), "notes");
        assert_eq!(adapter.to_searchable_documents().unwrap().len(), 1);

        adapter.push(SearchableDocument::new("b"));
        assert_eq!(adapter.to_searchable_documents().unwrap().len(), 2);

        adapter.set_documents(Vec::new());
        assert!(adapter.to_searchable_documents().unwrap().is_empty());
    }
}
