//! Error taxonomy for engine construction and retrieval.
//!
//! Only failures the caller must see are represented here. Embedding
//! failures and cache I/O failures are recovered locally (logged, never
//! returned), so they have no variant.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// The service adapter failed while producing documents.
    #[error("adapter for service '{service}' failed: {source}")]
    Adapter {
        service: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown strategy '{0}' (expected substring, keyword, fuzzy, semantic, or hybrid)")]
    UnknownStrategy(String),

    #[error("unknown engine '{engine_id}' for service '{service}'")]
    UnknownEngine { service: String, engine_id: String },

    #[error("no adapter registered for service '{0}'")]
    AdapterNotRegistered(String),

    /// A strategy's internal index failed.
    #[error("index error: {0}")]
    Index(String),
}

impl From<tantivy::TantivyError> for SearchError {
    fn from(e: tantivy::TantivyError) -> Self {
        SearchError::Index(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
