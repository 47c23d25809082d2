//! Core data models shared by adapters, strategies, and engines.
//!
//! A [`SearchableDocument`] is what a service adapter produces on every
//! reconciliation pass. A [`Chunk`] is the identity-bearing unit the
//! engine keeps in its index; see [`crate::chunk`] for how the identity
//! is derived.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Filterable attributes attached to a document (scalars or sequences).
pub type Metadata = BTreeMap<String, Value>;

/// Caller-supplied exact-match conjunction over [`Metadata`].
pub type Filter = BTreeMap<String, Value>;

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A unit of indexable content produced by a service adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchableDocument {
    /// The searchable text.
    pub text_content: String,
    /// Arbitrary filterable attributes (e.g. `user_id`, `resource_type`).
    #[serde(default)]
    pub metadata: Metadata,
    /// The full underlying record, returned verbatim in results.
    #[serde(default = "empty_object")]
    pub original_json_obj: Value,
    /// Groups documents that originate from one logical entity (e.g. a thread).
    #[serde(default)]
    pub parent_doc_id: Option<String>,
}

impl SearchableDocument {
    pub fn new(text_content: impl Into<String>) -> Self {
        Self {
            text_content: text_content.into(),
            metadata: Metadata::new(),
            original_json_obj: empty_object(),
            parent_doc_id: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_original(mut self, original_json_obj: Value) -> Self {
        self.original_json_obj = original_json_obj;
        self
    }

    pub fn with_parent(mut self, parent_doc_id: impl Into<String>) -> Self {
        self.parent_doc_id = Some(parent_doc_id.into());
        self
    }
}

/// An indexed, content-addressed unit derived from a [`SearchableDocument`].
///
/// `chunk_id` depends only on `text_content`; `key` additionally encodes the
/// source identity so that documents sharing the same text remain
/// separately retrievable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    /// Composite identity: `"{chunk_id}:{source}:{ordinal}"`.
    pub key: String,
    /// Deterministic UUID derived from the hash of `text_content`.
    pub chunk_id: String,
    /// Hash of `original_json_obj`, detects payload-only changes.
    pub original_json_obj_hash: String,
    pub text_content: String,
    pub metadata: Metadata,
    pub original_json_obj: Value,
    pub parent_doc_id: Option<String>,
    /// Filled in by vector-requiring strategies from the embedding cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// True when `other` carries the same text and the same payload.
    pub fn same_content(&self, other: &Chunk) -> bool {
        self.chunk_id == other.chunk_id && self.original_json_obj_hash == other.original_json_obj_hash
    }
}
