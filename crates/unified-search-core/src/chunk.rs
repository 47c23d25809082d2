//! Content-addressed chunk identity.
//!
//! Every [`SearchableDocument`] becomes exactly one [`Chunk`]. Identity is
//! derived from content, never from position or time:
//!
//! - `chunk_id` — UUIDv5 over the SHA-256 of `text_content`. Identical text
//!   always yields the same id, which is what lets the embedding cache be
//!   shared across services.
//! - `original_json_obj_hash` — SHA-256 of the canonical JSON encoding of
//!   the payload (object keys sorted).
//! - `key` — `"{chunk_id}:{source}:{n}"` where `source` is the
//!   `parent_doc_id` if present, else the payload hash, and `n` counts
//!   earlier occurrences of the same `(chunk_id, source)` pair.
//!
//! # Example
//!
//! ```rust
//! use unified_search_core::chunk::{build_chunks, chunk_id};
//! use unified_search_core::models::SearchableDocument;
//!
//! let chunks = build_chunks(vec![SearchableDocument::new("Weekly sync notes")]);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].chunk_id, chunk_id("Weekly sync notes"));
//! ```

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{Chunk, SearchableDocument};

/// Lowercase hex SHA-256 of `text`.
pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Deterministic chunk id for a piece of text.
pub fn chunk_id(text: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, text_hash(text).as_bytes()).to_string()
}

/// Hash of a payload, independent of object key order.
pub fn payload_hash(obj: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(obj, &mut canonical);
    text_hash(&canonical)
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Convert adapter output into chunks, in adapter order.
pub fn build_chunks(documents: Vec<SearchableDocument>) -> Vec<Chunk> {
    let mut occurrences: HashMap<(String, String), usize> = HashMap::new();

    documents
        .into_iter()
        .map(|doc| {
            let id = chunk_id(&doc.text_content);
            let obj_hash = payload_hash(&doc.original_json_obj);
            let source = doc.parent_doc_id.clone().unwrap_or_else(|| obj_hash.clone());

            let seen = occurrences.entry((id.clone(), source.clone())).or_insert(0);
            let key = format!("{}:{}:{}", id, source, seen);
            *seen += 1;

            Chunk {
                key,
                chunk_id: id,
                original_json_obj_hash: obj_hash,
                text_content: doc.text_content,
                metadata: doc.metadata,
                original_json_obj: doc.original_json_obj,
                parent_doc_id: doc.parent_doc_id,
                embedding: None,
            }
        })
        .collect()
}
