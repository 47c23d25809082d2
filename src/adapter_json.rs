//! Adapter over a JSON file of searchable documents.
//!
//! The file holds an array of documents:
//!
//! ```json
//! [
//!   { "text_content": "Weekly sync notes",
//!     "metadata": { "user_id": "u1" },
//!     "original_json_obj": { "id": 7 } }
//! ]
//! ```
//!
//! The file is re-read on every reconciliation, so edits show up on the
//! next query.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use unified_search_core::adapter::Adapter;
use unified_search_core::models::SearchableDocument;

pub struct JsonFileAdapter {
    service: String,
    path: PathBuf,
}

impl JsonFileAdapter {
    pub fn new(service: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            service: service.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Adapter for JsonFileAdapter {
    fn service_name(&self) -> &str {
        &self.service
    }

    fn to_searchable_documents(&self) -> Result<Vec<SearchableDocument>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read documents file: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse documents file: {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reads_current_file_contents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("docs.json");
        std::fs::write(&path, r#"[{"text_content": "first"}]"#).unwrap();

        let adapter = JsonFileAdapter::new("notes", &path);
        let docs = adapter.to_searchable_documents().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].original_json_obj, serde_json::json!({}));

        std::fs::write(
            &path,
            r#"[{"text_content": "a", "parent_doc_id": "t1"}, {"text_content": "b", "metadata": {"tags": ["x"]}}]"#,
        )
        .unwrap();
        let docs = adapter.to_searchable_documents().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].parent_doc_id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_missing_or_malformed_file_errors() {
        let tmp = TempDir::new().unwrap();
        let adapter = JsonFileAdapter::new("notes", tmp.path().join("missing.json"));
        assert!(adapter.to_searchable_documents().is_err());

        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(JsonFileAdapter::new("notes", &path).to_searchable_documents().is_err());
    }
}
