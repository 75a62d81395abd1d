//! Append-only document store.
//!
//! Holds the normalized corpus between ingestion and index building.
//! Documents are write-once and never deleted; rebuilding the index is a
//! full recompute over the store, not an incremental update. Ids must be
//! unique across all sources — a collision is an error the caller resolves
//! upstream, not something the store papers over.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use crate::error::{QuarryError, Result};
use crate::models::{Document, LoadReport};
use crate::sources::DocumentSource;

/// An in-memory, append-only collection of documents with unique ids.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: Vec<Document>,
    ids: HashSet<String>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one document.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::DuplicateId`] when a document with the same id
    /// is already stored.
    pub fn add(&mut self, doc: Document) -> Result<()> {
        if !self.ids.insert(doc.id.clone()) {
            return Err(QuarryError::DuplicateId(doc.id));
        }
        self.documents.push(doc);
        Ok(())
    }

    /// All stored documents, in insertion order.
    pub fn all(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Fetch a source and add every document it yields.
    ///
    /// Per-record problems were already skipped and counted by the source;
    /// the returned report combines that count with the number of documents
    /// actually loaded. An id collision aborts with
    /// [`QuarryError::DuplicateId`].
    pub async fn load_from(&mut self, source: &dyn DocumentSource) -> Result<LoadReport> {
        let batch = source.fetch().await?;
        let skipped = batch.skipped;
        let mut loaded = 0;
        for doc in batch.documents {
            self.add(doc)?;
            loaded += 1;
        }
        Ok(LoadReport { loaded, skipped })
    }

    /// Write the store as newline-delimited JSON, one document per line.
    pub fn save_jsonl(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(path)?;
        for doc in &self.documents {
            let line = serde_json::to_string(doc)?;
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::JsonlSource;

    fn doc(id: &str, text: &str) -> Document {
        Document {
            id: id.to_string(),
            text: text.to_string(),
            source_tag: "test".to_string(),
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_add_and_all_preserve_order() {
        let mut store = DocumentStore::new();
        store.add(doc("a", "alpha")).unwrap();
        store.add(doc("b", "beta")).unwrap();
        let ids: Vec<&str> = store.all().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut store = DocumentStore::new();
        store.add(doc("a", "alpha")).unwrap();
        let err = store.add(doc("a", "other")).unwrap_err();
        assert!(matches!(err, QuarryError::DuplicateId(id) if id == "a"));
        // The first document is untouched.
        assert_eq!(store.len(), 1);
        assert_eq!(store.all()[0].text, "alpha");
    }

    #[test]
    fn test_empty_text_accepted() {
        let mut store = DocumentStore::new();
        store.add(doc("empty", "")).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_load_from_reports_counts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"id":"a","texto":"alpha"}}"#).unwrap();
        writeln!(file, "garbage").unwrap();
        writeln!(file, r#"{{"id":"b","texto":"beta"}}"#).unwrap();

        let mut store = DocumentStore::new();
        let report = store.load_from(&JsonlSource::new(file.path())).await.unwrap();
        assert_eq!(report.loaded, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_load_from_rejects_cross_source_collision() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"id":"a","texto":"alpha"}}"#).unwrap();

        let mut store = DocumentStore::new();
        store.add(doc("a", "already here")).unwrap();
        let err = store.load_from(&JsonlSource::new(file.path())).await.unwrap_err();
        assert!(matches!(err, QuarryError::DuplicateId(_)));
    }

    #[test]
    fn test_save_jsonl_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.jsonl");

        let mut store = DocumentStore::new();
        store.add(doc("a", "alpha")).unwrap();
        store.add(doc("b", "beta")).unwrap();
        store.save_jsonl(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        let first: Document = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(first, store.all()[0]);
    }
}
