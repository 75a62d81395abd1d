//! Core data models used throughout quarry.
//!
//! These types represent the documents, chunks, and search results that flow
//! through the ingestion and retrieval pipeline. Corpus records deserialize
//! from newline-delimited JSON; the `texto`/`fuente` aliases accept the
//! field names the original corpus files were written with.

use serde::{Deserialize, Serialize};

/// A normalized source document, immutable once added to the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Globally unique id, assigned by the source (e.g. `wiki_12345`).
    pub id: String,
    /// Full document text. May be empty; empty documents are stored but
    /// excluded from chunk expansion.
    #[serde(alias = "texto", default)]
    pub text: String,
    /// Which source produced this document (e.g. `wikipedia`, `pdf`).
    #[serde(alias = "fuente", default = "default_source_tag")]
    pub source_tag: String,
    /// Opaque passthrough metadata (title, url, filename, ...).
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

fn default_source_tag() -> String {
    "unknown".to_string()
}

/// A bounded, possibly overlapping window of a document's text.
///
/// Offsets are character offsets into the parent text, so a chunk boundary
/// can never split a multibyte UTF-8 sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Id of the document this chunk was cut from.
    pub parent_id: String,
    /// Position of this chunk within the parent: 0, 1, 2, ... with no gaps.
    pub index: usize,
    /// The chunk text, a substring of the parent.
    pub text: String,
    /// Character offset of the first char of this chunk in the parent.
    pub offset_start: usize,
    /// Character offset one past the last char of this chunk in the parent.
    pub offset_end: usize,
}

impl Chunk {
    /// The derived chunk id: `{parent_id}_chunk{index}`.
    pub fn id(&self) -> String {
        format!("{}_chunk{}", self.parent_id, self.index)
    }
}

/// One entry of the persisted metadata sequence.
///
/// Position *i* in the metadata array describes the vector at position *i*
/// in the index — the positional-alignment invariant of the artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRecord {
    /// Derived chunk id (`{parent_id}_chunk{n}`).
    pub id: String,
    /// Id of the parent document.
    pub parent_id: String,
    /// Chunk index within the parent.
    pub chunk_index: usize,
    /// Full chunk text. Never truncated here; previews are presentation-only.
    pub text: String,
    /// Source tag inherited from the parent document.
    pub source_tag: String,
    /// Metadata inherited from the parent document.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// SHA-256 hex digest of `text`, folded into the artifact manifest digest.
    pub hash: String,
}

impl ChunkRecord {
    /// Best display title for this record: `metadata.title`, falling back
    /// to `metadata.filename`.
    pub fn title(&self) -> Option<&str> {
        self.metadata
            .get("title")
            .or_else(|| self.metadata.get("filename"))
            .and_then(|v| v.as_str())
    }
}

/// A single ranked retrieval result.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// 1-based rank in relevance order.
    pub rank: usize,
    /// Squared L2 distance between the query and the chunk vector.
    /// Lower is closer.
    pub score: f32,
    /// The matched chunk with its full text and metadata.
    pub record: ChunkRecord,
}

impl QueryResult {
    /// A bounded preview of the chunk text for display layers.
    ///
    /// Truncates on character boundaries and appends an ellipsis when the
    /// text was cut. The full text stays available in `record.text`; the
    /// answer assembler must always be given the full text.
    pub fn preview(&self, max_chars: usize) -> String {
        let text = &self.record.text;
        if text.chars().count() <= max_chars {
            return text.clone();
        }
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// One message in a generator conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user`, or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Counts reported by [`DocumentStore::load_from`](crate::store::DocumentStore::load_from).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records accepted into the store.
    pub loaded: usize,
    /// Malformed or unreadable records skipped with a warning.
    pub skipped: usize,
}

/// Counts reported by [`build_index`](crate::build::build_index).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Documents that produced at least one chunk.
    pub documents: usize,
    /// Documents skipped because they had no text to chunk.
    pub skipped_documents: usize,
    /// Total chunks embedded and indexed.
    pub chunks: usize,
}
