//! Error types for the quarry pipeline.
//!
//! The taxonomy separates caller bugs (`InvalidParameter`), ingestion
//! collisions (`DuplicateId`), fatal build-time conditions (`EmptyCorpus`,
//! `EmbeddingFailure`), artifact consistency failures (`CorruptArtifact`,
//! `ModelMismatch`), and query-time generator problems (`GenerationFailure`,
//! `GenerationTimeout`). Per-record ingestion problems (a bad JSONL line, an
//! unreadable PDF) are not errors at all — sources skip and count them.

use thiserror::Error;

/// Errors produced by the chunking, indexing, retrieval, and answer layers.
#[derive(Debug, Error)]
pub enum QuarryError {
    /// A caller supplied an out-of-contract parameter (bad chunk size,
    /// overlap >= size, k = 0, wrong query dimensionality). Not retryable.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A document id already exists in the store. The combined corpus must
    /// reject collisions; the caller resolves them upstream.
    #[error("duplicate document id: {0}")]
    DuplicateId(String),

    /// Chunk expansion produced zero chunks across the whole corpus.
    /// Persisting an empty index would be silently useless, so the build fails.
    #[error("empty corpus: no chunks were produced from any document")]
    EmptyCorpus,

    /// The embedding backend failed or returned a malformed response.
    /// Fatal at build time; no partial artifact is persisted.
    #[error("embedding failed ({provider}): {message}")]
    EmbeddingFailure {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The persisted artifact is internally inconsistent (index length vs
    /// metadata length, bad file header, digest mismatch). Fatal at load
    /// time; the artifact is never silently truncated.
    #[error("corrupt artifact: {0}")]
    CorruptArtifact(String),

    /// The artifact was built with a different embedding model than the one
    /// configured for querying. Build and query embeddings must come from
    /// the identical model.
    #[error("embedding model mismatch: artifact built with '{built_with}', configured '{configured}'")]
    ModelMismatch {
        /// Model recorded in the artifact manifest.
        built_with: String,
        /// Model the query-side embedder reports.
        configured: String,
    },

    /// The answer generator failed (connectivity, bad response).
    #[error("generation failed ({provider}): {message}")]
    GenerationFailure {
        /// The generator backend that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The answer generator did not respond within the configured timeout.
    #[error("generation timed out ({provider}) after {secs}s")]
    GenerationTimeout {
        /// The generator backend that timed out.
        provider: String,
        /// The configured timeout in seconds.
        secs: u64,
    },

    /// I/O error while reading or writing the corpus or artifact files.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error in corpus or artifact files.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A convenience result type for quarry operations.
pub type Result<T> = std::result::Result<T, QuarryError>;
