//! The persisted (vector index, metadata) artifact.
//!
//! An [`Artifact`] is the single output of a build: a [`FlatIndex`] and the
//! metadata sequence describing its vectors, persisted as three co-located
//! files in the index directory:
//!
//! - `vectors.bin` — the index blob (see [`crate::index`]).
//! - `chunks.json` — JSON array of [`ChunkRecord`]; array position *i*
//!   corresponds to vector position *i*.
//! - `manifest.json` — embedding model identity, counts, and a SHA-256
//!   digest over the record sequence.
//!
//! The two halves are only meaningful together. `save` writes each file to
//! a temporary name and renames, replacing all three as a unit; `open`
//! cross-checks lengths and the record digest and refuses to load a torn or
//! mixed pair. After a successful open the artifact is read-only and safe
//! for arbitrary concurrent readers.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::error::{QuarryError, Result};
use crate::index::{FlatIndex, VectorIndex};
use crate::models::ChunkRecord;

const VECTORS_FILE: &str = "vectors.bin";
const CHUNKS_FILE: &str = "chunks.json";
const MANIFEST_FILE: &str = "manifest.json";

/// Build provenance persisted alongside the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    /// Embedding model the vectors were produced with. Queries must use the
    /// identical model.
    pub model: String,
    /// Vector dimensionality.
    pub dims: usize,
    /// Number of vectors / metadata records.
    pub count: usize,
    /// SHA-256 digest over the record sequence (id + text hash, in order).
    pub records_digest: String,
    /// RFC 3339 build timestamp.
    pub built_at: String,
}

/// A built index with its co-indexed metadata.
#[derive(Debug)]
pub struct Artifact {
    pub index: FlatIndex,
    pub records: Vec<ChunkRecord>,
    pub manifest: Manifest,
}

impl Artifact {
    /// Assemble an artifact from a freshly built index and records.
    ///
    /// The caller guarantees position *i* of `records` describes vector *i*;
    /// a length mismatch here is a builder bug surfaced as
    /// [`QuarryError::CorruptArtifact`].
    pub fn new(index: FlatIndex, records: Vec<ChunkRecord>, model: &str) -> Result<Self> {
        if index.len() != records.len() {
            return Err(QuarryError::CorruptArtifact(format!(
                "index holds {} vectors but {} metadata records were produced",
                index.len(),
                records.len()
            )));
        }
        let manifest = Manifest {
            model: model.to_string(),
            dims: index.dims(),
            count: records.len(),
            records_digest: records_digest(&records),
            built_at: chrono::Utc::now().to_rfc3339(),
        };
        Ok(Self { index, records, manifest })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Persist all three files into `dir`, replacing any previous artifact.
    ///
    /// Each file is written to a `.tmp` sibling first and renamed into
    /// place, so a crash mid-save never leaves a half-written file under the
    /// final name. The build phase is the only writer.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let vectors_tmp = dir.join(format!("{}.tmp", VECTORS_FILE));
        self.index.save(&vectors_tmp)?;

        let chunks_tmp = dir.join(format!("{}.tmp", CHUNKS_FILE));
        std::fs::write(&chunks_tmp, serde_json::to_vec(&self.records)?)?;

        let manifest_tmp = dir.join(format!("{}.tmp", MANIFEST_FILE));
        std::fs::write(&manifest_tmp, serde_json::to_vec_pretty(&self.manifest)?)?;

        std::fs::rename(vectors_tmp, dir.join(VECTORS_FILE))?;
        std::fs::rename(chunks_tmp, dir.join(CHUNKS_FILE))?;
        std::fs::rename(manifest_tmp, dir.join(MANIFEST_FILE))?;
        Ok(())
    }

    /// Load and cross-check a persisted artifact.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::CorruptArtifact`] when any file is missing or
    /// malformed, when the index length and metadata length disagree, or
    /// when the recomputed record digest differs from the manifest — the
    /// positional-alignment invariant cannot be trusted in any of those
    /// cases, and truncating silently would serve wrong chunks.
    pub fn open(dir: &Path) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let chunks_path = dir.join(CHUNKS_FILE);
        let vectors_path = dir.join(VECTORS_FILE);

        for path in [&manifest_path, &chunks_path, &vectors_path] {
            if !path.exists() {
                return Err(QuarryError::CorruptArtifact(format!(
                    "missing artifact file: {}",
                    path.display()
                )));
            }
        }

        let manifest: Manifest = serde_json::from_slice(&std::fs::read(&manifest_path)?)
            .map_err(|e| {
                QuarryError::CorruptArtifact(format!("unreadable manifest: {}", e))
            })?;
        let records: Vec<ChunkRecord> = serde_json::from_slice(&std::fs::read(&chunks_path)?)
            .map_err(|e| {
                QuarryError::CorruptArtifact(format!("unreadable metadata: {}", e))
            })?;
        let index = FlatIndex::load(&vectors_path)?;

        if index.len() != records.len() {
            return Err(QuarryError::CorruptArtifact(format!(
                "index holds {} vectors but metadata holds {} records",
                index.len(),
                records.len()
            )));
        }
        if manifest.count != records.len() {
            return Err(QuarryError::CorruptArtifact(format!(
                "manifest declares {} records, metadata holds {}",
                manifest.count,
                records.len()
            )));
        }
        let digest = records_digest(&records);
        if digest != manifest.records_digest {
            return Err(QuarryError::CorruptArtifact(
                "metadata digest does not match manifest; index and metadata are not from the same build".to_string(),
            ));
        }

        Ok(Self { index, records, manifest })
    }
}

/// SHA-256 hex digest of a chunk text.
pub fn text_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Digest over the whole record sequence: each record's id and the hash of
/// its text, in positional order. Recomputed at open time from the actual
/// text, so a record whose text was altered after build also fails the check.
fn records_digest(records: &[ChunkRecord]) -> String {
    let mut hasher = Sha256::new();
    for record in records {
        hasher.update(record.id.as_bytes());
        hasher.update(b"\0");
        hasher.update(text_hash(&record.text).as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}
