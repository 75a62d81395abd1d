//! Turning a corpus into a persisted artifact.
//!
//! The build phase chunks every stored document, embeds the chunk texts in
//! batches, and assembles a [`FlatIndex`] whose vector at position *i* was
//! produced from the metadata record at position *i*. Chunking order is the
//! document order of the store, so repeat builds over the same corpus are
//! byte-for-byte reproducible (modulo the manifest timestamp).

use crate::artifact::{text_hash, Artifact};
use crate::chunk::chunk_text;
use crate::config::ChunkingConfig;
use crate::embedding::Embedder;
use crate::error::{QuarryError, Result};
use crate::index::{FlatIndex, VectorIndex};
use crate::models::{BuildReport, ChunkRecord, Document};

/// Chunk, embed, and index a corpus.
///
/// Documents whose text chunks to nothing (empty or whitespace-only text)
/// are skipped and counted in the report; they contribute no vectors.
/// Embedding runs in batches of `batch_size` chunk texts, and batch results
/// are appended in submission order so the positional alignment between
/// vectors and records is preserved end to end.
///
/// # Errors
///
/// Returns [`QuarryError::EmptyCorpus`] when no document yields a chunk,
/// [`QuarryError::InvalidParameter`] for bad chunking parameters, and
/// propagates [`QuarryError::EmbeddingFailure`] from the provider. A failed
/// build never produces a partial artifact; the caller only persists the
/// returned value.
pub async fn build_index(
    documents: &[Document],
    chunking: &ChunkingConfig,
    embedder: &dyn Embedder,
    batch_size: usize,
) -> Result<(Artifact, BuildReport)> {
    if batch_size == 0 {
        return Err(QuarryError::InvalidParameter(
            "batch_size must be greater than zero".to_string(),
        ));
    }

    let mut report = BuildReport::default();
    let mut records: Vec<ChunkRecord> = Vec::new();

    for doc in documents {
        let chunks = chunk_text(&doc.id, &doc.text, chunking.size, chunking.overlap)?;
        if chunks.is_empty() {
            report.skipped_documents += 1;
            continue;
        }
        report.documents += 1;
        for chunk in chunks {
            records.push(ChunkRecord {
                id: chunk.id(),
                parent_id: chunk.parent_id.clone(),
                chunk_index: chunk.index,
                source_tag: doc.source_tag.clone(),
                metadata: doc.metadata.clone(),
                hash: text_hash(&chunk.text),
                text: chunk.text,
            });
        }
    }

    if records.is_empty() {
        return Err(QuarryError::EmptyCorpus);
    }
    report.chunks = records.len();

    let mut index = FlatIndex::new(embedder.dims());
    for batch in records.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        index.add(&vectors)?;
    }

    let artifact = Artifact::new(index, records, embedder.model_name())?;
    Ok((artifact, report))
}
