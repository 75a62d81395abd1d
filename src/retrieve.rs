//! Query-time retrieval over an opened artifact.
//!
//! A [`Retriever`] binds together the three things a query needs: the
//! opened [`Artifact`], and the embedder that must be the same model the
//! artifact was built with. Construction fails on a model mismatch rather
//! than letting queries run in the wrong vector space and return
//! plausible-looking garbage.

use crate::artifact::Artifact;
use crate::embedding::Embedder;
use crate::error::{QuarryError, Result};
use crate::index::VectorIndex;
use crate::models::QueryResult;

pub struct Retriever {
    artifact: Artifact,
    embedder: Box<dyn Embedder>,
}

impl Retriever {
    /// Bind an embedder to an opened artifact.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::ModelMismatch`] when the configured embedding
    /// model differs from the one recorded in the artifact manifest. The
    /// operator either fixes the config or rebuilds the index.
    pub fn new(artifact: Artifact, embedder: Box<dyn Embedder>) -> Result<Self> {
        if artifact.manifest.model != embedder.model_name() {
            return Err(QuarryError::ModelMismatch {
                built_with: artifact.manifest.model.clone(),
                configured: embedder.model_name().to_string(),
            });
        }
        Ok(Self { artifact, embedder })
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    /// Retrieve the `k` chunks closest to `query`, best first.
    ///
    /// Results carry 1-based contiguous ranks. Fewer than `k` results come
    /// back when the index is smaller than `k`. A position the index
    /// returns that has no metadata record is dropped rather than served
    /// with wrong text; the artifact consistency checks make that
    /// unreachable in practice.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<QueryResult>> {
        if k == 0 {
            return Err(QuarryError::InvalidParameter(
                "top_k must be greater than zero".to_string(),
            ));
        }
        if query.trim().is_empty() {
            return Err(QuarryError::InvalidParameter(
                "query must not be empty".to_string(),
            ));
        }

        let vector = self.embedder.embed_query(query).await?;
        let hits = self.artifact.index.search(&vector, k)?;

        let mut results = Vec::with_capacity(hits.len());
        for (position, score) in hits {
            let Some(record) = self.artifact.records.get(position) else {
                continue;
            };
            results.push(QueryResult {
                rank: results.len() + 1,
                score,
                record: record.clone(),
            });
        }
        Ok(results)
    }
}
