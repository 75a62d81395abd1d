//! Vector index abstraction and flat exact-scan implementation.
//!
//! [`FlatIndex`] is a brute-force squared-L2 nearest-neighbor index: exact
//! results (recall 1.0) at O(n × d) per query, which is the right trade for
//! a corpus of a few thousand chunks. The index stores only vectors and
//! their insertion ordinal — joining positions back to chunk metadata is the
//! retriever's job, which is why the positional-alignment invariant matters.
//!
//! On disk the index is a little-endian binary blob:
//!
//! ```text
//! [magic "qvi1"] [dims: u32] [count: u64] [count × dims × f32]
//! ```

use std::path::Path;

use crate::error::{QuarryError, Result};

/// Magic bytes at the start of a persisted index file.
const INDEX_MAGIC: &[u8; 4] = b"qvi1";

/// Nearest-neighbor search over a set of fixed-length vectors.
///
/// Implementations must be `Send + Sync`; the query phase runs arbitrary
/// concurrent readers over an index that is read-only after build.
pub trait VectorIndex: Send + Sync {
    /// Vector dimensionality.
    fn dims(&self) -> usize;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append vectors in order. Insertion order defines each vector's
    /// position, which must match its metadata position.
    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()>;

    /// Return up to `k` `(position, distance)` pairs, closest first.
    ///
    /// Fewer than `k` pairs are returned when the index holds fewer than
    /// `k` vectors. Ties are broken by ascending position, so results are
    /// deterministic.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>>;
}

/// Exact flat index over squared L2 distance.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dims: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dims: usize) -> Self {
        Self { dims, data: Vec::new() }
    }

    /// Write the index to `path` in the binary blob format.
    pub fn save(&self, path: &Path) -> Result<()> {
        let count = self.len() as u64;
        let mut bytes = Vec::with_capacity(16 + self.data.len() * 4);
        bytes.extend_from_slice(INDEX_MAGIC);
        bytes.extend_from_slice(&(self.dims as u32).to_le_bytes());
        bytes.extend_from_slice(&count.to_le_bytes());
        for &v in &self.data {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Read an index previously written by [`save`](FlatIndex::save).
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::CorruptArtifact`] when the header is malformed
    /// or the payload length disagrees with the declared dims × count.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        if bytes.len() < 16 || &bytes[0..4] != INDEX_MAGIC {
            return Err(QuarryError::CorruptArtifact(format!(
                "{}: not a quarry vector index",
                path.display()
            )));
        }

        let dims = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let count = u64::from_le_bytes([
            bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
        ]) as usize;

        let payload = &bytes[16..];
        let expected = dims
            .checked_mul(count)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| {
                QuarryError::CorruptArtifact(format!(
                    "{}: implausible header (dims={}, count={})",
                    path.display(),
                    dims,
                    count
                ))
            })?;
        if payload.len() != expected {
            return Err(QuarryError::CorruptArtifact(format!(
                "{}: payload is {} bytes, header declares {} (dims={}, count={})",
                path.display(),
                payload.len(),
                expected,
                dims,
                count
            )));
        }

        let data = payload
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Self { dims, data })
    }

    /// Borrow the stored vector at `position`.
    pub fn vector(&self, i: usize) -> &[f32] {
        &self.data[i * self.dims..(i + 1) * self.dims]
    }
}

impl VectorIndex for FlatIndex {
    fn dims(&self) -> usize {
        self.dims
    }

    fn len(&self) -> usize {
        if self.dims == 0 {
            return 0;
        }
        self.data.len() / self.dims
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        for v in vectors {
            if v.len() != self.dims {
                return Err(QuarryError::InvalidParameter(format!(
                    "vector has {} dims, index expects {}",
                    v.len(),
                    self.dims
                )));
            }
            self.data.extend_from_slice(v);
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dims {
            return Err(QuarryError::InvalidParameter(format!(
                "query has {} dims, index expects {}",
                query.len(),
                self.dims
            )));
        }

        let mut scored: Vec<(usize, f32)> = (0..self.len())
            .map(|i| (i, squared_l2(query, self.vector(i))))
            .collect();

        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

/// Squared Euclidean distance. Skipping the final sqrt preserves ordering.
fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> FlatIndex {
        let mut index = FlatIndex::new(2);
        index
            .add(&[
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![0.0, 2.0],
                vec![3.0, 3.0],
            ])
            .unwrap();
        index
    }

    #[test]
    fn test_search_orders_by_ascending_distance() {
        let index = sample_index();
        let results = index.search(&[0.0, 0.0], 4).unwrap();
        let positions: Vec<usize> = results.iter().map(|(p, _)| *p).collect();
        assert_eq!(positions, [0, 1, 2, 3]);
        for pair in results.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[test]
    fn test_search_returns_at_most_k() {
        let index = sample_index();
        assert_eq!(index.search(&[0.0, 0.0], 2).unwrap().len(), 2);
    }

    #[test]
    fn test_search_k_larger_than_index() {
        let index = sample_index();
        // k = 10 against 4 vectors: all 4 come back, no sentinels.
        assert_eq!(index.search(&[0.0, 0.0], 10).unwrap().len(), 4);
    }

    #[test]
    fn test_search_tie_broken_by_position() {
        let mut index = FlatIndex::new(1);
        index.add(&[vec![1.0], vec![1.0], vec![1.0]]).unwrap();
        let results = index.search(&[1.0], 3).unwrap();
        let positions: Vec<usize> = results.iter().map(|(p, _)| *p).collect();
        assert_eq!(positions, [0, 1, 2]);
    }

    #[test]
    fn test_add_rejects_wrong_dims() {
        let mut index = FlatIndex::new(3);
        let err = index.add(&[vec![1.0, 2.0]]).unwrap_err();
        assert!(matches!(err, QuarryError::InvalidParameter(_)));
    }

    #[test]
    fn test_search_rejects_wrong_query_dims() {
        let index = sample_index();
        let err = index.search(&[1.0], 2).unwrap_err();
        assert!(matches!(err, QuarryError::InvalidParameter(_)));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.bin");

        let index = sample_index();
        index.save(&path).unwrap();
        let loaded = FlatIndex::load(&path).unwrap();
        assert_eq!(loaded, index);
    }

    #[test]
    fn test_load_rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.bin");
        std::fs::write(&path, b"definitely not an index file").unwrap();

        let err = FlatIndex::load(&path).unwrap_err();
        assert!(matches!(err, QuarryError::CorruptArtifact(_)));
    }

    #[test]
    fn test_load_rejects_truncated_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.bin");

        let index = sample_index();
        index.save(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();

        let err = FlatIndex::load(&path).unwrap_err();
        assert!(matches!(err, QuarryError::CorruptArtifact(_)));
    }
}
