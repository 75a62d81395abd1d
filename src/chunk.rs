//! Deterministic overlapping text chunker.
//!
//! Splits document text into fixed-size windows of `size` characters, each
//! window starting `size - overlap` characters after the previous one. The
//! chunker is pure: the same `(text, size, overlap)` always yields the same
//! sequence of substrings, independent of any prior state.
//!
//! # Algorithm
//!
//! 1. `start = 0`; each chunk covers `[start, start + size)` clipped to the
//!    text length.
//! 2. The next chunk starts at `start + (size - overlap)`. The step is at
//!    least one character, so the loop always advances — even when `overlap`
//!    is only one less than `size`.
//! 3. As soon as a window reaches the end of the text, that window is the
//!    final chunk (the tail) and the loop stops. A further window starting
//!    inside the already-covered tail is never emitted.
//!
//! Every character of the text is covered by at least one chunk, and the
//! loop runs at most `ceil(len / (size - overlap))` times. All indexing is
//! by character, so multibyte UTF-8 sequences are never split.
//!
//! # Example
//!
//! ```rust
//! use quarry::chunk::chunk_text;
//!
//! let chunks = chunk_text("doc1", "abcdefghij", 4, 1).unwrap();
//! let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
//! assert_eq!(texts, ["abcd", "defg", "ghij"]);
//! ```

use crate::error::{QuarryError, Result};
use crate::models::Chunk;

/// Split `text` into overlapping chunks of `size` characters.
///
/// Returns chunks with contiguous indices starting at 0 and character
/// offsets into the parent text. Empty text yields an empty vec.
///
/// # Errors
///
/// Returns [`QuarryError::InvalidParameter`] when `size == 0` or
/// `overlap >= size`.
pub fn chunk_text(parent_id: &str, text: &str, size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    if size == 0 {
        return Err(QuarryError::InvalidParameter(
            "chunk size must be > 0".to_string(),
        ));
    }
    if overlap >= size {
        return Err(QuarryError::InvalidParameter(format!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            overlap, size
        )));
    }

    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every char boundary, plus the end of the text, so the
    // char-window arithmetic below can slice without re-scanning.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    boundaries.push(text.len());
    let n_chars = boundaries.len() - 1;

    let step = size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let end = (start + size).min(n_chars);
        chunks.push(Chunk {
            parent_id: parent_id.to_string(),
            index: chunks.len(),
            text: text[boundaries[start]..boundaries[end]].to_string(),
            offset_start: start,
            offset_end: end,
        });

        if end == n_chars {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_scenario_overlapping_windows() {
        let chunks = chunk_text("doc1", "abcdefghij", 4, 1).unwrap();
        assert_eq!(texts(&chunks), ["abcd", "defg", "ghij"]);
        let starts: Vec<usize> = chunks.iter().map(|c| c.offset_start).collect();
        assert_eq!(starts, [0, 3, 6]);
    }

    #[test]
    fn test_empty_text() {
        let chunks = chunk_text("doc1", "", 800, 200).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_zero_size_rejected() {
        let err = chunk_text("doc1", "abc", 0, 0).unwrap_err();
        assert!(matches!(err, QuarryError::InvalidParameter(_)));
    }

    #[test]
    fn test_overlap_not_smaller_than_size_rejected() {
        let err = chunk_text("doc1", "abc", 4, 4).unwrap_err();
        assert!(matches!(err, QuarryError::InvalidParameter(_)));
        let err = chunk_text("doc1", "abc", 4, 5).unwrap_err();
        assert!(matches!(err, QuarryError::InvalidParameter(_)));
    }

    #[test]
    fn test_text_shorter_than_size_is_single_chunk() {
        let chunks = chunk_text("doc1", "hello", 800, 200).unwrap();
        assert_eq!(texts(&chunks), ["hello"]);
        assert_eq!(chunks[0].offset_start, 0);
        assert_eq!(chunks[0].offset_end, 5);
    }

    #[test]
    fn test_overlap_one_less_than_size_terminates() {
        // Step is exactly one char; the loop must still advance and stop.
        let chunks = chunk_text("doc1", "abcdef", 3, 2).unwrap();
        assert_eq!(texts(&chunks), ["abc", "bcd", "cde", "def"]);
    }

    #[test]
    fn test_coverage_no_gaps() {
        let text: String = ('a'..='z').cycle().take(533).collect();
        for (size, overlap) in [(800, 200), (50, 10), (7, 6), (1, 0), (533, 0)] {
            let chunks = chunk_text("doc1", &text, size, overlap).unwrap();
            let mut covered = vec![false; text.chars().count()];
            for chunk in &chunks {
                for slot in &mut covered[chunk.offset_start..chunk.offset_end] {
                    *slot = true;
                }
            }
            assert!(
                covered.iter().all(|&c| c),
                "gap in coverage for size={} overlap={}",
                size,
                overlap
            );
        }
    }

    #[test]
    fn test_termination_bound() {
        let text: String = std::iter::repeat('x').take(1000).collect();
        let (size, overlap) = (10, 9);
        let chunks = chunk_text("doc1", &text, size, overlap).unwrap();
        let bound = text.len().div_ceil(size - overlap);
        assert!(chunks.len() <= bound);
    }

    #[test]
    fn test_deterministic() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);
        let a = chunk_text("doc1", &text, 100, 25).unwrap();
        let b = chunk_text("doc1", &text, 100, 25).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_indices_contiguous() {
        let text = "x".repeat(95);
        let chunks = chunk_text("doc1", &text, 10, 3).unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.id(), format!("doc1_chunk{}", i));
        }
    }

    #[test]
    fn test_multibyte_chars_not_split() {
        let text = "áéíóú".repeat(20); // 100 chars, 200 bytes
        let chunks = chunk_text("doc1", &text, 7, 2).unwrap();
        for chunk in &chunks {
            assert_eq!(chunk.text.chars().count(), chunk.offset_end - chunk.offset_start);
        }
        let last = chunks.last().unwrap();
        assert_eq!(last.offset_end, 100);
    }

    #[test]
    fn test_final_chunk_is_tail() {
        // 0..7, 5..12 clipped to 10: last chunk covers through the end.
        let chunks = chunk_text("doc1", "abcdefghij", 7, 2).unwrap();
        assert_eq!(texts(&chunks), ["abcdefg", "fghij"]);
        assert_eq!(chunks.last().unwrap().offset_end, 10);
    }
}
