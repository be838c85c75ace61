//! Text chunking.
//!
//! The [`Chunker`] trait is the seam between the ingestion
//! coordinator and whatever splitting strategy a deployment uses.
//! [`WindowChunker`] is the reference implementation: a sliding
//! character window of `chunk_size` characters advancing by
//! `chunk_size - chunk_overlap`, so consecutive chunks share
//! `chunk_overlap` characters of context.

/// Splits document text into an ordered sequence of chunk strings.
pub trait Chunker: Send + Sync {
    fn split(&self, text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String>;
}

/// Sliding character window with overlap.
///
/// Operates on `char` boundaries, never byte offsets, so multi-byte
/// input cannot be split mid-codepoint. Empty text yields no chunks.
#[derive(Debug, Default)]
pub struct WindowChunker;

impl Chunker for WindowChunker {
    fn split(&self, text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let chunk_size = chunk_size.max(1);
        // Overlap must leave the window room to advance.
        let overlap = chunk_overlap.min(chunk_size - 1);
        let step = chunk_size - overlap;

        let chars: Vec<char> = text.chars().collect();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_no_chunks() {
        assert!(WindowChunker.split("", 500, 50).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = WindowChunker.split("hello", 500, 50);
        assert_eq!(chunks, vec!["hello".to_string()]);
    }

    #[test]
    fn test_no_overlap() {
        let chunks = WindowChunker.split("abcdefghij", 4, 0);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_overlap_shares_suffix() {
        let chunks = WindowChunker.split("abcdefgh", 4, 2);
        assert_eq!(chunks, vec!["abcd", "cdef", "efgh"]);
    }

    #[test]
    fn test_overlap_clamped_below_chunk_size() {
        // overlap >= chunk_size would never advance; it is clamped.
        let chunks = WindowChunker.split("abcdef", 2, 5);
        assert_eq!(chunks, vec!["ab", "bc", "cd", "de", "ef"]);
    }

    #[test]
    fn test_multibyte_boundaries() {
        // Windows are counted in chars, so multi-byte input cannot
        // panic on a mid-codepoint slice.
        let chunks = WindowChunker.split("héllo wörld", 4, 1);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 4);
        }
    }

    #[test]
    fn test_exact_coverage_2400_chars() {
        // 2,400 characters with a 1,500-char window and no overlap
        // split into exactly two chunks.
        let text = "x".repeat(2400);
        let chunks = WindowChunker.split(&text, 1500, 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 1500);
        assert_eq!(chunks[1].len(), 900);
    }
}
