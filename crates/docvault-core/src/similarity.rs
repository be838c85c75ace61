//! Cosine-similarity ranking and vector encoding.
//!
//! [`rank`] is the single scoring path used by every store
//! implementation, so corpus-wide and per-document searches order
//! results identically: score descending, ties broken by ascending
//! `vector_id`, at most `top_k` results at or above the threshold.
//!
//! Vectors persist as little-endian `f32` BLOBs; [`vec_to_blob`] and
//! [`blob_to_vec`] are the two sides of that encoding.

use tracing::warn;

use crate::error::{Result, StoreError};
use crate::models::{DocId, SearchHit, VectorId};

/// A stored vector under consideration for ranking.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub vector_id: VectorId,
    pub doc_id: DocId,
    pub embedding: Vec<f32>,
}

/// Compute cosine similarity between two vectors.
///
/// Dot product divided by the product of magnitudes; ranges `[-1, 1]`.
/// Returns `0.0` for empty vectors, mismatched lengths, or a
/// zero-magnitude operand. Callers that need to distinguish those
/// cases check [`magnitude`] first, as [`rank`] does.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Euclidean magnitude of a vector.
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Rank candidates against a query vector.
///
/// Fails with [`StoreError::ZeroNormQuery`] if the query has zero
/// magnitude (no ranking is possible). A zero-magnitude or
/// wrong-dimensionality *candidate* is just one non-comparable item:
/// it is skipped with a warning instead of aborting the search.
pub fn rank(
    query: &[f32],
    candidates: Vec<Candidate>,
    threshold: f32,
    top_k: usize,
) -> Result<Vec<SearchHit>> {
    if magnitude(query) < f32::EPSILON {
        return Err(StoreError::ZeroNormQuery);
    }

    let mut hits: Vec<SearchHit> = Vec::with_capacity(candidates.len());
    for cand in candidates {
        if cand.embedding.len() != query.len() {
            warn!(
                vector_id = %cand.vector_id,
                expected = query.len(),
                actual = cand.embedding.len(),
                "skipping candidate with mismatched dimensionality"
            );
            continue;
        }
        if magnitude(&cand.embedding) < f32::EPSILON {
            warn!(vector_id = %cand.vector_id, "skipping zero-magnitude candidate");
            continue;
        }

        let score = cosine_similarity(query, &cand.embedding);
        if score >= threshold {
            hits.push(SearchHit {
                vector_id: cand.vector_id,
                doc_id: cand.doc_id,
                score,
            });
        }
    }

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.vector_id.cmp(&b.vector_id))
    });
    hits.truncate(top_k);

    Ok(hits)
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
