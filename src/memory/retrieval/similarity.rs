//! Vector similarity.

use crate::memory::core::errors::{MemoryError, MemoryResult};

/// Cosine similarity between two vectors, in `[-1, 1]`.
///
/// A zero-magnitude vector scores `0.0` against anything.
///
/// # Errors
/// Returns `DimensionMismatch` if the vectors differ in length; mixing
/// providers is a caller bug, not something to paper over.
pub fn cosine_similarity(query: &[f32], other: &[f32]) -> MemoryResult<f32> {
    if query.len() != other.len() {
        return Err(MemoryError::DimensionMismatch {
            expected: query.len(),
            actual: other.len(),
        });
    }

    let mut dot = 0.0_f32;
    let mut norm_q = 0.0_f32;
    let mut norm_o = 0.0_f32;
    for (q, o) in query.iter().zip(other) {
        dot = q.mul_add(*o, dot);
        norm_q = q.mul_add(*q, norm_q);
        norm_o = o.mul_add(*o, norm_o);
    }

    if norm_q == 0.0 || norm_o == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_q.sqrt() * norm_o.sqrt()))
}
