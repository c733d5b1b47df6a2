//! Row encoding: embeddings as little-endian `f32` blobs, metadata as JSON text.

use crate::memory::core::document::Metadata;

/// Width of one encoded component.
const F32_WIDTH: usize = std::mem::size_of::<f32>();

/// Encode an embedding as a fixed-width blob.
#[must_use]
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a blob written by [`encode_embedding`].
///
/// # Errors
/// Returns a description of the problem if the blob length is not a multiple of 4.
pub fn decode_embedding(blob: &[u8]) -> Result<Vec<f32>, String> {
    if blob.len() % F32_WIDTH != 0 {
        return Err(format!(
            "embedding blob of {} bytes is not a multiple of {F32_WIDTH}",
            blob.len()
        ));
    }

    Ok(blob
        .chunks_exact(F32_WIDTH)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect())
}

/// Encode metadata as JSON text.
///
/// # Errors
/// Returns an error if a value cannot be serialized.
pub fn encode_metadata(metadata: &Metadata) -> serde_json::Result<String> {
    serde_json::to_string(metadata)
}

/// Decode metadata JSON text.
///
/// # Errors
/// Returns an error if the text is not a JSON object.
pub fn decode_metadata(text: &str) -> serde_json::Result<Metadata> {
    serde_json::from_str(text)
}
