//! Similarity scoring and result merging.

pub mod hybrid_search;
pub mod similarity;

pub use hybrid_search::{LEXICAL_WEIGHT, merge_hybrid, retain_sources};
pub use similarity::cosine_similarity;
