//! Ingestion: file discovery and text chunking.

pub mod chunker;
pub mod discovery;

pub use chunker::Chunker;
pub use discovery::{discover_files, expand_home, is_indexable};
