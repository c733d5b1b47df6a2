//! Memory engine orchestration module.

pub mod core;

pub use core::{
    DEFAULT_MEMORY_SOURCE, IndexOptions, MemoryBackends, MemorySearch, MemoryStats,
    SearchOptions, resolve_path,
};
