//! In-process cache of decoded embeddings.
//!
//! The cache is never authoritative. Writers touch it only after the durable
//! write has committed; deletes and updates invalidate entries.
//!
//! Every invalidation bumps an epoch. A storage read that started before the
//! bump may have seen rows that are now gone, so its results are not cached.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::Mutex;

use crate::memory::core::errors::{MemoryError, MemoryResult};
use crate::memory::core::ids::DocumentId;

/// Decoded embedding shared between the cache and readers.
pub type CachedEmbedding = Arc<[f32]>;

/// Result of [`EmbeddingCache::lookup_many`].
pub struct CacheLookup {
    /// Cached vectors.
    pub hits: Vec<(DocumentId, CachedEmbedding)>,
    /// Ids that need a storage read.
    pub misses: Vec<DocumentId>,
    /// Invalidation epoch observed by the lookup; pass it to
    /// [`EmbeddingCache::fill_missing`].
    pub epoch: u64,
}

struct CacheState {
    entries: LruCache<DocumentId, CachedEmbedding>,
    epoch: u64,
}

impl CacheState {
    fn invalidate(&mut self, id: &DocumentId) {
        self.entries.pop(id);
        self.epoch = self.epoch.wrapping_add(1);
    }
}

/// Bounded LRU map from document id to decoded embedding.
pub struct EmbeddingCache {
    state: Mutex<CacheState>,
}

impl EmbeddingCache {
    /// Create a cache holding at most `capacity` vectors.
    ///
    /// # Errors
    /// Returns an error if `capacity` is zero.
    pub fn new(capacity: usize) -> MemoryResult<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            MemoryError::InvalidConfig("storage.cache_capacity must be > 0".to_string())
        })?;
        Ok(Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                epoch: 0,
            }),
        })
    }

    /// Look up a vector, marking it recently used.
    pub async fn get(&self, id: &DocumentId) -> Option<CachedEmbedding> {
        self.state.lock().await.entries.get(id).cloned()
    }

    /// Insert or replace a vector.
    pub async fn insert(&self, id: DocumentId, embedding: CachedEmbedding) {
        self.state.lock().await.entries.put(id, embedding);
    }

    /// Insert several vectors under one lock.
    pub async fn insert_many(&self, items: impl IntoIterator<Item = (DocumentId, CachedEmbedding)>) {
        let mut state = self.state.lock().await;
        for (id, embedding) in items {
            state.entries.put(id, embedding);
        }
    }

    /// Insert vectors loaded from durable storage, keeping any entry already
    /// present. A write that committed while the load was in flight has
    /// already refreshed its entry and must not be overwritten by the older read.
    ///
    /// Nothing is inserted if any entry was invalidated since `epoch`.
    pub async fn fill_missing(
        &self,
        epoch: u64,
        items: impl IntoIterator<Item = (DocumentId, CachedEmbedding)>,
    ) {
        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            return;
        }
        for (id, embedding) in items {
            if !state.entries.contains(&id) {
                state.entries.put(id, embedding);
            }
        }
    }

    /// Current invalidation epoch. Read it before a storage read whose result
    /// will be passed to [`EmbeddingCache::fill_missing`].
    pub async fn epoch(&self) -> u64 {
        self.state.lock().await.epoch
    }

    /// Split `ids` into cached vectors and ids that need a storage read.
    pub async fn lookup_many(&self, ids: Vec<DocumentId>) -> CacheLookup {
        let mut state = self.state.lock().await;
        let mut hits = Vec::with_capacity(ids.len());
        let mut misses = Vec::new();
        for id in ids {
            match state.entries.get(&id) {
                Some(embedding) => hits.push((id, Arc::clone(embedding))),
                None => misses.push(id),
            }
        }
        CacheLookup {
            hits,
            misses,
            epoch: state.epoch,
        }
    }

    /// Drop one entry.
    pub async fn invalidate(&self, id: &DocumentId) {
        self.state.lock().await.invalidate(id);
    }

    /// Drop several entries under one lock.
    pub async fn invalidate_many<'a>(&self, ids: impl IntoIterator<Item = &'a DocumentId>) {
        let mut state = self.state.lock().await;
        for id in ids {
            state.invalidate(id);
        }
    }

    /// Drop everything.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.epoch = state.epoch.wrapping_add(1);
    }

    /// Number of cached vectors.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Whether the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }
}
