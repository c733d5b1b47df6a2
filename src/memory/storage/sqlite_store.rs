//! `SQLite` implementation of the vector store.
//!
//! One table holds documents and their embedding blobs; an external-content
//! FTS5 table mirrors `content` through triggers, so a row and its full-text
//! entry are written in the same transaction. Vector search is an exact scan.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;
use tracing::{debug, warn};

use crate::memory::core::config::{StorageConfig, is_sql_identifier};
use crate::memory::core::document::{NewDocument, SearchResult, VectorDocument};
use crate::memory::core::errors::{MemoryError, MemoryResult};
use crate::memory::core::ids::DocumentId;
use crate::memory::retrieval::similarity::cosine_similarity;
use crate::memory::storage::cache::{CacheLookup, CachedEmbedding, EmbeddingCache};
use crate::memory::storage::codec::{
    decode_embedding, decode_metadata, encode_embedding, encode_metadata,
};
use crate::memory::storage::vector_store::{LEXICAL_SCORE, StoreFuture, VectorStore};

/// Bound parameters per `IN (...)` statement, well under `SQLite`'s limit.
const IN_CHUNK: usize = 500;

/// `content, embedding, metadata, source, created_at, updated_at`
type RawDocument = (String, Option<Vec<u8>>, String, String, i64, i64);

/// `id, content, metadata, source`
type RawHit = (String, String, String, String);

struct EncodedRow {
    id: String,
    content: String,
    embedding: Option<Vec<u8>>,
    metadata: String,
    source: String,
}

struct PreparedBatch {
    ids: Vec<DocumentId>,
    rows: Vec<EncodedRow>,
    vectors: Vec<(DocumentId, CachedEmbedding)>,
}

impl PreparedBatch {
    fn encode(docs: Vec<NewDocument>) -> MemoryResult<Self> {
        let mut batch = Self {
            ids: Vec::with_capacity(docs.len()),
            rows: Vec::with_capacity(docs.len()),
            vectors: Vec::with_capacity(docs.len()),
        };

        for doc in docs {
            let id = DocumentId::new();
            let metadata = encode_metadata(&doc.metadata)?;
            let embedding = doc.embedding.as_deref().map(encode_embedding);
            if let Some(vector) = doc.embedding {
                batch.vectors.push((id, CachedEmbedding::from(vector)));
            }
            batch.rows.push(EncodedRow {
                id: id.to_string(),
                content: doc.content,
                embedding,
                metadata,
                source: doc.source,
            });
            batch.ids.push(id);
        }

        Ok(batch)
    }
}

/// SQLite-backed [`VectorStore`] with an LRU cache of decoded embeddings.
pub struct SqliteVectorStore {
    conn: Connection,
    table: String,
    cache: EmbeddingCache,
    closed: AtomicBool,
}

impl SqliteVectorStore {
    /// Open (or create) the store described by `config`.
    ///
    /// Schema creation is idempotent and runs on every open.
    ///
    /// # Errors
    /// Returns an error if the table name is not a plain identifier, the cache
    /// capacity is zero, or the database cannot be opened.
    pub async fn new(config: &StorageConfig) -> MemoryResult<Self> {
        if !is_sql_identifier(&config.table) {
            return Err(MemoryError::InvalidConfig(format!(
                "storage.table {:?} is not a valid table name",
                config.table
            )));
        }

        let cache = EmbeddingCache::new(config.cache_capacity)?;
        let conn = Connection::open(&config.sqlite_path).await?;
        let table = config.table.clone();
        let table_name = table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&schema_sql(&table_name))?;
            Ok(())
        })
        .await?;

        debug!(table = %table, path = %config.sqlite_path.display(), "vector store opened");

        Ok(Self {
            conn,
            table,
            cache,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> MemoryResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MemoryError::Closed);
        }
        Ok(())
    }

    async fn commit_batch(&self, batch: PreparedBatch) -> MemoryResult<Vec<DocumentId>> {
        let PreparedBatch { ids, rows, vectors } = batch;
        let table = self.table.clone();
        let now = Utc::now().timestamp_millis();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(&format!(
                        "INSERT INTO {table} (id, content, embedding, metadata, source, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)"
                    ))?;
                    for row in &rows {
                        stmt.execute(rusqlite::params![
                            row.id,
                            row.content,
                            row.embedding,
                            row.metadata,
                            row.source,
                            now
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?;

        // Only after commit.
        self.cache.insert_many(vectors).await;
        debug!(count = ids.len(), "documents added");
        Ok(ids)
    }

    async fn embedded_ids(&self) -> MemoryResult<Vec<DocumentId>> {
        let table = self.table.clone();
        let raw = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT id FROM {table} WHERE embedding IS NOT NULL"))?;
                let ids = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                Ok(ids)
            })
            .await?;

        Ok(raw
            .into_iter()
            .filter_map(|id| match DocumentId::from_str(&id) {
                Ok(parsed) => Some(parsed),
                Err(err) => {
                    warn!(id = %id, error = %err, "skipping row with unparsable id");
                    None
                }
            })
            .collect())
    }

    /// Read and decode embeddings missing from the cache, then backfill it.
    async fn load_embeddings(
        &self,
        ids: &[DocumentId],
        epoch: u64,
    ) -> MemoryResult<Vec<(DocumentId, CachedEmbedding)>> {
        let mut loaded = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(IN_CHUNK) {
            let keys: Vec<String> = chunk.iter().map(ToString::to_string).collect();
            let table = self.table.clone();
            let raw = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT id, embedding FROM {table}
                         WHERE embedding IS NOT NULL AND id IN ({})",
                        placeholders(keys.len())
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params_from_iter(keys.iter()), |row| {
                            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            for (id, blob) in raw {
                let decoded = DocumentId::from_str(&id)
                    .map_err(|err| err.to_string())
                    .and_then(|parsed| decode_embedding(&blob).map(|vector| (parsed, vector)));
                match decoded {
                    Ok((parsed, vector)) => loaded.push((parsed, CachedEmbedding::from(vector))),
                    Err(reason) => warn!(id = %id, reason = %reason, "skipping corrupt embedding"),
                }
            }
        }

        self.cache
            .fill_missing(epoch, loaded.iter().map(|(id, vector)| (*id, Arc::clone(vector))))
            .await;
        Ok(loaded)
    }

    async fn load_hits(&self, keys: Vec<String>) -> MemoryResult<HashMap<String, RawHit>> {
        let table = self.table.clone();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT id, content, metadata, source FROM {table} WHERE id IN ({})",
                    placeholders(keys.len())
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(keys.iter()), |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                    })?
                    .collect::<Result<Vec<RawHit>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.0.clone(), row))
            .collect())
    }

    /// Turn scored ids (already sorted) into results, skipping rows that were
    /// deleted meanwhile or cannot be decoded, until `limit` are collected.
    async fn resolve_hits(
        &self,
        scored: &[(DocumentId, f32)],
        limit: usize,
    ) -> MemoryResult<Vec<SearchResult>> {
        let mut results = Vec::with_capacity(limit.min(scored.len()));
        let mut pending = scored;

        while results.len() < limit && !pending.is_empty() {
            let take = (limit - results.len()).min(pending.len()).min(IN_CHUNK);
            let (window, rest) = pending.split_at(take);
            pending = rest;

            let keys = window.iter().map(|(id, _)| id.to_string()).collect();
            let mut rows = self.load_hits(keys).await?;
            for (id, score) in window {
                let Some(row) = rows.remove(&id.to_string()) else {
                    continue;
                };
                match decode_hit(row, *score) {
                    Ok(hit) => results.push(hit),
                    Err(err) => warn!(error = %err, "skipping corrupt row"),
                }
            }
        }

        Ok(results)
    }
}

impl VectorStore for SqliteVectorStore {
    fn add(&self, doc: NewDocument) -> StoreFuture<'_, MemoryResult<DocumentId>> {
        Box::pin(async move {
            self.ensure_open()?;
            let batch = PreparedBatch::encode(vec![doc])?;
            let ids = self.commit_batch(batch).await?;
            ids.into_iter()
                .next()
                .ok_or_else(|| MemoryError::InvalidConfig("empty insert".to_string()))
        })
    }

    fn add_batch(&self, docs: Vec<NewDocument>) -> StoreFuture<'_, MemoryResult<Vec<DocumentId>>> {
        Box::pin(async move {
            self.ensure_open()?;
            if docs.is_empty() {
                return Ok(Vec::new());
            }
            let batch = PreparedBatch::encode(docs)?;
            self.commit_batch(batch).await
        })
    }

    fn update_embedding(
        &self,
        id: DocumentId,
        embedding: Vec<f32>,
    ) -> StoreFuture<'_, MemoryResult<bool>> {
        Box::pin(async move {
            self.ensure_open()?;
            let table = self.table.clone();
            let key = id.to_string();
            let blob = encode_embedding(&embedding);
            let now = Utc::now().timestamp_millis();

            let changed = self
                .conn
                .call(move |conn| {
                    let changed = conn.execute(
                        &format!(
                            "UPDATE {table} SET embedding = ?1, updated_at = MAX(?2, updated_at + 1)
                             WHERE id = ?3"
                        ),
                        rusqlite::params![blob, now, key],
                    )?;
                    Ok(changed)
                })
                .await?;

            if changed == 0 {
                self.cache.invalidate(&id).await;
                return Ok(false);
            }

            self.cache.insert(id, CachedEmbedding::from(embedding)).await;
            Ok(true)
        })
    }

    fn get(&self, id: DocumentId) -> StoreFuture<'_, MemoryResult<Option<VectorDocument>>> {
        Box::pin(async move {
            self.ensure_open()?;
            let table = self.table.clone();
            let key = id.to_string();
            let epoch = self.cache.epoch().await;

            let raw = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            &format!(
                                "SELECT content, embedding, metadata, source, created_at, updated_at
                                 FROM {table} WHERE id = ?1"
                            ),
                            rusqlite::params![key],
                            |row| {
                                Ok((
                                    row.get(0)?,
                                    row.get(1)?,
                                    row.get(2)?,
                                    row.get(3)?,
                                    row.get(4)?,
                                    row.get(5)?,
                                ))
                            },
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            let Some(raw) = raw else {
                return Ok(None);
            };

            let doc = decode_document(id, raw)?;
            if let Some(vector) = &doc.embedding {
                self.cache
                    .fill_missing(epoch, [(id, CachedEmbedding::from(vector.as_slice()))])
                    .await;
            }
            Ok(Some(doc))
        })
    }

    fn search(
        &self,
        query: Vec<f32>,
        limit: usize,
        threshold: f32,
    ) -> StoreFuture<'_, MemoryResult<Vec<SearchResult>>> {
        Box::pin(async move {
            self.ensure_open()?;
            if limit == 0 {
                return Ok(Vec::new());
            }

            let ids = self.embedded_ids().await?;
            let CacheLookup {
                hits: mut vectors,
                misses,
                epoch,
            } = self.cache.lookup_many(ids).await;
            let cache_hits = vectors.len();
            if !misses.is_empty() {
                vectors.extend(self.load_embeddings(&misses, epoch).await?);
            }

            let mut scored = Vec::with_capacity(vectors.len());
            for (id, vector) in &vectors {
                let score = cosine_similarity(&query, vector)?;
                if score >= threshold {
                    scored.push((*id, score));
                }
            }
            scored.sort_by(|a, b| b.1.total_cmp(&a.1));

            debug!(
                scanned = vectors.len(),
                cache_hits,
                matched = scored.len(),
                "vector scan finished"
            );

            self.resolve_hits(&scored, limit).await
        })
    }

    fn text_search(
        &self,
        query: &str,
        limit: usize,
    ) -> StoreFuture<'_, MemoryResult<Vec<SearchResult>>> {
        let expression = fts_query(query);
        Box::pin(async move {
            self.ensure_open()?;
            let Some(expression) = expression else {
                return Ok(Vec::new());
            };
            if limit == 0 {
                return Ok(Vec::new());
            }

            let table = self.table.clone();
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT d.id, d.content, d.metadata, d.source
                         FROM {table}_fts JOIN {table} AS d ON d.seq = {table}_fts.rowid
                         WHERE {table}_fts MATCH ?1
                         ORDER BY {table}_fts.rank
                         LIMIT ?2"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![expression, limit], |row| {
                            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                        })?
                        .collect::<Result<Vec<RawHit>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            Ok(rows
                .into_iter()
                .filter_map(|row| match decode_hit(row, LEXICAL_SCORE) {
                    Ok(hit) => Some(hit),
                    Err(err) => {
                        warn!(error = %err, "skipping corrupt row");
                        None
                    }
                })
                .collect())
        })
    }

    fn delete(&self, id: DocumentId) -> StoreFuture<'_, MemoryResult<bool>> {
        Box::pin(async move {
            self.ensure_open()?;
            let table = self.table.clone();
            let key = id.to_string();

            let changed = self
                .conn
                .call(move |conn| {
                    let changed =
                        conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), [key])?;
                    Ok(changed)
                })
                .await?;

            self.cache.invalidate(&id).await;
            Ok(changed > 0)
        })
    }

    fn delete_by_source(&self, source: &str) -> StoreFuture<'_, MemoryResult<usize>> {
        let source = source.to_string();
        Box::pin(async move {
            self.ensure_open()?;
            let table = self.table.clone();
            let label = source.clone();

            let removed = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let ids = {
                        let mut stmt =
                            tx.prepare(&format!("SELECT id FROM {table} WHERE source = ?1"))?;
                        stmt.query_map([&label], |row| row.get::<_, String>(0))?
                            .collect::<Result<Vec<_>, rusqlite::Error>>()?
                    };
                    tx.execute(&format!("DELETE FROM {table} WHERE source = ?1"), [&label])?;
                    tx.commit()?;
                    Ok(ids)
                })
                .await?;

            let ids: Vec<DocumentId> = removed
                .iter()
                .filter_map(|id| DocumentId::from_str(id).ok())
                .collect();
            self.cache.invalidate_many(&ids).await;

            debug!(source = %source, removed = removed.len(), "source cleared");
            Ok(removed.len())
        })
    }

    fn count(&self) -> StoreFuture<'_, MemoryResult<usize>> {
        Box::pin(async move {
            self.ensure_open()?;
            let table = self.table.clone();
            let count = self
                .conn
                .call(move |conn| {
                    let count: i64 =
                        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                            row.get(0)
                        })?;
                    Ok(count)
                })
                .await?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
    }

    fn close(&self) -> StoreFuture<'_, MemoryResult<()>> {
        Box::pin(async move {
            if self.closed.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            self.cache.clear().await;
            self.conn.clone().close().await?;
            debug!(table = %self.table, "vector store closed");
            Ok(())
        })
    }
}

fn schema_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            seq INTEGER PRIMARY KEY,
            id TEXT NOT NULL UNIQUE,
            content TEXT NOT NULL,
            embedding BLOB,
            metadata TEXT NOT NULL,
            source TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_{table}_source ON {table}(source);
        CREATE VIRTUAL TABLE IF NOT EXISTS {table}_fts USING fts5(
            content,
            content = '{table}',
            content_rowid = 'seq'
        );
        CREATE TRIGGER IF NOT EXISTS {table}_fts_insert AFTER INSERT ON {table} BEGIN
            INSERT INTO {table}_fts(rowid, content) VALUES (new.seq, new.content);
        END;
        CREATE TRIGGER IF NOT EXISTS {table}_fts_delete AFTER DELETE ON {table} BEGIN
            INSERT INTO {table}_fts({table}_fts, rowid, content)
            VALUES ('delete', old.seq, old.content);
        END;"
    )
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build an FTS5 expression matching any word of `query`.
///
/// Every term is quoted so user input can never be parsed as FTS5 syntax.
fn fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(|term| format!("\"{term}\""))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

fn decode_hit(row: RawHit, score: f32) -> MemoryResult<SearchResult> {
    let (id, content, metadata, source) = row;
    let parsed = DocumentId::from_str(&id).map_err(|err| MemoryError::CorruptRow {
        id: id.clone(),
        reason: format!("invalid id: {err}"),
    })?;
    let metadata = decode_metadata(&metadata).map_err(|err| MemoryError::CorruptRow {
        id,
        reason: format!("invalid metadata: {err}"),
    })?;

    Ok(SearchResult {
        id: parsed,
        content,
        score,
        metadata: Some(metadata),
        source: Some(source),
    })
}

fn decode_document(id: DocumentId, raw: RawDocument) -> MemoryResult<VectorDocument> {
    let (content, embedding, metadata, source, created_at, updated_at) = raw;
    let corrupt = |reason: String| MemoryError::CorruptRow {
        id: id.to_string(),
        reason,
    };

    let embedding = embedding
        .map(|blob| decode_embedding(&blob))
        .transpose()
        .map_err(corrupt)?;
    let metadata =
        decode_metadata(&metadata).map_err(|err| corrupt(format!("invalid metadata: {err}")))?;
    let created_at = millis_to_datetime(created_at)
        .ok_or_else(|| corrupt("invalid created_at timestamp".to_string()))?;
    let updated_at = millis_to_datetime(updated_at)
        .ok_or_else(|| corrupt("invalid updated_at timestamp".to_string()))?;

    Ok(VectorDocument {
        id,
        content,
        embedding,
        metadata,
        source,
        created_at,
        updated_at,
    })
}
