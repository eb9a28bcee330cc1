//! Transactional bulk upserts into the catalog tables.
//!
//! [`UpsertBatcher::upsert`] splits its input into fixed-size chunks in input
//! order and writes each chunk in its own transaction with a single
//! set-based `INSERT ... ON CONFLICT` statement. Merge rules on conflict:
//!
//! | Column | Rule |
//! |--------|------|
//! | `parent_id`, `name`, `status`, `sku`, `raw`, `synced_at` | overwritten |
//! | `created_at` | `COALESCE(incoming, existing)` |
//! | `updated_at` | `GREATEST(incoming, existing)` |
//!
//! The first failing chunk is rolled back and ends the call; chunks that
//! committed before it stay committed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;

use crate::db::records::{CatalogRecord, CatalogTable};
use crate::db::DatabaseError;

/// Rows per transaction unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Builds the set-based upsert statement for `table`.
///
/// Parameters are parallel arrays (`$1` through `$10`) in
/// [`CatalogRecord`] field order, unnested into rows.
#[must_use]
pub fn build_upsert_sql(table: CatalogTable) -> String {
    let name = table.name();
    format!(
        "INSERT INTO {name} AS t \
         (shop_id, entity_id, parent_id, name, status, sku, created_at, updated_at, raw, synced_at) \
         SELECT * FROM UNNEST(\
         $1::bigint[], $2::bigint[], $3::bigint[], $4::text[], $5::text[], $6::text[], \
         $7::timestamptz[], $8::timestamptz[], $9::jsonb[], $10::timestamptz[]) \
         ON CONFLICT (shop_id, entity_id) DO UPDATE SET \
         parent_id = EXCLUDED.parent_id, \
         name = EXCLUDED.name, \
         status = EXCLUDED.status, \
         sku = EXCLUDED.sku, \
         created_at = COALESCE(EXCLUDED.created_at, t.created_at), \
         updated_at = GREATEST(EXCLUDED.updated_at, t.updated_at), \
         raw = EXCLUDED.raw, \
         synced_at = EXCLUDED.synced_at"
    )
}

/// Writes one chunk atomically.
///
/// Implementations must either make every row of the chunk visible or none
/// of them.
#[async_trait]
pub trait ChunkWriter: Send + Sync {
    /// Writes `records` to `table` in one transaction, returning rows affected.
    async fn write_chunk(
        &self,
        table: CatalogTable,
        records: &[CatalogRecord],
    ) -> Result<u64, DatabaseError>;
}

#[async_trait]
impl<W: ChunkWriter + ?Sized> ChunkWriter for Arc<W> {
    async fn write_chunk(
        &self,
        table: CatalogTable,
        records: &[CatalogRecord],
    ) -> Result<u64, DatabaseError> {
        (**self).write_chunk(table, records).await
    }
}

/// `PostgreSQL` chunk writer.
#[derive(Clone, Debug)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    /// Creates a writer over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Default)]
struct Columns {
    shop_ids: Vec<i64>,
    entity_ids: Vec<i64>,
    parent_ids: Vec<Option<i64>>,
    names: Vec<String>,
    statuses: Vec<Option<String>>,
    skus: Vec<Option<String>>,
    created_ats: Vec<Option<DateTime<Utc>>>,
    updated_ats: Vec<Option<DateTime<Utc>>>,
    raws: Vec<serde_json::Value>,
    synced_ats: Vec<DateTime<Utc>>,
}

impl Columns {
    fn from_records(records: &[CatalogRecord]) -> Self {
        let mut columns = Self::default();
        for record in records {
            columns.shop_ids.push(record.shop_id);
            columns.entity_ids.push(record.entity_id);
            columns.parent_ids.push(record.parent_id);
            columns.names.push(record.name.clone());
            columns.statuses.push(record.status.clone());
            columns.skus.push(record.sku.clone());
            columns.created_ats.push(record.created_at);
            columns.updated_ats.push(record.updated_at);
            columns.raws.push(record.raw.clone());
            columns.synced_ats.push(record.synced_at);
        }
        columns
    }
}

#[async_trait]
impl ChunkWriter for PgCatalogStore {
    async fn write_chunk(
        &self,
        table: CatalogTable,
        records: &[CatalogRecord],
    ) -> Result<u64, DatabaseError> {
        if records.is_empty() {
            return Ok(0);
        }

        let columns = Columns::from_records(records);
        let sql = build_upsert_sql(table);

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(&sql)
            .bind(&columns.shop_ids)
            .bind(&columns.entity_ids)
            .bind(&columns.parent_ids)
            .bind(&columns.names)
            .bind(&columns.statuses)
            .bind(&columns.skus)
            .bind(&columns.created_ats)
            .bind(&columns.updated_ats)
            .bind(&columns.raws)
            .bind(&columns.synced_ats)
            .execute(&mut *tx)
            .await;

        match result {
            Ok(done) => {
                tx.commit().await?;
                Ok(done.rows_affected())
            }
            Err(error) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(%rollback, "rollback after failed upsert also failed");
                }
                Err(error.into())
            }
        }
    }
}

/// One upsert invocation: an ordered slice of records bound for one table.
#[derive(Clone, Copy, Debug)]
pub struct BatchJob<'a> {
    /// Target table.
    pub table: CatalogTable,
    /// Records in input order.
    pub records: &'a [CatalogRecord],
    /// Rows per transaction.
    pub batch_size: usize,
}

impl<'a> BatchJob<'a> {
    /// Creates a job; a zero batch size is treated as 1.
    #[must_use]
    pub fn new(table: CatalogTable, records: &'a [CatalogRecord], batch_size: usize) -> Self {
        Self {
            table,
            records,
            batch_size: batch_size.max(1),
        }
    }

    /// Iterates the job's chunks in input order.
    pub fn chunks(&self) -> std::slice::Chunks<'a, CatalogRecord> {
        self.records.chunks(self.batch_size)
    }

    /// Number of chunks the job splits into.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.records.len().div_ceil(self.batch_size)
    }
}

/// Result of a fully successful upsert.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpsertReport {
    /// Chunks committed.
    pub chunks_committed: usize,
    /// Rows inserted or updated across all chunks.
    pub rows_written: u64,
}

/// A chunk failed; earlier chunks remain committed.
#[derive(Debug, Error)]
#[error("upsert into {table} failed at chunk {chunk_index} after {committed_chunks} committed chunk(s): {source}")]
pub struct UpsertError {
    /// Target table.
    pub table: CatalogTable,
    /// Zero-based index of the failing chunk.
    pub chunk_index: usize,
    /// Chunks committed before the failure.
    pub committed_chunks: usize,
    /// The underlying database failure.
    #[source]
    pub source: DatabaseError,
}

/// Persists record lists in fixed-size, all-or-nothing chunks.
#[derive(Clone, Debug)]
pub struct UpsertBatcher<W> {
    writer: W,
    batch_size: usize,
}

impl<W: ChunkWriter> UpsertBatcher<W> {
    /// Creates a batcher with [`DEFAULT_BATCH_SIZE`].
    pub const fn new(writer: W) -> Self {
        Self {
            writer,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Sets rows per transaction (minimum 1).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Returns rows per transaction.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns the chunk writer.
    pub const fn writer(&self) -> &W {
        &self.writer
    }

    /// Upserts `records` into `table`, one transaction per chunk.
    ///
    /// Chunks are written sequentially in input order. Within a chunk,
    /// records sharing a `(shop_id, entity_id)` key collapse to the last
    /// occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`UpsertError`] for the first chunk that fails; no later chunk
    /// is attempted.
    pub async fn upsert(
        &self,
        table: CatalogTable,
        records: &[CatalogRecord],
    ) -> Result<UpsertReport, UpsertError> {
        let job = BatchJob::new(table, records, self.batch_size);
        let mut report = UpsertReport::default();

        for (chunk_index, chunk) in job.chunks().enumerate() {
            let rows = dedupe_chunk(chunk);
            match self.writer.write_chunk(table, &rows).await {
                Ok(written) => {
                    report.chunks_committed += 1;
                    report.rows_written += written;
                    tracing::debug!(
                        table = table.name(),
                        chunk_index,
                        rows = rows.len(),
                        "committed upsert chunk"
                    );
                }
                Err(source) => {
                    tracing::error!(
                        table = table.name(),
                        chunk_index,
                        committed_chunks = report.chunks_committed,
                        error = %source,
                        "upsert chunk failed, rolled back"
                    );
                    return Err(UpsertError {
                        table,
                        chunk_index,
                        committed_chunks: report.chunks_committed,
                        source,
                    });
                }
            }
        }

        tracing::info!(
            table = table.name(),
            chunks = report.chunks_committed,
            rows = report.rows_written,
            "upsert complete"
        );
        Ok(report)
    }
}

/// Collapses duplicate keys, keeping the last occurrence at the position of
/// the first.
fn dedupe_chunk(chunk: &[CatalogRecord]) -> Vec<CatalogRecord> {
    let mut position: HashMap<(i64, i64), usize> = HashMap::with_capacity(chunk.len());
    let mut rows: Vec<CatalogRecord> = Vec::with_capacity(chunk.len());
    for record in chunk {
        if let Some(&index) = position.get(&record.key()) {
            rows[index] = record.clone();
        } else {
            position.insert(record.key(), rows.len());
            rows.push(record.clone());
        }
    }
    rows
}
