//! Record store: replace-and-cache persistence for the two collections.
//!
//! Every bulk write goes through [`RecordStore::replace`], which clears a
//! collection, inserts the new batch and stamps the collection's sync time in
//! one transaction.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Local;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use tokio::sync::{Mutex, OnceCell};

use super::{init_database, run_migrations};
use crate::errors::AppError;
use crate::models::{Collection, Record, RejectedRecord, ReplaceOutcome};

/// Timestamp reported for a collection that has never been replaced.
pub const NEVER: &str = "Never";

/// SQLite-backed store for roster and attendance records.
pub struct RecordStore {
    pool: SqlitePool,
    initialized: OnceCell<()>,
    write_locks: [Mutex<()>; 2],
    generations: [AtomicU64; 2],
}

impl RecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            initialized: OnceCell::new(),
            write_locks: [Mutex::new(()), Mutex::new(())],
            generations: [AtomicU64::new(0), AtomicU64::new(0)],
        }
    }

    /// Open the database file and make sure the schema exists.
    pub async fn open(db_path: &Path) -> Result<Self, AppError> {
        let pool = init_database(db_path).await?;
        let store = Self::new(pool);
        store.open_or_initialize().await?;
        Ok(store)
    }

    /// Ensure the collections and metadata tables exist.
    ///
    /// Idempotent. Concurrent callers wait on a single schema pass.
    pub async fn open_or_initialize(&self) -> Result<(), AppError> {
        self.initialized
            .get_or_try_init(|| async {
                run_migrations(&self.pool).await?;
                tracing::info!("Record store initialized");
                Ok::<(), AppError>(())
            })
            .await?;
        Ok(())
    }

    /// Count of committed replaces on `collection` since this store was opened.
    pub fn generation(&self, collection: Collection) -> u64 {
        self.generations[collection.index()].load(Ordering::Acquire)
    }

    /// Atomically replace the contents of `collection` with `records`.
    ///
    /// Records that cannot be inserted (missing or duplicate key, no columns)
    /// are skipped and reported in the outcome. Any other failure rolls the
    /// whole transaction back, leaving the previous contents in place.
    pub async fn replace(
        &self,
        collection: Collection,
        records: &[Record],
    ) -> Result<ReplaceOutcome, AppError> {
        self.open_or_initialize().await?;

        let _guard = self.write_locks[collection.index()].lock().await;

        let table = collection.table();
        let clear_sql = format!("DELETE FROM {}", table);
        let insert_sql = format!(
            "INSERT OR IGNORE INTO {} (record_key, data) VALUES (?, ?)",
            table
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(&clear_sql).execute(&mut *tx).await?;

        let mut inserted = 0;
        let mut rejected = Vec::new();

        for (index, record) in records.iter().enumerate() {
            if record.is_empty() {
                rejected.push(reject(collection, index, "record has no columns".to_string()));
                continue;
            }

            let key = match collection.key_column() {
                Some(column) => match record_key(record, column) {
                    Ok(key) => Some(key),
                    Err(reason) => {
                        rejected.push(reject(collection, index, reason));
                        continue;
                    }
                },
                None => None,
            };

            let data = serde_json::to_string(record)?;

            let result = sqlx::query(&insert_sql)
                .bind(&key)
                .bind(&data)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() == 0 {
                rejected.push(reject(
                    collection,
                    index,
                    format!("duplicate key {:?}", key.unwrap_or_default()),
                ));
            } else {
                inserted += 1;
            }
        }

        let last_updated = local_timestamp();

        sqlx::query(
            "INSERT INTO sync_meta (collection, last_updated) VALUES (?, ?)
             ON CONFLICT(collection) DO UPDATE SET last_updated = excluded.last_updated",
        )
        .bind(collection.name())
        .bind(&last_updated)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.generations[collection.index()].fetch_add(1, Ordering::AcqRel);

        tracing::info!(
            "Replaced {}: {} inserted, {} rejected",
            collection,
            inserted,
            rejected.len()
        );

        Ok(ReplaceOutcome {
            collection,
            inserted,
            rejected,
            last_updated,
        })
    }

    /// All records of `collection` in insertion order.
    pub async fn try_get_all(&self, collection: Collection) -> Result<Vec<Record>, AppError> {
        self.open_or_initialize().await?;

        let sql = format!("SELECT data FROM {} ORDER BY seq", collection.table());
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let data: String = row.get("data");
            match serde_json::from_str::<Record>(&data) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping unreadable {} row: {}", collection, e),
            }
        }
        Ok(records)
    }

    /// All records of `collection`, or an empty list if they cannot be read.
    pub async fn get_all(&self, collection: Collection) -> Vec<Record> {
        match self.try_get_all(collection).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", collection, e);
                Vec::new()
            }
        }
    }

    /// Local time of the last successful replace, or [`NEVER`].
    pub async fn get_last_updated(&self, collection: Collection) -> String {
        match self.try_get_last_updated(collection).await {
            Ok(Some(ts)) => ts,
            Ok(None) => NEVER.to_string(),
            Err(e) => {
                tracing::warn!("Failed to read sync time for {}: {}", collection, e);
                NEVER.to_string()
            }
        }
    }

    async fn try_get_last_updated(
        &self,
        collection: Collection,
    ) -> Result<Option<String>, AppError> {
        self.open_or_initialize().await?;

        let row = sqlx::query("SELECT last_updated FROM sync_meta WHERE collection = ?")
            .bind(collection.name())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get("last_updated")))
    }
}

fn reject(collection: Collection, index: usize, reason: String) -> RejectedRecord {
    tracing::warn!("Skip invalid {} row {}: {}", collection, index, reason);
    RejectedRecord { index, reason }
}

/// Key text for a keyed collection. Only non-empty text and numbers are keys.
fn record_key(record: &Record, column: &str) -> Result<String, String> {
    match record.get(column) {
        None | Some(Value::Null) => Err(format!("missing key column {:?}", column)),
        Some(Value::String(s)) if s.is_empty() => {
            Err(format!("missing key column {:?}", column))
        }
        Some(value @ (Value::String(_) | Value::Number(_))) => {
            Ok(crate::models::scalar_text(value))
        }
        Some(value) => Err(format!("invalid key {} in column {:?}", value, column)),
    }
}

/// Human-readable local time, e.g. `10/18/2026, 4:05:09 PM`.
fn local_timestamp() -> String {
    Local::now().format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}
