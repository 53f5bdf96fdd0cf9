//! Persistent source state using SQLite
//!
//! This module owns the `sources` table:
//! - Point and filtered reads
//! - Point writes and multi-write transactions ([`SourcesTx`])
//! - Change notification, used to drive observation streams
//!
//! Every committed write bumps a change generation. Observation streams
//! re-run their query once on subscribe and then after every bump.

mod queries;
mod schema;

pub use schema::*;

use crate::config::Config;
use crate::error::Result;
use crate::reactive::{until_error, watch_stream, ResultStream};
use crate::settings::SortOrder;
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{FromRow, Sqlite, Transaction};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Persisted state of one source
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Stable catalog name
    pub source: String,
    pub enabled: bool,
    pub pinned: bool,
    /// Manual ordering position
    pub sort_key: i64,
    /// App version at which the record was created
    pub added_in: i64,
    /// Epoch millis, 0 = never used
    pub last_used_at: i64,
}

impl SourceRecord {
    /// A fresh, disabled, never-used record
    pub fn new(source: impl Into<String>, sort_key: i64, added_in: i64) -> Self {
        Self {
            source: source.into(),
            enabled: false,
            pinned: false,
            sort_key,
            added_in,
            last_used_at: 0,
        }
    }
}

/// Source state database handle
#[derive(Clone)]
pub struct SourcesDb {
    pool: SqlitePool,
    changes: Arc<watch::Sender<u64>>,
}

impl SourcesDb {
    /// Connect using the configured path and pool settings
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::open(
            &config.paths.db_file,
            config.database.max_connections,
            Duration::from_secs(config.database.busy_timeout_secs),
        )
        .await
    }

    /// Create database with path directly (without full config)
    pub async fn new(db_path: &Path) -> Result<Self> {
        Self::open(db_path, 5, Duration::from_secs(5)).await
    }

    async fn open(db_path: &Path, max_connections: u32, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(busy_timeout);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let (changes, _) = watch::channel(0);
        let db = Self {
            pool,
            changes: Arc::new(changes),
        };

        if !db.is_initialized().await? {
            db.init_schema().await?;
        }

        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='sources'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Number of committed writes since this handle was opened
    pub fn generation(&self) -> u64 {
        *self.changes.borrow()
    }

    fn notify_changed(&self) {
        notify(&self.changes);
    }

    /// Start a write transaction; changes become visible on [`SourcesTx::commit`]
    ///
    /// Takes the write lock up front so concurrent writers wait on the busy
    /// timeout instead of failing when a read lock cannot be upgraded.
    pub async fn begin(&self) -> Result<SourcesTx> {
        let tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        Ok(SourcesTx {
            tx,
            changes: Arc::clone(&self.changes),
            dirty: false,
        })
    }

    // ===== Reads =====

    pub async fn find_by_name(&self, name: &str) -> Result<Option<SourceRecord>> {
        queries::find_by_name(&self.pool, name).await
    }

    /// All records in manual order
    pub async fn find_all(&self) -> Result<Vec<SourceRecord>> {
        queries::find_all(&self.pool).await
    }

    pub async fn find_all_names(&self) -> Result<Vec<String>> {
        queries::find_all_names(&self.pool).await
    }

    pub async fn find_all_enabled(&self, order: SortOrder) -> Result<Vec<SourceRecord>> {
        queries::find_all_enabled(&self.pool, order).await
    }

    pub async fn find_all_enabled_names(&self) -> Result<Vec<String>> {
        queries::find_all_enabled_names(&self.pool).await
    }

    pub async fn find_all_pinned(&self) -> Result<Vec<SourceRecord>> {
        queries::find_all_pinned(&self.pool).await
    }

    /// Most recently used first; never-used records sort last
    pub async fn find_last_used(&self, limit: usize) -> Result<Vec<SourceRecord>> {
        queries::find_last_used(&self.pool, limit).await
    }

    /// Records added at `version` or later
    pub async fn find_all_from_version(&self, version: i64) -> Result<Vec<SourceRecord>> {
        queries::find_all_from_version(&self.pool, version).await
    }

    pub async fn max_sort_key(&self) -> Result<i64> {
        queries::max_sort_key(&self.pool).await
    }

    // ===== Writes =====

    /// Insert records, skipping any whose source already exists
    pub async fn insert_if_absent(&self, records: &[SourceRecord]) -> Result<u64> {
        let mut tx = self.begin().await?;
        let inserted = tx.insert_if_absent(records).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        queries::set_enabled(&self.pool, name, enabled).await?;
        self.notify_changed();
        Ok(())
    }

    pub async fn set_pinned(&self, name: &str, pinned: bool) -> Result<()> {
        queries::set_pinned(&self.pool, name, pinned).await?;
        self.notify_changed();
        Ok(())
    }

    pub async fn set_sort_key(&self, name: &str, sort_key: i64) -> Result<()> {
        queries::set_sort_key(&self.pool, name, sort_key).await?;
        self.notify_changed();
        Ok(())
    }

    pub async fn set_last_used(&self, name: &str, timestamp: i64) -> Result<()> {
        queries::set_last_used(&self.pool, name, timestamp).await?;
        self.notify_changed();
        Ok(())
    }

    pub async fn disable_all(&self) -> Result<()> {
        queries::disable_all(&self.pool).await?;
        self.notify_changed();
        Ok(())
    }

    // ===== Observation =====

    /// Re-run `query` on subscribe and after every committed write
    fn observe_query<T, F, Fut>(&self, query: F) -> ResultStream<T>
    where
        T: Send + 'static,
        F: Fn(SourcesDb) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let db = self.clone();
        let changes = watch_stream(self.changes.subscribe());
        until_error(changes.then(move |_| query(db.clone())).boxed())
    }

    pub fn observe_enabled(&self, order: SortOrder) -> ResultStream<Vec<SourceRecord>> {
        self.observe_query(move |db| async move { db.find_all_enabled(order).await })
    }

    pub fn observe_is_enabled(&self, name: &str) -> ResultStream<bool> {
        let name = name.to_string();
        self.observe_query(move |db| {
            let name = name.clone();
            async move {
                let record = db.find_by_name(&name).await?;
                Ok(record.is_some_and(|r| r.enabled))
            }
        })
    }

    pub fn observe_all(&self) -> ResultStream<Vec<SourceRecord>> {
        self.observe_query(|db| async move { db.find_all().await })
    }

    pub fn observe_from_version(&self, version: i64) -> ResultStream<Vec<SourceRecord>> {
        self.observe_query(move |db| async move { db.find_all_from_version(version).await })
    }
}

fn notify(changes: &watch::Sender<u64>) {
    changes.send_modify(|generation| *generation = generation.wrapping_add(1));
}

/// A unit of work over the `sources` table
///
/// Dropping without [`SourcesTx::commit`] rolls everything back.
pub struct SourcesTx {
    tx: Transaction<'static, Sqlite>,
    changes: Arc<watch::Sender<u64>>,
    dirty: bool,
}

impl SourcesTx {
    pub async fn find_by_name(&mut self, name: &str) -> Result<Option<SourceRecord>> {
        queries::find_by_name(&mut *self.tx, name).await
    }

    pub async fn find_all_names(&mut self) -> Result<Vec<String>> {
        queries::find_all_names(&mut *self.tx).await
    }

    pub async fn max_sort_key(&mut self) -> Result<i64> {
        queries::max_sort_key(&mut *self.tx).await
    }

    pub async fn insert_if_absent(&mut self, records: &[SourceRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        self.dirty = true;
        queries::insert_if_absent(&mut self.tx, records).await
    }

    pub async fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<()> {
        self.dirty = true;
        queries::set_enabled(&mut *self.tx, name, enabled).await
    }

    pub async fn set_pinned(&mut self, name: &str, pinned: bool) -> Result<()> {
        self.dirty = true;
        queries::set_pinned(&mut *self.tx, name, pinned).await
    }

    pub async fn set_sort_key(&mut self, name: &str, sort_key: i64) -> Result<()> {
        self.dirty = true;
        queries::set_sort_key(&mut *self.tx, name, sort_key).await
    }

    pub async fn disable_all(&mut self) -> Result<()> {
        self.dirty = true;
        queries::disable_all(&mut *self.tx).await
    }

    /// Commit and notify observers if anything was written
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        if self.dirty {
            notify(&self.changes);
        }
        Ok(())
    }
}
