//! SQL statements shared by pooled and transactional access
//!
//! Each function takes any SQLite executor, so the same statement runs
//! against the pool or inside a [`super::SourcesTx`].

use super::SourceRecord;
use crate::error::Result;
use crate::settings::SortOrder;
use sqlx::sqlite::{Sqlite, SqliteConnection, SqliteExecutor};
use sqlx::QueryBuilder;

/// Rows per INSERT statement; keeps bound parameters well under SQLite's limit
const INSERT_BATCH_ROWS: usize = 500;

pub(super) async fn find_by_name<'e, E>(executor: E, name: &str) -> Result<Option<SourceRecord>>
where
    E: SqliteExecutor<'e>,
{
    let record = sqlx::query_as::<_, SourceRecord>("SELECT * FROM sources WHERE source = ?")
        .bind(name)
        .fetch_optional(executor)
        .await?;
    Ok(record)
}

pub(super) async fn find_all<'e, E>(executor: E) -> Result<Vec<SourceRecord>>
where
    E: SqliteExecutor<'e>,
{
    let records = sqlx::query_as::<_, SourceRecord>("SELECT * FROM sources ORDER BY sort_key, source")
        .fetch_all(executor)
        .await?;
    Ok(records)
}

pub(super) async fn find_all_names<'e, E>(executor: E) -> Result<Vec<String>>
where
    E: SqliteExecutor<'e>,
{
    let names: Vec<String> = sqlx::query_scalar("SELECT source FROM sources")
        .fetch_all(executor)
        .await?;
    Ok(names)
}

pub(super) async fn find_all_enabled<'e, E>(executor: E, order: SortOrder) -> Result<Vec<SourceRecord>>
where
    E: SqliteExecutor<'e>,
{
    let sql = match order {
        SortOrder::Manual => "SELECT * FROM sources WHERE enabled = 1 ORDER BY sort_key, source",
        // Title order is applied by the caller; names give a stable base order
        SortOrder::Alphabetic | SortOrder::AlphabeticPinned => {
            "SELECT * FROM sources WHERE enabled = 1 ORDER BY source"
        }
    };
    let records = sqlx::query_as::<_, SourceRecord>(sql)
        .fetch_all(executor)
        .await?;
    Ok(records)
}

pub(super) async fn find_all_enabled_names<'e, E>(executor: E) -> Result<Vec<String>>
where
    E: SqliteExecutor<'e>,
{
    let names: Vec<String> = sqlx::query_scalar("SELECT source FROM sources WHERE enabled = 1")
        .fetch_all(executor)
        .await?;
    Ok(names)
}

pub(super) async fn find_all_pinned<'e, E>(executor: E) -> Result<Vec<SourceRecord>>
where
    E: SqliteExecutor<'e>,
{
    let records = sqlx::query_as::<_, SourceRecord>(
        "SELECT * FROM sources WHERE pinned = 1 ORDER BY sort_key, source",
    )
    .fetch_all(executor)
    .await?;
    Ok(records)
}

pub(super) async fn find_last_used<'e, E>(executor: E, limit: usize) -> Result<Vec<SourceRecord>>
where
    E: SqliteExecutor<'e>,
{
    let records = sqlx::query_as::<_, SourceRecord>(
        "SELECT * FROM sources ORDER BY last_used_at DESC, sort_key, source LIMIT ?",
    )
    .bind(i64::try_from(limit).unwrap_or(i64::MAX))
    .fetch_all(executor)
    .await?;
    Ok(records)
}

pub(super) async fn find_all_from_version<'e, E>(executor: E, version: i64) -> Result<Vec<SourceRecord>>
where
    E: SqliteExecutor<'e>,
{
    let records = sqlx::query_as::<_, SourceRecord>(
        "SELECT * FROM sources WHERE added_in >= ? ORDER BY sort_key, source",
    )
    .bind(version)
    .fetch_all(executor)
    .await?;
    Ok(records)
}

pub(super) async fn max_sort_key<'e, E>(executor: E) -> Result<i64>
where
    E: SqliteExecutor<'e>,
{
    let max: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(sort_key), 0) FROM sources")
        .fetch_one(executor)
        .await?;
    Ok(max)
}

pub(super) async fn insert_if_absent(conn: &mut SqliteConnection, records: &[SourceRecord]) -> Result<u64> {
    let mut inserted = 0;
    for batch in records.chunks(INSERT_BATCH_ROWS) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT OR IGNORE INTO sources (source, enabled, pinned, sort_key, added_in, last_used_at) ",
        );
        builder.push_values(batch, |mut row, record| {
            row.push_bind(record.source.clone())
                .push_bind(record.enabled)
                .push_bind(record.pinned)
                .push_bind(record.sort_key)
                .push_bind(record.added_in)
                .push_bind(record.last_used_at);
        });
        inserted += builder.build().execute(&mut *conn).await?.rows_affected();
    }
    Ok(inserted)
}

pub(super) async fn set_enabled<'e, E>(executor: E, name: &str, enabled: bool) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE sources SET enabled = ? WHERE source = ?")
        .bind(enabled)
        .bind(name)
        .execute(executor)
        .await?;
    Ok(())
}

pub(super) async fn set_pinned<'e, E>(executor: E, name: &str, pinned: bool) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE sources SET pinned = ? WHERE source = ?")
        .bind(pinned)
        .bind(name)
        .execute(executor)
        .await?;
    Ok(())
}

pub(super) async fn set_sort_key<'e, E>(executor: E, name: &str, sort_key: i64) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE sources SET sort_key = ? WHERE source = ?")
        .bind(sort_key)
        .bind(name)
        .execute(executor)
        .await?;
    Ok(())
}

pub(super) async fn set_last_used<'e, E>(executor: E, name: &str, timestamp: i64) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE sources SET last_used_at = ? WHERE source = ?")
        .bind(timestamp)
        .bind(name)
        .execute(executor)
        .await?;
    Ok(())
}

pub(super) async fn disable_all<'e, E>(executor: E) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE sources SET enabled = 0")
        .execute(executor)
        .await?;
    Ok(())
}
