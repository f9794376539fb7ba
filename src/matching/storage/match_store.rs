//! Match record storage.
//!
//! One row per `(lost_item_id, found_item_id)` pair, enforced by a unique index.
//! Re-scoring upserts in a single statement so concurrent writers cannot
//! duplicate a pair: score fields and `updated_at` are refreshed, while the
//! record id, lifecycle status, and `created_at` survive the conflict.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::matching::core::candidate::ScoreBreakdown;
use crate::matching::core::config::StorageConfig;
use crate::matching::core::errors::{MatchError, MatchResult};
use crate::matching::core::ids::{ItemId, MatchId};
use crate::matching::core::match_record::{MatchRecord, MatchStatus};
use crate::matching::storage::item_store::StoreFuture;

/// Match store abstraction.
pub trait MatchStore: Send + Sync {
    /// Find the record for a pair, if any.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn find_by_pair(
        &self,
        lost_item_id: ItemId,
        found_item_id: ItemId,
    ) -> StoreFuture<'_, MatchResult<Option<MatchRecord>>>;

    /// Insert the record, or update score fields in place when the pair exists.
    ///
    /// Returns the stored record: on update, the existing id, status, and
    /// `created_at` are preserved and the score fields reflect `record`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn upsert(&self, record: MatchRecord) -> StoreFuture<'_, MatchResult<MatchRecord>>;

    /// List all records referencing an item on either side of the pair.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_for_item(&self, item_id: ItemId) -> StoreFuture<'_, MatchResult<Vec<MatchRecord>>>;
}

#[derive(Clone, Debug)]
struct MatchRow {
    id: String,
    lost_item_id: String,
    found_item_id: String,
    final_score: f64,
    breakdown_json: String,
    distance_km: Option<f64>,
    time_diff_hours: Option<f64>,
    status: String,
    created_at: String,
    updated_at: String,
}

const SELECT_COLUMNS: &str = "id, lost_item_id, found_item_id, final_score, breakdown_json, \
     distance_km, time_diff_hours, status, created_at, updated_at";

impl MatchRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            lost_item_id: row.get(1)?,
            found_item_id: row.get(2)?,
            final_score: row.get(3)?,
            breakdown_json: row.get(4)?,
            distance_km: row.get(5)?,
            time_diff_hours: row.get(6)?,
            status: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn to_record(&self) -> MatchResult<MatchRecord> {
        let id = MatchId::from_str(&self.id)
            .map_err(|err| MatchError::InvalidItem(format!("invalid match id: {err}")))?;
        let lost_item_id = ItemId::from_str(&self.lost_item_id)
            .map_err(|err| MatchError::InvalidItem(format!("invalid lost item id: {err}")))?;
        let found_item_id = ItemId::from_str(&self.found_item_id)
            .map_err(|err| MatchError::InvalidItem(format!("invalid found item id: {err}")))?;
        let status = MatchStatus::from_str(&self.status)
            .map_err(|err| MatchError::InvalidItem(err.to_string()))?;
        let breakdown: ScoreBreakdown = serde_json::from_str(&self.breakdown_json)?;

        Ok(MatchRecord {
            id,
            lost_item_id,
            found_item_id,
            final_score: self.final_score,
            breakdown,
            distance_km: self.distance_km,
            time_diff_hours: self.time_diff_hours,
            status,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn parse_timestamp(raw: &str) -> MatchResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| MatchError::InvalidTimestamp(format!("{raw:?}: {err}")))
}

/// `SQLite` implementation of the match store.
pub struct SqliteMatchStore {
    conn: Connection,
    table: String,
}

impl SqliteMatchStore {
    /// Open the database and ensure the schema exists.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn new(config: &StorageConfig) -> MatchResult<Self> {
        let conn = Connection::open(&config.sqlite_path).await?;
        let table = config.match_table.clone();
        let table_name = table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    id TEXT PRIMARY KEY,
                    lost_item_id TEXT NOT NULL,
                    found_item_id TEXT NOT NULL,
                    final_score REAL NOT NULL,
                    breakdown_json TEXT NOT NULL,
                    distance_km REAL,
                    time_diff_hours REAL,
                    status TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                CREATE UNIQUE INDEX IF NOT EXISTS idx_{table_name}_pair
                    ON {table_name} (lost_item_id, found_item_id);"
            ))?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, table })
    }
}

impl MatchStore for SqliteMatchStore {
    fn find_by_pair(
        &self,
        lost_item_id: ItemId,
        found_item_id: ItemId,
    ) -> StoreFuture<'_, MatchResult<Option<MatchRecord>>> {
        Box::pin(async move {
            let table = self.table.clone();
            let lost = lost_item_id.to_string();
            let found = found_item_id.to_string();

            let row = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SELECT_COLUMNS} FROM {table} \
                         WHERE lost_item_id = ?1 AND found_item_id = ?2"
                    ))?;
                    let row = stmt
                        .query_row(rusqlite::params![lost, found], MatchRow::from_row)
                        .optional()?;
                    Ok(row)
                })
                .await?;

            row.as_ref().map(MatchRow::to_record).transpose()
        })
    }

    fn upsert(&self, record: MatchRecord) -> StoreFuture<'_, MatchResult<MatchRecord>> {
        Box::pin(async move {
            let table = self.table.clone();
            let breakdown_json = serde_json::to_string(&record.breakdown)?;
            let lost = record.lost_item_id.to_string();
            let found = record.found_item_id.to_string();
            let params_lost = lost.clone();
            let params_found = found.clone();
            let id = record.id.to_string();
            let status = record.status.as_str().to_string();
            let created_at = record.created_at.to_rfc3339();
            let updated_at = record.updated_at.to_rfc3339();
            let final_score = record.final_score;
            let distance_km = record.distance_km;
            let time_diff_hours = record.time_diff_hours;

            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table} (
                                id, lost_item_id, found_item_id, final_score, breakdown_json,
                                distance_km, time_diff_hours, status, created_at, updated_at
                            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                            ON CONFLICT(lost_item_id, found_item_id) DO UPDATE SET
                                final_score = excluded.final_score,
                                breakdown_json = excluded.breakdown_json,
                                distance_km = excluded.distance_km,
                                time_diff_hours = excluded.time_diff_hours,
                                updated_at = excluded.updated_at"
                        ),
                        rusqlite::params![
                            id,
                            params_lost,
                            params_found,
                            final_score,
                            breakdown_json,
                            distance_km,
                            time_diff_hours,
                            status,
                            created_at,
                            updated_at,
                        ],
                    )?;
                    Ok(())
                })
                .await?;

            let stored = self
                .find_by_pair(record.lost_item_id, record.found_item_id)
                .await?
                .ok_or_else(|| {
                    MatchError::Persistence(format!("upserted pair ({lost}, {found}) not found"))
                })?;
            Ok(stored)
        })
    }

    fn list_for_item(&self, item_id: ItemId) -> StoreFuture<'_, MatchResult<Vec<MatchRecord>>> {
        Box::pin(async move {
            let table = self.table.clone();
            let id = item_id.to_string();

            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SELECT_COLUMNS} FROM {table} \
                         WHERE lost_item_id = ?1 OR found_item_id = ?1 \
                         ORDER BY final_score DESC"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![id], MatchRow::from_row)?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    Ok(rows)
                })
                .await?;

            rows.iter().map(MatchRow::to_record).collect()
        })
    }
}
