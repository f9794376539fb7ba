//! Item report storage.
//!
//! The matching core only reads items; `put` exists for seeding by the
//! surrounding application and the research harness. The `SQLite` layout keeps
//! coordinates and the cell key as plain indexed columns so both blocking paths
//! ("cell key in set" and "bounding box") stay single queries.

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use tokio_rusqlite::Connection;

use crate::matching::core::config::StorageConfig;
use crate::matching::core::errors::{MatchError, MatchResult};
use crate::matching::core::ids::{ItemId, OwnerId};
use crate::matching::core::item::{GeoPoint, Item, ItemStatus, MediaHashes, TimeWindow};
use crate::matching::geo::distance::haversine_km;

/// Boxed future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Item store abstraction.
///
/// Every fetch excludes the query item itself and every item filed by the same
/// owner; self-matches must be impossible before scoring ever sees a candidate.
pub trait ItemStore: Send + Sync {
    /// Fetch items of `status` whose cell key is in `cells`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn fetch_by_cells(
        &self,
        status: ItemStatus,
        cells: Vec<String>,
        exclude_owner: OwnerId,
        exclude_item: ItemId,
    ) -> StoreFuture<'_, MatchResult<Vec<Item>>>;

    /// Fetch items of `status` within `radius_km` of `center`.
    ///
    /// Only items with exact coordinates can satisfy this query.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn fetch_within_radius(
        &self,
        status: ItemStatus,
        center: GeoPoint,
        radius_km: f64,
        exclude_owner: OwnerId,
        exclude_item: ItemId,
    ) -> StoreFuture<'_, MatchResult<Vec<Item>>>;

    /// Fetch the most recently reported items of `status`, capped at `limit`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn fetch_recent(
        &self,
        status: ItemStatus,
        exclude_owner: OwnerId,
        exclude_item: ItemId,
        limit: usize,
    ) -> StoreFuture<'_, MatchResult<Vec<Item>>>;

    /// Get one item by id.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get(&self, id: ItemId) -> StoreFuture<'_, MatchResult<Option<Item>>>;

    /// Insert or replace one item snapshot.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn put(&self, item: &Item) -> StoreFuture<'_, MatchResult<()>>;
}

/// Flat row shape used inside `SQLite` closures; parsed into [`Item`] outside.
#[derive(Clone, Debug)]
struct ItemRow {
    id: String,
    owner: String,
    status: String,
    category: String,
    subcategory: Option<String>,
    brand: Option<String>,
    model: Option<String>,
    color: Option<String>,
    title: Option<String>,
    description: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    cell_key: Option<String>,
    occurred_at: Option<String>,
    window_start: Option<String>,
    window_end: Option<String>,
    embedding_json: Option<String>,
    media_json: Option<String>,
    reported_at: String,
}

const SELECT_COLUMNS: &str = "id, owner_id, status, category, subcategory, brand, model, color, \
     title, description, lat, lon, cell_key, occurred_at, window_start, window_end, \
     embedding_json, media_json, reported_at";

impl ItemRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner: row.get(1)?,
            status: row.get(2)?,
            category: row.get(3)?,
            subcategory: row.get(4)?,
            brand: row.get(5)?,
            model: row.get(6)?,
            color: row.get(7)?,
            title: row.get(8)?,
            description: row.get(9)?,
            lat: row.get(10)?,
            lon: row.get(11)?,
            cell_key: row.get(12)?,
            occurred_at: row.get(13)?,
            window_start: row.get(14)?,
            window_end: row.get(15)?,
            embedding_json: row.get(16)?,
            media_json: row.get(17)?,
            reported_at: row.get(18)?,
        })
    }

    fn to_item(&self) -> MatchResult<Item> {
        let id = ItemId::from_str(&self.id)
            .map_err(|err| MatchError::InvalidItem(format!("invalid item id: {err}")))?;
        let owner = OwnerId::from_str(&self.owner)
            .map_err(|err| MatchError::InvalidItem(format!("invalid owner id: {err}")))?;
        let status = ItemStatus::from_str(&self.status)
            .map_err(|err| MatchError::InvalidItem(err.to_string()))?;

        let location = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)?),
            _ => None,
        };

        let occurred_at = self.occurred_at.as_deref().map(parse_timestamp).transpose()?;
        let window = match (self.window_start.as_deref(), self.window_end.as_deref()) {
            (Some(start), Some(end)) => {
                Some(TimeWindow::new(parse_timestamp(start)?, parse_timestamp(end)?)?)
            }
            _ => None,
        };

        let embedding = self
            .embedding_json
            .as_deref()
            .map(serde_json::from_str::<Vec<f32>>)
            .transpose()?;
        let media = self
            .media_json
            .as_deref()
            .map(serde_json::from_str::<Vec<MediaHashes>>)
            .transpose()?
            .unwrap_or_default();

        Ok(Item {
            id,
            owner,
            status,
            category: self.category.clone(),
            subcategory: self.subcategory.clone(),
            brand: self.brand.clone(),
            model: self.model.clone(),
            color: self.color.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            location,
            cell_key: self.cell_key.clone(),
            occurred_at,
            window,
            embedding,
            media,
            reported_at: parse_timestamp(&self.reported_at)?,
        })
    }
}

fn parse_timestamp(raw: &str) -> MatchResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| MatchError::InvalidTimestamp(format!("{raw:?}: {err}")))
}

fn rows_to_items(rows: Vec<ItemRow>) -> MatchResult<Vec<Item>> {
    rows.iter().map(ItemRow::to_item).collect()
}

/// `SQLite` implementation of the item store.
pub struct SqliteItemStore {
    conn: Connection,
    table: String,
}

impl SqliteItemStore {
    /// Open the database and ensure the schema exists.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn new(config: &StorageConfig) -> MatchResult<Self> {
        let conn = Connection::open(&config.sqlite_path).await?;
        let table = config.item_table.clone();
        let table_name = table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    id TEXT PRIMARY KEY,
                    owner_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    category TEXT NOT NULL,
                    subcategory TEXT,
                    brand TEXT,
                    model TEXT,
                    color TEXT,
                    title TEXT,
                    description TEXT,
                    lat REAL,
                    lon REAL,
                    cell_key TEXT,
                    occurred_at TEXT,
                    window_start TEXT,
                    window_end TEXT,
                    embedding_json TEXT,
                    media_json TEXT,
                    reported_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{table_name}_status_cell
                    ON {table_name} (status, cell_key);
                CREATE INDEX IF NOT EXISTS idx_{table_name}_status_reported
                    ON {table_name} (status, reported_at);"
            ))?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, table })
    }

    async fn query_rows(&self, sql: String, params: Vec<Value>) -> MatchResult<Vec<ItemRow>> {
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(params), ItemRow::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }
}

impl ItemStore for SqliteItemStore {
    fn fetch_by_cells(
        &self,
        status: ItemStatus,
        cells: Vec<String>,
        exclude_owner: OwnerId,
        exclude_item: ItemId,
    ) -> StoreFuture<'_, MatchResult<Vec<Item>>> {
        Box::pin(async move {
            if cells.is_empty() {
                return Ok(Vec::new());
            }

            let placeholders = (0..cells.len())
                .map(|i| format!("?{}", i + 4))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM {} \
                 WHERE status = ?1 AND owner_id != ?2 AND id != ?3 \
                 AND cell_key IN ({placeholders})",
                self.table
            );

            let mut params: Vec<Value> = vec![
                Value::from(status.as_str().to_string()),
                Value::from(exclude_owner.to_string()),
                Value::from(exclude_item.to_string()),
            ];
            params.extend(cells.into_iter().map(Value::from));

            rows_to_items(self.query_rows(sql, params).await?)
        })
    }

    fn fetch_within_radius(
        &self,
        status: ItemStatus,
        center: GeoPoint,
        radius_km: f64,
        exclude_owner: OwnerId,
        exclude_item: ItemId,
    ) -> StoreFuture<'_, MatchResult<Vec<Item>>> {
        Box::pin(async move {
            // Bounding-box prefilter in SQL, precise haversine below. One degree
            // of latitude is ~110.574 km; longitude shrinks with cos(lat).
            let lat_delta = radius_km / 110.574;
            let lon_delta = radius_km / (111.320 * center.lat.to_radians().cos().max(0.01));

            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM {} \
                 WHERE status = ?1 AND owner_id != ?2 AND id != ?3 \
                 AND lat IS NOT NULL AND lon IS NOT NULL \
                 AND lat BETWEEN ?4 AND ?5 AND lon BETWEEN ?6 AND ?7",
                self.table
            );
            let params: Vec<Value> = vec![
                Value::from(status.as_str().to_string()),
                Value::from(exclude_owner.to_string()),
                Value::from(exclude_item.to_string()),
                Value::from(center.lat - lat_delta),
                Value::from(center.lat + lat_delta),
                Value::from(center.lon - lon_delta),
                Value::from(center.lon + lon_delta),
            ];

            let items = rows_to_items(self.query_rows(sql, params).await?)?;
            Ok(items
                .into_iter()
                .filter(|item| {
                    item.location
                        .is_some_and(|loc| haversine_km(center, loc) <= radius_km)
                })
                .collect())
        })
    }

    fn fetch_recent(
        &self,
        status: ItemStatus,
        exclude_owner: OwnerId,
        exclude_item: ItemId,
        limit: usize,
    ) -> StoreFuture<'_, MatchResult<Vec<Item>>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM {} \
                 WHERE status = ?1 AND owner_id != ?2 AND id != ?3 \
                 ORDER BY reported_at DESC LIMIT ?4",
                self.table
            );
            let params: Vec<Value> = vec![
                Value::from(status.as_str().to_string()),
                Value::from(exclude_owner.to_string()),
                Value::from(exclude_item.to_string()),
                Value::from(i64::try_from(limit).unwrap_or(i64::MAX)),
            ];

            rows_to_items(self.query_rows(sql, params).await?)
        })
    }

    fn get(&self, id: ItemId) -> StoreFuture<'_, MatchResult<Option<Item>>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM {} WHERE id = ?1",
                self.table
            );
            let params = vec![Value::from(id.to_string())];
            let rows = self.query_rows(sql, params).await?;
            rows.first().map(ItemRow::to_item).transpose()
        })
    }

    fn put(&self, item: &Item) -> StoreFuture<'_, MatchResult<()>> {
        let table = self.table.clone();
        let row = row_from_item(item);
        Box::pin(async move {
            let row = row?;
            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT OR REPLACE INTO {table} (
                                id, owner_id, status, category, subcategory, brand, model, color,
                                title, description, lat, lon, cell_key, occurred_at,
                                window_start, window_end, embedding_json, media_json, reported_at
                            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"
                        ),
                        rusqlite::params![
                            row.id,
                            row.owner,
                            row.status,
                            row.category,
                            row.subcategory,
                            row.brand,
                            row.model,
                            row.color,
                            row.title,
                            row.description,
                            row.lat,
                            row.lon,
                            row.cell_key,
                            row.occurred_at,
                            row.window_start,
                            row.window_end,
                            row.embedding_json,
                            row.media_json,
                            row.reported_at,
                        ],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }
}

fn row_from_item(item: &Item) -> MatchResult<ItemRow> {
    let embedding_json = item
        .embedding
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let media_json = if item.media.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&item.media)?)
    };

    Ok(ItemRow {
        id: item.id.to_string(),
        owner: item.owner.to_string(),
        status: item.status.as_str().to_string(),
        category: item.category.clone(),
        subcategory: item.subcategory.clone(),
        brand: item.brand.clone(),
        model: item.model.clone(),
        color: item.color.clone(),
        title: item.title.clone(),
        description: item.description.clone(),
        lat: item.location.map(|loc| loc.lat),
        lon: item.location.map(|loc| loc.lon),
        cell_key: item.cell_key.clone(),
        occurred_at: item.occurred_at.map(|at| at.to_rfc3339()),
        window_start: item.window.map(|w| w.start.to_rfc3339()),
        window_end: item.window.map(|w| w.end.to_rfc3339()),
        embedding_json,
        media_json,
        reported_at: item.reported_at.to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::geo::cell::cell_key;

    fn memory_config() -> StorageConfig {
        StorageConfig {
            sqlite_path: std::path::PathBuf::from(":memory:"),
            ..StorageConfig::default()
        }
    }

    fn seeded_item(status: ItemStatus, lat: f64, lon: f64) -> Item {
        let location = GeoPoint::new(lat, lon).unwrap();
        let cell = cell_key(lat, lon, 5).unwrap();
        Item::new(status, "Electronics", OwnerId::new())
            .with_location(location)
            .with_cell_key(cell)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = SqliteItemStore::new(&memory_config()).await.unwrap();
        let item = seeded_item(ItemStatus::Lost, 6.9271, 79.8612)
            .with_subcategory("Phone")
            .with_brand("Samsung")
            .with_occurred_at(Utc::now())
            .with_embedding(vec![0.1, 0.2, 0.3])
            .with_media(MediaHashes::phash_only("8f373714acfcf4d0"));

        store.put(&item).await.unwrap();
        let loaded = store.get(item.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, item.id);
        assert_eq!(loaded.category, "Electronics");
        assert_eq!(loaded.subcategory.as_deref(), Some("Phone"));
        assert_eq!(loaded.embedding, item.embedding);
        assert_eq!(loaded.media, item.media);
        assert_eq!(loaded.location, item.location);
    }

    #[tokio::test]
    async fn test_fetch_by_cells_excludes_owner_and_self() {
        let store = SqliteItemStore::new(&memory_config()).await.unwrap();
        let query = seeded_item(ItemStatus::Lost, 6.9271, 79.8612);
        let same_owner = Item {
            owner: query.owner,
            ..seeded_item(ItemStatus::Found, 6.9271, 79.8612)
        };
        let candidate = seeded_item(ItemStatus::Found, 6.9273, 79.8615);

        for item in [&query, &same_owner, &candidate] {
            store.put(item).await.unwrap();
        }

        let cells = vec![query.cell_key.clone().unwrap()];
        let found = store
            .fetch_by_cells(ItemStatus::Found, cells, query.owner, query.id)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, candidate.id);
    }

    #[tokio::test]
    async fn test_fetch_within_radius_applies_precise_filter() {
        let store = SqliteItemStore::new(&memory_config()).await.unwrap();
        let near = seeded_item(ItemStatus::Found, 6.9300, 79.8612);
        let far = seeded_item(ItemStatus::Found, 7.4000, 79.8612);
        store.put(&near).await.unwrap();
        store.put(&far).await.unwrap();

        let center = GeoPoint::new(6.9271, 79.8612).unwrap();
        let found = store
            .fetch_within_radius(ItemStatus::Found, center, 5.0, OwnerId::new(), ItemId::new())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, near.id);
    }

    #[tokio::test]
    async fn test_fetch_recent_is_capped_and_ordered() {
        let store = SqliteItemStore::new(&memory_config()).await.unwrap();
        let mut newest = None;
        for hours in 0..5 {
            let mut item = seeded_item(ItemStatus::Found, 6.9271, 79.8612);
            item.reported_at = Utc::now() - chrono::Duration::hours(hours);
            if hours == 0 {
                newest = Some(item.id);
            }
            store.put(&item).await.unwrap();
        }

        let found = store
            .fetch_recent(ItemStatus::Found, OwnerId::new(), ItemId::new(), 3)
            .await
            .unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(Some(found[0].id), newest);
    }
}
