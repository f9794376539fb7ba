//! In-memory store implementations for tests and the research harness.
//!
//! Brute-force over `DashMap` contents; semantics mirror the `SQLite` stores,
//! including owner/self exclusion and the precise radius filter.

use dashmap::DashMap;

use crate::matching::core::errors::{MatchError, MatchResult};
use crate::matching::core::ids::{ItemId, OwnerId};
use crate::matching::core::item::{GeoPoint, Item, ItemStatus};
use crate::matching::core::match_record::MatchRecord;
use crate::matching::geo::distance::haversine_km;
use crate::matching::storage::item_store::{ItemStore, StoreFuture};
use crate::matching::storage::match_store::MatchStore;

/// In-memory item store.
#[derive(Default)]
pub struct MemoryItemStore {
    items: DashMap<ItemId, Item>,
}

impl MemoryItemStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn filtered(
        &self,
        status: ItemStatus,
        exclude_owner: OwnerId,
        exclude_item: ItemId,
    ) -> Vec<Item> {
        self.items
            .iter()
            .filter(|entry| {
                let item = entry.value();
                item.status == status && item.owner != exclude_owner && item.id != exclude_item
            })
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl ItemStore for MemoryItemStore {
    fn fetch_by_cells(
        &self,
        status: ItemStatus,
        cells: Vec<String>,
        exclude_owner: OwnerId,
        exclude_item: ItemId,
    ) -> StoreFuture<'_, MatchResult<Vec<Item>>> {
        Box::pin(async move {
            Ok(self
                .filtered(status, exclude_owner, exclude_item)
                .into_iter()
                .filter(|item| {
                    item.cell_key
                        .as_deref()
                        .is_some_and(|cell| cells.iter().any(|c| c == cell))
                })
                .collect())
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
            Ok(self
                .filtered(status, exclude_owner, exclude_item)
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
            let mut items = self.filtered(status, exclude_owner, exclude_item);
            items.sort_by(|a, b| b.reported_at.cmp(&a.reported_at));
            items.truncate(limit);
            Ok(items)
        })
    }

    fn get(&self, id: ItemId) -> StoreFuture<'_, MatchResult<Option<Item>>> {
        Box::pin(async move { Ok(self.items.get(&id).map(|entry| entry.value().clone())) })
    }

    fn put(&self, item: &Item) -> StoreFuture<'_, MatchResult<()>> {
        let item = item.clone();
        Box::pin(async move {
            item.validate()?;
            self.items.insert(item.id, item);
            Ok(())
        })
    }
}

/// In-memory match store keyed by the unique pair.
#[derive(Default)]
pub struct MemoryMatchStore {
    records: DashMap<(ItemId, ItemId), MatchRecord>,
}

impl MemoryMatchStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl MatchStore for MemoryMatchStore {
    fn find_by_pair(
        &self,
        lost_item_id: ItemId,
        found_item_id: ItemId,
    ) -> StoreFuture<'_, MatchResult<Option<MatchRecord>>> {
        Box::pin(async move {
            Ok(self
                .records
                .get(&(lost_item_id, found_item_id))
                .map(|entry| entry.value().clone()))
        })
    }

    fn upsert(&self, record: MatchRecord) -> StoreFuture<'_, MatchResult<MatchRecord>> {
        Box::pin(async move {
            if record.lost_item_id == record.found_item_id {
                return Err(MatchError::Persistence(
                    "pair references the same item on both sides".to_string(),
                ));
            }

            let key = (record.lost_item_id, record.found_item_id);
            let stored = match self.records.entry(key) {
                dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                    let existing = entry.get_mut();
                    existing.final_score = record.final_score;
                    existing.breakdown = record.breakdown;
                    existing.distance_km = record.distance_km;
                    existing.time_diff_hours = record.time_diff_hours;
                    existing.updated_at = record.updated_at;
                    existing.clone()
                }
                dashmap::mapref::entry::Entry::Vacant(entry) => entry.insert(record).clone(),
            };
            Ok(stored)
        })
    }

    fn list_for_item(&self, item_id: ItemId) -> StoreFuture<'_, MatchResult<Vec<MatchRecord>>> {
        Box::pin(async move {
            let mut records: Vec<MatchRecord> = self
                .records
                .iter()
                .filter(|entry| {
                    entry.value().lost_item_id == item_id || entry.value().found_item_id == item_id
                })
                .map(|entry| entry.value().clone())
                .collect();
            records.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
            Ok(records)
        })
    }
}
