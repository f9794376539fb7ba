//! Ranking façade orchestration.
//!
//! One ranking call walks Retrieve → Filter → Score → Sort → (optional)
//! Persist. Scoring fans out over a bounded pool; everything up to persistence
//! is side-effect free, so a dropped call cancels cleanly with nothing written.
//! A retrieval failure aborts the whole call — no partial ranked lists. A
//! persistence failure does not: the ranked results are returned alongside the
//! error.

use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::matching::core::candidate::MatchCandidate;
use crate::matching::core::config::MatchingConfig;
use crate::matching::core::errors::{MatchError, MatchResult};
use crate::matching::core::ids::ItemId;
use crate::matching::core::item::{Item, ItemStatus};
use crate::matching::core::match_record::MatchRecord;
use crate::matching::retrieval::{CandidateRetriever, filter_category, filter_temporal};
use crate::matching::scoring::calculator::ScoreCalculator;
use crate::matching::signals::feedback::SharedWeights;
use crate::matching::storage::item_store::ItemStore;
use crate::matching::storage::match_store::MatchStore;
use crate::matching::storage::memory::{MemoryItemStore, MemoryMatchStore};
use crate::matching::storage::{SqliteItemStore, SqliteMatchStore};

/// Backend dependencies for the matching engine.
pub struct MatchingBackends {
    /// Item store implementation.
    pub items: Arc<dyn ItemStore>,
    /// Match store implementation.
    pub matches: Arc<dyn MatchStore>,
}

impl MatchingBackends {
    /// Build default `SQLite` backends from config.
    ///
    /// # Errors
    /// Returns an error if any backend cannot be initialized.
    pub async fn sqlite(config: &MatchingConfig) -> MatchResult<Self> {
        let items = Arc::new(SqliteItemStore::new(&config.storage).await?);
        let matches = Arc::new(SqliteMatchStore::new(&config.storage).await?);
        Ok(Self { items, matches })
    }

    /// Build in-memory backends (tests, research harness).
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            items: Arc::new(MemoryItemStore::new()),
            matches: Arc::new(MemoryMatchStore::new()),
        }
    }
}

/// Per-call ranking options.
#[derive(Clone, Copy, Debug, Default)]
pub struct RankingOptions {
    /// Override for the configured top-K.
    pub top_k: Option<usize>,
    /// Whether to upsert match records for results above the score threshold.
    pub persist: bool,
}

impl RankingOptions {
    /// Preview-only ranking (no persistence).
    #[must_use]
    pub const fn preview() -> Self {
        Self {
            top_k: None,
            persist: false,
        }
    }

    /// Ranking with match persistence.
    #[must_use]
    pub const fn persisting() -> Self {
        Self {
            top_k: None,
            persist: true,
        }
    }
}

/// Result of one ranking call.
#[derive(Debug)]
pub struct RankingOutcome {
    /// Ranked candidates, best first, at most top-K entries.
    pub results: Vec<MatchCandidate>,
    /// Number of match records upserted.
    pub persisted: usize,
    /// Set when the persistence step failed; `results` are still valid.
    pub persistence_error: Option<MatchError>,
}

/// Matching engine façade.
///
/// The only entry point external callers need: wires the retriever, filters,
/// calculator, and stores together. Logically stateless per call — concurrent
/// rankings for different query items are independent.
pub struct MatchingEngine {
    config: MatchingConfig,
    matches: Arc<dyn MatchStore>,
    retriever: CandidateRetriever,
    items: Arc<dyn ItemStore>,
    weights: Arc<SharedWeights>,
    pair_guards: DashMap<(ItemId, ItemId), Arc<Mutex<()>>>,
}

impl MatchingEngine {
    /// Create an engine with weights fixed from configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: MatchingConfig, backends: MatchingBackends) -> MatchResult<Self> {
        let weights = Arc::new(SharedWeights::new(config.scoring.weights));
        Self::with_shared_weights(config, backends, weights)
    }

    /// Create an engine over an externally owned weight store, e.g. one driven
    /// by a feedback loop. Each ranking call snapshots the weights once.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn with_shared_weights(
        config: MatchingConfig,
        backends: MatchingBackends,
        weights: Arc<SharedWeights>,
    ) -> MatchResult<Self> {
        config.validate()?;
        let retriever = CandidateRetriever::new(Arc::clone(&backends.items), config.search.clone())?;

        Ok(Self {
            config,
            matches: backends.matches,
            retriever,
            items: backends.items,
            weights,
            pair_guards: DashMap::new(),
        })
    }

    /// Handle to the engine's weight store.
    #[must_use]
    pub fn weights(&self) -> Arc<SharedWeights> {
        Arc::clone(&self.weights)
    }

    /// Rank candidates for a stored item.
    ///
    /// # Errors
    /// Returns `InvalidItem` for an unknown id, otherwise as [`Self::rank`].
    pub async fn rank_item(
        &self,
        query_id: ItemId,
        options: RankingOptions,
    ) -> MatchResult<RankingOutcome> {
        let query = self
            .items
            .get(query_id)
            .await?
            .ok_or_else(|| MatchError::InvalidItem(format!("unknown item {query_id}")))?;
        self.rank(&query, options).await
    }

    /// Rank candidates for a query item snapshot.
    ///
    /// # Errors
    /// Returns `InvalidItem` for an unmatchable query, `Retrieval` when the
    /// candidate fetch fails. Persistence failures do not error the call; they
    /// surface in the outcome.
    pub async fn rank(&self, query: &Item, options: RankingOptions) -> MatchResult<RankingOutcome> {
        query.validate()?;
        let calculator = ScoreCalculator::new(&self.config, self.weights.snapshot());

        let candidates = self.retriever.retrieve(query).await?;
        debug!(query = %query.id, retrieved = candidates.len(), "retrieval done");

        let candidates = filter_temporal(query, candidates, self.config.search.window_days);
        let candidates = filter_category(query, candidates);
        debug!(query = %query.id, filtered = candidates.len(), "filters done");

        let calculator_ref = &calculator;
        let mut results: Vec<MatchCandidate> = stream::iter(candidates)
            .map(|candidate| async move { calculator_ref.score(query, &candidate) })
            .buffer_unordered(self.config.scoring.concurrency)
            .collect()
            .await;

        results.sort_by(|a, b| {
            b.final_score
                .total_cmp(&a.final_score)
                .then_with(|| recency(&b.item).cmp(&recency(&a.item)))
        });
        results.truncate(options.top_k.unwrap_or(self.config.scoring.top_k));
        debug!(query = %query.id, ranked = results.len(), "scoring done");

        let mut outcome = RankingOutcome {
            results,
            persisted: 0,
            persistence_error: None,
        };

        if options.persist {
            match self.persist(query, &outcome.results).await {
                Ok(persisted) => {
                    outcome.persisted = persisted;
                    info!(query = %query.id, persisted, "match records upserted");
                }
                Err(err) => {
                    warn!(query = %query.id, error = %err, "persistence failed, results returned");
                    outcome.persistence_error = Some(err);
                }
            }
        }

        Ok(outcome)
    }

    /// Upsert one record per result at or above the persistence threshold.
    ///
    /// Writes are serialized per (lost, found) pair: the `SQLite` upsert is
    /// already atomic on the unique pair index, and the per-pair guard extends
    /// the same guarantee to stores that cannot upsert atomically.
    async fn persist(&self, query: &Item, results: &[MatchCandidate]) -> MatchResult<usize> {
        let mut persisted = 0usize;
        for candidate in results {
            if candidate.final_score < self.config.scoring.min_match_score {
                continue;
            }

            let (lost_item_id, found_item_id) = match query.status {
                ItemStatus::Lost => (query.id, candidate.item.id),
                ItemStatus::Found => (candidate.item.id, query.id),
                ItemStatus::Claimed | ItemStatus::Closed => {
                    // Retrieval already rejects these; nothing to persist.
                    continue;
                }
            };

            let guard = self.pair_guard(lost_item_id, found_item_id);
            let _held = guard.lock().await;
            let record = MatchRecord::new(
                lost_item_id,
                found_item_id,
                candidate.final_score,
                candidate.breakdown,
                candidate.distance_km,
                candidate.time_diff_hours,
            );
            self.matches
                .upsert(record)
                .await
                .map_err(|err| MatchError::Persistence(err.to_string()))?;
            persisted += 1;
        }
        Ok(persisted)
    }

    fn pair_guard(&self, lost_item_id: ItemId, found_item_id: ItemId) -> Arc<Mutex<()>> {
        self.pair_guards
            .entry((lost_item_id, found_item_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn recency(item: &Item) -> chrono::DateTime<chrono::Utc> {
    item.occurred_at.unwrap_or(item.reported_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::core::ids::OwnerId;
    use crate::matching::core::item::GeoPoint;
    use crate::matching::geo::cell::cell_key;
    use crate::matching::storage::item_store::StoreFuture;
    use chrono::Utc;

    fn located(status: ItemStatus, lat: f64, lon: f64) -> Item {
        Item::new(status, "Electronics", OwnerId::new())
            .with_location(GeoPoint::new(lat, lon).unwrap())
            .with_cell_key(cell_key(lat, lon, 5).unwrap())
            .with_occurred_at(Utc::now())
    }

    async fn engine_with(items: &[Item]) -> MatchingEngine {
        let backends = MatchingBackends::in_memory();
        for item in items {
            backends.items.put(item).await.unwrap();
        }
        MatchingEngine::new(MatchingConfig::default(), backends).unwrap()
    }

    #[tokio::test]
    async fn test_rank_orders_and_excludes() {
        let query = located(ItemStatus::Lost, 6.9271, 79.8612);
        let near = located(ItemStatus::Found, 6.9280, 79.8620);
        let far = located(ItemStatus::Found, 6.9700, 79.9100);
        let same_owner = Item {
            owner: query.owner,
            ..located(ItemStatus::Found, 6.9271, 79.8612)
        };
        let wrong_category = Item {
            category: "Bags".to_string(),
            ..located(ItemStatus::Found, 6.9271, 79.8612)
        };

        let engine = engine_with(&[
            near.clone(),
            far.clone(),
            same_owner.clone(),
            wrong_category.clone(),
        ])
        .await;
        let outcome = engine.rank(&query, RankingOptions::preview()).await.unwrap();

        let ids: Vec<ItemId> = outcome.results.iter().map(|r| r.item.id).collect();
        assert_eq!(ids, vec![near.id, far.id]);
        assert!(outcome.results[0].final_score >= outcome.results[1].final_score);
        assert!(!ids.contains(&same_owner.id));
        assert!(!ids.contains(&wrong_category.id));
        assert_eq!(outcome.persisted, 0);
    }

    #[tokio::test]
    async fn test_top_k_truncation() {
        let query = located(ItemStatus::Lost, 6.9271, 79.8612);
        let candidates: Vec<Item> = (0..5)
            .map(|i| located(ItemStatus::Found, 6.9280 + f64::from(i) * 0.001, 79.8620))
            .collect();

        let engine = engine_with(&candidates).await;
        let options = RankingOptions {
            top_k: Some(2),
            persist: false,
        };
        let outcome = engine.rank(&query, options).await.unwrap();
        assert_eq!(outcome.results.len(), 2);
    }

    #[tokio::test]
    async fn test_persist_is_idempotent_per_pair() {
        let query = located(ItemStatus::Lost, 6.9271, 79.8612);
        let near = located(ItemStatus::Found, 6.9280, 79.8620);

        let backends = MatchingBackends::in_memory();
        backends.items.put(&near).await.unwrap();
        let matches = Arc::clone(&backends.matches);
        let engine = MatchingEngine::new(MatchingConfig::default(), backends).unwrap();

        let first = engine.rank(&query, RankingOptions::persisting()).await.unwrap();
        assert_eq!(first.persisted, 1);
        let second = engine.rank(&query, RankingOptions::persisting()).await.unwrap();
        assert_eq!(second.persisted, 1);

        // One record for the pair, carrying the latest score.
        let records = matches.list_for_item(query.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].lost_item_id, query.id);
        assert_eq!(records[0].found_item_id, near.id);
        assert!((records[0].final_score - second.results[0].final_score).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_found_query_flips_the_pair() {
        let query = located(ItemStatus::Found, 6.9271, 79.8612);
        let lost = located(ItemStatus::Lost, 6.9280, 79.8620);

        let backends = MatchingBackends::in_memory();
        backends.items.put(&lost).await.unwrap();
        let matches = Arc::clone(&backends.matches);
        let engine = MatchingEngine::new(MatchingConfig::default(), backends).unwrap();

        engine.rank(&query, RankingOptions::persisting()).await.unwrap();
        let records = matches.list_for_item(query.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].lost_item_id, lost.id);
        assert_eq!(records[0].found_item_id, query.id);
    }

    #[tokio::test]
    async fn test_low_scores_are_not_persisted() {
        // Same cell but nothing else in common: neutral-dominated score.
        let query = Item::new(ItemStatus::Lost, "Electronics", OwnerId::new())
            .with_cell_key("tc3mq");
        let candidate = Item::new(ItemStatus::Found, "Electronics", OwnerId::new())
            .with_subcategory("Phone")
            .with_cell_key("tc3mq");

        let backends = MatchingBackends::in_memory();
        backends.items.put(&candidate).await.unwrap();
        let matches = Arc::clone(&backends.matches);

        let mut config = MatchingConfig::default();
        config.scoring.min_match_score = 0.75;
        let engine = MatchingEngine::new(config, backends).unwrap();

        let outcome = engine.rank(&query, RankingOptions::persisting()).await.unwrap();
        assert!(!outcome.results.is_empty());
        assert_eq!(outcome.persisted, 0);
        assert!(matches.list_for_item(query.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_query_id_errors() {
        let engine = engine_with(&[]).await;
        assert!(matches!(
            engine.rank_item(ItemId::new(), RankingOptions::preview()).await,
            Err(MatchError::InvalidItem(_))
        ));
    }

    struct FailingMatchStore;

    impl MatchStore for FailingMatchStore {
        fn find_by_pair(
            &self,
            _lost_item_id: ItemId,
            _found_item_id: ItemId,
        ) -> StoreFuture<'_, MatchResult<Option<MatchRecord>>> {
            Box::pin(async { Err(MatchError::Persistence("store offline".to_string())) })
        }

        fn upsert(&self, _record: MatchRecord) -> StoreFuture<'_, MatchResult<MatchRecord>> {
            Box::pin(async { Err(MatchError::Persistence("store offline".to_string())) })
        }

        fn list_for_item(&self, _item_id: ItemId) -> StoreFuture<'_, MatchResult<Vec<MatchRecord>>> {
            Box::pin(async { Err(MatchError::Persistence("store offline".to_string())) })
        }
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_results() {
        let query = located(ItemStatus::Lost, 6.9271, 79.8612);
        let near = located(ItemStatus::Found, 6.9280, 79.8620);

        let items = Arc::new(MemoryItemStore::new());
        items.put(&near).await.unwrap();
        let backends = MatchingBackends {
            items,
            matches: Arc::new(FailingMatchStore),
        };
        let engine = MatchingEngine::new(MatchingConfig::default(), backends).unwrap();

        let outcome = engine.rank(&query, RankingOptions::persisting()).await.unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.persisted, 0);
        assert!(matches!(
            outcome.persistence_error,
            Some(MatchError::Persistence(_))
        ));
    }
}
