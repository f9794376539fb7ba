//! Candidate retrieval and pre-scoring filters.

pub mod category;
pub mod temporal;

pub use category::filter_category;
pub use temporal::filter_temporal;

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::matching::core::config::SearchConfig;
use crate::matching::core::errors::{MatchError, MatchResult};
use crate::matching::core::item::{GeoPoint, Item};
use crate::matching::geo::cell::{cell_key, decode, neighbors};
use crate::matching::geo::distance::haversine_km;
use crate::matching::storage::item_store::ItemStore;

/// Reduces the item corpus to a geographically plausible candidate set without
/// a full scan.
///
/// Three paths, coarsest-sufficient first: spatial-cell blocking over the
/// 9-cell neighbor ring, a bounded-radius geodesic query when only raw
/// coordinates exist, and a recency-capped fetch when the query carries no
/// geography at all. Indexer failures on the query item are recovered locally
/// by dropping to the next path; they never fail the call.
pub struct CandidateRetriever {
    store: Arc<dyn ItemStore>,
    config: SearchConfig,
    ring_cache: Mutex<LruCache<String, Vec<String>>>,
}

impl CandidateRetriever {
    /// Create a retriever over an item store.
    ///
    /// # Errors
    /// Returns an error if the neighbor cache capacity is zero.
    pub fn new(store: Arc<dyn ItemStore>, config: SearchConfig) -> MatchResult<Self> {
        let capacity = NonZeroUsize::new(config.neighbor_cache_capacity).ok_or_else(|| {
            MatchError::InvalidConfig("search.neighbor_cache_capacity must be > 0".to_string())
        })?;

        Ok(Self {
            store,
            config,
            ring_cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Fetch opposite-status, different-owner candidates for a query item.
    ///
    /// # Errors
    /// Returns `InvalidItem` for a query that is not matchable (claimed/closed)
    /// and `Retrieval` when the underlying store fails.
    pub async fn retrieve(&self, query: &Item) -> MatchResult<Vec<Item>> {
        let target = query.status.counterpart().ok_or_else(|| {
            MatchError::InvalidItem(format!(
                "items with status {} do not participate in matching",
                query.status
            ))
        })?;

        if let Some(cell) = self.resolve_cell(query) {
            match self.ring(&cell).await {
                Ok(ring) => {
                    let fetched = self
                        .store
                        .fetch_by_cells(target, ring, query.owner, query.id)
                        .await
                        .map_err(as_retrieval)?;
                    let reference = query
                        .location
                        .or_else(|| decode(&cell).ok().map(|bounds| bounds.center));
                    let kept = precise_filter(fetched, reference, self.config.max_radius_km);
                    debug!(cell = %cell, candidates = kept.len(), "cell-blocked retrieval");
                    return Ok(kept);
                }
                Err(err) => {
                    // Bad precomputed key: treat as "no spatial key available".
                    warn!(cell = %cell, error = %err, "cell ring failed, falling back");
                }
            }
        }

        if let Some(center) = query.location {
            let kept = self
                .store
                .fetch_within_radius(
                    target,
                    center,
                    self.config.max_radius_km,
                    query.owner,
                    query.id,
                )
                .await
                .map_err(as_retrieval)?;
            debug!(candidates = kept.len(), "radius retrieval");
            return Ok(kept);
        }

        let kept = self
            .store
            .fetch_recent(target, query.owner, query.id, self.config.fallback_limit)
            .await
            .map_err(as_retrieval)?;
        debug!(candidates = kept.len(), "recency-capped retrieval");
        Ok(kept)
    }

    /// The query's cell key: precomputed when present, else derived from its
    /// coordinates. `None` means no spatial key is available.
    fn resolve_cell(&self, query: &Item) -> Option<String> {
        if let Some(cell) = &query.cell_key {
            return Some(cell.clone());
        }

        let location = query.location?;
        match cell_key(location.lat, location.lon, self.config.cell_precision) {
            Ok(cell) => Some(cell),
            Err(err) => {
                warn!(error = %err, "query coordinates unusable for cell blocking");
                None
            }
        }
    }

    async fn ring(&self, cell: &str) -> MatchResult<Vec<String>> {
        let mut cache = self.ring_cache.lock().await;
        if let Some(ring) = cache.get(cell) {
            return Ok(ring.clone());
        }

        let ring = neighbors(cell)?;
        cache.put(cell.to_string(), ring.clone());
        Ok(ring)
    }
}

/// Secondary precise-distance filter for cell-blocked candidates.
///
/// Candidates without exact coordinates stay in: spatially ambiguous, not
/// excluded. Without a reference point there is nothing to measure against.
fn precise_filter(candidates: Vec<Item>, reference: Option<GeoPoint>, radius_km: f64) -> Vec<Item> {
    let Some(reference) = reference else {
        return candidates;
    };

    candidates
        .into_iter()
        .filter(|candidate| match candidate.location {
            Some(location) => haversine_km(reference, location) <= radius_km,
            None => true,
        })
        .collect()
}

fn as_retrieval(err: MatchError) -> MatchError {
    MatchError::Retrieval(err.to_string())
}
