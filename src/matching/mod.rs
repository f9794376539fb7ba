//! Lost & found matching subsystem.
//!
//! Pairs "lost" and "found" item reports across a geospatial, temporal,
//! categorical, and multi-modal similarity space, organized into:
//! - `core`: Configuration, errors, IDs, item snapshots, candidates, match records
//! - `geo`: Spatial cell indexing and geodesic distance (pure)
//! - `retrieval`: Candidate retriever plus temporal and category filters
//! - `scoring`: Baseline component scores, weighted fusion, and explanations
//! - `signals`: Fuzzy lexical, multi-hash image, plateau decay, feedback loop
//! - `storage`: Item and match stores with `SQLite` backends
//! - `engine`: Ranking façade orchestrating the whole pipeline

pub mod core;
pub mod engine;
pub mod geo;
pub mod retrieval;
pub mod scoring;
pub mod signals;
pub mod storage;

// Re-export commonly used types for convenience
pub use core::{
    CategoryScoreTable, Confidence, FeedbackConfig, GeoPoint, ImageSignalMode, Item, ItemId,
    ItemStatus, MatchCandidate, MatchError, MatchId, MatchRecord, MatchResult, MatchStatus,
    MatchingConfig, MediaHashes, OwnerId, PlateauConfig, ScoreBreakdown, ScoreWeights,
    ScoringConfig, SearchConfig, SignalConfig, StorageConfig, TextSignalMode, TimeDecayMode,
    TimeWindow,
};
pub use engine::{MatchingBackends, MatchingEngine, RankingOptions, RankingOutcome};
pub use geo::{cell_key, haversine_km, neighbors};
pub use retrieval::{CandidateRetriever, filter_category, filter_temporal};
pub use scoring::{NEUTRAL_SCORE, ScoreCalculator, build_explanation};
pub use signals::{FeedbackLoop, FeedbackOutcome, SharedWeights};
pub use storage::{
    ItemStore, MatchStore, MemoryItemStore, MemoryMatchStore, SqliteItemStore, SqliteMatchStore,
    StoreFuture,
};
