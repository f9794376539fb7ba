//! Core matching types and identifiers.

pub mod candidate;
pub mod config;
pub mod errors;
pub mod ids;
pub mod item;
pub mod match_record;

pub use candidate::{Confidence, MatchCandidate, ScoreBreakdown};
pub use config::{
    CategoryScoreTable, FeedbackConfig, ImageSignalMode, MatchingConfig, PlateauConfig,
    ScoreWeights, ScoringConfig, SearchConfig, SignalConfig, StorageConfig, TextSignalMode,
    TimeDecayMode,
};
pub use errors::{MatchError, MatchResult};
pub use ids::{ItemId, MatchId, OwnerId};
pub use item::{GeoPoint, Item, ItemStatus, ItemStatusParseError, MediaHashes, TimeWindow};
pub use match_record::{MatchRecord, MatchStatus, MatchStatusParseError};
