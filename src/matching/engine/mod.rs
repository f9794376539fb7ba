//! Matching engine orchestration.

pub mod core;

pub use core::{MatchingBackends, MatchingEngine, RankingOptions, RankingOutcome};
