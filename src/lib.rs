//! Matching engine for lost & found item reports.
//!
//! Reduces an unbounded report corpus to a geographically and temporally
//! plausible candidate set, scores each pair with a deterministic, explainable
//! weighted fusion, and upserts match records idempotently. User accounts,
//! uploads, chat, and claim workflows live in the surrounding application;
//! this crate only consumes item snapshots and emits scored matches.

// Strict lint policy: no unsafe, no undocumented public items,
// no panicking shortcuts in library code.
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(unused_must_use)]
#![forbid(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![allow(clippy::module_name_repetitions)]
// Test code is exempt from the panic bans.
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

/// Candidate matching, scoring, and ranking components.
pub mod matching;

pub use matching::{
    Item, ItemId, ItemStatus, MatchCandidate, MatchError, MatchRecord, MatchResult,
    MatchingBackends, MatchingConfig, MatchingEngine, RankingOptions, RankingOutcome,
};
