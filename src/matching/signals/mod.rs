//! Advanced signal extensions.
//!
//! Optional, higher-cost signals that slot into the score calculator without
//! changing the ranking façade: fuzzy lexical matching, multi-hash image
//! comparison, peak-plateau time decay, and the feedback-driven weight loop.

pub mod feedback;
pub mod fuzzy;
pub mod image;
pub mod time_decay;

pub use feedback::{FeedbackLoop, FeedbackOutcome, SharedWeights};
pub use fuzzy::{normalize_tokens, text_similarity};
pub use image::{best_multi_hash_similarity, best_primary_similarity, hash_similarity, parse_hash};
pub use time_decay::{exponential_score, plateau_score};
