//! Transient candidate model with per-component score breakdown.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::matching::core::ids::ItemId;
use crate::matching::core::item::Item;

/// Per-component scores, each in [0, 1].
///
/// `text` and `image` are `None` when the corresponding optional signal is
/// disabled; a disabled signal contributes to neither the numerator nor the
/// denominator of the fused score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Category/subcategory component.
    pub category: f64,
    /// Geodesic distance-decay component.
    pub distance: f64,
    /// Time-decay component.
    pub time: f64,
    /// Attribute-equality component.
    pub attributes: f64,
    /// Text-similarity component, when enabled.
    pub text: Option<f64>,
    /// Image-similarity component, when enabled.
    pub image: Option<f64>,
}

impl ScoreBreakdown {
    /// Component name/value pairs that are active in this breakdown.
    #[must_use]
    pub fn components(&self) -> Vec<(&'static str, f64)> {
        let mut out = vec![
            ("category", self.category),
            ("distance", self.distance),
            ("time", self.time),
            ("attributes", self.attributes),
        ];
        if let Some(text) = self.text {
            out.push(("text", text));
        }
        if let Some(image) = self.image {
            out.push(("image", image));
        }
        out
    }
}

/// Confidence label derived from the fused score.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Fused score at or above the high threshold.
    High,
    /// Fused score in the medium band.
    Medium,
    /// Everything below.
    Low,
}

impl Confidence {
    /// High/medium band boundaries.
    const HIGH: f64 = 0.75;
    const MEDIUM: f64 = 0.5;

    /// Derive a label from a fused score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= Self::HIGH {
            Self::High
        } else if score >= Self::MEDIUM {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Stable string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A scored (query, candidate) pair.
///
/// Produced fresh on every ranking call and never mutated afterwards.
#[derive(Clone, Debug)]
pub struct MatchCandidate {
    /// The query item the candidate was scored against.
    pub query_id: ItemId,
    /// Candidate item snapshot.
    pub item: Item,
    /// Per-component scores.
    pub breakdown: ScoreBreakdown,
    /// Weighted fusion of the breakdown, normalized by active weight; in [0, 1].
    pub final_score: f64,
    /// Geodesic distance between the pair, when both sides have coordinates.
    pub distance_km: Option<f64>,
    /// Absolute event-time delta in hours, when both sides have timestamps.
    pub time_diff_hours: Option<f64>,
    /// Human-readable summary of the component scores.
    pub explanation: String,
    /// Confidence label derived from the fused score.
    pub confidence: Confidence,
}
