//! Persisted match record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::matching::core::candidate::ScoreBreakdown;
use crate::matching::core::ids::{ItemId, MatchId};

/// Lifecycle status of a persisted match.
///
/// Transitions beyond `Pending` belong to the surrounding claim workflow; the
/// matching core only creates records and refreshes their score fields.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Created by the matching core, not yet surfaced.
    Pending,
    /// Seen by the owner.
    Viewed,
    /// Rejected by the owner.
    Dismissed,
    /// Accepted and moved into the claim workflow.
    Claimed,
}

impl MatchStatus {
    /// Stable string representation (storage and logs).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Viewed => "viewed",
            Self::Dismissed => "dismissed",
            Self::Claimed => "claimed",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing a [`MatchStatus`] from a stored string.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MatchStatusParseError(pub String);

impl fmt::Display for MatchStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown match status: {}", self.0)
    }
}

impl std::error::Error for MatchStatusParseError {}

impl FromStr for MatchStatus {
    type Err = MatchStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "viewed" => Ok(Self::Viewed),
            "dismissed" => Ok(Self::Dismissed),
            "claimed" => Ok(Self::Claimed),
            other => Err(MatchStatusParseError(other.to_string())),
        }
    }
}

/// A persisted match between one lost and one found report.
///
/// The `(lost_item_id, found_item_id)` pair is unique; re-scoring the same pair
/// updates the existing record in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Unique record identifier.
    pub id: MatchId,
    /// The lost-item side of the pair.
    pub lost_item_id: ItemId,
    /// The found-item side of the pair.
    pub found_item_id: ItemId,
    /// Fused score at the last scoring pass.
    pub final_score: f64,
    /// Per-component scores at the last scoring pass.
    pub breakdown: ScoreBreakdown,
    /// Geodesic distance between the pair, when known.
    pub distance_km: Option<f64>,
    /// Absolute event-time delta in hours, when known.
    pub time_diff_hours: Option<f64>,
    /// Lifecycle status.
    pub status: MatchStatus,
    /// First time this pair scored above the persistence threshold.
    pub created_at: DateTime<Utc>,
    /// Last re-scoring time.
    pub updated_at: DateTime<Utc>,
}

impl MatchRecord {
    /// Build a fresh `Pending` record for a pair.
    #[must_use]
    pub fn new(
        lost_item_id: ItemId,
        found_item_id: ItemId,
        final_score: f64,
        breakdown: ScoreBreakdown,
        distance_km: Option<f64>,
        time_diff_hours: Option<f64>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: MatchId::new(),
            lost_item_id,
            found_item_id,
            final_score,
            breakdown,
            distance_km,
            time_diff_hours,
            status: MatchStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}
