//! Item report model.
//!
//! The matching core treats items as **immutable snapshots** for the duration of
//! one ranking call. The surrounding application owns their lifecycle; embeddings
//! and perceptual hashes arrive precomputed on the record.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::matching::core::errors::{MatchError, MatchResult};
use crate::matching::core::ids::{ItemId, OwnerId};

/// Lifecycle status of an item report.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Reported lost by its owner.
    Lost,
    /// Reported found by a third party.
    Found,
    /// Claimed through the surrounding workflow.
    Claimed,
    /// Closed without resolution.
    Closed,
}

impl ItemStatus {
    /// Stable string representation (storage and logs).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lost => "lost",
            Self::Found => "found",
            Self::Claimed => "claimed",
            Self::Closed => "closed",
        }
    }

    /// The status a matching candidate must have, if this status is matchable.
    ///
    /// Lost pairs with found and vice versa; claimed and closed reports no
    /// longer participate in matching.
    #[must_use]
    pub const fn counterpart(self) -> Option<Self> {
        match self {
            Self::Lost => Some(Self::Found),
            Self::Found => Some(Self::Lost),
            Self::Claimed | Self::Closed => None,
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an [`ItemStatus`] from a stored string.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ItemStatusParseError(pub String);

impl fmt::Display for ItemStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown item status: {}", self.0)
    }
}

impl std::error::Error for ItemStatusParseError {}

impl FromStr for ItemStatus {
    type Err = ItemStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lost" => Ok(Self::Lost),
            "found" => Ok(Self::Found),
            "claimed" => Ok(Self::Claimed),
            "closed" => Ok(Self::Closed),
            other => Err(ItemStatusParseError(other.to_string())),
        }
    }
}

/// A validated geographic point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees, [-90, 90].
    pub lat: f64,
    /// Longitude in degrees, [-180, 180].
    pub lon: f64,
}

impl GeoPoint {
    /// Build a validated point.
    ///
    /// # Errors
    /// Returns `InvalidCoordinate` for non-finite or out-of-range values.
    pub fn new(lat: f64, lon: f64) -> MatchResult<Self> {
        if !lat.is_finite() || !lon.is_finite() || !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(MatchError::InvalidCoordinate { lat, lon });
        }
        Ok(Self { lat, lon })
    }
}

/// An inclusive time window `[start, end]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Window start.
    pub start: DateTime<Utc>,
    /// Window end.
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Build a window, rejecting `start > end`.
    ///
    /// # Errors
    /// Returns `InvalidTimestamp` when the bounds are reversed.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> MatchResult<Self> {
        if start > end {
            return Err(MatchError::InvalidTimestamp(format!(
                "window start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Degenerate window around a single instant.
    #[must_use]
    pub const fn instant(at: DateTime<Utc>) -> Self {
        Self { start: at, end: at }
    }

    /// Symmetric window of `slack_days` around an instant.
    #[must_use]
    pub fn around(at: DateTime<Utc>, slack_days: i64) -> Self {
        let slack = Duration::days(slack_days);
        Self {
            start: at - slack,
            end: at + slack,
        }
    }

    /// Interval-overlap check: `self.start <= other.end && self.end >= other.start`.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && self.end >= other.start
    }
}

/// Perceptual hash families computed for one media asset.
///
/// Each hash is a 16-character hex string encoding 64 bits. Assets may carry any
/// subset of families; the baseline image signal compares one primary hash per
/// asset, the multi-hash signal compares every family both assets share.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MediaHashes {
    /// Average hash.
    pub ahash: Option<String>,
    /// Difference hash.
    pub dhash: Option<String>,
    /// Perceptual (DCT) hash.
    pub phash: Option<String>,
    /// Wavelet hash.
    pub whash: Option<String>,
}

impl MediaHashes {
    /// Build an asset fingerprint carrying only a perceptual hash.
    #[must_use]
    pub fn phash_only(hash: impl Into<String>) -> Self {
        Self {
            phash: Some(hash.into()),
            ..Self::default()
        }
    }

    /// The preferred single hash for baseline comparison.
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        self.phash
            .as_deref()
            .or(self.dhash.as_deref())
            .or(self.ahash.as_deref())
            .or(self.whash.as_deref())
    }

    /// Hash families present on this asset, tagged by a stable family name.
    #[must_use]
    pub fn families(&self) -> Vec<(&'static str, &str)> {
        let mut out = Vec::new();
        if let Some(hash) = self.ahash.as_deref() {
            out.push(("ahash", hash));
        }
        if let Some(hash) = self.dhash.as_deref() {
            out.push(("dhash", hash));
        }
        if let Some(hash) = self.phash.as_deref() {
            out.push(("phash", hash));
        }
        if let Some(hash) = self.whash.as_deref() {
            out.push(("whash", hash));
        }
        out
    }

    /// Whether the asset carries no hash at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.ahash.is_none() && self.dhash.is_none() && self.phash.is_none() && self.whash.is_none()
    }
}

/// An item report snapshot consumed by the matching core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique report identifier.
    pub id: ItemId,
    /// Account that filed the report.
    pub owner: OwnerId,
    /// Lifecycle status.
    pub status: ItemStatus,
    /// Required category (e.g. "Electronics").
    pub category: String,
    /// Optional subcategory (e.g. "Phone").
    pub subcategory: Option<String>,
    /// Optional brand attribute.
    pub brand: Option<String>,
    /// Optional model attribute.
    pub model: Option<String>,
    /// Optional color attribute.
    pub color: Option<String>,
    /// Optional short title.
    pub title: Option<String>,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Where the item was lost/found, when known.
    pub location: Option<GeoPoint>,
    /// Precomputed spatial cell key, when known.
    pub cell_key: Option<String>,
    /// When the loss/find happened, when known.
    pub occurred_at: Option<DateTime<Utc>>,
    /// Explicit uncertainty window around the event, when known.
    pub window: Option<TimeWindow>,
    /// Precomputed text embedding, when available.
    pub embedding: Option<Vec<f32>>,
    /// Perceptual hashes of attached media.
    pub media: Vec<MediaHashes>,
    /// When the report was filed.
    pub reported_at: DateTime<Utc>,
}

impl Item {
    /// Create a minimal report snapshot.
    #[must_use]
    pub fn new(status: ItemStatus, category: impl Into<String>, owner: OwnerId) -> Self {
        Self {
            id: ItemId::new(),
            owner,
            status,
            category: category.into(),
            subcategory: None,
            brand: None,
            model: None,
            color: None,
            title: None,
            description: None,
            location: None,
            cell_key: None,
            occurred_at: None,
            window: None,
            embedding: None,
            media: Vec::new(),
            reported_at: Utc::now(),
        }
    }

    /// Set the subcategory.
    #[must_use]
    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    /// Set the brand attribute.
    #[must_use]
    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    /// Set the model attribute.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the color attribute.
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Set the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the location.
    #[must_use]
    pub const fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the precomputed cell key.
    #[must_use]
    pub fn with_cell_key(mut self, cell_key: impl Into<String>) -> Self {
        self.cell_key = Some(cell_key.into());
        self
    }

    /// Set the event timestamp.
    #[must_use]
    pub const fn with_occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(at);
        self
    }

    /// Set the explicit time window.
    #[must_use]
    pub const fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Set the text embedding.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Append a media fingerprint.
    #[must_use]
    pub fn with_media(mut self, media: MediaHashes) -> Self {
        self.media.push(media);
        self
    }

    /// Validate the snapshot.
    ///
    /// # Errors
    /// Returns an error if the category is empty or an explicit window is reversed.
    pub fn validate(&self) -> MatchResult<()> {
        if self.category.trim().is_empty() {
            return Err(MatchError::InvalidItem("category is empty".to_string()));
        }

        if let Some(window) = &self.window {
            if window.start > window.end {
                return Err(MatchError::InvalidTimestamp(format!(
                    "window start {} is after end {}",
                    window.start, window.end
                )));
            }
        }

        Ok(())
    }

    /// The effective time window: explicit window, else `occurred_at ± slack_days`.
    ///
    /// `None` when the report carries no temporal information at all.
    #[must_use]
    pub fn effective_window(&self, slack_days: i64) -> Option<TimeWindow> {
        if let Some(window) = self.window {
            return Some(window);
        }
        self.occurred_at
            .map(|at| TimeWindow::around(at, slack_days))
    }

    /// Title and description joined for lexical comparison.
    #[must_use]
    pub fn text_blob(&self) -> Option<String> {
        match (self.title.as_deref(), self.description.as_deref()) {
            (Some(title), Some(description)) => Some(format!("{title} {description}")),
            (Some(text), None) | (None, Some(text)) => Some(text.to_string()),
            (None, None) => None,
        }
    }

    /// Whether any media asset carries at least one hash.
    #[must_use]
    pub fn has_image_hashes(&self) -> bool {
        self.media.iter().any(|media| !media.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counterpart_pairs_lost_with_found() {
        assert_eq!(ItemStatus::Lost.counterpart(), Some(ItemStatus::Found));
        assert_eq!(ItemStatus::Found.counterpart(), Some(ItemStatus::Lost));
        assert_eq!(ItemStatus::Claimed.counterpart(), None);
        assert_eq!(ItemStatus::Closed.counterpart(), None);
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ItemStatus::Lost,
            ItemStatus::Found,
            ItemStatus::Claimed,
            ItemStatus::Closed,
        ] {
            assert_eq!(status.as_str().parse::<ItemStatus>().unwrap(), status);
        }
        assert!("misplaced".parse::<ItemStatus>().is_err());
    }

    #[test]
    fn test_geo_point_rejects_out_of_range() {
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, 181.0).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(6.9271, 79.8612).is_ok());
    }

    #[test]
    fn test_window_overlap_is_inclusive() {
        let base = Utc::now();
        let a = TimeWindow::new(base, base + Duration::hours(2)).unwrap();
        let touching = TimeWindow::new(base + Duration::hours(2), base + Duration::hours(4)).unwrap();
        let disjoint = TimeWindow::new(base + Duration::hours(5), base + Duration::hours(6)).unwrap();
        assert!(a.overlaps(&touching));
        assert!(touching.overlaps(&a));
        assert!(!a.overlaps(&disjoint));
    }

    #[test]
    fn test_effective_window_prefers_explicit() {
        let base = Utc::now();
        let explicit = TimeWindow::new(base, base + Duration::hours(1)).unwrap();
        let item = Item::new(ItemStatus::Lost, "Electronics", OwnerId::new())
            .with_occurred_at(base)
            .with_window(explicit);
        assert_eq!(item.effective_window(7), Some(explicit));

        let derived = Item::new(ItemStatus::Lost, "Electronics", OwnerId::new())
            .with_occurred_at(base)
            .effective_window(7)
            .unwrap();
        assert_eq!(derived.start, base - Duration::days(7));
        assert_eq!(derived.end, base + Duration::days(7));
    }

    #[test]
    fn test_media_primary_preference() {
        let media = MediaHashes {
            ahash: Some("aaaaaaaaaaaaaaaa".to_string()),
            dhash: Some("bbbbbbbbbbbbbbbb".to_string()),
            phash: Some("cccccccccccccccc".to_string()),
            whash: None,
        };
        assert_eq!(media.primary(), Some("cccccccccccccccc"));
        assert_eq!(media.families().len(), 3);
    }

    #[test]
    fn test_validate_rejects_empty_category() {
        let item = Item::new(ItemStatus::Lost, "  ", OwnerId::new());
        assert!(item.validate().is_err());
    }
}
