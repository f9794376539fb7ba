//! Configuration for the matching engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::matching::core::errors::{MatchError, MatchResult};

/// Top-level configuration for the matching engine.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Candidate search settings.
    pub search: SearchConfig,
    /// Scoring weights and thresholds.
    pub scoring: ScoringConfig,
    /// Optional-signal settings.
    pub signals: SignalConfig,
    /// Feedback loop settings.
    pub feedback: FeedbackConfig,
    /// Storage settings.
    pub storage: StorageConfig,
}

impl MatchingConfig {
    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid, including an
    /// all-zero active weight sum (which would make every fused score undefined).
    pub fn validate(&self) -> MatchResult<()> {
        if !self.search.max_radius_km.is_finite() || self.search.max_radius_km <= 0.0 {
            return Err(MatchError::InvalidConfig(
                "search.max_radius_km must be > 0".to_string(),
            ));
        }

        if self.search.cell_precision == 0 || self.search.cell_precision > 12 {
            return Err(MatchError::InvalidConfig(
                "search.cell_precision must be in 1..=12".to_string(),
            ));
        }

        if self.search.window_days <= 0 {
            return Err(MatchError::InvalidConfig(
                "search.window_days must be > 0".to_string(),
            ));
        }

        if self.search.fallback_limit == 0 {
            return Err(MatchError::InvalidConfig(
                "search.fallback_limit must be > 0".to_string(),
            ));
        }

        if self.search.neighbor_cache_capacity == 0 {
            return Err(MatchError::InvalidConfig(
                "search.neighbor_cache_capacity must be > 0".to_string(),
            ));
        }

        self.scoring.validate(&self.signals)?;
        self.signals.validate()?;
        self.feedback.validate()?;

        Ok(())
    }
}

/// Candidate search settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum geodesic search radius in kilometers.
    pub max_radius_km: f64,
    /// Spatial cell precision (geohash characters).
    pub cell_precision: usize,
    /// Default time window half-width in days when an item has no explicit window.
    pub window_days: i64,
    /// Cap on the recency-ordered fallback fetch when no geography is available.
    pub fallback_limit: usize,
    /// LRU capacity for cached neighbor rings.
    pub neighbor_cache_capacity: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_radius_km: 50.0,
            cell_precision: 5,
            window_days: 14,
            fallback_limit: 100,
            neighbor_cache_capacity: 256,
        }
    }
}

/// Per-component fusion weights.
///
/// Replaces the dynamic weight dictionaries of earlier experiments with named
/// fields validated at construction. Text and image weights only enter the
/// fusion denominator when the corresponding signal is enabled.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Category component weight.
    pub category: f64,
    /// Distance-decay component weight.
    pub distance: f64,
    /// Time-decay component weight.
    pub time: f64,
    /// Attribute-equality component weight.
    pub attributes: f64,
    /// Text-similarity component weight (active only when the signal is enabled).
    pub text: f64,
    /// Image-similarity component weight (active only when the signal is enabled).
    pub image: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            category: 0.30,
            distance: 0.25,
            time: 0.20,
            attributes: 0.10,
            text: 0.10,
            image: 0.05,
        }
    }
}

impl ScoreWeights {
    /// Sum of the weights participating in fusion for the given enable flags.
    #[must_use]
    pub fn active_sum(&self, text_enabled: bool, image_enabled: bool) -> f64 {
        let mut sum = self.category + self.distance + self.time + self.attributes;
        if text_enabled {
            sum += self.text;
        }
        if image_enabled {
            sum += self.image;
        }
        sum
    }

    fn components(&self) -> [(&'static str, f64); 6] {
        [
            ("category", self.category),
            ("distance", self.distance),
            ("time", self.time),
            ("attributes", self.attributes),
            ("text", self.text),
            ("image", self.image),
        ]
    }
}

/// Category score constants.
///
/// The subcategory-mismatch value is an undocumented heuristic in the origin
/// deployment, so all three constants are tunable rather than hard-coded.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryScoreTable {
    /// Category and subcategory both match.
    pub full_match: f64,
    /// Category matches; at least one side has no subcategory.
    pub category_only: f64,
    /// Category matches; both subcategories present but different.
    pub subcategory_mismatch: f64,
}

impl Default for CategoryScoreTable {
    fn default() -> Self {
        Self {
            full_match: 1.0,
            category_only: 0.8,
            subcategory_mismatch: 0.6,
        }
    }
}

/// Scoring weights and thresholds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Fusion weights.
    pub weights: ScoreWeights,
    /// Category score constants.
    pub category: CategoryScoreTable,
    /// Minimum fused score for a pair to be persisted.
    pub min_match_score: f64,
    /// Default number of ranked results to return.
    pub top_k: usize,
    /// Bounded worker pool size for per-candidate scoring.
    pub concurrency: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            category: CategoryScoreTable::default(),
            min_match_score: 0.4,
            top_k: 10,
            concurrency: 8,
        }
    }
}

impl ScoringConfig {
    fn validate(&self, signals: &SignalConfig) -> MatchResult<()> {
        for (name, weight) in self.weights.components() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(MatchError::InvalidConfig(format!(
                    "scoring.weights.{name} must be finite and >= 0"
                )));
            }
        }

        if self.weights.active_sum(signals.text_enabled, signals.image_enabled) <= 0.0 {
            return Err(MatchError::InvalidConfig(
                "scoring.weights: active weights sum to zero".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.min_match_score) {
            return Err(MatchError::InvalidConfig(
                "scoring.min_match_score must be in [0, 1]".to_string(),
            ));
        }

        for (name, value) in [
            ("full_match", self.category.full_match),
            ("category_only", self.category.category_only),
            ("subcategory_mismatch", self.category.subcategory_mismatch),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(MatchError::InvalidConfig(format!(
                    "scoring.category.{name} must be in [0, 1]"
                )));
            }
        }

        if self.top_k == 0 {
            return Err(MatchError::InvalidConfig(
                "scoring.top_k must be > 0".to_string(),
            ));
        }

        if self.concurrency == 0 {
            return Err(MatchError::InvalidConfig(
                "scoring.concurrency must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Text signal strategy selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSignalMode {
    /// Embedding cosine similarity only.
    Embedding,
    /// Fuzzy lexical similarity only.
    Fuzzy,
    /// Embedding cosine when both sides carry vectors, fuzzy lexical otherwise.
    #[default]
    Auto,
}

/// Image signal strategy selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSignalMode {
    /// Compare one primary hash per asset.
    #[default]
    Primary,
    /// Compare all hash families both assets share, averaged per pair.
    MultiHash,
}

/// Time-decay strategy selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeDecayMode {
    /// Plain exponential decay over the search window.
    #[default]
    Exponential,
    /// Full score within a peak window, half-life decay beyond, floored.
    Plateau,
}

/// Plateau decay curve settings.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PlateauConfig {
    /// Window in hours scoring 1.0 regardless of the exact delta.
    pub peak_hours: f64,
    /// Half-life in hours of the decay beyond the peak window.
    pub half_life_hours: f64,
    /// Minimum score; recency never fully eliminates a candidate.
    pub floor: f64,
}

impl Default for PlateauConfig {
    fn default() -> Self {
        Self {
            peak_hours: 24.0,
            half_life_hours: 72.0,
            floor: 0.1,
        }
    }
}

/// Optional-signal settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Whether the text-similarity component participates in fusion.
    pub text_enabled: bool,
    /// Whether the image-similarity component participates in fusion.
    pub image_enabled: bool,
    /// Text strategy.
    pub text_mode: TextSignalMode,
    /// Image strategy.
    pub image_mode: ImageSignalMode,
    /// Time-decay strategy.
    pub time_mode: TimeDecayMode,
    /// Plateau curve settings (used when `time_mode` is `Plateau`).
    pub plateau: PlateauConfig,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            text_enabled: true,
            image_enabled: true,
            text_mode: TextSignalMode::default(),
            image_mode: ImageSignalMode::default(),
            time_mode: TimeDecayMode::default(),
            plateau: PlateauConfig::default(),
        }
    }
}

impl SignalConfig {
    fn validate(&self) -> MatchResult<()> {
        if !self.plateau.peak_hours.is_finite() || self.plateau.peak_hours < 0.0 {
            return Err(MatchError::InvalidConfig(
                "signals.plateau.peak_hours must be finite and >= 0".to_string(),
            ));
        }

        if !self.plateau.half_life_hours.is_finite() || self.plateau.half_life_hours <= 0.0 {
            return Err(MatchError::InvalidConfig(
                "signals.plateau.half_life_hours must be > 0".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.plateau.floor) {
            return Err(MatchError::InvalidConfig(
                "signals.plateau.floor must be in [0, 1)".to_string(),
            ));
        }

        Ok(())
    }
}

/// Feedback-driven weight adjustment settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Sliding window size over recent accept/reject events.
    pub window: usize,
    /// Minimum events in the window before any adjustment is considered.
    pub min_events: usize,
    /// Acceptance rate below which weights are nudged toward the text signal.
    pub acceptance_threshold: f64,
    /// Size of one weight nudge.
    pub step: f64,
    /// Per-component weight floor after clamping.
    pub min_weight: f64,
    /// Per-component weight ceiling after clamping.
    pub max_weight: f64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            window: 50,
            min_events: 10,
            acceptance_threshold: 0.35,
            step: 0.05,
            min_weight: 0.05,
            max_weight: 0.60,
        }
    }
}

impl FeedbackConfig {
    fn validate(&self) -> MatchResult<()> {
        if self.window == 0 {
            return Err(MatchError::InvalidConfig(
                "feedback.window must be > 0".to_string(),
            ));
        }

        if self.min_events > self.window {
            return Err(MatchError::InvalidConfig(
                "feedback.min_events must not exceed feedback.window".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.acceptance_threshold) {
            return Err(MatchError::InvalidConfig(
                "feedback.acceptance_threshold must be in [0, 1]".to_string(),
            ));
        }

        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(MatchError::InvalidConfig(
                "feedback.step must be > 0".to_string(),
            ));
        }

        if self.min_weight < 0.0 || self.min_weight >= self.max_weight {
            return Err(MatchError::InvalidConfig(
                "feedback.min_weight must be >= 0 and < feedback.max_weight".to_string(),
            ));
        }

        Ok(())
    }
}

/// Storage configuration for matching data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
    /// Item reports table name.
    pub item_table: String,
    /// Match records table name.
    pub match_table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("refind.sqlite"),
            item_table: "item_reports".to_string(),
            match_table: "item_matches".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(MatchingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_active_weights() {
        let mut config = MatchingConfig::default();
        config.scoring.weights = ScoreWeights {
            category: 0.0,
            distance: 0.0,
            time: 0.0,
            attributes: 0.0,
            text: 0.5,
            image: 0.5,
        };
        config.signals.text_enabled = false;
        config.signals.image_enabled = false;
        // All baseline weights are zero and the optional ones are inactive.
        assert!(config.validate().is_err());

        config.signals.text_enabled = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_negative_weight() {
        let mut config = MatchingConfig::default();
        config.scoring.weights.distance = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_precision() {
        let mut config = MatchingConfig::default();
        config.search.cell_precision = 0;
        assert!(config.validate().is_err());
        config.search.cell_precision = 13;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_plateau_floor() {
        let mut config = MatchingConfig::default();
        config.signals.plateau.floor = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_active_sum_tracks_flags() {
        let weights = ScoreWeights::default();
        let baseline = weights.category + weights.distance + weights.time + weights.attributes;
        assert!((weights.active_sum(false, false) - baseline).abs() < 1e-12);
        assert!((weights.active_sum(true, true) - (baseline + weights.text + weights.image)).abs() < 1e-12);
    }
}
