//! Per-candidate score calculation and weighted fusion.
//!
//! Every component is normalized to [0, 1] with an explicit neutral value of
//! 0.5 whenever a signal is unavailable on either side of the pair — never
//! zero, so incomplete reports are not punished for what they left out.
//! Degraded optional signals (mismatched embedding lengths, malformed hashes)
//! also fall back to neutral with a warning; they never fail the ranking call.

use tracing::warn;

use crate::matching::core::candidate::{Confidence, MatchCandidate, ScoreBreakdown};
use crate::matching::core::config::{
    CategoryScoreTable, ImageSignalMode, MatchingConfig, ScoreWeights, SignalConfig,
    TextSignalMode, TimeDecayMode,
};
use crate::matching::core::item::Item;
use crate::matching::geo::distance::haversine_km;
use crate::matching::scoring::explain::build_explanation;
use crate::matching::signals::fuzzy;
use crate::matching::signals::image;
use crate::matching::signals::time_decay;

/// Score used whenever a signal is unavailable for either side of a pair.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Computes component scores for one (query, candidate) pair and fuses them.
///
/// Weights are captured at construction (a snapshot when a shared weight store
/// is in play), so a calculator scores every candidate of one ranking call
/// under the same weight set.
#[derive(Clone, Debug)]
pub struct ScoreCalculator {
    weights: ScoreWeights,
    category: CategoryScoreTable,
    signals: SignalConfig,
    max_radius_km: f64,
    window_days: i64,
}

impl ScoreCalculator {
    /// Build a calculator from configuration and a weight snapshot.
    #[must_use]
    pub fn new(config: &MatchingConfig, weights: ScoreWeights) -> Self {
        Self {
            weights,
            category: config.scoring.category,
            signals: config.signals.clone(),
            max_radius_km: config.search.max_radius_km,
            window_days: config.search.window_days,
        }
    }

    /// Score a candidate against the query item.
    #[must_use]
    pub fn score(&self, query: &Item, candidate: &Item) -> MatchCandidate {
        let (distance, distance_km) = self.distance_score(query, candidate);
        let (time, time_diff_hours) = self.time_score(query, candidate);

        let breakdown = ScoreBreakdown {
            category: self.category_score(query, candidate),
            distance,
            time,
            attributes: attribute_score(query, candidate),
            text: self.text_score(query, candidate),
            image: self.image_score(query, candidate),
        };

        let final_score = self.fuse(&breakdown);
        let explanation = build_explanation(&breakdown, final_score);

        MatchCandidate {
            query_id: query.id,
            item: candidate.clone(),
            breakdown,
            final_score,
            distance_km,
            time_diff_hours,
            explanation,
            confidence: Confidence::from_score(final_score),
        }
    }

    /// Weighted fusion normalized by the active weight sum.
    ///
    /// Disabled signals are absent from the breakdown and contribute to
    /// neither side of the division, which is what keeps baseline-only
    /// configurations correctly normalized.
    #[must_use]
    pub fn fuse(&self, breakdown: &ScoreBreakdown) -> f64 {
        let weights = &self.weights;
        let mut numerator = breakdown.category * weights.category
            + breakdown.distance * weights.distance
            + breakdown.time * weights.time
            + breakdown.attributes * weights.attributes;

        if let Some(text) = breakdown.text {
            numerator += text * weights.text;
        }
        if let Some(image) = breakdown.image {
            numerator += image * weights.image;
        }

        let denominator =
            weights.active_sum(breakdown.text.is_some(), breakdown.image.is_some());
        if denominator <= 0.0 {
            return 0.0;
        }
        (numerator / denominator).clamp(0.0, 1.0)
    }

    fn category_score(&self, query: &Item, candidate: &Item) -> f64 {
        let query_category = query.category.trim();
        let candidate_category = candidate.category.trim();
        if query_category.is_empty() || candidate_category.is_empty() {
            return NEUTRAL_SCORE;
        }
        if !query_category.eq_ignore_ascii_case(candidate_category) {
            return 0.0;
        }

        match (query.subcategory.as_deref(), candidate.subcategory.as_deref()) {
            (Some(a), Some(b)) if a.trim().eq_ignore_ascii_case(b.trim()) => {
                self.category.full_match
            }
            (Some(_), Some(_)) => self.category.subcategory_mismatch,
            _ => self.category.category_only,
        }
    }

    fn distance_score(&self, query: &Item, candidate: &Item) -> (f64, Option<f64>) {
        let (Some(a), Some(b)) = (query.location, candidate.location) else {
            return (NEUTRAL_SCORE, None);
        };

        let distance_km = haversine_km(a, b);
        let decay_factor = self.max_radius_km / 3.0;
        ((-distance_km / decay_factor).exp(), Some(distance_km))
    }

    fn time_score(&self, query: &Item, candidate: &Item) -> (f64, Option<f64>) {
        let (Some(a), Some(b)) = (query.occurred_at, candidate.occurred_at) else {
            return (NEUTRAL_SCORE, None);
        };

        let hours_diff = (a - b).num_minutes().abs() as f64 / 60.0;
        let score = match self.signals.time_mode {
            TimeDecayMode::Exponential => {
                time_decay::exponential_score(hours_diff, self.window_days)
            }
            TimeDecayMode::Plateau => time_decay::plateau_score(hours_diff, &self.signals.plateau),
        };
        (score, Some(hours_diff))
    }

    fn text_score(&self, query: &Item, candidate: &Item) -> Option<f64> {
        if !self.signals.text_enabled {
            return None;
        }

        let score = match self.signals.text_mode {
            TextSignalMode::Embedding => embedding_similarity(query, candidate),
            TextSignalMode::Fuzzy => lexical_similarity(query, candidate),
            TextSignalMode::Auto => {
                if query.embedding.is_some() && candidate.embedding.is_some() {
                    embedding_similarity(query, candidate)
                } else {
                    lexical_similarity(query, candidate)
                }
            }
        };
        Some(score)
    }

    fn image_score(&self, query: &Item, candidate: &Item) -> Option<f64> {
        if !self.signals.image_enabled {
            return None;
        }

        let best = match self.signals.image_mode {
            ImageSignalMode::Primary => image::best_primary_similarity(&query.media, &candidate.media),
            ImageSignalMode::MultiHash => {
                image::best_multi_hash_similarity(&query.media, &candidate.media)
            }
        };
        Some(best.unwrap_or(NEUTRAL_SCORE))
    }
}

/// Fraction of {brand, model, color} that match, counted only over attributes
/// where at least one side specifies a value.
fn attribute_score(query: &Item, candidate: &Item) -> f64 {
    let pairs = [
        (query.brand.as_deref(), candidate.brand.as_deref()),
        (query.model.as_deref(), candidate.model.as_deref()),
        (query.color.as_deref(), candidate.color.as_deref()),
    ];

    let mut counted = 0u32;
    let mut matched = 0u32;
    for (a, b) in pairs {
        let a = a.map(str::trim).filter(|value| !value.is_empty());
        let b = b.map(str::trim).filter(|value| !value.is_empty());
        match (a, b) {
            (None, None) => {}
            (Some(a), Some(b)) => {
                counted += 1;
                if a.eq_ignore_ascii_case(b) {
                    matched += 1;
                }
            }
            _ => counted += 1,
        }
    }

    if counted == 0 {
        NEUTRAL_SCORE
    } else {
        f64::from(matched) / f64::from(counted)
    }
}

/// Embedding cosine similarity rescaled from [-1, 1] to [0, 1].
fn embedding_similarity(query: &Item, candidate: &Item) -> f64 {
    let (Some(a), Some(b)) = (query.embedding.as_deref(), candidate.embedding.as_deref()) else {
        return NEUTRAL_SCORE;
    };

    if a.is_empty() || a.len() != b.len() {
        warn!(
            query_len = a.len(),
            candidate_len = b.len(),
            "embedding length mismatch, treating text signal as neutral"
        );
        return NEUTRAL_SCORE;
    }

    let mut dot = 0.0f64;
    let mut mag_a = 0.0f64;
    let mut mag_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        dot += f64::from(x) * f64::from(y);
        mag_a += f64::from(x) * f64::from(x);
        mag_b += f64::from(y) * f64::from(y);
    }

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    let cosine = (dot / (mag_a.sqrt() * mag_b.sqrt())).clamp(-1.0, 1.0);
    (cosine + 1.0) / 2.0
}

/// Fuzzy lexical similarity over title + description.
fn lexical_similarity(query: &Item, candidate: &Item) -> f64 {
    match (query.text_blob(), candidate.text_blob()) {
        (Some(a), Some(b)) => fuzzy::text_similarity(&a, &b),
        _ => NEUTRAL_SCORE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::core::ids::OwnerId;
    use crate::matching::core::item::{GeoPoint, ItemStatus, MediaHashes};
    use chrono::{Duration, Utc};

    fn baseline_config() -> MatchingConfig {
        let mut config = MatchingConfig::default();
        config.signals.text_enabled = false;
        config.signals.image_enabled = false;
        config
    }

    fn calculator(config: &MatchingConfig) -> ScoreCalculator {
        ScoreCalculator::new(config, config.scoring.weights)
    }

    fn electronics(status: ItemStatus) -> Item {
        Item::new(status, "Electronics", OwnerId::new())
    }

    #[test]
    fn test_worked_example_phone_pair() {
        let base = Utc::now();
        let query = electronics(ItemStatus::Lost)
            .with_subcategory("Phone")
            .with_location(GeoPoint::new(6.9271, 79.8612).unwrap())
            .with_occurred_at(base);
        // ~0.5 km north, found two hours later.
        let candidate = electronics(ItemStatus::Found)
            .with_subcategory("Phone")
            .with_location(GeoPoint::new(6.9316, 79.8612).unwrap())
            .with_occurred_at(base + Duration::hours(2));

        let config = baseline_config();
        let scored = calculator(&config).score(&query, &candidate);

        assert!((scored.breakdown.category - 1.0).abs() < 1e-12);
        assert!((scored.breakdown.distance - 0.97).abs() < 0.02, "got {}", scored.breakdown.distance);
        assert!((scored.breakdown.time - 0.98).abs() < 0.01, "got {}", scored.breakdown.time);
        assert!((scored.breakdown.attributes - 0.5).abs() < 1e-12);
        assert!(scored.final_score > 0.85, "got {}", scored.final_score);
        assert!(scored.explanation.contains("Strong category match"));
        assert!(scored.explanation.contains("Very close location"));
        assert!(scored.distance_km.unwrap() < 0.6);
        assert!((scored.time_diff_hours.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_identical_place_and_time_score_max() {
        let base = Utc::now();
        let at = GeoPoint::new(6.9271, 79.8612).unwrap();
        let query = electronics(ItemStatus::Lost)
            .with_location(at)
            .with_occurred_at(base);
        let candidate = electronics(ItemStatus::Found)
            .with_location(at)
            .with_occurred_at(base);

        let config = baseline_config();
        let scored = calculator(&config).score(&query, &candidate);
        assert!((scored.breakdown.distance - 1.0).abs() < 1e-12);
        assert!((scored.breakdown.time - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_category_mismatch_dominates_uninformative_pair() {
        let query = Item::new(ItemStatus::Lost, "Electronics", OwnerId::new());
        let candidate = Item::new(ItemStatus::Found, "Bags", OwnerId::new());

        let config = baseline_config();
        let scored = calculator(&config).score(&query, &candidate);

        assert_eq!(scored.breakdown.category, 0.0);
        assert!((scored.breakdown.distance - NEUTRAL_SCORE).abs() < 1e-12);
        assert!((scored.breakdown.time - NEUTRAL_SCORE).abs() < 1e-12);
        assert!(scored.final_score < 0.4, "got {}", scored.final_score);
    }

    #[test]
    fn test_subcategory_table() {
        let config = baseline_config();
        let calc = calculator(&config);

        let query = electronics(ItemStatus::Lost).with_subcategory("Phone");
        let same = electronics(ItemStatus::Found).with_subcategory("phone");
        let different = electronics(ItemStatus::Found).with_subcategory("Tablet");
        let missing = electronics(ItemStatus::Found);

        assert!((calc.score(&query, &same).breakdown.category - 1.0).abs() < 1e-12);
        assert!((calc.score(&query, &different).breakdown.category - 0.6).abs() < 1e-12);
        assert!((calc.score(&query, &missing).breakdown.category - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_attribute_fraction() {
        let query = electronics(ItemStatus::Lost)
            .with_brand("Samsung")
            .with_color("Black");
        // Brand matches case-insensitively, color differs, model is one-sided.
        let candidate = electronics(ItemStatus::Found)
            .with_brand("samsung")
            .with_color("Blue")
            .with_model("S21");

        assert!((attribute_score(&query, &candidate) - 1.0 / 3.0).abs() < 1e-12);

        let bare_query = electronics(ItemStatus::Lost);
        let bare_candidate = electronics(ItemStatus::Found);
        assert!((attribute_score(&bare_query, &bare_candidate) - NEUTRAL_SCORE).abs() < 1e-12);
    }

    #[test]
    fn test_final_score_bounds_across_flag_combinations() {
        let base = Utc::now();
        let query = electronics(ItemStatus::Lost)
            .with_subcategory("Phone")
            .with_location(GeoPoint::new(6.9271, 79.8612).unwrap())
            .with_occurred_at(base)
            .with_embedding(vec![1.0, 0.0, 0.0])
            .with_media(MediaHashes::phash_only("8f373714acfcf4d0"));
        let candidate = electronics(ItemStatus::Found)
            .with_subcategory("Phone")
            .with_location(GeoPoint::new(6.9316, 79.8612).unwrap())
            .with_occurred_at(base + Duration::hours(2))
            .with_embedding(vec![0.9, 0.1, 0.0])
            .with_media(MediaHashes::phash_only("8f373714acfcf4d1"));

        for (text, image) in [(false, false), (true, false), (false, true), (true, true)] {
            let mut config = MatchingConfig::default();
            config.signals.text_enabled = text;
            config.signals.image_enabled = image;
            let scored = calculator(&config).score(&query, &candidate);
            assert!((0.0..=1.0).contains(&scored.final_score));
            assert_eq!(scored.breakdown.text.is_some(), text);
            assert_eq!(scored.breakdown.image.is_some(), image);
        }
    }

    #[test]
    fn test_baseline_order_survives_signal_toggle() {
        let base = Utc::now();
        let origin = GeoPoint::new(6.9271, 79.8612).unwrap();
        let query = electronics(ItemStatus::Lost)
            .with_location(origin)
            .with_occurred_at(base);

        let near = electronics(ItemStatus::Found)
            .with_location(GeoPoint::new(6.9316, 79.8612).unwrap())
            .with_occurred_at(base + Duration::hours(1));
        let far = electronics(ItemStatus::Found)
            .with_location(GeoPoint::new(7.1000, 79.8612).unwrap())
            .with_occurred_at(base + Duration::days(5));

        let baseline = baseline_config();
        let baseline_calc = calculator(&baseline);
        let near_baseline = baseline_calc.score(&query, &near).final_score;
        let far_baseline = baseline_calc.score(&query, &far).final_score;
        assert!(near_baseline > far_baseline);

        // Neither candidate has text or media, so enabling the optional
        // signals adds neutral contributions on both sides and the relative
        // order must not change.
        let enriched = MatchingConfig::default();
        let enriched_calc = calculator(&enriched);
        let near_enriched = enriched_calc.score(&query, &near).final_score;
        let far_enriched = enriched_calc.score(&query, &far).final_score;
        assert!(near_enriched > far_enriched);
    }

    #[test]
    fn test_zero_magnitude_embedding_scores_zero() {
        let query = electronics(ItemStatus::Lost).with_embedding(vec![0.0, 0.0]);
        let candidate = electronics(ItemStatus::Found).with_embedding(vec![1.0, 0.0]);
        assert_eq!(embedding_similarity(&query, &candidate), 0.0);
    }

    #[test]
    fn test_mismatched_embedding_lengths_degrade_to_neutral() {
        let query = electronics(ItemStatus::Lost).with_embedding(vec![1.0, 0.0]);
        let candidate = electronics(ItemStatus::Found).with_embedding(vec![1.0, 0.0, 0.0]);
        assert!((embedding_similarity(&query, &candidate) - NEUTRAL_SCORE).abs() < 1e-12);
    }

    #[test]
    fn test_identical_embeddings_score_one() {
        let query = electronics(ItemStatus::Lost).with_embedding(vec![0.6, 0.8]);
        let candidate = electronics(ItemStatus::Found).with_embedding(vec![0.6, 0.8]);
        assert!((embedding_similarity(&query, &candidate) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_auto_mode_falls_back_to_fuzzy() {
        let mut config = MatchingConfig::default();
        config.signals.text_mode = TextSignalMode::Auto;
        let calc = calculator(&config);

        // No embeddings anywhere: auto mode uses the lexical path.
        let query = electronics(ItemStatus::Lost).with_description("black samsung phone");
        let candidate = electronics(ItemStatus::Found).with_description("black samsung phone");
        let scored = calc.score(&query, &candidate);
        assert!((scored.breakdown.text.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_optional_data_is_neutral_not_zero() {
        let config = MatchingConfig::default();
        let scored = calculator(&config).score(
            &electronics(ItemStatus::Lost),
            &electronics(ItemStatus::Found),
        );
        assert!((scored.breakdown.text.unwrap() - NEUTRAL_SCORE).abs() < 1e-12);
        assert!((scored.breakdown.image.unwrap() - NEUTRAL_SCORE).abs() < 1e-12);
    }
}
