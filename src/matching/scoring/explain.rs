//! Human-readable explanations for score breakdowns.
//!
//! Phrases come from threshold checks on each component; the neutral band
//! (signal unavailable) contributes nothing rather than a misleading claim.

use crate::matching::core::candidate::{Confidence, ScoreBreakdown};

/// Assemble an explanation string for a breakdown and its fused score.
#[must_use]
pub fn build_explanation(breakdown: &ScoreBreakdown, final_score: f64) -> String {
    let mut phrases: Vec<&'static str> = Vec::new();

    if breakdown.category >= 0.95 {
        phrases.push("Strong category match");
    } else if breakdown.category >= 0.75 {
        phrases.push("Category match");
    } else if breakdown.category >= 0.55 {
        phrases.push("Same category, different subcategory");
    } else if breakdown.category < 0.25 {
        phrases.push("Different category");
    }

    if breakdown.distance >= 0.9 {
        phrases.push("Very close location");
    } else if breakdown.distance >= 0.7 {
        phrases.push("Nearby location");
    } else if breakdown.distance < 0.25 {
        phrases.push("Distant locations");
    }

    if breakdown.time >= 0.9 {
        phrases.push("Similar timeframe");
    } else if breakdown.time >= 0.7 {
        phrases.push("Close timeframe");
    } else if breakdown.time < 0.25 {
        phrases.push("Reported far apart in time");
    }

    if breakdown.attributes >= 0.99 {
        phrases.push("Matching attributes");
    } else if breakdown.attributes >= 0.6 {
        phrases.push("Mostly matching attributes");
    }

    if let Some(text) = breakdown.text {
        if text >= 0.8 {
            phrases.push("Very similar description");
        } else if text >= 0.6 {
            phrases.push("Similar description");
        }
    }

    if let Some(image) = breakdown.image {
        if image >= 0.9 {
            phrases.push("Visually similar photos");
        } else if image >= 0.75 {
            phrases.push("Possibly similar photos");
        }
    }

    let confidence = Confidence::from_score(final_score);
    if phrases.is_empty() {
        format!("{confidence} confidence match")
    } else {
        format!("{confidence} confidence: {}", phrases.join("; "))
    }
}
