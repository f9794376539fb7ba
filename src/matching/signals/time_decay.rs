//! Time-decay curves for the temporal score component.

use std::f64::consts::LN_2;

use crate::matching::core::config::PlateauConfig;

/// Plain exponential decay over the search window.
///
/// `decay_factor` is a third of the window in hours, so a delta equal to the
/// full window has decayed to roughly `e^-3 ≈ 0.05`.
#[must_use]
pub fn exponential_score(hours_diff: f64, window_days: i64) -> f64 {
    let window_hours = (window_days.max(1) * 24) as f64;
    let decay_factor = window_hours / 3.0;
    (-hours_diff.abs() / decay_factor).exp()
}

/// Peak-plateau decay: full score within the peak window, half-life decay
/// beyond it, floored so recency never fully eliminates a candidate.
#[must_use]
pub fn plateau_score(hours_diff: f64, config: &PlateauConfig) -> f64 {
    let delta = hours_diff.abs();
    if delta <= config.peak_hours {
        return 1.0;
    }

    let decayed = (-LN_2 * (delta - config.peak_hours) / config.half_life_hours).exp();
    decayed.max(config.floor)
}
