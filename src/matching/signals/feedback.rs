//! Feedback-driven weight adjustment.
//!
//! User accept/dismiss decisions on surfaced matches feed a sliding window.
//! When the observed acceptance rate drops below a threshold, the shared
//! weights shift toward the text signal, clamped per component so repeated
//! adjustments cannot run away. Ranking calls snapshot the weights once at
//! call start and never observe a mid-call mutation.

use std::collections::VecDeque;
use std::sync::{Mutex, RwLock};

use tracing::info;

use crate::matching::core::config::{FeedbackConfig, ScoreWeights};

/// Shared weight store with snapshot-on-read semantics.
///
/// Reads copy the whole weight set under a read lock; the feedback loop is the
/// single writer.
#[derive(Debug)]
pub struct SharedWeights {
    inner: RwLock<ScoreWeights>,
}

impl SharedWeights {
    /// Wrap an initial weight set.
    #[must_use]
    pub const fn new(weights: ScoreWeights) -> Self {
        Self {
            inner: RwLock::new(weights),
        }
    }

    /// A consistent copy of the current weights.
    #[must_use]
    pub fn snapshot(&self) -> ScoreWeights {
        match self.inner.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn store(&self, weights: ScoreWeights) {
        match self.inner.write() {
            Ok(mut guard) => *guard = weights,
            Err(poisoned) => *poisoned.into_inner() = weights,
        }
    }
}

impl Default for SharedWeights {
    fn default() -> Self {
        Self::new(ScoreWeights::default())
    }
}

/// Outcome of one recorded feedback event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FeedbackOutcome {
    /// Not enough events in the window yet, or acceptance is healthy.
    Unchanged,
    /// Weights were nudged toward the text signal.
    Adjusted(ScoreWeights),
}

/// Sliding-window feedback loop over match accept/dismiss events.
pub struct FeedbackLoop {
    config: FeedbackConfig,
    window: Mutex<VecDeque<bool>>,
}

impl FeedbackLoop {
    /// Create a loop with an empty window.
    #[must_use]
    pub fn new(config: FeedbackConfig) -> Self {
        Self {
            window: Mutex::new(VecDeque::with_capacity(config.window)),
            config,
        }
    }

    /// Record one accept/dismiss event and adjust the shared weights if the
    /// windowed acceptance rate has fallen below the threshold.
    pub fn record(&self, accepted: bool, weights: &SharedWeights) -> FeedbackOutcome {
        let rate = {
            let mut window = match self.window.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            window.push_back(accepted);
            while window.len() > self.config.window {
                window.pop_front();
            }
            if window.len() < self.config.min_events {
                return FeedbackOutcome::Unchanged;
            }
            let accepted_count = window.iter().filter(|&&event| event).count();
            let rate = accepted_count as f64 / window.len() as f64;
            if rate < self.config.acceptance_threshold {
                // Restart observation after acting on the window.
                window.clear();
            }
            rate
        };

        if rate >= self.config.acceptance_threshold {
            return FeedbackOutcome::Unchanged;
        }

        let adjusted = self.nudge(weights.snapshot());
        weights.store(adjusted);
        info!(
            acceptance_rate = rate,
            text_weight = adjusted.text,
            "acceptance below threshold, weights shifted toward text"
        );
        FeedbackOutcome::Adjusted(adjusted)
    }

    /// Shift weight toward text, clamped per component.
    fn nudge(&self, mut weights: ScoreWeights) -> ScoreWeights {
        let clamp = |value: f64| value.clamp(self.config.min_weight, self.config.max_weight);
        let give = self.config.step / 5.0;

        weights.text = clamp(weights.text + self.config.step);
        weights.category = clamp(weights.category - give);
        weights.distance = clamp(weights.distance - give);
        weights.time = clamp(weights.time - give);
        weights.attributes = clamp(weights.attributes - give);
        weights.image = clamp(weights.image - give);
        weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FeedbackConfig {
        FeedbackConfig {
            window: 10,
            min_events: 5,
            acceptance_threshold: 0.5,
            step: 0.05,
            min_weight: 0.05,
            max_weight: 0.60,
        }
    }

    #[test]
    fn test_no_adjustment_before_min_events() {
        let shared = SharedWeights::default();
        let feedback = FeedbackLoop::new(config());
        for _ in 0..4 {
            assert_eq!(feedback.record(false, &shared), FeedbackOutcome::Unchanged);
        }
        assert_eq!(shared.snapshot(), ScoreWeights::default());
    }

    #[test]
    fn test_low_acceptance_shifts_weight_toward_text() {
        let shared = SharedWeights::default();
        let feedback = FeedbackLoop::new(config());

        let mut outcome = FeedbackOutcome::Unchanged;
        for _ in 0..5 {
            outcome = feedback.record(false, &shared);
        }

        let before = ScoreWeights::default();
        let after = shared.snapshot();
        assert!(matches!(outcome, FeedbackOutcome::Adjusted(_)));
        assert!(after.text > before.text);
        assert!(after.category < before.category);
        assert!(after.distance < before.distance);
    }

    #[test]
    fn test_healthy_acceptance_leaves_weights_alone() {
        let shared = SharedWeights::default();
        let feedback = FeedbackLoop::new(config());
        for _ in 0..10 {
            feedback.record(true, &shared);
        }
        assert_eq!(shared.snapshot(), ScoreWeights::default());
    }

    #[test]
    fn test_adjustments_are_clamped() {
        let shared = SharedWeights::default();
        let feedback = FeedbackLoop::new(config());

        // Drive many adjustment rounds; nothing may leave the clamp band.
        for _ in 0..200 {
            feedback.record(false, &shared);
        }
        let weights = shared.snapshot();
        for value in [
            weights.category,
            weights.distance,
            weights.time,
            weights.attributes,
            weights.text,
            weights.image,
        ] {
            assert!((0.05..=0.60).contains(&value), "got {value}");
        }
        assert!((weights.text - 0.60).abs() < 1e-9);
    }
}
