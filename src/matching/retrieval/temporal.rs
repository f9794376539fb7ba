//! Temporal candidate filter.
//!
//! Temporal filtering is a refinement, not a hard requirement: a query without
//! any event time passes everything through, and candidates without timestamps
//! are treated as temporally ambiguous rather than excluded.

use crate::matching::core::item::{Item, TimeWindow};

/// Keep candidates whose time window overlaps the query's.
///
/// The query window is its explicit window, else `occurred_at ± slack_days`.
/// A candidate's window is its explicit window, else the degenerate instant of
/// its event timestamp.
#[must_use]
pub fn filter_temporal(query: &Item, candidates: Vec<Item>, slack_days: i64) -> Vec<Item> {
    let Some(query_window) = query.effective_window(slack_days) else {
        return candidates;
    };

    candidates
        .into_iter()
        .filter(|candidate| candidate_overlaps(candidate, &query_window))
        .collect()
}

fn candidate_overlaps(candidate: &Item, query_window: &TimeWindow) -> bool {
    let window = candidate
        .window
        .or_else(|| candidate.occurred_at.map(TimeWindow::instant));
    match window {
        Some(window) => window.overlaps(query_window),
        None => true,
    }
}
