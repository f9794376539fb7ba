//! Category candidate filter.

use crate::matching::core::item::Item;

/// Keep candidates in the same category as the query (case-insensitive).
///
/// A query with no usable category passes everything through; category is
/// normally required upstream, so that branch is defensive. Subcategory never
/// gates here — a subcategory mismatch only lowers the category score.
#[must_use]
pub fn filter_category(query: &Item, candidates: Vec<Item>) -> Vec<Item> {
    let category = query.category.trim();
    if category.is_empty() {
        return candidates;
    }

    candidates
        .into_iter()
        .filter(|candidate| candidate.category.trim().eq_ignore_ascii_case(category))
        .collect()
}
