//! Fuzzy lexical similarity over report text.
//!
//! Lost-and-found reports are written by two different people describing the
//! same object, so the matcher leans on normalization before any string math:
//! casefolding, punctuation stripping, a fixed abbreviation/synonym table,
//! stopword removal, and a light suffix stemmer. The final score blends
//! whole-string, token-sorted, partial (substring window), and keyword-overlap
//! similarity, with a small bonus when both texts name colors from the same
//! color family.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use strsim::{jaro_winkler, normalized_levenshtein};

/// Blend weight of whole-string similarity.
const WHOLE_WEIGHT: f64 = 0.25;
/// Blend weight of token-sorted similarity.
const TOKEN_SORT_WEIGHT: f64 = 0.25;
/// Blend weight of partial (best-window) similarity.
const PARTIAL_WEIGHT: f64 = 0.20;
/// Blend weight of keyword-set overlap.
const KEYWORD_WEIGHT: f64 = 0.30;
/// A keyword pair counts as matched only above this similarity.
const KEYWORD_MATCH_THRESHOLD: f64 = 0.8;
/// Bonus applied when both texts mention the same color family.
const COLOR_FAMILY_BONUS: f64 = 0.05;

/// Shorthand and synonyms seen in real reports, expanded before comparison.
const EXPANSIONS: [(&str, &str); 12] = [
    ("ph", "phone"),
    ("cellphone", "phone"),
    ("mob", "mobile"),
    ("lap", "laptop"),
    ("nb", "notebook"),
    ("tab", "tablet"),
    ("specs", "glasses"),
    ("sunnies", "sunglasses"),
    ("purse", "wallet"),
    ("pkt", "pocket"),
    ("bldg", "building"),
    ("stn", "station"),
];

/// Function words and filler common in report prose.
const STOPWORDS: [&str; 34] = [
    "a", "an", "the", "and", "or", "of", "in", "on", "at", "by", "to", "with", "from", "near",
    "my", "our", "his", "her", "their", "its", "it", "was", "is", "were", "have", "has", "had",
    "lost", "found", "left", "missing", "item", "please", "help",
];

/// Color synonyms grouped under a base color.
const COLOR_FAMILIES: [(&str, &[&str]); 8] = [
    ("black", &["black", "charcoal", "jet", "ebony", "onyx"]),
    ("white", &["white", "ivory", "cream", "pearl"]),
    ("red", &["red", "maroon", "crimson", "scarlet", "burgundy"]),
    ("blue", &["blue", "navy", "azure", "teal", "cobalt", "indigo"]),
    ("green", &["green", "olive", "lime", "emerald", "mint"]),
    ("yellow", &["yellow", "gold", "golden", "amber", "mustard"]),
    ("brown", &["brown", "tan", "beige", "khaki", "chestnut"]),
    ("grey", &["grey", "gray", "silver", "slate", "gunmetal"]),
];

fn punctuation() -> &'static Regex {
    static PUNCTUATION: OnceLock<Regex> = OnceLock::new();
    PUNCTUATION.get_or_init(|| Regex::new(r"[^a-z0-9\s]+").unwrap_or_else(|_| unreachable!()))
}

/// Normalize raw report text into comparison tokens.
#[must_use]
pub fn normalize_tokens(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let stripped = punctuation().replace_all(&lowered, " ");

    stripped
        .split_whitespace()
        .map(expand)
        .filter(|token| token.len() > 1 && !STOPWORDS.contains(&token.as_str()))
        .map(|token| stem(&token))
        .collect()
}

fn expand(token: &str) -> String {
    EXPANSIONS
        .iter()
        .find(|(short, _)| *short == token)
        .map_or_else(|| token.to_string(), |(_, full)| (*full).to_string())
}

/// Light suffix stemmer; keeps stems of at least three characters.
fn stem(token: &str) -> String {
    for suffix in ["ing", "es", "ed", "ly", "s"] {
        if let Some(stripped) = token.strip_suffix(suffix) {
            if stripped.len() >= 3 {
                return stripped.to_string();
            }
        }
    }
    token.to_string()
}

/// Fuzzy similarity between two free-text descriptions, in [0, 1].
#[must_use]
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let tokens_a = normalize_tokens(a);
    let tokens_b = normalize_tokens(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let joined_a = tokens_a.join(" ");
    let joined_b = tokens_b.join(" ");

    let whole = normalized_levenshtein(&joined_a, &joined_b);
    let token_sort = token_sort_similarity(&tokens_a, &tokens_b);
    let partial = partial_similarity(&tokens_a, &tokens_b);
    let keywords = keyword_overlap(&tokens_a, &tokens_b);

    let mut score = WHOLE_WEIGHT.mul_add(
        whole,
        TOKEN_SORT_WEIGHT.mul_add(token_sort, PARTIAL_WEIGHT.mul_add(partial, KEYWORD_WEIGHT * keywords)),
    );

    if shares_color_family(&tokens_a, &tokens_b) {
        score += COLOR_FAMILY_BONUS;
    }

    score.clamp(0.0, 1.0)
}

/// Order-insensitive similarity: compare the sorted token strings.
fn token_sort_similarity(tokens_a: &[String], tokens_b: &[String]) -> f64 {
    let mut sorted_a = tokens_a.to_vec();
    let mut sorted_b = tokens_b.to_vec();
    sorted_a.sort();
    sorted_b.sort();
    normalized_levenshtein(&sorted_a.join(" "), &sorted_b.join(" "))
}

/// Best alignment of the shorter token run inside the longer one.
fn partial_similarity(tokens_a: &[String], tokens_b: &[String]) -> f64 {
    let (short, long) = if tokens_a.len() <= tokens_b.len() {
        (tokens_a, tokens_b)
    } else {
        (tokens_b, tokens_a)
    };

    let needle = short.join(" ");
    long.windows(short.len())
        .map(|window| normalized_levenshtein(&window.join(" "), &needle))
        .fold(0.0f64, f64::max)
}

/// Fraction of keywords with a close counterpart on the other side.
fn keyword_overlap(tokens_a: &[String], tokens_b: &[String]) -> f64 {
    let set_a: HashSet<&str> = tokens_a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = tokens_b.iter().map(String::as_str).collect();

    let matched = set_a
        .iter()
        .filter(|a| {
            set_b
                .iter()
                .any(|b| jaro_winkler(a, b) >= KEYWORD_MATCH_THRESHOLD)
        })
        .count();

    matched as f64 / set_a.len().max(set_b.len()) as f64
}

/// Base color families mentioned in a token list.
fn color_families(tokens: &[String]) -> HashSet<&'static str> {
    let mut families = HashSet::new();
    for token in tokens {
        for (base, members) in &COLOR_FAMILIES {
            if members.iter().any(|member| stem(member) == *token) {
                families.insert(*base);
            }
        }
    }
    families
}

fn shares_color_family(tokens_a: &[String], tokens_b: &[String]) -> bool {
    !color_families(tokens_a).is_disjoint(&color_families(tokens_b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_text_scores_one() {
        assert!((text_similarity("black leather wallet", "black leather wallet") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_text_scores_zero() {
        assert_eq!(text_similarity("", "black wallet"), 0.0);
        assert_eq!(text_similarity("the a an", "black wallet"), 0.0);
    }

    #[test]
    fn test_token_order_is_forgiven() {
        let score = text_similarity("red leather wallet", "wallet, leather, red");
        assert!(score > 0.7, "got {score}");
    }

    #[test]
    fn test_abbreviation_expansion() {
        let expanded = text_similarity("lost my ph", "lost my phone");
        let unexpanded = normalized_levenshtein("ph", "phone");
        assert!(expanded > unexpanded, "got {expanded} vs {unexpanded}");
        assert!(expanded > 0.9);
    }

    #[test]
    fn test_unrelated_text_scores_low() {
        let score = text_similarity("black umbrella", "gold ring with engraving");
        assert!(score < 0.35, "got {score}");
    }

    #[test]
    fn test_color_family_bonus() {
        let same_family = text_similarity("navy backpack", "blue backpack");
        let different = text_similarity("navy backpack", "maroon backpack");
        assert!(same_family > different, "got {same_family} vs {different}");
    }

    #[test]
    fn test_stemmer_keeps_short_tokens() {
        assert_eq!(stem("bags"), "bag");
        assert_eq!(stem("charging"), "charg");
        // Stripping would leave fewer than three characters.
        assert_eq!(stem("is"), "is");
        assert_eq!(stem("red"), "red");
    }

    #[test]
    fn test_partial_match_of_contained_phrase() {
        let score = text_similarity("samsung galaxy", "samsung galaxy s21 in a black case");
        assert!(score > 0.5, "got {score}");
    }
}
