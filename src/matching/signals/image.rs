//! Perceptual-hash image similarity.
//!
//! Hashes arrive as 16-character hex strings (64 bits) attached to each media
//! asset. Similarity is `1 - hamming/64` per hash pair; a malformed hash is a
//! degraded signal for that pair only — it is skipped with a warning, never
//! fatal to the ranking call.

use tracing::warn;

use crate::matching::core::errors::{MatchError, MatchResult};
use crate::matching::core::item::MediaHashes;

/// Bits per perceptual hash.
const HASH_BITS: u32 = 64;

/// Parse a 64-bit perceptual hash from hex.
///
/// # Errors
/// Returns `InvalidItem` for strings that are not exactly 16 hex characters.
pub fn parse_hash(hex: &str) -> MatchResult<u64> {
    if hex.len() != 16 {
        return Err(MatchError::InvalidItem(format!(
            "perceptual hash must be 16 hex chars, got {hex:?}"
        )));
    }
    u64::from_str_radix(hex, 16)
        .map_err(|err| MatchError::InvalidItem(format!("malformed perceptual hash {hex:?}: {err}")))
}

/// Similarity of two hashes: `1 - hamming/64`, in [0, 1].
///
/// # Errors
/// Returns an error if either hash fails to parse.
pub fn hash_similarity(a: &str, b: &str) -> MatchResult<f64> {
    let bits_a = parse_hash(a)?;
    let bits_b = parse_hash(b)?;
    let hamming = (bits_a ^ bits_b).count_ones();
    Ok(1.0 - f64::from(hamming) / f64::from(HASH_BITS))
}

fn similarity_or_skip(a: &str, b: &str) -> Option<f64> {
    match hash_similarity(a, b) {
        Ok(similarity) => Some(similarity),
        Err(err) => {
            warn!(error = %err, "skipping degraded image hash pair");
            None
        }
    }
}

/// Baseline image signal: best primary-hash similarity across all asset pairs.
///
/// `None` when no comparable pair exists (either side without usable hashes).
#[must_use]
pub fn best_primary_similarity(a: &[MediaHashes], b: &[MediaHashes]) -> Option<f64> {
    let mut best: Option<f64> = None;
    for asset_a in a {
        let Some(hash_a) = asset_a.primary() else {
            continue;
        };
        for asset_b in b {
            let Some(hash_b) = asset_b.primary() else {
                continue;
            };
            if let Some(similarity) = similarity_or_skip(hash_a, hash_b) {
                best = Some(best.map_or(similarity, |current| current.max(similarity)));
            }
        }
    }
    best
}

/// Multi-hash image signal.
///
/// For each asset pair, corresponding hash families are compared and averaged;
/// the result is the maximum over all asset pairs. Averaging across families
/// before taking the max keeps one lucky family from dominating a pair.
#[must_use]
pub fn best_multi_hash_similarity(a: &[MediaHashes], b: &[MediaHashes]) -> Option<f64> {
    let mut best: Option<f64> = None;
    for asset_a in a {
        let families_a = asset_a.families();
        if families_a.is_empty() {
            continue;
        }
        for asset_b in b {
            let mut sum = 0.0;
            let mut count = 0u32;
            for (family, hash_a) in &families_a {
                let Some((_, hash_b)) = asset_b
                    .families()
                    .into_iter()
                    .find(|(other, _)| other == family)
                else {
                    continue;
                };
                if let Some(similarity) = similarity_or_skip(hash_a, hash_b) {
                    sum += similarity;
                    count += 1;
                }
            }
            if count > 0 {
                let mean = sum / f64::from(count);
                best = Some(best.map_or(mean, |current| current.max(mean)));
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_similarity_is_one() {
        for hash in ["0000000000000000", "ffffffffffffffff", "8f373714acfcf4d0"] {
            assert!((hash_similarity(hash, hash).unwrap() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_eight_differing_bits() {
        let similarity = hash_similarity("0000000000000000", "00000000000000ff").unwrap();
        assert!((similarity - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_opposite_hashes_score_zero() {
        let similarity = hash_similarity("0000000000000000", "ffffffffffffffff").unwrap();
        assert!(similarity.abs() < 1e-12);
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(parse_hash("zzzzzzzzzzzzzzzz").is_err());
        assert!(parse_hash("abcd").is_err());
        assert!(hash_similarity("abcd", "0000000000000000").is_err());
    }

    #[test]
    fn test_best_primary_takes_max_over_pairs() {
        let a = vec![MediaHashes::phash_only("0000000000000000")];
        let b = vec![
            MediaHashes::phash_only("ffffffffffffffff"),
            MediaHashes::phash_only("00000000000000ff"),
        ];
        let best = best_primary_similarity(&a, &b).unwrap();
        assert!((best - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_no_usable_pair_is_none() {
        assert!(best_primary_similarity(&[], &[MediaHashes::phash_only("0000000000000000")]).is_none());
        let malformed = vec![MediaHashes::phash_only("not-a-hash")];
        let valid = vec![MediaHashes::phash_only("0000000000000000")];
        assert!(best_primary_similarity(&malformed, &valid).is_none());
    }

    #[test]
    fn test_multi_hash_averages_shared_families() {
        let a = vec![MediaHashes {
            ahash: Some("0000000000000000".to_string()),
            dhash: Some("0000000000000000".to_string()),
            phash: None,
            whash: None,
        }];
        let b = vec![MediaHashes {
            ahash: Some("0000000000000000".to_string()),
            dhash: Some("00000000000000ff".to_string()),
            // phash present on one side only: not a shared family.
            phash: Some("ffffffffffffffff".to_string()),
            whash: None,
        }];
        let best = best_multi_hash_similarity(&a, &b).unwrap();
        assert!((best - (1.0 + 0.875) / 2.0).abs() < 1e-12);
    }
}
