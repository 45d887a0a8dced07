//! MinHash + LSH banding for near-duplicate detection (spec §4.2): 128
//! permutations over 3-token shingles, banded to recall pairs with Jaccard
//! similarity >= 0.7.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub const NUM_PERMUTATIONS: usize = 128;
const SHINGLE_SIZE: usize = 3;
/// 16 bands of 8 rows recalls Jaccard ~0.7 pairs with high probability
/// (threshold ≈ (1/bands)^(1/rows) = (1/16)^(1/8) ≈ 0.70).
const BANDS: usize = 16;
const ROWS_PER_BAND: usize = NUM_PERMUTATIONS / BANDS;

/// Deterministic per-permutation seeds — fixed so signatures are
/// reproducible across runs and across processes (clustering determinism,
/// spec §4.5, relies on the same property elsewhere).
fn permutation_seeds() -> [u64; NUM_PERMUTATIONS] {
    let mut seeds = [0u64; NUM_PERMUTATIONS];
    let mut state: u64 = 0x9E3779B97F4A7C15;
    for s in seeds.iter_mut() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        *s = state;
    }
    seeds
}

fn shingles(tokens: &[String]) -> Vec<u64> {
    if tokens.len() < SHINGLE_SIZE {
        if tokens.is_empty() {
            return vec![];
        }
        return vec![hash_str(&tokens.join(" "))];
    }
    tokens
        .windows(SHINGLE_SIZE)
        .map(|w| hash_str(&w.join(" ")))
        .collect()
}

fn hash_str(s: &str) -> u64 {
    let mut h = DefaultHasher::new();
    s.hash(&mut h);
    h.finish()
}

/// A 128-element MinHash signature over shingled tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinHashSignature(pub [u64; NUM_PERMUTATIONS]);

impl MinHashSignature {
    pub fn compute(tokens: &[String]) -> Self {
        let shingle_hashes = shingles(tokens);
        let seeds = permutation_seeds();
        let mut sig = [u64::MAX; NUM_PERMUTATIONS];

        if shingle_hashes.is_empty() {
            return MinHashSignature(sig);
        }

        for (i, seed) in seeds.iter().enumerate() {
            let min = shingle_hashes
                .iter()
                .map(|h| h ^ seed)
                .min()
                .unwrap_or(u64::MAX);
            sig[i] = min;
        }
        MinHashSignature(sig)
    }

    /// Estimated Jaccard similarity: fraction of permutations that agree.
    pub fn estimated_jaccard(&self, other: &MinHashSignature) -> f32 {
        let agree = self
            .0
            .iter()
            .zip(other.0.iter())
            .filter(|(a, b)| a == b)
            .count();
        agree as f32 / NUM_PERMUTATIONS as f32
    }

    /// LSH band keys: one per band, each a hash of that band's rows. Two
    /// signatures sharing any band key are LSH *candidates* (the caller still
    /// verifies with `estimated_jaccard` before accepting).
    pub fn band_keys(&self) -> [u64; BANDS] {
        let mut keys = [0u64; BANDS];
        for (b, key) in keys.iter_mut().enumerate() {
            let start = b * ROWS_PER_BAND;
            let mut h = DefaultHasher::new();
            self.0[start..start + ROWS_PER_BAND].hash(&mut h);
            *key = h.finish();
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::textutil::tokenize;

    #[test]
    fn identical_text_has_jaccard_one() {
        let tokens = tokenize("the quick brown fox jumps over the lazy dog");
        let a = MinHashSignature::compute(&tokens);
        let b = MinHashSignature::compute(&tokens);
        assert_eq!(a.estimated_jaccard(&b), 1.0);
    }

    #[test]
    fn similar_text_has_high_jaccard() {
        let a = MinHashSignature::compute(&tokenize(
            "electric vehicles are reshaping the auto industry in twenty twenty six",
        ));
        let b = MinHashSignature::compute(&tokenize(
            "electric vehicles are reshaping the automotive industry in twenty twenty six",
        ));
        assert!(a.estimated_jaccard(&b) > 0.6);
    }

    #[test]
    fn unrelated_text_has_low_jaccard() {
        let a = MinHashSignature::compute(&tokenize("electric vehicles and battery chemistry"));
        let b = MinHashSignature::compute(&tokenize("sourdough bread baking techniques at home"));
        assert!(a.estimated_jaccard(&b) < 0.3);
    }

    #[test]
    fn band_keys_overlap_for_near_duplicates() {
        let a = MinHashSignature::compute(&tokenize(
            "electric vehicles are reshaping the auto industry in twenty twenty six",
        ));
        let b = MinHashSignature::compute(&tokenize(
            "electric vehicles are reshaping the auto industry in twenty twenty six today",
        ));
        let ka = a.band_keys();
        let kb = b.band_keys();
        assert!(ka.iter().any(|k| kb.contains(k)));
    }
}
