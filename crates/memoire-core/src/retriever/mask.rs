//! Query mask — translates `QueryProfile::weights` into a sparse TriLDaSA
//! position mask, and scores a segment's vector against it. Ported from
//! `hermes_modules/hermes_translator.py::HermesTranslator`.

use crate::model::SparseVector;
use crate::query_profile::QueryProfile;

/// `emotion` weight fans out across positions 1..=7 (the direct-scalar
/// block); `tags_roget` weight fans out across 61..=66 (the taxonomy-class
/// block), matching `HermesTranslator.MAPPING`.
const EMOTION_POSITIONS: std::ops::RangeInclusive<u32> = 1..=7;
const TAGS_ROGET_POSITIONS: std::ops::RangeInclusive<u32> = crate::taxonomy::FIRST_CLASS_POSITION..=crate::taxonomy::LAST_CLASS_POSITION;

/// Build a sparse mask from a profile's weights. A weight of zero or
/// negative for a mapped key contributes no positions, matching the
/// original's `weight > 0` guard.
pub fn generate_mask(profile: &QueryProfile) -> SparseVector {
    let mut mask = SparseVector::new();
    if let Some(&w) = profile.weights.get("emotion") {
        if w > 0.0 {
            for pos in EMOTION_POSITIONS {
                mask.insert(pos, w);
            }
        }
    }
    if let Some(&w) = profile.weights.get("tags_roget") {
        if w > 0.0 {
            for pos in TAGS_ROGET_POSITIONS {
                mask.insert(pos, w);
            }
        }
    }
    mask
}

/// Dot product of a segment's vector and a query mask over shared
/// positions, rounded to 4 decimal places to match
/// `calculate_resonance`'s `round(score, 4)`.
pub fn calculate_resonance(segment_vector: &SparseVector, mask: &SparseVector) -> f64 {
    let score: f64 = segment_vector
        .iter()
        .filter_map(|(pos, value)| mask.get(pos).map(|weight| value * weight))
        .sum();
    (score * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn generate_mask_skips_zero_weight() {
        let mut weights = HashMap::new();
        weights.insert("emotion".to_string(), 0.0);
        weights.insert("tags_roget".to_string(), 0.4);
        let profile = QueryProfile {
            weights,
            ..Default::default()
        };
        let mask = generate_mask(&profile);
        assert!(!mask.contains_key(&1));
        assert_eq!(mask.get(&61), Some(&0.4));
    }

    #[test]
    fn calculate_resonance_sums_shared_positions_only() {
        let mut segment_vector = SparseVector::new();
        segment_vector.insert(1, 0.7);
        segment_vector.insert(2, 0.3);
        let mut mask = SparseVector::new();
        mask.insert(1, 0.5);
        mask.insert(99, 1.0);
        assert_eq!(calculate_resonance(&segment_vector, &mask), 0.35);
    }
}
