//! Per-signal scoring — six pure functions scoring one segment against a
//! parsed query, a combination function, ported exactly from
//! `hermes_modules/scoring.py::_score_candidates` and
//! `_similarite_emotion`.

use chrono::{DateTime, Utc};

use crate::model::Segment;
use crate::retriever::parse::ParsedQuery;
use crate::store::normalize_search;
use crate::taxonomy::prox;

/// Weight for each named signal, keyed the way `QueryProfile::weights` and
/// `scoring.py`'s `POIDS_*` constants are: `tags_roget`, `emotion`,
/// `timestamp`, `personnes`, `resume_texte`.
#[derive(Debug, Clone, Copy)]
pub struct ScoreBreakdown {
    pub roget: f64,
    pub emotion: f64,
    pub temporal: f64,
    pub personnes: f64,
    pub resume: f64,
    pub trildasa: f64,
}

/// Max over every (query tag, segment tag) pair's [`prox`]. Neutral 0.5 when
/// the segment carries tags but the query names none; 0.3 when the segment
/// has no tags at all.
pub fn score_roget(query: &ParsedQuery, segment: &Segment) -> f64 {
    if !query.tags.is_empty() && !segment.tags_roget.is_empty() {
        query
            .tags
            .iter()
            .flat_map(|qt| segment.tags_roget.iter().map(move |st| prox(qt, st)))
            .fold(f64::MIN, f64::max)
    } else if !segment.tags_roget.is_empty() {
        0.5
    } else {
        0.3
    }
}

/// Cosine similarity between two 2D emotion vectors, transformed into
/// `[0,1]`. A zero-norm vector returns the neutral 0.5, not an error —
/// `_similarite_emotion` treats "no emotion signal" as indifference rather
/// than a divide-by-zero fault.
pub fn emotion_similarity(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (v1, a1) = a;
    let (v2, a2) = b;
    let dot = v1 * v2 + a1 * a2;
    let norm1 = (v1 * v1 + a1 * a1).sqrt();
    let norm2 = (v2 * v2 + a2 * a2).sqrt();
    if norm1 == 0.0 || norm2 == 0.0 {
        return 0.5;
    }
    let cosine = dot / (norm1 * norm2);
    (cosine + 1.0) / 2.0
}

/// Neutral 0.5 when the query carries no target emotion.
pub fn score_emotion(query: &ParsedQuery, segment: &Segment) -> f64 {
    match query.target_emotion {
        Some(target) => emotion_similarity(target, (segment.emotion_valence, segment.emotion_activation)),
        None => 0.5,
    }
}

/// Recency score: `max(0.1, 1.0 - days_ago/365)` — decays linearly over a
/// year, floored so very old segments still carry some weight.
pub fn score_temporal(now: DateTime<Utc>, segment: &Segment) -> f64 {
    let days_ago = (now - segment.timestamp).num_days() as f64;
    (1.0 - days_ago / 365.0).max(0.1)
}

/// Counts how many query person names appear (after accent/JSON
/// normalization) in the segment's `personnes` field; `min(1.0, 0.5 +
/// matches*0.25)`. Neutral 0.5 when the query names no one, or the segment
/// has no `personnes`.
pub fn score_personnes(query: &ParsedQuery, segment: &Segment) -> f64 {
    if query.personnes.is_empty() || segment.personnes.is_empty() {
        return 0.5;
    }
    let segment_joined = segment.personnes.join(" ");
    let segment_norm = normalize_search(&segment_joined);
    let matches = query
        .personnes
        .iter()
        .filter(|p| segment_norm.contains(&normalize_search(p)))
        .count();
    if matches == 0 {
        0.5
    } else {
        (0.5 + matches as f64 * 0.25).min(1.0)
    }
}

/// Substring count of query keywords inside the lowercased summary;
/// `min(1.0, 0.3 + matches*0.15)`. Neutral 0.5 when the query has no
/// keywords, or the segment has no summary.
pub fn score_resume(query: &ParsedQuery, segment: &Segment) -> f64 {
    if query.keywords.is_empty() || segment.resume_texte.is_empty() {
        return 0.5;
    }
    let resume_lower = segment.resume_texte.to_lowercase();
    let matches = query.keywords.iter().filter(|kw| resume_lower.contains(kw.as_str())).count();
    if matches == 0 {
        0.5
    } else {
        (0.3 + matches as f64 * 0.15).min(1.0)
    }
}

/// Vector-mask resonance normalized against a theoretical max of ~5.0 raw
/// score, per `_score_candidates`'s comment. Neutral 0.5 when the mask or
/// the segment's vector is empty.
pub fn score_trildasa(mask: &crate::model::SparseVector, segment: &Segment) -> f64 {
    if mask.is_empty() || segment.vector.is_empty() {
        return 0.5;
    }
    let raw = crate::retriever::mask::calculate_resonance(&segment.vector, mask);
    (raw / 5.0).min(1.0)
}

/// `base_score * (1 + 0.2*trildasa)` — the trildasa signal amplifies rather
/// than averages into the weighted base.
pub fn combine(weights: &ScoringWeights, scores: &ScoreBreakdown) -> f64 {
    let base = weights.roget * scores.roget
        + weights.emotion * scores.emotion
        + weights.temporal * scores.temporal
        + weights.personnes * scores.personnes
        + weights.resume * scores.resume;
    base * (1.0 + 0.2 * scores.trildasa)
}

/// Per-signal weights pulled out of `QueryProfile::weights`, falling back
/// to the same defaults `scoring.py::_score_candidates` uses when a key is
/// absent.
#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub roget: f64,
    pub emotion: f64,
    pub temporal: f64,
    pub personnes: f64,
    pub resume: f64,
}

/// Default weights used when a [`crate::query_profile::QueryProfile`] omits
/// a key outright. Sums to 1.0; `personnes` and `roget` carry the most
/// weight since named-entity and tag matches are the strongest recall
/// signals available.
impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            roget: 0.3,
            emotion: 0.2,
            temporal: 0.15,
            personnes: 0.25,
            resume: 0.1,
        }
    }
}

impl ScoringWeights {
    pub fn from_profile_weights(weights: &std::collections::HashMap<String, f64>) -> Self {
        let defaults = Self::default();
        Self {
            roget: weights.get("tags_roget").copied().unwrap_or(defaults.roget),
            emotion: weights.get("emotion").copied().unwrap_or(defaults.emotion),
            temporal: weights.get("timestamp").copied().unwrap_or(defaults.temporal),
            personnes: weights.get("personnes").copied().unwrap_or(defaults.personnes),
            resume: weights.get("resume_texte").copied().unwrap_or(defaults.resume),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Auteur, SparseVector, TruthStatus};

    fn segment(tags: Vec<&str>, resume: &str, personnes: Vec<&str>) -> Segment {
        Segment {
            id: 1,
            timestamp: Utc::now(),
            timestamp_epoch: 0,
            token_start: 0,
            token_end: 1,
            source_file: "f".into(),
            source_nature: "trace".into(),
            source_format: "txt".into(),
            source_origine: "test".into(),
            auteur: Auteur::Human,
            emotion_valence: 0.5,
            emotion_activation: 0.5,
            tags_roget: tags.into_iter().map(String::from).collect(),
            personnes: personnes.into_iter().map(String::from).collect(),
            projets: vec![],
            sujets: vec![],
            lieux: vec![],
            resume_texte: resume.into(),
            gr_id: None,
            confidence_score: 0.5,
            statut_verite: TruthStatus::Unknown,
            vector: SparseVector::new(),
            extractor_version: "v".into(),
            extractor_model: "m".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn score_roget_neutral_without_query_tags() {
        let query = ParsedQuery::default();
        let seg = segment(vec!["04-0110-0010"], "", vec![]);
        assert_eq!(score_roget(&query, &seg), 0.5);
    }

    #[test]
    fn score_roget_exact_match_is_one() {
        let query = ParsedQuery {
            tags: vec!["04-0110-0010".to_string()],
            ..Default::default()
        };
        let seg = segment(vec!["04-0110-0010"], "", vec![]);
        assert_eq!(score_roget(&query, &seg), 1.0);
    }

    #[test]
    fn emotion_similarity_zero_vector_is_neutral() {
        assert_eq!(emotion_similarity((0.0, 0.0), (0.5, 0.5)), 0.5);
    }

    #[test]
    fn score_personnes_matches_accented_name() {
        let query = ParsedQuery {
            personnes: vec!["gagne".to_string()],
            ..Default::default()
        };
        let seg = segment(vec![], "", vec!["Christian Gagné"]);
        assert!(score_personnes(&query, &seg) > 0.5);
    }

    #[test]
    fn score_resume_counts_keyword_matches() {
        let query = ParsedQuery {
            keywords: vec!["projet".to_string(), "rust".to_string()],
            ..Default::default()
        };
        let seg = segment(vec![], "le projet en rust avance bien", vec![]);
        assert!(score_resume(&query, &seg) > 0.5);
    }

    #[test]
    fn combine_amplifies_with_trildasa() {
        let weights = ScoringWeights::default();
        let low = ScoreBreakdown {
            roget: 0.5,
            emotion: 0.5,
            temporal: 0.5,
            personnes: 0.5,
            resume: 0.5,
            trildasa: 0.0,
        };
        let high = ScoreBreakdown { trildasa: 1.0, ..low };
        assert!(combine(&weights, &high) > combine(&weights, &low));
    }
}
