//! Vector Engine — deterministic `{position -> weight}` sparse vector for a
//! segment. Pure function of `(segment fields, loaded taxonomy)`.

use crate::model::{Segment, SparseVector};
use crate::taxonomy::Taxonomy;

/// Positions 1-7: emotion/physio/cognitive scalars, direct-copied when
/// present and non-zero. Only valence (1) and activation (2) are modeled on
/// [`Segment`] today; the remaining positions are reserved for future
/// scalar columns (physique_stress, cognition_certitude, ...) the way the
/// original reserves 8-20.
fn apply_direct_scalars(segment: &Segment, vector: &mut SparseVector) {
    if segment.emotion_valence != 0.0 {
        vector.insert(1, round3(segment.emotion_valence));
    }
    if segment.emotion_activation != 0.0 {
        vector.insert(2, round3(segment.emotion_activation));
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Positions 41-50: locus/social booleans, matched against `lieux` text.
fn locus_keywords() -> &'static [(u32, &'static [&'static str])] {
    &[
        (41, &["maison", "home", "appart", "domicile", "chez moi", "chambre", "cuisine", "salon"]),
        (42, &["bureau", "office", "travail", "boulot", "entreprise", "workspace"]),
        (43, &["voiture", "auto", "bus", "métro", "train", "avion", "transport", "car", "commute"]),
        (44, &["café", "restaurant", "magasin", "centre", "public", "ville", "shop", "mall"]),
        (45, &["parc", "forêt", "montagne", "plage", "nature", "jardin", "park", "forest", "beach"]),
        (46, &["hôpital", "clinique", "médecin", "dentiste", "pharmacie", "hospital", "clinic"]),
        (47, &["seul", "alone", "solo", "solitaire"]),
        (48, &["famille", "ami", "proche", "ensemble", "family", "friend", "together"]),
        (49, &["collègue", "client", "professionnel", "colleague", "professional"]),
        (50, &["foule", "public", "événement", "crowd", "event", "gathering"]),
    ]
}

fn apply_locus(segment: &Segment, vector: &mut SparseVector) {
    let lieux_raw = segment.lieux.join(" ").to_lowercase();
    for (pos, keywords) in locus_keywords() {
        if keywords.iter().any(|kw| lieux_raw.contains(kw)) {
            vector.insert(*pos, 1.0);
        }
    }
}

/// Positions 61-66: one per top-level taxonomy class, data-driven via the
/// loaded [`Taxonomy`], plus explicit-tag reinforcement.
fn apply_taxonomy_classes(segment: &Segment, taxonomy: &Taxonomy, bag: &str, vector: &mut SparseVector) {
    let word_count = bag.split_whitespace().count();
    let threshold: f64 = if word_count < 20 { 1.0 } else { 3.0 };

    for (pos, keywords) in taxonomy.class_keyword_sets() {
        if keywords.is_empty() {
            continue;
        }
        let score = keywords.iter().filter(|kw| bag.contains(kw.as_str())).count();
        if score > 0 {
            let value = (score as f64 / threshold).min(1.0);
            vector.insert(pos, (value * 100.0).round() / 100.0);
        }
    }

    // Explicit tag reinforcement: any "CC-SSSS-TTTT" code in tags_roget
    // forces vector[pos(CC)] <- max(current, 0.8).
    for tag in &segment.tags_roget {
        let Some(class_code) = tag.get(0..2) else { continue };
        if let Some(position) = taxonomy.class_position(class_code) {
            let current = vector.get(&position).copied().unwrap_or(0.0);
            vector.insert(position, current.max(0.8));
        }
    }
}

/// Positions 67-80: domain theme booleans.
fn apply_themes(taxonomy: &Taxonomy, bag: &str, vector: &mut SparseVector) {
    for (pos, keywords) in taxonomy.theme_keyword_sets() {
        if keywords.is_empty() {
            continue;
        }
        if keywords.iter().any(|kw| bag.contains(kw.as_str())) {
            vector.insert(pos, 1.0);
        }
    }
}

/// Produce a sparse vector for `segment`. Same input (segment fields, loaded
/// taxonomy) always produces the same output.
pub fn generate_vector(segment: &Segment, taxonomy: &Taxonomy) -> SparseVector {
    let mut vector = SparseVector::new();
    apply_direct_scalars(segment, &mut vector);
    apply_locus(segment, &mut vector);

    let bag = segment.bag_of_words().to_lowercase();
    apply_taxonomy_classes(segment, taxonomy, &bag, &mut vector);
    apply_themes(taxonomy, &bag, &mut vector);

    vector
}

/// Summary statistics over a sparse vector, for indexing-result diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorStats {
    pub active_positions: usize,
    pub min_weight: f64,
    pub max_weight: f64,
    pub mean_weight: f64,
}

pub fn get_stats(vector: &SparseVector) -> VectorStats {
    if vector.is_empty() {
        return VectorStats {
            active_positions: 0,
            min_weight: 0.0,
            max_weight: 0.0,
            mean_weight: 0.0,
        };
    }
    let values: Vec<f64> = vector.values().copied().collect();
    let sum: f64 = values.iter().sum();
    VectorStats {
        active_positions: values.len(),
        min_weight: values.iter().cloned().fold(f64::INFINITY, f64::min),
        max_weight: values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        mean_weight: sum / values.len() as f64,
    }
}

/// Human-readable `(position, weight, label)` triples for debugging/CLI
/// inspection.
pub fn describe_vector(vector: &SparseVector) -> Vec<(u32, f64, String)> {
    let label = |pos: u32| -> String {
        match pos {
            1 => "emotion_valence".into(),
            2 => "emotion_activation".into(),
            41..=50 => "locus".into(),
            61..=66 => format!("roget_class_{pos}"),
            67..=80 => format!("theme_{pos}"),
            other => format!("pos_{other}"),
        }
    };
    vector.iter().map(|(&pos, &w)| (pos, w, label(pos))).collect()
}

/// JSON encode/decode for storage. `BTreeMap` keeps keys in ascending order
/// so the round-trip produces identical output.
pub fn vector_to_json(vector: &SparseVector) -> String {
    serde_json::to_string(vector).expect("SparseVector serialization cannot fail")
}

pub fn json_to_vector(raw: &str) -> SparseVector {
    if raw.is_empty() {
        return SparseVector::new();
    }
    serde_json::from_str(raw).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Auteur, TruthStatus};
    use chrono::Utc;

    fn blank_segment() -> Segment {
        Segment {
            id: 1,
            timestamp: Utc::now(),
            timestamp_epoch: 0,
            token_start: 0,
            token_end: 1,
            source_file: "f.txt".into(),
            source_nature: "trace".into(),
            source_format: "txt".into(),
            source_origine: "test".into(),
            auteur: Auteur::Human,
            emotion_valence: 0.0,
            emotion_activation: 0.0,
            tags_roget: vec![],
            personnes: vec![],
            projets: vec![],
            sujets: vec![],
            lieux: vec![],
            resume_texte: String::new(),
            gr_id: None,
            confidence_score: 1.0,
            statut_verite: TruthStatus::Unknown,
            vector: SparseVector::new(),
            extractor_version: "test".into(),
            extractor_model: "test".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn vector_json_round_trips() {
        let mut v = SparseVector::new();
        v.insert(1, 0.5);
        v.insert(66, 1.0);
        let json = vector_to_json(&v);
        assert_eq!(json_to_vector(&json), v);
    }

    #[test]
    fn scenario_6_only_locus_and_no_state_positions() {
        let mut segment = blank_segment();
        segment.emotion_valence = 0.0;
        segment.emotion_activation = 0.5;
        segment.lieux = vec!["bureau".into()];
        let tax = Taxonomy::empty();
        let v = generate_vector(&segment, &tax);
        assert!(v.keys().all(|&p| (41..=50).contains(&p)));
        assert!(v.keys().all(|&p| !(1..=22).contains(&p)));
    }

    #[test]
    fn explicit_tag_reinforces_class_position() {
        let json = r#"{"classes": {"06": {"mots_cles": []}}}"#;
        let tax = Taxonomy::from_json(json).unwrap();
        let mut segment = blank_segment();
        segment.tags_roget = vec!["06-0030-0110".into()];
        let v = generate_vector(&segment, &tax);
        assert_eq!(v.get(&66), Some(&0.8));
    }
}
