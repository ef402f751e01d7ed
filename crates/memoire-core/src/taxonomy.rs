//! Taxonomy Index — loads the hierarchical tag dictionary and builds the
//! keyword sets the Vector Engine and tag-proximity scoring depend on.
//!
//! The on-disk format is `tag_index_numbered.json`: `{"classes": {"01": {
//! "mots_cles": [...], "sections": {"0010": {"mots_cles": [...], "tags": {
//! "0010": {"mots_cles": [...], "nom": "..."}}}}}}}`.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TaxonomyError {
    #[error("IO error reading taxonomy file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid taxonomy JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TaxonomyError>;

#[derive(Debug, Deserialize)]
struct TagIndexDoc {
    #[serde(default)]
    classes: HashMap<String, ClassDoc>,
}

#[derive(Debug, Deserialize)]
struct ClassDoc {
    #[serde(default)]
    mots_cles: Vec<String>,
    #[serde(default)]
    sections: HashMap<String, SectionDoc>,
}

#[derive(Debug, Deserialize)]
struct SectionDoc {
    #[serde(default)]
    mots_cles: Vec<String>,
    #[serde(default)]
    tags: HashMap<String, TagDoc>,
}

#[derive(Debug, Deserialize)]
struct TagDoc {
    #[serde(default)]
    mots_cles: Vec<String>,
    #[serde(default)]
    nom: String,
}

/// Base keyword triggers used to seed theme detection (positions 67-80)
/// before any taxonomy-driven enrichment. A small fixed set of themes;
/// new ones can be added without touching the Vector Engine.
fn theme_triggers() -> &'static [(u32, &'static [&'static str])] {
    &[
        (67, &["health", "santé", "medical", "medicine", "disease", "illness", "pain", "douleur"]),
        (68, &["money", "argent", "wealth", "richesse", "payment", "paiement", "finance"]),
        (69, &["computer", "ordinateur", "digital", "numérique", "software", "technology", "code"]),
        (70, &["family", "famille", "kinship", "parenté", "marriage", "mariage", "child", "enfant"]),
        (71, &["food", "nourriture", "eating", "manger", "drink", "boire", "meal", "repas"]),
        (72, &["work", "travail", "business", "affaires", "career", "carrière", "job", "emploi"]),
        (73, &["play", "jeu", "leisure", "loisir", "music", "musique", "art", "sport"]),
        (74, &["education", "éducation", "learning", "apprentissage", "school", "école", "study", "étude"]),
        (75, &["travel", "voyage", "journey", "trajet", "tourism", "tourisme"]),
    ]
}

/// A tag class position on the vector (61..=66, data-driven — see §9 of
/// SPEC_FULL.md: a 7th class is assigned 67 without code changes here, the
/// Vector Engine simply iterates whatever `Taxonomy::class_positions`
/// contains).
pub const FIRST_CLASS_POSITION: u32 = 61;
pub const LAST_CLASS_POSITION: u32 = 66;
pub const FIRST_THEME_POSITION: u32 = 67;
pub const LAST_THEME_POSITION: u32 = 80;

/// Loaded, immutable tag taxonomy. Shared freely across threads once built.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    /// class code ("01".."06"...) -> vector position (61, 62, ...)
    class_positions: HashMap<String, u32>,
    /// vector position -> keyword set for that class
    class_keywords: HashMap<u32, HashSet<String>>,
    /// full tag code "CC-SSSS-TTTT" -> class vector position
    tag_to_position: HashMap<String, u32>,
    /// vector position (67..=80) -> theme keyword set
    theme_keywords: HashMap<u32, HashSet<String>>,
    loaded: bool,
}

impl Taxonomy {
    /// A taxonomy with no classes loaded. The Vector Engine still works with
    /// this — it just can't populate positions 61-80.
    pub fn empty() -> Self {
        let mut theme_keywords = HashMap::new();
        for pos in FIRST_THEME_POSITION..=LAST_THEME_POSITION {
            theme_keywords.insert(pos, HashSet::new());
        }
        Self {
            theme_keywords,
            ..Default::default()
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let doc: TagIndexDoc = serde_json::from_str(raw)?;
        let mut tax = Self::empty();
        tax.loaded = true;

        // Assign class positions in document order, starting at 61 — the
        // data-driven mapping SPEC_FULL.md §4.2 requires instead of
        // hard-coding class codes "01".."06".
        let mut class_codes: Vec<&String> = doc.classes.keys().collect();
        class_codes.sort();
        let mut next_position = FIRST_CLASS_POSITION;
        for code in class_codes {
            if next_position > LAST_CLASS_POSITION {
                tracing::warn!(
                    class_code = %code,
                    "taxonomy has more classes than reserved vector positions (61-66); ignoring"
                );
                continue;
            }
            tax.class_positions.insert(code.clone(), next_position);
            tax.class_keywords.insert(next_position, HashSet::new());
            next_position += 1;
        }

        for (class_code, class_data) in &doc.classes {
            let Some(&position) = tax.class_positions.get(class_code) else {
                continue;
            };
            let keywords = tax.class_keywords.entry(position).or_default();
            for kw in &class_data.mots_cles {
                keywords.insert(kw.to_lowercase());
            }
            for (section_code, section_data) in &class_data.sections {
                for kw in &section_data.mots_cles {
                    keywords.insert(kw.to_lowercase());
                }
                for (tag_code, tag_data) in &section_data.tags {
                    let full_code = format!("{class_code}-{section_code}-{tag_code}");
                    tax.tag_to_position.insert(full_code, position);
                    for kw in &tag_data.mots_cles {
                        let kw_lower = kw.to_lowercase();
                        tax.class_keywords
                            .get_mut(&position)
                            .expect("position initialized above")
                            .insert(kw_lower.clone());
                        tax.enrich_themes(&kw_lower, &tag_data.nom);
                    }
                }
            }
        }

        Ok(tax)
    }

    fn enrich_themes(&mut self, keyword: &str, tag_name: &str) {
        let tag_lower = tag_name.to_lowercase();
        for (position, triggers) in theme_triggers() {
            if triggers
                .iter()
                .any(|t| keyword.contains(t) || tag_lower.contains(t))
            {
                self.theme_keywords
                    .entry(*position)
                    .or_default()
                    .insert(keyword.to_string());
            }
        }
    }

    pub fn class_position(&self, class_code: &str) -> Option<u32> {
        self.class_positions.get(class_code).copied()
    }

    pub fn tag_position(&self, full_tag_code: &str) -> Option<u32> {
        self.tag_to_position.get(full_tag_code).copied()
    }

    pub fn class_keyword_sets(&self) -> impl Iterator<Item = (u32, &HashSet<String>)> {
        self.class_keywords.iter().map(|(p, k)| (*p, k))
    }

    pub fn theme_keyword_sets(&self) -> impl Iterator<Item = (u32, &HashSet<String>)> {
        self.theme_keywords.iter().map(|(p, k)| (*p, k))
    }

    /// Number of tags mapped to a class position — used in diagnostics.
    pub fn tags_mapped(&self) -> usize {
        self.tag_to_position.len()
    }
}

/// Split a `CC-SSSS-TTTT` tag code into `(class, section, item)` components
/// used by [`prox`]. Returns `None` if the code doesn't have the expected
/// three hyphen-separated parts.
fn split_tag(tag: &str) -> Option<(&str, &str, &str)> {
    let mut parts = tag.splitn(3, '-');
    let class = parts.next()?;
    let section = parts.next()?;
    let item = parts.next()?;
    Some((class, section, item))
}

/// Tag proximity `prox(t1, t2) in [0,1]`, exactly per SPEC_FULL.md §4.2.
pub fn prox(t1: &str, t2: &str) -> f64 {
    if t1 == t2 {
        return 1.0;
    }
    let (Some((c1, s1, i1)), Some((c2, s2, i2))) = (split_tag(t1), split_tag(t2)) else {
        return 0.1;
    };
    if c1 != c2 {
        return 0.1;
    }
    if s1 != s2 {
        let delta = section_delta(s1, s2);
        return 0.3 + 0.3 * (1.0 - (delta / 100.0).min(1.0));
    }
    if i1 != i2 {
        let delta = section_delta(i1, i2);
        return 0.7 + 0.3 * (1.0 - (delta / 100.0).min(1.0));
    }
    1.0
}

fn section_delta(a: &str, b: &str) -> f64 {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(a), Ok(b)) => (a - b).abs() as f64,
        // Non-numeric codes: treat as maximally distant within the band.
        _ => 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prox_is_symmetric_and_self_equal() {
        let pairs = [
            ("01-0010-0010", "01-0010-0020"),
            ("01-0010-0010", "01-0020-0010"),
            ("01-0010-0010", "02-0010-0010"),
        ];
        for (a, b) in pairs {
            assert!((prox(a, b) - prox(b, a)).abs() < 1e-12);
        }
        assert_eq!(prox("01-0010-0010", "01-0010-0010"), 1.0);
    }

    #[test]
    fn prox_orders_scenario_6() {
        let same_section = prox("01-0010-0010", "01-0010-0020");
        let same_class = prox("01-0010-0010", "01-0020-0010");
        let diff_class = prox("01-0010-0010", "02-0010-0010");
        assert!(same_section > same_class);
        assert!(same_class > diff_class);
    }

    #[test]
    fn load_assigns_positions_in_document_order() {
        let json = r#"{
            "classes": {
                "01": {"mots_cles": ["abstrait"], "sections": {}},
                "02": {"mots_cles": ["espace"], "sections": {}}
            }
        }"#;
        let tax = Taxonomy::from_json(json).unwrap();
        assert_eq!(tax.class_position("01"), Some(61));
        assert_eq!(tax.class_position("02"), Some(62));
    }

    #[test]
    fn seventh_class_does_not_panic_and_is_ignored_past_66() {
        let json = r#"{"classes": {
            "01": {}, "02": {}, "03": {}, "04": {}, "05": {}, "06": {}, "07": {}
        }}"#;
        let tax = Taxonomy::from_json(json).unwrap();
        assert_eq!(tax.class_position("06"), Some(66));
        assert_eq!(tax.class_position("07"), None);
    }
}
