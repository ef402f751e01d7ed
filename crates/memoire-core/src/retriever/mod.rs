//! Retriever (Hermès) — hybrid search over the metadata store: candidate
//! SQL narrowing, six-signal scoring, TriLDaSA resonance, and a raw-text
//! fallback when nothing scores. Grounded in `hermes_modules/core.py::run`
//! and its `_search_metadata`/`_score_candidates` helpers.

pub mod fallback;
pub mod format;
pub mod mask;
pub mod parse;
pub mod scoring;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tiktoken_rs::CoreBPE;

use crate::model::Segment;
use crate::query_profile::QueryProfile;
use crate::store::Store;

pub use fallback::FallbackHit;
pub use parse::ParsedQuery;
pub use scoring::{ScoreBreakdown, ScoringWeights};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RetrieverError {
    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),
    #[error("fragment error: {0}")]
    Fragment(#[from] crate::fragment::FragmentError),
}

pub type Result<T> = std::result::Result<T, RetrieverError>;

/// One scored result: the underlying segment, its final combined score, and
/// (when computed through the full scoring path, not a specialized facet)
/// the per-signal breakdown for debugging.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub segment: Segment,
    pub score: f64,
    pub breakdown: Option<ScoreBreakdown>,
}

/// Outcome of a [`Hermes::run`] call.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub query: String,
    pub candidates: Vec<ScoredCandidate>,
    pub fallback_hits: Vec<FallbackHit>,
    pub used_fallback: bool,
}

impl RetrievalResult {
    pub fn formatted_context(&self, token_budget: usize, bpe: &CoreBPE) -> String {
        format::format_for_llm(&self.candidates, token_budget, bpe)
    }
}

const CANDIDATE_SQL_LIMIT: i64 = 100;
const MOTS_CLES_LIMIT: usize = 5;
const PERSONNES_LIMIT: usize = 3;

/// The Retriever. Holds the shared store and the root of the fragment tree
/// (for the raw-text fallback) and is otherwise stateless: every call reads
/// whatever state it needs from the store at call time.
pub struct Hermes {
    store: Arc<Store>,
    fragments_root: PathBuf,
    bpe: CoreBPE,
}

impl Hermes {
    pub fn new(store: Arc<Store>, fragments_root: PathBuf) -> Self {
        Self {
            store,
            fragments_root,
            bpe: tiktoken_rs::cl100k_base().expect("cl100k_base vocabulary is bundled"),
        }
    }

    /// Hybrid search entry point, mirroring `core.py::run`.
    pub fn run(&self, query: &str, profile: &QueryProfile) -> Result<RetrievalResult> {
        let mut parsed = parse::parse_query(query);
        if let Some(days) = profile.filters.date_range_days {
            let now = Utc::now();
            parsed.date_range = Some(((now - Duration::days(days)).date_naive(), now.date_naive()));
        }
        if !profile.filters.personnes.is_empty() {
            parsed.personnes.extend(profile.filters.personnes.iter().cloned());
        }

        let candidates = self.search_metadata(&parsed)?;

        if candidates.is_empty() {
            let mut result = RetrievalResult {
                query: query.to_string(),
                candidates: Vec::new(),
                fallback_hits: Vec::new(),
                used_fallback: false,
            };
            if profile.strategy.include_text_fallback {
                let hits = fallback::scan_directory(&self.fragments_root, &parsed.keywords)?;
                if !hits.is_empty() {
                    result.used_fallback = true;
                    result.fallback_hits = hits;
                }
            }
            return Ok(result);
        }

        let scored = self.score_and_sort(&parsed, candidates, profile);
        let top_k = profile.strategy.top_k;
        Ok(RetrievalResult {
            query: query.to_string(),
            candidates: scored.into_iter().take(top_k).collect(),
            fallback_hits: Vec::new(),
            used_fallback: false,
        })
    }

    /// Builds the AND-of-OR-groups `WHERE` clause: date range ANDed against
    /// an OR group each for keywords/sujets/projets/lieux, explicit tags,
    /// and person names — exactly `core.py::_search_metadata`'s shape.
    fn search_metadata(&self, parsed: &ParsedQuery) -> Result<Vec<Segment>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some((start, end)) = parsed.date_range {
            clauses.push("timestamp >= ?".to_string());
            values.push(Box::new(start.and_hms_opt(0, 0, 0).unwrap().and_utc().to_rfc3339()));
            clauses.push("timestamp <= ?".to_string());
            values.push(Box::new(end.and_hms_opt(23, 59, 59).unwrap().and_utc().to_rfc3339()));
        }

        let keywords: Vec<&String> = parsed.keywords.iter().take(MOTS_CLES_LIMIT).collect();
        if parsed.personnes.is_empty() && !keywords.is_empty() {
            let mut kw_clauses = Vec::new();
            for kw in &keywords {
                kw_clauses.push("(resume_texte LIKE ? OR sujets LIKE ? OR projets LIKE ? OR lieux LIKE ?)".to_string());
                let pattern = format!("%{kw}%");
                for _ in 0..4 {
                    values.push(Box::new(pattern.clone()));
                }
            }
            clauses.push(format!("({})", kw_clauses.join(" OR ")));
        }

        if !parsed.tags.is_empty() {
            let mut tag_clauses = Vec::new();
            for tag in &parsed.tags {
                tag_clauses.push("tags_roget LIKE ?".to_string());
                values.push(Box::new(format!("%{tag}%")));
            }
            clauses.push(format!("({})", tag_clauses.join(" OR ")));
        }

        let personnes: Vec<&String> = parsed.personnes.iter().take(PERSONNES_LIMIT).collect();
        if !personnes.is_empty() {
            let mut personne_clauses = Vec::new();
            for p in &personnes {
                personne_clauses.push("normalize_search(personnes) LIKE ?".to_string());
                values.push(Box::new(format!("%{}%", crate::store::normalize_search(p))));
            }
            clauses.push(format!("({})", personne_clauses.join(" OR ")));
        }

        let where_clause = if clauses.is_empty() { "1=1".to_string() } else { clauses.join(" AND ") };
        let sql = format!(
            "SELECT * FROM metadata WHERE {where_clause} ORDER BY timestamp DESC LIMIT {CANDIDATE_SQL_LIMIT}"
        );
        let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|b| b.as_ref()).collect();
        self.store.query_segments(&sql, &param_refs).map_err(RetrieverError::from)
    }

    fn score_and_sort(&self, parsed: &ParsedQuery, candidates: Vec<Segment>, profile: &QueryProfile) -> Vec<ScoredCandidate> {
        let weights = ScoringWeights::from_profile_weights(&profile.weights);
        let mask = mask::generate_mask(profile);
        let now = Utc::now();

        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|segment| {
                let breakdown = ScoreBreakdown {
                    roget: scoring::score_roget(parsed, &segment),
                    emotion: scoring::score_emotion(parsed, &segment),
                    temporal: scoring::score_temporal(now, &segment),
                    personnes: scoring::score_personnes(parsed, &segment),
                    resume: scoring::score_resume(parsed, &segment),
                    trildasa: scoring::score_trildasa(&mask, &segment),
                };
                let score = scoring::combine(&weights, &breakdown);
                ScoredCandidate {
                    segment,
                    score,
                    breakdown: Some(breakdown),
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.segment.timestamp.cmp(&a.segment.timestamp))
        });
        scored
    }

    /// Direct search by person name, bypassing scoring — every hit scores
    /// 1.0, per `search_strategies/person.py::search_by_person`.
    pub fn search_by_person(&self, personne: &str, top_k: i64) -> Result<Vec<ScoredCandidate>> {
        let normalized = format!("%{}%", crate::store::normalize_search(personne));
        let rows = self.store.query_segments(
            "SELECT * FROM metadata WHERE normalize_search(personnes) LIKE ?1 ORDER BY timestamp DESC LIMIT ?2",
            &[&normalized, &top_k],
        )?;
        Ok(rows
            .into_iter()
            .map(|segment| ScoredCandidate {
                segment,
                score: 1.0,
                breakdown: None,
            })
            .collect())
    }

    /// Direct search by UTC date range, per
    /// `search_strategies/date.py::search_by_date`.
    pub fn search_by_date_range(&self, start: chrono::DateTime<Utc>, end: chrono::DateTime<Utc>, top_k: i64) -> Result<Vec<ScoredCandidate>> {
        let rows = self.store.query_segments(
            "SELECT * FROM metadata WHERE timestamp >= ?1 AND timestamp <= ?2 ORDER BY timestamp DESC LIMIT ?3",
            &[&start.to_rfc3339(), &end.to_rfc3339(), &top_k],
        )?;
        Ok(rows
            .into_iter()
            .map(|segment| ScoredCandidate {
                segment,
                score: 1.0,
                breakdown: None,
            })
            .collect())
    }

    /// Direct search by Roget tag codes, delegating into `run` with the
    /// tags joined as query text — per
    /// `search_strategies/tags.py::search_by_tags`.
    pub fn search_by_tags(&self, tags: &[String], top_k: usize) -> Result<RetrievalResult> {
        let mut profile = QueryProfile::default();
        profile.strategy.top_k = top_k;
        self.run(&tags.join(" "), &profile)
    }

    /// Direct search by target emotion, scoring the 500 most recent
    /// non-null-valence rows by cosine similarity and keeping the top-`k`,
    /// per `search_strategies/emotion.py::search_by_emotion`.
    pub fn search_by_emotion(&self, valence: f64, activation: f64, top_k: usize) -> Result<Vec<ScoredCandidate>> {
        let rows = self.store.query_segments(
            "SELECT * FROM metadata WHERE emotion_valence IS NOT NULL ORDER BY timestamp DESC LIMIT 500",
            &[],
        )?;
        let mut scored: Vec<ScoredCandidate> = rows
            .into_iter()
            .map(|segment| {
                let score = scoring::emotion_similarity((valence, activation), (segment.emotion_valence, segment.emotion_activation));
                ScoredCandidate {
                    segment,
                    score,
                    breakdown: None,
                }
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Auteur;
    use crate::store::NewSegment;
    use crate::vector::generate_vector;
    use crate::taxonomy::Taxonomy;

    fn hermes_with_segment(resume: &str, personnes: Vec<&str>, tags: Vec<&str>) -> (Hermes, tempfile::TempDir) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let taxonomy = Taxonomy::empty();
        let mut new_segment = NewSegment {
            timestamp: Utc::now(),
            token_start: 0,
            token_end: 5,
            source_file: "f.txt".into(),
            source_nature: "trace".into(),
            source_format: "txt".into(),
            source_origine: "test".into(),
            auteur: Auteur::Human,
            emotion_valence: 0.3,
            emotion_activation: 0.4,
            tags_roget: tags.into_iter().map(String::from).collect(),
            personnes: personnes.into_iter().map(String::from).collect(),
            projets: vec![],
            sujets: vec![],
            lieux: vec![],
            resume_texte: resume.to_string(),
            gr_id: Some(1),
            confidence_score: 0.8,
            vector: Default::default(),
            extractor_version: "v".into(),
            extractor_model: "m".into(),
        };
        new_segment.vector = generate_vector(&new_segment.as_segment_preview(), &taxonomy);
        store.insert_segment(new_segment).unwrap();

        let dir = tempfile::tempdir().unwrap();
        (Hermes::new(store, dir.path().to_path_buf()), dir)
    }

    #[test]
    fn run_finds_segment_by_keyword() {
        let (hermes, _dir) = hermes_with_segment("le projet rust avance bien", vec![], vec![]);
        let profile = QueryProfile::default();
        let result = hermes.run("des nouvelles du projet rust", &profile).unwrap();
        assert!(!result.candidates.is_empty());
        assert!(!result.used_fallback);
    }

    #[test]
    fn run_falls_back_to_fragment_scan_when_no_candidates() {
        let (hermes, dir) = hermes_with_segment("rien a voir", vec![], vec![]);
        crate::fragment::write_fragment(dir.path(), "une mention de licorne ici", Utc::now(), |s| s.len()).unwrap();
        let profile = QueryProfile::default();
        let result = hermes.run("licorne", &profile).unwrap();
        assert!(result.used_fallback);
        assert!(!result.fallback_hits.is_empty());
    }

    #[test]
    fn search_by_person_scores_every_hit_at_one() {
        let (hermes, _dir) = hermes_with_segment("hello", vec!["Marie Tremblay"], vec![]);
        let hits = hermes.search_by_person("Marie", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 1.0);
    }
}
