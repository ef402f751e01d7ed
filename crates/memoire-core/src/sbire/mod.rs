//! Sbire — the Coherence Agent's "arm": executes search mandates and
//! database writes without spending any LLM tokens. Grounded in
//! `mnemosyne_modules/sbire.py::Sbire`.

pub mod word2vec;

use std::path::PathBuf;
use std::sync::Arc;

use regex::RegexBuilder;

use crate::fragment::list_fragments;
use crate::model::{Auteur, EdgeType, Pilier, PilierCategory, Segment, TruthStatus};
use crate::store::{NewSegment, Store};
use word2vec::NeighborModel;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SbireError {
    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),
    #[error("fragment error: {0}")]
    Fragment(#[from] crate::fragment::FragmentError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid grep pattern: {0}")]
    InvalidPattern(String),
}

pub type Result<T> = std::result::Result<T, SbireError>;

/// A search mandate, generated by the Coherence Agent's Phase A/B
/// reasoning and executed deterministically.
#[derive(Debug, Clone)]
pub enum Mandat {
    Grep { pattern: String, max: usize },
    Sql { query: String, max: usize },
    Word2Vec { query: String, max: usize },
}

/// One result of executing a [`Mandat`].
#[derive(Debug, Clone)]
pub enum MandatHit {
    Grep {
        file: PathBuf,
        line_no: usize,
        token_start: Option<i64>,
        content: String,
        matched_text: String,
    },
    Segment(Segment),
}

pub struct Sbire {
    store: Arc<Store>,
    fragments_root: PathBuf,
    model: Arc<dyn NeighborModel>,
}

impl Sbire {
    pub fn new(store: Arc<Store>, fragments_root: PathBuf) -> Self {
        Self::with_model(store, fragments_root, Arc::new(word2vec::NoneModel))
    }

    pub fn with_model(store: Arc<Store>, fragments_root: PathBuf, model: Arc<dyn NeighborModel>) -> Self {
        Self {
            store,
            fragments_root,
            model,
        }
    }

    pub fn execute(&self, mandat: &Mandat) -> Result<Vec<MandatHit>> {
        match mandat {
            Mandat::Grep { pattern, max } => self.grep_files(pattern, *max),
            Mandat::Sql { query, max } => self.search_sql(query, *max),
            Mandat::Word2Vec { query, max } => self.search_word2vec(query, *max),
        }
    }

    /// Iterates fragment files newest-first, applying `pattern` as a
    /// case-insensitive regex line-by-line. Parses the `{token}|{content}`
    /// format written by [`crate::fragment::write_fragment`] to recover
    /// `token_start` when present.
    fn grep_files(&self, pattern: &str, max: usize) -> Result<Vec<MandatHit>> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| SbireError::InvalidPattern(e.to_string()))?;

        let mut hits = Vec::new();
        for file in list_fragments(&self.fragments_root)? {
            let content = std::fs::read_to_string(&file)?;
            for (i, line) in content.split('\n').enumerate() {
                let Some(m) = regex.find(line) else { continue };
                let token_start = line.split_once('|').and_then(|(prefix, _)| prefix.parse::<i64>().ok());
                let display_content: String = line.chars().take(500).collect();
                hits.push(MandatHit::Grep {
                    file: file.clone(),
                    line_no: i + 1,
                    token_start,
                    content: display_content,
                    matched_text: m.as_str().to_string(),
                });
                if hits.len() >= max {
                    return Ok(hits);
                }
            }
        }
        Ok(hits)
    }

    /// Four-column `LIKE %q%` OR query across `resume_texte, sujets,
    /// personnes, projets`, newest first.
    fn search_sql(&self, query: &str, max: usize) -> Result<Vec<MandatHit>> {
        let pattern = format!("%{query}%");
        let limit = max as i64;
        let segments = self.store.query_segments(
            "SELECT * FROM metadata
             WHERE resume_texte LIKE ?1 OR sujets LIKE ?1 OR personnes LIKE ?1 OR projets LIKE ?1
             ORDER BY timestamp DESC LIMIT ?2",
            &[&pattern, &limit],
        )?;
        Ok(segments.into_iter().map(MandatHit::Segment).collect())
    }

    /// Expands `query` to its top-5 nearest terms above similarity 0.5 via
    /// the configured [`NeighborModel`], aggregates [`Self::search_sql`]
    /// results per term (deduplicated by segment id), and falls back to a
    /// plain SQL search on any degradation — out-of-vocabulary term, no
    /// model configured, or a model error. Mirrors
    /// `sbire.py::search_word2vec`'s graceful-degradation ladder.
    fn search_word2vec(&self, query: &str, max: usize) -> Result<Vec<MandatHit>> {
        let neighbors = self.model.nearest(query, 10);
        if neighbors.is_empty() {
            return self.search_sql(query, max);
        }

        let mut expanded: Vec<String> = vec![query.to_string()];
        expanded.extend(neighbors.into_iter().filter(|(_, score)| *score > 0.5).map(|(term, _)| term));
        expanded.truncate(5);

        let mut seen_ids = std::collections::HashSet::new();
        let mut hits = Vec::new();
        let per_term_max = (max / 2).max(1);
        for term in &expanded {
            for hit in self.search_sql(term, per_term_max)? {
                if let MandatHit::Segment(ref segment) = hit {
                    if !seen_ids.insert(segment.id) {
                        continue;
                    }
                }
                hits.push(hit);
                if hits.len() >= max {
                    return Ok(hits);
                }
            }
        }
        Ok(hits)
    }

    /// Sets `statut_verite`. When `dry_run`, logs the intended mutation
    /// instead of applying it.
    pub fn update_statut_verite(&self, segment_id: i64, statut: TruthStatus, dry_run: bool) -> Result<()> {
        if dry_run {
            tracing::info!(segment_id, ?statut, "dry run: would update statut_verite");
            return Ok(());
        }
        self.store.update_statut_verite(segment_id, statut)?;
        Ok(())
    }

    pub fn insert_edge(
        &self,
        source_id: i64,
        target_id: i64,
        edge_type: EdgeType,
        metadata: Option<String>,
        weight: f64,
        dry_run: bool,
    ) -> Result<Option<i64>> {
        if dry_run {
            tracing::info!(source_id, target_id, %edge_type, "dry run: would insert edge");
            return Ok(None);
        }
        let edge = self.store.insert_edge(source_id, target_id, edge_type, metadata, weight)?;
        Ok(Some(edge.id))
    }

    pub fn insert_pilier(
        &self,
        category: PilierCategory,
        importance: u8,
        fact: String,
        source_segment_id: Option<i64>,
        dry_run: bool,
    ) -> Result<Option<Pilier>> {
        if dry_run {
            tracing::info!(%category, importance, "dry run: would insert pilier");
            return Ok(None);
        }
        Ok(Some(self.store.insert_pilier(category, importance, fact, source_segment_id)?))
    }

    /// Inserts an internal segment for the consciousness-loop injection
    /// path: `auteur = IrisInternal`, no tags or vector columns set,
    /// `statut_verite = Validated`. Grounded in
    /// `sbire.py::insert_segment_internal`.
    pub fn insert_segment_internal(&self, resume: String, source: &str, dry_run: bool) -> Result<Option<i64>> {
        if dry_run {
            tracing::info!(source, "dry run: would insert internal segment");
            return Ok(None);
        }
        let now = chrono::Utc::now();
        let new_segment = NewSegment {
            timestamp: now,
            token_start: 0,
            token_end: 1,
            source_file: format!("internal/{source}"),
            source_nature: "reflexion".to_string(),
            source_format: "internal".to_string(),
            source_origine: source.to_string(),
            auteur: Auteur::IrisInternal,
            emotion_valence: 0.0,
            emotion_activation: 0.0,
            tags_roget: Vec::new(),
            personnes: Vec::new(),
            projets: Vec::new(),
            sujets: Vec::new(),
            lieux: Vec::new(),
            resume_texte: resume,
            gr_id: None,
            confidence_score: 1.0,
            vector: Default::default(),
            extractor_version: env!("CARGO_PKG_VERSION").to_string(),
            extractor_model: "internal".to_string(),
        };
        let segment = self.store.insert_segment(new_segment)?;
        self.store.update_statut_verite(segment.id, TruthStatus::Validated)?;
        Ok(Some(segment.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewSegment as StoreNewSegment;
    use chrono::Utc;

    fn sbire() -> (Sbire, tempfile::TempDir) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();
        (Sbire::new(store, dir.path().to_path_buf()), dir)
    }

    fn seed_segment(sbire: &Sbire, resume: &str) -> i64 {
        let new_segment = StoreNewSegment {
            timestamp: Utc::now(),
            token_start: 0,
            token_end: 5,
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
            resume_texte: resume.to_string(),
            gr_id: None,
            confidence_score: 0.5,
            vector: Default::default(),
            extractor_version: "v".into(),
            extractor_model: "m".into(),
        };
        sbire.store.insert_segment(new_segment).unwrap().id
    }

    #[test]
    fn sql_mandat_matches_resume() {
        let (sbire, _dir) = sbire();
        seed_segment(&sbire, "le chat dort sur le canapé");
        let hits = sbire.execute(&Mandat::Sql { query: "chat".into(), max: 10 }).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn word2vec_falls_back_to_sql_when_model_absent() {
        let (sbire, _dir) = sbire();
        seed_segment(&sbire, "projet rust en cours");
        let hits = sbire.execute(&Mandat::Word2Vec { query: "rust".into(), max: 10 }).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn grep_finds_line_and_token_start() {
        let (sbire, dir) = sbire();
        crate::fragment::write_fragment(dir.path(), "bonjour tout le monde", Utc::now(), |s| s.len()).unwrap();
        let hits = sbire.execute(&Mandat::Grep { pattern: "monde".into(), max: 10 }).unwrap();
        assert_eq!(hits.len(), 1);
        match &hits[0] {
            MandatHit::Grep { token_start, matched_text, .. } => {
                assert_eq!(*token_start, Some(0));
                assert_eq!(matched_text, "monde");
            }
            _ => panic!("expected Grep hit"),
        }
    }

    #[test]
    fn dry_run_skips_mutation() {
        let (sbire, _dir) = sbire();
        let id = seed_segment(&sbire, "test");
        sbire.update_statut_verite(id, TruthStatus::Validated, true).unwrap();
        let segment = sbire.store.get_segment(id).unwrap();
        assert_eq!(segment.statut_verite, TruthStatus::Unknown);
    }

    #[test]
    fn insert_segment_internal_sets_iris_internal_and_validated() {
        let (sbire, _dir) = sbire();
        let id = sbire.insert_segment_internal("synthèse de session".into(), "mnemosyne", false).unwrap().unwrap();
        let segment = sbire.store.get_segment(id).unwrap();
        assert_eq!(segment.auteur, Auteur::IrisInternal);
        assert_eq!(segment.statut_verite, TruthStatus::Validated);
    }
}
