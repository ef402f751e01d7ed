//! Indexer (Scribe) — turns raw conversation text into stored [`Segment`]s:
//! segmentation, token counting, fragment-file emission, batched extraction
//! (sequential or cooperative-parallel), the significance filter, and
//! candidate-entity insertion. Grounded in `scribe.py`.

mod realtime;
mod turn;

pub use realtime::RealtimeHandle;
pub use turn::Turn;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tiktoken_rs::CoreBPE;

use crate::extract::{ExtractedRecord, Extractor};
use crate::fragment;
use crate::model::Auteur;
use crate::store::{NewSegment, Store};
use crate::taxonomy::Taxonomy;
use crate::vector;

const VALENCE_THRESHOLD: f64 = 0.3;
const ACTIVATION_THRESHOLD: f64 = 0.3;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum IndexerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("fragment error: {0}")]
    Fragment(#[from] fragment::FragmentError),
    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),
    #[error("tokenizer initialization failed: {0}")]
    Tokenizer(String),
}

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub batch_size: usize,
    /// 0 means sequential (one batch extracted at a time).
    pub parallel_batches: usize,
    pub realtime_channel_capacity: usize,
    pub idle_threshold: Duration,
    pub source_origine: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            parallel_batches: 15,
            realtime_channel_capacity: 256,
            idle_threshold: Duration::from_secs(5),
            source_origine: "memoire_core".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexingResult {
    pub segments_inserted: usize,
    pub phatic_skipped: usize,
    pub insignificant_skipped: usize,
    pub candidates_inserted: usize,
    pub errors: Vec<String>,
    pub fragment_file: PathBuf,
}

/// Last inserted record, for the significance filter, tracked across the
/// whole bulk run (not per-batch — mirrors `scribe.py`'s module-level
/// `prev_meta`/`prev_auteur`/`prev_ts`).
struct PreviousTurn {
    record: ExtractedRecord,
    auteur: Auteur,
    timestamp: chrono::DateTime<chrono::Utc>,
}

/// `true` if `curr` differs enough from `prev` to warrant its own segment.
/// Grounded in `scribe.py::_significant_change`.
fn significant_change(prev: Option<&ExtractedRecord>, curr: &ExtractedRecord) -> bool {
    let Some(prev) = prev else {
        return true;
    };
    if let (Some(p0), Some(c0)) = (prev.tags_roget.first(), curr.tags_roget.first()) {
        if p0 != c0 {
            return true;
        }
    }
    if (curr.emotion_valence - prev.emotion_valence).abs() > VALENCE_THRESHOLD {
        return true;
    }
    if (curr.emotion_activation - prev.emotion_activation).abs() > ACTIVATION_THRESHOLD {
        return true;
    }
    false
}

pub struct Scribe {
    store: Arc<Store>,
    taxonomy: Arc<Taxonomy>,
    fragments_root: PathBuf,
    bpe: CoreBPE,
}

impl Scribe {
    pub fn new(store: Arc<Store>, taxonomy: Arc<Taxonomy>, fragments_root: PathBuf) -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| IndexerError::Tokenizer(e.to_string()))?;
        Ok(Self {
            store,
            taxonomy,
            fragments_root,
            bpe,
        })
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Bulk indexing entry point: segments `path`'s contents into turns,
    /// writes the fragment file, extracts metadata batch by batch (in
    /// parallel when `cfg.parallel_batches > 0`), and inserts the
    /// significant segments.
    pub async fn index_file(
        &self,
        path: &Path,
        extractor: &dyn Extractor,
        cfg: &IndexerConfig,
    ) -> Result<IndexingResult> {
        let raw_text = std::fs::read_to_string(path)?;
        let turns = turn::parse_turns(&raw_text, |t| self.count_tokens(t));

        let first_timestamp = turns.first().map(|t| t.timestamp).unwrap_or_else(chrono::Utc::now);
        let fragment = fragment::write_fragment(&self.fragments_root, &raw_text, first_timestamp, |t| {
            self.count_tokens(t)
        })?;
        let source_file = fragment
            .path
            .strip_prefix(&self.fragments_root)
            .unwrap_or(&fragment.path)
            .to_string_lossy()
            .to_string();

        let batches: Vec<Vec<Turn>> = turns
            .chunks(cfg.batch_size.max(1))
            .map(|c| c.to_vec())
            .collect();

        let batch_results = if cfg.parallel_batches > 0 {
            self.extract_parallel(&batches, extractor, cfg.parallel_batches).await
        } else {
            self.extract_sequential(&batches, extractor).await
        };

        let mut result = IndexingResult {
            fragment_file: fragment.path.clone(),
            ..Default::default()
        };
        let mut previous: Option<PreviousTurn> = None;

        for (batch, records) in batches.iter().zip(batch_results.into_iter()) {
            for (t, record) in batch.iter().zip(records.into_iter()) {
                self.apply_one(t, &record, &source_file, cfg, &mut previous, &mut result);
            }
        }

        Ok(result)
    }

    fn apply_one(
        &self,
        t: &Turn,
        record: &ExtractedRecord,
        source_file: &str,
        cfg: &IndexerConfig,
        previous: &mut Option<PreviousTurn>,
        result: &mut IndexingResult,
    ) {
        if !record.indexable {
            result.phatic_skipped += 1;
            previous.replace(PreviousTurn {
                record: record.clone(),
                auteur: t.auteur.clone(),
                timestamp: t.timestamp,
            });
            return;
        }

        let should_insert = match previous.as_ref() {
            None => true,
            Some(prev) => {
                t.timestamp != prev.timestamp
                    || t.auteur != prev.auteur
                    || significant_change(Some(&prev.record), record)
            }
        };

        if should_insert {
            match self.insert_one(t, record, source_file, cfg) {
                Ok(inserted) => {
                    result.segments_inserted += 1;
                    result.candidates_inserted += inserted;
                }
                Err(e) => result.errors.push(e.to_string()),
            }
        } else {
            result.insignificant_skipped += 1;
        }

        previous.replace(PreviousTurn {
            record: record.clone(),
            auteur: t.auteur.clone(),
            timestamp: t.timestamp,
        });
    }

    fn insert_one(&self, t: &Turn, record: &ExtractedRecord, source_file: &str, cfg: &IndexerConfig) -> Result<usize> {
        let mut new_segment = NewSegment {
            timestamp: t.timestamp,
            token_start: t.token_start,
            token_end: t.token_start + t.token_count,
            source_file: source_file.to_string(),
            source_nature: "trace".to_string(),
            source_format: "txt".to_string(),
            source_origine: cfg.source_origine.clone(),
            auteur: t.auteur.clone(),
            emotion_valence: record.emotion_valence,
            emotion_activation: record.emotion_activation,
            tags_roget: record.tags_roget.clone(),
            personnes: record.personnes.clone(),
            projets: record.projets.clone(),
            sujets: record.sujets.clone(),
            lieux: record.lieux.clone(),
            resume_texte: record.resume_texte.clone(),
            gr_id: record.gr_id,
            confidence_score: record.confidence_score,
            vector: Default::default(),
            extractor_version: env!("CARGO_PKG_VERSION").to_string(),
            extractor_model: "external".to_string(),
        };
        new_segment.vector = vector::generate_vector(&new_segment.as_segment_preview(), &self.taxonomy);

        let segment = self.store.insert_segment(new_segment)?;

        let mut candidates_inserted = 0;
        if let Some(name) = &record.personne_candidat {
            self.store.insert_candidat_personne(
                segment.id,
                name.clone(),
                record.resume_texte.chars().take(200).collect(),
            )?;
            candidates_inserted += 1;
        }
        if let Some(name) = &record.projet_candidat {
            self.store.insert_candidat_projet(
                segment.id,
                name.clone(),
                record.resume_texte.chars().take(200).collect(),
            )?;
            candidates_inserted += 1;
        }

        Ok(candidates_inserted)
    }

    async fn extract_sequential(&self, batches: &[Vec<Turn>], extractor: &dyn Extractor) -> Vec<Vec<ExtractedRecord>> {
        let mut out = Vec::with_capacity(batches.len());
        let mut last_gr_id: Option<i64> = None;
        for batch in batches {
            let texts: Vec<String> = batch.iter().map(|t| turn::clean_segment(&t.text)).collect();
            let records = match extractor.extract_batch(&texts, last_gr_id).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = %e, "batch extraction failed, using defaults");
                    texts.iter().map(|_| ExtractedRecord::default()).collect()
                }
            };
            for r in &records {
                if r.indexable {
                    if let Some(gr_id) = r.gr_id {
                        if last_gr_id.is_none_or(|prev| gr_id > prev) {
                            last_gr_id = Some(gr_id);
                        }
                    }
                }
            }
            out.push(records);
        }
        out
    }

    /// Cooperative-parallel extraction: up to `parallel_batches` concurrent
    /// `extract_batch` calls per group via `futures::future::join_all`,
    /// merged back into ascending batch order before being applied to the
    /// store — the Rust realization of `scribe.py::_process_parallel`'s
    /// `asyncio.gather`-per-group concurrency, with a
    /// `BTreeMap<usize, Vec<ExtractedRecord>>` standing in for the
    /// original's `all_results[batch_id] = ...` slot assignment.
    async fn extract_parallel(
        &self,
        batches: &[Vec<Turn>],
        extractor: &dyn Extractor,
        parallel_batches: usize,
    ) -> Vec<Vec<ExtractedRecord>> {
        let mut pending: BTreeMap<usize, Vec<ExtractedRecord>> = BTreeMap::new();
        let mut out = Vec::with_capacity(batches.len());

        let indices: Vec<usize> = (0..batches.len()).collect();
        for group in indices.chunks(parallel_batches.max(1)) {
            let futures_for_group = group.iter().map(|&idx| {
                let texts: Vec<String> = batches[idx].iter().map(|t| turn::clean_segment(&t.text)).collect();
                async move {
                    let records = match extractor.extract_batch(&texts, None).await {
                        Ok(r) => r,
                        Err(e) => {
                            tracing::warn!(error = %e, batch = idx, "batch extraction failed, using defaults");
                            texts.iter().map(|_| ExtractedRecord::default()).collect()
                        }
                    };
                    (idx, records)
                }
            });

            for (idx, records) in futures::future::join_all(futures_for_group).await {
                pending.insert(idx, records);
            }
        }

        for i in 0..batches.len() {
            out.push(pending.remove(&i).unwrap_or_default());
        }
        out
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn taxonomy(&self) -> &Arc<Taxonomy> {
        &self.taxonomy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::test_support::ScriptedExtractor;

    fn scribe(root: &Path) -> Scribe {
        Scribe::new(Arc::new(Store::open_in_memory().unwrap()), Arc::new(Taxonomy::empty()), root.to_path_buf())
            .unwrap()
    }

    #[test]
    fn significant_change_detects_tag_shift() {
        let mut a = ExtractedRecord::default();
        a.tags_roget = vec!["01-0010-0010".into()];
        let mut b = ExtractedRecord::default();
        b.tags_roget = vec!["02-0010-0010".into()];
        assert!(significant_change(Some(&a), &b));
    }

    #[test]
    fn significant_change_detects_valence_jump() {
        let mut a = ExtractedRecord::default();
        a.emotion_valence = 0.0;
        let mut b = ExtractedRecord::default();
        b.emotion_valence = 0.9;
        assert!(significant_change(Some(&a), &b));
    }

    #[test]
    fn significant_change_false_when_stable() {
        let a = ExtractedRecord::default();
        let b = ExtractedRecord::default();
        assert!(!significant_change(Some(&a), &b));
    }

    #[tokio::test]
    async fn bulk_index_inserts_significant_segments_and_writes_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("conversation.txt");
        std::fs::write(
            &input,
            "[2025-01-01T10:00:00.000Z] human: first message about something\n\
             [2025-01-01T10:00:05.000Z] assistant: a reply with similar content",
        )
        .unwrap();

        let fragments_root = dir.path().join("fragments");
        let s = scribe(&fragments_root);

        let mut rec1 = ExtractedRecord::default();
        rec1.resume_texte = "first".into();
        let mut rec2 = ExtractedRecord::default();
        rec2.resume_texte = "second".into();
        rec2.emotion_valence = 0.9; // forces significance despite same auteur check logic

        let extractor = ScriptedExtractor::new(vec![vec![rec1, rec2]]);
        let cfg = IndexerConfig {
            batch_size: 10,
            parallel_batches: 0,
            ..Default::default()
        };

        let result = s.index_file(&input, &extractor, &cfg).await.unwrap();
        assert_eq!(result.segments_inserted, 2);
        assert!(result.fragment_file.exists());
    }

    #[tokio::test]
    async fn phatic_records_are_skipped_not_inserted() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("conversation.txt");
        std::fs::write(&input, "[2025-01-01T10:00:00.000Z] human: ok thanks bye now").unwrap();

        let fragments_root = dir.path().join("fragments");
        let s = scribe(&fragments_root);

        let mut rec = ExtractedRecord::default();
        rec.indexable = false;
        let extractor = ScriptedExtractor::new(vec![vec![rec]]);
        let cfg = IndexerConfig::default();

        let result = s.index_file(&input, &extractor, &cfg).await.unwrap();
        assert_eq!(result.segments_inserted, 0);
        assert_eq!(result.phatic_skipped, 1);
    }
}
