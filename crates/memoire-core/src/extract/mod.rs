//! Extractor interface — turns a raw conversation turn into structured
//! metadata. Implementations call out to an LLM; this crate only defines
//! the contract, a JSON repair pipeline for ragged LLM output, a retry
//! wrapper, and (gated behind `test-support`) deterministic test doubles.

pub mod repair;
pub mod retry;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ExtractError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rate limited, retry after backoff")]
    RateLimited,
    #[error("response could not be parsed as metadata: {0}")]
    Unparseable(String),
}

pub type Result<T> = std::result::Result<T, ExtractError>;
pub type ExtractResult = Result<Vec<ExtractedRecord>>;

/// One extracted metadata record, mirroring the schema produced by the
/// original's `extractors/base.py::default_metadata` and its batch/single
/// response parsers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    #[serde(default = "default_true")]
    pub indexable: bool,
    #[serde(default)]
    pub tags_roget: Vec<String>,
    #[serde(default)]
    pub emotion_valence: f64,
    #[serde(default = "default_activation")]
    pub emotion_activation: f64,
    #[serde(default)]
    pub personnes: Vec<String>,
    #[serde(default)]
    pub projets: Vec<String>,
    #[serde(default)]
    pub sujets: Vec<String>,
    #[serde(default)]
    pub lieux: Vec<String>,
    #[serde(default)]
    pub resume_texte: String,
    #[serde(default)]
    pub gr_id: Option<i64>,
    #[serde(default = "default_confidence")]
    pub confidence_score: f64,
    #[serde(default)]
    pub personne_candidat: Option<String>,
    #[serde(default)]
    pub projet_candidat: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_activation() -> f64 {
    0.5
}

fn default_confidence() -> f64 {
    0.5
}

impl Default for ExtractedRecord {
    fn default() -> Self {
        Self {
            indexable: true,
            tags_roget: vec!["04-0110-0010".to_string()],
            emotion_valence: 0.0,
            emotion_activation: 0.5,
            personnes: Vec::new(),
            projets: Vec::new(),
            sujets: Vec::new(),
            lieux: Vec::new(),
            resume_texte: String::new(),
            gr_id: None,
            confidence_score: 0.5,
            personne_candidat: None,
            projet_candidat: None,
        }
    }
}

impl ExtractedRecord {
    /// Sentinel used when every repair strategy has failed and there is no
    /// prior record to fall back to.
    pub fn extraction_failed() -> Self {
        Self {
            resume_texte: "[extraction failed]".to_string(),
            confidence_score: 0.5,
            ..Self::default()
        }
    }
}

/// Turns conversation turns into [`ExtractedRecord`]s, one call per batch.
/// `last_gr_id` carries the highest group id seen so far in the current
/// bulk run, for continuity across batch boundaries (mirrors
/// `scribe.py::_process_sequential`'s `last_gr_id` tracking).
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract_batch(&self, texts: &[String], last_gr_id: Option<i64>) -> ExtractResult;

    /// Convenience wrapper for the real-time path, which extracts one turn
    /// at a time.
    async fn extract(&self, text: &str) -> Result<ExtractedRecord> {
        let mut records = self.extract_batch(std::slice::from_ref(&text.to_string()), None).await?;
        Ok(records.pop().unwrap_or_default())
    }
}
