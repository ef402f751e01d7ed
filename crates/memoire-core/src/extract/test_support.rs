//! Deterministic [`Extractor`] test doubles, usable from downstream crates
//! by enabling the `test-support` feature.

use async_trait::async_trait;
use std::sync::Mutex;

use super::{ExtractResult, ExtractedRecord, Extractor};

/// Always returns a single fixed record per input text.
pub struct NullExtractor {
    pub record: ExtractedRecord,
}

impl Default for NullExtractor {
    fn default() -> Self {
        Self {
            record: ExtractedRecord::default(),
        }
    }
}

#[async_trait]
impl Extractor for NullExtractor {
    async fn extract_batch(&self, texts: &[String], _last_gr_id: Option<i64>) -> ExtractResult {
        Ok(texts.iter().map(|_| self.record.clone()).collect())
    }
}

/// Returns a pre-programmed sequence of batch results, one per call,
/// cycling back to the start once exhausted. Used to exercise the
/// Indexer's batch-ordering and significance-filter logic deterministically.
pub struct ScriptedExtractor {
    batches: Mutex<(Vec<Vec<ExtractedRecord>>, usize)>,
}

impl ScriptedExtractor {
    pub fn new(batches: Vec<Vec<ExtractedRecord>>) -> Self {
        Self {
            batches: Mutex::new((batches, 0)),
        }
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn extract_batch(&self, texts: &[String], _last_gr_id: Option<i64>) -> ExtractResult {
        let mut guard = self.batches.lock().expect("scripted extractor lock poisoned");
        let (scripts, cursor) = &mut *guard;
        if scripts.is_empty() {
            return Ok(texts.iter().map(|_| ExtractedRecord::default()).collect());
        }
        let next = scripts[*cursor % scripts.len()].clone();
        *cursor += 1;
        Ok(next)
    }
}
