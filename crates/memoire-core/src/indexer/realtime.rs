//! Real-time indexing path — a bounded queue feeding a single worker task
//! that extracts and inserts one turn at a time, with no significance
//! filter (resolves spec.md's Open Question (c): the original's real-time
//! insert path, `scribe.py::get_insert_fn`, never calls
//! `_significant_change`). Grounded in `queue_manager.py::ScribeQueue`,
//! tightened from its unbounded `queue.Queue()` to a bounded
//! `tokio::sync::mpsc` channel.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::extract::Extractor;
use crate::model::Auteur;
use crate::store::{NewSegment, Store};
use crate::taxonomy::Taxonomy;
use crate::vector;

/// One item submitted to the real-time queue.
#[derive(Debug, Clone)]
pub struct RealtimeItem {
    pub timestamp: DateTime<Utc>,
    pub token_start: i64,
    pub auteur: Auteur,
    pub text: String,
}

/// Handle to a running real-time worker. Dropping the handle without
/// calling [`RealtimeHandle::stop`] leaves the worker running until the
/// channel is dropped by all senders.
pub struct RealtimeHandle {
    sender: mpsc::Sender<RealtimeItem>,
    worker: JoinHandle<()>,
}

impl RealtimeHandle {
    /// Spawn the worker task. `idle_callback` fires once whenever the
    /// queue has sat empty for `idle_threshold`, matching
    /// `ScribeQueue._worker_loop`'s idle detection.
    pub fn spawn(
        store: Arc<Store>,
        taxonomy: Arc<Taxonomy>,
        extractor: Arc<dyn Extractor>,
        channel_capacity: usize,
        idle_threshold: Duration,
        source_origine: String,
        idle_callback: impl Fn() + Send + 'static,
    ) -> Self {
        let (sender, mut receiver) = mpsc::channel(channel_capacity);

        let worker = tokio::spawn(async move {
            loop {
                match tokio::time::timeout(idle_threshold, receiver.recv()).await {
                    Ok(Some(item)) => {
                        if let Err(e) = process_item(&store, &taxonomy, extractor.as_ref(), &source_origine, item).await
                        {
                            tracing::warn!(error = %e, "real-time segment insert failed");
                        }
                    }
                    Ok(None) => break,
                    Err(_timeout_elapsed) => idle_callback(),
                }
            }
        });

        Self { sender, worker }
    }

    pub async fn submit(&self, item: RealtimeItem) -> std::result::Result<(), mpsc::error::SendError<RealtimeItem>> {
        self.sender.send(item).await
    }

    /// Stop accepting new items and wait up to `timeout` for the worker to
    /// drain in-flight work, mirroring `ScribeQueue.stop`'s `join(timeout=10)`.
    pub async fn stop(self, timeout: Duration) {
        drop(self.sender);
        let _ = tokio::time::timeout(timeout, self.worker).await;
    }
}

async fn process_item(
    store: &Arc<Store>,
    taxonomy: &Arc<Taxonomy>,
    extractor: &dyn Extractor,
    source_origine: &str,
    item: RealtimeItem,
) -> crate::store::Result<()> {
    let record = match extractor.extract(&item.text).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "real-time extraction failed, using defaults");
            crate::extract::ExtractedRecord::default()
        }
    };

    if !record.indexable {
        return Ok(());
    }

    // Real-time token_end is approximate — the exchange is still in
    // flight and its true extent isn't known yet.
    const REALTIME_TOKEN_SPAN_ESTIMATE: i64 = 100;

    let mut new_segment = NewSegment {
        timestamp: item.timestamp,
        token_start: item.token_start,
        token_end: item.token_start + REALTIME_TOKEN_SPAN_ESTIMATE,
        source_file: "realtime".to_string(),
        source_nature: "trace".to_string(),
        source_format: "txt".to_string(),
        source_origine: source_origine.to_string(),
        auteur: item.auteur,
        emotion_valence: record.emotion_valence,
        emotion_activation: record.emotion_activation,
        tags_roget: record.tags_roget,
        personnes: record.personnes,
        projets: record.projets,
        sujets: record.sujets,
        lieux: record.lieux,
        resume_texte: record.resume_texte,
        gr_id: record.gr_id,
        confidence_score: record.confidence_score,
        vector: Default::default(),
        extractor_version: env!("CARGO_PKG_VERSION").to_string(),
        extractor_model: "external".to_string(),
    };
    new_segment.vector = vector::generate_vector(&new_segment.as_segment_preview(), taxonomy);

    store.insert_segment(new_segment)?;
    Ok(())
}
