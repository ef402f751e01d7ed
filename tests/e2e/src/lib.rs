//! Shared scaffolding for the journey tests: an in-memory store plus a
//! scratch fragments directory, and a couple of `NewSegment` builders for
//! the scenarios that need pre-existing corpus rows.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use memoire_core::{Auteur, NewSegment, SparseVector, Store};

pub struct Harness {
    pub store: Arc<Store>,
    pub fragments_dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(Store::open_in_memory().expect("in-memory store")),
            fragments_dir: tempfile::tempdir().expect("scratch fragments dir"),
        }
    }

    pub fn fragments_root(&self) -> std::path::PathBuf {
        self.fragments_dir.path().to_path_buf()
    }
}

/// A segment builder with reasonable defaults; override fields with `..`.
pub fn new_segment(timestamp: DateTime<Utc>, resume_texte: &str, personnes: Vec<String>) -> NewSegment {
    NewSegment {
        timestamp,
        token_start: 0,
        token_end: 10,
        source_file: "corpus.txt".into(),
        source_nature: "trace".into(),
        source_format: "txt".into(),
        source_origine: "test".into(),
        auteur: Auteur::Human,
        emotion_valence: 0.0,
        emotion_activation: 0.5,
        tags_roget: vec![],
        personnes,
        projets: vec![],
        sujets: vec![],
        lieux: vec![],
        resume_texte: resume_texte.to_string(),
        gr_id: None,
        confidence_score: 0.8,
        vector: SparseVector::new(),
        extractor_version: "test-1".into(),
        extractor_model: "test-model".into(),
    }
}

pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}
