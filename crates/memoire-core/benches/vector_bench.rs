//! Benchmarks for the Retriever's per-candidate scoring path.
//! Run with: cargo bench -p memoire-core

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use memoire_core::model::{Auteur, Segment, SparseVector, TruthStatus};
use memoire_core::query_profile::QueryProfile;
use memoire_core::retriever::mask::{calculate_resonance, generate_mask};
use memoire_core::retriever::parse::parse_query;
use memoire_core::retriever::scoring::{
    combine, score_emotion, score_personnes, score_resume, score_roget, score_temporal, score_trildasa, ScoreBreakdown, ScoringWeights,
};
use memoire_core::taxonomy::prox;

fn sample_segment() -> Segment {
    let mut vector = SparseVector::new();
    vector.insert(1, 0.4);
    vector.insert(2, 0.2);
    vector.insert(61, 0.8);

    Segment {
        id: 1,
        timestamp: Utc::now(),
        timestamp_epoch: 0,
        token_start: 0,
        token_end: 200,
        source_file: "2026/07/28.frag".into(),
        source_nature: "conversation".into(),
        source_format: "txt".into(),
        source_origine: "bench".into(),
        auteur: Auteur::Human,
        emotion_valence: 0.4,
        emotion_activation: 0.2,
        tags_roget: vec!["03-0210-0040".to_string()],
        personnes: vec!["Alice".to_string()],
        projets: vec!["memoire".to_string()],
        sujets: vec!["rust".to_string(), "projet".to_string()],
        lieux: vec![],
        resume_texte: "discussion sur le projet rust de la semaine dernière".to_string(),
        gr_id: None,
        confidence_score: 0.9,
        statut_verite: TruthStatus::Validated,
        vector,
        extractor_version: "v1".into(),
        extractor_model: "bench".into(),
        created_at: Utc::now(),
    }
}

fn bench_parse_query(c: &mut Criterion) {
    c.bench_function("parse_query", |b| {
        b.iter(|| black_box(parse_query("le projet rust de la semaine dernière avec Alice")));
    });
}

fn bench_prox(c: &mut Criterion) {
    c.bench_function("taxonomy_prox", |b| {
        b.iter(|| black_box(prox("03-0210-0040", "03-0210-0055")));
    });
}

fn bench_resonance(c: &mut Criterion) {
    let profile = QueryProfile::default();
    let mask = generate_mask(&profile);
    let segment = sample_segment();

    c.bench_function("calculate_resonance", |b| {
        b.iter(|| black_box(calculate_resonance(&segment.vector, &mask)));
    });
}

fn bench_score_candidate(c: &mut Criterion) {
    let query = parse_query("le projet rust de la semaine dernière avec Alice");
    let segment = sample_segment();
    let profile = QueryProfile::default();
    let mask = generate_mask(&profile);
    let weights = ScoringWeights::default();
    let now = Utc::now();

    c.bench_function("score_candidate_full", |b| {
        b.iter(|| {
            let breakdown = ScoreBreakdown {
                roget: score_roget(&query, &segment),
                emotion: score_emotion(&query, &segment),
                temporal: score_temporal(now, &segment),
                personnes: score_personnes(&query, &segment),
                resume: score_resume(&query, &segment),
                trildasa: score_trildasa(&mask, &segment),
            };
            black_box(combine(&weights, &breakdown));
        })
    });
}

criterion_group!(benches, bench_parse_query, bench_prox, bench_resonance, bench_score_candidate);
criterion_main!(benches);
