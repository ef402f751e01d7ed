//! Scenario 4 of the end-to-end suite: an empty metadata store falls back
//! to a raw fragment-file scan, each hit scored at the fixed fallback score.

use chrono::Utc;
use memoire_core::query_profile::QueryProfile;
use memoire_core::retriever::fallback::FALLBACK_SCORE;
use memoire_core::{fragment, Hermes};
use memoire_e2e_tests::{count_tokens, Harness};

#[test]
fn empty_metadata_falls_back_to_raw_text_scan() {
    let harness = Harness::new();

    fragment::write_fragment(
        &harness.fragments_root(),
        "[2025-01-01T10:00:00Z] bonjour\nune note sur le pipeline de build",
        Utc::now(),
        count_tokens,
    )
    .expect("write fragment");

    let hermes = Hermes::new(harness.store.clone(), harness.fragments_root());
    let profile = QueryProfile::default();
    let result = hermes.run("pipeline", &profile).expect("search");

    assert!(result.used_fallback);
    assert!(result.candidates.is_empty());
    assert!(!result.fallback_hits.is_empty());
    for hit in &result.fallback_hits {
        assert_eq!(hit.score, FALLBACK_SCORE);
    }
}
