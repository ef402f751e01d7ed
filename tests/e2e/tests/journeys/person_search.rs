//! Scenario 3 of the end-to-end suite: three segments mention "Christian
//! Gagné" under varying spellings; a free-text query naming him should
//! surface all three with a strong person-match score.

use chrono::Utc;
use memoire_core::query_profile::QueryProfile;
use memoire_core::Hermes;
use memoire_e2e_tests::{new_segment, Harness};

#[test]
fn all_three_spellings_surface_with_strong_person_score() {
    let harness = Harness::new();

    let spellings = ["Christian Gagné", "Christian GAGNE", "christian gagne"];
    for (i, name) in spellings.iter().enumerate() {
        let seg = new_segment(
            Utc::now() - chrono::Duration::days(i as i64),
            &format!("réunion de projet avec {name}"),
            vec![name.to_string()],
        );
        harness.store.insert_segment(seg).expect("insert segment");
    }

    let hermes = Hermes::new(harness.store.clone(), harness.fragments_root());
    let profile = QueryProfile::default();
    let result = hermes.run("Qui travaillait avec Christian Gagne?", &profile).expect("search");

    assert_eq!(result.candidates.len(), 3);
    for candidate in &result.candidates {
        let breakdown = candidate.breakdown.as_ref().expect("metadata candidates carry a breakdown");
        assert!(
            breakdown.personnes >= 0.75,
            "expected score_personnes >= 0.75, got {}",
            breakdown.personnes
        );
    }
}
