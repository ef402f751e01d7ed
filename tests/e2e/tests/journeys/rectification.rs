//! Scenario 5 of the end-to-end suite: an explicit correction flips the
//! contradicted segment's truth status and links the two with a
//! `CORRIGE_PAR` edge.

use async_trait::async_trait;
use chrono::Utc;
use memoire_core::coherence::rectification::{Correction, ContradictionJudge, CorrectionDetector, RegexCorrectionDetector};
use memoire_core::{CoherenceMode, EdgeType, Mnemosyne, Sbire, TruthStatus};
use memoire_e2e_tests::{new_segment, Harness};

/// Confirms every candidate it's shown, standing in for the LLM judge the
/// original delegates this decision to.
struct ConfirmAll;

#[async_trait]
impl ContradictionJudge for ConfirmAll {
    async fn judge(&self, _correction: &Correction, candidates: &[memoire_core::Segment]) -> Vec<i64> {
        candidates.iter().map(|s| s.id).collect()
    }
}

/// Wraps the regex detector and stamps `segment_id` with the id of the
/// correcting turn itself — the original's regex path never does this,
/// only its LLM-backed `_detect_with_gemini` companion does, since only
/// that path has already resolved the correcting segment's own id.
struct TaggedCorrectionDetector {
    correcting_segment_id: i64,
}

#[async_trait]
impl CorrectionDetector for TaggedCorrectionDetector {
    async fn detect(&self, content: &str) -> Vec<Correction> {
        RegexCorrectionDetector
            .detect(content)
            .await
            .into_iter()
            .map(|mut c| {
                c.segment_id = Some(self.correcting_segment_id);
                c
            })
            .collect()
    }
}

#[tokio::test]
async fn correction_flips_truth_status_and_links_segments() {
    let harness = Harness::new();
    let prior = harness
        .store
        .insert_segment(new_segment(Utc::now() - chrono::Duration::days(1), "la date était en décembre", vec![]))
        .expect("insert prior segment");

    // Resume text deliberately doesn't repeat "décembre" so the mandate's
    // SQL search only turns up the prior segment, not this one.
    let correcting = harness
        .store
        .insert_segment(new_segment(Utc::now(), "note de correction apportée par l'utilisateur", vec![]))
        .expect("insert correcting segment");

    let correction_text = "Non, c'est le 9 mai, pas décembre.";

    let sbire = Sbire::new(harness.store.clone(), harness.fragments_root());
    let notes_path = harness.fragments_root().join("mnemosyne_notes.md");
    let mnemosyne = Mnemosyne::with_collaborators(
        sbire,
        notes_path,
        false,
        Box::new(TaggedCorrectionDetector { correcting_segment_id: correcting.id }),
        Box::new(ConfirmAll),
        Box::new(memoire_core::coherence::reflexion::NoneTrajectoryDetector),
        Box::new(memoire_core::coherence::reflexion::NonePilierProposer),
    );

    let result = mnemosyne.run(correction_text, &[], CoherenceMode::Complet).await;

    assert_eq!(result.corrections_detected, 1);
    assert_eq!(result.segments_rectified, 1);

    let rectified = harness.store.get_segment(prior.id).expect("fetch rectified segment");
    assert_eq!(rectified.statut_verite, TruthStatus::Refuted);

    let edges = harness.store.edges_for_segment(prior.id).expect("fetch edges");
    assert!(edges.iter().any(|e| e.source_id == prior.id && e.edge_type == EdgeType::CorrigePar));
}
