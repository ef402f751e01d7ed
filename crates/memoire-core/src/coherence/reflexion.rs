//! Phase B — Reflection: weave trajectories of thought (not errors) and
//! propose consolidated piliers. Grounded in
//! `mnemosyne_modules/reflexion.py::Reflexion`.

use async_trait::async_trait;

use crate::model::{EdgeType, PilierCategory};
use crate::sbire::{Mandat, Sbire, MandatHit};

const TRAJECTOIRE_MIN_LEN: usize = 500;
const PILIER_MIN_LEN: usize = 1000;

#[derive(Debug, Clone, Default)]
pub struct Trajectoire {
    pub ancien_concept: String,
    pub nouveau_concept: String,
    pub type_evolution: EdgeType,
    pub description: String,
    pub confidence: f64,
    pub source_id: Option<i64>,
    pub target_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct PilierPropose {
    pub fait: String,
    pub categorie: PilierCategory,
    pub importance: i32,
    pub raison: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReflexionResult {
    pub trajectoires_detectees: usize,
    pub liens_crees: usize,
    pub piliers_proposes: usize,
    pub erreurs: Vec<String>,
}

/// Detects evolutions of thought in text — a change of approach or
/// perspective, never a factual error. Mirrors `_detect_trajectoires`'s
/// 500-char content gate.
#[async_trait]
pub trait TrajectoryDetector: Send + Sync {
    async fn detect(&self, content: &str) -> Vec<Trajectoire>;
}

/// Proposes piliers (stable, important facts worth crystallizing) from
/// text. Mirrors `_propose_piliers`'s 1000-char content gate.
#[async_trait]
pub trait PilierProposer: Send + Sync {
    async fn propose(&self, content: &str, trajectoires: &[Trajectoire]) -> Vec<PilierPropose>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoneTrajectoryDetector;

#[async_trait]
impl TrajectoryDetector for NoneTrajectoryDetector {
    async fn detect(&self, content: &str) -> Vec<Trajectoire> {
        if content.chars().count() < TRAJECTOIRE_MIN_LEN {
            return Vec::new();
        }
        Vec::new()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NonePilierProposer;

#[async_trait]
impl PilierProposer for NonePilierProposer {
    async fn propose(&self, content: &str, _trajectoires: &[Trajectoire]) -> Vec<PilierPropose> {
        if content.chars().count() < PILIER_MIN_LEN {
            return Vec::new();
        }
        Vec::new()
    }
}

/// Finds the two endpoints of a trajectory in memory and, when both are
/// found and distinct, creates an edge of the trajectory's evolution type.
/// Mirrors `_weave_trajectories`.
pub fn weave_trajectories(sbire: &Sbire, trajectoires: &mut [Trajectoire], dry_run: bool, result: &mut ReflexionResult) {
    for traj in trajectoires.iter_mut() {
        let ancien = search_concept(sbire, &traj.ancien_concept);
        let nouveau = search_concept(sbire, &traj.nouveau_concept);

        let (Some(source_id), Some(target_id)) = (first_segment_id(&ancien), first_segment_id(&nouveau)) else {
            continue;
        };
        if source_id == target_id {
            continue;
        }

        traj.source_id = Some(source_id);
        traj.target_id = Some(target_id);

        let metadata = serde_json::to_string(&serde_json::json!({
            "description": traj.description.chars().take(200).collect::<String>(),
            "confidence": traj.confidence,
            "source": "mnemosyne_reflexion",
        }))
        .ok();

        match sbire.insert_edge(source_id, target_id, traj.type_evolution, metadata, traj.confidence, dry_run) {
            Ok(_) => result.liens_crees += 1,
            Err(e) => result.erreurs.push(format!("insert_edge: {e}")),
        }
    }
}

/// Word2Vec-then-Sql fallback for locating a concept in memory. Mirrors
/// `_search_concept`.
fn search_concept(sbire: &Sbire, concept: &str) -> Vec<MandatHit> {
    if concept.is_empty() {
        return Vec::new();
    }
    let word2vec_hits = sbire
        .execute(&Mandat::Word2Vec { query: concept.to_string(), max: 10 })
        .unwrap_or_default();
    if !word2vec_hits.is_empty() {
        return word2vec_hits;
    }

    let query = concept.split_whitespace().next().unwrap_or(concept).to_string();
    sbire.execute(&Mandat::Sql { query, max: 10 }).unwrap_or_default()
}

fn first_segment_id(hits: &[MandatHit]) -> Option<i64> {
    hits.iter().find_map(|hit| match hit {
        MandatHit::Segment(segment) => Some(segment.id),
        MandatHit::Grep { .. } => None,
    })
}

/// Inserts each proposed pilier via [`Sbire::insert_pilier`]. Importance is
/// carried through unclamped — the data model allows `0..=3`, unlike the
/// original's `1..=3` UI clamp.
pub fn crystallize_piliers(sbire: &Sbire, piliers: &[PilierPropose], dry_run: bool, result: &mut ReflexionResult) {
    for p in piliers {
        match sbire.insert_pilier(p.categorie, p.importance.clamp(0, 3) as u8, p.fait.clone(), None, dry_run) {
            Ok(_) => {}
            Err(e) => result.erreurs.push(format!("insert_pilier: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn detector_gates_below_500_chars() {
        let detector = NoneTrajectoryDetector;
        assert!(detector.detect("trop court").await.is_empty());
    }

    #[tokio::test]
    async fn proposer_gates_below_1000_chars() {
        let proposer = NonePilierProposer;
        assert!(proposer.propose(&"mot ".repeat(10), &[]).await.is_empty());
    }

    #[test]
    fn first_segment_id_skips_grep_hits() {
        let hits = vec![MandatHit::Grep {
            file: "f".into(),
            line_no: 1,
            token_start: None,
            content: "c".into(),
            matched_text: "m".into(),
        }];
        assert_eq!(first_segment_id(&hits), None);
    }
}
