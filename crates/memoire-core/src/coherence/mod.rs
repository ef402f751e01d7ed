//! Coherence Agent ("Mnémosyne") — orchestrates the three post-indexing
//! passes over a just-processed source: rectify factual errors, weave
//! trajectories of thought, and inject the results back into memory so the
//! system can notice its own reasoning. Grounded in `mnemosyne.py`.

pub mod injection;
pub mod rectification;
pub mod reflexion;

use std::path::{Path, PathBuf};

use crate::model::Segment;
use crate::sbire::Sbire;

use rectification::{ContradictionJudge, CorrectionDetector, NoneContradictionJudge, RegexCorrectionDetector};
use reflexion::{NonePilierProposer, NoneTrajectoryDetector, PilierProposer, TrajectoryDetector};

/// Which passes a [`Mnemosyne::run`] call performs. Mirrors the original's
/// `--mode` CLI flag: a nightly batch normally runs `Complet`, but either
/// phase can be run in isolation for testing or a lighter-weight pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoherenceMode {
    Rectification,
    Reflexion,
    #[default]
    Complet,
}

#[derive(Debug, Clone, Default)]
pub struct CoherenceResult {
    pub corrections_detected: usize,
    pub segments_rectified: usize,
    pub liens_crees: usize,
    pub piliers_proposes: usize,
    pub erreurs: Vec<String>,
}

/// Single-threaded orchestrator owning one [`Sbire`], borrowed sequentially
/// by each phase. Collaborators default to the always-available
/// regex/none implementations; an LLM-backed build can substitute its own
/// [`CorrectionDetector`]/[`ContradictionJudge`]/[`TrajectoryDetector`]/
/// [`PilierProposer`].
pub struct Mnemosyne {
    sbire: Sbire,
    notes_path: PathBuf,
    correction_detector: Box<dyn CorrectionDetector>,
    contradiction_judge: Box<dyn ContradictionJudge>,
    trajectory_detector: Box<dyn TrajectoryDetector>,
    pilier_proposer: Box<dyn PilierProposer>,
    dry_run: bool,
    max_iterations: usize,
}

impl Mnemosyne {
    pub fn new(sbire: Sbire, notes_path: PathBuf, dry_run: bool) -> Self {
        Self {
            sbire,
            notes_path,
            correction_detector: Box::new(RegexCorrectionDetector),
            contradiction_judge: Box::new(NoneContradictionJudge),
            trajectory_detector: Box::new(NoneTrajectoryDetector),
            pilier_proposer: Box::new(NonePilierProposer),
            dry_run,
            max_iterations: rectification::DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_collaborators(
        sbire: Sbire,
        notes_path: PathBuf,
        dry_run: bool,
        correction_detector: Box<dyn CorrectionDetector>,
        contradiction_judge: Box<dyn ContradictionJudge>,
        trajectory_detector: Box<dyn TrajectoryDetector>,
        pilier_proposer: Box<dyn PilierProposer>,
    ) -> Self {
        Self {
            sbire,
            notes_path,
            correction_detector,
            contradiction_judge,
            trajectory_detector,
            pilier_proposer,
            dry_run,
            max_iterations: rectification::DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Overrides the per-correction mandate-escalation cap (`--max-iterations`
    /// on the agent CLI); the original's batch default is
    /// [`rectification::DEFAULT_MAX_ITERATIONS`].
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Runs Phase A to completion, then Phase B, then Phase C — the
    /// ordering is structural, not configurable, matching spec.md §5's
    /// "phase A runs to completion before phase B; injections happen
    /// last." `mode` skips whichever phase(s) the caller didn't ask for;
    /// injection only summarizes the phases that actually ran.
    pub async fn run(&self, content: &str, _segments: &[Segment], mode: CoherenceMode) -> CoherenceResult {
        let mut result = CoherenceResult::default();

        let run_rectification = mode == CoherenceMode::Rectification || mode == CoherenceMode::Complet;
        let run_reflexion = mode == CoherenceMode::Reflexion || mode == CoherenceMode::Complet;

        let corrections = if run_rectification { self.correction_detector.detect(content).await } else { Vec::new() };
        result.corrections_detected = corrections.len();

        let mut rectification_result = rectification::RectificationResult::default();
        for correction in &corrections {
            rectification::process_correction(
                &self.sbire,
                self.contradiction_judge.as_ref(),
                correction,
                self.dry_run,
                self.max_iterations,
                &mut rectification_result,
            )
            .await;
        }
        result.segments_rectified = rectification_result.segments_rectifies;
        result.liens_crees += rectification_result.liens_crees;
        result.erreurs.extend(rectification_result.erreurs.clone());

        let mut trajectoires = if run_reflexion { self.trajectory_detector.detect(content).await } else { Vec::new() };
        let mut reflexion_result = reflexion::ReflexionResult::default();
        reflexion_result.trajectoires_detectees = trajectoires.len();
        if !trajectoires.is_empty() {
            reflexion::weave_trajectories(&self.sbire, &mut trajectoires, self.dry_run, &mut reflexion_result);
        }

        let piliers = if run_reflexion { self.pilier_proposer.propose(content, &trajectoires).await } else { Vec::new() };
        reflexion_result.piliers_proposes = piliers.len();
        if !piliers.is_empty() {
            reflexion::crystallize_piliers(&self.sbire, &piliers, self.dry_run, &mut reflexion_result);
        }

        result.piliers_proposes = reflexion_result.piliers_proposes;
        result.liens_crees += reflexion_result.liens_crees;
        result.erreurs.extend(reflexion_result.erreurs.clone());

        let injection_result = injection::inject(
            &self.sbire,
            &self.notes_path,
            &corrections,
            &rectification_result,
            &trajectoires,
            &piliers,
            &reflexion_result,
            self.dry_run,
        );
        result.erreurs.extend(injection_result.erreurs);

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn notes_path(dir: &Path) -> PathBuf {
        dir.join("mnemosyne_notes.md")
    }

    #[tokio::test]
    async fn run_detects_correction_and_injects_summary() {
        let store = Arc::new(crate::store::Store::open_in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();
        let sbire = Sbire::new(store, dir.path().to_path_buf());
        let mnemosyne = Mnemosyne::new(sbire, notes_path(dir.path()), false);

        let result = mnemosyne.run("Non, c'est le 9 mai que ça s'est passé.", &[], CoherenceMode::Complet).await;

        assert_eq!(result.corrections_detected, 1);
        assert!(notes_path(dir.path()).exists());
    }

    #[tokio::test]
    async fn run_with_no_findings_is_a_noop() {
        let store = Arc::new(crate::store::Store::open_in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();
        let sbire = Sbire::new(store, dir.path().to_path_buf());
        let mnemosyne = Mnemosyne::new(sbire, notes_path(dir.path()), false);

        let result = mnemosyne.run("une conversation tout à fait banale", &[], CoherenceMode::Complet).await;

        assert_eq!(result.corrections_detected, 0);
        assert_eq!(result.piliers_proposes, 0);
        assert!(!notes_path(dir.path()).exists());
    }

    #[tokio::test]
    async fn reflexion_mode_skips_correction_detection() {
        let store = Arc::new(crate::store::Store::open_in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();
        let sbire = Sbire::new(store, dir.path().to_path_buf());
        let mnemosyne = Mnemosyne::new(sbire, notes_path(dir.path()), false);

        let result = mnemosyne
            .run("Non, c'est le 9 mai que ça s'est passé.", &[], CoherenceMode::Reflexion)
            .await;

        assert_eq!(result.corrections_detected, 0);
    }
}
