//! Phase C — Injection: the "memory short-circuit" that lets the system
//! notice its own coherence work. Summarizes Phase A/B results into
//! `iris_internal` segments and the Mnémosyne notes file. Grounded in
//! `mnemosyne_modules/injection.py::Injection`.

use std::path::Path;

use crate::coherence::rectification::{Correction, RectificationResult};
use crate::coherence::reflexion::{PilierPropose, ReflexionResult, Trajectoire};
use crate::notes;
use crate::sbire::Sbire;

#[derive(Debug, Clone, Default)]
pub struct InjectionResult {
    pub injections: usize,
    pub segments_internes: usize,
    pub notes_fichier: usize,
    pub erreurs: Vec<String>,
}

/// Injects a summary of detected corrections and trajectories as
/// `iris_internal` segments, then appends a session entry to the notes
/// file. Mirrors `Injection.process`.
pub fn inject(
    sbire: &Sbire,
    notes_path: &Path,
    corrections: &[Correction],
    rectification: &RectificationResult,
    trajectoires: &[Trajectoire],
    piliers: &[PilierPropose],
    reflexion: &ReflexionResult,
    dry_run: bool,
) -> InjectionResult {
    let mut result = InjectionResult::default();

    if !corrections.is_empty() {
        inject_corrections_summary(sbire, corrections, dry_run, &mut result);
    }
    if !trajectoires.is_empty() {
        inject_trajectoires_summary(sbire, trajectoires, dry_run, &mut result);
    }

    if !corrections.is_empty() || !trajectoires.is_empty() {
        let entry = notes::format_session_entry(
            chrono::Utc::now(),
            &corrections.iter().map(|c| c.nouveau_fait.clone()).collect::<Vec<_>>(),
            &trajectoires.iter().map(|t| (t.ancien_concept.clone(), t.nouveau_concept.clone())).collect::<Vec<_>>(),
            &piliers.iter().map(|p| (p.categorie.to_string(), p.fait.clone())).collect::<Vec<_>>(),
        );
        if dry_run {
            tracing::info!(entry = %entry, "dry run: would append notes session entry");
            result.notes_fichier += 1;
        } else {
            match notes::append_session_entry(notes_path, &entry) {
                Ok(()) => {
                    result.notes_fichier += 1;
                    result.injections += 1;
                }
                Err(e) => result.erreurs.push(format!("notes file: {e}")),
            }
        }
    }

    let _ = rectification;
    let _ = reflexion;
    result
}

fn inject_corrections_summary(sbire: &Sbire, corrections: &[Correction], dry_run: bool, result: &mut InjectionResult) {
    let mut summary = vec!["[Réflexion interne] Corrections mémorisées:".to_string()];
    for c in corrections.iter().take(5) {
        if c.ancien_fait.is_empty() {
            summary.push(format!("• Fait confirmé: '{}'", c.nouveau_fait));
        } else {
            summary.push(format!("• '{}' → '{}'", c.ancien_fait, c.nouveau_fait));
        }
    }

    match sbire.insert_segment_internal(summary.join("\n"), "mnemosyne_rectification", dry_run) {
        Ok(_) => {
            result.segments_internes += 1;
            result.injections += 1;
        }
        Err(e) => result.erreurs.push(format!("insert_segment_internal: {e}")),
    }
}

fn inject_trajectoires_summary(sbire: &Sbire, trajectoires: &[Trajectoire], dry_run: bool, result: &mut InjectionResult) {
    let mut summary = vec!["[Réflexion interne] Évolutions de pensée observées:".to_string()];
    for t in trajectoires.iter().take(5) {
        summary.push(format!("• [{}] {} → {}", t.type_evolution, t.ancien_concept, t.nouveau_concept));
    }

    match sbire.insert_segment_internal(summary.join("\n"), "mnemosyne_reflexion", dry_run) {
        Ok(_) => {
            result.segments_internes += 1;
            result.injections += 1;
        }
        Err(e) => result.erreurs.push(format!("insert_segment_internal: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sbire() -> (Sbire, tempfile::TempDir) {
        let store = Arc::new(crate::store::Store::open_in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();
        (Sbire::new(store, dir.path().to_path_buf()), dir)
    }

    #[test]
    fn inject_writes_notes_and_internal_segments() {
        let (sbire, dir) = sbire();
        let notes_path = dir.path().join("notes.md");
        let correction = Correction { nouveau_fait: "le 9 mai".to_string(), ..Default::default() };

        let result = inject(
            &sbire,
            &notes_path,
            &[correction],
            &RectificationResult::default(),
            &[],
            &[],
            &ReflexionResult::default(),
            false,
        );

        assert_eq!(result.segments_internes, 1);
        assert!(notes_path.exists());
    }

    #[test]
    fn dry_run_skips_segment_insertion() {
        let (sbire, dir) = sbire();
        let notes_path = dir.path().join("notes.md");
        let correction = Correction { nouveau_fait: "fait".to_string(), ..Default::default() };

        let result = inject(
            &sbire,
            &notes_path,
            &[correction],
            &RectificationResult::default(),
            &[],
            &[],
            &ReflexionResult::default(),
            true,
        );

        assert_eq!(result.segments_internes, 0);
        assert!(!notes_path.exists());
    }
}
