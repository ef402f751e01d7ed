//! Phase A — Rectification: detect explicit factual corrections in a
//! conversation and mark the superseded segments. Grounded in
//! `mnemosyne_modules/rectification.py::Rectification`.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::model::EdgeType;
use crate::sbire::{Mandat, Sbire, SbireError};

/// Regex battery for explicit corrections, ported verbatim (minus Python's
/// named-group syntax) from `rectification.py::CORRECTION_PATTERNS`.
pub static CORRECTION_PATTERNS: LazyLock<[Regex; 8]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)non[,\s]+c'est\s+(.+?)(?:\.|$)").unwrap(),
        Regex::new(r"(?i)en fait[,\s]+c'est\s+(.+?)(?:\.|$)").unwrap(),
        Regex::new(r"(?i)correction\s*:\s*(.+?)(?:\.|$)").unwrap(),
        Regex::new(r"(?i)la (?:vraie|bonne) (?:date|réponse|info)\s+(?:est|c'est)\s+(.+?)(?:\.|$)").unwrap(),
        Regex::new(r"(?i)(?:tu|vous)\s+(?:te|vous)\s+trompe[sz]?\s*[,:]?\s*(.+?)(?:\.|$)").unwrap(),
        Regex::new(r"(?i)c'est\s+(?:pas|plus)\s+(.+?)\s*[,;]\s*c'est\s+(.+?)(?:\.|$)").unwrap(),
        Regex::new(r"(?i)(?:ce n'est|c'est) pas\s+(.+?)\s*[,;]\s*(?:mais|c'est)\s+(.+?)(?:\.|$)").unwrap(),
        Regex::new(r"(?i)oublie\s+(.+?)\s*[,;]\s*(?:c'est|utilise)\s+(.+?)(?:\.|$)").unwrap(),
    ]
});

static STOPWORDS: &[&str] = &["est", "sont", "était", "cette", "pour", "dans", "avec", "plus", "fait"];

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w{4,}\b").unwrap());
static WORD3: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w{3,}\b").unwrap());

#[derive(Debug, Clone, Default)]
pub struct Correction {
    pub ancien_fait: String,
    pub nouveau_fait: String,
    pub confidence: f64,
    pub source_line: usize,
    pub contexte: String,
    pub segment_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct RectificationResult {
    pub corrections_detectees: usize,
    pub segments_rectifies: usize,
    pub liens_crees: usize,
    pub mandats_executes: usize,
    pub erreurs: Vec<String>,
}

/// Detects [`Correction`]s in raw text. `RegexCorrectionDetector` runs
/// [`CORRECTION_PATTERNS`] and is always available; an LLM-backed
/// implementation can augment it for subtler cases the regex battery
/// misses, mirroring `_detect_with_gemini`.
#[async_trait]
pub trait CorrectionDetector: Send + Sync {
    async fn detect(&self, content: &str) -> Vec<Correction>;
}

/// Judges which candidate segments contradict a given correction, mirroring
/// `_find_contradictions`'s Gemini call. A judge that finds nothing
/// contradictory should return an empty vec rather than erroring.
#[async_trait]
pub trait ContradictionJudge: Send + Sync {
    async fn judge(&self, correction: &Correction, candidates: &[crate::model::Segment]) -> Vec<i64>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RegexCorrectionDetector;

#[async_trait]
impl CorrectionDetector for RegexCorrectionDetector {
    async fn detect(&self, content: &str) -> Vec<Correction> {
        detect_regex_corrections(content)
    }
}

fn detect_regex_corrections(content: &str) -> Vec<Correction> {
    let mut corrections = Vec::new();
    for (line_no, line) in content.split('\n').enumerate() {
        for pattern in CORRECTION_PATTERNS.iter() {
            let Some(caps) = pattern.captures(line) else { continue };
            let groups: Vec<&str> = caps.iter().skip(1).filter_map(|m| m.map(|m| m.as_str())).collect();

            let (ancien, nouveau) = if groups.len() >= 2 {
                (groups[0].trim().to_string(), groups[1].trim().to_string())
            } else {
                (String::new(), groups.first().map(|s| s.trim().to_string()).unwrap_or_default())
            };

            if nouveau.len() > 3 {
                corrections.push(Correction {
                    ancien_fait: ancien,
                    nouveau_fait: nouveau,
                    source_line: line_no + 1,
                    contexte: line.chars().take(300).collect(),
                    confidence: 0.7,
                    segment_id: None,
                });
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    corrections.retain(|c| {
        let key: String = c.nouveau_fait.to_lowercase().chars().take(50).collect();
        seen.insert(key)
    });
    corrections
}

const MAX_TOTAL_RESULTS: usize = 20;
const FRUITLESS_ITERATION_THRESHOLD: usize = 2;
pub const DEFAULT_MAX_ITERATIONS: usize = 6;

/// Runs the per-correction bounded mandate escalation loop, then rectifies
/// any confirmed contradictions. Mirrors `_process_correction` +
/// `_rectify_errors`. `max_iterations` caps the mandate-escalation loop
/// (`--max-iterations` on the agent CLI); pass [`DEFAULT_MAX_ITERATIONS`]
/// for the original's batch default.
pub async fn process_correction(
    sbire: &Sbire,
    judge: &dyn ContradictionJudge,
    correction: &Correction,
    dry_run: bool,
    max_iterations: usize,
    result: &mut RectificationResult,
) {
    let mut mandat = generate_mandat(correction);
    let mut all_results = Vec::new();

    for iteration in 1..=max_iterations {
        let hits = match sbire.execute(&mandat) {
            Ok(hits) => hits,
            Err(e) => {
                result.erreurs.push(format!("mandat execution: {e}"));
                Vec::new()
            }
        };
        result.mandats_executes += 1;
        let hit_count = hits.len();
        all_results.extend(hits);

        if all_results.len() >= MAX_TOTAL_RESULTS {
            break;
        }
        if hit_count == 0 && iteration > FRUITLESS_ITERATION_THRESHOLD {
            break;
        }
        if hit_count < 5 {
            mandat = refine_mandat(&mandat, hit_count, correction, iteration);
        }
    }

    if all_results.is_empty() {
        return;
    }

    let candidates: Vec<crate::model::Segment> = all_results
        .into_iter()
        .filter_map(|hit| match hit {
            crate::sbire::MandatHit::Segment(segment) if segment.statut_verite != crate::model::TruthStatus::Refuted => Some(segment),
            _ => None,
        })
        .take(20)
        .collect();

    if candidates.is_empty() {
        return;
    }

    let contradiction_ids = judge.judge(correction, &candidates).await;

    for segment_id in contradiction_ids {
        match sbire.update_statut_verite(segment_id, crate::model::TruthStatus::Refuted, dry_run) {
            Ok(()) => {
                result.segments_rectifies += 1;
                if let Some(source_id) = correction.segment_id {
                    let metadata = serde_json::to_string(&serde_json::json!({
                        "raison": correction.nouveau_fait.chars().take(100).collect::<String>(),
                    }))
                    .ok();
                    match sbire.insert_edge(segment_id, source_id, EdgeType::CorrigePar, metadata, 1.0, dry_run) {
                        Ok(_) => result.liens_crees += 1,
                        Err(e) => result.erreurs.push(format!("insert_edge: {e}")),
                    }
                }
            }
            Err(e) => result.erreurs.push(format!("update_statut_verite: {e}")),
        }
    }
}

fn generate_mandat(correction: &Correction) -> Mandat {
    let text = format!("{} {}", correction.nouveau_fait, correction.ancien_fait).to_lowercase();
    let keywords: Vec<&str> = WORD.find_iter(&text).map(|m| m.as_str()).filter(|k| !STOPWORDS.contains(k)).collect();

    match keywords.first() {
        Some(first) => Mandat::Sql { query: first.to_string(), max: 20 },
        None => Mandat::Grep {
            pattern: correction.nouveau_fait.chars().take(30).collect::<String>().replace(' ', "\\s+"),
            max: 20,
        },
    }
}

fn refine_mandat(old: &Mandat, last_hit_count: usize, correction: &Correction, iteration: usize) -> Mandat {
    if let Mandat::Sql { query, max } = old {
        if last_hit_count == 0 {
            return Mandat::Word2Vec { query: query.clone(), max: *max };
        }
    }
    if let Mandat::Word2Vec { max, .. } = old {
        if last_hit_count == 0 {
            let keywords: Vec<&str> = WORD3.find_iter(&correction.nouveau_fait.to_lowercase()).map(|m| m.as_str()).take(3).collect();
            if !keywords.is_empty() {
                return Mandat::Grep { pattern: keywords.join("|"), max: *max };
            }
        }
    }
    if !correction.ancien_fait.is_empty() && iteration < 5 {
        let query = correction.ancien_fait.split_whitespace().next().unwrap_or_default().to_string();
        if !query.is_empty() {
            return Mandat::Sql { query, max: 20 };
        }
    }
    old.clone()
}

/// Always-empty judge, used when no LLM collaborator is configured — every
/// correction is detected but nothing is ever rectified without one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoneContradictionJudge;

#[async_trait]
impl ContradictionJudge for NoneContradictionJudge {
    async fn judge(&self, _correction: &Correction, _candidates: &[crate::model::Segment]) -> Vec<i64> {
        Vec::new()
    }
}

pub type Result<T> = std::result::Result<T, SbireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn detects_explicit_correction() {
        let detector = RegexCorrectionDetector;
        let corrections = detector.detect("Non, c'est le 9 mai que ça s'est passé.").await;
        assert_eq!(corrections.len(), 1);
        assert!(corrections[0].nouveau_fait.contains("9 mai"));
    }

    #[tokio::test]
    async fn deduplicates_by_nouveau_fait() {
        let detector = RegexCorrectionDetector;
        let corrections = detector
            .detect("Non, c'est Paris.\nEn fait, c'est Paris.")
            .await;
        assert_eq!(corrections.len(), 1);
    }

    #[test]
    fn generate_mandat_prefers_sql_with_keyword() {
        let correction = Correction { nouveau_fait: "le rendez-vous".into(), ..Default::default() };
        match generate_mandat(&correction) {
            Mandat::Sql { query, .. } => assert_eq!(query, "rendez"),
            _ => panic!("expected Sql mandat"),
        }
    }

    #[test]
    fn generate_mandat_falls_back_to_grep_with_no_keywords() {
        let correction = Correction { nouveau_fait: "ok".into(), ..Default::default() };
        assert!(matches!(generate_mandat(&correction), Mandat::Grep { .. }));
    }

    #[tokio::test]
    async fn none_judge_confirms_nothing() {
        let judge = NoneContradictionJudge;
        assert!(judge.judge(&Correction::default(), &[]).await.is_empty());
    }
}
