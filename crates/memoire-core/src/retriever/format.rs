//! Context formatting — renders scored candidates into the block of text
//! injected into the Agent's prompt. Ported from `core.py::_format_context`,
//! swapping the character-count budget for a `tiktoken-rs` token count so
//! the same counter the Indexer uses also governs retrieval-side budgets.

use tiktoken_rs::CoreBPE;

use crate::retriever::ScoredCandidate;

const HEADER: &str = "--- CONTEXTE MÉMOIRE ---\n";
const FOOTER: &str = "\n--- FIN CONTEXTE ---\n";
const TRUNCATION_MARKER: &str = "\n[... contexte tronqué ...]\n";

/// Render candidates into an LLM-ready context block, stopping before the
/// running token count would exceed `token_budget`.
pub fn format_for_llm(candidates: &[ScoredCandidate], token_budget: usize, bpe: &CoreBPE) -> String {
    if candidates.is_empty() {
        return String::new();
    }

    let mut out = String::from(HEADER);
    let mut tokens_used = bpe.encode_ordinary(HEADER).len();

    for (i, candidate) in candidates.iter().enumerate() {
        let block = render_block(i + 1, candidate);
        let block_tokens = bpe.encode_ordinary(&block).len();
        if tokens_used + block_tokens > token_budget {
            out.push_str(TRUNCATION_MARKER);
            break;
        }
        out.push_str(&block);
        tokens_used += block_tokens;
    }

    out.push_str(FOOTER);
    out
}

fn render_block(index: usize, candidate: &ScoredCandidate) -> String {
    let segment = &candidate.segment;
    let date = segment.timestamp.format("%Y-%m-%d");
    let gr_info = segment.gr_id.map(|id| format!("bloc:{id}")).unwrap_or_default();
    let conf_info = format!("conf:{:.2}", segment.confidence_score);

    let mut block = format!("\n[Mémoire {index}] {date} | {gr_info} {conf_info} | Score: {:.2}\n", candidate.score);

    if !segment.personnes.is_empty() {
        block.push_str(&format!("Personnes: {}\n", segment.personnes.join(", ")));
    }
    if !segment.resume_texte.is_empty() {
        block.push_str(&format!("Résumé: {}\n", segment.resume_texte));
    }

    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Auteur, SparseVector, TruthStatus};
    use chrono::Utc;

    fn candidate(resume: &str, score: f64) -> ScoredCandidate {
        ScoredCandidate {
            segment: crate::model::Segment {
                id: 1,
                timestamp: Utc::now(),
                timestamp_epoch: 0,
                token_start: 0,
                token_end: 1,
                source_file: "f".into(),
                source_nature: "trace".into(),
                source_format: "txt".into(),
                source_origine: "test".into(),
                auteur: Auteur::Human,
                emotion_valence: 0.0,
                emotion_activation: 0.0,
                tags_roget: vec![],
                personnes: vec![],
                projets: vec![],
                sujets: vec![],
                lieux: vec![],
                resume_texte: resume.into(),
                gr_id: None,
                confidence_score: 0.8,
                statut_verite: TruthStatus::Unknown,
                vector: SparseVector::new(),
                extractor_version: "v".into(),
                extractor_model: "m".into(),
                created_at: Utc::now(),
            },
            score,
            breakdown: None,
        }
    }

    #[test]
    fn empty_candidates_yields_empty_string() {
        let bpe = tiktoken_rs::cl100k_base().unwrap();
        assert_eq!(format_for_llm(&[], 1000, &bpe), "");
    }

    #[test]
    fn includes_header_and_footer() {
        let bpe = tiktoken_rs::cl100k_base().unwrap();
        let rendered = format_for_llm(&[candidate("bonjour le monde", 0.9)], 1000, &bpe);
        assert!(rendered.starts_with("--- CONTEXTE"));
        assert!(rendered.trim_end().ends_with("FIN CONTEXTE ---"));
    }

    #[test]
    fn truncates_when_budget_exceeded() {
        let bpe = tiktoken_rs::cl100k_base().unwrap();
        let many: Vec<ScoredCandidate> = (0..50).map(|_| candidate(&"mot ".repeat(100), 0.5)).collect();
        let rendered = format_for_llm(&many, 50, &bpe);
        assert!(rendered.contains("tronqué"));
    }
}
