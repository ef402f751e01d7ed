//! Raw text-file fallback — when the candidate SQL query returns nothing,
//! scan fragment files directly for keyword occurrences instead of coming
//! back empty-handed. Ported from `search.py::search_in_directory`.

use std::path::Path;

use crate::fragment::{list_fragments, read_fragment_plain};
use crate::retriever::RetrieverError;

/// Score assigned to every fallback hit. The original hard-codes this exact
/// constant rather than computing anything relevance-weighted — kept as-is
/// since a fallback hit is a last resort, not a ranked result.
pub const FALLBACK_SCORE: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct FallbackHit {
    pub source_file: std::path::PathBuf,
    pub line_number: usize,
    pub content: String,
    pub score: f64,
}

/// Scan every fragment file under `root` for any of `keywords`
/// (case-insensitive substring match), newest file first.
pub fn scan_directory(root: &Path, keywords: &[String]) -> Result<Vec<FallbackHit>, RetrieverError> {
    if keywords.is_empty() {
        return Ok(Vec::new());
    }
    let lowered: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();

    let mut hits = Vec::new();
    for path in list_fragments(root)? {
        let content = read_fragment_plain(&path)?;
        for (i, line) in content.lines().enumerate() {
            let line_lower = line.to_lowercase();
            if lowered.iter().any(|kw| line_lower.contains(kw.as_str())) {
                hits.push(FallbackHit {
                    source_file: path.clone(),
                    line_number: i + 1,
                    content: line.to_string(),
                    score: FALLBACK_SCORE,
                });
            }
        }
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::write_fragment;
    use chrono::Utc;

    #[test]
    fn finds_keyword_across_fragments() {
        let dir = tempfile::tempdir().unwrap();
        write_fragment(dir.path(), "bonjour le monde\nun texte sur le projet rust", Utc::now(), |s| s.len()).unwrap();

        let hits = scan_directory(dir.path(), &["rust".to_string()]).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, FALLBACK_SCORE);
    }

    #[test]
    fn no_keywords_yields_no_hits() {
        let dir = tempfile::tempdir().unwrap();
        let hits = scan_directory(dir.path(), &[]).unwrap();
        assert!(hits.is_empty());
    }
}
