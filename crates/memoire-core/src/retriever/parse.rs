//! Query parsing — turns a free-text query into keywords, explicit tags,
//! person names, a date range, and a target emotion. Grounded in
//! `hermes_modules/core.py::run`'s call into `_parse_query` (the body of
//! `parsing.py` itself was filtered down to its import header in the
//! retrieval pack, so the keyword/person heuristics below are rebuilt from
//! how `core.py` and `scoring.py` consume `query_params`, plus the French
//! stopword filtering already grounded in `rectification.py`'s mandate
//! keyword selection).

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

/// Parsed shape of a free-text query, as consumed by `scoring.py::
/// _score_candidates` (`mots_cles`, `tags_explicites`, `personnes`) and
/// `core.py::run` (`date_debut`/`date_fin`, built separately from a
/// `QueryFilters::date_range_days`, not from the query text).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedQuery {
    pub keywords: Vec<String>,
    pub tags: Vec<String>,
    pub personnes: Vec<String>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub target_emotion: Option<(f64, f64)>,
}

static TAG_SHAPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{2}-\d{4}-\d{4}\b").unwrap());
static QUOTED_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"["\u{ab}]([^"\u{bb}]+)["\u{bb}]"#).unwrap());
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\p{L}'-]+").unwrap());

/// Small built-in French stopword list, the same register `rectification.py`
/// filters from mandate keywords.
const STOPWORDS: &[&str] = &[
    "le", "la", "les", "un", "une", "des", "de", "du", "et", "ou", "est", "que", "qui", "ce",
    "cette", "ces", "dans", "pour", "avec", "sur", "par", "pas", "plus", "son", "sa", "ses",
    "mon", "ma", "mes", "je", "tu", "il", "elle", "nous", "vous", "ils", "elles", "se", "me",
    "te", "au", "aux", "en", "y", "a", "à",
];

/// Parse a free-text query into keywords (lowercased, stopwords and
/// capitalized tokens removed, top 5 kept — mirrors `mots_cles[:5]`'s
/// truncation in `core.py::_search_metadata`), explicit Roget tag codes,
/// and candidate person names.
///
/// Person-name detection is heuristic: quoted substrings, and runs of
/// capitalized words outside the first position in the query (a leading
/// capital is usually just sentence case, not a name).
pub fn parse_query(query: &str) -> ParsedQuery {
    let tags: Vec<String> = TAG_SHAPE.find_iter(query).map(|m| m.as_str().to_string()).collect();

    let mut personnes: Vec<String> = QUOTED_NAME.captures_iter(query).map(|c| c[1].trim().to_string()).collect();
    personnes.extend(capitalized_runs(query));
    personnes.dedup();

    let words: Vec<&str> = WORD.find_iter(query).map(|m| m.as_str()).collect();
    let mut keywords = Vec::new();
    for (i, word) in words.iter().enumerate() {
        let lower = word.to_lowercase();
        if lower.is_empty() || STOPWORDS.contains(&lower.as_str()) {
            continue;
        }
        // A leading-capital word not in the first position is probably a
        // name already captured above, not a topical keyword.
        if i > 0 && word.chars().next().is_some_and(char::is_uppercase) {
            continue;
        }
        if TAG_SHAPE.is_match(word) {
            continue;
        }
        keywords.push(lower);
        if keywords.len() == 5 {
            break;
        }
    }

    ParsedQuery {
        keywords,
        tags,
        personnes,
        date_range: None,
        target_emotion: None,
    }
}

/// Runs of two-or-more whitespace-separated capitalized words (`"Marie
/// Tremblay"`), plus lone capitalized words after the first position in the
/// query.
fn capitalized_runs(query: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for (i, word) in WORD.find_iter(query).map(|m| m.as_str()).enumerate() {
        let is_cap = word.chars().next().is_some_and(char::is_uppercase);
        if is_cap && i > 0 {
            current.push(word);
        } else if !current.is_empty() {
            names.push(current.join(" "));
            current.clear();
        }
    }
    if !current.is_empty() {
        names.push(current.join(" "));
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tag_shape() {
        let parsed = parse_query("des souvenirs avec tag 04-0110-0010 s'il te plaît");
        assert_eq!(parsed.tags, vec!["04-0110-0010".to_string()]);
    }

    #[test]
    fn extracts_capitalized_name_not_in_first_position() {
        let parsed = parse_query("qu'est-ce que Marie Tremblay a dit");
        assert!(parsed.personnes.iter().any(|p| p == "Marie Tremblay"));
    }

    #[test]
    fn extracts_quoted_name() {
        let parsed = parse_query(r#"trouve les mentions de "Jean Leclerc""#);
        assert!(parsed.personnes.iter().any(|p| p == "Jean Leclerc"));
    }

    #[test]
    fn drops_stopwords_and_caps_at_five_keywords() {
        let parsed = parse_query("le chat et le chien mangent du pain avec du beurre et de la confiture");
        assert!(parsed.keywords.len() <= 5);
        assert!(!parsed.keywords.contains(&"le".to_string()));
        assert!(!parsed.keywords.contains(&"et".to_string()));
    }
}
