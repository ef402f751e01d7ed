//! Turn segmentation — splits a raw conversation text into `[timestamp]
//! role:` delimited turns, neutralizing inline markers that would otherwise
//! cause false splits. Grounded in `scribe.py::_parse_echanges` /
//! `_clean_inline_markers`.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};

use crate::model::Auteur;

static TURN_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(
        r"\[(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?Z?)\]\s*(human|assistant|user|utilisateur|AIter Ego|MOSS)\s*:\s*",
    )
    .case_insensitive(true)
    .build()
    .expect("valid regex")
});

static SOURCE_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[SOURCE:(\w+)\]").expect("valid regex"));
static TIMESTAMP_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?Z?)\]").expect("valid regex")
});
static TRAILING_SOURCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[SOURCE:\w*$").expect("valid regex"));
static TRAILING_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d{4}-\d{2}-\d{2}T?\d{0,2}:?\d{0,2}:?\d{0,2}[^\]]*$").expect("valid regex"));

/// One turn of a conversation, with its token span within the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub timestamp: DateTime<Utc>,
    pub auteur: Auteur,
    pub text: String,
    pub token_start: i64,
    pub token_count: i64,
}

/// Escape every occurrence of `pattern` that is NOT at the start of the
/// string and NOT immediately preceded by `excluded_prev`, replacing its
/// surrounding brackets with guillemets so it can't be mistaken for a real
/// header by [`TURN_HEADER`]. Rust's `regex` crate has no lookbehind, so
/// the exclusion is checked against the raw byte preceding the match
/// instead of folded into the pattern.
fn escape_inline(text: &str, pattern: &Regex, excluded_prev: &[u8]) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last_end = 0;

    for m in pattern.find_iter(text) {
        let prev_excluded = m.start() == 0 || excluded_prev.contains(&bytes[m.start() - 1]);
        if prev_excluded {
            continue;
        }
        out.push_str(&text[last_end..m.start()]);
        let inner = &m.as_str()[1..m.as_str().len() - 1];
        out.push('«');
        out.push_str(inner);
        out.push('»');
        last_end = m.end();
    }
    out.push_str(&text[last_end..]);
    out
}

/// Neutralize `[SOURCE:xxx]` and inline `[timestamp]` markers that appear
/// mid-line (not right after a line start) so they don't get mistaken for
/// turn headers by [`parse_turns`].
pub fn clean_inline_markers(text: &str) -> String {
    let text = escape_inline(text, &SOURCE_MARKER, b"\n");
    escape_inline(&text, &TIMESTAMP_MARKER, b"]\n")
}

/// Light text cleanup applied before handing a turn's text to an extractor:
/// collapses runs of 3+ blank lines down to one blank line. The full
/// code-fence encapsulation the original performs is extractor-prompt
/// presentation, out of scope for the stored segment text.
pub fn clean_segment(text: &str) -> String {
    static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));
    BLANK_RUN.replace_all(text, "\n\n").to_string()
}

fn normalize_auteur(raw: &str) -> Auteur {
    match raw.to_lowercase().as_str() {
        "human" | "user" | "utilisateur" => Auteur::Human,
        _ => Auteur::Assistant,
    }
}

/// Split `raw_text` into turns, counting tokens with `count_tokens`.
/// Turns shorter than 10 characters are folded into the previous turn
/// (mirrors the original's rationale: such fragments are usually stray
/// punctuation or a continuation cut off by a spurious header match).
pub fn parse_turns(raw_text: &str, count_tokens: impl Fn(&str) -> usize) -> Vec<Turn> {
    let cleaned = clean_inline_markers(raw_text);
    let matches: Vec<_> = TURN_HEADER.captures_iter(&cleaned).collect();

    if matches.is_empty() {
        let text = cleaned.trim().to_string();
        let token_count = count_tokens(&text) as i64;
        return vec![Turn {
            timestamp: Utc::now(),
            auteur: Auteur::Human,
            text,
            token_start: 0,
            token_count,
        }];
    }

    let mut turns: Vec<Turn> = Vec::new();
    let mut token_cumule: i64 = 0;

    for (i, cap) in matches.iter().enumerate() {
        let whole = cap.get(0).expect("group 0 always present");
        let timestamp_raw = cap.get(1).expect("timestamp group present").as_str();
        let auteur = normalize_auteur(cap.get(2).expect("role group present").as_str());

        let start_pos = whole.end();
        let end_pos = matches
            .get(i + 1)
            .map(|m| m.get(0).expect("group 0 always present").start())
            .unwrap_or(cleaned.len());

        let mut text = cleaned[start_pos..end_pos].trim().to_string();

        if let Some(stripped) = text.strip_suffix('[') {
            text = stripped.trim_end().to_string();
        }
        if let Some(stripped) = text.strip_suffix("[SOURCE:") {
            text = stripped.trim_end().to_string();
        }
        text = TRAILING_SOURCE.replace(&text, "").trim_end().to_string();
        text = TRAILING_TIMESTAMP.replace(&text, "").trim_end().to_string();

        if text.is_empty() {
            continue;
        }

        if text.len() < 10 && !turns.is_empty() {
            let prev = turns.last_mut().expect("checked non-empty above");
            prev.text.push(' ');
            prev.text.push_str(&text);
            prev.token_count = count_tokens(&prev.text) as i64;
            continue;
        }

        let timestamp = DateTime::parse_from_rfc3339(timestamp_raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let token_count = count_tokens(&text) as i64;
        turns.push(Turn {
            timestamp,
            auteur,
            text,
            token_start: token_cumule,
            token_count,
        });
        token_cumule += token_count;
    }

    turns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_words(s: &str) -> usize {
        s.split_whitespace().count()
    }

    #[test]
    fn splits_two_turns() {
        let text = "[2025-01-01T10:00:00.000Z] human: hello there friend\n\
                     [2025-01-01T10:00:05.000Z] assistant: hi back to you too";
        let turns = parse_turns(text, count_words);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].auteur, Auteur::Human);
        assert_eq!(turns[1].auteur, Auteur::Assistant);
        assert_eq!(turns[1].token_start, turns[0].token_count);
    }

    #[test]
    fn no_header_yields_single_turn() {
        let turns = parse_turns("just some plain text", count_words);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].auteur, Auteur::Human);
    }

    #[test]
    fn short_trailing_fragment_folds_into_previous() {
        let text = "[2025-01-01T10:00:00.000Z] human: a reasonably long opening message\n\
                     [2025-01-01T10:00:05.000Z] assistant: ok";
        let turns = parse_turns(text, count_words);
        assert_eq!(turns.len(), 1);
        assert!(turns[0].text.ends_with("ok"));
    }

    #[test]
    fn inline_source_marker_does_not_cause_false_split() {
        let text = "[2025-01-01T10:00:00.000Z] human: check this out [SOURCE:chatgpt] then more text here";
        let turns = parse_turns(text, count_words);
        assert_eq!(turns.len(), 1);
        assert!(turns[0].text.contains("«SOURCE:chatgpt»"));
    }
}
