//! Three-tier JSON repair pipeline for ragged LLM batch responses.
//! Grounded in `vllm_extractor.py::_parse_batch_response` /
//! `_aggressive_fix` and `openai_extractor.py::_parse_batch_response`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::ExtractedRecord;

/// Outcome of running the repair pipeline against one LLM response body.
#[derive(Debug, Clone)]
pub enum RepairOutcome {
    /// Parsed cleanly (tier 1) or after regex/amputation repair (tiers 2-3).
    Records(Vec<ExtractedRecord>),
    /// No strategy produced valid JSON.
    Failed,
}

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```(?:json)?\s*").expect("valid regex"));
static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("valid regex"));
static LAST_OBJECT_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\}\s*,").expect("valid regex"));

/// Run the repair pipeline against `raw` (an LLM response expected to
/// contain a JSON array of records).
pub fn repair_json(raw: &str) -> RepairOutcome {
    let stripped = CODE_FENCE.replace_all(raw, "").to_string();

    let Some(start) = stripped.find('[') else {
        return RepairOutcome::Failed;
    };
    let candidate = &stripped[start..];

    // Tier 1: direct parse.
    if let Some(records) = try_parse(candidate) {
        return RepairOutcome::Records(records);
    }

    // Tier 2: regex-based syntax repair (trailing commas, stray control
    // characters, Python literal leakage).
    let cleaned = basic_clean(candidate);
    if let Some(records) = try_parse(&cleaned) {
        return RepairOutcome::Records(records);
    }

    // Tier 3: amputate the trailing truncated object and close the array.
    let amputated = amputate_and_close(&cleaned);
    if let Some(records) = try_parse(&amputated) {
        return RepairOutcome::Records(records);
    }

    RepairOutcome::Failed
}

fn try_parse(candidate: &str) -> Option<Vec<ExtractedRecord>> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    let array = value.as_array()?;
    let mut out = Vec::with_capacity(array.len());
    for item in array {
        match serde_json::from_value::<ExtractedRecord>(item.clone()) {
            Ok(record) => out.push(record),
            Err(_) => out.push(ExtractedRecord::extraction_failed()),
        }
    }
    Some(out)
}

fn basic_clean(json_str: &str) -> String {
    let mut out = json_str
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect::<String>();
    out = out.replace("True", "true").replace("False", "false").replace("None", "null");
    TRAILING_COMMA.replace_all(&out, "$1").to_string()
}

/// Locate the last complete `},` object boundary and truncate there,
/// closing the array — saves whatever complete objects preceded a
/// truncated tail element.
fn amputate_and_close(json_str: &str) -> String {
    let trimmed = json_str.trim_end();
    if trimmed.ends_with(']') {
        return trimmed.to_string();
    }

    if let Some(last_match) = LAST_OBJECT_BOUNDARY.find_iter(json_str).last() {
        // Keep up through the closing brace, drop the comma, close the array.
        let cut = last_match.start() + 1;
        return format!("{}]", &json_str[..cut]);
    }

    // No complete object found: try a brute-force brace/bracket close,
    // provided we're not stopped mid-string.
    if json_str.matches('"').count() % 2 == 0 {
        let open_braces = json_str.matches('{').count() as i64 - json_str.matches('}').count() as i64;
        let open_brackets = json_str.matches('[').count() as i64 - json_str.matches(']').count() as i64;
        let mut out = json_str.trim_end().trim_end_matches(',').to_string();
        for _ in 0..open_braces.max(0) {
            out.push('}');
        }
        for _ in 0..open_brackets.max(0) {
            out.push(']');
        }
        return out;
    }

    json_str.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_array() {
        let raw = r#"[{"resume_texte": "hello"}]"#;
        match repair_json(raw) {
            RepairOutcome::Records(r) => assert_eq!(r.len(), 1),
            RepairOutcome::Failed => panic!("expected success"),
        }
    }

    #[test]
    fn strips_markdown_fence_and_trailing_comma() {
        let raw = "```json\n[{\"resume_texte\": \"hi\"},]\n```";
        match repair_json(raw) {
            RepairOutcome::Records(r) => assert_eq!(r.len(), 1),
            RepairOutcome::Failed => panic!("expected success"),
        }
    }

    #[test]
    fn amputates_truncated_trailing_object() {
        let raw = r#"[{"resume_texte": "first"}, {"resume_texte": "second"}, {"resume_texte": "trunc"#;
        match repair_json(raw) {
            RepairOutcome::Records(r) => assert_eq!(r.len(), 2),
            RepairOutcome::Failed => panic!("expected amputation to save the first two objects"),
        }
    }

    #[test]
    fn fails_on_total_garbage() {
        let raw = "not json at all, no brackets";
        assert!(matches!(repair_json(raw), RepairOutcome::Failed));
    }
}
