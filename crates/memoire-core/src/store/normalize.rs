//! `normalize_search` — the user-defined scalar function registered on
//! every connection, used in `WHERE` clauses against JSON-encoded string
//! array columns (`personnes`, `projets`, `sujets`, `lieux`).

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Register `normalize_search(text)` on `conn`. Must be called before the
/// first query against entity-array columns.
pub fn register(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "normalize_search",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: String = ctx.get(0)?;
            Ok(normalize_search(&text))
        },
    )
}

/// If `text` parses as a JSON array of strings, join the elements with a
/// space; then strip Unicode combining marks (NFD decomposition); then
/// lowercase. Pure-Rust mirror of the SQLite scalar function so it can be
/// unit-tested and reused outside a live connection (e.g. by the Retriever
/// when normalizing a parsed query person name).
pub fn normalize_search(text: &str) -> String {
    let joined = if looks_like_json_array(text) {
        match serde_json::from_str::<Vec<String>>(text) {
            Ok(items) => items.join(" "),
            Err(_) => text.to_string(),
        }
    } else {
        text.to_string()
    };

    let decomposed: String = joined.nfd().filter(|c| !is_combining_mark(*c)).collect();
    decomposed.to_lowercase()
}

fn looks_like_json_array(text: &str) -> bool {
    text.starts_with('[') && (text.contains('\\') || text.contains(']'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_accented_json_array() {
        let out = normalize_search(r#"["Christian Gagné"]"#);
        assert!(out.contains("christian gagne"));
    }

    #[test]
    fn is_idempotent() {
        let input = r#"["Éléonore Lévesque", "Jean-Paul"]"#;
        let once = normalize_search(input);
        let twice = normalize_search(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn passes_through_plain_text() {
        assert_eq!(normalize_search("hello world"), "hello world");
    }
}
