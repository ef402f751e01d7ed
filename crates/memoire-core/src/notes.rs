//! Mnémosyne's notes file — a plain-text log of coherence-agent sessions,
//! injected into the Agent's context as a cheaper channel than a search.
//! Grounded in `injection.py::_update_notes_file`.

use std::path::Path;

use chrono::{DateTime, Utc};

const DEFAULT_PREAMBLE: &str = "# Notes Mnémosyne\n\nRéflexions internes du système de cohérence mémorielle.\n";
const MAX_SESSIONS: usize = 50;
const SESSION_MARKER: &str = "\n## Session";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum NotesError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NotesError>;

/// Appends `entry` to the notes file at `path`, trimming it to the last
/// [`MAX_SESSIONS`] sessions. `entry` should already be formatted as a
/// `## Session ...` block (see [`format_session_entry`]).
pub fn append_session_entry(path: &Path, entry: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let existing = if path.exists() {
        std::fs::read_to_string(path)?
    } else {
        DEFAULT_PREAMBLE.to_string()
    };

    let trimmed = trim_to_last_sessions(&existing, MAX_SESSIONS);
    let new_content = trimmed + entry;
    std::fs::write(path, new_content)?;
    Ok(())
}

/// Keeps the preamble (text before the first `## Session` marker) plus the
/// last `max_sessions - 1` session sections, matching the original's
/// off-by-one ("keep 50 total including the new one") behavior.
fn trim_to_last_sessions(existing: &str, max_sessions: usize) -> String {
    let sections: Vec<&str> = existing.split(SESSION_MARKER).collect();
    if sections.len() <= max_sessions {
        return existing.to_string();
    }
    let keep_from = sections.len() - (max_sessions - 1);
    let mut out = sections[0].to_string();
    out.push_str(&sections[keep_from..].join(SESSION_MARKER));
    out
}

/// Renders a session's corrections/trajectories/piliers into the
/// `## Session ...` markdown block appended to the notes file. Mirrors
/// `_update_notes_file`'s note-building logic (max 3 items per section).
pub fn format_session_entry(
    timestamp: DateTime<Utc>,
    corrections: &[String],
    trajectoires: &[(String, String)],
    piliers: &[(String, String)],
) -> String {
    let mut lines = vec![format!("\n## Session Mnémosyne - {}", timestamp.format("%Y-%m-%dT%H:%M:%S")), String::new()];

    if !corrections.is_empty() {
        lines.push("### Corrections mémorisées".to_string());
        for nouveau_fait in corrections.iter().take(3) {
            lines.push(format!("- ✓ {nouveau_fait}"));
        }
        lines.push(String::new());
    }

    if !trajectoires.is_empty() {
        lines.push("### Évolutions détectées".to_string());
        for (ancien, nouveau) in trajectoires.iter().take(3) {
            lines.push(format!("- {ancien} → {nouveau}"));
        }
        lines.push(String::new());
    }

    if !piliers.is_empty() {
        lines.push("### Piliers proposés".to_string());
        for (categorie, fait) in piliers.iter().take(3) {
            lines.push(format!("- [{categorie}] {fait}"));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}
