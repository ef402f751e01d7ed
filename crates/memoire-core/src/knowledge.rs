//! Knowledge-file tools — reads and edits the Markdown "persistent memory"
//! files Iris consults directly, no search involved. Simplified from
//! `library/knowledge.py`: path resolution and the section-aware
//! read/append/update shape are kept; symlink traversal and the standalone
//! list/create/delete actions are dropped as out of scope.

use std::path::{Path, PathBuf};

use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum KnowledgeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("file '{0}' not found")]
    NotFound(String),
    #[error("section '{0}' not found")]
    SectionNotFound(String),
}

pub type Result<T> = std::result::Result<T, KnowledgeError>;

/// Resolves `fichier` (a bare name or a relative subpath, with or without
/// `.md`) to a path under `knowledge_dir`. Mirrors `_resolve_path`.
fn resolve_path(knowledge_dir: &Path, fichier: &str) -> PathBuf {
    let cleaned = fichier.trim().trim_end_matches(".md");
    if cleaned.contains('/') || cleaned.contains('\\') {
        knowledge_dir.join(cleaned)
    } else {
        knowledge_dir.join(format!("{cleaned}.md"))
    }
}

pub fn read_knowledge(knowledge_dir: &Path, fichier: &str) -> Result<String> {
    let path = resolve_path(knowledge_dir, fichier);
    if !path.exists() {
        return Err(KnowledgeError::NotFound(fichier.to_string()));
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Appends `contenu` to the end of an existing file, separated by a blank
/// line. Mirrors `append_knowledge`.
pub fn append_knowledge(knowledge_dir: &Path, fichier: &str, contenu: &str) -> Result<()> {
    let path = resolve_path(knowledge_dir, fichier);
    if !path.exists() {
        return Err(KnowledgeError::NotFound(fichier.to_string()));
    }
    let existing = std::fs::read_to_string(&path)?;
    let updated = format!("{}\n\n{}\n", existing.trim_end(), contenu.trim());
    std::fs::write(path, updated)?;
    Ok(())
}

static SECTION_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n#{1,2}\s+\S").unwrap());

/// Replaces the body of a `#`/`##` section (up to the next header or end of
/// file) with `contenu`, preserving the header line itself verbatim.
/// Mirrors `update_knowledge`.
pub fn update_knowledge(knowledge_dir: &Path, fichier: &str, section: &str, contenu: &str) -> Result<()> {
    let path = resolve_path(knowledge_dir, fichier);
    if !path.exists() {
        return Err(KnowledgeError::NotFound(fichier.to_string()));
    }
    let texte = std::fs::read_to_string(&path)?;

    let section_clean = section.trim();
    let header_pattern = Regex::new(&format!(r"(?im)(^|\n)(#{{1,2}}\s*{}\s*$)", regex::escape(section_clean)))
        .expect("escaped section name is always a valid regex");
    let Some(m) = header_pattern.find(&texte) else {
        return Err(KnowledgeError::SectionNotFound(section_clean.to_string()));
    };

    let section_start = m.end();
    let section_end = SECTION_END
        .find(&texte[section_start..])
        .map(|next| section_start + next.start())
        .unwrap_or(texte.len());

    let mut nouveau_texte = String::with_capacity(texte.len() + contenu.len());
    nouveau_texte.push_str(&texte[..section_start]);
    nouveau_texte.push('\n');
    nouveau_texte.push_str(contenu.trim());
    nouveau_texte.push('\n');
    nouveau_texte.push_str(&texte[section_end..]);

    std::fs::write(path, nouveau_texte)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir_with_file(name: &str, content: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(name), content).unwrap();
        dir
    }

    #[test]
    fn reads_bare_name_without_extension() {
        let dir = dir_with_file("personnes.md", "# Personnes\ncontenu");
        let content = read_knowledge(dir.path(), "personnes").unwrap();
        assert!(content.contains("Personnes"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(read_knowledge(dir.path(), "absent"), Err(KnowledgeError::NotFound(_))));
    }

    #[test]
    fn appends_with_blank_line_separator() {
        let dir = dir_with_file("notes.md", "premier paragraphe");
        append_knowledge(dir.path(), "notes", "deuxième paragraphe").unwrap();
        let content = read_knowledge(dir.path(), "notes").unwrap();
        assert_eq!(content, "premier paragraphe\n\ndeuxième paragraphe\n");
    }

    #[test]
    fn update_replaces_section_body_and_keeps_header() {
        let dir = dir_with_file("taches.md", "## Tâches en cours\nancien contenu\n## Autre section\nreste");
        update_knowledge(dir.path(), "taches", "Tâches en cours", "nouveau contenu").unwrap();
        let content = read_knowledge(dir.path(), "taches").unwrap();
        assert!(content.contains("## Tâches en cours\nnouveau contenu\n\n## Autre section\nreste"));
    }

    #[test]
    fn update_unknown_section_errors() {
        let dir = dir_with_file("taches.md", "## Connu\ncontenu");
        assert!(matches!(
            update_knowledge(dir.path(), "taches", "Inconnu", "x"),
            Err(KnowledgeError::SectionNotFound(_))
        ));
    }
}
