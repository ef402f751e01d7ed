//! Fragment file storage — the tokenized, line-numbered copy of each
//! indexed conversation written alongside the database, and read back by
//! the Sbire's GREP mandate and the Retriever's raw-text fallback.
//!
//! Grounded in `scribe.py::_create_fragment_file`: each non-empty line is
//! prefixed with its cumulative token offset at the start of that line
//! (`{offset}|{line}`), and files are laid out under `root/YYYY/MM/`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FragmentError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FragmentError>;

static TIMESTAMP_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?Z?\]").expect("valid regex")
});

/// A fragment file written to disk, and the cumulative token count covering
/// its whole contents.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub path: PathBuf,
    pub token_count: i64,
}

/// Write `raw_text` as a fragment file rooted under `root`, tokenizing each
/// line with `count_tokens` and prefixing it with its cumulative token
/// offset. The path is derived from `timestamp`:
/// `root/YYYY/MM/YYYY-MM-DDTHH-MM-SS.txt`.
pub fn write_fragment(
    root: &Path,
    raw_text: &str,
    timestamp: DateTime<Utc>,
    count_tokens: impl Fn(&str) -> usize,
) -> Result<Fragment> {
    let mut lines = Vec::new();
    let mut cumul: i64 = 0;

    for line in raw_text.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        lines.push(format!("{cumul}|{line}"));
        if let Some(m) = TIMESTAMP_PREFIX.find(line) {
            let content = line[m.end()..].trim();
            if !content.is_empty() {
                cumul += count_tokens(content) as i64;
            }
        } else {
            cumul += count_tokens(line) as i64;
        }
    }

    let output_dir = root.join(format!("{}", timestamp.format("%Y/%m")));
    std::fs::create_dir_all(&output_dir)?;
    let file_name = format!("{}.txt", timestamp.format("%Y-%m-%dT%H-%M-%S"));
    let output_path = output_dir.join(file_name);

    std::fs::write(&output_path, lines.join("\n"))?;

    Ok(Fragment {
        path: output_path,
        token_count: cumul,
    })
}

/// List fragment files under `root`, newest first (by path, which sorts
/// chronologically given the `YYYY/MM/YYYY-MM-DDTHH-MM-SS.txt` layout) —
/// used by the Sbire's GREP mandate to scan recent fragments first.
pub fn list_fragments(root: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    collect_txt_files(root, &mut out)?;
    out.sort();
    out.reverse();
    Ok(out)
}

fn collect_txt_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_txt_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "txt") {
            out.push(path);
        }
    }
    Ok(())
}

/// Read a fragment file back and strip the `{offset}|` prefix from each
/// line, returning plain text.
pub fn read_fragment_plain(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)?;
    let mut out = String::with_capacity(raw.len());
    for line in raw.lines() {
        match line.split_once('|') {
            Some((_, content)) => {
                out.push_str(content);
                out.push('\n');
            }
            None => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn count_words(s: &str) -> usize {
        s.split_whitespace().count()
    }

    #[test]
    fn writes_and_lists_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let ts1 = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let ts2 = Utc.with_ymd_and_hms(2025, 2, 1, 10, 0, 0).unwrap();

        write_fragment(dir.path(), "[2025-01-01T10:00:00Z] human: bonjour", ts1, count_words).unwrap();
        write_fragment(dir.path(), "[2025-02-01T10:00:00Z] human: salut", ts2, count_words).unwrap();

        let listed = list_fragments(dir.path()).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].to_string_lossy().contains("2025-02"));
    }

    #[test]
    fn prefixes_cumulative_token_offset() {
        let dir = tempfile::tempdir().unwrap();
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let fragment = write_fragment(
            dir.path(),
            "[2025-01-01T10:00:00Z] human: one two three\nfour five",
            ts,
            count_words,
        )
        .unwrap();
        let contents = std::fs::read_to_string(&fragment.path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "0|[2025-01-01T10:00:00Z] human: one two three");
        assert_eq!(lines[1], "3|four five");
        assert_eq!(fragment.token_count, 5);
    }

    #[test]
    fn read_fragment_plain_strips_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let fragment = write_fragment(dir.path(), "hello world", ts, count_words).unwrap();
        let plain = read_fragment_plain(&fragment.path).unwrap();
        assert_eq!(plain.trim(), "hello world");
    }
}
