use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Configuration required to run an export.
/// This decouples the logic from how the arguments were parsed (CLI/Config file).
#[derive(Clone)]
pub struct ExportConfig {
    pub target_dir: PathBuf,
    pub db_path: PathBuf,
    pub limit: usize,
    pub tags: Option<Vec<String>>,
    pub force: bool,
    pub verbose: bool,
    pub quiet: bool,
}

#[derive(Clone, Copy, PartialEq)]
pub enum ProcessResult {
    Exported,
    /// Written, but the body failed every decode attempt and the file
    /// holds the snippet or the encrypted-note marker.
    Undecodable,
    Skipped,
}

#[derive(Clone)]
pub struct FileFrontmatter {
    pub id: Option<i64>,
    pub modified: DateTime<Utc>,
}

/// Filename stem for a note: `<id>_<slug-of-title>`, slug capped at 60
/// chars. The integer id keeps stems unique even across title edits.
pub fn file_stem(note_id: i64, title: &str) -> String {
    let raw_slug = slug::slugify(title);
    // Truncate slug to 60 chars (slug output is ASCII-only, so byte == char)
    let slug = raw_slug[..raw_slug.len().min(60)]
        .trim_end_matches('-')
        .to_string();
    if slug.is_empty() {
        note_id.to_string()
    } else {
        format!("{}_{}", note_id, slug)
    }
}

/// Read the YAML frontmatter from an existing .md file and extract relevant fields.
pub fn parse_existing_frontmatter(path: &Path) -> Option<FileFrontmatter> {
    let file = File::open(path).ok()?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();
    let first = lines.next()?.ok()?;
    if first.trim() != "---" {
        return None;
    }

    let mut id: Option<i64> = None;
    let mut modified: Option<DateTime<Utc>> = None;
    let mut bytes_read = 0usize;

    for line in lines {
        let line = line.ok()?;
        bytes_read += line.len() + 1;
        if bytes_read > 2048 || line.trim() == "---" {
            break;
        }
        if let Some(rest) = line.strip_prefix("id:") {
            id = rest.trim().parse().ok();
        } else if let Some(rest) = line.strip_prefix("modified:") {
            let val = rest.trim().trim_matches('\'').trim_matches('"');
            modified = DateTime::parse_from_rfc3339(val)
                .ok()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }
    modified.map(|ts| FileFrontmatter { id, modified: ts })
}

/// Find the existing export of a note, if any: a file named `<id>_*.md`
/// or exactly `<id>.md`.
pub fn find_existing_file(target_dir: &Path, note_id: i64) -> Option<PathBuf> {
    let prefix = note_id.to_string();
    std::fs::read_dir(target_dir)
        .ok()?
        .flatten()
        .find(|e| {
            let n = e.file_name();
            let s = n.to_string_lossy();
            s.ends_with(".md")
                && (s.starts_with(&format!("{prefix}_")) || s == format!("{prefix}.md"))
        })
        .map(|e| e.path())
}

/// Slice `text` by code-point offsets, clamping both ends.
///
/// Attribute-run lengths count Unicode scalar values, not bytes, so all
/// range arithmetic downstream of the decoder goes through here.
pub(crate) fn slice_chars(text: &str, start: usize, end: usize) -> &str {
    if start >= end {
        return "";
    }
    let byte_at = |n: usize| {
        text.char_indices()
            .map(|(i, _)| i)
            .nth(n)
            .unwrap_or(text.len())
    };
    &text[byte_at(start)..byte_at(end)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_chars_counts_codepoints_not_bytes() {
        let text = "héllo wörld";
        assert_eq!(slice_chars(text, 0, 5), "héllo");
        assert_eq!(slice_chars(text, 6, 11), "wörld");
    }

    #[test]
    fn slice_chars_clamps_out_of_range() {
        assert_eq!(slice_chars("ab", 0, 99), "ab");
        assert_eq!(slice_chars("ab", 5, 9), "");
        assert_eq!(slice_chars("ab", 1, 1), "");
    }

    #[test]
    fn file_stem_slugs_and_caps_titles() {
        assert_eq!(file_stem(12, "Grocery List!"), "12_grocery-list");
        assert_eq!(file_stem(3, "  "), "3");
        let long = "x".repeat(200);
        assert!(file_stem(1, &long).len() <= 2 + 60);
    }
}
