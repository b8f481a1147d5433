//! Renders one note to a Markdown file: YAML frontmatter with the
//! store metadata, then the reconstructed body.

use crate::checklist;
use crate::decode::{self, Document};
use crate::markdown;
use crate::store::RawNote;
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct Frontmatter<'a> {
    id: i64,
    title: &'a str,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    folder: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<&'a [String]>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    encrypted: bool,
}

/// What a note body resolved to after the decode cascade.
pub enum NoteBody {
    Decoded(Document),
    /// Snippet or marker text standing in for an undecodable body.
    Fallback(String),
}

/// Run the body through sniff → decode, degrading to snippet/marker.
pub fn resolve_body(raw: &RawNote) -> NoteBody {
    match decode::decode_note(raw) {
        Ok(doc) => NoteBody::Decoded(doc),
        Err(e) => {
            debug!("note {} undecodable ({e}), using fallback content", raw.note_id);
            NoteBody::Fallback(decode::fallback_content(raw))
        }
    }
}

/// Markdown for a note, title rule included, regardless of whether the
/// body decoded.
pub fn note_markdown(raw: &RawNote, body: &NoteBody) -> String {
    match body {
        NoteBody::Decoded(doc) => markdown::to_markdown(doc, &raw.title),
        NoteBody::Fallback(content) => markdown::fallback_to_markdown(&raw.title, content),
    }
}

/// Write frontmatter plus body. Returns `true` when the body decoded.
pub fn render_note<W: Write>(
    writer: &mut W,
    raw: &RawNote,
    body: &NoteBody,
    tags: Option<&[String]>,
    verbose: bool,
) -> std::io::Result<bool> {
    let decoded = matches!(body, NoteBody::Decoded(_));

    let fm = Frontmatter {
        id: raw.note_id,
        title: &raw.title,
        created: raw.created_at,
        modified: raw.modified_at,
        folder: raw.folder_name.as_deref(),
        tags,
        encrypted: !decoded && raw.is_password_protected(),
    };

    writeln!(writer, "---")?;
    let yaml =
        serde_yaml::to_string(&fm).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    write!(writer, "{}", yaml)?;
    writeln!(writer, "---")?;
    writeln!(writer)?;

    write!(writer, "{}", note_markdown(raw, body))?;

    if verbose && let NoteBody::Decoded(doc) = body {
        let items = checklist::extract_checklists(doc);
        if !items.is_empty() {
            let done = items.iter().filter(|i| i.is_completed).count();
            debug!(
                "note {}: {} checklist item(s), {} completed",
                raw.note_id,
                items.len(),
                done
            );
        }
    }

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto;
    use chrono::TimeZone;

    fn raw_note(title: &str, snippet: &str, body: Option<Vec<u8>>) -> RawNote {
        RawNote {
            note_id: 42,
            title: title.into(),
            snippet: snippet.into(),
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            modified_at: Utc.timestamp_opt(1_700_000_100, 0).unwrap(),
            folder_name: Some("Inbox".into()),
            body_blob: body,
            crypto_iv: None,
            crypto_tag: None,
        }
    }

    #[test]
    fn rendered_file_has_frontmatter_and_body() {
        use prost::Message;
        let note = proto::Note {
            note_text: "Hello world".into(),
            attribute_run: vec![proto::AttributeRun {
                length: 11,
                ..Default::default()
            }],
        };
        let raw = raw_note("Greet", "", Some(note.encode_to_vec()));
        let body = resolve_body(&raw);

        let mut out = Vec::new();
        let decoded = render_note(&mut out, &raw, &body, None, false).unwrap();
        assert!(decoded);

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("---\n"));
        assert!(text.contains("id: 42"));
        assert!(text.contains("title: Greet"));
        assert!(text.contains("folder: Inbox"));
        assert!(!text.contains("encrypted"));
        assert!(text.ends_with("# Greet\n\nHello world"));
    }

    #[test]
    fn undecodable_note_renders_snippet_fallback() {
        let raw = raw_note("Secret", "a preview", Some(vec![0xff, 0x07]));
        let body = resolve_body(&raw);

        let mut out = Vec::new();
        let decoded = render_note(&mut out, &raw, &body, None, false).unwrap();
        assert!(!decoded);

        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("# Secret\n\na preview"));
    }

    #[test]
    fn protected_note_is_flagged_encrypted() {
        let mut raw = raw_note("Locked", "", Some(vec![0xff, 0x07]));
        raw.crypto_iv = Some(vec![0u8; 16]);
        let body = resolve_body(&raw);

        let mut out = Vec::new();
        render_note(&mut out, &raw, &body, None, false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("encrypted: true"));
        assert!(text.contains(decode::ENCRYPTED_NOTE_MARKER));
    }
}
