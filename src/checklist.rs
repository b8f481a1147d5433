//! Reassembles checklist items out of the attribute-run stream.
//!
//! A single checkbox in the Notes UI can be split across many attribute
//! runs (typing, style edits, and sync all fragment runs); the runs are
//! tied back together by the checklist uuid carried on each one.

use crate::decode::Document;
use crate::proto::Note;
use crate::utils::slice_chars;
use std::collections::HashMap;
use std::ops::Range;
use uuid::Uuid;

/// One logical checkbox, reassembled from all runs sharing its uuid.
#[derive(Debug, Clone, PartialEq)]
pub struct ChecklistItem {
    /// Hex rendering of the uuid, stable across exports.
    pub id: String,
    pub text: String,
    pub is_completed: bool,
    pub uuid: Vec<u8>,
    /// 1-based line the item starts on in the note text.
    pub line_number: usize,
    /// Code-point offsets spanned in the note text.
    pub range: Range<usize>,
}

pub fn extract_checklists(doc: &Document) -> Vec<ChecklistItem> {
    extract_from_note(&doc.note)
}

/// Walk the runs with a running code-point offset and coalesce the
/// spans of each uuid. `done` is last-wins when runs disagree; items
/// whose trimmed text is empty are dropped. Sorted by start offset.
pub fn extract_from_note(note: &Note) -> Vec<ChecklistItem> {
    struct Pending {
        uuid: Vec<u8>,
        segments: Vec<Range<usize>>,
        done: bool,
    }

    let total = note.note_text.chars().count();
    let mut by_uuid: HashMap<Vec<u8>, usize> = HashMap::new();
    let mut pending: Vec<Pending> = Vec::new();
    let mut offset = 0usize;

    for run in &note.attribute_run {
        let start = offset.min(total);
        let end = (offset + run.length as usize).min(total);
        offset += run.length as usize;

        let Some(checklist) = run
            .paragraph_style
            .as_ref()
            .and_then(|p| p.checklist.as_ref())
        else {
            continue;
        };
        if checklist.uuid.is_empty() {
            continue;
        }

        let done = checklist.done.unwrap_or(0) != 0;
        match by_uuid.get(&checklist.uuid).copied() {
            Some(idx) => {
                pending[idx].segments.push(start..end);
                pending[idx].done = done;
            }
            None => {
                by_uuid.insert(checklist.uuid.clone(), pending.len());
                pending.push(Pending {
                    uuid: checklist.uuid.clone(),
                    segments: vec![start..end],
                    done,
                });
            }
        }
    }

    let mut items: Vec<ChecklistItem> = pending
        .into_iter()
        .filter_map(|mut p| {
            p.segments.sort_by_key(|r| r.start);
            let text: String = p
                .segments
                .iter()
                .map(|r| slice_chars(&note.note_text, r.start, r.end))
                .collect();
            let text = text.trim().to_string();
            if text.is_empty() {
                return None;
            }
            let start = p.segments.first().map(|r| r.start).unwrap_or(0);
            let end = p.segments.iter().map(|r| r.end).max().unwrap_or(start);
            let line_number = 1 + note
                .note_text
                .chars()
                .take(start)
                .filter(|&c| c == '\n')
                .count();
            Some(ChecklistItem {
                id: uuid_hex(&p.uuid),
                text,
                is_completed: p.done,
                uuid: p.uuid,
                line_number,
                range: start..end,
            })
        })
        .collect();

    items.sort_by_key(|item| item.range.start);
    items
}

// Checklist uuids are 16 bytes in every store seen so far, but the wire
// field is plain bytes, so tolerate other widths.
fn uuid_hex(bytes: &[u8]) -> String {
    match Uuid::from_slice(bytes) {
        Ok(u) => u.simple().to_string(),
        Err(_) => bytes.iter().map(|b| format!("{b:02x}")).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{AttributeRun, Checklist, Note, ParagraphStyle};

    fn checklist_run(length: u32, uuid: &[u8], done: i32) -> AttributeRun {
        AttributeRun {
            length,
            paragraph_style: Some(ParagraphStyle {
                checklist: Some(Checklist {
                    uuid: uuid.to_vec(),
                    done: Some(done),
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn distinct_uuids_make_distinct_items() {
        let note = Note {
            note_text: "Buy milk\nBuy eggs".into(),
            attribute_run: vec![
                checklist_run(9, b"uuid-1", 1),
                checklist_run(8, b"uuid-2", 0),
            ],
        };
        let items = extract_from_note(&note);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "Buy milk");
        assert!(items[0].is_completed);
        assert_eq!(items[1].text, "Buy eggs");
        assert!(!items[1].is_completed);
        assert_eq!(items[0].line_number, 1);
        assert_eq!(items[1].line_number, 2);
    }

    #[test]
    fn shared_uuid_coalesces_across_runs() {
        // One checkbox split 3/4/2 over a single uuid; interior spaces
        // survive the merge, edge whitespace is trimmed off.
        let note = Note {
            note_text: "Pay bill s".into(),
            attribute_run: vec![
                checklist_run(3, b"U1", 0),
                checklist_run(4, b"U1", 0),
                checklist_run(2, b"U1", 0),
            ],
        };
        let items = extract_from_note(&note);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].range, 0..9);
        // runs cover the first 9 code points: "Pay bill " -> trimmed
        assert_eq!(items[0].text, "Pay bill");

        let note = Note {
            note_text: "Pay bill s".into(),
            attribute_run: vec![
                checklist_run(3, b"U1", 0),
                checklist_run(4, b"U1", 0),
                checklist_run(3, b"U1", 0),
            ],
        };
        let items = extract_from_note(&note);
        assert_eq!(items[0].text, "Pay bill s");
        assert_eq!(items[0].range, 0..10);
    }

    #[test]
    fn done_is_last_wins() {
        let note = Note {
            note_text: "task".into(),
            attribute_run: vec![checklist_run(2, b"U1", 1), checklist_run(2, b"U1", 0)],
        };
        let items = extract_from_note(&note);
        assert!(!items[0].is_completed);
    }

    #[test]
    fn blank_items_are_dropped_and_offsets_clamp() {
        let note = Note {
            note_text: "  \nx".into(),
            attribute_run: vec![
                checklist_run(3, b"blank", 0),
                // length runs past the end of the text
                checklist_run(50, b"tail", 1),
            ],
        };
        let items = extract_from_note(&note);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "x");
        assert_eq!(items[0].range, 3..4);
    }

    #[test]
    fn runs_without_checklist_only_advance_the_offset() {
        let note = Note {
            note_text: "intro\nitem".into(),
            attribute_run: vec![
                AttributeRun {
                    length: 6,
                    ..Default::default()
                },
                checklist_run(4, b"U9", 0),
            ],
        };
        let items = extract_from_note(&note);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "item");
        assert_eq!(items[0].range, 6..10);
        assert_eq!(items[0].line_number, 2);
    }

    #[test]
    fn sixteen_byte_uuids_render_as_uuid_hex() {
        let raw = [0xab_u8; 16];
        let note = Note {
            note_text: "x".into(),
            attribute_run: vec![checklist_run(1, &raw, 0)],
        };
        let items = extract_from_note(&note);
        assert_eq!(items[0].id, "ab".repeat(16));
    }
}
