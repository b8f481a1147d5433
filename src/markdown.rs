//! Rebuilds Markdown from a decoded note's text and attribute runs.
//!
//! Two passes. First, consecutive runs with equal formatting signatures
//! are merged; the store fragments runs aggressively (every sync or
//! style edit can split one), and emitting per-run would produce markup
//! like `**a****re**`. Second, each merged group is emitted: paragraph
//! rules (checklist, heading, code, list, quote) take precedence in
//! that order, otherwise inline character styling applies.

use crate::decode::Document;
use crate::proto::{AttributeRun, Note, ParagraphStyle};
use crate::utils::slice_chars;
use std::ops::Range;

/// Separator between notes when several are joined into one document.
pub const NOTE_SEPARATOR: &str = "\n\n---\n\n";

/// Render one decoded document, prepending `# <title>` unless the body
/// already opens with a heading.
pub fn to_markdown(doc: &Document, title: &str) -> String {
    note_to_markdown(&doc.note, title)
}

pub fn note_to_markdown(note: &Note, title: &str) -> String {
    let body = note_body(note);
    if body.starts_with('#') {
        body
    } else {
        format!("# {title}\n\n{body}")
    }
}

/// Markdown for a note that never decoded: title plus the snippet or
/// the encrypted-note marker.
pub fn fallback_to_markdown(title: &str, content: &str) -> String {
    format!("# {title}\n\n{content}")
}

/// Join per-note documents into one Markdown file.
pub fn join_documents<I>(parts: I) -> String
where
    I: IntoIterator<Item = String>,
{
    parts.into_iter().collect::<Vec<_>>().join(NOTE_SEPARATOR)
}

/// Render the body only, no title logic.
pub fn note_body(note: &Note) -> String {
    // With no styling stream at all the text already is the body.
    if note.attribute_run.is_empty() {
        return note.note_text.clone();
    }

    let total = note.note_text.chars().count();
    let mut out = String::new();
    let mut covered = 0usize;

    for (range, run) in group_runs(note, total) {
        covered = covered.max(range.end);
        emit_group(&mut out, slice_chars(&note.note_text, range.start, range.end), run);
    }

    // A malformed run stream may leave a tail of uncovered text; emit it
    // plain rather than dropping content.
    if covered < total {
        out.push_str(slice_chars(&note.note_text, covered, total));
    }

    out
}

/// Merge consecutive runs with equal signatures into `(char range, run)`
/// groups. Ranges are clamped to the text length.
fn group_runs<'a>(note: &'a Note, total: usize) -> Vec<(Range<usize>, &'a AttributeRun)> {
    let mut groups: Vec<(Range<usize>, &AttributeRun)> = Vec::new();
    let mut offset = 0usize;

    for run in &note.attribute_run {
        let start = offset.min(total);
        let end = (offset + run.length as usize).min(total);
        offset += run.length as usize;

        let merges = matches!(groups.last(), Some((_, prev)) if same_signature(prev, run));
        if merges {
            if let Some((range, _)) = groups.last_mut() {
                range.end = end;
            }
        } else {
            groups.push((start..end, run));
        }
    }

    groups.retain(|(range, _)| range.start < range.end);
    groups
}

/// Two runs merge iff every formatting field matches by presence *and*
/// value. Present-with-zero is not the same as absent: a run that says
/// `font_weight: 0` breaks a bold span, a run with no `font_weight`
/// field does not start one.
fn same_signature(a: &AttributeRun, b: &AttributeRun) -> bool {
    paragraph_signature_eq(a.paragraph_style.as_ref(), b.paragraph_style.as_ref())
        && a.font_weight == b.font_weight
        && a.emphasis_style == b.emphasis_style
        && a.underlined == b.underlined
        && a.strikethrough == b.strikethrough
        && a.superscript == b.superscript
        && a.link == b.link
}

fn paragraph_signature_eq(a: Option<&ParagraphStyle>, b: Option<&ParagraphStyle>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.style_type == b.style_type
                && a.block_quote == b.block_quote
                && checklist_uuid(a) == checklist_uuid(b)
        }
        _ => false,
    }
}

fn checklist_uuid(style: &ParagraphStyle) -> Option<&[u8]> {
    style.checklist.as_ref().map(|c| c.uuid.as_slice())
}

fn emit_group(out: &mut String, text: &str, run: &AttributeRun) {
    let mut text = text;

    // Leading newlines close the previous line; strip and re-emit them
    // so the paragraph rules below see a line start.
    while let Some(rest) = text.strip_prefix('\n') {
        out.push('\n');
        text = rest;
    }
    if text.is_empty() {
        return;
    }

    let at_line_start = out.is_empty() || out.ends_with('\n');
    let paragraph = run.paragraph_style.as_ref();

    if let Some(style) = paragraph {
        // Checklist row
        if let Some(checklist) = style.checklist.as_ref()
            && !checklist.uuid.is_empty()
            && !text.trim().is_empty()
            && at_line_start
        {
            let marker = if checklist.done.unwrap_or(0) != 0 {
                "- [x] "
            } else {
                "- [ ] "
            };
            out.push_str(marker);
            out.push_str(text);
            return;
        }

        // Headings
        if let Some(level @ 0..=2) = style.style_type
            && at_line_start
        {
            out.push_str(&"#".repeat(level as usize + 1));
            out.push(' ');
            out.push_str(text);
            return;
        }

        // Inline or fenced code
        if style.style_type == Some(4) {
            emit_code(out, text, at_line_start);
            return;
        }

        // List items
        if let Some(style_type) = style.style_type
            && let Some(marker) = list_marker(style_type)
        {
            if !at_line_start {
                out.push('\n');
            }
            let indent = "  ".repeat(style.indent_amount.unwrap_or(0).max(0) as usize);
            emit_list(out, text, &indent, marker);
            return;
        }

        // Block quote
        if style.block_quote.unwrap_or(0) > 0 && at_line_start {
            out.push_str("> ");
            out.push_str(text);
            return;
        }
    }

    out.push_str(&apply_char_styles(text, run));
}

fn list_marker(style_type: i32) -> Option<&'static str> {
    match style_type {
        100 | 103 => Some("- "),
        101 => Some("* "),
        102 | 200 => Some("1. "),
        201 => Some("1) "),
        202 => Some("a. "),
        203 => Some("i. "),
        t if t > 50 => Some("- "),
        _ => None,
    }
}

// The marker goes on every non-empty line; blank lines inside the group
// are kept as-is so paragraph breaks survive.
fn emit_list(out: &mut String, text: &str, indent: &str, marker: &str) {
    let mut first = true;
    for line in text.split('\n') {
        if !first {
            out.push('\n');
        }
        first = false;
        if !line.is_empty() {
            out.push_str(indent);
            out.push_str(marker);
            out.push_str(line);
        }
    }
}

fn emit_code(out: &mut String, text: &str, at_line_start: bool) {
    let core = text.trim_end_matches('\n');
    let trailing = &text[core.len()..];
    if core.contains('\n') {
        if !at_line_start {
            out.push('\n');
        }
        out.push_str("```\n");
        out.push_str(core);
        out.push_str("\n```");
    } else {
        out.push('`');
        out.push_str(core);
        out.push('`');
    }
    out.push_str(trailing);
}

/// Inline styling, innermost first: link, bold, italic, strikethrough,
/// underline, super/subscript. Groups whose visible text is empty or
/// pure punctuation pass through unstyled, so stray whitespace runs do
/// not become fragmented markup.
fn apply_char_styles(text: &str, run: &AttributeRun) -> String {
    let core = text.trim_end_matches('\n');
    let trailing = &text[core.len()..];

    let trimmed = core.trim();
    if trimmed.is_empty() || trimmed.chars().all(|c| !c.is_alphanumeric()) {
        return text.to_string();
    }

    let mut styled = core.to_string();
    if let Some(link) = run.link.as_deref()
        && !link.is_empty()
    {
        styled = format!("[{styled}]({link})");
    }
    if run.font_weight.unwrap_or(0) > 0 {
        styled = format!("**{styled}**");
    }
    if run.emphasis_style.unwrap_or(0) > 0 {
        styled = format!("*{styled}*");
    }
    if run.strikethrough.unwrap_or(0) > 0 {
        styled = format!("~~{styled}~~");
    }
    if run.underlined.unwrap_or(0) > 0 {
        styled = format!("<u>{styled}</u>");
    }
    match run.superscript.unwrap_or(0) {
        s if s > 0 => styled = format!("<sup>{styled}</sup>"),
        s if s < 0 => styled = format!("<sub>{styled}</sub>"),
        _ => {}
    }

    format!("{styled}{trailing}")
}
